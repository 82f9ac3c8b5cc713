//! Pipeline templates: loaders, placeholder substitution, stage parsing.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde_json::Value;

use crate::record::Document;
use crate::traits::TemplateLoader;

/// One placeholder occurrence: non-greedy, anchored only by the `##`
/// delimiters.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new("##(.*?)##").expect("placeholder pattern is valid"));

/// Arguments for placeholder substitution.
///
/// Positional arguments are consumed left to right, one per `##...##`
/// occurrence; named arguments replace every literal `##key##`.
#[derive(Debug, Clone)]
pub enum PipelineArgs {
    Positional(Vec<String>),
    Named(BTreeMap<String, Value>),
}

impl PipelineArgs {
    /// No substitution at all.
    pub fn none() -> Self {
        PipelineArgs::Positional(Vec::new())
    }

    pub fn positional<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PipelineArgs::Positional(args.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K>(args: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        PipelineArgs::Named(args.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Vec<String>> for PipelineArgs {
    fn from(args: Vec<String>) -> Self {
        PipelineArgs::Positional(args)
    }
}

impl From<&[&str]> for PipelineArgs {
    fn from(args: &[&str]) -> Self {
        PipelineArgs::positional(args.iter().copied())
    }
}

impl From<BTreeMap<String, Value>> for PipelineArgs {
    fn from(args: BTreeMap<String, Value>) -> Self {
        PipelineArgs::Named(args)
    }
}

/// Substitute placeholders in a template.
///
/// Replacement is textual: values are inserted as-is, with no quoting or
/// escaping, so callers must supply text that is valid in JSON context.
/// Positional substitution replaces the first remaining `##...##`
/// occurrence per argument, rescanning from the start each time — an
/// argument value that itself contains `##` therefore participates in
/// later matches. Extra arguments are ignored; leftover placeholders stay
/// in the output. Named substitution replaces every `##key##` occurrence
/// and is order-independent; values insert their printable form (strings
/// without quotes, other JSON values as their JSON text).
pub fn substitute(template: &str, args: &PipelineArgs) -> String {
    match args {
        PipelineArgs::Positional(values) => {
            let mut out = template.to_string();
            for value in values {
                out = PLACEHOLDER
                    .replace(&out, NoExpand(value.as_str()))
                    .into_owned();
            }
            out
        }
        PipelineArgs::Named(values) => {
            let mut out = template.to_string();
            for (key, value) in values {
                let token = format!("##{}##", key);
                out = out.replace(&token, &value_text(value));
            }
            out
        }
    }
}

/// Printable form of a named argument value.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse substituted template text into pipeline stage documents.
///
/// The text must decode as a JSON array of objects; each element becomes
/// one stage.
pub(crate) fn parse_documents(json: &str) -> Result<Vec<Document>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Loads templates from a directory on the local filesystem.
pub struct FsTemplateLoader {
    root: PathBuf,
}

impl FsTemplateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TemplateLoader for FsTemplateLoader {
    async fn load(&self, name: &str) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory template set, for embedded templates and tests.
pub struct StaticTemplateLoader {
    templates: HashMap<String, String>,
}

impl StaticTemplateLoader {
    /// A loader with no templates at all.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn new<I, K, V>(templates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl TemplateLoader for StaticTemplateLoader {
    async fn load(&self, name: &str) -> Result<Option<Bytes>> {
        Ok(self
            .templates
            .get(name)
            .map(|text| Bytes::from(text.clone())))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn positional_replaces_left_to_right() {
        let out = substitute(
            r#"[{"$match":{"x":##id##}}]"#,
            &PipelineArgs::positional(["42"]),
        );
        assert_eq!(out, r#"[{"$match":{"x":42}}]"#);

        let out = substitute(
            r#"[{"$skip":##a##},{"$limit":##b##}]"#,
            &PipelineArgs::positional(["10", "5"]),
        );
        assert_eq!(out, r#"[{"$skip":10},{"$limit":5}]"#);
    }

    #[test]
    fn positional_extra_args_are_ignored_and_leftovers_remain() {
        let out = substitute("##a## only", &PipelineArgs::positional(["1", "2", "3"]));
        assert_eq!(out, "1 only");

        let out = substitute("##a## and ##b##", &PipelineArgs::positional(["1"]));
        assert_eq!(out, "1 and ##b##");
    }

    #[test]
    fn positional_argument_containing_hashes_feeds_later_matches() {
        // The replacement scans from the start each time, so the injected
        // "##" pairs up with the template's next delimiter and swallows
        // the text in between.
        let out = substitute("##a## ##b##", &PipelineArgs::positional(["x##", "y"]));
        assert_eq!(out, "xyb##");
    }

    #[test]
    fn positional_handles_dollar_signs_literally() {
        let out = substitute(
            r###"[{"$match":{"f":"##v##"}}]"###,
            &PipelineArgs::positional(["$price"]),
        );
        assert_eq!(out, r#"[{"$match":{"f":"$price"}}]"#);
    }

    #[test]
    fn named_replaces_every_occurrence_and_leaves_unknown_keys() {
        let out = substitute(
            r###"[{"$match":{"name":"##n##"}},{"$limit":##k##},{"$addFields":{"alias":"##n##"}}]"###,
            &PipelineArgs::named([("n", json!("ada")), ("k", json!("5"))]),
        );
        assert_eq!(
            out,
            r#"[{"$match":{"name":"ada"}},{"$limit":5},{"$addFields":{"alias":"ada"}}]"#
        );

        let out = substitute("##known## ##unknown##", &PipelineArgs::named([("known", json!("v"))]));
        assert_eq!(out, "v ##unknown##");
    }

    #[test]
    fn named_values_use_their_printable_form() {
        let out = substitute(
            r#"[{"$limit":##n##},{"$match":{"ok":##flag##}}]"#,
            &PipelineArgs::named([("n", json!(7)), ("flag", json!(true))]),
        );
        assert_eq!(out, r#"[{"$limit":7},{"$match":{"ok":true}}]"#);
    }

    #[test]
    fn parse_accepts_stage_arrays_and_rejects_everything_else() {
        let stages = parse_documents(r#"[{"$match":{"x":42}}]"#).unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].get("$match"), Some(&json!({"x": 42})));

        assert!(parse_documents("not json").is_err());
        assert!(parse_documents(r#"{"$match":{}}"#).is_err());
        assert!(parse_documents(r#"["just a string"]"#).is_err());
    }

    #[tokio::test]
    async fn fs_loader_reads_files_and_reports_absence() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("match.json"), r#"[{"$match":{}}]"#).unwrap();

        let loader = FsTemplateLoader::new(dir.path());
        let found = loader.load("match.json").await.unwrap().unwrap();
        assert_eq!(&found[..], br#"[{"$match":{}}]"#);

        assert!(loader.load("missing.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn static_loader_serves_its_map() {
        let loader = StaticTemplateLoader::new([("p", "[]")]);
        assert_eq!(&loader.load("p").await.unwrap().unwrap()[..], b"[]");
        assert!(loader.load("q").await.unwrap().is_none());
    }
}
