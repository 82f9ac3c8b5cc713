//! Parameterized aggregation pipeline engine.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::PipelineError;
use crate::record::Document;
use crate::template::{parse_documents, substitute, PipelineArgs};
use crate::traits::{AggregationBackend, TemplateLoader};

/// Compiles parameterized JSON aggregation templates and executes them.
///
/// The `execute*` / `build_pipeline` / `read_template` methods keep the
/// historical contract: every failure is absorbed, logged, and reported as
/// an empty result. The `try_*` methods surface the underlying
/// [`PipelineError`] instead and are the recommended API for new callers.
///
/// No state is retained between calls.
#[derive(Clone)]
pub struct PipelineEngine {
    backend: Arc<dyn AggregationBackend>,
    loader: Arc<dyn TemplateLoader>,
}

impl PipelineEngine {
    pub fn new(backend: Arc<dyn AggregationBackend>, loader: Arc<dyn TemplateLoader>) -> Self {
        Self { backend, loader }
    }

    /// Run an already-parsed pipeline, absorbing errors.
    pub async fn execute(&self, collection: &str, pipeline: Vec<Document>) -> Vec<Document> {
        match self.try_execute(collection, &pipeline).await {
            Ok(results) => results,
            Err(e) => {
                error!("aggregation on collection {} failed: {}", collection, e);
                Vec::new()
            }
        }
    }

    /// Substitute, parse, and run a template string, absorbing errors.
    pub async fn execute_template(
        &self,
        collection: &str,
        template: &str,
        args: impl Into<PipelineArgs>,
    ) -> Vec<Document> {
        match self.try_execute_template(collection, template, args.into()).await {
            Ok(results) => results,
            Err(e) => {
                error!("aggregation on collection {} failed: {}", collection, e);
                Vec::new()
            }
        }
    }

    /// Resolve a named template through the loader and run it, absorbing
    /// errors.
    pub async fn execute_from_file(
        &self,
        collection: &str,
        template_name: &str,
        args: impl Into<PipelineArgs>,
    ) -> Vec<Document> {
        match self
            .try_execute_from_file(collection, template_name, args.into())
            .await
        {
            Ok(results) => results,
            Err(e) => {
                error!(
                    "aggregation from template {} on collection {} failed: {}",
                    template_name, collection, e
                );
                Vec::new()
            }
        }
    }

    /// Pure substitution + parse, for callers that want to inspect the
    /// compiled pipeline. Empty on failure (logged).
    pub fn build_pipeline(template: &str, args: &PipelineArgs) -> Vec<Document> {
        match Self::try_build_pipeline(template, args) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!("failed to build pipeline: {}", e);
                Vec::new()
            }
        }
    }

    /// Load a named template as UTF-8 text; empty string on failure
    /// (logged). Prefer [`try_read_template`](Self::try_read_template).
    pub async fn read_template(&self, name: &str) -> String {
        match self.try_read_template(name).await {
            Ok(text) => text,
            Err(e) => {
                error!("failed to read pipeline template {}: {}", name, e);
                String::new()
            }
        }
    }

    /// Run an already-parsed pipeline, surfacing backend errors. Disk use
    /// is always permitted so large sorts and groups may spill.
    pub async fn try_execute(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, PipelineError> {
        info!("executing aggregation on collection {}", collection);
        let results = self
            .backend
            .aggregate(collection, pipeline, true)
            .await
            .map_err(|e| PipelineError::Backend { source: e })?;
        Ok(results)
    }

    /// Substitute, parse, and run a template string, surfacing errors.
    pub async fn try_execute_template(
        &self,
        collection: &str,
        template: &str,
        args: PipelineArgs,
    ) -> Result<Vec<Document>, PipelineError> {
        let pipeline = Self::try_build_pipeline(template, &args)?;
        self.try_execute(collection, &pipeline).await
    }

    /// Resolve a named template and run it, surfacing errors.
    pub async fn try_execute_from_file(
        &self,
        collection: &str,
        template_name: &str,
        args: PipelineArgs,
    ) -> Result<Vec<Document>, PipelineError> {
        let template = self.try_read_template(template_name).await?;
        self.try_execute_template(collection, &template, args).await
    }

    /// Pure substitution + parse, surfacing *template-error*.
    pub fn try_build_pipeline(
        template: &str,
        args: &PipelineArgs,
    ) -> Result<Vec<Document>, PipelineError> {
        let substituted = substitute(template, args);
        Ok(parse_documents(&substituted)?)
    }

    /// Load a named template as UTF-8 text, surfacing *template-error*.
    pub async fn try_read_template(&self, name: &str) -> Result<String, PipelineError> {
        let bytes = self
            .loader
            .load(name)
            .await
            .map_err(|e| PipelineError::Template {
                reason: format!("failed to load {}: {}", name, e),
            })?
            .ok_or_else(|| PipelineError::TemplateNotFound {
                name: name.to_string(),
            })?;
        String::from_utf8(bytes.to_vec()).map_err(|e| PipelineError::Template {
            reason: format!("template {} is not valid UTF-8: {}", name, e),
        })
    }
}
