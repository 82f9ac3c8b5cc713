//! MIME type lookup by filename extension.

/// Fallback MIME type for unknown or missing extensions.
const FALLBACK: &str = "application/octet-stream";

/// Derive a MIME type from a filename's extension.
///
/// The extension is folded to lowercase before lookup. A filename without
/// a `.` has no extension and takes the fallback,
/// `application/octet-stream`.
pub fn content_type_for_filename(filename: &str) -> &'static str {
    let Some((_, extension)) = filename.rsplit_once('.') else {
        return FALLBACK;
    };
    match extension.to_ascii_lowercase().as_str() {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => FALLBACK,
    }
}
