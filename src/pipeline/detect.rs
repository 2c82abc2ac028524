//! File-type detection: classify fetched bytes as PDF, image, or unknown.
//!
//! ## Why four strategies?
//!
//! Bill URLs come from hospital portals, cloud buckets, and link shorteners.
//! Any single signal lies often enough to matter: content-type headers are
//! missing or wrong, URL suffixes are absent behind signed links, and some
//! servers send PDFs as `application/octet-stream`. The resolution order is
//! fixed and first-match-wins:
//!
//! 1. `content-type` response header
//! 2. URL path suffix against a fixed extension table
//! 3. `%PDF` magic bytes
//! 4. raster sniff via the `image` crate
//!
//! A document that survives all four unclassified is a fatal input error —
//! the caller rejects it before spending a model call on it.

use tracing::debug;
use url::Url;

/// Broad classification of a fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    Unknown,
}

impl FileKind {
    /// Lowercase label used in prompts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Image => "image",
            FileKind::Unknown => "unknown",
        }
    }
}

/// Fixed extension-to-MIME table for strategy 2.
const EXTENSION_TABLE: &[(&str, &str, FileKind)] = &[
    ("pdf", "application/pdf", FileKind::Pdf),
    ("png", "image/png", FileKind::Image),
    ("jpg", "image/jpeg", FileKind::Image),
    ("jpeg", "image/jpeg", FileKind::Image),
    ("gif", "image/gif", FileKind::Image),
    ("bmp", "image/bmp", FileKind::Image),
    ("webp", "image/webp", FileKind::Image),
    ("tiff", "image/tiff", FileKind::Image),
];

/// Image-like suffixes without a table entry; these default to
/// `image/jpeg` rather than falling through to the byte sniff.
const IMAGE_LIKE_EXTENSIONS: &[&str] = &["jpe", "jfif", "tif", "heic", "heif", "avif", "ico"];

/// Classify a fetched document.
///
/// `content_type` is the response's `content-type` header, when present.
/// Returns the resolved MIME type and kind; `(application/octet-stream,
/// Unknown)` when every strategy fails.
pub fn detect(url: &str, content: &[u8], content_type: Option<&str>) -> (String, FileKind) {
    // Strategy 1: content-type header wins outright.
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("pdf") {
            return ("application/pdf".to_string(), FileKind::Pdf);
        }
        if ct.starts_with("image/") {
            // Strip parameters like "; charset=binary".
            let mime = ct.split(';').next().unwrap_or(&ct).trim().to_string();
            return (mime, FileKind::Image);
        }
    }

    // Strategy 2: URL path suffix.
    if let Some((mime, kind)) = detect_by_suffix(url) {
        return (mime, kind);
    }

    // Strategy 3: PDF magic bytes.
    if content.len() >= 4 && &content[..4] == b"%PDF" {
        return ("application/pdf".to_string(), FileKind::Pdf);
    }

    // Strategy 4: raster sniff. guess_format only inspects magic bytes, so
    // this works even for formats we carry no decoder for.
    if let Ok(format) = image::guess_format(content) {
        let mime = format.to_mime_type().to_string();
        debug!(mime, "classified document by raster sniff");
        return (mime, FileKind::Image);
    }

    ("application/octet-stream".to_string(), FileKind::Unknown)
}

/// Match the URL's path suffix against [`EXTENSION_TABLE`].
///
/// Uses the parsed path component so query strings and fragments on signed
/// URLs don't defeat the match.
fn detect_by_suffix(url: &str) -> Option<(String, FileKind)> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        // Not an absolute URL (e.g. tests passing bare paths); fall back to
        // the raw string.
        Err(_) => url.to_ascii_lowercase(),
    };
    let ext = path.rsplit('.').next()?;
    if !path.ends_with(&format!(".{ext}")) {
        return None;
    }
    if let Some((_, mime, kind)) = EXTENSION_TABLE.iter().find(|(e, _, _)| *e == ext) {
        return Some((mime.to_string(), *kind));
    }
    if IMAGE_LIKE_EXTENSIONS.contains(&ext) {
        return Some(("image/jpeg".to_string(), FileKind::Image));
    }
    None
}
