use anyhow::{Result, anyhow};
use std::path::Path;

use crate::models::{ExtensionClass, Tag};

/// Accepted upload extensions: two spreadsheet formats plus one document
/// format, matched case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".xlsx", ".xls", ".pdf"];

/// Storage name used when sanitization strips a filename down to nothing.
pub const FALLBACK_STORAGE_NAME: &str = "upload.bin";

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Extracts the final extension of a filename, lower-cased and including the
/// leading dot (e.g. `"Report.XLSX"` → `".xlsx"`). Returns `None` when the
/// filename has no extension.
pub fn file_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?;
    Some(format!(".{}", ext.to_lowercase()))
}

/// Validates one (filename, tag) pair. Checks run in a fixed order and stop
/// at the first failure: filename presence, tag legality, extension legality,
/// extension↔tag pairing. Spreadsheet extensions pair only with TypeA/TypeB;
/// the document extension pairs only with TypeC/TypeD.
pub fn validate_item(filename: &str, raw_tag: &str) -> Result<Tag> {
    if filename.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    let tag = Tag::parse(raw_tag).ok_or_else(|| {
        anyhow!(ValidationError {
            code: "INVALID_TAG",
            message: format!(
                "Invalid tag '{}' for file {}. Allowed tags: TypeA, TypeB, TypeC, TypeD.",
                raw_tag, filename
            ),
        })
    })?;

    let ext = file_extension(filename).unwrap_or_default();
    let class = ExtensionClass::from_extension(&ext).ok_or_else(|| {
        anyhow!(ValidationError {
            code: "INVALID_EXTENSION",
            message: format!(
                "Invalid file type for {}. Only .xlsx, .xls, and .pdf are allowed.",
                filename
            ),
        })
    })?;

    if !class.allows(tag) {
        let family = match class {
            ExtensionClass::Spreadsheet => "Excel",
            ExtensionClass::Document => "PDF",
        };
        return Err(anyhow!(ValidationError {
            code: "INVALID_PAIRING",
            message: format!("Invalid tag '{}' for {} file {}.", raw_tag, family, filename),
        }));
    }

    Ok(tag)
}

/// Sanitizes a filename for on-disk storage: strips any path component and
/// every character outside alphanumeric, `.`, `_`, `-`. An empty result falls
/// back to a fixed name so the stored path is always well formed.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    if sanitized.chars().all(|c| c == '.') {
        return FALLBACK_STORAGE_NAME.to_string();
    }

    sanitized
}
