use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

/// Longest sanitized name kept in an object name, in characters.
const MAX_FILENAME_CHARS: usize = 128;

/// Reduce a client-supplied file name to a single safe path component.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Treat both separators as path separators regardless of platform
    let normalized = filename.replace('\\', "/");
    let name = Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .take(MAX_FILENAME_CHARS)
        .collect();

    let sanitized = sanitized.trim().trim_start_matches('.').to_string();
    if sanitized.is_empty() {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    Ok(sanitized)
}
