use crate::api::error::AppError;
use crate::utils::validation::sanitize_filename;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use futures::TryStreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

const FILE_FIELD: &str = "file";

/// Local copy of an uploaded file.
///
/// The file is removed at most once: either by [`StagedFile::remove`] or, if
/// that never ran (error, cancellation, panic), when the value is dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    object_name: String,
    original_name: String,
    size: u64,
    removed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the staged file, reused verbatim as the storage object name.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the staged file. Returns `Ok(false)` when there was nothing left
    /// to delete, either because it already ran or the file is already gone.
    pub async fn remove(&mut self) -> std::io::Result<bool> {
        if self.removed {
            return Ok(false);
        }
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed abandoned staged file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove staged file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Copies inbound uploads to uniquely named files in the staging directory.
pub struct StagingService {
    dir: PathBuf,
    max_file_size: usize,
}

impl StagingService {
    pub fn new(dir: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            dir: dir.into(),
            max_file_size,
        }
    }

    /// Stage the `file` part of a multipart request. Other fields are ignored.
    pub async fn stage_multipart(&self, mut multipart: Multipart) -> Result<StagedFile, AppError> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(&e))?
        {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            // A part without a filename is a plain form value, not a file
            let Some(original_name) = field.file_name().map(str::to_string) else {
                return Err(AppError::BadRequest(format!(
                    "No file is received: form field '{}' is not a file",
                    FILE_FIELD
                )));
            };
            let body_with_io_error = field.map_err(std::io::Error::other);
            let reader = StreamReader::new(body_with_io_error);

            return self.stage_reader(&original_name, reader).await;
        }

        Err(AppError::BadRequest(format!(
            "No file is received: missing form field '{}'",
            FILE_FIELD
        )))
    }

    /// Copy `reader` byte-for-byte into a new staged file.
    pub async fn stage_reader<R>(&self, original_name: &str, reader: R) -> Result<StagedFile, AppError>
    where
        R: AsyncRead + Unpin,
    {
        let suffix = match sanitize_filename(original_name) {
            Ok(name) => format!("-{}", name),
            Err(_) => ".tmp".to_string(),
        };

        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)
            .and_then(|f| f.keep().map_err(|e| e.error))
            .map_err(|e| AppError::Staging(format!("Failed to create temporary file: {}", e)))?;

        let object_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut staged = StagedFile {
            path,
            object_name,
            original_name: original_name.to_string(),
            size: 0,
            removed: false,
        };

        match self.copy_into(file, reader).await {
            Ok(size) => {
                staged.size = size;
                tracing::info!(
                    "Staged '{}' ({} bytes) at {}",
                    staged.original_name,
                    size,
                    staged.path.display()
                );
                Ok(staged)
            }
            Err(err) => {
                if let Err(e) = staged.remove().await {
                    tracing::warn!("Failed to remove partial staged file: {}", e);
                }
                Err(err)
            }
        }
    }

    async fn copy_into<R>(&self, file: std::fs::File, reader: R) -> Result<u64, AppError>
    where
        R: AsyncRead + Unpin,
    {
        let limit = self.max_file_size as u64;
        let mut limited = reader.take(limit + 1);
        let mut file = tokio::fs::File::from_std(file);

        let copied = tokio::io::copy(&mut limited, &mut file).await.map_err(|e| {
            match e.get_ref().and_then(|inner| inner.downcast_ref::<MultipartError>()) {
                Some(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                    multipart_error(err)
                }
                _ => AppError::Staging(format!("Failed to copy file to temporary file: {}", e)),
            }
        })?;

        if copied > limit {
            return Err(AppError::PayloadTooLarge(
                "File size limits exceeded".to_string(),
            ));
        }

        file.flush()
            .await
            .map_err(|e| AppError::Staging(format!("Failed to copy file to temporary file: {}", e)))?;

        Ok(copied)
    }
}

/// Body-limit failures become 413; any other malformed multipart input is a 400.
fn multipart_error(err: &MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(format!("No file is received: {}", err.body_text()))
    }
}
