use std::io;

use axum::extract::{DefaultBodyLimit, Multipart};
use axum::extract::multipart::Field;
use chrono::Utc;
use common::storage::{BoxReader, FileStore, StorageError, StoredFile, UploadKind};
use futures::TryStreamExt;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use tokio_util::io::StreamReader;

use crate::entity::file_upload;
use crate::error::AppError;
use crate::utils::filename::validate_upload_filename;

/// A file written to the store but not yet referenced by any row.
///
/// Either record it with [`PendingUpload::insert`] inside the caller's
/// transaction, or call [`PendingUpload::discard`] when that transaction fails.
#[derive(Debug)]
pub struct PendingUpload {
    pub kind: UploadKind,
    pub stored: StoredFile,
    pub original_filename: String,
    pub mime_type: Option<String>,
}

impl PendingUpload {
    pub async fn insert<C: ConnectionTrait>(
        &self,
        db: &C,
        owner_id: i32,
    ) -> Result<file_upload::Model, AppError> {
        let model = file_upload::ActiveModel {
            owner_id: Set(owner_id),
            kind: Set(self.kind),
            stored_path: Set(self.stored.path.clone()),
            original_filename: Set(self.original_filename.clone()),
            mime_type: Set(self.mime_type.clone()),
            size: Set(self.stored.size as i64),
            content_hash: Set(self.stored.content_hash.to_hex()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(db).await?)
    }

    /// Remove the disk object after the database write was abandoned.
    pub async fn discard(self, store: &dyn FileStore) {
        remove_stored_file(store, &self.stored.path).await;
    }
}

/// Read a multipart `file` field into the store.
///
/// The filename is checked against the per-kind allowlist before any byte is
/// read. The field is streamed straight into the store, which enforces the
/// size cap and removes its partial temp file on any failure.
pub async fn receive_file(
    field: Field<'_>,
    kind: UploadKind,
    store: &dyn FileStore,
) -> Result<PendingUpload, AppError> {
    let raw_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
    let (original_filename, extension) = validate_upload_filename(kind, &raw_name)?;

    let mime_type = field
        .content_type()
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
        .or_else(|| {
            mime_guess::from_ext(&extension)
                .first()
                .map(|m| m.essence_str().to_string())
        });

    // Multipart failures surface as InvalidData so they stay client errors.
    let body = field.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
    let reader: BoxReader<'_> = Box::new(Box::pin(StreamReader::new(body)));
    let stored = store
        .put_stream(kind, &extension, reader)
        .await
        .map_err(|e| match e {
            StorageError::Io(e) if e.kind() == io::ErrorKind::InvalidData => {
                AppError::Validation(format!("Upload read error: {e}"))
            }
            other => AppError::from(other),
        })?;

    if stored.size == 0 {
        remove_stored_file(store, &stored.path).await;
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }
    tracing::debug!(path = %stored.path, size = stored.size, "Stored upload");

    Ok(PendingUpload {
        kind,
        stored,
        original_filename,
        mime_type,
    })
}

/// A parsed multipart form carrying at most one `file` field plus text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<PendingUpload>,
    texts: Vec<(String, String)>,
}

impl UploadForm {
    /// Trimmed value of a text field; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.texts
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Read a multipart body: the `file` field goes to the store, the named text
/// fields are collected, anything else is ignored.
///
/// On error nothing is left behind on disk.
pub async fn read_upload_form(
    multipart: &mut Multipart,
    kind: UploadKind,
    store: &dyn FileStore,
    text_fields: &[&str],
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    let result = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "file" {
                if form.file.is_some() {
                    return Err(AppError::Validation("Only one file may be uploaded".into()));
                }
                form.file = Some(receive_file(field, kind, store).await?);
            } else if text_fields.contains(&name.as_str()) {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
                if value.chars().count() > 10_000 {
                    return Err(AppError::Validation(format!(
                        "{name} must be at most 10000 characters"
                    )));
                }
                form.texts.push((name, value));
            }
        }
        Ok::<(), AppError>(())
    }
    .await;

    if let Err(e) = result {
        if let Some(upload) = form.file.take() {
            upload.discard(store).await;
        }
        return Err(e);
    }
    Ok(form)
}

/// Delete a stored object, logging instead of failing. Used after the owning
/// row is already gone, when an error can no longer be reported usefully.
pub async fn remove_stored_file(store: &dyn FileStore, path: &str) {
    match store.delete(path).await {
        Ok(true) => tracing::debug!(path, "Removed stored file"),
        Ok(false) => tracing::warn!(path, "Stored file was already missing"),
        Err(e) => tracing::warn!(path, error = %e, "Failed to remove stored file"),
    }
}

/// Delete a `file_upload` row and return its stored path for post-commit cleanup.
pub async fn delete_file_row<C: ConnectionTrait>(
    db: &C,
    file_id: i32,
) -> Result<Option<String>, AppError> {
    let Some(row) = file_upload::Entity::find_by_id(file_id).one(db).await? else {
        return Ok(None);
    };
    file_upload::Entity::delete_by_id(file_id).exec(db).await?;
    Ok(Some(row.stored_path))
}

/// Body limit for multipart routes: the file cap plus room for text fields
/// and multipart framing.
pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let limit = max_upload_size.saturating_add(256 * 1024);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}
