use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::hash::ContentHash;
use super::kind::UploadKind;
use super::traits::{BoxReader, FileStore, StoredFile};

/// Filesystem-backed upload store.
///
/// Files are stored as `{base_path}/{kind}/{uuid}.{ext}`; the database keeps only
/// the part after `base_path`.
pub struct FilesystemFileStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemFileStore {
    /// Create a new filesystem store, creating one directory per upload kind.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        for kind in UploadKind::ALL {
            fs::create_dir_all(base_path.join(kind.dir_name())).await?;
        }
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Map a stored relative path to its location on disk.
    ///
    /// Accepts exactly `<kind>/<name>` with a known kind and a flat, non-hidden name.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidPath(path.to_string());

        let (dir, name) = path.split_once('/').ok_or_else(invalid)?;
        let kind = UploadKind::from_dir_name(dir).ok_or_else(invalid)?;

        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\', '\0'])
            || name.contains("..")
        {
            return Err(invalid());
        }

        Ok(self.base_path.join(kind.dir_name()).join(name))
    }

    /// Copy `reader` into `temp_path`, enforcing the size limit while hashing.
    async fn spool(
        &self,
        mut reader: BoxReader<'_>,
        temp_path: &Path,
    ) -> Result<(u64, ContentHash), StorageError> {
        let mut hasher = Sha256::new();
        let mut total_bytes: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];
        let mut temp_file = fs::File::create(temp_path).await?;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            total_bytes += n as u64;
            if total_bytes > self.max_size {
                return Err(StorageError::SizeLimitExceeded {
                    actual: total_bytes,
                    limit: self.max_size,
                });
            }

            hasher.update(&buf[..n]);
            temp_file.write_all(&buf[..n]).await?;
        }
        temp_file.flush().await?;

        Ok((total_bytes, ContentHash::from_bytes(hasher.finalize().into())))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

/// Keep only a short lowercase alphanumeric extension.
fn clean_extension(extension: &str) -> Option<String> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

#[async_trait]
impl FileStore for FilesystemFileStore {
    async fn put_stream(
        &self,
        kind: UploadKind,
        extension: &str,
        reader: BoxReader<'_>,
    ) -> Result<StoredFile, StorageError> {
        let temp_path = self.temp_path();
        let result = async {
            let (size, content_hash) = self.spool(reader, &temp_path).await?;
            let name = match clean_extension(extension) {
                Some(ext) => format!("{}.{ext}", uuid::Uuid::now_v7()),
                None => uuid::Uuid::now_v7().to_string(),
            };
            let path = format!("{}/{name}", kind.dir_name());
            fs::rename(&temp_path, self.resolve(&path)?).await?;
            Ok::<_, StorageError>(StoredFile {
                path,
                size,
                content_hash,
            })
        }
        .await;

        if result.is_err() {
            match fs::remove_file(&temp_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %temp_path.display(), error = %e, "Failed to remove temp upload");
                }
            }
        }
        result
    }

    async fn get_stream(&self, path: &str) -> Result<BoxReader<'static>, StorageError> {
        let disk_path = self.resolve(path)?;
        match fs::File::open(&disk_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let disk_path = self.resolve(path)?;
        match fs::remove_file(&disk_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
