//! Product image files.
//!
//! Images are addressed by their public URL (`/product-images/<name>`); the
//! store maps that URL to a file under its root directory and refuses
//! anything that is not a single plain file name.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

pub const IMAGE_URL_PREFIX: &str = "/product-images";
pub const IMAGE_DIR: &str = "product-images";
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("image store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid image path `{0}`")]
    InvalidPath(String),

    #[error("image `{0}` is missing after it was written")]
    NotPersisted(String),
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Writes `bytes` under `file_name` and returns the image URL.
    async fn save(&self, bytes: &[u8], file_name: &str) -> Result<String, StorageError>;

    /// Removing an image that does not exist is not an error.
    async fn delete(&self, image_url: &str) -> Result<(), StorageError>;

    async fn exists(&self, image_url: &str) -> Result<bool, StorageError>;
}

pub fn image_url(file_name: &str) -> String {
    format!("{IMAGE_URL_PREFIX}/{file_name}")
}

/// `<uuid>-<client name>` so two uploads of `photo.png` never collide.
pub fn generate_file_name(original: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_file_name(original))
}

pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn has_allowed_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Images on the local filesystem, served statically from `<root>/product-images`.
pub struct LocalImageStore {
    dir: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(IMAGE_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, image_url: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidPath(image_url.to_string());
        let name = image_url
            .strip_prefix(IMAGE_URL_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(invalid)?;

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Ok(self.dir.join(file)),
            _ => Err(invalid()),
        }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, bytes: &[u8], file_name: &str) -> Result<String, StorageError> {
        let url = image_url(file_name);
        let path = self.resolve(&url)?;
        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "image written");
        Ok(url)
    }

    async fn delete(&self, image_url: &str) -> Result<(), StorageError> {
        let path = self.resolve(image_url)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, image_url: &str) -> Result<bool, StorageError> {
        let path = self.resolve(image_url)?;
        Ok(fs::try_exists(&path).await?)
    }
}
