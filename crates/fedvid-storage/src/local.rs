use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::traits::{FileStore, FileStoreError, FileStoreResult};

/// Local filesystem store rooted at the configured storage directory.
#[derive(Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create the store, creating the root directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> FileStoreResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            FileStoreError::Config(format!(
                "failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self { root })
    }

    /// Resolve a name to a path, rejecting anything that could escape the
    /// storage root.
    fn name_to_path(&self, name: &str) -> FileStoreResult<PathBuf> {
        if name.is_empty()
            || name.contains("..")
            || name.contains('/')
            || name.contains('\\')
            || Path::new(name).is_absolute()
        {
            return Err(FileStoreError::InvalidName(name.to_string()));
        }

        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write(&self, name: &str, data: &[u8]) -> FileStoreResult<()> {
        let path = self.name_to_path(name)?;
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> FileStoreResult<()> {
        let source = self.name_to_path(from)?;
        let destination = self.name_to_path(to)?;

        fs::rename(&source, &destination).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FileStoreError::NotFound(from.to_string())
            } else {
                FileStoreError::RenameFailed(format!("{from} -> {to}: {e}"))
            }
        })
    }

    async fn remove(&self, name: &str) -> FileStoreResult<()> {
        let path = self.name_to_path(name)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FileStoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> FileStoreResult<bool> {
        let path = self.name_to_path(name)?;
        Ok(fs::try_exists(&path).await?)
    }
}
