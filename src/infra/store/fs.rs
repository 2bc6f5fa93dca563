//! Filesystem-backed object store.
//!
//! Each space is a directory under the root; content ids map to relative paths
//! (ids containing `/` become nested directories). Uploads are written to a
//! temporary file and renamed into place, so readers never see a partial
//! object. Mime types are accepted but not recorded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::core::StoreError;
use crate::infra::store::ObjectStore;
use crate::util::checksum::md5_hex;

const TEMP_PREFIX: &str = ".tmp-";

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns a transient error when the root cannot be created.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| map_io(&e, &root))?;
        Ok(Self { root })
    }

    fn space_dir(&self, space_id: &str) -> Result<PathBuf, StoreError> {
        if space_id.is_empty() || space_id.contains(['/', '\\']) || space_id.starts_with('.') {
            return Err(StoreError::Permanent(format!("invalid space id `{space_id}`")));
        }
        Ok(self.root.join(space_id))
    }

    fn object_path(&self, space_id: &str, content_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.space_dir(space_id)?;
        if content_id.is_empty()
            || content_id
                .split('/')
                .any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(StoreError::Permanent(format!(
                "invalid content id `{content_id}`"
            )));
        }
        Ok(dir.join(content_id))
    }

    async fn existing_space_dir(&self, space_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.space_dir(space_id)?;
        if is_dir(&dir).await {
            Ok(dir)
        } else {
            Err(StoreError::NotFound(format!("space {space_id}")))
        }
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn spaces(&self) -> Result<Vec<String>, StoreError> {
        let mut spaces = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| map_io(&e, &self.root))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| map_io(&e, &self.root))?
        {
            if !entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                spaces.push(name.to_string());
            }
        }
        spaces.sort();
        Ok(spaces)
    }

    async fn space_exists(&self, space_id: &str) -> Result<bool, StoreError> {
        Ok(is_dir(&self.space_dir(space_id)?).await)
    }

    async fn create_space(&self, space_id: &str) -> Result<(), StoreError> {
        let dir = self.space_dir(space_id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| map_io(&e, &dir))
    }

    async fn list(&self, space_id: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.existing_space_dir(space_id).await?;
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || list_objects(&dir, &prefix))
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?
    }

    async fn get(&self, space_id: &str, content_id: &str) -> Result<Vec<u8>, StoreError> {
        self.existing_space_dir(space_id).await?;
        let path = self.object_path(space_id, content_id)?;
        tokio::fs::read(&path).await.map_err(|e| map_io(&e, &path))
    }

    async fn put(
        &self,
        space_id: &str,
        content_id: &str,
        body: Vec<u8>,
        _mime_type: &str,
        md5: &str,
    ) -> Result<String, StoreError> {
        let dir = self.existing_space_dir(space_id).await?;
        let path = self.object_path(space_id, content_id)?;
        let computed = md5_hex(&body);
        if computed != md5 {
            return Err(StoreError::ChecksumMismatch {
                expected: md5.to_string(),
                actual: computed,
            });
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(&e, parent))?;
        }
        let tmp = dir.join(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| map_io(&e, &tmp))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(map_io(&e, &path));
        }
        Ok(computed)
    }

    async fn delete(&self, space_id: &str, content_id: &str) -> Result<(), StoreError> {
        self.existing_space_dir(space_id).await?;
        let path = self.object_path(space_id, content_id)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| map_io(&e, &path))
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

/// Object ids under `dir` starting with `prefix`, skipping in-flight uploads.
fn list_objects(dir: &Path, prefix: &str) -> Result<Vec<String>, StoreError> {
    let mut ids = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| StoreError::Transient(e.to_string()))?;
        if !entry.file_type().is_file()
            || entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX)
        {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if id.starts_with(prefix) {
            ids.push(id);
        }
    }
    ids.sort();
    Ok(ids)
}

fn map_io(err: &io::Error, path: &Path) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => {
            StoreError::Permanent(format!("{}: {err}", path.display()))
        }
        _ => StoreError::Transient(format!("{}: {err}", path.display())),
    }
}
