//! JSON file acting as the gallery's owning record.
//!
//! The CLI has no parent form to hold the image list, so it keeps it in a
//! small manifest next to the config:
//!
//! ```json
//! { "version": 1, "images": ["https://cdn.example/pg/rooms/...jpg"] }
//! ```
//!
//! The same store doubles as the gallery's auto-save hook. A missing file is
//! an empty gallery; a corrupt one is an error rather than silently empty, so
//! a bad edit never wipes the list on the next save.

use crate::gallery::{AutoSave, PersistenceError, normalize};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILENAME: &str = "images.json";
const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid image manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported image manifest version {0}")]
    Version(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    #[serde(default)]
    images: Vec<String>,
}

/// Image list persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalized image list; empty when the file does not exist yet.
    pub fn load(&self) -> Result<Vec<String>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let manifest: Manifest =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(StoreError::Version(manifest.version));
        }
        Ok(normalize(&manifest.images))
    }

    pub async fn save(&self, images: &[String]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            images: images.to_vec(),
        };
        let json = serde_json::to_string_pretty(&manifest).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&self.path, json).await.map_err(io_err)
    }
}

#[async_trait]
impl AutoSave for JsonFileStore {
    async fn save(&self, images: &[String]) -> Result<(), PersistenceError> {
        JsonFileStore::save(self, images)
            .await
            .map_err(|e| PersistenceError(e.to_string()))
    }
}
