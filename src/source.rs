//! Selected files and the data URIs they are read into.
//!
//! An [`ImageFile`] is what a file picker hands over: a display name, a MIME
//! type and the raw bytes. On disk the MIME type is guessed from the
//! extension, so a `.txt` dropped into a selection is carried along but later
//! filtered out by the gallery as a non-image. Only formats the build can
//! decode get an `image/*` type; a `.gif` is treated like the `.txt`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// MIME type used for files whose extension is not a known image format.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// A user-selected file, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn open(path: &Path) -> Result<Self, ReadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            content_type: content_type_for(path).to_string(),
            bytes,
        })
    }

    /// Whether the picker would consider this an image (`image/*`).
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Encode the file as a `data:<mime>;base64,...` URI.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

/// MIME type for a path, from its extension. Formats without a compiled-in
/// decoder are [`UNKNOWN_CONTENT_TYPE`].
pub fn content_type_for(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .ok()
        .filter(|f| f.reading_enabled())
        .map(|f| f.to_mime_type())
        .unwrap_or(UNKNOWN_CONTENT_TYPE)
}

/// Expand a selection of paths: files pass through, directories are walked.
///
/// Directory contents are sorted by path so the selection order is stable.
/// Hidden files (leading `.`) inside directories are skipped.
pub fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = entry.map_err(|source| ReadError::Walk {
                path: path.clone(),
                source,
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

/// Read every path in order.
pub async fn read_all(paths: &[PathBuf]) -> Result<Vec<ImageFile>, ReadError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(ImageFile::open(path).await?);
    }
    Ok(files)
}
