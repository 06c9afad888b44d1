//! Gallery state manager.
//!
//! A gallery is the ordered list of image URLs attached to one entity (a
//! room, a PG location, ...). The list itself belongs to the owner; this
//! module never mutates it in place. Every operation takes the owner's current
//! list, computes the complete next list, and hands it back through the
//! `on_change` callback. Concurrent calls therefore race with last-write-wins.
//!
//! ## Adding images
//!
//! ```text
//! files ──filter image/*──truncate to capacity──┐
//!                                               ▼
//!          ┌──────────── one pipeline per file, run concurrently ────────────┐
//!          │ data URI → decode → compress(budget) → validate(ceiling) → upload│
//!          └─────────────────────────────────────────────────────────────────┘
//!                                               │ join (selection order)
//!                                               ▼
//!                 existing ++ urls ──normalize──on_change──auto-save
//! ```
//!
//! A batch is all-or-nothing: the first failing file fails the call and
//! nothing is committed. Auto-save runs after the owner has been updated, so
//! its failure is reported but never rolled back.
//!
//! ## Upload jobs
//!
//! Each accepted file gets a job keyed by the slot it will occupy
//! (`existing.len() + position`): `Queued → Compressing → Uploading →
//! Complete`, then it is cleared after `clear_delay`. Jobs of a failed batch
//! are cleared immediately.

use crate::config::AppConfig;
use crate::imaging::{
    BackendError, CompressedImage, CompressionSchedule, CompressionTarget, ImageBackend, compress,
    decode_data_uri, within_size_limit,
};
use crate::naming;
use crate::source::{self, ImageFile, ReadError};
use crate::upload::{UploadError, UploadOptions, UploadRequest, Uploader};
use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

/// Placeholder strings that stand for a missing image.
pub const SENTINELS: [&str; 2] = ["undefined", "null"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Uploads are disabled for this gallery")]
    UploadsDisabled,
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("{file} is not a readable image: {source}")]
    Decode {
        file: String,
        #[source]
        source: BackendError,
    },
    #[error("Failed to encode {file}: {source}")]
    Encode {
        file: String,
        #[source]
        source: BackendError,
    },
    #[error("Image processing is unavailable: {0}")]
    CompressionEnvironment(#[source] BackendError),
    #[error(
        "{file} is too large even after compression ({size} bytes, limit {limit_mib} MiB)"
    )]
    SizeExceeded {
        file: String,
        size: usize,
        limit_mib: f64,
    },
    #[error("Failed to upload {file}: {source}")]
    Upload {
        file: String,
        #[source]
        source: UploadError,
    },
    #[error("No image at position {index} (gallery has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The auto-save hook rejected a change. The owner already has it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Auto-save failed: {0}")]
pub struct PersistenceError(pub String);

/// Optional hook that persists every committed list.
#[async_trait]
pub trait AutoSave: Send + Sync {
    async fn save(&self, images: &[String]) -> Result<(), PersistenceError>;
}

/// True for a usable image reference: not blank, not a sentinel.
pub fn is_valid_reference(image: &str) -> bool {
    !image.trim().is_empty() && !SENTINELS.contains(&image)
}

/// Drop blank and sentinel entries, preserving order.
///
/// Blank includes whitespace-only strings such as `"  "`, not just `""`.
pub fn normalize<S: AsRef<str>>(images: &[S]) -> Vec<String> {
    images
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| is_valid_reference(s))
        .map(str::to_string)
        .collect()
}

/// Settings for one gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryOptions {
    pub max_images: usize,
    pub uploads_enabled: bool,
    pub schedule: CompressionSchedule,
    pub target: CompressionTarget,
    pub folder: String,
    pub is_public: bool,
    pub entity_id: Option<String>,
    pub clear_delay: Duration,
}

impl GalleryOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_images: config.gallery.max_images,
            uploads_enabled: config.gallery.uploads_enabled,
            schedule: config.compression.schedule(),
            target: config.compression.target(),
            folder: config.upload.folder.clone(),
            is_public: config.upload.public,
            entity_id: config.upload.entity_id.clone(),
            clear_delay: Duration::from_millis(config.gallery.progress_clear_ms),
        }
    }
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Where an upload job is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Queued,
    Compressing,
    Uploading,
    Complete,
}

/// In-flight state of one file, keyed by slot in [`UploadJobs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub file: String,
    pub stage: JobStage,
    pub percent: u8,
    id: u64,
}

/// Shared table of in-flight jobs.
#[derive(Debug, Clone, Default)]
pub struct UploadJobs {
    inner: Arc<Mutex<BTreeMap<usize, UploadJob>>>,
}

impl UploadJobs {
    /// Current jobs ordered by slot.
    pub fn snapshot(&self) -> Vec<(usize, UploadJob)> {
        self.inner
            .lock()
            .iter()
            .map(|(slot, job)| (*slot, job.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn set(&self, slot: usize, job: UploadJob) {
        self.inner.lock().insert(slot, job);
    }

    /// Remove `slot` only if it still holds job `id`.
    fn clear_if(&self, slot: usize, id: u64) -> bool {
        let mut jobs = self.inner.lock();
        if jobs.get(&slot).is_some_and(|job| job.id == id) {
            jobs.remove(&slot);
            true
        } else {
            false
        }
    }

    fn clear(&self, slot: usize) {
        self.inner.lock().remove(&slot);
    }
}

/// Progress notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryEvent {
    Job {
        slot: usize,
        file: String,
        stage: JobStage,
        percent: u8,
    },
    Cleared {
        slot: usize,
    },
    Committed {
        images: Vec<String>,
    },
    AutoSaveFailed {
        message: String,
    },
}

/// Result of a committed change.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// The list handed to the owner.
    pub images: Vec<String>,
    /// Set when the auto-save hook failed after the owner was updated.
    pub auto_save_error: Option<PersistenceError>,
}

/// Why `add_files` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    AtCapacity,
    NoImages,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Committed(Commit),
    Skipped(SkipReason),
}

type OnChange = Box<dyn Fn(&[String]) + Send + Sync>;

/// Gallery state manager for one owning entity.
pub struct Gallery<B, U> {
    backend: Arc<B>,
    uploader: Arc<U>,
    options: GalleryOptions,
    on_change: OnChange,
    auto_save: Option<Arc<dyn AutoSave>>,
    events: Option<Sender<GalleryEvent>>,
    jobs: UploadJobs,
    next_job_id: AtomicU64,
}

impl<B, U> Gallery<B, U>
where
    B: ImageBackend + 'static,
    U: Uploader,
{
    pub fn new(
        backend: Arc<B>,
        uploader: Arc<U>,
        options: GalleryOptions,
        on_change: impl Fn(&[String]) + Send + Sync + 'static,
    ) -> Self {
        Self {
            backend,
            uploader,
            options,
            on_change: Box::new(on_change),
            auto_save: None,
            events: None,
            jobs: UploadJobs::default(),
            next_job_id: AtomicU64::new(0),
        }
    }

    pub fn with_auto_save(mut self, hook: Arc<dyn AutoSave>) -> Self {
        self.auto_save = Some(hook);
        self
    }

    pub fn with_events(mut self, tx: Sender<GalleryEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn options(&self) -> &GalleryOptions {
        &self.options
    }

    pub fn jobs(&self) -> &UploadJobs {
        &self.jobs
    }

    /// Read `paths` (directories are expanded) and add them.
    pub async fn add_paths(
        &self,
        current: &[String],
        paths: &[PathBuf],
    ) -> Result<AddOutcome, GalleryError> {
        let paths = paths.to_vec();
        let files = tokio::task::spawn_blocking(move || source::expand_paths(&paths)).await??;
        let files = source::read_all(&files).await?;
        self.add_files(current, files).await
    }

    /// Compress, validate and upload `files`, then append their URLs.
    ///
    /// `files` is the picker's selection for this call; it is consumed.
    pub async fn add_files(
        &self,
        current: &[String],
        files: Vec<ImageFile>,
    ) -> Result<AddOutcome, GalleryError> {
        if !self.options.uploads_enabled {
            if files.is_empty() {
                return Ok(AddOutcome::Skipped(SkipReason::Disabled));
            }
            return Err(GalleryError::UploadsDisabled);
        }

        let existing = normalize(current);
        if existing.len() >= self.options.max_images {
            tracing::debug!(count = existing.len(), "gallery at capacity");
            return Ok(AddOutcome::Skipped(SkipReason::AtCapacity));
        }
        let remaining = self.options.max_images - existing.len();

        let accepted: Vec<ImageFile> = files
            .into_iter()
            .filter(|f| f.is_image())
            .take(remaining)
            .collect();
        if accepted.is_empty() {
            return Ok(AddOutcome::Skipped(SkipReason::NoImages));
        }

        let base_slot = existing.len();
        let count = accepted.len();
        let pipelines: Vec<_> = accepted
            .into_iter()
            .enumerate()
            .map(|(i, file)| {
                let slot = base_slot + i;
                let id = self.set_job(slot, &file.name, JobStage::Queued, 0);
                self.ingest(slot, id, file)
            })
            .collect();

        let urls = match try_join_all(pipelines).await {
            Ok(urls) => urls,
            Err(e) => {
                for slot in base_slot..base_slot + count {
                    self.jobs.clear(slot);
                }
                tracing::warn!(error = %e, "batch rejected");
                return Err(e);
            }
        };

        let mut next = existing;
        next.extend(urls);
        Ok(AddOutcome::Committed(self.commit(normalize(&next)).await))
    }

    /// Remove the image at `index` of the normalized list.
    pub async fn remove_at(&self, current: &[String], index: usize) -> Result<Commit, GalleryError> {
        let mut next = normalize(current);
        if index >= next.len() {
            return Err(GalleryError::IndexOutOfRange {
                index,
                len: next.len(),
            });
        }
        next.remove(index);
        Ok(self.commit(next).await)
    }

    /// One file: data URI → decode → compress → validate → upload.
    async fn ingest(&self, slot: usize, id: u64, file: ImageFile) -> Result<String, GalleryError> {
        self.update_job(slot, id, &file.name, JobStage::Compressing, 0);

        let data_uri = file.to_data_uri();
        let backend = Arc::clone(&self.backend);
        let schedule = self.options.schedule.clone();
        let target_bytes = self.options.target.target_bytes;
        let name = file.name.clone();
        let compressed = tokio::task::spawn_blocking(move || {
            process_image(&*backend, &name, &data_uri, &schedule, target_bytes)
        })
        .await??;

        let limit_mib = self.options.target.hard_limit_mib;
        if !within_size_limit(&compressed.data_uri, limit_mib) {
            return Err(GalleryError::SizeExceeded {
                file: file.name,
                size: compressed.size,
                limit_mib,
            });
        }

        self.update_job(slot, id, &file.name, JobStage::Uploading, 0);
        let request = UploadRequest {
            file: compressed.data_uri,
            options: UploadOptions {
                folder: self.options.folder.clone(),
                file_name: naming::generate_file_name(
                    self.options.entity_id.as_deref(),
                    &file.name,
                ),
                is_public: self.options.is_public,
            },
        };
        let url = self
            .uploader
            .upload(request)
            .await
            .map_err(|source| GalleryError::Upload {
                file: file.name.clone(),
                source,
            })?;

        self.update_job(slot, id, &file.name, JobStage::Complete, 100);
        self.schedule_clear(slot, id);
        Ok(url)
    }

    /// Hand `images` to the owner, then run auto-save.
    async fn commit(&self, images: Vec<String>) -> Commit {
        (self.on_change)(&images);
        tracing::info!(count = images.len(), "gallery updated");
        self.emit(GalleryEvent::Committed {
            images: images.clone(),
        });

        let auto_save_error = match &self.auto_save {
            Some(hook) => hook.save(&images).await.err(),
            None => None,
        };
        if let Some(err) = &auto_save_error {
            tracing::warn!(error = %err, "auto-save failed; local change kept");
            self.emit(GalleryEvent::AutoSaveFailed {
                message: err.to_string(),
            });
        }

        Commit {
            images,
            auto_save_error,
        }
    }

    fn set_job(&self, slot: usize, file: &str, stage: JobStage, percent: u8) -> u64 {
        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        self.update_job(slot, id, file, stage, percent);
        id
    }

    fn update_job(&self, slot: usize, id: u64, file: &str, stage: JobStage, percent: u8) {
        tracing::debug!(slot, file, ?stage, percent, "upload job");
        self.jobs.set(
            slot,
            UploadJob {
                file: file.to_string(),
                stage,
                percent,
                id,
            },
        );
        self.emit(GalleryEvent::Job {
            slot,
            file: file.to_string(),
            stage,
            percent,
        });
    }

    fn schedule_clear(&self, slot: usize, id: u64) {
        let jobs = self.jobs.clone();
        let events = self.events.clone();
        let delay = self.options.clear_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if jobs.clear_if(slot, id) {
                if let Some(tx) = events {
                    let _ = tx.send(GalleryEvent::Cleared { slot });
                }
            }
        });
    }

    fn emit(&self, event: GalleryEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is watching
            let _ = tx.send(event);
        }
    }
}

/// CPU-bound half of the pipeline, run on the blocking pool.
fn process_image<B: ImageBackend>(
    backend: &B,
    file: &str,
    data_uri: &str,
    schedule: &CompressionSchedule,
    target_bytes: usize,
) -> Result<CompressedImage, GalleryError> {
    let image = decode_data_uri(backend, data_uri).map_err(|source| GalleryError::Decode {
        file: file.to_string(),
        source,
    })?;
    compress(backend, &image, schedule, target_bytes).map_err(|source| match source {
        BackendError::Surface(_) => GalleryError::CompressionEnvironment(source),
        other => GalleryError::Encode {
            file: file.to_string(),
            source: other,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{Dimensions, EncodeParams};
    use crate::upload::tests::MockUploader;
    use crate::upload::UploadResponse;
    use std::sync::mpsc;

    type Calls = Arc<Mutex<Vec<Vec<String>>>>;

    fn jpeg(name: &str) -> ImageFile {
        ImageFile::new(name, "image/jpeg", vec![1, 2, 3])
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn options(max_images: usize) -> GalleryOptions {
        GalleryOptions {
            max_images,
            folder: "pg/rooms".into(),
            clear_delay: Duration::ZERO,
            ..GalleryOptions::default()
        }
    }

    fn gallery<B: ImageBackend + 'static>(
        backend: B,
        uploader: Arc<MockUploader>,
        options: GalleryOptions,
    ) -> (Gallery<B, MockUploader>, Calls) {
        let calls: Calls = Arc::default();
        let sink = Arc::clone(&calls);
        let g = Gallery::new(Arc::new(backend), uploader, options, move |images| {
            sink.lock().push(images.to_vec())
        });
        (g, calls)
    }

    fn small_backend() -> MockBackend {
        MockBackend::fixed(2000, 1500, 40_000)
    }

    /// Backend whose encoded size is read from the file's first 4 bytes.
    struct SizedBackend;

    impl ImageBackend for SizedBackend {
        type Image = usize;

        fn decode(&self, data: &[u8]) -> Result<usize, BackendError> {
            let head: [u8; 4] = data
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| BackendError::Decode("too short".into()))?;
            Ok(u32::from_le_bytes(head) as usize)
        }

        fn dimensions(&self, _image: &usize) -> Dimensions {
            Dimensions {
                width: 1000,
                height: 1000,
            }
        }

        fn encode_jpeg(&self, image: &usize, _params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
            Ok(vec![0u8; *image])
        }
    }

    fn sized(name: &str, encoded_size: u32) -> ImageFile {
        ImageFile::new(name, "image/png", encoded_size.to_le_bytes().to_vec())
    }

    // =========================================================================
    // normalize
    // =========================================================================

    #[test]
    fn normalize_drops_blank_and_sentinels() {
        let cleaned = normalize(&["a", "", "undefined", "b", "null", "  ", "c"]);
        assert_eq!(cleaned, strings(&["a", "b", "c"]));
        assert!(cleaned.iter().all(|x| is_valid_reference(x)));
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize(&["x", "null", "y", "", "x"]);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_keeps_duplicates_and_order() {
        assert_eq!(normalize(&["b", "a", "b"]), strings(&["b", "a", "b"]));
    }

    #[test]
    fn sentinel_match_is_exact() {
        assert!(is_valid_reference("nullable.jpg"));
        assert!(!is_valid_reference("null"));
    }

    // =========================================================================
    // add_files
    // =========================================================================

    #[tokio::test]
    async fn add_single_file_preserves_existing_entry() {
        let uploader = Arc::new(MockUploader::new());
        let (g, calls) = gallery(small_backend(), Arc::clone(&uploader), options(2));
        let current = strings(&["https://x/a.jpg"]);

        let outcome = g.add_files(&current, vec![jpeg("front.jpg")]).await.unwrap();

        let AddOutcome::Committed(commit) = outcome else {
            panic!("expected commit, got {outcome:?}");
        };
        assert_eq!(commit.images.len(), 2);
        assert_eq!(commit.images[0], "https://x/a.jpg");
        assert!(commit.images[1].starts_with("https://cdn.test/pg/rooms/image-"));
        assert!(commit.images[1].ends_with("-front.jpg"));
        assert_eq!(calls.lock().clone(), vec![commit.images.clone()]);
    }

    #[tokio::test]
    async fn upload_request_carries_compressed_payload_and_options() {
        let uploader = Arc::new(MockUploader::new());
        let mut opts = options(5);
        opts.entity_id = Some("Room 42".into());
        opts.is_public = false;
        let (g, _calls) = gallery(small_backend(), Arc::clone(&uploader), opts);

        g.add_files(&[], vec![jpeg("Bed Side.png")]).await.unwrap();

        let requests = uploader.requests.lock().clone();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert!(req.file.starts_with("data:image/jpeg;base64,"));
        assert_eq!(req.options.folder, "pg/rooms");
        assert!(!req.options.is_public);
        assert!(req.options.file_name.starts_with("room-42-"));
        assert!(req.options.file_name.ends_with("-bed-side.jpg"));
    }

    #[tokio::test]
    async fn commit_order_follows_selection_not_completion() {
        let uploader = Arc::new(
            MockUploader::new()
                .with_delay("alpha", Duration::from_millis(80))
                .with_delay("bravo", Duration::from_millis(40)),
        );
        let (g, _calls) = gallery(small_backend(), Arc::clone(&uploader), options(5));
        let current = strings(&["https://x/existing.jpg"]);

        let outcome = g
            .add_files(
                &current,
                vec![jpeg("alpha.jpg"), jpeg("bravo.jpg"), jpeg("charlie.jpg")],
            )
            .await
            .unwrap();

        // charlie finished first
        let completed: Vec<String> = uploader
            .requests
            .lock()
            .iter()
            .map(|r| r.options.file_name.clone())
            .collect();
        assert!(completed[0].ends_with("-charlie.jpg"));

        let AddOutcome::Committed(commit) = outcome else {
            panic!("expected commit");
        };
        assert_eq!(commit.images[0], "https://x/existing.jpg");
        assert!(commit.images[1].ends_with("-alpha.jpg"));
        assert!(commit.images[2].ends_with("-bravo.jpg"));
        assert!(commit.images[3].ends_with("-charlie.jpg"));
    }

    #[tokio::test]
    async fn at_capacity_does_nothing() {
        let uploader = Arc::new(MockUploader::new());
        let (g, calls) = gallery(small_backend(), Arc::clone(&uploader), options(2));
        let current = strings(&["u1", "u2"]);

        let outcome = g.add_files(&current, vec![jpeg("a.jpg")]).await.unwrap();

        assert_eq!(outcome, AddOutcome::Skipped(SkipReason::AtCapacity));
        assert_eq!(uploader.request_count(), 0);
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn capacity_counts_only_valid_entries() {
        let uploader = Arc::new(MockUploader::new());
        let (g, _calls) = gallery(small_backend(), Arc::clone(&uploader), options(2));
        let current = strings(&["u1", "null", ""]);

        let outcome = g.add_files(&current, vec![jpeg("a.jpg")]).await.unwrap();
        let AddOutcome::Committed(commit) = outcome else {
            panic!("expected commit");
        };
        assert_eq!(commit.images.len(), 2);
        assert_eq!(commit.images[0], "u1");
    }

    #[tokio::test]
    async fn selection_truncated_to_remaining_capacity() {
        let uploader = Arc::new(MockUploader::new());
        let (g, _calls) = gallery(small_backend(), Arc::clone(&uploader), options(3));
        let current = strings(&["u1"]);
        let files = ["a.jpg", "b.jpg", "c.jpg", "d.jpg"].map(jpeg).to_vec();

        let outcome = g.add_files(&current, files).await.unwrap();

        let AddOutcome::Committed(commit) = outcome else {
            panic!("expected commit");
        };
        assert_eq!(commit.images.len(), 3);
        assert!(commit.images[1].ends_with("-a.jpg"));
        assert!(commit.images[2].ends_with("-b.jpg"));
        assert_eq!(uploader.request_count(), 2);
    }

    #[tokio::test]
    async fn non_image_files_are_filtered() {
        let uploader = Arc::new(MockUploader::new());
        let (g, _calls) = gallery(small_backend(), Arc::clone(&uploader), options(5));
        let files = vec![
            ImageFile::new("notes.txt", "text/plain", vec![1]),
            jpeg("room.jpg"),
        ];

        g.add_files(&[], files).await.unwrap();

        let requests = uploader.requests.lock().clone();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].options.file_name.ends_with("-room.jpg"));
    }

    #[tokio::test]
    async fn only_non_images_is_skipped() {
        let uploader = Arc::new(MockUploader::new());
        let (g, calls) = gallery(small_backend(), Arc::clone(&uploader), options(5));
        let files = vec![ImageFile::new("a.pdf", "application/pdf", vec![1])];

        let outcome = g.add_files(&[], files).await.unwrap();
        assert_eq!(outcome, AddOutcome::Skipped(SkipReason::NoImages));
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn disabled_gallery_skips_empty_selection_and_rejects_files() {
        let uploader = Arc::new(MockUploader::new());
        let mut opts = options(5);
        opts.uploads_enabled = false;
        let (g, calls) = gallery(small_backend(), Arc::clone(&uploader), opts);

        let outcome = g.add_files(&[], vec![]).await.unwrap();
        assert_eq!(outcome, AddOutcome::Skipped(SkipReason::Disabled));

        let err = g.add_files(&[], vec![jpeg("a.jpg")]).await.unwrap_err();
        assert!(matches!(err, GalleryError::UploadsDisabled));
        assert_eq!(uploader.request_count(), 0);
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn oversized_file_rejects_whole_batch() {
        let uploader = Arc::new(MockUploader::new());
        let (g, calls) = gallery(SizedBackend, Arc::clone(&uploader), options(5));
        let current = strings(&["u1"]);
        let files = vec![sized("ok.png", 10_000), sized("huge.png", 300_000)];

        let err = g.add_files(&current, files).await.unwrap_err();

        match &err {
            GalleryError::SizeExceeded { file, size, .. } => {
                assert_eq!(file, "huge.png");
                assert_eq!(*size, 300_000);
            }
            other => panic!("expected SizeExceeded, got {other:?}"),
        }
        assert!(err.to_string().contains("too large even after compression"));
        assert!(calls.lock().is_empty());
        assert!(g.jobs().is_empty());
    }

    #[tokio::test]
    async fn over_budget_but_under_ceiling_is_accepted() {
        let uploader = Arc::new(MockUploader::new());
        let (g, _calls) = gallery(SizedBackend, Arc::clone(&uploader), options(5));

        let outcome = g.add_files(&[], vec![sized("mid.png", 200_000)]).await.unwrap();
        assert!(matches!(outcome, AddOutcome::Committed(_)));
    }

    #[tokio::test]
    async fn remote_rejection_surfaces_reason_and_keeps_list() {
        let uploader = Arc::new(MockUploader::failing_on("bad", "quota exceeded"));
        let (g, calls) = gallery(small_backend(), Arc::clone(&uploader), options(5));
        let current = strings(&["u1"]);

        let err = g
            .add_files(&current, vec![jpeg("good.jpg"), jpeg("bad.jpg")])
            .await
            .unwrap_err();

        assert!(matches!(err, GalleryError::Upload { .. }));
        assert!(err.to_string().contains("quota exceeded"));
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn undecodable_file_is_decode_error() {
        let uploader = Arc::new(MockUploader::new());
        let (g, calls) = gallery(small_backend(), Arc::clone(&uploader), options(5));
        let empty = ImageFile::new("empty.jpg", "image/jpeg", vec![]);

        let err = g.add_files(&[], vec![empty]).await.unwrap_err();
        assert!(matches!(err, GalleryError::Decode { ref file, .. } if file == "empty.jpg"));
        assert_eq!(uploader.request_count(), 0);
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn surface_failure_is_environment_error() {
        let uploader = Arc::new(MockUploader::new());
        let (g, _calls) = gallery(MockBackend::fixed(0, 0, 10), uploader, options(5));

        let err = g.add_files(&[], vec![jpeg("a.jpg")]).await.unwrap_err();
        assert!(matches!(err, GalleryError::CompressionEnvironment(_)));
    }

    #[tokio::test]
    async fn tall_strip_is_narrowed_instead_of_failing_environment() {
        let uploader = Arc::new(MockUploader::new());
        // Only the widened attempts fit the budget; 640 wide would overflow
        let backend = MockBackend::new(20, 20_000, |w, _, _| if w > 20 { 1_000 } else { 200_000 })
            .with_surface_limit(4_000_000);
        let (g, calls) = gallery(backend, Arc::clone(&uploader), options(5));

        let outcome = g.add_files(&[], vec![jpeg("strip.png")]).await.unwrap();

        assert!(matches!(outcome, AddOutcome::Committed(_)));
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(uploader.request_count(), 1);
    }

    /// Endpoint that claims success but hands back a placeholder URL.
    struct PlaceholderUploader;

    #[async_trait]
    impl Uploader for PlaceholderUploader {
        async fn upload(&self, _request: UploadRequest) -> Result<String, UploadError> {
            UploadResponse {
                success: true,
                url: Some("null".into()),
                error: None,
            }
            .into_url()
        }
    }

    #[tokio::test]
    async fn placeholder_url_fails_batch_instead_of_vanishing() {
        let calls: Calls = Arc::default();
        let sink = Arc::clone(&calls);
        let g = Gallery::new(
            Arc::new(small_backend()),
            Arc::new(PlaceholderUploader),
            options(5),
            move |images| sink.lock().push(images.to_vec()),
        );

        let err = g
            .add_files(&strings(&["u1"]), vec![jpeg("a.png")])
            .await
            .unwrap_err();

        assert!(matches!(err, GalleryError::Upload { ref file, .. } if file == "a.png"));
        assert!(err.to_string().contains(crate::upload::GENERIC_FAILURE));
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn add_paths_missing_file_is_read_error() {
        let (g, calls) = gallery(small_backend(), Arc::new(MockUploader::new()), options(5));
        let err = g
            .add_paths(&[], &[PathBuf::from("/nonexistent/room.jpg")])
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::Read(_)));
        assert!(calls.lock().is_empty());
    }

    // =========================================================================
    // remove_at
    // =========================================================================

    #[tokio::test]
    async fn remove_first_notifies_owner_once() {
        let (g, calls) = gallery(small_backend(), Arc::new(MockUploader::new()), options(5));

        let commit = g.remove_at(&strings(&["u1", "u2", "u3"]), 0).await.unwrap();

        assert_eq!(commit.images, strings(&["u2", "u3"]));
        assert_eq!(calls.lock().clone(), vec![strings(&["u2", "u3"])]);
    }

    #[tokio::test]
    async fn remove_indexes_the_normalized_list() {
        let (g, _calls) = gallery(small_backend(), Arc::new(MockUploader::new()), options(5));
        let commit = g
            .remove_at(&strings(&["u1", "null", "u2"]), 1)
            .await
            .unwrap();
        assert_eq!(commit.images, strings(&["u1"]));
    }

    #[tokio::test]
    async fn remove_out_of_range_leaves_owner_untouched() {
        let (g, calls) = gallery(small_backend(), Arc::new(MockUploader::new()), options(5));
        let err = g.remove_at(&strings(&["u1"]), 3).await.unwrap_err();
        assert!(matches!(err, GalleryError::IndexOutOfRange { index: 3, len: 1 }));
        assert!(calls.lock().is_empty());
    }

    // =========================================================================
    // auto-save
    // =========================================================================

    struct RecordingSave {
        saved: Mutex<Vec<Vec<String>>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl AutoSave for RecordingSave {
        async fn save(&self, images: &[String]) -> Result<(), PersistenceError> {
            self.saved.lock().push(images.to_vec());
            match &self.fail_with {
                Some(reason) => Err(PersistenceError(reason.clone())),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn auto_save_receives_committed_list() {
        let hook = Arc::new(RecordingSave {
            saved: Mutex::new(Vec::new()),
            fail_with: None,
        });
        let (g, _calls) = gallery(small_backend(), Arc::new(MockUploader::new()), options(5));
        let g = g.with_auto_save(hook.clone());

        let commit = g.remove_at(&strings(&["u1", "u2"]), 1).await.unwrap();

        assert_eq!(commit.auto_save_error, None);
        assert_eq!(hook.saved.lock().clone(), vec![strings(&["u1"])]);
    }

    #[tokio::test]
    async fn auto_save_failure_is_not_rolled_back() {
        let hook = Arc::new(RecordingSave {
            saved: Mutex::new(Vec::new()),
            fail_with: Some("server down".into()),
        });
        let (g, calls) = gallery(small_backend(), Arc::new(MockUploader::new()), options(5));
        let g = g.with_auto_save(hook);

        let outcome = g.add_files(&[], vec![jpeg("a.jpg")]).await.unwrap();

        let AddOutcome::Committed(commit) = outcome else {
            panic!("expected commit");
        };
        assert_eq!(
            commit.auto_save_error,
            Some(PersistenceError("server down".into()))
        );
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(commit.images.len(), 1);
    }

    // =========================================================================
    // jobs and events
    // =========================================================================

    #[tokio::test]
    async fn job_walks_through_stages_then_clears() {
        let (tx, rx) = mpsc::channel();
        let (g, _calls) = gallery(small_backend(), Arc::new(MockUploader::new()), options(5));
        let g = g.with_events(tx);

        g.add_files(&strings(&["u1"]), vec![jpeg("a.jpg")])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events: Vec<GalleryEvent> = rx.try_iter().collect();
        let stages: Vec<(JobStage, u8)> = events
            .iter()
            .filter_map(|e| match e {
                GalleryEvent::Job {
                    slot: 1,
                    stage,
                    percent,
                    ..
                } => Some((*stage, *percent)),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                (JobStage::Queued, 0),
                (JobStage::Compressing, 0),
                (JobStage::Uploading, 0),
                (JobStage::Complete, 100),
            ]
        );
        assert!(events.contains(&GalleryEvent::Cleared { slot: 1 }));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, GalleryEvent::Committed { images } if images.len() == 2))
        );
        assert!(g.jobs().is_empty());
    }

    #[tokio::test]
    async fn completed_job_visible_until_delay_elapses() {
        let mut opts = options(5);
        opts.clear_delay = Duration::from_secs(60);
        let (g, _calls) = gallery(small_backend(), Arc::new(MockUploader::new()), opts);

        g.add_files(&[], vec![jpeg("a.jpg")]).await.unwrap();

        let jobs = g.jobs().snapshot();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, 0);
        assert_eq!(jobs[0].1.stage, JobStage::Complete);
        assert_eq!(jobs[0].1.percent, 100);
    }

    #[tokio::test]
    async fn auto_save_failure_emits_event() {
        let (tx, rx) = mpsc::channel();
        let hook = Arc::new(RecordingSave {
            saved: Mutex::new(Vec::new()),
            fail_with: Some("nope".into()),
        });
        let (g, _calls) = gallery(small_backend(), Arc::new(MockUploader::new()), options(5));
        let g = g.with_auto_save(hook).with_events(tx);

        g.remove_at(&strings(&["u1"]), 0).await.unwrap();

        let events: Vec<GalleryEvent> = rx.try_iter().collect();
        assert!(events.contains(&GalleryEvent::AutoSaveFailed {
            message: "Auto-save failed: nope".into()
        }));
    }

    #[test]
    fn options_from_config() {
        let mut config = AppConfig::default();
        config.gallery.max_images = 3;
        config.upload.entity_id = Some("pg-9".into());
        config.gallery.progress_clear_ms = 250;

        let opts = GalleryOptions::from_config(&config);
        assert_eq!(opts.max_images, 3);
        assert_eq!(opts.entity_id.as_deref(), Some("pg-9"));
        assert_eq!(opts.clear_delay, Duration::from_millis(250));
        assert_eq!(opts.target.target_bytes, 110 * 1024);
    }
}
