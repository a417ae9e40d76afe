use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use lumen_core::models::{
    IngestJob, MediaFormat, MediaRecord, RequestedFormat, TransformLimits, TransformQuery,
};
use lumen_core::AppError;
use lumen_db::{InMemoryMediaRepository, MediaRecordStore, UpsertOutcome};
use lumen_services::{IngestionCoordinator, MediaDelivery, MediaLibrary};
use lumen_storage::{LocalMasterStore, MasterStore, Placement, StorageResult};
use lumen_worker::{JobAttempt, TaskQueue, TaskQueueConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Record store whose first `failures` upserts report the store as down.
struct FlakyRecords {
    inner: Arc<InMemoryMediaRepository>,
    failures: AtomicU32,
}

impl FlakyRecords {
    fn new(inner: Arc<InMemoryMediaRepository>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl MediaRecordStore for FlakyRecords {
    async fn upsert(&self, key: &str) -> Result<UpsertOutcome, AppError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(AppError::StoreUnavailable("connection refused".to_string()));
        }
        self.inner.upsert(key).await
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<MediaRecord>, AppError> {
        self.inner.find_by_key(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        self.inner.delete(key).await
    }

    async fn count_with_digest(&self, digest: &str) -> Result<u64, AppError> {
        self.inner.count_with_digest(digest).await
    }
}

/// Master store where a concurrent delete removes the master right after
/// the first placement.
struct RacedDeleteStore {
    inner: Arc<LocalMasterStore>,
    raced: AtomicU32,
}

#[async_trait]
impl MasterStore for RacedDeleteStore {
    async fn staging_path(&self, format: MediaFormat) -> StorageResult<PathBuf> {
        self.inner.staging_path(format).await
    }

    async fn place_or_dedupe(
        &self,
        staged: &Path,
        digest: &str,
        format: MediaFormat,
    ) -> StorageResult<Placement> {
        let placement = self.inner.place_or_dedupe(staged, digest, format).await?;
        if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.delete(digest, format).await?;
        }
        Ok(placement)
    }

    fn path_for_key(&self, key: &str) -> StorageResult<PathBuf> {
        self.inner.path_for_key(key)
    }

    async fn exists(&self, digest: &str, format: MediaFormat) -> StorageResult<bool> {
        self.inner.exists(digest, format).await
    }

    async fn delete(&self, digest: &str, format: MediaFormat) -> StorageResult<()> {
        self.inner.delete(digest, format).await
    }
}

struct Harness {
    _root: TempDir,
    storage: PathBuf,
    uploads: PathBuf,
    store: Arc<LocalMasterStore>,
    records: Arc<InMemoryMediaRepository>,
}

impl Harness {
    async fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let storage = root.path().join("storage");
        let uploads = root.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let store = Arc::new(LocalMasterStore::new(&storage).await.unwrap());
        Self {
            _root: root,
            storage,
            uploads,
            store,
            records: Arc::new(InMemoryMediaRepository::new()),
        }
    }

    fn coordinator(&self) -> IngestionCoordinator {
        self.coordinator_with(self.records.clone())
    }

    fn coordinator_with(&self, records: Arc<dyn MediaRecordStore>) -> IngestionCoordinator {
        IngestionCoordinator::new(self.store.clone(), records, TransformLimits::default())
    }

    fn delivery(&self) -> MediaDelivery {
        MediaDelivery::new(
            self.store.clone(),
            self.records.clone(),
            TransformLimits::default(),
        )
    }

    /// Write a test JPEG into the upload directory under a unique name.
    fn upload_jpeg(&self, seed: u8) -> PathBuf {
        let img = RgbImage::from_fn(640, 480, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, seed.wrapping_add((x ^ y) as u8)])
        });
        let path = self.uploads.join(format!("{}.jpg", Uuid::new_v4()));
        img.save_with_format(&path, ImageFormat::Jpeg).unwrap();
        path
    }

    fn copy_upload(&self, from: &Path) -> PathBuf {
        let path = self.uploads.join(format!("{}.jpg", Uuid::new_v4()));
        std::fs::copy(from, &path).unwrap();
        path
    }

    fn masters(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.storage)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .collect()
    }

    fn staged(&self) -> usize {
        std::fs::read_dir(self.storage.join(".staging"))
            .unwrap()
            .count()
    }
}

fn first_attempt() -> JobAttempt {
    JobAttempt {
        job_id: Uuid::new_v4(),
        number: 1,
        max_attempts: 2,
    }
}

fn retry_of(attempt: JobAttempt) -> JobAttempt {
    JobAttempt {
        number: attempt.number + 1,
        ..attempt
    }
}

fn quick_retries() -> TaskQueueConfig {
    TaskQueueConfig {
        retry_base_delay: Duration::from_millis(10),
        ..TaskQueueConfig::default()
    }
}

fn job(path: PathBuf, name: &str) -> IngestJob {
    IngestJob {
        tmp_file_path: path,
        original_file_name: name.to_string(),
    }
}

#[tokio::test]
async fn test_ingest_derives_key_from_digest_and_name() {
    let h = Harness::new().await;
    let upload = h.upload_jpeg(1);

    let outcome = h
        .coordinator()
        .ingest(&job(upload.clone(), "My Photo!!.JPG"), first_attempt())
        .await
        .unwrap();

    let (digest, name) = outcome.key.split_once('/').unwrap();
    assert_eq!(digest.len(), 64);
    assert_eq!(name, "my-photo.jpg");
    assert!(!upload.exists());
    assert!(h.records.find_by_key(&outcome.key).await.unwrap().is_some());

    let master = h.store.path_for_key(&outcome.key).unwrap();
    assert!(master.exists());
    assert_eq!(lumen_storage::sha256_file(&master).await.unwrap(), digest);
    assert_eq!(h.staged(), 0);
}

#[tokio::test]
async fn test_same_bytes_ingested_twice_share_one_master() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();
    let first = h.upload_jpeg(7);
    let second = h.copy_upload(&first);

    let a = coordinator
        .ingest(&job(first, "a.jpg"), first_attempt())
        .await
        .unwrap();
    let b = coordinator
        .ingest(&job(second, "b.jpg"), first_attempt())
        .await
        .unwrap();

    assert_ne!(a.key, b.key);
    assert_eq!(a.key.split('/').next(), b.key.split('/').next());
    assert_eq!(h.masters().len(), 1);
    assert_eq!(h.records.len().await, 2);
}

#[tokio::test]
async fn test_concurrent_identical_uploads_race_cleanly() {
    let h = Harness::new().await;
    let queue = TaskQueue::start(Arc::new(h.coordinator()), TaskQueueConfig::default());

    let original = h.upload_jpeg(42);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let upload = h.copy_upload(&original);
        handles.push(queue.submit(job(upload, "same.jpg")).await.unwrap());
    }
    std::fs::remove_file(&original).unwrap();

    let outcomes = futures::future::join_all(handles.into_iter().map(|h| h.wait())).await;
    let keys: Vec<String> = outcomes.into_iter().map(|o| o.unwrap().key).collect();

    assert!(keys.iter().all(|k| k == &keys[0]));
    assert_eq!(h.masters().len(), 1);
    assert_eq!(h.records.len().await, 1);
    assert_eq!(h.staged(), 0);
    assert_eq!(std::fs::read_dir(&h.uploads).unwrap().count(), 0);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_undecodable_upload_is_cleaned_up() {
    let h = Harness::new().await;
    let upload = h.uploads.join("broken.jpg");
    std::fs::write(&upload, b"definitely not an image").unwrap();

    let err = h
        .coordinator()
        .ingest(&job(upload.clone(), "broken.jpg"), first_attempt())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Decode(_)));
    assert!(!upload.exists());
    assert!(h.masters().is_empty());
    assert_eq!(h.staged(), 0);
    assert!(h.records.is_empty().await);
}

#[tokio::test]
async fn test_decode_failure_is_not_retried_by_queue() {
    let h = Harness::new().await;
    let queue = TaskQueue::start(Arc::new(h.coordinator()), TaskQueueConfig::default());
    let upload = h.uploads.join("broken.png");
    std::fs::write(&upload, b"\x89PNG garbage").unwrap();

    let err = queue
        .submit_and_wait(job(upload.clone(), "broken.png"))
        .await
        .unwrap_err();

    assert!(matches!(AppError::from(err), AppError::Decode(_)));
    assert!(!upload.exists());
    queue.shutdown().await;
}

#[tokio::test]
async fn test_serve_fits_webp_into_budget() {
    let h = Harness::new().await;
    let outcome = h
        .coordinator()
        .ingest(&job(h.upload_jpeg(3), "My Photo!!.JPG"), first_attempt())
        .await
        .unwrap();

    let query = TransformQuery {
        width: Some(200),
        format: Some(RequestedFormat::WebP),
        max_kilobytes: Some(30),
        ..Default::default()
    };
    let rendered = h.delivery().render(&outcome.key, query).await.unwrap();

    assert_eq!(rendered.format, MediaFormat::WebP);
    assert!(rendered.bytes.len() <= 30 * 1024);
    assert!(rendered.quality_used.is_some());
    assert_eq!(rendered.content_type(), "image/webp");
    assert_eq!(
        rendered.content_disposition(),
        "inline; filename=\"my-photo.webp\""
    );

    let decoded = image::load_from_memory(&rendered.bytes).unwrap();
    assert!(decoded.width() <= 200);
}

#[tokio::test]
async fn test_serve_without_budget_keeps_source_format() {
    let h = Harness::new().await;
    let outcome = h
        .coordinator()
        .ingest(&job(h.upload_jpeg(5), "plain.jpg"), first_attempt())
        .await
        .unwrap();

    let rendered = h
        .delivery()
        .render(&outcome.key, TransformQuery::default())
        .await
        .unwrap();

    assert_eq!(rendered.format, MediaFormat::Jpeg);
    assert_eq!(rendered.quality_used, None);
    assert_eq!(&rendered.bytes[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_serve_checks_record_before_query() {
    let h = Harness::new().await;
    let missing = format!("{}/nothing.jpg", "a".repeat(64));
    let oversized = TransformQuery {
        width: Some(100_000),
        ..Default::default()
    };

    let err = h.delivery().render(&missing, oversized.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = h
        .delivery()
        .render("../../etc/passwd", TransformQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let outcome = h
        .coordinator()
        .ingest(&job(h.upload_jpeg(9), "x.jpg"), first_attempt())
        .await
        .unwrap();
    let err = h.delivery().render(&outcome.key, oversized).await.unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_delete_keeps_shared_master_until_last_record() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();
    let library = MediaLibrary::new(h.store.clone(), h.records.clone());

    let first = h.upload_jpeg(11);
    let second = h.copy_upload(&first);
    let a = coordinator
        .ingest(&job(first, "a.jpg"), first_attempt())
        .await
        .unwrap();
    let b = coordinator
        .ingest(&job(second, "b.jpg"), first_attempt())
        .await
        .unwrap();

    library.delete(&a.key).await.unwrap();
    assert_eq!(h.masters().len(), 1);

    library.delete(&b.key).await.unwrap();
    assert!(h.masters().is_empty());

    let err = library.delete(&b.key).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_store_failure_keeps_upload_for_retry() {
    let h = Harness::new().await;
    let flaky = Arc::new(FlakyRecords::new(h.records.clone(), 1));
    let coordinator = h.coordinator_with(flaky);
    let upload = h.upload_jpeg(21);
    let spare = h.copy_upload(&upload);
    let pending = job(upload.clone(), "Retry.jpg");

    let attempt = first_attempt();
    let err = coordinator.ingest(&pending, attempt).await.unwrap_err();
    assert!(matches!(err, AppError::StoreUnavailable(_)));
    assert_eq!(h.staged(), 0);
    assert!(upload.exists());
    assert!(h.records.is_empty().await);

    let outcome = coordinator.ingest(&pending, retry_of(attempt)).await.unwrap();
    assert_eq!(h.staged(), 0);
    assert!(!upload.exists());
    assert_eq!(h.masters().len(), 1);
    assert_eq!(h.records.len().await, 1);

    let again = h
        .coordinator()
        .ingest(&job(spare, "Retry.jpg"), first_attempt())
        .await
        .unwrap();
    assert_eq!(again.key, outcome.key);
    assert_eq!(h.masters().len(), 1);
}

#[tokio::test]
async fn test_store_failure_on_last_attempt_removes_upload() {
    let h = Harness::new().await;
    let flaky = Arc::new(FlakyRecords::new(h.records.clone(), u32::MAX));
    let coordinator = h.coordinator_with(flaky);
    let upload = h.upload_jpeg(22);
    let pending = job(upload.clone(), "down.jpg");

    let attempt = first_attempt();
    coordinator.ingest(&pending, attempt).await.unwrap_err();
    assert!(upload.exists());

    let err = coordinator.ingest(&pending, retry_of(attempt)).await.unwrap_err();
    assert!(matches!(err, AppError::StoreUnavailable(_)));
    assert!(!upload.exists());
    assert_eq!(h.staged(), 0);
    assert!(h.records.is_empty().await);
}

#[tokio::test]
async fn test_queue_retries_store_failure() {
    let h = Harness::new().await;
    let flaky = Arc::new(FlakyRecords::new(h.records.clone(), 1));
    let queue = TaskQueue::start(Arc::new(h.coordinator_with(flaky)), quick_retries());
    let upload = h.upload_jpeg(23);

    let outcome = queue
        .submit_and_wait(job(upload.clone(), "queued.jpg"))
        .await
        .unwrap();

    assert!(outcome.key.ends_with("/queued.jpg"));
    assert!(!upload.exists());
    assert_eq!(h.staged(), 0);
    assert_eq!(h.masters().len(), 1);
    assert_eq!(h.records.len().await, 1);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_master_removed_during_ingest_is_republished_on_retry() {
    let h = Harness::new().await;
    let store = Arc::new(RacedDeleteStore {
        inner: h.store.clone(),
        raced: AtomicU32::new(0),
    });
    let coordinator =
        IngestionCoordinator::new(store, h.records.clone(), TransformLimits::default());
    let upload = h.upload_jpeg(24);
    let pending = job(upload.clone(), "raced.jpg");

    let attempt = first_attempt();
    let err = coordinator.ingest(&pending, attempt).await.unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert!(upload.exists());
    assert!(h.masters().is_empty());

    let outcome = coordinator.ingest(&pending, retry_of(attempt)).await.unwrap();
    assert!(h.store.path_for_key(&outcome.key).unwrap().exists());
    assert!(!upload.exists());

    let rendered = h
        .delivery()
        .render(&outcome.key, TransformQuery::default())
        .await
        .unwrap();
    assert_eq!(rendered.format, MediaFormat::Jpeg);
}

#[tokio::test]
async fn test_record_without_master_is_not_found() {
    let h = Harness::new().await;
    let outcome = h
        .coordinator()
        .ingest(&job(h.upload_jpeg(25), "orphan.jpg"), first_attempt())
        .await
        .unwrap();
    std::fs::remove_file(h.store.path_for_key(&outcome.key).unwrap()).unwrap();

    let err = h
        .delivery()
        .render(&outcome.key, TransformQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_oversized_source_is_rejected_at_ingest() {
    let h = Harness::new().await;
    let coordinator = IngestionCoordinator::new(
        h.store.clone(),
        h.records.clone(),
        TransformLimits {
            max_dimension: 320,
            max_pixel_count: 36_000_000,
        },
    );
    let upload = h.upload_jpeg(26);

    let err = coordinator
        .ingest(&job(upload.clone(), "big.jpg"), first_attempt())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ConstraintViolation(_)));
    assert!(!upload.exists());
    assert!(h.masters().is_empty());
    assert_eq!(h.staged(), 0);
}
