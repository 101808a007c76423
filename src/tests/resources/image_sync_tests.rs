use crate::images::domain::remote_store::RemoteWriter;
use crate::{ImageError, ImageSyncService, Location, NoProgress, ProgressSink, RemoteStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

const REMOTE_DIR: &str = "/var/lib/vz/images/install";

type Files = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// Remote side kept in memory; a file appears once its writer is shut down.
#[derive(Clone, Default)]
struct MemoryStore {
    files: Files,
    closed: Arc<AtomicUsize>,
    fail_writes: bool,
}

impl MemoryStore {
    fn with_files(names: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut files = store.files.lock().unwrap();
            for name in names {
                files.insert(format!("{}/{}", REMOTE_DIR, name), b"existing".to_vec());
            }
        }
        store
    }

    fn names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|path| path.rsplit('/').next().map(str::to_string))
            .collect()
    }
}

struct MemoryWriter {
    path: String,
    buffer: Vec<u8>,
    files: Files,
    fail: bool,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "connection reset",
            )));
        }
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.files
            .lock()
            .unwrap()
            .insert(this.path.clone(), std::mem::take(&mut this.buffer));
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, dir: &str) -> Result<Vec<String>, ImageError> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    async fn size(&self, path: &str) -> Result<Option<u64>, ImageError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(path)
            .map(|content| content.len() as u64))
    }

    async fn create(&self, path: &str) -> Result<RemoteWriter, ImageError> {
        if self.fail_writes {
            // A real server creates the file before the first write fails.
            self.files.lock().unwrap().insert(path.to_string(), Vec::new());
        }
        Ok(Box::new(MemoryWriter {
            path: path.to_string(),
            buffer: Vec::new(),
            files: self.files.clone(),
            fail: self.fail_writes,
        }))
    }

    async fn remove(&self, path: &str) -> Result<(), ImageError> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn close(&self) -> Result<(), ImageError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every progress callback.
#[derive(Default)]
struct RecordingProgress {
    updates: Vec<(String, u64, u64)>,
    completed: Vec<String>,
    failed: Vec<String>,
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&mut self, file: &str, transferred: u64, total: u64) {
        self.updates.push((file.to_string(), transferred, total));
    }

    fn on_complete(&mut self, file: &str) {
        self.completed.push(file.to_string());
    }

    fn on_error(&mut self, file: &str) {
        self.failed.push(file.to_string());
    }
}

fn write_local(dir: &std::path::Path, name: &str, size: usize) {
    std::fs::write(dir.join(name), vec![7u8; size]).unwrap();
}

#[tokio::test]
async fn test_sync_uploads_only_missing_images() {
    let dir = tempfile::tempdir().unwrap();
    write_local(dir.path(), "a.iso", 10);
    write_local(dir.path(), "b.qcow2", 100 * 1024);
    write_local(dir.path(), "README.txt", 5);

    let store = MemoryStore::with_files(&["a.iso"]);
    let mut service = ImageSyncService::with_store(store.clone(), dir.path(), REMOTE_DIR)
        .await
        .unwrap();

    assert_eq!(service.list_local().await.unwrap(), vec!["a.iso", "b.qcow2"]);
    assert_eq!(service.list_remote().await.unwrap(), vec!["a.iso"]);

    let mut progress = RecordingProgress::default();
    let report = service.run(&mut progress).await.unwrap();

    assert_eq!(report.uploaded, vec!["b.qcow2"]);
    assert!(report.is_success());
    assert_eq!(progress.completed, vec!["b.qcow2"]);
    assert_eq!(progress.updates.first(), Some(&("b.qcow2".to_string(), 0, 100 * 1024)));
    assert_eq!(
        progress.updates.last(),
        Some(&("b.qcow2".to_string(), 100 * 1024, 100 * 1024))
    );
    assert!(progress.updates.windows(2).all(|pair| pair[0].1 <= pair[1].1));

    assert_eq!(store.names(), vec!["a.iso", "b.qcow2"]);
    let files = store.files.lock().unwrap();
    assert_eq!(files[&format!("{}/a.iso", REMOTE_DIR)], b"existing".to_vec());
    assert_eq!(files[&format!("{}/b.qcow2", REMOTE_DIR)].len(), 100 * 1024);
    drop(files);

    assert_eq!(store.closed.load(Ordering::SeqCst), 1);
    assert!(matches!(service.list_remote().await, Err(ImageError::NotConnected)));
}

#[tokio::test]
async fn test_upload_then_relist_and_refuse_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    write_local(dir.path(), "debian.iso", 2048);
    let store = MemoryStore::default();
    let service = ImageSyncService::with_store(store.clone(), dir.path(), REMOTE_DIR)
        .await
        .unwrap();

    service.upload("debian.iso", &mut NoProgress).await.unwrap();
    assert_eq!(service.list_remote().await.unwrap(), vec!["debian.iso"]);

    let before = store.files.lock().unwrap().clone();
    assert!(matches!(
        service.upload("debian.iso", &mut NoProgress).await,
        Err(ImageError::AlreadyExists(_))
    ));
    assert_eq!(*store.files.lock().unwrap(), before);
}

#[tokio::test]
async fn test_failed_transfer_removes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    write_local(dir.path(), "a.iso", 10);
    write_local(dir.path(), "b.raw", 10);
    let store = MemoryStore {
        fail_writes: true,
        ..Default::default()
    };
    let service = ImageSyncService::with_store(store.clone(), dir.path(), REMOTE_DIR)
        .await
        .unwrap();

    let names = vec!["a.iso".to_string(), "b.raw".to_string()];
    let mut progress = RecordingProgress::default();
    let report = service.upload_all(&names, &mut progress).await;

    assert!(report.uploaded.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(matches!(report.failed[0].1, ImageError::Upload { ref file, .. } if file == "a.iso"));
    assert!(store.names().is_empty());
    assert_eq!(progress.failed, vec!["a.iso", "b.raw"]);
    assert!(progress.completed.is_empty());
}

#[tokio::test]
async fn test_verify_and_delete_on_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    write_local(dir.path(), "local.img", 42);
    let store = MemoryStore::with_files(&["remote.iso"]);
    let service = ImageSyncService::with_store(store.clone(), dir.path(), REMOTE_DIR)
        .await
        .unwrap();

    assert_eq!(service.verify("local.img", Location::Local).await.unwrap(), Some(42));
    assert_eq!(service.verify("remote.iso", Location::Remote).await.unwrap(), Some(8));
    assert_eq!(service.verify("ghost.iso", Location::Remote).await.unwrap(), None);

    service.delete("local.img", Location::Local).await.unwrap();
    service.delete("remote.iso", Location::Remote).await.unwrap();
    assert_eq!(service.verify("local.img", Location::Local).await.unwrap(), None);
    assert!(store.names().is_empty());

    assert!(matches!(
        service.delete("remote.iso", Location::Remote).await,
        Err(ImageError::NotFound(_))
    ));
    assert!(matches!(
        service.delete("local.img", Location::Local).await,
        Err(ImageError::NotFound(_))
    ));
}
