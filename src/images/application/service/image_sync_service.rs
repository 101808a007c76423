use crate::config::domain::model::app_config::SshSection;
use crate::core::domain::error::ImageError;
use crate::images::domain::{
    image_file::is_image_file, progress::ProgressSink, remote_store::RemoteStore,
};
use crate::images::infrastructure::sftp_store::SftpStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, info, warn};

/// Bytes read from the local file per write.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Which side of the sync an image operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Local,
    Remote,
}

/// Result of an upload batch.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<(String, ImageError)>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Local names absent from `remote`, in local order.
pub fn diff(local: &[String], remote: &[String]) -> Vec<String> {
    let remote: HashSet<&str> = remote.iter().map(String::as_str).collect();
    local
        .iter()
        .filter(|name| !remote.contains(name.as_str()))
        .cloned()
        .collect()
}

/// Pushes local images to the hypervisor through a [`RemoteStore`].
pub struct ImageSyncService<S: RemoteStore> {
    store: Option<S>,
    local_dir: PathBuf,
    remote_dir: String,
}

impl ImageSyncService<SftpStore> {
    /// Opens an SFTP session to the host in `ssh`.
    pub async fn open(ssh: &SshSection) -> Result<Self, ImageError> {
        let store = SftpStore::connect(ssh).await?;
        Self::with_store(store, &ssh.local_image, &ssh.remote_image).await
    }

    /// Uploads every local image the remote directory lacks, then closes the session.
    pub async fn sync(
        ssh: &SshSection,
        sink: &mut dyn ProgressSink,
    ) -> Result<UploadReport, ImageError> {
        let mut service = Self::open(ssh).await?;
        service.run(sink).await
    }
}

impl<S: RemoteStore> ImageSyncService<S> {
    /// Wraps an open store, creating the local image directory when missing.
    pub async fn with_store(
        store: S,
        local_dir: impl AsRef<Path>,
        remote_dir: impl Into<String>,
    ) -> Result<Self, ImageError> {
        let local_dir = local_dir.as_ref().to_path_buf();
        if let Err(source) = fs::create_dir_all(&local_dir).await {
            if let Err(e) = store.close().await {
                warn!(error = %e, "closing remote store failed");
            }
            return Err(ImageError::Io {
                path: local_dir,
                source,
            });
        }
        Ok(Self {
            store: Some(store),
            local_dir,
            remote_dir: remote_dir.into(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&S, ImageError> {
        self.store.as_ref().ok_or(ImageError::NotConnected)
    }

    fn local_path(&self, name: &str) -> PathBuf {
        self.local_dir.join(name)
    }

    fn remote_path(&self, name: &str) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), name)
    }

    /// Image files in the local directory, sorted by name.
    pub async fn list_local(&self) -> Result<Vec<String>, ImageError> {
        let io_error = |source| ImageError::Io {
            path: self.local_dir.clone(),
            source,
        };
        let mut entries = fs::read_dir(&self.local_dir).await.map_err(io_error)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            if !entry.file_type().await.map_err(io_error)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_image_file(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Image files in the remote directory, sorted by name.
    pub async fn list_remote(&self) -> Result<Vec<String>, ImageError> {
        let mut names: Vec<String> = self
            .store()?
            .list(&self.remote_dir)
            .await?
            .into_iter()
            .filter(|name| is_image_file(name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Streams one local image to the remote directory.
    ///
    /// # Errors
    ///
    /// - `ImageError::AlreadyExists` when the remote file is present; nothing is written
    /// - `ImageError::LocalNotFound` when the local file is missing
    /// - `ImageError::Upload` when the transfer breaks; the partial remote file is removed
    pub async fn upload(&self, name: &str, sink: &mut dyn ProgressSink) -> Result<(), ImageError> {
        let store = self.store()?;
        let local = self.local_path(name);
        let remote = self.remote_path(name);

        if store.size(&remote).await?.is_some() {
            warn!(file = name, "file already exists on remote");
            return Err(ImageError::AlreadyExists(name.to_string()));
        }
        let mut file = match fs::File::open(&local).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImageError::LocalNotFound(local));
            }
            Err(source) => return Err(ImageError::Io { path: local, source }),
        };
        let total = file
            .metadata()
            .await
            .map_err(|source| ImageError::Io {
                path: local.clone(),
                source,
            })?
            .len();

        info!(file = name, bytes = total, "uploading image");
        let mut writer = store.create(&remote).await?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut transferred = 0u64;
        sink.on_progress(name, 0, total);

        let result = async {
            loop {
                let read = file.read(&mut buffer).await?;
                if read == 0 {
                    break;
                }
                writer.write_all(&buffer[..read]).await?;
                transferred += read as u64;
                sink.on_progress(name, transferred, total);
            }
            writer.shutdown().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = result {
            error!(file = name, error = %e, "upload failed");
            sink.on_error(name);
            drop(writer);
            if let Err(cleanup) = store.remove(&remote).await {
                warn!(path = %remote, error = %cleanup, "could not remove partial upload");
            }
            return Err(ImageError::Upload {
                file: name.to_string(),
                message: e.to_string(),
            });
        }

        sink.on_complete(name);
        info!(file = name, bytes = transferred, "upload complete");
        Ok(())
    }

    /// Uploads `names` one after another; a failed file does not stop the batch.
    pub async fn upload_all(&self, names: &[String], sink: &mut dyn ProgressSink) -> UploadReport {
        let mut report = UploadReport::default();
        for (index, name) in names.iter().enumerate() {
            info!("[{}/{}] Uploading {}", index + 1, names.len(), name);
            match self.upload(name, sink).await {
                Ok(()) => report.uploaded.push(name.clone()),
                Err(e) => {
                    error!(file = %name, error = %e, "image upload failed");
                    report.failed.push((name.clone(), e));
                }
            }
        }
        report
    }

    /// Removes an image from one side.
    pub async fn delete(&self, name: &str, location: Location) -> Result<(), ImageError> {
        match location {
            Location::Local => {
                let path = self.local_path(name);
                fs::remove_file(&path).await.map_err(|source| match source.kind() {
                    std::io::ErrorKind::NotFound => ImageError::NotFound(name.to_string()),
                    _ => ImageError::Io { path, source },
                })?;
            }
            Location::Remote => {
                let store = self.store()?;
                let path = self.remote_path(name);
                if store.size(&path).await?.is_none() {
                    return Err(ImageError::NotFound(name.to_string()));
                }
                store.remove(&path).await?;
            }
        }
        info!(file = name, ?location, "image deleted");
        Ok(())
    }

    /// Size of an image on one side, `None` when absent.
    pub async fn verify(&self, name: &str, location: Location) -> Result<Option<u64>, ImageError> {
        match location {
            Location::Local => {
                let path = self.local_path(name);
                match fs::metadata(&path).await {
                    Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
                    Ok(_) => Ok(None),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(source) => Err(ImageError::Io { path, source }),
                }
            }
            Location::Remote => self.store()?.size(&self.remote_path(name)).await,
        }
    }

    /// Ends the remote session. Later remote calls fail with `NotConnected`.
    pub async fn close(&mut self) -> Result<(), ImageError> {
        match self.store.take() {
            Some(store) => store.close().await,
            None => Ok(()),
        }
    }

    /// Lists both sides, uploads the difference and closes the session on every path.
    ///
    /// A failed close is logged; it does not discard the report of finished uploads.
    pub async fn run(&mut self, sink: &mut dyn ProgressSink) -> Result<UploadReport, ImageError> {
        let result = self.sync_missing(sink).await;
        if let Err(e) = self.close().await {
            warn!(error = %e, "closing remote store failed");
        }
        result
    }

    async fn sync_missing(&self, sink: &mut dyn ProgressSink) -> Result<UploadReport, ImageError> {
        let local = self.list_local().await?;
        let remote = self.list_remote().await?;
        let missing = diff(&local, &remote);
        info!(
            local = local.len(),
            remote = remote.len(),
            missing = missing.len(),
            "image inventory"
        );
        if missing.is_empty() {
            info!("remote image directory is up to date");
        }
        Ok(self.upload_all(&missing, sink).await)
    }
}
