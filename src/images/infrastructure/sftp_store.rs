//! Remote image storage reached over SSH/SFTP.

use crate::config::domain::model::app_config::SshSection;
use crate::core::domain::error::ImageError;
use crate::images::domain::remote_store::{RemoteStore, RemoteWriter};
use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::keys::PublicKey;
use russh::Disconnect;
use russh_sftp::client::SftpSession;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accepts any host key; the hypervisor is addressed by configuration only.
pub struct SshHandler;

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// An authenticated SSH session with the `sftp` subsystem open.
pub struct SftpStore {
    host: String,
    handle: Handle<SshHandler>,
    sftp: SftpSession,
}

impl SftpStore {
    /// Connects with password authentication and negotiates SFTP.
    ///
    /// # Errors
    ///
    /// `ImageError::Connection` for network, authentication or subsystem failures.
    pub async fn connect(ssh: &SshSection) -> Result<Self, ImageError> {
        let addr = format!("{}:{}", ssh.host, ssh.port);
        let connection_error = |message: String| ImageError::Connection {
            host: addr.clone(),
            message,
        };

        let config = Arc::new(Config::default());
        let mut handle = client::connect(config, addr.as_str(), SshHandler)
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        let auth = handle
            .authenticate_password(ssh.user.as_str(), ssh.password.as_str())
            .await
            .map_err(|e| connection_error(e.to_string()))?;
        if !auth.success() {
            return Err(connection_error(format!(
                "authentication failed for user {}",
                ssh.user
            )));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| connection_error(e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| connection_error(e.to_string()))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        info!(host = %addr, user = %ssh.user, "connected to PVE host");
        Ok(Self {
            host: addr,
            handle,
            sftp,
        })
    }
}

fn remote_error(path: &str, error: impl ToString) -> ImageError {
    ImageError::Remote {
        path: path.to_string(),
        message: error.to_string(),
    }
}

#[async_trait]
impl RemoteStore for SftpStore {
    async fn list(&self, dir: &str) -> Result<Vec<String>, ImageError> {
        let entries = self
            .sftp
            .read_dir(dir)
            .await
            .map_err(|e| remote_error(dir, e))?;
        Ok(entries
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.file_name())
            .collect())
    }

    async fn size(&self, path: &str) -> Result<Option<u64>, ImageError> {
        if !self
            .sftp
            .try_exists(path)
            .await
            .map_err(|e| remote_error(path, e))?
        {
            return Ok(None);
        }
        let metadata = self
            .sftp
            .metadata(path)
            .await
            .map_err(|e| remote_error(path, e))?;
        Ok(Some(metadata.size.unwrap_or_default()))
    }

    async fn create(&self, path: &str) -> Result<RemoteWriter, ImageError> {
        let file = self
            .sftp
            .create(path)
            .await
            .map_err(|e| remote_error(path, e))?;
        Ok(Box::new(file))
    }

    async fn remove(&self, path: &str) -> Result<(), ImageError> {
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| remote_error(path, e))
    }

    async fn close(&self) -> Result<(), ImageError> {
        if let Err(e) = self.sftp.close().await {
            warn!(host = %self.host, error = %e, "closing SFTP channel failed");
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| ImageError::Connection {
                host: self.host.clone(),
                message: e.to_string(),
            })?;
        debug!(host = %self.host, "SSH session closed");
        Ok(())
    }
}
