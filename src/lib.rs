//! Config-driven VM provisioning and image synchronisation for Proxmox VE.
//!
//! Two pipelines share one YAML file: [`ProvisioningService`] creates the configured VMs
//! through the Proxmox REST API, and [`ImageSyncService`] pushes missing disk/ISO images
//! to the hypervisor over SFTP.

mod auth;
mod config;
mod core;
mod images;
mod provisioning;


pub use crate::config::application::service::config_loader::ConfigLoader;
pub use crate::config::domain::model::{
    app_config::{AppConfig, ProxmoxSection, RateLimitSection, SshSection, StorageSection},
    vm_spec::{CloudInitSpec, DiskSpec, Flag, VmSpec},
};
pub use crate::core::domain::error::{
    ConfigError, ImageError, ProxmoxError, ProxmoxResult, TaskError, ValidationError, VmError,
};
pub use crate::core::domain::model::{
    client_config::{ClientConfig, RateLimitConfig},
    proxmox_auth::ProxmoxAuth,
    proxmox_connection::ProxmoxConnection,
    task::TaskStatus,
    vm::{CreateVmParams, ImportDiskParams, UpdateVmConfigParams, VmConfig, VmListItem},
};
pub use crate::core::domain::value_object::{
    ProxmoxCSRFToken, ProxmoxHost, ProxmoxPassword, ProxmoxPort, ProxmoxRealm, ProxmoxTicket,
    ProxmoxUrl, ProxmoxUsername, Upid,
};
pub use crate::core::infrastructure::logging::{LoggingError, init_logging};
pub use crate::images::application::service::image_sync_service::{
    ImageSyncService, Location, UploadReport, diff,
};
pub use crate::images::domain::{
    image_file::{IMAGE_EXTENSIONS, is_image_file},
    progress::{ConsoleProgress, LogProgress, NoProgress, ProgressSink},
    remote_store::{RemoteStore, RemoteWriter},
};
pub use crate::images::infrastructure::sftp_store::SftpStore;
pub use crate::provisioning::application::{
    request::create_vm_request::build_create_params,
    service::{
        provisioning_service::{CreatedVm, ProvisionSummary, ProvisioningService, VmFailure},
        task_service::{TaskPolicy, TaskService},
    },
};

use crate::core::domain::value_object::{DEFAULT_REALM, split_user_realm};
use crate::core::infrastructure::api_client::ApiClient;
use std::net::IpAddr;
use tracing::info;

/// A Client for interacting with the Proxmox VE API
///
/// This client provides:
/// - Ticket authentication with transparent re-login
/// - The VM resource calls needed for provisioning
/// - Task status lookups
///
/// # Examples
///
/// ```no_run
/// use pve_provision::{ProxmoxClient, ProxmoxResult};
///
/// #[tokio::main]
/// async fn main() -> ProxmoxResult<()> {
///     let client = ProxmoxClient::builder()
///         .host("proxmox.example.com")
///         .port(8006)
///         .credentials("root", "password", "pam")
///         .secure(true)
///         .build()?;
///
///     client.login().await?;
///     let vms = client.vms("pve1").await?;
///     println!("{} VMs on pve1", vms.len());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct ProxmoxClient {
    pub(crate) api_client: ApiClient,
}

/// Builder for ProxmoxClient configuration
#[derive(Debug, Default)]
pub struct ProxmoxClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    realm: Option<String>,
    secure: Option<bool>,
    accept_invalid_certs: bool,
    config: ClientConfig,
}

impl ProxmoxClientBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self.realm = Some(realm.into());
        self
    }

    /// Uses HTTPS when `true` (the default).
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Skips TLS certificate verification, for self-signed hypervisor certificates.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ProxmoxResult<ProxmoxClient> {
        let host = ProxmoxHost::new(self.host.ok_or_else(|| required("host"))?)?;
        let port = match self.port {
            Some(port) => ProxmoxPort::new(port)?,
            None => ProxmoxPort::default(),
        };
        let username = ProxmoxUsername::new(self.username.ok_or_else(|| required("username"))?)?;
        let password = ProxmoxPassword::new(self.password.ok_or_else(|| required("password"))?)?;
        let realm = match self.realm {
            Some(realm) => ProxmoxRealm::new(realm)?,
            None => ProxmoxRealm::default(),
        };
        let url = ProxmoxUrl::new(&host, port, self.secure.unwrap_or(true))?;

        let connection = ProxmoxConnection::new(
            host,
            port,
            username,
            password,
            realm,
            self.accept_invalid_certs,
            url,
        );

        Ok(ProxmoxClient {
            api_client: ApiClient::new(connection, self.config)?,
        })
    }
}

fn required(field: &str) -> ProxmoxError {
    ValidationError::Field {
        field: field.to_string(),
        message: format!("{} is required", field),
    }
    .into()
}

/// Splits `host[:port]`; bare IPv6 addresses are never split.
fn split_host_port(value: &str) -> ProxmoxResult<(&str, Option<u16>)> {
    let value = value
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if value.parse::<IpAddr>().is_ok() {
        return Ok((value, None));
    }
    if let Some(inner) = value.strip_prefix('[') {
        if let Some((addr, rest)) = inner.split_once(']') {
            let port = rest.strip_prefix(':').map(parse_port).transpose()?;
            return Ok((addr, port));
        }
    }
    match value.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(parse_port(port)?))),
        None => Ok((value, None)),
    }
}

fn parse_port(port: &str) -> ProxmoxResult<u16> {
    port.parse::<u16>().map_err(|_| {
        ValidationError::Field {
            field: "port".to_string(),
            message: format!("'{}' is not a valid port", port),
        }
        .into()
    })
}

impl ProxmoxClient {
    /// Creates a new builder for ProxmoxClient configuration
    pub fn builder() -> ProxmoxClientBuilder {
        ProxmoxClientBuilder::default()
    }

    /// Builds an unauthenticated client from the `proxmox` section of the configuration.
    pub fn from_config(section: &ProxmoxSection) -> ProxmoxResult<Self> {
        let (host, port) = split_host_port(&section.host)?;
        let (user, realm) = split_user_realm(&section.user);

        let mut builder = Self::builder()
            .host(host)
            .credentials(
                user,
                section.password.as_str(),
                realm.unwrap_or(DEFAULT_REALM),
            )
            .accept_invalid_certs(!section.verify_ssl)
            .config(ClientConfig {
                rate_limit: section.rate_limit.map(|rl| RateLimitConfig {
                    requests_per_second: rl.requests_per_second,
                    burst_size: rl.burst_size,
                }),
                ..Default::default()
            });
        if let Some(port) = port {
            builder = builder.port(port);
        }
        builder.build()
    }

    /// Builds a client from `section` and logs in.
    ///
    /// # Errors
    ///
    /// `ProxmoxError::Authentication` for rejected credentials and
    /// `ProxmoxError::Connection` for an unreachable host. Both are fatal for provisioning.
    pub async fn connect(section: &ProxmoxSection) -> ProxmoxResult<Self> {
        let client = Self::from_config(section)?;
        client.login().await?;
        info!(host = %section.host, user = %section.user, "connected to Proxmox");
        Ok(client)
    }

    /// Authenticates with the Proxmox server and stores the ticket for later requests.
    ///
    /// # Errors
    ///
    /// This method will return an error if:
    /// - The credentials are invalid
    /// - The server is unreachable
    /// - The response format is invalid
    pub async fn login(&self) -> ProxmoxResult<()> {
        self.api_client.login().await
    }

    /// Returns true if the client holds a non-expired ticket
    pub async fn is_authenticated(&self) -> bool {
        self.api_client.is_authenticated().await
    }

    pub fn connection(&self) -> &ProxmoxConnection {
        self.api_client.connection()
    }

    /// Lists the QEMU VMs on `node`.
    pub async fn vms(&self, node: &str) -> ProxmoxResult<Vec<VmListItem>> {
        self.api_client.get(&format!("nodes/{}/qemu", node)).await
    }

    /// Current configuration of a VM, including `unusedN` volumes.
    pub async fn vm_config(&self, node: &str, vmid: u32) -> ProxmoxResult<VmConfig> {
        self.api_client
            .get(&format!("nodes/{}/qemu/{}/config", node, vmid))
            .await
    }

    /// Submits a VM creation and returns its task id.
    pub async fn create_vm(&self, node: &str, params: &CreateVmParams) -> ProxmoxResult<Upid> {
        self.api_client
            .post(&format!("nodes/{}/qemu", node), params)
            .await
    }

    /// Starts importing a disk image into a VM's storage and returns the task id.
    pub async fn import_disk(
        &self,
        node: &str,
        vmid: u32,
        params: &ImportDiskParams,
    ) -> ProxmoxResult<Upid> {
        self.api_client
            .post(&format!("nodes/{}/qemu/{}/importdisk", node, vmid), params)
            .await
    }

    /// Synchronously updates VM options such as tags.
    pub async fn update_vm_config(
        &self,
        node: &str,
        vmid: u32,
        params: &UpdateVmConfigParams,
    ) -> ProxmoxResult<()> {
        let _: serde_json::Value = self
            .api_client
            .put(&format!("nodes/{}/qemu/{}/config", node, vmid), params)
            .await?;
        Ok(())
    }

    pub async fn task_status(&self, node: &str, upid: &Upid) -> ProxmoxResult<TaskStatus> {
        self.api_client
            .get(&format!("nodes/{}/tasks/{}/status", node, upid))
            .await
    }
}
