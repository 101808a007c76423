//! Top-level sections of the YAML configuration file.

use crate::config::domain::model::vm_spec::VmSpec;
use crate::core::domain::value_object::ProxmoxPassword;
use serde::Deserialize;
use std::path::PathBuf;

/// Default SSH port of the hypervisor host.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Default local directory holding images to push.
pub const DEFAULT_LOCAL_IMAGE_DIR: &str = "./images";
/// Default image directory on the hypervisor.
pub const DEFAULT_REMOTE_IMAGE_DIR: &str = "/var/lib/vz/images/install";
/// Default task polling timeout in seconds.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

/// Validated configuration: the three required sections plus the optional `sshcfg`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub proxmox: ProxmoxSection,
    pub storage: StorageSection,
    pub sshcfg: Option<SshSection>,
    pub vms: Vec<VmSpec>,
}

/// Connection settings for the Proxmox API.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxmoxSection {
    /// Host name or address, optionally with `:port` (default 8006).
    pub host: String,
    /// Login in `user@realm` form; the realm defaults to `pam`.
    pub user: String,
    pub password: ProxmoxPassword,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    /// Node that receives the new VMs.
    pub node: String,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSection>,
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitSection {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Storage used for imported disks unless a VM overrides it.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub name: String,
}

/// SSH/SFTP settings for the image sync step.
#[derive(Debug, Clone, Deserialize)]
pub struct SshSection {
    pub host: String,
    pub user: String,
    pub password: ProxmoxPassword,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_local_image")]
    pub local_image: PathBuf,
    #[serde(default = "default_remote_image")]
    pub remote_image: String,
}

fn default_verify_ssl() -> bool {
    true
}

fn default_task_timeout_secs() -> u64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_local_image() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_IMAGE_DIR)
}

fn default_remote_image() -> String {
    DEFAULT_REMOTE_IMAGE_DIR.to_string()
}
