use crate::config::domain::model::{
    app_config::{AppConfig, ProxmoxSection, SshSection, StorageSection},
    vm_spec::VmSpec,
};
use crate::core::domain::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info};

/// Shape of the file before the required sections are checked.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    proxmox: Option<ProxmoxSection>,
    #[serde(default)]
    storage: Option<StorageSection>,
    #[serde(default)]
    sshcfg: Option<SshSection>,
    #[serde(default)]
    vms: Option<Vec<VmSpec>>,
}

/// Reads and validates the YAML configuration file.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, failing when the file is unreadable, malformed, lacks one of the
    /// `proxmox`, `storage` or `vms` sections, or has a VM without id/name/memory/cores.
    pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let config = Self::parse(&text)?;
        info!(path = %path.display(), vms = config.vms.len(), "configuration loaded");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<AppConfig, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text)?;

        let proxmox = raw.proxmox.ok_or(ConfigError::MissingSection("proxmox"))?;
        let storage = raw.storage.ok_or(ConfigError::MissingSection("storage"))?;
        let vms = raw.vms.ok_or(ConfigError::MissingSection("vms"))?;

        if let Some(vm) = vms.iter().find(|vm| !vm.missing_fields().is_empty()) {
            let fields = vm.missing_fields();
            error!(vm = vm.display_name(), ?fields, "VM configuration missing required fields");
            return Err(ConfigError::MissingVmField {
                vm: vm.display_name().to_string(),
                fields,
            });
        }

        Ok(AppConfig {
            proxmox,
            storage,
            sshcfg: raw.sshcfg,
            vms,
        })
    }
}
