//! Domain models for QEMU virtual machine operations.
//!
//! This module defines the structures used when interacting with VMs via the Proxmox API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A virtual machine as returned by the `/nodes/{node}/qemu` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VmListItem {
    /// The VM identifier (unique per cluster).
    pub vmid: u32,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Current status (e.g., "running", "stopped").
    #[serde(default)]
    pub status: String,
    /// Maximum memory in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxmem: Option<u64>,
    /// Number of virtual CPUs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    /// Semicolon separated tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Raw VM configuration from `/nodes/{node}/qemu/{vmid}/config`.
///
/// Device keys (`scsi0`, `net0`, `unused0`, ...) vary per VM, so the config is kept as
/// a sorted map instead of a fixed struct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VmConfig(pub BTreeMap<String, Value>);

impl VmConfig {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Volume of the lowest-numbered `unusedN` entry, i.e. a disk that was imported or
    /// detached but not yet attached to a bus.
    pub fn first_unused_volume(&self) -> Option<&str> {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                let index = key.strip_prefix("unused")?.parse::<u32>().ok()?;
                Some((index, value.as_str()?))
            })
            .min_by_key(|(index, _)| *index)
            .map(|(_, volume)| volume)
    }
}

/// Parameters for `POST /nodes/{node}/qemu`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CreateVmParams {
    /// VM identifier (required, must be unique in the cluster).
    pub vmid: u32,
    pub name: String,
    /// Memory in MB.
    pub memory: u32,
    /// Number of cores per socket.
    pub cores: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sockets: Option<u32>,
    /// OS type (e.g., "l26", "win11").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ostype: Option<String>,
    /// SCSI controller model (e.g., "virtio-scsi-single").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scsihw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acpi: Option<u8>,
    /// CD-ROM drive, e.g. "local:iso/debian-12.iso,media=cdrom".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ide2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scsi0: Option<String>,
    pub net0: String,
    /// Boot order, e.g. "order=scsi0,ide2".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciuser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipassword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sshkeys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipconfig0: Option<String>,
}

impl CreateVmParams {
    /// Pretty JSON of the parameters with the cloud-init password masked.
    pub fn to_log_string(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(password) = value.get_mut("cipassword") {
            *password = Value::String("****".to_string());
        }
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }
}

/// Parameters for `POST /nodes/{node}/qemu/{vmid}/importdisk`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDiskParams {
    /// Path of the image on the hypervisor host.
    pub filename: String,
    /// Target storage for the imported volume.
    pub storage: String,
}

/// Parameters for `PUT /nodes/{node}/qemu/{vmid}/config`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UpdateVmConfigParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}
