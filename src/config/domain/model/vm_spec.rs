//! Declarative description of one VM as written in the `vms` list.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Fields every VM entry must carry.
pub const REQUIRED_VM_FIELDS: [&str; 4] = ["id", "name", "memory", "cores"];

/// One entry of the `vms` list.
///
/// The required fields are optional at the type level so that an incomplete entry can
/// be reported with every missing field named instead of failing on the first one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VmSpec {
    pub id: Option<u32>,
    pub name: Option<String>,
    /// Memory in MB.
    pub memory: Option<u32>,
    pub cores: Option<u32>,
    #[serde(default)]
    pub sockets: Option<u32>,
    #[serde(default)]
    pub ostype: Option<String>,
    #[serde(default)]
    pub scsihw: Option<String>,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub acpi: Option<Flag>,
    /// CD-ROM device, e.g. `local:iso/debian.iso,media=cdrom`.
    #[serde(default)]
    pub ide2: Option<String>,
    #[serde(default)]
    pub scsi0: Option<String>,
    #[serde(default)]
    pub net0: Option<String>,
    /// Raw boot string; replaced when `boot_order` is set.
    #[serde(default)]
    pub boot: Option<String>,
    #[serde(default)]
    pub boot_order: Option<Vec<String>>,
    #[serde(default)]
    pub disk: Option<DiskSpec>,
    /// Set to `false` to keep a `ci` block in the file without applying it.
    #[serde(default)]
    pub cloud_init: Option<bool>,
    #[serde(default)]
    pub ci: Option<CloudInitSpec>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl VmSpec {
    /// Names of required fields that are absent, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = [
            self.id.is_some(),
            self.name.is_some(),
            self.memory.is_some(),
            self.cores.is_some(),
        ];
        REQUIRED_VM_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(field, _)| *field)
            .collect()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Cloud-init block to apply, if any.
    pub fn effective_cloud_init(&self) -> Option<&CloudInitSpec> {
        match self.cloud_init {
            Some(false) => None,
            _ => self.ci.as_ref(),
        }
    }
}

impl fmt::Display for VmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} (ID: {})", self.display_name(), id),
            None => write!(f, "{} (ID: ?)", self.display_name()),
        }
    }
}

/// Boolean option that Proxmox expects as `0`/`1`; YAML may spell it either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    pub fn as_api(self) -> u8 {
        match self {
            Flag::Bool(value) => u8::from(value),
            Flag::Int(value) => u8::from(value != 0),
        }
    }
}

/// Where the VM's primary disk comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DiskSpec {
    /// Import a local image file into `storage` (or the default storage).
    Import {
        import_img: PathBuf,
        #[serde(default)]
        storage: Option<String>,
    },
    /// Attach an existing or freshly allocated volume, e.g. `local-lvm:32`.
    Volume { scsi0: String },
}

/// Cloud-init settings, mapped onto `ciuser`, `cipassword`, `sshkeys` and `ipconfig0`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CloudInitSpec {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ssh_key: Option<String>,
    #[serde(default)]
    pub ip_config: Option<String>,
}
