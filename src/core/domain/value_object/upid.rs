use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Unique process id of an asynchronous Proxmox task.
///
/// Looks like `UPID:pve1:000A1B2C:01F2E3D4:65A0B1C2:qmcreate:100:root@pam:`. The value is
/// opaque to this crate apart from the `UPID:<node>:` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upid(String);

impl Upid {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let mut parts = value.split(':');
        match (parts.next(), parts.next()) {
            (Some("UPID"), Some(node)) if !node.is_empty() => Ok(Self(value)),
            _ => Err(ValidationError::Format(format!(
                "Invalid task id '{}': expected 'UPID:<node>:...'",
                value
            ))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Node that runs the task.
    pub fn node(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Upid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Upid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Upid::new(raw).map_err(serde::de::Error::custom)
    }
}
