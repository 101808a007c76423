use crate::core::domain::error::ValidationError;
use serde::Deserialize;
use std::fmt;

/// A Proxmox or SSH password. Never printed by `Debug`.
#[derive(Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct ProxmoxPassword(String);

impl ProxmoxPassword {
    pub fn new(password: impl Into<String>) -> Result<Self, ValidationError> {
        let password = password.into();
        validate_password(&password)?;
        Ok(Self(password))
    }

    /// Creates a new password without validation.
    #[allow(unused)]
    pub(crate) fn new_unchecked(password: String) -> Self {
        Self(password)
    }

    /// Returns the password as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProxmoxPassword {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Debug for ProxmoxPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProxmoxPassword(****)")
    }
}

pub(crate) fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Field {
            field: "password".to_string(),
            message: "Password cannot be empty".to_string(),
        });
    }
    if password.len() > 128 {
        return Err(ValidationError::Format(
            "Password cannot exceed 128 characters".to_string(),
        ));
    }
    Ok(())
}
