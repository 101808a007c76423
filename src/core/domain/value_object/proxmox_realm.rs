use crate::core::domain::error::ValidationError;

/// Realm used when a login carries no `@realm` suffix.
pub(crate) const DEFAULT_REALM: &str = "pam";

/// A validated Proxmox authentication realm (`pam`, `pve`, or a configured LDAP/AD realm).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxRealm(String);

impl ProxmoxRealm {
    pub fn new(realm: impl Into<String>) -> Result<Self, ValidationError> {
        let realm = realm.into();
        validate_realm(&realm)?;
        Ok(Self(realm))
    }

    /// Creates a new realm without validation.
    #[allow(unused)]
    pub(crate) fn new_unchecked(realm: String) -> Self {
        Self(realm)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProxmoxRealm {
    fn default() -> Self {
        Self(DEFAULT_REALM.to_string())
    }
}

pub(crate) fn validate_realm(realm: &str) -> Result<(), ValidationError> {
    if realm.is_empty() {
        return Err(ValidationError::Field {
            field: "realm".to_string(),
            message: "Realm cannot be empty".to_string(),
        });
    }
    if realm.len() < 2 || realm.len() > 32 {
        return Err(ValidationError::Format(
            "Realm length must be between 2 and 32 characters".to_string(),
        ));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !realm.chars().all(allowed) || !realm.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(ValidationError::Format(
            "Realm must start with a letter and contain only alphanumerics, '-' or '_'"
                .to_string(),
        ));
    }
    Ok(())
}
