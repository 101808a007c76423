use crate::core::domain::error::ValidationError;

/// A validated Proxmox user name, without the `@realm` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxUsername(String);

impl ProxmoxUsername {
    pub fn new(username: impl Into<String>) -> Result<Self, ValidationError> {
        let username = username.into();
        validate_username(&username)?;
        Ok(Self(username))
    }

    /// Creates a new username without validation.
    #[allow(unused)]
    pub(crate) fn new_unchecked(username: String) -> Self {
        Self(username)
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Splits a `user@realm` login into its user and realm parts.
///
/// The split happens at the last `@`, so user names that are e-mail addresses keep
/// their own `@`. Returns `None` as realm when no `@` is present.
pub(crate) fn split_user_realm(login: &str) -> (&str, Option<&str>) {
    match login.rsplit_once('@') {
        Some((user, realm)) => (user, Some(realm)),
        None => (login, None),
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Field {
            field: "username".to_string(),
            message: "Username cannot be empty".to_string(),
        });
    }
    if username.len() > 64 {
        return Err(ValidationError::Format(format!(
            "Username cannot exceed 64 characters (got {})",
            username.len()
        )));
    }
    let allowed =
        |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '@';
    if !username.chars().all(allowed) {
        return Err(ValidationError::Format(
            "Username contains invalid characters. Allowed: alphanumeric, -, _, ., @".to_string(),
        ));
    }
    Ok(())
}
