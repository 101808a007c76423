use crate::core::domain::error::ValidationError;

/// A Proxmox CSRF protection token, required on every write request.
#[derive(Debug, Clone)]
pub struct ProxmoxCSRFToken(String);

impl ProxmoxCSRFToken {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_csrf_token(&value)?;
        Ok(Self(value))
    }

    /// Creates a new CSRF token without validation.
    #[allow(unused)]
    pub(crate) fn new_unchecked(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validates the `TOKENID:VALUE` shape of a CSRF token, where TOKENID is 8 hex digits.
pub(crate) fn validate_csrf_token(token: &str) -> Result<(), ValidationError> {
    if token.is_empty() {
        return Err(ValidationError::Field {
            field: "csrf_token".to_string(),
            message: "CSRF token cannot be empty".to_string(),
        });
    }
    let Some((id, value)) = token.split_once(':') else {
        return Err(ValidationError::Format(
            "CSRF token must be in format TOKENID:VALUE".to_string(),
        ));
    };
    if id.len() != 8 || !id.chars().all(|c| c.is_ascii_hexdigit()) || value.is_empty() {
        return Err(ValidationError::Format(
            "Token ID must be 8 hexadecimal characters followed by a value".to_string(),
        ));
    }
    Ok(())
}
