use crate::core::domain::error::ValidationError;

/// A Proxmox authentication ticket, sent back as the `PVEAuthCookie` cookie.
#[derive(Debug, Clone)]
pub struct ProxmoxTicket(String);

impl ProxmoxTicket {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_ticket(&value)?;
        Ok(Self(value))
    }

    /// Creates a new ticket without validation.
    #[allow(unused)]
    pub(crate) fn new_unchecked(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Formats the ticket as a cookie header value.
    #[must_use]
    pub fn as_cookie_header(&self) -> String {
        format!("PVEAuthCookie={}", self.0)
    }
}

/// Validates the format of a ticket string (`PVE:<user>@<realm>:<hex>::<signature>`).
pub(crate) fn validate_ticket(ticket: &str) -> Result<(), ValidationError> {
    if ticket.is_empty() {
        return Err(ValidationError::Field {
            field: "ticket".to_string(),
            message: "Ticket cannot be empty".to_string(),
        });
    }
    let parts: Vec<&str> = ticket.split(':').collect();
    if parts.len() < 5 || parts[0] != "PVE" {
        return Err(ValidationError::Format(
            "Invalid ticket format: must start with 'PVE:' and have at least 5 parts".to_string(),
        ));
    }
    Ok(())
}
