//! Tunables for the API client that do not belong to a single connection.

use std::time::Duration;

/// Token-bucket limit applied to every API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Client-wide settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a login ticket is trusted before a fresh login is forced.
    pub ticket_lifetime: Duration,
    /// Optional request rate limit; `None` disables limiting.
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            // Proxmox tickets expire after two hours; refresh a little earlier.
            ticket_lifetime: Duration::from_secs(2 * 60 * 60 - 5 * 60),
            rate_limit: None,
        }
    }
}
