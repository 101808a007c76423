use crate::core::domain::{
    error::ValidationError,
    value_object::{ProxmoxHost, ProxmoxPort},
};
use url::Url;

/// Base URL of a Proxmox API endpoint, e.g. `https://pve1:8006/`.
///
/// Request paths are resolved below `/api2/json/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxUrl(Url);

impl ProxmoxUrl {
    pub fn new(host: &ProxmoxHost, port: ProxmoxPort, secure: bool) -> Result<Self, ValidationError> {
        let scheme = if secure { "https" } else { "http" };
        Self::parse(&format!("{}://{}:{}/", scheme, host.authority(), port.get()))
    }

    /// Parses an explicit base URL. Only `http` and `https` are accepted.
    pub fn parse(base: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(base)
            .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(ValidationError::ConstraintViolation(format!(
                "Invalid scheme '{}'. Must be one of: http, https",
                other
            ))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Full URL of an API resource such as `nodes/pve1/qemu`.
    pub fn api_endpoint(&self, path: &str) -> String {
        format!(
            "{}/api2/json/{}",
            self.0.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
