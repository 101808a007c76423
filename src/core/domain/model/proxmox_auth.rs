use crate::core::domain::value_object::{ProxmoxCSRFToken, ProxmoxTicket};
use std::time::{Duration, Instant};

/// Authentication state obtained from `/access/ticket`.
#[derive(Debug, Clone)]
pub struct ProxmoxAuth {
    ticket: ProxmoxTicket,
    csrf_token: Option<ProxmoxCSRFToken>,
    issued_at: Instant,
}

impl ProxmoxAuth {
    pub fn new(ticket: ProxmoxTicket, csrf_token: Option<ProxmoxCSRFToken>) -> Self {
        Self {
            ticket,
            csrf_token,
            issued_at: Instant::now(),
        }
    }

    pub fn ticket(&self) -> &ProxmoxTicket {
        &self.ticket
    }

    pub fn csrf_token(&self) -> Option<&ProxmoxCSRFToken> {
        self.csrf_token.as_ref()
    }

    /// Tickets are valid for a fixed lifetime after issue (two hours on stock Proxmox).
    pub fn is_expired(&self, lifetime: Duration) -> bool {
        self.issued_at.elapsed() > lifetime
    }
}
