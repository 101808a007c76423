mod proxmox_csrf_token;
mod proxmox_host;
mod proxmox_password;
mod proxmox_port;
mod proxmox_realm;
mod proxmox_ticket;
mod proxmox_url;
mod proxmox_username;
mod upid;

pub use proxmox_csrf_token::ProxmoxCSRFToken;
pub use proxmox_host::ProxmoxHost;
pub use proxmox_password::ProxmoxPassword;
pub use proxmox_port::ProxmoxPort;
pub use proxmox_realm::ProxmoxRealm;
pub use proxmox_ticket::ProxmoxTicket;
pub use proxmox_url::ProxmoxUrl;
pub use proxmox_username::ProxmoxUsername;
pub use upid::Upid;

pub(crate) use proxmox_username::split_user_realm;
pub(crate) use proxmox_realm::DEFAULT_REALM;
