pub mod client_config;
pub mod proxmox_auth;
pub mod proxmox_connection;
pub mod task;
pub mod vm;
