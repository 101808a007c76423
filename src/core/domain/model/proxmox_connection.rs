use crate::core::domain::value_object::{
    ProxmoxHost, ProxmoxPassword, ProxmoxPort, ProxmoxRealm, ProxmoxUrl, ProxmoxUsername,
};

/// Everything needed to reach and authenticate against one Proxmox API endpoint.
#[derive(Debug, Clone)]
pub struct ProxmoxConnection {
    host: ProxmoxHost,
    port: ProxmoxPort,
    username: ProxmoxUsername,
    password: ProxmoxPassword,
    realm: ProxmoxRealm,
    accept_invalid_certs: bool,
    url: ProxmoxUrl,
}

impl ProxmoxConnection {
    pub fn new(
        host: ProxmoxHost,
        port: ProxmoxPort,
        username: ProxmoxUsername,
        password: ProxmoxPassword,
        realm: ProxmoxRealm,
        accept_invalid_certs: bool,
        url: ProxmoxUrl,
    ) -> Self {
        Self {
            host,
            port,
            username,
            password,
            realm,
            accept_invalid_certs,
            url,
        }
    }

    pub fn host(&self) -> &ProxmoxHost {
        &self.host
    }

    pub fn port(&self) -> ProxmoxPort {
        self.port
    }

    pub fn username(&self) -> &ProxmoxUsername {
        &self.username
    }

    pub fn password(&self) -> &ProxmoxPassword {
        &self.password
    }

    pub fn realm(&self) -> &ProxmoxRealm {
        &self.realm
    }

    /// `true` when TLS certificate verification is disabled (`verify_ssl: false`).
    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub fn url(&self) -> &ProxmoxUrl {
        &self.url
    }
}
