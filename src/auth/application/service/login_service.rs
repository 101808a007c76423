use crate::{
    auth::application::{
        request::login_request::LoginRequest, response::login_response::LoginResponse,
    },
    core::domain::{
        error::{ProxmoxError, ProxmoxResult, ValidationError},
        model::{proxmox_auth::ProxmoxAuth, proxmox_connection::ProxmoxConnection},
        value_object::{ProxmoxCSRFToken, ProxmoxTicket},
    },
};

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use tracing::debug;

/// Exchanges username/password for a ticket and CSRF token.
pub struct LoginService {
    default_headers: HeaderMap,
}

impl LoginService {
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self { default_headers }
    }

    pub async fn execute(
        &self,
        http_client: &Client,
        connection: &ProxmoxConnection,
    ) -> ProxmoxResult<ProxmoxAuth> {
        let url = connection.url().api_endpoint("access/ticket");
        let request = LoginRequest {
            username: connection.username().as_str().to_string(),
            password: connection.password().as_str().to_string(),
            realm: connection.realm().as_str().to_string(),
        };
        debug!(
            user = connection.username().as_str(),
            realm = connection.realm().as_str(),
            "requesting ticket"
        );

        let response = http_client
            .post(&url)
            .headers(self.default_headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProxmoxError::Connection(e.to_string()))?;

        match response.status() {
            StatusCode::OK => self.handle_successful_login(response).await,
            StatusCode::UNAUTHORIZED => Err(ProxmoxError::Authentication(
                "Invalid credentials provided".to_string(),
            )),
            StatusCode::BAD_REQUEST => Err(ValidationError::Field {
                field: "request".to_string(),
                message: "Invalid request format".to_string(),
            }
            .into()),
            StatusCode::NOT_FOUND => Err(ProxmoxError::Connection(
                "Login endpoint not found".to_string(),
            )),
            StatusCode::SERVICE_UNAVAILABLE => Err(ProxmoxError::Connection(
                "Proxmox service is currently unavailable".to_string(),
            )),
            status => Err(ProxmoxError::Connection(format!(
                "Unexpected response status: {}",
                status
            ))),
        }
    }

    async fn handle_successful_login(
        &self,
        response: reqwest::Response,
    ) -> ProxmoxResult<ProxmoxAuth> {
        let login_response = response.json::<LoginResponse>().await.map_err(|e| {
            ProxmoxError::Connection(format!("Failed to parse login response: {}", e))
        })?;

        let ticket = ProxmoxTicket::new(login_response.data.ticket)?;
        let csrf_token = login_response
            .data
            .csrf_token
            .map(ProxmoxCSRFToken::new)
            .transpose()?;

        Ok(ProxmoxAuth::new(ticket, csrf_token))
    }
}

impl Default for LoginService {
    fn default() -> Self {
        Self::new()
    }
}
