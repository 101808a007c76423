//! Internal HTTP client that handles authentication and automatic ticket refresh.

use crate::{
    auth::application::service::login_service::LoginService,
    core::domain::{
        error::{ProxmoxError, ProxmoxResult, ValidationError},
        model::{client_config::ClientConfig, proxmox_auth::ProxmoxAuth, proxmox_connection::ProxmoxConnection},
    },
};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Every Proxmox API response wraps its payload in a `data` field.
#[derive(Deserialize)]
struct ApiResponse<T> {
    data: T,
}

/// Internal HTTP client that manages authentication and provides methods to call the Proxmox API.
///
/// This client adds the `PVEAuthCookie` cookie and `CSRFPreventionToken` header to each
/// request. A request answered with `401 Unauthorized` triggers one fresh login and one
/// retry; a second 401 is reported as an error.
#[derive(Debug)]
pub struct ApiClient {
    http_client: Client,
    connection: Arc<ProxmoxConnection>,
    auth: Arc<RwLock<Option<ProxmoxAuth>>>,
    config: Arc<ClientConfig>,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl ApiClient {
    /// Creates a new `ApiClient`. The client starts unauthenticated.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Connection` if the HTTP client cannot be built and
    /// `ProxmoxError::Validation` for a rate limit with zero capacity.
    pub fn new(connection: ProxmoxConnection, config: ClientConfig) -> ProxmoxResult<Self> {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(connection.accept_invalid_certs())
            .build()
            .map_err(|e| ProxmoxError::Connection(e.to_string()))?;

        let rate_limiter = match config.rate_limit {
            Some(rl) => {
                let per_second = non_zero("rate_limit.requests_per_second", rl.requests_per_second)?;
                let burst = non_zero("rate_limit.burst_size", rl.burst_size)?;
                let quota = Quota::per_second(per_second).allow_burst(burst);
                Some(Arc::new(DefaultDirectRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            http_client,
            connection: Arc::new(connection),
            auth: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
            rate_limiter,
        })
    }

    /// Returns a reference to the underlying connection details.
    pub fn connection(&self) -> &ProxmoxConnection {
        &self.connection
    }

    /// Sets the authentication state (used after a successful login).
    pub async fn set_auth(&self, auth: ProxmoxAuth) {
        *self.auth.write().await = Some(auth);
    }

    /// Returns the current authentication state, if any.
    pub async fn auth(&self) -> Option<ProxmoxAuth> {
        self.auth.read().await.clone()
    }

    /// Returns `true` if there is a valid (non-expired) ticket.
    pub async fn is_authenticated(&self) -> bool {
        self.auth
            .read()
            .await
            .as_ref()
            .is_some_and(|a| !a.is_expired(self.config.ticket_lifetime))
    }

    /// Performs a fresh login using the stored credentials to obtain a new ticket.
    pub async fn login(&self) -> ProxmoxResult<()> {
        let auth = LoginService::new().execute(&self.http_client, &self.connection).await?;
        self.set_auth(auth).await;
        Ok(())
    }

    /// Performs an authenticated GET request and returns the `data` payload.
    pub async fn get<T>(&self, path: &str) -> ProxmoxResult<T>
    where
        T: DeserializeOwned,
    {
        self.execute_request(Method::GET, path, None::<&()>).await
    }

    /// Performs an authenticated POST request with a JSON body.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ProxmoxResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.execute_request(Method::POST, path, Some(body)).await
    }

    /// Performs an authenticated PUT request with a JSON body.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> ProxmoxResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.execute_request(Method::PUT, path, Some(body)).await
    }

    /// Ensures authentication, sends the request, handles 401 by logging in again once,
    /// and unwraps the response envelope.
    async fn execute_request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ProxmoxResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        if !self.is_authenticated().await {
            self.login().await?;
        }

        let mut response = self.send(method.clone(), path, body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "ticket rejected, logging in again");
            self.login().await?;
            response = self.send(method, path, body).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or_default().to_string();
            let text = response.text().await.unwrap_or_default();
            let message = if text.trim().is_empty() || text.trim() == "null" {
                reason
            } else {
                text
            };
            return Err(ProxmoxError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| ProxmoxError::Connection(format!("Failed to parse response: {}", e)))
    }

    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> ProxmoxResult<Response>
    where
        B: Serialize,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = self.connection.url().api_endpoint(path);
        debug!(%method, %url, "api request");
        let mut req_builder = self.http_client.request(method, &url);

        if let Some(auth) = self.auth.read().await.as_ref() {
            req_builder = req_builder.header("Cookie", auth.ticket().as_cookie_header());
            if let Some(csrf) = auth.csrf_token() {
                req_builder = req_builder.header("CSRFPreventionToken", csrf.as_str());
            }
        }

        if let Some(body) = body {
            req_builder = req_builder.json(body);
        }

        req_builder
            .send()
            .await
            .map_err(|e| ProxmoxError::Connection(format!("HTTP request failed: {}", e)))
    }
}

fn non_zero(field: &str, value: u32) -> ProxmoxResult<NonZeroU32> {
    NonZeroU32::new(value).ok_or_else(|| {
        ValidationError::Field {
            field: field.to_string(),
            message: "must be greater than zero".to_string(),
        }
        .into()
    })
}
