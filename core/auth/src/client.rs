//! HTTP transport bound to a credential.

use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use driveup_common::{Credential, Error, Result};

use crate::config::ClientConfig;
use crate::oauth::TokenEndpoint;

/// Where the bound credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from the credential cache.
    Cache,
    /// Obtained through the web authorization flow.
    Web,
}

/// An HTTP client together with the credential that authorizes its requests.
///
/// An expired access token is refreshed in memory through the token endpoint
/// when the credential carries a refresh token. Refreshed credentials are not
/// written back to the cache.
pub struct AuthorizedClient {
    http: Client,
    config: ClientConfig,
    endpoint: Arc<dyn TokenEndpoint>,
    credential: RwLock<Credential>,
    source: CredentialSource,
}

impl AuthorizedClient {
    /// Bind `credential` to a new HTTP client.
    pub fn new(
        credential: Credential,
        source: CredentialSource,
        config: ClientConfig,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("driveup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            endpoint,
            credential: RwLock::new(credential),
            source,
        })
    }

    /// The underlying HTTP transport.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Where the credential came from.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Snapshot of the current credential.
    pub async fn credential(&self) -> Credential {
        self.credential.read().await.clone()
    }

    /// `Authorization` header value, refreshing the access token if needed.
    ///
    /// # Errors
    /// - `Authentication` if the token is expired and cannot be refreshed
    /// - `ExchangeRejected` or `Transport` if the refresh fails
    pub async fn authorization_header(&self) -> Result<String> {
        let credential = self.credential.read().await;

        if credential.is_valid() {
            return Ok(credential.authorization_header());
        }

        drop(credential);

        let mut credential = self.credential.write().await;

        // Another caller may have refreshed while we waited for the write lock
        if credential.is_valid() {
            return Ok(credential.authorization_header());
        }

        if credential.refresh_token.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Authentication(
                "Access token expired and no refresh token is available".to_string(),
            ));
        }

        tracing::info!("Refreshing expired access token");
        let refreshed = self.endpoint.refresh(&self.config, &credential).await?;
        *credential = refreshed;

        Ok(credential.authorization_header())
    }
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("client_id", &self.config.client_id)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
