//! OAuth2 token endpoint access.
//!
//! Authorization URL construction, code exchange and refresh go through the
//! `oauth2` crate. The endpoint sits behind [`TokenEndpoint`] so the flow can
//! be driven without a network.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse, BasicTokenType};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};
use std::error::Error as _;

use driveup_common::{Credential, Error, Result};

use crate::config::ClientConfig;

/// Client with the authorization and token endpoints configured.
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Remote token-issuing endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code for a credential.
    ///
    /// # Errors
    /// - `ExchangeRejected` if the endpoint declines the code
    /// - `Transport` on network or response parsing failure
    async fn exchange_code(&self, config: &ClientConfig, code: &str) -> Result<Credential>;

    /// Mint a new access token from the credential's refresh token.
    ///
    /// The refresh token is kept when the response does not carry a new one.
    async fn refresh(&self, config: &ClientConfig, credential: &Credential) -> Result<Credential>;
}

/// Build the URL the operator visits to grant access.
///
/// The URL carries the configured scopes, the fixed `state_token` and
/// requests offline access so a refresh token is issued.
pub fn authorization_url(config: &ClientConfig, state_token: &str) -> Result<String> {
    let client = oauth_client(config)?;
    let state = state_token.to_string();

    let (url, _state) = client
        .authorize_url(move || CsrfToken::new(state))
        .add_scopes(config.scopes.iter().cloned().map(Scope::new))
        .add_extra_param("access_type", "offline")
        .url();

    Ok(url.to_string())
}

/// Token endpoint backed by the `oauth2` crate.
pub struct OAuthEndpoint {
    http: oauth2::reqwest::Client,
}

impl OAuthEndpoint {
    /// Create an endpoint with its own HTTP client.
    pub fn new() -> Result<Self> {
        // Redirects are disabled to keep the token exchange on the configured host.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create OAuth HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl TokenEndpoint for OAuthEndpoint {
    async fn exchange_code(&self, config: &ClientConfig, code: &str) -> Result<Credential> {
        let client = oauth_client(config)?;

        let response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| token_error("Token exchange", e))?;

        Ok(credential_from_response(&response, None))
    }

    async fn refresh(&self, config: &ClientConfig, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication("No refresh token available".to_string()))?;

        let client = oauth_client(config)?;

        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| token_error("Token refresh", e))?;

        Ok(credential_from_response(&response, Some(refresh_token)))
    }
}

fn oauth_client(config: &ClientConfig) -> Result<ConfiguredClient> {
    let client = BasicClient::new(ClientId::new(config.client_id.clone()))
        .set_client_secret(ClientSecret::new(config.client_secret.clone()))
        .set_auth_uri(
            AuthUrl::new(config.auth_url.clone())
                .map_err(|e| Error::Config(format!("Invalid auth URL: {}", e)))?,
        )
        .set_token_uri(
            TokenUrl::new(config.token_url.clone())
                .map_err(|e| Error::Config(format!("Invalid token URL: {}", e)))?,
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone())
                .map_err(|e| Error::Config(format!("Invalid redirect URL: {}", e)))?,
        );

    Ok(client)
}

fn credential_from_response(
    response: &BasicTokenResponse,
    previous_refresh_token: Option<&str>,
) -> Credential {
    let token_type = match response.token_type() {
        BasicTokenType::Bearer => "Bearer".to_string(),
        BasicTokenType::Mac => "MAC".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
    };

    // A lifetime past the representable range is kept as no expiry.
    let expiry = response
        .expires_in()
        .and_then(|d| Duration::from_std(d).ok())
        .and_then(|d| Utc::now().checked_add_signed(d));

    let refresh_token = response
        .refresh_token()
        .map(|t| t.secret().clone())
        .or_else(|| previous_refresh_token.map(str::to_string));

    Credential {
        access_token: response.access_token().secret().clone(),
        token_type,
        refresh_token,
        expiry,
    }
}

type TokenRequestError =
    RequestTokenError<HttpClientError<oauth2::reqwest::Error>, BasicErrorResponse>;

fn token_error(action: &str, err: TokenRequestError) -> Error {
    match err {
        RequestTokenError::ServerResponse(response) => {
            Error::ExchangeRejected(format!("{} rejected: {}", action, response))
        }
        RequestTokenError::Request(e) => {
            let detail = e
                .source()
                .map(|s| s.to_string())
                .unwrap_or_else(|| e.to_string());
            Error::Transport(format!("{} failed: {}", action, detail))
        }
        RequestTokenError::Parse(e, _) => {
            Error::Transport(format!("{} returned an invalid response: {}", action, e))
        }
        RequestTokenError::Other(message) => {
            Error::Transport(format!("{} failed: {}", action, message))
        }
    }
}
