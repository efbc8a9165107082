//! OAuth2 credential acquisition and caching for Google Drive.
//!
//! A credential is looked up in a file cache first. When the cache is empty,
//! corrupt or holds an unusable credential, the operator is sent through the
//! authorization-code flow and the resulting credential is cached for later
//! runs.
//!
//! - [`CredentialStore`]: the on-disk cache
//! - [`WebAuthorizer`]: the interactive authorization-code exchange
//! - [`AuthorizationCoordinator`]: the state machine tying them together

pub mod client;
pub mod config;
pub mod coordinator;
pub mod oauth;
pub mod store;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use driveup_common::Result;

pub use client::{AuthorizedClient, CredentialSource};
pub use config::{AuthSettings, ClientConfig, DRIVE_FILE_SCOPE};
pub use coordinator::{AuthState, AuthorizationCoordinator};
pub use oauth::{authorization_url, OAuthEndpoint, TokenEndpoint};
pub use store::CredentialStore;
pub use web::{Authorizer, CodeSource, ConsolePrompt, WebAuthorizer};

/// Obtain an authorized client, prompting on the console if the cache cannot
/// supply a credential.
pub async fn authorize(config: &ClientConfig, settings: &AuthSettings) -> Result<AuthorizedClient> {
    let endpoint: Arc<dyn TokenEndpoint> = Arc::new(OAuthEndpoint::new()?);
    let authorizer = WebAuthorizer::new(
        ConsolePrompt::stdio(settings.open_browser),
        endpoint.clone(),
        settings.state_token.clone(),
    );

    let mut coordinator =
        AuthorizationCoordinator::new(CredentialStore::from_settings(settings), authorizer, endpoint);
    coordinator.authorize(config).await
}
