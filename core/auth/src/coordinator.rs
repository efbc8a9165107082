//! Credential acquisition state machine.
//!
//! ```text
//! Uninitialized → Checking → CachedValid ───────────────→ Ready
//!                          ↘ NeedsWebAuth → Persisted ↗
//! ```
//!
//! A missing, corrupt or unusable cache entry sends the flow through the web
//! authorizer. Every other failure is returned to the caller unchanged; there
//! is no partial recovery.

use std::sync::Arc;
use tracing::{debug, info, warn};

use driveup_common::{Credential, Error, Result};

use crate::client::{AuthorizedClient, CredentialSource};
use crate::config::ClientConfig;
use crate::oauth::TokenEndpoint;
use crate::store::CredentialStore;
use crate::web::Authorizer;

/// Coordinator progress through a single `authorize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// `authorize` has not run yet.
    Uninitialized,
    /// Reading the credential cache.
    Checking,
    /// The cache supplied a usable credential.
    CachedValid,
    /// The cache could not supply a credential; the web flow runs.
    NeedsWebAuth,
    /// The web-issued credential was written to the cache.
    Persisted,
    /// An authorized client has been returned.
    Ready,
}

/// Produces an [`AuthorizedClient`] from the cache or the web flow.
pub struct AuthorizationCoordinator<A> {
    store: CredentialStore,
    authorizer: A,
    endpoint: Arc<dyn TokenEndpoint>,
    state: AuthState,
    transitions: Vec<AuthState>,
}

impl<A: Authorizer> AuthorizationCoordinator<A> {
    /// Create a coordinator.
    ///
    /// `endpoint` is handed to the returned client for refreshing expired
    /// access tokens.
    pub fn new(store: CredentialStore, authorizer: A, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            store,
            authorizer,
            endpoint,
            state: AuthState::Uninitialized,
            transitions: Vec::new(),
        }
    }

    /// Current state. After an error this is the last state reached.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// States entered during the last `authorize` call, in order.
    pub fn transitions(&self) -> &[AuthState] {
        &self.transitions
    }

    /// The credential cache.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Recover the authorizer.
    pub fn into_authorizer(self) -> A {
        self.authorizer
    }

    /// Obtain an authorized client for `config`.
    ///
    /// # Postconditions
    /// - A credential obtained from the web flow has been written to the cache
    /// - The state is `Ready`
    ///
    /// # Errors
    /// - `Config` if `config` is incomplete
    /// - `UserInput`, `ExchangeRejected` or `Transport` from the web flow
    /// - `PersistFailure` if the new credential cannot be cached
    pub async fn authorize(&mut self, config: &ClientConfig) -> Result<AuthorizedClient> {
        self.state = AuthState::Uninitialized;
        self.transitions.clear();
        config.validate()?;

        self.enter(AuthState::Checking);

        let (credential, source) = match self.check_cache()? {
            Some(credential) => {
                self.enter(AuthState::CachedValid);
                (credential, CredentialSource::Cache)
            }
            None => {
                self.enter(AuthState::NeedsWebAuth);
                let credential = self.authorizer.request_authorization(config).await?;
                self.store.save(&credential)?;
                self.enter(AuthState::Persisted);
                (credential, CredentialSource::Web)
            }
        };

        let client =
            AuthorizedClient::new(credential, source, config.clone(), self.endpoint.clone())?;
        self.enter(AuthState::Ready);

        Ok(client)
    }

    /// Look up the cache. `None` means the web flow must run.
    fn check_cache(&self) -> Result<Option<Credential>> {
        match self.store.load() {
            Ok(credential) if credential.is_usable() => Ok(Some(credential)),
            Ok(_) => {
                warn!(
                    "Cached credential at {} is expired and cannot be refreshed",
                    self.store.path().display()
                );
                Ok(None)
            }
            Err(e @ Error::CacheMiss(_)) => {
                info!("{}", e);
                Ok(None)
            }
            Err(e @ Error::CacheCorrupt { .. }) => {
                warn!("{}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn enter(&mut self, state: AuthState) {
        debug!("Authorization state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DRIVE_FILE_SCOPE;
    use crate::testing::FakeEndpoint;
    use crate::web::{ConsolePrompt, WebAuthorizer};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Counts invocations and hands out a fixed result.
    struct CountingAuthorizer {
        calls: usize,
        access_token: Option<String>,
    }

    impl CountingAuthorizer {
        fn issuing(access_token: &str) -> Self {
            Self {
                calls: 0,
                access_token: Some(access_token.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                calls: 0,
                access_token: None,
            }
        }
    }

    #[async_trait]
    impl Authorizer for CountingAuthorizer {
        async fn request_authorization(&mut self, _config: &ClientConfig) -> Result<Credential> {
            self.calls += 1;
            match &self.access_token {
                Some(token) => Ok(Credential::new(
                    token.clone(),
                    Some("refresh".to_string()),
                    Some(Utc::now() + Duration::hours(1)),
                )),
                None => Err(Error::UserInput("unexpected end of input".to_string())),
            }
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("test_id", "test_secret", vec![DRIVE_FILE_SCOPE.to_string()])
    }

    fn store_in(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("googleDriveToken"), "drive-go-quickstart.json")
    }

    fn coordinator<A: Authorizer>(
        store: CredentialStore,
        authorizer: A,
    ) -> AuthorizationCoordinator<A> {
        AuthorizationCoordinator::new(store, authorizer, Arc::new(FakeEndpoint::issuing("refreshed")))
    }

    #[tokio::test]
    async fn test_cached_credential_skips_web_flow() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&Credential::new("T1", None, None)).unwrap();

        let mut coordinator = coordinator(store, CountingAuthorizer::issuing("unused"));
        let client = coordinator.authorize(&config()).await.unwrap();

        assert_eq!(client.credential().await.access_token, "T1");
        assert_eq!(client.source(), CredentialSource::Cache);
        assert_eq!(coordinator.state(), AuthState::Ready);
        assert_eq!(
            coordinator.transitions(),
            &[AuthState::Checking, AuthState::CachedValid, AuthState::Ready]
        );
        assert_eq!(coordinator.into_authorizer().calls, 0);
    }

    #[tokio::test]
    async fn test_go_cache_without_expiry_skips_web_flow() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            br#"{"access_token":"T1","token_type":"Bearer","expiry":"0001-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let mut coordinator = coordinator(store, CountingAuthorizer::issuing("T-web"));
        let client = coordinator.authorize(&config()).await.unwrap();

        assert_eq!(client.credential().await.access_token, "T1");
        assert_eq!(
            coordinator.transitions(),
            &[AuthState::Checking, AuthState::CachedValid, AuthState::Ready]
        );
        assert_eq!(coordinator.into_authorizer().calls, 0);
    }

    #[tokio::test]
    async fn test_missing_cache_runs_web_flow_once_and_persists() {
        let dir = TempDir::new().unwrap();

        let mut first = coordinator(store_in(&dir), CountingAuthorizer::issuing("T-new"));
        let client = first.authorize(&config()).await.unwrap();

        assert_eq!(client.source(), CredentialSource::Web);
        assert_eq!(
            first.transitions(),
            &[
                AuthState::Checking,
                AuthState::NeedsWebAuth,
                AuthState::Persisted,
                AuthState::Ready
            ]
        );
        assert_eq!(first.into_authorizer().calls, 1);

        let mut second = coordinator(store_in(&dir), CountingAuthorizer::issuing("unused"));
        let client = second.authorize(&config()).await.unwrap();

        assert_eq!(client.source(), CredentialSource::Cache);
        assert_eq!(client.credential().await.access_token, "T-new");
        assert!(second.transitions().contains(&AuthState::CachedValid));
        assert_eq!(second.into_authorizer().calls, 0);
    }

    #[tokio::test]
    async fn test_empty_cache_file_runs_web_flow() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), b"").unwrap();

        let mut coordinator = coordinator(store, CountingAuthorizer::issuing("T-new"));
        let client = coordinator.authorize(&config()).await.unwrap();

        assert_eq!(client.credential().await.access_token, "T-new");
        assert_eq!(coordinator.store().load().unwrap().access_token, "T-new");
        assert_eq!(coordinator.into_authorizer().calls, 1);
    }

    #[tokio::test]
    async fn test_unusable_cached_credential_runs_web_flow() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&Credential::new("stale", None, Some(Utc::now() - Duration::hours(2))))
            .unwrap();

        let mut coordinator = coordinator(store, CountingAuthorizer::issuing("T-new"));
        let client = coordinator.authorize(&config()).await.unwrap();

        assert_eq!(client.credential().await.access_token, "T-new");
        assert_eq!(coordinator.into_authorizer().calls, 1);
    }

    #[tokio::test]
    async fn test_expired_cached_credential_with_refresh_token_is_cached_valid() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&Credential::new(
                "stale",
                Some("r".to_string()),
                Some(Utc::now() - Duration::hours(2)),
            ))
            .unwrap();

        let mut coordinator = coordinator(store, CountingAuthorizer::issuing("unused"));
        let client = coordinator.authorize(&config()).await.unwrap();

        assert_eq!(client.source(), CredentialSource::Cache);
        assert_eq!(client.authorization_header().await.unwrap(), "Bearer refreshed");
        assert_eq!(coordinator.into_authorizer().calls, 0);
    }

    #[tokio::test]
    async fn test_authorizer_failure_is_fatal_and_nothing_cached() {
        let dir = TempDir::new().unwrap();

        let mut coordinator = coordinator(store_in(&dir), CountingAuthorizer::failing());
        let err = coordinator.authorize(&config()).await.unwrap_err();

        assert!(matches!(err, Error::UserInput(_)));
        assert_eq!(coordinator.state(), AuthState::NeedsWebAuth);
        assert!(matches!(coordinator.store().load(), Err(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_persist_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let store = CredentialStore::with_path(blocker.join("tok.json"));

        let mut coordinator = coordinator(store, CountingAuthorizer::issuing("T-new"));
        let err = coordinator.authorize(&config()).await.unwrap_err();

        assert!(matches!(err, Error::PersistFailure { .. }));
        assert_eq!(coordinator.state(), AuthState::NeedsWebAuth);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_checking() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = coordinator(store_in(&dir), CountingAuthorizer::issuing("unused"));

        let err = coordinator
            .authorize(&ClientConfig::new("", "secret", vec![DRIVE_FILE_SCOPE.to_string()]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(coordinator.state(), AuthState::Uninitialized);
    }

    #[tokio::test]
    async fn test_operator_code_exchanged_and_cached() {
        let dir = TempDir::new().unwrap();
        let endpoint = Arc::new(FakeEndpoint::issuing("T-from-ABC123"));
        let prompt = ConsolePrompt::new(Cursor::new(b"ABC123\n".to_vec()), Vec::new(), false);
        let authorizer = WebAuthorizer::new(prompt, endpoint.clone(), "state-token");

        let mut coordinator = AuthorizationCoordinator::new(store_in(&dir), authorizer, endpoint.clone());
        coordinator.authorize(&config()).await.unwrap();

        assert_eq!(endpoint.exchanged_codes(), vec!["ABC123".to_string()]);

        let raw = fs::read(coordinator.store().path()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["access_token"], "T-from-ABC123");
    }

    #[tokio::test]
    async fn test_cached_credential_prints_no_prompt() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            br#"{"access_token":"T1","token_type":"Bearer","expiry":"2999-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let endpoint = Arc::new(FakeEndpoint::issuing("unused"));
        let prompt = ConsolePrompt::new(Cursor::new(Vec::new()), Vec::new(), false);
        let authorizer = WebAuthorizer::new(prompt, endpoint.clone(), "state-token");

        let mut coordinator = AuthorizationCoordinator::new(store, authorizer, endpoint.clone());
        let client = coordinator.authorize(&config()).await.unwrap();

        assert_eq!(client.authorization_header().await.unwrap(), "Bearer T1");
        assert!(endpoint.exchanged_codes().is_empty());

        let (_, output) = coordinator.into_authorizer().into_code_source().into_parts();
        assert!(output.is_empty());
    }
}
