//! In-process token endpoint for tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Mutex;

use driveup_common::{Credential, Error, Result};

use crate::config::ClientConfig;
use crate::oauth::TokenEndpoint;

pub(crate) struct FakeEndpoint {
    access_token: Option<String>,
    exchanged: Mutex<Vec<String>>,
    refreshes: Mutex<usize>,
}

impl FakeEndpoint {
    /// Issues `access_token` for every code and refresh.
    pub(crate) fn issuing(access_token: &str) -> Self {
        Self {
            access_token: Some(access_token.to_string()),
            exchanged: Mutex::new(Vec::new()),
            refreshes: Mutex::new(0),
        }
    }

    /// Declines every request.
    pub(crate) fn rejecting() -> Self {
        Self {
            access_token: None,
            exchanged: Mutex::new(Vec::new()),
            refreshes: Mutex::new(0),
        }
    }

    pub(crate) fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged.lock().unwrap().clone()
    }

    pub(crate) fn refresh_count(&self) -> usize {
        *self.refreshes.lock().unwrap()
    }

    fn issue(&self, refresh_token: Option<String>) -> Result<Credential> {
        let access_token = self
            .access_token
            .clone()
            .ok_or_else(|| Error::ExchangeRejected("invalid_grant".to_string()))?;

        Ok(Credential::new(
            access_token,
            refresh_token,
            Some(Utc::now() + Duration::hours(1)),
        ))
    }
}

#[async_trait]
impl TokenEndpoint for FakeEndpoint {
    async fn exchange_code(&self, _config: &ClientConfig, code: &str) -> Result<Credential> {
        self.exchanged.lock().unwrap().push(code.to_string());
        self.issue(Some("refresh-from-exchange".to_string()))
    }

    async fn refresh(&self, _config: &ClientConfig, credential: &Credential) -> Result<Credential> {
        *self.refreshes.lock().unwrap() += 1;
        self.issue(credential.refresh_token.clone())
    }
}
