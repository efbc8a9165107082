//! Client and cache configuration for the authorization flow.

use serde::{Deserialize, Serialize};

use driveup_common::{Error, Result};

/// Google Drive scope granting access to files created by this app.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Google OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Out-of-band redirect used by installed apps that paste the code back.
const OOB_REDIRECT_URL: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Static description of the API consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// OAuth2 client ID.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Scopes requested in the authorization URL.
    pub scopes: Vec<String>,
    /// Redirect URI registered for the client.
    pub redirect_url: String,
    /// Authorization endpoint the operator visits.
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh.
    pub token_url: String,
}

impl ClientConfig {
    /// Create a configuration against Google's endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
            redirect_url: OOB_REDIRECT_URL.to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Parse a client secret file as downloaded from the Google Cloud console.
    ///
    /// Both the `installed` and `web` application layouts are accepted. The
    /// first registered redirect URI is used.
    ///
    /// # Errors
    /// - Malformed JSON
    /// - Neither `installed` nor `web` section present
    /// - Missing client ID, secret or endpoints
    pub fn from_google_json(data: &[u8], scopes: Vec<String>) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_slice(data)
            .map_err(|e| Error::Config(format!("Invalid client secret file: {}", e)))?;

        let section = file.installed.or(file.web).ok_or_else(|| {
            Error::Config("Client secret file has no 'installed' or 'web' section".to_string())
        })?;

        let redirect_url = section
            .redirect_uris
            .into_iter()
            .next()
            .ok_or_else(|| Error::Config("Client secret file lists no redirect URIs".to_string()))?;

        let config = Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            scopes,
            redirect_url,
            auth_url: section.auth_uri,
            token_url: section.token_uri,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check that every required field is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_url", &self.redirect_url),
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
        ];

        for (name, value) in required {
            if value.is_empty() {
                return Err(Error::Config(format!("Missing {}", name)));
            }
        }

        if self.scopes.is_empty() {
            return Err(Error::Config("At least one scope is required".to_string()));
        }

        Ok(())
    }
}

#[derive(Deserialize)]
struct ClientSecretFile {
    #[serde(default)]
    installed: Option<ClientSecretSection>,
    #[serde(default)]
    web: Option<ClientSecretSection>,
}

#[derive(Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// Where the credential cache lives and how the authorization URL is stamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Cache directory, relative to the working directory.
    pub cache_dir: String,
    /// Cache file name. Escaped before use.
    pub cache_file: String,
    /// Opaque state value embedded in the authorization URL.
    pub state_token: String,
    /// Also open the authorization URL in the default browser.
    #[serde(default)]
    pub open_browser: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            cache_dir: "googleDriveToken".to_string(),
            cache_file: "drive-go-quickstart.json".to_string(),
            state_token: "state-token".to_string(),
            open_browser: false,
        }
    }
}
