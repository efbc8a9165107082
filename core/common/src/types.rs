//! Common types used throughout driveup.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Token type assumed when the token endpoint leaves it blank.
const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Seconds before the recorded expiry at which an access token stops being
/// handed out.
const EXPIRY_SKEW_SECS: i64 = 10;

/// An OAuth2 access/refresh token pair with expiry metadata.
///
/// The serialized form is the on-disk cache format:
/// `access_token`, `token_type`, `refresh_token` (omitted when absent) and
/// `expiry` (RFC 3339, omitted when absent). Go's zero time
/// `0001-01-01T00:00:00Z` reads back as no expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    /// Token sent with API requests.
    pub access_token: String,
    /// Token type, usually `Bearer`.
    #[serde(default)]
    pub token_type: String,
    /// Token used to mint new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires. `None` means it never does.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_expiry"
    )]
    #[zeroize(skip)]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a bearer credential.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            refresh_token,
            expiry,
        }
    }

    /// Token type to put in the `Authorization` header.
    pub fn auth_scheme(&self) -> &str {
        if self.token_type.is_empty() {
            DEFAULT_TOKEN_TYPE
        } else {
            &self.token_type
        }
    }

    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => expiry < Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    /// Whether the access token can be sent as-is.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Whether a transport client can be built from this credential, either
    /// directly or after a refresh.
    pub fn is_usable(&self) -> bool {
        self.is_valid() || self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// `Authorization` header value for this credential.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.auth_scheme(), self.access_token)
    }
}

/// Read an optional expiry, mapping Go's zero `time.Time` to `None`.
fn deserialize_expiry<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let expiry = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(expiry.filter(|e| e.year() > 1))
}

// Tokens never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}
