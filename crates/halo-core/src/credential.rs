//! Persisted OAuth credential for a network-backed connector.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth tokens stored under a connector's `oauth` key in the config file.
///
/// `expires_at` is always "valid until": a credential whose expiry lies in
/// the past is *expired*, not absent, and keeps its refresh material so a
/// later refresh can revive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCredential {
    /// Bearer access token.
    pub access_token: String,
    /// Refresh token, if the server issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry instant (milliseconds since epoch on disk).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    /// Token type, usually `Bearer`.
    pub token_type: String,
    /// Token endpoint used to obtain (and refresh) this credential.
    pub token_url: String,
    /// Client id registered for this connector.
    pub client_id: String,
    /// RFC 8707 resource indicator, if the server advertised one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Granted scope string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl OAuthCredential {
    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the access token expires within `threshold` of `now`.
    ///
    /// Already-expired credentials count as expiring.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.expires_at <= now + threshold
    }

    /// Render the `Authorization` header value for this credential.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}
