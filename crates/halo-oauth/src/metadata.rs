//! OAuth wire formats: RFC 9728, RFC 8414, RFC 7591 and the token response.
//!
//! Field names follow the RFCs exactly; unknown fields are ignored on
//! deserialization so conformant servers with extra metadata parse cleanly.

use serde::{Deserialize, Serialize};

/// Protected resource metadata (RFC 9728), fetched from
/// `{origin}/.well-known/oauth-protected-resource`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The resource identifier, echoed back as an RFC 8707 indicator.
    #[serde(default)]
    pub resource: Option<String>,
    /// Authorization servers able to issue tokens for this resource.
    #[serde(default)]
    pub authorization_servers: Vec<String>,
    /// Scopes the resource understands; joined with spaces when requesting
    /// authorization.
    #[serde(default)]
    pub scopes_supported: Vec<String>,
}

/// Authorization server metadata (RFC 8414), fetched from
/// `{issuer}/.well-known/oauth-authorization-server`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// The issuer identifier.
    pub issuer: String,
    /// Where to send the user for authorization.
    pub authorization_endpoint: String,
    /// Where to exchange and refresh tokens.
    pub token_endpoint: String,
    /// Dynamic client registration endpoint (RFC 7591), when supported.
    #[serde(default)]
    pub registration_endpoint: Option<String>,
}

/// Dynamic client registration request (RFC 7591).
///
/// Always declares a public client: `token_endpoint_auth_method` is `none`
/// and PKCE carries the proof.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRegistrationRequest {
    /// Human-readable client name shown on consent screens.
    pub client_name: String,
    /// Redirect URIs the client will use.
    pub redirect_uris: Vec<String>,
    /// Grant types: authorization code plus refresh.
    pub grant_types: Vec<String>,
    /// Response types: `code`.
    pub response_types: Vec<String>,
    /// Always `none` (public client).
    pub token_endpoint_auth_method: String,
}

impl ClientRegistrationRequest {
    /// Build the registration request for a connector.
    #[must_use]
    pub fn public_client(client_name: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            redirect_uris: vec![redirect_uri.into()],
            grant_types: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: "none".to_string(),
        }
    }
}

/// Dynamic client registration response (RFC 7591).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistrationResponse {
    /// The issued client id.
    pub client_id: String,
    /// Some servers issue a secret even to declared public clients. It is
    /// ignored with a warning; PKCE is sufficient.
    #[serde(default)]
    pub client_secret: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn default_expires_in() -> i64 {
    3600
}

/// Token endpoint response, for both the code exchange and refresh grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,
    /// Token type, defaulting to `Bearer` when omitted.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds, defaulting to one hour when omitted.
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    /// Rotated refresh token, when the server issues one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scope, when the server reports it.
    #[serde(default)]
    pub scope: Option<String>,
}
