//! Credential broker error types.

use halo_core::CoreError;
use thiserror::Error;

/// Errors from the OAuth broker.
///
/// Transport failures preserve the remote status and body so the caller can
/// tell a misbehaving server from a rejected request. None of these are
/// fatal to the hosting process; a failed flow or refresh leaves the stored
/// credential in its prior state (refresh rejections being the one
/// deliberate exception, handled inside the broker).
#[derive(Debug, Error)]
pub enum OAuthError {
    /// A discovery document came back with a non-success status.
    #[error("discovery of {url} failed with status {status}")]
    DiscoveryFailed {
        /// The well-known URL that was fetched.
        url: String,
        /// HTTP status returned.
        status: u16,
    },

    /// The protected resource metadata lists no authorization server.
    #[error("no authorization servers found in protected resource metadata for {resource}")]
    NoAuthorizationServer {
        /// The protected resource.
        resource: String,
    },

    /// The authorization server advertises no registration endpoint.
    ///
    /// Manual client registration is unsupported; without dynamic
    /// registration the flow cannot proceed.
    #[error(
        "authorization server {issuer} does not support dynamic client registration"
    )]
    RegistrationUnsupported {
        /// The authorization server issuer.
        issuer: String,
    },

    /// Dynamic client registration was rejected.
    #[error("client registration failed with status {status}: {body}")]
    RegistrationFailed {
        /// HTTP status returned.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The token endpoint rejected the authorization-code exchange.
    #[error("token exchange failed with status {status}: {body}")]
    ExchangeFailed {
        /// HTTP status returned.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The callback carried a state token with an invalid shape.
    ///
    /// Rejected before any storage lookup.
    #[error("invalid state parameter")]
    InvalidState,

    /// No pending flow matches the state token (already used, swept, or
    /// never issued).
    #[error("invalid or expired authorization flow")]
    UnknownFlow,

    /// The authorization provider redirected back with an error.
    #[error("authorization failed: {error}")]
    ProviderError {
        /// The `error` query parameter from the provider.
        error: String,
    },

    /// The connector has no stored OAuth credential to refresh.
    #[error("connector \"{name}\" has no stored OAuth credential")]
    NoCredential {
        /// The connector name.
        name: String,
    },

    /// The stored credential carries no refresh token.
    #[error("connector \"{name}\" has no refresh token; re-authorization required")]
    NoRefreshToken {
        /// The connector name.
        name: String,
    },

    /// HTTP transport failure (network error, timeout, body decode).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL could not be parsed or joined.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration store failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for broker operations.
pub type OAuthResult<T> = Result<T, OAuthError>;
