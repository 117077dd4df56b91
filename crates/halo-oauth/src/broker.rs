//! The credential broker: OAuth 2.1 PKCE against connector authorization
//! servers.
//!
//! One broker serves every network-backed connector. Flows run through
//! discovery (RFC 9728, then RFC 8414), dynamic client registration
//! (RFC 7591, public client only), browser authorization with PKCE
//! (RFC 7636), and the code exchange. Obtained credentials land in the
//! connector's `oauth` config sub-field; nothing else in the entry is
//! touched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use halo_core::{ConfigStore, ConnectorEvent, CoreError, EventBus, OAuthCredential};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{OAuthError, OAuthResult};
use crate::flow::{self, FlowState, FlowStore};
use crate::metadata::{
    AuthorizationServerMetadata, ClientRegistrationRequest, ClientRegistrationResponse,
    ProtectedResourceMetadata, TokenResponse,
};
use crate::pkce;

/// Timeout applied to every OAuth network call.
pub const OAUTH_TIMEOUT_SECS: u64 = 15;

/// Credentials expiring within this window are refreshed by
/// [`OAuthBroker::refresh_expiring`].
pub const REFRESH_THRESHOLD_SECS: i64 = 300;

/// Well-known path for protected resource metadata (RFC 9728).
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// Well-known path for authorization server metadata (RFC 8414).
pub const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";

/// A started authorization flow, awaiting the browser redirect.
#[derive(Debug, Clone)]
pub struct StartedFlow {
    /// Connector the flow belongs to.
    pub connector: String,
    /// URL to open in the user's browser.
    pub authorization_url: String,
    /// The state token the callback must echo.
    pub state: String,
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens were obtained and persisted.
    Refreshed,
    /// The server rejected the refresh token outright (400/401); the stored
    /// credential was cleared and observers notified.
    ReauthorizationRequired,
    /// A transient failure; the stored credential is untouched and a later
    /// retry may succeed.
    Failed(String),
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct BrokerInner {
    store: Arc<dyn ConfigStore>,
    events: EventBus,
    http: reqwest::Client,
    flows: Arc<FlowStore>,
    /// In-flight refreshes by connector name; concurrent callers for the
    /// same connector await the same future.
    refreshes: Mutex<HashMap<String, SharedRefresh>>,
    redirect_uri: String,
}

/// OAuth 2.1 PKCE credential broker.
///
/// Cheap to clone; all clones share flow state and the single-flight
/// refresh table.
#[derive(Clone)]
pub struct OAuthBroker {
    inner: Arc<BrokerInner>,
}

impl OAuthBroker {
    /// Create a broker over the given store and event bus.
    ///
    /// `redirect_uri` is where the local callback endpoint listens, e.g.
    /// `http://localhost:43110/oauth/callback`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        events: EventBus,
        redirect_uri: impl Into<String>,
    ) -> OAuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(OAUTH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            inner: Arc::new(BrokerInner {
                store,
                events,
                http,
                flows: Arc::new(FlowStore::new()),
                refreshes: Mutex::new(HashMap::new()),
                redirect_uri: redirect_uri.into(),
            }),
        })
    }

    /// Spawn the background sweeper that drops abandoned flows.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        flow::spawn_sweeper(Arc::clone(&self.inner.flows))
    }

    /// Number of flows currently awaiting their callback.
    #[must_use]
    pub fn pending_flows(&self) -> usize {
        self.inner.flows.len()
    }

    /// Start an authorization flow for a network-backed connector.
    ///
    /// Discovers the protected resource and its authorization server,
    /// registers a public client, generates PKCE material, records the flow
    /// and returns the URL to open in the user's browser.
    ///
    /// # Errors
    ///
    /// Fails when the connector is unknown or not network-backed, when
    /// either discovery document is missing or lists no authorization
    /// server, or when the server does not support dynamic registration.
    pub async fn start_flow(&self, connector: &str) -> OAuthResult<StartedFlow> {
        let file = self.inner.store.load()?;
        let config = file
            .get(connector)
            .ok_or_else(|| CoreError::ConnectorNotFound {
                name: connector.to_string(),
            })?;
        let Some(connector_url) = config.url.clone() else {
            return Err(OAuthError::Core(CoreError::InvalidConfig {
                name: connector.to_string(),
                reason: "OAuth requires a network-backed connector".to_string(),
            }));
        };

        let resource_meta = self.discover_protected_resource(&connector_url).await?;
        let issuer = resource_meta
            .authorization_servers
            .first()
            .cloned()
            .ok_or_else(|| OAuthError::NoAuthorizationServer {
                resource: connector_url.clone(),
            })?;

        let server_meta = self.discover_authorization_server(&issuer).await?;
        let client_id = self.register_client(connector, &server_meta).await?;

        let pair = pkce::generate_pkce();
        let state = pkce::generate_state();

        let mut authorization_url = Url::parse(&server_meta.authorization_endpoint)?;
        {
            let mut query = authorization_url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &client_id);
            query.append_pair("redirect_uri", &self.inner.redirect_uri);
            query.append_pair("state", &state);
            query.append_pair("code_challenge", &pair.challenge);
            query.append_pair("code_challenge_method", "S256");
            if let Some(resource) = &resource_meta.resource {
                query.append_pair("resource", resource);
            }
            if !resource_meta.scopes_supported.is_empty() {
                query.append_pair("scope", &resource_meta.scopes_supported.join(" "));
            }
        }

        self.inner.flows.insert(
            state.clone(),
            FlowState {
                connector: connector.to_string(),
                connector_url,
                code_verifier: pair.verifier,
                redirect_uri: self.inner.redirect_uri.clone(),
                client_id,
                token_url: server_meta.token_endpoint,
                resource: resource_meta.resource,
                created_at: Utc::now(),
            },
        );

        info!(connector, issuer, "Authorization flow started");

        Ok(StartedFlow {
            connector: connector.to_string(),
            authorization_url: authorization_url.into(),
            state,
        })
    }

    /// Finish a flow from the browser redirect.
    ///
    /// The state token's shape is checked before any lookup; the matching
    /// flow is consumed atomically (single use). On success the credential
    /// is persisted under the connector's `oauth` sub-field and a
    /// completion event is published. Failures after the flow was consumed
    /// also publish a (failed) completion event.
    ///
    /// # Errors
    ///
    /// Fails on a malformed or unknown state token, or when the token
    /// exchange is rejected.
    pub async fn handle_callback(&self, state: &str, code: &str) -> OAuthResult<String> {
        if !pkce::is_valid_state_shape(state) {
            warn!("Callback rejected: malformed state parameter");
            return Err(OAuthError::InvalidState);
        }

        let flow = self
            .inner
            .flows
            .take(state, Utc::now())
            .ok_or(OAuthError::UnknownFlow)?;
        let connector = flow.connector.clone();

        match self.exchange_code(&flow, code).await {
            Ok(credential) => {
                self.inner.store.set_oauth(&connector, Some(credential))?;
                info!(connector, "Authorization completed, credential stored");
                self.inner.events.publish(ConnectorEvent::AuthorizationCompleted {
                    connector: connector.clone(),
                    success: true,
                    error: None,
                });
                Ok(connector)
            }
            Err(e) => {
                warn!(connector, error = %e, "Authorization failed at token exchange");
                self.inner.events.publish(ConnectorEvent::AuthorizationCompleted {
                    connector,
                    success: false,
                    error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    /// Handle a provider redirecting back with an `error` parameter.
    ///
    /// Consumes the flow (the authorization attempt is over) and publishes
    /// a failed completion event. Returns the connector name when the state
    /// matched a pending flow.
    pub fn handle_callback_error(&self, state: &str, error: &str) -> Option<String> {
        if !pkce::is_valid_state_shape(state) {
            warn!("Error callback rejected: malformed state parameter");
            return None;
        }

        let flow = self.inner.flows.take(state, Utc::now())?;
        warn!(connector = flow.connector, error, "Provider reported authorization error");
        self.inner.events.publish(ConnectorEvent::AuthorizationCompleted {
            connector: flow.connector.clone(),
            success: false,
            error: Some(error.to_string()),
        });
        Some(flow.connector)
    }

    /// Refresh a connector's access token, single-flight per connector.
    ///
    /// A concurrent refresh for the same connector awaits the in-flight
    /// attempt instead of issuing a duplicate token request; both callers
    /// observe the same outcome. A 400/401 from the token endpoint clears
    /// the stored credential and broadcasts a re-authorization request;
    /// transient failures leave the credential intact.
    ///
    /// # Errors
    ///
    /// Fails when the connector is unknown, has no stored credential, or
    /// the credential carries no refresh token.
    pub async fn refresh(&self, connector: &str) -> OAuthResult<RefreshOutcome> {
        let file = self.inner.store.load()?;
        let config = file
            .get(connector)
            .ok_or_else(|| CoreError::ConnectorNotFound {
                name: connector.to_string(),
            })?;
        let credential = config
            .oauth
            .as_ref()
            .ok_or_else(|| OAuthError::NoCredential {
                name: connector.to_string(),
            })?;
        if credential.refresh_token.is_none() {
            return Err(OAuthError::NoRefreshToken {
                name: connector.to_string(),
            });
        }

        let shared = {
            let mut refreshes = self
                .inner
                .refreshes
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(existing) = refreshes.get(connector) {
                debug!(connector, "Joining in-flight refresh");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let name = connector.to_string();
                // The flight owns its map entry and removes it itself once
                // the outcome is settled; a late awaiter must never evict a
                // successor's flight. The credential is re-read inside the
                // flight so it posts tokens rotated after the check above.
                let fut = async move {
                    let outcome = inner.do_refresh(&name).await;
                    inner
                        .refreshes
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&name);
                    outcome
                }
                .boxed()
                .shared();
                refreshes.insert(connector.to_string(), fut.clone());
                fut
            }
        };

        Ok(shared.await)
    }

    /// Refresh every connector whose credential expires within
    /// [`REFRESH_THRESHOLD_SECS`], concurrently.
    ///
    /// Collects one outcome per attempted connector; a failing refresh
    /// never aborts the rest.
    ///
    /// # Errors
    ///
    /// Fails only when the configuration cannot be read.
    pub async fn refresh_expiring(&self) -> OAuthResult<Vec<(String, RefreshOutcome)>> {
        let now = Utc::now();
        let file = self.inner.store.load()?;

        let mut due: Vec<String> = file
            .connectors
            .iter()
            .filter(|(_, config)| {
                config.oauth.as_ref().is_some_and(|oauth| {
                    oauth.refresh_token.is_some()
                        && oauth.expires_within(now, Duration::seconds(REFRESH_THRESHOLD_SECS))
                })
            })
            .map(|(name, _)| name.clone())
            .collect();
        due.sort();

        if due.is_empty() {
            debug!("No credentials due for refresh");
            return Ok(Vec::new());
        }
        info!(count = due.len(), "Refreshing expiring credentials");

        let attempts = due.into_iter().map(|name| async move {
            let outcome = match self.refresh(&name).await {
                Ok(outcome) => outcome,
                Err(e) => RefreshOutcome::Failed(e.to_string()),
            };
            (name, outcome)
        });

        Ok(futures::future::join_all(attempts).await)
    }

    async fn discover_protected_resource(
        &self,
        connector_url: &str,
    ) -> OAuthResult<ProtectedResourceMetadata> {
        let base = Url::parse(connector_url)?;
        let well_known = base.join(PROTECTED_RESOURCE_PATH)?;
        debug!(url = %well_known, "Discovering protected resource");

        let response = self.inner.http.get(well_known.clone()).send().await?;
        if !response.status().is_success() {
            return Err(OAuthError::DiscoveryFailed {
                url: well_known.into(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn discover_authorization_server(
        &self,
        issuer: &str,
    ) -> OAuthResult<AuthorizationServerMetadata> {
        let base = Url::parse(issuer)?;
        let well_known = base.join(AUTHORIZATION_SERVER_PATH)?;
        debug!(url = %well_known, "Discovering authorization server");

        let response = self.inner.http.get(well_known.clone()).send().await?;
        if !response.status().is_success() {
            return Err(OAuthError::DiscoveryFailed {
                url: well_known.into(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn register_client(
        &self,
        connector: &str,
        server_meta: &AuthorizationServerMetadata,
    ) -> OAuthResult<String> {
        let endpoint = server_meta.registration_endpoint.as_deref().ok_or_else(|| {
            OAuthError::RegistrationUnsupported {
                issuer: server_meta.issuer.clone(),
            }
        })?;

        let request = ClientRegistrationRequest::public_client(
            format!("Halo ({connector})"),
            self.inner.redirect_uri.clone(),
        );

        let response = self.inner.http.post(endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::RegistrationFailed {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let registration: ClientRegistrationResponse = response.json().await?;
        if registration.client_secret.is_some() {
            // PKCE is sufficient for a public client; the secret is unused.
            warn!(
                connector,
                "Server issued a client_secret despite public client declaration; ignoring"
            );
        }

        debug!(connector, client_id = registration.client_id, "Client registered");
        Ok(registration.client_id)
    }

    async fn exchange_code(&self, flow: &FlowState, code: &str) -> OAuthResult<OAuthCredential> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", flow.redirect_uri.clone()),
            ("client_id", flow.client_id.clone()),
            ("code_verifier", flow.code_verifier.clone()),
        ];
        if let Some(resource) = &flow.resource {
            params.push(("resource", resource.clone()));
        }

        let response = self
            .inner
            .http
            .post(&flow.token_url)
            .form(&params)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::ExchangeFailed {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let tokens: TokenResponse = response.json().await?;
        Ok(OAuthCredential {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
            token_type: tokens.token_type,
            token_url: flow.token_url.clone(),
            client_id: flow.client_id.clone(),
            resource: flow.resource.clone(),
            scope: tokens.scope,
        })
    }
}

impl BrokerInner {
    /// The actual refresh request. Infallible by construction: every
    /// failure mode is folded into a [`RefreshOutcome`] so concurrent
    /// callers can share the result. Loads the credential from the store
    /// at flight start, not from the caller's snapshot.
    async fn do_refresh(&self, connector: &str) -> RefreshOutcome {
        let credential = match self.store.load() {
            Ok(file) => match file.get(connector).and_then(|c| c.oauth.clone()) {
                Some(credential) => credential,
                None => return RefreshOutcome::Failed("no stored credential".to_string()),
            },
            Err(e) => return RefreshOutcome::Failed(e.to_string()),
        };
        let Some(refresh_token) = credential.refresh_token.clone() else {
            return RefreshOutcome::Failed("no refresh token".to_string());
        };

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
            ("client_id", credential.client_id.clone()),
        ];
        if let Some(resource) = &credential.resource {
            params.push(("resource", resource.clone()));
        }

        let response = match self.http.post(&credential.token_url).form(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(connector, error = %e, "Refresh request failed; keeping credential");
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            warn!(connector, status = status.as_u16(), "Refresh token rejected; clearing credential");
            if let Err(e) = self.store.set_oauth(connector, None) {
                warn!(connector, error = %e, "Failed to clear rejected credential");
            }
            self.events.publish(ConnectorEvent::ReauthorizationRequired {
                connectors: vec![connector.to_string()],
            });
            return RefreshOutcome::ReauthorizationRequired;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(connector, status = status.as_u16(), "Refresh failed; keeping credential");
            return RefreshOutcome::Failed(format!("status {status}: {body}"));
        }

        let tokens: TokenResponse = match response.json().await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(connector, error = %e, "Refresh response unreadable; keeping credential");
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        let rotated = OAuthCredential {
            access_token: tokens.access_token,
            // Servers may omit the refresh token on rotation; keep the old
            // one so the credential stays refreshable.
            refresh_token: tokens.refresh_token.or(Some(refresh_token)),
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
            token_type: tokens.token_type,
            token_url: credential.token_url,
            client_id: credential.client_id,
            resource: credential.resource,
            scope: tokens.scope.or(credential.scope),
        };

        if let Err(e) = self.store.set_oauth(connector, Some(rotated)) {
            warn!(connector, error = %e, "Failed to persist refreshed credential");
            return RefreshOutcome::Failed(e.to_string());
        }

        info!(connector, expires_in = tokens.expires_in, "Access token refreshed");
        RefreshOutcome::Refreshed
    }
}
