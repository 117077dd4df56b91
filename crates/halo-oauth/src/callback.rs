//! Local HTTP endpoint receiving the authorization redirect.
//!
//! The browser lands here after the user approves (or denies) access; the
//! handler hands the `code`/`state` pair to the broker and renders a
//! minimal page telling the user to close the tab.

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::debug;

use crate::broker::OAuthBroker;

/// Path the redirect URI must point at.
pub const CALLBACK_PATH: &str = "/oauth/callback";

/// Query parameters of the authorization redirect.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    /// Set by the provider when the user denied access or the request was
    /// malformed.
    #[serde(default)]
    error: Option<String>,
}

/// Build the callback router around a broker.
#[must_use]
pub fn router(broker: OAuthBroker) -> Router {
    Router::new()
        .route(CALLBACK_PATH, get(handle))
        .with_state(broker)
}

async fn handle(
    State(broker): State<OAuthBroker>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    let Some(state) = params.state.as_deref() else {
        return failure_page("Missing state parameter.");
    };

    if let Some(error) = params.error.as_deref() {
        let connector = broker.handle_callback_error(state, error);
        debug!(?connector, error, "Authorization denied by provider");
        return failure_page(&format!("Authorization failed: {error}"));
    }

    let Some(code) = params.code.as_deref() else {
        return failure_page("Missing authorization code.");
    };

    match broker.handle_callback(state, code).await {
        Ok(connector) => success_page(&connector),
        Err(e) => failure_page(&e.to_string()),
    }
}

fn success_page(connector: &str) -> Html<String> {
    Html(format!(
        "<html><body style=\"font-family: sans-serif; text-align: center; padding-top: 4em\">\
         <h1>Authorization complete</h1>\
         <p>\"{connector}\" is connected. You can close this tab.</p>\
         </body></html>"
    ))
}

fn failure_page(reason: &str) -> Html<String> {
    Html(format!(
        "<html><body style=\"font-family: sans-serif; text-align: center; padding-top: 4em\">\
         <h1>Authorization failed</h1>\
         <p>{reason}</p>\
         <p>Close this tab and try connecting again.</p>\
         </body></html>"
    ))
}
