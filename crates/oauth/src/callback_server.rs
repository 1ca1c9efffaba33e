use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    axum::{
        Router,
        extract::{Query, State},
        http::StatusCode,
        response::Html,
        routing::get,
    },
    tokio::sync::oneshot,
    tokio_util::sync::{CancellationToken, DropGuard},
    tracing::{debug, info, warn},
};

use crate::{Error, Result, state::AuthorizationState};

type Outcome = Result<String>;

struct CallbackState {
    expected: AuthorizationState,
    tx: Mutex<Option<oneshot::Sender<Outcome>>>,
}

/// Short-lived local HTTP server that receives the OAuth redirect.
///
/// [`CallbackServer::start`] returns once the socket is bound, so the caller
/// can safely send the user to the authorization page afterwards.
pub struct CallbackServer {
    addr: SocketAddr,
    outcome: oneshot::Receiver<Outcome>,
    shutdown: CancellationToken,
    _stop_on_drop: DropGuard,
    timeout: Duration,
}

impl CallbackServer {
    /// Bind `addr` and serve `GET {path}` until one callback is consumed.
    pub async fn start(
        addr: SocketAddr,
        path: &str,
        expected: AuthorizationState,
        timeout: Duration,
    ) -> Result<Self> {
        let (tx, outcome) = oneshot::channel();
        let state = Arc::new(CallbackState {
            expected,
            tx: Mutex::new(Some(tx)),
        });
        let app = Router::new()
            .route(path, get(handle_callback))
            .with_state(state);

        let shutdown = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<SocketAddr>>();
        let stop = shutdown.clone();

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(source) => {
                    let _ = ready_tx.send(Err(Error::Bind { addr, source }));
                    return;
                },
            };
            let local = match listener.local_addr() {
                Ok(local) => local,
                Err(source) => {
                    let _ = ready_tx.send(Err(Error::Bind { addr, source }));
                    return;
                },
            };
            if ready_tx.send(Ok(local)).is_err() {
                return;
            }
            debug!(%local, "oauth callback listener ready");
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                warn!(error = %e, "oauth callback listener failed");
            }
            debug!(%local, "oauth callback listener stopped");
        });

        let addr = ready_rx
            .await
            .map_err(|_| Error::message("callback listener exited before binding"))??;

        Ok(Self {
            addr,
            outcome,
            _stop_on_drop: shutdown.clone().drop_guard(),
            shutdown,
            timeout,
        })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the first callback, the timeout, or `cancel`, whichever comes
    /// first. The listener stops accepting connections before this returns.
    pub async fn wait_for_code(self, cancel: &CancellationToken) -> Result<String> {
        let Self {
            outcome,
            shutdown,
            timeout,
            ..
        } = self;
        let result = tokio::select! {
            received = outcome => received.unwrap_or_else(|_| {
                Err(Error::message("callback listener exited unexpectedly"))
            }),
            _ = tokio::time::sleep(timeout) => Err(Error::CallbackTimeout { after: timeout }),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        };
        shutdown.cancel();
        result
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    // A request without code or error is not a provider redirect (e.g. a
    // browser prefetch) and must not burn the one-shot state.
    if !params.contains_key("code") && !params.contains_key("error") {
        return (
            StatusCode::BAD_REQUEST,
            page("Authentication failed", "missing code"),
        );
    }
    let tx = state.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    let Some(tx) = tx else {
        return (
            StatusCode::GONE,
            page("Authentication already completed", "This link has been used."),
        );
    };

    let outcome = evaluate(&state.expected, &params);
    let response = match &outcome {
        Ok(_) => {
            info!("oauth callback received");
            (
                StatusCode::OK,
                page("Authentication successful!", "You can close this window."),
            )
        },
        Err(e) => {
            warn!(error = %e, "oauth callback rejected");
            (
                StatusCode::BAD_REQUEST,
                page("Authentication failed", &e.to_string()),
            )
        },
    };
    let _ = tx.send(outcome);
    response
}

fn evaluate(expected: &AuthorizationState, params: &HashMap<String, String>) -> Outcome {
    let state = params.get("state").map(String::as_str).unwrap_or_default();
    if !expected.matches(state) {
        return Err(Error::StateMismatch);
    }
    if let Some(error) = params.get("error") {
        return Err(Error::AuthorizationDenied {
            error: error.clone(),
            description: params.get("error_description").cloned(),
        });
    }
    params
        .get("code")
        .filter(|c| !c.is_empty())
        .cloned()
        .ok_or_else(|| Error::message("callback is missing the authorization code"))
}

fn page(title: &str, body: &str) -> Html<String> {
    let body = body
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    Html(format!("<h1>{title}</h1><p>{body}</p>"))
}
