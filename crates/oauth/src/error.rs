use std::{net::SocketAddr, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The callback carried a `state` other than the one we issued.
    #[error("authorization callback state mismatch")]
    StateMismatch,

    /// The provider redirected back with an `error` parameter.
    #[error("authorization denied: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("no authorization callback received within {}s", .after.as_secs())]
    CallbackTimeout { after: Duration },

    #[error("authorization flow cancelled")]
    Cancelled,

    #[error("failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Token endpoint answered with a non-success status or an unusable body.
    #[error("token exchange failed (HTTP {status}): {reason}; body: {body}")]
    TokenExchange {
        status: u16,
        reason: String,
        body: String,
    },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Errors that mean the authorization attempt itself was rejected.
    #[must_use]
    pub fn is_security_failure(&self) -> bool {
        matches!(self, Self::StateMismatch | Self::AuthorizationDenied { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
