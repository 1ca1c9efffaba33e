use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Dial, read or write failure on the chat transport.
    #[error("chat transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Rejected locally, nothing was written.
    #[error("can't speak, message was empty")]
    EmptyMessage,

    #[error("failed to connect to {addr} after {attempts} attempts: {source}")]
    ConnectExhausted {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("session is not connected")]
    NotConnected,

    #[error("connect cancelled")]
    Cancelled,

    #[error("invalid line pattern: {0}")]
    Pattern(String),
}

impl Error {
    /// Whether the supervisor may retry after this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::EmptyMessage | Self::Cancelled | Self::Pattern(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
