use thiserror::Error;

/// Fatal supervisor errors. Transient session failures are retried and never
/// surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] tmibot_config::Error),

    #[error("failed to acquire token: {0}")]
    Token(#[from] tmibot_oauth::Error),

    #[error(transparent)]
    Chat(#[from] tmibot_chat::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
