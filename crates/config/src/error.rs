use std::path::PathBuf;

/// Configuration errors. All of them are fatal to the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("unsupported config format: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("invalid config: {}", .problems.join("; "))]
    Invalid { problems: Vec<String> },
}

impl Error {
    #[must_use]
    pub fn parse(format: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            format,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
