//! Configuration loading, validation and env substitution for the bot.
//!
//! Config files: `tmibot.toml`, `tmibot.yaml` or `tmibot.json`,
//! searched in `./` then the user config directory.
//!
//! The JSON credential file layout (`Secret`, `ClientID`, `TokenURL`, ...) is
//! accepted as-is for the `[auth]` table.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, find_config_file, load_config, parse_config},
    schema::{
        AuthConfig, BotConfig, ChatConfig, GrantKind, RetryConfig, SupervisorConfig,
        CLIENT_CREDENTIALS_GRANT,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
