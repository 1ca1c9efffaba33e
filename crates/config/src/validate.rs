//! Semantic checks that run after a config parses successfully.

use crate::{
    Error, Result,
    schema::{BotConfig, GrantKind},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "chat.channel"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn error(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            path,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            path,
            message: message.into(),
        });
    }

    /// Turn error diagnostics into [`Error::Invalid`].
    pub fn into_result(self) -> Result<Vec<Diagnostic>> {
        if self.has_errors() {
            return Err(Error::Invalid {
                problems: self
                    .diagnostics
                    .iter()
                    .filter(|d| d.severity == Severity::Error)
                    .map(ToString::to_string)
                    .collect(),
            });
        }
        Ok(self.diagnostics)
    }
}

impl BotConfig {
    /// Check the parsed config for values that cannot work at runtime.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.auth.client_id.trim().is_empty() {
            result.error("auth.client_id", "client id is required");
        }
        for (path, value) in [
            ("auth.token_url", &self.auth.token_url),
            ("auth.validate_url", &self.auth.validate_url),
            ("auth.auth_url", &self.auth.auth_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                result.error(path, format!("not a valid URL ({e})"));
            }
        }
        match self.auth.grant_kind() {
            GrantKind::ClientCredentials if self.auth.client_secret.is_none() => {
                result.error(
                    "auth.client_secret",
                    "client_credentials grant requires a client secret",
                );
            },
            GrantKind::AuthorizationCode if self.auth.listen_port == 0 => {
                result.error("auth.listen_port", "callback port must be non-zero");
            },
            _ => {},
        }
        if self.auth.grant_kind() == GrantKind::AuthorizationCode {
            match url::Url::parse(&self.auth.listen_url) {
                Err(e) => result.error("auth.listen_url", format!("not a valid URL ({e})")),
                Ok(url) if url.host_str() == Some("localhost") => result.warning(
                    "auth.listen_url",
                    "callback listener binds 127.0.0.1; a browser resolving localhost to ::1 \
                     will miss it, use http://127.0.0.1",
                ),
                Ok(_) => {},
            }
        }
        if self.auth.callback_timeout_secs == 0 {
            result.error("auth.callback_timeout_secs", "timeout must be non-zero");
        }

        if self.chat.channel.trim().is_empty() {
            result.error("chat.channel", "channel is required");
        } else if self.chat.channel.starts_with('#') {
            result.warning("chat.channel", "leading '#' is added automatically");
        }
        if self.chat.bot_name.trim().is_empty() {
            result.error("chat.bot_name", "bot name is required");
        }
        if self.chat.message_interval_ms == 0 {
            result.error(
                "chat.message_interval_ms",
                "a zero interval would disable the outbound rate limit",
            );
        }
        if self.chat.connect_retry.max_attempts == 0 {
            result.error("chat.connect_retry.max_attempts", "must be at least 1");
        }

        result
    }
}
