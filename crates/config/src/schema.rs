use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Grant type value that selects the client-credentials token strategy.
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub auth: AuthConfig,
    pub chat: ChatConfig,
    pub supervisor: SupervisorConfig,
}

/// Which token acquisition strategy the auth settings describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    ClientCredentials,
    AuthorizationCode,
}

/// OAuth application settings.
///
/// Field aliases match the keys of the platform credential file, so that file
/// can be dropped in unchanged as the `auth` table.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(alias = "ClientID")]
    pub client_id: String,

    #[serde(
        alias = "Secret",
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_secret: Option<Secret<String>>,

    #[serde(alias = "TokenURL")]
    pub token_url: String,

    /// OAuth grant type (`client_credentials` or `authorization_code`).
    #[serde(alias = "Permissions")]
    pub grant_type: String,

    /// Space separated scope list requested on the authorization page.
    #[serde(alias = "Scope")]
    pub scope: String,

    /// Base URL of the local redirect target, without the port. The callback
    /// listener binds 127.0.0.1, so this should name that address.
    #[serde(alias = "ListenURL")]
    pub listen_url: String,

    #[serde(alias = "ListenPort")]
    pub listen_port: u16,

    pub auth_url: String,
    pub validate_url: String,
    pub callback_path: String,
    pub callback_timeout_secs: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn grant_kind(&self) -> GrantKind {
        if self.grant_type == CLIENT_CREDENTIALS_GRANT {
            GrantKind::ClientCredentials
        } else {
            GrantKind::AuthorizationCode
        }
    }

    #[must_use]
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            token_url: "https://id.twitch.tv/oauth2/token".into(),
            grant_type: "authorization_code".into(),
            scope: "chat:read chat:edit".into(),
            listen_url: "http://127.0.0.1".into(),
            listen_port: 3000,
            auth_url: "https://id.twitch.tv/oauth2/authorize".into(),
            validate_url: "https://id.twitch.tv/oauth2/validate".into(),
            callback_path: "/".into(),
            callback_timeout_secs: 120,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_url", &self.token_url)
            .field("grant_type", &self.grant_type)
            .field("listen_port", &self.listen_port)
            .finish_non_exhaustive()
    }
}

/// Chat server and channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub server_addr: String,
    pub port: u16,
    /// Channel to join, without the leading `#`.
    pub channel: String,
    pub bot_name: String,
    /// Identity allowed to run lifecycle commands. Defaults to the channel name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Minimum interval between two outbound chat messages.
    pub message_interval_ms: u64,
    pub connect_retry: RetryConfig,
}

impl ChatConfig {
    #[must_use]
    pub fn owner(&self) -> &str {
        self.owner
            .as_deref()
            .unwrap_or(&self.channel)
            .trim_start_matches('#')
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.server_addr, self.port)
    }

    #[must_use]
    pub fn message_interval(&self) -> Duration {
        Duration::from_millis(self.message_interval_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server_addr: "irc.chat.twitch.tv".into(),
            port: 6667,
            channel: String::new(),
            bot_name: String::new(),
            owner: None,
            message_interval_ms: 1500,
            connect_retry: RetryConfig::default(),
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_attempts: u32,
}

impl RetryConfig {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            max_attempts: 8,
        }
    }
}

/// Restart policy for the bot supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub restart_backoff_ms: u64,
    /// Upper bound on session restarts; unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_restarts: Option<u32>,
}

impl SupervisorConfig {
    #[must_use]
    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_backoff_ms: 1000,
            max_restarts: None,
        }
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_file_keys_are_accepted() {
        let json = r#"{
            "Secret": "s3cr3t",
            "ClientID": "abc123",
            "TokenURL": "https://id.twitch.tv/oauth2/token",
            "Permissions": "client_credentials",
            "Scope": "chat:read",
            "ListenURL": "http://localhost",
            "ListenPort": 3000
        }"#;
        let auth: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(auth.client_id, "abc123");
        assert_eq!(
            auth.client_secret.as_ref().map(|s| s.expose_secret().as_str()),
            Some("s3cr3t")
        );
        assert_eq!(auth.grant_kind(), GrantKind::ClientCredentials);
        assert_eq!(auth.scope, "chat:read");
        // unspecified fields keep their defaults
        assert_eq!(auth.validate_url, "https://id.twitch.tv/oauth2/validate");
    }

    #[test]
    fn grant_kind_defaults_to_authorization_code() {
        assert_eq!(
            AuthConfig::default().grant_kind(),
            GrantKind::AuthorizationCode
        );
    }

    #[test]
    fn default_listen_url_matches_loopback_bind() {
        assert_eq!(AuthConfig::default().listen_url, "http://127.0.0.1");
    }

    #[test]
    fn owner_falls_back_to_channel() {
        let mut chat = ChatConfig {
            channel: "testchannel".into(),
            ..Default::default()
        };
        assert_eq!(chat.owner(), "testchannel");
        chat.owner = Some("someone".into());
        assert_eq!(chat.owner(), "someone");
    }

    #[test]
    fn owner_drops_channel_hash_prefix() {
        let chat = ChatConfig {
            channel: "#testchannel".into(),
            ..Default::default()
        };
        assert_eq!(chat.owner(), "testchannel");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            max_attempts: 10,
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(4), Duration::from_millis(800));
        assert_eq!(retry.backoff(5), Duration::from_millis(1000));
        assert_eq!(retry.backoff(60), Duration::from_millis(1000));
    }

    #[test]
    fn debug_redacts_secret() {
        let auth = AuthConfig {
            client_secret: Some(Secret::new("hunter2".into())),
            ..Default::default()
        };
        let dbg = format!("{auth:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
