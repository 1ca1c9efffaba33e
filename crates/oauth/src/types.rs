use std::time::{Duration, SystemTime};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

/// Access credential returned by the token endpoint.
///
/// Owned by one chat session at a time and never written to disk.
#[derive(Clone)]
pub struct Credential {
    pub access_token: Secret<String>,
    pub token_type: String,
    pub expires_in_seconds: u64,
    pub obtained_at: SystemTime,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in_seconds: u64,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            token_type: token_type.into(),
            expires_in_seconds,
            obtained_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        self.obtained_at + Duration::from_secs(self.expires_in_seconds)
    }

    /// Value for the chat `PASS` line, which expects an `oauth:` prefix.
    #[must_use]
    pub fn irc_password(&self) -> String {
        let token = self.access_token.expose_secret();
        if token.starts_with("oauth:") {
            token.clone()
        } else {
            format!("oauth:{token}")
        }
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.token_type == other.token_type
            && self.expires_in_seconds == other.expires_in_seconds
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

/// Wire shape of a token endpoint response.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "bearer".into()
}

impl From<TokenResponse> for Credential {
    fn from(resp: TokenResponse) -> Self {
        Self::new(resp.access_token, resp.token_type, resp.expires_in)
    }
}
