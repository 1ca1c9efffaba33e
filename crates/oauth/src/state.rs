use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::RngCore,
};

/// Random value binding an authorization request to its callback.
///
/// Created per attempt and moved into the [`CallbackServer`](crate::CallbackServer),
/// which accepts at most one callback for it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationState(String);

impl AuthorizationState {
    /// 32 random bytes, base64url encoded (43 chars).
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against the value returned in a callback without
    /// short-circuiting on the first differing byte.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let (a, b) = (self.0.as_bytes(), candidate.as_bytes());
        a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl From<String> for AuthorizationState {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for AuthorizationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthorizationState([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_states_are_unique_and_url_safe() {
        let a = AuthorizationState::generate();
        let b = AuthorizationState::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 43);
        assert!(
            a.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn matches_requires_exact_value() {
        let state = AuthorizationState::from("c3ab8aa6".to_string());
        assert!(state.matches("c3ab8aa6"));
        assert!(!state.matches("c3ab8aa7"));
        assert!(!state.matches("c3ab8aa"));
        assert!(!state.matches(""));
    }
}
