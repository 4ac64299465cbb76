//! Bearer-token state for the catalog client.
//!
//! ```text
//! Unauthenticated ──401──▶ RefreshPending ──token──▶ Authenticated
//!        ▲                        │                      │
//!        │                        └──failure──▶ Failed   └──401──▶ RefreshPending
//! ```
//!
//! A refresh is attempted at most once per logical call; the client tracks
//! that per call, this type only tracks the token.

use super::transport::Credentials;

/// Process-wide authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No token yet; requests go out without credentials.
    #[default]
    Unauthenticated,
    Authenticated(String),
    /// A 401 was seen and a new token is being fetched.
    RefreshPending,
    /// The last refresh failed. The next 401 may try again.
    Failed,
}

impl AuthState {
    /// Start authenticated with a pre-issued token (API key).
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            Self::Unauthenticated
        } else {
            Self::Authenticated(token)
        }
    }

    /// Credentials to attach to the next request.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        match self {
            Self::Authenticated(token) => Credentials::Bearer(token.clone()),
            Self::Unauthenticated | Self::RefreshPending | Self::Failed => Credentials::None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Drop the current token and mark a refresh in flight.
    pub fn begin_refresh(&mut self) {
        *self = Self::RefreshPending;
    }

    pub fn complete(&mut self, token: String) {
        *self = Self::Authenticated(token);
    }

    pub fn fail(&mut self) {
        *self = Self::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut state = AuthState::default();
        assert_eq!(state.credentials(), Credentials::None);

        state.begin_refresh();
        assert_eq!(state, AuthState::RefreshPending);
        state.complete("jwt-1".into());
        assert_eq!(state.credentials(), Credentials::Bearer("jwt-1".into()));

        state.begin_refresh();
        state.fail();
        assert_eq!(state, AuthState::Failed);
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_with_token() {
        assert!(AuthState::with_token("key").is_authenticated());
        assert_eq!(AuthState::with_token("  "), AuthState::Unauthenticated);
    }
}
