//! Shared authentication state.
//!
//! One [`AuthStore`] belongs to one session. Every request reads the current
//! token when it is built, so a token set after login applies to the next
//! request without rebuilding the backend.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;

#[derive(Debug, Clone, Default)]
pub struct AuthStore {
    token: Arc<RwLock<Option<String>>>,
}

impl AuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(token);
        store
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Forget the token (log out).
    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True when a non-blank token is present.
    pub fn is_valid(&self) -> bool {
        self.token().is_some_and(|token| !token.trim().is_empty())
    }

    /// Attach the `Authorization` header when a usable token is present.
    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token().and_then(|token| bearer(&token)) {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }
}

fn bearer(token: &str) -> Option<HeaderValue> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    HeaderValue::from_str(&format!("Bearer {}", token)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lifecycle() {
        let store = AuthStore::new();
        assert!(!store.is_valid());

        let shared = store.clone();
        store.set_token("abc");
        assert!(shared.is_valid());
        assert_eq!(shared.token().as_deref(), Some("abc"));

        shared.clear();
        assert!(!store.is_valid());
    }

    #[test]
    fn test_bearer_header() {
        assert_eq!(bearer("abc"), Some(HeaderValue::from_static("Bearer abc")));
        assert_eq!(bearer("  "), None);
        assert_eq!(bearer("bad\nvalue"), None);
    }
}
