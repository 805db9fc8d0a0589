//! Session-bound tokens.
//!
//! # Responsibilities
//! - Keep one server-side token per session, keyed by the session cookie
//! - Expire tokens after a fixed lifetime
//! - Stay within a fixed number of sessions
//!
//! # Design Decisions
//! - The session cookie value is only used as a map key, never rewritten
//! - When full, expired entries go first, then the entry closest to expiry
//! - Lookups of expired entries behave exactly like missing entries

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::schema::{CsrfConfig, SessionConfig};
use crate::csrf::exchange::RequestView;
use crate::csrf::token::{CsrfToken, TokenCodec};
use crate::error::GateRejection;

#[derive(Debug)]
struct SessionEntry {
    token: CsrfToken,
    expires_at: Instant,
}

/// Bounded, expiring session → token map.
#[derive(Debug)]
pub struct SessionTokenStore {
    session_cookie: String,
    ttl: Duration,
    capacity: usize,
    entries: DashMap<String, SessionEntry>,
}

impl SessionTokenStore {
    pub fn new(session_cookie: impl Into<String>, ttl: Duration, capacity: usize) -> Self {
        Self {
            session_cookie: session_cookie.into(),
            ttl,
            capacity: capacity.max(1),
            entries: DashMap::new(),
        }
    }

    pub fn from_config(csrf: &CsrfConfig, session: &SessionConfig) -> Self {
        Self::new(
            session.cookie_name.clone(),
            Duration::from_secs(csrf.session_ttl_secs),
            csrf.session_capacity,
        )
    }

    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    /// The request's session id, if it carries a non-empty session cookie.
    pub fn session_id<R: RequestView + ?Sized>(&self, req: &R) -> Option<String> {
        req.cookie(&self.session_cookie)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generate and store a fresh token for `session_id`, replacing any
    /// previous one.
    pub fn issue(&self, codec: &TokenCodec, session_id: &str) -> CsrfToken {
        self.issue_at(codec, session_id, Instant::now())
    }

    /// The live token for `session_id`.
    pub fn current(&self, session_id: &str) -> Option<CsrfToken> {
        self.current_at(session_id, Instant::now())
    }

    /// Push the expiry of a live token one lifetime into the future.
    pub fn touch(&self, session_id: &str) -> bool {
        let now = Instant::now();
        match self.entries.get_mut(session_id) {
            Some(mut entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                true
            }
            _ => false,
        }
    }

    pub fn revoke(&self, session_id: &str) {
        self.entries.remove(session_id);
    }

    /// Check a submitted token against the session's copy.
    pub fn verify(
        &self,
        session_id: Option<&str>,
        submitted: Option<CsrfToken>,
    ) -> Result<CsrfToken, GateRejection> {
        self.verify_at(session_id, submitted, Instant::now())
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn issue_at(&self, codec: &TokenCodec, session_id: &str, now: Instant) -> CsrfToken {
        if !self.entries.contains_key(session_id) && self.entries.len() >= self.capacity {
            self.make_room(now);
        }

        let token = codec.generate();
        self.entries.insert(
            session_id.to_owned(),
            SessionEntry {
                token: token.clone(),
                expires_at: now + self.ttl,
            },
        );
        token
    }

    fn current_at(&self, session_id: &str, now: Instant) -> Option<CsrfToken> {
        let expired = match self.entries.get(session_id) {
            Some(entry) if entry.expires_at > now => return Some(entry.token.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries
                .remove_if(session_id, |_, entry| entry.expires_at <= now);
        }
        None
    }

    fn verify_at(
        &self,
        session_id: Option<&str>,
        submitted: Option<CsrfToken>,
        now: Instant,
    ) -> Result<CsrfToken, GateRejection> {
        let stored = session_id.and_then(|id| self.current_at(id, now));
        match (stored, submitted) {
            (Some(stored), Some(submitted)) => {
                if TokenCodec::equals(&stored, &submitted) {
                    Ok(stored)
                } else {
                    Err(GateRejection::TokenMismatch)
                }
            }
            (stored, submitted) => Err(GateRejection::TokenAbsent {
                cookie: stored.is_some(),
                submitted: submitted.is_some(),
            }),
        }
    }

    fn make_room(&self, now: Instant) {
        if self.sweep_at(now) > 0 {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            tracing::debug!(capacity = self.capacity, "Evicting oldest session token");
            self.entries.remove(&key);
        }
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

impl Default for SessionTokenStore {
    fn default() -> Self {
        Self::from_config(&CsrfConfig::default(), &SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};

    fn store(capacity: usize) -> SessionTokenStore {
        SessionTokenStore::new("session", Duration::from_secs(60), capacity)
    }

    #[test]
    fn test_session_id_from_cookie() {
        let store = store(4);
        let req = Request::builder()
            .header(header::COOKIE, "other=1; session=abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(store.session_id(&req).as_deref(), Some("abc"));

        let empty = Request::builder()
            .header(header::COOKIE, "session=")
            .body(Body::empty())
            .unwrap();
        assert!(store.session_id(&empty).is_none());
    }

    #[test]
    fn test_issue_then_verify() {
        let store = store(4);
        let codec = TokenCodec::default();
        let token = store.issue(&codec, "s1");

        assert!(store.verify(Some("s1"), Some(token.clone())).is_ok());
        assert!(matches!(
            store.verify(Some("s1"), Some(codec.generate())),
            Err(GateRejection::TokenMismatch)
        ));
        // Bound to its own session only.
        assert!(matches!(
            store.verify(Some("s2"), Some(token.clone())),
            Err(GateRejection::TokenAbsent { cookie: false, submitted: true })
        ));
        assert!(matches!(
            store.verify(None, Some(token)),
            Err(GateRejection::TokenAbsent { cookie: false, submitted: true })
        ));
        assert!(matches!(
            store.verify(Some("s1"), None),
            Err(GateRejection::TokenAbsent { cookie: true, submitted: false })
        ));
    }

    #[test]
    fn test_reissue_replaces_token() {
        let store = store(4);
        let codec = TokenCodec::default();
        let first = store.issue(&codec, "s1");
        let second = store.issue(&codec, "s1");

        assert_eq!(store.len(), 1);
        assert!(store.verify(Some("s1"), Some(first)).is_err());
        assert!(store.verify(Some("s1"), Some(second)).is_ok());
    }

    #[test]
    fn test_expired_token_is_absent() {
        let store = store(4);
        let codec = TokenCodec::default();
        let start = Instant::now();
        let token = store.issue_at(&codec, "s1", start);

        let later = start + Duration::from_secs(61);
        assert!(store.current_at("s1", later).is_none());
        assert!(store.is_empty());
        assert!(matches!(
            store.verify_at(Some("s1"), Some(token), later),
            Err(GateRejection::TokenAbsent { cookie: false, submitted: true })
        ));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = store(2);
        let codec = TokenCodec::default();
        let start = Instant::now();
        store.issue_at(&codec, "a", start);
        store.issue_at(&codec, "b", start + Duration::from_secs(1));
        store.issue_at(&codec, "c", start + Duration::from_secs(2));

        assert_eq!(store.len(), 2);
        let now = start + Duration::from_secs(3);
        assert!(store.current_at("a", now).is_none());
        assert!(store.current_at("b", now).is_some());
        assert!(store.current_at("c", now).is_some());
    }

    #[test]
    fn test_capacity_prefers_expired_entries() {
        let store = store(2);
        let codec = TokenCodec::default();
        let start = Instant::now();
        store.issue_at(&codec, "old", start);
        store.issue_at(&codec, "live", start + Duration::from_secs(30));
        store.issue_at(&codec, "new", start + Duration::from_secs(61));

        let now = start + Duration::from_secs(62);
        assert_eq!(store.len(), 2);
        assert!(store.current_at("live", now).is_some());
        assert!(store.current_at("new", now).is_some());
    }

    #[test]
    fn test_sweep_and_revoke() {
        let store = store(8);
        let codec = TokenCodec::default();
        let start = Instant::now();
        store.issue_at(&codec, "a", start);
        store.issue_at(&codec, "b", start + Duration::from_secs(30));

        assert_eq!(store.sweep_at(start + Duration::from_secs(61)), 1);
        assert_eq!(store.len(), 1);

        store.revoke("b");
        assert!(store.is_empty());
    }

    #[test]
    fn test_touch_extends_live_tokens_only() {
        let store = store(4);
        let codec = TokenCodec::default();
        assert!(!store.touch("missing"));
        store.issue(&codec, "s1");
        assert!(store.touch("s1"));
    }
}
