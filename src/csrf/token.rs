//! Token generation and comparison.
//!
//! # Responsibilities
//! - Draw fixed-length tokens from a cryptographically secure source
//! - Compare tokens without timing side-channels
//! - Validate raw wire values before they reach comparison
//!
//! # Design Decisions
//! - Thread-local CSPRNG (reseeded from the OS), safe under concurrent requests
//! - Entropy availability is probed once at startup, never per request
//! - `CsrfToken` has no `PartialEq`: the only equality is `TokenCodec::equals`

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::{Choice, ConstantTimeEq};

use crate::error::ConfigError;

/// Smallest accepted amount of token entropy in bytes.
pub const MIN_TOKEN_BYTES: usize = 32;

/// Largest accepted amount of token entropy in bytes.
pub const MAX_TOKEN_BYTES: usize = 256;

/// An opaque CSRF token in its external (lowercase hex) representation.
#[derive(Clone)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Accept a value read off the wire.
    ///
    /// Only exactly `encoded_len` lowercase hex characters are accepted.
    /// Anything else returns `None` so that callers treat it exactly like a
    /// missing token.
    pub fn from_wire(raw: &str, encoded_len: usize) -> Option<Self> {
        let value = raw.trim();
        if value.len() != encoded_len || encoded_len == 0 {
            return None;
        }
        if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return None;
        }
        Some(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Never print the value itself.
impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CsrfToken({} chars)", self.0.len())
    }
}

/// Produces and compares unforgeable tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenCodec {
    token_bytes: usize,
}

impl TokenCodec {
    /// Create a codec emitting `token_bytes` bytes of entropy per token.
    ///
    /// Values outside [`MIN_TOKEN_BYTES`]..=[`MAX_TOKEN_BYTES`] are clamped;
    /// config validation rejects them before this point.
    pub fn new(token_bytes: usize) -> Self {
        Self {
            token_bytes: token_bytes.clamp(MIN_TOKEN_BYTES, MAX_TOKEN_BYTES),
        }
    }

    /// Confirm the operating system entropy source is usable.
    ///
    /// Called once during startup. A failure here is fatal: the process must
    /// not serve requests without a secure random source.
    pub fn probe_entropy() -> Result<(), ConfigError> {
        let mut probe = [0_u8; MIN_TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut probe)
            .map_err(|e| ConfigError::EntropyUnavailable(e.to_string()))
    }

    /// Number of hex characters in every generated token.
    pub fn encoded_len(&self) -> usize {
        self.token_bytes * 2
    }

    /// Parse a wire value of the shape this codec generates.
    pub fn parse(&self, raw: &str) -> Option<CsrfToken> {
        CsrfToken::from_wire(raw, self.encoded_len())
    }

    /// Generate a fresh token.
    pub fn generate(&self) -> CsrfToken {
        let mut buf = vec![0_u8; self.token_bytes];
        rand::thread_rng().fill_bytes(&mut buf);
        CsrfToken(hex::encode(buf))
    }

    /// Compare two tokens in constant time.
    ///
    /// The loop always runs over the longer of the two inputs, so neither the
    /// position of the first difference nor which side was shorter shows up
    /// in the running time.
    pub fn equals(a: &CsrfToken, b: &CsrfToken) -> bool {
        Self::equals_bytes(a.0.as_bytes(), b.0.as_bytes())
    }

    fn equals_bytes(a: &[u8], b: &[u8]) -> bool {
        let len = a.len().max(b.len());
        let mut same: Choice = a.len().ct_eq(&b.len());
        for i in 0..len {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            same &= x.ct_eq(&y);
        }
        same.into()
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(MIN_TOKEN_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flip(token: &CsrfToken, index: usize) -> CsrfToken {
        let mut bytes = token.as_str().as_bytes().to_vec();
        bytes[index] = if bytes[index] == b'a' { b'b' } else { b'a' };
        CsrfToken::from_wire(std::str::from_utf8(&bytes).unwrap(), bytes.len()).unwrap()
    }

    #[test]
    fn test_generate_is_fixed_length_hex() {
        let codec = TokenCodec::default();
        let token = codec.generate();
        assert_eq!(token.len(), 64);
        assert_eq!(token.len(), codec.encoded_len());
        assert!(token.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(!token.as_str().bytes().any(|b| b.is_ascii_uppercase()));
    }

    #[test]
    fn test_short_entropy_is_raised_to_minimum() {
        let codec = TokenCodec::new(8);
        assert_eq!(codec.generate().len(), MIN_TOKEN_BYTES * 2);
    }

    #[test]
    fn test_equals_self() {
        let codec = TokenCodec::default();
        let token = codec.generate();
        assert!(TokenCodec::equals(&token, &token.clone()));
    }

    #[test]
    fn test_equals_rejects_every_single_byte_near_miss() {
        let token = TokenCodec::default().generate();
        for i in 0..token.len() {
            let other = flip(&token, i);
            assert!(!TokenCodec::equals(&token, &other), "near miss at {}", i);
            assert!(!TokenCodec::equals(&other, &token), "near miss at {}", i);
        }
    }

    #[test]
    fn test_equals_rejects_length_mismatch() {
        let token = TokenCodec::default().generate();
        let prefix = CsrfToken(token.as_str()[..63].to_owned());
        assert!(!TokenCodec::equals(&token, &prefix));
        assert!(!TokenCodec::equals(&prefix, &token));

        // Padding bytes must not make a shorter zero-suffixed value compare equal.
        assert!(!TokenCodec::equals_bytes(b"abc", b"abc\0"));
    }

    #[test]
    fn test_from_wire_rejects_wrong_shape() {
        let codec = TokenCodec::default();
        let token = codec.generate();

        assert!(codec.parse("").is_none());
        assert!(codec.parse("a").is_none());
        assert!(codec.parse(&" ".repeat(64)).is_none());
        assert!(codec.parse(&token.as_str()[..62]).is_none());
        assert!(codec.parse(&format!("{}00", token.as_str())).is_none());
        assert!(codec.parse(&token.as_str().to_uppercase()).is_none());
        assert!(codec.parse(&"g".repeat(64)).is_none());
        assert!(CsrfToken::from_wire("", 0).is_none());

        let padded = format!(" {} ", token.as_str());
        assert_eq!(codec.parse(&padded).unwrap().as_str(), token.as_str());
    }

    #[test]
    fn test_debug_does_not_leak_value() {
        let token = TokenCodec::default().generate();
        let printed = format!("{:?}", token);
        assert!(!printed.contains(token.as_str()));
        assert_eq!(printed, "CsrfToken(64 chars)");
    }

    #[test]
    fn test_probe_entropy() {
        assert!(TokenCodec::probe_entropy().is_ok());
    }
}
