//! Shared-secret (API key) comparison.

use subtle::ConstantTimeEq;

/// A configured shared secret, compared in constant time.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl core::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

impl SharedSecret {
    /// `None` when the configured value is empty (no secret configured).
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        (!value.is_empty()).then_some(Self(value))
    }

    /// Whether the caller-provided value equals the secret.
    pub fn matches(&self, provided: Option<&str>) -> bool {
        provided.is_some_and(|p| bool::from(p.as_bytes().ct_eq(self.0.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_is_not_a_secret() {
        assert!(SharedSecret::new("").is_none());
        assert!(SharedSecret::new("k").is_some());
    }

    #[test]
    fn matches_only_the_exact_value() {
        let secret = SharedSecret::new("s3cret").unwrap();
        assert!(secret.matches(Some("s3cret")));
        assert!(!secret.matches(Some("s3cre")));
        assert!(!secret.matches(Some("s3cret ")));
        assert!(!secret.matches(Some("")));
        assert!(!secret.matches(None));
    }

    #[test]
    fn debug_is_redacted() {
        let secret = SharedSecret::new("s3cret").unwrap();
        assert_eq!(format!("{secret:?}"), "SharedSecret(..)");
    }
}
