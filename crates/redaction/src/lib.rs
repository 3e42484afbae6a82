//! Secret redaction for proxy content.
//!
//! Proxy descriptors routinely embed credentials (basic-auth passwords,
//! client secrets, keystore passphrases). Everything excerpted from a bundle
//! goes through the [`Redactor`] before it leaves the process.

pub mod patterns;
pub mod redactor;

pub use redactor::{RedactionResult, RedactionStats, Redactor, RedactorConfig};

/// Default placeholder for redacted values.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Hash-only placeholder (shows hash of original value).
pub const HASH_PLACEHOLDER_PREFIX: &str = "[HASH:";
pub const HASH_PLACEHOLDER_SUFFIX: &str = "]";

/// Create a hash placeholder for a value.
pub fn hash_placeholder(value: &str) -> String {
    let hash = edgeshift_common::hash::sha256_str(value);
    format!("{}{}{}", HASH_PLACEHOLDER_PREFIX, &hash[..12], HASH_PLACEHOLDER_SUFFIX)
}

/// Redact a string with the default configuration.
pub fn redact(content: &str) -> String {
    Redactor::new().redact(content).content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_placeholder() {
        let placeholder = hash_placeholder("my-secret-value");
        assert!(placeholder.starts_with(HASH_PLACEHOLDER_PREFIX));
        assert!(placeholder.ends_with(HASH_PLACEHOLDER_SUFFIX));
        assert_eq!(placeholder.len(), 19); // [HASH: + 12 chars + ]
    }

    #[test]
    fn test_hash_placeholder_is_stable() {
        assert_eq!(hash_placeholder("abc"), hash_placeholder("abc"));
        assert_ne!(hash_placeholder("abc"), hash_placeholder("abd"));
    }
}
