//! Regex patterns for detecting sensitive data in proxy content.
//!
//! Patterns exposing a `value` group only have that group replaced, so the
//! surrounding markup survives redaction.

use regex::Regex;
use std::sync::LazyLock;

/// Pattern for common secret key names in configs and credential fields.
pub static SECRET_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(password|passwd|pwd|passphrase|secret|token|api[_-]?key|apikey|private[_-]?key|client[_-]?secret|bearer|credentials?|service[_-]?account)").unwrap()
});

/// Pattern for XML elements whose text content is a literal secret.
pub static XML_SECRET_ELEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:password|passwd|passphrase|client[_-]?secret|secret[_-]?key|private[_-]?key|access[_-]?token|refresh[_-]?token|key[_-]?password|keystore[_-]?password)>(?P<value>[^<]+)</").unwrap()
});

/// Pattern for Authorization headers.
pub static AUTH_HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Authorization|X-Api-Key|X-Auth-Token|X-Access-Token):\s*(?P<value>\S+(?: [A-Za-z0-9._~+/=-]+)?)").unwrap()
});

/// Pattern for URLs carrying user info.
pub static URL_CREDENTIALS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[a-z][a-z0-9+.-]*://[^:/\s<>]+:(?P<value>[^@\s<>]+)@").unwrap());

/// Pattern for private keys (PEM format).
pub static PRIVATE_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)-----BEGIN\s+(?:RSA\s+|EC\s+)?PRIVATE\s+KEY-----.*?-----END\s+(?:RSA\s+|EC\s+)?PRIVATE\s+KEY-----").unwrap()
});

/// Pattern for JSON sensitive keys, as found in service account files.
pub static JSON_SENSITIVE_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)"(?:password|secret|client_secret|token|api[_-]?key|private[_-]?key|private_key_id|credentials?)"\s*:\s*"(?P<value>[^"]+)""#,
    )
    .unwrap()
});

/// Pattern for generic key=value assignments (query strings, properties).
pub static ASSIGNMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:api[_-]?key|apikey|client[_-]?secret|password|access[_-]?token)=(?P<value>[^&\s<>'\x22]{4,})").unwrap()
});

/// Check if a key name looks like it contains a secret.
pub fn is_sensitive_key(key: &str) -> bool {
    SECRET_KEY_PATTERN.is_match(key)
}

/// All patterns that should trigger redaction.
pub fn all_redaction_patterns() -> Vec<(&'static str, &'static Regex)> {
    vec![
        ("private_key", &PRIVATE_KEY_PATTERN),
        ("xml_secret_element", &XML_SECRET_ELEMENT_PATTERN),
        ("auth_header", &AUTH_HEADER_PATTERN),
        ("url_credentials", &URL_CREDENTIALS_PATTERN),
        ("json_sensitive", &JSON_SENSITIVE_KEY_PATTERN),
        ("assignment", &ASSIGNMENT_PATTERN),
    ]
}
