//! VAPID key loading, validation and generation.

use std::fmt;

use base64::Engine as _;
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;

use crate::app::{NewsError, Result};

pub const VAPID_PUBLIC_KEY_ENV: &str = "NEWS_NOTIFICATIONS_VAPID_PUBLIC_KEY";
pub const VAPID_PRIVATE_KEY_ENV: &str = "NEWS_NOTIFICATIONS_VAPID_PRIVATE_KEY";
pub const VAPID_SUBJECT_ENV: &str = "NEWS_NOTIFICATIONS_SUBJECT";

/// An uncompressed P-256 point (65 bytes) is 87 base64url characters.
const PUBLIC_KEY_CHARS: std::ops::RangeInclusive<usize> = 80..=90;
/// A 32-byte scalar is 43 base64url characters.
const PRIVATE_KEY_CHARS: std::ops::RangeInclusive<usize> = 40..=50;

#[derive(Clone, PartialEq, Eq)]
pub struct VapidKeys {
    pub public_key: String,
    pub private_key: String,
    pub subject: String,
}

impl fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("subject", &self.subject)
            .finish()
    }
}

impl VapidKeys {
    pub fn new(public_key: &str, private_key: &str, subject: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
            subject: subject.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the three key variables through `lookup`. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| read_var(&lookup, name);

        Ok(Self {
            public_key: read(VAPID_PUBLIC_KEY_ENV)?,
            private_key: read(VAPID_PRIVATE_KEY_ENV)?,
            subject: read(VAPID_SUBJECT_ENV)?,
        })
    }

    /// Fails when the keys could not sign a push request.
    pub fn ensure_usable(&self) -> Result<()> {
        let validation = validate_vapid_keys(self);
        if !validation.valid {
            return Err(NewsError::VapidKey(validation.errors.join("; ")));
        }
        self.signing_key().map(|_| ())
    }

    pub(crate) fn signing_key(&self) -> Result<SigningKey> {
        let raw = decode_b64url(&self.private_key)
            .map_err(|e| NewsError::VapidKey(format!("Invalid private key encoding: {}", e)))?;
        SigningKey::from_slice(&raw)
            .map_err(|_| NewsError::VapidKey("Private key is not a valid P-256 scalar".to_string()))
    }
}

/// The public key alone, for handing to clients.
pub fn vapid_public_key_from_env() -> Result<String> {
    read_var(|name: &str| std::env::var(name).ok(), VAPID_PUBLIC_KEY_ENV)
}

fn read_var<F>(lookup: F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| NewsError::VapidKey(format!("{} is not set in environment variables", name)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VapidKeyValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Checks key format. Every violation is reported, not only the first.
pub fn validate_vapid_keys(keys: &VapidKeys) -> VapidKeyValidation {
    let mut errors = Vec::new();

    if keys.public_key.is_empty() {
        errors.push("Public key is empty".to_string());
    } else if !is_base64url(&keys.public_key) {
        errors.push("Public key contains invalid characters".to_string());
    } else if !PUBLIC_KEY_CHARS.contains(&keys.public_key.len()) {
        errors.push(format!(
            "Public key length is invalid (expected ~87 characters, got {})",
            keys.public_key.len()
        ));
    }

    if keys.private_key.is_empty() {
        errors.push("Private key is empty".to_string());
    } else if !is_base64url(&keys.private_key) {
        errors.push("Private key contains invalid characters".to_string());
    } else if !PRIVATE_KEY_CHARS.contains(&keys.private_key.len()) {
        errors.push(format!(
            "Private key length is invalid (expected ~43 characters, got {})",
            keys.private_key.len()
        ));
    }

    if keys.subject.is_empty() {
        errors.push("Subject is empty".to_string());
    } else if !(keys.subject.starts_with("mailto:") || keys.subject.starts_with("https://")) {
        errors.push("Subject must start with mailto: or https://".to_string());
    }

    VapidKeyValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Creates a fresh key pair for `subject`.
pub fn generate_vapid_keys(subject: &str) -> VapidKeys {
    let signing_key = SigningKey::random(&mut OsRng);
    let public_raw = signing_key.verifying_key().to_encoded_point(false);

    VapidKeys {
        public_key: encode_b64url(public_raw.as_bytes()),
        private_key: encode_b64url(&signing_key.to_bytes()),
        subject: subject.to_string(),
    }
}

pub(crate) fn is_base64url(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub(crate) fn decode_b64url(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(input.trim_end_matches('='))
}

pub(crate) fn encode_b64url(input: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(input)
}
