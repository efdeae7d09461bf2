//! Message encryption (RFC 8291, `aes128gcm`) and VAPID authorization
//! (RFC 8292) for Web Push requests.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use chrono::Utc;
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use serde::Serialize;
use sha2::Sha256;
use url::Url;

use crate::app::{NewsError, Result};
use crate::push::keys::{decode_b64url, encode_b64url};

const SALT_LEN: usize = 16;
const PUBLIC_KEY_LEN: usize = 65;
const AUTH_SECRET_LEN: usize = 16;
const TAG_LEN: usize = 16;
const RECORD_SIZE: u32 = 4096;
const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;
/// Largest plaintext that keeps the whole body within 4096 bytes.
pub const MAX_PLAINTEXT_LEN: usize = RECORD_SIZE as usize - HEADER_LEN - TAG_LEN - 1;

pub const VAPID_JWT_TTL_SECS: i64 = 12 * 60 * 60;

const IKM_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Encrypts `plaintext` for a subscription's `p256dh`/`auth` keys and
/// returns the complete `aes128gcm` request body.
pub fn encrypt_payload(plaintext: &[u8], p256dh: &str, auth: &str) -> Result<Vec<u8>> {
    let remote_raw = decode_b64url(p256dh)
        .map_err(|e| NewsError::Other(format!("Invalid p256dh key: {}", e)))?;
    let auth_secret = decode_b64url(auth)
        .map_err(|e| NewsError::Other(format!("Invalid auth secret: {}", e)))?;

    if remote_raw.len() != PUBLIC_KEY_LEN {
        return Err(NewsError::Other("Invalid p256dh key length".to_string()));
    }
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(NewsError::Other("Invalid auth secret length".to_string()));
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let local_secret = EphemeralSecret::random(&mut OsRng);

    encrypt_with(plaintext, &remote_raw, &auth_secret, &salt, &local_secret)
}

fn encrypt_with(
    plaintext: &[u8],
    remote_raw: &[u8],
    auth_secret: &[u8],
    salt: &[u8; SALT_LEN],
    local_secret: &EphemeralSecret,
) -> Result<Vec<u8>> {
    if plaintext.is_empty() {
        return Err(NewsError::Other("Push payload cannot be empty".to_string()));
    }
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(NewsError::Other(format!(
            "Push payload too large ({} bytes, max {})",
            plaintext.len(),
            MAX_PLAINTEXT_LEN
        )));
    }

    let remote_pub = PublicKey::from_sec1_bytes(remote_raw)
        .map_err(|_| NewsError::Other("p256dh is not a valid P-256 point".to_string()))?;
    let local_pub = local_secret.public_key().to_encoded_point(false);
    let local_raw = local_pub.as_bytes();

    let shared = local_secret.diffie_hellman(&remote_pub);

    let mut ikm_info = Vec::with_capacity(IKM_INFO_PREFIX.len() + PUBLIC_KEY_LEN * 2);
    ikm_info.extend_from_slice(IKM_INFO_PREFIX);
    ikm_info.extend_from_slice(remote_raw);
    ikm_info.extend_from_slice(local_raw);

    let ikm = hkdf_sha256(auth_secret, shared.raw_secret_bytes().as_slice(), &ikm_info, 32)?;
    let cek = hkdf_sha256(salt, &ikm, CEK_INFO, 16)?;
    let nonce = hkdf_sha256(salt, &ikm, NONCE_INFO, 12)?;

    // Single record: content followed by the last-record delimiter.
    let mut record = Vec::with_capacity(plaintext.len() + 1);
    record.extend_from_slice(plaintext);
    record.push(0x02);

    let cipher = Aes128Gcm::new_from_slice(&cek)
        .map_err(|_| NewsError::Other("Invalid content encryption key length".to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), record.as_slice())
        .map_err(|_| NewsError::Other("AES-GCM encryption failed".to_string()))?;

    let mut body = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    body.extend_from_slice(salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(PUBLIC_KEY_LEN as u8);
    body.extend_from_slice(local_raw);
    body.extend_from_slice(&ciphertext);

    Ok(body)
}

fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8], len: usize) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|_| NewsError::Other("HKDF expand failed".to_string()))?;
    Ok(okm)
}

/// The JWT audience: scheme, host and port of the push endpoint.
pub fn push_service_audience(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint)?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(NewsError::Other(format!(
            "Push endpoint has no origin: {}",
            endpoint
        )));
    }
    Ok(origin.ascii_serialization())
}

/// Builds the value of the `Authorization` header for `endpoint`.
pub fn vapid_authorization(
    endpoint: &str,
    subject: &str,
    public_key: &str,
    signing_key: &SigningKey,
) -> Result<String> {
    let audience = push_service_audience(endpoint)?;
    let exp = Utc::now().timestamp() + VAPID_JWT_TTL_SECS;
    let jwt = build_vapid_jwt(&audience, subject, exp, signing_key)?;
    Ok(format!("vapid t={}, k={}", jwt, public_key))
}

fn build_vapid_jwt(audience: &str, subject: &str, exp: i64, signing_key: &SigningKey) -> Result<String> {
    #[derive(Serialize)]
    struct Header {
        typ: &'static str,
        alg: &'static str,
    }

    #[derive(Serialize)]
    struct Claims<'a> {
        aud: &'a str,
        exp: i64,
        sub: &'a str,
    }

    let header = encode_segment(&Header {
        typ: "JWT",
        alg: "ES256",
    })?;
    let claims = encode_segment(&Claims {
        aud: audience,
        exp,
        sub: subject,
    })?;

    let signing_input = format!("{}.{}", header, claims);
    let signature: Signature = signing_key.sign(signing_input.as_bytes());

    Ok(format!(
        "{}.{}",
        signing_input,
        encode_b64url(signature.to_bytes().as_slice())
    ))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| NewsError::Other(format!("JWT serialization failed: {}", e)))?;
    Ok(encode_b64url(&json))
}
