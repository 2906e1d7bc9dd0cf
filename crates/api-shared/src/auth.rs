//! Telephony webhook signature validation.
//!
//! The provider signs each webhook with its account auth token: the full request URL is
//! concatenated with every form parameter (sorted by name, each name immediately followed
//! by its value), HMAC-SHA1'd with the token, and sent base64-encoded in a request header.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the provider's request signature.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing webhook signature")]
    MissingSignature,
    #[error("malformed webhook signature")]
    MalformedSignature,
    #[error("webhook signature mismatch")]
    SignatureMismatch,
    #[error("webhook secret is empty")]
    EmptySecret,
}

fn mac_for(secret: &str, url: &str, params: &[(String, String)]) -> Result<HmacSha1, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::EmptySecret);
    }
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::EmptySecret)?;
    mac.update(url.as_bytes());

    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Ok(mac)
}

/// Compute the signature the provider would send for this request.
///
/// # Errors
///
/// Returns [`AuthError::EmptySecret`] if `secret` is empty.
pub fn sign_webhook(secret: &str, url: &str, params: &[(String, String)]) -> Result<String, AuthError> {
    let mac = mac_for(secret, url, params)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Validate a webhook signature in constant time.
///
/// # Errors
///
/// Returns an [`AuthError`] when the signature is absent, not base64, or does not match.
pub fn validate_webhook_signature(
    secret: &str,
    url: &str,
    params: &[(String, String)],
    signature: Option<&str>,
) -> Result<(), AuthError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingSignature)?;
    let expected = STANDARD
        .decode(signature)
        .map_err(|_| AuthError::MalformedSignature)?;
    mac_for(secret, url, params)?
        .verify_slice(&expected)
        .map_err(|_| AuthError::SignatureMismatch)
}
