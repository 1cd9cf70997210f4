//! Webhook signature verification.
//!
//! Eventbrite deliveries may carry an `x-eventbrite-signature` header holding
//! the hex HMAC-SHA256 of the raw request body keyed by the shared webhook
//! secret. Verification runs before the body is parsed.
//!
//! # Security trade-offs
//!
//! - An empty secret disables verification entirely. This keeps first-time
//!   setup working before a secret is chosen, and every such delivery is
//!   logged as a configuration weakness.
//! - A configured secret with no header on the request is governed by
//!   [`MissingSignaturePolicy`]; the default accepts the delivery unverified.
//! - The header is compared as bytes, not as text: surrounding whitespace, a
//!   `sha256=` prefix and uppercase hex all decode to the same digest and
//!   are accepted. Anything that does not decode to exactly the HMAC is
//!   rejected.
//! - An accepted delivery's `api_url` is fetched with the Eventbrite token.
//!   An unverified delivery can therefore direct the token to any host
//!   unless `allowed_api_hosts` is set in the integration settings.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::SyncError;
use crate::settings::MissingSignaturePolicy;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-eventbrite-signature";

/// How an accepted delivery passed the signature gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// The header matched the HMAC of the body.
    Verified,
    /// No secret is configured, nothing was checked.
    NoSecretConfigured,
    /// A secret is configured but the delivery carried no signature.
    Unsigned,
}

impl SignatureCheck {
    /// Whether the body was authenticated.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Validates delivery signatures using HMAC-SHA256.
///
/// The comparison of the received and expected digests is constant time.
/// Neither the secret nor signature values are ever logged.
///
/// # Examples
///
/// ```rust
/// use eventbrite_sync_core::settings::MissingSignaturePolicy;
/// use eventbrite_sync_core::signature::{sign_payload, SignatureCheck, SignatureVerifier};
///
/// let body = br#"{"api_url":"https://www.eventbriteapi.com/v3/orders/1/"}"#;
/// let header = sign_payload("secret", body);
///
/// let check = SignatureVerifier::new()
///     .verify(body, Some(&header), "secret", MissingSignaturePolicy::Accept)
///     .unwrap();
/// assert_eq!(check, SignatureCheck::Verified);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Create a new verifier.
    pub fn new() -> Self {
        Self
    }

    /// Check a delivery against the configured secret.
    ///
    /// # Arguments
    ///
    /// * `payload` - The raw request body bytes
    /// * `signature` - The `x-eventbrite-signature` header value, if any
    /// * `secret` - The configured webhook secret, possibly empty
    /// * `policy` - Handling of a missing header when a secret is configured
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSignature`] when the header does not match
    /// the body, is not hex, or is missing under
    /// [`MissingSignaturePolicy::Reject`].
    pub fn verify(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        secret: &str,
        policy: MissingSignaturePolicy,
    ) -> Result<SignatureCheck, SyncError> {
        if secret.is_empty() {
            warn!("No webhook secret configured; accepting delivery without authentication");
            return Ok(SignatureCheck::NoSecretConfigured);
        }

        let signature = match signature.map(str::trim).filter(|s| !s.is_empty()) {
            Some(signature) => signature,
            None => {
                return match policy {
                    MissingSignaturePolicy::Accept => {
                        warn!(
                            header = SIGNATURE_HEADER,
                            "Delivery carries no signature; accepting unverified"
                        );
                        Ok(SignatureCheck::Unsigned)
                    }
                    MissingSignaturePolicy::Reject => {
                        warn!(
                            header = SIGNATURE_HEADER,
                            "Delivery carries no signature; rejecting"
                        );
                        Err(SyncError::InvalidSignature)
                    }
                };
            }
        };

        let received = match self.decode_signature(signature) {
            Some(bytes) => bytes,
            None => {
                warn!("Webhook signature is not valid hex");
                return Err(SyncError::InvalidSignature);
            }
        };

        let expected = compute_hmac(payload, secret);

        if self.constant_time_compare(&received, &expected) {
            Ok(SignatureCheck::Verified)
        } else {
            warn!("Webhook signature verification failed");
            Err(SyncError::InvalidSignature)
        }
    }

    /// Decode a hex digest, tolerating a `sha256=` prefix and either case.
    fn decode_signature(&self, signature: &str) -> Option<Vec<u8>> {
        let hex_part = signature.strip_prefix("sha256=").unwrap_or(signature);
        hex::decode(hex_part).ok()
    }

    fn constant_time_compare(&self, a: &[u8], b: &[u8]) -> bool {
        // Length is not secret: every valid digest is 32 bytes.
        if a.len() != b.len() {
            return false;
        }

        a.ct_eq(b).into()
    }
}

/// Compute the lowercase hex HMAC-SHA256 of `payload` keyed by `secret`.
///
/// This is the exact value a sender puts into [`SIGNATURE_HEADER`].
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    hex::encode(compute_hmac(payload, secret))
}

fn compute_hmac(payload: &[u8], secret: &str) -> Vec<u8> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    };
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
