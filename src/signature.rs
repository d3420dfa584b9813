//! Webhook signature verification.
//!
//! The email provider signs every delivery with ECDSA over P-256/SHA-256.
//! The signed message is the timestamp header value concatenated with the
//! exact raw request body bytes. The public key is distributed as
//! base64-encoded SPKI DER; signatures arrive base64-encoded DER.
//!
//! Verification is strict at request time: any decode, parse, or verify
//! failure rejects the request. Key handling is strict at startup: a
//! configured key that fails to decode aborts boot instead of silently
//! running unverified.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;

/// Errors decoding the configured verification key. Startup only; request
/// handling never sees these.
#[derive(Debug, thiserror::Error)]
pub enum KeyDecodeError {
    #[error("Verification key is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Verification key is not a valid P-256 SPKI document: {0}")]
    Spki(String),
}

/// How the webhook endpoint treats incoming signatures.
///
/// Resolved once at startup from configuration. With no key configured the
/// endpoint stays open and logs a warning per request; this keeps local
/// development working without provider credentials.
#[derive(Clone)]
pub enum SignaturePolicy {
    /// A key is configured: every request must carry a valid signature.
    Enforce(VerifyingKey),
    /// No key configured: accept everything, warn loudly.
    WarnAndAllow,
}

impl SignaturePolicy {
    /// Resolve the policy from the optionally configured base64 SPKI key.
    pub fn resolve(configured_key: Option<&str>) -> Result<Self, KeyDecodeError> {
        match configured_key {
            Some(encoded) if !encoded.trim().is_empty() => {
                let key = decode_verifying_key(encoded.trim())?;
                Ok(SignaturePolicy::Enforce(key))
            }
            _ => Ok(SignaturePolicy::WarnAndAllow),
        }
    }

    /// Decide whether a request passes the signature gate.
    ///
    /// Under `Enforce`, missing headers or any verification failure reject
    /// the request. Under `WarnAndAllow` everything passes.
    pub fn allows(&self, signature: Option<&str>, timestamp: Option<&str>, body: &[u8]) -> bool {
        match self {
            SignaturePolicy::Enforce(key) => match (signature, timestamp) {
                (Some(sig), Some(ts)) => verify_signature(key, ts, body, sig),
                _ => false,
            },
            SignaturePolicy::WarnAndAllow => {
                tracing::warn!(
                    "No webhook verification key configured; accepting unverified request"
                );
                true
            }
        }
    }
}

impl std::fmt::Debug for SignaturePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignaturePolicy::Enforce(_) => f.write_str("SignaturePolicy::Enforce"),
            SignaturePolicy::WarnAndAllow => f.write_str("SignaturePolicy::WarnAndAllow"),
        }
    }
}

/// Decode a base64(SPKI DER) P-256 public key.
pub fn decode_verifying_key(encoded: &str) -> Result<VerifyingKey, KeyDecodeError> {
    let der = BASE64.decode(encoded)?;
    VerifyingKey::from_public_key_der(&der).map_err(|e| KeyDecodeError::Spki(e.to_string()))
}

/// Verify a base64(DER) ECDSA signature over `timestamp ++ body`.
///
/// Returns `false` on any failure. Callers never learn whether the
/// signature was malformed or merely wrong.
pub fn verify_signature(
    key: &VerifyingKey,
    timestamp: &str,
    body: &[u8],
    signature_b64: &str,
) -> bool {
    let der = match BASE64.decode(signature_b64) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = match Signature::from_der(&der) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    key.verify(&message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;
    use p256::pkcs8::EncodePublicKey;
    use rand::rngs::OsRng;

    fn test_keypair() -> (SigningKey, String) {
        let signing_key = SigningKey::random(&mut OsRng);
        let spki = signing_key
            .verifying_key()
            .to_public_key_der()
            .expect("encode public key");
        (signing_key, BASE64.encode(spki.as_bytes()))
    }

    fn sign(key: &SigningKey, timestamp: &str, body: &[u8]) -> String {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        let signature: Signature = key.sign(&message);
        BASE64.encode(signature.to_der().as_bytes())
    }

    #[test]
    fn valid_signature_is_accepted() {
        let (signing_key, encoded_pub) = test_keypair();
        let key = decode_verifying_key(&encoded_pub).unwrap();

        let body = br#"[{"event":"open"}]"#;
        let sig = sign(&signing_key, "1700000000", body);

        assert!(verify_signature(&key, "1700000000", body, &sig));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let (signing_key, encoded_pub) = test_keypair();
        let key = decode_verifying_key(&encoded_pub).unwrap();

        let sig = sign(&signing_key, "1700000000", br#"[{"event":"open"}]"#);

        assert!(!verify_signature(
            &key,
            "1700000000",
            br#"[{"event":"click"}]"#,
            &sig
        ));
    }

    #[test]
    fn wrong_timestamp_is_rejected() {
        let (signing_key, encoded_pub) = test_keypair();
        let key = decode_verifying_key(&encoded_pub).unwrap();

        let body = br#"[]"#;
        let sig = sign(&signing_key, "1700000000", body);

        assert!(!verify_signature(&key, "1700000001", body, &sig));
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let (_, encoded_pub) = test_keypair();
        let key = decode_verifying_key(&encoded_pub).unwrap();

        assert!(!verify_signature(&key, "ts", b"body", "not-base64!!"));
        assert!(!verify_signature(
            &key,
            "ts",
            b"body",
            &BASE64.encode(b"valid base64, junk der")
        ));
    }

    #[test]
    fn malformed_key_fails_resolution() {
        assert!(decode_verifying_key("%%%").is_err());
        assert!(decode_verifying_key(&BASE64.encode(b"not spki")).is_err());
    }

    #[test]
    fn policy_enforce_requires_both_headers() {
        let (signing_key, encoded_pub) = test_keypair();
        let policy = SignaturePolicy::resolve(Some(&encoded_pub)).unwrap();

        let body = br#"[]"#;
        let sig = sign(&signing_key, "1700000000", body);

        assert!(policy.allows(Some(&sig), Some("1700000000"), body));
        assert!(!policy.allows(None, Some("1700000000"), body));
        assert!(!policy.allows(Some(&sig), None, body));
    }

    #[test]
    fn policy_without_key_allows_anything() {
        let policy = SignaturePolicy::resolve(None).unwrap();
        assert!(policy.allows(None, None, b"anything"));

        let blank = SignaturePolicy::resolve(Some("   ")).unwrap();
        assert!(blank.allows(Some("garbage"), Some("0"), b"anything"));
    }
}
