//! Session token signing and verification.
//!
//! HMAC-SHA256 over three base64url segments joined by `.`, padding
//! stripped: header, payload, signature. Header is always the literal
//! `{"typ":"JWT","alg":"HS256"}`. Expiry is *not* checked here — callers
//! compare `exp` against wall clock.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"typ":"JWT","alg":"HS256"}"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPayload {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("signature does not match")]
    BadSignature,
}

#[derive(Debug, Deserialize)]
struct Header {
    typ: String,
    alg: String,
}

/// Stateless signer/verifier over a 32-byte deployment secret.
#[derive(Clone)]
pub struct TokenService {
    secret: [u8; 32],
}

impl TokenService {
    pub fn new(secret: [u8; 32]) -> Self {
        Self { secret }
    }

    /// Derive a 32-byte secret from an arbitrary-length configuration
    /// string via SHA-256, so operators can set `JWT_SECRET` to any
    /// passphrase rather than a raw 32-byte value.
    pub fn from_config_secret(raw: &str) -> Self {
        use sha2::Digest;
        let digest = sha2::Sha256::digest(raw.as_bytes());
        Self::new(digest.into())
    }

    pub fn build(&self, payload: &TokenPayload) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(HEADER_JSON);
        let payload_json = serde_json::to_string(payload).expect("TokenPayload always serializes");
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);

        let msg = format!("{header_b64}.{payload_b64}");
        let signature_b64 = URL_SAFE_NO_PAD.encode(self.sign(msg.as_bytes()));

        format!("{msg}.{signature_b64}")
    }

    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(TokenError::Malformed(
                "token must have exactly 3 segments".to_string(),
            ));
        }
        let [header_b64, payload_b64, signature_b64] = [parts[0], parts[1], parts[2]];

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|e| TokenError::Malformed(format!("invalid header base64: {e}")))?;
        let header: Header = serde_json::from_slice(&header_bytes)
            .map_err(|e| TokenError::Malformed(format!("invalid header json: {e}")))?;
        if header.typ != "JWT" {
            return Err(TokenError::Malformed("typ must be JWT".to_string()));
        }
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let msg = format!("{header_b64}.{payload_b64}");
        let expected_signature = self.sign(msg.as_bytes());
        let provided_signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::Malformed(format!("invalid signature base64: {e}")))?;

        // Constant-time comparison to avoid leaking signature bytes via timing.
        if !constant_time_eq(&expected_signature, &provided_signature) {
            return Err(TokenError::BadSignature);
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| TokenError::Malformed(format!("invalid payload base64: {e}")))?;
        let payload: TokenPayload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| TokenError::Malformed(format!("invalid payload json: {e}")))?;

        Ok(payload)
    }

    fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts a key of any size");
        mac.update(msg);
        mac.finalize().into_bytes().to_vec()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new([7u8; 32])
    }

    #[test]
    fn build_then_verify_round_trips() {
        let svc = service();
        let payload = TokenPayload {
            sub: "m1".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        };
        let token = svc.build(&payload);
        let recovered = svc.verify(&token).expect("valid token");
        assert_eq!(recovered, payload);
    }

    #[test]
    fn token_has_three_dot_separated_segments() {
        let svc = service();
        let token = svc.build(&TokenPayload {
            sub: "m1".to_string(),
            iat: 0,
            exp: 0,
        });
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='), "padding must be stripped");
    }

    #[test]
    fn tampering_any_segment_breaks_verification() {
        let svc = service();
        let token = svc.build(&TokenPayload {
            sub: "m1".to_string(),
            iat: 1,
            exp: 2,
        });

        for idx in 0..3 {
            let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
            let mut chars: Vec<char> = parts[idx].chars().collect();
            let last = chars.len() - 1;
            chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
            parts[idx] = chars.into_iter().collect();
            let tampered = parts.join(".");

            let result = svc.verify(&tampered);
            assert!(result.is_err(), "segment {idx} tamper should fail verify");
        }
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let svc = service();
        assert_eq!(
            svc.verify("a.b"),
            Err(TokenError::Malformed(
                "token must have exactly 3 segments".to_string()
            ))
        );
    }

    #[test]
    fn invalid_base64_in_a_three_segment_token_is_malformed() {
        let svc = service();
        let err = svc.verify("not-base64-!!.also-not-base64-!!.sig").unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let svc = service();
        let header = URL_SAFE_NO_PAD.encode(r#"{"typ":"JWT","alg":"HS512"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"x","iat":0,"exp":0}"#);
        let msg = format!("{header}.{payload}");
        let sig = URL_SAFE_NO_PAD.encode(svc.sign(msg.as_bytes()));
        let token = format!("{msg}.{sig}");

        assert_eq!(svc.verify(&token), Err(TokenError::UnsupportedAlgorithm));
    }

    #[test]
    fn signature_from_a_different_secret_is_rejected() {
        let svc_a = TokenService::new([1u8; 32]);
        let svc_b = TokenService::new([2u8; 32]);

        let token = svc_a.build(&TokenPayload {
            sub: "m1".to_string(),
            iat: 0,
            exp: 1_000,
        });
        assert_eq!(svc_b.verify(&token), Err(TokenError::BadSignature));
    }
}
