#![forbid(unsafe_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use quill_kernel_contracts::document::DocumentId;
use quill_kernel_contracts::identity::{EmailAddress, UserId};
use quill_kernel_contracts::token::{CapabilityClaims, SessionClaims, TokenAudience};
use quill_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};

const MIN_SECRET_LEN: usize = 16;
const SHA256_BLOCK_LEN: usize = 64;

/// Default capability-link lifetime: 7 days, in nanoseconds.
pub const DEFAULT_CAPABILITY_TTL_NS: u64 = 7 * 24 * 60 * 60 * 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSignerConfig {
    pub capability_ttl_ns: u64,
    pub session_ttl_ns: u64,
}

impl TokenSignerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            capability_ttl_ns: DEFAULT_CAPABILITY_TTL_NS,
            session_ttl_ns: 24 * 60 * 60 * 1_000_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    InvalidSignature,
    Expired,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::InvalidSignature => write!(f, "token signature is invalid"),
            TokenError::Expired => write!(f, "token is expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Wire payload shared by both token kinds: `payload_b64.sig_b64`, URL-safe
/// base64 without padding, HMAC-SHA256 over the encoded payload.
#[derive(Debug, Serialize, Deserialize)]
struct ClaimsWire {
    aud: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    iat_ns: u64,
    exp_ns: u64,
    jti: String,
}

/// Mints and verifies self-contained bearer tokens. Verification is a pure
/// function of the token, the shared secret, and the caller-supplied clock;
/// no server-side grant table exists.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Result<Self, ContractViolation> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(ContractViolation::InvalidValue {
                field: "token_signer.secret",
                reason: "must be at least 16 bytes",
            });
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    /// A signer with a process-local random secret. Tokens minted by one
    /// instance will not verify against another; intended for tests and
    /// single-process deployments without a configured secret.
    pub fn random() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Self {
            secret: secret.to_vec(),
        }
    }

    pub fn issue_capability(&self, claims: &CapabilityClaims) -> Result<String, TokenError> {
        claims.validate().map_err(|_| TokenError::Malformed)?;
        self.sign_wire(&ClaimsWire {
            aud: TokenAudience::Sign.as_str().to_string(),
            doc: Some(claims.document_id.as_str().to_string()),
            email: Some(claims.signer_email.as_str().to_string()),
            sub: None,
            iat_ns: claims.issued_at.0,
            exp_ns: claims.expires_at.0,
            jti: random_jti(),
        })
    }

    pub fn verify_capability(
        &self,
        token: &str,
        now: MonotonicTimeNs,
    ) -> Result<CapabilityClaims, TokenError> {
        let wire = self.verify_wire(token, TokenAudience::Sign, now)?;
        let document_id = DocumentId::new(wire.doc.ok_or(TokenError::Malformed)?)
            .map_err(|_| TokenError::Malformed)?;
        let signer_email = EmailAddress::new(wire.email.ok_or(TokenError::Malformed)?)
            .map_err(|_| TokenError::Malformed)?;
        CapabilityClaims::v1(
            document_id,
            signer_email,
            MonotonicTimeNs(wire.iat_ns),
            MonotonicTimeNs(wire.exp_ns),
        )
        .map_err(|_| TokenError::Malformed)
    }

    pub fn issue_session(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        claims.validate().map_err(|_| TokenError::Malformed)?;
        self.sign_wire(&ClaimsWire {
            aud: TokenAudience::Session.as_str().to_string(),
            doc: None,
            email: None,
            sub: Some(claims.user_id.as_str().to_string()),
            iat_ns: claims.issued_at.0,
            exp_ns: claims.expires_at.0,
            jti: random_jti(),
        })
    }

    pub fn verify_session(
        &self,
        token: &str,
        now: MonotonicTimeNs,
    ) -> Result<SessionClaims, TokenError> {
        let wire = self.verify_wire(token, TokenAudience::Session, now)?;
        let user_id = UserId::new(wire.sub.ok_or(TokenError::Malformed)?)
            .map_err(|_| TokenError::Malformed)?;
        SessionClaims::v1(
            user_id,
            MonotonicTimeNs(wire.iat_ns),
            MonotonicTimeNs(wire.exp_ns),
        )
        .map_err(|_| TokenError::Malformed)
    }

    fn sign_wire(&self, wire: &ClaimsWire) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(wire).map_err(|_| TokenError::Malformed)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let sig = hmac_sha256(&self.secret, payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(sig);
        Ok(format!("{payload_b64}.{sig_b64}"))
    }

    fn verify_wire(
        &self,
        token: &str,
        audience: TokenAudience,
        now: MonotonicTimeNs,
    ) -> Result<ClaimsWire, TokenError> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let claimed_sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;
        let expected_sig = hmac_sha256(&self.secret, payload_b64.as_bytes());
        if !constant_time_eq(&claimed_sig, &expected_sig) {
            return Err(TokenError::InvalidSignature);
        }
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let wire: ClaimsWire =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if wire.aud != audience.as_str() {
            return Err(TokenError::InvalidSignature);
        }
        if now.0 > wire.exp_ns {
            return Err(TokenError::Expired);
        }
        Ok(wire)
    }
}

fn random_jti() -> String {
    let mut nonce = [0u8; 8];
    OsRng.fill_bytes(&mut nonce);
    URL_SAFE_NO_PAD.encode(nonce)
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut block = [0u8; SHA256_BLOCK_LEN];
    if key.len() > SHA256_BLOCK_LEN {
        block[..32].copy_from_slice(&Sha256::digest(key));
    } else {
        block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    let ipad: Vec<u8> = block.iter().map(|b| b ^ 0x36).collect();
    inner.update(&ipad);
    inner.update(message);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    let opad: Vec<u8> = block.iter().map(|b| b ^ 0x5c).collect();
    outer.update(&opad);
    outer.update(inner_digest);
    outer.finalize().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL_NS: u64 = DEFAULT_CAPABILITY_TTL_NS;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"unit-test-shared-secret-material").unwrap()
    }

    fn capability(issued_at: u64) -> CapabilityClaims {
        CapabilityClaims::v1(
            DocumentId::new("doc_000001").unwrap(),
            EmailAddress::new("signer@example.com").unwrap(),
            MonotonicTimeNs(issued_at),
            MonotonicTimeNs(issued_at + TTL_NS),
        )
        .unwrap()
    }

    #[test]
    fn at_tok_01_capability_round_trip_preserves_claims() {
        let s = signer();
        let claims = capability(1_000);
        let token = s.issue_capability(&claims).unwrap();

        let verified = s.verify_capability(&token, MonotonicTimeNs(2_000)).unwrap();
        assert_eq!(verified.document_id.as_str(), "doc_000001");
        assert_eq!(verified.signer_email.as_str(), "signer@example.com");
        assert_eq!(verified.expires_at.0, 1_000 + TTL_NS);
    }

    #[test]
    fn at_tok_02_verifies_up_to_expiry_and_fails_after() {
        let s = signer();
        let token = s.issue_capability(&capability(1_000)).unwrap();

        assert!(s
            .verify_capability(&token, MonotonicTimeNs(1_000 + TTL_NS))
            .is_ok());
        assert_eq!(
            s.verify_capability(&token, MonotonicTimeNs(1_001 + TTL_NS)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn at_tok_03_tampered_payload_fails_with_invalid_signature() {
        let s = signer();
        let token = s.issue_capability(&capability(1_000)).unwrap();

        let (payload, sig) = token.split_once('.').unwrap();
        let mut forged_payload = payload.to_string();
        forged_payload.push('A');
        let forged = format!("{forged_payload}.{sig}");

        assert_eq!(
            s.verify_capability(&forged, MonotonicTimeNs(2_000)),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn at_tok_04_garbage_input_is_malformed() {
        let s = signer();
        assert_eq!(
            s.verify_capability("not-a-token", MonotonicTimeNs(1)),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            s.verify_capability("a.b", MonotonicTimeNs(1)),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn at_tok_05_two_issues_produce_distinct_independently_valid_tokens() {
        let s = signer();
        let claims = capability(1_000);
        let t1 = s.issue_capability(&claims).unwrap();
        let t2 = s.issue_capability(&claims).unwrap();

        assert_ne!(t1, t2);
        assert!(s.verify_capability(&t1, MonotonicTimeNs(2_000)).is_ok());
        assert!(s.verify_capability(&t2, MonotonicTimeNs(2_000)).is_ok());
    }

    #[test]
    fn at_tok_06_session_token_does_not_verify_as_capability() {
        let s = signer();
        let session = SessionClaims::v1(
            UserId::new("user_1").unwrap(),
            MonotonicTimeNs(1_000),
            MonotonicTimeNs(1_000 + TTL_NS),
        )
        .unwrap();
        let token = s.issue_session(&session).unwrap();

        assert_eq!(
            s.verify_capability(&token, MonotonicTimeNs(2_000)),
            Err(TokenError::InvalidSignature)
        );
        assert!(s.verify_session(&token, MonotonicTimeNs(2_000)).is_ok());
    }

    #[test]
    fn at_tok_07_different_secret_rejects_token() {
        let issued = signer().issue_capability(&capability(1_000)).unwrap();
        let other = TokenSigner::new(b"another-secret-entirely-here!!").unwrap();
        assert_eq!(
            other.verify_capability(&issued, MonotonicTimeNs(2_000)),
            Err(TokenError::InvalidSignature)
        );
    }
}
