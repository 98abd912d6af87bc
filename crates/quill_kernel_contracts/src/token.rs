#![forbid(unsafe_code)]

use crate::document::DocumentId;
use crate::identity::{EmailAddress, UserId};
use crate::{ContractViolation, MonotonicTimeNs, Validate};

/// Separates the two credential kinds that share the signing secret. A
/// session token must never verify as a capability token or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenAudience {
    Session,
    Sign,
}

impl TokenAudience {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenAudience::Session => "session",
            TokenAudience::Sign => "sign",
        }
    }
}

/// Claims of a capability token: the token itself is the authorization
/// object for one external signer on one document. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityClaims {
    pub document_id: DocumentId,
    pub signer_email: EmailAddress,
    pub issued_at: MonotonicTimeNs,
    pub expires_at: MonotonicTimeNs,
}

impl CapabilityClaims {
    pub fn v1(
        document_id: DocumentId,
        signer_email: EmailAddress,
        issued_at: MonotonicTimeNs,
        expires_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let claims = Self {
            document_id,
            signer_email,
            issued_at,
            expires_at,
        };
        claims.validate()?;
        Ok(claims)
    }
}

impl Validate for CapabilityClaims {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.document_id.validate()?;
        self.signer_email.validate()?;
        if self.expires_at <= self.issued_at {
            return Err(ContractViolation::InvalidValue {
                field: "capability_claims.expires_at",
                reason: "must be after issued_at",
            });
        }
        Ok(())
    }
}

/// Claims of an authenticated-user session credential, as resolved by the
/// Identity service. Same wire shape and secret as capability tokens but a
/// distinct audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: UserId,
    pub issued_at: MonotonicTimeNs,
    pub expires_at: MonotonicTimeNs,
}

impl SessionClaims {
    pub fn v1(
        user_id: UserId,
        issued_at: MonotonicTimeNs,
        expires_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let claims = Self {
            user_id,
            issued_at,
            expires_at,
        };
        claims.validate()?;
        Ok(claims)
    }
}

impl Validate for SessionClaims {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.user_id.validate()?;
        if self.expires_at <= self.issued_at {
            return Err(ContractViolation::InvalidValue {
                field: "session_claims.expires_at",
                reason: "must be after issued_at",
            });
        }
        Ok(())
    }
}
