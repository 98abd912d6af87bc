#![forbid(unsafe_code)]

use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must not be empty",
            });
        }
        if id.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must be <= 64 chars",
            });
        }
        if id.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must not contain whitespace or control characters",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for UserId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must not be empty",
            });
        }
        if self.0.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must be <= 64 chars",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(addr: impl Into<String>) -> Result<Self, ContractViolation> {
        let addr = addr.into().trim().to_ascii_lowercase();
        if addr.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "email_address",
                reason: "must not be empty",
            });
        }
        if addr.len() > 254 {
            return Err(ContractViolation::InvalidValue {
                field: "email_address",
                reason: "must be <= 254 chars",
            });
        }
        let Some((local, domain)) = addr.split_once('@') else {
            return Err(ContractViolation::InvalidValue {
                field: "email_address",
                reason: "must contain exactly one '@'",
            });
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(ContractViolation::InvalidValue {
                field: "email_address",
                reason: "must have non-empty local and domain parts",
            });
        }
        if addr.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ContractViolation::InvalidValue {
                field: "email_address",
                reason: "must not contain whitespace or control characters",
            });
        }
        Ok(Self(addr))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for EmailAddress {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.is_empty() || !self.0.contains('@') {
            return Err(ContractViolation::InvalidValue {
                field: "email_address",
                reason: "must be a normalized address",
            });
        }
        Ok(())
    }
}

/// Who performed (or will perform) an action: an internal user id or an
/// external signer identified only by email. Consumers must handle both.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignerRef {
    User(UserId),
    External(EmailAddress),
}

impl SignerRef {
    pub fn as_audit_str(&self) -> &str {
        match self {
            SignerRef::User(id) => id.as_str(),
            SignerRef::External(email) => email.as_str(),
        }
    }
}

impl Validate for SignerRef {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            SignerRef::User(id) => id.validate(),
            SignerRef::External(email) => email.validate(),
        }
    }
}
