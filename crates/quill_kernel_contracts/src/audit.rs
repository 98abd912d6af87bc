#![forbid(unsafe_code)]

use crate::document::DocumentId;
use crate::identity::SignerRef;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const AUDIT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuditEntryId(pub u64);

impl Validate for AuditEntryId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_entry_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// The four auditable state-changing actions. Display strings keep the
/// wording the browser client and existing trails already use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Uploaded,
    Shared,
    SignaturePlaced,
    Finalized,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Uploaded => "Document Uploaded",
            AuditAction::Shared => "Document Shared",
            AuditAction::SignaturePlaced => "Signature Placed",
            AuditAction::Finalized => "Document Finalized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpAddress(String);

impl IpAddress {
    pub fn new(addr: impl Into<String>) -> Result<Self, ContractViolation> {
        let addr = addr.into();
        if addr.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "ip_address",
                reason: "must not be empty",
            });
        }
        if addr.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "ip_address",
                reason: "must be <= 64 chars",
            });
        }
        if addr.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ContractViolation::InvalidValue {
                field: "ip_address",
                reason: "must not contain whitespace or control characters",
            });
        }
        Ok(Self(addr))
    }

    /// Callers that cannot determine a peer address record this placeholder.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for IpAddress {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "ip_address",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntryInput {
    pub schema_version: SchemaVersion,
    pub document_id: DocumentId,
    pub action: AuditAction,
    pub performed_by: SignerRef,
    pub ip_address: IpAddress,
    pub now: MonotonicTimeNs,
}

impl AuditEntryInput {
    pub fn v1(
        document_id: DocumentId,
        action: AuditAction,
        performed_by: SignerRef,
        ip_address: IpAddress,
        now: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: AUDIT_CONTRACT_VERSION,
            document_id,
            action,
            performed_by,
            ip_address,
            now,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for AuditEntryInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != AUDIT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "audit_entry_input.schema_version",
                reason: "must match AUDIT_CONTRACT_VERSION",
            });
        }
        self.document_id.validate()?;
        self.performed_by.validate()?;
        self.ip_address.validate()
    }
}

/// One immutable row of the per-document audit ledger. There is no update
/// or delete operation anywhere in the system for these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub schema_version: SchemaVersion,
    pub entry_id: AuditEntryId,
    pub document_id: DocumentId,
    pub action: AuditAction,
    pub performed_by: SignerRef,
    pub ip_address: IpAddress,
    pub recorded_at: MonotonicTimeNs,
}

impl Validate for AuditEntry {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != AUDIT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "audit_entry.schema_version",
                reason: "must match AUDIT_CONTRACT_VERSION",
            });
        }
        self.entry_id.validate()?;
        self.document_id.validate()?;
        self.performed_by.validate()?;
        self.ip_address.validate()
    }
}
