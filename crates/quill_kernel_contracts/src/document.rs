#![forbid(unsafe_code)]

use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "document_id",
                reason: "must not be empty",
            });
        }
        if id.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "document_id",
                reason: "must be <= 64 chars",
            });
        }
        if id.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ContractViolation::InvalidValue {
                field: "document_id",
                reason: "must not contain whitespace or control characters",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for DocumentId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "document_id",
                reason: "must not be empty",
            });
        }
        if self.0.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "document_id",
                reason: "must be <= 64 chars",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentTitle(String);

impl DocumentTitle {
    pub fn new(title: impl Into<String>) -> Result<Self, ContractViolation> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "document_title",
                reason: "must not be empty",
            });
        }
        if title.len() > 256 {
            return Err(ContractViolation::InvalidValue {
                field: "document_title",
                reason: "must be <= 256 chars",
            });
        }
        if title.chars().any(|c| c.is_control()) {
            return Err(ContractViolation::InvalidValue {
                field: "document_title",
                reason: "must not contain control characters",
            });
        }
        Ok(Self(title))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for DocumentTitle {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "document_title",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// Opaque key into the blob store. Artifacts are immutable: finalization
/// writes a new ref, it never rewrites the bytes behind an existing one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(r: impl Into<String>) -> Result<Self, ContractViolation> {
        let r = r.into();
        if r.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "artifact_ref",
                reason: "must not be empty",
            });
        }
        if r.len() > 256 {
            return Err(ContractViolation::InvalidValue {
                field: "artifact_ref",
                reason: "must be <= 256 chars",
            });
        }
        if r.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ContractViolation::InvalidValue {
                field: "artifact_ref",
                reason: "must not contain whitespace or control characters",
            });
        }
        Ok(Self(r))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ArtifactRef {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "artifact_ref",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// Document lifecycle states. `Pending` is the only non-terminal state;
/// a document that reached `Signed` or `Rejected` never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentStatus {
    Pending,
    Signed,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "Pending",
            DocumentStatus::Signed => "Signed",
            DocumentStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Signed | DocumentStatus::Rejected)
    }
}

pub fn is_allowed_document_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    matches!(
        (from, to),
        (DocumentStatus::Pending, DocumentStatus::Signed)
            | (DocumentStatus::Pending, DocumentStatus::Rejected)
    )
}
