#![forbid(unsafe_code)]

use quill_kernel_contracts::{ContractViolation, ReasonCodeId};
use quill_storage::store::StorageError;

/// Workflow-level failure taxonomy. Adapters map these onto their surface
/// (HTTP status codes, CLI exit codes); core code never sees a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// The named entity does not exist, or the caller is not allowed to
    /// learn whether it exists.
    NotFound { entity: &'static str },
    Unauthorized,
    Contract(ContractViolation),
    InvalidState {
        reason_code: ReasonCodeId,
        message: &'static str,
    },
    DependencyFailure {
        reason_code: ReasonCodeId,
        message: String,
    },
    Storage(StorageError),
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::NotFound { entity } => write!(f, "{entity} not found"),
            WorkflowError::Unauthorized => write!(f, "unauthorized"),
            WorkflowError::Contract(v) => write!(f, "contract violation: {v:?}"),
            WorkflowError::InvalidState { reason_code, message } => {
                write!(f, "invalid state [{:#010x}]: {message}", reason_code.0)
            }
            WorkflowError::DependencyFailure { reason_code, message } => {
                write!(f, "dependency failure [{:#010x}]: {message}", reason_code.0)
            }
            WorkflowError::Storage(e) => write!(f, "storage error: {e:?}"),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<ContractViolation> for WorkflowError {
    fn from(v: ContractViolation) -> Self {
        WorkflowError::Contract(v)
    }
}

impl From<StorageError> for WorkflowError {
    fn from(e: StorageError) -> Self {
        WorkflowError::Storage(e)
    }
}
