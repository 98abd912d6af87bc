#![forbid(unsafe_code)]

use quill_kernel_contracts::audit::{AuditEntryId, AuditEntryInput};

use crate::store::{StorageError, WorkflowStore};

/// Audit ledger runtime wrapper.
///
/// A disciplined append-only writer into the store's `audit_entries` ledger;
/// workflow code emits through this rather than touching the table directly.
#[derive(Debug, Default)]
pub struct AuditLedgerRuntime;

impl AuditLedgerRuntime {
    pub fn emit(
        store: &mut WorkflowStore,
        input: AuditEntryInput,
    ) -> Result<AuditEntryId, StorageError> {
        store.append_audit_entry(input)
    }
}
