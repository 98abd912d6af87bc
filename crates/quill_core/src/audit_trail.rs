#![forbid(unsafe_code)]

use quill_kernel_contracts::audit::{AuditAction, AuditEntry, AuditEntryInput, IpAddress};
use quill_kernel_contracts::document::DocumentId;
use quill_kernel_contracts::identity::{SignerRef, UserId};
use quill_kernel_contracts::MonotonicTimeNs;
use quill_storage::ledger::AuditLedgerRuntime;
use quill_storage::store::WorkflowStore;

use crate::error::WorkflowError;
use crate::ops::OperatorLog;

/// Appends one audit row, swallowing failures into the operator channel.
/// The primary state change a trail entry describes has already committed
/// by the time this runs; losing the row must not fail the request.
pub(crate) fn record_best_effort(
    store: &mut WorkflowStore,
    ops: &OperatorLog,
    document_id: DocumentId,
    action: AuditAction,
    performed_by: SignerRef,
    ip_address: IpAddress,
    now: MonotonicTimeNs,
) {
    let input = match AuditEntryInput::v1(
        document_id.clone(),
        action,
        performed_by,
        ip_address,
        now,
    ) {
        Ok(input) => input,
        Err(violation) => {
            ops.alert(format!(
                "audit entry rejected for {}: {violation:?}",
                document_id.as_str()
            ));
            return;
        }
    };
    if let Err(e) = AuditLedgerRuntime::emit(store, input) {
        ops.alert(format!(
            "audit append failed for {}: {e:?}",
            document_id.as_str()
        ));
    }
}

/// Read side of the ledger: owner-scoped trail queries.
#[derive(Debug, Default)]
pub struct AuditTrailRuntime;

impl AuditTrailRuntime {
    /// Trail for one document, newest first. Scoped to the owner; anyone
    /// else gets the same NotFound a missing document would.
    pub fn trail(
        &self,
        store: &WorkflowStore,
        requester: &UserId,
        document_id: &DocumentId,
    ) -> Result<Vec<AuditEntry>, WorkflowError> {
        let doc = store
            .document_row(document_id)
            .ok_or(WorkflowError::NotFound { entity: "document" })?;
        if &doc.owner_id != requester {
            return Err(WorkflowError::NotFound { entity: "document" });
        }
        Ok(store
            .audit_entries_for(document_id)
            .into_iter()
            .cloned()
            .collect())
    }
}
