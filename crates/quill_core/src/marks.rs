#![forbid(unsafe_code)]

use quill_kernel_contracts::audit::{AuditAction, IpAddress};
use quill_kernel_contracts::document::DocumentId;
use quill_kernel_contracts::identity::SignerRef;
use quill_kernel_contracts::mark::{PageIndex, ViewerPoint};
use quill_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use quill_storage::store::{MarkInput, MarkRecord, WorkflowStore};

use crate::audit_trail::record_best_effort;
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::ops::OperatorLog;

pub mod reason_codes {
    use quill_kernel_contracts::ReasonCodeId;

    pub const QS_MARK_TERMINAL_DOCUMENT: ReasonCodeId = ReasonCodeId(0x5200_0001);
}

/// Placement and listing of signature marks, for both authenticated owners
/// and capability-token holders.
#[derive(Debug)]
pub struct MarkPlacementRuntime {
    config: WorkflowConfig,
    ops: OperatorLog,
}

impl MarkPlacementRuntime {
    pub fn new(config: WorkflowConfig, ops: OperatorLog) -> Result<Self, ContractViolation> {
        config.validate()?;
        Ok(Self { config, ops })
    }

    /// Records a pending mark at a viewer-space position. Callers have
    /// already proven access to the document (owner session or a capability
    /// bound to it).
    pub fn place(
        &self,
        store: &mut WorkflowStore,
        document_id: DocumentId,
        placed_by: SignerRef,
        position: ViewerPoint,
        page_index: PageIndex,
        ip_address: IpAddress,
        now: MonotonicTimeNs,
    ) -> Result<MarkRecord, WorkflowError> {
        let doc = store
            .document_row(&document_id)
            .ok_or(WorkflowError::NotFound { entity: "document" })?;
        if self.config.strict_pending_only && doc.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                reason_code: reason_codes::QS_MARK_TERMINAL_DOCUMENT,
                message: "document is already finalized",
            });
        }

        let record = store.insert_mark(MarkInput {
            document_id: document_id.clone(),
            signer_ref: placed_by.clone(),
            position,
            page_index,
            now,
        })?;
        record_best_effort(
            store,
            &self.ops,
            document_id,
            AuditAction::SignaturePlaced,
            placed_by,
            ip_address,
            now,
        );
        Ok(record)
    }

    /// All marks on a document, placement order.
    pub fn marks(
        &self,
        store: &WorkflowStore,
        document_id: &DocumentId,
    ) -> Result<Vec<MarkRecord>, WorkflowError> {
        if store.document_row(document_id).is_none() {
            return Err(WorkflowError::NotFound { entity: "document" });
        }
        Ok(store
            .marks_for(document_id)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_kernel_contracts::document::{ArtifactRef, DocumentTitle};
    use quill_kernel_contracts::identity::{EmailAddress, UserId};
    use quill_kernel_contracts::mark::MarkStatus;
    use quill_storage::store::{DocumentInput, IdentityRecord, IdentityStatus};

    fn owner() -> UserId {
        UserId::new("user_marks").unwrap()
    }

    fn store_with_doc() -> (WorkflowStore, DocumentId) {
        let mut s = WorkflowStore::new_in_memory();
        s.insert_identity(IdentityRecord::v1(
            owner(),
            "Mara Kline".to_string(),
            Some(EmailAddress::new("mara@example.com").unwrap()),
            MonotonicTimeNs(1),
            IdentityStatus::Active,
        ))
        .unwrap();
        let doc = s
            .insert_document(DocumentInput {
                owner_id: owner(),
                title: DocumentTitle::new("waiver").unwrap(),
                file_name: "waiver.pdf".to_string(),
                pdf_bytes: b"%PDF-1.4 marks".to_vec(),
                now: MonotonicTimeNs(2),
            })
            .unwrap();
        (s, doc.document_id)
    }

    fn runtime(strict: bool) -> MarkPlacementRuntime {
        let mut config = WorkflowConfig::mvp_v1();
        config.strict_pending_only = strict;
        MarkPlacementRuntime::new(config, OperatorLog::new()).unwrap()
    }

    fn place(
        rt: &MarkPlacementRuntime,
        s: &mut WorkflowStore,
        doc: &DocumentId,
    ) -> Result<MarkRecord, WorkflowError> {
        rt.place(
            s,
            doc.clone(),
            SignerRef::External(EmailAddress::new("guest@example.com").unwrap()),
            ViewerPoint::new(150.0, 150.0).unwrap(),
            PageIndex::new(1).unwrap(),
            IpAddress::unknown(),
            MonotonicTimeNs(10),
        )
    }

    #[test]
    fn at_mark_01_placement_is_pending_and_audited() {
        let (mut s, doc) = store_with_doc();
        let rt = runtime(false);

        let mark = place(&rt, &mut s, &doc).unwrap();
        assert_eq!(mark.status, MarkStatus::Pending);
        assert_eq!(s.audit_entries_for(&doc)[0].action, AuditAction::SignaturePlaced);
        assert_eq!(rt.marks(&s, &doc).unwrap().len(), 1);
    }

    #[test]
    fn at_mark_02_unknown_document_is_not_found() {
        let (mut s, _doc) = store_with_doc();
        let rt = runtime(false);
        let orphan = DocumentId::new("doc_none").unwrap();

        assert_eq!(
            place(&rt, &mut s, &orphan).unwrap_err(),
            WorkflowError::NotFound { entity: "document" }
        );
        assert_eq!(
            rt.marks(&s, &orphan).unwrap_err(),
            WorkflowError::NotFound { entity: "document" }
        );
    }

    #[test]
    fn at_mark_03_strict_mode_refuses_terminal_documents() {
        let (mut s, doc) = store_with_doc();
        let lenient = runtime(false);
        let strict = runtime(true);

        let mark = place(&lenient, &mut s, &doc).unwrap();
        let signed_ref = ArtifactRef::new("blob://marks/signed").unwrap();
        s.blob_put(signed_ref.clone(), b"%PDF-1.4 signed".to_vec(), MonotonicTimeNs(11))
            .unwrap();
        s.commit_signed_document(
            &doc,
            "signed-waiver.pdf".to_string(),
            signed_ref,
            &[mark.mark_id],
            MonotonicTimeNs(11),
        )
        .unwrap();

        assert!(matches!(
            place(&strict, &mut s, &doc).unwrap_err(),
            WorkflowError::InvalidState { .. }
        ));
        // Default behavior keeps accepting placements on terminal documents.
        assert!(place(&lenient, &mut s, &doc).is_ok());
    }
}
