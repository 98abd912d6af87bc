#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use quill_kernel_contracts::audit::{AuditAction, IpAddress};
use quill_kernel_contracts::document::{ArtifactRef, DocumentId, DocumentStatus};
use quill_kernel_contracts::identity::SignerRef;
use quill_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use quill_storage::store::{DocumentRecord, WorkflowStore};

use crate::audit_trail::record_best_effort;
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::ops::OperatorLog;
use crate::stamp::{stamp_signature_text, StampError, StampPlacement};

pub mod reason_codes {
    use quill_kernel_contracts::ReasonCodeId;

    pub const QS_FIN_ALREADY_TERMINAL: ReasonCodeId = ReasonCodeId(0x5300_0001);
    pub const QS_FIN_NO_PENDING_MARKS: ReasonCodeId = ReasonCodeId(0x5300_0002);
    pub const QS_FIN_IN_PROGRESS: ReasonCodeId = ReasonCodeId(0x5300_0003);
    pub const QS_FIN_PAGE_OUT_OF_RANGE: ReasonCodeId = ReasonCodeId(0x5300_0004);
    pub const QS_FIN_ARTIFACT_MISSING: ReasonCodeId = ReasonCodeId(0x5300_0005);
    pub const QS_FIN_STAMP_FAILED: ReasonCodeId = ReasonCodeId(0x5300_0006);
}

/// Fallback when an authenticated signer has no identity row to resolve.
const EXTERNAL_SIGNER_NAME: &str = "External Signer";

/// Per-document finalization locks. At most one finalization run may hold a
/// given document; the lock releases when the guard drops, error paths
/// included.
#[derive(Debug, Clone, Default)]
pub struct FinalizeLocks {
    inner: Arc<Mutex<BTreeSet<DocumentId>>>,
}

impl FinalizeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, document_id: &DocumentId) -> Option<FinalizeLockGuard> {
        let mut held = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !held.insert(document_id.clone()) {
            return None;
        }
        Some(FinalizeLockGuard {
            locks: Arc::clone(&self.inner),
            document_id: document_id.clone(),
        })
    }
}

struct FinalizeLockGuard {
    locks: Arc<Mutex<BTreeSet<DocumentId>>>,
    document_id: DocumentId,
}

impl Drop for FinalizeLockGuard {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        held.remove(&self.document_id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOutcome {
    pub document: DocumentRecord,
    pub consumed_marks: usize,
    pub signer_name: String,
}

/// Finalization engine: consumes a document's pending marks, burns the
/// signature text into a new artifact, and commits the Pending -> Signed
/// transition.
#[derive(Debug)]
pub struct FinalizeRuntime {
    config: WorkflowConfig,
    ops: OperatorLog,
    locks: FinalizeLocks,
}

impl FinalizeRuntime {
    pub fn new(
        config: WorkflowConfig,
        ops: OperatorLog,
        locks: FinalizeLocks,
    ) -> Result<Self, ContractViolation> {
        config.validate()?;
        Ok(Self { config, ops, locks })
    }

    pub fn run(
        &self,
        store: &mut WorkflowStore,
        requester: &SignerRef,
        document_id: &DocumentId,
        ip_address: IpAddress,
        now: MonotonicTimeNs,
    ) -> Result<FinalizeOutcome, WorkflowError> {
        let _guard = self
            .locks
            .acquire(document_id)
            .ok_or(WorkflowError::InvalidState {
                reason_code: reason_codes::QS_FIN_IN_PROGRESS,
                message: "finalization already in progress for this document",
            })?;

        let doc = store
            .document_row(document_id)
            .ok_or(WorkflowError::NotFound { entity: "document" })?
            .clone();
        if let SignerRef::User(user_id) = requester {
            if &doc.owner_id != user_id {
                return Err(WorkflowError::NotFound { entity: "document" });
            }
        }
        if doc.status != DocumentStatus::Pending {
            return Err(WorkflowError::InvalidState {
                reason_code: reason_codes::QS_FIN_ALREADY_TERMINAL,
                message: "document is not pending",
            });
        }

        let pending = store.pending_marks_for(document_id);
        if pending.is_empty() {
            return Err(WorkflowError::InvalidState {
                reason_code: reason_codes::QS_FIN_NO_PENDING_MARKS,
                message: "no pending signature marks to finalize",
            });
        }

        let pdf_bytes = store
            .blob_get(&doc.current_artifact_ref)
            .ok_or_else(|| {
                self.ops.alert(format!(
                    "artifact {} missing for {}",
                    doc.current_artifact_ref.as_str(),
                    doc.document_id.as_str()
                ));
                WorkflowError::DependencyFailure {
                    reason_code: reason_codes::QS_FIN_ARTIFACT_MISSING,
                    message: format!("artifact missing for {}", doc.document_id.as_str()),
                }
            })?
            .to_vec();

        let signer_name = signer_display_name(store, requester);
        let placements: Vec<StampPlacement> = pending
            .iter()
            .map(|m| StampPlacement {
                page_index: m.page_index,
                position: m.position,
            })
            .collect();
        let stamped = stamp_signature_text(
            &pdf_bytes,
            &placements,
            &signer_name,
            self.config.stamp_font_size,
        )
        .map_err(|e| match e {
            StampError::PageOutOfRange { .. } => WorkflowError::InvalidState {
                reason_code: reason_codes::QS_FIN_PAGE_OUT_OF_RANGE,
                message: "a mark targets a page the document does not have",
            },
            other => WorkflowError::DependencyFailure {
                reason_code: reason_codes::QS_FIN_STAMP_FAILED,
                message: format!("stamping failed: {other}"),
            },
        })?;

        let new_file_name = format!("signed-{}", doc.file_name);
        let new_artifact_ref = ArtifactRef::new(format!(
            "blob://{}/signed/{}",
            doc.document_id.as_str(),
            now.0
        ))?;
        store.blob_put(new_artifact_ref.clone(), stamped, now)?;

        let consumed: Vec<_> = pending.iter().map(|m| m.mark_id.clone()).collect();
        let document = store.commit_signed_document(
            document_id,
            new_file_name,
            new_artifact_ref,
            &consumed,
            now,
        )?;

        record_best_effort(
            store,
            &self.ops,
            document.document_id.clone(),
            AuditAction::Finalized,
            requester.clone(),
            ip_address,
            now,
        );
        Ok(FinalizeOutcome {
            document,
            consumed_marks: consumed.len(),
            signer_name,
        })
    }
}

/// Name burned into the stamp. Authenticated signers resolve to their
/// profile name, then their profile email, then the placeholder when no
/// identity row exists. External signers are stamped as the email their
/// capability was issued to.
fn signer_display_name(store: &WorkflowStore, requester: &SignerRef) -> String {
    match requester {
        SignerRef::User(user_id) => match store.identity_row(user_id) {
            Some(identity) if !identity.display_name.trim().is_empty() => {
                identity.display_name.clone()
            }
            Some(identity) => identity
                .email
                .as_ref()
                .map(|e| e.as_str().to_string())
                .unwrap_or_else(|| EXTERNAL_SIGNER_NAME.to_string()),
            None => EXTERNAL_SIGNER_NAME.to_string(),
        },
        SignerRef::External(email) => email.as_str().to_string(),
    }
}
