#![forbid(unsafe_code)]

use quill_engines::captoken::{TokenSigner, TokenSignerConfig};
use quill_kernel_contracts::audit::{AuditAction, IpAddress};
use quill_kernel_contracts::document::{DocumentId, DocumentTitle};
use quill_kernel_contracts::identity::{EmailAddress, SignerRef, UserId};
use quill_kernel_contracts::token::CapabilityClaims;
use quill_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use quill_storage::store::{DocumentInput, DocumentRecord, MarkRecord, WorkflowStore};

use crate::audit_trail::record_best_effort;
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::ops::OperatorLog;

pub mod reason_codes {
    use quill_kernel_contracts::ReasonCodeId;

    pub const QS_LC_SHARE_MINT_FAILED: ReasonCodeId = ReasonCodeId(0x5100_0001);
    pub const QS_LC_ARTIFACT_MISSING: ReasonCodeId = ReasonCodeId(0x5100_0002);
    pub const QS_LC_TERMINAL_DOCUMENT: ReasonCodeId = ReasonCodeId(0x5100_0003);
}

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Result of sharing a document: a minted capability token plus the link
/// a client mails to the recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareGrant {
    pub token: String,
    pub link: String,
    pub expires_at: MonotonicTimeNs,
}

/// What a capability-token holder is allowed to see: the document row, its
/// marks, and the current artifact bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicDocumentView {
    pub document: DocumentRecord,
    pub marks: Vec<MarkRecord>,
    pub pdf_bytes: Vec<u8>,
}

/// Owner-facing document lifecycle: upload, listing, sharing, and the
/// capability-scoped public view.
#[derive(Debug)]
pub struct DocumentLifecycleRuntime {
    config: WorkflowConfig,
    ops: OperatorLog,
}

impl DocumentLifecycleRuntime {
    pub fn new(config: WorkflowConfig, ops: OperatorLog) -> Result<Self, ContractViolation> {
        config.validate()?;
        Ok(Self { config, ops })
    }

    /// Stores a new Pending document and its original artifact.
    pub fn upload(
        &self,
        store: &mut WorkflowStore,
        owner_id: UserId,
        title: DocumentTitle,
        file_name: String,
        pdf_bytes: Vec<u8>,
        ip_address: IpAddress,
        now: MonotonicTimeNs,
    ) -> Result<DocumentRecord, WorkflowError> {
        if !pdf_bytes.starts_with(PDF_MAGIC) {
            return Err(WorkflowError::Contract(ContractViolation::InvalidValue {
                field: "upload.pdf_bytes",
                reason: "must start with %PDF-",
            }));
        }
        if pdf_bytes.len() as u64 > self.config.max_artifact_bytes {
            return Err(WorkflowError::Contract(ContractViolation::InvalidValue {
                field: "upload.pdf_bytes",
                reason: "exceeds the artifact size limit",
            }));
        }

        let record = store.insert_document(DocumentInput {
            owner_id: owner_id.clone(),
            title,
            file_name,
            pdf_bytes,
            now,
        })?;
        record_best_effort(
            store,
            &self.ops,
            record.document_id.clone(),
            AuditAction::Uploaded,
            SignerRef::User(owner_id),
            ip_address,
            now,
        );
        Ok(record)
    }

    /// All documents owned by the caller, newest first.
    pub fn documents(&self, store: &WorkflowStore, owner_id: &UserId) -> Vec<DocumentRecord> {
        store
            .documents_for_owner(owner_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// One owned document. Foreign and missing documents are the same
    /// NotFound; ownership is not probeable.
    pub fn document(
        &self,
        store: &WorkflowStore,
        owner_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<DocumentRecord, WorkflowError> {
        let doc = store
            .document_row(document_id)
            .ok_or(WorkflowError::NotFound { entity: "document" })?;
        if &doc.owner_id != owner_id {
            return Err(WorkflowError::NotFound { entity: "document" });
        }
        Ok(doc.clone())
    }

    /// One owned document plus its current artifact bytes.
    pub fn document_with_pdf(
        &self,
        store: &WorkflowStore,
        owner_id: &UserId,
        document_id: &DocumentId,
    ) -> Result<(DocumentRecord, Vec<u8>), WorkflowError> {
        let doc = self.document(store, owner_id, document_id)?;
        let bytes = store
            .blob_get(&doc.current_artifact_ref)
            .ok_or_else(|| self.artifact_missing(&doc))?
            .to_vec();
        Ok((doc, bytes))
    }

    /// Mints a signing link for an external recipient. The grant is a
    /// self-contained token; nothing about it is stored server-side, so
    /// sharing twice yields two independently valid links.
    pub fn share(
        &self,
        store: &mut WorkflowStore,
        signer: &TokenSigner,
        owner_id: &UserId,
        document_id: &DocumentId,
        recipient: EmailAddress,
        ip_address: IpAddress,
        now: MonotonicTimeNs,
    ) -> Result<ShareGrant, WorkflowError> {
        let doc = self.document(store, owner_id, document_id)?;
        if self.config.strict_pending_only && doc.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                reason_code: reason_codes::QS_LC_TERMINAL_DOCUMENT,
                message: "document is already finalized",
            });
        }
        let expires_at = now.saturating_add_ns(self.config.capability_ttl_ns);
        let claims = CapabilityClaims::v1(doc.document_id.clone(), recipient, now, expires_at)?;
        let token = signer
            .issue_capability(&claims)
            .map_err(|e| WorkflowError::DependencyFailure {
                reason_code: reason_codes::QS_LC_SHARE_MINT_FAILED,
                message: format!("capability mint failed: {e}"),
            })?;
        let link = format!(
            "{}/sign/{token}",
            self.config.link_base_url.trim_end_matches('/')
        );

        record_best_effort(
            store,
            &self.ops,
            doc.document_id,
            AuditAction::Shared,
            SignerRef::User(owner_id.clone()),
            ip_address,
            now,
        );
        Ok(ShareGrant {
            token,
            link,
            expires_at,
        })
    }

    /// Resolves a verified capability into the document view its holder may
    /// see. Claims binding (token belongs to this document) happened at
    /// verification; here the document simply has to still exist.
    pub fn public_view(
        &self,
        store: &WorkflowStore,
        claims: &CapabilityClaims,
    ) -> Result<PublicDocumentView, WorkflowError> {
        let doc = store
            .document_row(&claims.document_id)
            .ok_or(WorkflowError::NotFound { entity: "document" })?;
        let pdf_bytes = store
            .blob_get(&doc.current_artifact_ref)
            .ok_or_else(|| self.artifact_missing(doc))?
            .to_vec();
        let marks = store
            .marks_for(&doc.document_id)
            .into_iter()
            .cloned()
            .collect();
        Ok(PublicDocumentView {
            document: doc.clone(),
            marks,
            pdf_bytes,
        })
    }

    fn artifact_missing(&self, doc: &DocumentRecord) -> WorkflowError {
        self.ops.alert(format!(
            "artifact {} missing for {}",
            doc.current_artifact_ref.as_str(),
            doc.document_id.as_str()
        ));
        WorkflowError::DependencyFailure {
            reason_code: reason_codes::QS_LC_ARTIFACT_MISSING,
            message: format!("artifact missing for {}", doc.document_id.as_str()),
        }
    }

    pub(crate) fn capability_ttl_ns(&self) -> u64 {
        self.config.capability_ttl_ns
    }
}

/// Session-token lifetimes come from the engine config; re-exported here so
/// adapters only reach into one place for workflow wiring.
pub fn token_config() -> TokenSignerConfig {
    TokenSignerConfig::mvp_v1()
}
