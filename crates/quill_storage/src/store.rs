#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use quill_kernel_contracts::audit::{AuditEntry, AuditEntryId, AuditEntryInput};
use quill_kernel_contracts::document::{
    is_allowed_document_transition, ArtifactRef, DocumentId, DocumentStatus, DocumentTitle,
};
use quill_kernel_contracts::identity::{EmailAddress, SignerRef, UserId};
use quill_kernel_contracts::mark::{MarkId, MarkStatus, PageIndex, ViewerPoint};
use quill_kernel_contracts::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation { table: &'static str, key: String },
    DuplicateKey { table: &'static str, key: String },
    AppendOnlyViolation { table: &'static str },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityStatus {
    Active,
    Disabled,
}

/// Thin Identity-service projection: enough to resolve an owner and a
/// display name for stamping, nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub schema_version: SchemaVersion,
    pub user_id: UserId,
    pub display_name: String,
    pub email: Option<EmailAddress>,
    pub created_at: MonotonicTimeNs,
    pub status: IdentityStatus,
}

impl IdentityRecord {
    pub fn v1(
        user_id: UserId,
        display_name: String,
        email: Option<EmailAddress>,
        created_at: MonotonicTimeNs,
        status: IdentityStatus,
    ) -> Self {
        Self {
            schema_version: SchemaVersion(1),
            user_id,
            display_name,
            email,
            created_at,
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub schema_version: SchemaVersion,
    pub document_id: DocumentId,
    pub owner_id: UserId,
    pub title: DocumentTitle,
    pub file_name: String,
    pub current_artifact_ref: ArtifactRef,
    pub status: DocumentStatus,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInput {
    pub owner_id: UserId,
    pub title: DocumentTitle,
    pub file_name: String,
    pub pdf_bytes: Vec<u8>,
    pub now: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkRecord {
    pub schema_version: SchemaVersion,
    pub mark_id: MarkId,
    pub document_id: DocumentId,
    pub signer_ref: SignerRef,
    pub position: ViewerPoint,
    pub page_index: PageIndex,
    pub status: MarkStatus,
    pub created_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkInput {
    pub document_id: DocumentId,
    pub signer_ref: SignerRef,
    pub position: ViewerPoint,
    pub page_index: PageIndex,
    pub now: MonotonicTimeNs,
}

/// Metadata row kept next to each stored blob. Blobs are content-addressed
/// for audit purposes and immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    pub artifact_ref: ArtifactRef,
    pub sha256_hex: String,
    pub byte_len: u64,
    pub stored_at: MonotonicTimeNs,
}

/// In-memory backing store for the signing workflow: identities, documents,
/// signature marks, the append-only audit ledger, and the blob store.
///
/// One instance models the Persistence layer plus the Blob Store; callers
/// treat it as a single durable unit for a request.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    identities: BTreeMap<UserId, IdentityRecord>,
    documents: BTreeMap<DocumentId, DocumentRecord>,
    document_order: Vec<DocumentId>,
    marks: BTreeMap<MarkId, MarkRecord>,
    mark_order: Vec<MarkId>,
    audit_entries: Vec<AuditEntry>,
    blob_bytes: BTreeMap<ArtifactRef, Vec<u8>>,
    blob_records: BTreeMap<ArtifactRef, BlobRecord>,
    next_document_seq: u64,
    next_mark_seq: u64,
    next_audit_seq: u64,
}

impl WorkflowStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    // ---- identities ----

    pub fn insert_identity(&mut self, record: IdentityRecord) -> Result<(), StorageError> {
        if self.identities.contains_key(&record.user_id) {
            return Err(StorageError::DuplicateKey {
                table: "identities",
                key: record.user_id.as_str().to_string(),
            });
        }
        self.identities.insert(record.user_id.clone(), record);
        Ok(())
    }

    pub fn identity_row(&self, user_id: &UserId) -> Option<&IdentityRecord> {
        self.identities.get(user_id)
    }

    // ---- documents ----

    pub fn insert_document(&mut self, input: DocumentInput) -> Result<DocumentRecord, StorageError> {
        input.title.validate()?;
        if input.file_name.trim().is_empty() {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "document_input.file_name",
                    reason: "must not be empty",
                },
            ));
        }
        if !self.identities.contains_key(&input.owner_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "documents",
                key: input.owner_id.as_str().to_string(),
            });
        }

        self.next_document_seq += 1;
        let document_id = DocumentId::new(format!("doc_{:06}", self.next_document_seq))?;
        let artifact_ref = ArtifactRef::new(format!(
            "blob://{}/original/{}",
            document_id.as_str(),
            sanitize_blob_segment(&input.file_name)
        ))?;
        self.blob_put(artifact_ref.clone(), input.pdf_bytes, input.now)?;

        let record = DocumentRecord {
            schema_version: SchemaVersion(1),
            document_id: document_id.clone(),
            owner_id: input.owner_id,
            title: input.title,
            file_name: input.file_name,
            current_artifact_ref: artifact_ref,
            status: DocumentStatus::Pending,
            created_at: input.now,
            updated_at: input.now,
        };
        self.documents.insert(document_id.clone(), record.clone());
        self.document_order.push(document_id);
        Ok(record)
    }

    pub fn document_row(&self, document_id: &DocumentId) -> Option<&DocumentRecord> {
        self.documents.get(document_id)
    }

    /// Documents owned by `owner_id`, newest first.
    pub fn documents_for_owner(&self, owner_id: &UserId) -> Vec<&DocumentRecord> {
        self.document_order
            .iter()
            .rev()
            .filter_map(|id| self.documents.get(id))
            .filter(|d| &d.owner_id == owner_id)
            .collect()
    }

    /// The single commit point of a finalization run: atomically flips the
    /// consumed marks to `signed` and the document to `Signed`, pointing it
    /// at the already-written new artifact. Terminal statuses are immutable;
    /// the flip is refused unless the document is `Pending` and at least one
    /// mark is being consumed.
    pub fn commit_signed_document(
        &mut self,
        document_id: &DocumentId,
        new_file_name: String,
        new_artifact_ref: ArtifactRef,
        consumed_marks: &[MarkId],
        now: MonotonicTimeNs,
    ) -> Result<DocumentRecord, StorageError> {
        new_artifact_ref.validate()?;
        if !self.blob_bytes.contains_key(&new_artifact_ref) {
            return Err(StorageError::ForeignKeyViolation {
                table: "documents",
                key: new_artifact_ref.as_str().to_string(),
            });
        }
        if consumed_marks.is_empty() {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "commit_signed_document.consumed_marks",
                    reason: "must consume at least one mark",
                },
            ));
        }
        for mark_id in consumed_marks {
            let mark = self
                .marks
                .get(mark_id)
                .ok_or_else(|| StorageError::ForeignKeyViolation {
                    table: "signature_marks",
                    key: mark_id.as_str().to_string(),
                })?;
            if &mark.document_id != document_id {
                return Err(StorageError::ForeignKeyViolation {
                    table: "signature_marks",
                    key: mark_id.as_str().to_string(),
                });
            }
        }

        let doc = self
            .documents
            .get_mut(document_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "documents",
                key: document_id.as_str().to_string(),
            })?;
        if !is_allowed_document_transition(doc.status, DocumentStatus::Signed) {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "document.status",
                    reason: "only Pending documents can transition to Signed",
                },
            ));
        }

        for mark_id in consumed_marks {
            if let Some(mark) = self.marks.get_mut(mark_id) {
                mark.status = MarkStatus::Signed;
            }
        }
        doc.status = DocumentStatus::Signed;
        doc.file_name = new_file_name;
        doc.current_artifact_ref = new_artifact_ref;
        doc.updated_at = now;
        Ok(doc.clone())
    }

    // ---- signature marks ----

    pub fn insert_mark(&mut self, input: MarkInput) -> Result<MarkRecord, StorageError> {
        input.position.validate()?;
        input.page_index.validate()?;
        input.signer_ref.validate()?;
        if !self.documents.contains_key(&input.document_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "signature_marks",
                key: input.document_id.as_str().to_string(),
            });
        }

        self.next_mark_seq += 1;
        let mark_id = MarkId::new(format!("mark_{:06}", self.next_mark_seq))?;
        let record = MarkRecord {
            schema_version: SchemaVersion(1),
            mark_id: mark_id.clone(),
            document_id: input.document_id,
            signer_ref: input.signer_ref,
            position: input.position,
            page_index: input.page_index,
            status: MarkStatus::Pending,
            created_at: input.now,
        };
        self.marks.insert(mark_id.clone(), record.clone());
        self.mark_order.push(mark_id);
        Ok(record)
    }

    /// All marks for a document in placement order.
    pub fn marks_for(&self, document_id: &DocumentId) -> Vec<&MarkRecord> {
        self.mark_order
            .iter()
            .filter_map(|id| self.marks.get(id))
            .filter(|m| &m.document_id == document_id)
            .collect()
    }

    /// Snapshot of the still-pending marks for a document, placement order.
    pub fn pending_marks_for(&self, document_id: &DocumentId) -> Vec<MarkRecord> {
        self.mark_order
            .iter()
            .filter_map(|id| self.marks.get(id))
            .filter(|m| &m.document_id == document_id && m.status == MarkStatus::Pending)
            .cloned()
            .collect()
    }

    /// Flips one mark to `signed`. Idempotent: returns `Ok(false)` when the
    /// mark had already been consumed.
    pub fn mark_signed(&mut self, mark_id: &MarkId) -> Result<bool, StorageError> {
        let mark = self
            .marks
            .get_mut(mark_id)
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "signature_marks",
                key: mark_id.as_str().to_string(),
            })?;
        if mark.status == MarkStatus::Signed {
            return Ok(false);
        }
        mark.status = MarkStatus::Signed;
        Ok(true)
    }

    // ---- audit ledger ----

    pub fn append_audit_entry(
        &mut self,
        input: AuditEntryInput,
    ) -> Result<AuditEntryId, StorageError> {
        input.validate()?;
        if !self.documents.contains_key(&input.document_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "audit_entries",
                key: input.document_id.as_str().to_string(),
            });
        }
        self.next_audit_seq += 1;
        let entry_id = AuditEntryId(self.next_audit_seq);
        self.audit_entries.push(AuditEntry {
            schema_version: input.schema_version,
            entry_id,
            document_id: input.document_id,
            action: input.action,
            performed_by: input.performed_by,
            ip_address: input.ip_address,
            recorded_at: input.now,
        });
        Ok(entry_id)
    }

    /// The ledger has no update path. This is the only spelling of an
    /// in-place write and it always refuses.
    pub fn attempt_overwrite_audit_entry(
        &mut self,
        _entry_id: AuditEntryId,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "audit_entries",
        })
    }

    /// Audit entries for one document, newest first.
    pub fn audit_entries_for(&self, document_id: &DocumentId) -> Vec<&AuditEntry> {
        self.audit_entries
            .iter()
            .rev()
            .filter(|e| &e.document_id == document_id)
            .collect()
    }

    pub fn audit_entry_count(&self) -> usize {
        self.audit_entries.len()
    }

    // ---- blob store ----

    pub fn blob_put(
        &mut self,
        artifact_ref: ArtifactRef,
        bytes: Vec<u8>,
        now: MonotonicTimeNs,
    ) -> Result<BlobRecord, StorageError> {
        artifact_ref.validate()?;
        if self.blob_bytes.contains_key(&artifact_ref) {
            return Err(StorageError::DuplicateKey {
                table: "artifact_blobs",
                key: artifact_ref.as_str().to_string(),
            });
        }
        let record = BlobRecord {
            artifact_ref: artifact_ref.clone(),
            sha256_hex: sha256_hex(&bytes),
            byte_len: bytes.len() as u64,
            stored_at: now,
        };
        self.blob_bytes.insert(artifact_ref.clone(), bytes);
        self.blob_records.insert(artifact_ref, record.clone());
        Ok(record)
    }

    pub fn blob_get(&self, artifact_ref: &ArtifactRef) -> Option<&[u8]> {
        self.blob_bytes.get(artifact_ref).map(Vec::as_slice)
    }

    pub fn blob_record(&self, artifact_ref: &ArtifactRef) -> Option<&BlobRecord> {
        self.blob_records.get(artifact_ref)
    }
}

fn sanitize_blob_segment(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
