#![forbid(unsafe_code)]

use quill_kernel_contracts::audit::{AuditAction, AuditEntryInput, IpAddress};
use quill_kernel_contracts::document::{DocumentId, DocumentTitle};
use quill_kernel_contracts::identity::{EmailAddress, SignerRef, UserId};
use quill_kernel_contracts::MonotonicTimeNs;
use quill_storage::ledger::AuditLedgerRuntime;
use quill_storage::store::{
    DocumentInput, IdentityRecord, IdentityStatus, StorageError, WorkflowStore,
};

fn owner() -> UserId {
    UserId::new("dbw_audit_owner").unwrap()
}

fn store_with_document() -> (WorkflowStore, DocumentId) {
    let mut s = WorkflowStore::new_in_memory();
    s.insert_identity(IdentityRecord::v1(
        owner(),
        "Dana Owner".to_string(),
        Some(EmailAddress::new("dana@example.com").unwrap()),
        MonotonicTimeNs(1),
        IdentityStatus::Active,
    ))
    .unwrap();
    let doc = s
        .insert_document(DocumentInput {
            owner_id: owner(),
            title: DocumentTitle::new("nda").unwrap(),
            file_name: "nda.pdf".to_string(),
            pdf_bytes: b"%PDF-1.4 audit".to_vec(),
            now: MonotonicTimeNs(2),
        })
        .unwrap();
    (s, doc.document_id)
}

fn entry(doc: &DocumentId, action: AuditAction, now: u64) -> AuditEntryInput {
    AuditEntryInput::v1(
        doc.clone(),
        action,
        SignerRef::User(owner()),
        IpAddress::unknown(),
        MonotonicTimeNs(now),
    )
    .unwrap()
}

#[test]
fn at_audit_db_01_emit_assigns_monotonic_entry_ids() {
    let (mut s, doc) = store_with_document();

    let a = AuditLedgerRuntime::emit(&mut s, entry(&doc, AuditAction::Uploaded, 10)).unwrap();
    let b = AuditLedgerRuntime::emit(&mut s, entry(&doc, AuditAction::Shared, 11)).unwrap();
    assert!(b.0 > a.0);
    assert_eq!(s.audit_entry_count(), 2);
}

#[test]
fn at_audit_db_02_append_only_enforced() {
    let (mut s, doc) = store_with_document();
    let id = AuditLedgerRuntime::emit(&mut s, entry(&doc, AuditAction::Uploaded, 10)).unwrap();

    assert!(matches!(
        s.attempt_overwrite_audit_entry(id),
        Err(StorageError::AppendOnlyViolation { .. })
    ));
}

#[test]
fn at_audit_db_03_emit_requires_existing_document() {
    let (mut s, _doc) = store_with_document();
    let orphan = DocumentId::new("doc_missing").unwrap();

    let err =
        AuditLedgerRuntime::emit(&mut s, entry(&orphan, AuditAction::Uploaded, 10)).unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "audit_entries", .. }
    ));
}

#[test]
fn at_audit_db_04_trail_reads_newest_first_per_document() {
    let (mut s, doc) = store_with_document();
    for (t, action) in [
        (10, AuditAction::Uploaded),
        (11, AuditAction::SignaturePlaced),
        (12, AuditAction::Finalized),
    ] {
        AuditLedgerRuntime::emit(&mut s, entry(&doc, action, t)).unwrap();
    }

    let trail = s.audit_entries_for(&doc);
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[0].action, AuditAction::Finalized);
    assert_eq!(trail[2].action, AuditAction::Uploaded);
    assert!(trail[0].recorded_at.0 > trail[2].recorded_at.0);
}
