#![forbid(unsafe_code)]

use quill_kernel_contracts::document::{DocumentStatus, DocumentTitle};
use quill_kernel_contracts::identity::{EmailAddress, SignerRef, UserId};
use quill_kernel_contracts::mark::{MarkStatus, PageIndex, ViewerPoint};
use quill_kernel_contracts::MonotonicTimeNs;
use quill_storage::store::{
    DocumentInput, DocumentRecord, IdentityRecord, IdentityStatus, MarkInput, StorageError,
    WorkflowStore,
};

fn owner() -> UserId {
    UserId::new("dbw_doc_owner").unwrap()
}

fn stranger() -> UserId {
    UserId::new("dbw_doc_stranger").unwrap()
}

fn store_with_identities() -> WorkflowStore {
    let mut s = WorkflowStore::new_in_memory();
    for (user, name, email) in [
        (owner(), "Dana Owner", "dana@example.com"),
        (stranger(), "Sam Stranger", "sam@example.com"),
    ] {
        s.insert_identity(IdentityRecord::v1(
            user,
            name.to_string(),
            Some(EmailAddress::new(email).unwrap()),
            MonotonicTimeNs(1),
            IdentityStatus::Active,
        ))
        .unwrap();
    }
    s
}

fn upload(s: &mut WorkflowStore, now: u64) -> DocumentRecord {
    s.insert_document(DocumentInput {
        owner_id: owner(),
        title: DocumentTitle::new("lease agreement").unwrap(),
        file_name: "lease.pdf".to_string(),
        pdf_bytes: b"%PDF-1.4 dbw".to_vec(),
        now: MonotonicTimeNs(now),
    })
    .unwrap()
}

#[test]
fn at_doc_db_01_upload_writes_document_and_original_blob() {
    let mut s = store_with_identities();
    let doc = upload(&mut s, 10);

    assert_eq!(doc.status, DocumentStatus::Pending);
    assert_eq!(doc.file_name, "lease.pdf");
    assert_eq!(
        s.blob_get(&doc.current_artifact_ref).unwrap(),
        b"%PDF-1.4 dbw"
    );
    let blob = s.blob_record(&doc.current_artifact_ref).unwrap();
    assert_eq!(blob.byte_len, b"%PDF-1.4 dbw".len() as u64);
}

#[test]
fn at_doc_db_02_owner_scoping_keeps_lists_disjoint() {
    let mut s = store_with_identities();
    upload(&mut s, 10);

    assert_eq!(s.documents_for_owner(&owner()).len(), 1);
    assert!(s.documents_for_owner(&stranger()).is_empty());
}

#[test]
fn at_doc_db_03_marks_require_existing_document() {
    let mut s = store_with_identities();
    let doc = upload(&mut s, 10);

    let orphan = quill_kernel_contracts::document::DocumentId::new("doc_none").unwrap();
    let err = s
        .insert_mark(MarkInput {
            document_id: orphan,
            signer_ref: SignerRef::User(owner()),
            position: ViewerPoint::new(10.0, 10.0).unwrap(),
            page_index: PageIndex::new(1).unwrap(),
            now: MonotonicTimeNs(11),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "signature_marks", .. }
    ));

    s.insert_mark(MarkInput {
        document_id: doc.document_id.clone(),
        signer_ref: SignerRef::User(owner()),
        position: ViewerPoint::new(10.0, 10.0).unwrap(),
        page_index: PageIndex::new(1).unwrap(),
        now: MonotonicTimeNs(12),
    })
    .unwrap();
    assert_eq!(s.marks_for(&doc.document_id).len(), 1);
}

#[test]
fn at_doc_db_04_commit_flips_marks_and_document_in_one_step() {
    let mut s = store_with_identities();
    let doc = upload(&mut s, 10);
    let mark = s
        .insert_mark(MarkInput {
            document_id: doc.document_id.clone(),
            signer_ref: SignerRef::User(owner()),
            position: ViewerPoint::new(150.0, 150.0).unwrap(),
            page_index: PageIndex::new(1).unwrap(),
            now: MonotonicTimeNs(11),
        })
        .unwrap();

    let signed_ref =
        quill_kernel_contracts::document::ArtifactRef::new("blob://dbw/signed/lease.pdf").unwrap();
    s.blob_put(
        signed_ref.clone(),
        b"%PDF-1.4 signed dbw".to_vec(),
        MonotonicTimeNs(12),
    )
    .unwrap();

    let updated = s
        .commit_signed_document(
            &doc.document_id,
            "signed-lease.pdf".to_string(),
            signed_ref.clone(),
            &[mark.mark_id],
            MonotonicTimeNs(12),
        )
        .unwrap();

    assert_eq!(updated.status, DocumentStatus::Signed);
    assert_eq!(updated.file_name, "signed-lease.pdf");
    assert_eq!(updated.current_artifact_ref, signed_ref);
    assert!(s.pending_marks_for(&doc.document_id).is_empty());
    assert_eq!(s.marks_for(&doc.document_id)[0].status, MarkStatus::Signed);
    // The original artifact stays readable after the flip.
    assert!(s.blob_get(&doc.current_artifact_ref).is_some());
}
