#![forbid(unsafe_code)]

use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use quill_core::audit_trail::AuditTrailRuntime;
use quill_core::config::WorkflowConfig;
use quill_core::error::WorkflowError;
use quill_core::finalize::{FinalizeLocks, FinalizeRuntime};
use quill_core::lifecycle::{token_config, DocumentLifecycleRuntime};
use quill_core::marks::MarkPlacementRuntime;
use quill_core::ops::OperatorLog;
use quill_engines::captoken::TokenSigner;
use quill_kernel_contracts::audit::{AuditEntry, IpAddress};
use quill_kernel_contracts::document::{DocumentId, DocumentTitle};
use quill_kernel_contracts::identity::{EmailAddress, SignerRef, UserId};
use quill_kernel_contracts::mark::{PageIndex, ViewerPoint};
use quill_kernel_contracts::token::{CapabilityClaims, SessionClaims};
use quill_kernel_contracts::MonotonicTimeNs;
use quill_storage::store::{DocumentRecord, IdentityRecord, IdentityStatus, MarkRecord, WorkflowStore};

// ---- wire DTOs ----

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadDocumentRequest {
    pub title: String,
    pub file_name: String,
    pub pdf_base64: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DocumentResponse {
    pub document_id: String,
    pub title: String,
    pub file_name: String,
    pub status: String,
    pub created_at_ns: u64,
    pub updated_at_ns: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentResponse>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ShareDocumentRequest {
    pub email: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ShareDocumentResponse {
    pub token: String,
    pub link: String,
    pub expires_at_ns: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PublicDocumentResponse {
    pub document: DocumentResponse,
    pub signer_email: String,
    pub marks: Vec<MarkResponse>,
    pub pdf_base64: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlaceMarkRequest {
    pub document_id: String,
    pub x: f64,
    pub y: f64,
    /// 1-based; zero and negative values collapse to the first page.
    pub page: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarkResponse {
    pub mark_id: String,
    pub document_id: String,
    pub x: f64,
    pub y: f64,
    pub page: u32,
    pub status: String,
    pub placed_by: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MarkListResponse {
    pub marks: Vec<MarkResponse>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FinalizeRequest {
    pub document_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FinalizeResponse {
    pub document: DocumentResponse,
    pub consumed_marks: u64,
    pub signer_name: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AuditEntryResponse {
    pub entry_id: u64,
    pub action: String,
    pub performed_by: String,
    pub ip_address: String,
    pub recorded_at_ns: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuditTrailResponse {
    pub entries: Vec<AuditEntryResponse>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub operator_alerts: u64,
}

/// Transport-level error: an HTTP status plus an intentionally terse reason.
/// Credential failures all collapse to the same 401 body so callers cannot
/// distinguish expired from forged from missing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ApiError {
    pub status: u16,
    pub reason: String,
}

impl ApiError {
    fn unauthorized() -> Self {
        Self {
            status: 401,
            reason: "unauthorized".to_string(),
        }
    }

    fn not_found() -> Self {
        Self {
            status: 404,
            reason: "not found".to_string(),
        }
    }

    fn bad_request(reason: impl Into<String>) -> Self {
        Self {
            status: 400,
            reason: reason.into(),
        }
    }

    fn internal(reason: impl Into<String>) -> Self {
        Self {
            status: 500,
            reason: reason.into(),
        }
    }
}

fn map_workflow_error(e: WorkflowError) -> ApiError {
    match e {
        WorkflowError::NotFound { .. } => ApiError::not_found(),
        WorkflowError::Unauthorized => ApiError::unauthorized(),
        WorkflowError::Contract(_) => ApiError::bad_request("invalid request"),
        WorkflowError::InvalidState { message, .. } => ApiError::bad_request(message),
        WorkflowError::DependencyFailure { .. } => ApiError::internal("internal error"),
        WorkflowError::Storage(_) => ApiError::internal("internal error"),
    }
}

/// Who a verified bearer credential resolves to.
#[derive(Debug, Clone)]
enum Caller {
    Session(UserId),
    Capability(CapabilityClaims),
}

/// Single-process runtime behind the HTTP surface: the in-memory store, the
/// token signer, and the workflow runtimes, called under one mutex by the
/// axum handlers.
#[derive(Debug)]
pub struct AdapterRuntime {
    store: WorkflowStore,
    signer: TokenSigner,
    ops: OperatorLog,
    lifecycle: DocumentLifecycleRuntime,
    marks: MarkPlacementRuntime,
    finalize: FinalizeRuntime,
    audit: AuditTrailRuntime,
}

impl AdapterRuntime {
    pub fn new(config: WorkflowConfig, signer: TokenSigner) -> Result<Self, String> {
        let ops = OperatorLog::new();
        let lifecycle = DocumentLifecycleRuntime::new(config.clone(), ops.clone())
            .map_err(|v| format!("lifecycle config invalid: {v:?}"))?;
        let marks = MarkPlacementRuntime::new(config.clone(), ops.clone())
            .map_err(|v| format!("marks config invalid: {v:?}"))?;
        let finalize = FinalizeRuntime::new(config, ops.clone(), FinalizeLocks::new())
            .map_err(|v| format!("finalize config invalid: {v:?}"))?;
        Ok(Self {
            store: WorkflowStore::new_in_memory(),
            signer,
            ops,
            lifecycle,
            marks,
            finalize,
            audit: AuditTrailRuntime,
        })
    }

    /// Builds the runtime from environment variables:
    /// `QUILL_SHARED_SECRET` (>= 16 bytes; absent means a process-local
    /// random secret), `QUILL_LINK_BASE_URL`, `QUILL_STRICT_PENDING_ONLY`.
    pub fn default_from_env() -> Result<Self, String> {
        let signer = match env::var("QUILL_SHARED_SECRET") {
            Ok(secret) => TokenSigner::new(secret.as_bytes())
                .map_err(|v| format!("QUILL_SHARED_SECRET invalid: {v:?}"))?,
            Err(_) => TokenSigner::random(),
        };
        let mut config = WorkflowConfig::mvp_v1();
        if let Ok(base) = env::var("QUILL_LINK_BASE_URL") {
            if !base.trim().is_empty() {
                config.link_base_url = base;
            }
        }
        if let Ok(v) = env::var("QUILL_STRICT_PENDING_ONLY") {
            config.strict_pending_only = !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "" | "0" | "false" | "off" | "no"
            );
        }
        Self::new(config, signer)
    }

    /// Registers an identity row. Intended for process bootstrap; there is
    /// no self-serve registration surface in this slice.
    pub fn seed_identity(
        &mut self,
        user_id: &str,
        display_name: &str,
        email: Option<&str>,
    ) -> Result<(), String> {
        let user_id = UserId::new(user_id).map_err(|v| format!("user id invalid: {v:?}"))?;
        let email = match email {
            Some(addr) => {
                Some(EmailAddress::new(addr).map_err(|v| format!("email invalid: {v:?}"))?)
            }
            None => None,
        };
        self.store
            .insert_identity(IdentityRecord::v1(
                user_id,
                display_name.to_string(),
                email,
                now_ns(),
                IdentityStatus::Active,
            ))
            .map_err(|e| format!("identity insert failed: {e:?}"))
    }

    /// Mints a session token for a seeded identity.
    pub fn issue_session_token(&self, user_id: &str) -> Result<String, String> {
        let user_id = UserId::new(user_id).map_err(|v| format!("user id invalid: {v:?}"))?;
        if self.store.identity_row(&user_id).is_none() {
            return Err("unknown user".to_string());
        }
        let now = now_ns();
        let claims = SessionClaims::v1(
            user_id,
            now,
            now.saturating_add_ns(token_config().session_ttl_ns),
        )
        .map_err(|v| format!("session claims invalid: {v:?}"))?;
        self.signer
            .issue_session(&claims)
            .map_err(|e| format!("session mint failed: {e}"))
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok".to_string(),
            operator_alerts: self.ops.alert_count() as u64,
        }
    }

    // ---- authenticated operations ----

    pub fn upload_document(
        &mut self,
        bearer: Option<&str>,
        request: UploadDocumentRequest,
        peer_ip: Option<&str>,
    ) -> Result<DocumentResponse, ApiError> {
        let user_id = self.require_session(bearer)?;
        let title =
            DocumentTitle::new(request.title).map_err(|_| ApiError::bad_request("invalid title"))?;
        let pdf_bytes = B64
            .decode(request.pdf_base64.as_bytes())
            .map_err(|_| ApiError::bad_request("pdf_base64 is not valid base64"))?;
        let record = self
            .lifecycle
            .upload(
                &mut self.store,
                user_id,
                title,
                request.file_name,
                pdf_bytes,
                ip_or_unknown(peer_ip),
                now_ns(),
            )
            .map_err(map_workflow_error)?;
        Ok(document_response(&record))
    }

    pub fn list_documents(&self, bearer: Option<&str>) -> Result<DocumentListResponse, ApiError> {
        let user_id = self.require_session(bearer)?;
        let documents = self
            .lifecycle
            .documents(&self.store, &user_id)
            .iter()
            .map(document_response)
            .collect();
        Ok(DocumentListResponse { documents })
    }

    pub fn get_document(
        &self,
        bearer: Option<&str>,
        document_id: &str,
    ) -> Result<DocumentResponse, ApiError> {
        let user_id = self.require_session(bearer)?;
        let document_id = parse_document_id(document_id)?;
        let record = self
            .lifecycle
            .document(&self.store, &user_id, &document_id)
            .map_err(map_workflow_error)?;
        Ok(document_response(&record))
    }

    pub fn share_document(
        &mut self,
        bearer: Option<&str>,
        document_id: &str,
        request: ShareDocumentRequest,
        peer_ip: Option<&str>,
    ) -> Result<ShareDocumentResponse, ApiError> {
        let user_id = self.require_session(bearer)?;
        let document_id = parse_document_id(document_id)?;
        let recipient = EmailAddress::new(request.email)
            .map_err(|_| ApiError::bad_request("invalid recipient email"))?;
        let grant = self
            .lifecycle
            .share(
                &mut self.store,
                &self.signer,
                &user_id,
                &document_id,
                recipient,
                ip_or_unknown(peer_ip),
                now_ns(),
            )
            .map_err(map_workflow_error)?;
        Ok(ShareDocumentResponse {
            token: grant.token,
            link: grant.link,
            expires_at_ns: grant.expires_at.0,
        })
    }

    // ---- capability-facing operations ----

    pub fn public_document(&self, token: &str) -> Result<PublicDocumentResponse, ApiError> {
        let claims = self
            .signer
            .verify_capability(token, now_ns())
            .map_err(|_| ApiError::unauthorized())?;
        let view = self
            .lifecycle
            .public_view(&self.store, &claims)
            .map_err(map_workflow_error)?;
        Ok(PublicDocumentResponse {
            document: document_response(&view.document),
            signer_email: claims.signer_email.as_str().to_string(),
            marks: view.marks.iter().map(mark_response).collect(),
            pdf_base64: B64.encode(view.pdf_bytes),
        })
    }

    /// Places a mark. Sessions must own the document; capability bearers
    /// must present a token bound to it.
    pub fn place_mark(
        &mut self,
        bearer: Option<&str>,
        request: PlaceMarkRequest,
        peer_ip: Option<&str>,
    ) -> Result<MarkResponse, ApiError> {
        let document_id = parse_document_id(&request.document_id)?;
        let placed_by = self.resolve_document_actor(bearer, &document_id)?;
        let position = ViewerPoint::new(request.x, request.y)
            .map_err(|_| ApiError::bad_request("invalid mark position"))?;
        let page_index = PageIndex::clamped_from_raw(request.page);
        let record = self
            .marks
            .place(
                &mut self.store,
                document_id,
                placed_by,
                position,
                page_index,
                ip_or_unknown(peer_ip),
                now_ns(),
            )
            .map_err(map_workflow_error)?;
        Ok(mark_response(&record))
    }

    pub fn list_marks(
        &self,
        bearer: Option<&str>,
        document_id: &str,
    ) -> Result<MarkListResponse, ApiError> {
        let document_id = parse_document_id(document_id)?;
        self.resolve_document_actor(bearer, &document_id)?;
        let marks = self
            .marks
            .marks(&self.store, &document_id)
            .map_err(map_workflow_error)?;
        Ok(MarkListResponse {
            marks: marks.iter().map(mark_response).collect(),
        })
    }

    pub fn finalize_document(
        &mut self,
        bearer: Option<&str>,
        request: FinalizeRequest,
        peer_ip: Option<&str>,
    ) -> Result<FinalizeResponse, ApiError> {
        let document_id = parse_document_id(&request.document_id)?;
        let requester = self.resolve_document_actor(bearer, &document_id)?;
        let outcome = self
            .finalize
            .run(
                &mut self.store,
                &requester,
                &document_id,
                ip_or_unknown(peer_ip),
                now_ns(),
            )
            .map_err(map_workflow_error)?;
        Ok(FinalizeResponse {
            document: document_response(&outcome.document),
            consumed_marks: outcome.consumed_marks as u64,
            signer_name: outcome.signer_name,
        })
    }

    pub fn audit_trail(
        &self,
        bearer: Option<&str>,
        document_id: &str,
    ) -> Result<AuditTrailResponse, ApiError> {
        let user_id = self.require_session(bearer)?;
        let document_id = parse_document_id(document_id)?;
        let entries = self
            .audit
            .trail(&self.store, &user_id, &document_id)
            .map_err(map_workflow_error)?;
        Ok(AuditTrailResponse {
            entries: entries.iter().map(audit_entry_response).collect(),
        })
    }

    // ---- credential resolution ----

    fn authenticate(&self, bearer: Option<&str>) -> Result<Caller, ApiError> {
        let token = bearer.ok_or_else(ApiError::unauthorized)?;
        let now = now_ns();
        if let Ok(claims) = self.signer.verify_session(token, now) {
            if self.store.identity_row(&claims.user_id).is_none() {
                return Err(ApiError::unauthorized());
            }
            return Ok(Caller::Session(claims.user_id));
        }
        match self.signer.verify_capability(token, now) {
            Ok(claims) => Ok(Caller::Capability(claims)),
            Err(_) => Err(ApiError::unauthorized()),
        }
    }

    fn require_session(&self, bearer: Option<&str>) -> Result<UserId, ApiError> {
        match self.authenticate(bearer)? {
            Caller::Session(user_id) => Ok(user_id),
            Caller::Capability(_) => Err(ApiError::unauthorized()),
        }
    }

    /// Resolves the bearer into a signer allowed to act on `document_id`:
    /// the owning session, or a capability bound to exactly that document.
    fn resolve_document_actor(
        &self,
        bearer: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<SignerRef, ApiError> {
        match self.authenticate(bearer)? {
            Caller::Session(user_id) => {
                self.lifecycle
                    .document(&self.store, &user_id, document_id)
                    .map_err(map_workflow_error)?;
                Ok(SignerRef::User(user_id))
            }
            Caller::Capability(claims) => {
                if &claims.document_id != document_id {
                    return Err(ApiError::unauthorized());
                }
                Ok(SignerRef::External(claims.signer_email))
            }
        }
    }
}

// ---- response mapping ----

fn document_response(record: &DocumentRecord) -> DocumentResponse {
    DocumentResponse {
        document_id: record.document_id.as_str().to_string(),
        title: record.title.as_str().to_string(),
        file_name: record.file_name.clone(),
        status: record.status.as_str().to_string(),
        created_at_ns: record.created_at.0,
        updated_at_ns: record.updated_at.0,
    }
}

fn mark_response(record: &MarkRecord) -> MarkResponse {
    MarkResponse {
        mark_id: record.mark_id.as_str().to_string(),
        document_id: record.document_id.as_str().to_string(),
        x: record.position.x,
        y: record.position.y,
        page: record.page_index.get(),
        status: record.status.as_str().to_string(),
        placed_by: record.signer_ref.as_audit_str().to_string(),
    }
}

fn audit_entry_response(entry: &AuditEntry) -> AuditEntryResponse {
    AuditEntryResponse {
        entry_id: entry.entry_id.0,
        action: entry.action.as_str().to_string(),
        performed_by: entry.performed_by.as_audit_str().to_string(),
        ip_address: entry.ip_address.as_str().to_string(),
        recorded_at_ns: entry.recorded_at.0,
    }
}

fn parse_document_id(raw: &str) -> Result<DocumentId, ApiError> {
    DocumentId::new(raw).map_err(|_| ApiError::bad_request("invalid document id"))
}

fn ip_or_unknown(peer_ip: Option<&str>) -> IpAddress {
    peer_ip
        .and_then(|ip| IpAddress::new(ip).ok())
        .unwrap_or_else(IpAddress::unknown)
}

fn now_ns() -> MonotonicTimeNs {
    let ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    MonotonicTimeNs(ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    fn one_page_pdf_base64() -> String {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        B64.encode(out)
    }

    fn runtime_with_user() -> (AdapterRuntime, String) {
        let mut rt = AdapterRuntime::new(WorkflowConfig::mvp_v1(), TokenSigner::random()).unwrap();
        rt.seed_identity("user_api", "Ada Pierce", Some("ada@example.com"))
            .unwrap();
        let session = rt.issue_session_token("user_api").unwrap();
        (rt, session)
    }

    fn upload(rt: &mut AdapterRuntime, session: &str) -> DocumentResponse {
        rt.upload_document(
            Some(session),
            UploadDocumentRequest {
                title: "consulting agreement".to_string(),
                file_name: "agreement.pdf".to_string(),
                pdf_base64: one_page_pdf_base64(),
            },
            Some("203.0.113.7"),
        )
        .unwrap()
    }

    #[test]
    fn at_api_01_upload_list_get_round_trip() {
        let (mut rt, session) = runtime_with_user();
        let doc = upload(&mut rt, &session);
        assert_eq!(doc.status, "Pending");

        let listed = rt.list_documents(Some(&session)).unwrap();
        assert_eq!(listed.documents, vec![doc.clone()]);
        assert_eq!(
            rt.get_document(Some(&session), &doc.document_id).unwrap(),
            doc
        );
    }

    #[test]
    fn at_api_02_credential_failures_share_one_401_body() {
        let (rt, _session) = runtime_with_user();

        let missing = rt.list_documents(None).unwrap_err();
        let garbage = rt.list_documents(Some("garbage")).unwrap_err();
        let forged = {
            let mut other =
                AdapterRuntime::new(WorkflowConfig::mvp_v1(), TokenSigner::random()).unwrap();
            other
                .seed_identity("user_api", "Ada Pierce", Some("ada@example.com"))
                .unwrap();
            let foreign_session = other.issue_session_token("user_api").unwrap();
            rt.list_documents(Some(&foreign_session)).unwrap_err()
        };

        assert_eq!(missing, ApiError::unauthorized());
        assert_eq!(garbage, missing);
        assert_eq!(forged, missing);
    }

    #[test]
    fn at_api_03_share_grants_scoped_public_access() {
        let (mut rt, session) = runtime_with_user();
        let doc = upload(&mut rt, &session);

        let grant = rt
            .share_document(
                Some(&session),
                &doc.document_id,
                ShareDocumentRequest {
                    email: "Guest@Example.com".to_string(),
                },
                None,
            )
            .unwrap();
        assert!(grant.link.ends_with(&grant.token));

        let view = rt.public_document(&grant.token).unwrap();
        assert_eq!(view.document, doc);
        assert_eq!(view.signer_email, "guest@example.com");
        assert!(!view.pdf_base64.is_empty());

        // A capability is not a session: owner-only surfaces refuse it.
        assert_eq!(
            rt.list_documents(Some(&grant.token)).unwrap_err(),
            ApiError::unauthorized()
        );
        assert_eq!(
            rt.audit_trail(Some(&grant.token), &doc.document_id)
                .unwrap_err(),
            ApiError::unauthorized()
        );
    }

    #[test]
    fn at_api_04_capability_is_bound_to_its_document() {
        let (mut rt, session) = runtime_with_user();
        let doc_a = upload(&mut rt, &session);
        let doc_b = upload(&mut rt, &session);

        let grant = rt
            .share_document(
                Some(&session),
                &doc_a.document_id,
                ShareDocumentRequest {
                    email: "guest@example.com".to_string(),
                },
                None,
            )
            .unwrap();

        let placed = rt
            .place_mark(
                Some(&grant.token),
                PlaceMarkRequest {
                    document_id: doc_a.document_id.clone(),
                    x: 150.0,
                    y: 150.0,
                    page: 1,
                },
                None,
            )
            .unwrap();
        assert_eq!(placed.placed_by, "guest@example.com");
        assert_eq!(placed.status, "pending");

        let err = rt
            .place_mark(
                Some(&grant.token),
                PlaceMarkRequest {
                    document_id: doc_b.document_id,
                    x: 150.0,
                    y: 150.0,
                    page: 1,
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err, ApiError::unauthorized());
    }

    #[test]
    fn at_api_05_page_zero_clamps_to_first_page_and_finalize_stamps() {
        let (mut rt, session) = runtime_with_user();
        let doc = upload(&mut rt, &session);

        let placed = rt
            .place_mark(
                Some(&session),
                PlaceMarkRequest {
                    document_id: doc.document_id.clone(),
                    x: 150.0,
                    y: 150.0,
                    page: 0,
                },
                None,
            )
            .unwrap();
        assert_eq!(placed.page, 1);

        let outcome = rt
            .finalize_document(
                Some(&session),
                FinalizeRequest {
                    document_id: doc.document_id.clone(),
                },
                Some("203.0.113.7"),
            )
            .unwrap();
        assert_eq!(outcome.document.status, "Signed");
        assert_eq!(outcome.document.file_name, "signed-agreement.pdf");
        assert_eq!(outcome.consumed_marks, 1);
        assert_eq!(outcome.signer_name, "Ada Pierce");

        let marks = rt.list_marks(Some(&session), &doc.document_id).unwrap();
        assert_eq!(marks.marks[0].status, "signed");
    }

    #[test]
    fn at_api_06_audit_trail_reads_newest_first_with_legacy_strings() {
        let (mut rt, session) = runtime_with_user();
        let doc = upload(&mut rt, &session);
        rt.place_mark(
            Some(&session),
            PlaceMarkRequest {
                document_id: doc.document_id.clone(),
                x: 10.0,
                y: 10.0,
                page: 1,
            },
            None,
        )
        .unwrap();
        rt.finalize_document(
            Some(&session),
            FinalizeRequest {
                document_id: doc.document_id.clone(),
            },
            None,
        )
        .unwrap();

        let trail = rt.audit_trail(Some(&session), &doc.document_id).unwrap();
        let actions: Vec<&str> = trail.entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(
            actions,
            vec!["Document Finalized", "Signature Placed", "Document Uploaded"]
        );
        assert_eq!(trail.entries[1].ip_address, "unknown");
        assert_eq!(trail.entries[2].ip_address, "203.0.113.7");
    }

    #[test]
    fn at_api_07_finalize_without_marks_is_a_400() {
        let (mut rt, session) = runtime_with_user();
        let doc = upload(&mut rt, &session);

        let err = rt
            .finalize_document(
                Some(&session),
                FinalizeRequest {
                    document_id: doc.document_id,
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.reason, "no pending signature marks to finalize");
    }

    #[test]
    fn at_api_08_health_reports_operator_alert_count() {
        let (rt, _session) = runtime_with_user();
        let health = rt.health_report();
        assert_eq!(health.status, "ok");
        assert_eq!(health.operator_alerts, 0);
    }

    #[test]
    fn at_api_09_response_wire_shape_is_stable() {
        let response = DocumentResponse {
            document_id: "doc_000001".to_string(),
            title: "consulting agreement".to_string(),
            file_name: "agreement.pdf".to_string(),
            status: "Pending".to_string(),
            created_at_ns: 10,
            updated_at_ns: 10,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["document_id"], "doc_000001");
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["created_at_ns"], 10);
    }
}
