#![forbid(unsafe_code)]

use quill_engines::captoken::DEFAULT_CAPABILITY_TTL_NS;
use quill_kernel_contracts::{ContractViolation, Validate};

/// Workflow-wide knobs. One instance is built at process start and shared
/// by every runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Base URL prefixed onto minted signing links.
    pub link_base_url: String,
    /// Lifetime of a capability signing link, nanoseconds.
    pub capability_ttl_ns: u64,
    /// Font size of the finalization stamp, PDF points.
    pub stamp_font_size: f64,
    /// Upper bound on an uploaded PDF artifact.
    pub max_artifact_bytes: u64,
    /// When set, sharing and mark placement are refused on terminal
    /// documents. Off by default: terminal documents silently keep
    /// accepting both the way existing clients expect, and finalization
    /// ignores the extra marks.
    pub strict_pending_only: bool,
}

impl WorkflowConfig {
    pub fn mvp_v1() -> Self {
        Self {
            link_base_url: "http://localhost:8080".to_string(),
            capability_ttl_ns: DEFAULT_CAPABILITY_TTL_NS,
            stamp_font_size: 16.0,
            max_artifact_bytes: 10 * 1024 * 1024,
            strict_pending_only: false,
        }
    }
}

impl Validate for WorkflowConfig {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.link_base_url.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "workflow_config.link_base_url",
                reason: "must not be empty",
            });
        }
        if self.capability_ttl_ns == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "workflow_config.capability_ttl_ns",
                reason: "must be > 0",
            });
        }
        if !self.stamp_font_size.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "workflow_config.stamp_font_size",
            });
        }
        if self.stamp_font_size <= 0.0 {
            return Err(ContractViolation::InvalidRange {
                field: "workflow_config.stamp_font_size",
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
                got: self.stamp_font_size,
            });
        }
        if self.max_artifact_bytes == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "workflow_config.max_artifact_bytes",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}
