#![forbid(unsafe_code)]

use crate::{ContractViolation, Validate};

pub const MAX_VIEWER_COORD: f64 = 20_000.0;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkId(String);

impl MarkId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "mark_id",
                reason: "must not be empty",
            });
        }
        if id.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "mark_id",
                reason: "must be <= 64 chars",
            });
        }
        if id.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ContractViolation::InvalidValue {
                field: "mark_id",
                reason: "must not contain whitespace or control characters",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for MarkId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "mark_id",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// 1-based page number a mark targets within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(u32);

impl PageIndex {
    pub fn new(index: u32) -> Result<Self, ContractViolation> {
        if index == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "page_index",
                reason: "must be >= 1",
            });
        }
        Ok(Self(index))
    }

    /// Intake-side clamp: viewer clients occasionally report page 0 or a
    /// negative page for the first page; those collapse to page 1 here.
    pub fn clamped_from_raw(raw: i64) -> Self {
        if raw <= 0 {
            Self(1)
        } else if raw > u32::MAX as i64 {
            Self(u32::MAX)
        } else {
            Self(raw as u32)
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Validate for PageIndex {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "page_index",
                reason: "must be >= 1",
            });
        }
        Ok(())
    }
}

/// A point in viewer space: origin at the top-left of the rendered page,
/// y growing downward, measured in rendered pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPoint {
    pub x: f64,
    pub y: f64,
}

impl ViewerPoint {
    pub fn new(x: f64, y: f64) -> Result<Self, ContractViolation> {
        let p = Self { x, y };
        p.validate()?;
        Ok(p)
    }
}

impl Validate for ViewerPoint {
    fn validate(&self) -> Result<(), ContractViolation> {
        if !self.x.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "viewer_point.x",
            });
        }
        if !self.y.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "viewer_point.y",
            });
        }
        if self.x < 0.0 || self.x > MAX_VIEWER_COORD {
            return Err(ContractViolation::InvalidRange {
                field: "viewer_point.x",
                min: 0.0,
                max: MAX_VIEWER_COORD,
                got: self.x,
            });
        }
        if self.y < 0.0 || self.y > MAX_VIEWER_COORD {
            return Err(ContractViolation::InvalidRange {
                field: "viewer_point.y",
                min: 0.0,
                max: MAX_VIEWER_COORD,
                got: self.y,
            });
        }
        Ok(())
    }
}

/// A mark transitions `Pending -> Signed` exactly once, and only as part of
/// a finalization run on its owning document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkStatus {
    Pending,
    Signed,
}

impl MarkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkStatus::Pending => "pending",
            MarkStatus::Signed => "signed",
        }
    }
}
