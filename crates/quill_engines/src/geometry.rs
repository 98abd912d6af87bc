#![forbid(unsafe_code)]

use quill_kernel_contracts::mark::ViewerPoint;
use quill_kernel_contracts::{ContractViolation, Validate};

/// A point in PDF page space: origin at the bottom-left, y growing upward,
/// measured in PDF units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPoint {
    pub x: f64,
    pub y: f64,
}

/// Geometry of one rendered page: the PDF's native page box plus the width
/// the viewer actually rendered it at. The rendered width is what makes the
/// transform scale-correct; a viewer rendering a 612pt page at 612px has
/// `rendered_width == page_width` and a scale of 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    page_width: f64,
    page_height: f64,
    rendered_width: f64,
}

impl PageGeometry {
    pub fn new(
        page_width: f64,
        page_height: f64,
        rendered_width: f64,
    ) -> Result<Self, ContractViolation> {
        let g = Self {
            page_width,
            page_height,
            rendered_width,
        };
        g.validate()?;
        Ok(g)
    }

    /// Geometry for a viewer that renders at the PDF's native width.
    pub fn native(page_width: f64, page_height: f64) -> Result<Self, ContractViolation> {
        Self::new(page_width, page_height, page_width)
    }

    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    pub fn scale(&self) -> f64 {
        self.rendered_width / self.page_width
    }

    /// Viewer space (top-left origin, rendered pixels) to PDF space
    /// (bottom-left origin, PDF points). Pure and total for valid geometry.
    pub fn to_pdf_space(&self, point: ViewerPoint) -> PdfPoint {
        let scale = self.scale();
        PdfPoint {
            x: point.x / scale,
            y: self.page_height - point.y / scale,
        }
    }

    /// Exact inverse of [`to_pdf_space`](Self::to_pdf_space).
    pub fn from_pdf_space(&self, point: PdfPoint) -> ViewerPoint {
        let scale = self.scale();
        ViewerPoint {
            x: point.x * scale,
            y: (self.page_height - point.y) * scale,
        }
    }
}

impl Validate for PageGeometry {
    fn validate(&self) -> Result<(), ContractViolation> {
        for (field, value) in [
            ("page_geometry.page_width", self.page_width),
            ("page_geometry.page_height", self.page_height),
            ("page_geometry.rendered_width", self.rendered_width),
        ] {
            if !value.is_finite() {
                return Err(ContractViolation::NotFinite { field });
            }
            if value <= 0.0 {
                return Err(ContractViolation::InvalidRange {
                    field,
                    min: f64::MIN_POSITIVE,
                    max: f64::MAX,
                    got: value,
                });
            }
        }
        Ok(())
    }
}
