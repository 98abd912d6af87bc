#![forbid(unsafe_code)]

use lopdf::{dictionary, Document, Object, ObjectId};

use quill_engines::geometry::PageGeometry;
use quill_kernel_contracts::mark::{PageIndex, ViewerPoint};

/// Resource name the stamp font is registered under in each touched page.
const FONT_RESOURCE_NAME: &str = "F_QS";

#[derive(Debug, Clone, PartialEq)]
pub enum StampError {
    Parse(String),
    PageOutOfRange { requested: u32, page_count: u32 },
    Render(String),
}

impl std::fmt::Display for StampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StampError::Parse(e) => write!(f, "pdf parse failed: {e}"),
            StampError::PageOutOfRange {
                requested,
                page_count,
            } => write!(f, "page {requested} out of range (document has {page_count})"),
            StampError::Render(e) => write!(f, "pdf render failed: {e}"),
        }
    }
}

impl std::error::Error for StampError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampPlacement {
    pub page_index: PageIndex,
    pub position: ViewerPoint,
}

/// Burns `Signed by: <name>` text into a PDF at each placement and returns
/// the bytes of a new document. The input bytes are never modified; callers
/// store the result under a fresh artifact ref.
pub fn stamp_signature_text(
    pdf_bytes: &[u8],
    placements: &[StampPlacement],
    signer_name: &str,
    font_size: f64,
) -> Result<Vec<u8>, StampError> {
    let mut doc = Document::load_mem(pdf_bytes).map_err(|e| StampError::Parse(e.to_string()))?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let text = format!("Signed by: {}", escape_pdf_text(signer_name));
    for placement in placements {
        let requested = placement.page_index.get();
        let page_id = *pages
            .get(&requested)
            .ok_or(StampError::PageOutOfRange {
                requested,
                page_count,
            })?;

        let (page_width, page_height) = page_dimensions(&doc, page_id)?;
        let geometry = PageGeometry::native(page_width, page_height)
            .map_err(|v| StampError::Render(format!("bad page box: {v:?}")))?;
        let p = geometry.to_pdf_space(placement.position);

        attach_stamp_font(&mut doc, page_id, font_id)?;
        let content = format!(
            "q BT /{FONT_RESOURCE_NAME} {font_size} Tf 0 0 0.8 rg {:.2} {:.2} Td ({text}) Tj ET Q",
            p.x, p.y
        );
        doc.add_page_contents(page_id, content.into_bytes())
            .map_err(|e| StampError::Render(e.to_string()))?;
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| StampError::Render(e.to_string()))?;
    Ok(out)
}

/// Walks the page's Parent chain for a MediaBox; PDFs that inherit the box
/// from a grandparent node resolve here too. Missing metadata falls back
/// to A4.
fn page_dimensions(doc: &Document, page_id: ObjectId) -> Result<(f64, f64), StampError> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map_err(|e| StampError::Parse(format!("page dict missing: {e}")))?;
        if let Some((w, h)) = extract_media_box(doc, dict) {
            return Ok((w, h));
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    Ok((595.0, 842.0))
}

fn extract_media_box(doc: &Document, dict: &lopdf::Dictionary) -> Option<(f64, f64)> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = obj_to_f64(&arr[0])?;
    let lly = obj_to_f64(&arr[1])?;
    let urx = obj_to_f64(&arr[2])?;
    let ury = obj_to_f64(&arr[3])?;
    let (w, h) = (urx - llx, ury - lly);
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some((w, h))
}

fn obj_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

/// Registers the stamp font in the page's Resources dictionary, handling
/// both inline and referenced Resources.
fn attach_stamp_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<(), StampError> {
    let mut resources_obj = {
        let page_dict = doc
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| StampError::Parse(format!("page dict missing: {e}")))?;
        page_dict
            .remove(b"Resources")
            .unwrap_or_else(|| Object::Dictionary(dictionary! {}))
    };

    match &mut resources_obj {
        Object::Reference(id) => {
            let res_dict = doc
                .get_object_mut(*id)
                .and_then(|o| o.as_dict_mut())
                .map_err(|e| StampError::Parse(format!("resources missing: {e}")))?;
            set_font_entry(res_dict, font_id)?;
        }
        Object::Dictionary(dict) => {
            set_font_entry(dict, font_id)?;
        }
        _ => return Err(StampError::Parse("resources entry is not a dict".to_string())),
    }

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| StampError::Parse(format!("page dict missing: {e}")))?;
    page_dict.set("Resources", resources_obj);
    Ok(())
}

fn set_font_entry(res_dict: &mut lopdf::Dictionary, font_id: ObjectId) -> Result<(), StampError> {
    let mut font_obj = res_dict
        .remove(b"Font")
        .unwrap_or_else(|| Object::Dictionary(dictionary! {}));
    match &mut font_obj {
        Object::Dictionary(dict) => {
            dict.set(FONT_RESOURCE_NAME, font_id);
        }
        _ => return Err(StampError::Parse("font entry is not a dict".to_string())),
    }
    res_dict.set("Font", font_obj);
    Ok(())
}

/// Escapes the characters with meaning inside a PDF literal string and
/// drops control characters outright.
fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
