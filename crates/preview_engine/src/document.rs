//! Document decoding seam.
//!
//! Decoding is delegated to a [`DocumentDecoder`] that callers construct and
//! pass in; nothing here holds a global handle to a PDF library.

use std::fmt;

use lopdf::{Dictionary, Document, Object};

use crate::{FailureKind, LoadError};

/// Scale used for on-screen and print rendering.
pub const DEFAULT_RENDER_SCALE: f32 = 1.5;

/// US Letter, used when a page tree carries no `MediaBox`.
const DEFAULT_MEDIA_BOX: (f32, f32) = (612.0, 792.0);

/// Limits `Parent` traversal so a cyclic page tree cannot loop forever.
const MAX_PARENT_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// 1-based page number.
    pub number: u32,
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width_px: u32,
    pub height_px: u32,
}

impl PageInfo {
    pub fn viewport(&self, scale: f32) -> Viewport {
        Viewport {
            width_px: (self.width_pt * scale).round().max(0.0) as u32,
            height_px: (self.height_pt * scale).round().max(0.0) as u32,
        }
    }
}

/// A decoded, paginated document.
pub trait DecodedDocument: Send + Sync + fmt::Debug {
    fn page_count(&self) -> u32;

    /// Returns page `number` (1-based).
    fn page(&self, number: u32) -> Result<PageInfo, LoadError>;

    fn byte_len(&self) -> u64;
}

pub trait DocumentDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn DecodedDocument>, LoadError>;
}

/// Decodes PDF bytes with `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfDecoder;

#[derive(Debug, Clone)]
struct LopdfDocument {
    pages: Vec<PageInfo>,
    byte_len: u64,
}

impl DocumentDecoder for LopdfDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn DecodedDocument>, LoadError> {
        let doc = Document::load_mem(bytes)
            .map_err(|err| LoadError::new(FailureKind::Decode, err.to_string()))?;
        if doc.is_encrypted() {
            return Err(LoadError::new(
                FailureKind::Decode,
                "encrypted documents are not supported",
            ));
        }

        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(LoadError::new(FailureKind::Decode, "document has no pages"));
        }

        let pages = page_ids
            .into_iter()
            .map(|(number, id)| {
                let (width_pt, height_pt) = doc
                    .get_dictionary(id)
                    .ok()
                    .and_then(|page| media_box(&doc, page))
                    .unwrap_or(DEFAULT_MEDIA_BOX);
                PageInfo {
                    number,
                    width_pt,
                    height_pt,
                }
            })
            .collect();

        Ok(Box::new(LopdfDocument {
            pages,
            byte_len: bytes.len() as u64,
        }))
    }
}

impl DecodedDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, number: u32) -> Result<PageInfo, LoadError> {
        number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or_else(|| {
                LoadError::new(
                    FailureKind::Decode,
                    format!("page {number} out of range 1..={}", self.pages.len()),
                )
            })
    }

    fn byte_len(&self) -> u64 {
        self.byte_len
    }
}

/// Resolves the page's `MediaBox`, following inherited values up the page tree.
fn media_box(doc: &Document, page: &Dictionary) -> Option<(f32, f32)> {
    let mut current = page;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(object) = current.get(b"MediaBox") {
            return rect_size(doc, object);
        }
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent_id).ok()?;
    }
    None
}

fn rect_size(doc: &Document, object: &Object) -> Option<(f32, f32)> {
    let (_, object) = doc.dereference(object).ok()?;
    let values = object
        .as_array()
        .ok()?
        .iter()
        .map(|value| value.as_float().ok())
        .collect::<Option<Vec<f32>>>()?;
    match values.as_slice() {
        [x0, y0, x1, y1] => Some(((x1 - x0).abs(), (y1 - y0).abs())),
        _ => None,
    }
}
