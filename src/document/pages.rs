//! Page tree traversal.

use super::PdfDocument;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashSet;

/// Depth limit of the /Pages tree.
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when no /MediaBox is found anywhere up the tree.
const DEFAULT_MEDIA_BOX: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 612.0,
    height: 792.0,
};

/// A leaf page of the page tree.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// Zero-based position in document order
    pub index: usize,
    /// Indirect reference of the page object
    pub obj_ref: ObjectRef,
    /// Page dictionary as stored in the file
    pub dict: Dictionary,
    /// Effective /MediaBox, inherited from ancestors when absent
    pub media_box: Rect,
}

fn parse_box(doc: &PdfDocument, value: &Object) -> Option<Rect> {
    let resolved = doc.resolve_object(value).ok()?;
    let coords: Vec<f32> = resolved
        .as_array()?
        .iter()
        .map(|o| doc.resolve_object(o).ok().and_then(|o| o.as_number()).map(|n| n as f32))
        .collect::<Option<_>>()?;
    match coords.as_slice() {
        [x0, y0, x1, y1] => Some(Rect::from_points(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

/// Enumerate leaf pages in document order.
pub(super) fn collect_pages(doc: &PdfDocument) -> Result<Vec<PageInfo>> {
    let catalog = doc.catalog()?;
    let root = catalog
        .get("Pages")
        .and_then(|o| o.as_reference())
        .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;

    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    // Explicit stack of (node, inherited media box, depth); kids pushed in reverse
    let mut stack = vec![(root, None::<Rect>, 0usize)];

    while let Some((node_ref, inherited, depth)) = stack.pop() {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::InvalidPdf("page tree too deep".to_string()));
        }
        if !visited.insert(node_ref) {
            log::warn!("Page tree cycle at {}, skipping", node_ref);
            continue;
        }

        let node = match doc.resolve(node_ref)? {
            Object::Dictionary(d) => d,
            other => {
                log::warn!("Page tree node {} is a {}, skipping", node_ref, other.type_name());
                continue;
            },
        };

        let media_box = node
            .get("MediaBox")
            .and_then(|b| parse_box(doc, b))
            .or(inherited);

        let is_pages = match node.get("Type").and_then(|t| t.as_name()) {
            Some("Pages") => true,
            Some("Page") => false,
            // Untyped nodes: the presence of /Kids decides
            _ => node.contains_key("Kids"),
        };

        if is_pages {
            let kids = match doc.get_resolved(&node, "Kids")? {
                Some(Object::Array(kids)) => kids,
                _ => {
                    log::warn!("Pages node {} has no /Kids array", node_ref);
                    continue;
                },
            };
            for kid in kids.iter().rev() {
                match kid.as_reference() {
                    Some(kid_ref) => stack.push((kid_ref, media_box, depth + 1)),
                    None => log::warn!("Direct page object in /Kids of {} ignored", node_ref),
                }
            }
        } else {
            pages.push(PageInfo {
                index: pages.len(),
                obj_ref: node_ref,
                media_box: media_box.unwrap_or(DEFAULT_MEDIA_BOX),
                dict: node,
            });
        }
    }

    Ok(pages)
}
