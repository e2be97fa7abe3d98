//! Component D: the layout engine (`spec.md` §4.D). Paragraph
//! line-breaking, the page-flow cursor, and container flow, grounded on
//! `original_source/source/layout/*`.

pub mod container;
pub mod cursor;
pub mod fonts;
pub mod linebreak;
pub mod object;

pub use container::compute_position;
pub use cursor::{LayoutBase, PageCursor, Placement};
pub use fonts::{FontSet, TextMetrics};
pub use linebreak::{break_lines, BrokenLine};
pub use object::{LayoutObject, LayoutObjectKind, LayoutSize};

use crate::errors::Result;
use crate::interp::script::ScriptRunner;
use crate::tree::block::BlockObject;
use crate::tree::style::Style;

/// Lays out a whole document's top-level block objects in order, returning
/// one [`LayoutObject`] per top-level block plus the total page count used.
/// `runner` evaluates any `ScriptCall`/`ScriptBlock` node reached along the
/// way (`spec.md` §4.C.3).
pub fn layout_document(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    page_width_mm: f64,
    page_height_mm: f64,
    margin_mm: f64,
    blocks: &[BlockObject],
) -> Result<(Vec<LayoutObject>, usize)> {
    let base = LayoutBase::new(page_width_mm, page_height_mm, margin_mm);
    let mut cursor = base.new_cursor();
    let root_style = Style::empty();

    let mut objects = Vec::with_capacity(blocks.len());
    for block in blocks {
        let (next_cursor, obj) = compute_position(fonts, runner, &root_style, cursor, block)?;
        cursor = next_cursor;
        objects.push(obj);
    }

    Ok((objects, base.num_pages()))
}
