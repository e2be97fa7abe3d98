//! Container flow (`spec.md` §4.D.4/§4.D.5), grounded on
//! `original_source/source/layout/container.cpp`'s
//! `position_children_in_container`.

use std::rc::Rc;

use crate::errors::{Error, Location, Result};
use crate::interp::script::ScriptRunner;
use crate::layout::cursor::{CursorPosition, Placement, PageCursor};
use crate::layout::fonts::TextMetrics;
use crate::layout::linebreak::{self};
use crate::layout::object::{LayoutObject, LayoutObjectKind, LayoutSize};
use crate::tree::block::{BlockObject, Direction};
use crate::tree::inline::InlineObject;
use crate::tree::style::{Alignment, Style};
use crate::types::value::Value;

/// Places a single block object, recursing into `Container` children.
/// Returns the advanced cursor and the positioned object. A non-splittable
/// object that doesn't fit (e.g. an oversize image) is still placed, with a
/// `layout` diagnostic logged — never propagated, per `spec.md` §4.D.5/§7.
pub fn compute_position(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    parent_style: &Style,
    cursor: PageCursor,
    block: &BlockObject,
) -> Result<(PageCursor, LayoutObject)> {
    match block {
        BlockObject::Paragraph { contents, style } => layout_paragraph(fonts, runner, parent_style, style, cursor, contents),
        BlockObject::Container { direction, children, glued, style } => {
            layout_container(fonts, runner, parent_style, style, cursor, *direction, children, *glued)
        }
        BlockObject::Image(img) => layout_image(parent_style, cursor, img.width_mm, img.height_mm),
        BlockObject::Spacer { height_mm } => layout_spacer(parent_style, cursor, *height_mm),
        BlockObject::RawBlock { lines, style } => layout_raw_block(parent_style, style, cursor, lines),
        BlockObject::Path { .. } => layout_path(parent_style, cursor),
        BlockObject::ScriptBlock { name } => layout_script_block(fonts, runner, parent_style, cursor, name),
    }
}

/// Evaluates a pending `ScriptBlock` and splices its result in, per
/// `spec.md` §4.C.3's other two cases: a `tree-block` result is placed as
/// an ordinary child of the enclosing container (recursing back through
/// [`compute_position`]), and an already-positioned result is spliced into
/// the output as-is, with nothing further to lay out.
fn layout_script_block(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    parent_style: &Style,
    cursor: PageCursor,
    name: &str,
) -> Result<(PageCursor, LayoutObject)> {
    let value = runner.call(name, Location::default())?;
    match value {
        Value::TreeBlock(obj) => compute_position(fonts, runner, parent_style, cursor, obj.as_ref()),
        Value::Positioned(p) => {
            let size = LayoutSize { width_mm: p.width_mm, ascent_mm: p.height_mm, descent_mm: 0.0 };
            let mut obj = LayoutObject::new(Rc::new(parent_style.clone()), size, LayoutObjectKind::Opaque);
            obj.place(Placement::Right(CursorPosition { page_number: p.page_number, x_mm: p.x_mm, y_mm: p.y_mm }));
            Ok((cursor, obj))
        }
        other => Err(Error::internal(format!(
            "script block '{name}' produced a value that is neither a tree-block nor a positioned object: {other}"
        ))),
    }
}

fn layout_paragraph(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    parent_style: &Style,
    own_style: &Rc<Style>,
    cursor: PageCursor,
    contents: &[InlineObject],
) -> Result<(PageCursor, LayoutObject)> {
    let effective_style = own_style.extend(parent_style);
    let preferred_width = cursor.content_width_mm();
    let lines = linebreak::break_lines(fonts, runner, &effective_style, contents, preferred_width)?;

    let mut cur = cursor;
    let mut total_height = 0.0;
    let mut first_placement = None;
    for line in &lines {
        cur = cur.new_line(line.height_mm);
        if first_placement.is_none() {
            first_placement = Some(cur.position());
        }
        total_height += line.height_mm;
    }

    let size = LayoutSize { width_mm: preferred_width, ascent_mm: total_height, descent_mm: 0.0 };
    let mut obj = LayoutObject::new(Rc::new(effective_style), size, LayoutObjectKind::Lines { lines });
    if let Some(pos) = first_placement {
        obj.place(Placement::Right(pos));
    }
    Ok((cur, obj))
}

fn layout_raw_block(parent_style: &Style, own_style: &Rc<Style>, cursor: PageCursor, lines: &[Rc<str>]) -> Result<(PageCursor, LayoutObject)> {
    let effective_style = own_style.extend(parent_style);
    let line_height = effective_style.font_size_mm_or_default() * effective_style.line_spacing.unwrap_or(1.2);

    let mut cur = cursor;
    let mut first_placement = None;
    for _ in lines {
        cur = cur.new_line(line_height);
        if first_placement.is_none() {
            first_placement = Some(cur.position());
        }
    }

    let size = LayoutSize { width_mm: cur.content_width_mm(), ascent_mm: line_height * lines.len() as f64, descent_mm: 0.0 };
    let mut obj = LayoutObject::new(Rc::new(effective_style), size, LayoutObjectKind::RawLines { lines: lines.to_vec() });
    if let Some(pos) = first_placement {
        obj.place(Placement::Right(pos));
    }
    Ok((cur, obj))
}

fn layout_image(parent_style: &Style, cursor: PageCursor, width_mm: f64, height_mm: f64) -> Result<(PageCursor, LayoutObject)> {
    // `ensure_vertical_space` pushes to a fresh page if the image doesn't
    // fit on the current one; a non-splittable image taller than a whole
    // page still gets placed (at the top margin of whatever page it lands
    // on) with a diagnostic, per `spec.md` §4.D.5.
    let placed_cursor = cursor.ensure_vertical_space(height_mm);
    let next = placed_cursor.new_line(height_mm);

    let size = LayoutSize { width_mm, ascent_mm: height_mm, descent_mm: 0.0 };
    let mut obj = LayoutObject::new(Rc::new(parent_style.clone()), size, LayoutObjectKind::Image { width_mm, height_mm });
    obj.place(Placement::Right(placed_cursor.position()));
    Ok((next, obj))
}

fn layout_spacer(parent_style: &Style, cursor: PageCursor, height_mm: f64) -> Result<(PageCursor, LayoutObject)> {
    let next = cursor.new_line(height_mm);
    let size = LayoutSize { width_mm: 0.0, ascent_mm: 0.0, descent_mm: height_mm };
    let mut obj = LayoutObject::new(Rc::new(parent_style.clone()), size, LayoutObjectKind::Spacer);
    obj.place(Placement::Right(cursor.position()));
    Ok((next, obj))
}

fn layout_path(parent_style: &Style, cursor: PageCursor) -> Result<(PageCursor, LayoutObject)> {
    let size = LayoutSize::default();
    let mut obj = LayoutObject::new(Rc::new(parent_style.clone()), size, LayoutObjectKind::Path);
    obj.place(Placement::Right(cursor.position()));
    Ok((cursor, obj))
}

/// `spec.md` §4.D.4: `Vertical` stacks children top-to-bottom separated by
/// `paragraph_spacing`, reserving vertical space per child that needs it
/// (which may itself trigger a page break); `Horizontal`/`None` lay children
/// out on one row whose baseline is the tallest child's ascent, with
/// alignment redistributing slack.
fn layout_container(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    parent_style: &Style,
    own_style: &Rc<Style>,
    cursor: PageCursor,
    direction: Direction,
    children: &[BlockObject],
    glued: bool,
) -> Result<(PageCursor, LayoutObject)> {
    let effective_style = own_style.extend(parent_style);

    match direction {
        Direction::Vertical => layout_vertical(fonts, runner, &effective_style, cursor, children, glued),
        Direction::Horizontal | Direction::None => layout_horizontal(fonts, runner, &effective_style, cursor, children, direction, glued),
    }
}

/// Measures the total height `children` would occupy, laid out one after
/// another from `cursor`, without committing to that layout — used only to
/// decide whether a glued container fits whole on the current page before
/// laying it out for real.
fn estimate_vertical_height(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    effective_style: &Style,
    cursor: &PageCursor,
    children: &[BlockObject],
    paragraph_spacing: f64,
) -> Result<f64> {
    let mut probe_cursor = cursor.clone();
    let mut total = 0.0;
    let mut is_first = true;
    for child in children {
        if !is_first {
            total += paragraph_spacing;
        }
        let (next_cursor, obj) = compute_position(fonts, runner, effective_style, probe_cursor.clone(), child)?;
        total += obj.size.height_mm();
        probe_cursor = next_cursor;
        is_first = false;
    }
    Ok(total)
}

fn layout_vertical(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    effective_style: &Style,
    cursor: PageCursor,
    children: &[BlockObject],
    glued: bool,
) -> Result<(PageCursor, LayoutObject)> {
    let paragraph_spacing = effective_style.paragraph_spacing_mm.unwrap_or(0.0);

    let mut cur = cursor;
    if glued && !children.is_empty() {
        // A glued container must not be split across a page boundary
        // (`spec.md` §3.3): measure its whole height first and, if it won't
        // fit in what's left of the current page, push to a fresh one
        // before placing any of its children for real.
        let estimated_height = estimate_vertical_height(fonts, runner, effective_style, &cur, children, paragraph_spacing)?;
        if estimated_height > cur.remaining_height_mm() {
            cur = cur.force_new_page();
        }
    }

    let mut placed = Vec::with_capacity(children.len());
    let mut first_placement = None;
    let mut is_first = true;
    let mut prev_was_phantom = false;

    for child in children {
        if !is_first && !prev_was_phantom {
            cur = cur.new_line(paragraph_spacing);
        }

        if child.requires_space_reservation() {
            // Estimate a conservative reservation using the style's own
            // line height; the real height is only known after layout, so
            // this mirrors the reference's heuristic (reserve, then place).
            let estimate = effective_style.font_size_mm_or_default() * effective_style.line_spacing.unwrap_or(1.2);
            cur = cur.ensure_vertical_space(estimate);
        }

        let (next_cur, obj) = compute_position(fonts, runner, effective_style, cur.clone(), child)?;
        if first_placement.is_none() {
            first_placement = obj.placement();
        }
        cur = next_cur;
        prev_was_phantom = matches!(child, BlockObject::Spacer { height_mm } if *height_mm == 0.0);
        placed.push(obj);
        is_first = false;
    }

    let size = LayoutSize { width_mm: cur.content_width_mm(), ascent_mm: 0.0, descent_mm: 0.0 };
    let mut container = LayoutObject::new(Rc::new(effective_style.clone()), size, LayoutObjectKind::Container { direction: Direction::Vertical, children: placed });
    if let Some(p) = first_placement {
        container.place(p);
    } else {
        container.place(Placement::Right(cur.position()));
    }
    Ok((cur, container))
}

fn layout_horizontal(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    effective_style: &Style,
    cursor: PageCursor,
    children: &[BlockObject],
    direction: Direction,
    glued: bool,
) -> Result<(PageCursor, LayoutObject)> {
    if children.is_empty() {
        let size = LayoutSize::default();
        let mut obj = LayoutObject::new(Rc::new(effective_style.clone()), size, LayoutObjectKind::Container { direction, children: vec![] });
        obj.place(Placement::Right(cursor.position()));
        return Ok((cursor, obj));
    }

    // First pass (measurement only, discarded): lay out every child at a
    // throwaway cursor clone to learn natural widths/ascents, per the
    // reference's "compute slack once, then re-apply per child" split.
    // `LayoutObject::place` only tolerates being called once per object, so
    // these measurement objects are never reused — the real placement pass
    // below produces fresh objects at the correctly offset cursor.
    let mut tallest_ascent = 0.0_f64;
    let mut natural_widths = Vec::with_capacity(children.len());
    {
        let mut probe_cursor = cursor.clone();
        for child in children {
            let (_next, obj) = compute_position(fonts, runner, effective_style, probe_cursor.clone(), child)?;
            tallest_ascent = tallest_ascent.max(obj.size.ascent_mm);
            probe_cursor = probe_cursor.move_right(obj.size.width_mm);
            natural_widths.push(obj.size.width_mm);
        }
    }
    let total_width: f64 = natural_widths.iter().sum();

    // A glued row must not straddle a page break either: if the tallest
    // child wouldn't fit in what's left of the current page, push the whole
    // row to a fresh one before the real placement pass.
    let cursor = if glued && tallest_ascent > cursor.remaining_height_mm() { cursor.force_new_page() } else { cursor };

    let available_width = cursor.width_at_cursor().max(total_width);
    let slack = (available_width - total_width).max(0.0);
    let obj_spacing = match effective_style.alignment_or_default() {
        Alignment::Justified if children.len() > 1 => slack / (children.len() - 1) as f64,
        _ => 0.0,
    };
    let leading_offset = match effective_style.alignment_or_default() {
        Alignment::Left | Alignment::Justified => 0.0,
        Alignment::Right => slack,
        Alignment::Centre => slack / 2.0,
    };

    let mut cur = cursor.move_right(leading_offset);
    let first_position = cur.position();
    let mut placed = Vec::with_capacity(children.len());
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            cur = cur.move_right(obj_spacing);
        }
        let (_next, obj) = compute_position(fonts, runner, effective_style, cur.clone(), child)?;
        cur = cur.move_right(obj.size.width_mm);
        placed.push(obj);
    }

    let final_cursor = cur.new_line(tallest_ascent).carriage_return();
    let size = LayoutSize { width_mm: total_width, ascent_mm: tallest_ascent, descent_mm: 0.0 };
    let mut container = LayoutObject::new(Rc::new(effective_style.clone()), size, LayoutObjectKind::Container { direction, children: placed });
    container.place(Placement::Right(first_position));
    Ok((final_cursor, container))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::cursor::LayoutBase;
    use crate::types::value::PositionedValue;
    use std::collections::HashMap;

    struct FixedWidthFonts;
    impl TextMetrics for FixedWidthFonts {
        fn text_width_mm(&self, _family: &str, _bold: bool, _italic: bool, text: &str, _font_size_pt: f64) -> Result<f64> {
            Ok(text.chars().count() as f64 * 2.0)
        }
    }

    #[derive(Default)]
    struct MockRunner {
        responses: HashMap<String, Value>,
    }
    impl ScriptRunner for MockRunner {
        fn call(&mut self, name: &str, _loc: Location) -> Result<Value> {
            self.responses.get(name).cloned().ok_or_else(|| Error::internal(format!("no mock response for '{name}'")))
        }
    }

    fn spacer(height_mm: f64) -> BlockObject {
        BlockObject::Spacer { height_mm }
    }

    /// A glued vertical container whose children together are taller than
    /// what's left of the current page is pushed whole to a fresh page,
    /// rather than split partway through like an ordinary (non-glued) one.
    #[test]
    fn glued_container_that_does_not_fit_moves_to_a_fresh_page() {
        let base = LayoutBase::new(210.0, 100.0, 10.0);
        // Leave only ~15mm of room on page 0 before laying out the glued block.
        let cursor = base.new_cursor().new_line(65.0);
        assert_eq!(cursor.page_number(), 0);

        let children = vec![spacer(20.0), spacer(20.0)];
        let block = BlockObject::Container { direction: Direction::Vertical, children, glued: true, style: Rc::new(Style::empty()) };

        let mut runner = MockRunner::default();
        let (_next, obj) = compute_position(&FixedWidthFonts, &mut runner, &Style::empty(), cursor, &block).unwrap();
        assert_eq!(obj.placement().unwrap().resolved().page_number, Some(1));
    }

    /// The same container, not glued, is free to start filling the current
    /// page and spill its second child onto the next one instead of moving
    /// wholesale.
    #[test]
    fn non_glued_container_is_not_pushed_to_a_fresh_page() {
        let base = LayoutBase::new(210.0, 100.0, 10.0);
        let cursor = base.new_cursor().new_line(65.0);

        let children = vec![spacer(20.0), spacer(20.0)];
        let block = BlockObject::Container { direction: Direction::Vertical, children, glued: false, style: Rc::new(Style::empty()) };

        let mut runner = MockRunner::default();
        let (_next, obj) = compute_position(&FixedWidthFonts, &mut runner, &Style::empty(), cursor, &block).unwrap();
        assert_eq!(obj.placement().unwrap().resolved().page_number, Some(0));
    }

    /// Scenario: a `ScriptBlock` evaluates during layout to a `tree-block`
    /// value, which is placed exactly as if it had been an ordinary child
    /// of the enclosing container all along.
    #[test]
    fn script_block_evaluating_to_a_tree_block_is_placed_as_its_child() {
        let base = LayoutBase::new(210.0, 297.0, 20.0);
        let cursor = base.new_cursor();

        let mut responses = HashMap::new();
        responses.insert("make_spacer".to_string(), Value::TreeBlock(Rc::new(spacer(12.0))));
        let mut runner = MockRunner { responses };

        let block = BlockObject::ScriptBlock { name: Rc::from("make_spacer") };
        let (_next, obj) = compute_position(&FixedWidthFonts, &mut runner, &Style::empty(), cursor, &block).unwrap();
        assert!(matches!(obj.kind, LayoutObjectKind::Spacer));
        assert_eq!(obj.size.descent_mm, 12.0);
    }

    /// Scenario: a `ScriptBlock` evaluates to an already-positioned value —
    /// it is spliced in at that exact position, and the cursor driving the
    /// rest of the container is left untouched.
    #[test]
    fn script_block_evaluating_to_a_positioned_value_is_spliced_in_place() {
        let base = LayoutBase::new(210.0, 297.0, 20.0);
        let cursor = base.new_cursor().new_line(10.0);
        let cursor_before = cursor.position();

        let mut responses = HashMap::new();
        responses.insert(
            "watermark".to_string(),
            Value::Positioned(PositionedValue { page_number: Some(3), x_mm: 5.0, y_mm: 5.0, width_mm: 40.0, height_mm: 10.0 }),
        );
        let mut runner = MockRunner { responses };

        let block = BlockObject::ScriptBlock { name: Rc::from("watermark") };
        let (next, obj) = compute_position(&FixedWidthFonts, &mut runner, &Style::empty(), cursor, &block).unwrap();
        assert!(matches!(obj.kind, LayoutObjectKind::Opaque));
        assert_eq!(obj.placement().unwrap().resolved().page_number, Some(3));
        assert_eq!(next.position(), cursor_before);
    }
}
