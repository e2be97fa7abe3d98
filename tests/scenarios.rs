//! Crate-level integration tests for the numbered testable scenarios
//! (`spec.md` §8) that exercise public API across module boundaries, rather
//! than one module's internals in isolation.
//!
//! Scenario 1 (the `"fi"` GSUB ligature contracting two glyphs into one) is
//! intentionally not duplicated here: `font::gsub`'s subtable types keep
//! their fields private so nothing outside the module can hand-build a
//! `Lookup`, and exposing a constructor purely to satisfy an external test
//! would widen that module's API for no production reason. It stays covered
//! by `font::gsub`'s own unit test (`fi_ligature_contracts_two_glyphs_into_one`).

use std::collections::HashMap;
use std::rc::Rc;

use sap::errors::{Error, Location, Result};
use sap::font::adjustment::GlyphAdjustment;
use sap::font::kern::{
    positioning_adjustments_for_glyph_sequence, KernPair, KernSubTable0, KernSubTableCoverage, KernTable,
};
use sap::font::scalar::{FontScalar, GlyphId};
use sap::interp::script::ScriptRunner;
use sap::layout::{break_lines, compute_position, LayoutBase, LayoutObjectKind, TextMetrics};
use sap::tree::block::{BlockObject, Direction};
use sap::tree::inline::{InlineObject, Separator, SeparatorKind};
use sap::tree::style::Style;
use sap::types::value::{PositionedValue, Value};

/// A deterministic font-metrics stand-in: every character is 2mm wide,
/// independent of family/weight/size, so these tests don't depend on any
/// font files or fontconfig being present on the machine that runs them.
struct FixedWidthFonts;

impl TextMetrics for FixedWidthFonts {
    fn text_width_mm(&self, _family: &str, _bold: bool, _italic: bool, text: &str, _font_size_pt: f64) -> Result<f64> {
        Ok(text.chars().count() as f64 * 2.0)
    }
}

/// A [`ScriptRunner`] stand-in for tests that don't need a real typechecked
/// `Decls` tree and `Evaluator` — it just answers fixed calls by name.
#[derive(Default)]
struct MockRunner {
    responses: HashMap<String, Value>,
}

impl ScriptRunner for MockRunner {
    fn call(&mut self, name: &str, _loc: Location) -> Result<Value> {
        self.responses.get(name).cloned().ok_or_else(|| Error::internal(format!("no mock response for '{name}'")))
    }
}

fn text(s: &str) -> InlineObject {
    InlineObject::Text(Rc::from(s))
}

fn space() -> InlineObject {
    InlineObject::Separator(Separator { kind: SeparatorKind::Space, hyphenation_cost: 0.0 })
}

/// Scenario 2: an "override" kern pair zeroes the prior advance before
/// applying its own, and a "minimum" pair widens (never narrows) whatever
/// advance is already in effect — both read straight off `font::kern`'s
/// public types, with no font file on disk required.
#[test]
fn kern_override_then_minimum_pair_adjusts_glyph_advance() {
    let left = GlyphId(10);
    let right = GlyphId(11);
    let coverage = KernSubTableCoverage { is_vertical: false, is_cross_stream: false, is_variation: false, is_override: true, is_minimum: true };
    let pair = KernPair { left, right, shift: FontScalar(30) };
    let table = KernTable { subtables_f0: vec![KernSubTable0 { coverage, pairs: vec![pair] }], subtables_f2: vec![] };

    let adjustments = positioning_adjustments_for_glyph_sequence(&table, &[left, right]).unwrap();
    let adj = adjustments.get(&0).copied().unwrap_or_default();
    assert_eq!(adj, GlyphAdjustment { horz_advance: FontScalar(30), ..Default::default() });
}

#[test]
fn kern_lookup_is_empty_for_an_unrelated_pair() {
    let coverage = KernSubTableCoverage::default();
    let pair = KernPair { left: GlyphId(1), right: GlyphId(2), shift: FontScalar(5) };
    let table = KernTable { subtables_f0: vec![KernSubTable0 { coverage, pairs: vec![pair] }], subtables_f2: vec![] };

    let adjustments = positioning_adjustments_for_glyph_sequence(&table, &[GlyphId(7), GlyphId(8)]).unwrap();
    assert!(adjustments.is_empty());
}

/// Scenario 3: atom order is preserved end to end through `break_lines`,
/// reconstructed from each returned `BrokenLine`'s `parts`.
#[test]
fn break_lines_preserves_atom_order() {
    let contents = vec![text("quick"), space(), text("brown"), space(), text("fox")];
    let mut runner = MockRunner::default();
    let lines = break_lines(&FixedWidthFonts, &mut runner, &Style::empty(), &contents, 100.0).unwrap();

    let mut rebuilt = String::new();
    for line in &lines {
        for part in &line.parts {
            match part {
                sap::layout::linebreak::LinePart::Text(t) => rebuilt.push_str(t),
                sap::layout::linebreak::LinePart::Separator { .. } => rebuilt.push(' '),
                sap::layout::linebreak::LinePart::Span { .. } => rebuilt.push_str("<span>"),
            }
        }
    }
    assert_eq!(rebuilt, "quick brown fox");
}

/// Scenario 4: a paragraph too wide for one line wraps onto more than one,
/// and the final line carries zero break-cost (`spec.md` §4.D.1).
#[test]
fn break_lines_wraps_an_overlong_paragraph_and_zero_costs_the_last_line() {
    let contents = vec![
        text("one"), space(), text("two"), space(), text("three"), space(), text("four"), space(), text("five"),
    ];
    let mut runner = MockRunner::default();
    let lines = break_lines(&FixedWidthFonts, &mut runner, &Style::empty(), &contents, 16.0).unwrap();

    assert!(lines.len() > 1, "expected the paragraph to wrap onto multiple lines");
    assert_eq!(lines.last().unwrap().cost, 0.0);
}

/// Scenario 5: a `Container` flagged `glued` is never split across a page
/// boundary — it moves wholesale to the next page instead, unlike an
/// otherwise-identical non-glued container which is free to start filling
/// whatever room remains on the current page.
#[test]
fn glued_container_moves_whole_to_the_next_page() {
    let base = LayoutBase::new(210.0, 100.0, 10.0);
    let cursor = base.new_cursor().new_line(65.0);
    assert_eq!(cursor.page_number(), 0);

    let children = vec![BlockObject::Spacer { height_mm: 20.0 }, BlockObject::Spacer { height_mm: 20.0 }];
    let glued_block = BlockObject::Container { direction: Direction::Vertical, children: children.clone(), glued: true, style: Rc::new(Style::empty()) };

    let mut runner = MockRunner::default();
    let (_next, obj) = compute_position(&FixedWidthFonts, &mut runner, &Style::empty(), cursor.clone(), &glued_block).unwrap();
    assert_eq!(obj.placement().unwrap().resolved().page_number, Some(1));

    let non_glued_block = BlockObject::Container { direction: Direction::Vertical, children, glued: false, style: Rc::new(Style::empty()) };
    let (_next, obj) = compute_position(&FixedWidthFonts, &mut runner, &Style::empty(), cursor, &non_glued_block).unwrap();
    assert_eq!(obj.placement().unwrap().resolved().page_number, Some(0));
}

/// Scenario 6: a `ScriptCall`/`ScriptBlock` reached during layout is
/// evaluated through a `ScriptRunner` and its result spliced in per its
/// shape — an inline `tree-inline` result merges into the enclosing
/// paragraph (and can still be broken across lines), a `tree-block` result
/// is placed exactly like an ordinary container child, and an
/// already-positioned result is spliced into the output untouched.
#[test]
fn script_call_splices_inline_content_into_its_paragraph() {
    let mut responses = HashMap::new();
    responses.insert(
        "signature".to_string(),
        Value::TreeInline(Rc::new(InlineObject::InlineSpan {
            children: vec![text("best"), space(), text("regards")],
            glued: false,
            width_override: None,
            style: Rc::new(Style::empty()),
        })),
    );
    let mut runner = MockRunner { responses };

    let contents = vec![text("sincerely"), space(), InlineObject::ScriptCall { name: Rc::from("signature") }];
    let lines = break_lines(&FixedWidthFonts, &mut runner, &Style::empty(), &contents, 16.0).unwrap();
    assert!(lines.len() > 1, "the spliced inline content should still be breakable");

    let mut rebuilt = String::new();
    for line in &lines {
        for part in &line.parts {
            if let sap::layout::linebreak::LinePart::Text(t) = part {
                rebuilt.push_str(t);
                rebuilt.push(' ');
            }
        }
    }
    assert_eq!(rebuilt.trim(), "sincerely best regards");
}

#[test]
fn script_block_splices_a_tree_block_result_as_an_ordinary_child() {
    let base = LayoutBase::new(210.0, 297.0, 20.0);
    let cursor = base.new_cursor();

    let mut responses = HashMap::new();
    responses.insert("letterhead".to_string(), Value::TreeBlock(Rc::new(BlockObject::Spacer { height_mm: 15.0 })));
    let mut runner = MockRunner { responses };

    let block = BlockObject::ScriptBlock { name: Rc::from("letterhead") };
    let (_next, obj) = compute_position(&FixedWidthFonts, &mut runner, &Style::empty(), cursor, &block).unwrap();
    assert!(matches!(obj.kind, LayoutObjectKind::Spacer));
    assert_eq!(obj.size.descent_mm, 15.0);
}

#[test]
fn script_block_splices_an_already_positioned_result_untouched() {
    let base = LayoutBase::new(210.0, 297.0, 20.0);
    let cursor = base.new_cursor().new_line(10.0);

    let mut responses = HashMap::new();
    responses.insert(
        "stamp".to_string(),
        Value::Positioned(PositionedValue { page_number: Some(2), x_mm: 8.0, y_mm: 8.0, width_mm: 30.0, height_mm: 10.0 }),
    );
    let mut runner = MockRunner { responses };

    let block = BlockObject::ScriptBlock { name: Rc::from("stamp") };
    let (_next, obj) = compute_position(&FixedWidthFonts, &mut runner, &Style::empty(), cursor, &block).unwrap();
    assert!(matches!(obj.kind, LayoutObjectKind::Opaque));
    assert_eq!(obj.placement().unwrap().resolved().page_number, Some(2));
}
