//! Paragraph line-breaking (`spec.md` §4.D.1/§4.D.2): shortest-path
//! optimisation over a DAG of candidate line breaks, grounded on
//! `original_source/source/layout/linebreak.cpp`'s `LineBreakNode`/
//! `breakLines` (itself built on a generic `dijkstra_shortest_path`).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::errors::{Error, Location, Result};
use crate::interp::script::ScriptRunner;
use crate::layout::fonts::TextMetrics;
use crate::tree::inline::{InlineObject, SeparatorKind};
use crate::tree::style::Style;
use crate::types::value::Value;

/// Cost of a forced (overfull) break, matching the reference's literal
/// `10000` badness constant.
const OVERFULL_COST: f64 = 10000.0;

/// One atom placed on a broken line, kept (rather than re-sliced from the
/// original content) so a caller can reconstruct exactly what the
/// line-breaker decided without re-walking the source `InlineObject`s.
#[derive(Debug, Clone)]
pub enum LinePart {
    Text(Rc<str>),
    /// A hyphen or nothing, depending on why the line ended; `is_break`
    /// distinguishes a rendered hyphenation mark from a silent explicit
    /// break (`spec.md` §4.D.2).
    Separator { rendered_hyphen: bool },
    Span { width_mm: f64, glued: bool },
}

#[derive(Debug, Clone, Default)]
pub struct BrokenLine {
    pub parts: Vec<LinePart>,
    pub width_mm: f64,
    pub height_mm: f64,
    pub num_spaces: usize,
    pub total_space_width_mm: f64,
    /// The badness cost of breaking *after* this line (0 for the final
    /// line of a paragraph, per `spec.md` §4.D.1).
    pub cost: f64,
}

fn font_size_pt(style: &Style) -> f64 {
    style.font_size_mm_or_default() * 72.0 / 25.4
}

fn text_width_mm(fonts: &dyn TextMetrics, style: &Style, text: &str) -> Result<f64> {
    let family = style.font_family.as_deref().unwrap_or("sans-serif");
    fonts.text_width_mm(family, style.bold.unwrap_or(false), style.italic.unwrap_or(false), text, font_size_pt(style))
}

/// Expands every pending [`InlineObject::ScriptCall`] in `contents` by
/// evaluating it through `runner` and splicing the result in, per
/// `spec.md` §4.C.3's inline case: a non-glued `InlineSpan` result is
/// flattened into independent top-level atoms (so the line-breaker may
/// still break inside it), any other inline atom is spliced in as-is, and
/// `Value::Null` contributes nothing. Recurses into `InlineSpan` children
/// so a script call nested inside a glued span is evaluated too.
fn expand_contents(contents: &[InlineObject], runner: &mut dyn ScriptRunner) -> Result<Vec<InlineObject>> {
    let mut out = Vec::with_capacity(contents.len());
    for atom in contents {
        expand_atom_into(atom, runner, &mut out)?;
    }
    Ok(out)
}

fn expand_atom_into(atom: &InlineObject, runner: &mut dyn ScriptRunner, out: &mut Vec<InlineObject>) -> Result<()> {
    match atom {
        InlineObject::ScriptCall { name } => {
            let value = runner.call(name, Location::default())?;
            splice_script_value_into(&value, name, out)
        }
        InlineObject::InlineSpan { children, glued, width_override, style } => {
            let mut expanded_children = Vec::with_capacity(children.len());
            for child in children {
                expand_atom_into(child, runner, &mut expanded_children)?;
            }
            out.push(InlineObject::InlineSpan { children: expanded_children, glued: *glued, width_override: *width_override, style: style.clone() });
            Ok(())
        }
        other => {
            out.push(other.clone());
            Ok(())
        }
    }
}

fn splice_script_value_into(value: &Value, name: &str, out: &mut Vec<InlineObject>) -> Result<()> {
    match value {
        Value::TreeInline(obj) => match obj.as_ref() {
            InlineObject::InlineSpan { children, glued: false, .. } => {
                out.extend(children.iter().cloned());
                Ok(())
            }
            other => {
                out.push(other.clone());
                Ok(())
            }
        },
        Value::Null => Ok(()),
        other => Err(Error::eval(Location::default(), format!("script call '{name}' did not produce inline content (got {other})"))),
    }
}

/// One candidate edge out of the line-break DAG: `next_index` is the atom
/// index just past the last atom this line consumed, `line` is the
/// candidate line, `cost` is its badness.
struct Edge {
    next_index: usize,
    line: BrokenLine,
    cost: f64,
}

/// Enumerates every candidate line starting at `start`, per
/// `original_source/source/layout/linebreak.cpp`'s `neighbours()`: the line
/// grows one atom at a time, and at every separator position reached (while
/// still under the preferred length) a candidate edge is emitted ending
/// there. Growth stops the instant the line becomes full (cost computed at
/// that separator) or overfull (single forced-break edge, `OVERFULL_COST`),
/// or when the paragraph's content is exhausted (one zero-cost edge to the
/// end, per `spec.md` §4.D.1's "final line has zero cost").
fn neighbours(fonts: &dyn TextMetrics, parent_style: &Style, contents: &[InlineObject], start: usize, preferred_length_mm: f64) -> Result<Vec<Edge>> {
    let mut edges = Vec::new();
    let mut line = BrokenLine::default();
    let mut current_word = String::new();
    let mut i = start;

    let flush_word = |line: &mut BrokenLine, word: &mut String| -> Result<()> {
        if !word.is_empty() {
            line.width_mm += text_width_mm(fonts, parent_style, word)?;
            word.clear();
        }
        Ok(())
    };

    loop {
        if i == contents.len() {
            flush_word(&mut line, &mut current_word)?;
            edges.push(Edge { next_index: i, line, cost: 0.0 });
            return Ok(edges);
        }

        match &contents[i] {
            InlineObject::Text(t) => {
                current_word.push_str(t);
                let lh = parent_style.font_size_mm_or_default() * parent_style.line_spacing.unwrap_or(1.2);
                line.height_mm = line.height_mm.max(lh);
                line.parts.push(LinePart::Text(t.clone()));
                i += 1;
            }
            InlineObject::Separator(sep) => {
                flush_word(&mut line, &mut current_word)?;
                match sep.kind {
                    SeparatorKind::Space => {
                        let w = text_width_mm(fonts, parent_style, " ")?;
                        line.num_spaces += 1;
                        line.total_space_width_mm += w;
                        line.width_mm += w;
                        line.parts.push(LinePart::Separator { rendered_hyphen: false });
                        i += 1;

                        let cost = space_ending_cost(&line, preferred_length_mm);
                        let mut closed = line.clone();
                        closed.cost = cost;
                        let reached_full = line.width_mm >= preferred_length_mm;
                        edges.push(Edge { next_index: i, line: closed, cost });
                        if reached_full {
                            return Ok(edges);
                        }
                    }
                    SeparatorKind::HyphenationPoint | SeparatorKind::ExplicitBreak => {
                        let rendered_hyphen = matches!(sep.kind, SeparatorKind::HyphenationPoint);
                        if rendered_hyphen {
                            line.width_mm += text_width_mm(fonts, parent_style, "-")?;
                        }
                        line.parts.push(LinePart::Separator { rendered_hyphen });
                        i += 1;

                        let cost = break_point_cost(&line, preferred_length_mm, sep.hyphenation_cost);
                        let mut closed = line.clone();
                        closed.cost = cost;
                        edges.push(Edge { next_index: i, line: closed, cost });

                        if line.width_mm >= preferred_length_mm {
                            return Ok(edges);
                        }
                    }
                }
            }
            InlineObject::InlineSpan { width_override, glued, children, style } => {
                flush_word(&mut line, &mut current_word)?;
                let w = match width_override {
                    Some(w) => *w,
                    None => {
                        let mut total = 0.0;
                        for child in children {
                            if let InlineObject::Text(t) = child {
                                total += text_width_mm(fonts, style, t)?;
                            }
                        }
                        total
                    }
                };
                line.width_mm += w;
                line.parts.push(LinePart::Span { width_mm: w, glued: *glued });
                i += 1;
            }
            InlineObject::ScriptCall { .. } => {
                // `break_lines` expands every `ScriptCall` via `expand_contents`
                // before the atoms ever reach `neighbours`; one surviving here
                // is an internal error, not a user-facing one.
                return Err(Error::internal("unevaluated ScriptCall reached the line-breaker"));
            }
        }

        if line.width_mm >= preferred_length_mm {
            flush_word(&mut line, &mut current_word)?;
            if edges.is_empty() {
                // Not even one atom fit: forced overfull break, with a
                // diagnostic (`spec.md` §4.D.1).
                log::warn!("linebreak: overfull line, badness {OVERFULL_COST}");
                edges.push(Edge { next_index: i, line, cost: OVERFULL_COST });
            }
            return Ok(edges);
        }
    }
}

/// Badness for a line ending in a plain space separator: the squared
/// per-space stretch (`spec.md` §4.D.1).
fn space_ending_cost(line: &BrokenLine, preferred_length_mm: f64) -> f64 {
    let denom = (line.num_spaces as f64).max(0.5);
    let extra = (preferred_length_mm - line.width_mm) / denom;
    extra * extra
}

/// Badness for a line ending in a hyphenation-point or explicit break: the
/// stretch cost plus a penalty weighted by `hyphenation_cost` and the
/// line's average space width (`spec.md` §4.D.1).
fn break_point_cost(line: &BrokenLine, preferred_length_mm: f64, hyphenation_cost: f64) -> f64 {
    let denom = (line.num_spaces as f64 - 1.0).max(0.5);
    let avg_space_width = line.total_space_width_mm / denom;
    let stretch_denom = (line.num_spaces as f64).max(0.5);
    let extra = (preferred_length_mm - line.width_mm) / stretch_denom;
    0.3 * (1.0 + hyphenation_cost) * avg_space_width * avg_space_width + extra * extra
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    cost: f64,
    index: usize,
}
impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap keyed
        // by cumulative cost.
        other.cost.partial_cmp(&self.cost).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs the shortest-path line-break search over `contents`, starting from
/// the whole paragraph (index 0) to its end (index `contents.len()`), and
/// returns the chosen sequence of lines in order (`spec.md` §4.D.1):
/// Dijkstra with a priority queue keyed by cumulative cost, exactly as
/// specified, over nodes keyed by content-prefix index.
pub fn break_lines(
    fonts: &dyn TextMetrics,
    runner: &mut dyn ScriptRunner,
    parent_style: &Style,
    contents: &[InlineObject],
    preferred_length_mm: f64,
) -> Result<Vec<BrokenLine>> {
    let contents = expand_contents(contents, runner)?;
    let contents = &contents[..];
    let n = contents.len();
    let mut best_cost = vec![f64::INFINITY; n + 1];
    let mut best_line: Vec<Option<BrokenLine>> = vec![None; n + 1];
    let mut predecessor: Vec<Option<usize>> = vec![None; n + 1];
    let mut visited = vec![false; n + 1];

    best_cost[0] = 0.0;
    let mut heap = BinaryHeap::new();
    heap.push(HeapEntry { cost: 0.0, index: 0 });

    while let Some(HeapEntry { cost, index }) = heap.pop() {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        if index == n {
            continue;
        }

        for edge in neighbours(fonts, parent_style, contents, index, preferred_length_mm)? {
            let candidate_total = cost + edge.cost;
            if candidate_total < best_cost[edge.next_index] {
                best_cost[edge.next_index] = candidate_total;
                best_line[edge.next_index] = Some(edge.line);
                predecessor[edge.next_index] = Some(index);
                heap.push(HeapEntry { cost: candidate_total, index: edge.next_index });
            }
        }
    }

    if n > 0 && best_line[n].is_none() {
        return Err(Error::layout(Location::default(), "paragraph could not be broken into lines"));
    }

    // Reconstruct the path from n back to 0.
    let mut lines = Vec::new();
    let mut at = n;
    while at != 0 {
        let line = best_line[at].take().expect("path reconstruction: missing predecessor line");
        let from = predecessor[at].expect("path reconstruction: missing predecessor index");
        lines.push(line);
        at = from;
    }
    lines.reverse();
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::inline::Separator;
    use std::collections::HashMap;

    fn space() -> InlineObject {
        InlineObject::Separator(Separator { kind: SeparatorKind::Space, hyphenation_cost: 0.0 })
    }

    fn text(s: &str) -> InlineObject {
        InlineObject::Text(Rc::from(s))
    }

    /// A deterministic stand-in for [`crate::layout::fonts::FontSet`]: every
    /// character is two millimetres wide regardless of family/weight/size,
    /// so tests don't need real font files/fontconfig on the test machine.
    struct FixedWidthFonts;

    impl TextMetrics for FixedWidthFonts {
        fn text_width_mm(&self, _family: &str, _bold: bool, _italic: bool, text: &str, _font_size_pt: f64) -> Result<f64> {
            Ok(text.chars().count() as f64 * 2.0)
        }
    }

    /// A [`ScriptRunner`] stub that answers fixed calls by name, for tests
    /// that don't need a real interpreter/`Decls` tree.
    #[derive(Default)]
    struct MockRunner {
        responses: HashMap<String, Value>,
    }

    impl ScriptRunner for MockRunner {
        fn call(&mut self, name: &str, _loc: Location) -> Result<Value> {
            self.responses.get(name).cloned().ok_or_else(|| Error::internal(format!("no mock response for '{name}'")))
        }
    }

    /// Reconstructs the flat sequence of rendered atoms a set of broken
    /// lines represents, in order, collapsing each line's parts back into
    /// one string per atom so callers can compare against the input content.
    fn atoms_from_lines(lines: &[BrokenLine]) -> Vec<String> {
        let mut out = Vec::new();
        for line in lines {
            for part in &line.parts {
                match part {
                    LinePart::Text(t) => out.push(t.to_string()),
                    LinePart::Separator { rendered_hyphen } => out.push(if *rendered_hyphen { "-".to_string() } else { " ".to_string() }),
                    LinePart::Span { .. } => out.push("<span>".to_string()),
                }
            }
        }
        out
    }

    #[test]
    fn final_line_has_zero_cost() {
        let line = BrokenLine { parts: vec![LinePart::Text(Rc::from("x"))], width_mm: 1.0, cost: 0.0, ..Default::default() };
        assert_eq!(line.cost, 0.0);
    }

    #[test]
    fn space_ending_cost_is_squared_stretch() {
        let line = BrokenLine { width_mm: 8.0, num_spaces: 2, ..Default::default() };
        let cost = space_ending_cost(&line, 10.0);
        let expected = ((10.0 - 8.0) / 2.0f64).powi(2);
        assert!((cost - expected).abs() < 1e-9);
    }

    #[test]
    fn half_space_floor_applies_with_zero_spaces() {
        let line = BrokenLine { width_mm: 8.0, num_spaces: 0, ..Default::default() };
        let cost = space_ending_cost(&line, 10.0);
        let expected = ((10.0 - 8.0) / 0.5f64).powi(2);
        assert!((cost - expected).abs() < 1e-9);
    }

    #[test]
    fn break_lines_preserves_atom_order_within_a_single_line() {
        let contents = vec![text("hello"), space(), text("world")];
        let mut runner = MockRunner::default();
        let lines = break_lines(&FixedWidthFonts, &mut runner, &Style::empty(), &contents, 100.0).unwrap();
        assert_eq!(atoms_from_lines(&lines), vec!["hello", " ", "world"]);
    }

    /// A paragraph too wide for one line still reconstructs to the exact
    /// original atom sequence once every broken line's parts are
    /// concatenated back together, across the forced break.
    #[test]
    fn break_lines_preserves_atom_order_across_a_forced_break() {
        let contents = vec![text("one"), space(), text("two"), space(), text("three"), space(), text("four")];
        let mut runner = MockRunner::default();
        // Narrow enough that the four words can't all fit on one 20mm line.
        let lines = break_lines(&FixedWidthFonts, &mut runner, &Style::empty(), &contents, 20.0).unwrap();
        assert!(lines.len() > 1, "expected the paragraph to wrap onto more than one line");
        assert_eq!(atoms_from_lines(&lines), vec!["one", " ", "two", " ", "three", " ", "four"]);
    }

    #[test]
    fn explicit_break_forces_a_line_boundary_there() {
        let contents = vec![text("a"), InlineObject::Separator(Separator { kind: SeparatorKind::ExplicitBreak, hyphenation_cost: 0.0 }), text("b")];
        let mut runner = MockRunner::default();
        let lines = break_lines(&FixedWidthFonts, &mut runner, &Style::empty(), &contents, 100.0).unwrap();
        assert_eq!(atoms_from_lines(&lines), vec!["a", " ", "b"]);
    }

    /// Scenario: a `ScriptCall` reached during line-breaking evaluates
    /// through the `ScriptRunner`, and its non-glued `InlineSpan` result is
    /// flattened into the surrounding paragraph's atoms rather than treated
    /// as one opaque unit — so the line-breaker may still wrap inside it.
    #[test]
    fn script_call_result_splices_into_the_paragraph_and_can_still_wrap() {
        let mut responses = HashMap::new();
        responses.insert(
            "greeting".to_string(),
            Value::TreeInline(Rc::new(InlineObject::InlineSpan {
                children: vec![text("big"), space(), text("wide"), space(), text("greeting")],
                glued: false,
                width_override: None,
                style: Rc::new(Style::empty()),
            })),
        );
        let mut runner = MockRunner { responses };

        let contents = vec![text("say"), space(), InlineObject::ScriptCall { name: Rc::from("greeting") }];
        let lines = break_lines(&FixedWidthFonts, &mut runner, &Style::empty(), &contents, 16.0).unwrap();

        assert!(lines.len() > 1, "the spliced-in span should still be breakable across lines");
        assert_eq!(atoms_from_lines(&lines), vec!["say", " ", "big", " ", "wide", " ", "greeting"]);
    }

    #[test]
    fn script_call_error_propagates_out_of_break_lines() {
        let mut runner = MockRunner::default();
        let contents = vec![InlineObject::ScriptCall { name: Rc::from("missing") }];
        let err = break_lines(&FixedWidthFonts, &mut runner, &Style::empty(), &contents, 100.0);
        assert!(err.is_err());
    }
}
