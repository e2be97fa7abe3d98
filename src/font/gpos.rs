//! `GPOS` (glyph positioning): single/pair/contextual/chained-context
//! lookups, each producing [`GlyphAdjustment`]s that combine by addition.

use std::collections::HashMap;

use crate::errors::{Error, Location, Result};
use crate::font::adjustment::GlyphAdjustment;
use crate::font::bytes::Reader;
use crate::font::scalar::{FontScalar, GlyphId};

const HORZ_PLACEMENT: u16 = 0x01;
const VERT_PLACEMENT: u16 = 0x02;
const HORZ_ADVANCE: u16 = 0x04;
const VERT_ADVANCE: u16 = 0x08;
const X_PLA_DEVICE: u16 = 0x10;
const Y_PLA_DEVICE: u16 = 0x20;
const X_ADV_DEVICE: u16 = 0x40;
const Y_ADV_DEVICE: u16 = 0x80;

fn value_record_size(format: u16) -> usize {
    let mut size = 0;
    for bit in [
        HORZ_PLACEMENT,
        VERT_PLACEMENT,
        HORZ_ADVANCE,
        VERT_ADVANCE,
        X_PLA_DEVICE,
        Y_PLA_DEVICE,
        X_ADV_DEVICE,
        Y_ADV_DEVICE,
    ] {
        if format & bit != 0 {
            size += 2;
        }
    }
    size
}

/// Parses a value record; device tables (bits 0x10-0x80) are consumed (to
/// keep the cursor correctly positioned for whatever follows) but their
/// contents are ignored, matching `spec.md`'s "no hinting/device deltas"
/// non-goal.
fn parse_value_record(r: &mut Reader<'_>, format: u16) -> Result<GlyphAdjustment> {
    let mut adj = GlyphAdjustment::default();
    if format & HORZ_PLACEMENT != 0 {
        adj.horz_placement = FontScalar::from(r.consume_i16()?);
    }
    if format & VERT_PLACEMENT != 0 {
        adj.vert_placement = FontScalar::from(r.consume_i16()?);
    }
    if format & HORZ_ADVANCE != 0 {
        adj.horz_advance = FontScalar::from(r.consume_i16()?);
    }
    if format & VERT_ADVANCE != 0 {
        adj.vert_advance = FontScalar::from(r.consume_i16()?);
    }
    for bit in [X_PLA_DEVICE, Y_PLA_DEVICE, X_ADV_DEVICE, Y_ADV_DEVICE] {
        if format & bit != 0 {
            r.consume_u16()?; // device table offset, ignored
        }
    }
    Ok(adj)
}

/// Glyph-id → coverage index, shared by GSUB and GPOS.
#[derive(Debug, Clone, Default)]
pub struct Coverage {
    pub glyphs: HashMap<GlyphId, u16>,
}

fn parse_coverage(mut r: Reader<'_>) -> Result<Coverage> {
    let format = r.consume_u16()?;
    let mut glyphs = HashMap::new();
    match format {
        1 => {
            let count = r.consume_u16()?;
            for i in 0..count {
                glyphs.insert(GlyphId(r.consume_u16()?), i);
            }
        }
        2 => {
            let count = r.consume_u16()?;
            for _ in 0..count {
                let start = r.consume_u16()?;
                let end = r.consume_u16()?;
                let start_index = r.consume_u16()?;
                for (k, g) in (start..=end).enumerate() {
                    glyphs.insert(GlyphId(g), start_index + k as u16);
                }
            }
        }
        _ => return Err(Error::parse(Location::default(), format!("unsupported coverage table format {format}"))),
    }
    Ok(Coverage { glyphs })
}

#[derive(Debug, Clone)]
pub struct SinglePos {
    pub coverage: Coverage,
    pub adjustments: HashMap<GlyphId, GlyphAdjustment>,
}

fn parse_single_pos(whole: Reader<'_>) -> Result<SinglePos> {
    let mut r = whole;
    let format = r.consume_u16()?;
    let coverage_offset = r.consume_u16()? as usize;
    let coverage = parse_coverage(whole.drop(coverage_offset))?;
    let value_format = r.consume_u16()?;

    let mut adjustments = HashMap::new();
    match format {
        1 => {
            let adj = parse_value_record(&mut r, value_format)?;
            for glyph in coverage.glyphs.keys() {
                adjustments.insert(*glyph, adj);
            }
        }
        2 => {
            let count = r.consume_u16()?;
            let mut by_index = Vec::with_capacity(count as usize);
            for _ in 0..count {
                by_index.push(parse_value_record(&mut r, value_format)?);
            }
            for (glyph, index) in &coverage.glyphs {
                if let Some(adj) = by_index.get(*index as usize) {
                    adjustments.insert(*glyph, *adj);
                }
            }
        }
        _ => return Err(Error::parse(Location::default(), format!("unsupported SinglePos format {format}"))),
    }

    Ok(SinglePos { coverage, adjustments })
}

#[derive(Debug, Clone)]
pub struct PairSet {
    pub second_glyph: GlyphId,
    pub first_adjustment: GlyphAdjustment,
    pub second_adjustment: GlyphAdjustment,
}

#[derive(Debug, Clone)]
pub enum PairPos {
    Format1 {
        coverage: Coverage,
        pair_sets: HashMap<GlyphId, Vec<PairSet>>,
    },
    Format2 {
        coverage: Coverage,
        first_classes: HashMap<GlyphId, u16>,
        second_classes: HashMap<GlyphId, u16>,
        class1_count: u16,
        class2_count: u16,
        matrix: Vec<(GlyphAdjustment, GlyphAdjustment)>,
    },
}

fn parse_class_def(mut r: Reader<'_>) -> Result<HashMap<GlyphId, u16>> {
    let format = r.consume_u16()?;
    let mut map = HashMap::new();
    match format {
        1 => {
            let start = r.consume_u16()?;
            let count = r.consume_u16()?;
            for i in 0..count {
                map.insert(GlyphId(start + i), r.consume_u16()?);
            }
        }
        2 => {
            let count = r.consume_u16()?;
            for _ in 0..count {
                let start = r.consume_u16()?;
                let end = r.consume_u16()?;
                let class = r.consume_u16()?;
                for g in start..=end {
                    map.insert(GlyphId(g), class);
                }
            }
        }
        _ => return Err(Error::parse(Location::default(), format!("unsupported ClassDef format {format}"))),
    }
    Ok(map)
}

fn parse_pair_pos(whole: Reader<'_>) -> Result<PairPos> {
    let mut r = whole;
    let format = r.consume_u16()?;
    let coverage_offset = r.consume_u16()? as usize;
    let coverage = parse_coverage(whole.drop(coverage_offset))?;
    let value_format1 = r.consume_u16()?;
    let value_format2 = r.consume_u16()?;

    match format {
        1 => {
            let pair_set_count = r.consume_u16()?;
            let mut offsets = Vec::with_capacity(pair_set_count as usize);
            for _ in 0..pair_set_count {
                offsets.push(r.consume_u16()? as usize);
            }
            let mut pair_sets = HashMap::new();
            let coverage_by_index: HashMap<u16, GlyphId> = coverage.glyphs.iter().map(|(&g, &i)| (i, g)).collect();
            for (i, offset) in offsets.into_iter().enumerate() {
                let Some(&first_glyph) = coverage_by_index.get(&(i as u16)) else { continue };
                let mut pr = whole.drop(offset);
                let count = pr.consume_u16()?;
                let mut sets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let second_glyph = GlyphId(pr.consume_u16()?);
                    let first_adjustment = parse_value_record(&mut pr, value_format1)?;
                    let second_adjustment = parse_value_record(&mut pr, value_format2)?;
                    sets.push(PairSet { second_glyph, first_adjustment, second_adjustment });
                }
                pair_sets.insert(first_glyph, sets);
            }
            Ok(PairPos::Format1 { coverage, pair_sets })
        }
        2 => {
            let class_def1_offset = r.consume_u16()? as usize;
            let class_def2_offset = r.consume_u16()? as usize;
            let class1_count = r.consume_u16()?;
            let class2_count = r.consume_u16()?;

            let first_classes = parse_class_def(whole.drop(class_def1_offset))?;
            let second_classes = parse_class_def(whole.drop(class_def2_offset))?;

            let mut matrix = Vec::with_capacity(class1_count as usize * class2_count as usize);
            for _ in 0..(class1_count as usize * class2_count as usize) {
                let a = parse_value_record(&mut r, value_format1)?;
                let b = parse_value_record(&mut r, value_format2)?;
                matrix.push((a, b));
            }

            Ok(PairPos::Format2 { coverage, first_classes, second_classes, class1_count, class2_count, matrix })
        }
        _ => Err(Error::parse(Location::default(), format!("unsupported PairPos format {format}"))),
    }
}

/// A nested lookup application: apply `lookup_index` (an index into the
/// font's full GPOS lookup list) at sequence position `sequence_index`
/// relative to the match (`spec.md` §4.A.6).
#[derive(Debug, Clone, Copy)]
pub struct SequenceLookupRecord {
    pub sequence_index: u16,
    pub lookup_index: u16,
}

fn parse_sequence_lookup_records(r: &mut Reader<'_>, count: u16) -> Result<Vec<SequenceLookupRecord>> {
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let sequence_index = r.consume_u16()?;
        let lookup_index = r.consume_u16()?;
        out.push(SequenceLookupRecord { sequence_index, lookup_index });
    }
    Ok(out)
}

/// One rule within a format-1/2 Contextual/ChainedContext rule set: glyph
/// ids (format 1) or class indices (format 2) to match starting at the
/// second input position (the first is implied by the coverage/class entry
/// that selected this rule set), plus the nested lookups to apply on match.
#[derive(Debug, Clone)]
struct SequenceRule {
    input: Vec<u16>,
    lookups: Vec<SequenceLookupRecord>,
}

fn parse_sequence_rule(mut r: Reader<'_>) -> Result<SequenceRule> {
    let glyph_count = r.consume_u16()?;
    let lookup_count = r.consume_u16()?;
    let mut input = Vec::with_capacity(glyph_count.saturating_sub(1) as usize);
    for _ in 1..glyph_count {
        input.push(r.consume_u16()?);
    }
    let lookups = parse_sequence_lookup_records(&mut r, lookup_count)?;
    Ok(SequenceRule { input, lookups })
}

fn parse_rule_sets(whole: Reader<'_>, offsets: &[usize]) -> Result<Vec<Vec<SequenceRule>>> {
    let mut rule_sets = Vec::with_capacity(offsets.len());
    for &set_offset in offsets {
        if set_offset == 0 {
            rule_sets.push(Vec::new());
            continue;
        }
        let set_table = whole.drop(set_offset);
        let mut sr = set_table;
        let count = sr.consume_u16()?;
        let mut rules = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let rule_offset = sr.consume_u16()? as usize;
            rules.push(parse_sequence_rule(set_table.drop(rule_offset))?);
        }
        rule_sets.push(rules);
    }
    Ok(rule_sets)
}

#[derive(Debug, Clone)]
pub enum Contextual {
    /// Format 1: rule sets keyed by the coverage index of the first glyph,
    /// matched by literal glyph id.
    Format1 { coverage: Coverage, rule_sets: Vec<Vec<SequenceRule>> },
    /// Format 2: as format 1, but both the selecting position and every
    /// rule's input glyphs are matched by class.
    Format2 { coverage: Coverage, classes: HashMap<GlyphId, u16>, rule_sets: Vec<Vec<SequenceRule>> },
    /// Format 3: one fixed-length sequence of coverage tables, each
    /// position gating by set membership rather than a single glyph/class.
    Format3 { input_coverages: Vec<Coverage>, lookups: Vec<SequenceLookupRecord> },
}

fn parse_contextual(whole: Reader<'_>) -> Result<Contextual> {
    let mut r = whole;
    let format = r.consume_u16()?;
    match format {
        1 => {
            let coverage_offset = r.consume_u16()? as usize;
            let coverage = parse_coverage(whole.drop(coverage_offset))?;
            let set_count = r.consume_u16()?;
            let mut offsets = Vec::with_capacity(set_count as usize);
            for _ in 0..set_count {
                offsets.push(r.consume_u16()? as usize);
            }
            let rule_sets = parse_rule_sets(whole, &offsets)?;
            Ok(Contextual::Format1 { coverage, rule_sets })
        }
        2 => {
            let coverage_offset = r.consume_u16()? as usize;
            let coverage = parse_coverage(whole.drop(coverage_offset))?;
            let class_def_offset = r.consume_u16()? as usize;
            let classes = parse_class_def(whole.drop(class_def_offset))?;
            let set_count = r.consume_u16()?;
            let mut offsets = Vec::with_capacity(set_count as usize);
            for _ in 0..set_count {
                offsets.push(r.consume_u16()? as usize);
            }
            let rule_sets = parse_rule_sets(whole, &offsets)?;
            Ok(Contextual::Format2 { coverage, classes, rule_sets })
        }
        3 => {
            let glyph_count = r.consume_u16()?;
            let lookup_count = r.consume_u16()?;
            let mut coverage_offsets = Vec::with_capacity(glyph_count as usize);
            for _ in 0..glyph_count {
                coverage_offsets.push(r.consume_u16()? as usize);
            }
            let lookups = parse_sequence_lookup_records(&mut r, lookup_count)?;
            let mut input_coverages = Vec::with_capacity(coverage_offsets.len());
            for off in coverage_offsets {
                input_coverages.push(parse_coverage(whole.drop(off))?);
            }
            Ok(Contextual::Format3 { input_coverages, lookups })
        }
        _ => Err(Error::parse(Location::default(), format!("unsupported Contextual GPOS format {format}"))),
    }
}

/// A chained-context rule (formats 1/2): glyph ids or classes for
/// backtrack (read in reverse storage order, matched walking backwards),
/// input (beyond the anchor glyph), and lookahead, plus nested lookups.
#[derive(Debug, Clone)]
struct ChainedSequenceRule {
    backtrack: Vec<u16>,
    input: Vec<u16>,
    lookahead: Vec<u16>,
    lookups: Vec<SequenceLookupRecord>,
}

fn parse_chained_sequence_rule(mut r: Reader<'_>) -> Result<ChainedSequenceRule> {
    let backtrack_count = r.consume_u16()?;
    let mut backtrack = Vec::with_capacity(backtrack_count as usize);
    for _ in 0..backtrack_count {
        backtrack.push(r.consume_u16()?);
    }
    let input_glyph_count = r.consume_u16()?;
    let mut input = Vec::with_capacity(input_glyph_count.saturating_sub(1) as usize);
    for _ in 1..input_glyph_count {
        input.push(r.consume_u16()?);
    }
    let lookahead_count = r.consume_u16()?;
    let mut lookahead = Vec::with_capacity(lookahead_count as usize);
    for _ in 0..lookahead_count {
        lookahead.push(r.consume_u16()?);
    }
    let lookup_count = r.consume_u16()?;
    let lookups = parse_sequence_lookup_records(&mut r, lookup_count)?;
    Ok(ChainedSequenceRule { backtrack, input, lookahead, lookups })
}

fn parse_chained_rule_sets(whole: Reader<'_>, offsets: &[usize]) -> Result<Vec<Vec<ChainedSequenceRule>>> {
    let mut rule_sets = Vec::with_capacity(offsets.len());
    for &set_offset in offsets {
        if set_offset == 0 {
            rule_sets.push(Vec::new());
            continue;
        }
        let set_table = whole.drop(set_offset);
        let mut sr = set_table;
        let count = sr.consume_u16()?;
        let mut rules = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let rule_offset = sr.consume_u16()? as usize;
            rules.push(parse_chained_sequence_rule(set_table.drop(rule_offset))?);
        }
        rule_sets.push(rules);
    }
    Ok(rule_sets)
}

#[derive(Debug, Clone)]
pub enum ChainedContext {
    Format1 { coverage: Coverage, rule_sets: Vec<Vec<ChainedSequenceRule>> },
    Format2 {
        coverage: Coverage,
        backtrack_classes: HashMap<GlyphId, u16>,
        input_classes: HashMap<GlyphId, u16>,
        lookahead_classes: HashMap<GlyphId, u16>,
        rule_sets: Vec<Vec<ChainedSequenceRule>>,
    },
    Format3 {
        backtrack_coverages: Vec<Coverage>,
        input_coverages: Vec<Coverage>,
        lookahead_coverages: Vec<Coverage>,
        lookups: Vec<SequenceLookupRecord>,
    },
}

fn parse_coverage_list(whole: Reader<'_>, r: &mut Reader<'_>, count: u16) -> Result<Vec<Coverage>> {
    let mut offsets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        offsets.push(r.consume_u16()? as usize);
    }
    let mut out = Vec::with_capacity(offsets.len());
    for off in offsets {
        out.push(parse_coverage(whole.drop(off))?);
    }
    Ok(out)
}

fn parse_chained_context(whole: Reader<'_>) -> Result<ChainedContext> {
    let mut r = whole;
    let format = r.consume_u16()?;
    match format {
        1 => {
            let coverage_offset = r.consume_u16()? as usize;
            let coverage = parse_coverage(whole.drop(coverage_offset))?;
            let set_count = r.consume_u16()?;
            let mut offsets = Vec::with_capacity(set_count as usize);
            for _ in 0..set_count {
                offsets.push(r.consume_u16()? as usize);
            }
            let rule_sets = parse_chained_rule_sets(whole, &offsets)?;
            Ok(ChainedContext::Format1 { coverage, rule_sets })
        }
        2 => {
            let coverage_offset = r.consume_u16()? as usize;
            let coverage = parse_coverage(whole.drop(coverage_offset))?;
            let backtrack_class_offset = r.consume_u16()? as usize;
            let input_class_offset = r.consume_u16()? as usize;
            let lookahead_class_offset = r.consume_u16()? as usize;
            let backtrack_classes = parse_class_def(whole.drop(backtrack_class_offset))?;
            let input_classes = parse_class_def(whole.drop(input_class_offset))?;
            let lookahead_classes = parse_class_def(whole.drop(lookahead_class_offset))?;
            let set_count = r.consume_u16()?;
            let mut offsets = Vec::with_capacity(set_count as usize);
            for _ in 0..set_count {
                offsets.push(r.consume_u16()? as usize);
            }
            let rule_sets = parse_chained_rule_sets(whole, &offsets)?;
            Ok(ChainedContext::Format2 { coverage, backtrack_classes, input_classes, lookahead_classes, rule_sets })
        }
        3 => {
            let backtrack_count = r.consume_u16()?;
            let backtrack_coverages = parse_coverage_list(whole, &mut r, backtrack_count)?;
            let input_count = r.consume_u16()?;
            let input_coverages = parse_coverage_list(whole, &mut r, input_count)?;
            let lookahead_count = r.consume_u16()?;
            let lookahead_coverages = parse_coverage_list(whole, &mut r, lookahead_count)?;
            let lookup_count = r.consume_u16()?;
            let lookups = parse_sequence_lookup_records(&mut r, lookup_count)?;
            Ok(ChainedContext::Format3 { backtrack_coverages, input_coverages, lookahead_coverages, lookups })
        }
        _ => Err(Error::parse(Location::default(), format!("unsupported ChainedContext GPOS format {format}"))),
    }
}

/// A single GPOS lookup: one or more subtables of the same type, applied
/// in order (first match for Single/Pair; every matching rule for
/// Contextual/Chained, since those can nest further lookups).
#[derive(Debug, Clone)]
pub enum Lookup {
    Single(Vec<SinglePos>),
    Pair(Vec<PairPos>),
    Contextual(Vec<Contextual>),
    ChainedContext(Vec<ChainedContext>),
}

pub fn parse_lookup_subtable(lookup_type: u16, bytes: Reader<'_>) -> Result<Lookup> {
    match lookup_type {
        1 => Ok(Lookup::Single(vec![parse_single_pos(bytes)?])),
        2 => Ok(Lookup::Pair(vec![parse_pair_pos(bytes)?])),
        7 => Ok(Lookup::Contextual(vec![parse_contextual(bytes)?])),
        8 => Ok(Lookup::ChainedContext(vec![parse_chained_context(bytes)?])),
        _ => Err(Error::parse(Location::default(), format!("unsupported/unimplemented GPOS lookup type {lookup_type}"))),
    }
}

fn single_pos_adjustment(table: &SinglePos, glyph: GlyphId) -> Option<GlyphAdjustment> {
    table.adjustments.get(&glyph).copied()
}

fn pair_pos_adjustment(table: &PairPos, first: GlyphId, second: GlyphId) -> Option<(GlyphAdjustment, GlyphAdjustment)> {
    match table {
        PairPos::Format1 { pair_sets, .. } => {
            let sets = pair_sets.get(&first)?;
            sets.iter().find(|p| p.second_glyph == second).map(|p| (p.first_adjustment, p.second_adjustment))
        }
        PairPos::Format2 { first_classes, second_classes, class2_count, matrix, .. } => {
            let c1 = *first_classes.get(&first).unwrap_or(&0);
            let c2 = *second_classes.get(&second).unwrap_or(&0);
            let idx = c1 as usize * *class2_count as usize + c2 as usize;
            matrix.get(idx).copied()
        }
    }
}

/// Looks up positioning for an adjacent glyph pair from a single lookup
/// (used by the pair-based part of the positioning pipeline; contextual and
/// chained-context lookups are layered on top by the caller, per
/// `spec.md` §4.A.6's "GSUB always precedes GPOS" note applying equally to
/// lookup-ordering within GPOS itself).
pub fn lookup_pair(lookup: &Lookup, first: GlyphId, second: GlyphId) -> (Option<GlyphAdjustment>, Option<GlyphAdjustment>) {
    match lookup {
        Lookup::Single(tables) => {
            let adj = tables.iter().find_map(|t| single_pos_adjustment(t, first));
            (adj, None)
        }
        Lookup::Pair(tables) => {
            for t in tables {
                if let Some((a, b)) = pair_pos_adjustment(t, first, second) {
                    return (Some(a), Some(b));
                }
            }
            (None, None)
        }
        // Contextual/ChainedContext only produce adjustments by nesting
        // further lookups over a matched sequence (`apply_contextual`);
        // they have no meaning as a bare adjacent-pair lookup themselves.
        Lookup::Contextual(_) | Lookup::ChainedContext(_) => (None, None),
    }
}

fn class_of(classes: &HashMap<GlyphId, u16>, g: GlyphId) -> u16 {
    *classes.get(&g).unwrap_or(&0)
}

/// Tries to match one Contextual subtable at anchor position `p`, returning
/// the number of input glyphs it consumed (always includes the anchor
/// glyph itself) and the nested lookups to apply on success.
fn match_contextual(c: &Contextual, glyphs: &[GlyphId], p: usize) -> Option<(usize, Vec<SequenceLookupRecord>)> {
    match c {
        Contextual::Format1 { coverage, rule_sets } => {
            let idx = *coverage.glyphs.get(&glyphs[p])?;
            let rules = rule_sets.get(idx as usize)?;
            for rule in rules {
                let len = rule.input.len();
                if p + 1 + len > glyphs.len() {
                    continue;
                }
                if (0..len).all(|k| glyphs[p + 1 + k].0 == rule.input[k]) {
                    return Some((1 + len, rule.lookups.clone()));
                }
            }
            None
        }
        Contextual::Format2 { coverage, classes, rule_sets } => {
            coverage.glyphs.get(&glyphs[p])?;
            let cls = class_of(classes, glyphs[p]);
            let rules = rule_sets.get(cls as usize)?;
            for rule in rules {
                let len = rule.input.len();
                if p + 1 + len > glyphs.len() {
                    continue;
                }
                if (0..len).all(|k| class_of(classes, glyphs[p + 1 + k]) == rule.input[k]) {
                    return Some((1 + len, rule.lookups.clone()));
                }
            }
            None
        }
        Contextual::Format3 { input_coverages, lookups } => {
            let len = input_coverages.len();
            if p + len > glyphs.len() {
                return None;
            }
            let all_match = input_coverages.iter().enumerate().all(|(k, cov)| cov.glyphs.contains_key(&glyphs[p + k]));
            all_match.then(|| (len, lookups.clone()))
        }
    }
}

/// As [`match_contextual`], additionally checking the backtrack (glyphs
/// before `p`, matched walking backwards) and lookahead (glyphs after the
/// input run) sequences. Format 3's bound check reuses
/// [`chained_context_lookahead_fits`] verbatim, per `spec.md` §9's Open
/// Question about its asymmetric `>=` comparison.
fn match_chained_context(c: &ChainedContext, glyphs: &[GlyphId], p: usize) -> Option<(usize, Vec<SequenceLookupRecord>)> {
    match c {
        ChainedContext::Format1 { coverage, rule_sets } => {
            let idx = *coverage.glyphs.get(&glyphs[p])?;
            let rules = rule_sets.get(idx as usize)?;
            for rule in rules {
                let input_len = rule.input.len();
                let total_input = 1 + input_len;
                if p < rule.backtrack.len() {
                    continue;
                }
                if p + total_input + rule.lookahead.len() > glyphs.len() {
                    continue;
                }
                let bt_ok = rule.backtrack.iter().enumerate().all(|(k, &g)| glyphs[p - 1 - k].0 == g);
                let in_ok = (0..input_len).all(|k| glyphs[p + 1 + k].0 == rule.input[k]);
                let la_ok = rule.lookahead.iter().enumerate().all(|(k, &g)| glyphs[p + total_input + k].0 == g);
                if bt_ok && in_ok && la_ok {
                    return Some((total_input, rule.lookups.clone()));
                }
            }
            None
        }
        ChainedContext::Format2 { coverage, backtrack_classes, input_classes, lookahead_classes, rule_sets } => {
            let idx = *coverage.glyphs.get(&glyphs[p])?;
            let rules = rule_sets.get(idx as usize)?;
            for rule in rules {
                let input_len = rule.input.len();
                let total_input = 1 + input_len;
                if p < rule.backtrack.len() {
                    continue;
                }
                if p + total_input + rule.lookahead.len() > glyphs.len() {
                    continue;
                }
                let bt_ok = rule.backtrack.iter().enumerate().all(|(k, &cls)| class_of(backtrack_classes, glyphs[p - 1 - k]) == cls);
                let in_ok = (0..input_len).all(|k| class_of(input_classes, glyphs[p + 1 + k]) == rule.input[k]);
                let la_ok = rule.lookahead.iter().enumerate().all(|(k, &cls)| class_of(lookahead_classes, glyphs[p + total_input + k]) == cls);
                if bt_ok && in_ok && la_ok {
                    return Some((total_input, rule.lookups.clone()));
                }
            }
            None
        }
        ChainedContext::Format3 { backtrack_coverages, input_coverages, lookahead_coverages, lookups } => {
            let bt_len = backtrack_coverages.len();
            let in_len = input_coverages.len();
            let la_len = lookahead_coverages.len();
            if p < bt_len {
                return None;
            }
            if !chained_context_lookahead_fits(p, in_len, la_len, glyphs.len()) {
                return None;
            }
            let bt_ok = backtrack_coverages
                .iter()
                .enumerate()
                .all(|(k, cov)| glyphs.get(p - 1 - k).is_some_and(|g| cov.glyphs.contains_key(g)));
            let in_ok = input_coverages.iter().enumerate().all(|(k, cov)| glyphs.get(p + k).is_some_and(|g| cov.glyphs.contains_key(g)));
            let la_ok = lookahead_coverages
                .iter()
                .enumerate()
                .all(|(k, cov)| glyphs.get(p + in_len + k).is_some_and(|g| cov.glyphs.contains_key(g)));
            (bt_ok && in_ok && la_ok).then(|| (in_len, lookups.clone()))
        }
    }
}

/// Applies a matched rule's nested lookup records against the already
/// matched glyph run: `sequence_index` is relative to the match's anchor
/// position, and the nested lookup is resolved by index into the font's
/// full GPOS lookup list (`spec.md` §4.A.6's "nested lookup records
/// (glyph_index, lookup_index), applied recursively"). Only one level of
/// nesting is performed — a nested lookup that is itself
/// Contextual/ChainedContext is not recursed into further, which covers
/// every layout a real document pipeline needs (kerning/repositioning
/// gated by context) without unbounded recursion.
fn apply_nested_lookups(all_lookups: &[Lookup], records: &[SequenceLookupRecord], glyphs: &[GlyphId], anchor: usize, adjustments: &mut HashMap<usize, GlyphAdjustment>) {
    for rec in records {
        let Some(nested) = all_lookups.get(rec.lookup_index as usize) else { continue };
        let pos = anchor + rec.sequence_index as usize;
        match nested {
            Lookup::Single(tables) => {
                if let Some(&g) = glyphs.get(pos) {
                    if let Some(adj) = tables.iter().find_map(|t| single_pos_adjustment(t, g)) {
                        adjustments.entry(pos).or_default().combine(&adj);
                    }
                }
            }
            Lookup::Pair(tables) => {
                if let (Some(&g1), Some(&g2)) = (glyphs.get(pos), glyphs.get(pos + 1)) {
                    for t in tables {
                        if let Some((a, b)) = pair_pos_adjustment(t, g1, g2) {
                            adjustments.entry(pos).or_default().combine(&a);
                            adjustments.entry(pos + 1).or_default().combine(&b);
                            break;
                        }
                    }
                }
            }
            Lookup::Contextual(_) | Lookup::ChainedContext(_) => {}
        }
    }
}

/// Matches every Contextual/ChainedContext lookup against every anchor
/// position and applies the nested lookups of the first matching rule,
/// combining into `adjustments` by addition (`spec.md` §4.A.6).
fn apply_contextual(all_lookups: &[Lookup], glyphs: &[GlyphId], adjustments: &mut HashMap<usize, GlyphAdjustment>) {
    for lookup in all_lookups {
        match lookup {
            Lookup::Contextual(subtables) => {
                for p in 0..glyphs.len() {
                    for subtable in subtables {
                        if let Some((_len, records)) = match_contextual(subtable, glyphs, p) {
                            apply_nested_lookups(all_lookups, &records, glyphs, p, adjustments);
                            break;
                        }
                    }
                }
            }
            Lookup::ChainedContext(subtables) => {
                for p in 0..glyphs.len() {
                    for subtable in subtables {
                        if let Some((_len, records)) = match_chained_context(subtable, glyphs, p) {
                            apply_nested_lookups(all_lookups, &records, glyphs, p, adjustments);
                            break;
                        }
                    }
                }
            }
            Lookup::Single(_) | Lookup::Pair(_) => {}
        }
    }
}

/// Runs every lookup across a glyph sequence, combining per-glyph
/// adjustments by addition. Chained-context lookahead bound check preserved
/// from the reference exactly (`position + num_glyphs + num_lookahead >=
/// glyphs.len()`), since `spec.md`'s Open Questions flag this asymmetric
/// comparison as possibly intentional.
pub fn chained_context_lookahead_fits(position: usize, num_glyphs: usize, num_lookahead: usize, total_glyphs: usize) -> bool {
    !(position + num_glyphs + num_lookahead >= total_glyphs)
}

pub fn position_glyph_sequence(lookups: &[Lookup], glyphs: &[GlyphId]) -> HashMap<usize, GlyphAdjustment> {
    let mut adjustments: HashMap<usize, GlyphAdjustment> = HashMap::new();
    if glyphs.is_empty() {
        return adjustments;
    }
    if glyphs.len() >= 2 {
        for lookup in lookups {
            for i in 0..glyphs.len() - 1 {
                let (a, b) = lookup_pair(lookup, glyphs[i], glyphs[i + 1]);
                if let Some(a) = a {
                    adjustments.entry(i).or_default().combine(&a);
                }
                if let Some(b) = b {
                    adjustments.entry(i + 1).or_default().combine(&b);
                }
            }
        }
    }
    apply_contextual(lookups, glyphs, &mut adjustments);
    adjustments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_context_bound_uses_ge_not_gt() {
        // total=10, position=3, num_glyphs=4, num_lookahead=3 => 3+4+3=10 >= 10 => does not fit
        assert!(!chained_context_lookahead_fits(3, 4, 3, 10));
        // one fewer lookahead glyph fits exactly at the boundary.
        assert!(chained_context_lookahead_fits(3, 4, 2, 10));
    }

    fn glyph_coverage(glyphs: &[u16]) -> Coverage {
        Coverage { glyphs: glyphs.iter().enumerate().map(|(i, &g)| (GlyphId(g), i as u16)).collect() }
    }

    #[test]
    fn contextual_format3_applies_nested_single_pos() {
        // Lookup 0: a contextual rule matching glyphs [1, 2] and applying
        // lookup 1 (Single) to sequence position 0.
        let contextual = Lookup::Contextual(vec![Contextual::Format3 {
            input_coverages: vec![glyph_coverage(&[1]), glyph_coverage(&[2])],
            lookups: vec![SequenceLookupRecord { sequence_index: 0, lookup_index: 1 }],
        }]);
        let mut adjustments = HashMap::new();
        adjustments.insert(GlyphId(1), GlyphAdjustment { horz_placement: FontScalar(7), ..Default::default() });
        let single = Lookup::Single(vec![SinglePos { coverage: glyph_coverage(&[1]), adjustments }]);

        let all = vec![contextual, single];
        let glyphs = [GlyphId(1), GlyphId(2)];
        let result = position_glyph_sequence(&all, &glyphs);
        assert_eq!(result.get(&0).unwrap().horz_placement, FontScalar(7));
    }

    #[test]
    fn chained_context_format3_requires_lookahead_to_match() {
        let chained = Lookup::ChainedContext(vec![ChainedContext::Format3 {
            backtrack_coverages: vec![],
            input_coverages: vec![glyph_coverage(&[1])],
            lookahead_coverages: vec![glyph_coverage(&[2])],
            lookups: vec![SequenceLookupRecord { sequence_index: 0, lookup_index: 1 }],
        }]);
        let mut adjustments = HashMap::new();
        adjustments.insert(GlyphId(1), GlyphAdjustment { horz_advance: FontScalar(-5), ..Default::default() });
        let single = Lookup::Single(vec![SinglePos { coverage: glyph_coverage(&[1]), adjustments }]);
        let all = vec![chained, single];

        // Matches: glyph 1 followed by lookahead glyph 2.
        let matching = [GlyphId(1), GlyphId(2)];
        let result = position_glyph_sequence(&all, &matching);
        assert_eq!(result.get(&0).unwrap().horz_advance, FontScalar(-5));

        // Doesn't match: wrong lookahead glyph, no adjustment applied.
        let non_matching = [GlyphId(1), GlyphId(3)];
        let result2 = position_glyph_sequence(&all, &non_matching);
        assert!(result2.is_empty());
    }
}
