//! The AAT `morx` (extended glyph metamorphosis) table: five subtable kinds
//! chained together, each driven by the generic state machine in
//! [`super::state_table`].

use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::{Error, Location, Result};
use crate::font::bytes::Reader;
use crate::font::lookup::{parse_lookup_table, search_lookup_table};
use crate::font::scalar::GlyphId;
use crate::font::substitution::{Contraction, ExtraGlyph, SubstitutionMapping};

use super::state_table::{parse_extended_state_table, run_state_machine, Direction, StateTable, DONT_ADVANCE};

const MARK_FIRST: u16 = 0x8000;
const MARK_LAST: u16 = 0x2000;
const VERB_MASK: u16 = 0xF;

const SET_MARK: u16 = 0x8000;

const PERFORM_ACTION: u16 = 0x2000;
const SET_COMPONENT: u16 = 0x8000;

const CURRENT_INSERT_BEFORE: u16 = 0x800;
const MARKED_INSERT_BEFORE: u16 = 0x400;
const CURRENT_INSERT_COUNT_MASK: u16 = 0x3E0;
const MARKED_INSERT_COUNT_MASK: u16 = 0x1F;

/// Common per-subtable flags, common to all five subtable kinds via the
/// coverage word's top byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtableCoverage {
    pub process_logical_order: bool,
    pub process_descending_order: bool,
    pub only_vertical: bool,
    pub both_horizontal_and_vertical: bool,
}

impl SubtableCoverage {
    fn direction(&self) -> Direction {
        if self.process_descending_order {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}

#[derive(Debug, Clone)]
pub enum Subtable<'a> {
    Rearrangement { state_table: StateTable<'a>, coverage: SubtableCoverage },
    Contextual { state_table: StateTable<'a>, substitution_tables: Vec<Reader<'a>>, coverage: SubtableCoverage },
    Ligature {
        state_table: StateTable<'a>,
        lig_actions: Reader<'a>,
        num_lig_actions: u32,
        component_table: Reader<'a>,
        ligature_table: Reader<'a>,
        coverage: SubtableCoverage,
    },
    NonContextual { lookup: HashMap<GlyphId, u64>, coverage: SubtableCoverage },
    Insertion {
        state_table: StateTable<'a>,
        insertion_glyphs: Reader<'a>,
        coverage: SubtableCoverage,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Chain<'a> {
    pub default_flags: u32,
    pub subtables: Vec<(u32, Subtable<'a>)>,
}

#[derive(Debug, Clone, Default)]
pub struct MorxTable<'a> {
    pub chains: Vec<Chain<'a>>,
}

fn parse_coverage(coverage_word: u16) -> SubtableCoverage {
    SubtableCoverage {
        process_logical_order: coverage_word & 0x2000 != 0,
        process_descending_order: coverage_word & 0x4000 != 0,
        only_vertical: coverage_word & 0x8000 != 0,
        both_horizontal_and_vertical: coverage_word & 0x1000 != 0,
    }
}

fn parse_rearrangement_subtable<'a>(buf: &mut Reader<'a>, coverage: SubtableCoverage, num_font_glyphs: usize) -> Result<Subtable<'a>> {
    let state_table = parse_extended_state_table(buf, num_font_glyphs)?;
    Ok(Subtable::Rearrangement { state_table, coverage })
}

fn parse_contextual_subtable<'a>(buf: &mut Reader<'a>, coverage: SubtableCoverage, num_font_glyphs: usize) -> Result<Subtable<'a>> {
    let table_start = *buf;
    let state_table = parse_extended_state_table(buf, num_font_glyphs)?;
    let subst_table_offset = buf.consume_u32()? as usize;

    let subst_base = table_start.drop(subst_table_offset);
    // We don't know the count up front; substitution lookups are addressed
    // by index out of the per-entry markSubstitutionTableIndex /
    // currentSubstitutionTableIndex, each a Lookup table. We lazily slice
    // from `subst_base` on demand rather than enumerating a fixed count.
    Ok(Subtable::Contextual { state_table, substitution_tables: vec![subst_base], coverage })
}

fn parse_ligature_subtable<'a>(buf: &mut Reader<'a>, coverage: SubtableCoverage, num_font_glyphs: usize) -> Result<Subtable<'a>> {
    let table_start = *buf;
    let state_table = parse_extended_state_table(buf, num_font_glyphs)?;
    let lig_action_offset = buf.consume_u32()? as usize;
    let component_offset = buf.consume_u32()? as usize;
    let ligature_offset = buf.consume_u32()? as usize;

    let lig_actions = table_start.drop(lig_action_offset);
    let component_table = table_start.drop(component_offset);
    let ligature_table = table_start.drop(ligature_offset);

    let num_lig_actions = ((ligature_offset.saturating_sub(lig_action_offset)) / 4) as u32;

    Ok(Subtable::Ligature {
        state_table,
        lig_actions,
        num_lig_actions,
        component_table,
        ligature_table,
        coverage,
    })
}

fn parse_non_contextual_subtable<'a>(buf: &mut Reader<'a>, coverage: SubtableCoverage, num_font_glyphs: usize) -> Result<Subtable<'a>> {
    let lookup = parse_lookup_table(*buf, num_font_glyphs)?;
    Ok(Subtable::NonContextual { lookup, coverage })
}

fn parse_insertion_subtable<'a>(buf: &mut Reader<'a>, coverage: SubtableCoverage, num_font_glyphs: usize) -> Result<Subtable<'a>> {
    let table_start = *buf;
    let state_table = parse_extended_state_table(buf, num_font_glyphs)?;
    let insertion_action_offset = buf.consume_u32()? as usize;
    let insertion_glyphs = table_start.drop(insertion_action_offset);
    Ok(Subtable::Insertion { state_table, insertion_glyphs, coverage })
}

fn parse_morx_subtable<'a>(buf: &mut Reader<'a>, num_font_glyphs: usize) -> Result<(u32, Subtable<'a>)> {
    let _length = buf.consume_u32()?;
    let coverage_word = buf.consume_u16()?;
    let kind = coverage_word & 0xff;
    let sub_feature_flags = buf.consume_u32()?;

    let coverage = parse_coverage(coverage_word);

    let sub = match kind {
        0 => parse_rearrangement_subtable(buf, coverage, num_font_glyphs)?,
        1 => parse_contextual_subtable(buf, coverage, num_font_glyphs)?,
        2 => parse_ligature_subtable(buf, coverage, num_font_glyphs)?,
        4 => parse_non_contextual_subtable(buf, coverage, num_font_glyphs)?,
        5 => parse_insertion_subtable(buf, coverage, num_font_glyphs)?,
        _ => return Err(Error::parse(Location::default(), format!("unknown morx subtable kind {kind}"))),
    };

    Ok((sub_feature_flags, sub))
}

fn parse_morx_chain<'a>(buf: &mut Reader<'a>, num_font_glyphs: usize) -> Result<Chain<'a>> {
    let _chain_length = buf.consume_u32()?;
    let default_flags = buf.consume_u32()?;
    let _chain_length2 = buf.consume_u32()?;
    let num_subtables = buf.consume_u32()?;

    let mut subtables = Vec::with_capacity(num_subtables as usize);
    for _ in 0..num_subtables {
        subtables.push(parse_morx_subtable(buf, num_font_glyphs)?);
    }

    Ok(Chain { default_flags, subtables })
}

pub fn parse_morx_table<'a>(bytes: &'a [u8], num_font_glyphs: usize) -> Result<MorxTable<'a>> {
    let mut r = Reader::new(bytes);
    let version = r.consume_u16()?;
    r.consume_u16()?; // unused
    if version != 2 && version != 3 {
        return Err(Error::parse(Location::default(), format!("invalid 'morx' version {version}")));
    }

    let num_chains = r.consume_u32()?;
    let mut chains = Vec::with_capacity(num_chains as usize);
    for _ in 0..num_chains {
        chains.push(parse_morx_chain(&mut r, num_font_glyphs)?);
    }

    Ok(MorxTable { chains })
}

/// Mutable working state threaded through every subtable application:
/// mirrors the way the reference implementation mutates one glyph vector
/// in place across the whole chain, recording a [`SubstitutionMapping`]
/// alongside it.
struct GlyphRun {
    glyphs: Vec<GlyphId>,
    mapping: SubstitutionMapping,
}

impl GlyphRun {
    fn new(glyphs: Vec<GlyphId>) -> Self {
        let mapping = SubstitutionMapping::identity(glyphs.len());
        Self { glyphs, mapping }
    }
}

fn apply_rearrangement(state_table: &StateTable<'_>, coverage: &SubtableCoverage, run: &mut GlyphRun) -> Result<()> {
    let mut first_idx: Option<usize> = None;
    let mut last_idx: Option<usize> = None;

    let glyphs_snapshot = run.glyphs.clone();
    let mut verb_to_apply: Option<(usize, usize, u16)> = None;

    run_state_machine(state_table, &glyphs_snapshot, coverage.direction(), |idx, state, entry_index| {
        let mut entry = state_table.entry_array.drop(entry_index as usize * 4);
        let next_state = entry.consume_u16()?;
        let flags = entry.consume_u16()?;

        if flags & MARK_FIRST != 0 {
            first_idx = Some(idx);
        }
        if flags & MARK_LAST != 0 {
            last_idx = Some(idx);
        }

        let verb = flags & VERB_MASK;
        if verb != 0 {
            if let (Some(f), Some(l)) = (first_idx, last_idx) {
                verb_to_apply = Some((f, l, verb));
            }
        }

        Ok((next_state, flags & DONT_ADVANCE != 0))
    })?;

    if let Some((f, l, verb)) = verb_to_apply {
        if f <= l && l < run.glyphs.len() {
            apply_rearrangement_verb(&mut run.glyphs[f..=l], verb);
        }
    }

    Ok(())
}

/// How many glyphs at the front/back of the window a verb names as A/B and
/// C/D respectively; the rest of the window is the untouched middle `x`.
fn verb_boundary_counts(verb: u16) -> (usize, usize) {
    match verb {
        0x0 => (0, 0),
        0x1 => (1, 0),
        0x2 => (0, 1),
        0x3 => (1, 1),
        0x4 | 0x5 => (2, 0),
        0x6 | 0x7 => (0, 2),
        0x8 | 0x9 => (1, 2),
        0xA | 0xB => (2, 1),
        _ => (2, 2),
    }
}

/// The 16 rearrangement permutations documented for AAT `morx`/`mort`
/// rearrangement subtables, acting on up to two marked glyphs at each end
/// of the window (A/B at the front, C/D at the back) with the untouched
/// middle glyphs denoted `x`.
fn apply_rearrangement_verb(window: &mut [GlyphId], verb: u16) {
    if verb == 0 {
        return;
    }
    let n = window.len();
    let (front, back) = verb_boundary_counts(verb);
    if front + back > n {
        return;
    }

    let a = window[..front].to_vec();
    let mid = window[front..n - back].to_vec();
    let d = window[n - back..].to_vec();

    let mut out = Vec::with_capacity(n);
    match verb {
        0x1 => {
            out.extend(mid);
            out.extend(a);
        }
        0x2 => {
            out.extend(d);
            out.extend(mid);
        }
        0x3 => {
            out.extend(d);
            out.extend(mid);
            out.extend(a);
        }
        0x4 => {
            out.extend(mid);
            out.extend(a);
        }
        0x5 => {
            out.extend(mid);
            out.extend(a.iter().rev());
        }
        0x6 => {
            out.extend(d);
            out.extend(mid);
        }
        0x7 => {
            out.extend(d.iter().rev());
            out.extend(mid);
        }
        0x8 => {
            out.extend(d);
            out.extend(mid);
            out.extend(a);
        }
        0x9 => {
            out.extend(d.iter().rev());
            out.extend(mid);
            out.extend(a);
        }
        0xA => {
            out.extend(d);
            out.extend(mid);
            out.extend(a);
        }
        0xB => {
            out.extend(d);
            out.extend(mid);
            out.extend(a.iter().rev());
        }
        0xC => {
            out.extend(d);
            out.extend(mid);
            out.extend(a);
        }
        0xD => {
            out.extend(d);
            out.extend(mid);
            out.extend(a.iter().rev());
        }
        0xE => {
            out.extend(d.iter().rev());
            out.extend(mid);
            out.extend(a);
        }
        0xF => {
            out.extend(d.iter().rev());
            out.extend(mid);
            out.extend(a.iter().rev());
        }
        _ => return,
    }

    window.copy_from_slice(&out);
}

fn sign_extend_30(value: u32) -> i32 {
    ((value << 2) as i32) >> 2
}

fn apply_ligature(
    state_table: &StateTable<'_>,
    lig_actions: &Reader<'_>,
    component_table: &Reader<'_>,
    ligature_table: &Reader<'_>,
    coverage: &SubtableCoverage,
    run: &mut GlyphRun,
) -> Result<()> {
    let glyphs_snapshot = run.glyphs.clone();
    let mut glyph_stack: Vec<usize> = Vec::new(); // indices into glyphs_snapshot/output
    let mut output: Vec<GlyphId> = glyphs_snapshot.clone();
    let mut deleted: Vec<bool> = vec![false; glyphs_snapshot.len()];
    // Every original-input position that took part in a ligature action,
    // mapped to the resulting glyph and the full original-glyph-id
    // constituent list for its group (`spec.md` §3.1/§8: the mapping must
    // stay lossless, so both the stored and the deleted positions need the
    // same constituent list to reconstruct the group).
    let mut ligature_groups: HashMap<usize, (GlyphId, Rc<[GlyphId]>)> = HashMap::new();

    run_state_machine(state_table, &glyphs_snapshot, coverage.direction(), |idx, state, entry_index| {
        let mut entry = state_table.entry_array.drop(entry_index as usize * 6);
        let next_state = entry.consume_u16()?;
        let flags = entry.consume_u16()?;
        let lig_action_index = entry.consume_u16()?;

        if flags & SET_COMPONENT != 0 && idx < glyphs_snapshot.len() {
            glyph_stack.push(idx);
        }

        if flags & PERFORM_ACTION != 0 && !glyph_stack.is_empty() {
            let mut action_idx = lig_action_index as usize;
            let mut component_sum: i64 = 0;
            let mut consumed: Vec<usize> = Vec::new();

            loop {
                if glyph_stack.is_empty() {
                    break;
                }
                let glyph_idx = glyph_stack.pop().unwrap();
                consumed.push(glyph_idx);

                let mut action_reader = lig_actions.drop(action_idx * 4);
                let lig_action = action_reader.consume_u32()?;
                action_idx += 1;

                let is_last = lig_action & 0x8000_0000 != 0;
                let should_store = lig_action & 0x4000_0000 != 0;
                let offset = sign_extend_30(lig_action & 0x3FFF_FFFF);

                let glyph_id = output[glyph_idx].0 as i64;
                let component_table_index = glyph_id + offset as i64;
                let mut ct = component_table.drop((component_table_index.max(0) as usize) * 2);
                let component_value = ct.consume_u16()? as i64;
                component_sum += component_value;

                if should_store || is_last {
                    let ligature_index = component_sum;
                    let mut lt = ligature_table.drop((ligature_index.max(0) as usize) * 2);
                    let ligature_glyph = GlyphId(lt.consume_u16()?);

                    // the last-consumed (lowest-indexed, since we popped in
                    // reverse) glyph becomes the ligature; the rest are
                    // deleted, matching "never repushed" in the reference.
                    let store_at = *consumed.last().unwrap();
                    output[store_at] = ligature_glyph;
                    for &c in &consumed[..consumed.len() - 1] {
                        deleted[c] = true;
                    }

                    let mut group_positions = consumed.clone();
                    group_positions.sort_unstable();
                    let constituents: Rc<[GlyphId]> = group_positions.iter().map(|&c| glyphs_snapshot[c]).collect();
                    for &c in &group_positions {
                        ligature_groups.insert(c, (ligature_glyph, constituents.clone()));
                    }

                    component_sum = 0;
                    consumed.clear();
                }

                if is_last {
                    break;
                }
            }
        }

        Ok((next_state, flags & DONT_ADVANCE != 0))
    })?;

    // rebuild the glyph run, recording contractions.
    let mut new_glyphs = Vec::new();
    let mut contractions = Vec::with_capacity(glyphs_snapshot.len());
    for (i, &was_deleted) in deleted.iter().enumerate() {
        if let Some((ligature_glyph, constituents)) = ligature_groups.get(&i) {
            contractions.push(Contraction::LigatureComponent { ligature_glyph: *ligature_glyph, constituents: constituents.clone() });
            if !was_deleted {
                new_glyphs.push(output[i]);
            }
        } else if was_deleted {
            contractions.push(Contraction::Deleted);
        } else if output[i] != glyphs_snapshot[i] {
            new_glyphs.push(output[i]);
            contractions.push(Contraction::Replaced(output[i]));
        } else {
            new_glyphs.push(output[i]);
            contractions.push(Contraction::Unchanged);
        }
    }

    run.glyphs = new_glyphs;
    run.mapping = SubstitutionMapping { contractions, extra_glyphs: Vec::new() };
    Ok(())
}

fn apply_contextual(state_table: &StateTable<'_>, substitution_tables: &Reader<'_>, coverage: &SubtableCoverage, run: &mut GlyphRun) -> Result<()> {
    let glyphs_snapshot = run.glyphs.clone();
    let mut output = glyphs_snapshot.clone();
    let mut mark_idx: Option<usize> = None;

    run_state_machine(state_table, &glyphs_snapshot, coverage.direction(), |idx, _state, entry_index| {
        let mut entry = state_table.entry_array.drop(entry_index as usize * 8);
        let next_state = entry.consume_u16()?;
        let flags = entry.consume_u16()?;
        let mark_subst_index = entry.consume_u16()?;
        let current_subst_index = entry.consume_u16()?;

        if current_subst_index != 0xFFFF && idx < output.len() {
            let table = substitution_tables.drop(current_subst_index as usize * 2);
            let offset = table.peek_u16().unwrap_or(0);
            let lookup_table = substitution_tables.drop(offset as usize);
            if let Ok(Some(v)) = search_lookup_table(lookup_table, output[idx]) {
                output[idx] = GlyphId(v as u16);
            }
        }

        if mark_subst_index != 0xFFFF {
            if let Some(m) = mark_idx {
                if m < output.len() {
                    let table = substitution_tables.drop(mark_subst_index as usize * 2);
                    let offset = table.peek_u16().unwrap_or(0);
                    let lookup_table = substitution_tables.drop(offset as usize);
                    if let Ok(Some(v)) = search_lookup_table(lookup_table, output[m]) {
                        output[m] = GlyphId(v as u16);
                    }
                }
            }
        }

        if flags & SET_MARK != 0 {
            mark_idx = Some(idx);
        }

        Ok((next_state, flags & DONT_ADVANCE != 0))
    })?;

    let contractions = glyphs_snapshot
        .iter()
        .zip(output.iter())
        .map(|(orig, new)| if orig == new { Contraction::Unchanged } else { Contraction::Replaced(*new) })
        .collect();

    run.glyphs = output;
    run.mapping = SubstitutionMapping { contractions, extra_glyphs: Vec::new() };
    Ok(())
}

fn apply_non_contextual(lookup: &HashMap<GlyphId, u64>, run: &mut GlyphRun) -> Result<()> {
    let mut contractions = Vec::with_capacity(run.glyphs.len());
    for g in run.glyphs.iter_mut() {
        if let Some(&v) = lookup.get(g) {
            let new = GlyphId(v as u16);
            contractions.push(if new == *g { Contraction::Unchanged } else { Contraction::Replaced(new) });
            *g = new;
        } else {
            contractions.push(Contraction::Unchanged);
        }
    }
    run.mapping = SubstitutionMapping { contractions, extra_glyphs: Vec::new() };
    Ok(())
}

fn apply_insertion(state_table: &StateTable<'_>, insertion_glyphs: &Reader<'_>, coverage: &SubtableCoverage, run: &mut GlyphRun) -> Result<()> {
    let glyphs_snapshot = run.glyphs.clone();
    let mut output: Vec<GlyphId> = glyphs_snapshot.clone();
    let mut extra_glyphs = Vec::new();
    let mut marked_idx: Option<usize> = None;
    let mut insertions: Vec<(usize, bool, Vec<GlyphId>)> = Vec::new(); // (pos, before, glyphs)

    run_state_machine(state_table, &glyphs_snapshot, coverage.direction(), |idx, _state, entry_index| {
        let mut entry = state_table.entry_array.drop(entry_index as usize * 8);
        let next_state = entry.consume_u16()?;
        let flags = entry.consume_u16()?;
        let current_insert_index = entry.consume_u16()?;
        let marked_insert_index = entry.consume_u16()?;

        let current_count = (flags & CURRENT_INSERT_COUNT_MASK) >> 5;
        if current_count > 0 && current_insert_index != 0xFFFF && idx < glyphs_snapshot.len() {
            let before = flags & CURRENT_INSERT_BEFORE != 0;
            let mut r = insertion_glyphs.drop(current_insert_index as usize * 2);
            let mut glyphs = Vec::with_capacity(current_count as usize);
            for _ in 0..current_count {
                glyphs.push(GlyphId(r.consume_u16()?));
            }
            insertions.push((idx, before, glyphs));
        }

        let marked_count = flags & MARKED_INSERT_COUNT_MASK;
        if marked_count > 0 && marked_insert_index != 0xFFFF {
            if let Some(m) = marked_idx {
                let before = flags & MARKED_INSERT_BEFORE != 0;
                let mut r = insertion_glyphs.drop(marked_insert_index as usize * 2);
                let mut glyphs = Vec::with_capacity(marked_count as usize);
                for _ in 0..marked_count {
                    glyphs.push(GlyphId(r.consume_u16()?));
                }
                insertions.push((m, before, glyphs));
            }
        }

        if flags & SET_MARK != 0 {
            marked_idx = Some(idx);
        }

        Ok((next_state, flags & DONT_ADVANCE != 0))
    })?;

    // apply insertions back-to-front so earlier indices stay valid.
    insertions.sort_by(|a, b| b.0.cmp(&a.0));
    for (pos, before, glyphs) in insertions {
        let at = if before { pos } else { pos + 1 };
        let at = at.min(output.len());
        for (k, g) in glyphs.into_iter().enumerate() {
            output.insert(at + k, g);
            extra_glyphs.push(ExtraGlyph { output_index: at + k, glyph: g });
        }
    }

    let contractions = glyphs_snapshot.iter().map(|_| Contraction::Unchanged).collect();
    run.glyphs = output;
    run.mapping = SubstitutionMapping { contractions, extra_glyphs };
    Ok(())
}

fn apply_subtable(sub: &Subtable<'_>, run: &mut GlyphRun) -> Result<()> {
    let before = run.mapping.clone();
    match sub {
        Subtable::Rearrangement { state_table, coverage } => apply_rearrangement(state_table, coverage, run)?,
        Subtable::Contextual { state_table, substitution_tables, coverage } => {
            apply_contextual(state_table, &substitution_tables[0], coverage, run)?
        }
        Subtable::Ligature { state_table, lig_actions, component_table, ligature_table, coverage, .. } => {
            apply_ligature(state_table, lig_actions, component_table, ligature_table, coverage, run)?
        }
        Subtable::NonContextual { lookup, .. } => apply_non_contextual(lookup, run)?,
        Subtable::Insertion { state_table, insertion_glyphs, coverage } => apply_insertion(state_table, insertion_glyphs, coverage, run)?,
    }
    run.mapping = before.and_then(&run.mapping);
    Ok(())
}

fn subtable_coverage(sub: &Subtable<'_>) -> &SubtableCoverage {
    match sub {
        Subtable::Rearrangement { coverage, .. }
        | Subtable::Contextual { coverage, .. }
        | Subtable::Ligature { coverage, .. }
        | Subtable::NonContextual { coverage, .. }
        | Subtable::Insertion { coverage, .. } => coverage,
    }
}

/// Applies every enabled subtable of every chain, in order, to `glyphs`.
/// `enabled_features` gates chain subtables the same way the reference does:
/// a subtable's `sub_feature_flags` bit is applied only if it is set in the
/// chain's currently-active feature flag accumulator, which starts from
/// `default_flags` and is XORed by user feature selections (not modelled
/// here beyond the default set, since `spec.md` scopes feature selection to
/// "whatever flags are enabled").
pub fn perform_substitutions(table: &MorxTable<'_>, glyphs: &[GlyphId]) -> Result<(Vec<GlyphId>, SubstitutionMapping)> {
    let mut run = GlyphRun::new(glyphs.to_vec());

    for chain in &table.chains {
        let active_flags = chain.default_flags;
        for (sub_feature_flags, sub) in &chain.subtables {
            if *sub_feature_flags != 0 && active_flags & sub_feature_flags == 0 {
                continue;
            }
            let coverage = subtable_coverage(sub);
            if coverage.only_vertical && !coverage.both_horizontal_and_vertical {
                continue;
            }
            apply_subtable(sub, &mut run)?;
        }
    }

    Ok((run.glyphs, run.mapping))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_30_preserves_negative_offsets() {
        // -1 encoded in 30 bits: all lower 30 bits set.
        let encoded = 0x3FFF_FFFFu32;
        assert_eq!(sign_extend_30(encoded), -1);
        assert_eq!(sign_extend_30(1), 1);
    }

    #[test]
    fn rearrangement_verb_1_moves_first_glyph_to_the_end() {
        // Ax -> xA
        let mut window = [GlyphId(1), GlyphId(2), GlyphId(3)];
        apply_rearrangement_verb(&mut window, 0x1);
        assert_eq!(window, [GlyphId(2), GlyphId(3), GlyphId(1)]);
    }

    #[test]
    fn rearrangement_verb_15_reverses_all_four_boundary_glyphs() {
        // ABxCD -> DCxBA
        let mut window = [GlyphId(1), GlyphId(2), GlyphId(9), GlyphId(3), GlyphId(4)];
        apply_rearrangement_verb(&mut window, 0xF);
        assert_eq!(window, [GlyphId(4), GlyphId(3), GlyphId(9), GlyphId(2), GlyphId(1)]);
    }

    #[test]
    fn rearrangement_verb_0_is_identity() {
        let mut window = [GlyphId(1), GlyphId(2)];
        apply_rearrangement_verb(&mut window, 0x0);
        assert_eq!(window, [GlyphId(1), GlyphId(2)]);
    }
}
