//! `GSUB` (glyph substitution): the OpenType-format counterpart to AAT
//! `morx` (`spec.md` §4.A/§6, testable property §8.1's `fi` ligature
//! scenario). Only the two subtable kinds a document pipeline actually
//! needs are implemented: Single (format 1/2) and Ligature (format 4).
//! Contextual/chained/alternate/multiple substitution are not named by
//! `spec.md`'s testable properties and are skipped the same way
//! `FontFile::gpos_lookups` skips GPOS lookup types it doesn't parse.

use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::{Error, Location, Result};
use crate::font::bytes::Reader;
use crate::font::scalar::GlyphId;
use crate::font::substitution::{Contraction, SubstitutionMapping};

/// Glyph-id → coverage index. Identical shape to `gpos::Coverage`; kept as
/// its own copy so `gsub`/`gpos` stay independently readable table parsers,
/// matching the one-file-per-table-kind layout the rest of `font/` uses.
#[derive(Debug, Clone, Default)]
struct Coverage {
    glyphs: HashMap<GlyphId, u16>,
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
pub struct SingleSubst {
    coverage: Coverage,
    /// Glyph-indexed substitute, already resolved from either format's
    /// delta-glyph-id (format 1) or explicit substitute array (format 2)
    /// representation.
    substitutes: HashMap<GlyphId, GlyphId>,
}

fn parse_single_subst(whole: Reader<'_>) -> Result<SingleSubst> {
    let mut r = whole;
    let format = r.consume_u16()?;
    let coverage_offset = r.consume_u16()? as usize;
    let coverage = parse_coverage(whole.drop(coverage_offset))?;

    let mut substitutes = HashMap::new();
    match format {
        1 => {
            let delta = r.consume_i16()?;
            for glyph in coverage.glyphs.keys() {
                let out = (glyph.0 as i32 + delta as i32) as u16;
                substitutes.insert(*glyph, GlyphId(out));
            }
        }
        2 => {
            let count = r.consume_u16()?;
            let mut by_index = Vec::with_capacity(count as usize);
            for _ in 0..count {
                by_index.push(GlyphId(r.consume_u16()?));
            }
            for (glyph, index) in &coverage.glyphs {
                if let Some(sub) = by_index.get(*index as usize) {
                    substitutes.insert(*glyph, *sub);
                }
            }
        }
        _ => return Err(Error::parse(Location::default(), format!("unsupported SingleSubst format {format}"))),
    }

    Ok(SingleSubst { coverage, substitutes })
}

/// One ligature: the replacement glyph plus the component glyphs *after*
/// the first (the first component is implied by the coverage entry that
/// selected this ligature set).
#[derive(Debug, Clone)]
struct Ligature {
    glyph: GlyphId,
    component_glyphs: Vec<GlyphId>,
}

#[derive(Debug, Clone)]
pub struct LigatureSubst {
    coverage: Coverage,
    /// Ligature sets, indexed by the coverage index of the first component.
    ligature_sets: HashMap<GlyphId, Vec<Ligature>>,
}

fn parse_ligature_subst(whole: Reader<'_>) -> Result<LigatureSubst> {
    let mut r = whole;
    let format = r.consume_u16()?;
    if format != 1 {
        return Err(Error::parse(Location::default(), format!("unsupported LigatureSubst format {format}")));
    }
    let coverage_offset = r.consume_u16()? as usize;
    let coverage = parse_coverage(whole.drop(coverage_offset))?;

    let set_count = r.consume_u16()?;
    let mut set_offsets = Vec::with_capacity(set_count as usize);
    for _ in 0..set_count {
        set_offsets.push(r.consume_u16()? as usize);
    }

    let coverage_by_index: HashMap<u16, GlyphId> = coverage.glyphs.iter().map(|(&g, &i)| (i, g)).collect();
    let mut ligature_sets = HashMap::new();
    for (i, offset) in set_offsets.into_iter().enumerate() {
        let Some(&first_glyph) = coverage_by_index.get(&(i as u16)) else { continue };
        let set_table = whole.drop(offset);
        let mut sr = set_table;
        let lig_count = sr.consume_u16()?;
        let mut ligature_offsets = Vec::with_capacity(lig_count as usize);
        for _ in 0..lig_count {
            ligature_offsets.push(sr.consume_u16()? as usize);
        }

        let mut ligatures = Vec::with_capacity(ligature_offsets.len());
        for lig_offset in ligature_offsets {
            let mut lr = set_table.drop(lig_offset);
            let glyph = GlyphId(lr.consume_u16()?);
            let component_count = lr.consume_u16()?;
            let mut component_glyphs = Vec::with_capacity(component_count.saturating_sub(1) as usize);
            for _ in 1..component_count {
                component_glyphs.push(GlyphId(lr.consume_u16()?));
            }
            ligatures.push(Ligature { glyph, component_glyphs });
        }
        ligature_sets.insert(first_glyph, ligatures);
    }

    Ok(LigatureSubst { coverage, ligature_sets })
}

#[derive(Debug, Clone)]
pub enum Lookup {
    Single(Vec<SingleSubst>),
    Ligature(Vec<LigatureSubst>),
}

pub fn parse_lookup_subtable(lookup_type: u16, bytes: Reader<'_>) -> Result<Lookup> {
    match lookup_type {
        1 => Ok(Lookup::Single(vec![parse_single_subst(bytes)?])),
        4 => Ok(Lookup::Ligature(vec![parse_ligature_subst(bytes)?])),
        _ => Err(Error::parse(Location::default(), format!("unsupported/unimplemented GSUB lookup type {lookup_type}"))),
    }
}

/// Tries to match a ligature set against `glyphs[pos..]`, returning the
/// replacement glyph and how many input glyphs it consumed.
fn match_ligature_set(ligatures: &[Ligature], glyphs: &[GlyphId], pos: usize) -> Option<(GlyphId, usize)> {
    'outer: for lig in ligatures {
        let total_len = 1 + lig.component_glyphs.len();
        if pos + total_len > glyphs.len() {
            continue;
        }
        for (k, expect) in lig.component_glyphs.iter().enumerate() {
            if glyphs[pos + 1 + k] != *expect {
                continue 'outer;
            }
        }
        return Some((lig.glyph, total_len));
    }
    None
}

/// Applies every GSUB lookup over a glyph sequence in lookup order,
/// producing a lossless [`SubstitutionMapping`] per `spec.md` §3.1/§8's
/// "contractions reconstruct the original text" invariant. Single
/// substitution is a 1:1 replace; ligature substitution records every
/// consumed glyph's `Contraction::LigatureComponent` against the resulting
/// glyph, satisfying testable property §8 scenario 1 (`"fi"` → one glyph
/// whose mapping's contractions point back to `[f_gid, i_gid]`).
pub fn apply_gsub(lookups: &[Lookup], glyphs: &[GlyphId]) -> (Vec<GlyphId>, SubstitutionMapping) {
    let mut current = glyphs.to_vec();
    let mut mapping = SubstitutionMapping::identity(glyphs.len());

    for lookup in lookups {
        let mut output = Vec::with_capacity(current.len());
        let mut step_contractions = Vec::with_capacity(current.len());
        let mut i = 0;
        while i < current.len() {
            match lookup {
                Lookup::Single(tables) => {
                    let glyph = current[i];
                    let replacement = tables.iter().find_map(|t| t.substitutes.get(&glyph).copied());
                    match replacement {
                        Some(sub) => {
                            output.push(sub);
                            step_contractions.push(Contraction::Replaced(sub));
                        }
                        None => {
                            output.push(glyph);
                            step_contractions.push(Contraction::Unchanged);
                        }
                    }
                    i += 1;
                }
                Lookup::Ligature(tables) => {
                    let glyph = current[i];
                    let matched = tables.iter().find_map(|t| {
                        t.coverage.glyphs.get(&glyph)?;
                        let sets = t.ligature_sets.get(&glyph)?;
                        match_ligature_set(sets, &current, i)
                    });
                    match matched {
                        Some((replacement, consumed)) => {
                            output.push(replacement);
                            // Record the original input glyph ids of every
                            // consumed glyph (not just a positional index)
                            // so the mapping stays lossless: replaying this
                            // list reconstructs the pre-substitution glyphs
                            // by id, per `spec.md` §3.1/§8.
                            let constituents: Rc<[GlyphId]> = current[i..i + consumed].to_vec().into();
                            for _ in 0..consumed {
                                step_contractions.push(Contraction::LigatureComponent { ligature_glyph: replacement, constituents: constituents.clone() });
                            }
                            i += consumed;
                        }
                        None => {
                            output.push(glyph);
                            step_contractions.push(Contraction::Unchanged);
                            i += 1;
                        }
                    }
                }
            }
        }

        let step_mapping = SubstitutionMapping { contractions: step_contractions, extra_glyphs: Vec::new() };
        mapping = mapping.and_then(&step_mapping);
        current = output;
    }

    (current, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lig_subst(first: GlyphId, components: Vec<GlyphId>, result: GlyphId) -> Lookup {
        let mut coverage = Coverage::default();
        coverage.glyphs.insert(first, 0);
        let mut ligature_sets = HashMap::new();
        ligature_sets.insert(first, vec![Ligature { glyph: result, component_glyphs: components }]);
        Lookup::Ligature(vec![LigatureSubst { coverage, ligature_sets }])
    }

    #[test]
    fn fi_ligature_contracts_two_glyphs_into_one() {
        let f = GlyphId(10);
        let i = GlyphId(11);
        let fi = GlyphId(200);
        let lookups = vec![lig_subst(f, vec![i], fi)];

        let (out, mapping) = apply_gsub(&lookups, &[f, i]);
        assert_eq!(out, vec![fi]);
        let constituents: Rc<[GlyphId]> = vec![f, i].into();
        assert_eq!(
            mapping.contractions,
            vec![
                Contraction::LigatureComponent { ligature_glyph: fi, constituents: constituents.clone() },
                Contraction::LigatureComponent { ligature_glyph: fi, constituents },
            ]
        );
    }

    #[test]
    fn single_subst_format1_applies_delta() {
        let mut coverage = Coverage::default();
        coverage.glyphs.insert(GlyphId(5), 0);
        let mut substitutes = HashMap::new();
        substitutes.insert(GlyphId(5), GlyphId(6));
        let lookups = vec![Lookup::Single(vec![SingleSubst { coverage, substitutes }])];

        let (out, mapping) = apply_gsub(&lookups, &[GlyphId(5)]);
        assert_eq!(out, vec![GlyphId(6)]);
        assert_eq!(mapping.contractions, vec![Contraction::Replaced(GlyphId(6))]);
    }

    #[test]
    fn unmatched_glyph_passes_through_unchanged() {
        let lookups: Vec<Lookup> = vec![lig_subst(GlyphId(1), vec![GlyphId(2)], GlyphId(99))];
        let (out, mapping) = apply_gsub(&lookups, &[GlyphId(7)]);
        assert_eq!(out, vec![GlyphId(7)]);
        assert_eq!(mapping.contractions, vec![Contraction::Unchanged]);
    }
}
