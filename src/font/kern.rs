//! The legacy `kern` table: version 0 (classic, Windows-style) and version 1
//! (Apple AAT-style) subtable headers, both carrying format 0 (sorted pair
//! list) or format 2 (glyph-class matrix) subtables.

use std::collections::HashMap;

use crate::errors::Result;
use crate::font::adjustment::GlyphAdjustment;
use crate::font::bytes::Reader;
use crate::font::scalar::{FontScalar, GlyphId};
use log::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct KernSubTableCoverage {
    pub is_vertical: bool,
    pub is_cross_stream: bool,
    pub is_variation: bool,
    pub is_override: bool,
    pub is_minimum: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct KernPair {
    pub left: GlyphId,
    pub right: GlyphId,
    pub shift: FontScalar,
}

#[derive(Debug, Clone)]
pub struct KernSubTable0 {
    pub coverage: KernSubTableCoverage,
    pub pairs: Vec<KernPair>,
}

#[derive(Debug, Clone)]
pub struct KernSubTable2<'a> {
    pub coverage: KernSubTableCoverage,
    pub left_glyph_classes: HashMap<GlyphId, u16>,
    pub right_glyph_classes: HashMap<GlyphId, u16>,
    pub lookup_array: Reader<'a>,
}

#[derive(Debug, Clone, Default)]
pub struct KernTable<'a> {
    pub subtables_f0: Vec<KernSubTable0>,
    pub subtables_f2: Vec<KernSubTable2<'a>>,
}

fn parse_kern_f0(coverage: KernSubTableCoverage, mut buf: Reader<'_>) -> Result<KernSubTable0> {
    let num_pairs = buf.consume_u16()?;
    buf.remove_prefix(6); // binary-search hints, unused

    let mut pairs = Vec::with_capacity(num_pairs as usize);
    for _ in 0..num_pairs {
        let left = buf.consume_u16()?;
        let right = buf.consume_u16()?;
        let adjust = buf.consume_i16()?;
        pairs.push(KernPair { left: GlyphId(left), right: GlyphId(right), shift: FontScalar::from(adjust) });
    }

    Ok(KernSubTable0 { coverage, pairs })
}

fn parse_class_table(mut table: Reader<'_>) -> Result<HashMap<GlyphId, u16>> {
    let first_glyph = table.consume_u16()?;
    let num_glyphs = table.consume_u16()?;
    let mut map = HashMap::with_capacity(num_glyphs as usize);
    for i in 0..num_glyphs {
        map.insert(GlyphId(first_glyph.wrapping_add(i)), table.consume_u16()?);
    }
    Ok(map)
}

fn parse_kern_f2<'a>(coverage: KernSubTableCoverage, buf: Reader<'a>) -> Result<KernSubTable2<'a>> {
    let save = buf;
    let mut r = buf;
    let _bytes_per_row = r.consume_u16()?;
    let left_class_table_offset = r.consume_u16()? as usize;
    let right_class_table_offset = r.consume_u16()? as usize;
    let array_offset = r.consume_u16()? as usize;

    let lookup_array = save.drop(array_offset);
    let left_class_table = save.drop(left_class_table_offset);
    let right_class_table = save.drop(right_class_table_offset);

    Ok(KernSubTable2 {
        coverage,
        left_glyph_classes: parse_class_table(left_class_table)?,
        right_glyph_classes: parse_class_table(right_class_table)?,
        lookup_array,
    })
}

pub fn parse_kern_version_0(mut buf: Reader<'_>) -> Result<KernTable<'_>> {
    let mut kern_table = KernTable::default();
    let num_tables = buf.consume_u16()?;

    for _ in 0..num_tables {
        let ver = buf.consume_u16()?;
        let total_len = buf.consume_u16()?;
        let cov = buf.consume_u16()?;
        let format = (cov & 0xff00) >> 8;
        let subtable_len = total_len as usize - 3 * 2;

        if ver != 0 {
            warn!("otf/kern: unsupported kern subtable version {ver}");
            buf.remove_prefix(subtable_len);
            continue;
        }
        if format != 0 && format != 2 {
            warn!("otf/kern: unsupported kern subtable format {format}");
            buf.remove_prefix(subtable_len);
            continue;
        }

        let coverage = KernSubTableCoverage {
            is_vertical: cov & (1 << 0) == 0,
            is_cross_stream: cov & (1 << 2) != 0,
            is_variation: false,
            is_override: cov & (1 << 3) != 0,
            is_minimum: cov & (1 << 1) != 0,
        };

        let sub_buf = buf.take(subtable_len);
        if format == 0 {
            kern_table.subtables_f0.push(parse_kern_f0(coverage, sub_buf)?);
        } else {
            kern_table.subtables_f2.push(parse_kern_f2(coverage, sub_buf)?);
        }
        buf.remove_prefix(subtable_len);
    }

    Ok(kern_table)
}

pub fn parse_kern_version_1(mut buf: Reader<'_>) -> Result<KernTable<'_>> {
    let mut kern_table = KernTable::default();
    buf.remove_prefix(2); // low 16 bits of the version-1 fixed version field

    let num_tables = buf.consume_u32()?;
    for _ in 0..num_tables {
        let total_len = buf.consume_u32()?;
        let cov = buf.consume_u16()?;
        let format = (cov & 0xff00) >> 8;
        let _tuple_idx = buf.consume_u16()?;
        let subtable_len = total_len as usize - 3 * 2;

        if format > 4 {
            warn!("otf/kern: unsupported kern subtable format {format}");
            buf.remove_prefix(subtable_len);
            continue;
        }

        let coverage = KernSubTableCoverage {
            is_vertical: cov & 0x8000 != 0,
            is_cross_stream: cov & 0x4000 != 0,
            is_variation: cov & 0x2000 != 0,
            is_override: false,
            is_minimum: false,
        };

        let sub_buf = buf.take(subtable_len);
        if format == 0 {
            kern_table.subtables_f0.push(parse_kern_f0(coverage, sub_buf)?);
        } else {
            kern_table.subtables_f2.push(parse_kern_f2(coverage, sub_buf)?);
        }
        buf.remove_prefix(subtable_len);
    }

    Ok(kern_table)
}

fn add_adjustment(ret: &mut GlyphAdjustment, found: &mut bool, adj: FontScalar, coverage: &KernSubTableCoverage) {
    *found = true;

    if coverage.is_override {
        if coverage.is_cross_stream {
            ret.vert_advance = FontScalar(0);
        } else {
            ret.horz_advance = FontScalar(0);
        }
    }

    if coverage.is_cross_stream {
        ret.combine(&GlyphAdjustment { vert_advance: adj, ..Default::default() });
    } else {
        ret.combine(&GlyphAdjustment { horz_advance: adj, ..Default::default() });
    }

    if coverage.is_minimum {
        if coverage.is_cross_stream {
            ret.vert_advance = ret.vert_advance.max(adj);
        } else {
            ret.horz_advance = ret.horz_advance.max(adj);
        }
    }
}

fn lookup_subtables(table: &KernTable<'_>, left: GlyphId, right: GlyphId) -> Result<Option<GlyphAdjustment>> {
    let mut found = false;
    let mut ret = GlyphAdjustment::default();

    let search_key = ((left.0 as u32) << 16) | (right.0 as u32);
    for sub in &table.subtables_f0 {
        if sub.coverage.is_vertical {
            continue;
        }
        let mut low = 0usize;
        let mut high = sub.pairs.len();
        while low < high {
            let mid = (low + high) / 2;
            let p = &sub.pairs[mid];
            let tmp = ((p.left.0 as u32) << 16) | (p.right.0 as u32);
            if tmp == search_key {
                add_adjustment(&mut ret, &mut found, p.shift, &sub.coverage);
                break;
            } else if tmp < search_key {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
    }

    for sub in &table.subtables_f2 {
        let Some(&left_class) = sub.left_glyph_classes.get(&left) else { continue };
        let Some(&right_class) = sub.right_glyph_classes.get(&right) else { continue };
        let shift = FontScalar::from(sub.lookup_array.drop(left_class as usize + right_class as usize).peek_i16()?);
        add_adjustment(&mut ret, &mut found, shift, &sub.coverage);
    }

    Ok(if found { Some(ret) } else { None })
}

/// Kern tables only describe adjacent pairs, so the whole glyph sequence
/// reduces to one lookup per adjacent pair.
pub fn positioning_adjustments_for_glyph_sequence(table: &KernTable<'_>, glyphs: &[GlyphId]) -> Result<HashMap<usize, GlyphAdjustment>> {
    let mut adjustments = HashMap::new();
    if glyphs.len() < 2 {
        return Ok(adjustments);
    }
    for i in 0..glyphs.len() - 1 {
        if let Some(adj) = lookup_subtables(table, glyphs[i], glyphs[i + 1])? {
            adjustments.insert(i, adj);
        }
    }
    Ok(adjustments)
}

pub fn parse_kern_table(bytes: &[u8]) -> Result<KernTable<'_>> {
    let mut r = Reader::new(bytes);
    let version = r.consume_u16()?;
    if version == 0 {
        parse_kern_version_0(r)
    } else if version == 1 {
        parse_kern_version_1(r)
    } else {
        warn!("otf: invalid 'kern' version '{version}'");
        Ok(KernTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_zeroes_before_adding_then_minimum_takes_max() {
        let coverage = KernSubTableCoverage { is_override: true, is_minimum: true, ..Default::default() };
        let mut ret = GlyphAdjustment { horz_advance: FontScalar(50), ..Default::default() };
        let mut found = false;
        add_adjustment(&mut ret, &mut found, FontScalar(20), &coverage);
        // override zeroes horz_advance first, then adds 20, then minimum
        // takes max(20, 20) = 20.
        assert_eq!(ret.horz_advance, FontScalar(20));
    }
}
