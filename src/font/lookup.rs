//! AAT `Lookup` tables: six on-disk encodings of a partial function from
//! glyph id to some fixed-width value, used throughout `morx`/`kern`/`feat`
//! wherever a table needs a sparse or dense glyph→value map.
//!
//! Two access patterns are provided for each format: a bulk `parse_*`
//! that materializes a `HashMap` (used for glyph-class tables, which get
//! queried for nearly every glyph in a run so the map is worth building),
//! and a non-allocating `search_*` that walks the encoded structure directly
//! for a single glyph (used for subtables queried only occasionally).

use std::collections::HashMap;

use crate::errors::{Error, Location, Result};
use crate::font::bytes::Reader;
use crate::font::scalar::GlyphId;

/// Header shared by every binary-search-based format (2, 4, 6).
#[derive(Debug, Clone, Copy)]
struct BinSearchHeader {
    unit_size: u16,
    num_units: u16,
}

fn parse_binsearch_header(buf: &mut Reader<'_>) -> Result<BinSearchHeader> {
    let unit_size = buf.consume_u16()?;
    let num_units = buf.consume_u16()?;
    // search_range, entry_selector, range_shift: precomputed binary-search
    // hints we don't need, since we always reimplement the search.
    buf.remove_prefix(6);
    Ok(BinSearchHeader { unit_size, num_units })
}

fn read_lookup_value(buf: &mut Reader<'_>, size: u8) -> Result<u64> {
    buf.consume_uint(size)
}

fn peek_lookup_value(buf: &Reader<'_>, size: u8) -> Result<u64> {
    buf.peek_uint(size)
}

/// Bulk-parses any Lookup table format into a `HashMap<GlyphId, u64>`.
/// `num_font_glyphs` bounds format-0's dense array.
pub fn parse_lookup_table(buf: Reader<'_>, num_font_glyphs: usize) -> Result<HashMap<GlyphId, u64>> {
    let mut r = buf;
    let format = r.consume_u16()?;
    match format {
        0 => parse_f0(r, num_font_glyphs),
        2 => parse_f2(r),
        4 => parse_f4(buf, r),
        6 => parse_f6(r),
        8 => parse_f8(r),
        10 => parse_f10(r),
        _ => Err(Error::parse(Location::default(), format!("unsupported AAT lookup table format {format}"))),
    }
}

fn parse_f0(mut r: Reader<'_>, num_font_glyphs: usize) -> Result<HashMap<GlyphId, u64>> {
    let mut map = HashMap::with_capacity(num_font_glyphs);
    for g in 0..num_font_glyphs {
        map.insert(GlyphId(g as u16), r.consume_u16()? as u64);
    }
    Ok(map)
}

fn parse_f2(mut r: Reader<'_>) -> Result<HashMap<GlyphId, u64>> {
    let header = parse_binsearch_header(&mut r)?;
    let mut map = HashMap::new();
    for _ in 0..header.num_units {
        let last = r.consume_u16()?;
        let first = r.consume_u16()?;
        let value = r.consume_u16()? as u64;
        for g in first..=last {
            map.insert(GlyphId(g), value);
        }
    }
    Ok(map)
}

fn parse_f4(whole: Reader<'_>, mut r: Reader<'_>) -> Result<HashMap<GlyphId, u64>> {
    let header = parse_binsearch_header(&mut r)?;
    let mut map = HashMap::new();
    for _ in 0..header.num_units {
        let last = r.consume_u16()?;
        let first = r.consume_u16()?;
        // offset is relative to the start of the whole lookup table.
        let offset = r.consume_u16()? as usize;
        let mut values = whole.drop(offset);
        for g in first..=last {
            map.insert(GlyphId(g), values.consume_u16()? as u64);
        }
    }
    Ok(map)
}

fn parse_f6(mut r: Reader<'_>) -> Result<HashMap<GlyphId, u64>> {
    let header = parse_binsearch_header(&mut r)?;
    let mut map = HashMap::with_capacity(header.num_units as usize);
    for _ in 0..header.num_units {
        let glyph = r.consume_u16()?;
        let value = r.consume_u16()? as u64;
        map.insert(GlyphId(glyph), value);
    }
    Ok(map)
}

fn parse_f8(mut r: Reader<'_>) -> Result<HashMap<GlyphId, u64>> {
    let first_glyph = r.consume_u16()?;
    let glyph_count = r.consume_u16()?;
    let mut map = HashMap::with_capacity(glyph_count as usize);
    for i in 0..glyph_count {
        map.insert(GlyphId(first_glyph.wrapping_add(i)), r.consume_u16()? as u64);
    }
    Ok(map)
}

fn parse_f10(mut r: Reader<'_>) -> Result<HashMap<GlyphId, u64>> {
    let value_size = r.consume_u16()? as u8;
    let first_glyph = r.consume_u16()?;
    let glyph_count = r.consume_u16()?;
    let mut map = HashMap::with_capacity(glyph_count as usize);
    for i in 0..glyph_count {
        map.insert(GlyphId(first_glyph.wrapping_add(i)), read_lookup_value(&mut r, value_size)?);
    }
    Ok(map)
}

/// Non-allocating point search for a single glyph, dispatching on format.
pub fn search_lookup_table(buf: Reader<'_>, glyph: GlyphId) -> Result<Option<u64>> {
    let mut r = buf;
    let format = r.consume_u16()?;
    match format {
        0 => search_f0(r, glyph),
        2 => search_f2(r, glyph),
        4 => search_f4(buf, r, glyph),
        6 => search_f6(r, glyph),
        8 => search_f8(r, glyph),
        10 => search_f10(r, glyph),
        _ => Err(Error::parse(Location::default(), format!("unsupported AAT lookup table format {format}"))),
    }
}

fn search_f0(mut r: Reader<'_>, glyph: GlyphId) -> Result<Option<u64>> {
    r.remove_prefix(glyph.0 as usize * 2);
    Ok(Some(r.consume_u16()? as u64))
}

/// Binary search over descending `(last, first)` segments: `first <= glyph
/// <= last` selects the segment.
fn search_f2(mut r: Reader<'_>, glyph: GlyphId) -> Result<Option<u64>> {
    let header = parse_binsearch_header(&mut r)?;
    let base = r;
    let mut low = 0i64;
    let mut high = header.num_units as i64 - 1;
    while low <= high {
        let mid = (low + high) / 2;
        let mut unit = base.drop(mid as usize * header.unit_size as usize);
        let last = unit.consume_u16()?;
        let first = unit.consume_u16()?;
        if glyph.0 < first {
            high = mid - 1;
        } else if glyph.0 > last {
            low = mid + 1;
        } else {
            return Ok(Some(unit.consume_u16()? as u64));
        }
    }
    Ok(None)
}

fn search_f4(whole: Reader<'_>, mut r: Reader<'_>, glyph: GlyphId) -> Result<Option<u64>> {
    let header = parse_binsearch_header(&mut r)?;
    let base = r;
    let mut low = 0i64;
    let mut high = header.num_units as i64 - 1;
    while low <= high {
        let mid = (low + high) / 2;
        let mut unit = base.drop(mid as usize * header.unit_size as usize);
        let last = unit.consume_u16()?;
        let first = unit.consume_u16()?;
        let offset = unit.consume_u16()? as usize;
        if glyph.0 < first {
            high = mid - 1;
        } else if glyph.0 > last {
            low = mid + 1;
        } else {
            let mut values = whole.drop(offset);
            values.remove_prefix((glyph.0 - first) as usize * 2);
            return Ok(Some(values.consume_u16()? as u64));
        }
    }
    Ok(None)
}

fn search_f6(mut r: Reader<'_>, glyph: GlyphId) -> Result<Option<u64>> {
    let header = parse_binsearch_header(&mut r)?;
    let base = r;
    let mut low = 0i64;
    let mut high = header.num_units as i64 - 1;
    while low <= high {
        let mid = (low + high) / 2;
        let mut unit = base.drop(mid as usize * header.unit_size as usize);
        let g = unit.consume_u16()?;
        if glyph.0 < g {
            high = mid - 1;
        } else if glyph.0 > g {
            low = mid + 1;
        } else {
            return Ok(Some(unit.consume_u16()? as u64));
        }
    }
    Ok(None)
}

fn search_f8(mut r: Reader<'_>, glyph: GlyphId) -> Result<Option<u64>> {
    let first_glyph = r.consume_u16()?;
    let glyph_count = r.consume_u16()?;
    if glyph.0 < first_glyph || glyph.0 >= first_glyph.wrapping_add(glyph_count) {
        return Ok(None);
    }
    r.remove_prefix((glyph.0 - first_glyph) as usize * 2);
    Ok(Some(r.consume_u16()? as u64))
}

fn search_f10(mut r: Reader<'_>, glyph: GlyphId) -> Result<Option<u64>> {
    let value_size = r.consume_u16()? as u8;
    let first_glyph = r.consume_u16()?;
    let glyph_count = r.consume_u16()?;
    if glyph.0 < first_glyph || glyph.0 >= first_glyph.wrapping_add(glyph_count) {
        return Ok(None);
    }
    r.remove_prefix((glyph.0 - first_glyph) as usize * value_size as usize);
    Ok(Some(peek_lookup_value(&r, value_size)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be16(v: u16) -> [u8; 2] {
        v.to_be_bytes()
    }

    #[test]
    fn format6_bulk_and_search_agree() {
        let mut bytes = Vec::new();
        bytes.extend(be16(6)); // format
        bytes.extend(be16(6)); // unit size
        bytes.extend(be16(2)); // num units
        bytes.extend([0u8; 6]); // search hints
        bytes.extend(be16(10));
        bytes.extend(be16(100));
        bytes.extend(be16(20));
        bytes.extend(be16(200));

        let map = parse_lookup_table(Reader::new(&bytes), 0).unwrap();
        assert_eq!(map.get(&GlyphId(10)), Some(&100));
        assert_eq!(map.get(&GlyphId(20)), Some(&200));

        assert_eq!(search_lookup_table(Reader::new(&bytes), GlyphId(10)).unwrap(), Some(100));
        assert_eq!(search_lookup_table(Reader::new(&bytes), GlyphId(99)).unwrap(), None);
    }

    #[test]
    fn format2_expands_glyph_ranges() {
        let mut bytes = Vec::new();
        bytes.extend(be16(2));
        bytes.extend(be16(6));
        bytes.extend(be16(1));
        bytes.extend([0u8; 6]);
        bytes.extend(be16(12)); // last
        bytes.extend(be16(10)); // first
        bytes.extend(be16(7)); // value

        let map = parse_lookup_table(Reader::new(&bytes), 0).unwrap();
        assert_eq!(map.get(&GlyphId(10)), Some(&7));
        assert_eq!(map.get(&GlyphId(11)), Some(&7));
        assert_eq!(map.get(&GlyphId(12)), Some(&7));
        assert_eq!(map.get(&GlyphId(13)), None);
    }
}
