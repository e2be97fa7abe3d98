//! `cmap`: Unicode codepoint → glyph id mapping. Only the two subtable
//! formats every modern font actually ships are implemented: format 4
//! (BMP, segment-delta) and format 12 (full Unicode, segmented coverage).

use std::collections::HashMap;

use crate::errors::{Error, Location, Result};
use crate::font::bytes::Reader;
use crate::font::scalar::GlyphId;

#[derive(Debug, Clone, Default)]
pub struct CmapTable {
    pub map: HashMap<u32, GlyphId>,
    /// The reverse direction (`spec.md` §3.1: "character map (codepoint ↔
    /// glyph id, both directions)"), needed so the PDF writer's
    /// `ActualText` can recover a Unicode codepoint for a glyph that never
    /// went through any GSUB/morx substitution. When several codepoints map
    /// to the same glyph (e.g. a font's duplicate-encoding slots), the
    /// lowest codepoint wins, so the reverse map is deterministic.
    pub reverse_map: HashMap<GlyphId, u32>,
}

impl CmapTable {
    pub fn lookup(&self, codepoint: char) -> Option<GlyphId> {
        self.map.get(&(codepoint as u32)).copied()
    }

    pub fn reverse_lookup(&self, glyph: GlyphId) -> Option<char> {
        self.reverse_map.get(&glyph).copied().and_then(char::from_u32)
    }
}

fn build_reverse_map(map: &HashMap<u32, GlyphId>) -> HashMap<GlyphId, u32> {
    let mut codepoints: Vec<u32> = map.keys().copied().collect();
    codepoints.sort_unstable();
    let mut reverse = HashMap::new();
    for cp in codepoints {
        reverse.entry(map[&cp]).or_insert(cp);
    }
    reverse
}

fn parse_format4(mut r: Reader<'_>) -> Result<HashMap<u32, GlyphId>> {
    let _length = r.consume_u16()?;
    let _language = r.consume_u16()?;
    let seg_count_x2 = r.consume_u16()?;
    let seg_count = seg_count_x2 / 2;
    r.remove_prefix(6); // search_range, entry_selector, range_shift

    let mut end_codes = Vec::with_capacity(seg_count as usize);
    for _ in 0..seg_count {
        end_codes.push(r.consume_u16()?);
    }
    r.remove_prefix(2); // reserved_pad
    let mut start_codes = Vec::with_capacity(seg_count as usize);
    for _ in 0..seg_count {
        start_codes.push(r.consume_u16()?);
    }
    let mut id_deltas = Vec::with_capacity(seg_count as usize);
    for _ in 0..seg_count {
        id_deltas.push(r.consume_i16()?);
    }
    let id_range_offset_pos = r.position();
    let mut id_range_offsets = Vec::with_capacity(seg_count as usize);
    for _ in 0..seg_count {
        id_range_offsets.push(r.consume_u16()?);
    }

    let mut map = HashMap::new();
    for seg in 0..seg_count as usize {
        let start = start_codes[seg];
        let end = end_codes[seg];
        if start == 0xFFFF && end == 0xFFFF {
            continue;
        }
        for c in start..=end {
            let glyph = if id_range_offsets[seg] == 0 {
                (c as i32 + id_deltas[seg] as i32) as u16
            } else {
                let offset_into_array =
                    id_range_offset_pos + seg * 2 + id_range_offsets[seg] as usize + 2 * (c - start) as usize;
                let g = r.whole();
                let gid = crate::font::bytes::peek_u16_at(g, offset_into_array)?;
                if gid == 0 {
                    0
                } else {
                    (gid as i32 + id_deltas[seg] as i32) as u16
                }
            };
            if glyph != 0 {
                map.insert(c as u32, GlyphId(glyph));
            }
        }
    }

    Ok(map)
}

fn parse_format12(mut r: Reader<'_>) -> Result<HashMap<u32, GlyphId>> {
    r.remove_prefix(2); // reserved
    let _length = r.consume_u32()?;
    let _language = r.consume_u32()?;
    let num_groups = r.consume_u32()?;

    let mut map = HashMap::new();
    for _ in 0..num_groups {
        let start_char = r.consume_u32()?;
        let end_char = r.consume_u32()?;
        let start_glyph = r.consume_u32()?;
        for (i, c) in (start_char..=end_char).enumerate() {
            map.insert(c, GlyphId((start_glyph + i as u32) as u16));
        }
    }
    Ok(map)
}

pub fn parse_cmap_table(bytes: &[u8]) -> Result<CmapTable> {
    let mut r = Reader::new(bytes);
    let table_start = r;
    let _version = r.consume_u16()?;
    let num_tables = r.consume_u16()?;

    fn rank(platform_id: u16, encoding_id: u16) -> u8 {
        match (platform_id, encoding_id) {
            (3, 10) | (0, 4) | (0, 6) => 3, // full unicode
            (3, 1) | (0, 3) => 2,           // BMP unicode
            (0, _) => 1,
            _ => 0,
        }
    }

    let mut best: Option<(u8, usize)> = None; // (rank, offset)
    for _ in 0..num_tables {
        let platform_id = r.consume_u16()?;
        let encoding_id = r.consume_u16()?;
        let offset = r.consume_u32()? as usize;

        let rank = rank(platform_id, encoding_id);
        let better = match best {
            Some((best_rank, _)) => rank > best_rank,
            None => true,
        };
        if better {
            best = Some((rank, offset));
        }
    }

    let Some((_, offset)) = best else {
        return Err(Error::parse(Location::default(), "cmap table has no usable subtables"));
    };

    let sub = table_start.drop(offset);
    let format = sub.peek_u16()?;
    let body = sub.drop(2); // skip the format field itself
    let map = match format {
        4 => parse_format4(body)?,
        12 => parse_format12(body)?,
        _ => return Err(Error::parse(Location::default(), format!("unsupported cmap subtable format {format}"))),
    };

    let reverse_map = build_reverse_map(&map);
    Ok(CmapTable { map, reverse_map })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_lookup_recovers_the_codepoint() {
        let mut map = HashMap::new();
        map.insert('f' as u32, GlyphId(10));
        map.insert('i' as u32, GlyphId(11));
        let table = CmapTable { reverse_map: build_reverse_map(&map), map };

        assert_eq!(table.reverse_lookup(GlyphId(10)), Some('f'));
        assert_eq!(table.reverse_lookup(GlyphId(11)), Some('i'));
        assert_eq!(table.reverse_lookup(GlyphId(99)), None);
    }

    #[test]
    fn reverse_lookup_prefers_the_lowest_codepoint_on_collision() {
        let mut map = HashMap::new();
        map.insert(0x41, GlyphId(5)); // 'A'
        map.insert(0xFF21, GlyphId(5)); // fullwidth 'A', same glyph
        let table = CmapTable { reverse_map: build_reverse_map(&map), map };

        assert_eq!(table.reverse_lookup(GlyphId(5)), Some('A'));
    }
}
