//! `FontFile`: owns a font's raw byte image plus lazily-parsed table views.
//!
//! Per `spec.md` §4.A.2, only the table directory is parsed eagerly — every
//! other table is parsed on first use and the parsed form borrows from the
//! byte image it lives alongside (hence `FontFile` owning a boxed byte
//! buffer that its cached tables hold references into via `self_cell`-style
//! manual unsafe would normally be needed; here we avoid that by re-parsing
//! tables on demand rather than caching borrowed results across calls,
//! trading a little redundant parsing for safe, ordinary borrowing).

use std::collections::HashMap;

use crate::errors::{Error, Location, Result};
use crate::font::aat::morx::{self, MorxTable};
use crate::font::bytes::Reader;
use crate::font::cmap::{self, CmapTable};
use crate::font::gpos::{self, Lookup};
use crate::font::gsub;
use crate::font::hmtx::{self, HmtxTable};
use crate::font::kern::{self, KernTable};
use crate::font::scalar::GlyphId;
use crate::font::substitution::SubstitutionMapping;
use crate::font::table_directory::{self, TableDirectory};
use crate::font::tag;

#[derive(Debug, Clone, Default)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
    pub x_height: i16,
    pub cap_height: i16,
    pub italic_angle: f64,
    pub num_glyphs: u16,
    pub num_h_metrics: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineKind {
    TrueType,
    Cff,
}

pub struct FontFile {
    bytes: Vec<u8>,
    pub directory: TableDirectory,
    pub metrics: FontMetrics,
    pub outline_kind: OutlineKind,
    pub family_name: String,
    pub subfamily_name: String,
    pub postscript_name: String,
    pub cmap: CmapTable,
    pub hmtx: HmtxTable,
}

fn parse_head_metrics(bytes: &[u8], m: &mut FontMetrics) -> Result<()> {
    let mut r = Reader::new(bytes);
    r.remove_prefix(18);
    m.units_per_em = r.consume_u16()?;
    Ok(())
}

fn parse_hhea_metrics(bytes: &[u8], m: &mut FontMetrics) -> Result<()> {
    let mut r = Reader::new(bytes);
    r.remove_prefix(4);
    m.ascent = r.consume_i16()?;
    m.descent = r.consume_i16()?;
    m.line_gap = r.consume_i16()?;
    // advanceWidthMax, minLeftSideBearing, minRightSideBearing, xMaxExtent,
    // caretSlopeRise/Run, caretOffset, 4 reserved i16, metricDataFormat.
    r.remove_prefix(2 + 2 + 2 + 2 + 2 + 2 + 2 + 4 * 2 + 2);
    m.num_h_metrics = r.consume_u16()?;
    Ok(())
}

fn parse_maxp_num_glyphs(bytes: &[u8]) -> Result<u16> {
    let mut r = Reader::new(bytes);
    r.remove_prefix(4);
    r.consume_u16()
}

fn parse_os2_metrics(bytes: &[u8], m: &mut FontMetrics) -> Result<()> {
    let mut r = Reader::new(bytes);
    let version = r.consume_u16()?;
    r.remove_prefix(2); // xAvgCharWidth
    r.remove_prefix(2); // usWeightClass
    r.remove_prefix(2); // usWidthClass
    r.remove_prefix(2); // fsType
    r.remove_prefix(10 * 2); // subscript/superscript x/y size/offset pairs (5 x i16)
    r.remove_prefix(2); // yStrikeoutSize
    r.remove_prefix(2); // yStrikeoutPosition
    r.remove_prefix(2); // sFamilyClass
    r.remove_prefix(10); // panose
    r.remove_prefix(4 * 4); // unicode range 1-4
    r.remove_prefix(4); // ach vend id
    r.remove_prefix(2); // fsSelection
    r.remove_prefix(2); // usFirstCharIndex
    r.remove_prefix(2); // usLastCharIndex
    m.ascent = r.consume_i16()?; // sTypoAscender (preferred over hhea when present)
    m.descent = r.consume_i16()?;
    m.line_gap = r.consume_i16()?;
    r.remove_prefix(2 + 2); // usWinAscent/Descent
    if version >= 2 {
        r.remove_prefix(4 * 2); // ulCodePageRange 1-2
        m.x_height = r.consume_i16()?;
        m.cap_height = r.consume_i16()?;
    }
    Ok(())
}

fn parse_post_italic_angle(bytes: &[u8]) -> Result<f64> {
    let mut r = Reader::new(bytes);
    r.remove_prefix(4); // version
    let whole = r.consume_i16()? as f64;
    let frac = r.consume_u16()? as f64 / 65536.0;
    Ok(whole + frac)
}

fn read_name_record_ascii(bytes: &[u8], directory: &TableDirectory) -> Result<HashMap<u16, String>> {
    let Some(record) = directory.get(tag::NAME) else { return Ok(HashMap::new()) };
    let table_bytes = &bytes[record.offset as usize..(record.offset + record.length) as usize];
    let mut r = Reader::new(table_bytes);
    let _format = r.consume_u16()?;
    let count = r.consume_u16()?;
    let string_offset = r.consume_u16()? as usize;

    let mut names = HashMap::new();
    for _ in 0..count {
        let platform_id = r.consume_u16()?;
        let encoding_id = r.consume_u16()?;
        let _language_id = r.consume_u16()?;
        let name_id = r.consume_u16()?;
        let length = r.consume_u16()? as usize;
        let offset = r.consume_u16()? as usize;

        let data = &table_bytes[string_offset + offset..string_offset + offset + length];
        let decoded = match (platform_id, encoding_id) {
            (3, _) | (0, _) => {
                // UTF-16BE
                let units: Vec<u16> = data.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
                String::from_utf16_lossy(&units)
            }
            (1, 0) => crate::font::mac_roman::decode(data),
            _ => continue,
        };
        names.entry(name_id).or_insert(decoded);
    }
    Ok(names)
}

impl FontFile {
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let directory = table_directory::parse_table_directory(&bytes)?;

        let mut metrics = FontMetrics::default();
        if let Some(r) = directory.get(tag::HEAD) {
            parse_head_metrics(&bytes[r.offset as usize..], &mut metrics)?;
        }
        if let Some(r) = directory.get(tag::HHEA) {
            parse_hhea_metrics(&bytes[r.offset as usize..], &mut metrics)?;
        }
        if let Some(r) = directory.get(tag::MAXP) {
            metrics.num_glyphs = parse_maxp_num_glyphs(&bytes[r.offset as usize..])?;
        }
        if let Some(r) = directory.get(tag::OS2) {
            parse_os2_metrics(&bytes[r.offset as usize..(r.offset + r.length) as usize], &mut metrics)?;
        }

        let italic_angle = directory
            .get(crate::font::tag::Tag::from_str("post"))
            .map(|r| parse_post_italic_angle(&bytes[r.offset as usize..]))
            .transpose()?
            .unwrap_or(0.0);
        metrics.italic_angle = italic_angle;

        let outline_kind = if directory.get(crate::font::tag::Tag::from_str("CFF ")).is_some() {
            OutlineKind::Cff
        } else {
            OutlineKind::TrueType
        };

        let names = read_name_record_ascii(&bytes, &directory)?;
        let family_name = names.get(&1).cloned().unwrap_or_default();
        let subfamily_name = names.get(&2).cloned().unwrap_or_default();
        let postscript_name = names.get(&6).cloned().unwrap_or_default();

        let cmap = if let Some(r) = directory.get(tag::CMAP) {
            cmap::parse_cmap_table(&bytes[r.offset as usize..(r.offset + r.length) as usize])?
        } else {
            CmapTable::default()
        };

        let hmtx_table = if let Some(r) = directory.get(tag::HMTX) {
            hmtx::parse_hmtx_table(
                &bytes[r.offset as usize..(r.offset + r.length) as usize],
                metrics.num_h_metrics,
                metrics.num_glyphs,
            )?
        } else {
            HmtxTable::default()
        };

        Ok(FontFile {
            bytes,
            directory,
            metrics,
            outline_kind,
            family_name,
            subfamily_name,
            postscript_name,
            cmap,
            hmtx: hmtx_table,
        })
    }

    fn table_bytes(&self, t: crate::font::tag::Tag) -> Option<&[u8]> {
        let r = self.directory.get(t)?;
        Some(&self.bytes[r.offset as usize..(r.offset + r.length) as usize])
    }

    pub fn morx_table(&self) -> Result<Option<MorxTable<'_>>> {
        match self.table_bytes(tag::MORX) {
            Some(bytes) => Ok(Some(morx::parse_morx_table(bytes, self.metrics.num_glyphs as usize)?)),
            None => Ok(None),
        }
    }

    pub fn kern_table(&self) -> Result<Option<KernTable<'_>>> {
        match self.table_bytes(tag::KERN) {
            Some(bytes) => Ok(Some(kern::parse_kern_table(bytes)?)),
            None => Ok(None),
        }
    }

    /// Parses every Single/Pair lookup out of `GPOS`'s lookup list. Script/
    /// feature selection (choosing *which* lookups apply) is left to the
    /// caller per `spec.md`'s scripting-surface scope; this returns them in
    /// table order.
    pub fn gpos_lookups(&self) -> Result<Vec<Lookup>> {
        let Some(bytes) = self.table_bytes(tag::GPOS) else { return Ok(Vec::new()) };
        let whole = Reader::new(bytes);
        let mut r = whole;
        let _major = r.consume_u16()?;
        let _minor = r.consume_u16()?;
        let _script_list_offset = r.consume_u16()?;
        let _feature_list_offset = r.consume_u16()?;
        let lookup_list_offset = r.consume_u16()? as usize;

        let lookup_list = whole.drop(lookup_list_offset);
        let mut lr = lookup_list;
        let lookup_count = lr.consume_u16()?;
        let mut offsets = Vec::with_capacity(lookup_count as usize);
        for _ in 0..lookup_count {
            offsets.push(lr.consume_u16()? as usize);
        }

        let mut lookups = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let lookup_table = lookup_list.drop(offset);
            let mut ltr = lookup_table;
            let lookup_type = ltr.consume_u16()?;
            let _lookup_flag = ltr.consume_u16()?;
            let subtable_count = ltr.consume_u16()?;
            for _ in 0..subtable_count {
                let sub_offset = ltr.consume_u16()? as usize;
                match gpos::parse_lookup_subtable(lookup_type, lookup_table.drop(sub_offset)) {
                    Ok(l) => lookups.push(l),
                    Err(Error::Parse { .. }) => continue, // unsupported lookup type, skip
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(lookups)
    }

    /// Parses every Single/Ligature lookup out of `GSUB`'s lookup list, in
    /// the same table-order/error-tolerant fashion as [`Self::gpos_lookups`].
    pub fn gsub_lookups(&self) -> Result<Vec<gsub::Lookup>> {
        let Some(bytes) = self.table_bytes(tag::GSUB) else { return Ok(Vec::new()) };
        let whole = Reader::new(bytes);
        let mut r = whole;
        let _major = r.consume_u16()?;
        let _minor = r.consume_u16()?;
        let _script_list_offset = r.consume_u16()?;
        let _feature_list_offset = r.consume_u16()?;
        let lookup_list_offset = r.consume_u16()? as usize;

        let lookup_list = whole.drop(lookup_list_offset);
        let mut lr = lookup_list;
        let lookup_count = lr.consume_u16()?;
        let mut offsets = Vec::with_capacity(lookup_count as usize);
        for _ in 0..lookup_count {
            offsets.push(lr.consume_u16()? as usize);
        }

        let mut lookups = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let lookup_table = lookup_list.drop(offset);
            let mut ltr = lookup_table;
            let lookup_type = ltr.consume_u16()?;
            let _lookup_flag = ltr.consume_u16()?;
            let subtable_count = ltr.consume_u16()?;
            for _ in 0..subtable_count {
                let sub_offset = ltr.consume_u16()? as usize;
                match gsub::parse_lookup_subtable(lookup_type, lookup_table.drop(sub_offset)) {
                    Ok(l) => lookups.push(l),
                    Err(Error::Parse { .. }) => continue, // unsupported lookup type, skip
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(lookups)
    }

    /// Runs the substitution pipeline over a glyph sequence: `GSUB` (for
    /// OpenType-flavoured fonts) followed by `morx` (for AAT-flavoured
    /// fonts), matching `spec.md` §5's "GSUB always runs before GPOS"
    /// ordering extended to the AAT substitution table that plays the same
    /// structural role. The two mappings compose via
    /// [`SubstitutionMapping::and_then`] so the final mapping still
    /// reconstructs the pre-substitution text losslessly (§8).
    pub fn substitute(&self, glyphs: &[GlyphId]) -> Result<(Vec<GlyphId>, SubstitutionMapping)> {
        let gsub_lookups = self.gsub_lookups()?;
        let (after_gsub, gsub_mapping) = if gsub_lookups.is_empty() {
            (glyphs.to_vec(), SubstitutionMapping::identity(glyphs.len()))
        } else {
            gsub::apply_gsub(&gsub_lookups, glyphs)
        };

        match self.morx_table()? {
            Some(table) => {
                let (after_morx, morx_mapping) = morx::perform_substitutions(&table, &after_gsub)?;
                Ok((after_morx, gsub_mapping.and_then(&morx_mapping)))
            }
            None => Ok((after_gsub, gsub_mapping)),
        }
    }

    /// Maps a Unicode string to glyphs via `cmap`, missing codepoints
    /// falling back to glyph 0 (`.notdef`), then measures the shaped run's
    /// width and scales it from font design units to millimetres at the
    /// given point size, per `spec.md` §4.A/§4.D.2's "word width depends on
    /// the style in effect" relationship.
    pub fn text_width_mm(&self, text: &str, font_size_pt: f64) -> Result<f64> {
        if text.is_empty() || self.metrics.units_per_em == 0 {
            return Ok(0.0);
        }
        let glyphs: Vec<GlyphId> = text.chars().map(|c| self.cmap.lookup(c).unwrap_or(GlyphId::NOTDEF)).collect();
        let width_units = self.shaped_run_width(&glyphs)?;
        let scale = font_size_pt / self.metrics.units_per_em as f64;
        Ok(width_units as f64 * scale * 25.4 / 72.0)
    }

    /// Advance width of one glyph, in font design units.
    pub fn glyph_advance_width(&self, glyph: GlyphId) -> u16 {
        self.hmtx.advance_width(glyph)
    }

    /// The width, in font design units, of a glyph run after GSUB and GPOS
    /// (including `kern`) have both run — `hmtx` advances plus every
    /// `horz_advance` adjustment, summed in glyph order.
    pub fn shaped_run_width(&self, glyphs: &[GlyphId]) -> Result<i64> {
        let (substituted, _mapping) = self.substitute(glyphs)?;
        let adjustments = self.position(&substituted)?;
        let mut total: i64 = 0;
        for (i, g) in substituted.iter().enumerate() {
            total += self.glyph_advance_width(*g) as i64;
            if let Some(adj) = adjustments.get(&i) {
                total += adj.horz_advance.0 as i64;
            }
        }
        Ok(total)
    }

    /// Runs the positioning pipeline: `GSUB` (substitution, above) always
    /// precedes `GPOS` for a glyph run, so callers substitute first and
    /// position the *substituted* sequence; `kern` adjustments are combined
    /// additively with whatever `GPOS` produced.
    pub fn position(&self, glyphs: &[GlyphId]) -> Result<HashMap<usize, crate::font::adjustment::GlyphAdjustment>> {
        let mut adjustments = gpos::position_glyph_sequence(&self.gpos_lookups()?, glyphs);
        if let Some(kern_table) = self.kern_table()? {
            for (i, adj) in kern::positioning_adjustments_for_glyph_sequence(&kern_table, glyphs)? {
                adjustments.entry(i).or_default().combine(&adj);
            }
        }
        Ok(adjustments)
    }
}

impl std::fmt::Debug for FontFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFile")
            .field("family_name", &self.family_name)
            .field("subfamily_name", &self.subfamily_name)
            .field("metrics", &self.metrics)
            .finish()
    }
}
