//! `hmtx`: per-glyph horizontal advance widths (`spec.md` §3.1).
//!
//! The table stores `numberOfHMetrics` explicit `(advance_width,
//! lsb)` pairs followed by `num_glyphs - numberOfHMetrics` bare `lsb` i16s;
//! glyphs past `numberOfHMetrics` repeat the last explicit advance width.

use crate::errors::Result;
use crate::font::bytes::Reader;
use crate::font::scalar::GlyphId;

#[derive(Debug, Clone, Default)]
pub struct HmtxTable {
    advances: Vec<u16>,
}

pub fn parse_hmtx_table(bytes: &[u8], num_h_metrics: u16, num_glyphs: u16) -> Result<HmtxTable> {
    let mut r = Reader::new(bytes);
    let mut advances = Vec::with_capacity(num_glyphs as usize);
    for _ in 0..num_h_metrics {
        advances.push(r.consume_u16()?);
        let _lsb = r.consume_i16()?;
    }
    Ok(HmtxTable { advances })
}

impl HmtxTable {
    /// The glyph's advance width in font units. Glyphs beyond the last
    /// explicit metric entry reuse that entry's width, per the OpenType
    /// `hmtx` trailing-lsb-only encoding.
    pub fn advance_width(&self, glyph: GlyphId) -> u16 {
        let idx = glyph.0 as usize;
        if let Some(&w) = self.advances.get(idx) {
            w
        } else {
            self.advances.last().copied().unwrap_or(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyphs_past_last_metric_reuse_its_width() {
        // Two explicit metrics (adv=500,lsb=10) and (adv=600,lsb=20), num_glyphs=5.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&500u16.to_be_bytes());
        bytes.extend_from_slice(&10i16.to_be_bytes());
        bytes.extend_from_slice(&600u16.to_be_bytes());
        bytes.extend_from_slice(&20i16.to_be_bytes());

        let table = parse_hmtx_table(&bytes, 2, 5).unwrap();
        assert_eq!(table.advance_width(GlyphId(0)), 500);
        assert_eq!(table.advance_width(GlyphId(1)), 600);
        assert_eq!(table.advance_width(GlyphId(4)), 600);
    }
}
