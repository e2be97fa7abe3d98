//! Positioning adjustments produced by `GPOS` and `kern`.

use std::ops::AddAssign;

use super::scalar::FontScalar;

/// The four deltas a positioning lookup can apply to a single glyph: two
/// placement offsets and two advance-width deltas. GPOS value records and
/// kern pairs both ultimately produce one of these, and multiple lookups
/// targeting the same glyph combine by plain field-wise addition — order
/// never matters, which is exercised as a commutativity property in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlyphAdjustment {
    pub horz_placement: FontScalar,
    pub vert_placement: FontScalar,
    pub horz_advance: FontScalar,
    pub vert_advance: FontScalar,
}

impl GlyphAdjustment {
    pub fn combine(&mut self, other: &GlyphAdjustment) {
        self.horz_placement += other.horz_placement;
        self.vert_placement += other.vert_placement;
        self.horz_advance += other.horz_advance;
        self.vert_advance += other.vert_advance;
    }
}

impl AddAssign<&GlyphAdjustment> for GlyphAdjustment {
    fn add_assign(&mut self, rhs: &GlyphAdjustment) {
        self.combine(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combination_is_commutative() {
        let a = GlyphAdjustment { horz_advance: FontScalar(10), vert_placement: FontScalar(-3), ..Default::default() };
        let b = GlyphAdjustment { horz_advance: FontScalar(5), horz_placement: FontScalar(2), ..Default::default() };

        let mut ab = a;
        ab.combine(&b);
        let mut ba = b;
        ba.combine(&a);

        assert_eq!(ab, ba);
    }
}
