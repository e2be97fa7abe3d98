//! Small newtypes shared across every table parser.

use std::ops::{Add, AddAssign};

/// A glyph index into a font's glyph table. Distinct from a Unicode
/// codepoint or a character class index; mixing these up is the single
/// easiest mistake to make when reading table-parsing code, so it's a
/// newtype rather than a bare `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlyphId(pub u16);

impl GlyphId {
    pub const NOTDEF: GlyphId = GlyphId(0);

    pub fn new(v: u16) -> Self {
        GlyphId(v)
    }
}

impl From<u16> for GlyphId {
    fn from(v: u16) -> Self {
        GlyphId(v)
    }
}

impl From<GlyphId> for u32 {
    fn from(g: GlyphId) -> Self {
        g.0 as u32
    }
}

/// A font design-unit scalar (kerning/positioning deltas are expressed in
/// these before being scaled to a point size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct FontScalar(pub i32);

impl FontScalar {
    pub fn new(v: i32) -> Self {
        FontScalar(v)
    }
}

impl From<i16> for FontScalar {
    fn from(v: i16) -> Self {
        FontScalar(v as i32)
    }
}

impl Add for FontScalar {
    type Output = FontScalar;
    fn add(self, rhs: FontScalar) -> FontScalar {
        FontScalar(self.0 + rhs.0)
    }
}

impl AddAssign for FontScalar {
    fn add_assign(&mut self, rhs: FontScalar) {
        self.0 += rhs.0;
    }
}
