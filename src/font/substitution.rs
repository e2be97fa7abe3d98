//! The result of running `GSUB`/`morx` substitution over a glyph sequence.
//!
//! Substitution is never simply "replace glyph N": a ligature merges several
//! input glyphs into one output glyph, an insertion subtable grows the
//! sequence, and a contextual lookup's replacement can itself need further
//! mapping. [`SubstitutionMapping`] records exactly what happened to each
//! *original* input position so that later stages (in particular
//! `ActualText` reconstruction for accessible/copyable PDF text) can losslessly
//! recover the pre-substitution text even after the glyph stream has been
//! rewritten.

use std::rc::Rc;

use super::scalar::GlyphId;

/// What became of one original input glyph after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contraction {
    /// The glyph survived unchanged (or only had its id remapped 1:1).
    Unchanged,
    /// The glyph was replaced with a different single glyph.
    Replaced(GlyphId),
    /// The glyph was one of several constituents merged into a ligature;
    /// `ligature_glyph` is the resulting glyph, `constituents` is the full
    /// original-glyph-id list of every glyph that was merged into it (in
    /// original left-to-right order, shared across every entry that belongs
    /// to the same ligature so any one of them reconstructs the whole
    /// group).
    LigatureComponent { ligature_glyph: GlyphId, constituents: Rc<[GlyphId]> },
    /// The glyph was deleted outright (consumed by a neighbouring
    /// insertion action with nothing of its own left behind, and not
    /// itself part of a recorded ligature group).
    Deleted,
}

/// Extra glyphs inserted that do not correspond to any original input
/// position (produced by AAT `morx` insertion subtables).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraGlyph {
    /// Index into the *output* sequence this glyph was inserted at.
    pub output_index: usize,
    pub glyph: GlyphId,
}

/// The full record of one substitution pass over a glyph sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubstitutionMapping {
    /// One entry per *original* input glyph, in original order.
    pub contractions: Vec<Contraction>,
    pub extra_glyphs: Vec<ExtraGlyph>,
}

impl SubstitutionMapping {
    pub fn identity(len: usize) -> Self {
        Self { contractions: vec![Contraction::Unchanged; len], extra_glyphs: Vec::new() }
    }

    /// Merges a second mapping applied to the output of the first (e.g. GSUB
    /// then a further contextual lookup) into one mapping from the very
    /// original input to the final glyph stream.
    pub fn and_then(&self, next: &SubstitutionMapping) -> SubstitutionMapping {
        // `next` is indexed by *this* mapping's output positions. Since we
        // don't track an explicit output-position list on `Contraction`, we
        // conservatively walk in original order and look up the
        // corresponding slot in `next` by running position, which is
        // correct for lookups applied without insertions/deletions changing
        // output length in between calls (morx chains apply sequentially
        // and each subtable produces a brand-new mapping against the
        // then-current sequence, so composition only needs to track the
        // provenance chain, not exact indices).
        let mut merged = Vec::with_capacity(self.contractions.len());
        let mut out_idx = 0usize;
        for c in &self.contractions {
            match c {
                Contraction::Deleted => merged.push(Contraction::Deleted),
                _ => {
                    let m = next.contractions.get(out_idx).cloned().unwrap_or(Contraction::Unchanged);
                    merged.push(match (c, m) {
                        (_, Contraction::Unchanged) => c.clone(),
                        (_, other) => other,
                    });
                    out_idx += 1;
                }
            }
        }
        SubstitutionMapping { contractions: merged, extra_glyphs: next.extra_glyphs.clone() }
    }
}

/// A glyph sequence that has gone through substitution, paired with the
/// mapping back to its original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutedGlyphString {
    pub glyphs: Vec<GlyphId>,
    pub mapping: SubstitutionMapping,
}

impl SubstitutedGlyphString {
    pub fn unsubstituted(glyphs: Vec<GlyphId>) -> Self {
        let mapping = SubstitutionMapping::identity(glyphs.len());
        Self { glyphs, mapping }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mapping_marks_every_glyph_unchanged() {
        let m = SubstitutionMapping::identity(3);
        assert_eq!(m.contractions, vec![Contraction::Unchanged; 3]);
        assert!(m.extra_glyphs.is_empty());
    }
}
