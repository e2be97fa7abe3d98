//! The OpenType/AAT font engine (`spec.md` §4.A): byte-level table parsing
//! and substitution/positioning lookups over glyph sequences.

pub mod aat;
pub mod adjustment;
pub mod bytes;
pub mod cmap;
pub mod font_file;
pub mod gpos;
pub mod gsub;
pub mod hmtx;
pub mod kern;
pub mod lookup;
pub mod mac_roman;
pub mod scalar;
pub mod search;
pub mod substitution;
pub mod table_directory;
pub mod tag;

pub use adjustment::GlyphAdjustment;
pub use font_file::FontFile;
pub use scalar::{FontScalar, GlyphId};
pub use substitution::{Contraction, SubstitutedGlyphString, SubstitutionMapping};
