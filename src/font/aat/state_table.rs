//! The AAT state machine: `StateTable`/`ExtendedStateTable`, shared by every
//! `morx` subtable kind plus the (kext-style) contextual glyph substitution
//! used by `feat`/`morx` contextual subtables.
//!
//! A state table walks a glyph sequence left-to-right or right-to-left
//! (direction is decided by the subtable's "descending order" flag), mapping
//! each glyph to a *class*, and each `(state, class)` pair to an *entry* that
//! supplies the next state plus subtable-specific action data. The
//! `DONT_ADVANCE` flag on an entry means "re-evaluate this same glyph in the
//! new state" rather than moving the cursor — used heavily by contextual and
//! ligature subtables to peek ahead before committing to an action.

use std::collections::HashMap;

use crate::errors::Result;
use crate::font::bytes::Reader;
use crate::font::lookup::parse_lookup_table;
use crate::font::scalar::GlyphId;

pub const CLASS_END_OF_TEXT: u16 = 0;
pub const CLASS_OUT_OF_BOUNDS: u16 = 1;
pub const CLASS_DELETED_GLYPH: u16 = 2;
pub const CLASS_END_OF_LINE: u16 = 3;
pub const FIRST_USER_CLASS: u16 = 4;

/// Entry flag meaning "process this same glyph again in the new state
/// instead of advancing the cursor".
pub const DONT_ADVANCE: u16 = 0x4000;

/// A parsed AAT state table (classic 16-bit or "extended"/stx 32-bit).
///
/// The entry and state arrays are kept as raw byte spans rather than parsed
/// eagerly: each subtable kind (rearrangement/contextual/ligature/
/// non-contextual/insertion) interprets the entry payload differently, so
/// parsing happens lazily at `entry_at`/`next_state_for`.
#[derive(Debug, Clone)]
pub struct StateTable<'a> {
    pub num_classes: u16,
    pub glyph_classes: HashMap<GlyphId, u16>,
    pub state_array: Reader<'a>,
    pub entry_array: Reader<'a>,
    /// Bytes per row of the state array: `num_classes * (2 or 1)`.
    pub state_row_size: usize,
    pub is_extended: bool,
}

impl<'a> StateTable<'a> {
    pub fn class_for_glyph(&self, glyph: GlyphId) -> u16 {
        *self.glyph_classes.get(&glyph).unwrap_or(&CLASS_OUT_OF_BOUNDS)
    }

    /// Looks up the entry index for `(state, class)` from the state array.
    pub fn entry_index(&self, state: u16, class: u16) -> Result<u16> {
        let row_offset = state as usize * self.state_row_size;
        let mut r = self.state_array.drop(row_offset);
        if self.is_extended {
            r.remove_prefix(class as usize * 2);
            r.consume_u16()
        } else {
            r.remove_prefix(class as usize);
            Ok(r.consume_u8()? as u16)
        }
    }
}

fn parse_class_subtable_stx<'a>(buf: Reader<'a>, num_font_glyphs: usize) -> Result<HashMap<GlyphId, u16>> {
    let lookup = parse_lookup_table(buf, num_font_glyphs)?;
    Ok(lookup.into_iter().map(|(g, v)| (g, v as u16)).collect())
}

fn parse_class_subtable_classic(mut buf: Reader<'_>) -> Result<HashMap<GlyphId, u16>> {
    let first_glyph = buf.consume_u16()?;
    let num_glyphs = buf.consume_u16()?;
    let mut map = HashMap::with_capacity(num_glyphs as usize);
    for i in 0..num_glyphs {
        map.insert(GlyphId(first_glyph.wrapping_add(i)), buf.consume_u8()? as u16);
    }
    Ok(map)
}

fn parse_state_table_impl<'a>(buf: &mut Reader<'a>, is_extended: bool, num_font_glyphs: usize) -> Result<StateTable<'a>> {
    let table_start = *buf;

    let num_classes;
    let class_table;
    let state_array;
    let entry_array;

    if is_extended {
        num_classes = buf.consume_u32()? as u16;
        class_table = table_start.drop(buf.consume_u32()? as usize);
        state_array = table_start.drop(buf.consume_u32()? as usize);
        entry_array = table_start.drop(buf.consume_u32()? as usize);
    } else {
        num_classes = buf.consume_u16()?;
        class_table = table_start.drop(buf.consume_u16()? as usize);
        state_array = table_start.drop(buf.consume_u16()? as usize);
        entry_array = table_start.drop(buf.consume_u16()? as usize);
    }

    let glyph_classes = if is_extended {
        parse_class_subtable_stx(class_table, num_font_glyphs)?
    } else {
        parse_class_subtable_classic(class_table)?
    };

    let state_row_size = (if is_extended { 2 } else { 1 }) * num_classes as usize;

    Ok(StateTable {
        num_classes,
        glyph_classes,
        state_array,
        entry_array,
        state_row_size,
        is_extended,
    })
}

pub fn parse_state_table<'a>(buf: &mut Reader<'a>, num_font_glyphs: usize) -> Result<StateTable<'a>> {
    parse_state_table_impl(buf, false, num_font_glyphs)
}

pub fn parse_extended_state_table<'a>(buf: &mut Reader<'a>, num_font_glyphs: usize) -> Result<StateTable<'a>> {
    parse_state_table_impl(buf, true, num_font_glyphs)
}

/// Direction to walk the glyph sequence: forward, or backward ("descending
/// order" subtables, used for e.g. certain Arabic/Hebrew reordering morx
/// chains — reversed here purely as a data-flow detail, not bidi support).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Drives a generic state machine over `glyphs`, calling `on_entry` for each
/// `(glyph_index, state, entry_index)` visited. `on_entry` returns the next
/// state and whether the DONT_ADVANCE flag was set for that entry (read from
/// entry-kind-specific data the caller owns, since entry payload layout is
/// subtable specific). The runner itself only owns cursor advancement and
/// the start/end-of-text class bookkeeping.
pub fn run_state_machine<'a, F>(table: &StateTable<'a>, glyphs: &[GlyphId], direction: Direction, mut on_entry: F) -> Result<()>
where
    F: FnMut(usize, u16, u16) -> Result<(u16, bool)>,
{
    if glyphs.is_empty() {
        return Ok(());
    }

    let n = glyphs.len();
    let mut state = 0u16;
    let mut i: isize = match direction {
        Direction::Forward => 0,
        Direction::Backward => n as isize - 1,
    };

    loop {
        let in_bounds = i >= 0 && (i as usize) < n;
        let class = if in_bounds { table.class_for_glyph(glyphs[i as usize]) } else { CLASS_OUT_OF_BOUNDS };

        let entry_index = table.entry_index(state, class)?;
        let idx = if in_bounds { i as usize } else { n };
        let (next_state, dont_advance) = on_entry(idx, state, entry_index)?;
        state = next_state;

        if !dont_advance {
            match direction {
                Direction::Forward => i += 1,
                Direction::Backward => i -= 1,
            }
        }

        if !in_bounds {
            break;
        }
        if direction == Direction::Forward && i as usize >= n {
            break;
        }
        if direction == Direction::Backward && i < 0 {
            break;
        }
    }

    Ok(())
}
