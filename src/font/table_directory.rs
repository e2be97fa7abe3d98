//! The `sfnt` table directory: the fixed header every OpenType/TrueType
//! file starts with, listing each table's tag/checksum/offset/length.

use std::collections::HashMap;

use crate::errors::Result;
use crate::font::bytes::Reader;
use crate::font::tag::Tag;

#[derive(Debug, Clone, Copy)]
pub struct TableRecord {
    pub offset: u32,
    pub length: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TableDirectory {
    pub tables: HashMap<Tag, TableRecord>,
}

impl TableDirectory {
    pub fn get(&self, tag: Tag) -> Option<TableRecord> {
        self.tables.get(&tag).copied()
    }
}

/// Parses the `sfnt` header at `bytes` (assumed to start at the file, or at
/// one member of a `ttc` collection — collection parsing itself is out of
/// scope per `spec.md` §4.A.9's "no `.ttc` support" non-goal).
pub fn parse_table_directory(bytes: &[u8]) -> Result<TableDirectory> {
    let mut r = Reader::new(bytes);
    let _sfnt_version = r.consume_u32()?;
    let num_tables = r.consume_u16()?;
    r.remove_prefix(6); // search_range, entry_selector, range_shift

    let mut tables = HashMap::with_capacity(num_tables as usize);
    for _ in 0..num_tables {
        let tag_bytes = r.consume_bytes(4)?;
        let tag = Tag::from_bytes([tag_bytes[0], tag_bytes[1], tag_bytes[2], tag_bytes[3]]);
        let _checksum = r.consume_u32()?;
        let offset = r.consume_u32()?;
        let length = r.consume_u32()?;
        tables.insert(tag, TableRecord { offset, length });
    }

    Ok(TableDirectory { tables })
}
