//! The font set a style resolves against: maps a `(family, bold, italic)`
//! query to a loaded [`FontFile`], backed by the process-wide font cache
//! (`spec.md` §5's "font cache keyed by file path plus mtime").

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use crate::errors::{Error, FontSearchError, Result};
use crate::font::font_file::FontFile;
use crate::font::search::{self, FontQuery};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    family: String,
    bold: bool,
    italic: bool,
}

/// Resolves style font requests to parsed font files, caching both the
/// search result (path) and the parse result (bytes→`FontFile`) for the
/// lifetime of one `FontSet`. A real long-lived process would key the cache
/// additionally on the file's mtime to invalidate after `--watch` reloads a
/// changed font (`spec.md` §5); this crate's `FontSet` is rebuilt per
/// compile, so mtime tracking is the file watcher's concern, not this
/// struct's.
#[derive(Default)]
pub struct FontSet {
    cache: RefCell<HashMap<CacheKey, Rc<FontFile>>>,
    extra_dirs: Vec<PathBuf>,
}

impl FontSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra_dirs(extra_dirs: Vec<PathBuf>) -> Self {
        FontSet { cache: RefCell::new(HashMap::new()), extra_dirs }
    }

    pub fn resolve(&self, family: &str, bold: bool, italic: bool) -> Result<Rc<FontFile>> {
        let key = CacheKey { family: family.to_string(), bold, italic };
        if let Some(found) = self.cache.borrow().get(&key) {
            return Ok(found.clone());
        }

        let path = self.find_path(family, bold, italic)?;
        let bytes = std::fs::read(&path)?;
        let font = Rc::new(FontFile::parse(bytes)?);
        self.cache.borrow_mut().insert(key, font.clone());
        Ok(font)
    }

    fn find_path(&self, family: &str, bold: bool, italic: bool) -> Result<PathBuf> {
        for dir in &self.extra_dirs {
            if let Some(path) = search_dir_for_family(dir, family) {
                return Ok(path);
            }
        }
        search::search(&FontQuery { family: family.to_string(), bold, italic }).map_err(|e| match e {
            FontSearchError::Unsupported(f) => Error::internal(format!("font search unsupported for family {f:?}")),
            other => Error::internal(other.to_string()),
        })
    }
}

/// The narrow font-metrics interface the line-breaker and container layout
/// actually need, so they can be exercised against a deterministic stub
/// instead of a [`FontSet`] backed by real font files/fontconfig.
pub trait TextMetrics {
    fn text_width_mm(&self, family: &str, bold: bool, italic: bool, text: &str, font_size_pt: f64) -> Result<f64>;
}

impl TextMetrics for FontSet {
    fn text_width_mm(&self, family: &str, bold: bool, italic: bool, text: &str, font_size_pt: f64) -> Result<f64> {
        let font = self.resolve(family, bold, italic)?;
        font.text_width_mm(text, font_size_pt)
    }
}

fn search_dir_for_family(dir: &std::path::Path, family: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if stem.eq_ignore_ascii_case(family) {
            return Some(path);
        }
    }
    None
}
