//! Font search (`spec.md` §6): resolves a family/style pair to a font file
//! path. On Unix this queries `fontconfig`; elsewhere it falls back to a
//! fixed list of search directories. `.ttc` collection members are filtered
//! out in both paths, per the spec's explicit scope.

use std::path::{Path, PathBuf};

use crate::errors::FontSearchError;

#[derive(Debug, Clone)]
pub struct FontQuery {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

fn is_collection(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("ttc")).unwrap_or(false)
}

#[cfg(unix)]
pub fn search(query: &FontQuery) -> Result<PathBuf, FontSearchError> {
    use rust_fontconfig::{FcFontCache, FcPattern, PatternMatch};

    let cache = FcFontCache::build();
    let pattern = FcPattern {
        family: Some(query.family.clone()),
        bold: if query.bold { PatternMatch::True } else { PatternMatch::DontCare },
        italic: if query.italic { PatternMatch::True } else { PatternMatch::DontCare },
        ..Default::default()
    };

    let results = cache.query_all(&pattern, &mut Vec::new());
    for font_match in results {
        let path = PathBuf::from(&font_match.path);
        if is_collection(&path) {
            continue;
        }
        return Ok(path);
    }

    Err(FontSearchError::NotFound {
        family: query.family.clone(),
        style: format!("bold={} italic={}", query.bold, query.italic),
    })
}

#[cfg(not(unix))]
pub fn search(query: &FontQuery) -> Result<PathBuf, FontSearchError> {
    for dir in env_search_dirs() {
        if let Some(found) = search_directory(&dir, query) {
            return Ok(found);
        }
    }
    Err(FontSearchError::Unsupported(query.family.clone()))
}

fn env_search_dirs() -> Vec<PathBuf> {
    std::env::var_os("SAP_FONT_PATH")
        .map(|v| std::env::split_paths(&v).collect())
        .unwrap_or_default()
}

#[cfg_attr(unix, allow(dead_code))]
fn search_directory(dir: &Path, query: &FontQuery) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if is_collection(&path) {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if stem.to_lowercase().contains(&query.family.to_lowercase()) {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttc_paths_are_recognised_as_collections() {
        assert!(is_collection(Path::new("/fonts/Foo.ttc")));
        assert!(!is_collection(Path::new("/fonts/Foo.ttf")));
    }
}
