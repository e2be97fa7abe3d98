//! The page-flow cursor (`spec.md` §4.D.3), grounded on
//! `original_source/source/include/layout/base.h`'s `RectPageLayout`/`Cursor`.
//!
//! A [`PageCursor`] is an immutable, cheap-to-copy handle: every movement
//! returns a *new* cursor rather than mutating in place, so a paragraph or
//! container can try a layout, discard it, and retry from the original
//! cursor without any undo bookkeeping.

use std::cell::Cell;
use std::rc::Rc;

/// `(page_number, position_on_page)`. `page_number` is `None` before the
/// first `new_line`/`move_to_position` call places the cursor on an actual
/// page — mirroring the sentinel `SIZE_MAX` page number the reference
/// implementation's fresh cursor starts at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPosition {
    pub page_number: Option<usize>,
    pub x_mm: f64,
    pub y_mm: f64,
}

/// Either an absolute position already resolved against the page layout, or
/// a position still relative to some cursor — only resolved to absolute
/// coordinates at render time (`spec.md` §3.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Left(CursorPosition),
    Right(CursorPosition),
}

impl Placement {
    pub fn resolved(&self) -> CursorPosition {
        match self {
            Placement::Left(p) | Placement::Right(p) => *p,
        }
    }
}

/// Shared page geometry: page size and margin, plus the running high-water
/// mark of how many pages have been used so far. `Rc<Cell<_>>` lets every
/// `PageCursor` clone cheaply while still updating one shared page count as
/// layout discovers it needs more pages.
struct PageGeometry {
    width_mm: f64,
    height_mm: f64,
    margin_mm: f64,
    num_pages: Cell<usize>,
}

/// The page-flow layout a document's cursors move within. Owns the page
/// geometry; cursors borrow it by `Rc` so they stay cheap, `Copy`-like
/// handles.
pub struct LayoutBase {
    geometry: Rc<PageGeometry>,
}

impl LayoutBase {
    pub fn new(width_mm: f64, height_mm: f64, margin_mm: f64) -> Self {
        LayoutBase {
            geometry: Rc::new(PageGeometry { width_mm, height_mm, margin_mm, num_pages: Cell::new(1) }),
        }
    }

    pub fn num_pages(&self) -> usize {
        self.geometry.num_pages.get()
    }

    /// A fresh cursor not yet placed on any page (`spec.md` §4.D.3).
    pub fn new_cursor(&self) -> PageCursor {
        PageCursor { geometry: self.geometry.clone(), position: CursorPosition { page_number: None, x_mm: 0.0, y_mm: 0.0 } }
    }
}

#[derive(Clone)]
pub struct PageCursor {
    geometry: Rc<PageGeometry>,
    position: CursorPosition,
}

impl PageCursor {
    pub fn position(&self) -> CursorPosition {
        self.position
    }

    pub fn page_number(&self) -> usize {
        self.position.page_number.unwrap_or(0)
    }

    /// Horizontal space remaining from the cursor's current x to the right
    /// margin, unbounded if the cursor isn't placed on a page yet.
    pub fn width_at_cursor(&self) -> f64 {
        match self.position.page_number {
            None => 0.0,
            Some(_) => (self.geometry.width_mm - self.geometry.margin_mm - self.position.x_mm).max(0.0),
        }
    }

    pub fn margin_mm(&self) -> f64 {
        self.geometry.margin_mm
    }

    pub fn content_width_mm(&self) -> f64 {
        self.geometry.width_mm - 2.0 * self.geometry.margin_mm
    }

    /// Moves down by `line_height_mm`; starts a new page if that would
    /// cross the bottom margin. Page breaks are forward-only and y never
    /// decreases without a page break (`spec.md` §4.D.3's monotonicity
    /// invariant).
    pub fn new_line(&self, line_height_mm: f64) -> PageCursor {
        let bottom = self.geometry.height_mm - self.geometry.margin_mm;
        let current_page = self.position.page_number.unwrap_or(0);
        let current_y = if self.position.page_number.is_none() { self.geometry.margin_mm } else { self.position.y_mm };

        if current_y + line_height_mm >= bottom {
            let next_page = current_page + 1;
            self.geometry.num_pages.set(self.geometry.num_pages.get().max(next_page + 1));
            PageCursor {
                geometry: self.geometry.clone(),
                position: CursorPosition {
                    page_number: Some(next_page),
                    x_mm: self.geometry.margin_mm,
                    y_mm: self.geometry.margin_mm + line_height_mm,
                },
            }
        } else {
            PageCursor {
                geometry: self.geometry.clone(),
                position: CursorPosition { page_number: Some(current_page), x_mm: self.geometry.margin_mm, y_mm: current_y + line_height_mm },
            }
        }
    }

    /// Advances only if there isn't already enough room for `height_mm` on
    /// the current page; otherwise returns `self` unchanged.
    pub fn ensure_vertical_space(&self, height_mm: f64) -> PageCursor {
        let bottom = self.geometry.height_mm - self.geometry.margin_mm;
        let current_y = if self.position.page_number.is_none() { self.geometry.margin_mm } else { self.position.y_mm };
        if current_y + height_mm >= bottom {
            self.new_line(height_mm)
        } else {
            self.clone()
        }
    }

    /// Unbounded horizontal advance; callers must respect
    /// [`PageCursor::width_at_cursor`] themselves (`spec.md` §4.D.3).
    pub fn move_right(&self, delta_mm: f64) -> PageCursor {
        let page = self.position.page_number.unwrap_or(0);
        PageCursor {
            geometry: self.geometry.clone(),
            position: CursorPosition {
                page_number: Some(page),
                x_mm: (if self.position.page_number.is_none() { self.geometry.margin_mm } else { self.position.x_mm }) + delta_mm,
                y_mm: if self.position.page_number.is_none() { self.geometry.margin_mm } else { self.position.y_mm },
            },
        }
    }

    pub fn carriage_return(&self) -> PageCursor {
        let page = self.position.page_number.unwrap_or(0);
        PageCursor {
            geometry: self.geometry.clone(),
            position: CursorPosition { page_number: Some(page), x_mm: self.geometry.margin_mm, y_mm: self.position.y_mm },
        }
    }

    pub fn move_to_position(&self, page_number: usize, x_mm: f64, y_mm: f64) -> PageCursor {
        self.geometry.num_pages.set(self.geometry.num_pages.get().max(page_number + 1));
        PageCursor { geometry: self.geometry.clone(), position: CursorPosition { page_number: Some(page_number), x_mm, y_mm } }
    }

    /// Vertical space remaining from the cursor's current y to the bottom
    /// margin, as if nothing fit yet on a fresh page if the cursor isn't
    /// placed on one.
    pub fn remaining_height_mm(&self) -> f64 {
        let bottom = self.geometry.height_mm - self.geometry.margin_mm;
        let current_y = if self.position.page_number.is_none() { self.geometry.margin_mm } else { self.position.y_mm };
        (bottom - current_y).max(0.0)
    }

    /// Advances to a fresh page regardless of remaining space, used to place
    /// a non-splittable child that doesn't fit (`spec.md` §4.D.5) after it's
    /// been placed anyway with a diagnostic, so subsequent siblings start
    /// clean.
    pub fn force_new_page(&self) -> PageCursor {
        let next_page = self.position.page_number.map(|p| p + 1).unwrap_or(0);
        self.geometry.num_pages.set(self.geometry.num_pages.get().max(next_page + 1));
        PageCursor {
            geometry: self.geometry.clone(),
            position: CursorPosition { page_number: Some(next_page), x_mm: self.geometry.margin_mm, y_mm: self.geometry.margin_mm },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_line_within_page_advances_y_only() {
        let base = LayoutBase::new(210.0, 297.0, 20.0);
        let c0 = base.new_cursor().new_line(10.0);
        assert_eq!(c0.page_number(), 0);
        let c1 = c0.new_line(10.0);
        assert_eq!(c1.page_number(), 0);
        assert!(c1.position().y_mm > c0.position().y_mm);
    }

    #[test]
    fn new_line_crossing_bottom_margin_starts_new_page() {
        let base = LayoutBase::new(210.0, 100.0, 10.0);
        let mut cursor = base.new_cursor();
        for _ in 0..20 {
            cursor = cursor.new_line(10.0);
        }
        assert!(cursor.page_number() >= 1);
        assert_eq!(cursor.position().y_mm, 20.0);
    }

    #[test]
    fn ensure_vertical_space_noop_when_room_remains() {
        let base = LayoutBase::new(210.0, 297.0, 20.0);
        let c0 = base.new_cursor().new_line(10.0);
        let c1 = c0.ensure_vertical_space(5.0);
        assert_eq!(c0.position(), c1.position());
    }

    #[test]
    fn page_breaks_are_forward_only() {
        let base = LayoutBase::new(210.0, 100.0, 10.0);
        let mut cursor = base.new_cursor();
        let mut last_page = 0;
        for _ in 0..30 {
            cursor = cursor.new_line(10.0);
            assert!(cursor.page_number() >= last_page);
            last_page = cursor.page_number();
        }
    }
}
