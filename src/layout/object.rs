//! `LayoutObject` and `LayoutSize` (`spec.md` §3.4): the positioned output
//! of the layout engine, consumed by the (external) PDF writer.

use std::rc::Rc;

use crate::layout::cursor::Placement;
use crate::layout::linebreak::BrokenLine;
use crate::tree::block::Direction;
use crate::tree::style::Style;

/// `(width, ascent, descent)`; total height is `ascent + descent`
/// (`spec.md` §3.4).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutSize {
    pub width_mm: f64,
    pub ascent_mm: f64,
    pub descent_mm: f64,
}

impl LayoutSize {
    pub fn height_mm(&self) -> f64 {
        self.ascent_mm + self.descent_mm
    }
}

#[derive(Debug, Clone)]
pub enum LayoutObjectKind {
    Lines { lines: Vec<BrokenLine> },
    RawLines { lines: Vec<Rc<str>> },
    Container { direction: Direction, children: Vec<LayoutObject> },
    Image { width_mm: f64, height_mm: f64 },
    Spacer,
    Path,
    /// An object a script produced already positioned (`spec.md` §4.C.3):
    /// spliced in at its own placement, with nothing further for the layout
    /// engine to compute.
    Opaque,
}

/// An already-positioned object: owns a [`Style`] and [`LayoutSize`] plus
/// exactly one of an absolute or page-relative position (`spec.md` §3.4).
/// `placement` is set exactly once, by [`LayoutObject::place`] during
/// `compute_position`, and read-only thereafter during render — mirroring
/// the reference's "mutated once then read-only" invariant without needing
/// a separate builder type.
#[derive(Debug, Clone)]
pub struct LayoutObject {
    pub style: Rc<Style>,
    pub size: LayoutSize,
    pub kind: LayoutObjectKind,
    placement: Option<Placement>,
}

impl LayoutObject {
    pub fn new(style: Rc<Style>, size: LayoutSize, kind: LayoutObjectKind) -> Self {
        LayoutObject { style, size, kind, placement: None }
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    /// Sets this object's position. Panics if called twice: the
    /// "mutated once" invariant is load-bearing (render assumes a resolved
    /// position exists and never changes).
    pub fn place(&mut self, placement: Placement) {
        assert!(self.placement.is_none(), "LayoutObject::place called more than once");
        self.placement = Some(placement);
    }
}
