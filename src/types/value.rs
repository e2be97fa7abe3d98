//! Runtime values: rvalues (owning) and lvalues (stable references into a
//! scope frame's storage), plus the evaluator's control-flow signal type.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::errors::{Error, Location, Result};
use crate::tree::block::BlockObject;
use crate::tree::inline::InlineObject;

/// A path segment point, mirroring `original_source/include/sap/path_segment.h`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    Move(Position),
    Line(Position),
    CubicBezier(Position, Position, Position),
    CubicBezierIC1(Position, Position),
    CubicBezierIC2(Position, Position),
    Rectangle(Position, Position),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Colour {
    Rgb { r: f64, g: f64, b: f64 },
    Cmyk { c: f64, m: f64, y: f64, k: f64 },
}

/// A length in one of the scripting surface's units, unresolved against a
/// style yet (`original_source/include/sap/units.h`'s `DynLength`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DynLengthUnit {
    Mm,
    Cm,
    Em,
    Ex,
    In,
    Pt,
    Pc,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynLength {
    pub value: f64,
    pub unit: DynLengthUnit,
}

impl DynLength {
    /// Resolves to millimetres given the ambient font size (for `em`/`ex`)
    /// and the document root font size (for `rem`).
    pub fn resolve(&self, font_size_mm: f64, root_font_size_mm: f64) -> f64 {
        match self.unit {
            DynLengthUnit::Mm => self.value,
            DynLengthUnit::Cm => self.value * 10.0,
            DynLengthUnit::In => self.value * 25.4,
            DynLengthUnit::Pt => self.value * 25.4 / 72.0,
            DynLengthUnit::Pc => self.value * 25.4 / 6.0,
            DynLengthUnit::Em => self.value * font_size_mm,
            DynLengthUnit::Ex => self.value * font_size_mm * 0.5,
            DynLengthUnit::Rem => self.value * root_font_size_mm,
        }
    }
}

/// A script-placed object that already knows its own position, the third of
/// the three shapes a `ScriptBlock`/`ScriptCall` result may take (`spec.md`
/// §4.C.3): the layout engine splices it into its output at the position it
/// already carries rather than computing one. Kept as a flat position/size
/// pair rather than naming `layout::LayoutObject` directly so the value/type
/// system stays free of a dependency on the layout engine built on top of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedValue {
    pub page_number: Option<usize>,
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
}

/// A struct/union value: name plus ordered field values (unions additionally
/// carry the chosen variant's index, per `spec.md` §4.B).
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub type_name: String,
    pub variant_index: Option<usize>,
    pub fields: Vec<Value>,
}

/// A runtime value. Rvalues own their payload; an `Lvalue` is a handle into
/// some frame's storage cell, shared via `Rc<RefCell<_>>` so it can be
/// referenced from multiple places within its owning frame's lifetime.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Char(char),
    String(Rc<String>),
    Array(Rc<Vec<Value>>),
    Optional(Option<Box<Value>>),
    Named(Rc<NamedValue>),
    Length(DynLength),
    Colour(Colour),
    Position(Position),
    PathSegment(PathSegment),
    /// A `tree-inline` value (`spec.md` §3.2): an inline document-tree
    /// fragment a script produced, pending splice into the enclosing
    /// paragraph (`spec.md` §4.C.3).
    TreeInline(Rc<InlineObject>),
    /// A `tree-block` value (`spec.md` §3.2): a block document-tree fragment
    /// a script produced, pending placement in the enclosing container.
    TreeBlock(Rc<BlockObject>),
    /// The already-positioned result case of `spec.md` §4.C.3.
    Positioned(PositionedValue),
    /// A reference into scope-frame storage: the frame's generation (so
    /// staleness after the frame pops is detectable) and the storage cell.
    Lvalue(LvalueHandle),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Optional(a), Value::Optional(b)) => a == b,
            (Value::Named(a), Value::Named(b)) => a == b,
            (Value::Length(a), Value::Length(b)) => a == b,
            (Value::Colour(a), Value::Colour(b)) => a == b,
            (Value::Position(a), Value::Position(b)) => a == b,
            (Value::PathSegment(a), Value::PathSegment(b)) => a == b,
            (Value::TreeInline(a), Value::TreeInline(b)) => Rc::ptr_eq(a, b),
            (Value::TreeBlock(a), Value::TreeBlock(b)) => Rc::ptr_eq(a, b),
            (Value::Positioned(a), Value::Positioned(b)) => a == b,
            _ => false,
        }
    }
}

/// One storage cell an lvalue may point into. Once `moved` is set, any
/// further read must fail — this is the "moved-from state" `spec.md`
/// §4.C.2 requires.
#[derive(Debug)]
pub struct Cell {
    pub value: RefCell<Option<Value>>,
    /// The generation of the frame that owns this cell, used to detect an
    /// lvalue that has outlived its frame (`spec.md` §9's frame-generation
    /// counter technique).
    pub owning_frame_generation: u64,
}

#[derive(Debug, Clone)]
pub struct LvalueHandle {
    pub cell: Rc<Cell>,
    pub name: Rc<str>,
}

impl LvalueHandle {
    pub fn read(&self, current_frame_generation: u64, loc: Location) -> Result<Value> {
        if self.cell.owning_frame_generation > current_frame_generation {
            return Err(Error::internal(format!(
                "lvalue '{}' outlived its owning frame (generation {} > current {})",
                self.name, self.cell.owning_frame_generation, current_frame_generation
            )));
        }
        let slot = self.cell.value.borrow();
        slot.clone().ok_or_else(|| Error::eval(loc, format!("use of moved-from value '{}'", self.name)))
    }

    pub fn write(&self, value: Value) {
        *self.cell.value.borrow_mut() = Some(value);
    }

    /// Takes ownership out of the cell, leaving it in the moved-from state.
    pub fn take(&self, loc: Location) -> Result<Value> {
        let mut slot = self.cell.value.borrow_mut();
        slot.take().ok_or_else(|| Error::eval(loc, format!("use of moved-from value '{}'", self.name)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Optional(Some(v)) => write!(f, "{v}"),
            Value::Optional(None) => write!(f, "null"),
            Value::Named(n) => write!(f, "{}{{...}}", n.type_name),
            Value::Length(l) => write!(f, "{:?}", l),
            Value::Colour(c) => write!(f, "{:?}", c),
            Value::Position(p) => write!(f, "({}, {})", p.x, p.y),
            Value::PathSegment(p) => write!(f, "{:?}", p),
            Value::TreeInline(_) => write!(f, "<inline tree>"),
            Value::TreeBlock(_) => write!(f, "<block tree>"),
            Value::Positioned(p) => write!(f, "<positioned at ({}, {})>", p.x_mm, p.y_mm),
            Value::Lvalue(handle) => write!(f, "&{}", handle.name),
        }
    }
}

/// The evaluator's control-flow signal, threaded out of every statement
/// evaluation (`spec.md` §4.C.2).
#[derive(Debug, Clone)]
pub enum EvalResult {
    Normal(Value),
    /// An lvalue result: the caller decides whether to read through it or
    /// move/assign through it, per the operator evaluating it.
    LValue(LvalueHandle),
    Return(Value),
    LoopBreak,
    LoopContinue,
}

impl EvalResult {
    pub fn unit() -> Self {
        EvalResult::Normal(Value::Null)
    }

    /// Reads the value out of this result, resolving an lvalue by copy.
    pub fn into_value(self, current_frame_generation: u64, loc: Location) -> Result<Value> {
        match self {
            EvalResult::Normal(v) => Ok(v),
            EvalResult::LValue(handle) => handle.read(current_frame_generation, loc),
            EvalResult::Return(v) => Ok(v),
            EvalResult::LoopBreak | EvalResult::LoopContinue => {
                Err(Error::internal("control-flow signal used as a value"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_a_moved_from_lvalue_errors() {
        let cell = Rc::new(Cell { value: RefCell::new(Some(Value::Integer(1))), owning_frame_generation: 0 });
        let handle = LvalueHandle { cell, name: Rc::from("x") };

        handle.take(Location::default()).unwrap();
        let err = handle.read(0, Location::default());
        assert!(err.is_err());
    }

    #[test]
    fn reading_an_lvalue_from_a_popped_frame_is_internal_error() {
        let cell = Rc::new(Cell { value: RefCell::new(Some(Value::Integer(1))), owning_frame_generation: 5 });
        let handle = LvalueHandle { cell, name: Rc::from("x") };

        // current_frame_generation (2) < owning generation (5): the frame
        // that owned this value has already been popped.
        let err = handle.read(2, Location::default());
        assert!(matches!(err, Err(Error::Internal(_))));
    }
}
