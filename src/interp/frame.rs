//! Evaluator scope frames (`spec.md` §4.C.2): a stack of frames mapping
//! declarations to storage cells. Ordinary blocks push a child frame that
//! can still read the parent's lvalues; call frames additionally bump the
//! call depth, which is what `return`'s lvalue-move logic and the
//! frame-generation staleness check key off (`spec.md` §9's "reachable from
//! current stack frame" technique).

use std::collections::HashMap;
use std::rc::Rc;

use crate::interp::cst::DeclId;
use crate::types::value::{Cell, Value};

pub struct Frame {
    generation: u64,
    call_depth: usize,
    parent: Option<Rc<Frame>>,
    cells: std::cell::RefCell<HashMap<DeclId, Rc<Cell>>>,
}

impl Frame {
    pub fn root() -> Rc<Frame> {
        Rc::new(Frame { generation: 0, call_depth: 0, parent: None, cells: Default::default() })
    }

    /// An ordinary nested block scope: same call depth, one generation up.
    pub fn child(self: &Rc<Self>) -> Rc<Frame> {
        Rc::new(Frame {
            generation: self.generation + 1,
            call_depth: self.call_depth,
            parent: Some(self.clone()),
            cells: Default::default(),
        })
    }

    /// A new function-call frame: bumps call depth, per `spec.md` §4.C.2
    /// ("Call frames create a new scope").
    pub fn call(self: &Rc<Self>) -> Rc<Frame> {
        Rc::new(Frame {
            generation: self.generation + 1,
            call_depth: self.call_depth + 1,
            parent: Some(self.clone()),
            cells: Default::default(),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub fn parent(&self) -> Option<&Rc<Frame>> {
        self.parent.as_ref()
    }

    pub fn declare(&self, decl: DeclId, value: Value) -> Rc<Cell> {
        let cell = Rc::new(Cell { value: std::cell::RefCell::new(Some(value)), owning_frame_generation: self.generation });
        self.cells.borrow_mut().insert(decl, cell.clone());
        cell
    }

    pub fn lookup(&self, decl: DeclId) -> Option<Rc<Cell>> {
        if let Some(cell) = self.cells.borrow().get(&decl) {
            return Some(cell.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(decl))
    }

    fn owns_cell(&self, cell: &Rc<Cell>) -> bool {
        self.cells.borrow().values().any(|c| Rc::ptr_eq(c, cell))
    }

    /// Walks frames from `start` upward while they share `start`'s call
    /// depth (i.e. without crossing into an enclosing call's frames),
    /// looking for the frame that owns `cell`. Grounded on
    /// `original_source/interp/cst/return.cpp`'s frame walk: a found cell is
    /// local to this call and safe to move out of; an unfound one is a
    /// global (or a reference captured from an outer call) and must only be
    /// read, never moved.
    pub fn is_owned_within_current_call(start: &Rc<Frame>, cell: &Rc<Cell>) -> bool {
        let call_depth = start.call_depth();
        let mut cur = Some(start.clone());
        while let Some(f) = cur {
            if f.call_depth() != call_depth {
                return false;
            }
            if f.owns_cell(cell) {
                return true;
            }
            cur = f.parent().cloned();
        }
        false
    }
}
