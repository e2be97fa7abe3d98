//! The type factory (`spec.md` §4.B): every [`Type`] is created through a
//! single [`TypeInterner`] that deduplicates by structural equality, so two
//! structurally identical types are always the same interned handle —
//! `Rc::ptr_eq`-comparable after construction, which is what lets the
//! evaluator and typechecker use pointer equality as a fast type-equality
//! check everywhere downstream of interning.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// The structural shape of a type, prior to interning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Null,
    Bool,
    Integer,
    Float,
    Char,
    String,
    Any,
    /// `Length`, `Colour`, `Position`, etc: the scripting-surface structs,
    /// represented uniformly rather than special-cased (`spec.md` §4.B
    /// supplement).
    Named(String),
    Array { element: Type, variadic: bool },
    Optional { element: Type },
    Pointer { element: Type, mutable: bool },
    Function { params: Vec<Type>, ret: Type },
    TreeInline,
    TreeBlock,
}

/// An interned type handle. Cheap to clone (it's an `Rc`); equality after
/// interning reduces to pointer equality.
#[derive(Clone)]
pub struct Type(pub Rc<TypeKind>);

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl Type {
    pub fn kind(&self) -> &TypeKind {
        &self.0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(*self.0, TypeKind::Integer | TypeKind::Float)
    }

    pub fn is_optional(&self) -> bool {
        matches!(*self.0, TypeKind::Optional { .. })
    }
}

/// Deduplicating factory for [`Type`]s. One instance lives for the whole
/// compilation; typecheck and the builtins module both intern through it,
/// so any two requests for (say) `array<int>` yield the same `Type`.
#[derive(Default)]
pub struct TypeInterner {
    cache: RefCell<HashMap<TypeKind, Type>>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, kind: TypeKind) -> Type {
        if let Some(existing) = self.cache.borrow().get(&kind) {
            return existing.clone();
        }
        let ty = Type(Rc::new(kind.clone()));
        self.cache.borrow_mut().insert(kind, ty.clone());
        ty
    }

    pub fn void(&self) -> Type {
        self.intern(TypeKind::Void)
    }
    pub fn null(&self) -> Type {
        self.intern(TypeKind::Null)
    }
    pub fn bool(&self) -> Type {
        self.intern(TypeKind::Bool)
    }
    pub fn integer(&self) -> Type {
        self.intern(TypeKind::Integer)
    }
    pub fn float(&self) -> Type {
        self.intern(TypeKind::Float)
    }
    pub fn char(&self) -> Type {
        self.intern(TypeKind::Char)
    }
    pub fn string(&self) -> Type {
        self.intern(TypeKind::String)
    }
    pub fn any(&self) -> Type {
        self.intern(TypeKind::Any)
    }
    pub fn named(&self, name: impl Into<String>) -> Type {
        self.intern(TypeKind::Named(name.into()))
    }
    pub fn array(&self, element: Type, variadic: bool) -> Type {
        self.intern(TypeKind::Array { element, variadic })
    }
    pub fn optional(&self, element: Type) -> Type {
        self.intern(TypeKind::Optional { element })
    }
    pub fn pointer(&self, element: Type, mutable: bool) -> Type {
        self.intern(TypeKind::Pointer { element, mutable })
    }
    pub fn function(&self, params: Vec<Type>, ret: Type) -> Type {
        self.intern(TypeKind::Function { params, ret })
    }
    pub fn tree_inline(&self) -> Type {
        self.intern(TypeKind::TreeInline)
    }
    pub fn tree_block(&self) -> Type {
        self.intern(TypeKind::TreeBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_types_are_the_same_handle() {
        let interner = TypeInterner::new();
        let a = interner.array(interner.integer(), false);
        let b = interner.array(interner.integer(), false);
        assert_eq!(a, b);
        assert!(Rc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn variadic_flag_distinguishes_otherwise_identical_arrays() {
        let interner = TypeInterner::new();
        let a = interner.array(interner.integer(), false);
        let b = interner.array(interner.integer(), true);
        assert_ne!(a, b);
    }
}
