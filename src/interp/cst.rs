//! The typed tree (`spec.md` §4.C.1): the closed node set `typecheck`
//! produces from the (external) AST, dispatched by `match` rather than
//! virtual dispatch, per the Design Notes' tagged-variant guidance. Grounded
//! on `original_source/source/include/interp/cst.h`'s node list.

use std::rc::Rc;

use crate::errors::Location;
use crate::types::cast::CastKind;
use crate::types::interner::Type;

/// An index into a [`crate::interp::typecheck::Decls`] arena. Identifiers in
/// the typed tree carry a `DeclId` rather than a name, per `spec.md` §4.C.1's
/// "every identifier carries a pointer to its declaration".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

#[derive(Debug, Clone)]
pub enum Decl {
    Variable { name: Rc<str>, ty: Type, mutable: bool },
    Function { name: Rc<str>, params: Vec<(Rc<str>, Type)>, param_decls: Vec<DeclId>, ret: Type, body: Rc<Stmt> },
    BuiltinFunction { name: Rc<str>, params: Vec<Type>, ret: Type },
    EnumCase { name: Rc<str>, enum_name: Rc<str>, index: usize },
    Struct { name: Rc<str>, fields: Vec<(Rc<str>, Type)> },
    /// `spec.md` §3.2's `union(name, [case])`: each case is itself a
    /// struct-shaped field list, selected at runtime by variant index
    /// (`types::value::NamedValue::variant_index`).
    Union { name: Rc<str>, cases: Vec<(Rc<str>, Vec<(Rc<str>, Type)>)> },
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Variable { name, .. } => name,
            Decl::Function { name, .. } => name,
            Decl::BuiltinFunction { name, .. } => name,
            Decl::EnumCase { name, .. } => name,
            Decl::Struct { name, .. } => name,
            Decl::Union { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Matches `original_source`'s `AssignOp::Op`/`BinaryOp::Op` minus `None`
/// (an `Assign` with no compound operator is `Assign::op = None` there; here
/// that's `Stmt::Assign { op: None, .. }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

/// `NullCoalesceOp::Kind` from `original_source/interp/cst/optional.cpp`:
/// `Value` unwraps the left optional/pointer to its element type; `Flatmap`
/// keeps the left's own optional/pointer shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullCoalesceKind {
    Value,
    Flatmap,
}

#[derive(Debug, Clone)]
pub enum FStringPart {
    Literal(Rc<str>),
    Expr(Box<Expr>),
}

/// `spec.md` §4.C.3: the phase a `hook` block (or a `ScriptBlock`/
/// `ScriptCall`) is pending for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingPhase {
    Typecheck,
    Layout,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Char(char),
    Str(Rc<str>),
    Array(Vec<Expr>),
    FString(Vec<FStringPart>),
    Cast { expr: Box<Expr>, kind: CastKind },
    StructLiteral { type_name: Rc<str>, fields: Vec<(Rc<str>, Expr)> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Logical { op: LogicalOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// A chained comparison `a < b <= c`: `first` then `(op, rhs)` pairs,
    /// each operand evaluated at most once (`spec.md` §4.C.2).
    Comparison { first: Box<Expr>, rest: Vec<(CompareOp, Expr)> },
    /// `op = None` is a plain `=`; `Some(op)` desugars to `lhs = lhs op rhs`
    /// with `lhs` evaluated once (`spec.md` §4.C.2).
    Assign { op: Option<BinaryOp>, lhs: Box<Expr>, rhs: Box<Expr> },
    NullCoalesce { kind: NullCoalesceKind, lhs: Box<Expr>, rhs: Box<Expr> },
    /// Postfix `?`: true iff an optional/pointer has a value.
    OptionalCheck(Box<Expr>),
    Deref(Box<Expr>),
    AddressOf { mutable: bool, expr: Box<Expr> },
    Subscript { base: Box<Expr>, index: Box<Expr> },
    StructUpdate { base: Box<Expr>, fields: Vec<(Rc<str>, Expr)> },
    Move(Box<Expr>),
    ArraySpread(Box<Expr>),
    /// `is_optional`: the base is an optional or pointer and the field
    /// access propagates through it (`original_source/interp/cst/dotop.cpp`).
    Dot { base: Box<Expr>, field: Rc<str>, field_index: usize, is_optional: bool },
    Ident(DeclId),
    Call { callee: Box<Expr>, args: Vec<Expr> },
}

/// Every expression carries its resolved [`Type`] (`spec.md` §4.C.1).
#[derive(Debug, Clone)]
pub struct Expr {
    pub loc: Location,
    pub ty: Type,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    /// A local variable definition; `init` is `None` for a declaration with
    /// no initialiser (zero/default-valued).
    Let { decl: DeclId, init: Option<Expr> },
    Block(Vec<Stmt>),
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    /// `spec.md` §4.C.1 if-let on optional: `decl` is bound to the unwrapped
    /// value in `then_branch`'s scope.
    IfLetOptional { scrutinee: Expr, decl: DeclId, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    /// if-let on union: matches `variant_index` by name; `bindings` pairs
    /// each bound declaration with the matched case's field index it reads
    /// from (not necessarily declaration order — the source may bind fields
    /// in any order), bound in `then_branch`'s scope.
    IfLetUnion {
        scrutinee: Expr,
        variant_index: usize,
        bindings: Vec<(usize, DeclId)>,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    For { init: Option<Box<Stmt>>, cond: Option<Expr>, update: Option<Expr>, body: Box<Stmt> },
    Return(Option<Expr>),
    Break,
    Continue,
    Import(Rc<str>),
    Hook { phase: ProcessingPhase, body: Box<Stmt> },
    FunctionDef(DeclId),
    StructDef(DeclId),
    UnionDef(DeclId),
    EnumDef(DeclId),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub loc: Location,
    pub kind: StmtKind,
}
