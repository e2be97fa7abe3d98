//! The boundary type between the (external, out of scope per `spec.md` §1)
//! source parser and [`crate::interp::typecheck`]: a plain, name-resolved-
//! nothing-yet tree. `typecheck` is the only consumer; nothing downstream of
//! it ever sees this module again.

use crate::errors::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullCoalesceKind {
    Value,
    Flatmap,
}

/// The phase a `hook` block is pending for (`spec.md` §4.C.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingPhase {
    Typecheck,
    Layout,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Named(String),
    Array { element: Box<TypeExpr>, variadic: bool },
    Optional(Box<TypeExpr>),
    Pointer { element: Box<TypeExpr>, mutable: bool },
}

#[derive(Debug, Clone)]
pub enum FStringPart {
    Literal(String),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Char(char),
    Str(String),
    Array(Vec<Expr>),
    FString(Vec<FStringPart>),
    Cast { expr: Box<Expr>, target: TypeExpr },
    StructLiteral { type_name: String, fields: Vec<(String, Expr)> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Logical { op: LogicalOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Comparison { first: Box<Expr>, rest: Vec<(CompareOp, Expr)> },
    Assign { op: Option<BinaryOp>, lhs: Box<Expr>, rhs: Box<Expr> },
    NullCoalesce { kind: NullCoalesceKind, lhs: Box<Expr>, rhs: Box<Expr> },
    OptionalCheck(Box<Expr>),
    Deref(Box<Expr>),
    AddressOf { mutable: bool, expr: Box<Expr> },
    Subscript { base: Box<Expr>, index: Box<Expr> },
    StructUpdate { base: Box<Expr>, fields: Vec<(String, Expr)> },
    Move(Box<Expr>),
    ArraySpread(Box<Expr>),
    Dot { base: Box<Expr>, field: String, is_optional: bool },
    Ident(String),
    Call { callee: Box<Expr>, args: Vec<Expr> },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub loc: Location,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Let { name: String, ty: Option<TypeExpr>, mutable: bool, init: Option<Expr> },
    Block(Vec<Stmt>),
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    IfLetOptional { name: String, scrutinee: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    IfLetUnion {
        variant_name: String,
        scrutinee: Expr,
        bindings: Vec<(String, bool)>,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    For { init: Option<Box<Stmt>>, cond: Option<Expr>, update: Option<Expr>, body: Box<Stmt> },
    Return(Option<Expr>),
    Break,
    Continue,
    Import(String),
    Hook {
        phase: ProcessingPhase,
        body: Box<Stmt>,
    },
    FunctionDef {
        name: String,
        params: Vec<(String, TypeExpr)>,
        ret: Option<TypeExpr>,
        body: Box<Stmt>,
    },
    StructDef {
        name: String,
        fields: Vec<(String, TypeExpr)>,
    },
    EnumDef {
        name: String,
        underlying: TypeExpr,
        cases: Vec<String>,
    },
    /// `union(name, [case])`: each case is itself a field list, matching
    /// `spec.md` §3.2.
    UnionDef {
        name: String,
        cases: Vec<(String, Vec<(String, TypeExpr)>)>,
    },
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub loc: Location,
    pub kind: StmtKind,
}

/// A whole source file's top-level statements, in order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}
