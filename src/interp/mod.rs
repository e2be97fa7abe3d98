//! AST → typed tree → evaluator (`spec.md` §4.C): [`ast`] is the boundary
//! type the (external) source parser hands in; [`typecheck`] resolves it
//! against [`cst`]'s closed node set; [`eval`] walks the typed tree against
//! a stack of [`frame::Frame`]s; [`builtins`] is the scripting surface's
//! builtin function table.

pub mod ast;
pub mod builtins;
pub mod cst;
pub mod eval;
pub mod frame;
pub mod script;
pub mod typecheck;

pub use eval::Evaluator;
pub use script::ScriptRunner;
pub use typecheck::{typecheck_program, Decls};
