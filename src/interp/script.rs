//! The narrow interface the layout engine evaluates a pending script call
//! through, without the layout crate needing to name [`Evaluator`]'s own
//! `Decls` lifetime parameter.

use crate::errors::{Location, Result};
use crate::interp::eval::Evaluator;
use crate::types::value::Value;

pub trait ScriptRunner {
    fn call(&mut self, name: &str, loc: Location) -> Result<Value>;
}

impl<'a> ScriptRunner for Evaluator<'a> {
    fn call(&mut self, name: &str, loc: Location) -> Result<Value> {
        self.call_named(name, loc)
    }
}
