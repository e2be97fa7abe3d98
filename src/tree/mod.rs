//! The document tree: the two parallel object hierarchies the evaluator
//! produces and the layout engine consumes (`spec.md` §3.3/§3.4).

pub mod block;
pub mod inline;
pub mod style;

pub use block::{BlockObject, Direction};
pub use inline::InlineObject;
pub use style::Style;
