//! `sap`: a programmable typesetting engine core.
//!
//! The crate is organized around the four leaf-ordered components
//! `spec.md` §2 describes: the [`font`] engine (OpenType/AAT table parsing
//! and shaping), the [`types`] value/type system, the [`interp`]
//! AST→typed-tree→evaluator pipeline, and the [`layout`] engine. [`tree`]
//! holds the document object model the evaluator produces and the layout
//! engine consumes.
//!
//! This library never initializes a logger itself (only the `sap` binary
//! does via `fern`), so it stays embeddable by other drivers.

pub mod errors;
pub mod font;
pub mod interp;
pub mod layout;
pub mod tree;
pub mod types;

pub use errors::{Error, Result};
