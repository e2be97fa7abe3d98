//! Apple Advanced Typography tables: the generic state machine, and the
//! `morx` metamorphosis table built on top of it.

pub mod feature;
pub mod morx;
pub mod state_table;

pub use state_table::{Direction, StateTable};
