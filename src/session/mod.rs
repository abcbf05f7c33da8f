//! Agent Session Façade over the externally owned agent session.

mod facade;
mod types;

pub use facade::*;
pub use types::*;
