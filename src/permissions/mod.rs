//! Permission Coordinator: tracks and acquires media capture permissions.
//!
//! The platform owns the real grant; this module derives a
//! [`PermissionState`] from it on every check and never caches a verdict
//! beyond the next explicit `check_permission`/`refresh`.

mod coordinator;
mod state;

pub use coordinator::*;
pub use state::*;
