//! Operator notifications.
//!
//! Components never talk to a global listener list; the context object
//! owns an [`EventHub`] and every notable state transition is fanned out
//! to its subscribers. Subscribers are purely observational.

mod hub;
mod types;

pub use hub::*;
pub use types::*;
