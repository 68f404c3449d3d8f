//! Page probe primitives for wizard automation
//!
//! This crate is the only layer that touches the live UI surface:
//! - Readiness conditions (present, visible, clickable, absent)
//! - Action primitives (click, script click, type, select, back, refresh)
//! - Bounded, cancellable waiting over a [`PageProbe`]
//! - Per-record placeholder rendering for selectors and text

pub mod errors;
mod probe;
mod template;
pub mod types;
mod waiting;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::*;
pub use probe::*;
pub use template::*;
pub use types::*;
pub use waiting::*;
