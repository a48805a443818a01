#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared models for the GramSeva API daemon.

pub mod api;
pub mod model;

mod util;

pub use util::{new_ulid, now_iso, now_ms};
