//! Driver loop and CLI-config plumbing for the provider registry cache.
//!
//! The registry facade itself lives in `registry-server`; the coordination
//! state machine lives in `registry-core`. This crate wires them together
//! behind the outer retry loop that runs the client and reacts to the
//! locked-plugin signal in its stderr.

mod config;
mod driver;

pub use driver::{run_with_provider_cache, DriverOptions};
