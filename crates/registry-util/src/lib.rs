//! Shared error taxonomy and the stream-trapping writer used by the registry
//! facade and the driver loop.

mod errors;
mod trap;

pub use errors::{RegistryError, RegistryResult};
pub use trap::TrapWriter;
