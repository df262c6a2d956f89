//! Plugin identity, link model, and the coordination service that
//! serializes concurrent provider plugin fetches across HTTP requests.

mod coordinator;
mod identity;

pub use coordinator::Coordinator;
pub use identity::{PluginIdentity, PluginLinks, PluginRecord};
