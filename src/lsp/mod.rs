//! Language Server Protocol backends
//!
//! Connects to language servers over stdio and exposes each one as a
//! symbol backend.

pub mod capabilities;
pub mod client;
pub mod registry;
pub mod transport;

pub use capabilities::ServerCapabilities;
pub use client::{LanguageServerClient, RequestId};
pub use registry::{LanguageServerRegistry, ProcessLauncher, ServerLauncher};
pub use transport::{read_message, write_message, MAX_MESSAGE_BYTES};
