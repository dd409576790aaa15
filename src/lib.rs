//! Workspace symbol search
//!
//! Fans one symbol query out to every capable backend, isolates their
//! failures, bounds the whole query with a single deadline and merges the
//! answers in arrival order.

pub mod config;
pub mod error;
pub mod lsp;
pub mod symbols;

pub use config::Config;
pub use error::{Result, SymbolError};
pub use lsp::LanguageServerRegistry;
pub use symbols::{
    AggregatedResult, BackendSupplier, ProjectScope, SymbolBackend, SymbolRecord,
    SymbolsProvider, WorkspaceSymbolsProvider, PROVIDER_NAME,
};
