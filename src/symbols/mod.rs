/// Workspace symbol search across multiple backends
///
/// This module provides the query pipeline:
/// - Concurrent dispatch of one query to every capable backend
/// - Per-backend failure isolation
/// - A single deadline over the whole fan-out
/// - Normalization of both `workspace/symbol` response shapes
/// - Arrival-ordered merge truncated to a maximum result count

pub mod aggregator;
pub mod backend;
pub mod dispatcher;
pub mod governor;
pub mod models;
pub mod normalizer;
pub mod provider;
pub mod sink;
pub mod wire;

pub use aggregator::ResultAggregator;
pub use backend::{
    retain_workspace_symbol_capable, supports_workspace_symbols, BackendCapabilities,
    BackendSupplier, ProjectScope, StaticSupplier, SymbolBackend,
};
pub use dispatcher::{BackendResponse, FanOut, QueryDispatcher};
pub use governor::{Settled, TimeoutGovernor};
pub use models::{
    AggregatedResult, BackendId, BackendOutcome, BackendState, DeferredLocation, Location,
    Position, QueryRequest, Range, SymbolKind, SymbolRecord, SymbolTag, DEFAULT_DEADLINE,
    MAX_RESULTS,
};
pub use normalizer::normalize;
pub use provider::{SearchSettings, SymbolsProvider, WorkspaceSymbolsProvider, PROVIDER_NAME};
pub use sink::{FailureSink, TracingFailureSink};
pub use wire::{RawBackendResult, SymbolInformation, WorkspaceSymbol, WorkspaceSymbolLocation};
