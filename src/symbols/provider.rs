use crate::error::{Result, SymbolError};
use crate::symbols::aggregator::ResultAggregator;
use crate::symbols::backend::{BackendSupplier, ProjectScope, StaticSupplier, SymbolBackend};
use crate::symbols::dispatcher::QueryDispatcher;
use crate::symbols::governor::TimeoutGovernor;
use crate::symbols::models::{
    AggregatedResult, BackendState, Location, QueryRequest, SymbolRecord, DEFAULT_DEADLINE,
    MAX_RESULTS,
};
use crate::symbols::sink::{FailureSink, TracingFailureSink};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

/// Label shown for the workspace-wide provider
pub const PROVIDER_NAME: &str = "Symbols in Workspace";

/// Something that answers symbol queries for a UI or CLI
#[async_trait]
pub trait SymbolsProvider: Send + Sync {
    /// Human-readable label
    fn name(&self) -> &str;

    /// Run one query to completion
    async fn fetch(&self, query: &str) -> Result<AggregatedResult>;

    /// Whether records come from a single file rather than the workspace
    fn originates_from_file(&self, record: &SymbolRecord) -> bool;
}

/// Query limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    /// Deadline for the whole fan-out
    pub deadline: Duration,

    /// Maximum number of records returned
    pub max_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            max_results: MAX_RESULTS,
        }
    }
}

/// Fans a query out to every capable backend in scope and merges the
/// answers.
///
/// Each `fetch` is independent: backends are looked up again, dispatched
/// again, and nothing is retained once the result is returned.
pub struct WorkspaceSymbolsProvider {
    supplier: Arc<dyn BackendSupplier>,
    scope: Option<ProjectScope>,
    settings: SearchSettings,
    sink: Arc<dyn FailureSink>,
}

impl WorkspaceSymbolsProvider {
    /// Provider over every active backend
    pub fn new(supplier: Arc<dyn BackendSupplier>) -> Self {
        Self {
            supplier,
            scope: None,
            settings: SearchSettings::default(),
            sink: Arc::new(TracingFailureSink),
        }
    }

    /// Provider scoped to a project, resolved again on every fetch
    pub fn for_project(supplier: Arc<dyn BackendSupplier>, project: ProjectScope) -> Self {
        Self {
            scope: Some(project),
            ..Self::new(supplier)
        }
    }

    /// Provider over the backends a project has right now.
    ///
    /// Returns `None` when the project has no capable backend.
    pub async fn snapshot_for_project(
        supplier: &dyn BackendSupplier,
        project: ProjectScope,
    ) -> Result<Option<Self>> {
        let backends = supplier.backends(Some(&project)).await?;
        if backends.is_empty() {
            debug!("No workspace symbol backends for {}", project.root().display());
            return Ok(None);
        }
        Ok(Some(Self::for_project(
            Arc::new(StaticSupplier::new(backends)),
            project,
        )))
    }

    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    pub fn scope(&self) -> Option<&ProjectScope> {
        self.scope.as_ref()
    }

    /// Run `fetch` from synchronous code.
    ///
    /// Uses a private current-thread runtime; refuses to run inside an
    /// existing runtime rather than block one of its threads.
    pub fn fetch_blocking(&self, query: &str) -> Result<AggregatedResult> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(SymbolError::Runtime(
                "fetch_blocking called inside an async runtime, use fetch".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SymbolError::Runtime(e.to_string()))?;

        runtime.block_on(self.fetch(query))
    }

    /// Location of a record, asking its origin backend when the record was
    /// produced lazily
    pub async fn resolve_location(&self, record: &SymbolRecord) -> Result<Option<Location>> {
        if let Some(location) = record.location() {
            return Ok(Some(location.clone()));
        }

        let backends = self.load_backends().await?;
        let backend = backends
            .into_iter()
            .find(|b| b.id() == record.origin())
            .ok_or_else(|| SymbolError::BackendUnavailable(record.origin().clone()))?;

        match tokio::time::timeout(self.settings.deadline, backend.resolve_symbol(record)).await {
            Ok(resolved) => resolved,
            Err(_) => Err(SymbolError::Timeout {
                backend: record.origin().clone(),
                elapsed_ms: self.settings.deadline.as_millis() as u64,
            }),
        }
    }

    async fn load_backends(&self) -> Result<Vec<Arc<dyn SymbolBackend>>> {
        self.supplier
            .backends(self.scope.as_ref())
            .await
            .map_err(|e| match e {
                SymbolError::BackendList(_) => e,
                other => SymbolError::BackendList(other.to_string()),
            })
    }
}

#[async_trait]
impl SymbolsProvider for WorkspaceSymbolsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(&self, query: &str) -> Result<AggregatedResult> {
        let query_id = Uuid::new_v4();
        let span = info_span!("workspace_symbols", %query_id, query = %query);

        async move {
            let backends = self.load_backends().await?;
            let request = QueryRequest::new(query);

            let fan_out = QueryDispatcher::new(Arc::clone(&self.sink)).dispatch(&request, backends);
            let settled = TimeoutGovernor::new(self.settings.deadline)
                .settle(fan_out, self.sink.as_ref())
                .await;
            let elapsed = settled.elapsed;
            let result = ResultAggregator::new(self.settings.max_results).aggregate(settled);

            info!(
                "Workspace symbol query returned {} records in {}ms ({} responded, {} failed, {} timed out)",
                result.len(),
                elapsed.as_millis(),
                result.count_in_state(BackendState::Responded),
                result.count_in_state(BackendState::Failed),
                result.count_in_state(BackendState::TimedOut),
            );

            Ok(result)
        }
        .instrument(span)
        .await
    }

    fn originates_from_file(&self, _record: &SymbolRecord) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::backend::BackendCapabilities;
    use crate::symbols::models::{BackendId, Position, Range};
    use crate::symbols::wire::{RawBackendResult, WorkspaceSymbol, WorkspaceSymbolLocation};
    use serde_json::json;

    struct LazyBackend {
        id: BackendId,
    }

    #[async_trait]
    impl SymbolBackend for LazyBackend {
        fn id(&self) -> &BackendId {
            &self.id
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                workspace_symbol: true,
                workspace_symbol_resolve: true,
            }
        }

        async fn workspace_symbols(&self, request: &QueryRequest) -> Result<RawBackendResult> {
            Ok(RawBackendResult::Workspace(vec![WorkspaceSymbol {
                name: request.query.clone(),
                kind: crate::symbols::models::SymbolKind::Class,
                tags: None,
                container_name: None,
                location: WorkspaceSymbolLocation::UriOnly {
                    uri: "file:///src/lib.rs".to_string(),
                },
                data: Some(json!(1)),
            }]))
        }

        async fn resolve_symbol(&self, record: &SymbolRecord) -> Result<Option<Location>> {
            Ok(record.deferred().map(|d| Location {
                uri: d.uri.clone(),
                range: Range::new(Position::new(7, 4), Position::new(7, 9)),
            }))
        }
    }

    fn provider() -> WorkspaceSymbolsProvider {
        let backend: Arc<dyn SymbolBackend> = Arc::new(LazyBackend {
            id: BackendId::new("lazy"),
        });
        WorkspaceSymbolsProvider::new(Arc::new(StaticSupplier::new(vec![backend])))
    }

    #[test]
    fn test_name_and_defaults() {
        let provider = provider();
        assert_eq!(provider.name(), "Symbols in Workspace");
        assert_eq!(provider.settings().deadline, Duration::from_secs(2));
        assert_eq!(provider.settings().max_results, 200);
        assert!(provider.scope().is_none());
    }

    #[tokio::test]
    async fn test_resolve_lazy_record() {
        let provider = provider();
        let result = provider.fetch("Widget").await.unwrap();
        let record = &result.records[0];
        assert!(record.needs_resolution());
        assert!(!provider.originates_from_file(record));

        let location = provider.resolve_location(record).await.unwrap().unwrap();
        assert_eq!(location.uri, "file:///src/lib.rs");
        assert_eq!(location.range.start.line, 7);
    }

    #[tokio::test]
    async fn test_fetch_blocking_refuses_inside_runtime() {
        let err = provider().fetch_blocking("x").unwrap_err();
        assert_eq!(err.error_code(), "RUNTIME_ERROR");
    }

    #[test]
    fn test_fetch_blocking_outside_runtime() {
        let result = provider().fetch_blocking("Widget").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.records[0].name(), "Widget");
    }
}
