//! Common test utilities for symbol query testing
//!
//! Scripted backends with configurable latency and answers, plus a failure
//! sink that records what it was told.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use workspace_symbols::error::{Result, SymbolError};
use workspace_symbols::symbols::{
    BackendCapabilities, BackendId, FailureSink, Location, Position, QueryRequest, Range,
    RawBackendResult, SymbolBackend, SymbolInformation, SymbolKind, WorkspaceSymbol,
    WorkspaceSymbolLocation,
};

/// What a mock backend answers with
#[derive(Debug, Clone)]
pub enum Reply {
    /// `count` legacy `SymbolInformation` records
    Legacy(usize),
    /// `count` `WorkspaceSymbol` records with full locations
    Workspace(usize),
    /// `count` `WorkspaceSymbol` records with only a URI
    Lazy(usize),
    Fail(String),
    Panic,
    /// Never answers
    Hang,
}

pub struct MockBackend {
    id: BackendId,
    reply: Reply,
    delay: Duration,
    capable: bool,
    calls: AtomicUsize,
    shutdowns: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new(id: &str, reply: Reply) -> Self {
        Self {
            id: BackendId::new(id),
            reply,
            delay: Duration::ZERO,
            capable: true,
            calls: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub fn legacy(id: &str, count: usize) -> Self {
        Self::new(id, Reply::Legacy(count))
    }

    pub fn workspace(id: &str, count: usize) -> Self {
        Self::new(id, Reply::Workspace(count))
    }

    pub fn failing(id: &str, message: &str) -> Self {
        Self::new(id, Reply::Fail(message.to_string()))
    }

    pub fn hanging(id: &str) -> Self {
        Self::new(id, Reply::Hang)
    }

    pub fn with_delay(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    /// Does not advertise workspace symbol search
    pub fn incapable(mut self) -> Self {
        self.capable = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().clone()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Upcast helper for supplier lists
pub fn dyn_backend(backend: &Arc<MockBackend>) -> Arc<dyn SymbolBackend> {
    backend.clone()
}

#[async_trait]
impl SymbolBackend for MockBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            workspace_symbol: self.capable,
            workspace_symbol_resolve: false,
        }
    }

    async fn workspace_symbols(&self, request: &QueryRequest) -> Result<RawBackendResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock() = Some(request.query.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.reply {
            Reply::Legacy(count) => Ok(RawBackendResult::Legacy(
                (0..*count).map(|i| legacy_symbol(&self.id, i)).collect(),
            )),
            Reply::Workspace(count) => Ok(RawBackendResult::Workspace(
                (0..*count)
                    .map(|i| workspace_symbol(&self.id, i, true))
                    .collect(),
            )),
            Reply::Lazy(count) => Ok(RawBackendResult::Workspace(
                (0..*count)
                    .map(|i| workspace_symbol(&self.id, i, false))
                    .collect(),
            )),
            Reply::Fail(message) => Err(SymbolError::Protocol(message.clone())),
            Reply::Panic => panic!("{} blew up", self.id),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Symbol name `<backend>_<index>`, so tests can tell where a record came from
pub fn symbol_name(backend: &BackendId, index: usize) -> String {
    format!("{}_{}", backend, index)
}

fn location(backend: &BackendId, index: usize) -> Location {
    let line = index as u32;
    Location {
        uri: format!("file:///work/{}/src/lib.rs", backend),
        range: Range::new(Position::new(line, 0), Position::new(line, 8)),
    }
}

fn legacy_symbol(backend: &BackendId, index: usize) -> SymbolInformation {
    SymbolInformation {
        name: symbol_name(backend, index),
        kind: SymbolKind::Function,
        tags: None,
        deprecated: None,
        location: location(backend, index),
        container_name: Some("module".to_string()),
    }
}

fn workspace_symbol(backend: &BackendId, index: usize, resolved: bool) -> WorkspaceSymbol {
    let location = location(backend, index);
    WorkspaceSymbol {
        name: symbol_name(backend, index),
        kind: SymbolKind::Struct,
        tags: None,
        container_name: None,
        location: if resolved {
            WorkspaceSymbolLocation::Full(location)
        } else {
            WorkspaceSymbolLocation::UriOnly { uri: location.uri }
        },
        data: None,
    }
}

/// Failure sink that keeps every report
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Error codes in report order
    pub fn codes(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(code, _)| code.clone()).collect()
    }

    /// Backends named by reports, in report order
    pub fn backends(&self) -> Vec<String> {
        self.reports
            .lock()
            .iter()
            .filter_map(|(_, backend)| backend.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl FailureSink for RecordingSink {
    fn report(&self, error: &SymbolError) {
        self.reports.lock().push((
            error.error_code().to_string(),
            error.backend_id().map(|b| b.to_string()),
        ));
    }
}
