use crate::error::SymbolError;
use crate::symbols::backend::SymbolBackend;
use crate::symbols::models::{BackendId, BackendState, QueryRequest, SymbolRecord};
use crate::symbols::normalizer::normalize;
use crate::symbols::sink::FailureSink;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tracing::debug;

/// Settled contribution of one backend
#[derive(Debug)]
pub struct BackendResponse {
    /// Position of the backend in the dispatched list
    pub slot: usize,
    pub backend: BackendId,
    pub state: BackendState,
    pub records: Vec<SymbolRecord>,
}

/// Outstanding per-backend calls of one query
pub struct FanOut {
    pub(crate) tasks: JoinSet<BackendResponse>,
    pub(crate) backends: Vec<BackendId>,
    /// Slot of each spawned task, for tasks that end without a response
    pub(crate) slots: HashMap<Id, usize>,
    pub(crate) started: Instant,
}

impl FanOut {
    /// Backends the query was sent to, by slot
    pub fn backends(&self) -> &[BackendId] {
        &self.backends
    }

    /// When the fan-out began
    pub fn started(&self) -> Instant {
        self.started
    }
}

/// Issues one query to every backend concurrently
pub struct QueryDispatcher {
    sink: Arc<dyn FailureSink>,
}

impl QueryDispatcher {
    pub fn new(sink: Arc<dyn FailureSink>) -> Self {
        Self { sink }
    }

    /// Spawn one task per backend. Each task normalizes its own answer and
    /// turns any failure into an empty contribution after reporting it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, request: &QueryRequest, backends: Vec<Arc<dyn SymbolBackend>>) -> FanOut {
        let started = Instant::now();
        let mut tasks = JoinSet::new();
        let mut ids = Vec::with_capacity(backends.len());
        let mut slots = HashMap::with_capacity(backends.len());

        for (slot, backend) in backends.into_iter().enumerate() {
            ids.push(backend.id().clone());
            let handle = tasks.spawn(call_backend(
                slot,
                backend,
                request.clone(),
                Arc::clone(&self.sink),
            ));
            slots.insert(handle.id(), slot);
        }

        debug!("Dispatched query {:?} to {} backends", request.query, ids.len());

        FanOut {
            tasks,
            backends: ids,
            slots,
            started,
        }
    }
}

async fn call_backend(
    slot: usize,
    backend: Arc<dyn SymbolBackend>,
    request: QueryRequest,
    sink: Arc<dyn FailureSink>,
) -> BackendResponse {
    let id = backend.id().clone();

    let outcome = AssertUnwindSafe(backend.workspace_symbols(&request))
        .catch_unwind()
        .await;

    let failure = match outcome {
        Ok(Ok(raw)) => {
            let records = normalize(raw, &id);
            debug!("Backend {} returned {} symbols", id, records.len());
            return BackendResponse {
                slot,
                backend: id,
                state: BackendState::Responded,
                records,
            };
        }
        Ok(Err(e)) => e,
        Err(panic) => SymbolError::Panicked(panic_message(panic.as_ref())),
    };

    sink.report(&SymbolError::backend(id.clone(), failure));

    BackendResponse {
        slot,
        backend: id,
        state: BackendState::Failed,
        records: Vec::new(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
