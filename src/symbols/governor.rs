use crate::error::SymbolError;
use crate::symbols::dispatcher::{BackendResponse, FanOut};
use crate::symbols::models::{BackendId, BackendOutcome, BackendState};
use crate::symbols::sink::FailureSink;
use std::time::Duration;
use tokio::time::timeout_at;
use tracing::{debug, error};

/// Everything that settled before the deadline
#[derive(Debug, Default)]
pub struct Settled {
    /// Responses in arrival order, failed backends included
    pub responses: Vec<BackendResponse>,

    /// Backends dropped without a response
    pub dropped: Vec<BackendOutcome>,

    /// Time from fan-out start until settlement
    pub elapsed: Duration,
}

/// Bounds the whole fan-out by a single deadline
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGovernor {
    deadline: Duration,
}

impl TimeoutGovernor {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Wait for every backend or the deadline, whichever is first.
    ///
    /// The deadline counts from the start of the fan-out. Calls still
    /// outstanding when it passes are aborted and reported as timed out;
    /// nothing they produce afterwards is observed.
    pub async fn settle(&self, fan_out: FanOut, sink: &dyn FailureSink) -> Settled {
        let FanOut {
            mut tasks,
            backends,
            slots,
            started,
        } = fan_out;

        // A deadline past the clock's range means no deadline
        let deadline = started.checked_add(self.deadline);
        let mut settled = vec![false; backends.len()];
        let mut responses = Vec::with_capacity(backends.len());
        let mut dropped = Vec::new();
        let mut deadline_hit = false;

        loop {
            let next = match deadline {
                Some(deadline) => timeout_at(deadline, tasks.join_next()).await,
                None => Ok(tasks.join_next().await),
            };
            match next {
                Ok(Some(Ok(response))) => {
                    settled[response.slot] = true;
                    responses.push(response);
                }
                Ok(Some(Err(join_err))) => {
                    error!("Symbol backend task did not complete: {}", join_err);
                    if let Some(&slot) = slots.get(&join_err.id()) {
                        settled[slot] = true;
                        let backend = &backends[slot];
                        sink.report(&SymbolError::backend(
                            backend.clone(),
                            SymbolError::Panicked(join_err.to_string()),
                        ));
                        dropped.push(dropped_outcome(backend, BackendState::Failed));
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    break;
                }
            }
        }

        tasks.abort_all();

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        let mut outstanding = 0;

        for (slot, backend) in backends.iter().enumerate() {
            if settled[slot] {
                continue;
            }
            let state = if deadline_hit {
                sink.report(&SymbolError::Timeout {
                    backend: backend.clone(),
                    elapsed_ms,
                });
                outstanding += 1;
                BackendState::TimedOut
            } else {
                sink.report(&SymbolError::backend(
                    backend.clone(),
                    SymbolError::Panicked("task ended without a response".to_string()),
                ));
                BackendState::Failed
            };
            dropped.push(dropped_outcome(backend, state));
        }

        if deadline_hit && responses.is_empty() && !backends.is_empty() {
            sink.report(&SymbolError::DeadlineExceeded {
                elapsed_ms,
                outstanding,
            });
        }

        debug!(
            "Fan-out settled in {}ms: {} responded, {} dropped",
            elapsed_ms,
            responses.len(),
            dropped.len()
        );

        Settled {
            responses,
            dropped,
            elapsed,
        }
    }
}

fn dropped_outcome(backend: &BackendId, state: BackendState) -> BackendOutcome {
    BackendOutcome {
        backend: backend.clone(),
        state,
        record_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::symbols::backend::{BackendCapabilities, SymbolBackend};
    use crate::symbols::dispatcher::QueryDispatcher;
    use crate::symbols::models::{QueryRequest, DEFAULT_DEADLINE};
    use crate::symbols::wire::RawBackendResult;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::task::JoinSet;
    use tokio::time::Instant;

    #[derive(Default)]
    struct CollectingSink {
        codes: Mutex<Vec<String>>,
    }

    impl FailureSink for CollectingSink {
        fn report(&self, error: &SymbolError) {
            self.codes.lock().push(error.error_code().to_string());
        }
    }

    struct SlowBackend {
        id: BackendId,
        delay: Duration,
    }

    #[async_trait]
    impl SymbolBackend for SlowBackend {
        fn id(&self) -> &BackendId {
            &self.id
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                workspace_symbol: true,
                workspace_symbol_resolve: false,
            }
        }

        async fn workspace_symbols(&self, _request: &QueryRequest) -> Result<RawBackendResult> {
            tokio::time::sleep(self.delay).await;
            Ok(RawBackendResult::Legacy(vec![]))
        }
    }

    fn slow(id: &str, millis: u64) -> Arc<dyn SymbolBackend> {
        Arc::new(SlowBackend {
            id: BackendId::new(id),
            delay: Duration::from_millis(millis),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_respond_before_deadline() {
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = QueryDispatcher::new(sink.clone());
        let governor = TimeoutGovernor::new(DEFAULT_DEADLINE);

        let fan_out = dispatcher.dispatch(
            &QueryRequest::new("q"),
            vec![slow("late", 300), slow("early", 100)],
        );
        let settled = governor.settle(fan_out, sink.as_ref()).await;

        let order: Vec<_> = settled
            .responses
            .iter()
            .map(|r| r.backend.to_string())
            .collect();
        assert_eq!(order, vec!["early", "late"]);
        assert!(settled.dropped.is_empty());
        assert!(sink.codes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_dropped_at_deadline() {
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = QueryDispatcher::new(sink.clone());
        let governor = TimeoutGovernor::new(DEFAULT_DEADLINE);

        let start = Instant::now();
        let fan_out = dispatcher.dispatch(
            &QueryRequest::new("q"),
            vec![slow("hung", 60_000), slow("fast", 50)],
        );
        let settled = governor.settle(fan_out, sink.as_ref()).await;

        assert!(start.elapsed() >= DEFAULT_DEADLINE);
        assert!(start.elapsed() < DEFAULT_DEADLINE + Duration::from_millis(100));
        assert_eq!(settled.responses.len(), 1);
        assert_eq!(settled.dropped.len(), 1);
        assert_eq!(settled.dropped[0].state, BackendState::TimedOut);
        assert_eq!(settled.dropped[0].backend.as_str(), "hung");
        assert_eq!(*sink.codes.lock(), vec!["BACKEND_TIMEOUT".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_before_deadline() {
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = QueryDispatcher::new(sink.clone());
        let governor = TimeoutGovernor::new(Duration::from_millis(500));

        let fan_out = dispatcher.dispatch(
            &QueryRequest::new("q"),
            vec![slow("a", 10_000), slow("b", 10_000)],
        );
        let settled = governor.settle(fan_out, sink.as_ref()).await;

        assert!(settled.responses.is_empty());
        assert_eq!(settled.dropped.len(), 2);
        let codes = sink.codes.lock();
        assert_eq!(codes.len(), 3);
        assert_eq!(codes.last().map(String::as_str), Some("DEADLINE_EXCEEDED"));
    }

    #[tokio::test]
    async fn test_empty_fan_out_settles_immediately() {
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = QueryDispatcher::new(sink.clone());
        let governor = TimeoutGovernor::new(DEFAULT_DEADLINE);

        let fan_out = dispatcher.dispatch(&QueryRequest::new("q"), vec![]);
        let settled = governor.settle(fan_out, sink.as_ref()).await;

        assert!(settled.responses.is_empty());
        assert!(settled.dropped.is_empty());
        assert!(settled.elapsed < DEFAULT_DEADLINE);
        assert!(sink.codes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_task_lost_to_panic_is_reported() {
        let sink = CollectingSink::default();
        let governor = TimeoutGovernor::new(DEFAULT_DEADLINE);

        let mut tasks: JoinSet<BackendResponse> = JoinSet::new();
        let mut slots = HashMap::new();
        let handle = tasks.spawn(async { panic!("worker crashed") });
        slots.insert(handle.id(), 0);
        let fan_out = FanOut {
            tasks,
            backends: vec![BackendId::new("crashing")],
            slots,
            started: Instant::now(),
        };

        let settled = governor.settle(fan_out, &sink).await;

        assert!(settled.responses.is_empty());
        assert_eq!(settled.dropped.len(), 1);
        assert_eq!(settled.dropped[0].state, BackendState::Failed);
        assert_eq!(settled.dropped[0].backend.as_str(), "crashing");
        assert_eq!(*sink.codes.lock(), vec!["BACKEND_FAILED".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_deadline_waits_for_every_backend() {
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = QueryDispatcher::new(sink.clone());
        let governor = TimeoutGovernor::new(Duration::MAX);

        let fan_out = dispatcher.dispatch(
            &QueryRequest::new("q"),
            vec![slow("slow", 10_000), slow("fast", 10)],
        );
        let settled = governor.settle(fan_out, sink.as_ref()).await;

        assert_eq!(settled.responses.len(), 2);
        assert!(settled.dropped.is_empty());
        assert!(settled.elapsed >= Duration::from_millis(10_000));
        assert!(sink.codes.lock().is_empty());
    }
}
