use crate::error::SymbolError;
use tracing::warn;

/// Receives failures that a query recovers from locally
pub trait FailureSink: Send + Sync {
    fn report(&self, error: &SymbolError);
}

/// Reports failures through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailureSink;

impl FailureSink for TracingFailureSink {
    fn report(&self, error: &SymbolError) {
        match error.backend_id() {
            Some(backend) => warn!(
                backend = %backend,
                error_code = error.error_code(),
                "Symbol backend failure: {}",
                error
            ),
            None => warn!(
                error_code = error.error_code(),
                "Symbol query failure: {}",
                error
            ),
        }
    }
}
