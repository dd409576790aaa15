use crate::symbols::governor::Settled;
use crate::symbols::models::{AggregatedResult, BackendOutcome, MAX_RESULTS};

/// Merges settled responses into one bounded list
#[derive(Debug, Clone, Copy)]
pub struct ResultAggregator {
    max_results: usize,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(MAX_RESULTS)
    }
}

impl ResultAggregator {
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Concatenate records in response arrival order, keeping each
    /// backend's own order, and cut at `max_results`.
    pub fn aggregate(&self, settled: Settled) -> AggregatedResult {
        let total: usize = settled.responses.iter().map(|r| r.records.len()).sum();
        let mut records = Vec::with_capacity(total.min(self.max_results));
        let mut outcomes = Vec::with_capacity(settled.responses.len() + settled.dropped.len());

        for response in settled.responses {
            outcomes.push(BackendOutcome {
                backend: response.backend,
                state: response.state,
                record_count: response.records.len(),
            });

            let room = self.max_results.saturating_sub(records.len());
            records.extend(response.records.into_iter().take(room));
        }

        outcomes.extend(settled.dropped);

        AggregatedResult {
            truncated: total - records.len(),
            records,
            outcomes,
        }
    }
}
