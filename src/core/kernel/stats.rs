use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Point-in-time copy of the client counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub request_total: u64,
    pub success_total: u64,
    pub failure_total: u64,
    pub retry_total: u64,
    pub error_code_counts: HashMap<String, u64>,
}

/// Usage counters shared by every call on a client
///
/// One record per logical call; `success_total + failure_total == request_total`.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsSnapshot>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// `retries` counts attempts beyond the first; `error_code` is ignored on success
    pub fn record_attempt(&self, success: bool, retries: u32, error_code: Option<&str>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.request_total += 1;
        inner.retry_total += u64::from(retries);
        if success {
            inner.success_total += 1;
        } else {
            inner.failure_total += 1;
            let code = error_code.filter(|c| !c.is_empty()).unwrap_or("UNKNOWN");
            *inner.error_code_counts.entry(code.to_string()).or_insert(0) += 1;
        }
    }

    /// Deep copy; mutating it never touches the live counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        StatsSnapshot {
            request_total: inner.request_total,
            success_total: inner.success_total,
            failure_total: inner.failure_total,
            retry_total: inner.retry_total,
            error_code_counts: inner
                .error_code_counts
                .iter()
                .map(|(code, count)| (code.clone(), *count))
                .collect(),
        }
    }
}
