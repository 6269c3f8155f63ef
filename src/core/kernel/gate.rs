use crate::core::errors::{CancelReason, OkxError, ValidationError};
use crate::core::kernel::context::CallContext;
use crate::core::types::Request;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::future::pending;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};
use tracing::{instrument, trace};

/// Limits applied to one endpoint key (`"<METHOD> <path>"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointLimit {
    pub max_in_flight: usize,
    /// Optional request rate, with a burst of the same size
    pub per_second: Option<NonZeroU32>,
}

impl Default for EndpointLimit {
    fn default() -> Self {
        Self {
            max_in_flight: 16,
            per_second: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    pub default_limit: EndpointLimit,
    pub overrides: HashMap<String, EndpointLimit>,
}

impl GateConfig {
    pub fn with_default_limit(mut self, limit: EndpointLimit) -> Self {
        self.default_limit = limit;
        self
    }

    /// Override the limit for one endpoint, e.g. `"POST /api/v5/trade/order"`
    pub fn with_endpoint(mut self, key: impl Into<String>, limit: EndpointLimit) -> Self {
        self.overrides.insert(key.into(), limit);
        self
    }

    fn limit_for(&self, key: &str) -> EndpointLimit {
        self.overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_limit)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let zero_slots: Vec<&str> = self
            .overrides
            .iter()
            .filter(|(_, limit)| limit.max_in_flight == 0)
            .map(|(key, _)| key.as_str())
            .collect();

        ValidationError::new("gate config")
            .conflict_if(
                self.default_limit.max_in_flight == 0,
                "default max_in_flight must be at least 1",
            )
            .conflict_if(
                !zero_slots.is_empty(),
                format!("max_in_flight must be at least 1 for {}", zero_slots.join(", ")),
            )
            .into_result()
    }
}

struct EndpointGate {
    slots: Arc<Semaphore>,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl EndpointGate {
    fn new(limit: EndpointLimit) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(limit.max_in_flight)),
            limiter: limit
                .per_second
                .map(|rate| RateLimiter::direct(Quota::per_second(rate))),
        }
    }
}

/// Per-endpoint concurrency and rate gate
///
/// Waiters on one endpoint are served in FIFO order by the underlying semaphore.
pub struct Gate {
    config: GateConfig,
    endpoints: Mutex<HashMap<String, Arc<EndpointGate>>>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Gate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    fn endpoint(&self, key: &str) -> Arc<EndpointGate> {
        let mut endpoints = self
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            endpoints
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(EndpointGate::new(self.config.limit_for(key)))),
        )
    }

    /// Wait for a dispatch slot on the request's endpoint
    ///
    /// Fails with [`OkxError::Gate`] if the context ends or `wait_until` passes first;
    /// nothing has been sent then.
    #[instrument(skip_all, fields(endpoint = %request.endpoint_key()))]
    pub async fn acquire(
        &self,
        ctx: &CallContext,
        request: &Request,
        wait_until: Option<Instant>,
    ) -> Result<GatePermit, OkxError> {
        let key = request.endpoint_key();
        let gate_error = |reason| OkxError::Gate {
            method: request.method().to_string(),
            path: request.request_path(),
            reason,
        };

        if let Some(reason) = ctx.state() {
            return Err(gate_error(reason));
        }
        if wait_until.is_some_and(|at| Instant::now() >= at) {
            return Err(gate_error(CancelReason::DeadlineExceeded));
        }

        let endpoint = self.endpoint(&key);
        let wait = async {
            if let Some(limiter) = &endpoint.limiter {
                limiter.until_ready().await;
            }
            Arc::clone(&endpoint.slots).acquire_owned().await
        };
        let expired = async {
            match wait_until {
                Some(at) => sleep_until(at).await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            reason = ctx.done() => Err(gate_error(reason)),
            () = expired => Err(gate_error(CancelReason::DeadlineExceeded)),
            permit = wait => {
                // slots are never closed, so this only fails if the gate is torn down
                let permit = permit.map_err(|_| gate_error(CancelReason::Cancelled))?;
                trace!(endpoint = %key, "gate slot acquired");
                Ok(GatePermit { key, _permit: permit })
            }
        }
    }

    /// Free slots for an endpoint key such as `"GET /api/v5/public/time"`
    pub fn available(&self, key: &str) -> usize {
        self.endpoint(key).slots.available_permits()
    }
}

/// A held dispatch slot; released by [`GatePermit::release`] or on drop
#[derive(Debug)]
pub struct GatePermit {
    key: String,
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Consumes the permit, so a slot can be released only once
    pub fn release(self) {
        trace!(endpoint = %self.key, "gate slot released");
    }
}
