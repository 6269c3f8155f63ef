use crate::core::errors::{ApiErrorKind, OkxError};
use reqwest::Method;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

/// Business code the exchange returns when a request is rate limited
pub const RATE_LIMIT_CODE: &str = "50011";

/// Predicate selecting business codes eligible for retry
pub type CodePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Exponential backoff between attempts: `2·unit, 4·unit, 8·unit, …` capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub unit: Duration,
    pub max: Duration,
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            unit: Duration::from_millis(100),
            max: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Retry immediately
    pub const fn none() -> Self {
        Self {
            unit: Duration::ZERO,
            max: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delays for one logical call, first retry first
    pub fn schedule(&self) -> impl Iterator<Item = Duration> {
        let with_jitter = self.jitter;
        ExponentialBackoff::from_millis(2)
            .factor(self.unit.as_millis() as u64)
            .max_delay(self.max)
            .map(move |delay| if with_jitter { jitter(delay) } else { delay })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Decides whether a failed attempt is tried again
///
/// Only idempotent methods (GET by default) are retried, and only for retryable
/// transport faults, HTTP 5xx, or opted-in business codes.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_business_codes: bool,
    pub backoff: Backoff,
    retryable_code: CodePredicate,
    idempotent_methods: Vec<Method>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("retry_business_codes", &self.retry_business_codes)
            .field("backoff", &self.backoff)
            .field("idempotent_methods", &self.idempotent_methods)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_business_codes: false,
            backoff: Backoff::default(),
            retryable_code: Arc::new(|code| code == RATE_LIMIT_CODE),
            idempotent_methods: vec![Method::GET],
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Opt in to retrying business errors matched by the code predicate
    pub fn with_business_code_retry(mut self, enabled: bool) -> Self {
        self.retry_business_codes = enabled;
        self
    }

    /// Replace the code predicate (defaults to [`RATE_LIMIT_CODE`])
    pub fn with_retryable_codes<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.retryable_code = Arc::new(predicate);
        self
    }

    pub fn with_idempotent_methods(mut self, methods: Vec<Method>) -> Self {
        self.idempotent_methods = methods;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn is_idempotent(&self, method: &Method) -> bool {
        self.idempotent_methods.contains(method)
    }

    /// Whether `err` could succeed on another attempt, ignoring the budget
    pub fn is_retryable(&self, method: &Method, err: &OkxError) -> bool {
        if !self.is_idempotent(method) {
            return false;
        }

        match err {
            OkxError::Transport { retryable, .. } => *retryable,
            OkxError::Api(api) if api.http_status >= 500 => true,
            OkxError::Api(api) => {
                api.kind == ApiErrorKind::Business
                    && self.retry_business_codes
                    && api
                        .code
                        .as_deref()
                        .is_some_and(|code| (self.retryable_code)(code))
            }
            _ => false,
        }
    }

    pub fn decide(&self, method: &Method, err: &OkxError, retries_used: u32) -> RetryDecision {
        if retries_used < self.max_retries && self.is_retryable(method, err) {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}
