use crate::core::errors::CancelReason;
use std::future::pending;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Caller-supplied cancellation signal and time bounds for one logical call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Overall deadline for the logical call, retries included
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Per-attempt timeout, overriding the client default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Non-blocking check
    pub fn state(&self) -> Option<CancelReason> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Some(CancelReason::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelReason::DeadlineExceeded);
        }
        None
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> CancelReason {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => CancelReason::Cancelled,
            () = expired => CancelReason::DeadlineExceeded,
        }
    }

    /// Fresh bounds for attempt `index`
    pub(crate) fn attempt(&self, index: u32, default_timeout: Duration) -> AttemptContext {
        let timeout = self.timeout.unwrap_or(default_timeout);
        AttemptContext {
            index,
            deadline: self.bound(Instant::now() + timeout),
            timeout,
        }
    }

    /// The earlier of `at` and the caller's deadline
    fn bound(&self, at: Instant) -> Instant {
        match self.deadline {
            Some(caller) if caller < at => caller,
            _ => at,
        }
    }
}

/// Per-attempt state, never shared between attempts
///
/// `deadline` bounds the gate wait; the HTTP exchange gets a fresh `timeout` once a
/// slot is held.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttemptContext {
    pub index: u32,
    pub deadline: Instant,
    pub timeout: Duration,
}

impl AttemptContext {
    /// Deadline for the HTTP exchange, started after the gate slot is held
    pub(crate) fn send_deadline(&self, ctx: &CallContext) -> Instant {
        ctx.bound(Instant::now() + self.timeout)
    }
}
