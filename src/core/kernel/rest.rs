use crate::core::config::{ConfigError, OkxConfig};
use crate::core::errors::{CancelReason, OkxError};
use crate::core::kernel::clock::{iso_timestamp, Clock, SystemClock};
use crate::core::kernel::context::{AttemptContext, CallContext};
use crate::core::kernel::envelope::{Classifier, Outcome, RawResponse, REQUEST_ID_HEADER};
use crate::core::kernel::gate::{Gate, GateConfig};
use crate::core::kernel::retry::{RetryDecision, RetryPolicy};
use crate::core::kernel::signer::{HmacSigner, Signer};
use crate::core::kernel::stats::{Stats, StatsSnapshot};
use crate::core::types::{Expect, Request};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until};
use tracing::{debug, instrument, warn};

/// Header that routes a request to the demo-trading environment
pub const SIMULATED_TRADING_HEADER: &str = "x-simulated-trading";

/// Entry point every endpoint service funnels through
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Run one logical call: gate, sign, send, retry, classify, record
    ///
    /// # Arguments
    /// * `ctx` - Cancellation signal and time bounds
    /// * `request` - Method, path, query, body and signing flag
    /// * `expect` - Cardinality the caller requires from `data`
    async fn execute(
        &self,
        ctx: &CallContext,
        request: &Request,
        expect: Expect,
    ) -> Result<Outcome, OkxError>;

    /// Copy of the usage counters
    fn stats(&self) -> StatsSnapshot;
}

/// Builder for [`Dispatcher`]; all validation happens in [`ClientBuilder::build`]
pub struct ClientBuilder {
    config: OkxConfig,
    http: Option<Client>,
    clock: Option<Arc<dyn Clock>>,
    signer: Option<Arc<dyn Signer>>,
    retry: Option<RetryPolicy>,
    gate: GateConfig,
}

impl ClientBuilder {
    pub fn new(config: OkxConfig) -> Self {
        Self {
            config,
            http: None,
            clock: None,
            signer: None,
            retry: None,
            gate: GateConfig::default(),
        }
    }

    /// Use a preconfigured HTTP client instead of building one
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the HMAC signer derived from the configured credentials
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Overrides `max_retries` and `retry_rate_limit` from the config
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_gate_config(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    pub fn build(self) -> Result<Dispatcher, OkxError> {
        self.config.validate()?;
        self.gate.validate()?;

        let client = match self.http {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.config.user_agent)
                .build()
                .map_err(|e| {
                    ConfigError::InvalidConfiguration(format!("Failed to build HTTP client: {}", e))
                })?,
        };

        let retry = self.retry.unwrap_or_else(|| {
            RetryPolicy::default()
                .with_max_retries(self.config.max_retries)
                .with_business_code_retry(self.config.retry_rate_limit)
        });

        // partial credentials leave the client unable to sign
        let signer = self.signer.or_else(|| {
            self.config
                .credentials
                .clone()
                .filter(|credentials| credentials.is_complete())
                .map(|credentials| Arc::new(HmacSigner::new(credentials)) as Arc<dyn Signer>)
        });

        Ok(Dispatcher {
            client,
            base_url: self.config.base_url.trim_end_matches('/').to_string(),
            config: self.config,
            signer,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            retry,
            gate: Arc::new(Gate::new(self.gate)),
            stats: Arc::new(Stats::new()),
        })
    }
}

/// Shared dispatcher; clones share the same gate and stats
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    base_url: String,
    config: OkxConfig,
    signer: Option<Arc<dyn Signer>>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    gate: Arc<Gate>,
    stats: Arc<Stats>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url)
            .field("simulated", &self.config.simulated)
            .field("has_signer", &self.signer.is_some())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(config: OkxConfig) -> Result<Self, OkxError> {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: OkxConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Attempt loop; returns the result and the retries consumed
    async fn run(
        &self,
        ctx: &CallContext,
        request: &Request,
        expect: Expect,
    ) -> (Result<Outcome, OkxError>, u32) {
        if request.is_signed() && self.signer.is_none() {
            return (Err(missing_credentials(request)), 0);
        }

        let request_path = request.request_path();
        let classifier = Classifier::new(
            request.method().as_str(),
            &request_path,
            request.format(),
            expect,
        );
        let mut delays = self.retry.backoff.schedule();
        let mut retries = 0;

        loop {
            let attempt = ctx.attempt(retries, self.config.timeout);
            let err = match self
                .attempt(ctx, attempt, request, &request_path, &classifier)
                .await
            {
                Ok(outcome) => return (Ok(outcome), retries),
                Err(err) => err,
            };

            if self.retry.decide(request.method(), &err, retries) == RetryDecision::Stop {
                return (Err(err), retries);
            }

            let delay = delays.next().unwrap_or(self.retry.backoff.max);
            debug!(attempt = retries, ?delay, error = %err, "retrying request");
            if let Err(reason) = backoff(ctx, delay).await {
                return (
                    Err(OkxError::Cancelled {
                        method: request.method().to_string(),
                        path: request_path.clone(),
                        reason,
                        dispatched: err.dispatched(),
                    }),
                    retries,
                );
            }
            retries += 1;
        }
    }

    #[instrument(skip_all, fields(attempt = attempt.index))]
    async fn attempt(
        &self,
        ctx: &CallContext,
        attempt: AttemptContext,
        request: &Request,
        request_path: &str,
        classifier: &Classifier<'_>,
    ) -> Result<Outcome, OkxError> {
        let permit = self
            .gate
            .acquire(ctx, request, Some(attempt.deadline))
            .await?;
        let deadline = attempt.send_deadline(ctx);

        let url = format!("{}{}", self.base_url, request_path);
        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .header(ACCEPT, request.format().accept_header());

        if self.config.simulated {
            builder = builder.header(SIMULATED_TRADING_HEADER, "1");
        }

        if request.is_signed() {
            let signer = self
                .signer
                .as_ref()
                .ok_or_else(|| missing_credentials(request))?;
            // fresh per attempt; retries can span real time
            let timestamp = iso_timestamp(&self.clock.now());
            let headers = signer.sign_request(
                &timestamp,
                request.method().as_str(),
                request_path,
                request.body(),
            )?;
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
        }

        if request.has_body() {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(request.body().to_string());
        }

        let call = async {
            let response = builder.send().await?;
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };
            let status = response.status().as_u16();
            let content_type = header(CONTENT_TYPE.as_str());
            let request_id = header(REQUEST_ID_HEADER);
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(RawResponse {
                status,
                content_type,
                request_id,
                body,
            })
        };

        let method = request.method().to_string();
        let received = tokio::select! {
            biased;
            reason = ctx.done() => Err(OkxError::Cancelled {
                method: method.clone(),
                path: request_path.to_string(),
                reason,
                dispatched: true,
            }),
            () = sleep_until(deadline) => Err(OkxError::Transport {
                method: method.clone(),
                path: request_path.to_string(),
                message: format!("request timed out after {:?}", attempt.timeout),
                dispatched: true,
                retryable: true,
            }),
            result = call => result.map_err(|e| transport_error(&method, request_path, &e)),
        };
        permit.release();

        let raw = received?;
        let payload = classifier.classify(&raw)?;
        Ok(Outcome {
            method,
            request_path: request_path.to_string(),
            request_id: raw.request_id,
            payload,
        })
    }
}

#[async_trait]
impl Dispatch for Dispatcher {
    #[instrument(skip(self, ctx, request), fields(method = %request.method(), path = %request.path(), signed = request.is_signed()))]
    async fn execute(
        &self,
        ctx: &CallContext,
        request: &Request,
        expect: Expect,
    ) -> Result<Outcome, OkxError> {
        let (result, retries) = self.run(ctx, request, expect).await;
        match &result {
            Ok(_) => self.stats.record_attempt(true, retries, None),
            Err(err) => {
                warn!(error = %err, retries, "request failed");
                self.stats
                    .record_attempt(false, retries, Some(&err.stats_code()));
            }
        }
        result
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

fn missing_credentials(request: &Request) -> OkxError {
    OkxError::MissingCredentials {
        method: request.method().to_string(),
        path: request.request_path(),
    }
}

/// Cancellable sleep between attempts
async fn backoff(ctx: &CallContext, delay: Duration) -> Result<(), CancelReason> {
    if let Some(reason) = ctx.state() {
        return Err(reason);
    }
    tokio::select! {
        biased;
        reason = ctx.done() => Err(reason),
        () = sleep(delay) => Ok(()),
    }
}

/// Connect failures never left the process; timeouts, resets and body errors may have
fn transport_error(method: &str, path: &str, err: &reqwest::Error) -> OkxError {
    let (retryable, dispatched) = if err.is_builder() {
        (false, false)
    } else if err.is_connect() {
        (true, false)
    } else if err.is_timeout() || err.is_request() || err.is_body() {
        (true, true)
    } else {
        (false, true)
    };

    OkxError::Transport {
        method: method.to_string(),
        path: path.to_string(),
        message: err.to_string(),
        dispatched,
        retryable,
    }
}
