//! Shared fixtures for the dispatcher integration tests

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use okx_rest::core::kernel::{Backoff, ClientBuilder, Clock, FixedClock, RetryPolicy};
use okx_rest::{Credentials, Dispatcher, OkxConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_SECRET_KEY: &str = "22582BD0CFF14C41EDBF1AB98506286D";
pub const TEST_PASSPHRASE: &str = "test-passphrase";

/// 2020-03-28T12:21:41.274Z
pub const FIXED_MILLIS: i64 = 1_585_398_101_274;
pub const FIXED_TIMESTAMP: &str = "2020-03-28T12:21:41.274Z";

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_credentials() -> Credentials {
    Credentials::new(TEST_API_KEY, TEST_SECRET_KEY, TEST_PASSPHRASE)
}

pub fn signed_config(server: &MockServer) -> OkxConfig {
    OkxConfig::new(test_credentials()).base_url(server.uri())
}

pub fn public_config(server: &MockServer) -> OkxConfig {
    OkxConfig::read_only().base_url(server.uri())
}

/// No delay between attempts
pub fn retry_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_backoff(Backoff::none())
}

pub fn builder(config: OkxConfig, max_retries: u32) -> ClientBuilder {
    Dispatcher::builder(config)
        .with_clock(Arc::new(
            FixedClock::from_millis(FIXED_MILLIS).expect("valid timestamp"),
        ))
        .with_retry_policy(retry_policy(max_retries))
}

pub fn dispatcher(config: OkxConfig, max_retries: u32) -> Dispatcher {
    builder(config, max_retries)
        .build()
        .expect("dispatcher should build")
}

pub fn ok_envelope(data: Value) -> Value {
    json!({ "code": "0", "msg": "", "data": data })
}

pub fn error_envelope(code: &str, msg: &str) -> Value {
    json!({ "code": code, "msg": msg, "data": [] })
}

pub fn ack(ord_id: &str, s_code: &str, s_msg: &str) -> Value {
    json!({ "ordId": ord_id, "clOrdId": "", "tag": "", "sCode": s_code, "sMsg": s_msg })
}

/// Starts at [`FIXED_MILLIS`] and moves forward one second on every read
#[derive(Debug)]
pub struct SteppingClock {
    millis: AtomicI64,
}

impl SteppingClock {
    pub fn new() -> Self {
        Self {
            millis: AtomicI64::new(FIXED_MILLIS),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.fetch_add(1_000, Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).expect("valid timestamp")
    }
}
