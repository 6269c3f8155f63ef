use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Why a call context stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "context cancelled"),
            Self::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// Top-level error for every dispatched call
#[derive(Error, Debug)]
pub enum OkxError {
    /// Raised before the gate; the request never left the process.
    #[error("missing credentials for {method} {path}: api key, secret key and passphrase are required")]
    MissingCredentials { method: String, path: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No dispatch slot was obtained; the request never left the process.
    #[error("gate: {method} {path}: {reason}")]
    Gate {
        method: String,
        path: String,
        reason: CancelReason,
    },

    #[error("transport: {method} {path}: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
        dispatched: bool,
        retryable: bool,
    },

    #[error("{method} {path}: {reason}")]
    Cancelled {
        method: String,
        path: String,
        reason: CancelReason,
        dispatched: bool,
    },

    #[error(transparent)]
    Api(Box<ApiError>),

    #[error("failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to decode {method} {path} data{}: {message}", request_id_suffix(.request_id))]
    Decode {
        method: String,
        path: String,
        request_id: Option<String>,
        message: String,
    },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),
}

fn request_id_suffix(request_id: &Option<String>) -> String {
    request_id
        .as_deref()
        .map_or_else(String::new, |id| format!(" (request id {})", id))
}

impl From<ApiError> for OkxError {
    fn from(err: ApiError) -> Self {
        Self::Api(Box::new(err))
    }
}

impl OkxError {
    /// Whether any bytes of the request may have reached the exchange
    pub fn dispatched(&self) -> bool {
        match self {
            Self::Transport { dispatched, .. } | Self::Cancelled { dispatched, .. } => *dispatched,
            Self::Api(_) | Self::Decode { .. } => true,
            _ => false,
        }
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Key used by the stats histogram for a terminal failure
    pub fn stats_code(&self) -> String {
        match self {
            Self::Api(err) => err.stats_code(),
            Self::MissingCredentials { .. } => "MISSING_CREDENTIALS".to_string(),
            Self::Validation(_) => "VALIDATION".to_string(),
            Self::Gate { .. } => "GATE".to_string(),
            Self::Transport { .. } => "TRANSPORT".to_string(),
            Self::Cancelled { .. } => "CANCELLED".to_string(),
            Self::Serialization(_) => "SERIALIZATION".to_string(),
            Self::Decode { .. } => "DECODE".to_string(),
            Self::Auth(_) => "AUTH".to_string(),
            Self::Config(_) => "CONFIG".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Well-formed envelope with a non-"0" code
    Business,
    InvalidJson,
    InvalidEnvelope,
    EmptyData,
    CardinalityMismatch { expected: usize, got: usize },
    /// Batch in which at least one item carries a non-"0" `sCode`
    PartialFailure { failures: Vec<ItemFailure> },
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Business => write!(f, "business error"),
            Self::InvalidJson => write!(f, "invalid JSON response"),
            Self::InvalidEnvelope => write!(f, "invalid response envelope"),
            Self::EmptyData => write!(f, "empty data"),
            Self::CardinalityMismatch { .. } => write!(f, "cardinality mismatch"),
            Self::PartialFailure { failures } => {
                write!(f, "partial failure ({} item(s) rejected)", failures.len())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub index: usize,
    pub code: String,
    pub message: String,
}

/// Error produced at the response classification boundary
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub http_status: u16,
    pub method: String,
    pub request_path: String,
    pub code: Option<String>,
    pub message: String,
    pub request_id: Option<String>,
    pub raw_body: String,
    /// Envelope items, populated for partial failures so callers keep every ack
    pub data: Vec<Value>,
}

impl ApiError {
    pub fn stats_code(&self) -> String {
        if let Some(code) = self.code.as_deref().filter(|c| !c.is_empty() && *c != "0") {
            return code.to_string();
        }
        if self.http_status >= 400 {
            return format!("HTTP_{}", self.http_status);
        }
        match self.kind {
            ApiErrorKind::Business => "BUSINESS".to_string(),
            ApiErrorKind::InvalidJson => "INVALID_JSON".to_string(),
            ApiErrorKind::InvalidEnvelope => "INVALID_ENVELOPE".to_string(),
            ApiErrorKind::EmptyData => "EMPTY_DATA".to_string(),
            ApiErrorKind::CardinalityMismatch { .. } => "CARDINALITY_MISMATCH".to_string(),
            ApiErrorKind::PartialFailure { .. } => "PARTIAL_FAILURE".to_string(),
        }
    }

    /// Indices of rejected batch items, empty for other kinds
    pub fn failed_indices(&self) -> Vec<usize> {
        match &self.kind {
            ApiErrorKind::PartialFailure { failures } => failures.iter().map(|f| f.index).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "okx {}: {} {} (http {}",
            self.kind, self.method, self.request_path, self.http_status
        )?;
        if let Some(code) = &self.code {
            write!(f, ", code {}", code)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, ", request id {}", request_id)?;
        }
        write!(f, "): {}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Missing or conflicting fields detected before a request is built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub target: &'static str,
    pub missing: Vec<&'static str>,
    pub conflicting: Vec<String>,
}

impl ValidationError {
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Record `field` as missing unless `present`
    pub fn require(mut self, field: &'static str, present: bool) -> Self {
        if !present {
            self.missing.push(field);
        }
        self
    }

    pub fn conflict_if(mut self, conflicting: bool, description: impl Into<String>) -> Self {
        if conflicting {
            self.conflicting.push(description.into());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.conflicting.is_empty()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        if !self.conflicting.is_empty() {
            parts.push(format!("conflicting {}", self.conflicting.join("; ")));
        }
        parts.join("; ")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.target, self.describe())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(kind: ApiErrorKind, status: u16, code: Option<&str>) -> ApiError {
        ApiError {
            kind,
            http_status: status,
            method: "GET".to_string(),
            request_path: "/api/v5/public/time".to_string(),
            code: code.map(str::to_string),
            message: "boom".to_string(),
            request_id: Some("req-1".to_string()),
            raw_body: String::new(),
            data: Vec::new(),
        }
    }

    #[test]
    fn test_stats_code_prefers_business_code() {
        let err = api_error(ApiErrorKind::Business, 429, Some("50011"));
        assert_eq!(err.stats_code(), "50011");
    }

    #[test]
    fn test_stats_code_falls_back_to_http_status() {
        let err = api_error(ApiErrorKind::InvalidJson, 502, None);
        assert_eq!(err.stats_code(), "HTTP_502");

        let err = api_error(ApiErrorKind::EmptyData, 200, Some("0"));
        assert_eq!(err.stats_code(), "EMPTY_DATA");
    }

    #[test]
    fn test_api_error_display_carries_context() {
        let text = api_error(ApiErrorKind::Business, 200, Some("51000")).to_string();
        assert!(text.contains("GET /api/v5/public/time"));
        assert!(text.contains("code 51000"));
        assert!(text.contains("request id req-1"));
    }

    #[test]
    fn test_gate_error_is_not_dispatched() {
        let err = OkxError::Gate {
            method: "GET".to_string(),
            path: "/api/v5/market/ticker".to_string(),
            reason: CancelReason::Cancelled,
        };
        assert!(!err.dispatched());
        assert_eq!(err.stats_code(), "GATE");
    }

    #[test]
    fn test_missing_credentials_names_the_call() {
        let err = OkxError::MissingCredentials {
            method: "GET".to_string(),
            path: "/api/v5/account/balance?ccy=BTC".to_string(),
        };
        assert!(err.to_string().contains("GET /api/v5/account/balance?ccy=BTC"));
        assert!(!err.dispatched());
        assert_eq!(err.stats_code(), "MISSING_CREDENTIALS");
    }

    #[test]
    fn test_decode_error_carries_request_id() {
        let err = OkxError::Decode {
            method: "GET".to_string(),
            path: "/api/v5/public/time".to_string(),
            request_id: Some("req-9".to_string()),
            message: "invalid type".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("GET /api/v5/public/time"));
        assert!(text.contains("request id req-9"));
        assert!(err.dispatched());
        assert_eq!(err.stats_code(), "DECODE");
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let err = ValidationError::new("order")
            .require("instId", false)
            .require("sz", false)
            .require("side", true)
            .conflict_if(true, "px is required for limit orders")
            .into_result()
            .unwrap_err();

        assert_eq!(err.missing, vec!["instId", "sz"]);
        let text = err.to_string();
        assert!(text.contains("missing instId, sz"));
        assert!(text.contains("px is required"));
    }

    #[test]
    fn test_validation_error_empty_is_ok() {
        assert!(ValidationError::new("order")
            .require("instId", true)
            .into_result()
            .is_ok());
    }
}
