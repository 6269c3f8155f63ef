use crate::core::errors::{OkxError, ValidationError};
use reqwest::Method;
use serde::Serialize;
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Payload shape the caller asks the exchange for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    /// Simple Binary Encoding, with a JSON error fallback
    Sbe,
}

impl ResponseFormat {
    pub const fn accept_header(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Sbe => "application/sbe",
        }
    }
}

/// Cardinality the caller expects from the envelope `data` array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Any number of rows, including zero
    Rows,
    /// Zero rows is an `EmptyData` error
    AtLeastOne,
    /// Exactly `n` per-item acknowledgements, each checked for `sCode`
    Acks(usize),
    /// Per-item `sCode` check without a count requirement
    Batch,
}

/// Immutable description of one logical REST call
///
/// Query keys are unique and kept sorted, so the signed request path is canonical.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    body: Option<String>,
    signed: bool,
    format: ResponseFormat,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
            signed: false,
            format: ResponseFormat::Json,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter; a repeated key replaces the earlier value
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Serialize `body` once; field order follows the type's declaration order
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, OkxError> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub fn sbe(mut self) -> Self {
        self.format = ResponseFormat::Sbe;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Body as sent on the wire, empty when there is none
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    /// Path plus encoded query string, exactly as signed and sent
    pub fn request_path(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.path, encoded)
    }

    /// Gate key `"<METHOD> <path>"`, query excluded
    pub fn endpoint_key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Required-field check run once before a request is built
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}
