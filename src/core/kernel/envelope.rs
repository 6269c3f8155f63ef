use crate::core::errors::{ApiError, ApiErrorKind, ItemFailure, OkxError};
use crate::core::types::{Expect, ResponseFormat};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

pub const SBE_CONTENT_TYPE: &str = "application/sbe";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
const SUCCESS_CODE: &str = "0";
/// Batch envelope codes: every item failed / some items failed
const BATCH_FAILURE_CODES: [&str; 2] = ["1", "2"];

/// The parts of an HTTP response the classifier looks at
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub request_id: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_sbe(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with(SBE_CONTENT_TYPE))
    }
}

/// The `{code, msg, data}` wrapper around every JSON response
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub code: String,
    pub msg: String,
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// SBE frame, returned undecoded
    Binary(Vec<u8>),
    Json(Envelope),
}

/// Successful result of a dispatched call
#[derive(Debug, Clone)]
pub struct Outcome {
    pub method: String,
    pub request_path: String,
    pub request_id: Option<String>,
    pub payload: Payload,
}

impl Outcome {
    pub fn envelope(&self) -> Option<&Envelope> {
        match &self.payload {
            Payload::Json(envelope) => Some(envelope),
            Payload::Binary(_) => None,
        }
    }

    /// Decode every `data` item into `T`
    pub fn rows<T: DeserializeOwned>(&self) -> Result<Vec<T>, OkxError> {
        let Payload::Json(envelope) = &self.payload else {
            return Err(self.decode_error("expected a JSON envelope, got a binary payload"));
        };
        envelope
            .data
            .iter()
            .map(|item| T::deserialize(item).map_err(|e| self.decode_error(e.to_string())))
            .collect()
    }

    /// Decode the first `data` item; zero items is an `EmptyData` error
    pub fn first<T: DeserializeOwned>(&self) -> Result<T, OkxError> {
        self.rows::<T>()?.into_iter().next().ok_or_else(|| {
            OkxError::from(ApiError {
                kind: ApiErrorKind::EmptyData,
                http_status: 200,
                method: self.method.clone(),
                request_path: self.request_path.clone(),
                code: Some(SUCCESS_CODE.to_string()),
                message: "empty data: expected at least one item".to_string(),
                request_id: self.request_id.clone(),
                raw_body: String::new(),
                data: Vec::new(),
            })
        })
    }

    pub fn into_binary(self) -> Result<Vec<u8>, OkxError> {
        match self.payload {
            Payload::Binary(bytes) => Ok(bytes),
            Payload::Json(_) => Err(OkxError::Decode {
                method: self.method,
                path: self.request_path,
                request_id: self.request_id,
                message: "expected a binary payload, got a JSON envelope".to_string(),
            }),
        }
    }

    /// A decode failure tagged with this call's method, path and request id
    pub fn decode_error(&self, message: impl Into<String>) -> OkxError {
        OkxError::Decode {
            method: self.method.clone(),
            path: self.request_path.clone(),
            request_id: self.request_id.clone(),
            message: message.into(),
        }
    }
}

/// Turns a raw response into a payload or an [`ApiError`]
///
/// Ambiguous shapes always fail closed; nothing is accepted as a default success.
pub struct Classifier<'a> {
    method: &'a str,
    request_path: &'a str,
    format: ResponseFormat,
    expect: Expect,
}

impl<'a> Classifier<'a> {
    pub fn new(method: &'a str, request_path: &'a str, format: ResponseFormat, expect: Expect) -> Self {
        Self {
            method,
            request_path,
            format,
            expect,
        }
    }

    pub fn classify(&self, raw: &RawResponse) -> Result<Payload, ApiError> {
        if self.format == ResponseFormat::Sbe && raw.is_success() && raw.is_sbe() {
            return Ok(Payload::Binary(raw.body.clone()));
        }

        let value: Value = serde_json::from_slice(&raw.body).map_err(|e| {
            self.error(
                raw,
                ApiErrorKind::InvalidJson,
                None,
                format!("invalid JSON response: {}", e),
            )
        })?;
        trace!(status = raw.status, body = %value, "classifying response");

        let envelope = self.envelope(raw, value)?;

        if envelope.code == SUCCESS_CODE {
            if !raw.is_success() {
                return Err(self.error(
                    raw,
                    ApiErrorKind::InvalidEnvelope,
                    Some(envelope.code),
                    format!("invalid response envelope: success code with HTTP {}", raw.status),
                ));
            }
            return self.check_cardinality(raw, envelope).map(Payload::Json);
        }

        if self.is_batch() && BATCH_FAILURE_CODES.contains(&envelope.code.as_str()) {
            let code = envelope.code.clone();
            let msg = envelope.msg.clone();
            self.check_cardinality(raw, envelope)?;
            // every item acknowledged despite a failure code: trust the code
            return Err(self.error(raw, ApiErrorKind::Business, Some(code), msg));
        }

        Err(self.error(raw, ApiErrorKind::Business, Some(envelope.code), envelope.msg))
    }

    fn is_batch(&self) -> bool {
        matches!(self.expect, Expect::Acks(_) | Expect::Batch)
    }

    fn envelope(&self, raw: &RawResponse, value: Value) -> Result<Envelope, ApiError> {
        let invalid = |reason: &str| {
            self.error(
                raw,
                ApiErrorKind::InvalidEnvelope,
                None,
                format!("invalid response envelope: {}", reason),
            )
        };

        let Value::Object(mut object) = value else {
            return Err(invalid("not a JSON object"));
        };

        let code = match object.remove("code") {
            Some(Value::String(code)) if !code.is_empty() => code,
            Some(Value::Number(code)) => code.to_string(),
            _ => return Err(invalid("missing code")),
        };
        let msg = match object.remove("msg") {
            Some(Value::String(msg)) => msg,
            _ => String::new(),
        };
        let data = match object.remove("data") {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) if code != SUCCESS_CODE => Vec::new(),
            Some(_) => return Err(invalid("data is not an array")),
            None => return Err(invalid("missing data")),
        };

        Ok(Envelope { code, msg, data })
    }

    fn check_cardinality(&self, raw: &RawResponse, envelope: Envelope) -> Result<Envelope, ApiError> {
        match self.expect {
            Expect::Rows => Ok(envelope),
            Expect::AtLeastOne if envelope.data.is_empty() => Err(self.error(
                raw,
                ApiErrorKind::EmptyData,
                Some(envelope.code),
                "empty data: expected at least one item".to_string(),
            )),
            Expect::AtLeastOne => Ok(envelope),
            Expect::Acks(expected) if envelope.data.len() != expected => {
                let got = envelope.data.len();
                Err(self.error(
                    raw,
                    ApiErrorKind::CardinalityMismatch { expected, got },
                    Some(envelope.code),
                    format!(
                        "expected {} {}, got {}",
                        expected,
                        if expected == 1 { "ack" } else { "acks" },
                        got
                    ),
                ))
            }
            Expect::Acks(_) | Expect::Batch => self.check_items(raw, envelope),
        }
    }

    fn check_items(&self, raw: &RawResponse, envelope: Envelope) -> Result<Envelope, ApiError> {
        let mut failures = Vec::new();
        for (index, item) in envelope.data.iter().enumerate() {
            let Some(fields) = item.as_object() else {
                return Err(self.error(
                    raw,
                    ApiErrorKind::InvalidEnvelope,
                    Some(envelope.code.clone()),
                    format!("invalid response envelope: item {} is not an object", index),
                ));
            };
            let Some(code) = item_code(fields) else {
                return Err(self.error(
                    raw,
                    ApiErrorKind::InvalidEnvelope,
                    Some(envelope.code.clone()),
                    format!("invalid response envelope: item {} has no sCode", index),
                ));
            };
            if code != SUCCESS_CODE {
                failures.push(ItemFailure {
                    index,
                    code,
                    message: fields
                        .get("sMsg")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }

        if failures.is_empty() {
            return Ok(envelope);
        }

        let message = format!(
            "{} of {} item(s) failed; first: index {} code {} {}",
            failures.len(),
            envelope.data.len(),
            failures[0].index,
            failures[0].code,
            failures[0].message
        );
        let mut err = self.error(
            raw,
            ApiErrorKind::PartialFailure { failures },
            Some(envelope.code),
            message,
        );
        err.data = envelope.data;
        Err(err)
    }

    fn error(
        &self,
        raw: &RawResponse,
        kind: ApiErrorKind,
        code: Option<String>,
        message: String,
    ) -> ApiError {
        ApiError {
            kind,
            http_status: raw.status,
            method: self.method.to_string(),
            request_path: self.request_path.to_string(),
            code,
            message,
            request_id: raw.request_id.clone(),
            raw_body: String::from_utf8_lossy(&raw.body).into_owned(),
            data: Vec::new(),
        }
    }
}

fn item_code(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("sCode")? {
        Value::String(code) => Some(code.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}
