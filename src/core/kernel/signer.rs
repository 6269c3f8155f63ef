use crate::core::config::Credentials;
use crate::core::errors::OkxError;
use base64::engine::general_purpose;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ACCESS_KEY_HEADER: &str = "OK-ACCESS-KEY";
pub const ACCESS_SIGN_HEADER: &str = "OK-ACCESS-SIGN";
pub const ACCESS_TIMESTAMP_HEADER: &str = "OK-ACCESS-TIMESTAMP";
pub const ACCESS_PASSPHRASE_HEADER: &str = "OK-ACCESS-PASSPHRASE";

/// Headers to attach to a signed request
pub type SignatureHeaders = Vec<(&'static str, String)>;

/// Signer trait for request authentication
///
/// Implementations must be pure: the same inputs always yield the same headers.
pub trait Signer: Send + Sync {
    /// Sign a request and return the authentication headers
    ///
    /// # Arguments
    /// * `timestamp` - ISO-8601 UTC timestamp with millisecond precision
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `request_path` - Path including the encoded query string
    /// * `body` - JSON body as sent, empty if none
    fn sign_request(
        &self,
        timestamp: &str,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<SignatureHeaders, OkxError>;
}

/// Pre-hash string: `timestamp + method + requestPath + body`, no delimiters
pub fn prehash(timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
    format!("{}{}{}{}", timestamp, method, request_path, body)
}

/// Base64(HMAC-SHA256(secret_key, prehash))
pub fn sign(
    secret_key: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String, OkxError> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| OkxError::Auth(format!("Failed to create HMAC: {}", e)))?;

    mac.update(prehash(timestamp, method, request_path, body).as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// HMAC-SHA256 signer producing the `OK-ACCESS-*` header set
pub struct HmacSigner {
    credentials: Credentials,
}

impl HmacSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl Signer for HmacSigner {
    fn sign_request(
        &self,
        timestamp: &str,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<SignatureHeaders, OkxError> {
        if !self.credentials.is_complete() {
            return Err(OkxError::MissingCredentials {
                method: method.to_string(),
                path: request_path.to_string(),
            });
        }

        let signature = sign(
            self.credentials.secret_key(),
            timestamp,
            method,
            request_path,
            body,
        )?;

        Ok(vec![
            (ACCESS_KEY_HEADER, self.credentials.api_key().to_string()),
            (ACCESS_SIGN_HEADER, signature),
            (ACCESS_TIMESTAMP_HEADER, timestamp.to_string()),
            (ACCESS_PASSPHRASE_HEADER, self.credentials.passphrase().to_string()),
        ])
    }
}
