use crate::core::errors::ValidationError;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.okx.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const REDACTED: &str = "[REDACTED]";

/// API key, secret key and passphrase issued by the exchange
///
/// All three are wrapped in [`Secret`]; `Debug` and `Serialize` never print them.
#[derive(Clone)]
pub struct Credentials {
    api_key: Secret<String>,
    secret_key: Secret<String>,
    passphrase: Secret<String>,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            secret_key: Secret::new(secret_key.into()),
            passphrase: Secret::new(passphrase.into()),
        }
    }

    /// Signed requests need all three values
    pub fn is_complete(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
            && !self.secret_key.expose_secret().is_empty()
            && !self.passphrase.expose_secret().is_empty()
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret key (use carefully - exposes secret)
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }

    /// Get passphrase (use carefully - exposes secret)
    pub fn passphrase(&self) -> &str {
        self.passphrase.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &REDACTED)
            .field("secret_key", &REDACTED)
            .field("passphrase", &REDACTED)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct OkxConfig {
    pub credentials: Option<Credentials>,
    pub base_url: String,
    /// Demo trading; every request carries `x-simulated-trading: 1`
    pub simulated: bool,
    /// Per-attempt timeout when the caller sets none
    pub timeout: Duration,
    pub max_retries: u32,
    /// Retry GETs rejected with the exchange rate-limit code
    pub retry_rate_limit: bool,
    pub user_agent: String,
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            simulated: false,
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            retry_rate_limit: false,
            user_agent: "okx-rest/0.1".to_string(),
        }
    }
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for OkxConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("OkxConfig", 9)?;
        let redacted = self.credentials.as_ref().map(|_| REDACTED);
        state.serialize_field("api_key", &redacted)?;
        state.serialize_field("secret_key", &redacted)?;
        state.serialize_field("passphrase", &redacted)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("simulated", &self.simulated)?;
        state.serialize_field("timeout_secs", &self.timeout.as_secs())?;
        state.serialize_field("max_retries", &self.max_retries)?;
        state.serialize_field("retry_rate_limit", &self.retry_rate_limit)?;
        state.serialize_field("user_agent", &self.user_agent)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for OkxConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct OkxConfigHelper {
            api_key: Option<String>,
            secret_key: Option<String>,
            passphrase: Option<String>,
            base_url: Option<String>,
            #[serde(default)]
            simulated: bool,
            timeout_secs: Option<u64>,
            #[serde(default)]
            max_retries: u32,
            #[serde(default)]
            retry_rate_limit: bool,
            user_agent: Option<String>,
        }

        let helper = OkxConfigHelper::deserialize(deserializer)?;
        let defaults = Self::default();
        Ok(Self {
            credentials: credentials_from_parts(helper.api_key, helper.secret_key, helper.passphrase),
            base_url: helper.base_url.unwrap_or(defaults.base_url),
            simulated: helper.simulated,
            timeout: helper
                .timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
            max_retries: helper.max_retries,
            retry_rate_limit: helper.retry_rate_limit,
            user_agent: helper.user_agent.unwrap_or(defaults.user_agent),
        })
    }
}

fn credentials_from_parts(
    api_key: Option<String>,
    secret_key: Option<String>,
    passphrase: Option<String>,
) -> Option<Credentials> {
    if api_key.is_none() && secret_key.is_none() && passphrase.is_none() {
        return None;
    }
    Some(Credentials::new(
        api_key.unwrap_or_default(),
        secret_key.unwrap_or_default(),
        passphrase.unwrap_or_default(),
    ))
}

impl OkxConfig {
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..Self::default()
        }
    }

    /// Configuration for public endpoints only
    #[must_use]
    pub fn read_only() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - `{PREFIX}_API_KEY`, `{PREFIX}_SECRET_KEY`, `{PREFIX}_PASSPHRASE`
    /// - `{PREFIX}_BASE_URL`
    /// - `{PREFIX}_SIMULATED` (defaults to false)
    /// - `{PREFIX}_MAX_RETRIES` (defaults to 0)
    /// - `{PREFIX}_TIMEOUT_SECS` (defaults to 30)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let var = |name: &str| env::var(format!("{}_{}", prefix.to_uppercase(), name)).ok();
        let defaults = Self::default();

        let simulated = parse_var(prefix, "SIMULATED", var("SIMULATED"))?.unwrap_or(false);
        let max_retries = parse_var(prefix, "MAX_RETRIES", var("MAX_RETRIES"))?.unwrap_or(0);
        let timeout = parse_var::<u64>(prefix, "TIMEOUT_SECS", var("TIMEOUT_SECS"))?
            .map_or(defaults.timeout, Duration::from_secs);

        Ok(Self {
            credentials: credentials_from_parts(
                var("API_KEY"),
                var("SECRET_KEY"),
                var("PASSPHRASE"),
            ),
            base_url: var("BASE_URL").unwrap_or(defaults.base_url),
            simulated,
            timeout,
            max_retries,
            retry_rate_limit: defaults.retry_rate_limit,
            user_agent: defaults.user_agent,
        })
    }

    /// Create configuration from a .env file and environment variables
    ///
    /// A missing file is not an error; system environment variables are used instead.
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.as_ref().is_some_and(Credentials::is_complete)
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn retry_rate_limit(mut self, enabled: bool) -> Self {
        self.retry_rate_limit = enabled;
        self
    }

    /// Partial credentials are accepted here and rejected per signed call.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::new("client config")
            .require("base_url", !self.base_url.trim().is_empty())
            .conflict_if(
                !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://"),
                "base_url must be an http(s) URL",
            )
            .conflict_if(self.timeout.is_zero(), "timeout must be greater than zero")
            .into_result()
    }
}

fn parse_var<T: std::str::FromStr>(
    prefix: &str,
    name: &str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidEnvironmentVariable {
                    name: format!("{}_{}", prefix.to_uppercase(), name),
                    value: raw,
                })
        })
        .transpose()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvironmentVariable { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
