//! Configuration for the interception layer.
//!
//! Two sources feed the layer:
//!
//! - [`InterceptConfig`] holds tunables (timeouts, retry policy, log stream
//!   names). It is loaded with figment from defaults, an optional
//!   `sidereal-intercept.toml` and `SIDEREAL_INTERCEPT_`-prefixed variables.
//! - [`Environment`] is a snapshot of the well-known variables set by the
//!   platform for the hosted function (endpoint overrides, gateway and log
//!   store URLs, trace id).

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::error::InterceptResult;
use crate::service::ServiceKind;

// ============================================================================
// Well-known environment variables
// ============================================================================

/// Name of the hosted function.
pub const ENV_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Object storage endpoint override, checked in order.
pub const ENV_S3_ENDPOINT: [&str; 2] = ["S3_ENDPOINT", "AWS_ENDPOINT_URL_S3"];

/// Key-value store endpoint override, checked in order.
pub const ENV_DYNAMODB_ENDPOINT: [&str; 2] = ["DYNAMODB_ENDPOINT", "AWS_ENDPOINT_URL_DYNAMODB"];

/// Internal gateway URL. Also the function-invocation endpoint override.
pub const ENV_GATEWAY_URL: &str = "GATEWAY_INTERNAL_URL";

/// Remote log store base URL.
pub const ENV_LOG_STORE_URL: &str = "VICTORIALOGS_URL";

/// Trace id propagated by the runtime.
pub const ENV_TRACE_ID: &str = "_X_AMZN_TRACE_ID";

/// Diagnostic decision logging toggle.
pub const ENV_DIAGNOSTICS: &str = "SIDEREAL_INTERCEPT_DIAGNOSTICS";

/// Prefix for tunables read from the environment.
pub const CONFIG_ENV_PREFIX: &str = "SIDEREAL_INTERCEPT_";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "sidereal-intercept.toml";

// ============================================================================
// Default tunables
// ============================================================================

/// Log sink connect timeout.
pub const DEFAULT_LOG_CONNECT_TIMEOUT_MS: u64 = 500;

/// Log sink read timeout.
pub const DEFAULT_LOG_READ_TIMEOUT_MS: u64 = 1_000;

/// Ingestion path appended to the log store base URL.
pub const DEFAULT_INGEST_PATH: &str = "/insert/jsonline";

/// Gateway redirect connect timeout.
pub const DEFAULT_GATEWAY_CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Gateway redirect read timeout.
pub const DEFAULT_GATEWAY_READ_TIMEOUT_MS: u64 = 15_000;

/// Retry count forced on redirected clients.
pub const DEFAULT_MAX_RETRIES: u32 = 9;

/// Per-attempt timeout forced on redirected clients.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 5;

/// Total call timeout forced on redirected clients.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 10;

/// Tunables for the interception layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Log record emission and shipping.
    pub logs: LogsConfig,
    /// Local invocation redirect.
    pub gateway: GatewayConfig,
    /// Policy applied to client builders.
    pub clients: ClientPolicyConfig,
}

impl InterceptConfig {
    /// Load from `sidereal-intercept.toml` (if present) and the environment.
    pub fn load() -> InterceptResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from the given file (if present) and the environment.
    ///
    /// Variables prefixed with `SIDEREAL_INTERCEPT_` override file settings,
    /// with `__` separating sections, e.g. `SIDEREAL_INTERCEPT_LOGS__JOB`.
    pub fn load_from(path: impl AsRef<Path>) -> InterceptResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(CONFIG_ENV_PREFIX).split("__"))
            .extract()
            .map_err(Into::into)
    }

    /// Parse from a TOML string, ignoring the environment.
    pub fn parse(content: &str) -> InterceptResult<Self> {
        Figment::new()
            .merge(Toml::string(content))
            .extract()
            .map_err(Into::into)
    }
}

/// Settings for emitted log records and the log sink.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Connect timeout for the log store, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read timeout for the log store, in milliseconds.
    pub read_timeout_ms: u64,
    /// Path appended to the log store base URL.
    pub ingest_path: String,
    /// Value of the `job` field.
    pub job: String,
    /// Value of the `logger` field on records built from batch writes.
    pub logger: String,
    /// `container_name` used when the function name is unknown.
    pub default_container: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_LOG_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_LOG_READ_TIMEOUT_MS,
            ingest_path: DEFAULT_INGEST_PATH.to_owned(),
            job: "lambda".to_owned(),
            logger: "aws.logs".to_owned(),
            default_container: "lambda-unknown".to_owned(),
        }
    }
}

impl LogsConfig {
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Settings for the local invocation redirect.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read timeout, in milliseconds.
    pub read_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_GATEWAY_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_GATEWAY_READ_TIMEOUT_MS,
        }
    }
}

impl GatewayConfig {
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Client retry strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    Legacy,
    #[default]
    Standard,
    Adaptive,
}

/// Retry and timeout policy forced onto key-value and invoke clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientPolicyConfig {
    /// Maximum retries per call.
    pub max_retries: u32,
    /// Per-attempt timeout, in seconds.
    pub attempt_timeout_secs: u64,
    /// Total call timeout, in seconds.
    pub call_timeout_secs: u64,
    /// Retry strategy handed to the client's override configuration.
    pub retry_mode: RetryMode,
}

impl Default for ClientPolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            retry_mode: RetryMode::default(),
        }
    }
}

impl ClientPolicyConfig {
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Snapshot of the platform-provided environment.
///
/// Values are trimmed and blank values count as unset. Where several
/// variable names are recognised for one setting, the first non-empty wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub function_name: Option<String>,
    pub s3_endpoint: Option<String>,
    pub dynamodb_endpoint: Option<String>,
    pub gateway_url: Option<String>,
    pub log_store_url: Option<String>,
    pub trace_id: Option<String>,
    pub diagnostics: bool,
}

impl Environment {
    /// Read the current process environment.
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            function_name: first_set(&lookup, &[ENV_FUNCTION_NAME]),
            s3_endpoint: first_set(&lookup, &ENV_S3_ENDPOINT),
            dynamodb_endpoint: first_set(&lookup, &ENV_DYNAMODB_ENDPOINT),
            gateway_url: first_set(&lookup, &[ENV_GATEWAY_URL]),
            log_store_url: first_set(&lookup, &[ENV_LOG_STORE_URL]),
            trace_id: first_set(&lookup, &[ENV_TRACE_ID]),
            diagnostics: first_set(&lookup, &[ENV_DIAGNOSTICS]).is_some_and(|v| is_truthy(&v)),
        }
    }

    /// Endpoint override for the given service, if any.
    pub fn endpoint_for(&self, kind: ServiceKind) -> Option<&str> {
        match kind {
            ServiceKind::ObjectStorage => self.s3_endpoint.as_deref(),
            ServiceKind::KeyValueStore => self.dynamodb_endpoint.as_deref(),
            ServiceKind::FunctionInvoke => self.gateway_url.as_deref(),
            ServiceKind::LogService | ServiceKind::Unknown => None,
        }
    }

    /// `container_name` for emitted records.
    pub fn container_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.function_name.as_deref().unwrap_or(fallback)
    }
}

fn first_set<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
}

/// Whether a toggle value means "on".
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
