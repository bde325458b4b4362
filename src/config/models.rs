// src/config/models.rs
use serde::Deserialize;
use std::time::Duration;

/// Default per-candidate outward connect timeout, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2500;

/// Bind host meaning "all interfaces".
pub const ANY_HOST: &str = "any";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid listen port {0}: must be within 1-65535")]
    InvalidPort(i64),

    #[error("invalid bind host: must not be empty")]
    InvalidHost,

    #[error("invalid connect timeout: must be greater than zero")]
    InvalidTimeout,

    #[error("invalid backend spec: {0}")]
    InvalidBackendSpec(String),

    #[error("backend list is empty")]
    EmptyBackendList,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub port: i64,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub backend: Option<BackendSpecs>,

    #[serde(default = "default_true")]
    pub log: bool,

    #[serde(default)]
    pub shuffle: bool,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// A backend port as written in configuration: `8080` or `"8080"`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Text(String),
}

/// One raw backend specification, prior to normalization.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BackendSpec {
    /// `"host:port"`
    Address(String),
    Endpoint {
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        port: Option<PortValue>,
    },
}

/// Either a single backend spec or a list of them.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BackendSpecs {
    Many(Vec<BackendSpec>),
    One(BackendSpec),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

fn default_host() -> String {
    ANY_HOST.to_string()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Config {
    /// Build a configuration with every optional field at its default.
    pub fn new(port: u16, backend: impl Into<BackendSpecs>) -> Self {
        Self {
            port: i64::from(port),
            host: default_host(),
            backend: Some(backend.into()),
            log: true,
            shuffle: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_MS,
            metrics: MetricsConfig::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_port()?;

        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost);
        }

        if self.connect_timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        crate::proxy::normalize_all(self.backend.as_ref())?;
        Ok(())
    }

    pub fn listen_port(&self) -> Result<u16, ConfigError> {
        match u16::try_from(self.port) {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::InvalidPort(self.port)),
        }
    }

    /// Address handed to the listener; `"any"` maps to every IPv4 interface.
    pub fn bind_host(&self) -> &str {
        if self.host.eq_ignore_ascii_case(ANY_HOST) {
            "0.0.0.0"
        } else {
            &self.host
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }
}

impl From<&str> for BackendSpec {
    fn from(address: &str) -> Self {
        BackendSpec::Address(address.to_string())
    }
}

impl From<String> for BackendSpec {
    fn from(address: String) -> Self {
        BackendSpec::Address(address)
    }
}

impl From<(&str, u16)> for BackendSpec {
    fn from((host, port): (&str, u16)) -> Self {
        BackendSpec::Endpoint {
            host: Some(host.to_string()),
            port: Some(PortValue::Number(i64::from(port))),
        }
    }
}

impl From<BackendSpec> for BackendSpecs {
    fn from(spec: BackendSpec) -> Self {
        BackendSpecs::One(spec)
    }
}

impl From<&str> for BackendSpecs {
    fn from(address: &str) -> Self {
        BackendSpecs::One(address.into())
    }
}

impl<T: Into<BackendSpec>> From<Vec<T>> for BackendSpecs {
    fn from(specs: Vec<T>) -> Self {
        BackendSpecs::Many(specs.into_iter().map(Into::into).collect())
    }
}
