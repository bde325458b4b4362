// src/proxy/backend.rs
use crate::config::{BackendSpec, BackendSpecs, ConfigError, PortValue};
use std::fmt;

/// One upstream TCP endpoint. Compared by value, so copies of the same
/// `(host, port)` pair are interchangeable for rotation and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Backend {
    host: String,
    port: u16,
}

impl Backend {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ConfigError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ConfigError::InvalidBackendSpec("host is empty".to_string()));
        }
        if port == 0 {
            return Err(ConfigError::InvalidBackendSpec(format!(
                "port 0 for host {} is outside 1-65535",
                host
            )));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `(host, port)` in the form accepted by `TcpStream::connect`.
    pub fn connect_target(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Normalize one raw spec into a validated [`Backend`].
pub fn normalize(spec: &BackendSpec) -> Result<Backend, ConfigError> {
    match spec {
        BackendSpec::Address(address) => parse_address(address),
        BackendSpec::Endpoint { host, port } => {
            let host = host
                .as_deref()
                .ok_or_else(|| ConfigError::InvalidBackendSpec("host is missing".to_string()))?;
            let port = port.as_ref().ok_or_else(|| {
                ConfigError::InvalidBackendSpec(format!("port is missing for host {}", host))
            })?;
            Backend::new(host, coerce_port(port)?)
        }
    }
}

/// Normalize a single spec or a list of specs, in order. The first invalid
/// element aborts the whole list.
pub fn normalize_all(specs: Option<&BackendSpecs>) -> Result<Vec<Backend>, ConfigError> {
    match specs {
        None => Err(ConfigError::EmptyBackendList),
        Some(BackendSpecs::One(spec)) => Ok(vec![normalize(spec)?]),
        Some(BackendSpecs::Many(specs)) if specs.is_empty() => Err(ConfigError::EmptyBackendList),
        Some(BackendSpecs::Many(specs)) => specs.iter().map(normalize).collect(),
    }
}

fn parse_address(address: &str) -> Result<Backend, ConfigError> {
    let address = address.trim();
    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        ConfigError::InvalidBackendSpec(format!("{:?} is not in host:port form", address))
    })?;
    let port = coerce_port(&PortValue::Text(port.to_string()))?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Backend::new(host, port)
}

fn coerce_port(port: &PortValue) -> Result<u16, ConfigError> {
    let value = match port {
        PortValue::Number(n) => *n,
        PortValue::Text(text) => text.trim().parse::<i64>().map_err(|_| {
            ConfigError::InvalidBackendSpec(format!("port {:?} is not an integer", text))
        })?,
    };

    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidBackendSpec(format!(
            "port {} is outside 1-65535",
            value
        ))),
    }
}
