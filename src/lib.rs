// src/lib.rs
pub mod config;
pub mod metrics;
pub mod proxy;
pub mod server;

pub use config::{Config, ConfigError};
pub use proxy::{Backend, BackendRegistry, ProxyError};
pub use server::{ProxyServer, ServerBuilder};
