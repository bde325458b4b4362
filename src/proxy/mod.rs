//
// src/proxy/mod.rs
//
mod backend;
mod controller;
mod pool;
mod prober;
mod relay;

pub use backend::{normalize, normalize_all, Backend};
pub use controller::{
    ConnectionSession, ProxyError, RoutingController, SessionOutcome, SessionState,
};
pub use pool::{rotate_to_front, BackendList, BackendRegistry};
pub use prober::{BackendProber, Connector, ProbeOutcome, TcpConnector};
pub use relay::{relay, RelayStats};

pub(crate) use pool::display_list;
