//! Outbound networking
//!
//! Every request to the portals goes through [`ProxyManager`], which picks
//! an egress path from the [`ProxyPool`] and hands the request to an
//! [`HttpTransport`].

pub mod manager;
pub mod pool;
pub mod transport;

pub use manager::ProxyManager;
pub use pool::{ProxyEndpoint, ProxyPool, ProxyScheme};
pub use transport::{HttpResponse, HttpTransport, OutboundRequest, ReqwestTransport};
