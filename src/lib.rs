//! Campus Gateway
//!
//! Authentication gateway for a university single-sign-on (CAS) portal. It logs
//! students in on their behalf, keeps the resulting cookie sessions in a
//! shared cache, derives cookies for the separate lab-course platform and
//! routes all outbound traffic through a rotating pool of egress proxies.
//!
//! # Features
//!
//! - **CAS Login**: Execution-token scrape, RSA password encryption and
//!   outcome classification, with retries on transient portal failures
//! - **Session Cache**: Memory or Redis backed, revalidated before reuse
//! - **Lab Hand-off**: Six-hop ticket exchange into the lab platform
//! - **Proxy Pool**: Round-robin or random rotation with failover
//! - **Keep-Alive Watchdog**: Periodic egress probe that advances the pool
//!
//! # Usage
//!
//! ## HTTP Server Mode
//!
//! ```bash
//! campus-gateway server --port 8080 --host 0.0.0.0
//! ```
//!
//! ## Login Mode
//!
//! ```bash
//! campus-gateway login --name 2021040501 --password secret --lab
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use campus_gateway::{SessionManager, Settings};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::default();
//! let session_manager = SessionManager::from_settings(&settings).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod server;
pub mod session;
pub mod types;
pub mod utils;
pub mod watchdog;

pub use config::{ConfigLoader, Settings};
pub use error::{Error, Result};
pub use session::SessionManager;
pub use types::{ApiResponse, PingResponse, Principal};
