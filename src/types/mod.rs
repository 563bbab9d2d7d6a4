//! Type definitions shared by the library, the HTTP API and the CLI

pub mod principal;
pub mod request;
pub mod response;

pub use principal::{Principal, Secret};
pub use request::LoginQuery;
pub use response::{ApiResponse, PingResponse};
