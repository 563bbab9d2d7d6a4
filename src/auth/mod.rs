//! Authentication against the university portals
//!
//! - [`CredentialEncoder`]: the portal's RSA password encoding
//! - [`CasClient`]: the central SSO login state machine
//! - [`LabBridge`]: ticket hand-off to the lab platform
//! - [`follow_redirects`]: manual redirect traversal shared by both

pub mod cas;
pub mod credential;
pub mod lab;
pub mod redirect;

pub use cas::{CasClient, classify_login_page};
pub use credential::{CredentialEncoder, PublicKeyMaterial};
pub use lab::LabBridge;
pub use redirect::follow_redirects;
