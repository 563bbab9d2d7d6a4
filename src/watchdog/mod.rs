//! Keep-alive watchdog and the connectivity state it owns

pub mod connectivity;
pub mod keep_alive;

pub use connectivity::ConnectivityState;
pub use keep_alive::{KeepAlive, QuietWindow, TickOutcome};
