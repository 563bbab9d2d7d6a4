//! Session state: cookie jars, the session cache and the manager that
//! hands authenticated jars to callers

pub mod jar;
pub mod manager;
pub mod store;

pub use jar::{Cookie, CookieJar};
pub use manager::{LoginOptions, SessionManager};
pub use store::{MemoryStore, RedisStore, SessionCache, SessionStore, TargetSystem, open_store};
