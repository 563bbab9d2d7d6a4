//! Login principals

use crate::{Error, Result};
use std::fmt;

/// Opaque password; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Plaintext, for building the encrypted login payload only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Account id plus password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub secret: Secret,
}

impl Principal {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: Secret::new(secret),
        }
    }

    /// Reject principals the portal would never accept, before any I/O
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.secret.is_empty() {
            return Err(Error::validation("principal", "账号密码不能为空!"));
        }
        if self.id.trim() != self.id {
            return Err(Error::validation("principal.id", "用户名包含空字符!"));
        }
        Ok(())
    }
}
