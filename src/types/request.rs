//! Request type definitions for the HTTP surface

use crate::types::Principal;
use serde::Deserialize;

/// Query string of the login routes: `?name=&passwd=`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub passwd: String,
}

impl LoginQuery {
    /// Only undergraduate ids are served: not 8 characters long, not starting with a letter
    pub fn is_undergraduate(&self) -> bool {
        let starts_with_letter = self
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic());
        self.name.chars().count() != 8 && !starts_with_letter
    }

    pub fn into_principal(self) -> Principal {
        Principal::new(self.name, self.passwd)
    }
}
