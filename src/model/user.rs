//! User types.

use serde::{Deserialize, Serialize};

/// Newtype for user IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i32);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user identity. The engine only needs one: the system actor that
/// automatic assignments are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
}

impl User {
    pub fn new(id: i32, email: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            email: email.into(),
        }
    }
}
