//! Chat addressing in the messaging client's scheme.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix the client expects on individual (non-group) chat ids.
pub const CONTACT_SUFFIX: &str = "@c.us";

/// A destination chat id, e.g. `21699999999@c.us`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Build a chat id from a human-entered phone number.
    ///
    /// Every non-digit character is dropped (`"+216 99-999 999"` becomes
    /// `21699999999`). Returns `None` when no digits remain.
    pub fn from_phone(phone: &str) -> Option<Self> {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        Some(Self(format!("{digits}{CONTACT_SUFFIX}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digits-only user part.
    pub fn user(&self) -> &str {
        self.0.strip_suffix(CONTACT_SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
