use serde::Serialize;

/// Outcome of checking that a private key controls an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum KeyPairCheck {
    /// The key derives (or signs for) the address.
    Valid,
    /// Both inputs were understood and they do not belong together.
    Invalid,
    /// One of the inputs could not be processed, so nothing was proven.
    Unverifiable { reason: String },
}

impl KeyPairCheck {
    pub fn unverifiable(reason: impl ToString) -> Self {
        KeyPairCheck::Unverifiable {
            reason: reason.to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, KeyPairCheck::Valid)
    }
}

impl From<bool> for KeyPairCheck {
    fn from(matches: bool) -> Self {
        if matches {
            KeyPairCheck::Valid
        } else {
            KeyPairCheck::Invalid
        }
    }
}
