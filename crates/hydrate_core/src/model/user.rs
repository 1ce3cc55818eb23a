//! Opaque user identity supplied by the identity provider.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const USER_ID_MAX_CHARS: usize = 128;

static USER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:@-]+$").expect("valid user id regex"));

/// Stable, comparable user token. The core never interprets its content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Rejection reasons for externally supplied user ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdError {
    Empty,
    TooLong { chars: usize },
    InvalidCharacters,
}

impl Display for UserIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "user id must not be empty"),
            Self::TooLong { chars } => write!(
                f,
                "user id has {chars} characters; at most {USER_ID_MAX_CHARS} are allowed"
            ),
            Self::InvalidCharacters => write!(
                f,
                "user id may only contain ASCII letters, digits and `_.:@-`"
            ),
        }
    }
}

impl Error for UserIdError {}

impl UserId {
    /// Parses an identity-provider token, trimming surrounding whitespace.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, UserIdError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(UserIdError::Empty);
        }
        let chars = trimmed.chars().count();
        if chars > USER_ID_MAX_CHARS {
            return Err(UserIdError::TooLong { chars });
        }
        if !USER_ID_RE.is_match(trimmed) {
            return Err(UserIdError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for UserId {
    type Error = UserIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::{UserId, UserIdError};

    #[test]
    fn parse_accepts_provider_tokens_and_trims() {
        let id = UserId::parse("  Xk9_user.01:auth@pool-2 ").unwrap();
        assert_eq!(id.as_str(), "Xk9_user.01:auth@pool-2");
    }

    #[test]
    fn parse_rejects_blank_long_and_spaced_values() {
        assert_eq!(UserId::parse("   "), Err(UserIdError::Empty));
        assert_eq!(
            UserId::parse("a".repeat(129)),
            Err(UserIdError::TooLong { chars: 129 })
        );
        assert_eq!(
            UserId::parse("two words"),
            Err(UserIdError::InvalidCharacters)
        );
    }

    #[test]
    fn serde_uses_plain_string_and_validates_on_read() {
        let id = UserId::parse("alice").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }
}
