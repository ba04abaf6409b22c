//! Validated names. Invalid values are rejected at construction and never reach the repository.

use crate::domain::errors::DomainError;
use crate::domain::limits::{MAX_GROUP_NAME_LENGTH, MAX_MEMBER_NAME_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Group or alias name. Letters (latin, cyrillic), digits, hyphen, underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl GroupName {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::validation(
                "empty group name",
                "Group name must not be empty.",
            ));
        }
        if let Some(c) = value.chars().find(|c| !is_group_name_char(*c)) {
            return Err(DomainError::validation(
                format!("group name [{value}] contains [{c}]"),
                "Group name may contain only letters, digits, hyphen and underscore.",
            ));
        }
        let len = value.chars().count();
        if len > MAX_GROUP_NAME_LENGTH {
            return Err(DomainError::validation(
                format!("group name [{value}] is {len} chars long"),
                format!("Group name is too long! Maximum length: {MAX_GROUP_NAME_LENGTH}"),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_group_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё' | '-' | '_')
}

impl TryFrom<String> for GroupName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupName> for String {
    fn from(name: GroupName) -> Self {
        name.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Member display name: `@username` for plain mentions, the mention text otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberName(String);

impl MemberName {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation(
                "empty member name",
                "Member name must not be empty.",
            ));
        }
        let len = value.chars().count();
        if len > MAX_MEMBER_NAME_LENGTH {
            return Err(DomainError::validation(
                format!("member name is {len} chars long"),
                format!("Member name is too long! Maximum length: {MAX_MEMBER_NAME_LENGTH}"),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MemberName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MemberName> for String {
    fn from(name: MemberName) -> Self {
        name.0
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_name_accepts_latin_cyrillic_digits() {
        for name in ["apple123", "ёжик", "dev-ops_1", "ЁЖ"] {
            assert_eq!(GroupName::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_group_name_rejects_bad_values() {
        for name in ["", "has space", "semi;colon", "ünïcode", "elevenchars"] {
            assert!(
                matches!(GroupName::new(name), Err(DomainError::Validation { .. })),
                "{name}"
            );
        }
    }

    #[test]
    fn test_group_name_length_counts_chars_not_bytes() {
        // ten cyrillic letters are twenty bytes
        assert!(GroupName::new("абвгдежзий").is_ok());
    }

    #[test]
    fn test_member_name_limits() {
        assert!(MemberName::new("@user").is_ok());
        assert!(MemberName::new("   ").is_err());
        assert!(MemberName::new("x".repeat(MAX_MEMBER_NAME_LENGTH)).is_ok());
        assert!(MemberName::new("x".repeat(MAX_MEMBER_NAME_LENGTH + 1)).is_err());
    }
}
