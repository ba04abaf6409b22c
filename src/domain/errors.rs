//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these. The first five kinds are expected
//! outcomes of bad input or forbidden actions; everything else is unexpected.

use thiserror::Error;

/// A named grammar constraint paired with its human-readable rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub name: &'static str,
    pub rule: &'static str,
}

#[derive(Error, Debug)]
pub enum DomainError {
    /// Input did not match the command grammar. `violated` follows grammar declaration order.
    #[error("Parse error: input=[{input}], violated={violated:?}")]
    Parse {
        input: String,
        violated: Vec<Constraint>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        user_message: String,
    },

    #[error("Not found: {message}")]
    NotFound {
        message: String,
        user_message: String,
    },

    #[error("Integrity violation: {message}")]
    IntegrityViolation {
        message: String,
        user_message: String,
    },

    /// Never shown to the user; the reply is a fixed generic text.
    #[error("Access denied: {0}")]
    Authorization(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Messaging gateway error: {0}")]
    Gateway(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            user_message: user_message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            user_message: user_message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self::IntegrityViolation {
            message: message.into(),
            user_message: user_message.into(),
        }
    }

    /// User-facing text for validation, not-found and integrity failures.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Validation { user_message, .. }
            | Self::NotFound { user_message, .. }
            | Self::IntegrityViolation { user_message, .. } => Some(user_message),
            _ => None,
        }
    }

    /// True for failures caused by input or policy rather than by infrastructure or bugs.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::Validation { .. }
                | Self::NotFound { .. }
                | Self::IntegrityViolation { .. }
                | Self::Authorization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_only_for_reply_kinds() {
        assert_eq!(
            DomainError::not_found("group x", "Group not found!").user_message(),
            Some("Group not found!")
        );
        assert_eq!(DomainError::Authorization("grant".into()).user_message(), None);
        assert_eq!(DomainError::Repo("disk".into()).user_message(), None);
    }

    #[test]
    fn test_expected_kinds() {
        assert!(DomainError::integrity("dup", "dup").is_expected());
        assert!(DomainError::Authorization("x".into()).is_expected());
        assert!(!DomainError::Gateway("timeout".into()).is_expected());
    }
}
