//! Error types for forum storage operations.

use std::fmt;
use thiserror::Error;

/// Result type alias for forum operations.
pub type Result<T> = std::result::Result<T, ForumError>;

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// A user profile, keyed by nickname.
    Profile,
    /// A forum, keyed by slug.
    Forum,
    /// A thread, keyed by id or slug.
    Thread,
    /// A post, keyed by id.
    Post,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Profile => write!(f, "user"),
            Entity::Forum => write!(f, "forum"),
            Entity::Thread => write!(f, "thread"),
            Entity::Post => write!(f, "post"),
        }
    }
}

/// Main error type for forum operations.
#[derive(Error, Debug)]
pub enum ForumError {
    /// A referenced record does not exist
    #[error("Can't find {entity} {key}")]
    NotFound { entity: Entity, key: String },

    /// A write violated a uniqueness or linkage constraint
    #[error("Conflict on {entity}: {reason}")]
    Conflict { entity: Entity, reason: String },

    /// Caller input failed validation
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Storage engine errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForumError {
    /// Creates a new not-found error.
    pub fn not_found<T: ToString>(entity: Entity, key: T) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Creates a new conflict error.
    pub fn conflict<T: ToString>(entity: Entity, reason: T) -> Self {
        Self::Conflict {
            entity,
            reason: reason.to_string(),
        }
    }

    /// Creates a new validation error.
    pub fn validation<T: ToString>(field: &'static str, reason: T) -> Self {
        Self::Validation {
            field,
            reason: reason.to_string(),
        }
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Returns true for [`ForumError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`ForumError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ForumError::not_found(Entity::Profile, "alice");
        assert_eq!(err.to_string(), "Can't find user alice");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());

        let err = ForumError::conflict(Entity::Post, "parent 7 is in another thread");
        assert_eq!(
            err.to_string(),
            "Conflict on post: parent 7 is in another thread"
        );
        assert!(err.is_conflict());

        let err = ForumError::validation("voice", "must be -1 or 1");
        assert_eq!(err.to_string(), "Invalid voice: must be -1 or 1");
    }
}
