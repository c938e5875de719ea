// ABOUTME: Structured error types for repository and ephemeral store operations
// ABOUTME: Provides entity-tagged errors that the engine converts into server_error responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Errors raised by storage collaborators
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Entity does not exist
    #[error("{entity_type} '{entity_id}' not found")]
    NotFound {
        /// Kind of entity
        entity_type: &'static str,
        /// Identifier that was looked up
        entity_id: String,
    },

    /// Write rejected by a uniqueness or state constraint
    #[error("Conflict on {entity_type}: {reason}")]
    Conflict {
        /// Kind of entity
        entity_type: &'static str,
        /// What constraint was violated
        reason: String,
    },

    /// Backend query failure
    #[error("Query failed: {context}")]
    QueryError {
        /// Description of the failing query
        context: String,
    },

    /// Payload could not be encoded or decoded
    #[error("Serialization failed for {context}")]
    SerializationError {
        /// Which payload failed
        context: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

impl DatabaseError {
    /// Create a `NotFound` error
    #[must_use]
    pub fn not_found(entity_type: &'static str, entity_id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            entity_id: entity_id.into(),
        }
    }

    /// Create a `Conflict` error
    #[must_use]
    pub fn conflict(entity_type: &'static str, reason: impl Into<String>) -> Self {
        Self::Conflict {
            entity_type,
            reason: reason.into(),
        }
    }

    /// Whether this error reports a constraint conflict
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result alias for storage operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
