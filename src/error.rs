// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the structure tree engine

use crate::node::NodeId;
use thiserror::Error;

/// Result type for structure operations
pub type StructureResult<T> = Result<T, StructureError>;

/// Errors that can occur while declaring schemas or manipulating structure trees
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructureError {
    /// Type name not known to the registry or factory
    #[error("Unknown structure type '{type_name}'")]
    UnknownType {
        /// The type name that could not be resolved
        type_name: String,
    },

    /// Slot name not declared by the owning structure type
    #[error("'{slot}' is not a declared child of {structure}")]
    UndeclaredSlot {
        /// Owning structure type
        structure: String,
        /// Requested slot name
        slot: String,
    },

    /// A new repetition would exceed the slot's cardinality
    #[error("Slot '{slot}' of {structure} cannot hold more than {limit} repetition(s)")]
    CardinalityViolation {
        /// Owning structure type
        structure: String,
        /// Slot name
        slot: String,
        /// Maximum repetitions allowed
        limit: usize,
    },

    /// Repetition index is more than one past the existing repetitions
    #[error(
        "Repetition {index} of '{slot}' in {structure} is out of sequence ({count} repetition(s) exist)"
    )]
    IndexOutOfSequence {
        /// Owning structure type
        structure: String,
        /// Slot name
        slot: String,
        /// Requested index
        index: usize,
        /// Repetitions existing at the time of the call
        count: usize,
    },

    /// Node is not a current repetition of the slot
    #[error("Node {node} is not a repetition of '{slot}' in {structure}")]
    NotFound {
        /// Owning structure type
        structure: String,
        /// Slot name
        slot: String,
        /// Identity of the node that was looked for
        node: NodeId,
    },

    /// Type re-declared with different slots
    #[error("Structure type '{type_name}' conflicts with an existing declaration: {reason}")]
    SchemaConflict {
        /// The conflicting type name
        type_name: String,
        /// What differs
        reason: String,
    },

    /// Declaration is malformed on its own
    #[error("Invalid declaration of '{type_name}': {reason}")]
    InvalidDeclaration {
        /// The declared type name
        type_name: String,
        /// Reason why the declaration is invalid
        reason: String,
    },

    /// Factory failure while materializing a child
    #[error("Failed to construct '{slot}' in {structure}: {source}")]
    Construction {
        /// Owning structure type
        structure: String,
        /// Slot being materialized
        slot: String,
        /// Underlying factory error
        #[source]
        source: Box<StructureError>,
    },

    /// Structure path could not be parsed or followed
    #[error("Invalid structure path '{path}': {reason}")]
    InvalidPath {
        /// Path text
        path: String,
        /// Reason why the path is invalid
        reason: String,
    },

    /// Schema or configuration document could not be read
    #[error("Invalid document: {reason}")]
    InvalidDocument {
        /// Parser message
        reason: String,
    },
}

/// Closed classification of [`StructureError`] for programmatic matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureErrorKind {
    /// See [`StructureError::UnknownType`]
    UnknownType,
    /// See [`StructureError::UndeclaredSlot`]
    UndeclaredSlot,
    /// See [`StructureError::CardinalityViolation`]
    CardinalityViolation,
    /// See [`StructureError::IndexOutOfSequence`]
    IndexOutOfSequence,
    /// See [`StructureError::NotFound`]
    NotFound,
    /// See [`StructureError::SchemaConflict`]
    SchemaConflict,
    /// See [`StructureError::InvalidDeclaration`]
    InvalidDeclaration,
    /// See [`StructureError::InvalidPath`]
    InvalidPath,
    /// See [`StructureError::InvalidDocument`]
    InvalidDocument,
}

impl StructureError {
    /// Kind of this error; construction failures report the wrapped kind
    pub fn kind(&self) -> StructureErrorKind {
        match self {
            Self::UnknownType { .. } => StructureErrorKind::UnknownType,
            Self::UndeclaredSlot { .. } => StructureErrorKind::UndeclaredSlot,
            Self::CardinalityViolation { .. } => StructureErrorKind::CardinalityViolation,
            Self::IndexOutOfSequence { .. } => StructureErrorKind::IndexOutOfSequence,
            Self::NotFound { .. } => StructureErrorKind::NotFound,
            Self::SchemaConflict { .. } => StructureErrorKind::SchemaConflict,
            Self::InvalidDeclaration { .. } => StructureErrorKind::InvalidDeclaration,
            Self::Construction { source, .. } => source.kind(),
            Self::InvalidPath { .. } => StructureErrorKind::InvalidPath,
            Self::InvalidDocument { .. } => StructureErrorKind::InvalidDocument,
        }
    }

    /// Create an unknown type error
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Create an undeclared slot error
    pub fn undeclared_slot(structure: impl Into<String>, slot: impl Into<String>) -> Self {
        Self::UndeclaredSlot {
            structure: structure.into(),
            slot: slot.into(),
        }
    }

    /// Create a cardinality violation error
    pub fn cardinality_violation(
        structure: impl Into<String>,
        slot: impl Into<String>,
        limit: usize,
    ) -> Self {
        Self::CardinalityViolation {
            structure: structure.into(),
            slot: slot.into(),
            limit,
        }
    }

    /// Create an index out of sequence error
    pub fn index_out_of_sequence(
        structure: impl Into<String>,
        slot: impl Into<String>,
        index: usize,
        count: usize,
    ) -> Self {
        Self::IndexOutOfSequence {
            structure: structure.into(),
            slot: slot.into(),
            index,
            count,
        }
    }

    /// Create a not found error
    pub fn not_found(structure: impl Into<String>, slot: impl Into<String>, node: NodeId) -> Self {
        Self::NotFound {
            structure: structure.into(),
            slot: slot.into(),
            node,
        }
    }

    /// Create a schema conflict error
    pub fn schema_conflict(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaConflict {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid declaration error
    pub fn invalid_declaration(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a factory error raised while materializing `slot`
    pub fn construction(
        structure: impl Into<String>,
        slot: impl Into<String>,
        source: StructureError,
    ) -> Self {
        Self::Construction {
            structure: structure.into(),
            slot: slot.into(),
            source: Box::new(source),
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid document error
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StructureError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_document(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_reports_wrapped_kind() {
        let err = StructureError::construction(
            "CCU_I20",
            "MSH",
            StructureError::unknown_type("MSH"),
        );
        assert_eq!(err.kind(), StructureErrorKind::UnknownType);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = StructureError::index_out_of_sequence("CCU_I20", "SFT", 3, 1);
        let message = err.to_string();
        assert!(message.contains("SFT"));
        assert!(message.contains("CCU_I20"));
        assert!(message.contains('3'));
    }

    #[test]
    fn test_json_errors_become_document_errors() {
        let err: StructureError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), StructureErrorKind::InvalidDocument);
    }
}
