//! # Error Types
//!
//! Structured error types for slab_core. Every variant names the category,
//! module or field responsible so a user can fix the offending spreadsheet
//! or context without reading internals.
//!
//! Threshold violations (an inadequate factor of safety, excessive afflux)
//! are never errors. They are ordinary results with `passed = false`.
//!
//! ## Example
//!
//! ```rust
//! use slab_core::errors::{DesignError, DesignResult};
//!
//! fn validate_span(span_m: f64) -> DesignResult<()> {
//!     if span_m <= 0.0 {
//!         return Err(DesignError::domain_value(
//!             "context",
//!             "effectiveSpan",
//!             span_m.to_string(),
//!             "Span must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::Category;

/// Result type alias for slab_core operations
pub type DesignResult<T> = Result<T, DesignError>;

/// Structured error type for extraction, resolution, analysis and coordination.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum DesignError {
    /// The byte stream is not a spreadsheet container we can parse
    #[error("Unreadable workbook: {reason}")]
    UnreadableWorkbook { reason: String },

    /// A requested sheet has no populated cells
    #[error("Worksheet '{sheet}' has no populated cells")]
    EmptyWorksheet { sheet: String },

    /// A requested sheet does not exist in the workbook
    #[error("Worksheet '{sheet}' not found (available: {})", .available.join(", "))]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    /// One or more required fields are absent. Lists all of them.
    #[error("{category}: missing required field(s): {}", .fields.join(", "))]
    MissingField {
        category: Category,
        fields: Vec<String>,
    },

    /// A cell value cannot be coerced to the declared field type
    #[error("{category}: field '{field}' expected {expected}, got {got}")]
    TypeMismatch {
        category: Category,
        field: String,
        expected: String,
        got: String,
    },

    /// Several resolution problems for one category, reported together
    #[error("{category}: {} parameter problem(s): {}", .errors.len(), join_errors(.errors))]
    InvalidParameters {
        category: Category,
        errors: Vec<DesignError>,
    },

    /// An input describes an impossible physical configuration
    #[error("{module}: invalid value for '{field}': {value} - {reason}")]
    DomainValueError {
        module: String,
        field: String,
        value: String,
        reason: String,
    },

    /// Shared context fields disagree between the project and a module's inputs
    #[error("Inconsistent '{field}': project value {expected}, module values {per_module:?}")]
    InconsistentContext {
        field: String,
        expected: String,
        per_module: BTreeMap<String, String>,
    },

    /// The coordinator was not given a parameter set for a category
    #[error("No parameter set supplied for {category}")]
    MissingParameterSet { category: Category },

    /// The next serial for a key is taken or the sequence is exhausted
    #[error("Allocation conflict: serial {serial} for '{key}' is already taken")]
    AllocationConflict { key: String, serial: u32 },

    /// A field specification could not be parsed or is self-contradictory
    #[error("Invalid field spec: {reason}")]
    InvalidFieldSpec { reason: String },

    /// An operation was attempted in the wrong coordinator state
    #[error("Invalid state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// JSON/TOML serialization or deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },
}

fn join_errors(errors: &[DesignError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DesignError {
    /// Create an UnreadableWorkbook error
    pub fn unreadable(reason: impl Into<String>) -> Self {
        DesignError::UnreadableWorkbook {
            reason: reason.into(),
        }
    }

    /// Create a DomainValueError
    pub fn domain_value(
        module: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DesignError::DomainValueError {
            module: module.into(),
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error
    pub fn type_mismatch(
        category: Category,
        field: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        DesignError::TypeMismatch {
            category,
            field: field.into(),
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        DesignError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization(reason: impl Into<String>) -> Self {
        DesignError::SerializationError {
            reason: reason.into(),
        }
    }

    /// Whether this error aborts a coordination run outright rather than
    /// being collected alongside other problems of the same category.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            DesignError::DomainValueError { .. }
                | DesignError::InconsistentContext { .. }
                | DesignError::MissingParameterSet { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            DesignError::UnreadableWorkbook { .. } => "UNREADABLE_WORKBOOK",
            DesignError::EmptyWorksheet { .. } => "EMPTY_WORKSHEET",
            DesignError::SheetNotFound { .. } => "SHEET_NOT_FOUND",
            DesignError::MissingField { .. } => "MISSING_FIELD",
            DesignError::TypeMismatch { .. } => "TYPE_MISMATCH",
            DesignError::InvalidParameters { .. } => "INVALID_PARAMETERS",
            DesignError::DomainValueError { .. } => "DOMAIN_VALUE_ERROR",
            DesignError::InconsistentContext { .. } => "INCONSISTENT_CONTEXT",
            DesignError::MissingParameterSet { .. } => "MISSING_PARAMETER_SET",
            DesignError::AllocationConflict { .. } => "ALLOCATION_CONFLICT",
            DesignError::InvalidFieldSpec { .. } => "INVALID_FIELD_SPEC",
            DesignError::InvalidState { .. } => "INVALID_STATE",
            DesignError::FileError { .. } => "FILE_ERROR",
            DesignError::SerializationError { .. } => "SERIALIZATION_ERROR",
        }
    }
}
