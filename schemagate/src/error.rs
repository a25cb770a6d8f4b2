use crate::schema::Kind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaGateError {
    #[error("Schema definition error in '{table}': {message}")]
    Definition { table: String, message: String },

    #[error("Validation error in '{table}.{field}': {reason}")]
    Validation {
        table: String,
        field: String,
        reason: ValidationReason,
    },

    #[error("Update operation error in '{table}': {message}")]
    UpdateOperation { table: String, message: String },

    #[error("Migration error in '{table}': {message}")]
    Migration { table: String, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cause of a failed document validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationReason {
    #[error("field is not present in the schema")]
    UnknownField,

    #[error("required field is missing")]
    MissingField,

    #[error("linked fields cannot be written")]
    LinkedField,

    #[error("invalid type received, expected {expected} got {got}")]
    TypeMismatch { expected: Kind, got: &'static str },

    #[error("received an array for a field that is not a list")]
    UnexpectedList,

    #[error("malformed datetime literal '{0}', expected RFC3339")]
    MalformedDateTime(String),

    #[error("default value is not a valid JSON object")]
    BadJsonDefault,

    #[error("nested object type is not declared")]
    UnknownNestedType,

    #[error("stored JSON is corrupted")]
    CorruptedJson,
}

impl SchemaGateError {
    pub(crate) fn definition(table: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaGateError::Definition {
            table: table.into(),
            message: message.into(),
        }
    }

    pub(crate) fn validation(
        table: impl Into<String>,
        field: impl Into<String>,
        reason: ValidationReason,
    ) -> Self {
        SchemaGateError::Validation {
            table: table.into(),
            field: field.into(),
            reason,
        }
    }

    pub(crate) fn update(table: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaGateError::UpdateOperation {
            table: table.into(),
            message: message.into(),
        }
    }

    pub(crate) fn migration(table: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaGateError::Migration {
            table: table.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaGateError>;
