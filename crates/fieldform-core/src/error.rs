//! Error types for the Fieldform core library
//!
//! Errors fall into four families. Usage errors (`InvalidRoot`) are raised
//! before traversal starts. Configuration errors (`UnknownDirective`,
//! `Registry`, `NotSettable`, `UnsupportedTarget`, `Config`) and structural
//! errors (`InvalidNamespace`) abort the whole call. Data errors are the
//! per-field failures collected into [`FieldErrors`] and surfaced once, as
//! `Error::Fields`, after the traversal completes.

use crate::field_error::FieldErrors;
use crate::value::{Kind, SetError};
use thiserror::Error;

/// Main error type for Fieldform operations
#[derive(Error, Debug)]
pub enum Error {
    /// The value passed to `transform` cannot be traversed
    #[error("Invalid transform root: {type_name} ({reason})")]
    InvalidRoot {
        type_name: &'static str,
        reason: String,
    },

    /// A tag references a directive the registry does not know
    #[error("Unknown directive '{directive}' on field '{namespace}'")]
    UnknownDirective {
        directive: String,
        namespace: String,
    },

    /// Registry misuse (empty, reserved or duplicate names, bad aliases)
    #[error("Registry error: {message}")]
    Registry { name: String, message: String },

    /// A directive was declared on a field the engine may not write
    #[error("Field '{namespace}' is not settable but declares directives '{directives}'")]
    NotSettable {
        namespace: String,
        directives: String,
    },

    /// Directives were declared on a field whose kind cannot receive them
    #[error("Directive '{directive}' cannot be applied to {kind} field '{namespace}'")]
    UnsupportedTarget {
        directive: String,
        namespace: String,
        kind: Kind,
    },

    /// Configuration loading or validation failed
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A namespace path does not match the shape of the record graph
    #[error("Invalid field namespace '{namespace}': cannot descend into {kind} at '{remaining}'")]
    InvalidNamespace {
        namespace: String,
        remaining: String,
        kind: Kind,
    },

    /// A transformed value could not be written back
    #[error("Cannot write back field '{namespace}': {source}")]
    Value {
        namespace: String,
        #[source]
        source: SetError,
    },

    /// The cancellation token fired or its deadline passed
    #[error("Transform cancelled before field group '{namespace}'")]
    Cancelled { namespace: String },

    /// One or more fields failed their directives
    #[error(transparent)]
    Fields(#[from] FieldErrors),
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn config_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Error::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn registry(name: &str, message: impl Into<String>) -> Self {
        Error::Registry {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// True for the only recoverable family: per-field data failures
    pub fn is_data_error(&self) -> bool {
        matches!(self, Error::Fields(_))
    }

    /// True for errors caused by how directives or the engine were declared
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownDirective { .. }
                | Error::Registry { .. }
                | Error::NotSettable { .. }
                | Error::UnsupportedTarget { .. }
                | Error::Config { .. }
                | Error::InvalidNamespace { .. }
        )
    }

    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::InvalidRoot { .. })
    }

    /// The aggregated field failures, when this is a data error
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Error::Fields(errors) => Some(errors),
            _ => None,
        }
    }
}
