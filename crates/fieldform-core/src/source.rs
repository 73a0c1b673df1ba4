//! Directive sources
//!
//! The engine asks a [`DirectiveSource`] for each field's raw directive tag.
//! [`TagSource`] reads the tags compiled in by `#[derive(Record)]`;
//! [`SchemaSource`] reads them from a JSON or YAML document so directives
//! can be declared without touching the record types.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use crate::value::{FieldInfo, Reflect};
use log::debug;
use std::collections::HashMap;
use std::path::Path;

/// One field, as presented to a directive source
pub struct FieldDescriptor<'a> {
    pub record: &'static str,
    pub index: usize,
    pub info: &'static FieldInfo,
    /// The field's storage, before unwrapping
    pub value: Option<&'a dyn Reflect>,
}

impl FieldDescriptor<'_> {
    /// Structural field name
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Whether a serialization hint marked the field omitted
    pub fn is_omitted(&self) -> bool {
        self.info.omit
    }
}

/// Supplies the raw directive tag for a field
pub trait DirectiveSource: Send + Sync {
    fn directives<'a>(&'a self, field: &FieldDescriptor<'_>) -> Option<&'a str>;
}

/// Reads `#[transform("...")]` tags emitted by the derive macro
#[derive(Debug, Clone, Copy, Default)]
pub struct TagSource;

impl DirectiveSource for TagSource {
    fn directives<'a>(&'a self, field: &FieldDescriptor<'_>) -> Option<&'a str> {
        field.info.tag
    }
}

/// Directives declared out of band, keyed by record name then field name
///
/// ```yaml
/// User:
///   name: trim,lowercase
///   email: trim
/// ```
pub struct SchemaSource {
    records: HashMap<String, HashMap<String, String>>,
    fallback: Option<Box<dyn DirectiveSource>>,
}

impl SchemaSource {
    pub fn new(records: HashMap<String, HashMap<String, String>>) -> Self {
        Self {
            records,
            fallback: None,
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let records = serde_json::from_str(content)
            .map_err(|e| Error::config_with_source("Invalid JSON directive schema", e))?;
        Ok(Self::new(records))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let records = serde_yaml::from_str(content)
            .map_err(|e| Error::config_with_source("Invalid YAML directive schema", e))?;
        Ok(Self::new(records))
    }

    /// Load a schema file, choosing the format by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config_with_source(
                format!("Failed to read directive schema {}", path.display()),
                e,
            )
        })?;

        debug!("Loading directive schema from {}", path.display());
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Consult `fallback` for records or fields the schema does not mention
    pub fn with_fallback(mut self, fallback: impl DirectiveSource + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl DirectiveSource for SchemaSource {
    fn directives<'a>(&'a self, field: &FieldDescriptor<'_>) -> Option<&'a str> {
        let declared = self
            .records
            .get(field.record)
            .and_then(|fields| fields.get(field.name()))
            .map(String::as_str);

        match (declared, &self.fallback) {
            (Some(tag), _) => Some(tag),
            (None, Some(fallback)) => fallback.directives(field),
            (None, None) => None,
        }
    }
}
