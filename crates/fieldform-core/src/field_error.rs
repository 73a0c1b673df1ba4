//! Structured per-field failures and their aggregate
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::value::{Kind, Value};
use std::fmt;

/// One field's failed directive application
///
/// Built by the dispatcher from the namespaces, directive and value in
/// effect at the moment of failure. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    tag: String,
    actual_tag: String,
    namespace: String,
    struct_namespace: String,
    field: String,
    struct_field: String,
    value: Value,
    param: String,
    kind: Kind,
}

impl FieldError {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tag: &str,
        actual_tag: &str,
        namespace: &str,
        struct_namespace: &str,
        field: &str,
        struct_field: &str,
        value: Value,
        param: &str,
        kind: Kind,
    ) -> Self {
        Self {
            tag: tag.to_string(),
            actual_tag: actual_tag.to_string(),
            namespace: namespace.to_string(),
            struct_namespace: struct_namespace.to_string(),
            field: field.to_string(),
            struct_field: struct_field.to_string(),
            value,
            param: param.to_string(),
            kind,
        }
    }

    /// Directive that failed; the alias name when it came from an alias
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Directive that failed, with aliases resolved to the real name
    pub fn actual_tag(&self) -> &str {
        &self.actual_tag
    }

    /// Namespace with display (alias) names taking precedence
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Namespace made of structural field names only
    pub fn struct_namespace(&self) -> &str {
        &self.struct_namespace
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn struct_field(&self) -> &str {
        &self.struct_field
    }

    /// Field value at the moment of failure
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Directive parameter, empty when none was given
    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key: '{}' Error: field '{}' failed on the '{}' directive",
            self.struct_namespace, self.field, self.tag
        )?;
        if !self.param.is_empty() {
            write!(f, " (param '{}')", self.param)?;
        }
        match &self.value {
            Value::String(s) => write!(f, " with value {:?}", s),
            other => write!(f, " with value {}", other),
        }
    }
}

impl std::error::Error for FieldError {}

/// Ordered collection of field failures, in the order fields were visited
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ns: &str, tag: &str, value: Value) -> FieldError {
        FieldError::new(tag, tag, ns, ns, ns, ns, value, "", Kind::String)
    }

    #[test]
    fn test_single_line_rendering() {
        let err = FieldError::new(
            "short",
            "maxlen",
            "profile.userName",
            "profile.user_name",
            "userName",
            "user_name",
            Value::from("abcdef"),
            "3",
            Kind::String,
        );

        let line = err.to_string();
        assert_eq!(
            line,
            "Key: 'profile.user_name' Error: field 'userName' failed on the 'short' directive (param '3') with value \"abcdef\""
        );
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_aggregate_joins_lines_in_order() {
        let errors = FieldErrors::new(vec![
            sample("first", "trim", Value::Int(1)),
            sample("second", "upper", Value::from("x")),
        ]);

        let rendered = errors.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("'first'") && lines[0].contains("with value 1"));
        assert!(lines[1].contains("'second'"));
    }

    #[test]
    fn test_empty_aggregate_renders_nothing() {
        assert_eq!(FieldErrors::default().to_string(), "");
    }
}
