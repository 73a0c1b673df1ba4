//! Directive dispatch
//!
//! Applies one field's directive chain, in declared order, to an owned
//! snapshot of the field's value. The first directive that reports failure
//! records a [`FieldError`] and ends that field's chain; an unknown
//! directive or an error returned by a function aborts the whole call.
//! Callers write the snapshot back through the field's handle afterwards.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::directive::Directive;
use crate::error::{Error, Result};
use crate::field_error::FieldError;
use crate::namespace::{locate, locate_mut, Step};
use crate::registry::Registry;
use crate::resolver::{resolve, Resolved};
use crate::unwrap::extract_mut;
use crate::value::{Kind, Reflect, ReflectMut, Value};
use crate::walk::{Leaf, LeafSink};
use tracing::trace;

/// Where a leaf sits and what it is, for the duration of its chain
pub(crate) struct LeafContext<'a> {
    pub root: &'a dyn Reflect,
    /// Nearest enclosing record
    pub parent: Option<&'a dyn Reflect>,
    pub namespace: &'a str,
    pub struct_namespace: &'a str,
    pub field: &'a str,
    pub struct_field: &'a str,
    pub kind: Kind,
    pub nullable: bool,
}

/// Everything a transformation function can see about the field it runs on
pub struct FieldLevel<'a> {
    ctx: &'a LeafContext<'a>,
    value: &'a mut Value,
    directive: &'a Directive,
}

impl<'a> FieldLevel<'a> {
    /// The root record of the current call
    pub fn top(&self) -> &'a dyn Reflect {
        self.ctx.root
    }

    /// The record declaring the current field
    pub fn parent(&self) -> Option<&'a dyn Reflect> {
        self.ctx.parent
    }

    /// Current value, including rewrites made earlier in the chain
    pub fn value(&self) -> &Value {
        self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        self.value
    }

    /// Replace the current value; written back once the chain ends
    pub fn set_value(&mut self, value: impl Into<Value>) {
        *self.value = value.into();
    }

    /// The current value as a string, when string-valued
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn is_string(&self) -> bool {
        self.value.is_string()
    }

    /// Kind of the unwrapped field
    pub fn kind(&self) -> Kind {
        self.ctx.kind
    }

    /// Whether the field sits behind a nullable or dynamic layer
    pub fn nullable(&self) -> bool {
        self.ctx.nullable
    }

    /// Field name, alias taking precedence
    pub fn field_name(&self) -> &str {
        self.ctx.field
    }

    pub fn struct_field_name(&self) -> &str {
        self.ctx.struct_field
    }

    pub fn namespace(&self) -> &str {
        self.ctx.namespace
    }

    pub fn struct_namespace(&self) -> &str {
        self.ctx.struct_namespace
    }

    /// Directive as declared, alias name when expanded from one
    pub fn directive(&self) -> &str {
        self.directive.tag()
    }

    /// Registered name of the running directive
    pub fn actual_directive(&self) -> &str {
        self.directive.name()
    }

    pub fn param(&self) -> &str {
        self.directive.param()
    }

    /// Resolve a path from the root record
    pub fn lookup(&self, path: &str) -> Result<Resolved<'a>> {
        resolve(self.ctx.root, path)
    }

    /// Resolve a path from an arbitrary handle
    pub fn lookup_from(&self, handle: &'a dyn Reflect, path: &str) -> Result<Resolved<'a>> {
        resolve(handle, path)
    }

    /// Resolve the directive parameter as a path relative to the parent record
    pub fn param_field(&self) -> Result<Resolved<'a>> {
        let start = self.ctx.parent.unwrap_or(self.ctx.root);
        resolve(start, self.directive.param())
    }
}

/// Runs directive chains against a registry
pub(crate) struct Dispatcher<'r> {
    registry: &'r Registry,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Apply `chain` to `value`, pushing at most one field error
    pub fn apply(
        &self,
        ctx: &LeafContext<'_>,
        chain: &[Directive],
        value: &mut Value,
        errors: &mut Vec<FieldError>,
    ) -> Result<()> {
        for directive in chain {
            let func = self
                .registry
                .get(directive.name())
                .ok_or_else(|| Error::UnknownDirective {
                    directive: directive.name().to_string(),
                    namespace: ctx.struct_namespace.to_string(),
                })?;

            trace!(
                directive = directive.name(),
                namespace = ctx.struct_namespace,
                "applying directive"
            );

            let passed = {
                let mut level = FieldLevel {
                    ctx,
                    value: &mut *value,
                    directive,
                };
                func(&mut level)?
            };

            if !passed {
                trace!(
                    directive = directive.name(),
                    namespace = ctx.struct_namespace,
                    "directive failed"
                );
                errors.push(FieldError::new(
                    directive.tag(),
                    directive.name(),
                    ctx.namespace,
                    ctx.struct_namespace,
                    ctx.field,
                    ctx.struct_field,
                    value.clone(),
                    directive.param(),
                    ctx.kind,
                ));
                break;
            }
        }
        Ok(())
    }
}

/// Applies each leaf's chain as soon as the walker reaches it
///
/// Results are written back before the walk moves on, so later fields see
/// earlier rewrites through cross-field lookups.
pub(crate) struct InlineSink<'s> {
    dispatcher: Dispatcher<'s>,
    errors: &'s mut Vec<FieldError>,
}

impl<'s> InlineSink<'s> {
    pub fn new(dispatcher: Dispatcher<'s>, errors: &'s mut Vec<FieldError>) -> Self {
        Self { dispatcher, errors }
    }
}

impl LeafSink for InlineSink<'_> {
    fn leaf(&mut self, root: &mut dyn Reflect, leaf: Leaf<'_>) -> Result<()> {
        let mut value = leaf.value.clone();
        let applied = {
            let top: &dyn Reflect = &*root;
            let ctx = LeafContext {
                root: top,
                parent: locate(top, &leaf.steps[..leaf.parent_depth]),
                namespace: leaf.namespace.display(),
                struct_namespace: leaf.namespace.structural(),
                field: leaf.field,
                struct_field: leaf.struct_field,
                kind: leaf.kind,
                nullable: leaf.nullable,
            };
            self.dispatcher
                .apply(&ctx, leaf.chain, &mut value, &mut *self.errors)
        };

        let written = if value != leaf.value {
            write_back(root, leaf.steps, leaf.namespace.structural(), value)
        } else {
            Ok(())
        };
        applied.and(written)
    }
}

/// Store `value` into the scalar reached by `steps` from `root`
pub(crate) fn write_back(
    root: &mut dyn Reflect,
    steps: &[Step],
    namespace: &str,
    value: Value,
) -> Result<()> {
    let target = extract_mut(locate_mut(root, steps)).value;
    match target.map(|t| t.reflect_mut()) {
        Some(ReflectMut::Scalar(scalar)) => scalar.set(value).map_err(|source| Error::Value {
            namespace: namespace.to_string(),
            source,
        }),
        _ => Err(Error::InvalidNamespace {
            namespace: namespace.to_string(),
            remaining: String::new(),
            kind: Kind::Invalid,
        }),
    }
}
