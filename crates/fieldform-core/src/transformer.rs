//! Transformer entry points
//!
//! A [`Transformer`] owns a registry, a directive source and a scratch
//! context pool. It is `Send + Sync`; one instance can serve concurrent
//! callers, each of which checks out its own scratch context.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::cancel::CancelToken;
use crate::config::{DispatchMode, ExecutionMode, TransformerConfig};
use crate::dispatch::{Dispatcher, FieldLevel, InlineSink};
use crate::error::{Error, Result};
use crate::fanout::{self, JobCollector};
use crate::field_error::FieldErrors;
use crate::pool::{ContextPool, Scratch};
use crate::registry::{Registry, TransformFn};
use crate::resolver::{resolve, Resolved};
use crate::source::{DirectiveSource, TagSource};
use crate::unwrap::extract;
use crate::walk::Walker;
use crate::value::{Kind, Reflect, ReflectRef};
use log::debug;
use tracing::debug_span;

/// Directive-driven field transformation engine
pub struct Transformer {
    registry: Registry,
    source: Box<dyn DirectiveSource>,
    pool: ContextPool,
    mode: DispatchMode,
}

impl Transformer {
    /// Sequential engine with the built-in directives and derive-macro tags
    pub fn new() -> Self {
        Self {
            registry: Registry::with_builtins(),
            source: Box::new(TagSource),
            pool: ContextPool::default(),
            mode: DispatchMode::Sequential,
        }
    }

    pub fn builder() -> TransformerBuilder {
        TransformerBuilder::new()
    }

    /// Apply every field's directive chain to `record` in place
    ///
    /// Returns `Error::Fields` when one or more fields failed a directive;
    /// every other error aborts the call immediately.
    pub fn transform<T: Reflect>(&self, record: &mut T) -> Result<()> {
        self.run(record, None)
    }

    /// Like [`Transformer::transform`], checking `cancel` between top-level fields
    pub fn transform_with<T: Reflect>(&self, record: &mut T, cancel: &CancelToken) -> Result<()> {
        self.run(record, Some(cancel))
    }

    /// Transform a type-erased record
    pub fn transform_dyn(&self, record: &mut dyn Reflect) -> Result<()> {
        self.run(record, None)
    }

    /// Resolve a namespace path against `root`
    pub fn resolve<'a>(&self, root: &'a dyn Reflect, path: &str) -> Result<Resolved<'a>> {
        resolve(root, path)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable registry access, for registering directives after construction
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    fn run(&self, root: &mut dyn Reflect, cancel: Option<&CancelToken>) -> Result<()> {
        let record = record_name(&*root)?;
        let span = debug_span!("transform", record, mode = ?self.mode);
        let _enter = span.enter();

        let mut scratch = self.pool.acquire();
        let Scratch {
            namespace,
            cursor,
            errors,
        } = &mut *scratch;
        let dispatcher = Dispatcher::new(&self.registry);
        let mut walker = Walker::new(&self.registry, self.source.as_ref(), namespace, cursor);

        match self.mode {
            DispatchMode::Sequential => {
                let mut sink = InlineSink::new(dispatcher, &mut *errors);
                walker.with_cancel(cancel).walk(root, &mut sink)?;
            }
            DispatchMode::Parallel { workers } => {
                let mut collector = JobCollector::new(&self.registry);
                walker.walk(root, &mut collector)?;
                fanout::run(collector, root, &dispatcher, workers, cancel, &mut *errors)?;
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(failed = errors.len(), "transform finished with field errors");
            Err(FieldErrors::new(std::mem::take(errors)).into())
        }
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

/// The root must unwrap to a record that holds a value
fn record_name(root: &dyn Reflect) -> Result<&'static str> {
    let ex = extract(Some(root));
    let reason = match ex.value.map(|v| v.reflect_ref()) {
        Some(ReflectRef::Record(record)) => return Ok(record.record_name()),
        _ if ex.kind == Kind::Optional => "root holds no value".to_string(),
        _ if ex.kind == Kind::Time => "date/time values are leaves, not records".to_string(),
        _ => format!("expected a record, found {}", ex.kind),
    };
    Err(Error::InvalidRoot {
        type_name: root.type_name(),
        reason,
    })
}

/// Builder for creating a [`Transformer`]
#[derive(Default)]
pub struct TransformerBuilder {
    config: TransformerConfig,
    registry: Option<Registry>,
    source: Option<Box<dyn DirectiveSource>>,
    functions: Vec<(String, Box<TransformFn>, bool)>,
    aliases: Vec<(String, String)>,
}

impl TransformerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn config(mut self, config: TransformerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the dispatch mode
    pub fn mode(mut self, mode: DispatchMode) -> Self {
        match mode {
            DispatchMode::Sequential => self.config.mode = ExecutionMode::Sequential,
            DispatchMode::Parallel { workers } => {
                self.config.mode = ExecutionMode::Parallel;
                self.config.workers = workers;
            }
        }
        self
    }

    /// Use a prepared registry instead of a fresh one
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Read directives from `source` instead of derive-macro tags
    pub fn source(mut self, source: impl DirectiveSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Register a directive when the transformer is built
    pub fn directive<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut FieldLevel<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.functions.push((name.into(), Box::new(func), false));
        self
    }

    /// Register a cross-field directive when the transformer is built
    pub fn cross_field_directive<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut FieldLevel<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.functions.push((name.into(), Box::new(func), true));
        self
    }

    /// Register an alias when the transformer is built
    pub fn alias(mut self, alias: impl Into<String>, expansion: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), expansion.into()));
        self
    }

    /// Build the transformer
    pub fn build(self) -> Result<Transformer> {
        self.config.validate()?;

        let mut registry = match self.registry {
            Some(registry) => registry,
            None if self.config.builtins => Registry::with_builtins(),
            None => Registry::new(),
        };
        for (name, func, cross_field) in self.functions {
            registry.register_boxed(&name, func, cross_field)?;
        }
        for (alias, expansion) in &self.aliases {
            registry.register_alias(alias, expansion)?;
        }

        let mode = self.config.dispatch_mode();
        debug!(
            "Building transformer: mode={:?}, directives={}, pool={:?}",
            mode,
            registry.len(),
            self.config.pool
        );

        Ok(Transformer {
            registry,
            source: self.source.unwrap_or_else(|| Box::new(TagSource)),
            pool: ContextPool::new(self.config.pool),
            mode,
        })
    }
}
