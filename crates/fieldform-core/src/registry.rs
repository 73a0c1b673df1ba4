//! Transformation function registry
//!
//! Maps directive names to the functions that implement them, plus alias
//! names to the directive strings they expand to. A registry is owned by one
//! engine instance, filled during setup and only read during traversal.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::built_in;
use crate::directive::{self, AliasLookup, DIVE, SKIP_TAG};
use crate::dispatch::FieldLevel;
use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::fmt;

/// Signature of a transformation function
///
/// `Ok(true)` means the field passed (and may have been rewritten),
/// `Ok(false)` records a field error, `Err(_)` aborts the whole call.
pub type TransformFn = dyn Fn(&mut FieldLevel<'_>) -> Result<bool> + Send + Sync;

struct Entry {
    func: Box<TransformFn>,
    cross_field: bool,
}

/// Named transformation functions and aliases
#[derive(Default)]
pub struct Registry {
    functions: HashMap<String, Entry>,
    aliases: HashMap<String, String>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in string directives
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, func) in built_in::BUILT_INS {
            registry.functions.insert(
                (*name).to_string(),
                Entry {
                    func: Box::new(*func),
                    cross_field: false,
                },
            );
        }
        registry
    }

    /// Register a transformation function under `name`
    pub fn register<F>(&mut self, name: &str, func: F) -> Result<()>
    where
        F: Fn(&mut FieldLevel<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.register_boxed(name, Box::new(func), false)
    }

    /// Register a function that reads other fields through the resolver
    ///
    /// Parallel dispatch falls back to sequential for any call that uses one.
    pub fn register_cross_field<F>(&mut self, name: &str, func: F) -> Result<()>
    where
        F: Fn(&mut FieldLevel<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.register_boxed(name, Box::new(func), true)
    }

    /// Register `alias` as shorthand for the directive string `expansion`
    pub fn register_alias(&mut self, alias: &str, expansion: &str) -> Result<()> {
        self.check_name(alias)?;

        let chain = directive::parse(expansion);
        if chain.is_empty() {
            return Err(Error::registry(alias, format!("alias '{}' has an empty expansion", alias)));
        }
        if let Some(missing) = chain
            .iter()
            .find(|d| !d.is_dive() && !self.functions.contains_key(d.name()))
        {
            return Err(Error::registry(
                alias,
                format!(
                    "alias '{}' references unregistered directive '{}'",
                    alias,
                    missing.name()
                ),
            ));
        }

        debug!("Registered alias '{}' => '{}'", alias, expansion);
        self.aliases.insert(alias.to_string(), expansion.to_string());
        Ok(())
    }

    /// Look up the function registered under `name`
    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.functions.get(name).map(|entry| entry.func.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name) || self.aliases.contains_key(name)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Whether `name` was registered with [`Registry::register_cross_field`]
    pub fn is_cross_field(&self, name: &str) -> bool {
        self.functions.get(name).is_some_and(|entry| entry.cross_field)
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub(crate) fn register_boxed(
        &mut self,
        name: &str,
        func: Box<TransformFn>,
        cross_field: bool,
    ) -> Result<()> {
        self.check_name(name)?;
        debug!("Registered directive '{}' (cross_field: {})", name, cross_field);
        self.functions
            .insert(name.to_string(), Entry { func, cross_field });
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::registry(name, "directive name must not be empty"));
        }
        if name == DIVE || name == SKIP_TAG {
            return Err(Error::registry(name, format!("'{}' is a reserved directive name", name)));
        }
        if name.contains([directive::DIRECTIVE_SEPARATOR, directive::PARAM_SEPARATOR]) {
            return Err(Error::registry(
                name,
                format!("directive name '{}' contains a separator", name),
            ));
        }
        if self.contains(name) {
            return Err(Error::registry(name, format!("directive '{}' is already registered", name)));
        }
        Ok(())
    }
}

impl AliasLookup for Registry {
    fn expansion(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("functions", &self.names())
            .field("aliases", &self.aliases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::DirectiveParser;

    fn always(_: &mut FieldLevel<'_>) -> Result<bool> {
        Ok(true)
    }

    #[test]
    fn test_builtins_are_present() {
        let registry = Registry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["lowercase", "ltrim", "rtrim", "trim", "uppercase"]
        );
        assert!(Registry::new().is_empty());
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let mut registry = Registry::with_builtins();

        for name in ["", "  ", "dive", "-", "trim", "a,b", "a=b"] {
            let err = registry.register(name, always).unwrap_err();
            assert!(err.is_configuration_error(), "{name:?} should be rejected");
        }

        registry.register("slug", always).unwrap();
        assert!(registry.register("slug", always).is_err());
    }

    #[test]
    fn test_cross_field_flag() {
        let mut registry = Registry::new();
        registry.register("plain", always).unwrap();
        registry.register_cross_field("eqfield", always).unwrap();

        assert!(!registry.is_cross_field("plain"));
        assert!(registry.is_cross_field("eqfield"));
        assert!(!registry.is_cross_field("missing"));
    }

    #[test]
    fn test_alias_validation_and_expansion() {
        let mut registry = Registry::with_builtins();

        assert!(registry.register_alias("empty", " , ").is_err());
        assert!(registry.register_alias("broken", "trim,bogus").is_err());
        assert!(registry.register_alias("trim", "lowercase").is_err());

        registry.register_alias("clean", "trim,lowercase").unwrap();
        assert!(registry.is_alias("clean"));
        assert!(registry.register("clean", always).is_err());

        let chain = DirectiveParser::new(&registry).parse("clean");
        let names: Vec<&str> = chain.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["trim", "lowercase"]);
        assert!(chain.iter().all(|d| d.tag() == "clean"));
    }
}
