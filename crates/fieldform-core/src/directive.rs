//! Directive tag parser
//!
//! Turns a raw tag such as `"trim,max=10,clean"` into the ordered list of
//! directives applied to a field. The parser is permissive: it never fails.
//! A name the registry does not know is kept as-is and only surfaces as an
//! unknown-directive error when the dispatcher reaches it.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

/// Separates directives within a tag
pub const DIRECTIVE_SEPARATOR: char = ',';

/// Separates a directive name from its parameter
pub const PARAM_SEPARATOR: char = '=';

/// A tag consisting of only this marker excludes the field from traversal
pub const SKIP_TAG: &str = "-";

/// Reserved directive: the rest of the chain applies to each element
pub const DIVE: &str = "dive";

/// Escaped comma inside a parameter
const ESCAPED_COMMA: &str = "0x2C";

/// One named, optionally parameterized operation in a field's chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    name: String,
    alias: Option<String>,
    param: Option<String>,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            param: None,
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Registry name of the function to invoke
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias this directive was expanded from, if any
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Name as declared on the field: the alias when expanded from one
    pub fn tag(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Parameter, or the empty string when none was given
    pub fn param(&self) -> &str {
        self.param.as_deref().unwrap_or("")
    }

    pub fn has_param(&self) -> bool {
        self.param.is_some()
    }

    pub fn is_dive(&self) -> bool {
        self.name == DIVE
    }
}

/// Alias resolution consulted while parsing
pub trait AliasLookup {
    /// The directive string an alias stands for
    fn expansion(&self, name: &str) -> Option<&str>;
}

/// Lookup that knows no aliases
pub struct NoAliases;

impl AliasLookup for NoAliases {
    fn expansion(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// Parses directive tags, expanding registry aliases as it goes
pub struct DirectiveParser<'a> {
    aliases: &'a dyn AliasLookup,
}

impl<'a> DirectiveParser<'a> {
    pub fn new(aliases: &'a dyn AliasLookup) -> Self {
        Self { aliases }
    }

    /// Parse a raw tag into its ordered directive chain
    ///
    /// An empty tag yields an empty chain. Entries are trimmed and empty
    /// entries dropped. `name=` yields a directive whose parameter is the
    /// empty string.
    /// A parameter given to an alias is handed to every expanded directive
    /// that does not declare its own.
    pub fn parse(&self, tag: &str) -> Vec<Directive> {
        let mut chain = Vec::new();
        self.parse_into(tag, &mut chain);
        chain
    }

    pub fn parse_into(&self, tag: &str, chain: &mut Vec<Directive>) {
        for entry in tag.split(DIRECTIVE_SEPARATOR) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let directive = parse_entry(entry);
            match self.aliases.expansion(directive.name()) {
                // Aliases expand one level only; the registry refuses
                // expansions that reference other aliases.
                Some(expansion) => {
                    for entry in expansion.split(DIRECTIVE_SEPARATOR) {
                        let entry = entry.trim();
                        if entry.is_empty() {
                            continue;
                        }
                        let expanded = parse_entry(entry).with_alias(directive.name());
                        chain.push(match (&directive.param, expanded.has_param()) {
                            (Some(param), false) => expanded.with_param(param.clone()),
                            _ => expanded,
                        });
                    }
                }
                None => chain.push(directive),
            }
        }
    }
}

/// Parse a tag with no alias resolution
pub fn parse(tag: &str) -> Vec<Directive> {
    DirectiveParser::new(&NoAliases).parse(tag)
}

/// Whether a raw tag opts the field out of traversal
pub fn is_skip_tag(tag: &str) -> bool {
    tag.trim() == SKIP_TAG
}

fn parse_entry(entry: &str) -> Directive {
    match entry.split_once(PARAM_SEPARATOR) {
        Some((name, param)) => {
            Directive::new(name.trim()).with_param(param.trim().replace(ESCAPED_COMMA, ","))
        }
        None => Directive::new(entry),
    }
}
