//! Built-in directives for common string normalization
//!
//! Each built-in rewrites a string value in place and reports a field
//! failure when applied to anything that is not string-valued.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::dispatch::FieldLevel;
use crate::error::Result;

/// Built-in function pointer type
pub type BuiltIn = fn(&mut FieldLevel<'_>) -> Result<bool>;

/// Every built-in, by directive name
pub const BUILT_INS: &[(&str, BuiltIn)] = &[
    ("trim", trim),
    ("ltrim", ltrim),
    ("rtrim", rtrim),
    ("lowercase", lowercase),
    ("uppercase", uppercase),
];

/// Strip leading and trailing whitespace
pub fn trim(fl: &mut FieldLevel<'_>) -> Result<bool> {
    rewrite(fl, |s| s.trim().to_string())
}

/// Strip leading whitespace
pub fn ltrim(fl: &mut FieldLevel<'_>) -> Result<bool> {
    rewrite(fl, |s| s.trim_start().to_string())
}

/// Strip trailing whitespace
pub fn rtrim(fl: &mut FieldLevel<'_>) -> Result<bool> {
    rewrite(fl, |s| s.trim_end().to_string())
}

pub fn lowercase(fl: &mut FieldLevel<'_>) -> Result<bool> {
    rewrite(fl, str::to_lowercase)
}

pub fn uppercase(fl: &mut FieldLevel<'_>) -> Result<bool> {
    rewrite(fl, str::to_uppercase)
}

fn rewrite(fl: &mut FieldLevel<'_>, f: impl FnOnce(&str) -> String) -> Result<bool> {
    let rewritten = match fl.as_str() {
        Some(s) => f(s),
        None => return Ok(false),
    };
    fl.set_value(rewritten);
    Ok(true)
}
