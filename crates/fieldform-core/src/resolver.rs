//! Namespace resolver
//!
//! Resolves a path such as `"a.b[2].c"` or `"labels[env]"` against a live
//! record graph. Records are entered by exact field name, sequences by
//! bracketed index and maps by a bracketed key converted to the map's key
//! kind. The walk is an explicit loop; every hop unwraps nullable and
//! dynamic layers first.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use crate::namespace::{unescape_key, KEY_ESCAPE, LEFT_BRACKET, NAMESPACE_SEPARATOR, RIGHT_BRACKET};
use crate::unwrap::{extract, Extracted};
use crate::value::{Kind, Reflect, ReflectRef, Value};

/// Outcome of resolving a path
#[derive(Clone, Copy, Debug)]
pub struct Resolved<'a> {
    /// The value reached (unwrapped), or the empty nullable layer that stopped the walk
    pub value: Option<&'a dyn Reflect>,
    pub kind: Kind,
    pub nullable: bool,
    pub found: bool,
}

impl<'a> Resolved<'a> {
    fn found(ex: Extracted<'a>) -> Self {
        Self {
            value: ex.value,
            kind: ex.kind,
            nullable: ex.nullable,
            found: true,
        }
    }

    fn not_found(ex: Extracted<'a>) -> Self {
        Self {
            value: ex.value,
            kind: ex.kind,
            nullable: ex.nullable,
            found: false,
        }
    }

    /// Scalar snapshot of the resolved value, when found and scalar
    pub fn scalar(&self) -> Option<Value> {
        if !self.found {
            return None;
        }
        match self.value?.reflect_ref() {
            ReflectRef::Scalar(s) => Some(s.get()),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Reflect>(&self) -> Option<&'a T> {
        if !self.found {
            return None;
        }
        self.value?.downcast_ref::<T>()
    }
}

/// Resolve `path` starting at `root`
///
/// Returns `found == false` when a field, index or key along the path does
/// not exist, an index is out of bounds, or an empty nullable layer is met
/// before the path is consumed. A path that asks to descend into something
/// that has no children (a scalar, or a sequence addressed by name) is a
/// structural error.
pub fn resolve<'a>(root: &'a dyn Reflect, path: &str) -> Result<Resolved<'a>> {
    let mut handle = Some(root);
    let mut remaining = path;

    loop {
        let ex = extract(handle);
        if ex.kind == Kind::Invalid {
            return Ok(Resolved::not_found(ex));
        }
        if remaining.is_empty() {
            return Ok(Resolved::found(ex));
        }

        let current = match ex.value {
            Some(value) => value,
            None => return Ok(Resolved::not_found(ex)),
        };

        match current.reflect_ref() {
            ReflectRef::Optional(_) | ReflectRef::Dynamic(_) => {
                return Ok(Resolved::not_found(ex));
            }
            ReflectRef::Scalar(scalar) if scalar.kind() == Kind::Time => {
                return Ok(Resolved::not_found(ex));
            }
            ReflectRef::Record(record) => {
                let (field, rest) = split_field(remaining);
                handle = record.field_by_name(field);
                remaining = rest;
            }
            ReflectRef::Sequence(seq) => {
                let (segment, rest) = bracketed(path, remaining, ex.kind)?;
                remaining = rest;
                match segment.parse::<usize>() {
                    Ok(index) if index < seq.len() => handle = seq.get(index),
                    _ => return Ok(Resolved::not_found(ex)),
                }
            }
            ReflectRef::Map(map) => {
                let (segment, rest) = bracketed(path, remaining, ex.kind)?;
                remaining = rest;
                match parse_key(&unescape_key(segment), map.key_kind()) {
                    Some(key) => handle = map.get(&key),
                    None => return Ok(Resolved::not_found(ex)),
                }
            }
            ReflectRef::Scalar(_) => {
                return Err(invalid_namespace(path, remaining, ex.kind));
            }
        }
    }
}

/// Split the leading record field name off a path
fn split_field(path: &str) -> (&str, &str) {
    match path.find([NAMESPACE_SEPARATOR, LEFT_BRACKET]) {
        Some(idx) if path[idx..].starts_with(NAMESPACE_SEPARATOR) => (&path[..idx], &path[idx + 1..]),
        Some(idx) => (&path[..idx], &path[idx..]),
        None => (path, ""),
    }
}

/// Take a leading `[segment]`, skipping one separator after the bracket
///
/// The segment is returned still escaped; see [`unescape_key`].
fn bracketed<'p>(path: &str, remaining: &'p str, kind: Kind) -> Result<(&'p str, &'p str)> {
    let inner = remaining
        .strip_prefix(LEFT_BRACKET)
        .ok_or_else(|| invalid_namespace(path, remaining, kind))?;
    let close = closing_bracket(inner).ok_or_else(|| invalid_namespace(path, remaining, kind))?;

    let segment = &inner[..close];
    let rest = &inner[close + 1..];
    let rest = rest.strip_prefix(NAMESPACE_SEPARATOR).unwrap_or(rest);
    Ok((segment, rest))
}

/// Byte offset of the first `]` not preceded by an escape
fn closing_bracket(segment: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in segment.char_indices() {
        match c {
            _ if escaped => escaped = false,
            KEY_ESCAPE => escaped = true,
            RIGHT_BRACKET => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Convert a bracketed map key to a value of the map's key kind
pub fn parse_key(raw: &str, kind: Kind) -> Option<Value> {
    let value = match kind {
        Kind::I8 => Value::Int(raw.parse::<i8>().ok()? as i64),
        Kind::I16 => Value::Int(raw.parse::<i16>().ok()? as i64),
        Kind::I32 => Value::Int(raw.parse::<i32>().ok()? as i64),
        Kind::I64 | Kind::Isize => Value::Int(raw.parse::<i64>().ok()?),
        Kind::U8 => Value::Uint(raw.parse::<u8>().ok()? as u64),
        Kind::U16 => Value::Uint(raw.parse::<u16>().ok()? as u64),
        Kind::U32 => Value::Uint(raw.parse::<u32>().ok()? as u64),
        Kind::U64 | Kind::Usize => Value::Uint(raw.parse::<u64>().ok()?),
        Kind::F32 => Value::Float(raw.parse::<f32>().ok()? as f64),
        Kind::F64 => Value::Float(raw.parse::<f64>().ok()?),
        Kind::Bool => Value::Bool(parse_bool(raw)?),
        Kind::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return None,
            }
        }
        _ => Value::String(raw.to_string()),
    };
    Some(value)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn invalid_namespace(path: &str, remaining: &str, kind: Kind) -> Error {
    Error::InvalidNamespace {
        namespace: path.to_string(),
        remaining: remaining.to_string(),
        kind,
    }
}
