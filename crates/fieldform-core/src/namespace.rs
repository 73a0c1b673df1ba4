//! Namespace buffers and structural cursors
//!
//! While the engine walks a record graph it keeps two views of its position.
//! The [`Namespace`] holds the human-readable paths (display names and
//! structural names, grown and truncated in lockstep), and a cursor of
//! [`Step`]s holds the same position in a form that can be followed back
//! from the root without re-parsing strings.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use crate::unwrap::{extract, extract_mut};
use crate::value::{Reflect, ReflectMut, ReflectRef, Value};
use std::borrow::Cow;
use std::fmt::Write as _;

/// Separator between record field segments
pub const NAMESPACE_SEPARATOR: char = '.';
pub const LEFT_BRACKET: char = '[';
pub const RIGHT_BRACKET: char = ']';

/// Escapes a closing bracket (or itself) inside a bracketed map key
pub const KEY_ESCAPE: char = '\\';

/// Paired display/structural namespace buffers
///
/// Both buffers always describe the same position; they differ only in
/// whether a field segment uses its alias or its structural name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    display: String,
    structural: String,
}

/// Saved buffer lengths, used to pop back to an earlier position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    display: usize,
    structural: usize,
}

impl Namespace {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            display: String::with_capacity(capacity),
            structural: String::with_capacity(capacity),
        }
    }

    pub fn mark(&self) -> Mark {
        Mark {
            display: self.display.len(),
            structural: self.structural.len(),
        }
    }

    /// Truncate both buffers back to `mark`
    pub fn reset_to(&mut self, mark: Mark) {
        self.display.truncate(mark.display);
        self.structural.truncate(mark.structural);
    }

    pub fn clear(&mut self) {
        self.display.clear();
        self.structural.clear();
    }

    pub fn push_field(&mut self, display: &str, structural: &str) {
        if !self.display.is_empty() {
            self.display.push(NAMESPACE_SEPARATOR);
        }
        if !self.structural.is_empty() {
            self.structural.push(NAMESPACE_SEPARATOR);
        }
        self.display.push_str(display);
        self.structural.push_str(structural);
    }

    pub fn push_index(&mut self, index: usize) {
        // Writing into a String cannot fail.
        let _ = write!(self.display, "[{}]", index);
        let _ = write!(self.structural, "[{}]", index);
    }

    pub fn push_key(&mut self, key: &Value) {
        let segment = key_segment(key);
        self.display.push_str(&segment);
        self.structural.push_str(&segment);
    }

    /// Path with display names taking precedence
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Path of structural field names
    pub fn structural(&self) -> &str {
        &self.structural
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty() && self.structural.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.display.capacity().min(self.structural.capacity())
    }
}

/// Render a map key as a bracketed namespace segment
pub fn key_segment(key: &Value) -> String {
    let rendered = key.to_string();
    format!("{}{}{}", LEFT_BRACKET, escape_key(&rendered), RIGHT_BRACKET)
}

/// Escape `]` and the escape character so a key survives inside brackets
pub fn escape_key(raw: &str) -> Cow<'_, str> {
    if !raw.contains([KEY_ESCAPE, RIGHT_BRACKET]) {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        if c == KEY_ESCAPE || c == RIGHT_BRACKET {
            escaped.push(KEY_ESCAPE);
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Inverse of [`escape_key`]; a trailing lone escape is kept as-is
pub fn unescape_key(raw: &str) -> Cow<'_, str> {
    if !raw.contains(KEY_ESCAPE) {
        return Cow::Borrowed(raw);
    }
    let mut unescaped = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == KEY_ESCAPE {
            unescaped.push(chars.next().unwrap_or(KEY_ESCAPE));
        } else {
            unescaped.push(c);
        }
    }
    Cow::Owned(unescaped)
}

/// One hop from a container to a child
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Field(usize),
    Index(usize),
    Key(Value),
}

/// Follow `steps` from `root`, unwrapping nullable and dynamic layers at each hop
pub fn locate<'a>(root: &'a dyn Reflect, steps: &[Step]) -> Option<&'a dyn Reflect> {
    let mut current = root;
    for step in steps {
        let concrete = extract(Some(current)).value?;
        current = match (concrete.reflect_ref(), step) {
            (ReflectRef::Record(record), Step::Field(index)) => record.field(*index)?,
            (ReflectRef::Sequence(seq), Step::Index(index)) => seq.get(*index)?,
            (ReflectRef::Map(map), Step::Key(key)) => map.get(key)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable counterpart of [`locate`]
pub fn locate_mut<'a>(root: &'a mut dyn Reflect, steps: &[Step]) -> Option<&'a mut dyn Reflect> {
    let mut current = root;
    for step in steps {
        let concrete = extract_mut(Some(current)).value?;
        current = match (concrete.reflect_mut(), step) {
            (ReflectMut::Record(record), Step::Field(index)) => record.field_mut(*index)?,
            (ReflectMut::Sequence(seq), Step::Index(index)) => seq.get_mut(*index)?,
            (ReflectMut::Map(map), Step::Key(key)) => map.get_mut(key)?,
            _ => return None,
        };
    }
    Some(current)
}
