//! Reflective value model
//!
//! Records, sequences, maps and scalars are reached through the [`Reflect`]
//! trait, which hands out a capability view of one layer at a time. The
//! engine never needs to know a field's concrete Rust type: it inspects the
//! layer's kind, unwraps nullable and dynamic layers, and reads or writes
//! scalars through owned [`Value`] snapshots.
//!
//! Implementations ship for the standard scalar types, `Option`, `Box`,
//! `Box<dyn Reflect>`, `Vec`, arrays, `HashMap`/`BTreeMap` and the chrono
//! date/time types. Records get theirs from `#[derive(Record)]`.
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

mod impls;
mod kind;

pub use impls::MapKey;
pub use kind::{Kind, Value};

use std::any::Any;
use thiserror::Error;

/// A type whose values the engine can inspect and, where settable, mutate
pub trait Reflect: Any + Send + Sync {
    /// Read-only capability view of this layer
    fn reflect_ref(&self) -> ReflectRef<'_>;

    /// Mutable capability view of this layer
    fn reflect_mut(&mut self) -> ReflectMut<'_>;

    /// Upcast for downcasting to a concrete type
    fn as_any(&self) -> &dyn Any;

    /// Kind of this layer (not of the value behind it)
    fn kind(&self) -> Kind {
        self.reflect_ref().kind()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl dyn Reflect {
    /// Downcast to a concrete type
    pub fn downcast_ref<T: Reflect>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for dyn Reflect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reflect_ref() {
            ReflectRef::Scalar(s) => write!(f, "{:?}", s.get()),
            other => write!(f, "<{} {}>", other.kind(), self.type_name()),
        }
    }
}

/// Read-only capability view of one layer
pub enum ReflectRef<'a> {
    Scalar(&'a dyn Scalar),
    /// Nullable layer; `None` when it holds no value
    Optional(Option<&'a dyn Reflect>),
    Dynamic(&'a dyn Reflect),
    Record(&'a dyn Record),
    Sequence(&'a dyn Sequence),
    Map(&'a dyn MapValue),
}

impl ReflectRef<'_> {
    pub fn kind(&self) -> Kind {
        match self {
            ReflectRef::Scalar(s) => s.kind(),
            ReflectRef::Optional(_) => Kind::Optional,
            ReflectRef::Dynamic(_) => Kind::Dynamic,
            ReflectRef::Record(_) => Kind::Record,
            ReflectRef::Sequence(_) => Kind::Sequence,
            ReflectRef::Map(_) => Kind::Map,
        }
    }
}

/// Mutable capability view of one layer
pub enum ReflectMut<'a> {
    Scalar(&'a mut dyn Scalar),
    Optional(Option<&'a mut dyn Reflect>),
    Dynamic(&'a mut dyn Reflect),
    Record(&'a mut dyn Record),
    Sequence(&'a mut dyn Sequence),
    Map(&'a mut dyn MapValue),
}

/// A terminal value that can be read as, and written from, a [`Value`]
pub trait Scalar {
    fn kind(&self) -> Kind;

    fn get(&self) -> Value;

    /// Store `value`, converting where lossless. Fails on kind mismatch,
    /// out-of-range integers, unparseable temporal strings and read-only
    /// storage.
    fn set(&mut self, value: Value) -> Result<(), SetError>;

    fn is_settable(&self) -> bool {
        true
    }
}

/// Rejected scalar write
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot store {value:?} into {expected} storage: {reason}")]
pub struct SetError {
    pub expected: Kind,
    pub value: Value,
    pub reason: &'static str,
}

impl SetError {
    pub fn mismatch(expected: Kind, value: Value) -> Self {
        Self {
            expected,
            value,
            reason: "kind mismatch or out of range",
        }
    }

    pub fn read_only(expected: Kind, value: Value) -> Self {
        Self {
            expected,
            value,
            reason: "storage is read-only",
        }
    }
}

/// Static metadata for one declared record field
///
/// `#[derive(Record)]` emits one of these per field, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Display name from a serialization hint (`#[serde(rename)]`) or `#[transform(rename)]`
    pub alias: Option<&'static str>,
    /// Raw directive tag from `#[transform("...")]`
    pub tag: Option<&'static str>,
    /// Marked omitted by a serialization hint (`#[serde(skip)]`)
    pub omit: bool,
    /// Declared `#[transform(readonly)]`
    pub readonly: bool,
}

impl FieldInfo {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            alias: None,
            tag: None,
            omit: false,
            readonly: false,
        }
    }

    pub const fn tag(mut self, tag: &'static str) -> Self {
        self.tag = Some(tag);
        self
    }

    pub const fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    pub const fn omit(mut self) -> Self {
        self.omit = true;
        self
    }

    pub const fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Alias when declared, structural name otherwise
    pub fn display_name(&self) -> &'static str {
        self.alias.unwrap_or(self.name)
    }
}

/// A record with statically declared fields
pub trait Record {
    fn record_name(&self) -> &'static str;

    /// Declared fields, in declaration order
    fn field_infos(&self) -> &'static [FieldInfo];

    fn field(&self, index: usize) -> Option<&dyn Reflect>;

    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;

    /// Exact, case-sensitive lookup of a structural field name
    fn field_index(&self, name: &str) -> Option<usize> {
        self.field_infos().iter().position(|info| info.name == name)
    }

    fn field_by_name(&self, name: &str) -> Option<&dyn Reflect> {
        self.field_index(name).and_then(|index| self.field(index))
    }
}

/// An indexable sequence
pub trait Sequence {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Option<&dyn Reflect>;

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A key-value map with a statically known key kind
pub trait MapValue {
    fn key_kind(&self) -> Kind;

    fn len(&self) -> usize;

    /// All keys, in ascending order
    fn keys(&self) -> Vec<Value>;

    fn get(&self, key: &Value) -> Option<&dyn Reflect>;

    fn get_mut(&mut self, key: &Value) -> Option<&mut dyn Reflect>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
