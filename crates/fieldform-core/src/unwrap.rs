//! Type unwrapper
//!
//! Strips nullable (`Option`) and dynamic (`Box<dyn Reflect>`) layers one at
//! a time until a concrete scalar, record, sequence or map is reached.
//! Each iteration consumes exactly one layer of the input, so the loop ends
//! after at most as many steps as the value has layers.

use crate::value::{Kind, Reflect, ReflectMut, ReflectRef};

/// Result of unwrapping a read-only handle
#[derive(Clone, Copy)]
pub struct Extracted<'a> {
    /// The concrete value, or the empty nullable layer; `None` for `Invalid`
    pub value: Option<&'a dyn Reflect>,
    pub kind: Kind,
    /// Whether any stripped layer was nullable or dynamic
    pub nullable: bool,
}

impl<'a> Extracted<'a> {
    fn invalid(nullable: bool) -> Self {
        Self {
            value: None,
            kind: Kind::Invalid,
            nullable,
        }
    }

    /// True when unwrapping stopped at a nullable layer holding nothing
    pub fn is_empty_nullable(&self) -> bool {
        self.kind == Kind::Optional
    }
}

/// Result of unwrapping a mutable handle
pub struct ExtractedMut<'a> {
    pub value: Option<&'a mut dyn Reflect>,
    pub kind: Kind,
    pub nullable: bool,
}

/// Unwrap a possibly absent handle down to its concrete value
pub fn extract(handle: Option<&dyn Reflect>) -> Extracted<'_> {
    let mut nullable = false;
    let mut current = match handle {
        Some(handle) => handle,
        None => return Extracted::invalid(nullable),
    };

    loop {
        match current.reflect_ref() {
            ReflectRef::Optional(inner) => {
                nullable = true;
                match inner {
                    Some(inner) => current = inner,
                    None => {
                        return Extracted {
                            value: Some(current),
                            kind: Kind::Optional,
                            nullable,
                        }
                    }
                }
            }
            ReflectRef::Dynamic(inner) => {
                nullable = true;
                current = inner;
            }
            other => {
                return Extracted {
                    value: Some(current),
                    kind: other.kind(),
                    nullable,
                }
            }
        }
    }
}

enum Layer {
    Descend,
    EmptyNullable,
    Concrete(Kind),
}

/// Mutable counterpart of [`extract`]
pub fn extract_mut(handle: Option<&mut dyn Reflect>) -> ExtractedMut<'_> {
    let mut nullable = false;
    let mut current = match handle {
        Some(handle) => handle,
        None => {
            return ExtractedMut {
                value: None,
                kind: Kind::Invalid,
                nullable,
            }
        }
    };

    loop {
        // Peek through a shared borrow first so the terminal arms can hand
        // back `current` itself.
        let layer = match current.reflect_ref() {
            ReflectRef::Optional(Some(_)) | ReflectRef::Dynamic(_) => Layer::Descend,
            ReflectRef::Optional(None) => Layer::EmptyNullable,
            other => Layer::Concrete(other.kind()),
        };

        match layer {
            Layer::Concrete(kind) => {
                return ExtractedMut {
                    value: Some(current),
                    kind,
                    nullable,
                }
            }
            Layer::EmptyNullable => {
                return ExtractedMut {
                    value: Some(current),
                    kind: Kind::Optional,
                    nullable: true,
                }
            }
            Layer::Descend => {
                nullable = true;
                current = match current.reflect_mut() {
                    ReflectMut::Optional(Some(inner)) | ReflectMut::Dynamic(inner) => inner,
                    _ => {
                        return ExtractedMut {
                            value: None,
                            kind: Kind::Invalid,
                            nullable,
                        }
                    }
                };
            }
        }
    }
}
