//! `Reflect` implementations for standard library and chrono types
//!
//! Copyright (c) 2025 Fieldform Team
//! Licensed under the Apache-2.0 license

use super::{
    Kind, MapValue, Reflect, ReflectMut, ReflectRef, Scalar, Sequence, SetError, Value,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

macro_rules! reflect_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Reflect for $ty {
            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Scalar(self)
            }

            fn reflect_mut(&mut self) -> ReflectMut<'_> {
                ReflectMut::Scalar(self)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    )*};
}

macro_rules! signed_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Scalar for $ty {
            fn kind(&self) -> Kind {
                Kind::$kind
            }

            fn get(&self) -> Value {
                Value::Int(*self as i64)
            }

            fn set(&mut self, value: Value) -> Result<(), SetError> {
                let converted = match &value {
                    Value::Int(v) => <$ty>::try_from(*v).ok(),
                    Value::Uint(v) => <$ty>::try_from(*v).ok(),
                    _ => None,
                };
                *self = converted.ok_or_else(|| SetError::mismatch(Kind::$kind, value))?;
                Ok(())
            }
        }

        reflect_scalar!($ty);
    )*};
}

macro_rules! unsigned_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Scalar for $ty {
            fn kind(&self) -> Kind {
                Kind::$kind
            }

            fn get(&self) -> Value {
                Value::Uint(*self as u64)
            }

            fn set(&mut self, value: Value) -> Result<(), SetError> {
                let converted = match &value {
                    Value::Int(v) => <$ty>::try_from(*v).ok(),
                    Value::Uint(v) => <$ty>::try_from(*v).ok(),
                    _ => None,
                };
                *self = converted.ok_or_else(|| SetError::mismatch(Kind::$kind, value))?;
                Ok(())
            }
        }

        reflect_scalar!($ty);
    )*};
}

signed_scalar!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize);
unsigned_scalar!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize);

macro_rules! float_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Scalar for $ty {
            fn kind(&self) -> Kind {
                Kind::$kind
            }

            fn get(&self) -> Value {
                Value::Float(*self as f64)
            }

            fn set(&mut self, value: Value) -> Result<(), SetError> {
                match value.as_f64() {
                    Some(v) => {
                        *self = v as $ty;
                        Ok(())
                    }
                    None => Err(SetError::mismatch(Kind::$kind, value)),
                }
            }
        }

        reflect_scalar!($ty);
    )*};
}

float_scalar!(f32 => F32, f64 => F64);

impl Scalar for bool {
    fn kind(&self) -> Kind {
        Kind::Bool
    }

    fn get(&self) -> Value {
        Value::Bool(*self)
    }

    fn set(&mut self, value: Value) -> Result<(), SetError> {
        match value {
            Value::Bool(v) => {
                *self = v;
                Ok(())
            }
            other => Err(SetError::mismatch(Kind::Bool, other)),
        }
    }
}

impl Scalar for char {
    fn kind(&self) -> Kind {
        Kind::Char
    }

    fn get(&self) -> Value {
        Value::Char(*self)
    }

    fn set(&mut self, value: Value) -> Result<(), SetError> {
        let converted = match &value {
            Value::Char(c) => Some(*c),
            Value::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        };
        *self = converted.ok_or_else(|| SetError::mismatch(Kind::Char, value))?;
        Ok(())
    }
}

impl Scalar for String {
    fn kind(&self) -> Kind {
        Kind::String
    }

    fn get(&self) -> Value {
        Value::String(self.clone())
    }

    fn set(&mut self, value: Value) -> Result<(), SetError> {
        match value {
            Value::String(s) => {
                *self = s;
                Ok(())
            }
            other => Err(SetError::mismatch(Kind::String, other)),
        }
    }
}

impl Scalar for &'static str {
    fn kind(&self) -> Kind {
        Kind::String
    }

    fn get(&self) -> Value {
        Value::String((*self).to_string())
    }

    fn set(&mut self, value: Value) -> Result<(), SetError> {
        Err(SetError::read_only(Kind::String, value))
    }

    fn is_settable(&self) -> bool {
        false
    }
}

reflect_scalar!(bool, char, String, &'static str);

macro_rules! temporal_scalar {
    ($($ty:ty => |$v:ident| $render:expr, |$s:ident| $parse:expr;)*) => {$(
        impl Scalar for $ty {
            fn kind(&self) -> Kind {
                Kind::Time
            }

            fn get(&self) -> Value {
                let $v = self;
                Value::String($render)
            }

            fn set(&mut self, value: Value) -> Result<(), SetError> {
                let parsed = match &value {
                    Value::String($s) => $parse,
                    _ => None,
                };
                *self = parsed.ok_or_else(|| SetError::mismatch(Kind::Time, value))?;
                Ok(())
            }
        }

        reflect_scalar!($ty);
    )*};
}

temporal_scalar! {
    DateTime<Utc> => |v| v.to_rfc3339(),
        |s| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc));
    DateTime<FixedOffset> => |v| v.to_rfc3339(),
        |s| DateTime::parse_from_rfc3339(s).ok();
    NaiveDate => |v| v.to_string(),
        |s| s.parse::<NaiveDate>().ok();
    NaiveDateTime => |v| v.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        |s| s.parse::<NaiveDateTime>().ok();
    NaiveTime => |v| v.to_string(),
        |s| s.parse::<NaiveTime>().ok();
}

impl<T: Reflect> Reflect for Option<T> {
    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Optional(self.as_ref().map(|v| v as &dyn Reflect))
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Optional(self.as_mut().map(|v| v as &mut dyn Reflect))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Boxes are never empty, so a `Box<T>` is the `T` it owns.
impl<T: Reflect> Reflect for Box<T> {
    fn reflect_ref(&self) -> ReflectRef<'_> {
        (**self).reflect_ref()
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        (**self).reflect_mut()
    }

    fn as_any(&self) -> &dyn Any {
        (**self).as_any()
    }

    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }
}

impl Reflect for Box<dyn Reflect> {
    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Dynamic(&**self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Dynamic(&mut **self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: Reflect> Sequence for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_slice().get(index).map(|v| v as &dyn Reflect)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.as_mut_slice().get_mut(index).map(|v| v as &mut dyn Reflect)
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Sequence(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Sequence(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: Reflect, const N: usize> Sequence for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_slice().get(index).map(|v| v as &dyn Reflect)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.as_mut_slice().get_mut(index).map(|v| v as &mut dyn Reflect)
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Sequence(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Sequence(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type usable as a reflected map key
///
/// Floating-point keys have no `Eq`/`Hash` in Rust, so only integer, bool,
/// char and string keys are provided; a custom [`MapValue`] can still report
/// a float key kind and the resolver will parse float keys for it.
pub trait MapKey: Sized + Send + Sync + 'static {
    const KIND: Kind;

    fn from_value(value: &Value) -> Option<Self>;

    fn to_value(&self) -> Value;
}

macro_rules! integer_key {
    ($($ty:ty => $kind:ident, $variant:ident, $wide:ty);* $(;)?) => {$(
        impl MapKey for $ty {
            const KIND: Kind = Kind::$kind;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Int(v) => <$ty>::try_from(*v).ok(),
                    Value::Uint(v) => <$ty>::try_from(*v).ok(),
                    _ => None,
                }
            }

            fn to_value(&self) -> Value {
                Value::$variant(*self as $wide)
            }
        }
    )*};
}

integer_key! {
    i8 => I8, Int, i64;
    i16 => I16, Int, i64;
    i32 => I32, Int, i64;
    i64 => I64, Int, i64;
    isize => Isize, Int, i64;
    u8 => U8, Uint, u64;
    u16 => U16, Uint, u64;
    u32 => U32, Uint, u64;
    u64 => U64, Uint, u64;
    usize => Usize, Uint, u64;
}

impl MapKey for bool {
    const KIND: Kind = Kind::Bool;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl MapKey for char {
    const KIND: Kind = Kind::Char;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Char(*self)
    }
}

impl MapKey for String {
    const KIND: Kind = Kind::String;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl<K, V, S> MapValue for HashMap<K, V, S>
where
    K: MapKey + Eq + Hash,
    V: Reflect,
    S: BuildHasher + Send + Sync + 'static,
{
    fn key_kind(&self) -> Kind {
        K::KIND
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn keys(&self) -> Vec<Value> {
        let mut keys: Vec<Value> = HashMap::keys(self).map(MapKey::to_value).collect();
        keys.sort_by(Value::total_cmp);
        keys
    }

    fn get(&self, key: &Value) -> Option<&dyn Reflect> {
        let key = K::from_value(key)?;
        HashMap::get(self, &key).map(|v| v as &dyn Reflect)
    }

    fn get_mut(&mut self, key: &Value) -> Option<&mut dyn Reflect> {
        let key = K::from_value(key)?;
        HashMap::get_mut(self, &key).map(|v| v as &mut dyn Reflect)
    }
}

impl<K, V, S> Reflect for HashMap<K, V, S>
where
    K: MapKey + Eq + Hash,
    V: Reflect,
    S: BuildHasher + Send + Sync + 'static,
{
    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Map(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Map(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<K, V> MapValue for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Reflect,
{
    fn key_kind(&self) -> Kind {
        K::KIND
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn keys(&self) -> Vec<Value> {
        BTreeMap::keys(self).map(MapKey::to_value).collect()
    }

    fn get(&self, key: &Value) -> Option<&dyn Reflect> {
        let key = K::from_value(key)?;
        BTreeMap::get(self, &key).map(|v| v as &dyn Reflect)
    }

    fn get_mut(&mut self, key: &Value) -> Option<&mut dyn Reflect> {
        let key = K::from_value(key)?;
        BTreeMap::get_mut(self, &key).map(|v| v as &mut dyn Reflect)
    }
}

impl<K, V> Reflect for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Reflect,
{
    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Map(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Map(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
