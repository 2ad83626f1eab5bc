use std::any::Any;
use std::fmt;

use bytes::Bytes;

use crate::codec::Fields;
use crate::dispatch::Custom;
use crate::{Error, March, Result};

/// The shape of a reflected value, as seen by the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Named fields carrying tags.
    Record,
    /// A growable list of elements.
    Sequence,
    /// A fixed-size list of elements. Encodes like a sequence, never decodes.
    Array,
    /// A string-keyed container.
    Mapping,
    /// An optional or boxed indirection to another value.
    Pointer,
    /// Anything encoded directly by the bytes-codec.
    Leaf,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Record => "record",
            Kind::Sequence => "sequence",
            Kind::Array => "array",
            Kind::Mapping => "mapping",
            Kind::Pointer => "pointer",
            Kind::Leaf => "leaf",
        };
        f.write_str(name)
    }
}

/// An immutable view of a value through its capability.
pub enum ReflectRef<'a> {
    Record(&'a dyn Record),
    Sequence(&'a dyn Sequence),
    Array(&'a dyn Sequence),
    Mapping(&'a dyn Mapping),
    Pointer(&'a dyn Pointer),
    Leaf(&'a dyn Leaf),
}

/// A mutable view of a value through its capability.
pub enum ReflectMut<'a> {
    Record(&'a mut dyn Record),
    Sequence(&'a mut dyn Sequence),
    Array(&'a mut dyn Sequence),
    Mapping(&'a mut dyn Mapping),
    Pointer(&'a mut dyn Pointer),
    Leaf(&'a mut dyn Leaf),
}

/// Core trait for values the engines can walk.
///
/// Use `#[derive(March)]` for structs; the crate implements it for
/// primitives, strings, `Vec`, arrays, `Option`, `Box`, string-keyed maps,
/// [`Bytes`], [`serde_json::Value`] and [`crate::Remainder`].
pub trait Reflect: Any {
    fn kind(&self) -> Kind;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn reflect_ref(&self) -> ReflectRef<'_>;

    fn reflect_mut(&mut self) -> ReflectMut<'_>;

    /// A zero value of the same concrete type.
    fn fresh(&self) -> Box<dyn Reflect>;

    /// Replaces `self` with `value`, which must have the same concrete type.
    fn set(&mut self, value: Box<dyn Reflect>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// The type's override capability, if it opted into one.
    fn custom(&self) -> Option<&dyn Custom> {
        None
    }

    fn custom_mut(&mut self) -> Option<&mut dyn Custom> {
        None
    }

    /// Receives the input fields no other field claimed.
    fn accept_remains(&mut self, remains: &Fields, march: &March) -> Result<()> {
        let _ = (remains, march);
        Err(Error::unsupported(format!(
            "cannot assign remaining fields onto {}",
            self.type_name()
        )))
    }

    /// Whether this type can be the value type of a remains container.
    fn remains_capable() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Builds a remains container value from one captured input field.
    fn from_remainder(raw: &Bytes, march: &March) -> Result<Self>
    where
        Self: Sized,
    {
        let _ = (raw, march);
        Err(Error::unsupported(format!(
            "{} cannot hold remaining fields",
            std::any::type_name::<Self>()
        )))
    }
}

/// Static metadata of one struct field: its identifier and its raw tag
/// value per tag key.
#[derive(Debug)]
pub struct FieldInfo {
    ident: &'static str,
    tags: &'static [(&'static str, &'static str)],
}

impl FieldInfo {
    pub const fn new(ident: &'static str, tags: &'static [(&'static str, &'static str)]) -> Self {
        FieldInfo { ident, tags }
    }

    pub fn ident(&self) -> &'static str {
        self.ident
    }

    /// The raw tag value under `key`, or `None` when the field has no such key.
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| *value)
    }
}

/// Values with named, tagged fields.
pub trait Record {
    fn field_len(&self) -> usize;

    fn field_info(&self, index: usize) -> Option<&'static FieldInfo>;

    fn field(&self, index: usize) -> Option<&dyn Reflect>;

    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;
}

/// Indexable lists of elements.
pub trait Sequence {
    fn len(&self) -> usize;

    fn element(&self, index: usize) -> Option<&dyn Reflect>;

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;

    fn fresh_element(&self) -> Box<dyn Reflect>;

    fn push(&mut self, value: Box<dyn Reflect>) -> Result<()>;

    fn clear(&mut self);
}

/// Containers whose entries are addressed by a string name.
pub trait Mapping {
    fn entry_count(&self) -> usize;

    /// Named entries in deterministic key order, see [`crate::compare_keys`].
    fn entries(&self) -> Vec<(String, &dyn Reflect)>;

    /// The same entries as [`Mapping::entries`], in the same order.
    fn entries_mut(&mut self) -> Vec<(String, &mut dyn Reflect)>;

    fn fresh_value(&self) -> Box<dyn Reflect>;

    fn insert_entry(&mut self, name: &str, value: Box<dyn Reflect>) -> Result<()>;
}

/// Optional or boxed indirections.
pub trait Pointer {
    fn pointee(&self) -> Option<&dyn Reflect>;

    fn pointee_mut(&mut self) -> Option<&mut dyn Reflect>;

    fn fresh_pointee(&self) -> Box<dyn Reflect>;

    fn set_pointee(&mut self, value: Box<dyn Reflect>) -> Result<()>;

    /// Makes the pointer absent. Returns false when it cannot be absent.
    fn clear(&mut self) -> bool;
}

/// Values encoded and decoded directly by the bytes-codec.
pub trait Leaf {
    fn encode(&self, march: &March) -> Result<Vec<u8>>;

    fn decode(&mut self, data: &[u8], march: &March) -> Result<()>;
}

/// Unboxes a reflected value into its concrete type.
pub fn take<T: Reflect>(value: Box<dyn Reflect>) -> Result<T> {
    let found = (*value).type_name();
    value
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| {
            Error::access(format!(
                "cannot assign a {found} to a {}",
                std::any::type_name::<T>()
            ))
        })
}
