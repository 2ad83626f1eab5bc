//! Lazily decoded input fields.

use std::any::Any;
use std::fmt;

use bytes::Bytes;

use crate::reflect::{Kind, Leaf, Reflect, ReflectMut, ReflectRef, take};
use crate::{March, Result};

/// The syntactic shape of an encoded fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Object,
    Array,
    Number,
    String,
    Bool,
    Null,
    Invalid,
}

impl Shape {
    /// Classifies `data` by its leading token without decoding it.
    pub fn classify(data: &[u8]) -> Shape {
        let data = data.trim_ascii();
        match data.first() {
            Some(b'{') => Shape::Object,
            Some(b'[') => Shape::Array,
            Some(b'"') => Shape::String,
            Some(b'-' | b'0'..=b'9') => Shape::Number,
            Some(b't') if data == b"true" => Shape::Bool,
            Some(b'f') if data == b"false" => Shape::Bool,
            Some(b'n') if data == b"null" => Shape::Null,
            _ => Shape::Invalid,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Object => "object",
            Shape::Array => "array",
            Shape::Number => "number",
            Shape::String => "string",
            Shape::Bool => "bool",
            Shape::Null => "null",
            Shape::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// One captured input field whose decoding is deferred.
///
/// A remainder keeps the configuration that was active when it was captured,
/// so it decodes later exactly as the capturing call would have. Decoding
/// never consumes the captured bytes.
///
/// ```
/// use march::{March, Remainder, Shape};
///
/// let raw = Remainder::new(&b"5"[..], March::default());
/// assert_eq!(raw.decode::<i64>().unwrap(), 5);
/// assert_eq!(raw.classify(), Shape::Number);
/// assert!(raw.decode::<String>().is_err());
/// ```
#[derive(Clone)]
pub struct Remainder {
    data: Bytes,
    march: March,
}

impl Remainder {
    pub fn new(data: impl Into<Bytes>, march: March) -> Self {
        Remainder {
            data: data.into(),
            march,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn march(&self) -> &March {
        &self.march
    }

    /// Decodes the captured bytes onto `target`.
    pub fn decode_to(&self, target: &mut dyn Reflect) -> Result<()> {
        self.march.unmarshal(&self.data, target)
    }

    pub fn decode<T: Reflect + Default>(&self) -> Result<T> {
        let mut value = T::default();
        self.decode_to(&mut value)?;
        Ok(value)
    }

    pub fn classify(&self) -> Shape {
        Shape::classify(&self.data)
    }

    /// Replaces the captured bytes with the encoding of `value`.
    pub fn encode_from(&mut self, value: &dyn Reflect) -> Result<()> {
        self.data = Bytes::from(self.march.marshal(value)?);
        Ok(())
    }
}

impl Default for Remainder {
    fn default() -> Self {
        Remainder::new(Bytes::from_static(b"null"), March::default())
    }
}

impl PartialEq for Remainder {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl fmt::Debug for Remainder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Remainder")
            .field(&String::from_utf8_lossy(&self.data))
            .finish()
    }
}

impl Leaf for Remainder {
    fn encode(&self, _march: &March) -> Result<Vec<u8>> {
        Ok(self.data.to_vec())
    }

    fn decode(&mut self, data: &[u8], march: &March) -> Result<()> {
        self.data = Bytes::copy_from_slice(data);
        self.march = march.clone();
        Ok(())
    }
}

impl Reflect for Remainder {
    fn kind(&self) -> Kind {
        Kind::Leaf
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Leaf(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Leaf(self)
    }

    fn fresh(&self) -> Box<dyn Reflect> {
        Box::new(Remainder::default())
    }

    fn set(&mut self, value: Box<dyn Reflect>) -> Result<()> {
        *self = take(value)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn remains_capable() -> bool {
        true
    }

    fn from_remainder(raw: &Bytes, march: &March) -> Result<Self> {
        Ok(Remainder::new(raw.clone(), march.clone()))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{Remainder, Shape};
    use crate::{ErrorKind, March};

    #[test]
    fn test_classify() {
        assert_eq!(Shape::classify(b"{\"a\":1}"), Shape::Object);
        assert_eq!(Shape::classify(b" [1]"), Shape::Array);
        assert_eq!(Shape::classify(b"-1.5"), Shape::Number);
        assert_eq!(Shape::classify(b"0"), Shape::Number);
        assert_eq!(Shape::classify(b"\"x\""), Shape::String);
        assert_eq!(Shape::classify(b"true"), Shape::Bool);
        assert_eq!(Shape::classify(b"false "), Shape::Bool);
        assert_eq!(Shape::classify(b"null"), Shape::Null);
        assert_eq!(Shape::classify(b"nul"), Shape::Invalid);
        assert_eq!(Shape::classify(b""), Shape::Invalid);
        assert_eq!(Shape::classify(b"<x/>"), Shape::Invalid);
    }

    #[test]
    fn test_decode_is_repeatable() {
        let raw = Remainder::new(Bytes::from_static(b"5"), March::default());
        assert_eq!(raw.decode::<i32>().unwrap(), 5);
        assert_eq!(raw.classify(), Shape::Number);
        assert_eq!(raw.decode::<u8>().unwrap(), 5);
        assert_eq!(raw.decode::<f64>().unwrap(), 5.0);
        assert_eq!(raw.bytes(), &Bytes::from_static(b"5"));
    }

    #[test]
    fn test_decode_type_mismatch() {
        let raw = Remainder::new(Bytes::from_static(b"2"), March::default());
        let err = raw.decode::<String>().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FieldCodec(_)));
    }

    #[test]
    fn test_encode_from() {
        let mut raw = Remainder::default();
        assert_eq!(raw.classify(), Shape::Null);
        raw.encode_from(&vec![1u8, 2]).unwrap();
        assert_eq!(raw.bytes(), &Bytes::from_static(b"[1,2]"));
        assert_eq!(raw.decode::<Vec<u8>>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_keeps_configuration() {
        let raw = Remainder::new(Bytes::from_static(b"1"), March::new("abc").strict(true));
        assert_eq!(raw.march().tag_key(), "abc");
        assert!(raw.clone().march().is_strict());
    }
}
