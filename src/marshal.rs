use bytes::Bytes;
use tracing::debug;

use crate::codec::Fields;
use crate::dispatch::{self, Override};
use crate::fields::FieldList;
use crate::reflect::{Reflect, ReflectRef};
use crate::tag::FLAG_HOIST;
use crate::{Error, March, Result};

impl March {
    /// Encodes `value`, preferring a type-level override over the default
    /// behaviour.
    pub fn marshal(&self, value: &dyn Reflect) -> Result<Vec<u8>> {
        self.validate()?;
        if self.is_debug() {
            debug!(target: "march", type_name = value.type_name(), "marshal");
        }

        if let Override::Present(result) = dispatch::try_marshal(self, value) {
            if self.is_debug() {
                debug!(target: "march", ok = result.is_ok(), "marshal override");
            }
            return result;
        }
        self.marshal_default(value)
    }

    /// Encodes `value` with the configured default marshaler, or the
    /// field-walking engine when none is set.
    pub fn marshal_default(&self, value: &dyn Reflect) -> Result<Vec<u8>> {
        match self.default_marshaler() {
            Some(marshaler) => marshaler(self, value),
            None => self.marshal_walk(value),
        }
    }

    /// The field-walking encoder, without the type-level override check.
    pub fn marshal_walk(&self, value: &dyn Reflect) -> Result<Vec<u8>> {
        match value.reflect_ref() {
            ReflectRef::Pointer(pointer) => match pointer.pointee() {
                Some(pointee) => self.marshal(pointee),
                None => Ok(self.codec().null().to_vec()),
            },
            ReflectRef::Sequence(sequence) | ReflectRef::Array(sequence) => {
                let mut elements = Vec::with_capacity(sequence.len());
                for index in 0..sequence.len() {
                    let element = sequence.element(index).ok_or_else(|| {
                        Error::access(format!("element {index} of {}", value.type_name()))
                    })?;
                    elements.push(
                        self.marshal(element)
                            .map_err(|err| err.in_field(index.to_string()))?,
                    );
                }
                self.codec().write_elements(&elements)
            }
            ReflectRef::Record(_) | ReflectRef::Mapping(_) => self.marshal_fields(value),
            ReflectRef::Leaf(leaf) => leaf.encode(self),
        }
    }

    fn marshal_fields(&self, value: &dyn Reflect) -> Result<Vec<u8>> {
        let mut output = Fields::new();
        let mut values = FieldList::new(value, self.tag_key());

        let mut index = 0;
        while index < values.total_fields() {
            let field = values.field_at(index).ok_or_else(|| {
                Error::access(format!(
                    "field {index} of {} is out of bounds",
                    values.total_fields()
                ))
            })?;
            index += 1;

            let descriptor = &field.descriptor;
            if !descriptor.is_visible() {
                continue;
            }
            if descriptor.has_flag(FLAG_HOIST) {
                if self.is_debug() {
                    debug!(target: "march", field = descriptor.name(), type_name = descriptor.type_name, "hoist");
                }
                values.push_root(field.value, field.path);
                continue;
            }

            let name = descriptor.name();
            if output.contains_key(name) {
                if self.is_debug() {
                    debug!(target: "march", field = name, "duplicate name, keeping the first");
                }
                continue;
            }
            match self.marshal(field.value) {
                Ok(data) => {
                    output.insert(name.to_string(), Bytes::from(data));
                }
                Err(err) => self.field_failed(name, err)?,
            }
        }

        match dispatch::try_write_fields(self, value, &output) {
            Override::Present(result) => result,
            Override::Absent => self.codec().write_fields(&output),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use bytes::Bytes;

    use crate::{ErrorKind, March, Reflect};

    #[test]
    fn test_leaves_and_sequences() {
        let march = March::default();
        assert_eq!(march.marshal(&5u8).unwrap(), b"5");
        assert_eq!(march.marshal(&vec![1u8, 2, 3]).unwrap(), b"[1,2,3]");
        assert_eq!(march.marshal(&[true, false]).unwrap(), b"[true,false]");
        assert_eq!(march.marshal(&Vec::<u8>::new()).unwrap(), b"[]");
        assert_eq!(
            march.marshal(&vec![vec!["a".to_string()], vec![]]).unwrap(),
            br#"[["a"],[]]"#
        );
    }

    #[test]
    fn test_pointers() {
        let march = March::default();
        let absent: Option<u8> = None;
        assert_eq!(march.marshal(&absent).unwrap(), b"null");
        assert_eq!(march.marshal(&Some(Some(Box::new(3u8)))).unwrap(), b"3");
    }

    #[test]
    fn test_mappings_are_sorted() {
        let march = March::default();
        let mut map = HashMap::new();
        map.insert("b".to_string(), 2u8);
        map.insert("a".to_string(), 1u8);
        map.insert("".to_string(), 0u8);
        assert_eq!(march.marshal(&map).unwrap(), br#"{"":0,"a":1,"b":2}"#);

        let mut raw = BTreeMap::new();
        raw.insert("x".to_string(), Bytes::from_static(b"{\"y\":[1]}"));
        assert_eq!(march.marshal(&raw).unwrap(), br#"{"x":{"y":[1]}}"#);
    }

    #[test]
    fn test_non_utf8_byte_keys() {
        let march = March::default();
        let mut map: HashMap<Vec<u8>, u8> = HashMap::new();
        map.insert(vec![0xff], 1);
        map.insert(b"a".to_vec(), 2);
        assert_eq!(
            march.marshal(&map).unwrap(),
            "{\"a\":2,\"\u{fffd}\":1}".as_bytes()
        );

        let mut raw: BTreeMap<Bytes, u8> = BTreeMap::new();
        raw.insert(Bytes::from_static(&[0xc3]), 3);
        assert_eq!(march.marshal(&raw).unwrap(), "{\"\u{fffd}\":3}".as_bytes());
    }

    #[test]
    fn test_malformed_configuration() {
        let err = March::new("").marshal(&1u8).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedConfiguration(_)));
    }

    #[test]
    fn test_default_marshaler_hook() {
        let march = March::default().with_default_marshaler(|march, value: &dyn Reflect| {
            let mut data = b"<".to_vec();
            data.extend(march.marshal_walk(value)?);
            data.push(b'>');
            Ok(data)
        });
        assert_eq!(march.marshal(&7u8).unwrap(), b"<7>");
        assert_eq!(march.marshal(&vec![1u8]).unwrap(), b"<[<1>]>");
    }
}
