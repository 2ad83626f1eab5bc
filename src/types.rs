use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use bytes::Bytes;
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::Fields;
use crate::fields::{MapKey, sorted_entries};
use crate::reflect::{
    Kind, Leaf, Mapping, Pointer, Reflect, ReflectMut, ReflectRef, Sequence, take,
};
use crate::{Error, ErrorKind, March, Result};

macro_rules! reflect_any {
    () => {
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
    };
}

macro_rules! impl_reflect_leaf {
    ($($ty:ty),* $(,)?) => {$(
        impl Reflect for $ty {
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
                Box::new(<$ty>::default())
            }

            reflect_any!();
        }
    )*};
}

fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

// A null input leaves the value untouched.
fn decode_json<T: DeserializeOwned>(value: &mut T, data: &[u8], march: &March) -> Result<()> {
    if march.codec().is_null(data) {
        return Ok(());
    }
    *value = serde_json::from_slice(data)?;
    Ok(())
}

macro_rules! impl_json_leaf {
    ($($ty:ty),* $(,)?) => {$(
        impl Leaf for $ty {
            fn encode(&self, _march: &March) -> Result<Vec<u8>> {
                encode_json(self)
            }

            fn decode(&mut self, data: &[u8], march: &March) -> Result<()> {
                decode_json(self, data, march)
            }
        }

        impl_reflect_leaf!($ty);
    )*};
}

impl_json_leaf!(
    bool, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, char, (),
    String,
);

#[cfg(feature = "chrono")]
impl_json_leaf!(chrono::DateTime<chrono::Utc>);

impl Leaf for &'static str {
    fn encode(&self, _march: &March) -> Result<Vec<u8>> {
        encode_json(self)
    }

    fn decode(&mut self, _data: &[u8], _march: &March) -> Result<()> {
        Err(Error::new(ErrorKind::InvalidTarget(
            "a borrowed &str cannot be decoded into".to_string(),
        )))
    }
}

impl_reflect_leaf!(&'static str);

/// Parsed structure; usable as the value type of a remains container.
impl Leaf for serde_json::Value {
    fn encode(&self, _march: &March) -> Result<Vec<u8>> {
        encode_json(self)
    }

    fn decode(&mut self, data: &[u8], _march: &March) -> Result<()> {
        *self = serde_json::from_slice(data)?;
        Ok(())
    }
}

impl Reflect for serde_json::Value {
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
        Box::new(serde_json::Value::Null)
    }

    reflect_any!();

    fn remains_capable() -> bool {
        true
    }

    fn from_remainder(raw: &Bytes, _march: &March) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Raw encoded bytes, passed through untouched in both directions.
impl Leaf for Bytes {
    fn encode(&self, march: &March) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Ok(march.codec().null().to_vec());
        }
        Ok(self.to_vec())
    }

    fn decode(&mut self, data: &[u8], _march: &March) -> Result<()> {
        *self = Bytes::copy_from_slice(data);
        Ok(())
    }
}

impl Reflect for Bytes {
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
        Box::new(Bytes::new())
    }

    reflect_any!();

    fn remains_capable() -> bool {
        true
    }

    fn from_remainder(raw: &Bytes, _march: &March) -> Result<Self> {
        Ok(raw.clone())
    }
}

impl<T: Reflect + Default> Sequence for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|value| value as &dyn Reflect)
    }

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.get_mut(index).map(|value| value as &mut dyn Reflect)
    }

    fn fresh_element(&self) -> Box<dyn Reflect> {
        Box::new(T::default())
    }

    fn push(&mut self, value: Box<dyn Reflect>) -> Result<()> {
        Vec::push(self, take(value)?);
        Ok(())
    }

    fn clear(&mut self) {
        Vec::clear(self)
    }
}

impl<T: Reflect + Default> Reflect for Vec<T> {
    fn kind(&self) -> Kind {
        Kind::Sequence
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Sequence(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Sequence(self)
    }

    fn fresh(&self) -> Box<dyn Reflect> {
        Box::new(Vec::<T>::new())
    }

    reflect_any!();
}

#[cfg(feature = "smallvec")]
impl<A> Sequence for smallvec::SmallVec<A>
where
    A: smallvec::Array + 'static,
    A::Item: Reflect + Default,
{
    fn len(&self) -> usize {
        smallvec::SmallVec::len(self)
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|value| value as &dyn Reflect)
    }

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.get_mut(index).map(|value| value as &mut dyn Reflect)
    }

    fn fresh_element(&self) -> Box<dyn Reflect> {
        Box::new(A::Item::default())
    }

    fn push(&mut self, value: Box<dyn Reflect>) -> Result<()> {
        smallvec::SmallVec::push(self, take(value)?);
        Ok(())
    }

    fn clear(&mut self) {
        smallvec::SmallVec::clear(self)
    }
}

#[cfg(feature = "smallvec")]
impl<A> Reflect for smallvec::SmallVec<A>
where
    A: smallvec::Array + 'static,
    A::Item: Reflect + Default,
{
    fn kind(&self) -> Kind {
        Kind::Sequence
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Sequence(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Sequence(self)
    }

    fn fresh(&self) -> Box<dyn Reflect> {
        Box::new(smallvec::SmallVec::<A>::new())
    }

    reflect_any!();
}

/// Fixed-size arrays encode like sequences and refuse to be decoded into.
impl<T: Reflect + Default, const N: usize> Sequence for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|value| value as &dyn Reflect)
    }

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.get_mut(index).map(|value| value as &mut dyn Reflect)
    }

    fn fresh_element(&self) -> Box<dyn Reflect> {
        Box::new(T::default())
    }

    fn push(&mut self, _value: Box<dyn Reflect>) -> Result<()> {
        Err(Error::unsupported(format!(
            "cannot append to a fixed-size array {}",
            std::any::type_name::<Self>()
        )))
    }

    fn clear(&mut self) {
        for value in self.iter_mut() {
            *value = T::default();
        }
    }
}

impl<T: Reflect + Default, const N: usize> Reflect for [T; N] {
    fn kind(&self) -> Kind {
        Kind::Array
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Array(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Array(self)
    }

    fn fresh(&self) -> Box<dyn Reflect> {
        Box::new(core::array::from_fn::<T, N, _>(|_| T::default()))
    }

    reflect_any!();
}

impl<T: Reflect + Default> Pointer for Option<T> {
    fn pointee(&self) -> Option<&dyn Reflect> {
        self.as_ref().map(|value| value as &dyn Reflect)
    }

    fn pointee_mut(&mut self) -> Option<&mut dyn Reflect> {
        self.as_mut().map(|value| value as &mut dyn Reflect)
    }

    fn fresh_pointee(&self) -> Box<dyn Reflect> {
        Box::new(T::default())
    }

    fn set_pointee(&mut self, value: Box<dyn Reflect>) -> Result<()> {
        *self = Some(take(value)?);
        Ok(())
    }

    fn clear(&mut self) -> bool {
        *self = None;
        true
    }
}

impl<T: Reflect + Default> Reflect for Option<T> {
    fn kind(&self) -> Kind {
        Kind::Pointer
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Pointer(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Pointer(self)
    }

    fn fresh(&self) -> Box<dyn Reflect> {
        Box::new(None::<T>)
    }

    reflect_any!();
}

impl<T: Reflect + Default> Pointer for Box<T> {
    fn pointee(&self) -> Option<&dyn Reflect> {
        Some(&**self)
    }

    fn pointee_mut(&mut self) -> Option<&mut dyn Reflect> {
        Some(&mut **self)
    }

    fn fresh_pointee(&self) -> Box<dyn Reflect> {
        Box::new(T::default())
    }

    fn set_pointee(&mut self, value: Box<dyn Reflect>) -> Result<()> {
        **self = take(value)?;
        Ok(())
    }

    fn clear(&mut self) -> bool {
        false
    }
}

impl<T: Reflect + Default> Reflect for Box<T> {
    fn kind(&self) -> Kind {
        Kind::Pointer
    }

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Pointer(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Pointer(self)
    }

    fn fresh(&self) -> Box<dyn Reflect> {
        Box::new(Box::new(T::default()))
    }

    reflect_any!();
}

fn unsupported_remains<V>() -> Error {
    Error::unsupported(format!(
        "remaining fields cannot be held by {}",
        std::any::type_name::<V>()
    ))
}

macro_rules! impl_reflect_mapping {
    ($map:ident < K, V $(, $s:ident)? > $(where $($bound:tt)+)?) => {
        impl<K: MapKey, V: Reflect + Default $(, $s)?> Mapping for $map<K, V $(, $s)?>
        $(where $($bound)+)?
        {
            fn entry_count(&self) -> usize {
                self.len()
            }

            fn entries(&self) -> Vec<(String, &dyn Reflect)> {
                sorted_entries(self.iter().map(|(key, value)| (key, value as &dyn Reflect)))
            }

            fn entries_mut(&mut self) -> Vec<(String, &mut dyn Reflect)> {
                sorted_entries(
                    self.iter_mut()
                        .map(|(key, value)| (key, value as &mut dyn Reflect)),
                )
            }

            fn fresh_value(&self) -> Box<dyn Reflect> {
                Box::new(V::default())
            }

            fn insert_entry(&mut self, name: &str, value: Box<dyn Reflect>) -> Result<()> {
                self.insert(K::from_name(name)?, take(value)?);
                Ok(())
            }
        }

        impl<K: MapKey, V: Reflect + Default $(, $s)?> Reflect for $map<K, V $(, $s)?>
        $(where $($bound)+)?
        {
            fn kind(&self) -> Kind {
                Kind::Mapping
            }

            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Mapping(self)
            }

            fn reflect_mut(&mut self) -> ReflectMut<'_> {
                ReflectMut::Mapping(self)
            }

            fn fresh(&self) -> Box<dyn Reflect> {
                Box::new(Self::default())
            }

            reflect_any!();

            fn accept_remains(&mut self, remains: &Fields, march: &March) -> Result<()> {
                if !V::remains_capable() {
                    return Err(unsupported_remains::<V>());
                }
                let mut map = Self::default();
                for (name, raw) in remains {
                    map.insert(K::from_name(name)?, V::from_remainder(raw, march)?);
                }
                *self = map;
                Ok(())
            }
        }
    };
}

impl_reflect_mapping!(HashMap<K, V, S> where S: BuildHasher + Default + 'static);
impl_reflect_mapping!(IndexMap<K, V, S> where S: BuildHasher + Default + 'static);
impl_reflect_mapping!(BTreeMap<K, V>);

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use bytes::Bytes;

    use crate::codec::Fields;
    use crate::reflect::{Leaf, Mapping, Pointer, Reflect, ReflectRef, Sequence};
    use crate::{ErrorKind, Kind, March, Remainder};

    #[test]
    fn test_leaf_encoding() {
        let march = March::default();
        assert_eq!(42u32.encode(&march).unwrap(), b"42");
        assert_eq!((-7i64).encode(&march).unwrap(), b"-7");
        assert_eq!(true.encode(&march).unwrap(), b"true");
        assert_eq!("hi".to_string().encode(&march).unwrap(), b"\"hi\"");
        assert_eq!("static".encode(&march).unwrap(), b"\"static\"");
        assert_eq!(1.5f64.encode(&march).unwrap(), b"1.5");
        assert_eq!(().encode(&march).unwrap(), b"null");
    }

    #[test]
    fn test_leaf_decoding() {
        let march = March::default();
        let mut value = 0i32;
        value.decode(b"-12", &march).unwrap();
        assert_eq!(value, -12);

        let err = value.decode(b"999999999999999999999999999999", &march).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FieldCodec(_)));
        assert_eq!(value, -12);

        let mut text = String::from("kept");
        text.decode(b"null", &march).unwrap();
        assert_eq!(text, "kept");
        text.decode(b"\"new\"", &march).unwrap();
        assert_eq!(text, "new");
    }

    #[test]
    fn test_static_str_is_not_a_target() {
        let mut value: &'static str = "fixed";
        let err = value.decode(b"\"other\"", &March::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidTarget(_)));
        assert_eq!(value, "fixed");
    }

    #[test]
    fn test_bytes_passthrough() {
        let march = March::default();
        let raw = Bytes::from_static(b"{\"a\": [1]}");
        assert_eq!(raw.encode(&march).unwrap(), b"{\"a\": [1]}");
        assert_eq!(Bytes::new().encode(&march).unwrap(), b"null");

        let mut value = Bytes::new();
        value.decode(b"[true]", &march).unwrap();
        assert_eq!(value, Bytes::from_static(b"[true]"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(5u8.kind(), Kind::Leaf);
        assert_eq!(vec![1u8].kind(), Kind::Sequence);
        assert_eq!([1u8, 2].kind(), Kind::Array);
        assert_eq!(Some(1u8).kind(), Kind::Pointer);
        assert_eq!(Box::new(1u8).kind(), Kind::Pointer);
        assert_eq!(HashMap::<String, u8>::new().kind(), Kind::Mapping);
        assert_eq!(BTreeMap::<String, u8>::new().kind(), Kind::Mapping);
        assert_eq!(serde_json::Value::Null.kind(), Kind::Leaf);
    }

    #[test]
    fn test_array_rejects_push() {
        let mut array = [1u8, 2, 3];
        let err = Sequence::push(&mut array, Box::new(4u8)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedShape(_)));

        let ReflectRef::Array(sequence) = array.reflect_ref() else {
            panic!("expected an array");
        };
        assert_eq!(sequence.len(), 3);
    }

    #[test]
    fn test_option_pointer() {
        let mut value: Option<u8> = None;
        assert!(value.pointee().is_none());
        value.set_pointee(Box::new(7u8)).unwrap();
        assert_eq!(value, Some(7));
        assert!(Pointer::clear(&mut value));
        assert_eq!(value, None);

        let mut boxed = Box::new(1u8);
        assert!(!Pointer::clear(&mut boxed));
        boxed.set_pointee(Box::new(3u8)).unwrap();
        assert_eq!(*boxed, 3);
    }

    #[test]
    fn test_set_rejects_other_types() {
        let mut value = 1u8;
        let err = value.set(Box::new(1u16)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FieldAccess(_)));
    }

    fn remains() -> Fields {
        let mut fields = Fields::new();
        fields.insert("string".to_string(), Bytes::from_static(b"\"test\""));
        fields.insert("int".to_string(), Bytes::from_static(b"2"));
        fields
    }

    #[test]
    fn test_accept_remains() {
        let march = March::default();

        let mut raw: HashMap<String, Bytes> = HashMap::new();
        raw.accept_remains(&remains(), &march).unwrap();
        assert_eq!(raw["int"], Bytes::from_static(b"2"));

        let mut parsed: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        parsed.accept_remains(&remains(), &march).unwrap();
        assert_eq!(parsed["string"], serde_json::json!("test"));

        let mut lazy: HashMap<String, Remainder> = HashMap::new();
        lazy.accept_remains(&remains(), &march).unwrap();
        assert_eq!(lazy["int"].decode::<i32>().unwrap(), 2);
    }

    #[test]
    fn test_accept_remains_unsupported() {
        let march = March::default();
        let mut numbers: HashMap<String, u32> = HashMap::new();
        let err = numbers.accept_remains(&remains(), &march).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedShape(_)));

        let mut list: Vec<Bytes> = Vec::new();
        let err = list.accept_remains(&remains(), &march).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedShape(_)));
    }

    #[test]
    fn test_byte_keys_keep_their_entries() {
        let mut map: HashMap<Vec<u8>, u8> = HashMap::new();
        map.insert(vec![0xff], 1);
        map.insert(b"a".to_vec(), 2);

        let entries = map.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[1].0, "\u{fffd}");
        assert_eq!(entries[1].1.as_any().downcast_ref::<u8>(), Some(&1));

        let mut entries = map.entries_mut();
        entries[1].1.set(Box::new(7u8)).unwrap();
        assert_eq!(map[&vec![0xff]], 7);
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn test_chrono_timestamp() {
        use chrono::{DateTime, Utc};

        let march = March::default();
        // 2009-02-13 23:31:30 UTC
        let timestamp = DateTime::from_timestamp(1234567890, 0).unwrap();
        assert_eq!(
            timestamp.encode(&march).unwrap(),
            br#""2009-02-13T23:31:30Z""#
        );

        let mut decoded = DateTime::<Utc>::default();
        decoded
            .decode(br#""2009-02-13T23:31:30Z""#, &march)
            .unwrap();
        assert_eq!(decoded, timestamp);

        let err = decoded.decode(b"1234567890", &march).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FieldCodec(_)));
        assert_eq!(decoded, timestamp);
    }

    #[cfg(feature = "smallvec")]
    #[test]
    fn test_smallvec_sequence() {
        use smallvec::{SmallVec, smallvec};

        let march = March::default();
        let values: SmallVec<[u16; 2]> = smallvec![1, 2, 3];
        assert_eq!(values.kind(), Kind::Sequence);
        assert_eq!(march.marshal(&values).unwrap(), b"[1,2,3]");

        let mut decoded: SmallVec<[u16; 2]> = smallvec![9];
        march.unmarshal(b"[4, 5]", &mut decoded).unwrap();
        assert_eq!(decoded.as_slice(), &[4, 5]);

        march.unmarshal(b"null", &mut decoded).unwrap();
        assert!(decoded.is_empty());
    }
}
