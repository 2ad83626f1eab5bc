//! March is a tag-driven marshalling engine. It walks a value's fields,
//! reads or writes a textual encoding (JSON by default) keyed by per-field
//! tag names, and lets every type take over any step of the process.
//!
//! Fields are described by tags under a configurable tag key. A tag value is
//! a name followed by optional flags:
//!
//! - `hoist` splices the field's own fields into its parent's namespace.
//! - `remains` collects every input field nobody else claimed.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashMap;
//!
//! use march::{March, Remainder};
//!
//! #[derive(Debug, Default, march::March)]
//! struct Event {
//!     #[tag(march = "v")]
//!     version: i64,
//!     #[tag(march = "extra,remains")]
//!     extra: HashMap<String, Remainder>,
//! }
//!
//! let mut event = Event::default();
//! March::default()
//!     .unmarshal(br#"{"v":200,"string":"test","int":2}"#, &mut event)
//!     .unwrap();
//!
//! assert_eq!(event.version, 200);
//! assert_eq!(event.extra["string"].decode::<String>().unwrap(), "test");
//! assert!(event.extra["int"].decode::<String>().is_err());
//! assert_eq!(event.extra["int"].decode::<i64>().unwrap(), 2);
//! ```

extern crate self as march;

mod codec;
mod config;
mod dispatch;
mod error;
mod fields;
mod marshal;
mod reflect;
mod remainder;
pub mod tag;
mod types;
mod unmarshal;

pub use crate::codec::{Codec, Fields, JsonCodec};
pub use crate::config::{DEFAULT_TAG, DefaultMarshaler, DefaultUnmarshaler, March};
pub use crate::dispatch::{Custom, Method, Override};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::fields::{
    Field, FieldDescriptor, FieldList, FieldPath, MapKey, Step, compare_keys, resolve_mut,
};
pub use crate::reflect::{
    FieldInfo, Kind, Leaf, Mapping, Pointer, Record, Reflect, ReflectMut, ReflectRef, Sequence,
    take,
};
pub use crate::remainder::{Remainder, Shape};

/// Derives [`Reflect`] and [`Record`] for a struct with named fields.
///
/// # Example
///
/// ```
/// use march::Reflect;
///
/// #[derive(Default, march::March)]
/// struct Point {
///     #[tag(march = "x", json = "X")]
///     x: i32,
///     #[tag(march = "y")]
///     y: i32,
///     // No tag under the active key: never read or written.
///     cache: u64,
///     #[march(skip)]
///     scratch: Vec<u8>,
/// }
///
/// let data = march::to_vec(&Point { x: 1, y: 2, cache: 3, scratch: vec![] }).unwrap();
/// assert_eq!(data, br#"{"x":1,"y":2}"#);
/// ```
pub use march_derive::March;

/// Encodes `value` with the default configuration.
///
/// ```
/// assert_eq!(march::to_vec(&vec![1u8, 2]).unwrap(), b"[1,2]");
/// ```
pub fn to_vec<T: Reflect>(value: &T) -> Result<Vec<u8>> {
    March::default().marshal(value)
}

/// Decodes a new `T` with the default configuration.
///
/// ```
/// let value: Vec<Option<u8>> = march::from_slice(b"[1, null]").unwrap();
/// assert_eq!(value, vec![Some(1), None]);
/// ```
pub fn from_slice<T: Reflect + Default>(data: &[u8]) -> Result<T> {
    let mut value = T::default();
    March::default().unmarshal(data, &mut value)?;
    Ok(value)
}

/// Encodes `value` with the default configuration.
pub fn marshal(value: &dyn Reflect) -> Result<Vec<u8>> {
    March::default().marshal(value)
}

/// Decodes `data` onto `target` with the default configuration.
pub fn unmarshal(data: &[u8], target: &mut dyn Reflect) -> Result<()> {
    March::default().unmarshal(data, target)
}
