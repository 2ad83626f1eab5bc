//! The pluggable text encoding that the engines split input with and join
//! output with. JSON is the default.

use bytes::Bytes;
use indexmap::IndexMap;
use serde_json::value::RawValue;

use crate::{Error, Result};

/// Named raw fragments of one encoded record, in input or emission order.
pub type Fields = IndexMap<String, Bytes>;

/// The boundary between the engines and a concrete encoding.
///
/// Implementations never interpret the fragments they split or join.
pub trait Codec: Send + Sync {
    /// Splits one encoded record into its named raw fields.
    fn read_fields(&self, data: &[u8]) -> Result<Fields>;

    /// Joins named, already encoded fields into one record.
    fn write_fields(&self, fields: &Fields) -> Result<Vec<u8>>;

    /// Splits one encoded list into its raw elements.
    fn read_elements(&self, data: &[u8]) -> Result<Vec<Bytes>>;

    /// Joins already encoded elements into one list.
    fn write_elements(&self, elements: &[Vec<u8>]) -> Result<Vec<u8>>;

    /// The encoding of an absent value.
    fn null(&self) -> &'static [u8];

    fn is_null(&self, data: &[u8]) -> bool {
        data.trim_ascii() == self.null()
    }
}

/// The default JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn read_fields(&self, data: &[u8]) -> Result<Fields> {
        let raw: IndexMap<String, Box<RawValue>> = serde_json::from_slice(data)?;
        Ok(raw
            .into_iter()
            .map(|(name, value)| (name, Bytes::copy_from_slice(value.get().as_bytes())))
            .collect())
    }

    fn write_fields(&self, fields: &Fields) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(2 + fields.values().map(|v| v.len() + 4).sum::<usize>());
        buffer.push(b'{');
        for (i, (name, value)) in fields.iter().enumerate() {
            if i > 0 {
                buffer.push(b',');
            }
            serde_json::to_writer(&mut buffer, name).map_err(Error::codec)?;
            buffer.push(b':');
            buffer.extend_from_slice(value);
        }
        buffer.push(b'}');
        Ok(buffer)
    }

    fn read_elements(&self, data: &[u8]) -> Result<Vec<Bytes>> {
        let raw: Vec<Box<RawValue>> = serde_json::from_slice(data)?;
        Ok(raw
            .into_iter()
            .map(|value| Bytes::copy_from_slice(value.get().as_bytes()))
            .collect())
    }

    fn write_elements(&self, elements: &[Vec<u8>]) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(2 + elements.iter().map(|e| e.len() + 1).sum::<usize>());
        buffer.push(b'[');
        buffer.extend_from_slice(&elements.join(&b','));
        buffer.push(b']');
        Ok(buffer)
    }

    fn null(&self) -> &'static [u8] {
        b"null"
    }
}
