//! Per-type overrides of the default engines.

use std::fmt;

use crate::codec::Fields;
use crate::reflect::Reflect;
use crate::{Error, March, Result};

/// Whether a type supplies an override for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override<T> {
    Absent,
    Present(T),
}

/// The four operations a type may take over from the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Encode the whole value.
    Marshal,
    /// Decode the whole value.
    Unmarshal,
    /// Split encoded input into named raw fields.
    ReadFields,
    /// Join named raw fields into one encoded value.
    WriteFields,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Marshal => "Marshal",
            Method::Unmarshal => "Unmarshal",
            Method::ReadFields => "ReadFields",
            Method::WriteFields => "WriteFields",
        };
        f.write_str(name)
    }
}

/// Custom marshalling for one type.
///
/// Every method defaults to [`Override::Absent`], which sends the engine down
/// its default path. An implementation usually inspects
/// [`March::method_suffix`] and only answers for the suffixes it knows.
/// Opt in from a derived type with `#[march(custom)]`.
///
/// # Example
///
/// ```
/// use march::{Custom, March, Override, Result};
///
/// #[derive(Default, march::March)]
/// #[march(custom)]
/// struct Celsius {
///     #[tag(march = "degrees")]
///     degrees: f64,
/// }
///
/// impl Custom for Celsius {
///     fn marshal_custom(&self, _march: &March) -> Override<Result<Vec<u8>>> {
///         Override::Present(Ok(format!("\"{}C\"", self.degrees).into_bytes()))
///     }
/// }
///
/// let data = march::to_vec(&Celsius { degrees: 21.5 }).unwrap();
/// assert_eq!(data, b"\"21.5C\"");
/// ```
pub trait Custom {
    fn marshal_custom(&self, march: &March) -> Override<Result<Vec<u8>>> {
        let _ = march;
        Override::Absent
    }

    fn unmarshal_custom(&mut self, march: &March, data: &[u8]) -> Override<Result<()>> {
        let _ = (march, data);
        Override::Absent
    }

    fn read_fields_custom(&self, march: &March, data: &[u8]) -> Override<Result<Fields>> {
        let _ = (march, data);
        Override::Absent
    }

    fn write_fields_custom(&self, march: &March, fields: &Fields) -> Override<Result<Vec<u8>>> {
        let _ = (march, fields);
        Override::Absent
    }
}

pub(crate) fn try_marshal(march: &March, value: &dyn Reflect) -> Override<Result<Vec<u8>>> {
    let Some(custom) = value.custom() else {
        return Override::Absent;
    };
    match custom.marshal_custom(march) {
        Override::Absent => Override::Absent,
        Override::Present(result) => {
            Override::Present(result.and_then(|data| non_empty(march, Method::Marshal, data)))
        }
    }
}

pub(crate) fn try_unmarshal(
    march: &March,
    target: &mut dyn Reflect,
    data: &[u8],
) -> Override<Result<()>> {
    match target.custom_mut() {
        Some(custom) => custom.unmarshal_custom(march, data),
        None => Override::Absent,
    }
}

pub(crate) fn try_read_fields(
    march: &March,
    value: &dyn Reflect,
    data: &[u8],
) -> Override<Result<Fields>> {
    let Some(custom) = value.custom() else {
        return Override::Absent;
    };
    match custom.read_fields_custom(march, data) {
        Override::Absent => Override::Absent,
        Override::Present(Ok(fields)) => {
            if let Some((name, _)) = fields.iter().find(|(_, raw)| raw.is_empty()) {
                return Override::Present(Err(Error::contract(format!(
                    "{} returned field {name:?} without bytes",
                    march.method_name(Method::ReadFields)
                ))));
            }
            Override::Present(Ok(fields))
        }
        Override::Present(Err(err)) => Override::Present(Err(err)),
    }
}

pub(crate) fn try_write_fields(
    march: &March,
    value: &dyn Reflect,
    fields: &Fields,
) -> Override<Result<Vec<u8>>> {
    let Some(custom) = value.custom() else {
        return Override::Absent;
    };
    match custom.write_fields_custom(march, fields) {
        Override::Absent => Override::Absent,
        Override::Present(result) => {
            Override::Present(result.and_then(|data| non_empty(march, Method::WriteFields, data)))
        }
    }
}

// An encoded value is embedded verbatim into its parent, so it can never be empty.
fn non_empty(march: &March, method: Method, data: Vec<u8>) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Err(Error::contract(format!(
            "{} returned no bytes",
            march.method_name(method)
        )));
    }
    Ok(data)
}
