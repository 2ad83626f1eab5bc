use std::collections::HashSet;

use bytes::Bytes;
use tracing::debug;

use crate::codec::Fields;
use crate::dispatch::{self, Override};
use crate::fields::{FieldList, FieldPath, resolve_mut};
use crate::reflect::{Reflect, ReflectMut, ReflectRef};
use crate::tag::{FLAG_HOIST, FLAG_REMAINS};
use crate::{Error, March, Result};

/// The outcome of decoding one record field.
enum Decoded {
    NotFound,
    Found(Box<dyn Reflect>),
}

// Decoded values wait here until the whole record succeeded.
#[derive(Default)]
struct Plan {
    staged: Vec<(FieldPath, Box<dyn Reflect>)>,
    receivers: Vec<(String, FieldPath, Box<dyn Reflect>)>,
}

// Whether `value` is a chain of pointers ending in an absent one.
fn is_absent(value: &dyn Reflect) -> bool {
    match value.reflect_ref() {
        ReflectRef::Pointer(pointer) => pointer.pointee().is_none_or(is_absent),
        _ => false,
    }
}

// Allocates every pointee down to the first value that is not a pointer.
fn allocate_pointees(value: &mut dyn Reflect) -> Result<()> {
    if let ReflectMut::Pointer(pointer) = value.reflect_mut() {
        let mut pointee = pointer.fresh_pointee();
        allocate_pointees(pointee.as_mut())?;
        pointer.set_pointee(pointee)?;
    }
    Ok(())
}

fn joined(base: &FieldPath, rest: FieldPath) -> FieldPath {
    let mut path = base.clone();
    path.extend(rest);
    path
}

impl March {
    /// Decodes `data` onto `target`, preferring a type-level override over
    /// the default behaviour.
    pub fn unmarshal(&self, data: &[u8], target: &mut dyn Reflect) -> Result<()> {
        self.validate()?;
        if self.is_debug() {
            debug!(target: "march", type_name = target.type_name(), len = data.len(), "unmarshal");
        }

        if let Override::Present(result) = dispatch::try_unmarshal(self, target, data) {
            if self.is_debug() {
                debug!(target: "march", ok = result.is_ok(), "unmarshal override");
            }
            return result;
        }
        self.unmarshal_default(data, target)
    }

    /// Decodes with the configured default unmarshaler, or the field-walking
    /// engine when none is set.
    pub fn unmarshal_default(&self, data: &[u8], target: &mut dyn Reflect) -> Result<()> {
        match self.default_unmarshaler() {
            Some(unmarshaler) => unmarshaler(self, data, target),
            None => self.unmarshal_walk(data, target),
        }
    }

    /// The field-walking decoder, without the type-level override check.
    pub fn unmarshal_walk(&self, data: &[u8], target: &mut dyn Reflect) -> Result<()> {
        let type_name = target.type_name();
        let is_null = self.codec().is_null(data);
        match target.reflect_mut() {
            ReflectMut::Record(_) => {}
            ReflectMut::Pointer(pointer) => {
                if is_null && pointer.clear() {
                    return Ok(());
                }
                let mut pointee = pointer.fresh_pointee();
                self.unmarshal(data, pointee.as_mut())?;
                return pointer.set_pointee(pointee);
            }
            ReflectMut::Array(_) => {
                return Err(Error::unsupported(format!(
                    "cannot decode into the fixed-size array {type_name}, use a Vec"
                )));
            }
            ReflectMut::Sequence(sequence) => {
                if is_null {
                    sequence.clear();
                    return Ok(());
                }
                let elements = self.codec().read_elements(data)?;
                let mut decoded = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    let mut value = sequence.fresh_element();
                    self.unmarshal(element, value.as_mut())
                        .map_err(|err| err.in_field(index.to_string()))?;
                    decoded.push(value);
                }
                sequence.clear();
                for value in decoded {
                    sequence.push(value)?;
                }
                return Ok(());
            }
            ReflectMut::Mapping(mapping) => {
                if is_null {
                    return Ok(());
                }
                let input = self.codec().read_fields(data)?;
                let mut decoded = Vec::with_capacity(input.len());
                for (name, raw) in &input {
                    let mut value = mapping.fresh_value();
                    match self.unmarshal(raw, value.as_mut()) {
                        Ok(()) => decoded.push((name, value)),
                        Err(err) => self.field_failed(name, err)?,
                    }
                }
                for (name, value) in decoded {
                    mapping.insert_entry(name, value)?;
                }
                return Ok(());
            }
            ReflectMut::Leaf(leaf) => return leaf.decode(data, self),
        }
        self.unmarshal_record(data, target)
    }

    fn unmarshal_record(&self, data: &[u8], target: &mut dyn Reflect) -> Result<()> {
        if self.codec().is_null(data) {
            return Ok(());
        }
        let input = match dispatch::try_read_fields(self, target, data) {
            Override::Present(result) => result?,
            Override::Absent => self.codec().read_fields(data)?,
        };

        let mut claimed = HashSet::new();
        let plan = self.plan_record(target, &input, &mut claimed)?;

        let remains: Fields = input
            .iter()
            .filter(|(name, _)| !claimed.contains(*name))
            .map(|(name, raw)| (name.clone(), raw.clone()))
            .collect();

        let mut staged = plan.staged;
        for (name, path, mut receiver) in plan.receivers {
            if self.is_debug() {
                debug!(target: "march", field = name.as_str(), count = remains.len(), "assign remains");
            }
            receiver
                .accept_remains(&remains, self)
                .map_err(|err| err.in_field(name))?;
            staged.push((path, receiver));
        }

        for (path, value) in staged {
            resolve_mut(target, &path)?.set(value)?;
        }
        Ok(())
    }

    // Decodes every claimed field into a fresh value without touching `target`.
    fn plan_record(
        &self,
        target: &dyn Reflect,
        input: &Fields,
        claimed: &mut HashSet<String>,
    ) -> Result<Plan> {
        let mut plan = Plan::default();
        let mut absent = Vec::new();
        let mut values = FieldList::new(target, self.tag_key());

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
            let name = descriptor.name().to_string();
            if descriptor.has_flag(FLAG_REMAINS) {
                plan.receivers.push((name, field.path, field.value.fresh()));
                continue;
            }
            if descriptor.has_flag(FLAG_HOIST) {
                if self.is_debug() {
                    debug!(target: "march", field = name.as_str(), type_name = descriptor.type_name, "hoist");
                }
                if is_absent(field.value) {
                    absent.push((name, field.path, field.value.fresh()));
                } else {
                    values.push_root(field.value, field.path);
                }
                continue;
            }
            if !claimed.insert(name.clone()) {
                continue;
            }

            match self.decode_field(field.value, input.get(&name)) {
                Ok(Decoded::NotFound) => {}
                Ok(Decoded::Found(value)) => {
                    if self.is_debug() {
                        debug!(target: "march", field = name.as_str(), "claim");
                    }
                    plan.staged.push((field.path, value));
                }
                Err(err) => self.field_failed(&name, err)?,
            }
        }

        // Absent hoisted pointers are only allocated when one of their fields is present.
        for (name, path, mut value) in absent {
            allocate_pointees(value.as_mut())?;
            let nested = self.plan_record(value.as_ref(), input, claimed)?;
            if nested.staged.is_empty() && nested.receivers.is_empty() {
                continue;
            }
            if self.is_debug() {
                debug!(target: "march", field = name.as_str(), "allocate hoisted");
            }
            plan.staged.push((path.clone(), value));
            plan.staged.extend(
                nested
                    .staged
                    .into_iter()
                    .map(|(rest, value)| (joined(&path, rest), value)),
            );
            plan.receivers.extend(
                nested
                    .receivers
                    .into_iter()
                    .map(|(name, rest, value)| (name, joined(&path, rest), value)),
            );
        }
        Ok(plan)
    }

    fn decode_field(&self, current: &dyn Reflect, raw: Option<&Bytes>) -> Result<Decoded> {
        let Some(raw) = raw else {
            return Ok(Decoded::NotFound);
        };
        let mut value = current.fresh();
        self.unmarshal(raw, value.as_mut())?;
        Ok(Decoded::Found(value))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{ErrorKind, March, Reflect};

    #[test]
    fn test_leaves() {
        let march = March::default();
        let mut value = 0u16;
        march.unmarshal(b"513", &mut value).unwrap();
        assert_eq!(value, 513);

        let mut text = String::new();
        march.unmarshal(b"\"hello\"", &mut text).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_sequences_are_replaced() {
        let march = March::default();
        let mut values = vec![9u8, 9, 9, 9];
        march.unmarshal(b"[1, 2]", &mut values).unwrap();
        assert_eq!(values, vec![1, 2]);

        march.unmarshal(b"null", &mut values).unwrap();
        assert!(values.is_empty());

        let err = march.unmarshal(b"[1, \"x\"]", &mut values).unwrap_err();
        assert_eq!(err.path(), &["1".to_string()]);
        assert!(values.is_empty());
    }

    #[test]
    fn test_arrays_are_rejected() {
        let march = March::default();
        let mut array = [0u8; 2];
        let inputs: [&[u8]; 4] = [b"[1, 2]", b"[]", b"null", b"{}"];
        for input in inputs {
            let err = march.unmarshal(input, &mut array).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::UnsupportedShape(_)));
        }
        assert_eq!(array, [0, 0]);
    }

    #[test]
    fn test_pointer_depth() {
        let march = March::default();
        let mut value: Option<Option<Box<u32>>> = None;
        march.unmarshal(b"7", &mut value).unwrap();
        assert_eq!(value, Some(Some(Box::new(7))));

        march.unmarshal(b"null", &mut value).unwrap();
        assert_eq!(value, None);

        let mut boxed = Box::new(1u32);
        march.unmarshal(b"2", &mut boxed).unwrap();
        assert_eq!(*boxed, 2);
    }

    #[test]
    fn test_mappings_insert_entries() {
        let march = March::default();
        let mut map: HashMap<String, i32> = HashMap::new();
        map.insert("kept".to_string(), 1);
        march.unmarshal(br#"{"a": 1, "b": -2}"#, &mut map).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["b"], -2);

        march
            .unmarshal(br#"{"c": "nope", "d": 4}"#, &mut map)
            .unwrap();
        assert!(!map.contains_key("c"));
        assert_eq!(map["d"], 4);

        let strict = March::default().strict(true);
        let err = strict
            .unmarshal(br#"{"e": 5, "f": "nope"}"#, &mut map)
            .unwrap_err();
        assert_eq!(err.path(), &["f".to_string()]);
        assert!(!map.contains_key("e"));
    }

    #[test]
    fn test_default_unmarshaler_hook() {
        let march = March::default().with_default_unmarshaler(
            |march, data: &[u8], target: &mut dyn Reflect| {
                let trimmed = data.strip_prefix(b"#").unwrap_or(data);
                march.unmarshal_walk(trimmed, target)
            },
        );
        let mut value = 0u8;
        march.unmarshal(b"#5", &mut value).unwrap();
        assert_eq!(value, 5);
    }
}
