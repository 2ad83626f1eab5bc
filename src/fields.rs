//! A uniform, index-addressed view over record fields, sequence elements and
//! mapping entries, spanning any number of roots.

use std::cmp::Ordering;
use std::hash::Hash;
use std::sync::Arc;

use bytes::Bytes;

use crate::reflect::{Kind, Reflect, ReflectMut, ReflectRef};
use crate::tag::{self, Tag};
use crate::{Error, Result};

/// Orders map keys byte-wise; when one key is a prefix of the other, the
/// shorter key comes first.
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Key types a [`crate::Mapping`] can be built over: byte-like or string-like.
pub trait MapKey: Eq + Hash + Ord + Sized + 'static {
    fn key_bytes(&self) -> &[u8];

    fn to_name(&self) -> String;

    fn from_name(name: &str) -> Result<Self>;
}

impl MapKey for String {
    fn key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn to_name(&self) -> String {
        self.clone()
    }

    fn from_name(name: &str) -> Result<Self> {
        Ok(name.to_string())
    }
}

impl MapKey for Box<str> {
    fn key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn to_name(&self) -> String {
        self.to_string()
    }

    fn from_name(name: &str) -> Result<Self> {
        Ok(name.into())
    }
}

impl MapKey for Arc<str> {
    fn key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn to_name(&self) -> String {
        self.to_string()
    }

    fn from_name(name: &str) -> Result<Self> {
        Ok(name.into())
    }
}

impl MapKey for Vec<u8> {
    fn key_bytes(&self) -> &[u8] {
        self
    }

    fn to_name(&self) -> String {
        String::from_utf8_lossy(self).into_owned()
    }

    fn from_name(name: &str) -> Result<Self> {
        Ok(name.as_bytes().to_vec())
    }
}

impl MapKey for Bytes {
    fn key_bytes(&self) -> &[u8] {
        self
    }

    fn to_name(&self) -> String {
        String::from_utf8_lossy(self).into_owned()
    }

    fn from_name(name: &str) -> Result<Self> {
        Ok(Bytes::copy_from_slice(name.as_bytes()))
    }
}

/// Sorts map entries with [`compare_keys`] and renders their names.
pub(crate) fn sorted_entries<'k, K: MapKey, V>(
    entries: impl Iterator<Item = (&'k K, V)>,
) -> Vec<(String, V)> {
    let mut entries: Vec<(&'k K, V)> = entries.collect();
    entries.sort_by(|a, b| compare_keys(a.0.key_bytes(), b.0.key_bytes()));
    entries
        .into_iter()
        .map(|(key, value)| (key.to_name(), value))
        .collect()
}

/// One step from a value to one of its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Field(usize),
    Index(usize),
    Key(String),
    Deref,
}

/// The location of a field relative to the value a walk started from.
pub type FieldPath = Vec<Step>;

/// The walker's view of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub type_name: &'static str,
    pub kind: Kind,
    /// The raw tag value, for record fields that carry the tag key.
    pub raw_tag: Option<&'static str>,
    pub tag: Tag,
    pub position: Step,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        self.tag.name()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.tag.has_flag(flag)
    }

    /// Record fields without a valid tag name are skipped. Elements and
    /// entries are always visible, even under an empty key.
    pub fn is_visible(&self) -> bool {
        !matches!(self.position, Step::Field(_)) || self.tag.is_valid()
    }
}

/// A field found by the walker.
pub struct Field<'a> {
    pub value: &'a dyn Reflect,
    pub descriptor: FieldDescriptor,
    pub path: FieldPath,
}

struct Root<'a> {
    value: &'a dyn Reflect,
    path: FieldPath,
    // Entries in key order, for mapping roots.
    entries: Vec<(String, &'a dyn Reflect)>,
}

impl<'a> Root<'a> {
    fn new(value: &'a dyn Reflect, mut path: FieldPath) -> Self {
        let mut value = value;
        while let ReflectRef::Pointer(pointer) = value.reflect_ref() {
            match pointer.pointee() {
                Some(pointee) => {
                    value = pointee;
                    path.push(Step::Deref);
                }
                None => break,
            }
        }
        let entries = match value.reflect_ref() {
            ReflectRef::Mapping(mapping) => mapping.entries(),
            _ => Vec::new(),
        };
        Root {
            value,
            path,
            entries,
        }
    }

    fn len(&self) -> usize {
        match self.value.reflect_ref() {
            ReflectRef::Record(record) => record.field_len(),
            ReflectRef::Sequence(sequence) | ReflectRef::Array(sequence) => sequence.len(),
            ReflectRef::Mapping(_) => self.entries.len(),
            ReflectRef::Pointer(_) | ReflectRef::Leaf(_) => 0,
        }
    }

    fn field(&self, index: usize, tag_key: &str) -> Option<Field<'a>> {
        let root: &'a dyn Reflect = self.value;
        let (value, raw_tag, tag, position) = match root.reflect_ref() {
            ReflectRef::Record(record) => {
                let info = record.field_info(index)?;
                let raw_tag = info.tag(tag_key);
                let tag = tag::parse(raw_tag).unwrap_or_default();
                (record.field(index)?, raw_tag, tag, Step::Field(index))
            }
            ReflectRef::Sequence(sequence) | ReflectRef::Array(sequence) => (
                sequence.element(index)?,
                None,
                Tag::named(index.to_string()),
                Step::Index(index),
            ),
            ReflectRef::Mapping(_) => {
                let (name, value) = self.entries.get(index)?;
                (
                    *value,
                    None,
                    Tag::named(name.clone()),
                    Step::Key(name.clone()),
                )
            }
            ReflectRef::Pointer(_) | ReflectRef::Leaf(_) => return None,
        };

        let mut path = self.path.clone();
        path.push(position.clone());
        Some(Field {
            value,
            descriptor: FieldDescriptor {
                type_name: value.type_name(),
                kind: value.kind(),
                raw_tag,
                tag,
                position,
            },
            path,
        })
    }
}

/// An ordered list of roots whose fields are enumerated as one list.
///
/// Roots may be appended while the list is being walked; later indices then
/// reach into the appended root.
pub struct FieldList<'a> {
    tag_key: &'a str,
    roots: Vec<Root<'a>>,
}

impl<'a> FieldList<'a> {
    pub fn new(root: &'a dyn Reflect, tag_key: &'a str) -> Self {
        FieldList {
            tag_key,
            roots: vec![Root::new(root, FieldPath::new())],
        }
    }

    /// Appends `value`, found at `path`, as another root.
    pub fn push_root(&mut self, value: &'a dyn Reflect, path: FieldPath) {
        self.roots.push(Root::new(value, path));
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn total_fields(&self) -> usize {
        self.roots.iter().map(Root::len).sum()
    }

    /// The `n`th field across all roots, or `None` when out of bounds.
    pub fn field_at(&self, mut n: usize) -> Option<Field<'a>> {
        for root in &self.roots {
            let len = root.len();
            if n < len {
                return root.field(n, self.tag_key);
            }
            n -= len;
        }
        None
    }
}

/// Follows `path` from `value` to the field it names.
pub fn resolve_mut<'a>(value: &'a mut dyn Reflect, path: &[Step]) -> Result<&'a mut dyn Reflect> {
    let Some((step, rest)) = path.split_first() else {
        return Ok(value);
    };
    let type_name = value.type_name();
    let next = match (step, value.reflect_mut()) {
        (Step::Field(index), ReflectMut::Record(record)) => record.field_mut(*index),
        (Step::Index(index), ReflectMut::Sequence(sequence) | ReflectMut::Array(sequence)) => {
            sequence.element_mut(*index)
        }
        (Step::Key(name), ReflectMut::Mapping(mapping)) => mapping
            .entries_mut()
            .into_iter()
            .find_map(|(entry, value)| (entry == *name).then_some(value)),
        (Step::Deref, ReflectMut::Pointer(pointer)) => pointer.pointee_mut(),
        _ => None,
    };
    let next = next.ok_or_else(|| Error::access(format!("{step:?} is not reachable on {type_name}")))?;
    resolve_mut(next, rest)
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;
    use std::collections::HashMap;

    use super::{FieldList, Step, compare_keys, resolve_mut};
    use crate::Kind;

    #[test]
    fn test_compare_keys() {
        assert_eq!(compare_keys(b"a", b"b"), Ordering::Less);
        assert_eq!(compare_keys(b"b", b"a"), Ordering::Greater);
        assert_eq!(compare_keys(b"ab", b"abc"), Ordering::Less);
        assert_eq!(compare_keys(b"abc", b"ab"), Ordering::Greater);
        assert_eq!(compare_keys(b"abc", b"abc"), Ordering::Equal);
        assert_eq!(compare_keys(b"", b"a"), Ordering::Less);
        assert_eq!(compare_keys(b"B", b"a"), Ordering::Less);
    }

    #[test]
    fn test_sequence_fields() {
        let values = vec![10u8, 20, 30];
        let list = FieldList::new(&values, "march");
        assert_eq!(list.total_fields(), 3);

        let field = list.field_at(1).unwrap();
        assert_eq!(field.descriptor.name(), "1");
        assert_eq!(field.descriptor.kind, Kind::Leaf);
        assert_eq!(field.path, vec![Step::Index(1)]);
        assert!(list.field_at(3).is_none());
    }

    #[test]
    fn test_mapping_fields_are_sorted() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), 2u8);
        map.insert("ab".to_string(), 1u8);
        map.insert("a".to_string(), 0u8);
        let list = FieldList::new(&map, "march");

        let names: Vec<String> = (0..list.total_fields())
            .map(|i| list.field_at(i).unwrap().descriptor.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "ab", "b"]);
    }

    #[test]
    fn test_push_root_extends_walk() {
        let first = vec![1u8];
        let second = vec![2u8, 3];
        let mut list = FieldList::new(&first, "march");
        assert_eq!(list.total_fields(), 1);

        list.push_root(&second, vec![Step::Field(4)]);
        assert_eq!(list.root_count(), 2);
        assert_eq!(list.total_fields(), 3);

        let field = list.field_at(2).unwrap();
        assert_eq!(field.descriptor.name(), "1");
        assert_eq!(field.path, vec![Step::Field(4), Step::Index(1)]);
    }

    #[test]
    fn test_pointer_roots_are_dereferenced() {
        let boxed = Some(Box::new(vec![5u8]));
        let list = FieldList::new(&boxed, "march");
        let field = list.field_at(0).unwrap();
        assert_eq!(field.path, vec![Step::Deref, Step::Deref, Step::Index(0)]);

        let empty: Option<Vec<u8>> = None;
        assert_eq!(FieldList::new(&empty, "march").total_fields(), 0);
    }

    #[test]
    fn test_resolve_mut() {
        let mut values = Some(vec![1u8, 2]);
        let target = resolve_mut(&mut values, &[Step::Deref, Step::Index(1)]).unwrap();
        target.set(Box::new(9u8)).unwrap();
        assert_eq!(values, Some(vec![1, 9]));

        assert!(resolve_mut(&mut values, &[Step::Deref, Step::Index(5)]).is_err());
        assert!(resolve_mut(&mut values, &[Step::Key("x".into())]).is_err());
    }
}
