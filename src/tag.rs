//! The tag grammar: `name,flag,flag`.

/// Flag marking a field whose own fields are spliced into the parent.
pub const FLAG_HOIST: &str = "hoist";

/// Flag marking the container that receives every unclaimed input field.
pub const FLAG_REMAINS: &str = "remains";

/// A parsed tag value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    name: String,
    flags: Vec<String>,
}

impl Tag {
    /// Parses a raw tag value. The first comma separated part is the name,
    /// the remaining parts are flags.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split(',');
        let name = parts.next().unwrap_or_default().to_string();
        Tag {
            name,
            flags: parts.map(str::to_string).collect(),
        }
    }

    /// A tag with a name and no flags, used for sequence indices and map keys.
    pub fn named(name: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            flags: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Whether the engine should see this field at all.
    pub fn is_valid(&self) -> bool {
        is_valid_name(&self.name)
    }
}

/// Parses the tag value stored under some key.
///
/// Returns `None` only when the key is absent; a present but empty value
/// parses to an empty (invalid) name, which means "skip this field".
pub fn parse(raw: Option<&str>) -> Option<Tag> {
    raw.map(Tag::parse)
}

/// The comma separated parts of a tag value, except for the first.
pub fn flags(raw: &str) -> Vec<&str> {
    raw.split(',').skip(1).collect()
}

pub fn contains_flag(raw: &str, flag: &str) -> bool {
    flags(raw).contains(&flag)
}

/// Any non-empty string is a valid tag name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
}

#[cfg(test)]
mod tests {
    use super::{FLAG_HOIST, FLAG_REMAINS, Tag, contains_flag, flags, is_valid_name, parse};

    #[test]
    fn test_parse_name_and_flags() {
        let tag = Tag::parse("extra,hoist,remains");
        assert_eq!(tag.name(), "extra");
        assert_eq!(tag.flags(), &["hoist".to_string(), "remains".to_string()]);
        assert!(tag.has_flag(FLAG_HOIST));
        assert!(tag.has_flag(FLAG_REMAINS));
        assert!(tag.is_valid());
    }

    #[test]
    fn test_parse_absent_and_empty() {
        assert_eq!(parse(None), None);

        let empty = parse(Some("")).unwrap();
        assert_eq!(empty.name(), "");
        assert!(empty.flags().is_empty());
        assert!(!empty.is_valid());

        let flags_only = parse(Some(",hoist")).unwrap();
        assert_eq!(flags_only.name(), "");
        assert!(flags_only.has_flag(FLAG_HOIST));
        assert!(!flags_only.is_valid());
    }

    #[test]
    fn test_flags() {
        assert!(flags("v").is_empty());
        assert_eq!(flags("v,a,b"), vec!["a", "b"]);
        assert!(contains_flag("v,hoist", "hoist"));
        assert!(!contains_flag("hoist", "hoist"));
        assert!(!contains_flag("v,hoisted", "hoist"));
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("-"));
        assert!(is_valid_name("_"));
        assert!(!is_valid_name(""));
    }
}
