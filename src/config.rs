use std::fmt;
use std::sync::Arc;

use crate::codec::{Codec, JsonCodec};
use crate::dispatch::Method;
use crate::reflect::Reflect;
use crate::tag;
use crate::{Error, ErrorKind, Result};

/// Replaces the default marshal behaviour for every value without an override.
pub type DefaultMarshaler = Arc<dyn Fn(&March, &dyn Reflect) -> Result<Vec<u8>> + Send + Sync>;

/// Replaces the default unmarshal behaviour for every value without an override.
pub type DefaultUnmarshaler =
    Arc<dyn Fn(&March, &[u8], &mut dyn Reflect) -> Result<()> + Send + Sync>;

/// The tag key used by [`March::default`].
pub const DEFAULT_TAG: &str = "march";

/// Configuration for one marshal or unmarshal call.
///
/// A `March` is never mutated by the engines, so one value can be shared
/// freely between threads and independent calls. Captured remainders keep
/// their own clone.
///
/// ```
/// use march::March;
///
/// let march = March::new("abc").with_suffix("ABC").strict(true);
/// assert_eq!(march.tag_key(), "abc");
/// assert_eq!(march.method_suffix(), "ABC");
/// assert!(march.is_strict());
/// ```
#[derive(Clone)]
pub struct March {
    tag: String,
    suffix: Option<String>,
    strict: bool,
    verbose: bool,
    debug: bool,
    codec: Arc<dyn Codec>,
    default_marshaler: Option<DefaultMarshaler>,
    default_unmarshaler: Option<DefaultUnmarshaler>,
}

impl Default for March {
    fn default() -> Self {
        March::new(DEFAULT_TAG)
    }
}

impl fmt::Debug for March {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("March")
            .field("tag", &self.tag)
            .field("suffix", &self.suffix)
            .field("strict", &self.strict)
            .field("verbose", &self.verbose)
            .field("debug", &self.debug)
            .field("default_marshaler", &self.default_marshaler.is_some())
            .field("default_unmarshaler", &self.default_unmarshaler.is_some())
            .finish_non_exhaustive()
    }
}

impl March {
    pub fn new(tag: impl Into<String>) -> Self {
        March {
            tag: tag.into(),
            suffix: None,
            strict: false,
            verbose: false,
            debug: false,
            codec: Arc::new(JsonCodec),
            default_marshaler: None,
            default_unmarshaler: None,
        }
    }

    /// Overrides the suffix of override method names, which defaults to the tag key.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// In strict mode the first failing field aborts the whole call.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// In verbose mode skipped field errors are reported as warnings.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// In debug mode every engine step is traced.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_default_marshaler<F>(mut self, marshaler: F) -> Self
    where
        F: Fn(&March, &dyn Reflect) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.default_marshaler = Some(Arc::new(marshaler));
        self
    }

    pub fn with_default_unmarshaler<F>(mut self, unmarshaler: F) -> Self
    where
        F: Fn(&March, &[u8], &mut dyn Reflect) -> Result<()> + Send + Sync + 'static,
    {
        self.default_unmarshaler = Some(Arc::new(unmarshaler));
        self
    }

    pub fn tag_key(&self) -> &str {
        &self.tag
    }

    pub fn method_suffix(&self) -> &str {
        match &self.suffix {
            Some(suffix) if !suffix.is_empty() => suffix,
            _ => &self.tag,
        }
    }

    /// The full name of an override method, such as `MarshalJSON`.
    pub fn method_name(&self, method: Method) -> String {
        format!("{method}{}", self.method_suffix())
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub(crate) fn default_marshaler(&self) -> Option<&DefaultMarshaler> {
        self.default_marshaler.as_ref()
    }

    pub(crate) fn default_unmarshaler(&self) -> Option<&DefaultUnmarshaler> {
        self.default_unmarshaler.as_ref()
    }

    /// Checks that the configuration can drive an operation.
    pub fn validate(&self) -> Result<()> {
        if !tag::is_valid_name(&self.tag) {
            return Err(Error::new(ErrorKind::MalformedConfiguration(format!(
                "invalid tag key {:?}",
                self.tag
            ))));
        }
        Ok(())
    }

    /// Applies the strictness policy to an error raised by the field `name`.
    pub(crate) fn field_failed(&self, name: &str, err: Error) -> Result<()> {
        if !err.is_recoverable() {
            return Err(err.in_field(name));
        }
        if self.strict {
            return Err(err.in_field(name));
        }
        if self.verbose {
            tracing::warn!(target: "march", field = name, error = %err, "skipping field");
        }
        Ok(())
    }
}
