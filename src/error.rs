use thiserror::Error;

/// Specific kinds of errors that can occur while marshalling or unmarshalling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("malformed configuration: {0}")]
    MalformedConfiguration(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),

    #[error("field access: {0}")]
    FieldAccess(String),

    #[error("override contract violation: {0}")]
    OverrideContractViolation(String),

    #[error("{0}")]
    FieldCodec(String),
}

/// Error type returned by every marshal and unmarshal operation.
///
/// The path records the chain of field names the error travelled through,
/// outermost first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{kind}", path_prefix(.path))]
pub struct Error {
    kind: ErrorKind,
    path: Vec<String>,
}

fn path_prefix(path: &[String]) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("field `{}`: ", path.join("."))
    }
}

impl Error {
    /// Creates a new Error with the given kind.
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
        }
    }

    /// Creates a [`ErrorKind::FieldCodec`] error from anything printable.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::FieldCodec(err.to_string()))
    }

    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedShape(detail.into()))
    }

    pub(crate) fn access(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::FieldAccess(detail.into()))
    }

    pub(crate) fn contract(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::OverrideContractViolation(detail.into()))
    }

    /// Returns the specific kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the field names leading to the failing value, outermost first.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Records that this error happened inside the field `name`.
    pub fn in_field(mut self, name: impl Into<String>) -> Self {
        self.path.insert(0, name.into());
        self
    }

    /// Whether the strictness policy may swallow this error.
    ///
    /// Only codec failures are data problems; everything else is a defect in
    /// the schema, the configuration or an override and always aborts.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind, ErrorKind::FieldCodec(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::codec(err)
    }
}

/// Result type for marshal and unmarshal operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;
