use thiserror::Error;

/// Boxed error type used for converter and execution-unit failures.
pub type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed placeholder grammar in a statement template. Raised while
    /// building a [`BindingSpec`](crate::BindingSpec), never at call time.
    #[error("template syntax error: {0}")]
    TemplateSyntax(String),
    /// Call-time binding failure: missing member, out-of-range argument
    /// index, converter failure, or a value the unit cannot encode.
    #[error("binding error: {message}")]
    Binding {
        message: String,
        #[source]
        source: Option<BoxDynError>,
    },
    /// Batch arguments are not same-length sequences. Raised before any
    /// execution is attempted.
    #[error("batch shape error: {0}")]
    BatchShape(String),
    /// Invalid declaration: incompatible mode/keys/return-shape combination,
    /// converter position out of range, duplicate registration.
    #[error("invalid update declaration: {0}")]
    Config(String),
    /// Failure surfaced verbatim from the underlying execution unit.
    #[error("execution error: {0}")]
    Execution(#[source] BoxDynError),
}

impl Error {
    pub(crate) fn binding(message: impl Into<String>) -> Self {
        Error::Binding {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn converter(position: usize, source: BoxDynError) -> Self {
        Error::Binding {
            message: format!("converter failed for parameter {position}"),
            source: Some(source),
        }
    }

    /// True for errors that indicate a broken declaration rather than a
    /// failed call.
    pub fn is_registration(&self) -> bool {
        matches!(self, Error::TemplateSyntax(_) | Error::Config(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Execution(Box::new(e))
    }
}
