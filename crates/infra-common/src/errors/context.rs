use super::types::Error;
use std::fmt;

/// Where an error happened: component plus the operation it was running
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub component: String,
    pub operation: String,
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        ErrorContext {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Extension trait for annotating errors with an [`ErrorContext`]
pub trait ErrorExt {
    fn context(self, ctx: ErrorContext) -> Error;

    fn with_context<S: Into<String>, T: Into<String>>(self, component: S, operation: T) -> Error;
}

impl ErrorExt for Error {
    fn context(self, ctx: ErrorContext) -> Error {
        match self {
            Error::Config(msg) => Error::Config(format!("{} [{}]", msg, ctx)),
            Error::Internal(msg) => Error::Internal(format!("{} [{}]", msg, ctx)),
            other => Error::Custom(format!("{} [{}]", other, ctx)),
        }
    }

    fn with_context<S: Into<String>, T: Into<String>>(self, component: S, operation: T) -> Error {
        self.context(ErrorContext::new(component, operation))
    }
}
