use std::fmt;

/// Failure of a render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A component returned an error from its render function.
    Component { component: String, message: String },
    /// `flush` kept finding new updates after every commit.
    TooManyPasses { limit: usize },
}

impl RenderError {
    /// Error raised from inside a component. The renderer fills in the
    /// component name when it catches it.
    pub fn failed(message: impl Into<String>) -> Self {
        RenderError::Component {
            component: String::new(),
            message: message.into(),
        }
    }

    pub(crate) fn in_component(self, name: &str) -> Self {
        match self {
            RenderError::Component { component, message } if component.is_empty() => {
                RenderError::Component {
                    component: name.to_string(),
                    message,
                }
            }
            other => other,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RenderError::Component { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Component { component, message } => {
                write!(f, "component `{component}` failed: {message}")
            }
            RenderError::TooManyPasses { limit } => {
                write!(f, "updates kept arriving after {limit} render passes")
            }
        }
    }
}

impl std::error::Error for RenderError {}
