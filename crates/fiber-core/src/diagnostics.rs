use std::fmt;

use crate::element::Key;

/// Non-fatal usage warning collected during a render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Two siblings share an explicit key; later ones fall back to position.
    DuplicateKey { key: Key },
    /// A component in a mapped list has no key.
    MissingKey { component: String },
    /// The hook at `index` changed kind or type between renders.
    HookMismatch { component: String, index: usize },
    /// A host tag that does not start with a lowercase letter.
    InvalidTag { tag: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DuplicateKey { key } => {
                write!(f, "duplicate key `{key}` among siblings")
            }
            Diagnostic::MissingKey { component } => {
                write!(f, "`{component}` rendered in a list without a key")
            }
            Diagnostic::HookMismatch { component, index } => {
                write!(f, "hook #{index} of `{component}` changed between renders")
            }
            Diagnostic::InvalidTag { tag } => {
                write!(f, "`{tag}` is not a valid host tag")
            }
        }
    }
}

pub(crate) fn report(sink: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    log::warn!("{diagnostic}");
    sink.push(diagnostic);
}
