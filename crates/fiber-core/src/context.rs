use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::element::{h, props, Child, Element, PropValue};

pub(crate) const CONTEXT_VALUE_PROP: &str = "value";

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

/// Type-erased view of a context used by the work loop.
pub(crate) trait ContextSlot {
    /// Installs the provided value (or the default) and returns the value it replaced.
    fn enter(&self, provided: Option<&PropValue>) -> Box<dyn Any>;
    fn restore(&self, previous: Box<dyn Any>);
    fn value_changed(&self, old: Option<&PropValue>, new: Option<&PropValue>) -> bool;
}

struct ContextInner<T> {
    id: ContextId,
    default: T,
    current: RefCell<T>,
}

impl<T: Clone + PartialEq + 'static> ContextInner<T> {
    fn resolve(&self, provided: Option<&PropValue>) -> T {
        match provided {
            Some(value) => match value.downcast::<T>() {
                Some(typed) => (*typed).clone(),
                None => {
                    log::warn!(
                        "provider value for context {:?} has the wrong type; using default",
                        self.id
                    );
                    self.default.clone()
                }
            },
            None => self.default.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ContextSlot for ContextInner<T> {
    fn enter(&self, provided: Option<&PropValue>) -> Box<dyn Any> {
        let value = self.resolve(provided);
        Box::new(self.current.replace(value))
    }

    fn restore(&self, previous: Box<dyn Any>) {
        match previous.downcast::<T>() {
            Ok(value) => *self.current.borrow_mut() = *value,
            Err(_) => log::error!("context {:?} restored with a foreign value", self.id),
        }
    }

    fn value_changed(&self, old: Option<&PropValue>, new: Option<&PropValue>) -> bool {
        self.resolve(old) != self.resolve(new)
    }
}

/// Value shared with every descendant of a provider.
///
/// Outside any provider, [`use_context`] returns the default.
pub struct Context<T> {
    inner: Rc<ContextInner<T>>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Context").field(&self.inner.id).finish()
    }
}

pub fn create_context<T: Clone + PartialEq + 'static>(default: T) -> Context<T> {
    Context::new(default)
}

impl<T: Clone + PartialEq + 'static> Context<T> {
    pub fn new(default: T) -> Self {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Rc::new(ContextInner {
                id,
                current: RefCell::new(default.clone()),
                default,
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn marker(&self) -> ProviderMarker {
        ProviderMarker {
            id: self.inner.id,
            slot: self.inner.clone(),
        }
    }

    /// Provider element making `value` visible to `children`.
    pub fn provider(&self, value: T, children: Vec<Child>) -> Element {
        h(self.marker(), props().any(CONTEXT_VALUE_PROP, value), children)
    }

    pub fn current(&self) -> T {
        self.inner.current.borrow().clone()
    }
}

/// Element type of a provider; identifies its context.
#[derive(Clone)]
pub struct ProviderMarker {
    id: ContextId,
    slot: Rc<dyn ContextSlot>,
}

impl ProviderMarker {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn slot(&self) -> &Rc<dyn ContextSlot> {
        &self.slot
    }
}

impl PartialEq for ProviderMarker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Value restored when a provider's subtree completes.
pub(crate) struct ContextFrame {
    pub(crate) slot: Rc<dyn ContextSlot>,
    pub(crate) previous: Box<dyn Any>,
}

/// Reads the innermost provided value of `context`.
pub fn use_context<T: Clone + PartialEq + 'static>(context: &Context<T>) -> T {
    context.current()
}
