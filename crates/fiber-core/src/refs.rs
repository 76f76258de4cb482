use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::host::NodeId;

/// Persistent mutable box returned by [`use_ref`](crate::use_ref).
///
/// Cloning yields another handle to the same box; equality is identity.
pub struct Ref<T> {
    inner: Rc<RefCell<T>>,
}

/// Ref bound to a host node through the `ref` prop.
pub type NodeRef = Ref<Option<NodeId>>;

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&*self.inner.borrow()).finish()
    }
}

impl<T> Ref<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// Run `f` with an immutable reference to the stored value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let borrow = self.inner.borrow();
        f(&borrow)
    }

    /// Run `f` with a mutable reference to the stored value.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut borrow = self.inner.borrow_mut();
        f(&mut borrow)
    }

    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> T {
        self.inner.replace(value)
    }
}

impl<T: Clone> Ref<T> {
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

impl NodeRef {
    pub fn node(&self) -> Option<NodeId> {
        *self.inner.borrow()
    }

    pub(crate) fn bind(&self, node: NodeId) {
        self.set(Some(node));
    }

    /// Clears the binding if it still points at `node`.
    pub(crate) fn unbind(&self, node: NodeId) {
        let mut slot = self.inner.borrow_mut();
        if *slot == Some(node) {
            *slot = None;
        }
    }
}
