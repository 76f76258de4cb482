use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::thread_local;

use crate::host::{HostError, HostSurface};
use crate::platform::RuntimeScheduler;

/// Deferred host mutation queued from outside the commit walk (usually an effect).
pub type HostCommand = Box<dyn FnOnce(&mut dyn HostSurface) -> Result<(), HostError> + 'static>;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    update_requested: Cell<bool>,
    /// Number of render passes started so far.
    pass: Cell<u64>,
    host_commands: RefCell<Vec<HostCommand>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            update_requested: Cell::new(false),
            pass: Cell::new(0),
            host_commands: RefCell::new(Vec::new()),
        }
    }

    fn request_update(&self) {
        // Any number of dispatches before the next slice collapse into one pass.
        if self.update_requested.replace(true) {
            return;
        }
        log::trace!("update batched");
        self.scheduler.schedule_work();
    }

    fn schedule(&self) {
        self.scheduler.schedule_work();
    }

    fn enqueue_host_command(&self, command: HostCommand) {
        self.host_commands.borrow_mut().push(command);
        self.scheduler.schedule_work();
    }

    fn take_host_commands(&self) -> Vec<HostCommand> {
        std::mem::take(&mut *self.host_commands.borrow_mut())
    }
}

/// Shared scheduling state for one renderer.
///
/// The runtime is the only channel through which code running outside the
/// work loop (event handlers, effects, dispatchers) talks back to it.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn has_pending_update(&self) -> bool {
        self.inner.update_requested.get()
    }

    /// Consumes the pending-update flag. Returns whether it was set.
    pub(crate) fn take_update_request(&self) -> bool {
        self.inner.update_requested.replace(false)
    }

    pub(crate) fn request_update(&self) {
        self.inner.request_update();
    }

    pub(crate) fn begin_pass(&self) -> u64 {
        let pass = self.inner.pass.get() + 1;
        self.inner.pass.set(pass);
        pass
    }

    pub(crate) fn schedule(&self) {
        self.inner.schedule();
    }

    pub(crate) fn take_host_commands(&self) -> Vec<HostCommand> {
        self.inner.take_host_commands()
    }

    pub fn has_host_commands(&self) -> bool {
        !self.inner.host_commands.borrow().is_empty()
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_work(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler {
    requests: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn schedule_work(&self) {
        self.requests
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Weak reference to a [`Runtime`]; dropped runtimes turn every call into a no-op.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn request_update(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_update();
        }
    }

    pub fn enqueue_host_command(&self, command: HostCommand) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_host_command(command);
        }
    }

    /// Queue a host mutation on this runtime's renderer.
    ///
    /// Returns `false` once the runtime has been dropped.
    pub fn schedule_host_update(
        &self,
        update: impl FnOnce(&mut dyn HostSurface) -> Result<(), HostError> + 'static,
    ) -> bool {
        match self.0.upgrade() {
            Some(inner) => {
                inner.enqueue_host_command(Box::new(update));
                true
            }
            None => false,
        }
    }

    pub fn has_pending_update(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.update_requested.get())
            .unwrap_or(false)
    }

    /// Pass counter of the runtime; actions stamped with the current value
    /// were dispatched while that pass was in flight.
    pub(crate) fn current_pass(&self) -> u64 {
        self.0.upgrade().map(|inner| inner.pass.get()).unwrap_or(0)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl PartialEq for RuntimeHandle {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

thread_local! {
    static ACTIVE_RUNTIMES: RefCell<Vec<RuntimeHandle>> = RefCell::new(Vec::new());
    static LAST_RUNTIME: RefCell<Option<RuntimeHandle>> = RefCell::new(None);
}

fn current_runtime_handle() -> Option<RuntimeHandle> {
    if let Some(handle) = ACTIVE_RUNTIMES.with(|stack| stack.borrow().last().cloned()) {
        return Some(handle);
    }
    LAST_RUNTIME.with(|slot| slot.borrow().clone())
}

pub(crate) fn push_active_runtime(handle: &RuntimeHandle) {
    ACTIVE_RUNTIMES.with(|stack| stack.borrow_mut().push(handle.clone()));
    LAST_RUNTIME.with(|slot| *slot.borrow_mut() = Some(handle.clone()));
}

pub(crate) fn pop_active_runtime() {
    ACTIVE_RUNTIMES.with(|stack| {
        stack.borrow_mut().pop();
    });
}

/// Keeps a runtime on the active stack for the guard's lifetime.
pub(crate) struct ActiveRuntimeGuard;

impl ActiveRuntimeGuard {
    pub(crate) fn enter(handle: &RuntimeHandle) -> Self {
        push_active_runtime(handle);
        ActiveRuntimeGuard
    }
}

impl Drop for ActiveRuntimeGuard {
    fn drop(&mut self) {
        pop_active_runtime();
    }
}

/// Queue a host mutation against the renderer active on this thread.
///
/// Commands run right after the next commit's effects, which makes this the
/// place to do imperative work such as focusing a node bound through a ref.
/// Outside of render, commit and effects the command goes to the renderer
/// that was active last; with several renderers on one thread, capture a
/// handle with [`use_runtime_handle`](crate::use_runtime_handle) and call
/// [`RuntimeHandle::schedule_host_update`] instead.
/// Returns `false` when no renderer has been active on this thread.
pub fn schedule_host_update(
    update: impl FnOnce(&mut dyn HostSurface) -> Result<(), HostError> + 'static,
) -> bool {
    let scheduled = current_runtime_handle()
        .map(|handle| handle.schedule_host_update(update))
        .unwrap_or(false);
    if !scheduled {
        log::warn!("schedule_host_update called with no active renderer");
    }
    scheduled
}
