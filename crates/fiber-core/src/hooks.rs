//! Positional hook state bound to the component being rendered.
//!
//! While a component renders, the renderer installs a [`HookFrame`] holding
//! the hooks of the fiber's previous generation. Each hook call consumes the
//! next slot, reusing the previous record when its kind and type still match.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::diagnostics::{self, Diagnostic};
use crate::refs::Ref;
use crate::runtime::RuntimeHandle;

/// One persistent hook record. Cloning shares the underlying state.
#[derive(Clone)]
pub(crate) enum Hook {
    Reducer {
        state: Rc<dyn Any>,
        queue: Rc<dyn PendingQueue>,
    },
    Effect {
        deps: Deps,
        cell: Rc<EffectCell>,
    },
    Memo {
        value: Rc<dyn Any>,
        deps: Deps,
    },
    Ref(Rc<dyn Any>),
}

impl Hook {
    pub(crate) fn has_pending_update(&self) -> bool {
        match self {
            Hook::Reducer { queue, .. } => queue.has_pending(),
            _ => false,
        }
    }

    /// Runs the stored cleanup of an effect hook, if any.
    pub(crate) fn run_cleanup(&self) {
        if let Hook::Effect { cell, .. } = self {
            cell.run_cleanup();
        }
    }
}

pub(crate) trait PendingQueue {
    fn has_pending(&self) -> bool;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Actions tagged with the pass that was in flight when they were dispatched.
struct UpdateQueue<A> {
    actions: RefCell<Vec<(u64, A)>>,
}

impl<A> UpdateQueue<A> {
    fn new() -> Self {
        Self {
            actions: RefCell::new(Vec::new()),
        }
    }

    /// Removes the actions dispatched before `pass` started. Later ones stay
    /// queued for the next pass.
    fn take_before(&self, pass: u64) -> Vec<A> {
        let mut actions = self.actions.borrow_mut();
        let split = actions
            .iter()
            .position(|(stamp, _)| *stamp >= pass)
            .unwrap_or(actions.len());
        actions.drain(..split).map(|(_, action)| action).collect()
    }
}

impl<A: 'static> PendingQueue for UpdateQueue<A> {
    fn has_pending(&self) -> bool {
        !self.actions.borrow().is_empty()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A value that can sit in a dependency list.
///
/// Plain values compare by value. Shared handles (`Rc`, `Arc`, refs, setters,
/// callbacks) compare by identity, so a fresh handle to equal contents counts
/// as a change. Floats compare bitwise: `NaN` matches itself, `0.0` and `-0.0`
/// differ.
pub trait DepValue: 'static {
    fn same_dep(&self, other: &Self) -> bool;
}

macro_rules! dep_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(impl DepValue for $ty {
            fn same_dep(&self, other: &Self) -> bool {
                self == other
            }
        })*
    };
}

dep_by_eq!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String,
    &'static str,
);

impl DepValue for f32 {
    fn same_dep(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl DepValue for f64 {
    fn same_dep(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl<T: ?Sized + 'static> DepValue for Rc<T> {
    fn same_dep(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized + 'static> DepValue for std::sync::Arc<T> {
    fn same_dep(&self, other: &Self) -> bool {
        std::sync::Arc::ptr_eq(self, other)
    }
}

// Both already compare by identity.
dep_by_eq!(crate::host::EventHandler, crate::component::Component);

impl<T: 'static> DepValue for Ref<T> {
    fn same_dep(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: 'static> DepValue for SetState<T> {
    fn same_dep(&self, other: &Self) -> bool {
        self == other
    }
}

impl<A: 'static> DepValue for Dispatch<A> {
    fn same_dep(&self, other: &Self) -> bool {
        self == other
    }
}

impl<A: 'static, R: 'static> DepValue for Callback<A, R> {
    fn same_dep(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: DepValue> DepValue for Option<T> {
    fn same_dep(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_dep(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: DepValue> DepValue for Vec<T> {
    fn same_dep(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_dep(b))
    }
}

macro_rules! dep_tuple {
    ($(($($name:ident . $idx:tt),+)),* $(,)?) => {
        $(impl<$($name: DepValue),+> DepValue for ($($name,)+) {
            fn same_dep(&self, other: &Self) -> bool {
                $(self.$idx.same_dep(&other.$idx))&&+
            }
        })*
    };
}

dep_tuple!(
    (A.0),
    (A.0, B.1),
    (A.0, B.1, C.2),
    (A.0, B.1, C.2, D.3),
    (A.0, B.1, C.2, D.3, E.4),
);

trait StoredDeps {
    fn as_any(&self) -> &dyn Any;
    fn same_as(&self, previous: &dyn Any) -> bool;
}

impl<T: DepValue> StoredDeps for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn same_as(&self, previous: &dyn Any) -> bool {
        previous
            .downcast_ref::<T>()
            .is_some_and(|previous| self.same_dep(previous))
    }
}

/// Dependency list of an effect or memo.
#[derive(Clone)]
pub struct Deps(Option<Rc<dyn StoredDeps>>);

impl Deps {
    /// No dependency list: re-run on every render.
    pub fn always() -> Self {
        Deps(None)
    }

    /// Empty dependency list: run on mount only.
    pub fn once() -> Self {
        Deps::of(&())
    }

    /// Depend on `value`; use a tuple for several values.
    pub fn of<T: DepValue + Clone>(value: &T) -> Self {
        Deps(Some(Rc::new(value.clone())))
    }

    pub(crate) fn changed_from(&self, previous: &Deps) -> bool {
        match (&self.0, &previous.0) {
            (Some(next), Some(previous)) => {
                // `Rc<dyn StoredDeps>` is itself a dependency value; compare the contents.
                let (next, previous): (&dyn StoredDeps, &dyn StoredDeps) =
                    (next.as_ref(), previous.as_ref());
                !next.same_as(previous.as_any())
            }
            _ => true,
        }
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Deps(..)"),
            None => f.write_str("Deps::Always"),
        }
    }
}

/// Cleanup returned from an effect body.
#[derive(Default)]
pub struct EffectCleanup(Option<Box<dyn FnOnce()>>);

impl EffectCleanup {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(cleanup)))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl From<()> for EffectCleanup {
    fn from(_: ()) -> Self {
        Self(None)
    }
}

impl fmt::Debug for EffectCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EffectCleanup")
            .field(&self.0.is_some())
            .finish()
    }
}

/// Cleanup slot shared by every generation of one effect hook.
#[derive(Default)]
pub(crate) struct EffectCell {
    cleanup: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl EffectCell {
    pub(crate) fn run_cleanup(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    fn store(&self, cleanup: EffectCleanup) {
        *self.cleanup.borrow_mut() = cleanup.0;
    }
}

/// Effect body queued during render and run after commit.
pub(crate) struct PendingEffect {
    cell: Rc<EffectCell>,
    create: Box<dyn FnOnce() -> EffectCleanup>,
}

impl PendingEffect {
    pub(crate) fn run_cleanup(&self) {
        self.cell.run_cleanup();
    }

    pub(crate) fn run(self) {
        let cleanup = (self.create)();
        self.cell.store(cleanup);
    }
}

/// Per-render hook context of one component invocation.
pub(crate) struct HookFrame {
    component: &'static str,
    previous: Vec<Hook>,
    hooks: Vec<Hook>,
    runtime: RuntimeHandle,
    effects: Vec<PendingEffect>,
    diagnostics: Vec<Diagnostic>,
}

/// What a finished component render left behind.
pub(crate) struct RenderedHooks {
    pub(crate) hooks: Vec<Hook>,
    pub(crate) effects: Vec<PendingEffect>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl HookFrame {
    pub(crate) fn new(component: &'static str, previous: Vec<Hook>, runtime: RuntimeHandle) -> Self {
        Self {
            component,
            hooks: Vec::with_capacity(previous.len()),
            previous,
            runtime,
            effects: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn previous(&self) -> Option<Hook> {
        self.previous.get(self.hooks.len()).cloned()
    }

    fn report_mismatch(&mut self) {
        let index = self.hooks.len();
        diagnostics::report(
            &mut self.diagnostics,
            Diagnostic::HookMismatch {
                component: self.component.to_string(),
                index,
            },
        );
    }

    fn finish(self) -> RenderedHooks {
        if !self.previous.is_empty() && self.hooks.len() != self.previous.len() {
            log::warn!(
                "`{}` called {} hooks, previous render called {}",
                self.component,
                self.hooks.len(),
                self.previous.len()
            );
        }
        RenderedHooks {
            hooks: self.hooks,
            effects: self.effects,
            diagnostics: self.diagnostics,
        }
    }
}

thread_local! {
    static HOOK_FRAMES: RefCell<Vec<HookFrame>> = const { RefCell::new(Vec::new()) };
}

struct FrameGuard {
    armed: bool,
}

impl FrameGuard {
    fn finish(mut self) -> HookFrame {
        self.armed = false;
        HOOK_FRAMES
            .with(|frames| frames.borrow_mut().pop())
            .unwrap_or_else(|| unreachable!("hook frame popped twice"))
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if self.armed {
            HOOK_FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }
}

/// Runs `render` with `frame` installed as the current hook context.
pub(crate) fn render_with<R>(frame: HookFrame, render: impl FnOnce() -> R) -> (R, RenderedHooks) {
    HOOK_FRAMES.with(|frames| frames.borrow_mut().push(frame));
    let guard = FrameGuard { armed: true };
    let result = render();
    (result, guard.finish().finish())
}

fn with_frame<R>(f: impl FnOnce(&mut HookFrame) -> R) -> R {
    HOOK_FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let frame = frames
            .last_mut()
            .expect("hooks can only be called while a component renders");
        f(frame)
    })
}

/// Handle to the runtime of the renderer drawing the current component.
///
/// Uses no hook slot, so it may be called conditionally.
pub fn use_runtime_handle() -> RuntimeHandle {
    with_frame(|frame| frame.runtime.clone())
}

/// Whether a component is rendering on this thread.
pub fn is_rendering() -> bool {
    HOOK_FRAMES.with(|frames| !frames.borrow().is_empty())
}

/// Stable handle that queues actions for a reducer hook.
pub struct Dispatch<A> {
    queue: Rc<UpdateQueue<A>>,
    runtime: RuntimeHandle,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            runtime: self.runtime.clone(),
        }
    }
}

impl<A> PartialEq for Dispatch<A> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.queue, &other.queue)
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dispatch({:p})", Rc::as_ptr(&self.queue))
    }
}

impl<A> Dispatch<A> {
    /// Queues `action` and requests a render pass. State changes on the next render.
    pub fn dispatch(&self, action: A) {
        let pass = self.runtime.current_pass();
        self.queue.actions.borrow_mut().push((pass, action));
        self.runtime.request_update();
    }
}

pub fn use_reducer<S, A>(
    reducer: impl Fn(&S, A) -> S,
    init: impl FnOnce() -> S,
) -> (S, Dispatch<A>)
where
    S: Clone + 'static,
    A: 'static,
{
    let (previous, runtime) = with_frame(|frame| (frame.previous(), frame.runtime.clone()));
    let existing = match previous {
        Some(Hook::Reducer { state, queue }) => {
            match (state.downcast::<S>(), queue.into_any().downcast::<UpdateQueue<A>>()) {
                (Ok(state), Ok(queue)) => Some((state, queue)),
                _ => None,
            }
        }
        _ => None,
    };
    let (mut state, queue) = match existing {
        Some(found) => found,
        None => {
            if previous_exists() {
                with_frame(HookFrame::report_mismatch);
            }
            (Rc::new(init()), Rc::new(UpdateQueue::new()))
        }
    };

    for action in queue.take_before(runtime.current_pass()) {
        state = Rc::new(reducer(&state, action));
    }

    let value = (*state).clone();
    let dispatch = Dispatch {
        queue: Rc::clone(&queue),
        runtime,
    };
    with_frame(|frame| {
        frame.hooks.push(Hook::Reducer {
            state,
            queue: queue as Rc<dyn PendingQueue>,
        })
    });
    (value, dispatch)
}

fn previous_exists() -> bool {
    with_frame(|frame| frame.previous.len() > frame.hooks.len())
}

/// Action understood by the reducer behind [`use_state`].
pub enum StateAction<T> {
    Set(T),
    Update(Box<dyn FnOnce(&T) -> T>),
}

/// Setter returned by [`use_state`]; stable across renders.
pub struct SetState<T>(Dispatch<StateAction<T>>);

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> PartialEq for SetState<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetState({:?})", self.0)
    }
}

impl<T: 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.0.dispatch(StateAction::Set(value));
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.0.dispatch(StateAction::Update(Box::new(f)));
    }
}

pub fn use_state<T: Clone + 'static>(init: impl FnOnce() -> T) -> (T, SetState<T>) {
    let (value, dispatch) = use_reducer(
        |state: &T, action: StateAction<T>| match action {
            StateAction::Set(value) => value,
            StateAction::Update(f) => f(state),
        },
        init,
    );
    (value, SetState(dispatch))
}

/// Schedules `effect` to run after the commit whenever `deps` changed.
///
/// The cleanup returned by the previous run executes first.
pub fn use_effect<R>(deps: Deps, effect: impl FnOnce() -> R + 'static)
where
    R: Into<EffectCleanup>,
{
    with_frame(|frame| {
        let (cell, changed) = match frame.previous() {
            Some(Hook::Effect {
                deps: previous,
                cell,
            }) => (cell, deps.changed_from(&previous)),
            Some(_) => {
                frame.report_mismatch();
                (Rc::new(EffectCell::default()), true)
            }
            None => (Rc::new(EffectCell::default()), true),
        };
        if changed {
            frame.effects.push(PendingEffect {
                cell: Rc::clone(&cell),
                create: Box::new(move || effect().into()),
            });
        }
        frame.hooks.push(Hook::Effect { deps, cell });
    });
}

pub fn use_memo<T: Clone + 'static>(deps: Deps, factory: impl FnOnce() -> T) -> T {
    let previous = with_frame(|frame| frame.previous());
    let cached = match previous {
        Some(Hook::Memo {
            value,
            deps: previous,
        }) if !deps.changed_from(&previous) => value.downcast::<T>().ok(),
        Some(Hook::Memo { .. }) | None => None,
        Some(_) => {
            with_frame(HookFrame::report_mismatch);
            None
        }
    };
    let value = match cached {
        Some(value) => value,
        None => Rc::new(factory()),
    };
    let result = (*value).clone();
    with_frame(|frame| frame.hooks.push(Hook::Memo { value, deps }));
    result
}

/// Shared function handle with identity equality.
pub struct Callback<A, R = ()>(Rc<dyn Fn(A) -> R>);

impl<A, R> Callback<A, R> {
    pub fn new(f: impl Fn(A) -> R + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, arg: A) -> R {
        (self.0)(arg)
    }
}

impl<A, R> Clone for Callback<A, R> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<A, R> PartialEq for Callback<A, R> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<A, R> fmt::Debug for Callback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0))
    }
}

/// [`use_memo`] returning `f` itself, so the handle only changes with `deps`.
pub fn use_callback<A, R>(deps: Deps, f: impl Fn(A) -> R + 'static) -> Callback<A, R>
where
    A: 'static,
    R: 'static,
{
    use_memo(deps, move || Callback::new(f))
}

/// Persistent box whose identity is fixed for the life of the fiber.
pub fn use_ref<T: 'static>(initial: T) -> Ref<T> {
    let previous = with_frame(|frame| frame.previous());
    let existing = match previous {
        Some(Hook::Ref(stored)) => stored.downcast_ref::<Ref<T>>().cloned(),
        _ => None,
    };
    let reference = match existing {
        Some(reference) => reference,
        None => {
            if previous_exists() {
                with_frame(HookFrame::report_mismatch);
            }
            Ref::new(initial)
        }
    };
    with_frame(|frame| frame.hooks.push(Hook::Ref(Rc::new(reference.clone()))));
    reference
}

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod tests;
