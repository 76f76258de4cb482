//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform traits
//! defined in `fiber-core`. Applications construct a [`StdRuntime`], hand
//! its [`Runtime`] to a [`Renderer`], and call [`StdRuntime::run_pending`]
//! whenever their event loop has an idle moment.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use fiber_core::{
    Clock, ClockDeadline, HostSurface, IdleDeadline, RenderError, Renderer, Runtime, RuntimeHandle,
    RuntimeScheduler, WorkStatus,
};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records work requests in an atomic flag and optionally
/// pokes the host event loop through a waker.
pub struct StdScheduler {
    work_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            work_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether work has been requested since the last call.
    pub fn take_work_request(&self) -> bool {
        self.work_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever new work is scheduled.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("work_requested", &self.work_requested.load(Ordering::SeqCst))
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_work(&self) {
        self.work_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed(&self, since: Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Idle deadline that expires a fixed budget after it was started.
///
/// Stands in for a host idle callback when the platform offers none.
pub type IdleBudget<'a> = ClockDeadline<'a, StdClock>;

/// Convenience container bundling the standard scheduler, clock and runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    clock: Arc<StdClock>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self {
            scheduler,
            clock: Arc::new(StdClock),
            runtime,
        }
    }

    /// Returns the [`Runtime`] to pass to [`Renderer::new`].
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    /// Starts a slice deadline that expires `budget` from now.
    pub fn deadline(&self, budget: Duration) -> IdleBudget<'_> {
        ClockDeadline::new(self.clock.as_ref(), budget)
    }

    /// Returns whether work was requested since the last poll.
    pub fn take_work_request(&self) -> bool {
        self.scheduler.take_work_request()
    }

    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_waker(waker);
    }

    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }

    /// Runs budgeted slices for as long as the renderer keeps requesting work.
    ///
    /// Each slice gets the renderer's configured frame budget. Returns the
    /// number of slices run. Gives up with [`RenderError::TooManyPasses`] when
    /// more than `max_passes_per_flush` commits happen in one call.
    pub fn run_pending<H: HostSurface>(
        &self,
        renderer: &mut Renderer<H>,
    ) -> Result<usize, RenderError> {
        let budget = renderer.config().frame_budget;
        let limit = renderer.config().max_passes_per_flush;
        let mut slices = 0;
        let mut commits = 0;
        while self.take_work_request() {
            let status = renderer.work(&self.deadline(budget)).map_err(|err| {
                log::error!("render pass aborted: {err}");
                err
            })?;
            slices += 1;
            log::trace!("slice {slices}: {status:?}");
            if status == WorkStatus::Committed {
                commits += 1;
                if commits >= limit && renderer.runtime().has_pending_update() {
                    log::error!("update loop detected after {commits} passes");
                    return Err(RenderError::TooManyPasses { limit });
                }
            }
        }
        Ok(slices)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::atomic::AtomicUsize;

    use fiber_core::{
        children, h, props, text, use_effect, use_state, Children, Component, Deps, MemoryHost,
        Props, RendererConfig, SetState,
    };

    use super::*;

    #[test]
    fn state_change_requests_work_and_rerenders() {
        let runtime = StdRuntime::new();
        let mut renderer = Renderer::new(MemoryHost::new(), 0, runtime.runtime());

        let renders = Rc::new(Cell::new(0u32));
        let slot: Rc<RefCell<Option<SetState<i32>>>> = Rc::default();
        let counter = {
            let renders = renders.clone();
            let slot = slot.clone();
            Component::new("Counter", move |_: &Props| {
                renders.set(renders.get() + 1);
                let (value, set) = use_state(|| 0);
                slot.borrow_mut().replace(set);
                Ok(Children::from(text(value.to_string())))
            })
        };

        renderer.render_root(counter);
        assert!(runtime.scheduler().work_requested.load(Ordering::SeqCst));
        runtime.run_pending(&mut renderer).expect("initial render");
        assert_eq!(renders.get(), 1);

        let set = slot.borrow().clone().expect("setter captured during render");
        set.set(1);
        assert!(
            runtime.scheduler().work_requested.load(Ordering::SeqCst),
            "set should request work from the scheduler"
        );
        set.set(2);
        assert!(runtime.runtime_handle().has_pending_update());
        runtime.run_pending(&mut renderer).expect("rerender");

        assert_eq!(renders.get(), 2);
        assert_eq!(renderer.host().text_content(0), "2");
        assert!(renderer.is_idle());
    }

    #[test]
    fn waker_fires_on_schedule() {
        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&wakes);
        runtime.set_waker(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        runtime.scheduler().schedule_work();
        runtime.clear_waker();
        runtime.scheduler().schedule_work();
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_budget_yields_after_every_unit() {
        let runtime = StdRuntime::new();
        let mut renderer = Renderer::with_config(
            MemoryHost::new(),
            0,
            runtime.runtime(),
            RendererConfig::default().with_frame_budget(Duration::ZERO),
        );
        renderer.render(h("p", props(), children!["a", "b"]));
        // root, p and two texts
        assert_eq!(runtime.run_pending(&mut renderer), Ok(4));
        assert_eq!(renderer.host().text_content(0), "ab");
    }

    #[test]
    fn run_pending_stops_self_scheduling_loops() {
        let runtime = StdRuntime::new();
        let mut renderer = Renderer::with_config(
            MemoryHost::new(),
            0,
            runtime.runtime(),
            RendererConfig::default().with_max_passes_per_flush(3),
        );
        renderer.render_root(Component::new("Spinner", |_: &Props| {
            let (n, set) = use_state(|| 0u32);
            use_effect(Deps::always(), move || set.set(n + 1));
            Ok(Children::none())
        }));
        assert_eq!(
            runtime.run_pending(&mut renderer),
            Err(RenderError::TooManyPasses { limit: 3 })
        );
    }

    #[test]
    fn idle_budget_counts_down() {
        let runtime = StdRuntime::new();
        let start = runtime.clock().now();
        assert!(runtime.deadline(Duration::ZERO).should_yield());
        let slice = runtime.deadline(Duration::from_secs(60));
        assert!(!slice.should_yield());
        assert!(slice.time_remaining() <= Duration::from_secs(60));
        assert!(runtime.clock().elapsed(start) < Duration::from_secs(60));
    }
}
