#![doc = r"Fiber reconciliation core: elements, hooks, keyed diffing and a resumable work loop."]

extern crate self as fiber_core;

mod commit;
pub mod component;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod element;
pub mod error;
mod fiber;
pub mod hash;
pub mod hooks;
pub mod host;
pub mod platform;
mod reconcile;
pub mod refs;
pub mod runtime;
mod work_loop;

pub use component::{component, error_boundary, Children, Component, Fallback, Rendered};
pub use config::RendererConfig;
pub use context::{create_context, use_context, Context, ContextId, ProviderMarker};
pub use diagnostics::Diagnostic;
pub use element::{h, props, text, Child, Element, ElementKind, Key, PropValue, Props, PropsBuilder};
pub use error::RenderError;
pub use fiber::{EffectTag, FiberId, FiberKind};
pub use hooks::{
    is_rendering, use_callback, use_effect, use_memo, use_reducer, use_ref, use_runtime_handle,
    use_state, Callback, DepValue, Deps, Dispatch, EffectCleanup, SetState, StateAction,
};
pub use host::{Event, EventHandler, HostError, HostSurface, MemoryHost, MemoryNode, MemoryNodeKind, NodeId};
pub use platform::{Clock, ClockDeadline, IdleDeadline, RuntimeScheduler, Unbounded};
pub use refs::{NodeRef, Ref};
pub use runtime::{schedule_host_update, DefaultScheduler, HostCommand, Runtime, RuntimeHandle};
pub use work_loop::{Phase, Renderer, WorkStatus};

#[cfg(test)]
pub use runtime::TestScheduler;
