//! The renderer session and its resumable depth-first work loop.

use std::rc::Rc;

use slotmap::SlotMap;

use crate::commit::apply_initial_props;
use crate::component::{Children, Component};
use crate::config::RendererConfig;
use crate::context::{ContextFrame, CONTEXT_VALUE_PROP};
use crate::diagnostics::{self, Diagnostic};
use crate::element::{h, props, Element, ElementKind};
use crate::error::RenderError;
use crate::fiber::{EffectTag, Fiber, FiberId, FiberKind};
use crate::hooks::{self, HookFrame, PendingEffect};
use crate::host::{HostSurface, NodeId};
use crate::platform::{IdleDeadline, Unbounded};
use crate::reconcile::{reconcile_children, ReconcileCx};
use crate::runtime::{ActiveRuntimeGuard, Runtime};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Working,
    Committing,
}

/// Outcome of one [`Renderer::work`] slice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing was pending.
    Idle,
    /// The deadline expired mid-pass; the pass resumes on the next slice.
    Yielded,
    /// A pass finished and was committed to the host.
    Committed,
}

/// Owns the fiber arena, the host surface and all session state of one root.
pub struct Renderer<H: HostSurface> {
    pub(crate) host: H,
    pub(crate) container: NodeId,
    pub(crate) fibers: SlotMap<FiberId, Fiber>,
    pub(crate) current_root: Option<FiberId>,
    pub(crate) wip_root: Option<FiberId>,
    pub(crate) next_unit: Option<FiberId>,
    pub(crate) deletions: Vec<FiberId>,
    pub(crate) pending_effects: Vec<PendingEffect>,
    pub(crate) context_stack: Vec<ContextFrame>,
    /// Number of enclosing providers whose value changed in this pass.
    pub(crate) force_descendants: usize,
    pub(crate) root_element: Option<Element>,
    pub(crate) runtime: Runtime,
    pub(crate) config: RendererConfig,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) phase: Phase,
}

impl<H: HostSurface> Renderer<H> {
    pub fn new(host: H, container: NodeId, runtime: Runtime) -> Self {
        Self::with_config(host, container, runtime, RendererConfig::default())
    }

    pub fn with_config(host: H, container: NodeId, runtime: Runtime, config: RendererConfig) -> Self {
        Self {
            host,
            container,
            fibers: SlotMap::with_key(),
            current_root: None,
            wip_root: None,
            next_unit: None,
            deletions: Vec::new(),
            pending_effects: Vec::new(),
            context_stack: Vec::new(),
            force_descendants: 0,
            root_element: None,
            runtime,
            config,
            diagnostics: Vec::new(),
            phase: Phase::Idle,
        }
    }

    /// Mounts or updates the tree under the container.
    ///
    /// The pass starts on the next [`work`](Self::work) slice. A call made while
    /// a pass is in flight is picked up by a fresh pass after it commits.
    pub fn render(&mut self, element: Element) {
        log::debug!("render requested for {:?}", element.kind);
        self.root_element = Some(element);
        self.runtime.request_update();
    }

    pub fn render_root(&mut self, component: Component) {
        self.render(h(component, props(), Vec::new()));
    }

    /// Removes everything rendered under the container.
    pub fn unmount(&mut self) {
        self.root_element = None;
        self.runtime.request_update();
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether no pass is in flight and no update is pending.
    pub fn is_idle(&self) -> bool {
        self.wip_root.is_none() && !self.runtime.has_pending_update()
    }

    /// Number of live fibers in the arena.
    pub fn fiber_count(&self) -> usize {
        self.fibers.len()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Runs one scheduling slice.
    ///
    /// At least one unit of work is performed before the deadline is
    /// consulted, so every slice makes progress.
    pub fn work(&mut self, deadline: &dyn IdleDeadline) -> Result<WorkStatus, RenderError> {
        if self.wip_root.is_none() {
            if !self.runtime.take_update_request() {
                self.run_host_commands();
                return Ok(WorkStatus::Idle);
            }
            self.start_pass();
        }

        let mut performed = 0usize;
        while let Some(unit) = self.next_unit {
            if performed > 0 && deadline.should_yield() {
                break;
            }
            match self.perform_unit(unit) {
                Ok(next) => self.next_unit = next,
                Err(err) => {
                    log::error!("render pass failed: {err}");
                    self.abandon_pass();
                    return Err(err);
                }
            }
            performed += 1;
        }

        if self.next_unit.is_some() {
            log::trace!("yielding after {performed} units");
            self.runtime.schedule();
            return Ok(WorkStatus::Yielded);
        }

        self.commit_root();
        if self.runtime.has_pending_update() {
            self.runtime.schedule();
        }
        Ok(WorkStatus::Committed)
    }

    /// Runs slices with no deadline until nothing is pending.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        let limit = self.config.max_passes_per_flush;
        let mut passes = 0usize;
        loop {
            match self.work(&Unbounded)? {
                WorkStatus::Idle => return Ok(()),
                WorkStatus::Yielded => {}
                WorkStatus::Committed => {
                    passes += 1;
                    if passes >= limit && self.runtime.has_pending_update() {
                        log::error!("update loop detected after {passes} passes");
                        return Err(RenderError::TooManyPasses { limit });
                    }
                }
            }
        }
    }

    fn start_pass(&mut self) {
        let children = self.root_element.iter().cloned().collect();
        let mut root = Fiber::root(self.container, children);
        root.alternate = self.current_root;
        let root = self.fibers.insert(root);
        self.wip_root = Some(root);
        self.next_unit = Some(root);
        self.deletions.clear();
        self.phase = Phase::Working;
        let pass = self.runtime.begin_pass();
        log::debug!("render pass {pass} started");
    }

    /// Drops the in-flight generation after a fatal error.
    fn abandon_pass(&mut self) {
        if let Some(root) = self.wip_root.take() {
            self.release_tree(root);
        }
        for old in self.deletions.drain(..) {
            if let Some(fiber) = self.fibers.get_mut(old) {
                fiber.effect = EffectTag::None;
            }
        }
        while let Some(frame) = self.context_stack.pop() {
            frame.slot.restore(frame.previous);
        }
        self.force_descendants = 0;
        self.pending_effects.clear();
        self.next_unit = None;
        self.phase = Phase::Idle;
    }

    /// Frees every fiber reachable from `root`.
    pub(crate) fn release_tree(&mut self, root: FiberId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(fiber) = self.fibers.remove(id) {
                if let Some(child) = fiber.child {
                    stack.push(child);
                }
                if id != root {
                    if let Some(sibling) = fiber.sibling {
                        stack.push(sibling);
                    }
                }
            }
        }
    }

    fn perform_unit(&mut self, unit: FiberId) -> Result<Option<FiberId>, RenderError> {
        let fiber = &self.fibers[unit];
        log::trace!("begin {} (key {:?})", fiber.name(), fiber.key);
        self.begin_work(unit)?;
        if let Some(child) = self.fibers[unit].child {
            return Ok(Some(child));
        }

        let root = self.wip_root;
        let mut next = Some(unit);
        while let Some(id) = next {
            self.complete_work(id);
            if Some(id) == root {
                return Ok(None);
            }
            if let Some(sibling) = self.fibers[id].sibling {
                return Ok(Some(sibling));
            }
            next = self.fibers[id].parent;
        }
        Ok(None)
    }

    fn begin_work(&mut self, id: FiberId) -> Result<(), RenderError> {
        match self.fibers[id].kind {
            FiberKind::HostRoot => {
                let children = Children::from_props(&self.fibers[id].props);
                self.reconcile(id, &children);
            }
            FiberKind::Text => self.begin_text(id),
            FiberKind::Host => self.begin_host(id),
            FiberKind::Component => self.begin_component(id)?,
            FiberKind::Provider => self.begin_provider(id),
        }
        Ok(())
    }

    fn complete_work(&mut self, id: FiberId) {
        let fiber = &self.fibers[id];
        if fiber.kind != FiberKind::Provider {
            return;
        }
        let changed = fiber.context_changed;
        if let Some(frame) = self.context_stack.pop() {
            frame.slot.restore(frame.previous);
        }
        if changed {
            self.force_descendants = self.force_descendants.saturating_sub(1);
        }
    }

    pub(crate) fn reconcile(&mut self, id: FiberId, children: &Children) {
        let mut cx = ReconcileCx {
            fibers: &mut self.fibers,
            deletions: &mut self.deletions,
            diagnostics: &mut self.diagnostics,
            warn_missing_keys: self.config.warn_missing_keys,
        };
        reconcile_children(&mut cx, id, children);
    }

    fn begin_text(&mut self, id: FiberId) {
        let fiber = &self.fibers[id];
        if fiber.host.is_some() {
            return;
        }
        let node = if self.config.nbsp_text {
            self.host
                .create_text_node(&fiber.text().replace(' ', "\u{a0}"))
        } else {
            self.host.create_text_node(fiber.text())
        };
        self.fibers[id].host = Some(node);
    }

    fn begin_host(&mut self, id: FiberId) {
        let fiber = &self.fibers[id];
        let props = Rc::clone(&fiber.props);
        if fiber.host.is_none() {
            let tag = match &fiber.ty {
                Some(ElementKind::Host(tag)) => Rc::clone(tag),
                _ => Rc::from("div"),
            };
            if !tag.starts_with(|c: char| c.is_ascii_lowercase()) {
                diagnostics::report(
                    &mut self.diagnostics,
                    Diagnostic::InvalidTag {
                        tag: tag.to_string(),
                    },
                );
            }
            let node = self.host.create_node(&tag);
            apply_initial_props(&mut self.host, node, &props);
            self.fibers[id].host = Some(node);
        }
        let children = if props.get("dangerouslySetInnerHTML").is_some() {
            Children::none()
        } else {
            Children::from_props(&props)
        };
        self.reconcile(id, &children);
    }

    fn begin_provider(&mut self, id: FiberId) {
        let fiber = &self.fibers[id];
        let Some(ElementKind::Provider(marker)) = &fiber.ty else {
            return;
        };
        let slot = Rc::clone(marker.slot());
        let props = Rc::clone(&fiber.props);
        let value = props.get(CONTEXT_VALUE_PROP);
        let changed = match fiber.alternate {
            Some(alternate) => {
                slot.value_changed(self.fibers[alternate].props.get(CONTEXT_VALUE_PROP), value)
            }
            None => false,
        };
        let previous = slot.enter(value);
        self.context_stack.push(ContextFrame { slot, previous });
        if changed {
            log::debug!("context value changed; descendants will re-render");
            self.force_descendants += 1;
        }
        self.fibers[id].context_changed = changed;
        self.reconcile(id, &Children::from_props(&props));
    }

    fn can_bail_out(&self, id: FiberId) -> bool {
        if self.force_descendants > 0 {
            return false;
        }
        let fiber = &self.fibers[id];
        let Some(alternate) = fiber.alternate.and_then(|alt| self.fibers.get(alt)) else {
            return false;
        };
        alternate.boundary_error.is_none()
            && !alternate.render_failed
            && !alternate.has_pending_update()
            && (Rc::ptr_eq(&alternate.props, &fiber.props)
                || !alternate.props.changed(&fiber.props))
    }

    /// Re-links copies of the previous generation's children under `id`.
    fn bail_out(&mut self, id: FiberId) {
        log::trace!("bail out {}", self.fibers[id].name());
        let mut cursor = self.fibers[id]
            .alternate
            .and_then(|alternate| self.fibers[alternate].child);
        let mut previous: Option<FiberId> = None;
        self.fibers[id].child = None;
        while let Some(old) = cursor {
            let mut copy = Fiber::clone_of(old, &self.fibers[old]);
            copy.parent = Some(id);
            cursor = self.fibers[old].sibling;
            let copy = self.fibers.insert(copy);
            match previous {
                Some(prev) => self.fibers[prev].sibling = Some(copy),
                None => self.fibers[id].child = Some(copy),
            }
            previous = Some(copy);
        }
    }

    fn begin_component(&mut self, id: FiberId) -> Result<(), RenderError> {
        if self.can_bail_out(id) {
            self.bail_out(id);
            return Ok(());
        }

        let fiber = &self.fibers[id];
        let Some(ElementKind::Component(component)) = fiber.ty.clone() else {
            return Ok(());
        };
        let props = Rc::clone(&fiber.props);
        let previous_hooks = fiber.hooks.clone();

        if let Some(error) = fiber.boundary_error.clone() {
            if let Some(fallback) = fiber.fallback() {
                log::debug!("`{}` renders its fallback", component.name());
                let children = fallback.render(&error);
                self.reconcile(id, &children);
                return Ok(());
            }
        }

        let handle = self.runtime.handle();
        let frame = HookFrame::new(component.name(), previous_hooks.clone(), handle.clone());
        let (result, rendered) = {
            let _active = ActiveRuntimeGuard::enter(&handle);
            hooks::render_with(frame, || component.render(&props))
        };
        self.diagnostics.extend(rendered.diagnostics);

        match result {
            Ok(children) => {
                self.fibers[id].hooks = rendered.hooks;
                self.pending_effects.extend(rendered.effects);
                self.reconcile(id, &children);
                Ok(())
            }
            Err(err) => {
                let err = err.in_component(component.name());
                let fiber = &mut self.fibers[id];
                fiber.hooks = previous_hooks;
                fiber.render_failed = true;
                self.capture_error(id, err)
            }
        }
    }

    /// Records `error` on the nearest error boundary above `id`, or returns it.
    fn capture_error(&mut self, id: FiberId, error: RenderError) -> Result<(), RenderError> {
        let mut cursor = self.fibers[id].parent;
        while let Some(ancestor) = cursor {
            // A boundary already showing its fallback passes errors on.
            let showing_fallback = self.fibers[ancestor]
                .alternate
                .and_then(|alternate| self.fibers.get(alternate))
                .is_some_and(|alternate| alternate.boundary_error.is_some());
            let fiber = &mut self.fibers[ancestor];
            if fiber.fallback().is_some() && !showing_fallback {
                log::warn!("`{}` caught: {error}", fiber.name());
                if fiber.boundary_error.is_none() {
                    fiber.boundary_error = Some(error);
                    self.runtime.request_update();
                }
                self.reconcile(id, &Children::none());
                return Ok(());
            }
            cursor = fiber.parent;
        }
        Err(error)
    }
}

#[cfg(test)]
#[path = "tests/work_loop_tests.rs"]
mod tests;
