use std::sync::Arc;

use fiber_core::{
    Component, DefaultScheduler, Diagnostic, Element, MemoryHost, NodeId, RenderError, Renderer,
    RendererConfig, Runtime,
};

use crate::recording::{HostCall, RecordingHost};

/// Headless harness for exercising renders in tests.
///
/// `FiberTestRule` owns a renderer over a [`RecordingHost`] wrapping a
/// [`MemoryHost`], flushes every update to completion, and exposes the host
/// call journal for assertions about what a render actually mutated.
pub struct FiberTestRule {
    renderer: Renderer<RecordingHost<MemoryHost>>,
}

impl FiberTestRule {
    pub fn new() -> Self {
        Self::with_config(RendererConfig::default())
    }

    pub fn with_config(config: RendererConfig) -> Self {
        let host = RecordingHost::new(MemoryHost::new());
        let container = host.container();
        let runtime = Runtime::new(Arc::new(DefaultScheduler));
        Self {
            renderer: Renderer::with_config(host, container, runtime, config),
        }
    }

    /// Render `element` into the container and flush until idle.
    pub fn set_content(&mut self, element: Element) -> Result<(), RenderError> {
        self.renderer.render(element);
        self.pump_until_idle()
    }

    pub fn set_root(&mut self, component: Component) -> Result<(), RenderError> {
        self.renderer.render_root(component);
        self.pump_until_idle()
    }

    pub fn unmount(&mut self) -> Result<(), RenderError> {
        self.renderer.unmount();
        self.pump_until_idle()
    }

    /// Drive the renderer until no update or host command is pending.
    pub fn pump_until_idle(&mut self) -> Result<(), RenderError> {
        self.renderer.flush()
    }

    pub fn host(&self) -> &MemoryHost {
        self.renderer.host().inner()
    }

    /// Unrecorded access for simulating user input such as typing.
    pub fn host_mut(&mut self) -> &mut MemoryHost {
        self.renderer.host_mut().inner_mut()
    }

    pub fn calls(&self) -> &[HostCall] {
        self.renderer.host().calls()
    }

    pub fn take_calls(&mut self) -> Vec<HostCall> {
        self.renderer.host_mut().take_calls()
    }

    pub fn container(&self) -> NodeId {
        self.renderer.container()
    }

    /// Text content of the whole container.
    pub fn text(&self) -> String {
        self.host().text_content(self.container())
    }

    pub fn find(&self, tag: &str) -> Vec<NodeId> {
        self.host().find_by_tag(tag)
    }

    /// The only attached node with `tag`.
    pub fn single(&self, tag: &str) -> Option<NodeId> {
        match self.find(tag).as_slice() {
            [node] => Some(*node),
            _ => None,
        }
    }

    /// Text of each attached node with `tag`, in document order.
    pub fn texts_of(&self, tag: &str) -> Vec<String> {
        self.find(tag)
            .into_iter()
            .map(|node| self.host().text_content(node))
            .collect()
    }

    /// Dispatch a click on `node`, then flush the resulting updates.
    pub fn click(&mut self, node: NodeId) -> Result<bool, RenderError> {
        let handled = self.host().click(node);
        self.pump_until_idle()?;
        Ok(handled)
    }

    /// Type `text` into `node`, then flush the resulting updates.
    pub fn type_text(&mut self, node: NodeId, text: &str) -> Result<bool, RenderError> {
        let handled = self.host_mut().type_text(node, text);
        self.pump_until_idle()?;
        Ok(handled)
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.renderer.take_diagnostics()
    }

    /// Gain mutable access to the raw renderer for advanced scenarios.
    pub fn renderer(&mut self) -> &mut Renderer<RecordingHost<MemoryHost>> {
        &mut self.renderer
    }
}

impl Default for FiberTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `FiberTestRule`.
pub fn run_test_render<R>(f: impl FnOnce(&mut FiberTestRule) -> R) -> R {
    let mut rule = FiberTestRule::new();
    f(&mut rule)
}
