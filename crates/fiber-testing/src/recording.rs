//! Host surface wrapper that journals every call it forwards.

use std::ops::Deref;

use fiber_core::{EventHandler, HostError, HostSurface, NodeId, PropValue};

/// One call made on a [`RecordingHost`], in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    CreateNode { tag: String, node: NodeId },
    CreateText { text: String, node: NodeId },
    SetText { node: NodeId, text: String },
    SetProperty { node: NodeId, name: String, value: PropValue },
    RemoveProperty { node: NodeId, name: String },
    SetStyle { node: NodeId, name: String, value: String },
    RemoveStyle { node: NodeId, name: String },
    SetInnerHtml { node: NodeId, html: String },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
    InsertBefore {
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    },
    RemoveChild { parent: NodeId, child: NodeId },
    Focus { node: NodeId },
}

impl HostCall {
    /// Calls that change the attached tree's shape.
    pub fn is_structural(&self) -> bool {
        matches!(self, HostCall::InsertBefore { .. } | HostCall::RemoveChild { .. })
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, HostCall::InsertBefore { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, HostCall::RemoveChild { .. })
    }
}

/// Wraps a host surface and records a [`HostCall`] for every operation,
/// whether or not the inner host accepted it.
pub struct RecordingHost<H> {
    inner: H,
    calls: Vec<HostCall>,
}

impl<H: HostSurface> RecordingHost<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            calls: Vec::new(),
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Mutable access that bypasses the journal, for simulating user input.
    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, predicate: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.iter().filter(|&call| predicate(call)).count()
    }

    fn record<R>(&mut self, call: HostCall, result: R) -> R {
        self.calls.push(call);
        result
    }
}

impl<H> Deref for RecordingHost<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.inner
    }
}

impl<H: HostSurface> HostSurface for RecordingHost<H> {
    fn create_node(&mut self, tag: &str) -> NodeId {
        let node = self.inner.create_node(tag);
        self.record(
            HostCall::CreateNode {
                tag: tag.to_string(),
                node,
            },
            node,
        )
    }

    fn create_text_node(&mut self, text: &str) -> NodeId {
        let node = self.inner.create_text_node(text);
        self.record(
            HostCall::CreateText {
                text: text.to_string(),
                node,
            },
            node,
        )
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), HostError> {
        let result = self.inner.set_text(node, text);
        self.record(
            HostCall::SetText {
                node,
                text: text.to_string(),
            },
            result,
        )
    }

    fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        let result = self.inner.set_property(node, name, value);
        self.record(
            HostCall::SetProperty {
                node,
                name: name.to_string(),
                value: value.clone(),
            },
            result,
        )
    }

    fn remove_property(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        let result = self.inner.remove_property(node, name);
        self.record(
            HostCall::RemoveProperty {
                node,
                name: name.to_string(),
            },
            result,
        )
    }

    fn set_style(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        let result = self.inner.set_style(node, name, value);
        self.record(
            HostCall::SetStyle {
                node,
                name: name.to_string(),
                value: value.to_string(),
            },
            result,
        )
    }

    fn remove_style(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        let result = self.inner.remove_style(node, name);
        self.record(
            HostCall::RemoveStyle {
                node,
                name: name.to_string(),
            },
            result,
        )
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), HostError> {
        let result = self.inner.set_inner_html(node, html);
        self.record(
            HostCall::SetInnerHtml {
                node,
                html: html.to_string(),
            },
            result,
        )
    }

    fn add_event_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError> {
        let result = self.inner.add_event_listener(node, event, handler);
        self.record(
            HostCall::AddListener {
                node,
                event: event.to_string(),
            },
            result,
        )
    }

    fn remove_event_listener(&mut self, node: NodeId, event: &str) -> Result<(), HostError> {
        let result = self.inner.remove_event_listener(node, event);
        self.record(
            HostCall::RemoveListener {
                node,
                event: event.to_string(),
            },
            result,
        )
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), HostError> {
        let result = self.inner.insert_before(parent, child, before);
        self.record(
            HostCall::InsertBefore {
                parent,
                child,
                before,
            },
            result,
        )
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        let result = self.inner.remove_child(parent, child);
        self.record(HostCall::RemoveChild { parent, child }, result)
    }

    fn focus(&mut self, node: NodeId) -> Result<(), HostError> {
        let result = self.inner.focus(node);
        self.record(HostCall::Focus { node }, result)
    }
}

#[cfg(test)]
mod tests {
    use fiber_core::MemoryHost;

    use super::*;

    #[test]
    fn records_calls_in_order_including_failures() {
        let mut host = RecordingHost::new(MemoryHost::new());
        let root = host.container();
        let li = host.create_node("li");
        host.insert_before(root, li, None).unwrap();
        assert!(host.remove_child(li, root).is_err());

        assert_eq!(
            host.calls(),
            &[
                HostCall::CreateNode {
                    tag: "li".into(),
                    node: li
                },
                HostCall::InsertBefore {
                    parent: root,
                    child: li,
                    before: None
                },
                HostCall::RemoveChild {
                    parent: li,
                    child: root
                },
            ]
        );
        assert_eq!(host.count(HostCall::is_structural), 2);
        assert_eq!(host.take_calls().len(), 3);
        assert!(host.calls().is_empty());
        assert_eq!(host.children(root), &[li]);
    }
}
