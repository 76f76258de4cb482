//! The host surface the commit phase mutates, plus an in-memory implementation.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::element::PropValue;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Missing { id: NodeId },
    NotAChild { parent: NodeId, child: NodeId },
    Unsupported { op: &'static str },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { id } => write!(f, "host node {id} missing"),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::Unsupported { op } => write!(f, "host does not support {op}"),
        }
    }
}

impl std::error::Error for HostError {}

/// Event delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
    /// Current value of the target for input-like events.
    pub value: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Listener registered on a host node. Compared by identity.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

/// Primitive operations of the rendering target.
///
/// The renderer assumes nothing beyond "synchronous and idempotent". Failing
/// operations are logged by the commit phase and skipped.
pub trait HostSurface {
    fn create_node(&mut self, tag: &str) -> NodeId;
    fn create_text_node(&mut self, text: &str) -> NodeId;
    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), HostError>;
    fn set_property(&mut self, node: NodeId, name: &str, value: &PropValue)
        -> Result<(), HostError>;
    fn remove_property(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;
    fn set_style(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError>;
    fn remove_style(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;
    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), HostError>;
    fn add_event_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError>;
    fn remove_event_listener(&mut self, node: NodeId, event: &str) -> Result<(), HostError>;
    /// Insert `child` into `parent` before `before`, or append when `before` is `None`.
    /// A child that already has a parent is moved.
    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError>;

    fn focus(&mut self, _node: NodeId) -> Result<(), HostError> {
        Err(HostError::Unsupported { op: "focus" })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemoryNodeKind {
    Element(String),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub kind: MemoryNodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub properties: IndexMap<String, PropValue>,
    pub styles: IndexMap<String, String>,
    pub listeners: IndexMap<String, EventHandler>,
    pub inner_html: Option<String>,
}

impl MemoryNode {
    fn new(kind: MemoryNodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            properties: IndexMap::new(),
            styles: IndexMap::new(),
            listeners: IndexMap::new(),
            inner_html: None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            MemoryNodeKind::Element(tag) => Some(tag),
            MemoryNodeKind::Text(_) => None,
        }
    }
}

/// In-memory document tree used by tests and the demo.
///
/// Node `0` is the container passed to [`Renderer::new`](crate::Renderer::new).
/// Detached nodes stay addressable until the host is dropped.
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    focused: Option<NodeId>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            nodes: vec![MemoryNode::new(MemoryNodeKind::Element("#root".into()))],
            focused: None,
        }
    }

    pub fn container(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, HostError> {
        self.nodes.get_mut(id).ok_or(HostError::Missing { id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<&PropValue> {
        self.nodes.get(id)?.properties.get(name)
    }

    pub fn style(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(id)?.styles.get(name).map(String::as_str)
    }

    pub fn has_listener(&self, id: NodeId, event: &str) -> bool {
        self.nodes
            .get(id)
            .map(|node| node.listeners.contains_key(event))
            .unwrap_or(false)
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Concatenated text of every text node below `id`, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            MemoryNodeKind::Text(text) => out.push_str(text),
            MemoryNodeKind::Element(_) => {
                if let Some(html) = &node.inner_html {
                    out.push_str(html);
                }
                for &child in &node.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Depth-first search for attached elements with the given tag.
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.container()];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.tag() == Some(tag) {
                found.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    pub fn dump_tree(&self, root: Option<NodeId>) -> String {
        let mut output = String::new();
        if let Some(root_id) = root {
            self.dump_node(&mut output, root_id, 0);
        } else {
            output.push_str("(no root)\n");
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.nodes.get(id) {
            Some(node) => {
                match &node.kind {
                    MemoryNodeKind::Element(tag) => {
                        output.push_str(&format!("{indent}[{id}] <{tag}>"));
                        for (name, value) in &node.properties {
                            output.push_str(&format!(" {name}={value:?}"));
                        }
                        output.push('\n');
                    }
                    MemoryNodeKind::Text(text) => {
                        output.push_str(&format!("{indent}[{id}] {text:?}\n"));
                    }
                }
                for &child in &node.children {
                    self.dump_node(output, child, depth + 1);
                }
            }
            None => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }

    /// Invoke the listener registered for `event` on `target`, if any.
    /// Returns whether a listener ran.
    pub fn dispatch_event(&self, target: NodeId, event: Event) -> bool {
        let handler = self
            .nodes
            .get(target)
            .and_then(|node| node.listeners.get(&event.name))
            .cloned();
        match handler {
            Some(handler) => {
                handler.call(&event);
                true
            }
            None => {
                log::debug!("no `{}` listener on node {target}", event.name);
                false
            }
        }
    }

    pub fn click(&self, target: NodeId) -> bool {
        self.dispatch_event(target, Event::new("click", target))
    }

    /// Simulate typing into an input: updates its `value` and fires `input`.
    pub fn type_text(&mut self, target: NodeId, text: &str) -> bool {
        if let Ok(node) = self.node_mut(target) {
            node.properties
                .insert("value".into(), PropValue::Str(Rc::from(text)));
        }
        self.dispatch_event(target, Event::new("input", target).with_value(text))
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes.get(child).and_then(|node| node.parent) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|&c| c != child);
            }
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
    }
}

impl HostSurface for MemoryHost {
    fn create_node(&mut self, tag: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes
            .push(MemoryNode::new(MemoryNodeKind::Element(tag.to_string())));
        id
    }

    fn create_text_node(&mut self, text: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes
            .push(MemoryNode::new(MemoryNodeKind::Text(text.to_string())));
        id
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), HostError> {
        let entry = self.node_mut(node)?;
        match &mut entry.kind {
            MemoryNodeKind::Text(value) => {
                *value = text.to_string();
                Ok(())
            }
            MemoryNodeKind::Element(_) => Err(HostError::Unsupported {
                op: "set_text on element",
            }),
        }
    }

    fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        self.node_mut(node)?
            .properties
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn remove_property(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.node_mut(node)?.properties.shift_remove(name);
        Ok(())
    }

    fn set_style(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        self.node_mut(node)?
            .styles
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_style(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.node_mut(node)?.styles.shift_remove(name);
        Ok(())
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), HostError> {
        self.node_mut(node)?.inner_html = Some(html.to_string());
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError> {
        self.node_mut(node)?
            .listeners
            .insert(event.to_string(), handler);
        Ok(())
    }

    fn remove_event_listener(&mut self, node: NodeId, event: &str) -> Result<(), HostError> {
        self.node_mut(node)?.listeners.shift_remove(event);
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), HostError> {
        if parent >= self.nodes.len() {
            return Err(HostError::Missing { id: parent });
        }
        if child >= self.nodes.len() {
            return Err(HostError::Missing { id: child });
        }
        if let Some(reference) = before {
            let Some(node) = self.nodes.get(reference) else {
                return Err(HostError::Missing { id: reference });
            };
            if node.parent != Some(parent) {
                return Err(HostError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }
        self.detach(child);
        let siblings = &mut self.nodes[parent].children;
        let position = before
            .and_then(|reference| siblings.iter().position(|&c| c == reference))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.nodes[child].parent = Some(parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        let node = self.nodes.get(child).ok_or(HostError::Missing { id: child })?;
        if node.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.detach(child);
        if self.focused == Some(child) {
            self.focused = None;
        }
        Ok(())
    }

    fn focus(&mut self, node: NodeId) -> Result<(), HostError> {
        if node >= self.nodes.len() {
            return Err(HostError::Missing { id: node });
        }
        self.focused = Some(node);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
