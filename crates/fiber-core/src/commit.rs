//! Commit phase: applies an effect-tagged generation to the host surface.

use crate::element::{PropValue, Props};
use crate::fiber::{EffectTag, FiberId, FiberKind};
use crate::host::{HostError, HostSurface, NodeId};
use crate::runtime::ActiveRuntimeGuard;
use crate::work_loop::{Phase, Renderer};

const INNER_HTML: &str = "dangerouslySetInnerHTML";

fn is_reserved(name: &str) -> bool {
    matches!(name, "key" | "children" | "nodeValue" | "ref")
}

/// Listener event for an `on<Event>` prop, or `None` for ordinary props.
fn event_name(name: &str, value: &PropValue) -> Option<String> {
    let rest = name.strip_prefix("on")?;
    if !rest.starts_with(|c: char| c.is_ascii_uppercase()) || value.as_handler().is_none() {
        return None;
    }
    let event = rest.to_ascii_lowercase();
    Some(if event == "change" { "input".into() } else { event })
}

fn host_property(name: &str) -> &str {
    if name == "className" {
        "class"
    } else {
        name
    }
}

fn log_host(result: Result<(), HostError>, op: &str) {
    if let Err(err) = result {
        log::error!("{op} failed: {err}");
    }
}

fn apply_prop(
    host: &mut dyn HostSurface,
    node: NodeId,
    name: &str,
    value: &PropValue,
    previous: Option<&PropValue>,
) {
    if let Some(event) = event_name(name, value) {
        if let Some(handler) = value.as_handler() {
            log_host(
                host.add_event_listener(node, &event, handler.clone()),
                "add_event_listener",
            );
        }
        return;
    }
    match name {
        "style" => {
            let next = value.as_map();
            if let Some(previous) = previous.and_then(PropValue::as_map) {
                for style in previous.keys() {
                    if next.map_or(true, |next| !next.contains_key(style)) {
                        log_host(host.remove_style(node, style), "remove_style");
                    }
                }
            }
            if let Some(next) = next {
                let previous = previous.and_then(PropValue::as_map);
                for (style, style_value) in next {
                    let unchanged = previous
                        .and_then(|previous| previous.get(style))
                        .is_some_and(|old| !old.changed(style_value));
                    if !unchanged {
                        log_host(
                            host.set_style(node, style, &style_value.to_host_string()),
                            "set_style",
                        );
                    }
                }
            }
        }
        INNER_HTML => {
            let html = value
                .as_map()
                .and_then(|map| map.get("__html"))
                .and_then(PropValue::as_str)
                .unwrap_or("");
            log_host(host.set_inner_html(node, html), "set_inner_html");
        }
        _ => log_host(
            host.set_property(node, host_property(name), value),
            "set_property",
        ),
    }
}

fn remove_prop(host: &mut dyn HostSurface, node: NodeId, name: &str, previous: &PropValue) {
    if let Some(event) = event_name(name, previous) {
        log_host(host.remove_event_listener(node, &event), "remove_event_listener");
        return;
    }
    match name {
        "style" => {
            if let Some(styles) = previous.as_map() {
                for style in styles.keys() {
                    log_host(host.remove_style(node, style), "remove_style");
                }
            }
        }
        INNER_HTML => log_host(host.set_inner_html(node, ""), "set_inner_html"),
        _ => log_host(
            host.remove_property(node, host_property(name)),
            "remove_property",
        ),
    }
}

/// Applies every mapped prop to a freshly created host node.
pub(crate) fn apply_initial_props(host: &mut dyn HostSurface, node: NodeId, props: &Props) {
    for (name, value) in &props.attrs {
        if !is_reserved(name) {
            apply_prop(host, node, name, value, None);
        }
    }
}

/// Diffs `previous` against `next` and applies the difference to `node`.
pub(crate) fn update_host_props(
    host: &mut dyn HostSurface,
    node: NodeId,
    previous: &Props,
    next: &Props,
) {
    // Stale listeners go first so a replaced handler never fires twice.
    for (name, old) in &previous.attrs {
        if let Some(event) = event_name(name, old) {
            if next.get(name).map_or(true, |new| old.changed(new)) {
                log_host(host.remove_event_listener(node, &event), "remove_event_listener");
            }
        }
    }
    for (name, old) in &previous.attrs {
        if is_reserved(name) || event_name(name, old).is_some() {
            continue;
        }
        if !next.attrs.contains_key(name) {
            remove_prop(host, node, name, old);
        }
    }
    for (name, value) in &next.attrs {
        if is_reserved(name) {
            continue;
        }
        let old = previous.get(name);
        if old.is_some_and(|old| !old.changed(value)) {
            continue;
        }
        apply_prop(host, node, name, value, old);
    }
}

impl<H: HostSurface> Renderer<H> {
    pub(crate) fn commit_root(&mut self) {
        let Some(root) = self.wip_root.take() else {
            return;
        };
        self.phase = Phase::Committing;
        log::debug!("commit: {} deletions", self.deletions.len());

        for old in std::mem::take(&mut self.deletions) {
            self.commit_deletion(old);
        }

        let mut cursor = self.fibers[root].child;
        while let Some(id) = cursor {
            self.commit_work(id);
            cursor = self.next_in_tree(root, id);
        }

        let retired = self.current_root.replace(root);
        if let Some(old_root) = retired {
            self.release_tree(old_root);
        }
        self.finalize_generation(root);
        self.phase = Phase::Idle;
        log::debug!("commit done; {} fibers live", self.fibers.len());

        self.flush_effects();
        self.run_host_commands();
    }

    /// Preorder successor of `id` inside the tree rooted at `root`.
    fn next_in_tree(&self, root: FiberId, id: FiberId) -> Option<FiberId> {
        if let Some(child) = self.fibers[id].child {
            return Some(child);
        }
        let mut node = id;
        loop {
            if node == root {
                return None;
            }
            if let Some(sibling) = self.fibers[node].sibling {
                return Some(sibling);
            }
            node = self.fibers[node].parent?;
        }
    }

    /// Severs `alternate` links and clears effect tags of the committed tree.
    fn finalize_generation(&mut self, root: FiberId) {
        let mut cursor = Some(root);
        while let Some(id) = cursor {
            let fiber = &mut self.fibers[id];
            fiber.alternate = None;
            fiber.effect = EffectTag::None;
            cursor = self.next_in_tree(root, id);
        }
    }

    fn commit_work(&mut self, id: FiberId) {
        match self.fibers[id].effect {
            EffectTag::Placement => {
                self.commit_placement(id);
                if self.fibers[id].alternate.is_some() {
                    self.commit_update(id);
                } else {
                    self.bind_ref(id);
                }
            }
            EffectTag::Update => self.commit_update(id),
            EffectTag::None | EffectTag::Delete => {}
        }
    }

    fn host_parent(&self, id: FiberId) -> Option<NodeId> {
        let mut cursor = self.fibers[id].parent;
        while let Some(parent) = cursor {
            let fiber = &self.fibers[parent];
            if fiber.kind.is_host_parent() {
                return fiber.host;
            }
            cursor = fiber.parent;
        }
        None
    }

    /// First host node after `id` in tree order that is already attached.
    fn host_sibling(&self, id: FiberId) -> Option<NodeId> {
        let mut node = id;
        'siblings: loop {
            loop {
                if let Some(sibling) = self.fibers[node].sibling {
                    node = sibling;
                    break;
                }
                let parent = self.fibers[node].parent?;
                if self.fibers[parent].kind.is_host_parent() {
                    return None;
                }
                node = parent;
            }
            loop {
                let fiber = &self.fibers[node];
                if fiber.effect == EffectTag::Placement {
                    continue 'siblings;
                }
                if fiber.kind.is_host_node() {
                    match fiber.host {
                        Some(host) => return Some(host),
                        None => continue 'siblings,
                    }
                }
                match fiber.child {
                    Some(child) => node = child,
                    None => continue 'siblings,
                }
            }
        }
    }

    fn commit_placement(&mut self, id: FiberId) {
        let Some(parent) = self.host_parent(id) else {
            log::error!("no host parent for `{}`; placement skipped", self.fibers[id].name());
            return;
        };
        let before = self.host_sibling(id);
        let fiber = &self.fibers[id];
        if fiber.kind.is_host_node() {
            if let Some(node) = fiber.host {
                log_host(self.host.insert_before(parent, node, before), "insert_before");
            }
            return;
        }
        // A moved component carries its attached host nodes along. Fresh
        // descendants are inserted when the walk reaches them.
        let mut stack: Vec<FiberId> = Vec::new();
        let mut cursor = fiber.child;
        while let Some(child) = cursor {
            stack.push(child);
            cursor = self.fibers[child].sibling;
        }
        stack.reverse();
        while let Some(child) = stack.pop() {
            let fiber = &self.fibers[child];
            if fiber.effect == EffectTag::Placement {
                continue;
            }
            if fiber.kind.is_host_node() {
                if let Some(node) = fiber.host {
                    log_host(self.host.insert_before(parent, node, before), "insert_before");
                }
                continue;
            }
            let mut grandchildren = Vec::new();
            let mut cursor = fiber.child;
            while let Some(grandchild) = cursor {
                grandchildren.push(grandchild);
                cursor = self.fibers[grandchild].sibling;
            }
            stack.extend(grandchildren.into_iter().rev());
        }
    }

    fn commit_update(&mut self, id: FiberId) {
        let fiber = &self.fibers[id];
        let Some(alternate) = fiber.alternate.and_then(|alt| self.fibers.get(alt)) else {
            return;
        };
        let Some(node) = fiber.host else {
            return;
        };
        match fiber.kind {
            FiberKind::Text => {
                if fiber.text() != alternate.text() {
                    let text = if self.config.nbsp_text {
                        fiber.text().replace(' ', "\u{a0}")
                    } else {
                        fiber.text().to_string()
                    };
                    log_host(self.host.set_text(node, &text), "set_text");
                }
            }
            FiberKind::Host => {
                let previous = std::rc::Rc::clone(&alternate.props);
                let next = std::rc::Rc::clone(&fiber.props);
                if !std::rc::Rc::ptr_eq(&previous, &next) && previous.changed(&next) {
                    update_host_props(&mut self.host, node, &previous, &next);
                }
                self.rebind_ref(id, &previous, &next);
            }
            _ => {}
        }
    }

    fn bind_ref(&self, id: FiberId) {
        let fiber = &self.fibers[id];
        if let (FiberKind::Host, Some(node)) = (fiber.kind, fiber.host) {
            if let Some(node_ref) = fiber.props.get("ref").and_then(PropValue::as_node_ref) {
                node_ref.bind(node);
            }
        }
    }

    fn rebind_ref(&self, id: FiberId, previous: &Props, next: &Props) {
        let Some(node) = self.fibers[id].host else {
            return;
        };
        let old = previous.get("ref").and_then(PropValue::as_node_ref);
        let new = next.get("ref").and_then(PropValue::as_node_ref);
        if old != new {
            if let Some(old) = old {
                old.unbind(node);
            }
        }
        if let Some(new) = new {
            new.bind(node);
        }
    }

    /// Releases everything owned by the old subtree at `old`, then detaches
    /// its top-level host nodes.
    fn commit_deletion(&mut self, old: FiberId) {
        log::trace!("delete {}", self.fibers[old].name());
        let mut stack = vec![old];
        let mut top_level = Vec::new();
        while let Some(id) = stack.pop() {
            let fiber = &self.fibers[id];
            for hook in &fiber.hooks {
                hook.run_cleanup();
            }
            if fiber.kind == FiberKind::Host {
                if let Some(node) = fiber.host {
                    for (name, value) in &fiber.props.attrs {
                        if let Some(event) = event_name(name, value) {
                            log_host(
                                self.host.remove_event_listener(node, &event),
                                "remove_event_listener",
                            );
                        }
                    }
                    if let Some(node_ref) = fiber.props.get("ref").and_then(PropValue::as_node_ref) {
                        node_ref.unbind(node);
                    }
                }
            }
            let nested_in_host = id != old && self.has_host_ancestor_within(id, old);
            if fiber.kind.is_host_node() && !nested_in_host {
                if let Some(node) = fiber.host {
                    top_level.push(node);
                }
            }
            let mut cursor = fiber.child;
            let mut children = Vec::new();
            while let Some(child) = cursor {
                children.push(child);
                cursor = self.fibers[child].sibling;
            }
            stack.extend(children.into_iter().rev());
        }

        let Some(parent) = self.host_parent(old) else {
            log::error!("no host parent for deleted `{}`", self.fibers[old].name());
            return;
        };
        for node in top_level {
            log_host(self.host.remove_child(parent, node), "remove_child");
        }
    }

    /// Whether a host fiber sits between `id` and `top` (exclusive of `id`).
    fn has_host_ancestor_within(&self, id: FiberId, top: FiberId) -> bool {
        let mut cursor = self.fibers[id].parent;
        while let Some(parent) = cursor {
            if self.fibers[parent].kind.is_host_node() {
                return true;
            }
            if parent == top {
                return false;
            }
            cursor = self.fibers[parent].parent;
        }
        false
    }

    /// Runs every stale cleanup, then every new effect body, in render order.
    fn flush_effects(&mut self) {
        if self.pending_effects.is_empty() {
            return;
        }
        let effects = std::mem::take(&mut self.pending_effects);
        log::debug!("flushing {} effects", effects.len());
        let handle = self.runtime.handle();
        let _active = ActiveRuntimeGuard::enter(&handle);
        for effect in &effects {
            effect.run_cleanup();
        }
        for effect in effects {
            effect.run();
        }
    }

    pub(crate) fn run_host_commands(&mut self) {
        for command in self.runtime.take_host_commands() {
            if let Err(err) = command(&mut self.host) {
                log::warn!("host command failed: {err}");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/commit_tests.rs"]
mod tests;
