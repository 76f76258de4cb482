use std::rc::Rc;

use slotmap::new_key_type;

use crate::component::{Fallback, FALLBACK_PROP};
use crate::element::{Element, ElementKind, Key, Props};
use crate::error::RenderError;
use crate::hooks::Hook;
use crate::host::NodeId;

new_key_type! {
    /// Handle of a fiber in the renderer's arena.
    pub struct FiberId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiberKind {
    HostRoot,
    Host,
    Text,
    Component,
    Provider,
}

impl FiberKind {
    fn of(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Host(_) => FiberKind::Host,
            ElementKind::Component(_) => FiberKind::Component,
            ElementKind::Text => FiberKind::Text,
            ElementKind::Provider(_) => FiberKind::Provider,
        }
    }

    /// Fibers that own a host node their children are inserted into.
    pub(crate) fn is_host_parent(self) -> bool {
        matches!(self, FiberKind::Host | FiberKind::HostRoot)
    }

    pub(crate) fn is_host_node(self) -> bool {
        matches!(self, FiberKind::Host | FiberKind::Text)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EffectTag {
    #[default]
    None,
    Placement,
    Update,
    Delete,
}

/// Identity of a child among its siblings. Explicit keys and positions
/// live in separate spaces, so key `"0"` never matches position 0.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SlotKey {
    Explicit(Key),
    Position(usize),
}

pub(crate) struct Fiber {
    pub(crate) kind: FiberKind,
    /// `None` only for the host root.
    pub(crate) ty: Option<ElementKind>,
    pub(crate) props: Rc<Props>,
    pub(crate) key: Option<Key>,
    pub(crate) slot: SlotKey,
    pub(crate) host: Option<NodeId>,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) effect: EffectTag,
    /// Position among siblings; read as the previous-generation index during reconcile.
    pub(crate) index: usize,
    pub(crate) context_changed: bool,
    pub(crate) boundary_error: Option<RenderError>,
    /// The component's last render returned an error; its output is unusable.
    pub(crate) render_failed: bool,
}

impl Fiber {
    pub(crate) fn root(container: NodeId, children: Vec<Element>) -> Self {
        Self {
            kind: FiberKind::HostRoot,
            ty: None,
            props: Rc::new(Props {
                children,
                ..Props::default()
            }),
            key: None,
            slot: SlotKey::Position(0),
            host: Some(container),
            hooks: Vec::new(),
            alternate: None,
            parent: None,
            child: None,
            sibling: None,
            effect: EffectTag::None,
            index: 0,
            context_changed: false,
            boundary_error: None,
            render_failed: false,
        }
    }

    pub(crate) fn from_element(element: &Element, slot: SlotKey) -> Self {
        Self {
            kind: FiberKind::of(&element.kind),
            ty: Some(element.kind.clone()),
            props: Rc::clone(&element.props),
            key: element.key.clone(),
            slot,
            host: None,
            hooks: Vec::new(),
            alternate: None,
            parent: None,
            child: None,
            sibling: None,
            effect: EffectTag::Placement,
            index: 0,
            context_changed: false,
            boundary_error: None,
            render_failed: false,
        }
    }

    /// New-generation twin of `old` carrying `element`'s props.
    pub(crate) fn adopt(old_id: FiberId, old: &Fiber, element: &Element, slot: SlotKey) -> Self {
        Self {
            kind: old.kind,
            ty: Some(element.kind.clone()),
            props: Rc::clone(&element.props),
            key: element.key.clone(),
            slot,
            host: old.host,
            hooks: old.hooks.clone(),
            alternate: Some(old_id),
            parent: None,
            child: None,
            sibling: None,
            effect: EffectTag::Update,
            index: 0,
            context_changed: false,
            boundary_error: old.boundary_error.clone(),
            render_failed: false,
        }
    }

    /// Verbatim copy of `old` for a bailed-out parent.
    pub(crate) fn clone_of(old_id: FiberId, old: &Fiber) -> Self {
        Self {
            kind: old.kind,
            ty: old.ty.clone(),
            props: Rc::clone(&old.props),
            key: old.key.clone(),
            slot: old.slot.clone(),
            host: old.host,
            hooks: old.hooks.clone(),
            alternate: Some(old_id),
            parent: None,
            child: None,
            sibling: None,
            effect: EffectTag::None,
            index: old.index,
            context_changed: false,
            boundary_error: old.boundary_error.clone(),
            render_failed: false,
        }
    }

    pub(crate) fn matches(&self, element: &Element) -> bool {
        self.ty
            .as_ref()
            .map(|ty| ty.same_type(&element.kind))
            .unwrap_or(false)
    }

    pub(crate) fn name(&self) -> &str {
        match &self.ty {
            Some(ty) => ty.name(),
            None => "#root",
        }
    }

    pub(crate) fn has_pending_update(&self) -> bool {
        self.hooks.iter().any(Hook::has_pending_update)
    }

    pub(crate) fn fallback(&self) -> Option<Rc<Fallback>> {
        match self.kind {
            FiberKind::Component => self.props.any::<Fallback>(FALLBACK_PROP),
            _ => None,
        }
    }

    pub(crate) fn text(&self) -> &str {
        self.props.str(crate::element::TEXT_VALUE).unwrap_or("")
    }
}
