//! Immutable element descriptions and the hyperscript constructor.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::component::Component;
use crate::context::ProviderMarker;
use crate::host::{Event, EventHandler};
use crate::refs::NodeRef;

/// Explicit identity hint for an element among its siblings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Key {
    fn from(value: Rc<str>) -> Self {
        Key::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value as i64)
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

impl From<&Key> for PropValue {
    fn from(key: &Key) -> Self {
        match key {
            Key::Str(s) => PropValue::Str(s.clone()),
            Key::Int(n) => PropValue::Int(*n),
        }
    }
}

/// Dynamically typed prop value.
#[derive(Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[PropValue]>),
    Map(Rc<IndexMap<String, PropValue>>),
    Handler(EventHandler),
    Ref(NodeRef),
    Any(Rc<dyn Any>),
}

impl PropValue {
    /// Deep inequality. Scalars compare by value, lists and maps structurally,
    /// handlers, refs and opaque values by identity.
    pub fn changed(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => false,
            (PropValue::Bool(a), PropValue::Bool(b)) => a != b,
            (PropValue::Int(a), PropValue::Int(b)) => a != b,
            (PropValue::Float(a), PropValue::Float(b)) => a.to_bits() != b.to_bits(),
            (PropValue::Str(a), PropValue::Str(b)) => a != b,
            (PropValue::List(a), PropValue::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return false;
                }
                a.len() != b.len() || a.iter().zip(b.iter()).any(|(x, y)| x.changed(y))
            }
            (PropValue::Map(a), PropValue::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return false;
                }
                a.len() != b.len()
                    || a.iter().any(|(name, x)| match b.get(name) {
                        Some(y) => x.changed(y),
                        None => true,
                    })
            }
            (PropValue::Handler(a), PropValue::Handler(b)) => a != b,
            (PropValue::Ref(a), PropValue::Ref(b)) => a != b,
            (PropValue::Any(a), PropValue::Any(b)) => !Rc::ptr_eq(a, b),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, PropValue>> {
        match self {
            PropValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_node_ref(&self) -> Option<&NodeRef> {
        match self {
            PropValue::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            PropValue::Any(value) => Rc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// String form used for style values and text content.
    pub fn to_host_string(&self) -> String {
        match self {
            PropValue::Null => String::new(),
            PropValue::Bool(b) => b.to_string(),
            PropValue::Int(n) => n.to_string(),
            PropValue::Float(x) => x.to_string(),
            PropValue::Str(s) => s.to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        !self.changed(other)
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("null"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(n) => write!(f, "{n}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Str(s) => write!(f, "{s:?}"),
            PropValue::List(items) => f.debug_list().entries(items.iter()).finish(),
            PropValue::Map(map) => f.debug_map().entries(map.iter()).finish(),
            PropValue::Handler(_) => f.write_str("<handler>"),
            PropValue::Ref(_) => f.write_str("<ref>"),
            PropValue::Any(_) => f.write_str("<any>"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

impl From<NodeRef> for PropValue {
    fn from(value: NodeRef) -> Self {
        PropValue::Ref(value)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(value: Vec<PropValue>) -> Self {
        PropValue::List(Rc::from(value))
    }
}

impl From<IndexMap<String, PropValue>> for PropValue {
    fn from(value: IndexMap<String, PropValue>) -> Self {
        PropValue::Map(Rc::new(value))
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(PropValue::Null)
    }
}

/// Props of one element: ordered attributes plus normalized children.
#[derive(Clone, Debug, Default)]
pub struct Props {
    pub attrs: IndexMap<String, PropValue>,
    pub children: Vec<Element>,
    /// Children included at least one nested list (a mapped collection).
    pub dynamic_children: bool,
}

impl Props {
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attrs.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }

    pub fn handler(&self, name: &str) -> Option<&EventHandler> {
        self.get(name).and_then(PropValue::as_handler)
    }

    pub fn any<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name).and_then(PropValue::downcast::<T>)
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn changed(&self, other: &Props) -> bool {
        if self.attrs.len() != other.attrs.len() || self.children.len() != other.children.len() {
            return true;
        }
        let attrs_changed = self.attrs.iter().any(|(name, value)| match other.attrs.get(name) {
            Some(other_value) => value.changed(other_value),
            None => true,
        });
        attrs_changed
            || self
                .children
                .iter()
                .zip(other.children.iter())
                .any(|(a, b)| a != b)
    }
}

/// What an element instantiates.
#[derive(Clone)]
pub enum ElementKind {
    Host(Rc<str>),
    Component(Component),
    Text,
    Provider(ProviderMarker),
}

impl ElementKind {
    pub fn same_type(&self, other: &ElementKind) -> bool {
        match (self, other) {
            (ElementKind::Host(a), ElementKind::Host(b)) => a == b,
            (ElementKind::Component(a), ElementKind::Component(b)) => a == b,
            (ElementKind::Text, ElementKind::Text) => true,
            (ElementKind::Provider(a), ElementKind::Provider(b)) => a == b,
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ElementKind::Host(tag) => tag,
            ElementKind::Component(component) => component.name(),
            ElementKind::Text => "#text",
            ElementKind::Provider(_) => "#provider",
        }
    }
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Host(tag) => write!(f, "Host({tag})"),
            ElementKind::Component(component) => write!(f, "Component({})", component.name()),
            ElementKind::Text => f.write_str("Text"),
            ElementKind::Provider(marker) => write!(f, "Provider({:?})", marker.id()),
        }
    }
}

impl From<&str> for ElementKind {
    fn from(tag: &str) -> Self {
        ElementKind::Host(Rc::from(tag))
    }
}

impl From<String> for ElementKind {
    fn from(tag: String) -> Self {
        ElementKind::Host(Rc::from(tag))
    }
}

impl From<Component> for ElementKind {
    fn from(component: Component) -> Self {
        ElementKind::Component(component)
    }
}

impl From<&Component> for ElementKind {
    fn from(component: &Component) -> Self {
        ElementKind::Component(component.clone())
    }
}

impl From<ProviderMarker> for ElementKind {
    fn from(marker: ProviderMarker) -> Self {
        ElementKind::Provider(marker)
    }
}

#[derive(Clone)]
pub struct Element {
    pub kind: ElementKind,
    pub props: Rc<Props>,
    pub key: Option<Key>,
}

impl Element {
    pub fn text_value(&self) -> Option<&str> {
        match self.kind {
            ElementKind::Text => self.props.str(TEXT_VALUE),
            _ => None,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.kind.same_type(&other.kind)
            && self.key == other.key
            && (Rc::ptr_eq(&self.props, &other.props) || !self.props.changed(&other.props))
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Element");
        s.field("kind", &self.kind);
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        if let Some(text) = self.text_value() {
            s.field("text", &text);
        } else {
            s.field("attrs", &self.props.attrs);
            s.field("children", &self.props.children);
        }
        s.finish()
    }
}

pub(crate) const TEXT_VALUE: &str = "nodeValue";

/// Input accepted by the constructor before normalization.
pub enum Child {
    Element(Element),
    Text(Rc<str>),
    Empty,
    List(Vec<Child>),
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Child::Text(Rc::from(value))
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Child::Text(Rc::from(value))
    }
}

impl From<&String> for Child {
    fn from(value: &String) -> Self {
        Child::Text(Rc::from(value.as_str()))
    }
}

impl From<Rc<str>> for Child {
    fn from(value: Rc<str>) -> Self {
        Child::Text(value)
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Text(Rc::from(value.to_string()))
    }
}

impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Child::Text(Rc::from(value.to_string()))
    }
}

impl From<usize> for Child {
    fn from(value: usize) -> Self {
        Child::Text(Rc::from(value.to_string()))
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Text(Rc::from(value.to_string()))
    }
}

/// Booleans render nothing, like `cond && <x/>`.
impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Child::Empty)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(values: Vec<T>) -> Self {
        Child::List(values.into_iter().map(Into::into).collect())
    }
}

/// Builds a `Vec<Child>` from heterogeneous values.
#[macro_export]
macro_rules! children {
    () => { ::std::vec::Vec::<$crate::Child>::new() };
    ($($child:expr),+ $(,)?) => {
        ::std::vec![$($crate::Child::from($child)),+]
    };
}

/// Flattens nested lists, drops empty children and wraps text.
/// Returns whether a nested list was encountered.
pub(crate) fn normalize_children(children: Vec<Child>) -> (Vec<Element>, bool) {
    fn walk(child: Child, depth: usize, out: &mut Vec<Element>, dynamic: &mut bool) {
        match child {
            Child::Element(element) => out.push(element),
            Child::Text(value) => out.push(text(value)),
            Child::Empty => {}
            Child::List(items) => {
                if depth > 0 {
                    *dynamic = true;
                }
                for item in items {
                    walk(item, depth + 1, out, dynamic);
                }
            }
        }
    }

    let mut out = Vec::with_capacity(children.len());
    let mut dynamic = false;
    walk(Child::List(children), 0, &mut out, &mut dynamic);
    (out, dynamic)
}

/// Text element carrying `value` in its `nodeValue` prop.
pub fn text(value: impl Into<Rc<str>>) -> Element {
    let mut attrs = IndexMap::with_capacity(1);
    attrs.insert(TEXT_VALUE.to_string(), PropValue::Str(value.into()));
    Element {
        kind: ElementKind::Text,
        props: Rc::new(Props {
            attrs,
            children: Vec::new(),
            dynamic_children: false,
        }),
        key: None,
    }
}

/// Hyperscript constructor.
///
/// Lowercase string tags become host elements; components and providers
/// are passed as their own types. `children` is flattened and normalized.
pub fn h(kind: impl Into<ElementKind>, props: PropsBuilder, children: Vec<Child>) -> Element {
    let (children, dynamic_children) = normalize_children(children);
    let PropsBuilder { attrs, key } = props;
    Element {
        kind: kind.into(),
        props: Rc::new(Props {
            attrs,
            children,
            dynamic_children,
        }),
        key,
    }
}

pub fn props() -> PropsBuilder {
    PropsBuilder::default()
}

#[derive(Default)]
pub struct PropsBuilder {
    attrs: IndexMap<String, PropValue>,
    key: Option<Key>,
}

impl PropsBuilder {
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Sets the element key. The key also stays in the attribute map.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        let key = key.into();
        self.attrs.insert("key".into(), PropValue::from(&key));
        self.key = Some(key);
        self
    }

    pub fn class(self, class_name: impl Into<PropValue>) -> Self {
        self.attr("className", class_name)
    }

    /// Registers `handler` under `on<Event>`, e.g. `.on("click", ..)` sets `onClick`.
    pub fn on(self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.handler(event, EventHandler::new(handler))
    }

    pub fn handler(self, event: &str, handler: EventHandler) -> Self {
        let mut chars = event.chars();
        let name = match chars.next() {
            Some(first) => format!("on{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => "on".to_string(),
        };
        self.attr(name, PropValue::Handler(handler))
    }

    pub fn style(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let entry = self
            .attrs
            .entry("style".to_string())
            .or_insert_with(|| PropValue::Map(Rc::new(IndexMap::new())));
        if !matches!(entry, PropValue::Map(_)) {
            *entry = PropValue::Map(Rc::new(IndexMap::new()));
        }
        if let PropValue::Map(map) = entry {
            Rc::make_mut(map).insert(name.into(), value.into());
        }
        self
    }

    pub fn node_ref(self, node_ref: &NodeRef) -> Self {
        self.attr("ref", PropValue::Ref(node_ref.clone()))
    }

    /// Injects markup directly; children of the element are not reconciled.
    pub fn inner_html(self, html: impl Into<String>) -> Self {
        let mut map = IndexMap::with_capacity(1);
        map.insert("__html".to_string(), PropValue::from(html.into()));
        self.attr("dangerouslySetInnerHTML", PropValue::Map(Rc::new(map)))
    }

    /// Stores an arbitrary value, compared by identity.
    pub fn any<T: 'static>(self, name: impl Into<String>, value: T) -> Self {
        self.attr(name, PropValue::Any(Rc::new(value)))
    }
}

#[cfg(test)]
#[path = "tests/element_tests.rs"]
mod tests;
