use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use crate::element::{h, normalize_children, props, Child, Element, Props};
use crate::error::RenderError;

/// Output of a render function.
pub type Rendered = Result<Children, RenderError>;

/// A named render function.
///
/// Two components are the same type when they wrap the same function item or
/// closure definition, whatever the closure captured.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    id: TypeId,
    render: Rc<dyn Fn(&Props) -> Rendered>,
}

impl Component {
    pub fn new<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&Props) -> Rendered + 'static,
    {
        Self {
            name,
            id: TypeId::of::<F>(),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Props) -> Rendered {
        (self.render)(props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component").field("name", &self.name).finish()
    }
}

/// Shorthand for [`Component::new`].
pub fn component<F>(name: &'static str, render: F) -> Component
where
    F: Fn(&Props) -> Rendered + 'static,
{
    Component::new(name, render)
}

/// Normalized render output: one element, several, or nothing.
#[derive(Clone, Debug, Default)]
pub struct Children {
    pub(crate) elements: Vec<Element>,
    pub(crate) dynamic: bool,
}

impl Children {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub(crate) fn from_props(props: &Props) -> Self {
        Self {
            elements: props.children.clone(),
            dynamic: props.dynamic_children,
        }
    }
}

impl From<Element> for Children {
    fn from(element: Element) -> Self {
        Self {
            elements: vec![element],
            dynamic: false,
        }
    }
}

impl From<Vec<Element>> for Children {
    fn from(elements: Vec<Element>) -> Self {
        Self {
            elements,
            dynamic: true,
        }
    }
}

impl From<Option<Element>> for Children {
    fn from(element: Option<Element>) -> Self {
        Self {
            elements: element.into_iter().collect(),
            dynamic: false,
        }
    }
}

impl From<Vec<Child>> for Children {
    fn from(children: Vec<Child>) -> Self {
        let (elements, dynamic) = normalize_children(children);
        Self { elements, dynamic }
    }
}

impl From<&[Element]> for Children {
    fn from(elements: &[Element]) -> Self {
        Self {
            elements: elements.to_vec(),
            dynamic: false,
        }
    }
}

pub(crate) const FALLBACK_PROP: &str = "renderFallback";

/// Renders a replacement for a subtree whose component failed.
#[derive(Clone)]
pub struct Fallback(Rc<dyn Fn(&RenderError) -> Children>);

impl Fallback {
    pub fn new(render: impl Fn(&RenderError) -> Children + 'static) -> Self {
        Self(Rc::new(render))
    }

    pub fn render(&self, error: &RenderError) -> Children {
        (self.0)(error)
    }
}

fn boundary_body(props: &Props) -> Rendered {
    Ok(Children::from_props(props))
}

/// Wraps `children` in an error boundary.
///
/// When a descendant component fails, the boundary records the error and
/// renders `fallback(&error)` from the next pass on.
pub fn error_boundary(
    fallback: impl Fn(&RenderError) -> Children + 'static,
    children: Vec<Child>,
) -> Element {
    h(
        Component::new("ErrorBoundary", boundary_body),
        props().any(FALLBACK_PROP, Fallback::new(fallback)),
        children,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::text;

    fn first(_: &Props) -> Rendered {
        Ok(Children::none())
    }

    fn second(_: &Props) -> Rendered {
        Ok(Children::none())
    }

    #[test]
    fn component_identity_follows_the_render_function() {
        let a = Component::new("First", first);
        let b = Component::new("First", first);
        let c = Component::new("Second", second);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn closures_from_one_site_share_identity() {
        let make = |label: &'static str| {
            Component::new("Label", move |_: &Props| Ok(Children::from(text(label))))
        };
        assert_eq!(make("a"), make("b"));
    }

    #[test]
    fn render_error_is_tagged_with_component_name() {
        let err = RenderError::failed("boom").in_component("Widget");
        assert_eq!(
            err,
            RenderError::Component {
                component: "Widget".into(),
                message: "boom".into()
            }
        );
        assert_eq!(err.to_string(), "component `Widget` failed: boom");
    }

    #[test]
    fn error_boundary_carries_fallback_prop() {
        let boundary = error_boundary(|_| Children::none(), crate::children!["child"]);
        assert!(boundary.props.any::<Fallback>(FALLBACK_PROP).is_some());
        assert_eq!(boundary.props.children.len(), 1);
    }
}
