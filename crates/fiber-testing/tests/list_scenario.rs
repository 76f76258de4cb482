use fiber_core::{
    children, h, props, schedule_host_update, use_effect, use_ref, use_state, Children, Component,
    Deps, Element, Event, HostSurface, MemoryHost, NodeId, NodeRef, Props, Renderer,
};
use fiber_runtime_std::StdRuntime;
use fiber_testing::{FiberTestRule, HostCall, RecordingHost};

fn fruit_list() -> Component {
    Component::new("FruitList", |_: &Props| {
        let (items, set_items) = use_state(|| {
            vec!["Apple".to_string(), "Banana".to_string(), "Cherry".to_string()]
        });
        let (draft, set_draft) = use_state(String::new);
        let input: NodeRef = use_ref(None);

        let focus_target = input.clone();
        use_effect(Deps::of(&items.len()), move || {
            schedule_host_update(move |host| match focus_target.node() {
                Some(node) => host.focus(node),
                None => Ok(()),
            });
        });

        let reverse = {
            let set_items = set_items.clone();
            move |_: &Event| set_items.update(|items| items.iter().rev().cloned().collect())
        };
        let remove_banana = {
            let set_items = set_items.clone();
            move |_: &Event| {
                set_items.update(|items| items.iter().filter(|i| *i != "Banana").cloned().collect())
            }
        };
        let edit = {
            let set_draft = set_draft.clone();
            move |event: &Event| set_draft.set(event.value.clone().unwrap_or_default())
        };
        let add = {
            let draft = draft.clone();
            move |_: &Event| {
                if draft.is_empty() {
                    return;
                }
                let item = draft.clone();
                set_items.update(move |items| {
                    let mut next = items.clone();
                    next.push(item);
                    next
                });
                set_draft.set(String::new());
            }
        };

        let rows: Vec<Element> = items
            .iter()
            .map(|item| h("li", props().key(item.as_str()), children![item]))
            .collect();
        Ok(Children::from(h(
            "div",
            props().class("fruits"),
            children![
                h("ul", props(), children![rows]),
                h(
                    "input",
                    props()
                        .attr("value", draft.as_str())
                        .on("change", edit)
                        .node_ref(&input),
                    children![],
                ),
                h("button", props().on("click", add), children!["Add"]),
                h("button", props().on("click", reverse), children!["Reverse"]),
                h("button", props().on("click", remove_banana), children!["Remove Banana"]),
            ],
        )))
    })
}

fn button(rule: &FiberTestRule, label: &str) -> NodeId {
    rule.find("button")
        .into_iter()
        .find(|&node| rule.host().text_content(node) == label)
        .unwrap_or_else(|| panic!("no `{label}` button"))
}

#[test]
fn fruit_list_reverse_remove_and_add() {
    let mut rule = FiberTestRule::new();
    rule.set_root(fruit_list()).unwrap();
    assert_eq!(rule.texts_of("li"), ["Apple", "Banana", "Cherry"]);
    let input = rule.single("input").unwrap();
    assert_eq!(rule.host().focused(), Some(input));

    let reverse = button(&rule, "Reverse");
    rule.click(reverse).unwrap();
    assert_eq!(rule.texts_of("li"), ["Cherry", "Banana", "Apple"]);

    rule.click(reverse).unwrap();
    let remove = button(&rule, "Remove Banana");
    rule.click(remove).unwrap();
    assert_eq!(rule.texts_of("li"), ["Apple", "Cherry"]);

    rule.type_text(input, "Date").unwrap();
    assert_eq!(
        rule.host().property(input, "value").and_then(|v| v.as_str()),
        Some("Date")
    );

    let add = button(&rule, "Add");
    rule.host_mut().focus(add).unwrap();
    rule.take_calls();
    rule.click(add).unwrap();

    assert_eq!(rule.texts_of("li"), ["Apple", "Cherry", "Date"]);
    assert_eq!(
        rule.host().property(input, "value").and_then(|v| v.as_str()),
        Some("")
    );
    assert_eq!(rule.host().focused(), Some(input));
    assert!(matches!(rule.calls().last(), Some(HostCall::Focus { node }) if *node == input));
}

#[test]
fn empty_draft_adds_nothing() {
    let mut rule = FiberTestRule::new();
    rule.set_root(fruit_list()).unwrap();
    let add = button(&rule, "Add");
    rule.take_calls();
    rule.click(add).unwrap();
    assert_eq!(rule.texts_of("li"), ["Apple", "Banana", "Cherry"]);
    assert!(rule.calls().is_empty());
}

#[test]
fn std_runtime_drives_the_list_in_budgeted_slices() {
    let runtime = StdRuntime::new();
    let host = RecordingHost::new(MemoryHost::new());
    let container = host.container();
    let mut renderer = Renderer::new(host, container, runtime.runtime());
    renderer.render_root(fruit_list());
    let slices = runtime.run_pending(&mut renderer).unwrap();
    assert!(slices >= 1);

    let items: Vec<String> = renderer
        .host()
        .find_by_tag("li")
        .into_iter()
        .map(|node| renderer.host().text_content(node))
        .collect();
    assert_eq!(items, ["Apple", "Banana", "Cherry"]);
    assert!(renderer.is_idle());
    assert!(!runtime.take_work_request());
}
