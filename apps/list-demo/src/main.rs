use fiber_core::{
    children, h, props, schedule_host_update, use_effect, use_ref, use_state, Children, Component,
    Deps, Element, Event, HostSurface, MemoryHost, NodeId, NodeRef, Props, RenderError, Renderer,
};
use fiber_runtime_std::StdRuntime;

fn fruit_list() -> Component {
    Component::new("FruitList", |_: &Props| {
        let (items, set_items) = use_state(|| {
            vec!["Apple".to_string(), "Banana".to_string(), "Cherry".to_string()]
        });
        let (draft, set_draft) = use_state(String::new);
        let input: NodeRef = use_ref(None);

        let focus_target = input.clone();
        use_effect(Deps::of(&items.len()), move || {
            log::info!("list changed, focusing the input");
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

fn find_button(host: &MemoryHost, label: &str) -> Option<NodeId> {
    host.find_by_tag("button")
        .into_iter()
        .find(|&node| host.text_content(node) == label)
}

fn click(
    runtime: &StdRuntime,
    renderer: &mut Renderer<MemoryHost>,
    label: &str,
) -> Result<(), RenderError> {
    match find_button(renderer.host(), label) {
        Some(button) => {
            println!("> click {label}");
            renderer.host().click(button);
            let slices = runtime.run_pending(renderer)?;
            log::debug!("`{label}` settled after {slices} slices");
            print_tree(renderer);
        }
        None => log::warn!("no `{label}` button on screen"),
    }
    Ok(())
}

fn print_tree(renderer: &Renderer<MemoryHost>) {
    let host = renderer.host();
    println!("{}", host.dump_tree(Some(renderer.container())));
    println!("focused: {:?}", host.focused());
}

fn main() -> Result<(), RenderError> {
    env_logger::init();

    println!("=== Fiber List Demo ===");
    println!("Keyed rows keep their host nodes across reorder, removal and insertion.");

    let runtime = StdRuntime::new();
    let host = MemoryHost::new();
    let container = host.container();
    let mut renderer = Renderer::new(host, container, runtime.runtime());

    renderer.render_root(fruit_list());
    runtime.run_pending(&mut renderer)?;
    print_tree(&renderer);

    click(&runtime, &mut renderer, "Reverse")?;
    click(&runtime, &mut renderer, "Remove Banana")?;

    if let Some(input) = renderer.host().find_by_tag("input").first().copied() {
        println!("> type Date");
        renderer.host_mut().type_text(input, "Date");
        runtime.run_pending(&mut renderer)?;
        if let Some(button) = find_button(renderer.host(), "Add") {
            if let Err(err) = renderer.host_mut().focus(button) {
                log::warn!("could not focus the add button: {err}");
            }
        }
    }
    click(&runtime, &mut renderer, "Add")?;

    for diagnostic in renderer.take_diagnostics() {
        log::warn!("{diagnostic}");
    }
    Ok(())
}
