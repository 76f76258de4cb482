use super::*;
use crate::children;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::component::{error_boundary, Rendered};
use crate::context::{create_context, use_context};
use crate::element::{text, PropValue, Props};
use crate::hooks::{use_effect, use_state, Deps, SetState};
use crate::host::MemoryHost;
use crate::runtime::TestScheduler;

/// Deadline that is already spent: every slice performs exactly one unit.
struct Expired;

impl IdleDeadline for Expired {
    fn time_remaining(&self) -> Duration {
        Duration::ZERO
    }
}

fn renderer() -> (Renderer<MemoryHost>, Arc<TestScheduler>) {
    let scheduler = Arc::new(TestScheduler::default());
    let runtime = Runtime::new(scheduler.clone());
    (Renderer::new(MemoryHost::new(), 0, runtime), scheduler)
}

fn label(value: impl std::fmt::Display) -> Rendered {
    Ok(Children::from(text(value.to_string())))
}

fn list(labels: &[&str]) -> Element {
    let rows: Vec<Element> = labels
        .iter()
        .map(|label| h("li", props().key(*label), children![*label]))
        .collect();
    h("ul", props(), children![rows])
}

type Setter<T> = Rc<RefCell<Option<SetState<T>>>>;

fn counter(setter: &Setter<i64>, renders: &Rc<Cell<usize>>) -> Component {
    let setter = setter.clone();
    let renders = renders.clone();
    Component::new("Counter", move |props: &Props| {
        renders.set(renders.get() + 1);
        let (count, set) = use_state(|| 0i64);
        *setter.borrow_mut() = Some(set);
        label(format!("{}{count}", props.str("prefix").unwrap_or("")))
    })
}

#[test]
fn mount_builds_the_host_tree() {
    let (mut renderer, _) = renderer();
    renderer.render(h(
        "div",
        props().attr("id", "app"),
        children![h("p", props(), children!["Hello ", "world"])],
    ));
    renderer.flush().unwrap();

    let host = renderer.host();
    let div = host.children(0)[0];
    assert_eq!(host.node(div).and_then(|n| n.tag()), Some("div"));
    assert_eq!(host.property(div, "id").and_then(PropValue::as_str), Some("app"));
    assert_eq!(host.text_content(0), "Hello world");
    assert!(renderer.is_idle());
    assert_eq!(renderer.phase(), Phase::Idle);
}

#[test]
fn work_yields_between_units_and_commits_atomically() {
    let (mut renderer, scheduler) = renderer();
    renderer.render(list(&["a", "b", "c"]));
    let before = scheduler.requests();

    let mut yields = 0;
    loop {
        match renderer.work(&Expired).unwrap() {
            WorkStatus::Yielded => {
                yields += 1;
                assert_eq!(renderer.phase(), Phase::Working);
                assert!(renderer.host().children(0).is_empty());
            }
            WorkStatus::Committed => break,
            WorkStatus::Idle => panic!("pass went idle before committing"),
        }
    }
    // root, ul, three rows and their three texts
    assert_eq!(yields, 7);
    assert_eq!(scheduler.requests(), before + 7);
    assert_eq!(renderer.host().text_content(0), "abc");
    assert_eq!(renderer.work(&Expired).unwrap(), WorkStatus::Idle);
}

#[test]
fn render_during_a_pass_is_applied_after_it() {
    let (mut renderer, _) = renderer();
    renderer.render(list(&["a"]));
    assert_eq!(renderer.work(&Expired).unwrap(), WorkStatus::Yielded);

    renderer.render(list(&["a", "b"]));
    while renderer.work(&Expired).unwrap() != WorkStatus::Committed {}
    assert_eq!(renderer.host().text_content(0), "a");
    assert!(renderer.runtime().has_pending_update());

    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "ab");
}

#[test]
fn state_set_mid_pass_is_deferred_to_the_next_pass() {
    let setter = Setter::default();
    let renders = Rc::new(Cell::new(0));
    let (mut renderer, _) = renderer();
    renderer.render_root(counter(&setter, &renders));
    renderer.flush().unwrap();

    let set = setter.borrow().clone().unwrap();
    set.set(1);
    assert_eq!(renderer.work(&Expired).unwrap(), WorkStatus::Yielded);
    set.set(2);
    while renderer.work(&Expired).unwrap() != WorkStatus::Committed {}
    assert_eq!(renderer.host().text_content(0), "1");
    assert!(renderer.runtime().has_pending_update());

    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "2");
    assert!(renderer.is_idle());
}

#[test]
fn unchanged_props_skip_rendering_but_keep_descendant_updates() {
    let child_setter = Setter::default();
    let child_renders = Rc::new(Cell::new(0));
    let child = counter(&child_setter, &child_renders);

    let parent_setter = Setter::default();
    let parent = {
        let parent_setter = parent_setter.clone();
        Component::new("Parent", move |_: &Props| {
            let (tick, set) = use_state(|| 0i64);
            *parent_setter.borrow_mut() = Some(set);
            Ok(Children::from(children![
                h("b", props(), children![tick.to_string()]),
                h(child.clone(), props().attr("prefix", "n="), children![]),
            ]))
        })
    };

    let (mut renderer, _) = renderer();
    renderer.render_root(parent);
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "0n=0");
    assert_eq!(child_renders.get(), 1);

    parent_setter.borrow().clone().unwrap().set(1);
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "1n=0");
    assert_eq!(child_renders.get(), 1);

    child_setter.borrow().clone().unwrap().set(5);
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "1n=5");
    assert_eq!(child_renders.get(), 2);
}

fn bomb() -> Component {
    Component::new("Bomb", |props: &Props| {
        if props.bool("explode") == Some(true) {
            Err(RenderError::failed("boom"))
        } else {
            label("fine")
        }
    })
}

fn guarded(bomb: &Component, explode: bool) -> Element {
    h(
        "div",
        props(),
        children![
            error_boundary(
                |err| Children::from(text(format!("caught {}", err.message()))),
                children![h(bomb.clone(), props().attr("explode", explode), children![])],
            ),
            h("span", props(), children![" | sibling"]),
        ],
    )
}

#[test]
fn error_boundary_swaps_in_its_fallback() {
    let bomb = bomb();
    let (mut renderer, _) = renderer();
    renderer.render(guarded(&bomb, false));
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "fine | sibling");

    renderer.render(guarded(&bomb, true));
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "caught boom | sibling");

    // The boundary keeps its fallback for as long as it stays mounted.
    renderer.render(guarded(&bomb, false));
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "caught boom | sibling");
}

#[test]
fn failing_fallback_propagates_to_the_next_boundary() {
    let bomb = bomb();
    let outer = move |explode: bool| {
        let fallback_bomb = bomb.clone();
        error_boundary(
            |_| Children::from(text("outer")),
            children![error_boundary(
                move |_| {
                    Children::from(h(
                        fallback_bomb.clone(),
                        props().attr("explode", true),
                        children![],
                    ))
                },
                children![h(bomb.clone(), props().attr("explode", explode), children![])],
            )],
        )
    };
    let (mut renderer, _) = renderer();
    renderer.render(outer(true));
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "outer");
}

#[test]
fn failed_component_is_rendered_again_instead_of_reused() {
    let attempts = Rc::new(Cell::new(0u32));
    let flaky = {
        let attempts = attempts.clone();
        Component::new("Flaky", move |_: &Props| {
            attempts.set(attempts.get() + 1);
            Err(RenderError::failed("still broken"))
        })
    };
    // The fallback mounts the same component at the same slot with equal props.
    let element = {
        let flaky = flaky.clone();
        let fallback_flaky = flaky.clone();
        error_boundary(
            |err| Children::from(text(format!("outer: {}", err.message()))),
            children![error_boundary(
                move |_| Children::from(h(fallback_flaky.clone(), props(), children![])),
                children![h(flaky, props(), children![])],
            )],
        )
    };
    let (mut renderer, _) = renderer();
    renderer.render(element);
    renderer.flush().unwrap();

    assert_eq!(attempts.get(), 2);
    assert_eq!(renderer.host().text_content(0), "outer: still broken");
    assert!(renderer.is_idle());
}

#[test]
fn uncaught_error_abandons_the_pass() {
    let bomb = bomb();
    let (mut renderer, _) = renderer();
    renderer.render(h("main", props(), children![h(bomb.clone(), props(), children![])]));
    renderer.flush().unwrap();
    let fibers = renderer.fiber_count();

    renderer.render(h(
        "main",
        props(),
        children![h(bomb.clone(), props().attr("explode", true), children![])],
    ));
    let err = renderer.flush().unwrap_err();
    assert_eq!(
        err,
        RenderError::Component {
            component: "Bomb".into(),
            message: "boom".into()
        }
    );
    assert_eq!(renderer.host().text_content(0), "fine");
    assert_eq!(renderer.fiber_count(), fibers);
    assert!(renderer.is_idle());
    assert_eq!(renderer.phase(), Phase::Idle);

    renderer.render(h("main", props(), children![h(bomb, props(), children!["!"])]));
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "fine");
}

#[test]
fn self_scheduling_effects_hit_the_pass_limit() {
    let restless = Component::new("Restless", |_: &Props| {
        let (n, set) = use_state(|| 0u64);
        use_effect(Deps::always(), move || set.set(n + 1));
        label(n)
    });
    let scheduler = Arc::new(TestScheduler::default());
    let mut renderer = Renderer::with_config(
        MemoryHost::new(),
        0,
        Runtime::new(scheduler),
        RendererConfig::default().with_max_passes_per_flush(5),
    );
    renderer.render_root(restless);
    assert_eq!(
        renderer.flush(),
        Err(RenderError::TooManyPasses { limit: 5 })
    );
    assert_eq!(renderer.host().text_content(0), "4");
}

#[test]
fn provider_change_reaches_consumers_below_skipped_components() {
    let theme = create_context("light".to_string());
    let reader = {
        let theme = theme.clone();
        Component::new("Reader", move |_: &Props| label(use_context(&theme)))
    };
    let frame_renders = Rc::new(Cell::new(0));
    let frame = {
        let reader = reader.clone();
        let frame_renders = frame_renders.clone();
        Component::new("Frame", move |_: &Props| {
            frame_renders.set(frame_renders.get() + 1);
            Ok(Children::from(h(reader.clone(), props(), children![])))
        })
    };
    let app = |value: &str| {
        h(
            "div",
            props(),
            children![
                theme.provider(
                    value.to_string(),
                    children![h(frame.clone(), props(), children![])]
                ),
                "/",
                h(reader.clone(), props(), children![]),
            ],
        )
    };

    let (mut renderer, _) = renderer();
    renderer.render(app("dark"));
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "dark/light");

    renderer.render(app("dark"));
    renderer.flush().unwrap();
    assert_eq!(frame_renders.get(), 1);

    renderer.render(app("blue"));
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "blue/light");
    assert_eq!(frame_renders.get(), 2);
    assert_eq!(theme.current(), "light");
}

#[test]
fn nested_providers_shadow_outer_values() {
    let depth = create_context(0i64);
    let show = {
        let depth = depth.clone();
        Component::new("Show", move |_: &Props| label(use_context(&depth)))
    };
    let (mut renderer, _) = renderer();
    renderer.render(depth.provider(
        1,
        children![
            h(show.clone(), props(), children![]),
            depth.provider(2, children![h(show.clone(), props(), children![])]),
            h(show.clone(), props(), children![]),
        ],
    ));
    renderer.flush().unwrap();
    assert_eq!(renderer.host().text_content(0), "121");
}

#[test]
fn unmount_clears_the_container_and_frees_fibers() {
    let (mut renderer, _) = renderer();
    renderer.render(list(&["a", "b"]));
    renderer.flush().unwrap();
    assert!(renderer.fiber_count() > 1);

    renderer.unmount();
    renderer.flush().unwrap();
    assert!(renderer.host().children(0).is_empty());
    assert_eq!(renderer.fiber_count(), 1);
}

#[test]
fn arena_size_tracks_the_live_tree() {
    let (mut renderer, _) = renderer();
    renderer.render(list(&["a", "b", "c"]));
    renderer.flush().unwrap();
    let mounted = renderer.fiber_count();
    for order in [["c", "a", "b"], ["b", "c", "a"], ["a", "b", "c"]] {
        renderer.render(list(&order));
        renderer.flush().unwrap();
        assert_eq!(renderer.fiber_count(), mounted);
    }
    renderer.render(list(&["a"]));
    renderer.flush().unwrap();
    assert_eq!(renderer.fiber_count(), mounted - 4);
}

#[test]
fn invalid_host_tags_are_diagnosed() {
    let (mut renderer, _) = renderer();
    renderer.render(h("Widget", props(), children![]));
    renderer.flush().unwrap();
    assert_eq!(
        renderer.take_diagnostics(),
        vec![Diagnostic::InvalidTag {
            tag: "Widget".into()
        }]
    );
}
