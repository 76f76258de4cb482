use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fiber_core::{
    children, h, props, text, use_effect, use_ref, use_state, Children, Component, Deps,
    EffectCleanup, Element, Props, Ref,
};
use fiber_testing::{FiberTestRule, HostCall};

fn keyed_list(keys: &[&str]) -> Element {
    let rows: Vec<Element> = keys
        .iter()
        .map(|key| h("li", props().key(*key), children![*key]))
        .collect();
    h("ul", props(), children![rows])
}

/// Keys whose fiber must move when `from` is reordered into `to`: a row
/// stays put while its old index keeps growing, anything behind it moves.
fn expected_moves(from: &[&str], to: &[&str]) -> Vec<String> {
    let mut last_placed = 0;
    let mut moved = Vec::new();
    for key in to {
        let old = from.iter().position(|k| k == key).unwrap_or(usize::MAX);
        if old < last_placed {
            moved.push(key.to_string());
        } else {
            last_placed = old;
        }
    }
    moved
}

fn permutations(items: &[&'static str]) -> Vec<Vec<&'static str>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for (i, first) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, *first);
            out.push(tail);
        }
    }
    out
}

#[test]
fn rendering_the_same_tree_twice_makes_no_host_calls() {
    let label = Component::new("Label", |props: &Props| {
        Ok(Children::from(text(props.str("text").unwrap_or("").to_string())))
    });
    let tree = h(
        "section",
        props().class("card").style("color", "red").on("click", |_| {}),
        children![
            h(label.clone(), props().attr("text", "hello"), children![]),
            keyed_list(&["a", "b"]),
        ],
    );
    let mut rule = FiberTestRule::new();
    rule.set_content(tree.clone()).unwrap();
    assert!(!rule.take_calls().is_empty());

    rule.set_content(tree).unwrap();
    assert_eq!(rule.calls(), &[]);
}

#[test]
fn structurally_equal_tree_makes_no_host_calls() {
    let build = || {
        h(
            "div",
            props().attr("id", "x").style("margin", 4),
            children![keyed_list(&["a", "b", "c"]), "tail"],
        )
    };
    let mut rule = FiberTestRule::new();
    rule.set_content(build()).unwrap();
    rule.take_calls();
    rule.set_content(build()).unwrap();
    assert_eq!(rule.calls(), &[]);
}

#[test]
fn keyed_permutations_only_move_displaced_rows() {
    let base = ["a", "b", "c", "d"];
    for order in permutations(&base) {
        let mut rule = FiberTestRule::new();
        rule.set_content(keyed_list(&base)).unwrap();
        let ul = rule.single("ul").unwrap();
        rule.take_calls();

        rule.set_content(keyed_list(&order)).unwrap();
        assert_eq!(rule.texts_of("li"), order);

        let mut moved: Vec<String> = rule
            .calls()
            .iter()
            .filter_map(|call| match call {
                HostCall::InsertBefore { parent, child, .. } if *parent == ul => {
                    Some(rule.host().text_content(*child))
                }
                _ => None,
            })
            .collect();
        moved.sort();
        let mut expected = expected_moves(&base, &order);
        expected.sort();
        assert_eq!(moved, expected, "reordering to {order:?}");
        assert!(
            rule.calls().iter().all(HostCall::is_insert),
            "unexpected calls for {order:?}: {:?}",
            rule.calls()
        );
    }
}

#[test]
fn replacement_under_same_key_removes_before_inserting() {
    let mut rule = FiberTestRule::new();
    rule.set_content(h("div", props(), children![h("li", props().key("a"), children!["A"])]))
        .unwrap();
    rule.take_calls();

    rule.set_content(h("div", props(), children![h("p", props().key("a"), children!["A"])]))
        .unwrap();
    let calls = rule.calls();
    let removed = calls.iter().position(HostCall::is_remove).unwrap();
    let inserted = calls.iter().position(HostCall::is_insert).unwrap();
    assert!(removed < inserted, "{calls:?}");
    assert_eq!(rule.find("li"), Vec::<usize>::new());
    assert_eq!(rule.texts_of("p"), ["A"]);
}

#[test]
fn keys_never_reach_the_host() {
    let mut rule = FiberTestRule::new();
    rule.set_content(keyed_list(&["a", "b"])).unwrap();
    let key_writes = rule
        .calls()
        .iter()
        .filter(|call| matches!(call, HostCall::SetProperty { name, .. } if name == "key"))
        .count();
    assert_eq!(key_writes, 0);
}

fn counter_row() -> Component {
    Component::new("CounterRow", |row: &Props| {
        let name = row.str("name").unwrap_or("").to_string();
        let (count, set_count) = use_state(|| 0);
        Ok(Children::from(h(
            "button",
            props().on("click", move |_| set_count.update(|n| n + 1)),
            children![format!("{name}:{count}")],
        )))
    })
}

fn counters(row: &Component, names: &[&str]) -> Element {
    let rows: Vec<Element> = names
        .iter()
        .map(|name| h(row.clone(), props().key(*name).attr("name", *name), children![]))
        .collect();
    h("div", props(), children![rows])
}

#[test]
fn component_state_follows_its_key_across_reorder() {
    let row = counter_row();
    let mut rule = FiberTestRule::new();
    rule.set_content(counters(&row, &["a", "b", "c"])).unwrap();

    let b = rule.find("button")[1];
    assert!(rule.click(b).unwrap());
    assert_eq!(rule.texts_of("button"), ["a:0", "b:1", "c:0"]);

    rule.set_content(counters(&row, &["c", "b", "a"])).unwrap();
    assert_eq!(rule.texts_of("button"), ["c:0", "b:1", "a:0"]);
    assert_eq!(rule.find("button")[1], b);
}

#[test]
fn effect_dependencies_control_reruns() {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let tracker = {
        let log = log.clone();
        Component::new("Tracker", move |props: &Props| {
            let x = props.int("x").unwrap_or(0);
            let mount_log = log.clone();
            use_effect(Deps::once(), move || mount_log.borrow_mut().push("once".into()));
            let dep_log = log.clone();
            use_effect(Deps::of(&x), move || {
                dep_log.borrow_mut().push(format!("x={x}"));
                let dep_log = dep_log.clone();
                EffectCleanup::new(move || dep_log.borrow_mut().push(format!("cleanup x={x}")))
            });
            let every_log = log.clone();
            use_effect(Deps::always(), move || every_log.borrow_mut().push("always".into()));
            Ok(Children::none())
        })
    };
    let mut rule = FiberTestRule::new();
    for (x, render) in [(1, 0), (1, 1), (2, 2), (2, 3)] {
        rule.set_content(h(tracker.clone(), props().attr("x", x).attr("render", render), children![]))
            .unwrap();
    }
    assert_eq!(
        log.borrow().as_slice(),
        [
            "once",
            "x=1",
            "always",
            "always",
            "cleanup x=1",
            "x=2",
            "always",
            "always",
        ]
    );
}

#[test]
fn refs_are_the_same_box_on_every_render() {
    let boxes: Rc<RefCell<Vec<Ref<u32>>>> = Rc::default();
    let renders = Rc::new(Cell::new(0));
    let holder = {
        let boxes = boxes.clone();
        let renders = renders.clone();
        Component::new("Holder", move |_: &Props| {
            renders.set(renders.get() + 1);
            boxes.borrow_mut().push(use_ref(0u32));
            Ok(Children::none())
        })
    };
    let mut rule = FiberTestRule::new();
    for render in 0..5 {
        rule.set_content(h(holder.clone(), props().attr("render", render), children![]))
            .unwrap();
    }
    assert_eq!(renders.get(), 5);
    let boxes = boxes.borrow();
    assert!(boxes.iter().all(|b| *b == boxes[0]));
}
