//! Identity, diffing and patch application across whole render passes.

use proptest::prelude::*;
use raven_core::headless::HeadlessRenderer;
use raven_core::{Component, Coordinator, IdentityAssigner, Node, Patch, RenderOutcome, Renderer, diff};

fn list(keys: &[String]) -> Node {
    let mut root = Node::element("ul").children(keys.iter().map(|key| {
        Node::element("li")
            .key(key.clone())
            .attribute("data-key", key.clone())
            .child(Node::text(key.clone()))
    }));
    IdentityAssigner::new().assign(&mut root);
    root
}

fn keys(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn mounted(tree: &Node) -> HeadlessRenderer {
    let mut renderer = HeadlessRenderer::new();
    renderer.mount_tree(tree).unwrap();
    renderer
}

#[test]
fn appending_an_item_is_one_insert() {
    let before = list(&keys(&["x"]));
    let after = list(&keys(&["x", "y"]));
    let patches = diff(&before, &after);

    assert_eq!(patches.iter().filter(|patch| matches!(patch, Patch::Insert { .. })).count(), 1);
    assert!(
        !patches
            .iter()
            .any(|patch| matches!(patch, Patch::Remove(_) | Patch::Replace { .. }))
    );

    let mut renderer = mounted(&before);
    renderer.apply_patches(&patches);
    assert_eq!(renderer.snapshot(), mounted(&after).snapshot());
}

#[test]
fn keyed_rotation_only_reorders() {
    let patches = diff(&list(&keys(&["a", "b", "c"])), &list(&keys(&["c", "a", "b"])));
    assert!(!patches.is_empty());
    assert!(patches.iter().all(|patch| matches!(patch, Patch::Reorder { .. })));
}

#[test]
fn diff_of_deep_tree_with_itself_is_empty() {
    let mut deep = Node::text("leaf");
    for depth in 0..64 {
        deep = Node::element("div")
            .attribute("data-depth", depth.to_string())
            .child(deep);
    }
    IdentityAssigner::new().assign(&mut deep);
    assert!(diff(&deep, &deep).is_empty());
    assert!(diff(&deep, &deep.clone()).is_empty());
}

#[test]
fn coordinator_patches_keyed_lists() {
    let items = std::rc::Rc::new(std::cell::RefCell::new(keys(&["a", "b", "c"])));
    let source = items.clone();
    let mut coordinator = Coordinator::new(HeadlessRenderer::new(), move || {
        let items = source.borrow().clone();
        Component::element(
            "ul",
            items.into_iter().map(|item| {
                Component::element("li", [Component::text(item.clone())]).keyed(item)
            }),
        )
    });
    coordinator.render();

    *items.borrow_mut() = keys(&["c", "a", "b"]);
    let RenderOutcome::Patched(patches) = coordinator.render() else {
        panic!("expected patches");
    };
    assert!(patches.iter().all(|patch| matches!(patch, Patch::Reorder { .. })));
    assert_eq!(
        coordinator.renderer().to_markup(),
        "<ul><li>c</li><li>a</li><li>b</li></ul>"
    );
}

#[test]
fn duplicate_keys_round_trip() {
    let before = list(&keys(&["a", "a", "b"]));
    let after = list(&keys(&["b", "a", "c", "a"]));
    let patches = diff(&before, &after);
    let mut renderer = mounted(&before);
    assert_eq!(renderer.apply_patches(&patches), patches.len());
    assert_eq!(renderer.snapshot(), mounted(&after).snapshot());
    assert_eq!(renderer.registry().len(), mounted(&after).registry().len());
}

fn assigned(mut node: Node) -> Node {
    IdentityAssigner::new().assign(&mut node);
    node
}

fn leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        prop::sample::select(vec!["x", "y", "z"]).prop_map(Node::text),
        prop::sample::select(vec!["br", "img"]).prop_map(Node::element),
    ]
}

/// Nested trees mixing elements and fragments, keyed and positional
/// children (keys repeat among siblings), attributes, styles and flags.
fn nested() -> impl Strategy<Value = Node> {
    leaf().prop_recursive(4, 64, 5, |inner| {
        (
            prop::sample::select(vec!["div", "span", "section", "fragment"]),
            prop::option::of(prop::sample::select(vec!["one", "two"])),
            prop::option::of(prop::sample::select(vec!["red", "blue"])),
            any::<bool>(),
            prop::collection::vec((prop::option::of(prop::sample::select(vec!["k1", "k2", "k3"])), inner), 0..5),
        )
            .prop_map(|(tag, title, color, hidden, children)| {
                let mut node = if tag == "fragment" {
                    Node::fragment()
                } else {
                    let mut element = Node::element(tag).bool_attribute("hidden", hidden);
                    if let Some(title) = title {
                        element = element.attribute("title", title);
                    }
                    if let Some(color) = color {
                        element = element.style("color", color);
                    }
                    element
                };
                for (key, child) in children {
                    node = node.child(match key {
                        Some(key) => child.key(key),
                        None => child,
                    });
                }
                node
            })
    })
}

fn key_list() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(
        ["a", "b", "c", "d", "e", "f", "g", "h"].map(String::from).to_vec(),
        0..=8,
    )
    .prop_shuffle()
}

proptest! {
    #[test]
    fn identity_is_deterministic(items in key_list()) {
        prop_assert_eq!(list(&items), list(&items));
    }

    #[test]
    fn diff_is_idempotent(items in key_list()) {
        let tree = list(&items);
        prop_assert!(diff(&tree, &tree).is_empty());
    }

    #[test]
    fn patching_matches_fresh_mount(before in key_list(), after in key_list()) {
        let (old, new) = (list(&before), list(&after));
        let patches = diff(&old, &new);
        let mut renderer = mounted(&old);
        prop_assert_eq!(renderer.apply_patches(&patches), patches.len());
        prop_assert_eq!(renderer.snapshot(), mounted(&new).snapshot());
    }

    #[test]
    fn shared_keys_are_never_remounted(before in key_list(), after in key_list()) {
        let (old, new) = (list(&before), list(&after));
        for patch in diff(&old, &new) {
            if let Patch::Insert { node, .. } | Patch::Replace { node, .. } = &patch {
                let key = node.key.as_deref().unwrap_or_default();
                prop_assert!(!before.iter().any(|item| item == key), "{key} remounted");
            }
            if let Patch::Remove(id) = &patch {
                let removed = old.find(*id).and_then(|node| node.key.as_deref()).unwrap_or_default();
                prop_assert!(!after.iter().any(|item| item == removed), "{removed} removed");
            }
        }
    }

    #[test]
    fn nested_diff_is_idempotent(tree in nested()) {
        let tree = assigned(tree);
        prop_assert_eq!(assigned(tree.clone()), tree.clone());
        prop_assert!(diff(&tree, &tree.clone()).is_empty());
    }

    #[test]
    fn nested_patching_matches_fresh_mount(before in nested(), after in nested()) {
        let (old, new) = (assigned(before), assigned(after));
        let patches = diff(&old, &new);
        let mut renderer = mounted(&old);
        prop_assert_eq!(renderer.apply_patches(&patches), patches.len());
        prop_assert_eq!(renderer.snapshot(), mounted(&new).snapshot());
        prop_assert_eq!(renderer.registry().len(), mounted(&new).registry().len());
    }
}
