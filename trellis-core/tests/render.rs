//! Integration Tests for Rendering
//!
//! Components mounted through a [`Renderer`] over the in-memory host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::record;
use trellis_core::reactive::{Reactive, RuntimeOptions};
use trellis_core::render::{
    define_component, functional, HostNode, MemoryHost, RenderContext, SetupResult,
};
use trellis_core::{Renderer, Runtime, VNode, Value, Warning};

fn setup() -> (Runtime, Renderer<MemoryHost>, HostNode) {
    let rt = Runtime::new();
    let renderer = Renderer::new(&rt, MemoryHost::new());
    let root = renderer.host_mut().create_root();
    (rt, renderer, root)
}

fn warnings() -> (Runtime, Rc<RefCell<Vec<Warning>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let rt = Runtime::with_options(
        RuntimeOptions::new().on_warning(move |warning| sink.borrow_mut().push(warning.clone())),
    );
    (rt, seen)
}

fn logger(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> impl Fn(&RenderContext) {
    let log = log.clone();
    move |_| log.borrow_mut().push(name)
}

/// Two state writes in one tick produce one re-render, after the
/// microtask boundary.
#[test]
fn state_writes_batch_into_one_render() {
    let (rt, renderer, root) = setup();
    let counter = define_component("Counter")
        .data(|| record! { "a" => 0, "b" => 0 })
        .render(|ctx| {
            VNode::element("p").text_child(format!("{}+{}", ctx.get("a"), ctx.get("b")))
        })
        .build();

    renderer.render(Some(VNode::component(&counter)), root);
    assert_eq!(renderer.host().inner_markup(root), "<p>0+0</p>");

    let instance = renderer.root_instance(root).unwrap();
    assert_eq!(instance.render_count(), 1);

    instance.state().set("a", 1);
    instance.state().set("b", 2);
    // Nothing re-rendered yet
    assert_eq!(instance.render_count(), 1);
    assert_eq!(renderer.host().inner_markup(root), "<p>0+0</p>");

    rt.run_microtasks();
    assert_eq!(instance.render_count(), 2);
    assert_eq!(renderer.host().inner_markup(root), "<p>1+2</p>");
}

/// A parent re-render that passes the same props leaves the child alone.
#[test]
fn unchanged_props_skip_child_render() {
    let (rt, renderer, root) = setup();
    let child_renders = Rc::new(Cell::new(0));
    let seen_props: Rc<RefCell<Vec<Reactive>>> = Rc::new(RefCell::new(Vec::new()));

    let (renders, props_log) = (child_renders.clone(), seen_props.clone());
    let child = functional("Label", ["title"], move |ctx| {
        renders.set(renders.get() + 1);
        props_log.borrow_mut().push(ctx.props());
        VNode::element("span").text_child(ctx.get("title").to_string())
    });

    let parent = define_component("Parent")
        .data(|| record! { "count" => 0, "title" => "hello" })
        .render(move |ctx| {
            VNode::element("div").children([
                VNode::element("b").text_child(ctx.get("count").to_string()),
                VNode::component(&child).prop("title", ctx.get("title")),
            ])
        })
        .build();

    renderer.render(Some(VNode::component(&parent)), root);
    let instance = renderer.root_instance(root).unwrap();
    assert_eq!(child_renders.get(), 1);

    instance.state().set("count", 1);
    rt.run_microtasks();
    assert_eq!(instance.render_count(), 2);
    assert_eq!(child_renders.get(), 1);
    assert_eq!(
        renderer.host().inner_markup(root),
        "<div><b>1</b><span>hello</span></div>"
    );

    instance.state().set("title", "bye");
    rt.run_microtasks();
    assert_eq!(child_renders.get(), 2);
    assert_eq!(
        renderer.host().inner_markup(root),
        "<div><b>1</b><span>bye</span></div>"
    );

    // The child kept one props object throughout
    let seen = seen_props.borrow();
    assert!(seen[0].ptr_eq(&seen[1]));
}

#[test]
fn lifecycle_hooks_run_in_order() {
    let (rt, renderer, root) = setup();
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let push = |name| logger(&log, name);
    let before_create_log = log.clone();
    let setup_log = log.clone();
    let def = define_component("Lifecycle")
        .data(|| record! { "n" => 0 })
        .before_create(move || before_create_log.borrow_mut().push("before_create"))
        .setup(move |_, ctx| {
            let log = setup_log.clone();
            if let Some(rt) = ctx.runtime() {
                rt.on_mounted(move |_| log.borrow_mut().push("setup mounted"));
            }
            SetupResult::None
        })
        .created(push("created"))
        .before_mount(push("before_mount"))
        .mounted(push("mounted"))
        .before_update(push("before_update"))
        .updated(push("updated"))
        .before_unmount(push("before_unmount"))
        .unmounted(push("unmounted"))
        .render(|ctx| VNode::element("i").text_child(ctx.get("n").to_string()))
        .build();

    renderer.render(Some(VNode::component(&def)), root);
    assert_eq!(
        *log.borrow(),
        vec!["before_create", "created", "before_mount", "mounted", "setup mounted"]
    );

    log.borrow_mut().clear();
    renderer.root_instance(root).unwrap().state().set("n", 1);
    rt.run_microtasks();
    assert_eq!(*log.borrow(), vec!["before_update", "updated"]);

    log.borrow_mut().clear();
    let instance = renderer.root_instance(root).unwrap();
    renderer.render(None, root);
    assert_eq!(*log.borrow(), vec!["before_unmount", "unmounted"]);
    assert!(instance.is_unmounted());
    assert_eq!(renderer.host().inner_markup(root), "");
}

/// The mounted hook sees the component's nodes attached to the host.
#[test]
fn mounted_hook_sees_attached_nodes() {
    let (_rt, renderer, root) = setup();
    let attached = Rc::new(Cell::new(false));
    let flag = attached.clone();
    let inspect = renderer.clone();

    let def = define_component("Canvas")
        .render(|_| VNode::element("canvas"))
        .mounted(move |_| {
            let host = inspect.host();
            flag.set(host.children(root).len() == 1);
        })
        .build();

    renderer.render(Some(VNode::component(&def)), root);
    assert!(attached.get());
}

#[test]
fn emit_calls_the_parent_handler() {
    let (_rt, renderer, root) = setup();
    let received = Rc::new(RefCell::new(Vec::new()));

    let button = define_component("Button")
        .setup(|_, ctx| {
            let emitter = ctx.emitter();
            SetupResult::render(move |_| {
                let emitter = emitter.clone();
                VNode::element("button").on("click", move |_| {
                    emitter.emit("change", &[Value::from(5)]);
                })
            })
        })
        .build();

    let sink = received.clone();
    let vnode = VNode::component(&button).on("change", move |args| {
        sink.borrow_mut().extend_from_slice(args);
    });
    renderer.render(Some(vnode), root);

    let node = renderer.host().children(root)[0];
    assert!(renderer.dispatch(node, "click", &[]));
    assert_eq!(*received.borrow(), vec![Value::from(5)]);
}

#[test]
fn emit_without_handler_warns() {
    let (rt, seen) = warnings();
    let renderer = Renderer::new(&rt, MemoryHost::new());
    let root = renderer.host_mut().create_root();

    let def = define_component("Quiet")
        .render(|ctx| {
            ctx.emit("save", &[]);
            VNode::element("div")
        })
        .build();
    renderer.render(Some(VNode::component(&def)), root);

    assert!(seen
        .borrow()
        .iter()
        .any(|w| matches!(w, Warning::MissingEventHandler { .. })));
}

/// A render function returned from setup replaces the declared one.
#[test]
fn setup_render_overrides_declared_render() {
    let (rt, seen) = warnings();
    let renderer = Renderer::new(&rt, MemoryHost::new());
    let root = renderer.host_mut().create_root();

    let def = define_component("Both")
        .render(|_| VNode::element("old"))
        .setup(|_, _| SetupResult::render(|_| VNode::element("new")))
        .build();
    renderer.render(Some(VNode::component(&def)), root);

    assert_eq!(renderer.host().inner_markup(root), "<new></new>");
    assert!(seen
        .borrow()
        .iter()
        .any(|w| matches!(w, Warning::RenderOverride { .. })));
}

#[test]
fn component_without_render_warns_and_renders_nothing() {
    let (rt, seen) = warnings();
    let renderer = Renderer::new(&rt, MemoryHost::new());
    let root = renderer.host_mut().create_root();

    let def = define_component("Empty").build();
    renderer.render(Some(VNode::component(&def)), root);

    assert_eq!(renderer.host().inner_markup(root), "");
    assert!(seen
        .borrow()
        .iter()
        .any(|w| matches!(w, Warning::MissingRender { .. })));
}

/// Setup bindings are reachable from render after state and props.
#[test]
fn setup_bindings_resolve_in_render() {
    let (_rt, renderer, root) = setup();
    let def = define_component("Greeting")
        .props(["name"])
        .setup(|props, _| {
            let greeting = format!("hi {}", props.get("name"));
            SetupResult::bindings(record! { "greeting" => greeting })
        })
        .render(|ctx| VNode::element("h1").text_child(ctx.get("greeting").to_string()))
        .build();

    renderer.render(Some(VNode::component(&def).prop("name", "ada")), root);
    assert_eq!(renderer.host().inner_markup(root), "<h1>hi ada</h1>");
}

/// Undeclared props fall through as attrs and are never writable.
#[test]
fn undeclared_props_become_attrs() {
    let (_rt, renderer, root) = setup();
    let def = define_component("Box")
        .props(["size"])
        .render(|ctx| {
            let class = ctx.attrs().get("class");
            VNode::element("div").prop("class", class)
        })
        .build();

    renderer.render(
        Some(VNode::component(&def).prop("size", 2).prop("class", "wide")),
        root,
    );
    assert_eq!(renderer.host().inner_markup(root), "<div class=\"wide\"></div>");

    let instance = renderer.root_instance(root).unwrap();
    assert!(!instance.context().props().set("size", 3));
    assert_eq!(instance.props().get("size"), Value::from(2));
}

#[test]
fn keyed_list_reorder_keeps_host_nodes() {
    let (_rt, renderer, root) = setup();
    let list = |keys: &[i64]| {
        VNode::element("ul").children(
            keys.iter()
                .map(|k| VNode::element("li").key(*k).text_child(k.to_string())),
        )
    };

    renderer.render(Some(list(&[1, 2, 3, 4, 5])), root);
    let ul = renderer.host().children(root)[0];
    let before = renderer.host().children(ul);

    renderer.host_mut().clear_log();
    renderer.render(Some(list(&[5, 1, 2, 3, 4])), root);

    let host = renderer.host();
    let after = host.children(ul);
    assert_eq!(after[0], before[4]);
    assert_eq!(&after[1..], &before[..4]);
    assert_eq!(host.moves(), 1);
    assert_eq!(host.creates(), 0);
    assert_eq!(
        host.inner_markup(root),
        "<ul><li>5</li><li>1</li><li>2</li><li>3</li><li>4</li></ul>"
    );
}

#[test]
fn fragments_patch_in_place() {
    let (_rt, renderer, root) = setup();
    let tree = |items: &[&str]| {
        VNode::element("div").children([
            VNode::fragment(items.iter().map(|s| VNode::element("p").key(*s).text_child(*s))),
            VNode::element("footer"),
        ])
    };

    renderer.render(Some(tree(&["a", "b"])), root);
    renderer.render(Some(tree(&["b", "c", "a"])), root);

    assert_eq!(
        renderer.host().inner_markup(root),
        "<div><p>b</p><p>c</p><p>a</p><footer></footer></div>"
    );
}

#[test]
fn render_tree_loaded_from_json() {
    let (_rt, renderer, root) = setup();
    let first = VNode::from_json(
        r#"{"tag": "ul", "props": {"class": "todo"}, "children": [
            {"tag": "li", "key": 1, "children": "milk"},
            {"tag": "li", "key": 2, "children": "eggs"}
        ]}"#,
    )
    .unwrap();
    renderer.render(Some(first), root);
    assert_eq!(
        renderer.host().inner_markup(root),
        "<ul class=\"todo\"><li>milk</li><li>eggs</li></ul>"
    );

    let second = VNode::from_json(
        r#"{"tag": "ul", "children": [
            {"tag": "li", "key": 2, "children": "eggs"},
            {"tag": "li", "key": 3, "props": {"hidden": true}, "children": "bread"}
        ]}"#,
    )
    .unwrap();
    renderer.render(Some(second), root);
    assert_eq!(
        renderer.host().inner_markup(root),
        "<ul><li>eggs</li><li hidden>bread</li></ul>"
    );
}

/// A child that emits from `before_mount` while the parent is still
/// rendering updates the parent's state, and the parent re-renders.
#[test]
fn child_emit_during_mount_rerenders_parent() {
    let (rt, renderer, root) = setup();
    let child = define_component("Child")
        .before_mount(|ctx| {
            ctx.emit("ready", &[]);
        })
        .render(|_| VNode::element("i"))
        .build();

    let parent = define_component("Parent")
        .data(|| record! { "ready" => false })
        .render(move |ctx| {
            let state = ctx.state().clone();
            VNode::element("div").children([
                VNode::element("b").text_child(ctx.get("ready").to_string()),
                VNode::component(&child).on("ready", move |_| {
                    state.set("ready", true);
                }),
            ])
        })
        .build();

    renderer.render(Some(VNode::component(&parent)), root);
    let instance = renderer.root_instance(root).unwrap();
    assert_eq!(instance.state().get("ready"), Value::from(true));

    rt.run_microtasks();
    assert_eq!(
        renderer.host().inner_markup(root),
        "<div><b>true</b><i></i></div>"
    );
}

/// Ref bindings from `setup` read unwrapped in render, and writes through
/// the context land in the ref.
#[test]
fn setup_refs_unwrap_in_render() {
    let (rt, renderer, root) = setup();
    let count = rt.new_ref(1);
    let source = rt.reactive(&record! { "label" => "clicks" });

    let (c, s, setup_rt) = (count.clone(), source.clone(), rt.clone());
    let def = define_component("Counter")
        .setup(move |_, _| {
            SetupResult::bindings(record! {
                "count" => c.clone(),
                "label" => setup_rt.to_ref(&s, "label"),
            })
        })
        .render(|ctx| {
            VNode::element("p").text_child(format!("{} {}", ctx.get("label"), ctx.get("count")))
        })
        .build();

    renderer.render(Some(VNode::component(&def)), root);
    assert_eq!(renderer.host().inner_markup(root), "<p>clicks 1</p>");

    count.set_value(2);
    source.set("label", "taps");
    rt.run_microtasks();
    assert_eq!(renderer.host().inner_markup(root), "<p>taps 2</p>");

    let instance = renderer.root_instance(root).unwrap();
    assert!(instance.context().set("count", 7));
    assert_eq!(count.value(), Value::from(7));
    rt.run_microtasks();
    assert_eq!(renderer.host().inner_markup(root), "<p>taps 7</p>");
}
