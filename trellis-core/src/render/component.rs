//! Components
//!
//! A component is a definition ([`ComponentDef`]) that the renderer turns
//! into an instance when a component node mounts. The instance owns the
//! component's reactive state, its props and attrs, and one render effect
//! that re-renders the subtree whenever something the render function read
//! changes.
//!
//! # Lifecycle
//!
//! 1. Mount: run `before_create`, build state from `data`, split the node's
//!    props into declared props and fallthrough attrs, run `setup`, run
//!    `created`, then create the render effect. Its first run calls
//!    `before_mount`, renders and mounts the subtree, and queues `mounted`.
//!
//! 2. Update: a dependency change queues the instance's update job. The job
//!    calls `before_update`, renders, diffs against the previous subtree and
//!    queues `updated`. Several changes before a flush re-render once.
//!
//! 3. Parent re-render: the new node's props are compared with the old
//!    ones. Only when they differ are they written into the instance's
//!    props, which schedules the child's own update.
//!
//! 4. Unmount: `before_unmount`, stop the render effect, unmount the
//!    subtree, queue `unmounted`.
//!
//! `mounted`, `updated` and `unmounted` run after the outermost render or
//! job finishes, so state written there schedules a normal update.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::adapter::HostAdapter;
use super::renderer::{first_host, Renderer};
use super::vnode::{event_prop_name, is_event_prop, HostNode, Props, VNode};
use crate::error::Warning;
use crate::reactive::{
    Container, Effect, EffectOptions, RawObject, Reactive, Runtime, Value, WeakRuntime,
};
use crate::scheduler::Job;

/// Produces a component's subtree.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> VNode>;

/// Runs once per instance before the first render.
pub type SetupFn = Rc<dyn Fn(&Reactive, &SetupContext) -> SetupResult>;

/// A lifecycle callback.
pub type Hook = Rc<dyn Fn(&RenderContext)>;

/// Lifecycle points a [`Hook`] can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

/// What `setup` hands back.
pub enum SetupResult {
    None,
    /// Names exposed to the render context after state and props.
    Bindings(RawObject),
    /// Replaces the declared render function.
    Render(RenderFn),
}

impl SetupResult {
    pub fn render<F>(render: F) -> Self
    where
        F: Fn(&RenderContext) -> VNode + 'static,
    {
        SetupResult::Render(Rc::new(render))
    }

    pub fn bindings(raw: RawObject) -> Self {
        SetupResult::Bindings(raw)
    }
}

// ----------------------------------------------------------------------------
// Definitions
// ----------------------------------------------------------------------------

/// A component definition. Build one with [`define_component`].
pub struct ComponentDef {
    name: Rc<str>,
    props: Vec<Rc<str>>,
    data: Option<Rc<dyn Fn() -> RawObject>>,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
    before_create: Vec<Rc<dyn Fn()>>,
    hooks: IndexMap<LifecycleHook, Vec<Hook>>,
}

impl ComponentDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared prop names.
    pub fn props(&self) -> &[Rc<str>] {
        &self.props
    }

    fn hooks(&self, kind: LifecycleHook) -> &[Hook] {
        self.hooks.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("props", &self.props)
            .field("setup", &self.setup.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}

/// Start a component definition.
pub fn define_component(name: impl Into<Rc<str>>) -> ComponentBuilder {
    ComponentBuilder {
        def: ComponentDef {
            name: name.into(),
            props: Vec::new(),
            data: None,
            setup: None,
            render: None,
            before_create: Vec::new(),
            hooks: IndexMap::new(),
        },
    }
}

/// A stateless component: declared props and a render function.
pub fn functional<F>(
    name: impl Into<Rc<str>>,
    props: impl IntoIterator<Item = &'static str>,
    render: F,
) -> Rc<ComponentDef>
where
    F: Fn(&RenderContext) -> VNode + 'static,
{
    define_component(name).props(props).render(render).build()
}

/// Builder returned by [`define_component`].
pub struct ComponentBuilder {
    def: ComponentDef,
}

impl ComponentBuilder {
    pub fn props<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Rc<str>>,
    {
        self.def.props.extend(props.into_iter().map(Into::into));
        self
    }

    /// Factory for the initial local state. Called once per instance.
    pub fn data<F>(mut self, data: F) -> Self
    where
        F: Fn() -> RawObject + 'static,
    {
        self.def.data = Some(Rc::new(data));
        self
    }

    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&Reactive, &SetupContext) -> SetupResult + 'static,
    {
        self.def.setup = Some(Rc::new(setup));
        self
    }

    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&RenderContext) -> VNode + 'static,
    {
        self.def.render = Some(Rc::new(render));
        self
    }

    pub fn before_create<F>(mut self, hook: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.def.before_create.push(Rc::new(hook));
        self
    }

    pub fn hook<F>(mut self, kind: LifecycleHook, hook: F) -> Self
    where
        F: Fn(&RenderContext) + 'static,
    {
        self.def.hooks.entry(kind).or_default().push(Rc::new(hook));
        self
    }

    pub fn created<F: Fn(&RenderContext) + 'static>(self, hook: F) -> Self {
        self.hook(LifecycleHook::Created, hook)
    }

    pub fn before_mount<F: Fn(&RenderContext) + 'static>(self, hook: F) -> Self {
        self.hook(LifecycleHook::BeforeMount, hook)
    }

    pub fn mounted<F: Fn(&RenderContext) + 'static>(self, hook: F) -> Self {
        self.hook(LifecycleHook::Mounted, hook)
    }

    pub fn before_update<F: Fn(&RenderContext) + 'static>(self, hook: F) -> Self {
        self.hook(LifecycleHook::BeforeUpdate, hook)
    }

    pub fn updated<F: Fn(&RenderContext) + 'static>(self, hook: F) -> Self {
        self.hook(LifecycleHook::Updated, hook)
    }

    pub fn before_unmount<F: Fn(&RenderContext) + 'static>(self, hook: F) -> Self {
        self.hook(LifecycleHook::BeforeUnmount, hook)
    }

    pub fn unmounted<F: Fn(&RenderContext) + 'static>(self, hook: F) -> Self {
        self.hook(LifecycleHook::Unmounted, hook)
    }

    pub fn build(self) -> Rc<ComponentDef> {
        Rc::new(self.def)
    }
}

// ----------------------------------------------------------------------------
// Contexts
// ----------------------------------------------------------------------------

/// Calls the `on<Event>` handler a parent bound on a component.
#[derive(Clone)]
pub struct Emitter {
    component: Rc<str>,
    props: RawObject,
    runtime: WeakRuntime,
}

impl Emitter {
    /// Call the handler bound for `event` with `args`. Returns whether one
    /// was bound.
    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        let handler = self.props.field(&event_prop_name(event));
        match handler.as_ref().and_then(Value::as_callback) {
            Some(handler) => {
                trace!(component = %self.component, event, "emit");
                handler.call(args);
                true
            }
            None => {
                warn_in(
                    &self.runtime,
                    Warning::MissingEventHandler {
                        event: event.to_string(),
                    },
                );
                false
            }
        }
    }
}

fn warn_in(runtime: &WeakRuntime, warning: Warning) {
    match runtime.upgrade() {
        Some(rt) => rt.warn(warning),
        None => tracing::warn!("{}", warning),
    }
}

/// Second argument of `setup`.
pub struct SetupContext {
    attrs: Reactive,
    emitter: Emitter,
    children: Rc<RefCell<Vec<VNode>>>,
    runtime: WeakRuntime,
}

impl SetupContext {
    /// Fallthrough attributes: everything passed that is not a declared
    /// prop or an event binding.
    pub fn attrs(&self) -> &Reactive {
        &self.attrs
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.emitter.emit(event, args)
    }

    /// An owned emitter for use inside handlers.
    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    /// Unmounted copies of the nodes passed as the component's children.
    pub fn children(&self) -> Vec<VNode> {
        self.children.borrow().clone()
    }

    pub fn runtime(&self) -> Option<Runtime> {
        self.runtime.upgrade()
    }
}

/// The view render functions and hooks get of an instance.
///
/// Names resolve against local state first, then props, then the bindings
/// returned by `setup`. Ref bindings read and write their target.
#[derive(Clone)]
pub struct RenderContext {
    name: Rc<str>,
    state: Reactive,
    props: Reactive,
    attrs: Reactive,
    setup_state: Option<Reactive>,
    children: Rc<RefCell<Vec<VNode>>>,
    emitter: Emitter,
    runtime: WeakRuntime,
}

impl RenderContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Value {
        if self.state.has(key) {
            return self.state.get(key);
        }
        if self.props.has(key) {
            return self.props.get(key);
        }
        if let Some(setup_state) = &self.setup_state {
            if setup_state.has(key) {
                return setup_state.get(key).unref();
            }
        }
        warn_in(&self.runtime, Warning::UnknownBinding { key: key.to_string() });
        Value::Null
    }

    /// Write a name. Props reject writes; unknown names are not created.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        if self.state.raw().field(key).is_some() {
            return self.state.set(key, value);
        }
        if self.props.raw().field(key).is_some() {
            warn_in(&self.runtime, Warning::PropMutation { key: key.to_string() });
            return false;
        }
        if let Some(setup_state) = &self.setup_state {
            match setup_state.raw().field(key) {
                Some(Value::Ref(binding)) => return binding.set_value(value),
                Some(_) => return setup_state.set(key, value),
                None => {}
            }
        }
        warn_in(&self.runtime, Warning::UnknownBinding { key: key.to_string() });
        false
    }

    pub fn state(&self) -> &Reactive {
        &self.state
    }

    /// Tracked, readonly props.
    pub fn props(&self) -> Reactive {
        self.props.as_shallow_readonly()
    }

    pub fn attrs(&self) -> &Reactive {
        &self.attrs
    }

    pub fn setup_state(&self) -> Option<&Reactive> {
        self.setup_state.as_ref()
    }

    pub fn children(&self) -> Vec<VNode> {
        self.children.borrow().clone()
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> bool {
        self.emitter.emit(event, args)
    }

    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    pub fn runtime(&self) -> Option<Runtime> {
        self.runtime.upgrade()
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("name", &self.name)
            .field("state", self.state.raw())
            .field("props", self.props.raw())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Hook registration during setup
// ----------------------------------------------------------------------------

/// Hooks registered by `setup` through the `on_*` functions.
#[derive(Default)]
pub(crate) struct InstanceHooks {
    hooks: RefCell<IndexMap<LifecycleHook, Vec<Hook>>>,
}

impl InstanceHooks {
    fn get(&self, kind: LifecycleHook) -> Vec<Hook> {
        self.hooks.borrow().get(&kind).cloned().unwrap_or_default()
    }
}

/// Marks the instance whose `setup` is running; restores the previous one
/// on drop.
struct CurrentInstance<'a> {
    runtime: &'a Runtime,
    previous: Option<Rc<InstanceHooks>>,
}

impl<'a> CurrentInstance<'a> {
    fn enter(runtime: &'a Runtime, hooks: &Rc<InstanceHooks>) -> Self {
        let previous = runtime
            .inner
            .current_instance
            .replace(Some(Rc::clone(hooks)));
        Self { runtime, previous }
    }
}

impl Drop for CurrentInstance<'_> {
    fn drop(&mut self) {
        *self.runtime.inner.current_instance.borrow_mut() = self.previous.take();
    }
}

impl Runtime {
    fn register_hook(&self, kind: LifecycleHook, name: &'static str, hook: Hook) {
        let current = self.inner.current_instance.borrow().clone();
        match current {
            Some(instance) => instance.hooks.borrow_mut().entry(kind).or_default().push(hook),
            None => self.warn(Warning::HookOutsideSetup { hook: name }),
        }
    }

    /// Register a `mounted` hook on the component being set up.
    pub fn on_mounted<F: Fn(&RenderContext) + 'static>(&self, hook: F) {
        self.register_hook(LifecycleHook::Mounted, "on_mounted", Rc::new(hook));
    }

    pub fn on_updated<F: Fn(&RenderContext) + 'static>(&self, hook: F) {
        self.register_hook(LifecycleHook::Updated, "on_updated", Rc::new(hook));
    }

    pub fn on_before_unmount<F: Fn(&RenderContext) + 'static>(&self, hook: F) {
        self.register_hook(LifecycleHook::BeforeUnmount, "on_before_unmount", Rc::new(hook));
    }

    pub fn on_unmounted<F: Fn(&RenderContext) + 'static>(&self, hook: F) {
        self.register_hook(LifecycleHook::Unmounted, "on_unmounted", Rc::new(hook));
    }
}

// ----------------------------------------------------------------------------
// Instances
// ----------------------------------------------------------------------------

/// A mounted component.
pub struct ComponentInstance {
    def: Rc<ComponentDef>,
    ctx: RenderContext,
    render: RenderFn,
    hooks: Rc<InstanceHooks>,
    pub(crate) subtree: RefCell<Option<VNode>>,
    mounted: Cell<bool>,
    unmounted: Cell<bool>,
    update: RefCell<Option<Effect<()>>>,
    job: RefCell<Option<Job>>,
    container: HostNode,
    anchor: Option<HostNode>,
}

impl ComponentInstance {
    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn def(&self) -> &Rc<ComponentDef> {
        &self.def
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn state(&self) -> &Reactive {
        &self.ctx.state
    }

    /// The instance's props object. Its identity never changes.
    pub fn props(&self) -> &Reactive {
        &self.ctx.props
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted.get()
    }

    /// How many times the render effect ran.
    pub fn render_count(&self) -> usize {
        self.update.borrow().as_ref().map_or(0, Effect::run_count)
    }

    /// First host node of the rendered subtree.
    pub fn el(&self) -> Option<HostNode> {
        let subtree = self.subtree.borrow();
        subtree.as_ref().and_then(first_host)
    }

    /// Queue a re-render regardless of dependencies.
    pub fn force_update(&self) {
        let job = self.job.borrow().clone();
        if let (Some(job), Some(rt)) = (job, self.ctx.runtime()) {
            rt.queue_job(job);
        }
    }

    fn collect_hooks(&self, kind: LifecycleHook) -> Vec<Hook> {
        let mut hooks = self.def.hooks(kind).to_vec();
        hooks.extend(self.hooks.get(kind));
        hooks
    }

    fn call_hooks(&self, rt: &Runtime, kind: LifecycleHook) {
        let hooks = self.collect_hooks(kind);
        rt.untracked(|| {
            for hook in &hooks {
                hook(&self.ctx);
            }
        });
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.def.name)
            .field("mounted", &self.mounted.get())
            .field("unmounted", &self.unmounted.get())
            .finish()
    }
}

/// Split a node's props into declared props (plus event bindings) and
/// fallthrough attrs. Declared props that were not passed resolve to
/// `Null`.
pub(crate) fn resolve_props(def: &ComponentDef, raw: &Props) -> (Props, Props) {
    let mut props = Props::new();
    let mut attrs = Props::new();
    for (key, value) in raw {
        if def.props.contains(key) || is_event_prop(key) {
            props.insert(Rc::clone(key), value.clone());
        } else {
            attrs.insert(Rc::clone(key), value.clone());
        }
    }
    for declared in &def.props {
        if !props.contains_key(declared) {
            props.insert(Rc::clone(declared), Value::Null);
        }
    }
    (props, attrs)
}

pub(crate) fn has_props_changed(prev: &Props, next: &Props) -> bool {
    prev.len() != next.len()
        || next
            .iter()
            .any(|(key, value)| prev.get(key).map_or(true, |old| !old.same_value(value)))
}

/// Replace a raw record's fields without triggering. Returns whether
/// anything changed.
fn replace_fields(raw: &RawObject, next: &Props) -> bool {
    let mut data = raw.data_mut();
    let Container::Record(record) = &mut *data else {
        return false;
    };
    let changed = record.fields.len() != next.len()
        || next
            .iter()
            .any(|(key, value)| record.fields.get(key).map_or(true, |old| !old.same_value(value)));
    if changed {
        record.fields = next.iter().map(|(k, v)| (Rc::clone(k), v.to_raw())).collect();
    }
    changed
}

// ----------------------------------------------------------------------------
// Mounting, patching and unmounting
// ----------------------------------------------------------------------------

impl<A: HostAdapter + 'static> Renderer<A> {
    pub(crate) fn mount_component(
        &self,
        vnode: &VNode,
        def: &Rc<ComponentDef>,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let rt = self.runtime().clone();
        rt.untracked(|| {
            for hook in &def.before_create {
                hook();
            }
        });

        let state_raw = match &def.data {
            Some(data) => rt.untracked(|| data()),
            None => RawObject::record(),
        };
        let state = rt.reactive(&state_raw);
        let (props, attrs) = resolve_props(def, &vnode.props);
        let props = rt.shallow_reactive(&RawObject::record_from(props));
        let attrs = rt.shallow_readonly(&RawObject::record_from(attrs));
        let children = Rc::new(RefCell::new(vnode.children.nodes().to_vec()));
        let emitter = Emitter {
            component: Rc::clone(&def.name),
            props: props.raw().clone(),
            runtime: rt.downgrade(),
        };

        let hooks = Rc::new(InstanceHooks::default());
        let mut render = def.render.clone();
        let mut setup_state = None;
        if let Some(setup) = &def.setup {
            let setup_ctx = SetupContext {
                attrs: attrs.clone(),
                emitter: emitter.clone(),
                children: Rc::clone(&children),
                runtime: rt.downgrade(),
            };
            let readonly_props = props.as_shallow_readonly();
            let result = {
                let _current = CurrentInstance::enter(&rt, &hooks);
                rt.untracked(|| setup(&readonly_props, &setup_ctx))
            };
            match result {
                SetupResult::Render(setup_render) => {
                    if render.is_some() {
                        rt.warn(Warning::RenderOverride {
                            component: def.name.to_string(),
                        });
                    }
                    render = Some(setup_render);
                }
                SetupResult::Bindings(raw) => setup_state = Some(rt.reactive(&raw)),
                SetupResult::None => {}
            }
        }
        let render: RenderFn = match render {
            Some(render) => render,
            None => {
                rt.warn(Warning::MissingRender {
                    component: def.name.to_string(),
                });
                Rc::new(|_: &RenderContext| VNode::fragment([]))
            }
        };

        let ctx = RenderContext {
            name: Rc::clone(&def.name),
            state,
            props,
            attrs,
            setup_state,
            children,
            emitter,
            runtime: rt.downgrade(),
        };
        let instance = Rc::new(ComponentInstance {
            def: Rc::clone(def),
            ctx,
            render,
            hooks,
            subtree: RefCell::new(None),
            mounted: Cell::new(false),
            unmounted: Cell::new(false),
            update: RefCell::new(None),
            job: RefCell::new(None),
            container,
            anchor,
        });
        instance.call_hooks(&rt, LifecycleHook::Created);
        *vnode.component.borrow_mut() = Some(Rc::clone(&instance));
        debug!(component = %def.name, "mount component");

        let job: Job = {
            let instance = Rc::downgrade(&instance);
            let renderer = Rc::downgrade(&self.inner);
            Rc::new(move || {
                if let (Some(instance), Some(inner)) = (instance.upgrade(), renderer.upgrade()) {
                    Renderer { inner }.run_update_job(&instance);
                }
            })
        };
        *instance.job.borrow_mut() = Some(Rc::clone(&job));

        let scheduler_rt = rt.downgrade();
        let options = EffectOptions::new().name("component").scheduler(move |_| {
            if let Some(rt) = scheduler_rt.upgrade() {
                rt.queue_job(Rc::clone(&job));
            }
        });
        let body = {
            let instance = Rc::downgrade(&instance);
            let renderer = Rc::downgrade(&self.inner);
            move || {
                if let (Some(instance), Some(inner)) = (instance.upgrade(), renderer.upgrade()) {
                    Renderer { inner }.render_component(&instance);
                }
            }
        };
        let effect = rt.effect_with(body, options);
        *instance.update.borrow_mut() = Some(effect);
    }

    /// Body of the render effect.
    fn render_component(&self, instance: &Rc<ComponentInstance>) {
        if instance.unmounted.get() {
            return;
        }
        let rt = self.runtime();
        if !instance.mounted.get() {
            instance.call_hooks(rt, LifecycleHook::BeforeMount);
            let subtree = (instance.render)(&instance.ctx);
            self.patch(None, &subtree, instance.container, instance.anchor);
            *instance.subtree.borrow_mut() = Some(subtree);
            instance.mounted.set(true);
            self.queue_hooks(instance, LifecycleHook::Mounted);
        } else {
            instance.call_hooks(rt, LifecycleHook::BeforeUpdate);
            let subtree = (instance.render)(&instance.ctx);
            let previous = instance.subtree.borrow_mut().take();
            self.patch(previous.as_ref(), &subtree, instance.container, None);
            *instance.subtree.borrow_mut() = Some(subtree);
            trace!(component = %instance.def.name, "component updated");
            self.queue_hooks(instance, LifecycleHook::Updated);
        }
    }

    fn run_update_job(&self, instance: &Rc<ComponentInstance>) {
        self.batch(|| {
            if instance.unmounted.get() {
                return;
            }
            let effect = instance.update.borrow().clone();
            if let Some(effect) = effect {
                effect.run();
            }
        });
    }

    fn queue_hooks(&self, instance: &ComponentInstance, kind: LifecycleHook) {
        let hooks = instance.collect_hooks(kind);
        if hooks.is_empty() {
            return;
        }
        let ctx = instance.ctx.clone();
        self.queue_post(Box::new(move || {
            for hook in &hooks {
                hook(&ctx);
            }
        }));
    }

    pub(crate) fn patch_component(
        &self,
        old: &VNode,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) {
        let instance = old.component.borrow_mut().take();
        let Some(instance) = instance else {
            if let super::vnode::NodeKind::Component(def) = &new.kind {
                self.mount_component(new, def, container, anchor);
            }
            return;
        };
        *new.component.borrow_mut() = Some(Rc::clone(&instance));

        let mut force = false;
        if has_props_changed(&old.props, &new.props) {
            let (props, attrs) = resolve_props(&instance.def, &new.props);
            let target = &instance.ctx.props;
            for (key, value) in &props {
                target.set(key, value.clone());
            }
            for key in target.raw().keys() {
                if !props.contains_key(&key) {
                    target.delete(&key);
                }
            }
            force |= replace_fields(instance.ctx.attrs.raw(), &attrs);
        }
        if !old.children.is_empty() || !new.children.is_empty() {
            *instance.ctx.children.borrow_mut() = new.children.nodes().to_vec();
            force = true;
        }
        if force {
            instance.force_update();
        }
    }

    pub(crate) fn unmount_component(&self, instance: &Rc<ComponentInstance>, container: HostNode, detach: bool) {
        if instance.unmounted.replace(true) {
            return;
        }
        let rt = self.runtime();
        instance.call_hooks(rt, LifecycleHook::BeforeUnmount);

        let effect = instance.update.borrow_mut().take();
        if let Some(effect) = effect {
            effect.stop();
        }
        instance.job.borrow_mut().take();

        let subtree = instance.subtree.borrow_mut().take();
        if let Some(subtree) = subtree {
            self.unmount_inner(&subtree, container, detach);
        }
        debug!(component = %instance.def.name, "unmount component");
        self.queue_hooks(instance, LifecycleHook::Unmounted);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
