//! Visual elements.
//!
//! A [`VisualElement`] owns the reactive values for one rendered instance.
//! It keeps a map of the latest value per style key, schedules a render
//! whenever a value requests one, and talks to the rendering backend only
//! through an [`InstanceAdapter`].
//!
//! # Usage
//!
//! ```ignore
//! let element = VisualElement::new(&ctx, Rc::new(MyAdapter::new(node)));
//! let controls = element.animate("opacity", 0.0, &Transition::tween(200.0).into());
//! ```

mod render;

pub use render::{RenderState, build_transform, default_unit, to_css};

use crate::animation::events::{AnimationEvent, EventQueue};
use crate::animation::native::{NativeKeyframes, NativeTimeline};
use crate::animation::{GroupPlaybackControls, PlaybackControls, TransitionGroup, ValueTarget, animate_motion_value};
use crate::context::MotionContext;
use crate::error::{MotionError, Result};
use crate::frameloop::{Phase, Process, process};
use crate::projection::ProjectionStyles;
use crate::projection::geometry::{Point, Rect};
use crate::types::{AnimatableValue, AnimationId, default_value_for, is_transform_key, parse_float};
use crate::value::{MotionValue, Subscription, ValueEvent};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// The rendering backend for one instance.
///
/// The engine never touches backend objects directly; every read, write
/// and measurement goes through this trait.
pub trait InstanceAdapter {
    /// Read a computed style value from the instance.
    fn read_value(&self, key: &str) -> Option<AnimatableValue>;

    /// Build styles from the latest values.
    fn build(&self, latest: &BTreeMap<String, AnimatableValue>, projection: Option<&ProjectionStyles>) -> RenderState {
        RenderState::build(latest, projection)
    }

    /// Write built styles to the instance.
    fn render(&self, state: &RenderState);

    /// Measure the instance's box in viewport coordinates.
    ///
    /// # Errors
    /// [`MotionError::Measurement`] if the instance is detached.
    fn measure_viewport_box(&self) -> Result<Rect>;

    /// Value of a CSS custom property (`--name`) as seen by the instance.
    fn read_css_variable(&self, _name: &str) -> Option<String> {
        None
    }

    /// Current scroll offset, for scroll containers.
    fn measure_scroll(&self) -> Point {
        Point::ZERO
    }

    /// Whether [`Self::start_native_timeline`] can be used.
    fn supports_native_timelines(&self) -> bool {
        false
    }

    /// Hand keyframes to a platform timeline. `None` falls back to
    /// software playback.
    fn start_native_timeline(&self, _key: &str, _keyframes: &NativeKeyframes) -> Option<Box<dyn NativeTimeline>> {
        None
    }
}

/// Unique identifier for a visual element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl ElementId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

type UpdateHook = Rc<dyn Fn(&BTreeMap<String, AnimatableValue>)>;
type LifecycleEvent = fn(AnimationId, ElementId, String) -> AnimationEvent;

struct OwnedValue {
    value: MotionValue,
    subscriptions: Vec<Subscription>,
}

struct ElementInner {
    id: ElementId,
    ctx: MotionContext,
    adapter: Rc<dyn InstanceAdapter>,
    values: RefCell<BTreeMap<String, OwnedValue>>,
    latest: RefCell<BTreeMap<String, AnimatableValue>>,
    projection: RefCell<Option<ProjectionStyles>>,
    render_job: Process,
    mounted: Cell<bool>,
    transform_dirty: Cell<bool>,
    on_update: RefCell<Option<UpdateHook>>,
    events: RefCell<EventQueue>,
}

/// Owner of the reactive values of one rendered instance.
///
/// Cloning gives another handle to the same element.
#[derive(Clone)]
pub struct VisualElement {
    inner: Rc<ElementInner>,
}

/// Non-owning element handle held by animations and resolvers.
#[derive(Clone)]
pub struct WeakVisualElement {
    inner: Weak<ElementInner>,
}

impl WeakVisualElement {
    pub fn upgrade(&self) -> Option<VisualElement> {
        self.inner.upgrade().map(|inner| VisualElement { inner })
    }
}

impl std::fmt::Debug for VisualElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualElement")
            .field("id", &self.inner.id)
            .field("latest", &*self.inner.latest.borrow())
            .field("mounted", &self.inner.mounted.get())
            .finish()
    }
}

impl VisualElement {
    /// Create a mounted element rendering through `adapter`.
    pub fn new(ctx: &MotionContext, adapter: Rc<dyn InstanceAdapter>) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ElementInner>| {
            let weak = weak.clone();
            ElementInner {
                id: ElementId::new(),
                ctx: ctx.clone(),
                adapter,
                values: RefCell::new(BTreeMap::new()),
                latest: RefCell::new(BTreeMap::new()),
                projection: RefCell::new(None),
                render_job: process(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        VisualElement { inner }.render();
                    }
                }),
                mounted: Cell::new(true),
                transform_dirty: Cell::new(false),
                on_update: RefCell::new(None),
                events: RefCell::new(EventQueue::new()),
            }
        });
        Self { inner }
    }

    pub fn id(&self) -> ElementId {
        self.inner.id
    }

    pub fn downgrade(&self) -> WeakVisualElement {
        WeakVisualElement {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn context(&self) -> &MotionContext {
        &self.inner.ctx
    }

    pub fn adapter(&self) -> &Rc<dyn InstanceAdapter> {
        &self.inner.adapter
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Register a callback run after every render with the latest values.
    ///
    /// While set, animations on this element take the software path so
    /// the callback sees every frame.
    pub fn set_on_update<F: Fn(&BTreeMap<String, AnimatableValue>) + 'static>(&self, f: F) {
        *self.inner.on_update.borrow_mut() = Some(Rc::new(f));
    }

    pub fn has_update_listener(&self) -> bool {
        self.inner.on_update.borrow().is_some()
    }

    pub fn get_value(&self, key: &str) -> Option<MotionValue> {
        self.inner.values.borrow().get(key).map(|owned| owned.value.clone())
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.inner.values.borrow().contains_key(key)
    }

    /// The value for `key`, created from `default` if missing.
    pub fn get_or_create_value(&self, key: &str, default: impl Into<AnimatableValue>) -> MotionValue {
        if let Some(value) = self.get_value(key) {
            return value;
        }
        let value = MotionValue::new(self.inner.ctx.scheduler(), default).with_velocity_config(&self.inner.ctx.config().velocity);
        self.add_value(key, value.clone());
        value
    }

    /// Take ownership of `value` under `key`, replacing any previous value.
    pub fn add_value(&self, key: &str, value: MotionValue) {
        if let Some(existing) = self.get_value(key) {
            if existing.ptr_eq(&value) {
                return;
            }
            self.remove_value(key);
        }

        self.inner.latest.borrow_mut().insert(key.to_string(), value.get());
        let subscriptions = self.bind(key, &value);
        self.inner.values.borrow_mut().insert(key.to_string(), OwnedValue { value, subscriptions });
    }

    fn bind(&self, key: &str, value: &MotionValue) -> Vec<Subscription> {
        let weak = self.downgrade();
        let name = key.to_string();
        let is_transform = is_transform_key(key);
        let on_change = value.on_change(move |latest| {
            if let Some(element) = weak.upgrade() {
                element.inner.latest.borrow_mut().insert(name.clone(), latest.clone());
                if is_transform {
                    element.inner.transform_dirty.set(true);
                }
            }
        });

        let weak = self.downgrade();
        let on_render = value.on(ValueEvent::RenderRequest, move |_| {
            if let Some(element) = weak.upgrade() {
                element.schedule_render();
            }
        });

        let mut subscriptions = vec![on_change, on_render];
        let lifecycle: [(ValueEvent, LifecycleEvent); 3] = [
            (ValueEvent::AnimationStart, |animation_id, element_id, key| AnimationEvent::Started {
                animation_id,
                element_id,
                key,
            }),
            (ValueEvent::AnimationComplete, |animation_id, element_id, key| AnimationEvent::Completed {
                animation_id,
                element_id,
                key,
            }),
            (ValueEvent::AnimationCancel, |animation_id, element_id, key| AnimationEvent::Cancelled {
                animation_id,
                element_id,
                key,
            }),
        ];
        for (event, make) in lifecycle {
            let weak = self.downgrade();
            let value_handle = value.downgrade();
            let name = key.to_string();
            subscriptions.push(value.on(event, move |_| {
                let (Some(element), Some(value)) = (weak.upgrade(), value_handle.upgrade()) else {
                    return;
                };
                if let Some(animation) = value.animation() {
                    let event = make(animation.id(), element.id(), name.clone());
                    element.inner.events.borrow_mut().push(event);
                }
            }));
        }
        subscriptions
    }

    /// Detach and forget the value for `key`.
    pub fn remove_value(&self, key: &str) {
        let owned = self.inner.values.borrow_mut().remove(key);
        self.inner.latest.borrow_mut().remove(key);
        if let Some(owned) = owned {
            for subscription in owned.subscriptions {
                subscription.unsubscribe();
            }
        }
    }

    /// Snapshot of the latest value per key.
    pub fn latest_values(&self) -> BTreeMap<String, AnimatableValue> {
        self.inner.latest.borrow().clone()
    }

    pub fn latest(&self, key: &str) -> Option<AnimatableValue> {
        self.inner.latest.borrow().get(key).cloned()
    }

    /// Best known value for `key`: the latest write, then the instance's
    /// computed style, then the key's default.
    ///
    /// Numeric strings read from the instance are returned as numbers.
    pub fn read_value(&self, key: &str) -> Option<AnimatableValue> {
        if let Some(latest) = self.latest(key) {
            return Some(latest);
        }
        let read = self.inner.adapter.read_value(key).map(|value| match &value {
            AnimatableValue::Text(s) if is_numerical_string(s) => parse_float(s).map(AnimatableValue::Number).unwrap_or(value),
            _ => value,
        });
        read.or_else(|| default_value_for(key))
    }

    /// Queue a render for this frame's render phase.
    pub fn schedule_render(&self) {
        if !self.is_mounted() {
            return;
        }
        self.inner
            .ctx
            .scheduler()
            .schedule(Phase::Render, self.inner.render_job.clone(), false, true);
    }

    /// Build and write styles now.
    pub fn render(&self) {
        if !self.is_mounted() {
            return;
        }
        let state = {
            let latest = self.inner.latest.borrow();
            let projection = self.inner.projection.borrow();
            self.inner.adapter.build(&latest, projection.as_ref())
        };
        self.inner.adapter.render(&state);

        let hook = self.inner.on_update.borrow().clone();
        if let Some(hook) = hook {
            let latest = self.latest_values();
            hook(&latest);
        }
    }

    /// Set (or clear) the projection output applied on the next render.
    pub fn set_projection_styles(&self, styles: Option<ProjectionStyles>) {
        *self.inner.projection.borrow_mut() = styles;
        self.schedule_render();
    }

    pub fn projection_styles(&self) -> Option<ProjectionStyles> {
        self.inner.projection.borrow().clone()
    }

    /// Whether a transform value changed since the last call.
    pub fn take_transform_dirty(&self) -> bool {
        self.inner.transform_dirty.replace(false)
    }

    pub fn measure_viewport_box(&self) -> Result<Rect> {
        if !self.is_mounted() {
            return Err(MotionError::Measurement(format!("element {} is unmounted", self.id().0)));
        }
        self.inner.adapter.measure_viewport_box()
    }

    /// Reset every transform other than x/y translation to its identity so
    /// geometry can be measured without rotation or scale.
    ///
    /// Returns the values that were reset, for restoring afterwards.
    pub fn remove_non_translational_transforms(&self) -> Vec<(String, AnimatableValue)> {
        let owned: Vec<(String, MotionValue)> = self
            .inner
            .values
            .borrow()
            .iter()
            .filter(|(key, _)| is_transform_key(key) && !matches!(key.as_str(), "x" | "y" | "translateX" | "translateY"))
            .map(|(key, owned)| (key.clone(), owned.value.clone()))
            .collect();

        let mut removed = Vec::new();
        for (key, value) in owned {
            let Some(identity) = default_value_for(&key) else {
                continue;
            };
            let current = value.get();
            if current != identity {
                value.jump_without_stopping(identity);
                removed.push((key, current));
            }
        }
        removed
    }

    /// Animate `key` to `target`.
    pub fn animate(&self, key: &str, target: impl Into<ValueTarget>, transition: &TransitionGroup) -> Rc<dyn PlaybackControls> {
        let target = target.into();
        let value = match self.get_value(key) {
            Some(value) => value,
            None => {
                let initial = self
                    .read_value(key)
                    .or_else(|| target.first_defined())
                    .unwrap_or(AnimatableValue::Number(0.0));
                self.get_or_create_value(key, initial)
            }
        };
        animate_motion_value(&self.inner.ctx, key, &value, target, transition, Some(self))
    }

    /// Animate several keys with one transition group.
    pub fn animate_values<K, T>(&self, targets: impl IntoIterator<Item = (K, T)>, transition: &TransitionGroup) -> GroupPlaybackControls
    where
        K: AsRef<str>,
        T: Into<ValueTarget>,
    {
        let animations = targets
            .into_iter()
            .map(|(key, target)| self.animate(key.as_ref(), target, transition))
            .collect();
        GroupPlaybackControls::new(animations)
    }

    /// Drain lifecycle events recorded since the last call.
    pub fn drain_events(&self) -> Vec<AnimationEvent> {
        self.inner.events.borrow_mut().drain().collect()
    }

    /// Stop rendering and destroy every owned value.
    pub fn unmount(&self) {
        if !self.inner.mounted.replace(false) {
            return;
        }
        debug!(element = self.id().0, "unmounting visual element");
        self.inner.ctx.scheduler().cancel(&self.inner.render_job);
        let owned = std::mem::take(&mut *self.inner.values.borrow_mut());
        for (_, owned) in owned {
            for subscription in owned.subscriptions {
                subscription.unsubscribe();
            }
            owned.value.destroy();
        }
        self.inner.latest.borrow_mut().clear();
    }
}

/// Whether `s` is a bare number such as `"10"` or `"-0.5"`.
pub(crate) fn is_numerical_string(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s.parse::<f64>().is_ok()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory adapter recording every render.
    #[derive(Default)]
    pub struct MockAdapter {
        pub computed: RefCell<BTreeMap<String, AnimatableValue>>,
        pub variables: RefCell<BTreeMap<String, String>>,
        pub rendered: RefCell<Vec<RenderState>>,
        pub bounds: Cell<Option<Rect>>,
    }

    impl MockAdapter {
        pub fn with_bounds(bounds: Rect) -> Self {
            let adapter = Self::default();
            adapter.bounds.set(Some(bounds));
            adapter
        }

        pub fn last_style(&self, key: &str) -> Option<String> {
            self.rendered.borrow().last().and_then(|s| s.style.get(key).cloned())
        }
    }

    impl InstanceAdapter for MockAdapter {
        fn read_value(&self, key: &str) -> Option<AnimatableValue> {
            self.computed.borrow().get(key).cloned()
        }

        fn render(&self, state: &RenderState) {
            self.rendered.borrow_mut().push(state.clone());
        }

        fn measure_viewport_box(&self) -> Result<Rect> {
            self.bounds
                .get()
                .ok_or_else(|| MotionError::Measurement("detached".into()))
        }

        fn read_css_variable(&self, name: &str) -> Option<String> {
            self.variables.borrow().get(name).cloned()
        }
    }
}
