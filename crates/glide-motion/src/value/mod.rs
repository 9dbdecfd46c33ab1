//! Reactive values.
//!
//! A [`MotionValue`] holds the latest state of one animatable style key. It
//! tracks velocity, notifies subscribers on change, and owns at most one
//! running animation.
//!
//! # Usage
//!
//! ```ignore
//! let x = MotionValue::new(&scheduler, 0.0);
//! let sub = x.on_change(|v| println!("x = {v}"));
//! x.set(100.0);
//! println!("velocity {}", x.get_velocity());
//! sub.unsubscribe();
//! ```

mod subscriptions;

pub use subscriptions::{Listener, Subscription};

use crate::animation::PlaybackControls;
use crate::frameloop::Scheduler;
use crate::types::{AnimatableValue, AnimationId};
use glide_config::VelocityConfig;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use subscriptions::SubscriberRegistry;

/// Events a [`MotionValue`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueEvent {
    /// The value changed.
    Change,
    /// The value was written and its owner should re-render.
    RenderRequest,
    AnimationStart,
    AnimationComplete,
    AnimationCancel,
}

pub(crate) struct ValueInner {
    scheduler: Scheduler,
    current: RefCell<AnimatableValue>,
    prev: RefCell<Option<AnimatableValue>>,
    prev_frame_value: RefCell<Option<AnimatableValue>>,
    updated_at: Cell<f64>,
    prev_updated_at: Cell<Option<f64>>,
    can_track_velocity: bool,
    max_value_age_ms: Cell<f64>,
    has_animated: Cell<bool>,
    animation: RefCell<Option<Rc<dyn PlaybackControls>>>,
    events: SubscriberRegistry,
}

/// An observable animatable value.
///
/// Cloning gives another handle to the same value.
#[derive(Clone)]
pub struct MotionValue {
    inner: Rc<ValueInner>,
}

/// Non-owning handle used by animations and listeners.
#[derive(Clone)]
pub struct WeakMotionValue {
    inner: Weak<ValueInner>,
}

impl WeakMotionValue {
    pub fn upgrade(&self) -> Option<MotionValue> {
        self.inner.upgrade().map(|inner| MotionValue { inner })
    }
}

impl std::fmt::Debug for MotionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionValue")
            .field("current", &*self.inner.current.borrow())
            .field("is_animating", &self.is_animating())
            .finish()
    }
}

impl MotionValue {
    /// Create a value with `initial` as its current state.
    pub fn new(scheduler: &Scheduler, initial: impl Into<AnimatableValue>) -> Self {
        let initial = initial.into();
        Self {
            inner: Rc::new(ValueInner {
                scheduler: scheduler.clone(),
                can_track_velocity: initial.is_float(),
                current: RefCell::new(initial),
                prev: RefCell::new(None),
                prev_frame_value: RefCell::new(None),
                updated_at: Cell::new(scheduler.now()),
                prev_updated_at: Cell::new(None),
                max_value_age_ms: Cell::new(VelocityConfig::default().max_value_age_ms),
                has_animated: Cell::new(false),
                animation: RefCell::new(None),
                events: SubscriberRegistry::default(),
            }),
        }
    }

    /// Apply velocity tracking settings.
    pub fn with_velocity_config(self, config: &VelocityConfig) -> Self {
        self.inner.max_value_age_ms.set(config.max_value_age_ms);
        self
    }

    pub fn downgrade(&self) -> WeakMotionValue {
        WeakMotionValue {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles point at the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// The current value.
    pub fn get(&self) -> AnimatableValue {
        self.inner.current.borrow().clone()
    }

    /// The current value as a number, if it parses as one.
    pub fn get_f64(&self) -> Option<f64> {
        self.inner.current.borrow().as_f64()
    }

    /// The value before the most recent write.
    pub fn get_previous(&self) -> Option<AnimatableValue> {
        self.inner.prev.borrow().clone()
    }

    /// Write a new value, notifying `change` (if it changed) and `renderRequest`.
    pub fn set(&self, value: impl Into<AnimatableValue>) {
        self.update_and_notify(value.into(), true);
    }

    /// Write a new value without requesting a render.
    pub fn set_silently(&self, value: impl Into<AnimatableValue>) {
        self.update_and_notify(value.into(), false);
    }

    /// Write `current` as though the value moved from `prev` over `delta` ms.
    pub fn set_with_velocity(
        &self,
        prev: impl Into<AnimatableValue>,
        current: impl Into<AnimatableValue>,
        delta: f64,
    ) {
        self.set(current);
        let inner = &self.inner;
        *inner.prev.borrow_mut() = None;
        *inner.prev_frame_value.borrow_mut() = Some(prev.into());
        inner.prev_updated_at.set(Some(inner.updated_at.get() - delta));
    }

    /// Write a value without velocity and stop any running animation.
    pub fn jump(&self, value: impl Into<AnimatableValue>) {
        self.jump_without_stopping(value);
        self.stop();
    }

    /// Write a value without velocity, leaving any animation attached.
    ///
    /// Used by measurement passes that briefly move a value and restore it.
    pub fn jump_without_stopping(&self, value: impl Into<AnimatableValue>) {
        let value = value.into();
        self.update_and_notify(value.clone(), true);
        let inner = &self.inner;
        *inner.prev.borrow_mut() = Some(value);
        *inner.prev_frame_value.borrow_mut() = None;
        inner.prev_updated_at.set(None);
    }

    fn update_and_notify(&self, value: AnimatableValue, render: bool) {
        let inner = &self.inner;
        let now = inner.scheduler.now();
        if inner.updated_at.get() != now {
            *inner.prev_frame_value.borrow_mut() = Some(inner.current.borrow().clone());
            inner.prev_updated_at.set(Some(inner.updated_at.get()));
        }

        let prev = inner.current.replace(value.clone());
        let changed = prev != value;
        *inner.prev.borrow_mut() = Some(prev);
        inner.updated_at.set(now);

        if changed {
            inner.events.notify(ValueEvent::Change, &value);
        }
        if render {
            inner.events.notify(ValueEvent::RenderRequest, &value);
        }
    }

    /// Velocity in units per second.
    ///
    /// Zero when the value is not numeric, has only been written once, or
    /// was last written longer ago than the staleness window.
    pub fn get_velocity(&self) -> f64 {
        let inner = &self.inner;
        let now = inner.scheduler.now();
        let prev_frame = inner.prev_frame_value.borrow();
        let (Some(prev_frame), Some(prev_updated_at)) = (prev_frame.as_ref(), inner.prev_updated_at.get())
        else {
            return 0.0;
        };
        if !inner.can_track_velocity || now - inner.updated_at.get() > inner.max_value_age_ms.get() {
            return 0.0;
        }
        let (Some(current), Some(previous)) = (inner.current.borrow().as_f64(), prev_frame.as_f64()) else {
            return 0.0;
        };
        velocity_per_second(current - previous, inner.updated_at.get() - prev_updated_at)
    }

    /// Subscribe to an event.
    pub fn on<F: Fn(&AnimatableValue) + 'static>(&self, event: ValueEvent, callback: F) -> Subscription {
        let id = self.inner.events.add(event, Rc::new(callback));
        Subscription::new(self.downgrade(), event, id)
    }

    /// Subscribe to `change`.
    pub fn on_change<F: Fn(&AnimatableValue) + 'static>(&self, callback: F) -> Subscription {
        self.on(ValueEvent::Change, callback)
    }

    pub(crate) fn remove_listener(&self, event: ValueEvent, id: u64) {
        self.inner.events.remove(event, id);
        if event == ValueEvent::Change {
            let weak = self.downgrade();
            self.inner.scheduler.read(move |_| {
                if let Some(value) = weak.upgrade() {
                    if value.inner.events.len(ValueEvent::Change) == 0 {
                        value.stop();
                    }
                }
            });
        }
    }

    /// Number of listeners for `event`.
    pub fn listener_count(&self, event: ValueEvent) -> usize {
        self.inner.events.len(event)
    }

    /// Attach `animation`, stopping whatever was running before.
    pub fn start(&self, animation: Rc<dyn PlaybackControls>) {
        self.stop();
        self.inner.has_animated.set(true);
        *self.inner.animation.borrow_mut() = Some(animation);
        self.notify(ValueEvent::AnimationStart);
    }

    /// Called by an animation that finished on its own.
    ///
    /// Ignored unless `id` is the attached animation.
    pub(crate) fn finish_animation(&self, id: AnimationId) {
        let is_current = self.inner.animation.borrow().as_ref().is_some_and(|a| a.id() == id);
        if is_current {
            self.notify(ValueEvent::AnimationComplete);
            self.clear_animation_if(id);
        }
    }

    /// Stop the running animation, if any, and emit `animationCancel`.
    ///
    /// Listeners still see the stopped animation through [`Self::animation`].
    pub fn stop(&self) {
        let animation = self.inner.animation.borrow().clone();
        if let Some(animation) = animation {
            animation.stop();
            self.notify(ValueEvent::AnimationCancel);
            self.clear_animation_if(animation.id());
        }
    }

    fn clear_animation_if(&self, id: AnimationId) {
        let mut slot = self.inner.animation.borrow_mut();
        if slot.as_ref().is_some_and(|a| a.id() == id) {
            slot.take();
        }
    }

    pub fn clear_animation(&self) {
        self.inner.animation.borrow_mut().take();
    }

    pub fn is_animating(&self) -> bool {
        self.inner.animation.borrow().is_some()
    }

    /// The running animation, if any.
    pub fn animation(&self) -> Option<Rc<dyn PlaybackControls>> {
        self.inner.animation.borrow().clone()
    }

    /// Whether an animation has ever been started on this value.
    pub fn has_animated(&self) -> bool {
        self.inner.has_animated.get()
    }

    /// Drop every subscriber and stop the running animation.
    pub fn destroy(&self) {
        self.inner.events.clear();
        self.stop();
    }

    fn notify(&self, event: ValueEvent) {
        let current = self.get();
        self.inner.events.notify(event, &current);
    }
}

/// Convert a per-frame delta to a per-second velocity.
#[inline]
pub fn velocity_per_second(velocity: f64, frame_duration: f64) -> f64 {
    if frame_duration != 0.0 {
        velocity * (1000.0 / frame_duration)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frameloop::ManualClock;

    fn setup() -> (ManualClock, Scheduler) {
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(clock.clone());
        (clock, scheduler)
    }

    #[test]
    fn test_velocity_over_100ms() {
        let (clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, 0.0);
        value.set(10.0);
        clock.advance(100.0);
        value.set(20.0);
        assert!((value.get_velocity() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_goes_stale() {
        let (clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, 0.0);
        clock.advance(10.0);
        value.set(10.0);
        clock.advance(31.0);
        assert_eq!(value.get_velocity(), 0.0);
    }

    #[test]
    fn test_velocity_untracked_for_strings() {
        let (clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, "auto");
        clock.advance(10.0);
        value.set("10px");
        assert_eq!(value.get_velocity(), 0.0);
    }

    #[test]
    fn test_same_frame_writes_coalesce() {
        let (clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, 0.0);
        clock.advance(10.0);
        value.set(5.0);
        value.set(10.0);
        // prev frame value stays 0 so velocity spans both writes
        assert!((value.get_velocity() - 1000.0).abs() < 1e-9);
        assert_eq!(value.get_previous(), Some(AnimatableValue::Number(5.0)));
    }

    #[test]
    fn test_change_fires_only_on_change() {
        let (_clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, 1.0);
        let changes = Rc::new(Cell::new(0));
        let renders = Rc::new(Cell::new(0));
        let _c = {
            let changes = changes.clone();
            value.on_change(move |_| changes.set(changes.get() + 1))
        };
        let _r = {
            let renders = renders.clone();
            value.on(ValueEvent::RenderRequest, move |_| renders.set(renders.get() + 1))
        };
        value.set(1.0);
        value.set(2.0);
        assert_eq!(changes.get(), 1);
        assert_eq!(renders.get(), 2);
    }

    #[test]
    fn test_set_with_velocity() {
        let (clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, 0.0);
        clock.advance(100.0);
        value.set_with_velocity(0.0, 50.0, 50.0);
        assert!((value.get_velocity() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_jump_clears_velocity() {
        let (clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, 0.0);
        clock.advance(10.0);
        value.set(10.0);
        value.jump(50.0);
        assert_eq!(value.get_velocity(), 0.0);
        assert_eq!(value.get(), AnimatableValue::Number(50.0));
    }

    #[test]
    fn test_unsubscribe_during_notify() {
        let (_clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, 0.0);
        let calls = Rc::new(Cell::new(0));
        let second: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let _first = {
            let second = second.clone();
            value.on_change(move |_| {
                if let Some(sub) = second.borrow_mut().take() {
                    sub.unsubscribe();
                }
            })
        };
        *second.borrow_mut() = Some({
            let calls = calls.clone();
            value.on_change(move |_| calls.set(calls.get() + 1))
        });
        value.set(1.0);
        value.set(2.0);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_destroy_clears_listeners() {
        let (_clock, scheduler) = setup();
        let value = MotionValue::new(&scheduler, 0.0);
        let _sub = value.on_change(|_| {});
        value.destroy();
        assert_eq!(value.listener_count(ValueEvent::Change), 0);
    }

    #[test]
    fn test_last_change_listener_stops_animation() {
        use crate::animation::{Transition, animate_motion_value};
        use crate::context::MotionContext;
        use glide_config::GlideConfig;

        let clock = ManualClock::new();
        let ctx = MotionContext::new(clock.clone(), GlideConfig::default());
        let frame = || {
            clock.advance(16.0);
            ctx.scheduler().process_frame();
        };
        let value = MotionValue::new(ctx.scheduler(), 0.0);
        let first = value.on_change(|_| {});
        let second = value.on_change(|_| {});
        animate_motion_value(&ctx, "opacity", &value, 1.0.into(), &Transition::tween(1000.0).into(), None);
        frame();
        assert!(value.is_animating());

        // Another listener is still observing.
        first.unsubscribe();
        frame();
        assert!(value.is_animating());

        second.unsubscribe();
        frame();
        assert!(!value.is_animating());
        let stopped_at = value.get_f64().unwrap_or_default();
        frame();
        assert_eq!(value.get_f64(), Some(stopped_at));
        assert!(stopped_at < 1.0);
    }
}
