//! Drag controls.

use super::constraints::{AxisConstraints, Constraints, DragConstraints, DragElastic, Elastic, apply_constraints, calc_origin};
use super::locks::{DragLockGuard, DragLocks};
use super::pan::{PanHandler, PanHandlers, PanSession};
use super::{DragAxis, DragDirection, PanInfo, PointerEvent};
use crate::animation::{Transition, animate_motion_value};
use crate::context::MotionContext;
use crate::element::VisualElement;
use crate::interpolate::mix;
use crate::projection::geometry::{Axis, Point};
use crate::projection::{NodeId, ProjectionTree};
use crate::types::AnimationState;
use crate::value::{MotionValue, Subscription, ValueEvent};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// How an element responds to dragging.
#[derive(Debug, Clone)]
pub struct DragOptions {
    pub direction: DragDirection,
    /// Lock to the first axis that moves past the lock threshold.
    pub direction_lock: bool,
    /// Skip the axis locks so nested drags can move together.
    pub propagation: bool,
    pub constraints: Option<DragConstraints>,
    /// Overshoot past the constraints. Unset uses the configured default
    /// while dragging and a rigid bounce on release.
    pub elastic: Option<DragElastic>,
    /// Carry the release velocity into the inertia animation.
    pub momentum: bool,
    /// Animate back to the origin on release.
    pub snap_to_origin: bool,
    /// Overrides for the release animation.
    pub transition: Option<Transition>,
}

impl Default for DragOptions {
    fn default() -> Self {
        Self {
            direction: DragDirection::Both,
            direction_lock: false,
            propagation: false,
            constraints: None,
            elastic: None,
            momentum: true,
            snap_to_origin: false,
            transition: None,
        }
    }
}

impl DragOptions {
    pub fn new(direction: DragDirection) -> Self {
        Self {
            direction,
            ..Default::default()
        }
    }

    pub fn with_constraints(mut self, constraints: impl Into<DragConstraints>) -> Self {
        self.constraints = Some(constraints.into());
        self
    }

    pub fn with_elastic(mut self, elastic: impl Into<DragElastic>) -> Self {
        self.elastic = Some(elastic.into());
        self
    }

    pub fn with_direction_lock(mut self) -> Self {
        self.direction_lock = true;
        self
    }

    pub fn with_propagation(mut self) -> Self {
        self.propagation = true;
        self
    }

    pub fn with_momentum(mut self, momentum: bool) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_snap_to_origin(mut self) -> Self {
        self.snap_to_origin = true;
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }
}

/// Drag callbacks. Start and end run on the post-render phase.
#[derive(Clone, Default)]
pub struct DragHandlers {
    pub on_drag_start: Option<PanHandler>,
    pub on_drag: Option<PanHandler>,
    pub on_drag_end: Option<PanHandler>,
    pub on_direction_lock: Option<Rc<dyn Fn(DragAxis)>>,
    /// All release animations finished.
    pub on_drag_transition_end: Option<Rc<dyn Fn()>>,
}

struct DragInner {
    element: VisualElement,
    ctx: MotionContext,
    options: RefCell<DragOptions>,
    handlers: DragHandlers,
    locks: DragLocks,
    session: RefCell<Option<PanSession>>,
    lock: RefCell<Option<DragLockGuard>>,
    is_dragging: Cell<bool>,
    locked_axis: Cell<Option<DragAxis>>,
    origin: Cell<Point>,
    constraints: Cell<Option<Constraints>>,
    elastic: Cell<Elastic>,
    projection: RefCell<Option<(ProjectionTree, NodeId)>>,
    transition_watch: RefCell<Vec<Subscription>>,
}

/// Drives an element's `x`/`y` values from pointer input.
#[derive(Clone)]
pub struct DragControls {
    inner: Rc<DragInner>,
}

impl DragControls {
    pub fn new(element: &VisualElement, options: DragOptions, handlers: DragHandlers) -> Self {
        Self::with_locks(element, options, handlers, DragLocks::global())
    }

    /// Use `locks` instead of the thread's shared locks.
    pub fn with_locks(element: &VisualElement, options: DragOptions, handlers: DragHandlers, locks: DragLocks) -> Self {
        Self {
            inner: Rc::new(DragInner {
                element: element.clone(),
                ctx: element.context().clone(),
                options: RefCell::new(options),
                handlers,
                locks,
                session: RefCell::new(None),
                lock: RefCell::new(None),
                is_dragging: Cell::new(false),
                locked_axis: Cell::new(None),
                origin: Cell::new(Point::ZERO),
                constraints: Cell::new(None),
                elastic: Cell::new(Elastic::default()),
                projection: RefCell::new(None),
                transition_watch: RefCell::new(Vec::new()),
            }),
        }
    }

    fn downgrade(&self) -> Weak<DragInner> {
        Rc::downgrade(&self.inner)
    }

    /// Block layout animations of `node` while dragging.
    pub fn attach_projection(&self, tree: &ProjectionTree, node: NodeId) {
        *self.inner.projection.borrow_mut() = Some((tree.clone(), node));
    }

    pub fn set_options(&self, options: DragOptions) {
        *self.inner.options.borrow_mut() = options;
    }

    pub fn is_dragging(&self) -> bool {
        self.inner.is_dragging.get()
    }

    /// The axis a direction lock settled on.
    pub fn locked_axis(&self) -> Option<DragAxis> {
        self.inner.locked_axis.get()
    }

    /// Constraints resolved at the start of the current drag.
    pub fn constraints(&self) -> Option<Constraints> {
        self.inner.constraints.get()
    }

    fn options(&self) -> DragOptions {
        self.inner.options.borrow().clone()
    }

    fn axis_value(&self, axis: DragAxis) -> MotionValue {
        self.inner.element.get_or_create_value(axis.key(), 0.0)
    }

    /// Begin a drag session for `event`. Secondary pointers are ignored.
    pub fn pointer_down(&self, event: PointerEvent) {
        let handler = |f: fn(&DragControls, &PointerEvent, &PanInfo)| -> Option<PanHandler> {
            let weak = self.downgrade();
            Some(Rc::new(move |event: &PointerEvent, info: &PanInfo| {
                if let Some(inner) = weak.upgrade() {
                    f(&DragControls { inner }, event, info);
                }
            }))
        };
        let handlers = PanHandlers {
            on_session_start: handler(|drag, _, _| drag.on_session_start()),
            on_start: handler(DragControls::on_start),
            on_move: handler(DragControls::on_move),
            on_end: None,
            on_session_end: handler(DragControls::stop),
        };
        let session = PanSession::new(&event, handlers, &self.inner.ctx);
        if let Some(previous) = self.inner.session.replace(session) {
            previous.end();
        }
    }

    pub fn pointer_move(&self, event: PointerEvent) {
        let session = self.inner.session.borrow().clone();
        if let Some(session) = session {
            session.pointer_move(event);
        }
    }

    pub fn pointer_up(&self, event: PointerEvent) {
        let session = self.inner.session.borrow().clone();
        if self.options().snap_to_origin {
            self.resume_animation();
        }
        if let Some(session) = session {
            session.pointer_up(event);
        }
    }

    pub fn pointer_cancel(&self, event: PointerEvent) {
        let session = self.inner.session.borrow().clone();
        if let Some(session) = session {
            session.pointer_cancel(event);
        }
    }

    fn on_session_start(&self) {
        if self.options().snap_to_origin {
            self.pause_animation();
        } else {
            self.stop_animation();
        }
    }

    fn on_start(&self, event: &PointerEvent, info: &PanInfo) {
        let options = self.options();
        if !options.propagation {
            // Free our own previous claim before asking again.
            self.inner.lock.replace(None);
            let Some(guard) = self.inner.locks.acquire(options.direction) else {
                debug!(direction = ?options.direction, "drag axis is locked by another drag");
                return;
            };
            *self.inner.lock.borrow_mut() = Some(guard);
        }

        self.inner.is_dragging.set(true);
        self.inner.locked_axis.set(None);
        self.resolve_constraints(&options);
        if let Some((tree, node)) = self.inner.projection.borrow().clone() {
            tree.set_animation_blocked(node, true);
        }

        let origin = Point::new(self.origin_of(DragAxis::X), self.origin_of(DragAxis::Y));
        self.inner.origin.set(origin);
        debug!(x = origin.x, y = origin.y, "drag started");

        if let Some(on_drag_start) = self.inner.handlers.on_drag_start.clone() {
            let (event, info) = (*event, *info);
            self.inner.ctx.scheduler().post_render(move |_| on_drag_start(&event, &info));
        }
    }

    /// Current value of `axis` in pixels. Percentages are taken of the
    /// element's measured size.
    fn origin_of(&self, axis: DragAxis) -> f64 {
        let current = self.axis_value(axis).get();
        let number = current.as_f64().unwrap_or(0.0);
        if current.unit() != Some("%") {
            return number;
        }
        match self.inner.element.measure_viewport_box() {
            Ok(rect) => {
                let length = match axis {
                    DragAxis::X => rect.x.length(),
                    DragAxis::Y => rect.y.length(),
                };
                length * number / 100.0
            }
            Err(err) => {
                warn!(%err, axis = axis.key(), "could not measure percentage drag origin");
                number
            }
        }
    }

    fn on_move(&self, event: &PointerEvent, info: &PanInfo) {
        let options = self.options();
        if !options.propagation && self.inner.lock.borrow().is_none() {
            return;
        }

        if options.direction_lock && self.inner.locked_axis.get().is_none() {
            let threshold = self.inner.ctx.config().drag.direction_lock_threshold;
            let locked = if info.offset.y.abs() > threshold {
                Some(DragAxis::Y)
            } else if info.offset.x.abs() > threshold {
                Some(DragAxis::X)
            } else {
                None
            };
            if let Some(axis) = locked {
                debug!(axis = axis.key(), "drag direction locked");
                self.inner.locked_axis.set(Some(axis));
                if let Some(on_direction_lock) = self.inner.handlers.on_direction_lock.clone() {
                    on_direction_lock(axis);
                }
            }
            return;
        }

        for axis in DragAxis::BOTH {
            self.update_axis(&options, axis, info.offset);
        }
        if let Some(on_drag) = self.inner.handlers.on_drag.clone() {
            on_drag(event, info);
        }
    }

    fn update_axis(&self, options: &DragOptions, axis: DragAxis, offset: Point) {
        if !options.direction.allows(axis, self.inner.locked_axis.get()) {
            return;
        }
        let mut next = axis.of(self.inner.origin.get()) + axis.of(offset);
        if let Some(constraints) = self.inner.constraints.get() {
            next = apply_constraints(next, &constraints.axis(axis), &self.inner.elastic.get().axis(axis));
        }
        self.axis_value(axis).set(next);
    }

    fn resolve_constraints(&self, options: &DragOptions) {
        let elastic = options
            .elastic
            .unwrap_or(DragElastic::Uniform(self.inner.ctx.config().drag.default_elastic));
        self.inner.elastic.set(elastic.resolve());

        let resolved = options.constraints.as_ref().and_then(|source| match source.resolve(&self.inner.element) {
            Ok(constraints) => Some(constraints),
            Err(err) => {
                warn!(%err, "could not resolve drag constraints, dragging freely");
                None
            }
        });
        self.inner.constraints.set(resolved);
    }

    /// End the drag without a release animation.
    pub fn cancel(&self) {
        self.inner.is_dragging.set(false);
        if let Some((tree, node)) = self.inner.projection.borrow().clone() {
            tree.set_animation_blocked(node, false);
        }
        if let Some(session) = self.inner.session.take() {
            session.end();
        }
        self.inner.lock.replace(None);
    }

    fn stop(&self, event: &PointerEvent, info: &PanInfo) {
        let was_dragging = self.is_dragging();
        self.cancel();
        if !was_dragging {
            return;
        }
        debug!(velocity_x = info.velocity.x, velocity_y = info.velocity.y, "drag released");
        self.start_animation(info.velocity);

        if let Some(on_drag_end) = self.inner.handlers.on_drag_end.clone() {
            let (event, info) = (*event, *info);
            self.inner.ctx.scheduler().post_render(move |_| on_drag_end(&event, &info));
        }
    }

    /// The release animation for `axis`.
    fn momentum_transition(&self, options: &DragOptions, axis: DragAxis, velocity: f64) -> Transition {
        let config = &self.inner.ctx.config().drag;
        let (stiffness, damping) = if options.elastic.is_some_and(|e| e.is_elastic()) {
            (config.elastic_bounce_stiffness, config.elastic_bounce_damping)
        } else {
            (config.rigid_bounce_stiffness, config.rigid_bounce_damping)
        };
        let mut transition = Transition::inertia()
            .with_velocity(if options.momentum { velocity } else { 0.0 })
            .with_bounce_spring(stiffness, damping)
            .with_time_constant(config.time_constant_ms)
            .with_rest(config.rest_speed, config.rest_delta);
        if let Some(overrides) = &options.transition {
            transition = transition.overridden_by(overrides);
        }

        let bounds = if options.snap_to_origin {
            Some(AxisConstraints {
                min: Some(0.0),
                max: Some(0.0),
            })
        } else {
            self.inner.constraints.get().map(|c| c.axis(axis))
        };
        if let Some(bounds) = bounds {
            transition = transition.with_bounds(bounds.min, bounds.max);
        }
        transition
    }

    fn start_animation(&self, velocity: Point) {
        let options = self.options();
        let mut values = Vec::new();
        for axis in DragAxis::BOTH {
            if !options.direction.allows(axis, self.inner.locked_axis.get()) {
                continue;
            }
            let transition = self.momentum_transition(&options, axis, axis.of(velocity));
            let value = self.axis_value(axis);
            animate_motion_value(
                &self.inner.ctx,
                axis.key(),
                &value,
                0.0.into(),
                &transition.into(),
                Some(&self.inner.element),
            );
            values.push(value);
        }
        self.watch_transition_end(values);
    }

    fn watch_transition_end(&self, values: Vec<MotionValue>) {
        let Some(on_end) = self.inner.handlers.on_drag_transition_end.clone() else {
            return;
        };
        if values.is_empty() {
            on_end();
            return;
        }
        let remaining = Rc::new(Cell::new(values.len()));
        let mut watch = self.inner.transition_watch.borrow_mut();
        for value in values {
            let weak = self.downgrade();
            let remaining = remaining.clone();
            let on_end = on_end.clone();
            watch.push(value.on(ValueEvent::AnimationComplete, move |_| {
                remaining.set(remaining.get().saturating_sub(1));
                if remaining.get() == 0 {
                    if let Some(inner) = weak.upgrade() {
                        DragControls { inner }.clear_transition_watch();
                    }
                    on_end();
                }
            }));
        }
    }

    fn clear_transition_watch(&self) {
        let watch = std::mem::take(&mut *self.inner.transition_watch.borrow_mut());
        for subscription in watch {
            subscription.unsubscribe();
        }
    }

    fn stop_animation(&self) {
        self.clear_transition_watch();
        for axis in DragAxis::BOTH {
            self.axis_value(axis).stop();
        }
    }

    fn pause_animation(&self) {
        for axis in DragAxis::BOTH {
            if let Some(animation) = self.axis_value(axis).animation() {
                animation.pause();
            }
        }
    }

    fn resume_animation(&self) {
        for axis in DragAxis::BOTH {
            if let Some(animation) = self.axis_value(axis).animation() {
                if animation.state() == AnimationState::Paused {
                    animation.play();
                }
            }
        }
    }

    /// Re-measure element constraints and move the element so it keeps its
    /// relative position inside them. Call after the constraint element's
    /// layout changes.
    pub fn rescale_within_constraints(&self) {
        let options = self.options();
        let Some(source) = options.constraints.as_ref().filter(|c| c.is_element()) else {
            return;
        };
        let Some(previous) = self.inner.constraints.get() else {
            return;
        };
        self.stop_animation();

        let progress = |axis: DragAxis| {
            let latest = self.axis_value(axis).get_f64().unwrap_or(0.0);
            let bounds = previous.axis(axis);
            Some(calc_origin(&Axis::new(latest, latest), &Axis::new(bounds.min?, bounds.max?)))
        };
        let progress = [progress(DragAxis::X), progress(DragAxis::Y)];

        let resolved = match source.resolve(&self.inner.element) {
            Ok(constraints) => constraints,
            Err(err) => {
                warn!(%err, "could not re-measure drag constraints");
                return;
            }
        };
        self.inner.constraints.set(Some(resolved));

        for (axis, progress) in DragAxis::BOTH.into_iter().zip(progress) {
            if !options.direction.allows(axis, None) {
                continue;
            }
            let bounds = resolved.axis(axis);
            if let (Some(p), Some(min), Some(max)) = (progress, bounds.min, bounds.max) {
                self.axis_value(axis).set(mix(min, max, p));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::testing::MockAdapter;
    use crate::frameloop::ManualClock;
    use crate::gesture::BoundingBox;
    use crate::projection::geometry::Rect;
    use glide_config::GlideConfig;

    struct Harness {
        clock: ManualClock,
        ctx: MotionContext,
        adapter: Rc<MockAdapter>,
        element: VisualElement,
    }

    impl Harness {
        fn new() -> Self {
            let clock = ManualClock::new();
            let ctx = MotionContext::new(clock.clone(), GlideConfig::default());
            let adapter = Rc::new(MockAdapter::with_bounds(Rect::from_xywh(0.0, 0.0, 50.0, 50.0)));
            let element = VisualElement::new(&ctx, adapter.clone());
            Self {
                clock,
                ctx,
                adapter,
                element,
            }
        }

        fn controls(&self, options: DragOptions, handlers: DragHandlers) -> DragControls {
            DragControls::with_locks(&self.element, options, handlers, DragLocks::new())
        }

        fn frames(&self, n: usize) {
            for _ in 0..n {
                self.clock.advance(16.0);
                self.ctx.scheduler().process_frame();
            }
        }

        /// Move the pointer to `x` and process one frame.
        fn move_to(&self, drag: &DragControls, x: f64, y: f64) {
            self.clock.advance(16.0);
            drag.pointer_move(PointerEvent::mouse(x, y));
            self.ctx.scheduler().process_frame();
        }

        fn x(&self) -> f64 {
            self.element.get_value("x").and_then(|v| v.get_f64()).unwrap_or(0.0)
        }
    }

    #[test]
    fn test_rigid_constraint_clamps_and_rests_at_edge() {
        let h = Harness::new();
        let options = DragOptions::new(DragDirection::X)
            .with_constraints(BoundingBox::horizontal(0.0, 100.0))
            .with_elastic(0.0);
        let drag = h.controls(options, DragHandlers::default());

        drag.pointer_down(PointerEvent::mouse(0.0, 0.0));
        h.move_to(&drag, 150.0, 0.0);
        assert!(drag.is_dragging());
        assert_eq!(h.x(), 100.0);

        drag.pointer_up(PointerEvent::mouse(150.0, 0.0));
        assert!(!drag.is_dragging());
        h.frames(120);
        assert!((h.x() - 100.0).abs() < 1.0, "x = {}", h.x());
    }

    #[test]
    fn test_elastic_overshoot_springs_back() {
        let h = Harness::new();
        let options = DragOptions::new(DragDirection::X)
            .with_constraints(BoundingBox::horizontal(0.0, 100.0))
            .with_elastic(0.5)
            .with_momentum(false);
        let drag = h.controls(options, DragHandlers::default());

        drag.pointer_down(PointerEvent::mouse(0.0, 0.0));
        h.move_to(&drag, 200.0, 0.0);
        assert_eq!(h.x(), 150.0);

        drag.pointer_up(PointerEvent::mouse(200.0, 0.0));
        h.frames(200);
        assert!((h.x() - 100.0).abs() < 1.0, "x = {}", h.x());
    }

    #[test]
    fn test_momentum_carries_past_release_point() {
        let h = Harness::new();
        let drag = h.controls(DragOptions::new(DragDirection::X), DragHandlers::default());

        drag.pointer_down(PointerEvent::mouse(0.0, 0.0));
        for step in 1..=4 {
            h.move_to(&drag, f64::from(step) * 10.0, 0.0);
        }
        assert_eq!(h.x(), 40.0);
        drag.pointer_up(PointerEvent::mouse(40.0, 0.0));
        h.frames(400);
        assert!(h.x() > 40.0, "x = {}", h.x());
        assert!(!h.element.get_value("x").unwrap().is_animating());
    }

    #[test]
    fn test_snap_to_origin_returns_home() {
        let h = Harness::new();
        let drag = h.controls(DragOptions::default().with_snap_to_origin(), DragHandlers::default());

        drag.pointer_down(PointerEvent::mouse(0.0, 0.0));
        h.move_to(&drag, 30.0, 40.0);
        assert_eq!(h.x(), 30.0);
        drag.pointer_up(PointerEvent::mouse(30.0, 40.0));
        h.frames(200);
        assert!(h.x().abs() < 1.0, "x = {}", h.x());
    }

    #[test]
    fn test_direction_lock_picks_first_axis() {
        let h = Harness::new();
        let locked = Rc::new(Cell::new(None));
        let handlers = DragHandlers {
            on_direction_lock: Some(Rc::new({
                let locked = locked.clone();
                move |axis| locked.set(Some(axis))
            })),
            ..Default::default()
        };
        let drag = h.controls(DragOptions::default().with_direction_lock(), handlers);

        drag.pointer_down(PointerEvent::mouse(0.0, 0.0));
        h.move_to(&drag, 4.0, 20.0);
        assert_eq!(locked.get(), Some(DragAxis::Y));
        assert_eq!(h.x(), 0.0);

        h.move_to(&drag, 30.0, 40.0);
        assert_eq!(h.x(), 0.0);
        let y = h.element.get_value("y").and_then(|v| v.get_f64());
        assert_eq!(y, Some(40.0));
    }

    #[test]
    fn test_axis_lock_blocks_second_drag() {
        let h = Harness::new();
        let locks = DragLocks::new();
        let first = DragControls::with_locks(&h.element, DragOptions::new(DragDirection::X), DragHandlers::default(), locks.clone());
        let other = VisualElement::new(&h.ctx, Rc::new(MockAdapter::default()));
        let second = DragControls::with_locks(&other, DragOptions::new(DragDirection::X), DragHandlers::default(), locks.clone());

        first.pointer_down(PointerEvent::mouse(0.0, 0.0));
        second.pointer_down(PointerEvent::mouse(0.0, 0.0));
        h.clock.advance(16.0);
        first.pointer_move(PointerEvent::mouse(20.0, 0.0));
        second.pointer_move(PointerEvent::mouse(20.0, 0.0));
        h.ctx.scheduler().process_frame();

        assert!(first.is_dragging());
        assert!(!second.is_dragging());
        assert_eq!(other.get_value("x").and_then(|v| v.get_f64()), Some(0.0));

        first.pointer_up(PointerEvent::mouse(20.0, 0.0));
        assert!(!locks.is_locked(DragDirection::X));
    }

    #[test]
    fn test_handlers_fire_in_order() {
        let h = Harness::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let record = |name: &'static str| -> Option<PanHandler> {
            let log = log.clone();
            Some(Rc::new(move |_: &PointerEvent, _: &PanInfo| log.borrow_mut().push(name)))
        };
        let handlers = DragHandlers {
            on_drag_start: record("start"),
            on_drag: record("drag"),
            on_drag_end: record("end"),
            on_drag_transition_end: Some(Rc::new({
                let log = log.clone();
                move || log.borrow_mut().push("transition_end")
            })),
            ..Default::default()
        };
        let drag = h.controls(DragOptions::new(DragDirection::X).with_momentum(false), handlers);

        drag.pointer_down(PointerEvent::mouse(0.0, 0.0));
        h.move_to(&drag, 10.0, 0.0);
        drag.pointer_up(PointerEvent::mouse(10.0, 0.0));
        h.frames(60);

        let log = log.borrow();
        assert_eq!(log[..2], ["drag", "start"]);
        assert_eq!(log.len(), 4);
        assert!(log.contains(&"end") && log.contains(&"transition_end"));
    }

    #[test]
    fn test_rescale_keeps_relative_position() {
        let h = Harness::new();
        let container_adapter = Rc::new(MockAdapter::with_bounds(Rect::from_xywh(0.0, 0.0, 150.0, 150.0)));
        let container = VisualElement::new(&h.ctx, container_adapter.clone());
        let drag = h.controls(
            DragOptions::new(DragDirection::X).with_constraints(&container).with_elastic(0.0),
            DragHandlers::default(),
        );

        drag.pointer_down(PointerEvent::mouse(0.0, 0.0));
        h.move_to(&drag, 50.0, 0.0);
        assert_eq!(drag.constraints().map(|c| c.x.max), Some(Some(100.0)));
        assert_eq!(h.x(), 50.0);
        drag.cancel();

        // The adapter reports the translated box.
        h.adapter.bounds.set(Some(Rect::from_xywh(50.0, 0.0, 50.0, 50.0)));
        container_adapter.bounds.set(Some(Rect::from_xywh(0.0, 0.0, 250.0, 250.0)));
        drag.rescale_within_constraints();
        assert_eq!(drag.constraints().map(|c| c.x.max), Some(Some(200.0)));
        assert_eq!(h.x(), 100.0);
    }
}
