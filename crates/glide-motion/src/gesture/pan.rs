//! Pan sessions.

use super::{PanInfo, PointerEvent};
use crate::context::MotionContext;
use crate::frameloop::{Phase, Process, process};
use crate::projection::geometry::Point;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// A pan callback.
pub type PanHandler = Rc<dyn Fn(&PointerEvent, &PanInfo)>;

/// Callbacks of a [`PanSession`].
///
/// `on_session_start` fires on pointer down, `on_start` once the pointer
/// leaves the deadzone, `on_move` on every recorded move after that.
/// `on_end` fires only when the pan started; `on_session_end` whenever the
/// pointer moved at all.
#[derive(Clone, Default)]
pub struct PanHandlers {
    pub on_session_start: Option<PanHandler>,
    pub on_start: Option<PanHandler>,
    pub on_move: Option<PanHandler>,
    pub on_end: Option<PanHandler>,
    pub on_session_end: Option<PanHandler>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampedPoint {
    pub point: Point,
    pub timestamp: f64,
}

/// Velocity over the trailing `window_ms` of `history`.
///
/// Measures from the newest point back to the first point older than the
/// window (or the oldest point). Zero with fewer than two points, no
/// elapsed time, or an infinite result.
pub fn pan_velocity(history: &[TimestampedPoint], window_ms: f64) -> Point {
    let [.., last] = history else {
        return Point::ZERO;
    };
    if history.len() < 2 {
        return Point::ZERO;
    }
    let from = history
        .iter()
        .rev()
        .find(|p| last.timestamp - p.timestamp > window_ms)
        .or_else(|| history.first())
        .copied()
        .unwrap_or(*last);

    let seconds = (last.timestamp - from.timestamp) / 1000.0;
    if seconds == 0.0 {
        return Point::ZERO;
    }
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    Point::new(
        finite((last.point.x - from.point.x) / seconds),
        finite((last.point.y - from.point.y) / seconds),
    )
}

struct PanInner {
    ctx: MotionContext,
    handlers: PanHandlers,
    history: RefCell<Vec<TimestampedPoint>>,
    start_event: Cell<Option<PointerEvent>>,
    last_move: Cell<Option<PointerEvent>>,
    update_job: RefCell<Option<Process>>,
    is_ended: Cell<bool>,
}

/// One pointer-down to pointer-up interaction.
///
/// Moves are buffered and processed on the next update phase so at most
/// one pan update runs per frame.
#[derive(Clone)]
pub struct PanSession {
    inner: Rc<PanInner>,
}

impl PanSession {
    /// Start a session. `None` unless `event` is a primary pointer.
    pub fn new(event: &PointerEvent, handlers: PanHandlers, ctx: &MotionContext) -> Option<Self> {
        if !event.is_primary_pointer() {
            trace!(kind = ?event.kind, button = event.button, "ignoring secondary pointer");
            return None;
        }
        let session = Self {
            inner: Rc::new_cyclic(|weak: &Weak<PanInner>| {
                let weak = weak.clone();
                PanInner {
                    ctx: ctx.clone(),
                    handlers,
                    history: RefCell::new(vec![TimestampedPoint {
                        point: event.point,
                        timestamp: ctx.scheduler().now(),
                    }]),
                    start_event: Cell::new(None),
                    last_move: Cell::new(None),
                    update_job: RefCell::new(Some(process(move |_| {
                        if let Some(inner) = weak.upgrade() {
                            PanSession { inner }.update_point();
                        }
                    }))),
                    is_ended: Cell::new(false),
                }
            }),
        };
        debug!(x = event.point.x, y = event.point.y, "pan session started");
        if let Some(on_session_start) = session.inner.handlers.on_session_start.clone() {
            let info = session.info_at(event.point);
            on_session_start(event, &info);
        }
        Some(session)
    }

    pub fn history(&self) -> Vec<TimestampedPoint> {
        self.inner.history.borrow().clone()
    }

    /// Whether the pointer has left the deadzone.
    pub fn is_started(&self) -> bool {
        self.inner.start_event.get().is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.inner.is_ended.get()
    }

    /// Record a move; it is processed on the update phase.
    pub fn pointer_move(&self, event: PointerEvent) {
        if self.is_ended() {
            return;
        }
        self.inner.last_move.set(Some(event));
        if let Some(job) = self.inner.update_job.borrow().clone() {
            self.inner.ctx.scheduler().schedule(Phase::Update, job, false, true);
        }
    }

    pub fn pointer_up(&self, event: PointerEvent) {
        self.finish(event, false);
    }

    /// End with the last recorded move, not the cancel event's position.
    pub fn pointer_cancel(&self, event: PointerEvent) {
        self.finish(event, true);
    }

    /// Stop listening without firing end callbacks.
    pub fn end(&self) {
        if self.inner.is_ended.replace(true) {
            return;
        }
        if let Some(job) = self.inner.update_job.borrow_mut().take() {
            self.inner.ctx.scheduler().cancel(&job);
        }
    }

    fn finish(&self, event: PointerEvent, cancelled: bool) {
        if self.is_ended() {
            return;
        }
        self.end();
        let Some(last_move) = self.inner.last_move.get() else {
            return;
        };
        let point = if cancelled { last_move.point } else { event.point };
        let info = self.info_at(point);
        debug!(
            offset_x = info.offset.x,
            offset_y = info.offset.y,
            velocity_x = info.velocity.x,
            velocity_y = info.velocity.y,
            cancelled,
            "pan session ended"
        );
        let handlers = &self.inner.handlers;
        if self.is_started() {
            if let Some(on_end) = handlers.on_end.clone() {
                on_end(&event, &info);
            }
        }
        if let Some(on_session_end) = handlers.on_session_end.clone() {
            on_session_end(&event, &info);
        }
    }

    fn info_at(&self, point: Point) -> PanInfo {
        let history = self.inner.history.borrow();
        let window = self.inner.ctx.config().velocity.pan_window_ms;
        let first = history.first().map_or(point, |p| p.point);
        let last = history.last().map_or(point, |p| p.point);
        PanInfo {
            point,
            delta: point - last,
            offset: point - first,
            velocity: pan_velocity(&history, window),
        }
    }

    fn update_point(&self) {
        let Some(event) = self.inner.last_move.get() else {
            return;
        };
        let info = self.info_at(event.point);
        let is_started = self.is_started();
        if !is_started && info.offset.distance() < self.inner.ctx.config().drag.deadzone {
            return;
        }

        self.inner.history.borrow_mut().push(TimestampedPoint {
            point: info.point,
            timestamp: self.inner.ctx.scheduler().now(),
        });

        let handlers = &self.inner.handlers;
        if !is_started {
            self.inner.start_event.set(Some(event));
            if let Some(on_start) = handlers.on_start.clone() {
                on_start(&event, &info);
            }
        }
        if let Some(on_move) = handlers.on_move.clone() {
            on_move(&event, &info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frameloop::ManualClock;
    use glide_config::GlideConfig;

    fn point(x: f64, timestamp: f64) -> TimestampedPoint {
        TimestampedPoint {
            point: Point::new(x, 0.0),
            timestamp,
        }
    }

    #[test]
    fn test_velocity_uses_trailing_window() {
        let history = [point(0.0, 0.0), point(100.0, 50.0), point(110.0, 160.0), point(120.0, 200.0)];
        // Newest sample more than 100ms before the last one is at 50ms.
        let velocity = pan_velocity(&history, 100.0);
        assert!((velocity.x - 20.0 / 0.15).abs() < 1e-9);
        assert_eq!(velocity.y, 0.0);
    }

    #[test]
    fn test_velocity_degenerate_history() {
        assert_eq!(pan_velocity(&[], 100.0), Point::ZERO);
        assert_eq!(pan_velocity(&[point(5.0, 10.0)], 100.0), Point::ZERO);
        assert_eq!(pan_velocity(&[point(0.0, 10.0), point(5.0, 10.0)], 100.0), Point::ZERO);
    }

    #[derive(Default)]
    struct Calls {
        starts: Cell<usize>,
        moves: RefCell<Vec<Point>>,
        ends: Cell<usize>,
        session_ends: RefCell<Vec<PanInfo>>,
    }

    fn session(clock: &ManualClock, calls: &Rc<Calls>) -> (MotionContext, PanSession) {
        let ctx = MotionContext::new(clock.clone(), GlideConfig::default());
        let handlers = PanHandlers {
            on_start: Some(Rc::new({
                let calls = calls.clone();
                move |_, _| calls.starts.set(calls.starts.get() + 1)
            })),
            on_move: Some(Rc::new({
                let calls = calls.clone();
                move |_, info| calls.moves.borrow_mut().push(info.offset)
            })),
            on_end: Some(Rc::new({
                let calls = calls.clone();
                move |_, _| calls.ends.set(calls.ends.get() + 1)
            })),
            on_session_end: Some(Rc::new({
                let calls = calls.clone();
                move |_, info| calls.session_ends.borrow_mut().push(*info)
            })),
            ..Default::default()
        };
        let session = PanSession::new(&PointerEvent::mouse(0.0, 0.0), handlers, &ctx).unwrap();
        (ctx, session)
    }

    #[test]
    fn test_deadzone_suppresses_micro_moves() {
        let clock = ManualClock::new();
        let calls = Rc::new(Calls::default());
        let (ctx, session) = session(&clock, &calls);

        clock.advance(16.0);
        session.pointer_move(PointerEvent::mouse(2.0, 0.0));
        ctx.scheduler().process_frame();
        assert_eq!(calls.starts.get(), 0);
        assert!(calls.moves.borrow().is_empty());

        clock.advance(16.0);
        session.pointer_move(PointerEvent::mouse(5.0, 0.0));
        ctx.scheduler().process_frame();
        assert_eq!(calls.starts.get(), 1);
        assert_eq!(*calls.moves.borrow(), vec![Point::new(5.0, 0.0)]);

        // Once started, small moves are reported.
        clock.advance(16.0);
        session.pointer_move(PointerEvent::mouse(6.0, 0.0));
        ctx.scheduler().process_frame();
        assert_eq!(calls.moves.borrow().len(), 2);
        assert_eq!(calls.starts.get(), 1);
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn test_release_reports_velocity() {
        let clock = ManualClock::new();
        let calls = Rc::new(Calls::default());
        let (ctx, session) = session(&clock, &calls);

        for step in 1..=5 {
            clock.advance(20.0);
            session.pointer_move(PointerEvent::mouse(f64::from(step) * 2.0, 0.0));
            ctx.scheduler().process_frame();
        }
        session.pointer_up(PointerEvent::mouse(10.0, 0.0));

        assert_eq!(calls.ends.get(), 1);
        let ends = calls.session_ends.borrow();
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0].offset, Point::new(10.0, 0.0));
        // 2px every 20ms.
        assert!((ends[0].velocity.x - 100.0).abs() < 1e-6, "{:?}", ends[0].velocity);
        assert!(session.is_ended());
    }

    #[test]
    fn test_cancel_uses_last_move() {
        let clock = ManualClock::new();
        let calls = Rc::new(Calls::default());
        let (ctx, session) = session(&clock, &calls);

        clock.advance(16.0);
        session.pointer_move(PointerEvent::mouse(40.0, 0.0));
        ctx.scheduler().process_frame();
        session.pointer_cancel(PointerEvent::mouse(0.0, 0.0));

        assert_eq!(calls.session_ends.borrow()[0].point, Point::new(40.0, 0.0));
    }

    #[test]
    fn test_release_without_move_skips_end() {
        let clock = ManualClock::new();
        let calls = Rc::new(Calls::default());
        let (_ctx, session) = session(&clock, &calls);
        session.pointer_up(PointerEvent::mouse(0.0, 0.0));
        assert_eq!(calls.ends.get(), 0);
        assert!(calls.session_ends.borrow().is_empty());
    }

    #[test]
    fn test_secondary_pointer_is_ignored() {
        let clock = ManualClock::new();
        let ctx = MotionContext::new(clock, GlideConfig::default());
        let event = PointerEvent::touch(0.0, 0.0, false);
        assert!(PanSession::new(&event, PanHandlers::default(), &ctx).is_none());
    }
}
