//! Software playback.
//!
//! A [`SoftwareAnimation`] resolves its keyframes, builds a [`Sampler`] and
//! samples it from a keep-alive `update` job every frame until it finishes.

use super::options::{AnimationOptions, Readiness};
use super::resolver::KeyframeResolver;
use super::sampler::Sampler;
use super::transition::final_keyframe;
use super::PlaybackControls;
use crate::context::MotionContext;
use crate::frameloop::{Phase, Process, process};
use crate::generators::GeneratorState;
use crate::types::{AnimatableValue, AnimationId, AnimationState};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{trace, warn};

/// Resolution delays longer than this start the animation from the
/// resolution time rather than the creation time.
const MAX_RESOLVE_DELAY_MS: f64 = 40.0;

struct Resolved {
    keyframes: Vec<AnimatableValue>,
    final_keyframe: Option<AnimatableValue>,
    sampler: Sampler,
}

struct SoftwareInner {
    id: AnimationId,
    ctx: MotionContext,
    options: RefCell<AnimationOptions>,
    resolver: RefCell<Option<KeyframeResolver>>,
    resolved: RefCell<Option<Resolved>>,
    has_attempted_resolve: Cell<bool>,
    state: Cell<AnimationState>,
    pending_play_state: Cell<AnimationState>,
    start_time: Cell<Option<f64>>,
    hold_time: Cell<Option<f64>>,
    /// Local time including the start delay.
    current_time: Cell<f64>,
    playback_speed: Cell<f64>,
    is_stopped: Cell<bool>,
    created_at: f64,
    resolved_at: Cell<Option<f64>>,
    driver: RefCell<Option<Process>>,
}

/// An animation sampled on the main frame loop.
///
/// Cloning gives another handle to the same animation.
#[derive(Clone)]
pub struct SoftwareAnimation {
    inner: Rc<SoftwareInner>,
}

impl std::fmt::Debug for SoftwareAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareAnimation")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("current_time", &self.inner.current_time.get())
            .finish()
    }
}

impl SoftwareAnimation {
    /// Create an animation and start resolving its keyframes.
    pub fn new(options: AnimationOptions, ctx: &MotionContext) -> Self {
        let animation = Self::deferred(options, ctx);
        animation.begin();
        animation
    }

    /// Create an animation without resolving yet; call [`Self::begin`].
    ///
    /// Lets the owner attach the animation to a value before a synchronous
    /// resolution can complete it.
    pub(crate) fn deferred(options: AnimationOptions, ctx: &MotionContext) -> Self {
        Self::created_at(options, ctx, ctx.scheduler().now())
    }

    /// Play keyframes another backend already resolved, timed as though the
    /// animation was created at `created_at`.
    pub(crate) fn from_resolved(
        options: AnimationOptions,
        ctx: &MotionContext,
        created_at: f64,
        keyframes: Vec<AnimatableValue>,
        resolved_final: Option<AnimatableValue>,
    ) -> Self {
        let animation = Self::created_at(options, ctx, created_at);
        animation.on_keyframes_resolved(keyframes, resolved_final);
        animation
    }

    fn created_at(options: AnimationOptions, ctx: &MotionContext, created_at: f64) -> Self {
        Self {
            inner: Rc::new(SoftwareInner {
                id: AnimationId::new(),
                created_at,
                ctx: ctx.clone(),
                options: RefCell::new(options),
                resolver: RefCell::new(None),
                resolved: RefCell::new(None),
                has_attempted_resolve: Cell::new(false),
                state: Cell::new(AnimationState::Idle),
                pending_play_state: Cell::new(AnimationState::Running),
                start_time: Cell::new(None),
                hold_time: Cell::new(None),
                current_time: Cell::new(0.0),
                playback_speed: Cell::new(1.0),
                is_stopped: Cell::new(false),
                resolved_at: Cell::new(None),
                driver: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn begin(&self) {
        let weak: Weak<SoftwareInner> = Rc::downgrade(&self.inner);
        let resolver = {
            let options = self.inner.options.borrow();
            KeyframeResolver::new(
                self.inner.ctx.resolvers(),
                options.keyframes.clone(),
                options.name.clone(),
                options.motion_value.clone(),
                options.element.clone(),
                Box::new(move |keyframes, final_keyframe| {
                    if let Some(inner) = weak.upgrade() {
                        SoftwareAnimation { inner }.on_keyframes_resolved(keyframes, final_keyframe);
                    }
                }),
            )
        };
        *self.inner.resolver.borrow_mut() = Some(resolver.clone());
        resolver.schedule_resolve();
    }

    fn on_keyframes_resolved(&self, keyframes: Vec<AnimatableValue>, resolved_final: Option<AnimatableValue>) {
        let inner = &self.inner;
        inner.has_attempted_resolve.set(true);
        inner.resolved_at.set(Some(inner.ctx.scheduler().now()));

        let readiness = inner.options.borrow_mut().readiness(&keyframes, resolved_final.as_ref());
        if let Readiness::Instant(value) = readiness {
            if let Some(value) = value {
                self.emit_update(&value);
            }
            inner.state.set(AnimationState::Finished);
            self.emit_complete();
            return;
        }

        let (transition, name) = {
            let options = inner.options.borrow();
            (options.transition.clone(), options.name.clone())
        };
        let velocity = transition.velocity.unwrap_or(0.0);
        let sampler = match Sampler::new(&keyframes, &transition, velocity, inner.ctx.config()) {
            Ok(sampler) => sampler,
            Err(err) => {
                warn!(error = %err, key = name.as_deref().unwrap_or_default(), "cannot animate, completing instantly");
                if let Some(last) = resolved_final.or_else(|| keyframes.last().cloned()) {
                    self.emit_update(&last);
                }
                inner.state.set(AnimationState::Finished);
                self.emit_complete();
                return;
            }
        };
        trace!(
            id = inner.id.0,
            duration = sampler.calculated_duration(),
            total = sampler.total_duration(),
            "keyframes resolved"
        );
        *inner.resolved.borrow_mut() = Some(Resolved {
            keyframes,
            final_keyframe: resolved_final,
            sampler,
        });

        self.play();
        let autoplay = inner.options.borrow().autoplay;
        if inner.pending_play_state.get() == AnimationState::Paused || !autoplay {
            self.pause();
        } else {
            inner.state.set(inner.pending_play_state.get());
        }
    }

    fn is_resolved(&self) -> bool {
        self.inner.resolved.borrow().is_some()
    }

    fn flush_if_unresolved(&self) {
        if !self.is_resolved() && !self.inner.has_attempted_resolve.get() {
            self.inner.ctx.resolvers().flush();
        }
    }

    fn emit_update(&self, value: &AnimatableValue) {
        let callback = self.inner.options.borrow().on_update.clone();
        if let Some(callback) = callback {
            callback(value);
        }
    }

    fn emit_complete(&self) {
        let callback = self.inner.options.borrow().on_complete.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn emit_stop(&self) {
        let callback = self.inner.options.borrow().on_stop.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Advance to `timestamp` on the scheduler clock.
    fn tick(&self, timestamp: f64) {
        let inner = &self.inner;
        let Some(start_time) = inner.start_time.get() else {
            return;
        };
        let speed = inner.playback_speed.get();

        let (value, finished) = {
            let mut resolved = inner.resolved.borrow_mut();
            let Some(resolved) = resolved.as_mut() else {
                return;
            };
            let total = resolved.sampler.total_duration();
            let delay = resolved.sampler.delay();

            let start = if speed > 0.0 {
                start_time.min(timestamp)
            } else if speed < 0.0 {
                (timestamp - total / speed).min(start_time)
            } else {
                start_time
            };
            inner.start_time.set(Some(start));

            let mut raw = match inner.hold_time.get() {
                Some(hold) => hold,
                None => (timestamp - start).round() * speed,
            };
            let direction = if speed >= 0.0 { 1.0 } else { -1.0 };
            let without_delay = raw - delay * direction;
            let in_delay = if speed >= 0.0 { without_delay < 0.0 } else { without_delay > total };
            let mut current = without_delay.max(0.0);
            if inner.state.get() == AnimationState::Finished && inner.hold_time.get().is_none() {
                current = total;
                raw = total + delay;
            }
            inner.current_time.set(raw);

            let mut state = resolved.sampler.frame(current, in_delay);
            if !in_delay {
                state.done = if speed >= 0.0 { current >= total } else { current <= 0.0 };
            }
            let finished = inner.hold_time.get().is_none()
                && (inner.state.get() == AnimationState::Finished
                    || (inner.state.get() == AnimationState::Running && state.done));
            if finished && resolved.final_keyframe.is_some() {
                let options = inner.options.borrow();
                let wrapped: Vec<_> = resolved.keyframes.iter().cloned().map(Some).collect();
                if let Some(value) = final_keyframe(&wrapped, &options.transition, resolved.final_keyframe.as_ref()) {
                    state.value = value;
                }
            }
            (state.value, finished)
        };

        self.emit_update(&value);
        if finished {
            self.finish();
        }
    }

    fn finish(&self) {
        self.teardown();
        self.inner.state.set(AnimationState::Finished);
        self.emit_complete();
    }

    fn teardown(&self) {
        let inner = &self.inner;
        inner.state.set(AnimationState::Idle);
        self.stop_driver();
        inner.start_time.set(None);
        let resolver = inner.resolver.borrow().clone();
        if let Some(resolver) = resolver {
            resolver.cancel();
        }
    }

    fn start_driver(&self) {
        if self.inner.driver.borrow().is_some() {
            return;
        }
        let animation = self.clone();
        let job = process(move |frame| animation.tick(frame.timestamp));
        self.inner.ctx.scheduler().schedule(Phase::Update, job.clone(), true, false);
        *self.inner.driver.borrow_mut() = Some(job);
    }

    fn stop_driver(&self) {
        let job = self.inner.driver.borrow_mut().take();
        if let Some(job) = job {
            self.inner.ctx.scheduler().cancel(&job);
        }
    }

    /// Sample the resolved animation at `t` ms (delay included) without
    /// affecting playback.
    pub fn sample(&self, t: f64) -> Option<GeneratorState<AnimatableValue>> {
        self.flush_if_unresolved();
        let resolved = self.inner.resolved.borrow();
        resolved.as_ref().map(|r| r.sampler.clone().sample(t))
    }

    /// Total duration including repeats, excluding the start delay.
    pub fn total_duration(&self) -> f64 {
        self.flush_if_unresolved();
        self.inner
            .resolved
            .borrow()
            .as_ref()
            .map_or(0.0, |r| r.sampler.total_duration())
    }
}

impl PlaybackControls for SoftwareAnimation {
    fn id(&self) -> AnimationId {
        self.inner.id
    }

    fn state(&self) -> AnimationState {
        self.inner.state.get()
    }

    fn time(&self) -> f64 {
        self.inner.current_time.get()
    }

    fn set_time(&self, ms: f64) {
        let inner = &self.inner;
        inner.current_time.set(ms);
        if inner.hold_time.get().is_some() || inner.playback_speed.get() == 0.0 {
            inner.hold_time.set(Some(ms));
        } else if inner.driver.borrow().is_some() {
            let now = inner.ctx.scheduler().now();
            inner.start_time.set(Some(now - ms / inner.playback_speed.get()));
        }
    }

    fn speed(&self) -> f64 {
        self.inner.playback_speed.get()
    }

    fn set_speed(&self, speed: f64) {
        let changed = self.inner.playback_speed.replace(speed) != speed;
        if changed {
            self.set_time(self.inner.current_time.get());
        }
    }

    fn duration(&self) -> f64 {
        self.flush_if_unresolved();
        self.inner
            .resolved
            .borrow()
            .as_ref()
            .map_or(0.0, |r| r.sampler.calculated_duration())
    }

    fn play(&self) {
        let inner = &self.inner;
        let resolver = inner.resolver.borrow().clone();
        if let Some(resolver) = resolver {
            if !resolver.is_scheduled() {
                resolver.resume();
            }
        }
        if inner.is_stopped.get() {
            return;
        }
        if !self.is_resolved() {
            inner.pending_play_state.set(AnimationState::Running);
            return;
        }

        let now = inner.ctx.scheduler().now();
        if inner.state.get() == AnimationState::Finished {
            inner.start_time.set(Some(now));
        } else if let Some(hold) = inner.hold_time.get() {
            let speed = inner.playback_speed.get();
            inner.start_time.set(Some(now - if speed != 0.0 { hold / speed } else { hold }));
        } else if inner.start_time.get().is_none() {
            let explicit = inner.options.borrow().start_time;
            inner.start_time.set(Some(explicit.unwrap_or_else(|| self.calc_start_time())));
        }

        inner.hold_time.set(None);
        inner.state.set(AnimationState::Running);
        self.start_driver();
    }

    fn pause(&self) {
        let inner = &self.inner;
        if !self.is_resolved() {
            inner.pending_play_state.set(AnimationState::Paused);
            return;
        }
        inner.state.set(AnimationState::Paused);
        inner.hold_time.set(Some(inner.current_time.get()));
    }

    fn stop(&self) {
        let inner = &self.inner;
        let resolver = inner.resolver.borrow().clone();
        if let Some(resolver) = resolver {
            resolver.cancel();
        }
        inner.is_stopped.set(true);
        if inner.state.get() == AnimationState::Idle {
            return;
        }
        self.teardown();
        self.emit_stop();
    }

    fn cancel(&self) {
        let inner = &self.inner;
        if inner.state.get() == AnimationState::Finished {
            return;
        }
        if inner.start_time.get().is_some() {
            let value = {
                let mut resolved = inner.resolved.borrow_mut();
                resolved.as_mut().map(|resolved| {
                    let raw = inner.current_time.get();
                    let current = (raw - resolved.sampler.delay()).max(0.0);
                    resolved.sampler.frame(current, false).value
                })
            };
            if let Some(value) = value {
                self.emit_update(&value);
            }
        }
        self.teardown();
    }

    fn complete(&self) {
        let inner = &self.inner;
        if inner.state.get() != AnimationState::Running {
            self.play();
        }
        inner.pending_play_state.set(AnimationState::Finished);
        inner.state.set(AnimationState::Finished);
        inner.hold_time.set(None);
    }
}

impl SoftwareAnimation {
    fn calc_start_time(&self) -> f64 {
        let inner = &self.inner;
        match inner.resolved_at.get() {
            Some(resolved_at) if resolved_at - inner.created_at > MAX_RESOLVE_DELAY_MS => resolved_at,
            _ => inner.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::RepeatType;
    use crate::animation::transition::Transition;
    use crate::easing::Easing;
    use crate::frameloop::ManualClock;
    use glide_config::GlideConfig;

    struct Harness {
        clock: ManualClock,
        ctx: MotionContext,
        updates: Rc<RefCell<Vec<AnimatableValue>>>,
        completions: Rc<Cell<u32>>,
    }

    impl Harness {
        fn new() -> Self {
            let clock = ManualClock::new();
            let ctx = MotionContext::new(clock.clone(), GlideConfig::default());
            Self {
                clock,
                ctx,
                updates: Rc::new(RefCell::new(Vec::new())),
                completions: Rc::new(Cell::new(0)),
            }
        }

        fn animate(&self, from: f64, to: f64, transition: Transition) -> SoftwareAnimation {
            let updates = self.updates.clone();
            let completions = self.completions.clone();
            let options = AnimationOptions::between(from, to, transition)
                .on_update(move |v| updates.borrow_mut().push(v.clone()))
                .on_complete(move || completions.set(completions.get() + 1));
            SoftwareAnimation::new(options, &self.ctx)
        }

        fn frame(&self, advance: f64) {
            self.clock.advance(advance);
            self.ctx.scheduler().process_frame();
        }

        fn last(&self) -> f64 {
            self.updates.borrow().last().and_then(AnimatableValue::as_f64).unwrap()
        }
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn linear(duration_ms: f64) -> Transition {
        Transition::tween(duration_ms).with_ease(Easing::Linear)
    }

    #[test]
    fn test_runs_to_completion() {
        let h = Harness::new();
        let animation = h.animate(0.0, 100.0, linear(100.0));
        assert_eq!(animation.state(), AnimationState::Running);
        assert_eq!(animation.duration(), 100.0);

        h.frame(50.0);
        assert!(approx_eq(h.last(), 50.0));
        h.frame(50.0);
        assert!(approx_eq(h.last(), 100.0));
        assert_eq!(animation.state(), AnimationState::Finished);
        assert_eq!(h.completions.get(), 1);

        h.frame(16.0);
        assert_eq!(h.completions.get(), 1);
        assert!(!h.ctx.scheduler().needs_frame());
    }

    #[test]
    fn test_unchanged_keyframes_complete_instantly() {
        let h = Harness::new();
        let animation = h.animate(5.0, 5.0, linear(100.0));
        assert_eq!(animation.state(), AnimationState::Finished);
        assert_eq!(h.completions.get(), 1);
        assert_eq!(*h.updates.borrow(), vec![AnimatableValue::Number(5.0)]);
    }

    #[test]
    fn test_delay_holds_first_value() {
        let h = Harness::new();
        h.animate(0.0, 100.0, linear(100.0).with_delay(50.0));
        h.frame(25.0);
        assert!(approx_eq(h.last(), 0.0));
        h.frame(75.0);
        assert!(approx_eq(h.last(), 50.0));
    }

    #[test]
    fn test_pause_and_resume() {
        let h = Harness::new();
        let animation = h.animate(0.0, 100.0, linear(100.0));
        h.frame(20.0);
        animation.pause();
        assert_eq!(animation.state(), AnimationState::Paused);
        h.frame(200.0);
        assert!(approx_eq(h.last(), 20.0));

        animation.play();
        h.frame(30.0);
        assert!(approx_eq(h.last(), 50.0));
    }

    #[test]
    fn test_set_time_seeks() {
        let h = Harness::new();
        let animation = h.animate(0.0, 100.0, linear(100.0));
        animation.set_time(80.0);
        h.frame(0.0);
        assert!(approx_eq(h.last(), 80.0));
        assert!(approx_eq(animation.time(), 80.0));
    }

    #[test]
    fn test_negative_speed_plays_backwards() {
        let h = Harness::new();
        let animation = h.animate(0.0, 100.0, linear(100.0));
        animation.set_time(100.0);
        animation.set_speed(-1.0);
        h.frame(25.0);
        assert!(approx_eq(h.last(), 75.0));
        h.frame(100.0);
        assert_eq!(animation.state(), AnimationState::Finished);
        assert!(approx_eq(h.last(), 0.0));
    }

    #[test]
    fn test_cancel_samples_current_time() {
        let h = Harness::new();
        let animation = h.animate(0.0, 100.0, linear(100.0));
        h.frame(40.0);
        animation.cancel();
        assert!(approx_eq(h.last(), 40.0));
        assert_eq!(animation.state(), AnimationState::Idle);

        let count = h.updates.borrow().len();
        animation.cancel();
        assert_eq!(h.updates.borrow().len(), count);
        assert_eq!(h.completions.get(), 0);
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let h = Harness::new();
        let animation = h.animate(0.0, 1.0, linear(10.0));
        h.frame(20.0);
        assert_eq!(animation.state(), AnimationState::Finished);
        let count = h.updates.borrow().len();
        animation.cancel();
        assert_eq!(animation.state(), AnimationState::Finished);
        assert_eq!(h.updates.borrow().len(), count);
    }

    #[test]
    fn test_complete_jumps_to_end() {
        let h = Harness::new();
        let animation = h.animate(0.0, 100.0, linear(1000.0).with_repeat(1.0, RepeatType::Reverse));
        animation.complete();
        h.frame(16.0);
        assert_eq!(animation.state(), AnimationState::Finished);
        assert!(approx_eq(h.last(), 0.0));
        assert_eq!(h.completions.get(), 1);
    }

    #[test]
    fn test_stop_fires_on_stop_once() {
        let h = Harness::new();
        let stops = Rc::new(Cell::new(0));
        let options = AnimationOptions::between(0.0, 1.0, linear(100.0)).on_stop({
            let stops = stops.clone();
            move || stops.set(stops.get() + 1)
        });
        let animation = SoftwareAnimation::new(options, &h.ctx);
        animation.stop();
        animation.stop();
        assert_eq!(stops.get(), 1);
        animation.play();
        assert_eq!(animation.state(), AnimationState::Idle);
    }

    #[test]
    fn test_paused_until_played() {
        let h = Harness::new();
        let options = AnimationOptions::between(0.0, 100.0, linear(100.0)).paused();
        let animation = SoftwareAnimation::new(options, &h.ctx);
        assert_eq!(animation.state(), AnimationState::Paused);
        h.clock.advance(500.0);
        animation.play();
        assert_eq!(animation.state(), AnimationState::Running);
    }

    #[test]
    fn test_sample_is_side_effect_free() {
        let h = Harness::new();
        let animation = h.animate(0.0, 100.0, linear(100.0));
        let state = animation.sample(25.0).unwrap();
        assert_eq!(state.value, AnimatableValue::Number(25.0));
        assert!(h.updates.borrow().is_empty());
        assert_eq!(animation.total_duration(), 100.0);
    }
}
