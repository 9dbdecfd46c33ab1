//! Platform timeline playback.
//!
//! Some backends can run keyframe animations off the main loop. When the
//! element's adapter supports it and nothing needs a per-frame callback,
//! keyframes are handed to a [`NativeTimeline`] instead of being sampled in
//! software. Springs and easings the platform can't express are
//! pre-sampled into linear keyframes first.

use super::PlaybackControls;
use super::options::{AnimationOptions, Readiness};
use super::resolver::KeyframeResolver;
use super::sampler::Sampler;
use super::software::SoftwareAnimation;
use super::transition::{RepeatType, Transition, final_keyframe};
use crate::context::MotionContext;
use crate::easing::Easing;
use crate::generators::GeneratorType;
use crate::types::{AnimatableValue, AnimationId, AnimationState};
use glide_config::GlideConfig;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// Keys a platform timeline can animate without main-thread work.
pub const ACCELERATED_KEYS: [&str; 5] = ["opacity", "clipPath", "filter", "transform", "backgroundColor"];

/// A running platform animation.
///
/// Times are in milliseconds.
pub trait NativeTimeline {
    fn current_time(&self) -> f64;
    fn set_current_time(&self, ms: f64);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
    /// Align the timeline's start with the scheduler clock.
    fn set_start_time(&self, _ms: f64) {}
    fn play_state(&self) -> AnimationState;
    fn play(&self);
    fn pause(&self);
    /// Jump to the end, firing the finish callback.
    fn finish(&self);
    /// Remove the animation's effect.
    fn cancel(&self);
    /// Called once when the timeline reaches its end.
    fn set_on_finish(&self, callback: Box<dyn FnOnce()>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackDirection {
    #[default]
    Normal,
    Alternate,
}

/// Keyframes and timing in the form a platform timeline consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeKeyframes {
    pub keyframes: Vec<AnimatableValue>,
    /// Offsets in `[0, 1]` per keyframe.
    pub offsets: Option<Vec<f64>>,
    /// Timing function for the whole animation.
    pub easing: String,
    /// Per-segment timing functions, when more than one ease was given.
    pub segment_easings: Option<Vec<String>>,
    pub duration_ms: f64,
    pub delay_ms: f64,
    /// `repeat + 1`, possibly infinite.
    pub iterations: f64,
    pub direction: PlaybackDirection,
}

impl NativeKeyframes {
    /// Convert resolved keyframes, pre-sampling when the platform can't
    /// express the transition directly.
    pub fn from_transition(keyframes: &[AnimatableValue], transition: &Transition, config: &GlideConfig) -> Option<Self> {
        let mut keyframes = keyframes.to_vec();
        let mut duration_ms = transition.duration_ms.unwrap_or(300.0);
        let mut offsets = transition.times.clone();
        let mut eases = transition.ease.as_ref().map(|e| e.to_vec()).unwrap_or_default();

        if requires_pregenerated_keyframes(transition) {
            let (sampled, duration) = pregenerate_keyframes(&keyframes, transition, config)?;
            keyframes = sampled;
            duration_ms = duration;
            offsets = None;
            eases = vec![Easing::Linear];
        }
        if keyframes.len() == 1 {
            keyframes.push(keyframes[0].clone());
        }

        let definitions: Vec<String> = eases.iter().filter_map(Easing::native_definition).collect();
        let (easing, segment_easings) = match definitions.as_slice() {
            [] => ("ease-out".to_string(), None),
            [single] => (single.clone(), None),
            _ => ("linear".to_string(), Some(definitions)),
        };

        Some(Self {
            keyframes,
            offsets,
            easing,
            segment_easings,
            duration_ms,
            delay_ms: transition.delay_ms.unwrap_or(0.0),
            iterations: transition.repeat_count() + 1.0,
            direction: if transition.repeat_kind() == RepeatType::Reverse {
                PlaybackDirection::Alternate
            } else {
                PlaybackDirection::Normal
            },
        })
    }
}

/// Springs and eases without a platform equivalent must be pre-sampled.
pub fn requires_pregenerated_keyframes(transition: &Transition) -> bool {
    transition.generator_type() == GeneratorType::Spring
        || transition
            .ease
            .as_ref()
            .is_some_and(|ease| ease.to_vec().iter().any(|e| e.native_definition().is_none()))
}

/// Sample `transition` at fixed steps into linear keyframes.
///
/// Returns the samples and the duration they cover.
pub fn pregenerate_keyframes(
    keyframes: &[AnimatableValue],
    transition: &Transition,
    config: &GlideConfig,
) -> Option<(Vec<AnimatableValue>, f64)> {
    let mut transition = transition.clone();
    transition.repeat = None;
    transition.delay_ms = None;
    let mut sampler = match Sampler::new(keyframes, &transition, transition.velocity.unwrap_or(0.0), config) {
        Ok(sampler) => sampler,
        Err(err) => {
            warn!(error = %err, "cannot pre-generate keyframes");
            return None;
        }
    };

    let step = config.generator.pregenerate_step_ms;
    let limit = config.generator.max_duration_ms;
    let mut samples = Vec::new();
    let mut t = 0.0;
    let mut done = false;
    while !done && t < limit {
        let state = sampler.sample(t);
        done = state.done;
        samples.push(state.value);
        t += step;
    }
    Some((samples, t - step))
}

/// Whether an animation described by `options` can run on a platform
/// timeline.
pub fn supports(options: &AnimationOptions) -> bool {
    let Some(element) = options.element.as_ref().and_then(|e| e.upgrade()) else {
        return false;
    };
    let Some(name) = options.name.as_deref() else {
        return false;
    };
    let transition = &options.transition;
    options.motion_value.is_some()
        && element.adapter().supports_native_timelines()
        && !element.has_update_listener()
        && ACCELERATED_KEYS.contains(&name)
        && transition.repeat_delay() == 0.0
        && transition.repeat_kind() != RepeatType::Mirror
        && transition.damping != Some(0.0)
        && transition.generator_type() != GeneratorType::Inertia
}

struct NativeResolved {
    timeline: Rc<dyn NativeTimeline>,
    keyframes: Vec<AnimatableValue>,
    /// Transition matching `keyframes`, after any pre-sampling.
    transition: Transition,
}

struct NativeInner {
    id: AnimationId,
    ctx: MotionContext,
    options: RefCell<AnimationOptions>,
    resolver: RefCell<Option<KeyframeResolver>>,
    resolved: RefCell<Option<NativeResolved>>,
    has_attempted_resolve: Cell<bool>,
    is_stopped: Cell<bool>,
    created_at: f64,
    finished_instantly: Cell<bool>,
    /// Software playback used when the platform declined the keyframes.
    fallback: RefCell<Option<SoftwareAnimation>>,
}

/// An animation played by the backend's own timeline.
#[derive(Clone)]
pub struct NativeAnimation {
    inner: Rc<NativeInner>,
}

impl NativeAnimation {
    pub fn new(options: AnimationOptions, ctx: &MotionContext) -> Self {
        let animation = Self::deferred(options, ctx);
        animation.begin();
        animation
    }

    pub(crate) fn deferred(options: AnimationOptions, ctx: &MotionContext) -> Self {
        Self {
            inner: Rc::new(NativeInner {
                id: AnimationId::new(),
                created_at: ctx.scheduler().now(),
                ctx: ctx.clone(),
                options: RefCell::new(options),
                resolver: RefCell::new(None),
                resolved: RefCell::new(None),
                has_attempted_resolve: Cell::new(false),
                is_stopped: Cell::new(false),
                finished_instantly: Cell::new(false),
                fallback: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn begin(&self) {
        let weak: Weak<NativeInner> = Rc::downgrade(&self.inner);
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
                        NativeAnimation { inner }.on_keyframes_resolved(keyframes, final_keyframe);
                    }
                }),
            )
        };
        *self.inner.resolver.borrow_mut() = Some(resolver.clone());
        resolver.schedule_resolve();
    }

    fn timeline(&self) -> Option<Rc<dyn NativeTimeline>> {
        self.inner.resolved.borrow().as_ref().map(|r| r.timeline.clone())
    }

    fn fallback(&self) -> Option<SoftwareAnimation> {
        self.inner.fallback.borrow().clone()
    }

    /// Whether playback moved to the main frame loop.
    pub fn is_software_fallback(&self) -> bool {
        self.inner.fallback.borrow().is_some()
    }

    fn flush_if_unresolved(&self) {
        if self.inner.resolved.borrow().is_none() && !self.inner.has_attempted_resolve.get() {
            self.inner.ctx.resolvers().flush();
        }
    }

    fn finish_instantly(&self, value: Option<AnimatableValue>) {
        let (on_update, on_complete) = {
            let options = self.inner.options.borrow();
            (options.on_update.clone(), options.on_complete.clone())
        };
        if let (Some(value), Some(on_update)) = (value, on_update) {
            on_update(&value);
        }
        self.inner.finished_instantly.set(true);
        if let Some(on_complete) = on_complete {
            on_complete();
        }
    }

    fn on_keyframes_resolved(&self, keyframes: Vec<AnimatableValue>, resolved_final: Option<AnimatableValue>) {
        let inner = &self.inner;
        inner.has_attempted_resolve.set(true);

        let readiness = inner.options.borrow_mut().readiness(&keyframes, resolved_final.as_ref());
        if let Readiness::Instant(value) = readiness {
            self.finish_instantly(value);
            return;
        }

        let (transition, name, element, autoplay, start_time) = {
            let options = inner.options.borrow();
            (
                options.transition.clone(),
                options.name.clone().unwrap_or_default(),
                options.element.as_ref().and_then(|e| e.upgrade()),
                options.autoplay,
                options.start_time,
            )
        };
        let native = NativeKeyframes::from_transition(&keyframes, &transition, inner.ctx.config());
        let timeline = match (element, native.as_ref()) {
            (Some(element), Some(native)) => element.adapter().start_native_timeline(&name, native),
            _ => None,
        };
        let (Some(timeline), Some(native)) = (timeline, native) else {
            debug!(key = %name, "platform timeline unavailable, playing in software");
            let options = inner.options.borrow().clone();
            let software =
                SoftwareAnimation::from_resolved(options, &inner.ctx, inner.created_at, keyframes, resolved_final);
            *inner.fallback.borrow_mut() = Some(software);
            return;
        };
        let timeline: Rc<dyn NativeTimeline> = Rc::from(timeline);
        debug!(key = %name, duration = native.duration_ms, samples = native.keyframes.len(), "started platform timeline");

        timeline.set_start_time(start_time.unwrap_or(inner.created_at));
        let weak = Rc::downgrade(&self.inner);
        let finish_keyframes: Vec<_> = native.keyframes.iter().cloned().map(Some).collect();
        let finish_transition = transition.clone();
        timeline.set_on_finish(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let animation = NativeAnimation { inner };
            let (value, on_complete) = {
                let options = animation.inner.options.borrow();
                (options.motion_value.as_ref().and_then(|v| v.upgrade()), options.on_complete.clone())
            };
            if let (Some(value), Some(last)) = (
                value,
                final_keyframe(&finish_keyframes, &finish_transition, resolved_final.as_ref()),
            ) {
                value.set(last);
            }
            if let Some(on_complete) = on_complete {
                on_complete();
            }
            animation.cancel();
        }));

        let mut sampled_transition = transition;
        if native.offsets.is_none() && native.segment_easings.is_none() && native.easing == "linear" {
            sampled_transition.kind = Some(GeneratorType::Keyframes);
            sampled_transition.duration_ms = Some(native.duration_ms);
            sampled_transition.ease = Some(Easing::Linear.into());
            sampled_transition.times = None;
        }
        *inner.resolved.borrow_mut() = Some(NativeResolved {
            timeline: timeline.clone(),
            keyframes: native.keyframes,
            transition: sampled_transition,
        });

        if !autoplay {
            timeline.pause();
        }
    }

    /// Sample the resolved keyframes at `t` ms without touching the timeline.
    fn sample(&self, t: f64) -> Option<AnimatableValue> {
        let resolved = self.inner.resolved.borrow();
        let resolved = resolved.as_ref()?;
        let mut transition = resolved.transition.clone();
        transition.delay_ms = None;
        let mut sampler = Sampler::new(&resolved.keyframes, &transition, 0.0, self.inner.ctx.config()).ok()?;
        Some(sampler.sample(t).value)
    }
}

impl PlaybackControls for NativeAnimation {
    fn id(&self) -> AnimationId {
        self.inner.id
    }

    fn state(&self) -> AnimationState {
        if let Some(software) = self.fallback() {
            return software.state();
        }
        match self.timeline() {
            Some(timeline) => timeline.play_state(),
            None if self.inner.finished_instantly.get() => AnimationState::Finished,
            None => AnimationState::Idle,
        }
    }

    fn time(&self) -> f64 {
        if let Some(software) = self.fallback() {
            return software.time();
        }
        self.timeline().map_or(0.0, |t| t.current_time())
    }

    fn set_time(&self, ms: f64) {
        if let Some(software) = self.fallback() {
            software.set_time(ms);
        } else if let Some(timeline) = self.timeline() {
            timeline.set_current_time(ms);
        }
    }

    fn speed(&self) -> f64 {
        if let Some(software) = self.fallback() {
            return software.speed();
        }
        self.timeline().map_or(1.0, |t| t.playback_rate())
    }

    fn set_speed(&self, speed: f64) {
        if let Some(software) = self.fallback() {
            software.set_speed(speed);
        } else if let Some(timeline) = self.timeline() {
            timeline.set_playback_rate(speed);
        }
    }

    fn duration(&self) -> f64 {
        self.flush_if_unresolved();
        if let Some(software) = self.fallback() {
            return software.duration();
        }
        self.inner.resolved.borrow().as_ref().map_or(0.0, |r| {
            r.transition.duration_ms.unwrap_or(300.0)
        })
    }

    fn play(&self) {
        if self.inner.is_stopped.get() {
            return;
        }
        if let Some(software) = self.fallback() {
            software.play();
        } else if let Some(timeline) = self.timeline() {
            timeline.play();
        }
    }

    fn pause(&self) {
        if let Some(software) = self.fallback() {
            software.pause();
        } else if let Some(timeline) = self.timeline() {
            timeline.pause();
        }
    }

    /// Stop where the timeline is, handing the current value and velocity
    /// back to the motion value.
    fn stop(&self) {
        let resolver = self.inner.resolver.borrow().clone();
        if let Some(resolver) = resolver {
            resolver.cancel();
        }
        self.inner.is_stopped.set(true);
        if let Some(software) = self.fallback() {
            software.stop();
            return;
        }
        let Some(timeline) = self.timeline() else {
            return;
        };
        if matches!(timeline.play_state(), AnimationState::Idle | AnimationState::Finished) {
            return;
        }

        let time = timeline.current_time();
        if time > 0.0 {
            let step = self.inner.ctx.config().generator.pregenerate_step_ms;
            let value = self.inner.options.borrow().motion_value.as_ref().and_then(|v| v.upgrade());
            if let (Some(value), Some(prev), Some(current)) = (value, self.sample(time - step), self.sample(time)) {
                value.set_with_velocity(prev, current, step);
            }
        }
        let on_stop = self.inner.options.borrow().on_stop.clone();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
        self.cancel();
    }

    fn cancel(&self) {
        if let Some(software) = self.fallback() {
            software.cancel();
        } else if let Some(timeline) = self.timeline() {
            timeline.cancel();
        }
    }

    fn complete(&self) {
        if let Some(software) = self.fallback() {
            software.complete();
        } else if let Some(timeline) = self.timeline() {
            timeline.finish();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MockTimeline, SharedTimeline};
    use super::*;
    use crate::element::testing::MockAdapter;
    use crate::element::{InstanceAdapter, RenderState, VisualElement};
    use crate::error::Result;
    use crate::frameloop::ManualClock;
    use crate::projection::geometry::Rect;
    use std::collections::BTreeMap;

    /// Adapter that accepts platform timelines and keeps them for the test.
    #[derive(Default)]
    struct NativeAdapter {
        base: MockAdapter,
        started: RefCell<Vec<Rc<MockTimeline>>>,
    }

    impl InstanceAdapter for NativeAdapter {
        fn read_value(&self, key: &str) -> Option<AnimatableValue> {
            self.base.read_value(key)
        }

        fn render(&self, state: &RenderState) {
            self.base.render(state)
        }

        fn measure_viewport_box(&self) -> Result<Rect> {
            self.base.measure_viewport_box()
        }

        fn supports_native_timelines(&self) -> bool {
            true
        }

        fn start_native_timeline(&self, _key: &str, keyframes: &NativeKeyframes) -> Option<Box<dyn NativeTimeline>> {
            let timeline = Rc::new(MockTimeline::new(keyframes.clone()));
            self.started.borrow_mut().push(timeline.clone());
            Some(Box::new(SharedTimeline(timeline)))
        }
    }

    fn setup() -> (MotionContext, Rc<NativeAdapter>, VisualElement) {
        let ctx = MotionContext::new(ManualClock::new(), GlideConfig::default());
        let adapter = Rc::new(NativeAdapter::default());
        let element = VisualElement::new(&ctx, adapter.clone());
        (ctx, adapter, element)
    }

    fn options_for(element: &VisualElement, key: &str, transition: Transition) -> AnimationOptions {
        let value = element.get_or_create_value(key, 0.0);
        let mut options = AnimationOptions::between(0.0, 1.0, transition).with_name(key);
        options.motion_value = Some(value.downgrade());
        options.element = Some(element.downgrade());
        options
    }

    #[test]
    fn test_supports() {
        let (_ctx, _adapter, element) = setup();
        assert!(supports(&options_for(&element, "opacity", Transition::tween(200.0))));
        assert!(!supports(&options_for(&element, "x", Transition::tween(200.0))));
        assert!(!supports(&options_for(
            &element,
            "opacity",
            Transition::tween(200.0).with_repeat(1.0, RepeatType::Mirror)
        )));
        assert!(!supports(&options_for(&element, "opacity", Transition::inertia())));
        assert!(!supports(&options_for(&element, "opacity", Transition::spring(100.0, 0.0))));

        element.set_on_update(|_: &BTreeMap<String, AnimatableValue>| {});
        assert!(!supports(&options_for(&element, "opacity", Transition::tween(200.0))));
    }

    #[test]
    fn test_spring_is_pregenerated() {
        let config = GlideConfig::default();
        let keyframes = [AnimatableValue::Number(0.0), AnimatableValue::Number(1.0)];
        let native = NativeKeyframes::from_transition(&keyframes, &Transition::spring(100.0, 10.0), &config).unwrap();
        assert_eq!(native.easing, "linear");
        assert!(native.keyframes.len() > 10);
        assert_eq!(native.duration_ms, (native.keyframes.len() - 1) as f64 * 10.0);
        assert!(native.keyframes[0].as_f64().unwrap().abs() < 1e-9);
        let last = native.keyframes.last().and_then(AnimatableValue::as_f64).unwrap();
        assert!((last - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_bezier_passes_through() {
        let config = GlideConfig::default();
        let keyframes = [AnimatableValue::Number(0.0), AnimatableValue::Number(1.0)];
        let transition = Transition::tween(200.0)
            .with_ease(Easing::EaseIn)
            .with_repeat(2.0, RepeatType::Reverse);
        let native = NativeKeyframes::from_transition(&keyframes, &transition, &config).unwrap();
        assert_eq!(native.easing, "ease-in");
        assert_eq!(native.keyframes.len(), 2);
        assert_eq!(native.iterations, 3.0);
        assert_eq!(native.direction, PlaybackDirection::Alternate);
    }

    #[test]
    fn test_finish_writes_final_value() {
        let (ctx, adapter, element) = setup();
        let completions = Rc::new(Cell::new(0));
        let options = options_for(&element, "opacity", Transition::tween(200.0)).on_complete({
            let completions = completions.clone();
            move || completions.set(completions.get() + 1)
        });
        let animation = NativeAnimation::new(options, &ctx);
        ctx.resolvers().flush();

        let timeline = adapter.started.borrow()[0].clone();
        assert_eq!(animation.state(), AnimationState::Running);
        animation.complete();
        assert_eq!(completions.get(), 1);
        assert_eq!(element.get_value("opacity").unwrap().get(), AnimatableValue::Number(1.0));
        assert_eq!(timeline.state.get(), AnimationState::Idle);
    }

    #[test]
    fn test_stop_hands_back_velocity() {
        let (ctx, adapter, element) = setup();
        let options = options_for(&element, "opacity", Transition::tween(100.0).with_ease(Easing::Linear));
        let animation = NativeAnimation::new(options, &ctx);
        ctx.resolvers().flush();

        let timeline = adapter.started.borrow()[0].clone();
        timeline.time.set(50.0);
        animation.stop();

        let value = element.get_value("opacity").unwrap();
        assert!((value.get_f64().unwrap() - 0.5).abs() < 1e-9);
        assert!((value.get_velocity() - 10.0).abs() < 1e-6);
        assert_eq!(timeline.state.get(), AnimationState::Idle);
    }

    /// Advertises platform timelines but declines every request.
    #[derive(Default)]
    struct DecliningAdapter {
        base: MockAdapter,
    }

    impl InstanceAdapter for DecliningAdapter {
        fn read_value(&self, key: &str) -> Option<AnimatableValue> {
            self.base.read_value(key)
        }

        fn render(&self, state: &RenderState) {
            self.base.render(state)
        }

        fn measure_viewport_box(&self) -> Result<Rect> {
            self.base.measure_viewport_box()
        }

        fn supports_native_timelines(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_declined_timeline_plays_in_software() {
        let clock = ManualClock::new();
        let ctx = MotionContext::new(clock.clone(), GlideConfig::default());
        let element = VisualElement::new(&ctx, Rc::new(DecliningAdapter::default()));
        let value = element.get_or_create_value("opacity", 0.0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _subscription = value.on_change({
            let seen = seen.clone();
            move |latest: &AnimatableValue| seen.borrow_mut().push(latest.as_f64().unwrap_or(f64::NAN))
        });

        let transition = Transition::tween(200.0).with_ease(Easing::Linear);
        let controls =
            crate::animation::animate_motion_value(&ctx, "opacity", &value, 1.0.into(), &transition.into(), Some(&element));

        clock.advance(16.0);
        ctx.scheduler().process_frame();
        assert_eq!(controls.state(), AnimationState::Running);
        let first = seen.borrow().first().copied().unwrap_or(f64::NAN);
        assert!(first > 0.0 && first < 0.5, "first frame wrote {first}");

        for _ in 0..20 {
            clock.advance(16.0);
            ctx.scheduler().process_frame();
        }
        assert!(seen.borrow().len() > 5);
        assert_eq!(value.get_f64(), Some(1.0));
        assert_eq!(controls.state(), AnimationState::Finished);
        assert!(!value.is_animating());
    }
}
