//! Animation controller.
//!
//! An animation binds a [`MotionValue`] to either a software [`Sampler`]
//! ticked on the frame loop or a backend [`native::NativeTimeline`]. Both
//! first pass their keyframes through a [`resolver::KeyframeResolver`],
//! then expose the same [`PlaybackControls`].
//!
//! [`animate_motion_value`] is the usual entry point: it picks the
//! transition for a key, fills in defaults, and chooses a backend.

pub mod events;
pub mod group;
pub mod native;
pub mod options;
pub mod resolver;
pub mod sampler;
pub mod software;
pub mod transition;

pub use events::{AnimationEvent, EventQueue};
pub use group::GroupPlaybackControls;
pub use native::{NativeAnimation, NativeKeyframes, NativeTimeline, PlaybackDirection};
pub use options::{AnimationOptions, can_animate, is_animatable};
pub use resolver::{KeyframeResolver, ResolverQueue};
pub use sampler::Sampler;
pub use software::SoftwareAnimation;
pub use transition::{EaseSpec, RepeatType, Transition, TransitionGroup, default_transition, final_keyframe};

use crate::context::MotionContext;
use crate::element::VisualElement;
use crate::types::{AnimatableValue, AnimationId, AnimationState};
use crate::value::MotionValue;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// Playback interface shared by every animation backend and by groups.
///
/// Handles are shared (`Rc`), so every method takes `&self`. Times are
/// milliseconds.
pub trait PlaybackControls {
    fn id(&self) -> AnimationId;

    fn state(&self) -> AnimationState;

    /// Current local time, including any start delay.
    fn time(&self) -> f64;

    /// Seek to `ms`.
    fn set_time(&self, ms: f64);

    fn speed(&self) -> f64;

    /// Set the playback rate; negative values play backwards.
    fn set_speed(&self, speed: f64);

    /// Duration of one iteration. Forces keyframe resolution if pending.
    fn duration(&self) -> f64;

    fn play(&self);

    fn pause(&self);

    /// Stop at the current value, keeping velocity.
    fn stop(&self);

    /// Tear down without completing. A no-op once finished.
    fn cancel(&self);

    /// Jump to the end and finish.
    fn complete(&self);

    fn is_finished(&self) -> bool {
        self.state() == AnimationState::Finished
    }
}

/// What a value animates to.
///
/// A single value animates from the value's current state. Keyframes may
/// contain `None` wildcards, filled from the current value or the previous
/// keyframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueTarget {
    Value(AnimatableValue),
    Keyframes(Vec<Option<AnimatableValue>>),
}

impl ValueTarget {
    /// Keyframes to resolve, with a leading wildcard for single targets.
    pub fn to_keyframes(&self) -> Vec<Option<AnimatableValue>> {
        match self {
            Self::Value(value) => vec![None, Some(value.clone())],
            Self::Keyframes(keyframes) => keyframes.clone(),
        }
    }

    /// The first concrete value, if any.
    pub fn first_defined(&self) -> Option<AnimatableValue> {
        match self {
            Self::Value(value) => Some(value.clone()),
            Self::Keyframes(keyframes) => keyframes.iter().flatten().next().cloned(),
        }
    }
}

impl From<AnimatableValue> for ValueTarget {
    fn from(value: AnimatableValue) -> Self {
        Self::Value(value)
    }
}

impl From<f64> for ValueTarget {
    fn from(value: f64) -> Self {
        Self::Value(value.into())
    }
}

impl From<&str> for ValueTarget {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<String> for ValueTarget {
    fn from(value: String) -> Self {
        Self::Value(value.into())
    }
}

impl From<Vec<Option<AnimatableValue>>> for ValueTarget {
    fn from(keyframes: Vec<Option<AnimatableValue>>) -> Self {
        Self::Keyframes(keyframes)
    }
}

impl From<Vec<f64>> for ValueTarget {
    fn from(keyframes: Vec<f64>) -> Self {
        Self::Keyframes(keyframes.into_iter().map(|v| Some(v.into())).collect())
    }
}

/// Animate `value` (style key `key`) to `target`.
///
/// The value's running animation is stopped and replaced. Transitions with
/// no shaping fields pick up [`default_transition`] for the key. Zero-length
/// transitions without delay, and every animation when reduced motion is
/// configured, write the final keyframe on the next update phase instead of
/// animating.
pub fn animate_motion_value(
    ctx: &MotionContext,
    key: &str,
    value: &MotionValue,
    target: ValueTarget,
    transition: &TransitionGroup,
    element: Option<&VisualElement>,
) -> Rc<dyn PlaybackControls> {
    let mut spec = transition.spec_for(key).clone();
    let mut keyframes = target.to_keyframes();

    let delay = transition.delay_for(key) - spec.elapsed_ms.take().unwrap_or(0.0);
    spec.delay_ms = Some(delay);
    if !spec.is_defined() {
        spec = spec.merged_with(default_transition(key, &keyframes));
    }
    if spec.velocity.is_none() {
        spec.velocity = Some(value.get_velocity());
    }
    if let Some(from) = spec.from.take() {
        match keyframes.first_mut() {
            Some(first) => *first = Some(from),
            None => keyframes.push(Some(from)),
        }
    }

    let instant = spec.duration_ms == Some(0.0) && spec.repeat_delay() == 0.0 && delay == 0.0;
    if instant || ctx.config().layout.reduced_motion {
        if let Some(last) = final_keyframe(&keyframes, &spec, None) {
            debug!(key, "skipping animation");
            return skip_to(ctx, value, last);
        }
    }

    let weak_value = value.downgrade();
    let finished_id = Rc::new(Cell::new(None::<AnimationId>));
    let mut options = AnimationOptions::new(keyframes, spec).with_name(key);
    options.motion_value = Some(value.downgrade());
    options.element = element.map(VisualElement::downgrade);
    options.on_update = Some(Rc::new({
        let weak_value = weak_value.clone();
        move |latest: &AnimatableValue| {
            if let Some(value) = weak_value.upgrade() {
                value.set(latest.clone());
            }
        }
    }));
    options.on_complete = Some(Rc::new({
        let finished_id = finished_id.clone();
        move || {
            if let (Some(value), Some(id)) = (weak_value.upgrade(), finished_id.get()) {
                value.finish_animation(id);
            }
        }
    }));

    if native::supports(&options) {
        debug!(key, "animating on platform timeline");
        let animation = NativeAnimation::deferred(options, ctx);
        finished_id.set(Some(animation.id()));
        value.start(Rc::new(animation.clone()));
        animation.begin();
        Rc::new(animation)
    } else {
        let animation = SoftwareAnimation::deferred(options, ctx);
        finished_id.set(Some(animation.id()));
        value.start(Rc::new(animation.clone()));
        animation.begin();
        Rc::new(animation)
    }
}

/// Attach an empty animation and write `last` on the next update phase.
fn skip_to(ctx: &MotionContext, value: &MotionValue, last: AnimatableValue) -> Rc<dyn PlaybackControls> {
    let group = GroupPlaybackControls::empty();
    let id = group.id();
    value.start(Rc::new(group.clone()));
    let value = value.clone();
    ctx.scheduler().update(move |_| {
        value.set(last.clone());
        value.finish_animation(id);
    });
    Rc::new(group)
}
