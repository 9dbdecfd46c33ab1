//! Options shared by every animation backend.

use super::transition::{Transition, final_keyframe};
use crate::element::WeakVisualElement;
use crate::interpolate::complex::{ComplexValue, Token};
use crate::types::AnimatableValue;
use crate::value::WeakMotionValue;
use crate::generators::GeneratorType;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Called with every sampled value.
pub type UpdateCallback = Rc<dyn Fn(&AnimatableValue)>;
/// Called once when an animation finishes or is stopped.
pub type DoneCallback = Rc<dyn Fn()>;

/// Everything needed to build an animation.
#[derive(Clone)]
pub struct AnimationOptions {
    /// Keyframes to pass through; `None` entries are filled by the resolver.
    pub keyframes: Vec<Option<AnimatableValue>>,
    pub transition: Transition,
    /// Style key being animated, used for key-specific resolution.
    pub name: Option<String>,
    pub motion_value: Option<WeakMotionValue>,
    pub element: Option<WeakVisualElement>,
    pub on_update: Option<UpdateCallback>,
    pub on_complete: Option<DoneCallback>,
    pub on_stop: Option<DoneCallback>,
    /// Start playing as soon as keyframes resolve.
    pub autoplay: bool,
    /// Explicit start time on the scheduler clock.
    pub start_time: Option<f64>,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            keyframes: Vec::new(),
            transition: Transition::default(),
            name: None,
            motion_value: None,
            element: None,
            on_update: None,
            on_complete: None,
            on_stop: None,
            autoplay: true,
            start_time: None,
        }
    }
}

impl fmt::Debug for AnimationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationOptions")
            .field("keyframes", &self.keyframes)
            .field("transition", &self.transition)
            .field("name", &self.name)
            .field("autoplay", &self.autoplay)
            .finish_non_exhaustive()
    }
}

impl AnimationOptions {
    /// Animate through `keyframes` with `transition`.
    pub fn new(keyframes: Vec<Option<AnimatableValue>>, transition: Transition) -> Self {
        Self {
            keyframes,
            transition,
            ..Default::default()
        }
    }

    /// Animate from `from` to `to`.
    pub fn between(from: impl Into<AnimatableValue>, to: impl Into<AnimatableValue>, transition: Transition) -> Self {
        Self::new(vec![Some(from.into()), Some(to.into())], transition)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn on_update<F: Fn(&AnimatableValue) + 'static>(mut self, f: F) -> Self {
        self.on_update = Some(Rc::new(f));
        self
    }

    pub fn on_complete<F: Fn() + 'static>(mut self, f: F) -> Self {
        self.on_complete = Some(Rc::new(f));
        self
    }

    pub fn on_stop<F: Fn() + 'static>(mut self, f: F) -> Self {
        self.on_stop = Some(Rc::new(f));
        self
    }

    pub fn paused(mut self) -> Self {
        self.autoplay = false;
        self
    }

    /// Decide how to play resolved `keyframes`.
    ///
    /// Keyframes that can't animate finish instantly when there is no
    /// delay. With a delay they become a zero-length tween so the delay
    /// still elapses.
    pub(crate) fn readiness(&mut self, keyframes: &[AnimatableValue], resolved_final: Option<&AnimatableValue>) -> Readiness {
        let transition = &self.transition;
        let velocity = transition.velocity.unwrap_or(0.0);
        if can_animate(keyframes, self.name.as_deref(), transition.generator_type(), velocity) {
            return Readiness::Animate;
        }
        if transition.delay_ms.unwrap_or(0.0) <= 0.0 {
            let wrapped: Vec<_> = keyframes.iter().cloned().map(Some).collect();
            return Readiness::Instant(final_keyframe(&wrapped, transition, resolved_final));
        }
        self.transition.duration_ms = Some(0.0);
        self.transition.kind = Some(GeneratorType::Keyframes);
        Readiness::Animate
    }
}

/// Result of [`AnimationOptions::readiness`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Readiness {
    Animate,
    /// Skip playback, leaving this value behind.
    Instant(Option<AnimatableValue>),
}

/// Whether `value` can be interpolated for `key`.
///
/// Numbers always can. Strings can when they contain at least one number
/// or color (`"10px"`, `"#fff"`, `"0 0 4px red"`) and aren't `url(...)`.
/// `zIndex` is always discrete.
pub fn is_animatable(value: &AnimatableValue, key: Option<&str>) -> bool {
    if key == Some("zIndex") {
        return false;
    }
    match value {
        AnimatableValue::Number(_) => true,
        AnimatableValue::Text(s) => {
            let s = s.trim();
            if s.starts_with("url(") {
                return false;
            }
            s == "0"
                || ComplexValue::analyse(s)
                    .tokens
                    .iter()
                    .any(|t| matches!(t, Token::Number(_) | Token::Color(_)))
        }
    }
}

/// Whether resolved `keyframes` describe an animation worth running.
///
/// `display` and `visibility` always animate (they switch discretely). Other
/// keys need animatable endpoints, and either keyframes that differ or a
/// spring with velocity to carry it.
pub fn can_animate(keyframes: &[AnimatableValue], key: Option<&str>, kind: GeneratorType, velocity: f64) -> bool {
    let (Some(origin), Some(target)) = (keyframes.first(), keyframes.last()) else {
        return false;
    };
    if matches!(key, Some("display") | Some("visibility")) {
        return true;
    }

    let origin_animatable = is_animatable(origin, key);
    let target_animatable = is_animatable(target, key);
    if origin_animatable != target_animatable {
        warn!(
            key = key.unwrap_or_default(),
            %origin,
            %target,
            "animating between an animatable and a non-animatable value, snapping instead"
        );
    }
    if !origin_animatable || !target_animatable {
        return false;
    }

    has_keyframes_changed(keyframes) || (kind.is_physics() && velocity != 0.0)
}

fn has_keyframes_changed(keyframes: &[AnimatableValue]) -> bool {
    match keyframes {
        [_] => true,
        [first, rest @ ..] => rest.iter().any(|k| k != first),
        [] => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(input: &[&str]) -> Vec<AnimatableValue> {
        input.iter().map(|s| AnimatableValue::from(*s)).collect()
    }

    #[test]
    fn test_is_animatable() {
        assert!(is_animatable(&AnimatableValue::Number(3.0), None));
        assert!(is_animatable(&"10px".into(), None));
        assert!(is_animatable(&"#fff".into(), None));
        assert!(is_animatable(&"0".into(), None));
        assert!(!is_animatable(&"auto".into(), None));
        assert!(!is_animatable(&"url(a1.png)".into(), None));
        assert!(!is_animatable(&AnimatableValue::Number(1.0), Some("zIndex")));
    }

    #[test]
    fn test_can_animate() {
        assert!(can_animate(&values(&["0px", "10px"]), Some("x"), GeneratorType::Keyframes, 0.0));
        assert!(!can_animate(&values(&["10px", "10px"]), Some("x"), GeneratorType::Keyframes, 0.0));
        assert!(can_animate(
            &[AnimatableValue::Number(5.0), AnimatableValue::Number(5.0)],
            Some("x"),
            GeneratorType::Spring,
            100.0
        ));
        assert!(!can_animate(&values(&["auto", "10px"]), Some("height"), GeneratorType::Keyframes, 0.0));
        assert!(can_animate(&values(&["none", "block"]), Some("display"), GeneratorType::Keyframes, 0.0));
        assert!(!can_animate(&[], Some("x"), GeneratorType::Keyframes, 0.0));
        assert!(can_animate(&values(&["1px"]), None, GeneratorType::Keyframes, 0.0));
    }
}
