//! Transition configuration.
//!
//! This module provides:
//! - `Transition`: how one value animates (generator type, timing, physics)
//! - `TransitionGroup`: a base transition with per-key overrides
//! - `default_transition`: what a value key animates with when nothing is set
//!
//! # Example
//!
//! ```ignore
//! use glide_motion::animation::{Transition, TransitionGroup, RepeatType};
//! use glide_motion::easing::Easing;
//!
//! // Opacity fades over 300ms, everything else springs.
//! let group = TransitionGroup::new(Transition::spring(400.0, 30.0))
//!     .with_property("opacity", Transition::tween(300.0).with_ease(Easing::EaseOut));
//! ```

use crate::easing::Easing;
use crate::generators::{GeneratorType, ModifyTarget};
use crate::types::{AnimatableValue, is_transform_key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How repeats after the first iteration play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatType {
    /// Restart from the first keyframe.
    #[default]
    Loop,
    /// Alternate direction every iteration.
    Reverse,
    /// Swap origin and target every iteration, keeping the generator forwards.
    Mirror,
}

/// One easing for every segment, or one per segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EaseSpec {
    Single(Easing),
    PerSegment(Vec<Easing>),
}

impl EaseSpec {
    pub fn to_vec(&self) -> Vec<Easing> {
        match self {
            Self::Single(easing) => vec![*easing],
            Self::PerSegment(easings) => easings.clone(),
        }
    }
}

impl From<Easing> for EaseSpec {
    fn from(easing: Easing) -> Self {
        Self::Single(easing)
    }
}

/// How a single value animates.
///
/// Every field is optional; unset fields fall back to the generator
/// defaults or, when no timing field is set at all, to
/// [`default_transition`] for the animated key. Times are milliseconds,
/// velocities units per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transition {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<GeneratorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ease: Option<EaseSpec>,
    /// Keyframe offsets in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub times: Option<Vec<f64>>,
    /// Extra iterations after the first; `f64::INFINITY` repeats forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_type: Option<RepeatType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_delay_ms: Option<f64>,

    // spring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounce: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stiffness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damping: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_delta: Option<f64>,

    // inertia
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_constant_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounce_stiffness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounce_damping: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip)]
    pub modify_target: Option<ModifyTarget>,

    /// Overrides the first keyframe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<AnimatableValue>,
    /// Time already elapsed, subtracted from the delay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
    /// Value written once the animation finishes, if different from the
    /// last keyframe (e.g. restoring `"auto"` after a measured animation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_keyframe: Option<AnimatableValue>,
}

impl Transition {
    /// A keyframes tween of `duration_ms`.
    pub fn tween(duration_ms: f64) -> Self {
        Self {
            kind: Some(GeneratorType::Keyframes),
            duration_ms: Some(duration_ms),
            ..Default::default()
        }
    }

    /// A physics spring.
    pub fn spring(stiffness: f64, damping: f64) -> Self {
        Self {
            kind: Some(GeneratorType::Spring),
            stiffness: Some(stiffness),
            damping: Some(damping),
            ..Default::default()
        }
    }

    /// A spring defined by its perceived duration and bounciness.
    pub fn spring_duration(duration_ms: f64, bounce: f64) -> Self {
        Self {
            kind: Some(GeneratorType::Spring),
            duration_ms: Some(duration_ms),
            bounce: Some(bounce),
            ..Default::default()
        }
    }

    /// Inertial decay from the value's current velocity.
    pub fn inertia() -> Self {
        Self {
            kind: Some(GeneratorType::Inertia),
            ..Default::default()
        }
    }

    /// Snap straight to the final keyframe.
    pub fn instant() -> Self {
        Self {
            duration_ms: Some(0.0),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_ease(mut self, ease: impl Into<EaseSpec>) -> Self {
        self.ease = Some(ease.into());
        self
    }

    pub fn with_times(mut self, times: Vec<f64>) -> Self {
        self.times = Some(times);
        self
    }

    pub fn with_repeat(mut self, repeat: f64, repeat_type: RepeatType) -> Self {
        self.repeat = Some(repeat);
        self.repeat_type = Some(repeat_type);
        self
    }

    pub fn with_repeat_delay(mut self, repeat_delay_ms: f64) -> Self {
        self.repeat_delay_ms = Some(repeat_delay_ms);
        self
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn with_rest(mut self, rest_speed: f64, rest_delta: f64) -> Self {
        self.rest_speed = Some(rest_speed);
        self.rest_delta = Some(rest_delta);
        self
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_time_constant(mut self, time_constant_ms: f64) -> Self {
        self.time_constant_ms = Some(time_constant_ms);
        self
    }

    pub fn with_bounce_spring(mut self, stiffness: f64, damping: f64) -> Self {
        self.bounce_stiffness = Some(stiffness);
        self.bounce_damping = Some(damping);
        self
    }

    pub fn with_modify_target<F: Fn(f64) -> f64 + 'static>(mut self, f: F) -> Self {
        self.modify_target = Some(ModifyTarget::new(f));
        self
    }

    pub fn with_from(mut self, from: impl Into<AnimatableValue>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_final_keyframe(mut self, value: impl Into<AnimatableValue>) -> Self {
        self.final_keyframe = Some(value.into());
        self
    }

    /// Whether any field that shapes the motion is set.
    ///
    /// Scheduling fields (delay, repeat, from, elapsed) don't count, so a
    /// transition carrying only a delay still picks up the key's default.
    pub fn is_defined(&self) -> bool {
        self.kind.is_some()
            || self.duration_ms.is_some()
            || self.ease.is_some()
            || self.times.is_some()
            || self.bounce.is_some()
            || self.stiffness.is_some()
            || self.damping.is_some()
            || self.mass.is_some()
            || self.velocity.is_some()
            || self.rest_speed.is_some()
            || self.rest_delta.is_some()
            || self.power.is_some()
            || self.time_constant_ms.is_some()
            || self.bounce_stiffness.is_some()
            || self.bounce_damping.is_some()
            || self.min.is_some()
            || self.max.is_some()
            || self.modify_target.is_some()
            || self.final_keyframe.is_some()
    }

    /// Overlay the shaping fields of `defaults` onto this transition.
    pub fn merged_with(mut self, defaults: Transition) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if defaults.$field.is_some() {
                    self.$field = defaults.$field;
                })*
            };
        }
        take!(kind, duration_ms, ease, stiffness, damping, rest_speed, rest_delta, mass, bounce);
        self
    }

    /// Replace every field `overrides` sets, scheduling included.
    pub fn overridden_by(mut self, overrides: &Transition) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if overrides.$field.is_some() {
                    self.$field = overrides.$field.clone();
                })*
            };
        }
        take!(
            kind, delay_ms, duration_ms, ease, times, repeat, repeat_type, repeat_delay_ms, bounce, stiffness,
            damping, mass, velocity, rest_speed, rest_delta, power, time_constant_ms, bounce_stiffness,
            bounce_damping, min, max, modify_target
        );
        self
    }

    pub fn generator_type(&self) -> GeneratorType {
        self.kind.map(GeneratorType::canonical).unwrap_or(GeneratorType::Keyframes)
    }

    pub fn repeat_count(&self) -> f64 {
        self.repeat.unwrap_or(0.0)
    }

    pub fn repeat_kind(&self) -> RepeatType {
        self.repeat_type.unwrap_or_default()
    }

    pub fn repeat_delay(&self) -> f64 {
        self.repeat_delay_ms.unwrap_or(0.0)
    }
}

/// Default transition for animating `key` through `keyframes`.
///
/// - more than two keyframes: an 800ms keyframes tween
/// - `scale*`: a critically damped spring (unless the target isn't zero)
/// - other transform keys: an under-damped spring
/// - anything else: a 300ms tween eased `[0.25, 0.1, 0.35, 1]`
pub fn default_transition(key: &str, keyframes: &[Option<AnimatableValue>]) -> Transition {
    if keyframes.len() > 2 {
        return Transition::tween(800.0);
    }
    if is_transform_key(key) {
        if key.starts_with("scale") {
            let target_is_zero = keyframes
                .get(1)
                .and_then(|k| k.as_ref())
                .is_some_and(AnimatableValue::is_zero);
            let damping = if target_is_zero { 2.0 * 550f64.sqrt() } else { 30.0 };
            return settling_spring(550.0, damping);
        }
        return settling_spring(500.0, 25.0);
    }
    Transition::tween(300.0).with_ease(Easing::CubicBezier {
        x1: 0.25,
        y1: 0.1,
        x2: 0.35,
        y2: 1.0,
    })
}

fn settling_spring(stiffness: f64, damping: f64) -> Transition {
    Transition {
        rest_speed: Some(10.0),
        ..Transition::spring(stiffness, damping)
    }
}

/// The value a finished animation leaves behind.
///
/// Null keyframes are skipped. With an odd number of `reverse`/`mirror`
/// repeats the animation ends on its first keyframe. An explicit
/// `final_keyframe` wins unless the animation ends at the start.
pub fn final_keyframe(
    keyframes: &[Option<AnimatableValue>],
    transition: &Transition,
    fallback: Option<&AnimatableValue>,
) -> Option<AnimatableValue> {
    let resolved: Vec<&AnimatableValue> = keyframes.iter().flatten().collect();
    let repeat = transition.repeat_count();
    let ends_at_start = repeat > 0.0
        && repeat.is_finite()
        && transition.repeat_kind() != RepeatType::Loop
        && (repeat as u64) % 2 == 1;
    let index = if ends_at_start { 0 } else { resolved.len().checked_sub(1)? };
    if index != 0 {
        if let Some(explicit) = fallback.or(transition.final_keyframe.as_ref()) {
            return Some(explicit.clone());
        }
    }
    resolved.get(index).map(|v| (*v).clone())
}

/// A base transition with per-key and default overrides.
///
/// Lookup order for a key: its own entry, then `default`, then `base`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionGroup {
    #[serde(flatten)]
    pub base: Transition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Transition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Transition>,
}

impl TransitionGroup {
    /// Create a group where every key uses `base`.
    pub fn new(base: Transition) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// Set the fallback used by keys without their own entry.
    pub fn with_default(mut self, transition: Transition) -> Self {
        self.default = Some(transition);
        self
    }

    /// Add a key-specific transition.
    pub fn with_property(mut self, key: impl Into<String>, transition: Transition) -> Self {
        self.properties.insert(key.into(), transition);
        self
    }

    /// Find the transition that applies to `key`.
    pub fn spec_for(&self, key: &str) -> &Transition {
        self.properties
            .get(key)
            .or(self.default.as_ref())
            .unwrap_or(&self.base)
    }

    /// Delay for `key`, falling back to the base delay.
    pub fn delay_for(&self, key: &str) -> f64 {
        self.spec_for(key)
            .delay_ms
            .or(self.base.delay_ms)
            .unwrap_or(0.0)
    }

    /// Check if a key has its own transition.
    pub fn has_transition_for(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }
}

impl From<Transition> for TransitionGroup {
    fn from(base: Transition) -> Self {
        Self::new(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(values: &[f64]) -> Vec<Option<AnimatableValue>> {
        values.iter().map(|v| Some(AnimatableValue::Number(*v))).collect()
    }

    #[test]
    fn test_default_transition_by_key() {
        let many = default_transition("opacity", &frames(&[0.0, 0.5, 1.0]));
        assert_eq!(many.duration_ms, Some(800.0));

        let x = default_transition("x", &frames(&[0.0, 100.0]));
        assert_eq!(x.kind, Some(GeneratorType::Spring));
        assert_eq!(x.stiffness, Some(500.0));
        assert_eq!(x.damping, Some(25.0));
        assert_eq!(x.rest_speed, Some(10.0));

        let scale = default_transition("scale", &frames(&[1.0, 0.0]));
        assert_eq!(scale.stiffness, Some(550.0));
        assert!((scale.damping.unwrap() - 2.0 * 550f64.sqrt()).abs() < 1e-9);
        let scale = default_transition("scaleX", &frames(&[0.0, 2.0]));
        assert_eq!(scale.damping, Some(30.0));

        let color = default_transition("backgroundColor", &frames(&[0.0, 1.0]));
        assert_eq!(color.duration_ms, Some(300.0));
        assert!(matches!(color.ease, Some(EaseSpec::Single(Easing::CubicBezier { .. }))));
    }

    #[test]
    fn test_is_defined_ignores_scheduling_fields() {
        assert!(!Transition::default().is_defined());
        assert!(!Transition::default().with_delay(100.0).is_defined());
        assert!(!Transition::default().with_repeat(2.0, RepeatType::Loop).is_defined());
        assert!(Transition::tween(100.0).is_defined());
        assert!(Transition::default().with_velocity(10.0).is_defined());
    }

    #[test]
    fn test_merged_with_keeps_scheduling() {
        let merged = Transition::default()
            .with_delay(50.0)
            .merged_with(default_transition("x", &frames(&[0.0, 1.0])));
        assert_eq!(merged.delay_ms, Some(50.0));
        assert_eq!(merged.kind, Some(GeneratorType::Spring));
    }

    #[test]
    fn test_overridden_by() {
        let base = Transition::inertia().with_time_constant(750.0).with_bounds(Some(0.0), None);
        let merged = base.overridden_by(&Transition::default().with_power(0.2).with_bounds(None, Some(10.0)));
        assert_eq!(merged.time_constant_ms, Some(750.0));
        assert_eq!(merged.power, Some(0.2));
        assert_eq!(merged.min, Some(0.0));
        assert_eq!(merged.max, Some(10.0));
        assert_eq!(merged.generator_type(), GeneratorType::Inertia);
    }

    #[test]
    fn test_final_keyframe() {
        let keyframes = vec![Some(AnimatableValue::Number(0.0)), None, Some(AnimatableValue::Number(10.0))];
        let plain = Transition::default();
        assert_eq!(final_keyframe(&keyframes, &plain, None), Some(AnimatableValue::Number(10.0)));

        let odd_reverse = Transition::default().with_repeat(1.0, RepeatType::Reverse);
        assert_eq!(final_keyframe(&keyframes, &odd_reverse, None), Some(AnimatableValue::Number(0.0)));

        let odd_loop = Transition::default().with_repeat(1.0, RepeatType::Loop);
        assert_eq!(final_keyframe(&keyframes, &odd_loop, None), Some(AnimatableValue::Number(10.0)));

        let auto = AnimatableValue::from("auto");
        assert_eq!(final_keyframe(&keyframes, &plain, Some(&auto)), Some(auto.clone()));
        assert_eq!(final_keyframe(&keyframes, &odd_reverse, Some(&auto)), Some(AnimatableValue::Number(0.0)));

        assert_eq!(final_keyframe(&[None], &plain, None), None);
    }

    #[test]
    fn test_group_lookup_order() {
        let group = TransitionGroup::new(Transition::tween(100.0).with_delay(20.0))
            .with_property("opacity", Transition::tween(300.0));
        assert_eq!(group.spec_for("opacity").duration_ms, Some(300.0));
        assert_eq!(group.spec_for("x").duration_ms, Some(100.0));
        assert_eq!(group.delay_for("opacity"), 20.0);
        assert!(group.has_transition_for("opacity"));

        let group = group.with_default(Transition::spring(100.0, 10.0));
        assert_eq!(group.spec_for("x").kind, Some(GeneratorType::Spring));
    }

    #[test]
    fn test_transition_from_json() {
        let json = r#"{
            "type": "spring",
            "stiffness": 300,
            "damping": 20,
            "delay_ms": 100,
            "repeat": 2,
            "repeat_type": "mirror",
            "properties": { "opacity": { "type": "tween", "duration_ms": 200, "ease": "easeOut" } }
        }"#;
        let group: TransitionGroup = serde_json::from_str(json).unwrap();
        assert_eq!(group.base.kind, Some(GeneratorType::Spring));
        assert_eq!(group.base.repeat_kind(), RepeatType::Mirror);
        let opacity = group.spec_for("opacity");
        assert_eq!(opacity.generator_type(), GeneratorType::Keyframes);
        assert_eq!(opacity.ease, Some(EaseSpec::Single(Easing::EaseOut)));
    }

    #[test]
    fn test_ease_spec_forms() {
        let single: EaseSpec = serde_json::from_str("[0.4, 0, 0.1, 1]").unwrap();
        assert!(matches!(single, EaseSpec::Single(Easing::CubicBezier { .. })));
        let many: EaseSpec = serde_json::from_str(r#"["linear", "easeIn"]"#).unwrap();
        assert_eq!(many.to_vec(), vec![Easing::Linear, Easing::EaseIn]);
    }
}
