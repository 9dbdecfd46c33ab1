//! Animation generators.
//!
//! A generator is a pure function of elapsed time returning `{ value, done }`:
//! - `KeyframesGenerator`: eased piecewise interpolation (tweens)
//! - `SpringGenerator`: closed-form damped harmonic oscillator
//! - `InertiaGenerator`: exponential decay with optional boundary springs
//!
//! Generators that cannot know their duration up front report `None` from
//! `calculated_duration`, and callers probe them with
//! [`calc_generator_duration`].

pub mod inertia;
pub mod keyframes;
pub mod spring;

pub use inertia::{InertiaGenerator, InertiaOptions, ModifyTarget};
pub use keyframes::KeyframesGenerator;
pub use spring::{SpringGenerator, SpringOptions, find_spring};

use crate::types::AnimatableValue;
use crate::value::velocity_per_second;
use glide_config::GeneratorConfig;
use serde::{Deserialize, Serialize};

/// One sample of a generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorState<V> {
    pub done: bool,
    pub value: V,
}

/// Kind of generator a transition asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorType {
    Keyframes,
    /// Alias of `Keyframes`.
    Tween,
    Spring,
    Inertia,
    /// Alias of `Inertia`.
    Decay,
}

impl GeneratorType {
    /// Collapse aliases.
    pub fn canonical(self) -> Self {
        match self {
            Self::Tween => Self::Keyframes,
            Self::Decay => Self::Inertia,
            other => other,
        }
    }

    /// Physics-based generators need numeric endpoints.
    pub fn is_physics(self) -> bool {
        matches!(self.canonical(), Self::Spring | Self::Inertia)
    }
}

/// A generator of any kind.
#[derive(Debug, Clone)]
pub enum Generator {
    Keyframes(KeyframesGenerator),
    Spring(SpringGenerator),
    Inertia(InertiaGenerator),
}

impl Generator {
    /// Sample at `t` milliseconds.
    pub fn next(&mut self, t: f64) -> GeneratorState<AnimatableValue> {
        match self {
            Self::Keyframes(g) => g.next(t),
            Self::Spring(g) => number_state(g.next(t)),
            Self::Inertia(g) => number_state(g.next(t)),
        }
    }

    /// Duration in milliseconds, if known without probing.
    pub fn calculated_duration(&self) -> Option<f64> {
        match self {
            Self::Keyframes(g) => g.calculated_duration(),
            Self::Spring(g) => g.calculated_duration(),
            Self::Inertia(g) => g.calculated_duration(),
        }
    }

    pub fn kind(&self) -> GeneratorType {
        match self {
            Self::Keyframes(_) => GeneratorType::Keyframes,
            Self::Spring(_) => GeneratorType::Spring,
            Self::Inertia(_) => GeneratorType::Inertia,
        }
    }
}

fn number_state(state: GeneratorState<f64>) -> GeneratorState<AnimatableValue> {
    GeneratorState {
        done: state.done,
        value: AnimatableValue::Number(state.value),
    }
}

/// Probe a generator until it reports done.
///
/// Returns `f64::INFINITY` when it is still running at the probe budget.
pub fn calc_generator_duration(generator: &mut Generator, config: &GeneratorConfig) -> f64 {
    let mut duration = 0.0;
    let mut state = generator.next(duration);
    while !state.done && duration < config.max_duration_ms {
        duration += config.probe_step_ms;
        state = generator.next(duration);
    }
    if duration >= config.max_duration_ms {
        f64::INFINITY
    } else {
        duration
    }
}

/// Velocity of `resolve` at `t`, estimated over the trailing `sample_ms`.
pub fn calc_generator_velocity<F: Fn(f64) -> f64>(resolve: F, t: f64, current: f64, sample_ms: f64) -> f64 {
    let prev_t = (t - sample_ms).max(0.0);
    velocity_per_second(current - resolve(prev_t), t - prev_t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glide_config::GlideConfig;

    #[test]
    fn test_keyframes_duration_is_known() {
        let g = KeyframesGenerator::new(&[AnimatableValue::Number(0.0), AnimatableValue::Number(1.0)], None, &[], 300.0).unwrap();
        assert_eq!(Generator::Keyframes(g).calculated_duration(), Some(300.0));
    }

    #[test]
    fn test_probe_budget_gives_infinity() {
        let config = GlideConfig::default();
        // barely damped, huge travel: never settles within 20s
        let options = SpringOptions::new(0.0, 10_000.0).with_physics(1.0, 0.01, 1.0);
        let mut g = Generator::Spring(SpringGenerator::new(&options, &config).unwrap());
        assert_eq!(calc_generator_duration(&mut g, &config.generator), f64::INFINITY);
    }

    #[test]
    fn test_generator_velocity() {
        let v = calc_generator_velocity(|t| t * 2.0, 100.0, 200.0, 5.0);
        assert!((v - 2000.0).abs() < 1e-9);
        assert_eq!(calc_generator_velocity(|t| t, 0.0, 0.0, 5.0), 0.0);
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!(GeneratorType::Tween.canonical(), GeneratorType::Keyframes);
        assert_eq!(GeneratorType::Decay.canonical(), GeneratorType::Inertia);
        assert!(GeneratorType::Spring.is_physics());
        let parsed: GeneratorType = serde_json::from_str(r#""decay""#).unwrap();
        assert_eq!(parsed, GeneratorType::Decay);
    }
}
