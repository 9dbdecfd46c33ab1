//! Inertia (decay) generator.
//!
//! Velocity decays exponentially towards a projected target. With `min` or
//! `max` bounds, crossing a bound hands off to a spring that pulls the value
//! back to the boundary.

use super::spring::{SpringGenerator, SpringOptions};
use super::{GeneratorState, calc_generator_velocity};
use crate::error::{MotionError, Result};
use glide_config::GlideConfig;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Hook that rewrites the projected resting point (e.g. to snap to a grid).
#[derive(Clone)]
pub struct ModifyTarget(pub Rc<dyn Fn(f64) -> f64>);

impl ModifyTarget {
    pub fn new<F: Fn(f64) -> f64 + 'static>(f: F) -> Self {
        Self(Rc::new(f))
    }
}

impl fmt::Debug for ModifyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModifyTarget(..)")
    }
}

impl PartialEq for ModifyTarget {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Options for [`InertiaGenerator::new`]. Unset fields use the configured
/// defaults. Velocity is in units per second.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InertiaOptions {
    pub from: f64,
    pub velocity: f64,
    pub power: Option<f64>,
    pub time_constant_ms: Option<f64>,
    pub bounce_stiffness: Option<f64>,
    pub bounce_damping: Option<f64>,
    pub rest_delta: Option<f64>,
    pub rest_speed: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub modify_target: Option<ModifyTarget>,
}

/// A decaying motion sampled in milliseconds.
#[derive(Debug, Clone)]
pub struct InertiaGenerator {
    target: f64,
    amplitude: f64,
    time_constant_ms: f64,
    rest_delta: f64,
    rest_speed: Option<f64>,
    bounce_stiffness: f64,
    bounce_damping: f64,
    min: Option<f64>,
    max: Option<f64>,
    velocity_sample_ms: f64,
    state: GeneratorState<f64>,
    time_reached_boundary: Option<f64>,
    spring: Option<SpringGenerator>,
    config: GlideConfig,
}

impl InertiaGenerator {
    pub fn new(options: &InertiaOptions, config: &GlideConfig) -> Result<Self> {
        let defaults = &config.inertia;
        let origin = options.from;
        let mut amplitude = options.power.unwrap_or(defaults.power) * options.velocity;
        let ideal = origin + amplitude;
        let target = match &options.modify_target {
            Some(modify) => (modify.0)(ideal),
            None => ideal,
        };
        if target != ideal {
            amplitude = target - origin;
        }

        let bounce_stiffness = options.bounce_stiffness.unwrap_or(defaults.bounce_stiffness);
        if !(bounce_stiffness > 0.0) {
            return Err(MotionError::InvalidSpring(format!(
                "bounce stiffness must be positive, got {bounce_stiffness}"
            )));
        }

        let mut generator = Self {
            target,
            amplitude,
            time_constant_ms: options.time_constant_ms.unwrap_or(defaults.time_constant_ms),
            rest_delta: options.rest_delta.unwrap_or(defaults.rest_delta),
            rest_speed: options.rest_speed,
            bounce_stiffness,
            bounce_damping: options.bounce_damping.unwrap_or(defaults.bounce_damping),
            min: options.min,
            max: options.max,
            velocity_sample_ms: config.generator.velocity_sample_ms,
            state: GeneratorState {
                done: false,
                value: origin,
            },
            time_reached_boundary: None,
            spring: None,
            config: config.clone(),
        };
        generator.check_catch_boundary(0.0);
        Ok(generator)
    }

    /// The projected resting point, ignoring bounds.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Inertia never knows its duration up front.
    pub fn calculated_duration(&self) -> Option<f64> {
        None
    }

    fn is_out_of_bounds(&self, v: f64) -> bool {
        self.min.is_some_and(|min| v < min) || self.max.is_some_and(|max| v > max)
    }

    fn nearest_boundary(&self, v: f64) -> f64 {
        match (self.min, self.max) {
            (None, Some(max)) => max,
            (Some(min), None) => min,
            (Some(min), Some(max)) => {
                if (min - v).abs() < (max - v).abs() {
                    min
                } else {
                    max
                }
            }
            (None, None) => v,
        }
    }

    fn delta_at(&self, t: f64) -> f64 {
        -self.amplitude * (-t / self.time_constant_ms).exp()
    }

    fn latest_at(&self, t: f64) -> f64 {
        self.target + self.delta_at(t)
    }

    fn apply_friction(&mut self, t: f64) {
        let delta = self.delta_at(t);
        let latest = self.latest_at(t);
        self.state.done = delta.abs() <= self.rest_delta;
        self.state.value = if self.state.done { self.target } else { latest };
    }

    fn check_catch_boundary(&mut self, t: f64) {
        let value = self.state.value;
        if !self.is_out_of_bounds(value) {
            return;
        }
        self.time_reached_boundary = Some(t);
        let velocity = calc_generator_velocity(|t| self.latest_at(t), t, value, self.velocity_sample_ms);
        let options = SpringOptions {
            from: value,
            to: self.nearest_boundary(value),
            velocity,
            stiffness: Some(self.bounce_stiffness),
            damping: Some(self.bounce_damping),
            rest_delta: Some(self.rest_delta),
            rest_speed: self.rest_speed,
            ..Default::default()
        };
        match SpringGenerator::new(&options, &self.config) {
            Ok(spring) => self.spring = Some(spring),
            Err(err) => warn!(%err, "could not build boundary spring"),
        }
    }

    pub fn next(&mut self, t: f64) -> GeneratorState<f64> {
        let mut has_updated_frame = false;
        if self.spring.is_none() && self.time_reached_boundary.is_none() {
            has_updated_frame = true;
            self.apply_friction(t);
            self.check_catch_boundary(t);
        }

        if let (Some(reached), Some(spring)) = (self.time_reached_boundary, self.spring.as_mut()) {
            if t >= reached {
                return spring.next(t - reached);
            }
        }
        if !has_updated_frame {
            self.apply_friction(t);
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inertia(options: InertiaOptions) -> InertiaGenerator {
        InertiaGenerator::new(&options, &GlideConfig::default()).unwrap()
    }

    #[test]
    fn test_decays_towards_projected_target() {
        let mut g = inertia(InertiaOptions {
            from: 0.0,
            velocity: 1000.0,
            ..Default::default()
        });
        assert_eq!(g.target(), 800.0);
        let early = g.next(100.0).value;
        let late = g.next(1000.0).value;
        assert!(early > 0.0 && early < late && late < 800.0);

        let mut t = 0.0;
        let mut state = g.next(t);
        while !state.done {
            t += 50.0;
            state = g.next(t);
        }
        assert_eq!(state.value, 800.0);
    }

    #[test]
    fn test_modify_target() {
        let g = inertia(InertiaOptions {
            from: 0.0,
            velocity: 1000.0,
            modify_target: Some(ModifyTarget::new(|v| (v / 100.0).round() * 100.0 + 100.0)),
            ..Default::default()
        });
        assert_eq!(g.target(), 900.0);
    }

    #[test]
    fn test_bounces_off_max() {
        let mut g = inertia(InertiaOptions {
            from: 0.0,
            velocity: 1000.0,
            max: Some(100.0),
            ..Default::default()
        });
        let mut t = 0.0;
        let mut state = g.next(t);
        while !state.done && t < 20_000.0 {
            t += 10.0;
            state = g.next(t);
        }
        assert!(state.done);
        assert_eq!(state.value, 100.0);
    }

    #[test]
    fn test_out_of_bounds_origin_springs_back() {
        let mut g = inertia(InertiaOptions {
            from: 150.0,
            velocity: 0.0,
            max: Some(100.0),
            ..Default::default()
        });
        assert!(g.next(50.0).value < 150.0);
    }

    #[test]
    fn test_at_rest_on_boundary() {
        let mut g = inertia(InertiaOptions {
            from: 100.0,
            velocity: 0.0,
            min: Some(0.0),
            max: Some(100.0),
            ..Default::default()
        });
        let state = g.next(0.0);
        assert!(state.done);
        assert_eq!(state.value, 100.0);
    }
}
