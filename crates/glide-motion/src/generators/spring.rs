//! Damped harmonic oscillator.
//!
//! The spring is solved in closed form for all three damping regimes, so
//! sampling is a pure function of time. Springs can be specified physically
//! (`stiffness`, `damping`, `mass`) or perceptually (`duration`, `bounce`),
//! in which case the physical parameters are found with Newton-Raphson.

use super::{GeneratorState, calc_generator_velocity};
use crate::error::{MotionError, Result};
use glide_config::GlideConfig;
use tracing::warn;

const ROOT_ITERATIONS: usize = 12;
const SAFE_MIN: f64 = 0.001;

/// Options for [`SpringGenerator::new`].
///
/// Velocity is in units per second, durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpringOptions {
    pub from: f64,
    pub to: f64,
    pub velocity: f64,
    pub stiffness: Option<f64>,
    pub damping: Option<f64>,
    pub mass: Option<f64>,
    pub duration_ms: Option<f64>,
    pub bounce: Option<f64>,
    pub rest_speed: Option<f64>,
    pub rest_delta: Option<f64>,
}

impl SpringOptions {
    pub fn new(from: f64, to: f64) -> Self {
        Self {
            from,
            to,
            ..Default::default()
        }
    }

    pub fn with_physics(mut self, stiffness: f64, damping: f64, mass: f64) -> Self {
        self.stiffness = Some(stiffness);
        self.damping = Some(damping);
        self.mass = Some(mass);
        self
    }

    pub fn with_duration(mut self, duration_ms: f64, bounce: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self.bounce = Some(bounce);
        self
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_rest(mut self, rest_speed: f64, rest_delta: f64) -> Self {
        self.rest_speed = Some(rest_speed);
        self.rest_delta = Some(rest_delta);
        self
    }

    fn has_physics(&self) -> bool {
        self.stiffness.is_some() || self.damping.is_some() || self.mass.is_some()
    }

    fn has_duration(&self) -> bool {
        self.duration_ms.is_some() || self.bounce.is_some()
    }
}

/// Physical spring parameters solved from a duration and bounce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolvedSpring {
    pub stiffness: f64,
    pub damping: f64,
    pub duration_ms: f64,
}

/// A spring from `from` to `to`, sampled in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringGenerator {
    origin: f64,
    target: f64,
    stiffness: f64,
    damping: f64,
    mass: f64,
    damping_ratio: f64,
    undamped_angular_freq: f64,
    /// Initial velocity in units per millisecond, sign-flipped for the solver.
    initial_velocity: f64,
    rest_speed: f64,
    rest_delta: f64,
    resolved_duration: Option<f64>,
    velocity_sample_ms: f64,
}

impl SpringGenerator {
    /// Build a spring.
    ///
    /// # Errors
    /// `InvalidSpring` if stiffness or mass are not positive.
    pub fn new(options: &SpringOptions, config: &GlideConfig) -> Result<Self> {
        let defaults = &config.spring;
        let velocity = -options.velocity / 1000.0;

        let (stiffness, damping, mass, resolved_duration) =
            if !options.has_physics() && options.has_duration() {
                let solved = find_spring(
                    options.duration_ms.unwrap_or(defaults.duration_ms),
                    options.bounce.unwrap_or(defaults.bounce),
                    velocity,
                    1.0,
                    config,
                );
                (solved.stiffness, solved.damping, 1.0, Some(solved.duration_ms))
            } else {
                (
                    options.stiffness.unwrap_or(defaults.stiffness),
                    options.damping.unwrap_or(defaults.damping),
                    options.mass.unwrap_or(defaults.mass),
                    None,
                )
            };

        if !(stiffness > 0.0) || !(mass > 0.0) {
            return Err(MotionError::InvalidSpring(format!(
                "stiffness and mass must be positive (stiffness {stiffness}, mass {mass})"
            )));
        }

        let initial_delta = options.to - options.from;
        let granular = initial_delta.abs() < defaults.granular_threshold;
        let rest_speed = options.rest_speed.unwrap_or(if granular {
            defaults.granular_rest_speed
        } else {
            defaults.rest_speed
        });
        let rest_delta = options.rest_delta.unwrap_or(if granular {
            defaults.granular_rest_delta
        } else {
            defaults.rest_delta
        });

        Ok(Self {
            origin: options.from,
            target: options.to,
            stiffness,
            damping,
            mass,
            damping_ratio: damping / (2.0 * (stiffness * mass).sqrt()),
            undamped_angular_freq: (stiffness / mass).sqrt() / 1000.0,
            initial_velocity: velocity,
            rest_speed,
            rest_delta,
            resolved_duration,
            velocity_sample_ms: config.generator.velocity_sample_ms,
        })
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    pub fn rest_speed(&self) -> f64 {
        self.rest_speed
    }

    pub fn rest_delta(&self) -> f64 {
        self.rest_delta
    }

    /// Known duration; only set when the spring was solved from a duration.
    pub fn calculated_duration(&self) -> Option<f64> {
        self.resolved_duration
    }

    /// Closed-form position at `t` milliseconds.
    pub fn position(&self, t: f64) -> f64 {
        let zeta = self.damping_ratio;
        let w0 = self.undamped_angular_freq;
        let delta = self.target - self.origin;
        let v0 = self.initial_velocity;

        if zeta < 1.0 {
            let wd = angular_freq(w0, zeta);
            let envelope = (-zeta * w0 * t).exp();
            self.target
                - envelope
                    * (((v0 + zeta * w0 * delta) / wd) * (wd * t).sin() + delta * (wd * t).cos())
        } else if zeta == 1.0 {
            self.target - (-w0 * t).exp() * (delta + (v0 + w0 * delta) * t)
        } else {
            let wd = w0 * (zeta * zeta - 1.0).sqrt();
            let envelope = (-zeta * w0 * t).exp();
            let freq_t = (wd * t).min(300.0);
            self.target
                - (envelope * ((v0 + zeta * w0 * delta) * freq_t.sinh() + wd * delta * freq_t.cosh()))
                    / wd
        }
    }

    /// Sample the spring at `t` milliseconds.
    pub fn next(&mut self, t: f64) -> GeneratorState<f64> {
        let current = self.position(t);
        let done = match self.resolved_duration {
            Some(duration) => t >= duration,
            None => {
                let speed = if self.damping_ratio < 1.0 {
                    if t == 0.0 {
                        self.initial_velocity * 1000.0
                    } else {
                        calc_generator_velocity(|t| self.position(t), t, current, self.velocity_sample_ms)
                    }
                } else {
                    0.0
                };
                speed.abs() <= self.rest_speed && (self.target - current).abs() <= self.rest_delta
            }
        };
        GeneratorState {
            done,
            value: if done { self.target } else { current },
        }
    }
}

#[inline]
fn angular_freq(undamped: f64, damping_ratio: f64) -> f64 {
    undamped * (1.0 - damping_ratio * damping_ratio).sqrt()
}

/// Solve stiffness and damping for a spring that settles in `duration_ms`
/// with the given `bounce`.
///
/// `velocity` is in the solver's units (sign-flipped units per millisecond).
/// Durations outside the configured range are clamped with a warning.
pub fn find_spring(
    duration_ms: f64,
    bounce: f64,
    velocity: f64,
    mass: f64,
    config: &GlideConfig,
) -> SolvedSpring {
    let limits = &config.spring;
    if duration_ms > limits.max_duration_ms {
        warn!(duration_ms, max = limits.max_duration_ms, "spring duration must be 10 seconds or less");
    }

    let damping_ratio = (1.0 - bounce).clamp(limits.min_damping, limits.max_damping);
    let duration = (duration_ms / 1000.0).clamp(limits.min_duration_ms / 1000.0, limits.max_duration_ms / 1000.0);

    let envelope = |w: f64| -> f64 {
        if damping_ratio < 1.0 {
            let decay = w * damping_ratio;
            let a = decay - velocity;
            let b = angular_freq(w, damping_ratio);
            let c = (-decay * duration).exp();
            SAFE_MIN - (a / b) * c
        } else {
            let a = (-w * duration).exp();
            let b = (w - velocity) * duration + 1.0;
            -SAFE_MIN + a * b
        }
    };
    let derivative = |w: f64| -> f64 {
        if damping_ratio < 1.0 {
            let decay = w * damping_ratio;
            let delta = decay * duration;
            let d = delta * velocity + velocity;
            let e = damping_ratio.powi(2) * w.powi(2) * duration;
            let f = (-delta).exp();
            let g = angular_freq(w.powi(2), damping_ratio);
            let factor = if -envelope(w) + SAFE_MIN > 0.0 { -1.0 } else { 1.0 };
            (factor * ((d - e) * f)) / g
        } else {
            let a = (-w * duration).exp();
            let b = (velocity - w) * (duration * duration);
            a * b
        }
    };

    let mut undamped_freq = 5.0 / duration;
    for _ in 0..ROOT_ITERATIONS {
        undamped_freq -= envelope(undamped_freq) / derivative(undamped_freq);
    }

    let duration_ms = duration * 1000.0;
    if !undamped_freq.is_finite() {
        return SolvedSpring {
            stiffness: limits.stiffness,
            damping: limits.damping,
            duration_ms,
        };
    }
    let stiffness = undamped_freq.powi(2) * mass;
    SolvedSpring {
        stiffness,
        damping: damping_ratio * 2.0 * (mass * stiffness).sqrt(),
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::calc_generator_duration;
    use crate::generators::Generator;

    fn spring(options: SpringOptions) -> SpringGenerator {
        SpringGenerator::new(&options, &GlideConfig::default()).unwrap()
    }

    #[test]
    fn test_reference_spring_settles() {
        let config = GlideConfig::default();
        let options = SpringOptions::new(0.0, 1.0)
            .with_physics(100.0, 10.0, 1.0)
            .with_rest(2.0, 0.5);
        let mut generator = Generator::Spring(spring(options));
        assert_eq!(generator.calculated_duration(), None);

        let duration = calc_generator_duration(&mut generator, &config.generator);
        assert!(duration.is_finite() && duration > 0.0);
        let state = generator.next(duration);
        assert!(state.done);
    }

    #[test]
    fn test_all_damping_regimes_are_deterministic_and_settle() {
        let config = GlideConfig::default();
        for damping in [10.0, 20.0, 40.0] {
            let options = SpringOptions::new(0.0, 1.0).with_physics(100.0, damping, 1.0);
            let mut a = spring(options.clone());
            let mut b = spring(options);
            for t in [0.0, 16.0, 100.0, 333.0, 1000.0] {
                assert_eq!(a.next(t), b.next(t));
            }

            let rest_delta = a.rest_delta();
            let mut generator = Generator::Spring(a);
            let duration = calc_generator_duration(&mut generator, &config.generator);
            assert!(duration.is_finite(), "damping {damping} never settled");
            let value = generator.next(duration).value.as_f64().unwrap();
            assert!((value - 1.0).abs() <= rest_delta);
        }
    }

    #[test]
    fn test_regimes_by_ratio() {
        let under = spring(SpringOptions::new(0.0, 1.0).with_physics(100.0, 10.0, 1.0));
        let critical = spring(SpringOptions::new(0.0, 1.0).with_physics(100.0, 20.0, 1.0));
        let over = spring(SpringOptions::new(0.0, 1.0).with_physics(100.0, 40.0, 1.0));
        assert!(under.damping_ratio() < 1.0);
        assert_eq!(critical.damping_ratio(), 1.0);
        assert!(over.damping_ratio() > 1.0);

        // only the under-damped spring overshoots
        let peak = |s: &SpringGenerator| (0..200).map(|i| s.position(i as f64 * 10.0)).fold(f64::MIN, f64::max);
        assert!(peak(&under) > 1.0);
        assert!(peak(&critical) <= 1.0 + 1e-9);
        assert!(peak(&over) <= 1.0 + 1e-9);
    }

    #[test]
    fn test_starts_at_origin() {
        let s = spring(SpringOptions::new(10.0, 50.0).with_physics(300.0, 20.0, 1.0));
        assert!((s.position(0.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_granular_thresholds() {
        let small = spring(SpringOptions::new(0.0, 1.0));
        assert_eq!(small.rest_delta(), 0.005);
        assert_eq!(small.rest_speed(), 0.01);
        let large = spring(SpringOptions::new(0.0, 100.0));
        assert_eq!(large.rest_delta(), 0.5);
        assert_eq!(large.rest_speed(), 2.0);
    }

    #[test]
    fn test_duration_spring() {
        let mut s = spring(SpringOptions::new(0.0, 100.0).with_duration(500.0, 0.25));
        assert_eq!(s.calculated_duration(), Some(500.0));
        assert!(s.stiffness() > 0.0);
        assert!(!s.next(250.0).done);
        let end = s.next(500.0);
        assert!(end.done);
        assert_eq!(end.value, 100.0);
    }

    #[test]
    fn test_long_duration_is_clamped() {
        let solved = find_spring(15_000.0, 0.3, 0.0, 1.0, &GlideConfig::default());
        assert_eq!(solved.duration_ms, 10_000.0);
    }

    #[test]
    fn test_invalid_mass() {
        let options = SpringOptions::new(0.0, 1.0).with_physics(100.0, 10.0, 0.0);
        assert!(matches!(
            SpringGenerator::new(&options, &GlideConfig::default()),
            Err(MotionError::InvalidSpring(_))
        ));
    }

    #[test]
    fn test_initial_velocity_moves_towards_it() {
        let s = spring(SpringOptions::new(0.0, 0.0).with_physics(100.0, 10.0, 1.0).with_velocity(1000.0));
        assert!(s.position(10.0) > 0.0);
    }
}
