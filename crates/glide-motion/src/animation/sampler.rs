//! Time-to-value sampling for resolved keyframes.
//!
//! A [`Sampler`] pairs a generator with the repeat, delay and mirroring
//! rules of its transition. Software playback ticks one; the native path
//! uses one to pre-generate linear keyframes.

use super::transition::{RepeatType, Transition};
use crate::error::{MotionError, Result};
use crate::generators::{
    Generator, GeneratorState, GeneratorType, InertiaGenerator, InertiaOptions, KeyframesGenerator,
    SpringGenerator, SpringOptions, calc_generator_duration,
};
use crate::interpolate::Mixer;
use crate::types::AnimatableValue;
use glide_config::GlideConfig;

/// Build the generator `transition` asks for.
pub fn build_generator(
    keyframes: &[AnimatableValue],
    transition: &Transition,
    velocity: f64,
    config: &GlideConfig,
) -> Result<Generator> {
    let numeric = |index: usize| -> Result<f64> {
        keyframes
            .get(index)
            .and_then(AnimatableValue::as_f64)
            .ok_or(MotionError::EmptyKeyframes)
    };

    match transition.generator_type() {
        GeneratorType::Spring => {
            let options = SpringOptions {
                from: numeric(0)?,
                to: numeric(keyframes.len().saturating_sub(1))?,
                velocity,
                stiffness: transition.stiffness,
                damping: transition.damping,
                mass: transition.mass,
                duration_ms: transition.duration_ms,
                bounce: transition.bounce,
                rest_speed: transition.rest_speed,
                rest_delta: transition.rest_delta,
            };
            Ok(Generator::Spring(SpringGenerator::new(&options, config)?))
        }
        GeneratorType::Inertia => {
            let options = InertiaOptions {
                from: numeric(0)?,
                velocity,
                power: transition.power,
                time_constant_ms: transition.time_constant_ms,
                bounce_stiffness: transition.bounce_stiffness,
                bounce_damping: transition.bounce_damping,
                rest_delta: transition.rest_delta,
                rest_speed: transition.rest_speed,
                min: transition.min,
                max: transition.max,
                modify_target: transition.modify_target.clone(),
            };
            Ok(Generator::Inertia(InertiaGenerator::new(&options, config)?))
        }
        _ => {
            let ease = transition.ease.as_ref().map(|e| e.to_vec()).unwrap_or_default();
            let generator = KeyframesGenerator::new(
                keyframes,
                transition.times.as_deref(),
                &ease,
                transition.duration_ms.unwrap_or(300.0),
            )?;
            Ok(Generator::Keyframes(generator))
        }
    }
}

/// A generator with its repeat schedule.
#[derive(Debug, Clone)]
pub struct Sampler {
    generator: Generator,
    mirrored: Option<Generator>,
    /// Physics generators run 0..100 and this maps the progress back onto
    /// non-numeric keyframes.
    map_percent: Option<Mixer>,
    first_keyframe: AnimatableValue,
    calculated_duration: f64,
    resolved_duration: f64,
    total_duration: f64,
    delay: f64,
    repeat: f64,
    repeat_type: RepeatType,
    repeat_delay: f64,
}

impl Sampler {
    pub fn new(
        keyframes: &[AnimatableValue],
        transition: &Transition,
        velocity: f64,
        config: &GlideConfig,
    ) -> Result<Self> {
        if keyframes.is_empty() {
            return Err(MotionError::EmptyKeyframes);
        }
        let mut keyframes = keyframes.to_vec();
        let mut map_percent = None;
        if transition.generator_type().is_physics() && !keyframes[0].is_number() {
            let target = keyframes.get(1).unwrap_or(&keyframes[0]);
            map_percent = Some(Mixer::new(&keyframes[0], target));
            keyframes = vec![AnimatableValue::Number(0.0), AnimatableValue::Number(100.0)];
        }

        let generator = build_generator(&keyframes, transition, velocity, config)?;
        let repeat_type = transition.repeat_kind();
        let mirrored = if repeat_type == RepeatType::Mirror {
            let reversed: Vec<_> = keyframes.iter().rev().cloned().collect();
            Some(build_generator(&reversed, transition, -velocity, config)?)
        } else {
            None
        };

        let calculated_duration = match generator.calculated_duration() {
            Some(duration) => duration,
            None => calc_generator_duration(&mut generator.clone(), &config.generator),
        };
        let repeat = transition.repeat_count();
        let repeat_delay = transition.repeat_delay();
        let resolved_duration = calculated_duration + repeat_delay;
        let total_duration = resolved_duration * (repeat + 1.0) - repeat_delay;

        Ok(Self {
            generator,
            mirrored,
            map_percent,
            first_keyframe: keyframes[0].clone(),
            calculated_duration,
            resolved_duration,
            total_duration,
            delay: transition.delay_ms.unwrap_or(0.0),
            repeat,
            repeat_type,
            repeat_delay,
        })
    }

    /// Duration of one iteration.
    pub fn calculated_duration(&self) -> f64 {
        self.calculated_duration
    }

    /// Duration of every iteration and repeat delay, excluding the start delay.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Sample at `t` ms since the animation started, delay included.
    pub fn sample(&mut self, t: f64) -> GeneratorState<AnimatableValue> {
        let without_delay = t - self.delay;
        let in_delay = without_delay < 0.0;
        let current = without_delay.max(0.0);
        let mut state = self.frame(current, in_delay);
        if !in_delay {
            state.done = current >= self.total_duration;
        }
        state
    }

    /// Sample at `current` ms past the delay.
    pub(crate) fn frame(&mut self, current: f64, in_delay: bool) -> GeneratorState<AnimatableValue> {
        let mut elapsed = current;
        let mut use_mirror = false;

        if self.repeat > 0.0 && self.resolved_duration > 0.0 {
            let progress = current.min(self.total_duration) / self.resolved_duration;
            let mut iteration = progress.floor();
            let mut iteration_progress = progress % 1.0;
            if iteration_progress == 0.0 && progress >= 1.0 {
                iteration_progress = 1.0;
            }
            if iteration_progress == 1.0 {
                iteration -= 1.0;
            }
            iteration = iteration.min(self.repeat + 1.0);

            if (iteration as i64) % 2 == 1 {
                match self.repeat_type {
                    RepeatType::Reverse => {
                        iteration_progress = 1.0 - iteration_progress;
                        if self.repeat_delay > 0.0 {
                            iteration_progress -= self.repeat_delay / self.resolved_duration;
                        }
                    }
                    RepeatType::Mirror => use_mirror = true,
                    RepeatType::Loop => {}
                }
            }
            elapsed = iteration_progress.clamp(0.0, 1.0) * self.resolved_duration;
        }

        let mut state = if in_delay {
            GeneratorState {
                done: false,
                value: self.first_keyframe.clone(),
            }
        } else {
            match (use_mirror, self.mirrored.as_mut()) {
                (true, Some(mirrored)) => mirrored.next(elapsed),
                _ => self.generator.next(elapsed),
            }
        };

        if let Some(mixer) = &self.map_percent {
            let percent = state.value.as_f64().unwrap_or(0.0);
            state.value = mixer.mix(percent / 100.0);
        }
        state
    }
}
