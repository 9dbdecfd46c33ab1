//! Tween / keyframes generator.
//!
//! Maps elapsed time through per-segment easing across N keyframes placed at
//! normalized offsets.

use super::GeneratorState;
use crate::easing::Easing;
use crate::error::{MotionError, Result};
use crate::interpolate::{InterpolateOptions, Interpolator};
use crate::types::AnimatableValue;

/// Default offsets for `count` keyframes, evenly spaced over [0, 1].
pub fn default_offsets(count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        n => (0..n).map(|i| i as f64 / (n - 1) as f64).collect(),
    }
}

/// Convert offsets in [0, 1] to absolute times.
pub fn offsets_to_times(offsets: &[f64], duration_ms: f64) -> Vec<f64> {
    offsets.iter().map(|o| o * duration_ms).collect()
}

/// A keyframes generator sampled in milliseconds.
#[derive(Debug, Clone)]
pub struct KeyframesGenerator {
    duration_ms: f64,
    map: Interpolator,
}

impl KeyframesGenerator {
    /// Build a keyframes generator.
    ///
    /// # Arguments
    /// * `keyframes` - values to pass through, at least one
    /// * `times` - optional offsets in [0, 1], used when there is one per keyframe
    /// * `ease` - one easing for every segment, or one per segment
    /// * `duration_ms` - total duration
    pub fn new(
        keyframes: &[AnimatableValue],
        times: Option<&[f64]>,
        ease: &[Easing],
        duration_ms: f64,
    ) -> Result<Self> {
        if keyframes.is_empty() {
            return Err(MotionError::EmptyKeyframes);
        }
        let offsets = match times {
            Some(times) if times.len() == keyframes.len() => times.to_vec(),
            _ => default_offsets(keyframes.len()),
        };
        let segments = keyframes.len().saturating_sub(1);
        let ease = match ease {
            [] => vec![Easing::EaseInOut; segments],
            [single] => vec![*single; segments],
            many => many.to_vec(),
        };

        let input = offsets_to_times(&offsets, duration_ms);
        let map = Interpolator::new(&input, keyframes, InterpolateOptions { clamp: true, ease })?;
        Ok(Self { duration_ms, map })
    }

    pub fn calculated_duration(&self) -> Option<f64> {
        Some(self.duration_ms)
    }

    pub fn next(&mut self, t: f64) -> GeneratorState<AnimatableValue> {
        GeneratorState {
            done: t >= self.duration_ms,
            value: self.map.sample(t),
        }
    }
}
