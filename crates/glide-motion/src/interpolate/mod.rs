//! Interpolation system for animatable values.
//!
//! This module provides the `Interpolate` trait, value [`Mixer`]s and the
//! piecewise [`Interpolator`] that keyframe animations sample.
//!
//! # Mixing rules
//!
//! - numbers mix linearly
//! - strings are split into templates of numbers, colors and CSS variables
//!   and mixed token by token (`"10px 20px"`, `"0 0 4px #000"`)
//! - colors mix in linear light
//! - values that cannot be mixed switch at the halfway point

pub mod color;
pub mod complex;

use crate::easing::Easing;
use crate::error::{MotionError, Result};
use crate::types::AnimatableValue;
use complex::{ComplexValue, Token};
use tracing::warn;

/// Trait for types that can be interpolated between two values.
pub trait Interpolate: Sized {
    /// Interpolate between self and another value.
    ///
    /// When t = 0.0, returns self.
    /// When t = 1.0, returns to.
    fn interpolate(&self, to: &Self, t: f64) -> Self;
}

/// Linear interpolation between two numbers.
#[inline]
pub fn mix(from: f64, to: f64, p: f64) -> f64 {
    from + (to - from) * p
}

/// Progress of `value` between `from` and `to`; 1 when the range is empty.
#[inline]
pub fn progress(from: f64, to: f64, value: f64) -> f64 {
    let delta = to - from;
    if delta == 0.0 { 1.0 } else { (value - from) / delta }
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        mix(*self, *to, t)
    }
}

impl Interpolate for AnimatableValue {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        Mixer::new(self, to).mix(t)
    }
}

/// A prepared mix between two values.
#[derive(Debug, Clone, PartialEq)]
pub enum Mixer {
    Number(f64, f64),
    Complex {
        template: ComplexValue,
        from: Vec<Token>,
        to: Vec<Token>,
    },
    /// Values that cannot be interpolated; switches at p = 0.5.
    Immediate(AnimatableValue, AnimatableValue),
}

impl Mixer {
    /// Prepare a mixer for `from → to`.
    ///
    /// Structurally incompatible strings produce an [`Mixer::Immediate`]
    /// and log a warning.
    pub fn new(from: &AnimatableValue, to: &AnimatableValue) -> Self {
        if let (AnimatableValue::Number(a), AnimatableValue::Number(b)) = (from, to) {
            return Self::Number(*a, *b);
        }
        if from.is_css_variable() || to.is_css_variable() {
            return Self::Immediate(from.clone(), to.clone());
        }

        let origin = ComplexValue::analyse(&from.to_string());
        let target = ComplexValue::analyse(&to.to_string());
        match origin.match_order(&target) {
            Some(ordered) if !target.tokens.is_empty() => Self::Complex {
                from: ordered,
                to: target.tokens.clone(),
                template: target,
            },
            Some(_) => Self::Immediate(from.clone(), to.clone()),
            None => {
                warn!(
                    from = %from,
                    to = %to,
                    "complex values too different to mix, falling back to an instant transition"
                );
                Self::Immediate(from.clone(), to.clone())
            }
        }
    }

    /// Whether this mixer interpolates smoothly.
    pub fn is_continuous(&self) -> bool {
        !matches!(self, Self::Immediate(..))
    }

    /// Sample the mix at progress `p`.
    pub fn mix(&self, p: f64) -> AnimatableValue {
        match self {
            Self::Number(a, b) => AnimatableValue::Number(mix(*a, *b, p)),
            Self::Complex { template, from, to } => {
                let tokens: Vec<Token> = from
                    .iter()
                    .zip(to)
                    .map(|(a, b)| match (a, b) {
                        (Token::Number(a), Token::Number(b)) => Token::Number(mix(*a, *b, p)),
                        (Token::Color(a), Token::Color(b)) => Token::Color(a.mix(b, p)),
                        _ => {
                            if p >= 0.5 {
                                b.clone()
                            } else {
                                a.clone()
                            }
                        }
                    })
                    .collect();
                AnimatableValue::Text(template.render(&tokens))
            }
            Self::Immediate(a, b) => {
                if p >= 0.5 {
                    b.clone()
                } else {
                    a.clone()
                }
            }
        }
    }
}

/// Options for [`Interpolator::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolateOptions {
    /// Clamp the input to the input range (default `true`).
    pub clamp: bool,
    /// Per-segment easings; a single entry applies to every segment.
    pub ease: Vec<Easing>,
}

impl Default for InterpolateOptions {
    fn default() -> Self {
        Self {
            clamp: true,
            ease: Vec::new(),
        }
    }
}

/// Piecewise mapping from an input range to an output range.
///
/// # Example
///
/// ```ignore
/// let map = Interpolator::new(&[0.0, 100.0], &[0.0.into(), 1.0.into()], Default::default())?;
/// assert_eq!(map.sample_number(50.0), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Interpolator {
    input: Vec<f64>,
    mixers: Vec<Mixer>,
    ease: Vec<Easing>,
    clamp: bool,
    constant: Option<AnimatableValue>,
}

impl Interpolator {
    /// Build an interpolator.
    ///
    /// # Errors
    /// `MismatchedRanges` if `input` and `output` differ in length,
    /// `EmptyKeyframes` if they are empty.
    pub fn new(
        input: &[f64],
        output: &[AnimatableValue],
        options: InterpolateOptions,
    ) -> Result<Self> {
        if input.len() != output.len() {
            return Err(MotionError::MismatchedRanges {
                input: input.len(),
                output: output.len(),
            });
        }
        let (Some(first), Some(last)) = (output.first(), output.last()) else {
            return Err(MotionError::EmptyKeyframes);
        };

        let constant = if output.len() == 1 {
            Some(first.clone())
        } else if output.len() == 2 && first == last {
            Some(last.clone())
        } else {
            None
        };

        let mut input = input.to_vec();
        let mut output = output.to_vec();
        if input.len() > 1 && input[0] > input[input.len() - 1] {
            input.reverse();
            output.reverse();
        }

        let mixers = output.windows(2).map(|w| Mixer::new(&w[0], &w[1])).collect();

        Ok(Self {
            input,
            mixers,
            ease: options.ease,
            clamp: options.clamp,
            constant,
        })
    }

    /// Numeric convenience constructor.
    pub fn numbers(input: &[f64], output: &[f64], options: InterpolateOptions) -> Result<Self> {
        let output: Vec<AnimatableValue> = output.iter().copied().map(AnimatableValue::Number).collect();
        Self::new(input, &output, options)
    }

    /// Map `v` through the interpolator.
    pub fn sample(&self, v: f64) -> AnimatableValue {
        if let Some(constant) = &self.constant {
            return constant.clone();
        }
        let last = self.input.len() - 1;
        let v = if self.clamp {
            v.clamp(self.input[0], self.input[last])
        } else {
            v
        };

        if self.input[0] == self.input[1] && v < self.input[0] {
            return self.mixers[0].mix(0.0);
        }

        let mut i = 0;
        if self.mixers.len() > 1 {
            while i < self.input.len() - 2 && v >= self.input[i + 1] {
                i += 1;
            }
        }

        let mut p = progress(self.input[i], self.input[i + 1], v);
        if (0.0..=1.0).contains(&p) {
            let ease = match self.ease.len() {
                0 => None,
                1 => self.ease.first(),
                _ => self.ease.get(i),
            };
            if let Some(ease) = ease {
                p = ease.evaluate(p);
            }
        }
        self.mixers[i].mix(p)
    }

    /// Map `v` and read the result as a number.
    pub fn sample_number(&self, v: f64) -> f64 {
        self.sample(v).as_f64().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 0.0001;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_mix_numbers() {
        assert!(approx_eq(mix(0.0, 10.0, 0.25), 2.5));
        assert!(approx_eq(10.0_f64.interpolate(&20.0, 0.5), 15.0));
        assert!(approx_eq(progress(5.0, 5.0, 7.0), 1.0));
    }

    #[test]
    fn test_mix_units() {
        let from = AnimatableValue::from("10px");
        let to = AnimatableValue::from("20px");
        assert_eq!(from.interpolate(&to, 0.5), AnimatableValue::from("15px"));
    }

    #[test]
    fn test_number_into_unit() {
        let mixer = Mixer::new(&AnimatableValue::Number(0.0), &AnimatableValue::from("100%"));
        assert!(mixer.is_continuous());
        assert_eq!(mixer.mix(0.25), AnimatableValue::from("25%"));
    }

    #[test]
    fn test_mix_shadow_with_color() {
        let from = AnimatableValue::from("0px 0px 0px rgba(0, 0, 0, 0)");
        let to = AnimatableValue::from("0px 0px 10px rgba(0, 0, 0, 1)");
        assert_eq!(
            from.interpolate(&to, 0.5),
            AnimatableValue::from("0px 0px 5px rgba(0, 0, 0, 0.5)")
        );
    }

    #[test]
    fn test_incompatible_values_switch_halfway() {
        let mixer = Mixer::new(&AnimatableValue::from("auto"), &AnimatableValue::from("10px 20px"));
        assert!(!mixer.is_continuous());
        assert_eq!(mixer.mix(0.49), AnimatableValue::from("auto"));
        assert_eq!(mixer.mix(0.5), AnimatableValue::from("10px 20px"));
    }

    #[test]
    fn test_interpolator_piecewise() {
        let map = Interpolator::numbers(&[0.0, 50.0, 100.0], &[0.0, 1.0, 0.0], Default::default()).unwrap();
        assert!(approx_eq(map.sample_number(25.0), 0.5));
        assert!(approx_eq(map.sample_number(50.0), 1.0));
        assert!(approx_eq(map.sample_number(75.0), 0.5));
        assert!(approx_eq(map.sample_number(150.0), 0.0));
    }

    #[test]
    fn test_interpolator_unclamped_extrapolates() {
        let options = InterpolateOptions { clamp: false, ..Default::default() };
        let map = Interpolator::numbers(&[0.0, 100.0], &[0.0, 1.0], options).unwrap();
        assert!(approx_eq(map.sample_number(150.0), 1.5));
    }

    #[test]
    fn test_interpolator_reversed_input() {
        let map = Interpolator::numbers(&[100.0, 0.0], &[1.0, 0.0], Default::default()).unwrap();
        assert!(approx_eq(map.sample_number(25.0), 0.25));
    }

    #[test]
    fn test_interpolator_eases_segments() {
        let options = InterpolateOptions {
            ease: vec![Easing::EaseIn],
            ..Default::default()
        };
        let map = Interpolator::numbers(&[0.0, 1.0], &[0.0, 100.0], options).unwrap();
        assert!(map.sample_number(0.5) < 50.0);
    }

    #[test]
    fn test_interpolator_errors() {
        assert_eq!(
            Interpolator::numbers(&[0.0, 1.0], &[0.0], Default::default()).unwrap_err(),
            MotionError::MismatchedRanges { input: 2, output: 1 }
        );
        assert_eq!(
            Interpolator::numbers(&[], &[], Default::default()).unwrap_err(),
            MotionError::EmptyKeyframes
        );
    }

    #[test]
    fn test_interpolator_constant() {
        let map = Interpolator::numbers(&[0.0, 1.0], &[3.0, 3.0], Default::default()).unwrap();
        assert!(approx_eq(map.sample_number(0.3), 3.0));
    }
}
