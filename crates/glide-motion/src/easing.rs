//! Easing functions for animation timing.
//!
//! This module implements the timing curves used by tweens and keyframes:
//! - Linear
//! - Ease, EaseIn, EaseOut, EaseInOut (standard CSS curves)
//! - Circ, Back and Anticipate families (built with mirror/reverse modifiers)
//! - CubicBezier (custom bezier curves)
//! - Steps (stepped animations)
//!
//! Easings deserialize from a name (`"easeInOut"`), a bezier point array
//! (`[0.4, 0, 0.1, 1]`) or a steps expression (`"steps(4, end)"`).
//!
//! # Usage
//!
//! ```ignore
//! use glide_motion::easing::Easing;
//!
//! let ease = Easing::EaseInOut;
//! let progress = ease.evaluate(0.5);
//!
//! let custom = Easing::from_points(&[0.4, 0.0, 0.1, 1.0])?;
//! let progress = custom.evaluate(0.5);
//! ```

use crate::error::{MotionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position for stepped animations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPosition {
    /// Jump at the start of each interval (CSS `jump-start` / `start`).
    Start,
    /// Jump at the end of each interval (CSS `jump-end` / `end`).
    #[default]
    End,
    /// Jump at both start and end (CSS `jump-both`).
    Both,
    /// No jump at start or end (CSS `jump-none`).
    None,
}

/// Easing function for animation timing.
///
/// Maps linear progress (0.0 to 1.0) to eased progress. Back and bezier
/// curves may overshoot the unit range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "EasingDefinition", into = "EasingDefinition")]
pub enum Easing {
    /// Linear interpolation (no easing).
    Linear,
    /// `cubic-bezier(0.25, 0.1, 0.25, 1.0)`.
    Ease,
    /// `cubic-bezier(0.42, 0, 1, 1)`.
    EaseIn,
    /// `cubic-bezier(0, 0, 0.58, 1)`.
    EaseOut,
    /// `cubic-bezier(0.42, 0, 0.58, 1)`.
    #[default]
    EaseInOut,
    /// Circular ease in: `1 - sin(acos(p))`.
    CircIn,
    CircOut,
    CircInOut,
    /// Pulls back slightly before accelerating.
    BackIn,
    /// `cubic-bezier(0.33, 1.53, 0.69, 0.99)`.
    BackOut,
    BackInOut,
    /// Back-in for the first half, exponential settle for the second.
    Anticipate,
    /// Custom cubic bezier curve. x values must be in [0, 1].
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Stepped animation with discrete jumps.
    Steps { count: u32, position: StepPosition },
}

impl Easing {
    /// Evaluate the easing function at the given progress.
    ///
    /// # Arguments
    /// * `t` - Progress value from 0.0 to 1.0
    ///
    /// # Returns
    /// Eased progress value (may be outside 0.0-1.0 for back and bezier curves)
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::CircIn => circ_in(t),
            Self::CircOut => reverse(circ_in, t),
            Self::CircInOut => mirror(circ_in, t),
            Self::BackIn => back_in(t),
            Self::BackOut => back_out(t),
            Self::BackInOut => mirror(back_in, t),
            Self::Anticipate => anticipate(t),
            Self::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(*x1, *y1, *x2, *y2, t),
            Self::Steps { count, position } => stepped(*count, *position, t),
        }
    }

    /// Create a custom cubic bezier easing function.
    ///
    /// # Errors
    /// Returns `InvalidEasing` if x1 or x2 are outside [0, 1].
    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
            return Err(MotionError::InvalidEasing(format!(
                "bezier x values must be in [0, 1], got {x1} and {x2}"
            )));
        }
        Ok(Self::CubicBezier { x1, y1, x2, y2 })
    }

    /// Create a cubic bezier from a point array (`[x1, y1, x2, y2]`).
    pub fn from_points(points: &[f64]) -> Result<Self> {
        match points {
            [x1, y1, x2, y2] => Self::cubic_bezier(*x1, *y1, *x2, *y2),
            _ => Err(MotionError::InvalidEasing(format!(
                "cubic bezier arrays must contain four numbers, got {}",
                points.len()
            ))),
        }
    }

    /// Create a stepped easing function.
    ///
    /// # Errors
    /// Returns `InvalidEasing` if `steps` is 0.
    pub fn steps(steps: u32, position: StepPosition) -> Result<Self> {
        if steps == 0 {
            return Err(MotionError::InvalidEasing("steps must be at least 1".into()));
        }
        Ok(Self::Steps { count: steps, position })
    }

    /// Look up a named easing (`"easeInOut"`, `"circOut"`, ...).
    pub fn from_name(name: &str) -> Result<Self> {
        let easing = match name {
            "linear" => Self::Linear,
            "ease" => Self::Ease,
            "easeIn" => Self::EaseIn,
            "easeOut" => Self::EaseOut,
            "easeInOut" => Self::EaseInOut,
            "circIn" => Self::CircIn,
            "circOut" => Self::CircOut,
            "circInOut" => Self::CircInOut,
            "backIn" => Self::BackIn,
            "backOut" => Self::BackOut,
            "backInOut" => Self::BackInOut,
            "anticipate" => Self::Anticipate,
            other => return parse_steps(other),
        };
        Ok(easing)
    }

    /// The CSS timing function a native timeline can run directly, if any.
    ///
    /// Circ, back and anticipate curves have no CSS equivalent and return
    /// `None`, which sends the animation down the pre-generated path.
    pub fn native_definition(&self) -> Option<String> {
        let bezier = |x1: f64, y1: f64, x2: f64, y2: f64| {
            format!("cubic-bezier({x1}, {y1}, {x2}, {y2})")
        };
        match self {
            Self::Linear => Some("linear".into()),
            Self::Ease => Some("ease".into()),
            Self::EaseIn => Some("ease-in".into()),
            Self::EaseOut => Some("ease-out".into()),
            Self::EaseInOut => Some("ease-in-out".into()),
            Self::BackOut => Some(bezier(0.33, 1.53, 0.69, 0.99)),
            Self::CubicBezier { x1, y1, x2, y2 } => Some(bezier(*x1, *y1, *x2, *y2)),
            Self::Steps { count, position } => Some(format!("steps({count}, {position})")),
            Self::CircIn
            | Self::CircOut
            | Self::CircInOut
            | Self::BackIn
            | Self::BackInOut
            | Self::Anticipate => None,
        }
    }
}

impl fmt::Display for StepPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Both => "jump-both",
            Self::None => "jump-none",
        })
    }
}

/// Wire form of an [`Easing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EasingDefinition {
    Points(Vec<f64>),
    Named(String),
}

impl TryFrom<EasingDefinition> for Easing {
    type Error = MotionError;

    fn try_from(def: EasingDefinition) -> Result<Self> {
        match def {
            EasingDefinition::Points(points) => Self::from_points(&points),
            EasingDefinition::Named(name) => Self::from_name(&name),
        }
    }
}

impl From<Easing> for EasingDefinition {
    fn from(easing: Easing) -> Self {
        let name = match easing {
            Easing::Linear => "linear",
            Easing::Ease => "ease",
            Easing::EaseIn => "easeIn",
            Easing::EaseOut => "easeOut",
            Easing::EaseInOut => "easeInOut",
            Easing::CircIn => "circIn",
            Easing::CircOut => "circOut",
            Easing::CircInOut => "circInOut",
            Easing::BackIn => "backIn",
            Easing::BackOut => "backOut",
            Easing::BackInOut => "backInOut",
            Easing::Anticipate => "anticipate",
            Easing::CubicBezier { x1, y1, x2, y2 } => {
                return EasingDefinition::Points(vec![x1, y1, x2, y2]);
            }
            Easing::Steps { count, position } => {
                let position = match position {
                    StepPosition::Start => "start",
                    StepPosition::End => "end",
                    StepPosition::Both => "both",
                    StepPosition::None => "none",
                };
                return EasingDefinition::Named(format!("steps({count}, {position})"));
            }
        };
        EasingDefinition::Named(name.to_string())
    }
}

fn parse_steps(expr: &str) -> Result<Easing> {
    let invalid = || MotionError::InvalidEasing(format!("unknown easing `{expr}`"));
    let inner = expr
        .trim()
        .strip_prefix("steps(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;
    let mut parts = inner.split(',').map(str::trim);
    let count = parts
        .next()
        .and_then(|c| c.parse::<u32>().ok())
        .ok_or_else(invalid)?;
    let position = match parts.next() {
        None | Some("end") | Some("jump-end") => StepPosition::End,
        Some("start") | Some("jump-start") => StepPosition::Start,
        Some("both") | Some("jump-both") => StepPosition::Both,
        Some("none") | Some("jump-none") => StepPosition::None,
        Some(_) => return Err(invalid()),
    };
    Easing::steps(count, position)
}

/// Runs `ease` forwards for the first half and backwards for the second.
#[inline]
pub fn mirror(ease: fn(f64) -> f64, p: f64) -> f64 {
    if p <= 0.5 {
        ease(2.0 * p) / 2.0
    } else {
        (2.0 - ease(2.0 * (1.0 - p))) / 2.0
    }
}

/// Turns an ease-in into an ease-out.
#[inline]
pub fn reverse(ease: fn(f64) -> f64, p: f64) -> f64 {
    1.0 - ease(1.0 - p)
}

fn circ_in(p: f64) -> f64 {
    1.0 - p.clamp(-1.0, 1.0).acos().sin()
}

fn back_out(p: f64) -> f64 {
    cubic_bezier(0.33, 1.53, 0.69, 0.99, p)
}

fn back_in(p: f64) -> f64 {
    reverse(back_out, p)
}

fn anticipate(p: f64) -> f64 {
    let p = p * 2.0;
    if p < 1.0 {
        0.5 * back_in(p)
    } else {
        0.5 * (2.0 - 2f64.powf(-10.0 * (p - 1.0)))
    }
}

/// Evaluate a cubic bezier curve at time t.
///
/// Uses Newton-Raphson iteration to find the curve parameter for the input
/// progress, then evaluates the y coordinate at that parameter.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, progress: f64) -> f64 {
    if x1 == y1 && x2 == y2 {
        return progress;
    }
    if progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }

    let t = solve_bezier_x(x1, x2, progress);
    bezier_y(y1, y2, t)
}

/// Solve for t in the bezier x equation, falling back to bisection when the
/// slope is too flat for Newton-Raphson.
fn solve_bezier_x(x1: f64, x2: f64, target_x: f64) -> f64 {
    let mut t = target_x;
    for _ in 0..8 {
        let x = bezier_x(x1, x2, t) - target_x;
        if x.abs() < 1e-7 {
            return t;
        }
        let dx = bezier_x_derivative(x1, x2, t);
        if dx.abs() < 1e-6 {
            break;
        }
        t = (t - x / dx).clamp(0.0, 1.0);
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    t = target_x;
    for _ in 0..12 {
        let x = bezier_x(x1, x2, t);
        if (x - target_x).abs() < 1e-7 {
            break;
        }
        if x < target_x {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) / 2.0;
    }
    t
}

/// x(t) = 3(1-t)²t·x1 + 3(1-t)t²·x2 + t³
#[inline]
fn bezier_x(x1: f64, x2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * x1 + 3.0 * mt * t * t * x2 + t * t * t
}

#[inline]
fn bezier_y(y1: f64, y2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * y1 + 3.0 * mt * t * t * y2 + t * t * t
}

/// dx/dt = 3(1-t)²·x1 + 6(1-t)t·(x2-x1) + 3t²·(1-x2)
#[inline]
fn bezier_x_derivative(x1: f64, x2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * x1 + 6.0 * mt * t * (x2 - x1) + 3.0 * t * t * (1.0 - x2)
}

fn stepped(steps: u32, position: StepPosition, t: f64) -> f64 {
    if steps == 0 {
        return t;
    }
    let steps_f = steps as f64;

    match position {
        StepPosition::Start => (t * steps_f).ceil() / steps_f,
        StepPosition::End => (t * steps_f).floor() / steps_f,
        StepPosition::Both => ((t * (steps_f + 1.0)).floor() / steps_f).min(1.0),
        StepPosition::None => {
            if steps == 1 {
                0.5
            } else {
                ((t * steps_f).floor() / (steps_f - 1.0)).min(1.0)
            }
        }
    }
}
