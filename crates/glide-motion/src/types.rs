//! Core value types shared across the engine.
//!
//! - `AnimatableValue`: a number or a style string (`"10px"`, `"#fff"`, `"auto"`)
//! - `AnimationId`: unique identifier for animation instances
//! - `AnimationState`: playback state of an animation
//! - value-key helpers (transform keys, positional keys)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an animation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

impl AnimationId {
    /// Generate a new unique animation ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for AnimationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Playback state of an animation.
///
/// `Idle → Running ⇄ Paused → Finished`; cancelling from any non-idle state
/// returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationState {
    /// Not started, cancelled, or stopped.
    #[default]
    Idle,
    /// Animation is actively running.
    Running,
    /// Animation has been paused.
    Paused,
    /// Animation has completed normally.
    Finished,
}

/// A value that can be written to a style key.
///
/// Numbers animate directly. Strings are parsed as templates of numbers,
/// units and colors when mixed; anything else (`"auto"`, `"none"`) switches
/// discretely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnimatableValue {
    /// Plain number (opacity, x, scale, ...).
    Number(f64),
    /// Style string (`"10px"`, `"rgba(0, 0, 0, 0.5)"`, `"var(--gap)"`).
    Text(String),
}

impl AnimatableValue {
    /// Numeric interpretation of the value, `parseFloat`-style for strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => parse_float(s),
        }
    }

    /// Borrow the string form, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }

    /// Whether this is a plain number.
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// Whether a numeric velocity can be tracked for this value.
    pub fn is_float(&self) -> bool {
        self.as_f64().is_some_and(|n| !n.is_nan())
    }

    /// Whether the value is zero (`0` or `"0"`).
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Number(n) => *n == 0.0,
            Self::Text(s) => s.trim() == "0",
        }
    }

    /// Unit suffix of a single-number string (`"10px"` → `"px"`).
    pub fn unit(&self) -> Option<&str> {
        let s = self.as_str()?.trim();
        let end = float_prefix_len(s)?;
        let unit = s[end..].trim();
        (!unit.is_empty() && unit.chars().all(|c| c.is_ascii_alphabetic() || c == '%'))
            .then_some(unit)
    }

    /// Whether this is a `var(--name)` reference.
    pub fn is_css_variable(&self) -> bool {
        self.as_str()
            .is_some_and(|s| s.trim_start().starts_with("var(--"))
    }
}

impl fmt::Display for AnimatableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AnimatableValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for AnimatableValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AnimatableValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Parse the longest leading float in `s`, ignoring leading whitespace.
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = float_prefix_len(s)?;
    s[..end].parse::<f64>().ok()
}

/// Byte length of the leading float literal in `s`, if any.
pub(crate) fn float_prefix_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > frac_start || digits > 0 {
            digits += j - frac_start;
            i = j;
        }
    }
    if digits == 0 {
        return None;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    Some(i)
}

/// Keys composed into the CSS `transform` property.
pub const TRANSFORM_KEYS: [&str; 17] = [
    "transformPerspective",
    "x",
    "y",
    "z",
    "translateX",
    "translateY",
    "translateZ",
    "scale",
    "scaleX",
    "scaleY",
    "rotate",
    "rotateX",
    "rotateY",
    "rotateZ",
    "skew",
    "skewX",
    "skewY",
];

/// Returns true if `key` is composed into the transform.
pub fn is_transform_key(key: &str) -> bool {
    TRANSFORM_KEYS.contains(&key)
}

/// Keys whose `"auto"` or mixed-unit keyframes need a measurement pass.
pub fn is_positional_key(key: &str) -> bool {
    matches!(
        key,
        "width"
            | "height"
            | "top"
            | "left"
            | "right"
            | "bottom"
            | "x"
            | "y"
            | "translateX"
            | "translateY"
    )
}

/// Default value for a style key when nothing has been written yet.
pub fn default_value_for(key: &str) -> Option<AnimatableValue> {
    match key {
        "scale" | "scaleX" | "scaleY" | "opacity" => Some(AnimatableValue::Number(1.0)),
        k if is_transform_key(k) => Some(AnimatableValue::Number(0.0)),
        _ => None,
    }
}
