//! Projection output styles and scale correction.
//!
//! A projected element is scaled to look like its old box. Styles that
//! depend on the element's size (border radius, box shadow) would be
//! distorted by that scale, so they are rewritten to cancel it out.

use super::geometry::{Axis, Delta, Point, Rect};
use crate::easing::Easing;
use crate::interpolate::complex::{ComplexValue, Token, format_number};
use crate::interpolate::{mix, progress};
use crate::types::{AnimatableValue, parse_float};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-corner border radius keys, in the order they are mixed.
pub const BORDER_RADIUS_KEYS: [&str; 4] = [
    "borderTopLeftRadius",
    "borderTopRightRadius",
    "borderBottomLeftRadius",
    "borderBottomRightRadius",
];

/// Style overrides written by the projection tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectionStyles {
    pub transform: String,
    pub transform_origin: Option<String>,
    pub opacity: Option<f64>,
    pub visibility: Option<String>,
    /// Scale-corrected values for size-dependent keys.
    pub corrected: BTreeMap<String, String>,
}

impl ProjectionStyles {
    pub fn hidden() -> Self {
        Self {
            transform: "none".to_string(),
            visibility: Some("hidden".to_string()),
            ..Default::default()
        }
    }
}

fn pixels_to_percent(pixels: f64, axis: &Axis) -> f64 {
    if axis.max == axis.min {
        return 0.0;
    }
    pixels / axis.length() * 100.0
}

/// Express a pixel border radius as per-axis percentages of `target`.
///
/// Non-pixel strings (already percentages, `calc(...)`) pass through.
pub fn correct_border_radius(value: &AnimatableValue, target: Option<&Rect>) -> String {
    let Some(target) = target else {
        return value.to_string();
    };
    let pixels = match value {
        AnimatableValue::Number(n) => *n,
        AnimatableValue::Text(s) if s.trim().ends_with("px") => match parse_float(s) {
            Some(n) => n,
            None => return s.clone(),
        },
        AnimatableValue::Text(s) => return s.clone(),
    };
    let x = pixels_to_percent(pixels, &target.x);
    let y = pixels_to_percent(pixels, &target.y);
    format!("{}% {}%", format_number(x), format_number(y))
}

/// Divide shadow offsets by the applied scale, and blur and spread by the
/// average scale.
///
/// Lists of several shadows are left as-is.
pub fn correct_box_shadow(value: &str, delta: &Delta, tree_scale: Point) -> String {
    let shadow = ComplexValue::analyse(value);
    if shadow.tokens.len() > 5 {
        return value.to_string();
    }
    let offset = usize::from(!matches!(shadow.tokens.first(), Some(Token::Number(_))));
    let x_scale = delta.x.scale * tree_scale.x;
    let y_scale = delta.y.scale * tree_scale.y;
    let average_scale = mix(x_scale, y_scale, 0.5);

    let mut tokens = shadow.tokens.clone();
    for (index, scale) in [(0, x_scale), (1, y_scale), (2, average_scale), (3, average_scale)] {
        if let Some(Token::Number(n)) = tokens.get_mut(index + offset) {
            *n /= scale;
        }
    }
    shadow.render(&tokens)
}

/// Scale-correct every size-dependent key present in `values`.
pub fn scale_corrected_styles(
    values: &BTreeMap<String, AnimatableValue>,
    target: Option<&Rect>,
    delta: &Delta,
    tree_scale: Point,
) -> BTreeMap<String, String> {
    let mut corrected = BTreeMap::new();
    if let Some(radius) = values.get("borderRadius") {
        let radius = correct_border_radius(radius, target);
        for key in BORDER_RADIUS_KEYS {
            corrected.insert(key.to_string(), radius.clone());
        }
    }
    for key in BORDER_RADIUS_KEYS {
        if let Some(radius) = values.get(key) {
            corrected.insert(key.to_string(), correct_border_radius(radius, target));
        }
    }
    if let Some(shadow) = values.get("boxShadow").and_then(AnimatableValue::as_str) {
        corrected.insert("boxShadow".to_string(), correct_box_shadow(shadow, delta, tree_scale));
    }
    corrected
}

/// Restrict `easing` to the `[min, max]` part of the progress range.
fn compress(min: f64, max: f64, easing: Easing, p: f64) -> f64 {
    if p < min {
        0.0
    } else if p > max {
        1.0
    } else {
        easing.evaluate(progress(min, max, p))
    }
}

/// Opacity curve of the element fading in during a crossfade.
pub fn ease_crossfade_in(p: f64) -> f64 {
    compress(0.0, 0.5, Easing::CircOut, p)
}

/// Opacity curve of the element fading out during a crossfade.
pub fn ease_crossfade_out(p: f64) -> f64 {
    compress(0.5, 0.95, Easing::Linear, p)
}

fn radius_of<'a>(values: &'a BTreeMap<String, AnimatableValue>, key: &str) -> Option<&'a AnimatableValue> {
    values.get(key).or_else(|| values.get("borderRadius"))
}

fn is_px_like(value: &AnimatableValue) -> bool {
    match value {
        AnimatableValue::Number(_) => true,
        AnimatableValue::Text(s) => s.trim().ends_with("px"),
    }
}

fn is_percent(value: &AnimatableValue) -> bool {
    value.unit() == Some("%")
}

/// Blend the visual values of a shared-layout transition into `target`.
///
/// `follow` is the outgoing element's values, `lead` the incoming one's.
/// With `crossfade_opacity` the lead fades in over the first half while the
/// follower fades out late (`opacityExit`); a lone member just mixes its own
/// opacity. Border radii and rotation are mixed when both sides allow it.
pub fn mix_values(
    target: &mut BTreeMap<String, AnimatableValue>,
    follow: &BTreeMap<String, AnimatableValue>,
    lead: &BTreeMap<String, AnimatableValue>,
    p: f64,
    crossfade_opacity: bool,
    is_only_member: bool,
) {
    let opacity = |values: &BTreeMap<String, AnimatableValue>| values.get("opacity").and_then(AnimatableValue::as_f64).unwrap_or(1.0);
    if crossfade_opacity {
        target.insert("opacity".into(), mix(0.0, opacity(lead), ease_crossfade_in(p)).into());
        target.insert("opacityExit".into(), mix(opacity(follow), 0.0, ease_crossfade_out(p)).into());
    } else if is_only_member {
        target.insert("opacity".into(), mix(opacity(follow), opacity(lead), p).into());
    }

    for key in BORDER_RADIUS_KEYS {
        let (follow_radius, lead_radius) = (radius_of(follow, key), radius_of(lead, key));
        if follow_radius.is_none() && lead_radius.is_none() {
            continue;
        }
        let zero = AnimatableValue::Number(0.0);
        let follow_radius = follow_radius.unwrap_or(&zero);
        let lead_radius = lead_radius.unwrap_or(&zero);
        let both_zero = follow_radius.is_zero() && lead_radius.is_zero();
        let can_mix = both_zero || (is_px_like(follow_radius) && is_px_like(lead_radius)) || (is_percent(follow_radius) && is_percent(lead_radius));
        if can_mix {
            let from = follow_radius.as_f64().unwrap_or(0.0);
            let to = lead_radius.as_f64().unwrap_or(0.0);
            let mixed = mix(from, to, p).max(0.0);
            let value = if is_percent(follow_radius) || is_percent(lead_radius) {
                AnimatableValue::Text(format!("{}%", format_number(mixed)))
            } else {
                AnimatableValue::Number(mixed)
            };
            target.insert(key.to_string(), value);
        } else {
            target.insert(key.to_string(), lead_radius.clone());
        }
    }

    let rotate = |values: &BTreeMap<String, AnimatableValue>| values.get("rotate").and_then(AnimatableValue::as_f64);
    if rotate(follow).is_some() || rotate(lead).is_some() {
        let from = rotate(follow).unwrap_or(0.0);
        let to = rotate(lead).unwrap_or(0.0);
        target.insert("rotate".into(), mix(from, to, p).into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::geometry::AxisDelta;

    fn values(pairs: &[(&str, AnimatableValue)]) -> BTreeMap<String, AnimatableValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_correct_border_radius() {
        let target = Rect::from_xywh(0.0, 0.0, 200.0, 100.0);
        assert_eq!(correct_border_radius(&AnimatableValue::Number(20.0), Some(&target)), "10% 20%");
        assert_eq!(correct_border_radius(&"10px".into(), Some(&target)), "5% 10%");
        assert_eq!(correct_border_radius(&"50%".into(), Some(&target)), "50%");
        assert_eq!(correct_border_radius(&AnimatableValue::Number(8.0), None), "8");
    }

    #[test]
    fn test_correct_box_shadow() {
        let delta = Delta {
            x: AxisDelta { scale: 2.0, ..Default::default() },
            y: AxisDelta { scale: 0.5, ..Default::default() },
        };
        let corrected = correct_box_shadow("10px 10px 5px #000", &delta, Point::ONE);
        assert!(corrected.starts_with("5px 20px 4px"), "{corrected}");

        let colored = correct_box_shadow("rgba(0, 0, 0, 0.5) 4px 4px", &delta, Point::ONE);
        assert!(colored.ends_with("2px 8px"), "{colored}");
    }

    #[test]
    fn test_scale_corrected_styles_expand_radius() {
        let target = Rect::from_xywh(0.0, 0.0, 100.0, 100.0);
        let corrected = scale_corrected_styles(
            &values(&[("borderRadius", AnimatableValue::Number(10.0))]),
            Some(&target),
            &Delta::default(),
            Point::ONE,
        );
        assert_eq!(corrected.len(), 4);
        assert_eq!(corrected["borderTopLeftRadius"], "10% 10%");
    }

    #[test]
    fn test_crossfade_curves() {
        assert_eq!(ease_crossfade_in(0.0), 0.0);
        assert_eq!(ease_crossfade_in(0.6), 1.0);
        assert_eq!(ease_crossfade_out(0.4), 0.0);
        assert!((ease_crossfade_out(0.725) - 0.5).abs() < 1e-9);
        assert_eq!(ease_crossfade_out(1.0), 1.0);
    }

    #[test]
    fn test_mix_values_crossfade() {
        let follow = values(&[("opacity", AnimatableValue::Number(1.0)), ("borderRadius", AnimatableValue::Number(0.0))]);
        let lead = values(&[("borderRadius", AnimatableValue::Number(20.0)), ("rotate", AnimatableValue::Number(90.0))]);
        let mut target = BTreeMap::new();
        mix_values(&mut target, &follow, &lead, 0.5, true, false);
        assert_eq!(target["opacity"], AnimatableValue::Number(1.0));
        assert_eq!(target["opacityExit"], AnimatableValue::Number(1.0));
        assert_eq!(target["borderTopLeftRadius"], AnimatableValue::Number(10.0));
        assert_eq!(target["rotate"], AnimatableValue::Number(45.0));
    }

    #[test]
    fn test_mix_values_only_member() {
        let follow = values(&[("opacity", AnimatableValue::Number(0.0))]);
        let lead = values(&[]);
        let mut target = BTreeMap::new();
        mix_values(&mut target, &follow, &lead, 0.25, false, true);
        assert_eq!(target["opacity"], AnimatableValue::Number(0.25));
        assert!(!target.contains_key("rotate"));
    }
}
