//! Turning latest values into style output.

use crate::interpolate::complex::format_number;
use crate::projection::ProjectionStyles;
use crate::types::{AnimatableValue, TRANSFORM_KEYS, is_transform_key};
use serde::Serialize;
use std::collections::BTreeMap;

/// Styles ready to be written to an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderState {
    /// Style properties, including a composed `transform`.
    pub style: BTreeMap<String, String>,
    /// Custom properties (`--name`).
    pub vars: BTreeMap<String, String>,
}

impl RenderState {
    /// Build styles from `latest`, letting `projection` override the
    /// transform and any scale-corrected values.
    pub fn build(latest: &BTreeMap<String, AnimatableValue>, projection: Option<&ProjectionStyles>) -> Self {
        let mut state = RenderState::default();
        let mut has_transform = false;
        let mut has_origin = false;

        for (key, value) in latest {
            if is_transform_key(key) {
                has_transform = true;
            } else if key.starts_with("--") {
                state.vars.insert(key.clone(), value.to_string());
            } else if matches!(key.as_str(), "originX" | "originY" | "originZ") {
                has_origin = true;
            } else {
                state.style.insert(key.clone(), to_css(key, value));
            }
        }

        if has_transform {
            state.style.insert("transform".into(), build_transform(latest));
        }
        if has_origin {
            let origin = |key: &str, default: &str| {
                latest.get(key).map(|v| to_css(key, v)).unwrap_or_else(|| default.to_string())
            };
            state.style.insert(
                "transformOrigin".into(),
                format!("{} {} {}", origin("originX", "50%"), origin("originY", "50%"), origin("originZ", "0")),
            );
        }

        if let Some(projection) = projection {
            state.style.insert("transform".into(), projection.transform.clone());
            if let Some(origin) = &projection.transform_origin {
                state.style.insert("transformOrigin".into(), origin.clone());
            }
            if let Some(opacity) = projection.opacity {
                state.style.insert("opacity".into(), format_number(opacity));
            }
            if let Some(visibility) = &projection.visibility {
                state.style.insert("visibility".into(), visibility.clone());
            }
            for (key, value) in &projection.corrected {
                state.style.insert(key.clone(), value.clone());
            }
        }
        state
    }
}

/// Compose transform keys into a CSS `transform` string.
///
/// Keys are applied in a fixed order regardless of insertion order. Values
/// at their identity (`0`, or `1` for scale) are skipped, and an all-identity
/// transform renders as `"none"`.
pub fn build_transform(latest: &BTreeMap<String, AnimatableValue>) -> String {
    let mut parts = Vec::new();
    for key in TRANSFORM_KEYS {
        let Some(value) = latest.get(key) else {
            continue;
        };
        let is_default = match value {
            AnimatableValue::Number(n) => *n == if key.starts_with("scale") { 1.0 } else { 0.0 },
            AnimatableValue::Text(s) => s.trim().parse::<f64>().is_ok_and(|n| n == 0.0) && !key.starts_with("scale"),
        };
        if is_default {
            continue;
        }
        let name = match key {
            "x" => "translateX",
            "y" => "translateY",
            "z" => "translateZ",
            "transformPerspective" => "perspective",
            other => other,
        };
        parts.push(format!("{name}({})", to_css(key, value)));
    }

    if parts.is_empty() { "none".to_string() } else { parts.join(" ") }
}

/// Format `value` for `key`, adding the key's default unit to bare numbers.
pub fn to_css(key: &str, value: &AnimatableValue) -> String {
    match value {
        AnimatableValue::Number(n) => format!("{}{}", format_number(*n), default_unit(key)),
        AnimatableValue::Text(s) => s.clone(),
    }
}

/// Unit appended to bare numbers written to `key`.
pub fn default_unit(key: &str) -> &'static str {
    match key {
        "x" | "y" | "z" | "translateX" | "translateY" | "translateZ" | "transformPerspective" | "perspective" => "px",
        "rotate" | "rotateX" | "rotateY" | "rotateZ" | "skew" | "skewX" | "skewY" => "deg",
        "originX" | "originY" => "%",
        "originZ" => "px",
        "scale" | "scaleX" | "scaleY" | "opacity" | "zIndex" | "fillOpacity" | "strokeOpacity" | "flex"
        | "flexGrow" | "flexShrink" | "order" | "fontWeight" | "lineHeight" | "pathLength" => "",
        k if k.starts_with("--") => "",
        _ => "px",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(entries: &[(&str, AnimatableValue)]) -> BTreeMap<String, AnimatableValue> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_transform_order_and_units() {
        let latest = values(&[
            ("rotate", AnimatableValue::Number(45.0)),
            ("scale", AnimatableValue::Number(2.0)),
            ("x", AnimatableValue::Number(10.0)),
        ]);
        assert_eq!(build_transform(&latest), "translateX(10px) scale(2) rotate(45deg)");
    }

    #[test]
    fn test_identity_transform_is_none() {
        let latest = values(&[("x", AnimatableValue::Number(0.0)), ("scale", AnimatableValue::Number(1.0))]);
        assert_eq!(build_transform(&latest), "none");
    }

    #[test]
    fn test_build_styles() {
        let latest = values(&[
            ("opacity", AnimatableValue::Number(0.5)),
            ("width", AnimatableValue::Number(100.0)),
            ("height", AnimatableValue::from("auto")),
            ("--gap", AnimatableValue::from("4px")),
            ("y", AnimatableValue::from("50%")),
            ("originX", AnimatableValue::Number(0.0)),
        ]);
        let state = RenderState::build(&latest, None);
        assert_eq!(state.style["opacity"], "0.5");
        assert_eq!(state.style["width"], "100px");
        assert_eq!(state.style["height"], "auto");
        assert_eq!(state.style["transform"], "translateY(50%)");
        assert_eq!(state.style["transformOrigin"], "0% 50% 0");
        assert_eq!(state.vars["--gap"], "4px");
    }

    #[test]
    fn test_projection_overrides_transform() {
        let latest = values(&[("x", AnimatableValue::Number(10.0))]);
        let projection = ProjectionStyles {
            transform: "translate3d(5px, 0px, 0) scale(0.5, 1)".into(),
            ..Default::default()
        };
        let state = RenderState::build(&latest, Some(&projection));
        assert_eq!(state.style["transform"], "translate3d(5px, 0px, 0) scale(0.5, 1)");
    }
}
