//! Drag constraints and elasticity.
//!
//! Constraints are expressed in the space of the dragged element's `x`/`y`
//! values: `{ left: 0, right: 100 }` lets `x` travel from 0 to 100. A
//! constraint element is measured and converted into the same space.

use super::DragAxis;
use crate::element::{VisualElement, WeakVisualElement};
use crate::error::Result;
use crate::interpolate::{mix, progress};
use crate::projection::geometry::{Axis, Rect};
use serde::{Deserialize, Serialize};

/// Edges of a constraint rectangle or per-edge elasticity. Unset edges are
/// unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub top: Option<f64>,
    pub left: Option<f64>,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
}

impl BoundingBox {
    pub fn horizontal(left: f64, right: f64) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
            ..Default::default()
        }
    }

    pub fn vertical(top: f64, bottom: f64) -> Self {
        Self {
            top: Some(top),
            bottom: Some(bottom),
            ..Default::default()
        }
    }
}

/// Limits of one axis value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AxisConstraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Constraints {
    pub x: AxisConstraints,
    pub y: AxisConstraints,
}

impl Constraints {
    pub fn axis(&self, axis: DragAxis) -> AxisConstraints {
        match axis {
            DragAxis::X => self.x,
            DragAxis::Y => self.y,
        }
    }
}

impl From<BoundingBox> for Constraints {
    fn from(bounds: BoundingBox) -> Self {
        Self {
            x: AxisConstraints {
                min: bounds.left,
                max: bounds.right,
            },
            y: AxisConstraints {
                min: bounds.top,
                max: bounds.bottom,
            },
        }
    }
}

/// Where a drag may go.
#[derive(Clone)]
pub enum DragConstraints {
    /// Fixed limits on the `x`/`y` values.
    Bounds(BoundingBox),
    /// Keep the element inside another element's box.
    Element(WeakVisualElement),
}

impl std::fmt::Debug for DragConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounds(bounds) => f.debug_tuple("Bounds").field(bounds).finish(),
            Self::Element(element) => {
                let id = element.upgrade().map(|e| e.id().0);
                f.debug_tuple("Element").field(&id).finish()
            }
        }
    }
}

impl From<BoundingBox> for DragConstraints {
    fn from(bounds: BoundingBox) -> Self {
        Self::Bounds(bounds)
    }
}

impl From<&VisualElement> for DragConstraints {
    fn from(element: &VisualElement) -> Self {
        Self::Element(element.downgrade())
    }
}

impl DragConstraints {
    /// Resolve into value-space limits for `element`.
    ///
    /// # Errors
    /// [`MotionError::Measurement`](crate::error::MotionError::Measurement)
    /// if either box can't be measured, or the constraint element is gone.
    pub fn resolve(&self, element: &VisualElement) -> Result<Constraints> {
        match self {
            Self::Bounds(bounds) => Ok((*bounds).into()),
            Self::Element(container) => {
                let container = container.upgrade().ok_or_else(|| {
                    crate::error::MotionError::Measurement("constraint element was dropped".into())
                })?;
                let container_box = container.measure_viewport_box()?;
                let layout_box = untranslated_box(element)?;
                Ok(calc_viewport_constraints(&layout_box, &container_box))
            }
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element(_))
    }
}

/// The element's box with its own `x`/`y` translation removed.
fn untranslated_box(element: &VisualElement) -> Result<Rect> {
    let mut rect = element.measure_viewport_box()?;
    let offset = |key: &str| element.get_value(key).and_then(|v| v.get_f64()).unwrap_or(0.0);
    rect.x.translate(-offset("x"));
    rect.y.translate(-offset("y"));
    Ok(rect)
}

fn calc_viewport_axis_constraints(layout: &Axis, container: &Axis) -> AxisConstraints {
    let mut min = container.min - layout.min;
    let mut max = container.max - layout.max;
    // A container smaller than the element flips the range so the element
    // can still be dragged to cover it.
    if container.length() < layout.length() {
        std::mem::swap(&mut min, &mut max);
    }
    AxisConstraints {
        min: Some(min),
        max: Some(max),
    }
}

/// Translation limits that keep `layout` inside `container`.
pub fn calc_viewport_constraints(layout: &Rect, container: &Rect) -> Constraints {
    Constraints {
        x: calc_viewport_axis_constraints(&layout.x, &container.x),
        y: calc_viewport_axis_constraints(&layout.y, &container.y),
    }
}

/// How far past a constraint the element follows the pointer, per edge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AxisElastic {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Elastic {
    pub x: AxisElastic,
    pub y: AxisElastic,
}

impl Elastic {
    pub fn axis(&self, axis: DragAxis) -> AxisElastic {
        match axis {
            DragAxis::X => self.x,
            DragAxis::Y => self.y,
        }
    }
}

/// Elasticity past the constraints: `0` is rigid, `1` follows the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DragElastic {
    Uniform(f64),
    PerEdge(BoundingBox),
}

impl DragElastic {
    pub fn resolve(&self) -> Elastic {
        match self {
            Self::Uniform(e) => Elastic {
                x: AxisElastic { min: *e, max: *e },
                y: AxisElastic { min: *e, max: *e },
            },
            Self::PerEdge(edges) => Elastic {
                x: AxisElastic {
                    min: edges.left.unwrap_or(0.0),
                    max: edges.right.unwrap_or(0.0),
                },
                y: AxisElastic {
                    min: edges.top.unwrap_or(0.0),
                    max: edges.bottom.unwrap_or(0.0),
                },
            },
        }
    }

    /// Whether the release animation bounces softly off the constraints.
    pub fn is_elastic(&self) -> bool {
        match self {
            Self::Uniform(e) => *e != 0.0,
            Self::PerEdge(_) => true,
        }
    }
}

impl From<f64> for DragElastic {
    fn from(e: f64) -> Self {
        Self::Uniform(e)
    }
}

/// Constrain `point`, letting it overshoot by the elastic factor.
pub fn apply_constraints(point: f64, constraints: &AxisConstraints, elastic: &AxisElastic) -> f64 {
    match (constraints.min, constraints.max) {
        (Some(min), _) if point < min => mix(min, point, elastic.min),
        (_, Some(max)) if point > max => mix(max, point, elastic.max),
        _ => point,
    }
}

/// Progress of `source` through the free room of `target`, in `[0, 1]`.
///
/// Used to keep an element at the same relative position when its
/// constraints change size.
pub fn calc_origin(source: &Axis, target: &Axis) -> f64 {
    let (source_length, target_length) = (source.length(), target.length());
    let origin = if target_length > source_length {
        progress(target.min, target.max - source_length, source.min)
    } else if source_length > target_length {
        progress(source.min, source.max - target_length, target.min)
    } else {
        0.5
    };
    origin.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MotionContext;
    use crate::element::testing::MockAdapter;
    use crate::frameloop::ManualClock;
    use glide_config::GlideConfig;
    use std::rc::Rc;

    #[test]
    fn test_rigid_constraints_clamp() {
        let constraints = AxisConstraints {
            min: Some(0.0),
            max: Some(100.0),
        };
        let rigid = AxisElastic::default();
        assert_eq!(apply_constraints(150.0, &constraints, &rigid), 100.0);
        assert_eq!(apply_constraints(-20.0, &constraints, &rigid), 0.0);
        assert_eq!(apply_constraints(40.0, &constraints, &rigid), 40.0);
    }

    #[test]
    fn test_elastic_overshoot() {
        let constraints = AxisConstraints {
            min: Some(0.0),
            max: Some(100.0),
        };
        let elastic = DragElastic::PerEdge(BoundingBox::horizontal(0.0, 0.5)).resolve();
        assert_eq!(apply_constraints(200.0, &constraints, &elastic.x), 150.0);
        assert_eq!(apply_constraints(-50.0, &constraints, &elastic.x), 0.0);
        assert_eq!(elastic.y, AxisElastic::default());
    }

    #[test]
    fn test_unset_edges_are_free() {
        let constraints: Constraints = BoundingBox {
            right: Some(10.0),
            ..Default::default()
        }
        .into();
        assert_eq!(apply_constraints(-500.0, &constraints.x, &AxisElastic::default()), -500.0);
        assert_eq!(constraints.y, AxisConstraints::default());
    }

    #[test]
    fn test_elastic_from_json() {
        let uniform: DragElastic = serde_json::from_str("0.2").unwrap();
        assert_eq!(uniform, DragElastic::Uniform(0.2));
        let edges: DragElastic = serde_json::from_str(r#"{ "top": 0.5 }"#).unwrap();
        assert_eq!(edges.resolve().y.min, 0.5);
        assert!(!DragElastic::Uniform(0.0).is_elastic());
    }

    #[test]
    fn test_viewport_constraints() {
        let layout = Rect::from_xywh(50.0, 50.0, 100.0, 100.0);
        let container = Rect::from_xywh(0.0, 0.0, 400.0, 300.0);
        let constraints = calc_viewport_constraints(&layout, &container);
        assert_eq!(constraints.x, AxisConstraints { min: Some(-50.0), max: Some(250.0) });
        assert_eq!(constraints.y, AxisConstraints { min: Some(-50.0), max: Some(150.0) });

        // Smaller container: the range flips.
        let small = Rect::from_xywh(60.0, 60.0, 20.0, 20.0);
        let flipped = calc_viewport_constraints(&layout, &small);
        assert_eq!(flipped.x, AxisConstraints { min: Some(-70.0), max: Some(10.0) });
    }

    #[test]
    fn test_calc_origin() {
        assert_eq!(calc_origin(&Axis::new(0.0, 0.0), &Axis::new(0.0, 100.0)), 0.0);
        assert_eq!(calc_origin(&Axis::new(50.0, 50.0), &Axis::new(0.0, 100.0)), 0.5);
        assert_eq!(calc_origin(&Axis::new(10.0, 20.0), &Axis::new(10.0, 20.0)), 0.5);
    }

    #[test]
    fn test_resolve_element_constraints() {
        let ctx = MotionContext::new(ManualClock::new(), GlideConfig::default());
        let container = VisualElement::new(
            &ctx,
            Rc::new(MockAdapter::with_bounds(Rect::from_xywh(0.0, 0.0, 300.0, 300.0))),
        );
        let element = VisualElement::new(
            &ctx,
            Rc::new(MockAdapter::with_bounds(Rect::from_xywh(120.0, 0.0, 100.0, 100.0))),
        );
        // The measured box includes a 20px translation.
        element.get_or_create_value("x", 20.0);

        let source = DragConstraints::from(&container);
        let constraints = source.resolve(&element).unwrap();
        assert_eq!(constraints.x, AxisConstraints { min: Some(-100.0), max: Some(100.0) });

        drop(container);
        assert!(source.resolve(&element).is_err());
    }
}
