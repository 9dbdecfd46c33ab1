//! Box and delta math for layout projection.
//!
//! Boxes are stored as independent `{min, max}` pairs per axis so their
//! length is always `max - min`. A [`Delta`] describes the translate and
//! scale (around an origin) that maps one box onto another.

use crate::interpolate::mix;
use crate::types::AnimatableValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SCALE_PRECISION: f64 = 0.0001;
const TRANSLATE_PRECISION: f64 = 0.01;
const TREE_SCALE_SNAP_MIN: f64 = 0.999999999999;
const TREE_SCALE_SNAP_MAX: f64 = 1.0000000000001;

/// A point or per-axis pair of numbers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };
    pub const ONE: Point = Point { x: 1.0, y: 1.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// One axis of a box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    pub fn translate(&mut self, distance: f64) {
        self.min += distance;
        self.max += distance;
    }

    /// Scale around `origin_point` and then translate.
    pub fn apply_delta(&mut self, translate: f64, scale: f64, origin_point: f64, box_scale: Option<f64>) {
        self.min = apply_point_delta(self.min, translate, scale, origin_point, box_scale);
        self.max = apply_point_delta(self.max, translate, scale, origin_point, box_scale);
    }

    /// Apply a transform expressed relative to `origin` in [0, 1].
    pub fn transform(&mut self, translate: f64, scale: f64, box_scale: Option<f64>, origin: f64) {
        let origin_point = mix(self.min, self.max, origin);
        self.apply_delta(translate, scale, origin_point, box_scale);
    }

    pub fn mix(from: &Axis, to: &Axis, p: f64) -> Axis {
        Axis::new(mix(from.min, to.min, p), mix(from.max, to.max, p))
    }

    pub fn equals_rounded(&self, other: &Axis) -> bool {
        self.min.round() == other.min.round() && self.max.round() == other.max.round()
    }
}

/// An axis-aligned box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: Axis,
    pub y: Axis,
}

impl Rect {
    pub fn new(x: Axis, y: Axis) -> Self {
        Self { x, y }
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Axis::new(x, x + width), Axis::new(y, y + height))
    }

    /// Convert a `{top, left, right, bottom}` bounding box.
    pub fn from_bounds(top: f64, left: f64, right: f64, bottom: f64) -> Self {
        Self::new(Axis::new(left, right), Axis::new(top, bottom))
    }

    pub fn width(&self) -> f64 {
        self.x.length()
    }

    pub fn height(&self) -> f64 {
        self.y.length()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.x.length() / self.y.length()
    }

    pub fn translate(&mut self, offset: Point) {
        self.x.translate(offset.x);
        self.y.translate(offset.y);
    }

    pub fn apply_delta(&mut self, delta: &Delta) {
        self.x.apply_delta(delta.x.translate, delta.x.scale, delta.x.origin_point, None);
        self.y.apply_delta(delta.y.translate, delta.y.scale, delta.y.origin_point, None);
    }

    /// Apply the translate/scale in `transform` around its origin.
    pub fn apply_transform(&mut self, transform: &TransformValues) {
        self.x.transform(transform.x, transform.scale_x, Some(transform.scale), transform.origin_x);
        self.y.transform(transform.y, transform.scale_y, Some(transform.scale), transform.origin_y);
    }

    /// Undo the translate/scale in `transform`.
    ///
    /// `origin_box` is the box the transform origin is relative to, and
    /// `source_box` the box percentage translates are relative to.
    pub fn remove_transform(&mut self, transform: &TransformValues, origin_box: Option<&Rect>, source_box: Option<&Rect>) {
        remove_axis_delta(
            &mut self.x,
            transform.x_percent,
            transform.x,
            transform.scale_x,
            transform.origin_x,
            Some(transform.scale),
            origin_box.map(|b| b.x),
            source_box.map(|b| b.x),
        );
        remove_axis_delta(
            &mut self.y,
            transform.y_percent,
            transform.y,
            transform.scale_y,
            transform.origin_y,
            Some(transform.scale),
            origin_box.map(|b| b.y),
            source_box.map(|b| b.y),
        );
    }

    pub fn mix(from: &Rect, to: &Rect, p: f64) -> Rect {
        Rect::new(Axis::mix(&from.x, &to.x, p), Axis::mix(&from.y, &to.y, p))
    }

    pub fn equals_rounded(&self, other: &Rect) -> bool {
        self.x.equals_rounded(&other.x) && self.y.equals_rounded(&other.y)
    }

    /// `self` expressed relative to `parent`'s origin.
    pub fn relative_to(&self, parent: &Rect) -> Rect {
        Rect::new(
            Axis::new(self.x.min - parent.x.min, self.x.min - parent.x.min + self.x.length()),
            Axis::new(self.y.min - parent.y.min, self.y.min - parent.y.min + self.y.length()),
        )
    }

    /// Place a box expressed relative to `parent` back in page space.
    pub fn resolve_relative(relative: &Rect, parent: &Rect) -> Rect {
        let x_min = parent.x.min + relative.x.min;
        let y_min = parent.y.min + relative.y.min;
        Rect::new(
            Axis::new(x_min, x_min + relative.x.length()),
            Axis::new(y_min, y_min + relative.y.length()),
        )
    }
}

/// Translate and scale mapping one axis onto another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisDelta {
    pub translate: f64,
    pub scale: f64,
    /// Origin in [0, 1] along the source axis.
    pub origin: f64,
    pub origin_point: f64,
}

impl Default for AxisDelta {
    fn default() -> Self {
        Self {
            translate: 0.0,
            scale: 1.0,
            origin: 0.0,
            origin_point: 0.0,
        }
    }
}

impl AxisDelta {
    /// The delta that maps `source` onto `target` around `origin`.
    ///
    /// Scales within 0.0001 of 1 and translates within 0.01 of 0 snap to
    /// identity.
    pub fn between(source: &Axis, target: &Axis, origin: f64) -> Self {
        let origin_point = mix(source.min, source.max, origin);
        let mut scale = target.length() / source.length();
        let mut translate = mix(target.min, target.max, origin) - origin_point;
        if (scale - 1.0).abs() <= SCALE_PRECISION || scale.is_nan() || scale.is_infinite() {
            scale = 1.0;
        }
        if translate.abs() <= TRANSLATE_PRECISION || translate.is_nan() {
            translate = 0.0;
        }
        Self {
            translate,
            scale,
            origin,
            origin_point,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.translate == 0.0 && self.scale == 1.0
    }

    /// Blend from `self` towards identity.
    pub fn mix_to_identity(&self, p: f64) -> Self {
        Self {
            translate: mix(self.translate, 0.0, p),
            scale: mix(self.scale, 1.0, p),
            origin: self.origin,
            origin_point: self.origin_point,
        }
    }
}

/// Per-axis deltas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Delta {
    pub x: AxisDelta,
    pub y: AxisDelta,
}

impl Delta {
    /// The delta that maps `source` onto `target`, with origins in [0, 1].
    pub fn between(source: &Rect, target: &Rect, origin: Point) -> Self {
        Self {
            x: AxisDelta::between(&source.x, &target.x, origin.x),
            y: AxisDelta::between(&source.y, &target.y, origin.y),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }
}

/// The transform-related style values of one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformValues {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Translate given as a percentage of the element's own size.
    pub x_percent: bool,
    pub y_percent: bool,
    pub scale: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub rotate: f64,
    pub rotate_x: f64,
    pub rotate_y: f64,
    pub rotate_z: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    pub transform_perspective: f64,
}

impl Default for TransformValues {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            x_percent: false,
            y_percent: false,
            scale: 1.0,
            scale_x: 1.0,
            scale_y: 1.0,
            origin_x: 0.5,
            origin_y: 0.5,
            rotate: 0.0,
            rotate_x: 0.0,
            rotate_y: 0.0,
            rotate_z: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            transform_perspective: 0.0,
        }
    }
}

impl TransformValues {
    /// Read transform values out of a style map.
    pub fn from_values(values: &BTreeMap<String, AnimatableValue>) -> Self {
        let mut out = Self::default();
        let number = |key: &str, default: f64| values.get(key).and_then(AnimatableValue::as_f64).unwrap_or(default);
        let is_percent = |key: &str| values.get(key).is_some_and(|v| v.unit() == Some("%"));
        out.x = number("x", 0.0);
        out.y = number("y", 0.0);
        out.z = number("z", 0.0);
        out.x_percent = is_percent("x");
        out.y_percent = is_percent("y");
        out.scale = number("scale", 1.0);
        out.scale_x = number("scaleX", 1.0);
        out.scale_y = number("scaleY", 1.0);
        out.origin_x = number("originX", 0.5);
        out.origin_y = number("originY", 0.5);
        out.rotate = number("rotate", 0.0);
        out.rotate_x = number("rotateX", 0.0);
        out.rotate_y = number("rotateY", 0.0);
        out.rotate_z = number("rotateZ", 0.0);
        out.skew_x = number("skewX", 0.0);
        out.skew_y = number("skewY", 0.0);
        out.transform_perspective = number("transformPerspective", 0.0);
        out
    }

    pub fn has_scale(&self) -> bool {
        self.scale != 1.0 || self.scale_x != 1.0 || self.scale_y != 1.0
    }

    pub fn has_2d_translate(&self) -> bool {
        self.x != 0.0 || self.y != 0.0
    }

    pub fn has_transform(&self) -> bool {
        self.has_scale()
            || self.has_2d_translate()
            || self.z != 0.0
            || self.rotate != 0.0
            || self.rotate_x != 0.0
            || self.rotate_y != 0.0
            || self.skew_x != 0.0
            || self.skew_y != 0.0
    }
}

fn scale_point(point: f64, scale: f64, origin_point: f64) -> f64 {
    origin_point + scale * (point - origin_point)
}

fn apply_point_delta(point: f64, translate: f64, scale: f64, origin_point: f64, box_scale: Option<f64>) -> f64 {
    let point = match box_scale {
        Some(box_scale) => scale_point(point, box_scale, origin_point),
        None => point,
    };
    scale_point(point, scale, origin_point) + translate
}

fn remove_point_delta(point: f64, translate: f64, scale: f64, origin_point: f64, box_scale: Option<f64>) -> f64 {
    let point = scale_point(point - translate, 1.0 / scale, origin_point);
    match box_scale {
        Some(box_scale) => scale_point(point, 1.0 / box_scale, origin_point),
        None => point,
    }
}

#[allow(clippy::too_many_arguments)]
fn remove_axis_delta(
    axis: &mut Axis,
    is_percent: bool,
    translate: f64,
    scale: f64,
    origin: f64,
    box_scale: Option<f64>,
    origin_axis: Option<Axis>,
    source_axis: Option<Axis>,
) {
    let source = source_axis.unwrap_or(*axis);
    let translate = if is_percent {
        mix(source.min, source.max, translate / 100.0) - source.min
    } else {
        translate
    };
    let relative_to_self = origin_axis.is_none();
    let origin_axis = origin_axis.unwrap_or(*axis);
    let mut origin_point = mix(origin_axis.min, origin_axis.max, origin);
    if relative_to_self {
        origin_point -= translate;
    }
    axis.min = remove_point_delta(axis.min, translate, scale, origin_point, box_scale);
    axis.max = remove_point_delta(axis.max, translate, scale, origin_point, box_scale);
}

/// A node's contribution when walking the tree from the root.
pub struct TreeStep<'a> {
    pub delta: Option<&'a Delta>,
    /// Scroll to remove first, for scroll containers during shared transitions.
    pub scroll: Option<Point>,
    /// The node's own transform, applied during shared transitions.
    pub transform: Option<&'a TransformValues>,
}

/// Apply every ancestor's projection delta to `rect`, returning the
/// accumulated tree scale.
pub fn apply_tree_deltas(rect: &mut Rect, path: &[TreeStep<'_>], is_shared_transition: bool) -> Point {
    let mut tree_scale = Point::ONE;
    if path.is_empty() {
        return tree_scale;
    }
    for step in path {
        if is_shared_transition {
            if let Some(scroll) = step.scroll {
                rect.translate(Point::new(-scroll.x, -scroll.y));
            }
        }
        if let Some(delta) = step.delta {
            tree_scale.x *= delta.x.scale;
            tree_scale.y *= delta.y.scale;
            rect.apply_delta(delta);
        }
        if is_shared_transition {
            if let Some(transform) = step.transform.filter(|t| t.has_transform()) {
                rect.apply_transform(transform);
            }
        }
    }
    if tree_scale.x < TREE_SCALE_SNAP_MAX && tree_scale.x > TREE_SCALE_SNAP_MIN {
        tree_scale.x = 1.0;
    }
    if tree_scale.y < TREE_SCALE_SNAP_MAX && tree_scale.y > TREE_SCALE_SNAP_MIN {
        tree_scale.y = 1.0;
    }
    tree_scale
}

/// Build the CSS transform that visually applies `delta` under `tree_scale`.
///
/// Returns `"none"` for an identity projection.
pub fn build_projection_transform(delta: &Delta, tree_scale: Point, latest: Option<&TransformValues>) -> String {
    let mut transform = String::new();
    let x_translate = delta.x.translate / tree_scale.x;
    let y_translate = delta.y.translate / tree_scale.y;
    let z_translate = latest.map_or(0.0, |l| l.z);
    if x_translate != 0.0 || y_translate != 0.0 || z_translate != 0.0 {
        transform.push_str(&format!("translate3d({x_translate}px, {y_translate}px, {z_translate}px) "));
    }
    if tree_scale.x != 1.0 || tree_scale.y != 1.0 {
        transform.push_str(&format!("scale({}, {}) ", 1.0 / tree_scale.x, 1.0 / tree_scale.y));
    }
    if let Some(latest) = latest {
        if latest.transform_perspective != 0.0 {
            transform = format!("perspective({}px) {transform}", latest.transform_perspective);
        }
        for (name, value) in [
            ("rotate", latest.rotate),
            ("rotateX", latest.rotate_x),
            ("rotateY", latest.rotate_y),
            ("skewX", latest.skew_x),
            ("skewY", latest.skew_y),
        ] {
            if value != 0.0 {
                transform.push_str(&format!("{name}({value}deg) "));
            }
        }
    }
    let element_scale_x = delta.x.scale * tree_scale.x;
    let element_scale_y = delta.y.scale * tree_scale.y;
    if element_scale_x != 1.0 || element_scale_y != 1.0 {
        transform.push_str(&format!("scale({element_scale_x}, {element_scale_y})"));
    }
    let transform = transform.trim_end();
    if transform.is_empty() {
        "none".to_string()
    } else {
        transform.to_string()
    }
}
