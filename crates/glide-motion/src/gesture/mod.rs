//! Pointer gestures.
//!
//! A [`PanSession`] turns a stream of raw pointer events into pan
//! callbacks with offsets and a trailing-window velocity. [`DragControls`]
//! builds on it to write the pointer offset into an element's `x`/`y`
//! values, constrained and elastic, and to throw the element with an
//! inertia animation on release.
//!
//! # Usage
//!
//! ```ignore
//! let drag = DragControls::new(&element, DragOptions::new(DragDirection::X), DragHandlers::default());
//! drag.pointer_down(PointerEvent::mouse(10.0, 10.0));
//! drag.pointer_move(PointerEvent::mouse(60.0, 10.0));
//! drag.pointer_up(PointerEvent::mouse(60.0, 10.0));
//! ```

pub mod constraints;
mod drag;
pub mod locks;
mod pan;

pub use constraints::{AxisConstraints, AxisElastic, BoundingBox, Constraints, DragConstraints, DragElastic, Elastic};
pub use drag::{DragControls, DragHandlers, DragOptions};
pub use locks::{DragLockGuard, DragLocks};
pub use pan::{PanHandler, PanHandlers, PanSession, TimestampedPoint, pan_velocity};

use crate::projection::geometry::Point;
use serde::{Deserialize, Serialize};

/// The device behind a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    #[default]
    Mouse,
    Pen,
    Touch,
}

/// A pointer event in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub point: Point,
    pub kind: PointerKind,
    /// Mouse button; `0` is the main button.
    pub button: i16,
    /// Whether this is the first finger of a multi-touch interaction.
    pub is_primary: bool,
}

impl PointerEvent {
    pub fn mouse(x: f64, y: f64) -> Self {
        Self {
            point: Point::new(x, y),
            kind: PointerKind::Mouse,
            button: 0,
            is_primary: true,
        }
    }

    pub fn touch(x: f64, y: f64, is_primary: bool) -> Self {
        Self {
            point: Point::new(x, y),
            kind: PointerKind::Touch,
            button: 0,
            is_primary,
        }
    }

    pub fn with_button(mut self, button: i16) -> Self {
        self.button = button;
        self
    }

    /// Main mouse button, or the primary touch/pen contact.
    pub fn is_primary_pointer(&self) -> bool {
        match self.kind {
            PointerKind::Mouse => self.button <= 0,
            PointerKind::Pen | PointerKind::Touch => self.is_primary,
        }
    }
}

/// Progress of a pan gesture.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PanInfo {
    /// Current pointer position.
    pub point: Point,
    /// Movement since the last recorded point.
    pub delta: Point,
    /// Movement since the session started.
    pub offset: Point,
    /// Units per second over the trailing velocity window.
    pub velocity: Point,
}

/// A draggable axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragAxis {
    X,
    Y,
}

impl DragAxis {
    pub const BOTH: [DragAxis; 2] = [DragAxis::X, DragAxis::Y];

    /// The element value this axis writes.
    pub fn key(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
        }
    }

    pub fn of(self, point: Point) -> f64 {
        match self {
            Self::X => point.x,
            Self::Y => point.y,
        }
    }
}

/// Which axes a drag moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragDirection {
    X,
    Y,
    #[default]
    Both,
}

impl DragDirection {
    /// Whether `axis` moves, given the axis a direction lock settled on.
    pub fn allows(self, axis: DragAxis, locked: Option<DragAxis>) -> bool {
        let enabled = match self {
            Self::Both => true,
            Self::X => axis == DragAxis::X,
            Self::Y => axis == DragAxis::Y,
        };
        enabled && locked.is_none_or(|locked| locked == axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_pointer() {
        assert!(PointerEvent::mouse(0.0, 0.0).is_primary_pointer());
        assert!(!PointerEvent::mouse(0.0, 0.0).with_button(2).is_primary_pointer());
        assert!(PointerEvent::touch(0.0, 0.0, true).is_primary_pointer());
        assert!(!PointerEvent::touch(0.0, 0.0, false).is_primary_pointer());
    }

    #[test]
    fn test_direction_allows() {
        assert!(DragDirection::Both.allows(DragAxis::Y, None));
        assert!(!DragDirection::Both.allows(DragAxis::Y, Some(DragAxis::X)));
        assert!(DragDirection::X.allows(DragAxis::X, Some(DragAxis::X)));
        assert!(!DragDirection::X.allows(DragAxis::Y, None));
    }

    #[test]
    fn test_direction_from_json() {
        let direction: DragDirection = serde_json::from_str(r#""x""#).unwrap();
        assert_eq!(direction, DragDirection::X);
    }
}
