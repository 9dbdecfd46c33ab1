//! Per-node projection state.

use super::geometry::{Delta, Point, Rect};
use super::{NodeId, ProjectionOptions};
use crate::animation::PlaybackControls;
use crate::element::{VisualElement, WeakVisualElement};
use crate::frameloop::Process;
use crate::types::AnimatableValue;
use crate::value::MotionValue;
use std::collections::BTreeMap;
use std::rc::Rc;

pub(crate) type Values = BTreeMap<String, AnimatableValue>;

/// One measurement of a node's box.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    /// The box as the host reports it, transforms included.
    pub measured_box: Rect,
    /// The box with scroll and the element's own transforms removed.
    pub layout_box: Rect,
    /// Style values at measurement time.
    pub latest_values: Values,
    /// The node that was measured. Differs from the owning node when a
    /// snapshot was handed over by a shared-layout promotion.
    pub source: NodeId,
}

/// Where a layout animation starts from.
#[derive(Debug, Clone)]
pub(crate) struct AnimationOrigin {
    pub delta: Delta,
    pub snapshot_values: Values,
    pub is_shared: bool,
    pub crossfade_opacity: bool,
    pub is_only_member: bool,
}

pub(crate) struct ProjectionNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub element: Option<WeakVisualElement>,
    pub options: ProjectionOptions,

    pub snapshot: Option<Measurements>,
    pub layout: Option<Measurements>,
    /// The layout box an animation is currently heading to.
    pub target_layout: Option<Rect>,
    pub scroll: Option<Point>,

    pub target: Option<Rect>,
    pub target_delta: Option<Delta>,
    pub relative_target: Option<Rect>,
    pub relative_target_origin: Option<Rect>,
    pub relative_parent: Option<NodeId>,
    pub attempt_relative_target: bool,

    pub tree_scale: Point,
    pub projection_delta: Option<Delta>,
    pub projection_delta_with_transform: Delta,
    pub projection_transform: Option<String>,

    pub is_layout_dirty: bool,
    pub is_visible: bool,
    pub is_present: bool,
    pub is_animation_blocked: bool,

    pub resume_from: Option<NodeId>,
    pub resuming_from: Option<NodeId>,

    pub animation_origin: Option<AnimationOrigin>,
    pub animation_values: Option<Values>,
    pub animation_progress: f64,
    pub progress: Option<MotionValue>,
    pub current_animation: Option<Rc<dyn PlaybackControls>>,
    pub pending_start: Option<Process>,
    pub on_exit_complete: Option<Rc<dyn Fn()>>,
}

impl ProjectionNode {
    pub fn new(id: NodeId, parent: Option<NodeId>, depth: usize, element: Option<WeakVisualElement>, options: ProjectionOptions) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            depth,
            element,
            options,
            snapshot: None,
            layout: None,
            target_layout: None,
            scroll: None,
            target: None,
            target_delta: None,
            relative_target: None,
            relative_target_origin: None,
            relative_parent: None,
            attempt_relative_target: false,
            tree_scale: Point::ONE,
            projection_delta: None,
            projection_delta_with_transform: Delta::default(),
            projection_transform: None,
            is_layout_dirty: true,
            is_visible: true,
            is_present: true,
            is_animation_blocked: false,
            resume_from: None,
            resuming_from: None,
            animation_origin: None,
            animation_values: None,
            animation_progress: 0.0,
            progress: None,
            current_animation: None,
            pending_start: None,
            on_exit_complete: None,
        }
    }

    pub fn element(&self) -> Option<VisualElement> {
        self.element.as_ref().and_then(WeakVisualElement::upgrade)
    }

    pub fn latest_values(&self) -> Values {
        self.element().map(|e| e.latest_values()).unwrap_or_default()
    }

    /// Whether this node currently distorts its own box.
    pub fn is_projecting(&self) -> bool {
        (self.relative_target.is_some() || self.target_delta.is_some() || self.options.layout_root) && self.layout.is_some()
    }

    pub fn is_animating(&self) -> bool {
        self.current_animation.is_some() || self.pending_start.is_some()
    }

    /// Drop every derived projection value.
    pub fn reset_projection(&mut self) {
        self.target = None;
        self.target_delta = None;
        self.relative_target = None;
        self.relative_target_origin = None;
        self.relative_parent = None;
        self.projection_delta = None;
        self.projection_transform = None;
        self.tree_scale = Point::ONE;
        self.animation_values = None;
    }
}
