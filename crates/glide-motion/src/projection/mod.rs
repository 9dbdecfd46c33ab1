//! Layout projection.
//!
//! When an element's layout changes, the projection tree measures its old
//! and new boxes and animates a transform that makes the element look like
//! it is still in the old box, relaxing to the new one. Nodes form a tree
//! so nested elements can cancel out their ancestors' scale, and nodes that
//! share a `layout_id` crossfade into each other.
//!
//! # Usage
//!
//! ```ignore
//! let tree = ProjectionTree::new(&ctx);
//! let card = tree.mount(None, Some(&element), ProjectionOptions::layout())?;
//!
//! tree.will_update(card);
//! // ... the host changes layout ...
//! tree.did_update();
//! ```

pub mod geometry;
mod node;
pub mod stack;
pub mod styles;
mod tree;

pub use node::Measurements;
pub use stack::{Promotion, SharedStack};
pub use styles::{ProjectionStyles, correct_border_radius, correct_box_shadow, mix_values};
pub use tree::ProjectionTree;

use crate::animation::Transition;
use crate::easing::Easing;
use geometry::{Delta, Rect};
use glide_config::LayoutConfig;
use serde::{Deserialize, Serialize};

/// Index of a node in a [`ProjectionTree`]. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Which part of a layout change is animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutAnimation {
    /// Position and size.
    #[default]
    Both,
    /// Position only; size snaps.
    Position,
    /// Size only; position snaps.
    Size,
    /// Position only when the aspect ratio changes noticeably.
    PreserveAspect,
}

/// Per-node projection options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Animate layout changes. `None` disables layout animation.
    pub layout: Option<LayoutAnimation>,
    /// Nodes sharing an id crossfade into each other.
    pub layout_id: Option<String>,
    /// The node is a scroll container; its offset is removed from
    /// descendants' measurements.
    pub layout_scroll: bool,
    /// Descendants animate relative to this node even when it doesn't move.
    pub layout_root: bool,
    /// Fade the outgoing member of a shared transition.
    pub crossfade: bool,
    /// Layout transition; defaults to the configured tween.
    pub transition: Option<Transition>,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            layout: None,
            layout_id: None,
            layout_scroll: false,
            layout_root: false,
            crossfade: true,
            transition: None,
        }
    }
}

impl ProjectionOptions {
    /// Animate both position and size.
    pub fn layout() -> Self {
        Self {
            layout: Some(LayoutAnimation::Both),
            ..Default::default()
        }
    }

    /// Join the shared stack for `layout_id`.
    pub fn shared(layout_id: impl Into<String>) -> Self {
        Self {
            layout_id: Some(layout_id.into()),
            ..Default::default()
        }
    }

    pub fn with_layout(mut self, layout: LayoutAnimation) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_layout_id(mut self, layout_id: impl Into<String>) -> Self {
        self.layout_id = Some(layout_id.into());
        self
    }

    pub fn with_scroll(mut self) -> Self {
        self.layout_scroll = true;
        self
    }

    pub fn as_root(mut self) -> Self {
        self.layout_root = true;
        self
    }

    pub fn with_crossfade(mut self, crossfade: bool) -> Self {
        self.crossfade = crossfade;
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    /// Whether layout changes of this node are animated at all.
    pub fn animates_layout(&self) -> bool {
        self.layout.is_some() || self.layout_id.is_some()
    }
}

/// The transition used when a node doesn't set one.
pub fn default_layout_transition(config: &LayoutConfig) -> Transition {
    let [x1, y1, x2, y2] = config.ease;
    Transition::tween(config.duration_ms).with_ease(Easing::CubicBezier { x1, y1, x2, y2 })
}

/// Something that happened to a projection node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectionEvent {
    /// A new layout was measured.
    Measure { node: NodeId, layout: Rect },
    /// Layout changed after an update.
    DidUpdate {
        node: NodeId,
        /// Maps the new layout back onto the snapshot.
        delta: Delta,
        layout_delta: Delta,
        has_layout_changed: bool,
        has_relative_layout_changed: bool,
    },
    /// The projection transform changed.
    ProjectionUpdate { node: NodeId, target: Rect },
    AnimationStart { node: NodeId },
    AnimationComplete { node: NodeId },
    /// An exiting node finished its exit and can be removed.
    ExitComplete { node: NodeId },
}

impl ProjectionEvent {
    pub fn node(&self) -> NodeId {
        match self {
            Self::Measure { node, .. }
            | Self::DidUpdate { node, .. }
            | Self::ProjectionUpdate { node, .. }
            | Self::AnimationStart { node }
            | Self::AnimationComplete { node }
            | Self::ExitComplete { node } => *node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json() {
        let options: ProjectionOptions =
            serde_json::from_str(r#"{ "layout": "preserve-aspect", "layout_id": "card", "crossfade": false }"#).unwrap();
        assert_eq!(options.layout, Some(LayoutAnimation::PreserveAspect));
        assert_eq!(options.layout_id.as_deref(), Some("card"));
        assert!(!options.crossfade);
        assert!(options.animates_layout());
        assert!(!ProjectionOptions::default().animates_layout());
        assert!(ProjectionOptions::default().crossfade);
    }

    #[test]
    fn test_default_layout_transition() {
        let transition = default_layout_transition(&LayoutConfig::default());
        assert_eq!(transition.duration_ms, Some(450.0));
        assert_eq!(
            transition.ease,
            Some(Easing::CubicBezier { x1: 0.4, y1: 0.0, x2: 0.1, y2: 1.0 }.into())
        );
    }
}
