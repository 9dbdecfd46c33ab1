//! Glide motion engine
//!
//! A single-threaded animation runtime: a frame scheduler that batches
//! reads before writes, reactive values with velocity tracking, spring,
//! keyframe and inertia generators, an animation controller that resolves
//! keyframes and picks between a platform timeline and software playback,
//! a layout projection tree, and pointer drag gestures.
//!
//! Everything is driven by [`Scheduler::process_frame`]; nothing here
//! blocks or spawns threads. Hosts plug in through
//! [`element::InstanceAdapter`] and a [`frameloop::Clock`].
//!
//! ```ignore
//! use glide_motion::{MotionContext, Transition, VisualElement};
//!
//! let ctx = MotionContext::from_env(SystemClock::new());
//! let element = VisualElement::new(&ctx, adapter);
//! element.animate("opacity", 1.0, &Transition::spring(300.0, 20.0).into());
//! loop {
//!     ctx.scheduler().process_frame();
//! }
//! ```

pub mod animation;
pub mod context;
pub mod easing;
pub mod element;
pub mod error;
pub mod frameloop;
pub mod generators;
pub mod gesture;
pub mod interpolate;
pub mod projection;
pub mod types;
pub mod value;

pub use animation::{
    GroupPlaybackControls, NativeAnimation, PlaybackControls, SoftwareAnimation, Transition, TransitionGroup,
    ValueTarget, animate_motion_value,
};
pub use context::MotionContext;
pub use easing::Easing;
pub use element::{InstanceAdapter, VisualElement};
pub use error::{MotionError, Result};
pub use frameloop::{Clock, ManualClock, Phase, Scheduler, SystemClock};
pub use generators::GeneratorType;
pub use gesture::{DragControls, DragDirection, DragOptions, PanSession, PointerEvent};
pub use projection::{NodeId, ProjectionOptions, ProjectionTree};
pub use types::{AnimatableValue, AnimationId, AnimationState};
pub use value::{MotionValue, ValueEvent};
