//! Glide: reactive animation and layout projection.
//!
//! This facade re-exports the engine ([`glide_motion`]) and its tuning
//! configuration ([`glide_config`]).

pub use glide_config as config;
pub use glide_motion::*;
