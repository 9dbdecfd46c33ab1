//! Per-runtime shared state.
//!
//! A [`MotionContext`] bundles the scheduler, the tuning configuration and
//! the keyframe resolver queue. Construct one per runtime (or per test) and
//! hand clones to everything that animates.

use crate::animation::resolver::ResolverQueue;
use crate::frameloop::{Clock, Scheduler};
use glide_config::GlideConfig;
use std::rc::Rc;

/// Shared engine state. Cloning is cheap.
#[derive(Clone)]
pub struct MotionContext {
    scheduler: Scheduler,
    config: Rc<GlideConfig>,
    resolvers: ResolverQueue,
}

impl MotionContext {
    /// Create a context driven by `clock`.
    pub fn new(clock: impl Clock + 'static, config: GlideConfig) -> Self {
        let scheduler = Scheduler::with_config(clock, config.frame.clone());
        Self {
            resolvers: ResolverQueue::new(&scheduler),
            scheduler,
            config: Rc::new(config),
        }
    }

    /// Create a context with configuration loaded from `glide.toml` and the
    /// environment.
    pub fn from_env(clock: impl Clock + 'static) -> Self {
        Self::new(clock, GlideConfig::load())
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &GlideConfig {
        &self.config
    }

    pub fn resolvers(&self) -> &ResolverQueue {
        &self.resolvers
    }
}
