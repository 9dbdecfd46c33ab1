//! Glide tuning configuration
//!
//! This crate centralises the empirical constants the motion engine runs on
//! (frame delta clamping, spring rest thresholds, drag deadzones, ...), loading
//! overrides from `glide.toml` and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`GlideConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration structure for Glide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlideConfig {
    /// Frame loop settings
    pub frame: FrameConfig,
    /// Spring solver defaults and rest thresholds
    pub spring: SpringConfig,
    /// Inertia (decay) defaults
    pub inertia: InertiaConfig,
    /// Generator duration probing
    pub generator: GeneratorConfig,
    /// Velocity tracking windows
    pub velocity: VelocityConfig,
    /// Drag gesture tuning
    pub drag: DragConfig,
    /// Layout animation defaults
    pub layout: LayoutConfig,
}

/// Frame loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Upper clamp for the per-frame delta in milliseconds
    pub max_delta_ms: f64,
    /// Lower clamp for the per-frame delta in milliseconds
    pub min_delta_ms: f64,
    /// Delta assumed on the first tick after the loop wakes (60Hz)
    pub default_delta_ms: f64,
}

/// Spring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    /// Duration used when a spring is defined by `bounce` only
    pub duration_ms: f64,
    pub bounce: f64,
    /// Total travel below this distance counts as "granular"
    pub granular_threshold: f64,
    pub rest_speed: f64,
    pub rest_delta: f64,
    pub granular_rest_speed: f64,
    pub granular_rest_delta: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub min_damping: f64,
    pub max_damping: f64,
}

/// Inertia configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InertiaConfig {
    pub power: f64,
    pub time_constant_ms: f64,
    pub bounce_stiffness: f64,
    pub bounce_damping: f64,
    pub rest_delta: f64,
}

/// Generator probing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Longest a generator is probed before it is considered infinite
    pub max_duration_ms: f64,
    /// Probe step when estimating an unknown duration
    pub probe_step_ms: f64,
    /// Window used to estimate a generator's instantaneous velocity
    pub velocity_sample_ms: f64,
    /// Sampling step when pre-generating keyframes for a native timeline
    pub pregenerate_step_ms: f64,
}

/// Velocity tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// A reactive value updated longer ago than this reports zero velocity
    pub max_value_age_ms: f64,
    /// Trailing window of pointer history used for release velocity
    pub pan_window_ms: f64,
}

/// Drag configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Offset a pointer must travel before a pan starts
    pub deadzone: f64,
    pub direction_lock_threshold: f64,
    pub default_elastic: f64,
    pub time_constant_ms: f64,
    pub rest_delta: f64,
    pub rest_speed: f64,
    pub elastic_bounce_stiffness: f64,
    pub elastic_bounce_damping: f64,
    pub rigid_bounce_stiffness: f64,
    pub rigid_bounce_damping: f64,
}

/// Layout animation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Default layout transition duration in milliseconds
    pub duration_ms: f64,
    /// Default layout transition cubic-bezier points
    pub ease: [f64; 4],
    /// Snap layout animations to their end state
    pub reduced_motion: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_delta_ms: 40.0,
            min_delta_ms: 1.0,
            default_delta_ms: 1000.0 / 60.0,
        }
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 100.0,
            damping: 10.0,
            mass: 1.0,
            duration_ms: 800.0,
            bounce: 0.3,
            granular_threshold: 5.0,
            rest_speed: 2.0,
            rest_delta: 0.5,
            granular_rest_speed: 0.01,
            granular_rest_delta: 0.005,
            min_duration_ms: 10.0,
            max_duration_ms: 10_000.0,
            min_damping: 0.05,
            max_damping: 1.0,
        }
    }
}

impl Default for InertiaConfig {
    fn default() -> Self {
        Self {
            power: 0.8,
            time_constant_ms: 325.0,
            bounce_stiffness: 500.0,
            bounce_damping: 10.0,
            rest_delta: 0.5,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: 20_000.0,
            probe_step_ms: 50.0,
            velocity_sample_ms: 5.0,
            pregenerate_step_ms: 10.0,
        }
    }
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            max_value_age_ms: 30.0,
            pan_window_ms: 100.0,
        }
    }
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            deadzone: 3.0,
            direction_lock_threshold: 10.0,
            default_elastic: 0.35,
            time_constant_ms: 750.0,
            rest_delta: 1.0,
            rest_speed: 10.0,
            elastic_bounce_stiffness: 200.0,
            elastic_bounce_damping: 40.0,
            rigid_bounce_stiffness: 1_000_000.0,
            rigid_bounce_damping: 10_000_000.0,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            duration_ms: 450.0,
            ease: [0.4, 0.0, 0.1, 1.0],
            reduced_motion: false,
        }
    }
}

impl GlideConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from `glide.toml` in the current directory,
    /// or return the defaults if the file is missing or malformed
    pub fn load_or_default() -> Self {
        Self::load_from_file("glide.toml").unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        if let Some(val) = env_f64("GLIDE_MAX_FRAME_DELTA") {
            self.frame.max_delta_ms = val;
        }
        if let Some(val) = env_f64("GLIDE_GRANULAR_THRESHOLD") {
            self.spring.granular_threshold = val;
        }
        if let Some(val) = env_f64("GLIDE_DRAG_DEADZONE") {
            self.drag.deadzone = val;
        }
        if let Some(val) = env_f64("GLIDE_DRAG_ELASTIC") {
            self.drag.default_elastic = val.clamp(0.0, 1.0);
        }
        if let Some(val) = env_f64("GLIDE_LAYOUT_DURATION") {
            self.layout.duration_ms = val;
        }
        if let Ok(val) = std::env::var("GLIDE_REDUCED_MOTION") {
            self.layout.reduced_motion = val == "1" || val.eq_ignore_ascii_case("true");
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from glide.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok()?.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GlideConfig::default();
        assert_eq!(config.frame.max_delta_ms, 40.0);
        assert_eq!(config.spring.granular_threshold, 5.0);
        assert_eq!(config.generator.max_duration_ms, 20_000.0);
        assert_eq!(config.drag.deadzone, 3.0);
        assert_eq!(config.layout.ease, [0.4, 0.0, 0.1, 1.0]);
    }

    #[test]
    fn test_toml_serialization() {
        let config = GlideConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: GlideConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed: GlideConfig = toml::from_str(
            r#"
            [frame]
            max_delta_ms = 50.0

            [drag]
            deadzone = 6.0
            "#,
        )
        .unwrap();
        assert_eq!(parsed.frame.max_delta_ms, 50.0);
        assert_eq!(parsed.frame.min_delta_ms, 1.0);
        assert_eq!(parsed.drag.deadzone, 6.0);
        assert_eq!(parsed.drag.default_elastic, 0.35);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = GlideConfig::load_from_file("definitely/not/here/glide.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_load_or_default() {
        let config = GlideConfig::load_or_default();
        assert!(config.frame.max_delta_ms > 0.0);
    }

    #[test]
    fn test_merge_with_env() {
        unsafe {
            std::env::set_var("GLIDE_DRAG_DEADZONE", "8");
            std::env::set_var("GLIDE_REDUCED_MOTION", "true");
        }

        let mut config = GlideConfig::default();
        config.merge_with_env();

        assert_eq!(config.drag.deadzone, 8.0);
        assert!(config.layout.reduced_motion);

        unsafe {
            std::env::remove_var("GLIDE_DRAG_DEADZONE");
            std::env::remove_var("GLIDE_REDUCED_MOTION");
        }
    }
}
