// src/config.rs
use crate::detector::RequestRate;
use crate::error::ConfigError;
use crate::session::DepthBufferSelection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Joints must score strictly above this to move.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Detection cadence this tracker asks for. The detector is shared, so the
    /// fastest rate requested by any tracker wins.
    #[serde(default)]
    pub request_rate: Option<RequestRate>,
    /// `None` picks smoothed scene depth when the session has it, otherwise
    /// person-segmentation depth.
    #[serde(default)]
    pub depth_buffer: Option<DepthBufferSelection>,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Meters a raw sample may stray from the reference joint's depth.
    #[serde(default = "default_depth_tolerance")]
    pub depth_tolerance: f32,
    /// A cached depth this close to the reference is trusted over an outlier.
    #[serde(default = "default_previous_depth_tolerance")]
    pub previous_depth_tolerance: f32,
    /// Pull of the cached depth on an accepted sample.
    #[serde(default = "default_depth_blend")]
    pub depth_blend: f32,
    #[serde(default = "default_joint_slerp")]
    pub joint_slerp: f32,
    #[serde(default = "default_anchor_slerp")]
    pub anchor_slerp: f32,
}

fn default_confidence_threshold() -> f32 {
    0.4
}

fn default_depth_tolerance() -> f32 {
    0.1
}

fn default_previous_depth_tolerance() -> f32 {
    0.11
}

fn default_depth_blend() -> f32 {
    0.2
}

fn default_joint_slerp() -> f32 {
    0.5
}

fn default_anchor_slerp() -> f32 {
    0.6
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            request_rate: None,
            depth_buffer: None,
            smoothing: SmoothingConfig::default(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            depth_tolerance: default_depth_tolerance(),
            previous_depth_tolerance: default_previous_depth_tolerance(),
            depth_blend: default_depth_blend(),
            joint_slerp: default_joint_slerp(),
            anchor_slerp: default_anchor_slerp(),
        }
    }
}

impl TrackerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: TrackerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("confidence_threshold", self.confidence_threshold)?;
        self.smoothing.validate()
    }
}

impl SmoothingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("depth_tolerance", self.depth_tolerance)?;
        positive("previous_depth_tolerance", self.previous_depth_tolerance)?;
        unit_interval("depth_blend", self.depth_blend)?;
        unit_interval("joint_slerp", self.joint_slerp)?;
        unit_interval("anchor_slerp", self.anchor_slerp)
    }
}

pub(crate) fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}
