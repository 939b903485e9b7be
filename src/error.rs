// src/error.rs
use crate::session::DepthBufferSelection;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DepthError {
    #[error("depth buffer is not single-channel f32 depth (found {0:?})")]
    DepthUnavailable(crate::depth::PixelFormat),

    #[error("normalized point ({x}, {y}) maps outside the {width}x{height} depth buffer")]
    OutOfBounds {
        x: f32,
        y: f32,
        width: usize,
        height: usize,
    },

    #[error("depth buffer lock was poisoned by a panicking writer")]
    LockPoisoned,

    #[error("depth buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Failures reported by a keypoint service implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeypointError {
    #[error("no hand observation in image")]
    NoObservation,

    #[error("keypoint service is still processing a previous image")]
    Busy,

    #[error("keypoint request failed: {0}")]
    Failed(String),
}

/// Routine per-tick outcomes of a detection attempt. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("a detection request is already in flight")]
    RequestInFlight,

    #[error("detection not due this frame")]
    FrameRateThrottled,

    #[error("no hands detected")]
    NoHandsDetected,

    #[error(transparent)]
    Service(#[from] KeypointError),
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("depth buffer selection {0:?} is not supported by this session")]
    UnsupportedConfiguration(DepthBufferSelection),

    #[error("session provides no depth data for hand tracking")]
    DepthNotSupported,

    #[error("confidence threshold {0} is outside 0.0..=1.0")]
    InvalidConfidenceThreshold(f32),

    #[error("unknown hand tracker {0}")]
    UnknownTracker(uuid::Uuid),

    #[error("consumer entity {0:?} is not alive")]
    ConsumerNotAlive(crate::scene::EntityId),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be within 0.0..=1.0, got {value}")]
    OutOfRange { field: &'static str, value: f32 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },
}
