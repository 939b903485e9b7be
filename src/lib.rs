// src/lib.rs
//! Turns 2D hand keypoints plus a per-pixel depth map into smoothed 3D joint
//! transforms, and keeps attached scene entities following those joints.
//!
//! A [`HandTrackingSystem`] owns one rate-limited [`HandDetector`] and any
//! number of [`HandAnchor`] trackers. Call [`HandTrackingSystem::update`] once
//! per camera frame.

pub mod anchor;
pub mod config;
pub mod depth;
pub mod detector;
pub mod error;
pub mod joints;
pub mod keypoint_bridge;
pub mod scene;
pub mod session;
pub mod system;
pub mod tracking;

pub use anchor::{Attachment, HandAnchor, TrackerId};
pub use config::{SmoothingConfig, TrackerConfig};
pub use depth::{DepthBuffer, PixelFormat};
pub use detector::{DetectionExecutor, DetectionPhase, Hand2D, HandDetector, RequestRate};
pub use error::{ConfigError, DepthError, DetectionError, KeypointError, TrackingError};
pub use joints::HandJoint;
pub use keypoint_bridge::{HandObservation, KeypointService, RecognizedPoint, ScriptedKeypointService};
pub use scene::{EntityId, InMemoryScene, SceneGraph};
pub use session::{ArFrame, ArSession, DepthBufferSelection, DisplayTransform, PinholeCamera, Ray};
pub use system::{HandTrackingSystem, TickReport};
pub use tracking::{HandReconstructor, JointTransform};
