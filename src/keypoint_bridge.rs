// src/keypoint_bridge.rs - Boundary to the external 2D hand keypoint model
use crate::error::KeypointError;
use crate::joints::HandJoint;
use image::DynamicImage;
use nalgebra::Point2;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A keypoint as the model reports it: normalized, lower-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizedPoint {
    pub location: Point2<f32>,
    pub confidence: f32,
}

impl RecognizedPoint {
    /// Converts to normalized image space (top-left origin).
    pub fn image_point(&self) -> Point2<f32> {
        Point2::new(self.location.x, 1.0 - self.location.y)
    }
}

/// One detected hand. Joints the model could not place are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandObservation {
    pub points: HashMap<HandJoint, RecognizedPoint>,
}

impl HandObservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a joint given in normalized image space (top-left origin).
    pub fn with_image_point(mut self, joint: HandJoint, image_point: Point2<f32>, confidence: f32) -> Self {
        self.points.insert(
            joint,
            RecognizedPoint {
                location: Point2::new(image_point.x, 1.0 - image_point.y),
                confidence,
            },
        );
        self
    }
}

/// A hand keypoint model. Implementations are called from a worker thread.
pub trait KeypointService: Send + Sync {
    /// Detects up to `max_hands` hands. `NoObservation` or an empty vector
    /// both mean no hand was found.
    fn detect_hands(&self, image: &DynamicImage, max_hands: usize) -> Result<Vec<HandObservation>, KeypointError>;
}

/// Replays a fixed sequence of responses, one per call. Once exhausted every
/// call reports `NoObservation`.
#[derive(Debug, Default)]
pub struct ScriptedKeypointService {
    responses: Mutex<VecDeque<Result<Vec<HandObservation>, KeypointError>>>,
    calls: AtomicUsize,
}

impl ScriptedKeypointService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_responses(responses: impl IntoIterator<Item = Result<Vec<HandObservation>, KeypointError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, response: Result<Vec<HandObservation>, KeypointError>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
    }

    pub fn push_hands(&self, hands: Vec<HandObservation>) {
        self.push(Ok(hands));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeypointService for ScriptedKeypointService {
    fn detect_hands(&self, _image: &DynamicImage, max_hands: usize) -> Result<Vec<HandObservation>, KeypointError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self
            .responses
            .lock()
            .map_err(|_| KeypointError::Failed("scripted response queue poisoned".into()))?
            .pop_front();

        match next {
            Some(Ok(mut hands)) => {
                hands.truncate(max_hands);
                Ok(hands)
            }
            Some(Err(e)) => Err(e),
            None => Err(KeypointError::NoObservation),
        }
    }
}
