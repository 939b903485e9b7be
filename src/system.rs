// src/system.rs - Per-frame driver for every active hand tracker
use crate::anchor::{Attachment, HandAnchor, TrackerId};
use crate::config::TrackerConfig;
use crate::detector::{DetectionExecutor, DetectionReport, HandDetector, RequestRate};
use crate::error::{DetectionError, TrackingError};
use crate::joints::HandJoint;
use crate::keypoint_bridge::KeypointService;
use crate::scene::{EntityId, SceneGraph};
use crate::session::{ArSession, DepthBufferSelection};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// What happened during one `update` call.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub frame_available: bool,
    /// Outcome of this tick's submission attempt. `None` when nothing was
    /// submitted (no frame, no trackers).
    pub submission: Option<Result<(), DetectionError>>,
    /// Outcome of the detection result applied this tick, if one was ready.
    pub applied: Option<Result<usize, DetectionError>>,
    pub reconstructed: Vec<TrackerId>,
}

impl TickReport {
    fn skipped() -> Self {
        Self {
            frame_available: false,
            submission: None,
            applied: None,
            reconstructed: Vec::new(),
        }
    }
}

/// Owns the shared detector and the ordered list of hand trackers.
pub struct HandTrackingSystem {
    detector: HandDetector,
    trackers: Vec<HandAnchor>,
    ticks: u64,
}

impl HandTrackingSystem {
    pub fn new(service: Arc<dyn KeypointService>, executor: DetectionExecutor) -> Self {
        Self {
            detector: HandDetector::new(service, executor),
            trackers: Vec::new(),
            ticks: 0,
        }
    }

    pub fn detector(&self) -> &HandDetector {
        &self.detector
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Registers a new hand tracker. It stays idle until a hand is first
    /// recognized. Fails if the session cannot supply the requested depth.
    pub fn create_hand_tracker(
        &mut self,
        config: TrackerConfig,
        session: &dyn ArSession,
        scene: &mut dyn SceneGraph,
    ) -> Result<TrackerId, TrackingError> {
        config.validate()?;

        let depth_selection = match config.depth_buffer {
            Some(selection) if session.supports_depth(selection) => selection,
            Some(selection) => return Err(TrackingError::UnsupportedConfiguration(selection)),
            None => default_depth_selection(session)?,
        };

        if let Some(rate) = config.request_rate {
            let shared = self.detector.request_rate().faster(rate);
            self.detector.set_request_rate(shared);
        }

        let tracker = HandAnchor::new(&config, depth_selection, scene);
        let id = tracker.id();
        self.trackers.push(tracker);

        info!(tracker = %id, ?depth_selection, "hand tracker created");
        Ok(id)
    }

    /// Detaches everything and drops the tracker from future ticks. An
    /// in-flight detection is left to finish; its result for this tracker is
    /// discarded. Calling it again is a no-op.
    pub fn destroy(&mut self, id: TrackerId, scene: &mut dyn SceneGraph) {
        if let Some(index) = self.trackers.iter().position(|t| t.id() == id) {
            let mut tracker = self.trackers.remove(index);
            tracker.destroy(scene);
        }
    }

    pub fn tracker(&self, id: TrackerId) -> Option<&HandAnchor> {
        self.trackers.iter().find(|t| t.id() == id)
    }

    pub fn tracker_mut(&mut self, id: TrackerId) -> Option<&mut HandAnchor> {
        self.trackers.iter_mut().find(|t| t.id() == id)
    }

    fn require(&mut self, id: TrackerId) -> Result<&mut HandAnchor, TrackingError> {
        self.tracker_mut(id).ok_or(TrackingError::UnknownTracker(id.as_uuid()))
    }

    /// Tracker ids in detection pairing order.
    pub fn tracker_ids(&self) -> Vec<TrackerId> {
        self.trackers.iter().map(|t| t.id()).collect()
    }

    pub fn attach(
        &mut self,
        id: TrackerId,
        scene: &mut dyn SceneGraph,
        consumer: EntityId,
        joint: HandJoint,
    ) -> Result<Attachment, TrackingError> {
        self.require(id)?.attach(scene, consumer, joint)
    }

    pub fn detach(&mut self, id: TrackerId, scene: &mut dyn SceneGraph, joint: HandJoint) -> Result<(), TrackingError> {
        self.require(id)?.detach(scene, joint);
        Ok(())
    }

    pub fn set_confidence_threshold(&mut self, id: TrackerId, value: f32) -> Result<(), TrackingError> {
        self.require(id)?.set_confidence_threshold(value)
    }

    /// Sets the detection cadence for every tracker of this system. The last
    /// call wins.
    pub fn set_detection_rate(&mut self, rate: RequestRate) {
        self.detector.set_request_rate(rate);
    }

    pub fn detection_rate(&self) -> RequestRate {
        self.detector.request_rate()
    }

    pub fn is_hand_recognized(&self, id: TrackerId) -> bool {
        self.tracker(id).map(|t| t.is_hand_recognized()).unwrap_or(false)
    }

    pub fn was_ever_recognized(&self, id: TrackerId) -> bool {
        self.tracker(id).map(|t| t.was_ever_recognized()).unwrap_or(false)
    }

    /// One frame: submit detection, apply the latest finished detection,
    /// then reconstruct and propagate every tracker.
    pub fn update(&mut self, session: &dyn ArSession, scene: &mut dyn SceneGraph) -> TickReport {
        let Some(frame) = session.current_frame() else {
            trace!("no camera frame, skipping tick");
            return TickReport::skipped();
        };
        self.ticks += 1;

        let submission = if self.trackers.is_empty() {
            None
        } else {
            let ids = self.tracker_ids();
            let result = self.detector.submit(&frame, ids.clone());
            match &result {
                Ok(()) => {
                    for tracker in self.trackers.iter_mut() {
                        tracker.hand2d_mut().mark_detecting();
                    }
                }
                Err(e) => trace!("detection skipped: {}", e),
            }
            Some(result)
        };

        let applied = self.detector.take_report().map(|report| self.apply_report(report));

        let mut reconstructed = Vec::new();
        for tracker in self.trackers.iter_mut() {
            let Some(depth) = frame.depth(tracker.depth_selection()) else {
                debug!(tracker = %tracker.id(), "frame has no {:?} buffer", tracker.depth_selection());
                continue;
            };

            if tracker.reconstruct(depth, |screen| session.ray_through(screen)) {
                reconstructed.push(tracker.id());
            }
            tracker.propagate(scene);
        }

        TickReport {
            frame_available: true,
            submission,
            applied,
            reconstructed,
        }
    }

    /// Pairs observations with the trackers that were active at submission,
    /// by position. Trackers destroyed since then are skipped; trackers past
    /// the last returned hand lost theirs.
    fn apply_report(&mut self, report: DetectionReport) -> Result<usize, DetectionError> {
        match report.outcome {
            Ok(observations) => {
                let mut applied = 0;
                for (slot, id) in report.trackers.iter().enumerate() {
                    let Some(tracker) = self.tracker_mut(*id) else {
                        debug!(tracker = %id, "discarding detection for destroyed tracker");
                        continue;
                    };
                    match observations.get(slot) {
                        Some(observation) => {
                            tracker
                                .hand2d_mut()
                                .apply_observation(observation, &report.display, report.captured_at);
                            applied += 1;
                        }
                        None => tracker.hand2d_mut().mark_not_recognized(),
                    }
                }
                Ok(applied)
            }
            Err(DetectionError::NoHandsDetected) => {
                for tracker in self.trackers.iter_mut() {
                    tracker.hand2d_mut().mark_not_recognized();
                }
                Err(DetectionError::NoHandsDetected)
            }
            Err(e) => {
                for id in &report.trackers {
                    if let Some(tracker) = self.tracker_mut(*id) {
                        tracker.hand2d_mut().abandon_detecting();
                    }
                }
                Err(e)
            }
        }
    }
}

/// Smoothed scene depth when available, otherwise the depth that comes with
/// person segmentation.
fn default_depth_selection(session: &dyn ArSession) -> Result<DepthBufferSelection, TrackingError> {
    [
        DepthBufferSelection::SmoothedSceneDepth,
        DepthBufferSelection::PersonSegmentationWithDepth,
    ]
    .into_iter()
    .find(|selection| session.supports_depth(*selection))
    .ok_or(TrackingError::DepthNotSupported)
}
