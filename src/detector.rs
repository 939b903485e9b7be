// src/detector.rs - Rate-limited 2D hand detection shared by all trackers
use crate::anchor::TrackerId;
use crate::config::unit_interval;
use crate::error::{DetectionError, KeypointError, TrackingError};
use crate::joints::{HandJoint, JOINT_COUNT};
use crate::keypoint_bridge::{HandObservation, KeypointService};
use crate::session::{ArFrame, DisplayTransform};
use image::DynamicImage;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// How often the keypoint request runs. Slower rates trade smoothness for
/// CPU time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestRate {
    #[default]
    EveryFrame,
    Half,
    Quarter,
}

impl RequestRate {
    pub fn divisor(self) -> u32 {
        match self {
            RequestRate::EveryFrame => 1,
            RequestRate::Half => 2,
            RequestRate::Quarter => 4,
        }
    }

    pub fn faster(self, other: RequestRate) -> RequestRate {
        if other.divisor() < self.divisor() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameRateRegulator {
    rate: RequestRate,
    frame: u32,
}

impl FrameRateRegulator {
    pub fn new(rate: RequestRate) -> Self {
        Self { rate, frame: 1 }
    }

    pub fn rate(&self) -> RequestRate {
        self.rate
    }

    pub fn set_rate(&mut self, rate: RequestRate) {
        self.rate = rate;
    }

    /// Counts one frame; true when a request is due.
    pub fn can_continue(&mut self) -> bool {
        // `>=` so that switching to a faster rate mid-count cannot stall.
        if self.frame >= self.rate.divisor() {
            self.frame = 1;
            true
        } else {
            self.frame += 1;
            false
        }
    }
}

impl Default for FrameRateRegulator {
    fn default() -> Self {
        Self::new(RequestRate::EveryFrame)
    }
}

/// Last accepted detection of one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPosition2D {
    /// On-screen position in viewport points.
    pub screen: Point2<f32>,
    /// Normalized image position, top-left origin.
    pub normalized: Point2<f32>,
    pub confidence: f32,
    /// Capture time of the frame the detection ran on.
    pub detected_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPhase {
    Idle,
    Detecting,
    Recognized,
    NotRecognized,
}

/// Recognition flags with a one-way "ever recognized" latch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingState {
    ever_recognized: bool,
    currently_recognized: bool,
}

impl TrackingState {
    pub fn ever_recognized(&self) -> bool {
        self.ever_recognized
    }

    pub fn currently_recognized(&self) -> bool {
        self.currently_recognized
    }

    fn mark_recognized(&mut self) {
        self.currently_recognized = true;
        self.ever_recognized = true;
    }

    fn mark_lost(&mut self) {
        self.currently_recognized = false;
    }
}

/// Per-tracker 2D state written by the detector.
#[derive(Debug, Clone)]
pub struct Hand2D {
    confidence_threshold: f32,
    state: TrackingState,
    phase: DetectionPhase,
    /// Phase to fall back to if a detection ends without an answer.
    settled_phase: DetectionPhase,
    positions: [Option<JointPosition2D>; JOINT_COUNT],
}

impl Hand2D {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            state: TrackingState::default(),
            phase: DetectionPhase::Idle,
            settled_phase: DetectionPhase::Idle,
            positions: [None; JOINT_COUNT],
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn set_confidence_threshold(&mut self, value: f32) -> Result<(), TrackingError> {
        unit_interval("confidence_threshold", value).map_err(|_| TrackingError::InvalidConfidenceThreshold(value))?;
        self.confidence_threshold = value;
        Ok(())
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn phase(&self) -> DetectionPhase {
        self.phase
    }

    pub fn position(&self, joint: HandJoint) -> Option<&JointPosition2D> {
        self.positions[joint.index()].as_ref()
    }

    pub(crate) fn mark_detecting(&mut self) {
        if self.phase != DetectionPhase::Detecting {
            self.settled_phase = self.phase;
        }
        self.phase = DetectionPhase::Detecting;
    }

    /// The pending detection failed without saying anything about the hand.
    pub(crate) fn abandon_detecting(&mut self) {
        if self.phase == DetectionPhase::Detecting {
            self.phase = self.settled_phase;
        }
    }

    pub(crate) fn mark_not_recognized(&mut self) {
        self.state.mark_lost();
        self.phase = DetectionPhase::NotRecognized;
    }

    /// Moves every joint that clears the threshold; the rest keep their last
    /// position. Returns whether any joint cleared it.
    pub(crate) fn apply_observation(
        &mut self,
        observation: &HandObservation,
        display: &DisplayTransform,
        detected_at: Instant,
    ) -> bool {
        let mut above_threshold = false;

        for (joint, point) in &observation.points {
            if point.confidence <= self.confidence_threshold {
                continue;
            }
            above_threshold = true;

            let normalized = point.image_point();
            self.positions[joint.index()] = Some(JointPosition2D {
                screen: display.to_screen(normalized),
                normalized,
                confidence: point.confidence,
                detected_at,
            });
        }

        if above_threshold {
            self.state.mark_recognized();
            self.phase = DetectionPhase::Recognized;
        } else {
            self.mark_not_recognized();
        }

        above_threshold
    }
}

/// A finished detection waiting in the mailbox for the next tick.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    /// Active trackers at submission, in pairing order.
    pub trackers: Vec<TrackerId>,
    pub display: DisplayTransform,
    pub captured_at: Instant,
    pub outcome: Result<Vec<HandObservation>, DetectionError>,
}

/// Where the keypoint request runs.
#[derive(Debug, Clone)]
pub enum DetectionExecutor {
    /// On the calling thread. The result is in the mailbox when `submit` returns.
    Inline,
    /// On tokio's blocking pool. The result shows up on a later tick.
    Background(tokio::runtime::Handle),
}

type Mailbox = Arc<Mutex<Option<DetectionReport>>>;

/// The single detector behind every tracker of a `HandTrackingSystem`.
pub struct HandDetector {
    service: Arc<dyn KeypointService>,
    regulator: FrameRateRegulator,
    in_flight: Arc<AtomicBool>,
    mailbox: Mailbox,
    executor: DetectionExecutor,
}

impl HandDetector {
    pub fn new(service: Arc<dyn KeypointService>, executor: DetectionExecutor) -> Self {
        Self {
            service,
            regulator: FrameRateRegulator::default(),
            in_flight: Arc::new(AtomicBool::new(false)),
            mailbox: Arc::new(Mutex::new(None)),
            executor,
        }
    }

    pub fn request_rate(&self) -> RequestRate {
        self.regulator.rate()
    }

    pub fn set_request_rate(&mut self, rate: RequestRate) {
        self.regulator.set_rate(rate);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Starts a request for `trackers.len()` hands if one is due and none is
    /// running. Never waits for the result.
    pub fn submit(&mut self, frame: &ArFrame, trackers: Vec<TrackerId>) -> Result<(), DetectionError> {
        if !self.regulator.can_continue() {
            return Err(DetectionError::FrameRateThrottled);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DetectionError::RequestInFlight);
        }

        let job = DetectionJob {
            service: Arc::clone(&self.service),
            image: Arc::clone(&frame.image),
            report_to: Arc::clone(&self.mailbox),
            guard: InFlightGuard(Arc::clone(&self.in_flight)),
            trackers,
            display: frame.display,
            captured_at: frame.captured_at,
        };

        match &self.executor {
            DetectionExecutor::Inline => job.run(),
            DetectionExecutor::Background(handle) => {
                handle.spawn_blocking(move || job.run());
            }
        }

        Ok(())
    }

    /// Takes the most recent finished detection, if any.
    pub fn take_report(&self) -> Option<DetectionReport> {
        match self.mailbox.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Clears the in-flight flag however the job ends, panics included.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct DetectionJob {
    service: Arc<dyn KeypointService>,
    image: Arc<DynamicImage>,
    report_to: Mailbox,
    guard: InFlightGuard,
    trackers: Vec<TrackerId>,
    display: DisplayTransform,
    captured_at: Instant,
}

impl DetectionJob {
    fn run(self) {
        let outcome = match self.service.detect_hands(&self.image, self.trackers.len()) {
            Ok(hands) if hands.is_empty() => Err(DetectionError::NoHandsDetected),
            Ok(hands) => Ok(hands),
            Err(KeypointError::NoObservation) => Err(DetectionError::NoHandsDetected),
            Err(KeypointError::Busy) => Err(DetectionError::RequestInFlight),
            Err(e) => {
                warn!("Keypoint request failed: {}", e);
                Err(DetectionError::Service(e))
            }
        };

        debug!(
            hands = outcome.as_ref().map(|h| h.len()).unwrap_or(0),
            trackers = self.trackers.len(),
            "detection finished"
        );

        let report = DetectionReport {
            trackers: self.trackers,
            display: self.display,
            captured_at: self.captured_at,
            outcome,
        };

        match self.report_to.lock() {
            Ok(mut slot) => *slot = Some(report),
            Err(poisoned) => *poisoned.into_inner() = Some(report),
        }

        drop(self.guard);
    }
}
