// src/main.rs - Simulated session driving the hand anchor pipeline
use anyhow::{Context, Result};
use hand_anchors::{
    ArFrame, ArSession, DepthBuffer, DepthBufferSelection, DetectionExecutor, DisplayTransform, HandJoint,
    HandObservation, HandTrackingSystem, InMemoryScene, KeypointError, KeypointService, PinholeCamera, Ray,
    SceneGraph, TrackerConfig,
};
use image::DynamicImage;
use nalgebra::{Point2, Point3, Vector2};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VIEWPORT: (f32, f32) = (640.0, 480.0);
const HAND_DEPTH: f32 = 0.45;
const FRAMES: u32 = 180;

/// A hand held flat in front of the camera, drifting in a slow circle.
fn synthetic_hand(phase: f32) -> Vec<(HandJoint, Point3<f32>)> {
    let center = Point3::new(0.05 * phase.cos(), 0.05 * phase.sin(), -HAND_DEPTH);
    let mut joints = vec![(HandJoint::Wrist, center + nalgebra::Vector3::new(0.0, -0.08, 0.0))];

    let fingers = [
        [HandJoint::ThumbCmc, HandJoint::ThumbMp, HandJoint::ThumbIp, HandJoint::ThumbTip],
        [HandJoint::IndexMcp, HandJoint::IndexPip, HandJoint::IndexDip, HandJoint::IndexTip],
        [HandJoint::MiddleMcp, HandJoint::MiddlePip, HandJoint::MiddleDip, HandJoint::MiddleTip],
        [HandJoint::RingMcp, HandJoint::RingPip, HandJoint::RingDip, HandJoint::RingTip],
        [HandJoint::LittleMcp, HandJoint::LittlePip, HandJoint::LittleDip, HandJoint::LittleTip],
    ];
    for (finger, chain) in fingers.iter().enumerate() {
        let x = -0.04 + 0.02 * finger as f32;
        for (segment, joint) in chain.iter().enumerate() {
            joints.push((*joint, center + nalgebra::Vector3::new(x, 0.025 * segment as f32, 0.0)));
        }
    }
    joints
}

/// Keypoint model stand-in: projects the synthetic hand for each request.
struct SyntheticKeypoints {
    camera: PinholeCamera,
    requests: AtomicU64,
}

impl KeypointService for SyntheticKeypoints {
    fn detect_hands(&self, _image: &DynamicImage, max_hands: usize) -> Result<Vec<HandObservation>, KeypointError> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst);
        if max_hands == 0 {
            return Err(KeypointError::NoObservation);
        }

        // Simulated model latency.
        std::thread::sleep(Duration::from_millis(8));

        let observation = synthetic_hand(request as f32 * 0.05)
            .into_iter()
            .filter_map(|(joint, world)| {
                let screen = self.camera.project(&world)?;
                Some((joint, Point2::new(screen.x / VIEWPORT.0, screen.y / VIEWPORT.1)))
            })
            .fold(HandObservation::new(), |obs, (joint, point)| obs.with_image_point(joint, point, 0.9));

        Ok(vec![observation])
    }
}

struct SimulatedSession {
    camera: PinholeCamera,
    depth: Arc<DepthBuffer>,
    frame: Mutex<Option<Arc<ArFrame>>>,
}

impl SimulatedSession {
    fn new(camera: PinholeCamera) -> Self {
        Self {
            camera,
            depth: Arc::new(DepthBuffer::filled(64, 48, HAND_DEPTH)),
            frame: Mutex::new(None),
        }
    }

    /// Publishes the next camera frame.
    fn advance(&self) {
        let frame = ArFrame::new(
            Arc::new(DynamicImage::new_rgb8(64, 48)),
            DisplayTransform::identity(Vector2::new(VIEWPORT.0, VIEWPORT.1)),
        )
        .with_depth(DepthBufferSelection::SmoothedSceneDepth, Arc::clone(&self.depth));

        match self.frame.lock() {
            Ok(mut slot) => *slot = Some(Arc::new(frame)),
            Err(e) => warn!("Frame slot poisoned: {}", e),
        }
    }
}

impl ArSession for SimulatedSession {
    fn current_frame(&self) -> Option<Arc<ArFrame>> {
        self.frame.lock().ok().and_then(|slot| slot.clone())
    }

    fn ray_through(&self, screen: Point2<f32>) -> Option<Ray> {
        self.camera.ray_through(screen)
    }

    fn supports_depth(&self, selection: DepthBufferSelection) -> bool {
        selection != DepthBufferSelection::SceneDepth
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TrackerConfig::load(&path).with_context(|| format!("Failed to load tracker config from {}", path))?,
        None => TrackerConfig::default(),
    };

    let camera = PinholeCamera::new(500.0, Point2::new(VIEWPORT.0 / 2.0, VIEWPORT.1 / 2.0));
    let session = SimulatedSession::new(camera);
    let mut scene = InMemoryScene::new();

    let service = Arc::new(SyntheticKeypoints {
        camera,
        requests: AtomicU64::new(0),
    });
    let mut system = HandTrackingSystem::new(service, DetectionExecutor::Background(tokio::runtime::Handle::current()));

    let tracker = system
        .create_hand_tracker(config, &session, &mut scene)
        .context("Failed to create hand tracker")?;

    let pointer = scene.spawn();
    system
        .attach(tracker, &mut scene, pointer, HandJoint::IndexTip)
        .context("Failed to attach pointer")?;

    let mut interval = tokio::time::interval(Duration::from_millis(33));
    for frame in 0..FRAMES {
        interval.tick().await;
        session.advance();

        let report = system.update(&session, &mut scene);
        if frame % 30 != 0 {
            continue;
        }

        let Some(hand) = system.tracker(tracker) else { break };
        let anchor = hand.anchor_transform().translation.vector;
        let tip = scene.world_transform(pointer).map(|t| t.translation.vector);
        info!(
            frame,
            recognized = hand.is_hand_recognized(),
            passes = hand.passes(),
            reconstructed = report.reconstructed.len(),
            "anchor at ({:.3}, {:.3}, {:.3}), index tip at {:?}",
            anchor.x,
            anchor.y,
            anchor.z,
            tip.map(|t| (t.x, t.y, t.z))
        );
    }

    system.destroy(tracker, &mut scene);
    info!(live_entities = scene.live_count(), "Session finished");
    Ok(())
}
