// src/anchor.rs - Per-hand anchor: tracking state, joint transforms, attached content
use crate::config::TrackerConfig;
use crate::depth::DepthBuffer;
use crate::detector::{DetectionPhase, Hand2D};
use crate::error::{DepthError, TrackingError};
use crate::joints::{HandJoint, JOINT_COUNT};
use crate::scene::{EntityId, SceneGraph};
use crate::session::{DepthBufferSelection, Ray};
use crate::tracking::{HandReconstructor, JointTransform, ReconstructionPass};
use nalgebra::{Isometry3, Point2};
use std::fmt;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Handle to a hand tracker registered with a `HandTrackingSystem`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerId(Uuid);

impl TrackerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TrackerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Attached,
    /// The consumer already follows a joint of this hand; nothing changed.
    AlreadyAttached,
}

pub struct HandAnchor {
    id: TrackerId,
    root: EntityId,
    depth_selection: DepthBufferSelection,
    hand2d: Hand2D,
    reconstructor: HandReconstructor,
    anchor_transform: Isometry3<f32>,
    joint_transforms: [JointTransform; JOINT_COUNT],
    consumers: [Vec<EntityId>; JOINT_COUNT],
    passes: u64,
    depth_format_reported: bool,
}

impl HandAnchor {
    pub(crate) fn new(
        config: &TrackerConfig,
        depth_selection: DepthBufferSelection,
        scene: &mut dyn SceneGraph,
    ) -> Self {
        let root = scene.spawn();
        scene.set_local_transform(root, Isometry3::identity());

        Self {
            id: TrackerId::new(),
            root,
            depth_selection,
            hand2d: Hand2D::new(config.confidence_threshold),
            reconstructor: HandReconstructor::new(&config.smoothing),
            anchor_transform: Isometry3::identity(),
            joint_transforms: [JointTransform::identity(); JOINT_COUNT],
            consumers: Default::default(),
            passes: 0,
            depth_format_reported: false,
        }
    }

    pub fn id(&self) -> TrackerId {
        self.id
    }

    /// Scene entity carrying the anchor's world transform. Attached content
    /// hangs off it.
    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn depth_selection(&self) -> DepthBufferSelection {
        self.depth_selection
    }

    pub fn hand2d(&self) -> &Hand2D {
        &self.hand2d
    }

    pub(crate) fn hand2d_mut(&mut self) -> &mut Hand2D {
        &mut self.hand2d
    }

    pub fn reconstructor(&self) -> &HandReconstructor {
        &self.reconstructor
    }

    pub fn is_hand_recognized(&self) -> bool {
        self.hand2d.state().currently_recognized()
    }

    pub fn was_ever_recognized(&self) -> bool {
        self.hand2d.state().ever_recognized()
    }

    pub fn detection_phase(&self) -> DetectionPhase {
        self.hand2d.phase()
    }

    pub fn set_confidence_threshold(&mut self, value: f32) -> Result<(), TrackingError> {
        self.hand2d.set_confidence_threshold(value)
    }

    pub fn anchor_transform(&self) -> Isometry3<f32> {
        self.anchor_transform
    }

    /// Model-space transform of a joint, as last committed.
    pub fn joint_transform(&self, joint: HandJoint) -> JointTransform {
        self.joint_transforms[joint.index()]
    }

    pub fn joint_transforms(&self) -> &[JointTransform; JOINT_COUNT] {
        &self.joint_transforms
    }

    /// Completed reconstruction passes.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn consumers(&self, joint: HandJoint) -> &[EntityId] {
        &self.consumers[joint.index()]
    }

    fn joint_of(&self, consumer: EntityId) -> Option<HandJoint> {
        HandJoint::ALL
            .into_iter()
            .find(|joint| self.consumers[joint.index()].contains(&consumer))
    }

    /// Makes `consumer` follow `joint`. The consumer is parented to the
    /// anchor root, so moving the root carries it along.
    pub fn attach(
        &mut self,
        scene: &mut dyn SceneGraph,
        consumer: EntityId,
        joint: HandJoint,
    ) -> Result<Attachment, TrackingError> {
        if !scene.is_alive(consumer) {
            return Err(TrackingError::ConsumerNotAlive(consumer));
        }

        if let Some(existing) = self.joint_of(consumer) {
            warn!(
                tracker = %self.id,
                "Consumer {:?} is already attached to {}; ignoring attach to {}",
                consumer, existing, joint
            );
            return Ok(Attachment::AlreadyAttached);
        }

        scene.set_parent(consumer, Some(self.root));
        scene.set_local_transform(consumer, self.joint_transforms[joint.index()]);
        self.consumers[joint.index()].push(consumer);

        debug!(tracker = %self.id, %joint, "consumer attached");
        Ok(Attachment::Attached)
    }

    /// Releases every consumer of `joint` back to the scene root.
    pub fn detach(&mut self, scene: &mut dyn SceneGraph, joint: HandJoint) {
        for consumer in self.consumers[joint.index()].drain(..) {
            if scene.is_alive(consumer) {
                scene.set_parent(consumer, None);
            }
        }
    }

    pub(crate) fn destroy(&mut self, scene: &mut dyn SceneGraph) {
        for joint in HandJoint::ALL {
            self.detach(scene, joint);
        }
        scene.despawn(self.root);
        info!(tracker = %self.id, "hand tracker destroyed");
    }

    /// Reconstructs this tick's joints and commits them. Returns whether a
    /// pass was committed.
    pub(crate) fn reconstruct<R>(&mut self, depth: &DepthBuffer, rays: R) -> bool
    where
        R: Fn(Point2<f32>) -> Option<Ray>,
    {
        match self.reconstructor.reconstruct(&self.hand2d, depth, rays) {
            Ok(Some(pass)) => {
                self.commit(pass);
                true
            }
            Ok(None) => false,
            // A wrong buffer format is a setup problem that will not go away.
            Err(e @ DepthError::DepthUnavailable(_)) if self.depth_format_reported => {
                trace!(tracker = %self.id, "Skipping reconstruction: {}", e);
                false
            }
            Err(e) => {
                if matches!(e, DepthError::DepthUnavailable(_)) {
                    self.depth_format_reported = true;
                }
                warn!(tracker = %self.id, "Skipping reconstruction: {}", e);
                false
            }
        }
    }

    fn commit(&mut self, pass: ReconstructionPass) {
        self.anchor_transform = pass.anchor;
        self.joint_transforms = pass.joints;
        self.passes += 1;
    }

    /// Copies the committed transforms onto the root and every live
    /// consumer, dropping consumers the scene has destroyed.
    pub(crate) fn propagate(&mut self, scene: &mut dyn SceneGraph) {
        if self.passes == 0 {
            return;
        }

        scene.set_local_transform(self.root, self.anchor_transform);

        for joint in HandJoint::ALL {
            let consumers = &mut self.consumers[joint.index()];
            if consumers.is_empty() {
                continue;
            }

            let before = consumers.len();
            consumers.retain(|consumer| scene.is_alive(*consumer));
            if consumers.len() != before {
                debug!(tracker = %self.id, %joint, pruned = before - consumers.len(), "pruned dead consumers");
            }

            let transform = self.joint_transforms[joint.index()];
            for consumer in consumers.iter() {
                scene.set_local_transform(*consumer, transform);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::PixelFormat;
    use crate::keypoint_bridge::HandObservation;
    use crate::scene::InMemoryScene;
    use crate::session::{DisplayTransform, PinholeCamera};
    use std::time::Instant;

    fn anchor(scene: &mut InMemoryScene) -> HandAnchor {
        HandAnchor::new(&TrackerConfig::default(), DepthBufferSelection::SmoothedSceneDepth, scene)
    }

    #[test]
    fn test_attach_twice_is_noop() {
        let mut scene = InMemoryScene::new();
        let mut hand = anchor(&mut scene);
        let sphere = scene.spawn();

        assert_eq!(hand.attach(&mut scene, sphere, HandJoint::IndexTip).unwrap(), Attachment::Attached);
        assert_eq!(hand.attach(&mut scene, sphere, HandJoint::IndexTip).unwrap(), Attachment::AlreadyAttached);
        assert_eq!(hand.consumers(HandJoint::IndexTip).len(), 1);

        // Also a no-op when aimed at another joint.
        assert_eq!(hand.attach(&mut scene, sphere, HandJoint::Wrist).unwrap(), Attachment::AlreadyAttached);
        assert!(hand.consumers(HandJoint::Wrist).is_empty());
    }

    #[test]
    fn test_many_consumers_per_joint() {
        let mut scene = InMemoryScene::new();
        let mut hand = anchor(&mut scene);
        let a = scene.spawn();
        let b = scene.spawn();
        hand.attach(&mut scene, a, HandJoint::ThumbTip).unwrap();
        hand.attach(&mut scene, b, HandJoint::ThumbTip).unwrap();
        assert_eq!(hand.consumers(HandJoint::ThumbTip), &[a, b]);
        assert_eq!(scene.parent(a), Some(hand.root()));
    }

    #[test]
    fn test_attach_dead_consumer_fails() {
        let mut scene = InMemoryScene::new();
        let mut hand = anchor(&mut scene);
        let gone = scene.spawn();
        scene.despawn(gone);
        assert!(matches!(
            hand.attach(&mut scene, gone, HandJoint::Wrist),
            Err(TrackingError::ConsumerNotAlive(_))
        ));
    }

    #[test]
    fn test_detach_unparents_all_consumers_of_joint() {
        let mut scene = InMemoryScene::new();
        let mut hand = anchor(&mut scene);
        let a = scene.spawn();
        let b = scene.spawn();
        hand.attach(&mut scene, a, HandJoint::RingTip).unwrap();
        hand.attach(&mut scene, b, HandJoint::Wrist).unwrap();

        hand.detach(&mut scene, HandJoint::RingTip);
        assert!(hand.consumers(HandJoint::RingTip).is_empty());
        assert_eq!(scene.parent(a), None);
        assert_eq!(scene.parent(b), Some(hand.root()));
    }

    #[test]
    fn test_propagate_prunes_dead_consumers() {
        let mut scene = InMemoryScene::new();
        let mut hand = anchor(&mut scene);
        let a = scene.spawn();
        let b = scene.spawn();
        hand.attach(&mut scene, a, HandJoint::MiddleTip).unwrap();
        hand.attach(&mut scene, b, HandJoint::MiddleTip).unwrap();
        scene.despawn(a);

        let mut pass = ReconstructionPass {
            anchor: Isometry3::translation(0.0, 0.0, -0.5),
            joints: [JointTransform::identity(); JOINT_COUNT],
            updated: [true; JOINT_COUNT],
        };
        pass.joints[HandJoint::MiddleTip.index()] = Isometry3::translation(0.0, 0.1, 0.0);
        hand.commit(pass);
        hand.propagate(&mut scene);

        assert_eq!(hand.consumers(HandJoint::MiddleTip), &[b]);
        let world = scene.world_transform(b).unwrap();
        assert!((world.translation.vector - nalgebra::Vector3::new(0.0, 0.1, -0.5)).norm() < 1e-6);
    }

    #[test]
    fn test_nothing_propagates_before_first_pass() {
        let mut scene = InMemoryScene::new();
        let mut hand = anchor(&mut scene);
        let a = scene.spawn();
        hand.attach(&mut scene, a, HandJoint::Wrist).unwrap();
        let writes = scene.transform_writes(hand.root());
        hand.propagate(&mut scene);
        assert_eq!(scene.transform_writes(hand.root()), writes);
        assert_eq!(hand.anchor_transform(), Isometry3::identity());
    }

    #[test]
    fn test_wrong_depth_format_is_reported_once() {
        let mut scene = InMemoryScene::new();
        let mut hand = anchor(&mut scene);
        let seen = HandObservation::new().with_image_point(HandJoint::Wrist, Point2::new(0.5, 0.5), 0.9);
        let display = DisplayTransform::identity(nalgebra::Vector2::new(1.0, 1.0));
        hand.hand2d_mut().apply_observation(&seen, &display, Instant::now());

        let depth = DepthBuffer::from_raw(2, 2, PixelFormat::DepthFloat16, vec![0; 8]).unwrap();
        let camera = PinholeCamera::new(1.0, Point2::new(0.5, 0.5));

        assert!(!hand.reconstruct(&depth, |p| camera.ray_through(p)));
        assert!(hand.depth_format_reported);
        assert!(!hand.reconstruct(&depth, |p| camera.ray_through(p)));
        assert!(hand.depth_format_reported);
        assert_eq!(hand.passes(), 0);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut scene = InMemoryScene::new();
        let mut hand = anchor(&mut scene);
        let a = scene.spawn();
        hand.attach(&mut scene, a, HandJoint::IndexMcp).unwrap();
        hand.destroy(&mut scene);
        assert!(!scene.is_alive(hand.root()));
        assert!(scene.is_alive(a));
        assert_eq!(scene.parent(a), None);
    }
}
