// src/tracking.rs - Depth-fused 3D joint reconstruction with smoothing
use crate::config::SmoothingConfig;
use crate::depth::DepthBuffer;
use crate::detector::Hand2D;
use crate::error::DepthError;
use crate::joints::{HandJoint, JOINT_COUNT};
use crate::session::Ray;
use nalgebra::{Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3};
use tracing::{debug, trace};

/// Position and orientation of a joint, relative to the hand anchor.
pub type JointTransform = Isometry3<f32>;

const DIRECTION_EPSILON: f32 = 1e-6;
const SLERP_EPSILON: f32 = 1e-6;

/// Per-joint depth cache that rejects single-frame depth spikes.
///
/// The middle finger base is the reference: it is the most reliably
/// sampled joint, sitting in the middle of the palm.
#[derive(Debug, Clone)]
pub struct DepthStabilizer {
    tolerance: f32,
    previous_tolerance: f32,
    blend: f32,
    cache: [Option<f32>; JOINT_COUNT],
}

impl DepthStabilizer {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            tolerance: config.depth_tolerance,
            previous_tolerance: config.previous_depth_tolerance,
            blend: config.depth_blend,
            cache: [None; JOINT_COUNT],
        }
    }

    pub fn cached(&self, joint: HandJoint) -> Option<f32> {
        self.cache[joint.index()]
    }

    /// Turns this frame's raw samples into the depths reconstruction uses.
    /// `None` marks a joint whose sample could not be taken; it stays `None`
    /// in the output and keeps its cache.
    ///
    /// The reference joint goes first, then the other inner joints, then the
    /// tips, which read their neighbour's freshly cached depth.
    pub fn stabilize(&mut self, raw: &[Option<f32>; JOINT_COUNT]) -> [Option<f32>; JOINT_COUNT] {
        let mut depths = [None; JOINT_COUNT];

        let reference_joint = HandJoint::DEPTH_REFERENCE;
        depths[reference_joint.index()] = self.stabilize_joint(reference_joint, raw[reference_joint.index()], None);
        // An unsampled reference still anchors the others through its cache.
        let reference = depths[reference_joint.index()].or(self.cache[reference_joint.index()]);

        for joint in HandJoint::ALL {
            if joint == reference_joint || joint.is_tip() {
                continue;
            }
            depths[joint.index()] = self.stabilize_joint(joint, raw[joint.index()], reference);
        }

        for tip in HandJoint::TIPS {
            depths[tip.index()] = self.tip_depth(tip);
        }

        depths
    }

    fn stabilize_joint(&mut self, joint: HandJoint, raw: Option<f32>, reference: Option<f32>) -> Option<f32> {
        let previous = self.cache[joint.index()];

        // Not sampled this frame: the joint gets no update.
        let raw = raw?;

        // Holes in the depth map read as 0 or NaN.
        if !(raw.is_finite() && raw > 0.0) {
            return previous;
        }

        let depth = match reference {
            Some(reference) if (raw - reference).abs() > self.tolerance => match previous {
                Some(previous) if (previous - reference).abs() <= self.previous_tolerance => {
                    trace!(joint = %joint, raw, previous, "depth outlier rejected");
                    previous
                }
                _ => reference,
            },
            _ => match previous {
                Some(previous) => raw + self.blend * (previous - raw),
                None => raw,
            },
        };

        self.cache[joint.index()] = Some(depth);
        Some(depth)
    }

    fn tip_depth(&mut self, tip: HandJoint) -> Option<f32> {
        let depth = self.cache[tip.orientation_target().index()]?;
        self.cache[tip.index()] = Some(depth);
        Some(depth)
    }
}

/// Output of one reconstruction, committed to the anchor as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionPass {
    /// World transform of the hand anchor.
    pub anchor: Isometry3<f32>,
    /// Model-space transform of every joint.
    pub joints: [JointTransform; JOINT_COUNT],
    /// Joints that received fresh data this pass.
    pub updated: [bool; JOINT_COUNT],
}

/// Fuses 2D joint positions with sampled depth into oriented 3D joints.
#[derive(Debug, Clone)]
pub struct HandReconstructor {
    joint_slerp: f32,
    anchor_slerp: f32,
    depths: DepthStabilizer,
    world: [Option<Isometry3<f32>>; JOINT_COUNT],
    anchor: Option<Isometry3<f32>>,
}

impl HandReconstructor {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            joint_slerp: config.joint_slerp,
            anchor_slerp: config.anchor_slerp,
            depths: DepthStabilizer::new(config),
            world: [None; JOINT_COUNT],
            anchor: None,
        }
    }

    pub fn depths(&self) -> &DepthStabilizer {
        &self.depths
    }

    pub fn world_transform(&self, joint: HandJoint) -> Option<Isometry3<f32>> {
        self.world[joint.index()]
    }

    pub fn anchor(&self) -> Option<Isometry3<f32>> {
        self.anchor
    }

    /// Runs one pass. `Ok(None)` means nothing to commit this frame: the hand
    /// has never been recognized, or the palm joints needed for the anchor
    /// have no data yet.
    pub fn reconstruct<R>(&mut self, hand: &Hand2D, depth: &DepthBuffer, rays: R) -> Result<Option<ReconstructionPass>, DepthError>
    where
        R: Fn(Point2<f32>) -> Option<Ray>,
    {
        if !hand.state().ever_recognized() {
            return Ok(None);
        }

        let raw = sample_depths(hand, depth)?;
        let depths = self.depths.stabilize(&raw);

        let mut positions: [Option<Point3<f32>>; JOINT_COUNT] = [None; JOINT_COUNT];
        for joint in HandJoint::ALL {
            let i = joint.index();
            positions[i] = match (hand.position(joint), depths[i]) {
                (Some(position), Some(depth)) => rays(position.screen).map(|ray| ray.at(depth)),
                _ => None,
            };
            if positions[i].is_none() {
                trace!(joint = %joint, "no 3D position this frame");
            }
        }

        self.update_anchor(&positions);
        let Some(anchor) = self.anchor else {
            debug!("palm joints not reconstructed yet, skipping pass");
            return Ok(None);
        };
        let palm_up = anchor.rotation * Vector3::y();

        for joint in HandJoint::ALL {
            let i = joint.index();
            let Some(position) = positions[i] else { continue };

            if joint == HandJoint::Wrist {
                self.world[i] = Some(Isometry3::from_parts(Translation3::from(position.coords), anchor.rotation));
                continue;
            }

            let previous = self.world[i].map(|w| w.rotation);
            let target = positions[joint.orientation_target().index()]
                .and_then(|target| forward_rotation(&joint_direction(joint, &position, &target), &palm_up));

            let rotation = match (previous, target) {
                (Some(previous), Some(target)) => previous
                    .try_slerp(&target, self.joint_slerp, SLERP_EPSILON)
                    .unwrap_or(target),
                (None, Some(target)) => target,
                (Some(previous), None) => previous,
                (None, None) => anchor.rotation,
            };

            self.world[i] = Some(Isometry3::from_parts(Translation3::from(position.coords), rotation));
        }

        let inverse_anchor = anchor.inverse();
        let mut joints = [JointTransform::identity(); JOINT_COUNT];
        let mut updated = [false; JOINT_COUNT];
        for joint in HandJoint::ALL {
            let i = joint.index();
            let world = self.world[i].unwrap_or_else(|| self.seed_from_neighbours(joint, &anchor));
            joints[i] = inverse_anchor * world;
            updated[i] = positions[i].is_some();
        }

        Ok(Some(ReconstructionPass { anchor, joints, updated }))
    }

    /// Anchor sits on the wrist, facing the middle finger base, with its up
    /// axis along the palm normal.
    fn update_anchor(&mut self, positions: &[Option<Point3<f32>>; JOINT_COUNT]) {
        let (Some(wrist), Some(middle), Some(index)) = (
            positions[HandJoint::Wrist.index()],
            positions[HandJoint::MiddleMcp.index()],
            positions[HandJoint::IndexMcp.index()],
        ) else {
            return;
        };

        let forward = middle - wrist;
        let up = forward.cross(&(index - wrist));
        let Some(target) = forward_rotation(&forward, &up) else {
            return;
        };

        let rotation = match self.anchor {
            Some(previous) => target
                .try_slerp(&previous.rotation, self.anchor_slerp, SLERP_EPSILON)
                .unwrap_or(target),
            None => target,
        };

        self.anchor = Some(Isometry3::from_parts(Translation3::from(wrist.coords), rotation));
    }

    /// Joints never seen take the pose of their nearest reconstructed
    /// ancestor, or the anchor itself.
    fn seed_from_neighbours(&self, joint: HandJoint, anchor: &Isometry3<f32>) -> Isometry3<f32> {
        let mut current = joint.parent();
        while let Some(ancestor) = current {
            if let Some(world) = self.world[ancestor.index()] {
                return world;
            }
            current = ancestor.parent();
        }
        *anchor
    }
}

fn sample_depths(hand: &Hand2D, depth: &DepthBuffer) -> Result<[Option<f32>; JOINT_COUNT], DepthError> {
    let (joints, points): (Vec<HandJoint>, Vec<Point2<f32>>) = HandJoint::ALL
        .iter()
        .filter_map(|joint| hand.position(*joint).map(|p| (*joint, p.normalized)))
        .unzip();

    let mut raw = [None; JOINT_COUNT];
    for (joint, sample) in joints.into_iter().zip(depth.sample_many(&points)?) {
        match sample {
            Ok(value) => raw[joint.index()] = Some(value),
            Err(e) => trace!(joint = %joint, "depth sample unavailable: {}", e),
        }
    }
    Ok(raw)
}

/// Direction a joint faces. Tips have no child, so they continue the line
/// from their proximal neighbour outwards.
fn joint_direction(joint: HandJoint, position: &Point3<f32>, target: &Point3<f32>) -> Vector3<f32> {
    if joint.is_tip() {
        position - target
    } else {
        target - position
    }
}

/// Rotation taking local +Z onto `direction`, keeping local +Y as close to
/// `up` as possible.
pub fn forward_rotation(direction: &Vector3<f32>, up: &Vector3<f32>) -> Option<UnitQuaternion<f32>> {
    let direction = direction.try_normalize(DIRECTION_EPSILON)?;

    match up.try_normalize(DIRECTION_EPSILON) {
        Some(up) if direction.cross(&up).norm() > 1e-4 => Some(UnitQuaternion::face_towards(&direction, &up)),
        _ => UnitQuaternion::rotation_between(&Vector3::z(), &direction)
            .or_else(|| Some(UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::PI))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint_bridge::HandObservation;
    use crate::session::{DisplayTransform, PinholeCamera};
    use nalgebra::Vector2;
    use std::time::Instant;

    const WIDTH: f32 = 640.0;
    const HEIGHT: f32 = 480.0;

    fn camera() -> PinholeCamera {
        PinholeCamera::new(500.0, Point2::new(WIDTH / 2.0, HEIGHT / 2.0))
    }

    fn display() -> DisplayTransform {
        DisplayTransform::identity(Vector2::new(WIDTH, HEIGHT))
    }

    fn raw_with(values: &[(HandJoint, f32)]) -> [Option<f32>; JOINT_COUNT] {
        let mut raw = [None; JOINT_COUNT];
        for (joint, value) in values {
            raw[joint.index()] = Some(*value);
        }
        raw
    }

    /// Hand lying flat in front of the camera, fingers pointing up.
    fn flat_hand() -> Vec<(HandJoint, Point3<f32>)> {
        let mut joints = vec![(HandJoint::Wrist, Point3::new(0.0, -0.08, -0.5))];
        let fingers = [
            [HandJoint::ThumbCmc, HandJoint::ThumbMp, HandJoint::ThumbIp, HandJoint::ThumbTip],
            [HandJoint::IndexMcp, HandJoint::IndexPip, HandJoint::IndexDip, HandJoint::IndexTip],
            [HandJoint::MiddleMcp, HandJoint::MiddlePip, HandJoint::MiddleDip, HandJoint::MiddleTip],
            [HandJoint::RingMcp, HandJoint::RingPip, HandJoint::RingDip, HandJoint::RingTip],
            [HandJoint::LittleMcp, HandJoint::LittlePip, HandJoint::LittleDip, HandJoint::LittleTip],
        ];
        for (f, chain) in fingers.iter().enumerate() {
            let x = -0.04 + 0.02 * f as f32;
            for (s, joint) in chain.iter().enumerate() {
                joints.push((*joint, Point3::new(x, 0.0 + 0.025 * s as f32, -0.5)));
            }
        }
        joints
    }

    fn observe(points: &[(HandJoint, Point3<f32>)]) -> HandObservation {
        let camera = camera();
        points.iter().fold(HandObservation::new(), |obs, (joint, world)| {
            let screen = camera.project(world).unwrap();
            obs.with_image_point(*joint, Point2::new(screen.x / WIDTH, screen.y / HEIGHT), 0.9)
        })
    }

    fn recognized_hand(points: &[(HandJoint, Point3<f32>)]) -> Hand2D {
        let mut hand = Hand2D::new(0.4);
        hand.apply_observation(&observe(points), &display(), Instant::now());
        hand
    }

    #[test]
    fn test_outlier_keeps_previous_depth() {
        let mut stabilizer = DepthStabilizer::new(&SmoothingConfig::default());
        stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5), (HandJoint::Wrist, 0.52)]));

        let depths = stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5), (HandJoint::Wrist, 0.9)]));
        assert_eq!(depths[HandJoint::Wrist.index()], Some(0.52));
        assert_eq!(stabilizer.cached(HandJoint::Wrist), Some(0.52));
    }

    #[test]
    fn test_outlier_snaps_to_reference_without_trusted_history() {
        let mut stabilizer = DepthStabilizer::new(&SmoothingConfig::default());
        let depths = stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5), (HandJoint::RingPip, 1.4)]));
        assert_eq!(depths[HandJoint::RingPip.index()], Some(0.5));
    }

    #[test]
    fn test_accepted_sample_is_low_passed() {
        let mut stabilizer = DepthStabilizer::new(&SmoothingConfig::default());
        stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5), (HandJoint::IndexMcp, 0.5)]));
        let depths = stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5), (HandJoint::IndexMcp, 0.45)]));
        // 0.45 + 0.2 * (0.5 - 0.45)
        let index = depths[HandJoint::IndexMcp.index()].unwrap();
        assert!((index - 0.46).abs() < 1e-6);
    }

    #[test]
    fn test_tips_use_neighbour_depth() {
        let mut stabilizer = DepthStabilizer::new(&SmoothingConfig::default());
        let depths = stabilizer.stabilize(&raw_with(&[
            (HandJoint::MiddleMcp, 0.5),
            (HandJoint::IndexDip, 0.48),
            (HandJoint::IndexTip, 0.05),
            (HandJoint::ThumbTip, 0.5),
        ]));
        assert_eq!(depths[HandJoint::IndexTip.index()], depths[HandJoint::IndexDip.index()]);
        // Thumb IP had no sample and no history.
        assert_eq!(depths[HandJoint::ThumbTip.index()], None);
    }

    #[test]
    fn test_depth_hole_reuses_cache() {
        let mut stabilizer = DepthStabilizer::new(&SmoothingConfig::default());
        stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5), (HandJoint::Wrist, 0.55)]));
        let depths = stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5), (HandJoint::Wrist, 0.0)]));
        assert_eq!(depths[HandJoint::Wrist.index()], Some(0.55));
    }

    #[test]
    fn test_unsampled_joint_gets_no_depth() {
        let mut stabilizer = DepthStabilizer::new(&SmoothingConfig::default());
        stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5), (HandJoint::Wrist, 0.55)]));
        let depths = stabilizer.stabilize(&raw_with(&[(HandJoint::MiddleMcp, 0.5)]));
        assert_eq!(depths[HandJoint::Wrist.index()], None);
        assert_eq!(stabilizer.cached(HandJoint::Wrist), Some(0.55));
    }

    #[test]
    fn test_out_of_bounds_sample_keeps_last_pose() {
        let points = flat_hand();
        let depth = DepthBuffer::filled(64, 64, 0.5);
        let camera = camera();
        let mut reconstructor = HandReconstructor::new(&SmoothingConfig::default());

        let mut hand = recognized_hand(&points);
        reconstructor.reconstruct(&hand, &depth, |p| camera.ray_through(p)).unwrap();
        let before = reconstructor.world_transform(HandJoint::RingPip).unwrap();

        // Right edge maps one column past the buffer.
        let moved = observe(&points).with_image_point(HandJoint::RingPip, Point2::new(1.0, 0.5), 0.9);
        hand.apply_observation(&moved, &display(), Instant::now());
        assert!(depth.sample(hand.position(HandJoint::RingPip).unwrap().normalized).is_err());

        let pass = reconstructor
            .reconstruct(&hand, &depth, |p| camera.ray_through(p))
            .unwrap()
            .unwrap();

        assert!(!pass.updated[HandJoint::RingPip.index()]);
        assert!(pass.updated[HandJoint::RingMcp.index()]);
        assert_eq!(reconstructor.world_transform(HandJoint::RingPip).unwrap(), before);
    }

    #[test]
    fn test_anchor_frame_follows_palm() {
        let points = flat_hand();
        let depth = DepthBuffer::filled(64, 64, 0.5);
        let camera = camera();
        let mut reconstructor = HandReconstructor::new(&SmoothingConfig::default());

        let palm = |reconstructor: &HandReconstructor| {
            let at = |joint| reconstructor.world_transform(joint).unwrap().translation.vector;
            let wrist = at(HandJoint::Wrist);
            let forward = at(HandJoint::MiddleMcp) - wrist;
            let up = forward.cross(&(at(HandJoint::IndexMcp) - wrist));
            (forward.normalize(), up.normalize())
        };

        reconstructor
            .reconstruct(&recognized_hand(&points), &depth, |p| camera.ray_through(p))
            .unwrap();
        let first = reconstructor.anchor().unwrap().rotation;
        let (forward, up) = palm(&reconstructor);
        assert!((first * Vector3::z()).dot(&forward) > 0.9999);
        assert!((first * Vector3::y()).dot(&up) > 0.9999);
        // Palm faces the camera.
        assert!(up.z > 0.5);

        // Turn the palm in the image plane about the wrist.
        let wrist = points[0].1;
        let turn = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.5);
        let turned: Vec<_> = points.iter().map(|(joint, p)| (*joint, wrist + turn * (p - wrist))).collect();
        reconstructor
            .reconstruct(&recognized_hand(&turned), &depth, |p| camera.ray_through(p))
            .unwrap();
        let second = reconstructor.anchor().unwrap().rotation;

        let (forward, up) = palm(&reconstructor);
        let target = forward_rotation(&forward, &up).unwrap();
        let total = first.angle_to(&target);
        assert!(total > 0.3);
        // 0.6 of the way back towards the previous rotation.
        assert!((first.angle_to(&second) - 0.4 * total).abs() < 0.01);
        assert!((second.angle_to(&target) - 0.6 * total).abs() < 0.01);
    }

    #[test]
    fn test_no_pass_before_first_recognition() {
        let mut reconstructor = HandReconstructor::new(&SmoothingConfig::default());
        let hand = Hand2D::new(0.4);
        let depth = DepthBuffer::filled(8, 8, 0.5);
        let camera = camera();
        let pass = reconstructor.reconstruct(&hand, &depth, |p| camera.ray_through(p)).unwrap();
        assert!(pass.is_none());
        assert!(reconstructor.anchor().is_none());
    }

    #[test]
    fn test_joints_land_on_rays_at_depth() {
        let points = flat_hand();
        let hand = recognized_hand(&points);
        let depth = DepthBuffer::filled(64, 64, 0.5);
        let camera = camera();

        let mut reconstructor = HandReconstructor::new(&SmoothingConfig::default());
        let pass = reconstructor
            .reconstruct(&hand, &depth, |p| camera.ray_through(p))
            .unwrap()
            .unwrap();

        assert!(pass.updated.iter().all(|u| *u));

        let wrist = reconstructor.world_transform(HandJoint::Wrist).unwrap();
        assert!((wrist.translation.vector.norm() - 0.5).abs() < 1e-4);
        assert!((pass.anchor.translation.vector - wrist.translation.vector).norm() < 1e-6);

        // The wrist is the anchor origin in model space.
        let model_wrist = pass.joints[HandJoint::Wrist.index()];
        assert!(model_wrist.translation.vector.norm() < 1e-5);
        assert!(model_wrist.rotation.angle() < 1e-4);
    }

    #[test]
    fn test_tip_faces_outward() {
        let points = flat_hand();
        let hand = recognized_hand(&points);
        let depth = DepthBuffer::filled(64, 64, 0.5);
        let camera = camera();

        let mut reconstructor = HandReconstructor::new(&SmoothingConfig::default());
        reconstructor.reconstruct(&hand, &depth, |p| camera.ray_through(p)).unwrap();

        let tip = reconstructor.world_transform(HandJoint::IndexTip).unwrap();
        let dip = reconstructor.world_transform(HandJoint::IndexDip).unwrap();
        let outward = (tip.translation.vector - dip.translation.vector).normalize();
        let forward = tip.rotation * Vector3::z();
        assert!(forward.dot(&outward) > 0.999);

        // Inner joints face their distal neighbour.
        let pip = reconstructor.world_transform(HandJoint::IndexPip).unwrap();
        let towards_dip = (dip.translation.vector - pip.translation.vector).normalize();
        assert!((pip.rotation * Vector3::z()).dot(&towards_dip) > 0.999);
    }

    #[test]
    fn test_joint_orientation_is_slerped() {
        let points = flat_hand();
        let depth = DepthBuffer::filled(64, 64, 0.5);
        let camera = camera();
        let mut reconstructor = HandReconstructor::new(&SmoothingConfig::default());

        let hand = recognized_hand(&points);
        reconstructor.reconstruct(&hand, &depth, |p| camera.ray_through(p)).unwrap();
        let before = reconstructor.world_transform(HandJoint::IndexPip).unwrap().rotation;

        // Bend the index finger sideways.
        let bent: Vec<_> = points
            .iter()
            .map(|(joint, p)| match joint {
                HandJoint::IndexDip => (*joint, Point3::new(p.x - 0.03, p.y - 0.02, p.z)),
                _ => (*joint, *p),
            })
            .collect();
        let hand = recognized_hand(&bent);
        reconstructor.reconstruct(&hand, &depth, |p| camera.ray_through(p)).unwrap();
        let after = reconstructor.world_transform(HandJoint::IndexPip).unwrap().rotation;

        let pip = reconstructor.world_transform(HandJoint::IndexPip).unwrap().translation.vector;
        let dip = reconstructor.world_transform(HandJoint::IndexDip).unwrap().translation.vector;
        let target = forward_rotation(&(dip - pip), &(reconstructor.anchor().unwrap().rotation * Vector3::y())).unwrap();

        let total = before.angle_to(&target);
        assert!(total > 0.1);
        // Halfway between the old and the new target orientation.
        assert!((before.angle_to(&after) - total * 0.5).abs() < 0.02);
    }

    #[test]
    fn test_missing_ray_only_drops_that_joint() {
        let points = flat_hand();
        let hand = recognized_hand(&points);
        let depth = DepthBuffer::filled(64, 64, 0.5);
        let camera = camera();
        let little_tip = hand.position(HandJoint::LittleTip).unwrap().screen;

        let mut reconstructor = HandReconstructor::new(&SmoothingConfig::default());
        let pass = reconstructor
            .reconstruct(&hand, &depth, |p| if p == little_tip { None } else { camera.ray_through(p) })
            .unwrap()
            .unwrap();

        assert!(!pass.updated[HandJoint::LittleTip.index()]);
        assert!(pass.updated[HandJoint::LittleDip.index()]);
        // Seeded from the DIP below it.
        assert_eq!(pass.joints[HandJoint::LittleTip.index()], pass.joints[HandJoint::LittleDip.index()]);
    }

    #[test]
    fn test_forward_rotation_degenerate_inputs() {
        assert!(forward_rotation(&Vector3::zeros(), &Vector3::y()).is_none());
        let q = forward_rotation(&Vector3::y(), &Vector3::y()).unwrap();
        assert!(((q * Vector3::z()) - Vector3::y()).norm() < 1e-5);
        let back = forward_rotation(&-Vector3::z(), &Vector3::zeros()).unwrap();
        assert!(((back * Vector3::z()) + Vector3::z()).norm() < 1e-5);
    }
}
