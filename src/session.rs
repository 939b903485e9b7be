// src/session.rs - Camera session seams: frames, rays, coordinate conversion
use crate::depth::DepthBuffer;
use image::DynamicImage;
use nalgebra::{Matrix3, Point2, Point3, Unit, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which of the session's depth maps feeds reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthBufferSelection {
    SceneDepth,
    /// Temporally smoothed scene depth. Far steadier than the estimated depth.
    SmoothedSceneDepth,
    /// Depth estimated alongside person segmentation, available without LiDAR.
    PersonSegmentationWithDepth,
}

/// A world-space ray with a unit-length direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Unit<Vector3<f32>>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Option<Self> {
        Unit::try_new(direction, f32::EPSILON).map(|direction| Self { origin, direction })
    }

    /// The point `distance` meters along the ray.
    pub fn at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction.into_inner() * distance
    }
}

/// Maps normalized image coordinates (0,0 top-left) onto the on-screen
/// viewport: an affine "display" transform in normalized space followed by
/// a scale to the viewport size in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub normalized: Matrix3<f32>,
    pub viewport: Vector2<f32>,
}

impl DisplayTransform {
    pub fn identity(viewport: Vector2<f32>) -> Self {
        Self {
            normalized: Matrix3::identity(),
            viewport,
        }
    }

    pub fn to_screen(&self, normalized: Point2<f32>) -> Point2<f32> {
        let p = self.normalized.transform_point(&normalized);
        Point2::new(p.x * self.viewport.x, p.y * self.viewport.y)
    }

    pub fn to_normalized(&self, screen: Point2<f32>) -> Option<Point2<f32>> {
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return None;
        }
        let unscaled = Point2::new(screen.x / self.viewport.x, screen.y / self.viewport.y);
        let inverse = self.normalized.try_inverse()?;
        Some(inverse.transform_point(&unscaled))
    }
}

/// Everything captured for one camera frame.
#[derive(Debug, Clone)]
pub struct ArFrame {
    pub captured_at: Instant,
    pub image: Arc<DynamicImage>,
    pub display: DisplayTransform,
    pub scene_depth: Option<Arc<DepthBuffer>>,
    pub smoothed_scene_depth: Option<Arc<DepthBuffer>>,
    pub estimated_depth: Option<Arc<DepthBuffer>>,
}

impl ArFrame {
    pub fn new(image: Arc<DynamicImage>, display: DisplayTransform) -> Self {
        Self {
            captured_at: Instant::now(),
            image,
            display,
            scene_depth: None,
            smoothed_scene_depth: None,
            estimated_depth: None,
        }
    }

    pub fn with_depth(mut self, selection: DepthBufferSelection, depth: Arc<DepthBuffer>) -> Self {
        match selection {
            DepthBufferSelection::SceneDepth => self.scene_depth = Some(depth),
            DepthBufferSelection::SmoothedSceneDepth => self.smoothed_scene_depth = Some(depth),
            DepthBufferSelection::PersonSegmentationWithDepth => self.estimated_depth = Some(depth),
        }
        self
    }

    pub fn depth(&self, selection: DepthBufferSelection) -> Option<&Arc<DepthBuffer>> {
        match selection {
            DepthBufferSelection::SceneDepth => self.scene_depth.as_ref(),
            DepthBufferSelection::SmoothedSceneDepth => self.smoothed_scene_depth.as_ref(),
            DepthBufferSelection::PersonSegmentationWithDepth => self.estimated_depth.as_ref(),
        }
    }
}

/// The running camera session as seen by the tracking pipeline.
pub trait ArSession {
    /// `None` while the session is not running; callers skip the tick.
    fn current_frame(&self) -> Option<Arc<ArFrame>>;

    /// World-space ray through a screen point, `None` on a miss.
    fn ray_through(&self, screen: Point2<f32>) -> Option<Ray>;

    fn supports_depth(&self, selection: DepthBufferSelection) -> bool;
}

/// A fixed pinhole camera at the world origin looking down -Z, with screen
/// y growing downwards. Handy for simulated sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCamera {
    pub focal_length: f32,
    pub principal_point: Point2<f32>,
}

impl PinholeCamera {
    pub fn new(focal_length: f32, principal_point: Point2<f32>) -> Self {
        Self {
            focal_length,
            principal_point,
        }
    }

    pub fn ray_through(&self, screen: Point2<f32>) -> Option<Ray> {
        let x = (screen.x - self.principal_point.x) / self.focal_length;
        let y = -(screen.y - self.principal_point.y) / self.focal_length;
        Ray::new(Point3::origin(), Vector3::new(x, y, -1.0))
    }

    /// Screen point of a world-space point in front of the camera.
    pub fn project(&self, world: &Point3<f32>) -> Option<Point2<f32>> {
        if world.z >= 0.0 {
            return None;
        }
        let depth = -world.z;
        Some(Point2::new(
            self.principal_point.x + world.x / depth * self.focal_length,
            self.principal_point.y - world.y / depth * self.focal_length,
        ))
    }
}
