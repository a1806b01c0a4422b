/// Pinhole intrinsics, clip-space projection and the vision/render camera bridge
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::model::Image;
use crate::picking::Ray;
use crate::pose::Pose;
use crate::transform::Transform;

pub const Z_NEAR: f64 = 0.01;
pub const Z_FAR: f64 = 1000.0;

/// Vision cameras look down +z with y down; the renderer looks down -z with y up
const VISION_TO_RENDER: Pose = Pose::new(0.0, 0.0, 0.0, 180.0, 0.0, 0.0);
const RENDER_TO_VISION: Pose = Pose::new(0.0, 0.0, 0.0, -180.0, 0.0, 0.0);

/// Focal lengths and principal point of a pinhole camera, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Read a column-major 3x3 camera matrix
    pub fn from_column_slice(elements: &[f64]) -> Result<Self> {
        if elements.len() != 9 {
            return Err(CoreError::ArrayLength {
                expected: 9,
                found: elements.len(),
            });
        }
        Ok(Self::new(elements[0], elements[4], elements[6], elements[7]))
    }

    pub fn to_column_array(&self) -> [f64; 9] {
        [
            self.fx, 0.0, 0.0, //
            0.0, self.fy, 0.0, //
            self.cx, self.cy, 1.0,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let focal_ok =
            self.fx != 0.0 && self.fy != 0.0 && self.fx.is_finite() && self.fy.is_finite();
        if !focal_ok || !self.cx.is_finite() || !self.cy.is_finite() {
            warn!(fx = self.fx, fy = self.fy, "rejecting singular intrinsics");
            return Err(CoreError::SingularIntrinsics {
                fx: self.fx,
                fy: self.fy,
            });
        }
        Ok(())
    }
}

/// OpenGL-style projection for an image of `width` x `height` pixels
pub fn projection_matrix(intrinsics: &Intrinsics, width: u32, height: u32) -> Result<Matrix4<f64>> {
    intrinsics.validate()?;
    if width == 0 || height == 0 {
        return Err(CoreError::InvalidImageSize { width, height });
    }

    let w = width as f64;
    let h = height as f64;
    let (n, f) = (Z_NEAR, Z_FAR);

    let p00 = 2.0 * intrinsics.fx / w;
    let p11 = 2.0 * intrinsics.fy / h;
    let p02 = 1.0 - 2.0 * intrinsics.cx / w;
    let p12 = 2.0 * intrinsics.cy / h - 1.0;
    let p22 = (f + n) / (n - f);
    let p23 = 2.0 * f * n / (n - f);

    debug!(width, height, "derived projection matrix");

    #[rustfmt::skip]
    let projection = Matrix4::new(
        p00, 0.0, p02, 0.0,
        0.0, p11, p12, 0.0,
        0.0, 0.0, p22, p23,
        0.0, 0.0, -1.0, 0.0,
    );
    Ok(projection)
}

/// Rotate a vision-convention camera pose 180° about its own x axis
pub fn vision_to_render(pose: &Pose) -> Pose {
    Pose::from_ref_to_world(&VISION_TO_RENDER, pose)
}

/// Inverse of [`vision_to_render`], used before persisting a camera pose
pub fn render_to_vision(pose: &Pose) -> Pose {
    Pose::from_ref_to_world(&RENDER_TO_VISION, pose)
}

/// Render-side camera derived from a captured image
#[derive(Debug, Clone)]
pub struct Camera {
    pub intrinsics: Intrinsics,
    pub projection: Matrix4<f64>,
    /// Camera-to-world pose in the render convention
    pub pose: Pose,
    pub width: u32,
    pub height: u32,
}

impl Camera {
    pub fn new(
        intrinsics: Intrinsics,
        width: u32,
        height: u32,
        vision_pose: &Pose,
    ) -> Result<Self> {
        Ok(Self {
            intrinsics,
            projection: projection_matrix(&intrinsics, width, height)?,
            pose: vision_to_render(vision_pose),
            width,
            height,
        })
    }

    pub fn from_image(image: &Image) -> Self {
        Self {
            intrinsics: *image.intrinsics(),
            projection: *image.projection_matrix(),
            pose: *image.render_pose(),
            width: image.width(),
            height: image.height(),
        }
    }

    /// World-to-camera transform
    pub fn view_matrix(&self) -> Matrix4<f64> {
        Transform::rigid_inverse(&self.pose.to_matrix())
    }

    /// Project a model-space point onto a `width` x `height` grid covering the image.
    ///
    /// Returns `(x, y, depth)` with depth in normalized device units, or `None`
    /// when the point lies outside the view frustum.
    pub fn project_to_screen(
        &self,
        point: &Point3<f64>,
        model_matrix: &Matrix4<f64>,
        width: u32,
        height: u32,
    ) -> Option<(f64, f64, f64)> {
        let mvp = Transform::mvp_matrix(model_matrix, &self.view_matrix(), &self.projection);
        let clip = mvp * Vector4::new(point.x, point.y, point.z, 1.0);

        // Behind or on the camera plane
        if clip.w < 1e-12 {
            return None;
        }

        let ndc = clip.xyz() / clip.w;
        if ndc.iter().any(|c| !(-1.0..=1.0).contains(c)) {
            return None;
        }

        let screen_x = (ndc.x + 1.0) * 0.5 * width as f64;
        let screen_y = (1.0 - ndc.y) * 0.5 * height as f64;

        Some((screen_x, screen_y, ndc.z))
    }

    /// Pinhole projection of a world point to image pixels, without frustum clipping
    pub fn project_to_pixel(&self, point: &Point3<f64>) -> Option<(f64, f64)> {
        let in_camera = self.view_matrix().transform_point(point);
        // Render convention: visible points have negative z
        let depth = -in_camera.z;
        if depth <= 0.0 {
            return None;
        }
        let u = self.intrinsics.fx * in_camera.x / depth + self.intrinsics.cx;
        let v = -self.intrinsics.fy * in_camera.y / depth + self.intrinsics.cy;
        Some((u, v))
    }

    /// World-space ray from the camera centre through image pixel `(u, v)`
    pub fn ray_through_pixel(&self, u: f64, v: f64) -> Ray {
        let local = Vector3::new(
            (u - self.intrinsics.cx) / self.intrinsics.fx,
            -(v - self.intrinsics.cy) / self.intrinsics.fy,
            -1.0,
        );
        let rotation = Transform::rotation_matrix(&self.pose.angles());
        let origin = Point3::from(self.pose.translation());
        Ray::new(origin, rotation * local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn camera() -> Camera {
        let intrinsics = Intrinsics::new(800.0, 820.0, 300.0, 250.0);
        let pose = Pose::new(5.0, -3.0, 20.0, 170.0, 10.0, -25.0);
        Camera::new(intrinsics, 640, 480, &pose).unwrap()
    }

    #[test]
    fn test_projection_matrix_entries() {
        let intrinsics = Intrinsics::new(1000.0, 1000.0, 320.0, 240.0);
        let p = projection_matrix(&intrinsics, 640, 480).unwrap();
        assert_relative_eq!(p[(0, 0)], 3.125);
        assert_relative_eq!(p[(1, 1)], 1000.0 / 240.0);
        assert_abs_diff_eq!(p[(0, 2)], 0.0);
        assert_abs_diff_eq!(p[(1, 2)], 0.0);
        assert_relative_eq!(p[(2, 2)], 1000.01 / (0.01 - 1000.0));
        assert_relative_eq!(p[(2, 3)], 2.0 * 1000.0 * 0.01 / (0.01 - 1000.0));
        assert_eq!(p[(3, 2)], -1.0);
        assert_eq!(p[(3, 3)], 0.0);
        assert_eq!(p[(0, 1)], 0.0);
    }

    #[test]
    fn test_intrinsics_column_major() {
        let k = [500.0, 0.0, 0.0, 0.0, 510.0, 0.0, 320.0, 240.0, 1.0];
        let intrinsics = Intrinsics::from_column_slice(&k).unwrap();
        assert_eq!(intrinsics, Intrinsics::new(500.0, 510.0, 320.0, 240.0));
        assert_eq!(intrinsics.to_column_array(), k);
    }

    #[test]
    fn test_singular_intrinsics_rejected() {
        let intrinsics = Intrinsics::new(0.0, 1000.0, 320.0, 240.0);
        assert!(matches!(
            projection_matrix(&intrinsics, 640, 480),
            Err(CoreError::SingularIntrinsics { .. })
        ));
    }

    #[test]
    fn test_zero_image_size_rejected() {
        let intrinsics = Intrinsics::new(1000.0, 1000.0, 320.0, 240.0);
        assert!(matches!(
            projection_matrix(&intrinsics, 0, 480),
            Err(CoreError::InvalidImageSize { .. })
        ));
    }

    #[test]
    fn test_screen_projection_matches_pinhole() {
        let camera = camera();
        // A point 10 units in front of the vision camera
        let vision = render_to_vision(&camera.pose).to_matrix();
        let world = vision.transform_point(&Point3::new(0.7, -0.4, 10.0));

        let (x, y, _) = camera
            .project_to_screen(&world, &Matrix4::identity(), camera.width, camera.height)
            .unwrap();
        assert_relative_eq!(x, 800.0 * 0.07 + 300.0, epsilon = 1e-6);
        assert_relative_eq!(y, 820.0 * -0.04 + 250.0, epsilon = 1e-6);

        let (u, v) = camera.project_to_pixel(&world).unwrap();
        assert_relative_eq!(u, x, epsilon = 1e-6);
        assert_relative_eq!(v, y, epsilon = 1e-6);
    }

    #[test]
    fn test_point_behind_camera_not_projected() {
        let camera = camera();
        let vision = render_to_vision(&camera.pose).to_matrix();
        let behind = vision.transform_point(&Point3::new(0.0, 0.0, -5.0));
        assert!(camera
            .project_to_screen(&behind, &Matrix4::identity(), 80, 24)
            .is_none());
        assert!(camera.project_to_pixel(&behind).is_none());
    }

    #[test]
    fn test_ray_through_pixel_hits_projected_point() {
        let camera = camera();
        let world = Point3::new(2.0, 1.0, 3.0);
        let (u, v) = camera.project_to_pixel(&world).unwrap();
        let ray = camera.ray_through_pixel(u, v);

        let to_point = world - ray.origin;
        let t = to_point.dot(&ray.direction);
        assert!(t > 0.0);
        assert_abs_diff_eq!(ray.at(t), world, epsilon = 1e-6);
    }
}
