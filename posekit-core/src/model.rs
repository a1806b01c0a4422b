/// Annotation data model: parts, their placements, captured images and
/// pixel/point correspondences.

use nalgebra::{Matrix4, Point2, Point3};

use crate::error::{CoreError, Result};
use crate::pose::Pose;
use crate::projection::{projection_matrix, render_to_vision, vision_to_render, Intrinsics};

/// A CAD geometry reference
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub id: u32,
    pub cad_path: String,
    pub texture_path: Option<String>,
}

impl Part {
    pub fn new(id: u32, cad_path: impl Into<String>, texture_path: Option<String>) -> Self {
        Self {
            id,
            cad_path: cad_path.into(),
            texture_path,
        }
    }
}

/// One placed instance of a part in a scene; the pose is part-to-world
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedPart {
    pub part: Part,
    pub pose: Pose,
}

impl PositionedPart {
    pub fn new(part: Part, pose: Pose) -> Self {
        Self { part, pose }
    }
}

/// A camera capture with its calibration.
///
/// The projection matrix and render-convention pose are derived from the
/// stored intrinsics, size and vision-convention pose. Every setter derives
/// them again, so they never lag behind the backing fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: String,
    pub path: String,
    width: u32,
    height: u32,
    intrinsics: Intrinsics,
    camera_pose: Pose,
    projection: Matrix4<f64>,
    render_pose: Pose,
}

impl Image {
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        width: u32,
        height: u32,
        intrinsics: Intrinsics,
        camera_pose: Pose,
    ) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            path: path.into(),
            width,
            height,
            intrinsics,
            camera_pose,
            projection: projection_matrix(&intrinsics, width, height)?,
            render_pose: vision_to_render(&camera_pose),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Camera-to-world pose, vision convention (+z forward, +y down)
    pub fn camera_pose(&self) -> &Pose {
        &self.camera_pose
    }

    pub fn projection_matrix(&self) -> &Matrix4<f64> {
        &self.projection
    }

    /// Camera-to-world pose, render convention (-z forward, +y up)
    pub fn render_pose(&self) -> &Pose {
        &self.render_pose
    }

    pub fn set_intrinsics(&mut self, intrinsics: Intrinsics) -> Result<()> {
        self.projection = projection_matrix(&intrinsics, self.width, self.height)?;
        self.intrinsics = intrinsics;
        Ok(())
    }

    pub fn set_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.projection = projection_matrix(&self.intrinsics, width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn set_camera_pose(&mut self, camera_pose: Pose) {
        self.camera_pose = camera_pose;
        self.render_pose = vision_to_render(&camera_pose);
    }

    /// Store a pose edited in the render convention
    pub fn set_render_pose(&mut self, render_pose: Pose) {
        self.camera_pose = render_to_vision(&render_pose);
        self.render_pose = render_pose;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub id: String,
    pub images: Vec<Image>,
    pub positioned_parts: Vec<PositionedPart>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub scenes: Vec<Scene>,
    pub parts: Vec<Part>,
}

impl Dataset {
    pub fn part(&self, id: u32) -> Result<&Part> {
        self.parts
            .iter()
            .find(|part| part.id == id)
            .ok_or(CoreError::UnknownPart(id))
    }
}

/// An image pixel paired with a point on the part's surface (part-local)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub pixel: Point2<f64>,
    pub point: Point3<f64>,
}

impl Correspondence {
    pub fn new(pixel: Point2<f64>, point: Point3<f64>) -> Self {
        Self { pixel, point }
    }
}

impl Default for Correspondence {
    fn default() -> Self {
        Self::new(Point2::origin(), Point3::origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn image() -> Image {
        Image::new(
            "0",
            "rgb/000000.png",
            640,
            480,
            Intrinsics::new(1000.0, 1000.0, 320.0, 240.0),
            Pose::new(0.0, 0.0, -100.0, 0.0, 0.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn test_image_derives_render_pose() {
        let image = image();
        assert_abs_diff_eq!(image.render_pose().w.abs(), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(image.render_pose().z, -100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_set_size_rederives_projection() {
        let mut image = image();
        image.set_size(1280, 960).unwrap();
        assert_abs_diff_eq!(image.projection_matrix()[(0, 0)], 2.0 * 1000.0 / 1280.0);
        assert_eq!(image.width(), 1280);
    }

    #[test]
    fn test_setters_rederive_cached_values() {
        let mut image = image();
        image
            .set_intrinsics(Intrinsics::new(500.0, 500.0, 320.0, 240.0))
            .unwrap();
        assert_abs_diff_eq!(image.projection_matrix()[(0, 0)], 2.0 * 500.0 / 640.0);
        assert_eq!(image.intrinsics().fx, 500.0);

        let moved = Pose::new(5.0, 6.0, 7.0, 0.0, 0.0, 90.0);
        image.set_camera_pose(moved);
        assert_eq!(*image.camera_pose(), moved);
        assert_abs_diff_eq!(
            image.render_pose().to_matrix(),
            vision_to_render(&moved).to_matrix(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(image.render_pose().x, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(image.render_pose().z, 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_failed_setter_keeps_previous_state() {
        let mut image = image();
        let before = image.clone();
        assert!(image
            .set_intrinsics(Intrinsics::new(0.0, 0.0, 0.0, 0.0))
            .is_err());
        assert_eq!(image, before);
    }

    #[test]
    fn test_set_render_pose_round_trips() {
        let mut image = image();
        let render = Pose::new(1.0, 2.0, 3.0, 160.0, 5.0, 15.0);
        image.set_render_pose(render);
        let back = vision_to_render(image.camera_pose());
        assert_abs_diff_eq!(back.to_matrix(), render.to_matrix(), epsilon = 1e-9);
    }

    #[test]
    fn test_unknown_part() {
        let dataset = Dataset {
            scenes: Vec::new(),
            parts: vec![Part::new(1, "models/obj_000001.ply", None)],
        };
        assert!(dataset.part(1).is_ok());
        assert!(matches!(dataset.part(7), Err(CoreError::UnknownPart(7))));
    }
}
