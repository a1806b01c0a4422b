/// Editing session over a loaded dataset.
///
/// The session owns the [`Dataset`] and tracks which scene, image and
/// positioned part are selected. The absolute (part-to-world) pose has a
/// single owner, the selected [`PositionedPart`]; everything else reads it
/// through the selection index. The relative (part-to-camera) pose is cached
/// here and recomputed whenever its inputs change.
///
/// Correspondences belong to one (image, part) pairing, so any change of
/// scene, image, positioned part or assigned part clears them.

use nalgebra::{Point2, Point3};
use tracing::{debug, info};

use crate::dataset::PoseRequest;
use crate::error::{CoreError, Result};
use crate::model::{Correspondence, Dataset, Image, PositionedPart, Scene};
use crate::pose::Pose;

#[derive(Debug)]
pub struct Session {
    dataset: Dataset,
    scene: Option<usize>,
    image: Option<usize>,
    positioned_part: Option<usize>,
    relative_pose: Pose,
    correspondences: Vec<Correspondence>,
    selected_correspondence: Option<usize>,
}

fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(CoreError::IndexOutOfRange { what, index, len })
    }
}

impl Session {
    /// Start a session with the first scene selected (if any)
    pub fn new(dataset: Dataset) -> Result<Self> {
        let mut session = Self {
            dataset,
            scene: None,
            image: None,
            positioned_part: None,
            relative_pose: Pose::identity(),
            correspondences: Vec::new(),
            selected_correspondence: None,
        };
        if !session.dataset.scenes.is_empty() {
            session.select_scene(0)?;
        }
        Ok(session)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.dataset.scenes.get(self.scene?)
    }

    fn scene_mut(&mut self) -> Result<&mut Scene> {
        let index = self.scene.ok_or(CoreError::NothingSelected("scene"))?;
        self.dataset
            .scenes
            .get_mut(index)
            .ok_or(CoreError::NothingSelected("scene"))
    }

    pub fn image(&self) -> Option<&Image> {
        self.scene()?.images.get(self.image?)
    }

    pub fn image_index(&self) -> Option<usize> {
        self.image
    }

    pub fn positioned_part(&self) -> Option<&PositionedPart> {
        self.scene()?.positioned_parts.get(self.positioned_part?)
    }

    pub fn positioned_part_index(&self) -> Option<usize> {
        self.positioned_part
    }

    fn positioned_part_mut(&mut self) -> Result<&mut PositionedPart> {
        let index = self
            .positioned_part
            .ok_or(CoreError::NothingSelected("positioned part"))?;
        self.scene_mut()?
            .positioned_parts
            .get_mut(index)
            .ok_or(CoreError::NothingSelected("positioned part"))
    }

    // Selection

    pub fn select_scene(&mut self, index: usize) -> Result<()> {
        check_index("scene", index, self.dataset.scenes.len())?;
        self.scene = Some(index);
        let (has_images, has_parts) = self
            .scene()
            .map(|scene| (!scene.images.is_empty(), !scene.positioned_parts.is_empty()))
            .unwrap_or_default();
        self.image = has_images.then_some(0);
        self.positioned_part = has_parts.then_some(0);
        info!(scene = index, "selected scene");
        self.selection_changed()
    }

    pub fn select_image(&mut self, index: usize) -> Result<()> {
        let len = self.scene().map_or(0, |scene| scene.images.len());
        check_index("image", index, len)?;
        self.image = Some(index);
        debug!(image = index, "selected image");
        self.selection_changed()
    }

    pub fn next_image(&mut self) -> Result<()> {
        self.step_image(1)
    }

    pub fn prev_image(&mut self) -> Result<()> {
        self.step_image(-1)
    }

    fn step_image(&mut self, step: isize) -> Result<()> {
        let current = self.image.ok_or(CoreError::NothingSelected("image"))?;
        let len = self.scene().map_or(0, |scene| scene.images.len()) as isize;
        let next = (current as isize + step).rem_euclid(len.max(1));
        self.select_image(next as usize)
    }

    pub fn select_positioned_part(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(index) = index {
            let len = self.scene().map_or(0, |scene| scene.positioned_parts.len());
            check_index("positioned part", index, len)?;
        }
        self.positioned_part = index;
        self.selection_changed()
    }

    pub fn next_positioned_part(&mut self) -> Result<()> {
        let len = self.scene().map_or(0, |scene| scene.positioned_parts.len());
        if len == 0 {
            return Err(CoreError::NothingSelected("positioned part"));
        }
        let next = self.positioned_part.map_or(0, |index| (index + 1) % len);
        self.select_positioned_part(Some(next))
    }

    fn select_last_positioned_part(&mut self) -> Result<()> {
        let len = self.scene().map_or(0, |scene| scene.positioned_parts.len());
        self.select_positioned_part(len.checked_sub(1))
    }

    fn selection_changed(&mut self) -> Result<()> {
        self.clear_correspondences();
        self.recalculate_relative_pose()
    }

    // Positioned parts

    /// Place a new instance at the origin, of the selected part's kind (or the first part)
    pub fn add_positioned_part(&mut self) -> Result<()> {
        let part = match self.positioned_part() {
            Some(positioned) => positioned.part.clone(),
            None => self
                .dataset
                .parts
                .first()
                .cloned()
                .ok_or(CoreError::NothingSelected("part"))?,
        };
        self.scene_mut()?
            .positioned_parts
            .push(PositionedPart::new(part, Pose::identity()));
        self.select_last_positioned_part()
    }

    pub fn duplicate_positioned_part(&mut self) -> Result<()> {
        let copy = self
            .positioned_part()
            .cloned()
            .ok_or(CoreError::NothingSelected("positioned part"))?;
        self.scene_mut()?.positioned_parts.push(copy);
        self.select_last_positioned_part()
    }

    pub fn remove_positioned_part(&mut self, index: usize) -> Result<()> {
        let scene = self.scene_mut()?;
        check_index("positioned part", index, scene.positioned_parts.len())?;
        scene.positioned_parts.remove(index);
        self.select_last_positioned_part()
    }

    /// Change which CAD part the selected placement refers to
    pub fn assign_part(&mut self, part_id: u32) -> Result<()> {
        let part = self.dataset.part(part_id)?.clone();
        self.positioned_part_mut()?.part = part;
        self.clear_correspondences();
        Ok(())
    }

    // Poses

    /// Part-to-world pose of the selected positioned part
    pub fn absolute_pose(&self) -> Option<&Pose> {
        self.positioned_part().map(|positioned| &positioned.pose)
    }

    /// Part-to-camera pose (render convention) for the selected image
    pub fn relative_pose(&self) -> &Pose {
        &self.relative_pose
    }

    pub fn set_absolute_pose(&mut self, pose: &Pose) -> Result<()> {
        self.positioned_part_mut()?.pose.update(pose);
        self.recalculate_relative_pose()
    }

    pub fn set_relative_pose(&mut self, pose: &Pose) -> Result<()> {
        let camera = *self
            .image()
            .ok_or(CoreError::NothingSelected("image"))?
            .render_pose();
        let absolute = Pose::from_ref_to_world(pose, &camera);
        self.positioned_part_mut()?.pose.update(&absolute);
        self.relative_pose.update(pose);
        Ok(())
    }

    /// Move the part by `delta` expressed in its own frame
    pub fn nudge_absolute(&mut self, delta: &Pose) -> Result<()> {
        let moved = self
            .absolute_pose()
            .ok_or(CoreError::NothingSelected("positioned part"))?
            .moved_by(delta);
        self.set_absolute_pose(&moved)
    }

    /// Move the part by `delta` applied to its camera-relative pose
    pub fn nudge_relative(&mut self, delta: &Pose) -> Result<()> {
        let moved = self.relative_pose.moved_by(delta);
        self.set_relative_pose(&moved)
    }

    fn recalculate_relative_pose(&mut self) -> Result<()> {
        let relative = match (self.absolute_pose(), self.image()) {
            (Some(absolute), Some(image)) => {
                Pose::from_world_to_ref(absolute, image.render_pose())?
            }
            _ => Pose::identity(),
        };
        self.relative_pose.update(&relative);
        Ok(())
    }

    // Correspondences

    pub fn correspondences(&self) -> &[Correspondence] {
        &self.correspondences
    }

    pub fn selected_correspondence_index(&self) -> Option<usize> {
        self.selected_correspondence
    }

    pub fn selected_correspondence(&self) -> Option<&Correspondence> {
        self.correspondences.get(self.selected_correspondence?)
    }

    pub fn add_correspondence(&mut self) {
        self.correspondences.push(Correspondence::default());
        self.selected_correspondence = Some(self.correspondences.len() - 1);
    }

    pub fn remove_correspondence(&mut self, index: usize) -> Result<()> {
        check_index("correspondence", index, self.correspondences.len())?;
        self.correspondences.remove(index);
        self.selected_correspondence = self.correspondences.len().checked_sub(1);
        Ok(())
    }

    pub fn select_correspondence(&mut self, index: usize) -> Result<()> {
        check_index("correspondence", index, self.correspondences.len())?;
        self.selected_correspondence = Some(index);
        Ok(())
    }

    pub fn clear_correspondences(&mut self) {
        self.correspondences.clear();
        self.selected_correspondence = None;
    }

    fn selected_correspondence_mut(&mut self) -> Result<&mut Correspondence> {
        let index = self
            .selected_correspondence
            .ok_or(CoreError::NothingSelected("correspondence"))?;
        self.correspondences
            .get_mut(index)
            .ok_or(CoreError::NothingSelected("correspondence"))
    }

    pub fn set_selected_pixel(&mut self, pixel: Point2<f64>) -> Result<()> {
        self.selected_correspondence_mut()?.pixel = pixel;
        Ok(())
    }

    /// Store a part-local surface point on the selected correspondence
    pub fn set_selected_point(&mut self, point: Point3<f64>) -> Result<()> {
        self.selected_correspondence_mut()?.point = point;
        Ok(())
    }

    // Pose solving

    pub fn pose_request(&self) -> Result<PoseRequest> {
        let image = self.image().ok_or(CoreError::NothingSelected("image"))?;
        Ok(PoseRequest::new(&self.correspondences, image.intrinsics()))
    }

    /// Adopt a solver result as the part-to-camera pose
    pub fn apply_solved_pose(&mut self, pose: &Pose) -> Result<()> {
        info!(?pose, "applying solved pose");
        self.set_relative_pose(pose)
    }
}
