/// JSON wire format exchanged with the dataset service.
///
/// Matrices travel as flat column-major arrays: 9 values for a camera matrix,
/// 16 for a pose. Camera poses are stored in the vision convention; the
/// render-convention pose used on screen is derived again on load.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Correspondence, Dataset, Image, Part, PositionedPart, Scene};
use crate::pose::Pose;
use crate::projection::Intrinsics;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetRecord {
    scenes: Vec<SceneRecord>,
    parts: Vec<PartRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartRecord {
    id: u32,
    cad_path: String,
    #[serde(default)]
    texture_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneRecord {
    id: RecordId,
    images: Vec<ImageRecord>,
    positioned_parts: Vec<PositionedPartRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageRecord {
    id: RecordId,
    path: String,
    width: u32,
    height: u32,
    camera_matrix: Vec<f64>,
    camera_pose: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionedPartRecord {
    pose: Vec<f64>,
    part: PartRecord,
}

/// Ids are written by the service as strings or bare integers
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Number(i64),
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Text(text) => text,
            RecordId::Number(number) => number.to_string(),
        }
    }
}

impl From<PartRecord> for Part {
    fn from(record: PartRecord) -> Self {
        let texture_path = record.texture_path.filter(|path| !path.is_empty());
        Part::new(record.id, record.cad_path, texture_path)
    }
}

impl From<&Part> for PartRecord {
    fn from(part: &Part) -> Self {
        Self {
            id: part.id,
            cad_path: part.cad_path.clone(),
            texture_path: Some(part.texture_path.clone().unwrap_or_default()),
        }
    }
}

impl ImageRecord {
    fn into_image(self) -> Result<Image> {
        let intrinsics = Intrinsics::from_column_slice(&self.camera_matrix)?;
        let camera_pose = Pose::from_column_slice(&self.camera_pose)?;
        Image::new(
            self.id,
            self.path,
            self.width,
            self.height,
            intrinsics,
            camera_pose,
        )
    }

    fn from_image(image: &Image) -> Self {
        Self {
            id: RecordId::Text(image.id.clone()),
            path: image.path.clone(),
            width: image.width(),
            height: image.height(),
            camera_matrix: image.intrinsics().to_column_array().to_vec(),
            camera_pose: image.camera_pose().to_column_array().to_vec(),
        }
    }
}

impl SceneRecord {
    fn into_scene(self, parts: &Dataset) -> Result<Scene> {
        let images = self
            .images
            .into_iter()
            .map(ImageRecord::into_image)
            .collect::<Result<Vec<_>>>()?;

        let positioned_parts = self
            .positioned_parts
            .into_iter()
            .map(|record| {
                let part = parts.part(record.part.id)?.clone();
                let pose = Pose::from_column_slice(&record.pose)?;
                Ok(PositionedPart::new(part, pose))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Scene {
            id: self.id.into(),
            images,
            positioned_parts,
        })
    }

    fn from_scene(scene: &Scene) -> Self {
        Self {
            id: RecordId::Text(scene.id.clone()),
            images: scene.images.iter().map(ImageRecord::from_image).collect(),
            positioned_parts: scene
                .positioned_parts
                .iter()
                .map(|positioned| PositionedPartRecord {
                    pose: positioned.pose.to_column_array().to_vec(),
                    part: PartRecord::from(&positioned.part),
                })
                .collect(),
        }
    }
}

impl Dataset {
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_record(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_record(serde_json::from_reader(reader)?)
    }

    pub fn to_json(&self) -> Result<String> {
        let record = DatasetRecord {
            scenes: self.scenes.iter().map(SceneRecord::from_scene).collect(),
            parts: self.parts.iter().map(PartRecord::from).collect(),
        };
        Ok(serde_json::to_string(&record)?)
    }

    fn from_record(record: DatasetRecord) -> Result<Self> {
        let mut dataset = Dataset {
            scenes: Vec::with_capacity(record.scenes.len()),
            parts: record.parts.into_iter().map(Part::from).collect(),
        };
        for scene in record.scenes {
            let scene = scene.into_scene(&dataset)?;
            dataset.scenes.push(scene);
        }
        tracing::info!(
            scenes = dataset.scenes.len(),
            parts = dataset.parts.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }
}

/// Input for the external pose solver (PnP over the correspondences)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseRequest {
    pub points: Vec<[f64; 3]>,
    pub pixels: Vec<[f64; 2]>,
    pub camera_matrix: [f64; 9],
}

impl PoseRequest {
    pub fn new(correspondences: &[Correspondence], intrinsics: &Intrinsics) -> Self {
        Self {
            points: correspondences
                .iter()
                .map(|c| [c.point.x, c.point.y, c.point.z])
                .collect(),
            pixels: correspondences.iter().map(|c| [c.pixel.x, c.pixel.y]).collect(),
            camera_matrix: intrinsics.to_column_array(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Read the solver's answer: a column-major part-to-camera matrix
pub fn parse_solved_pose(json: &str) -> Result<Pose> {
    let elements: Vec<f64> = serde_json::from_str(json)?;
    Pose::from_column_slice(&elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Point2, Point3};

    const IDENTITY: &str = "[1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1]";

    fn sample(image_id: &str, part_id: u32) -> String {
        format!(
            r#"{{
                "parts": [{{
                    "id": 1,
                    "cadPath": "/api/cdn/models/obj_000001.ply",
                    "texturePath": ""
                }}],
                "scenes": [{{
                    "id": "000001",
                    "images": [{{
                        "id": {image_id},
                        "path": "/api/cdn/real/000001/rgb/000000.png",
                        "width": 640,
                        "height": 480,
                        "cameraMatrix": [1000,0,0, 0,1000,0, 320,240,1],
                        "cameraPose": {IDENTITY}
                    }}],
                    "positionedParts": [{{
                        "pose": [1,0,0,0, 0,1,0,0, 0,0,1,0, 10,20,300,1],
                        "part": {{"id": {part_id}, "cadPath": "x", "texturePath": ""}}
                    }}]
                }}]
            }}"#
        )
    }

    #[test]
    fn test_load_dataset() {
        let dataset = Dataset::from_json(&sample("\"0\"", 1)).unwrap();
        assert_eq!(dataset.parts[0].texture_path, None);

        let scene = &dataset.scenes[0];
        assert_eq!(scene.id, "000001");
        assert_eq!(scene.images[0].intrinsics().cx, 320.0);

        let positioned = &scene.positioned_parts[0];
        assert_eq!(positioned.part.cad_path, "/api/cdn/models/obj_000001.ply");
        assert_eq!(positioned.pose.translation(), nalgebra::Vector3::new(10.0, 20.0, 300.0));
    }

    #[test]
    fn test_numeric_image_id() {
        let dataset = Dataset::from_json(&sample("7", 1)).unwrap();
        assert_eq!(dataset.scenes[0].images[0].id, "7");
    }

    #[test]
    fn test_unknown_part_rejected() {
        let result = Dataset::from_json(&sample("\"0\"", 2));
        assert!(matches!(result, Err(CoreError::UnknownPart(2))));
    }

    #[test]
    fn test_save_writes_vision_pose() {
        let mut dataset = Dataset::from_json(&sample("\"0\"", 1)).unwrap();
        let image = &mut dataset.scenes[0].images[0];
        let render = Pose::new(1.0, 2.0, 3.0, 170.0, 10.0, 5.0);
        image.set_render_pose(render);
        let vision = *image.camera_pose();

        let reloaded = Dataset::from_json(&dataset.to_json().unwrap()).unwrap();
        let image = &reloaded.scenes[0].images[0];
        assert_abs_diff_eq!(image.camera_pose().to_matrix(), vision.to_matrix(), epsilon = 1e-9);
        assert_abs_diff_eq!(image.render_pose().to_matrix(), render.to_matrix(), epsilon = 1e-9);
    }

    #[test]
    fn test_pose_request_shape() {
        let correspondences = [Correspondence::new(
            Point2::new(10.0, 20.0),
            Point3::new(1.0, 2.0, 3.0),
        )];
        let intrinsics = Intrinsics::new(500.0, 500.0, 320.0, 240.0);
        let request = PoseRequest::new(&correspondences, &intrinsics);
        let json: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(json["points"][0][2], 3.0);
        assert_eq!(json["pixels"][0][1], 20.0);
        assert_eq!(json["cameraMatrix"][6], 320.0);
    }

    #[test]
    fn test_parse_solved_pose() {
        let pose = parse_solved_pose(IDENTITY).unwrap();
        assert_eq!(pose, Pose::identity());
        assert!(parse_solved_pose("[1, 2, 3]").is_err());
    }
}
