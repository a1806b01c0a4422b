/// PoseKit Core Library - geometry for 6-DOF pose annotation
///
/// Stateless pose algebra, camera projection from intrinsics and surface
/// point picking, plus the dataset model and editing session built on them.
/// All angles are degrees, all lengths are in the dataset's units.

pub mod dataset;
pub mod error;
pub mod geometry;
pub mod model;
pub mod picking;
pub mod pose;
pub mod projection;
pub mod session;
pub mod transform;

// Re-export commonly used types
pub use dataset::{parse_solved_pose, PoseRequest};
pub use error::{CoreError, Result};
pub use geometry::{Mesh, Triangle};
pub use model::{Correspondence, Dataset, Image, Part, PositionedPart, Scene};
pub use picking::{pick_point, raycast, Hit, Ray};
pub use pose::Pose;
pub use projection::{projection_matrix, render_to_vision, vision_to_render, Camera, Intrinsics};
pub use session::Session;
pub use transform::{EulerAngles, Transform};
