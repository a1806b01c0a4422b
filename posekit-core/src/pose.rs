/// Rigid 6-DOF poses and their conversion to and from homogeneous transforms.
///
/// A [`Pose`] stores a translation `(x, y, z)` and Euler angles `(w, p, r)` in
/// degrees. The rotation is applied about x, then y, then z (intrinsic), and
/// the translation afterwards, so `to_matrix` always yields a rigid transform
/// with an orthonormal rotation block.
///
/// Decomposition is exact away from pitch ±90°. At the singularity only the
/// sum (or difference) of `w` and `r` is defined, and `from_matrix` returns a
/// decomposition with `r = 0` that produces the same matrix.

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::transform::{EulerAngles, Transform};

/// Translation in scene units plus x/y/z Euler angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
    pub p: f64,
    pub r: f64,
}

impl Pose {
    pub const fn new(x: f64, y: f64, z: f64, w: f64, p: f64, r: f64) -> Self {
        Self { x, y, z, w, p, r }
    }

    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn angles(&self) -> EulerAngles {
        EulerAngles::new(self.w, self.p, self.r)
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.z, self.w, self.p, self.r]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Build the homogeneous transform: rotation first, then translation
    pub fn to_matrix(&self) -> Matrix4<f64> {
        Transform::rigid(
            &Transform::rotation_matrix(&self.angles()),
            &self.translation(),
        )
    }

    /// Decompose a rigid transform. Scale or shear in `matrix` is not supported.
    pub fn from_matrix(matrix: &Matrix4<f64>) -> Self {
        let angles = Transform::euler_angles(matrix);
        Self::new(
            matrix[(0, 3)],
            matrix[(1, 3)],
            matrix[(2, 3)],
            angles.w,
            angles.p,
            angles.r,
        )
    }

    /// Re-express `child_in_ref` in the frame that `ref_to_world` is expressed in
    pub fn from_ref_to_world(child_in_ref: &Pose, ref_to_world: &Pose) -> Self {
        Self::from_matrix(&(ref_to_world.to_matrix() * child_in_ref.to_matrix()))
    }

    /// Re-express a world pose relative to the frame `ref_to_world`
    pub fn from_world_to_ref(child_in_world: &Pose, ref_to_world: &Pose) -> Result<Self> {
        if !ref_to_world.is_finite() {
            return Err(CoreError::SingularTransform);
        }
        let world_to_ref = ref_to_world
            .to_matrix()
            .try_inverse()
            .ok_or(CoreError::SingularTransform)?;
        Ok(Self::from_matrix(&(world_to_ref * child_in_world.to_matrix())))
    }

    /// Apply `delta` in this pose's own local frame
    pub fn moved_by(&self, delta: &Pose) -> Self {
        Self::from_matrix(&(self.to_matrix() * delta.to_matrix()))
    }

    /// Overwrite all six fields from `source` without replacing `self`
    pub fn update(&mut self, source: &Pose) {
        self.x = source.x;
        self.y = source.y;
        self.z = source.z;
        self.w = source.w;
        self.p = source.p;
        self.r = source.r;
    }

    /// Column-major 4x4 elements, the layout used by the dataset files
    pub fn to_column_array(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.to_matrix().as_slice());
        out
    }

    pub fn from_column_slice(elements: &[f64]) -> Result<Self> {
        if elements.len() != 16 {
            return Err(CoreError::ArrayLength {
                expected: 16,
                found: elements.len(),
            });
        }
        Ok(Self::from_matrix(&Matrix4::from_column_slice(elements)))
    }
}
