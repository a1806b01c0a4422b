/// Euler-angle rotations and rigid 4x4 transforms
use nalgebra::{Matrix4, Rotation3, Vector3};

/// Pitch cosine below which roll and yaw share an axis (gimbal lock)
pub const GIMBAL_EPSILON: f64 = 1e-9;

/// Rotation about x, y and z (in degrees), applied intrinsically in that order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub w: f64,
    pub p: f64,
    pub r: f64,
}

impl EulerAngles {
    pub fn new(w: f64, p: f64, r: f64) -> Self {
        Self { w, p, r }
    }

    pub fn zero() -> Self {
        Self {
            w: 0.0,
            p: 0.0,
            r: 0.0,
        }
    }
}

impl Default for EulerAngles {
    fn default() -> Self {
        Self::zero()
    }
}

/// Transform builder for rigid 3D transformations
pub struct Transform;

impl Transform {
    /// Create a rotation from Euler angles: `Rx(w) * Ry(p) * Rz(r)`
    pub fn rotation_matrix(angles: &EulerAngles) -> Rotation3<f64> {
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), angles.w.to_radians());
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), angles.p.to_radians());
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), angles.r.to_radians());

        rx * ry * rz
    }

    /// Recover Euler angles from the rotation block of a rigid transform.
    ///
    /// At pitch ±90° only `w ± r` is observable; `r` is then reported as zero.
    pub fn euler_angles(matrix: &Matrix4<f64>) -> EulerAngles {
        let m00 = matrix[(0, 0)];
        let m01 = matrix[(0, 1)];
        let m02 = matrix[(0, 2)];

        let cos_p = m00.hypot(m01);
        let p = m02.atan2(cos_p);

        let (w, r) = if cos_p > GIMBAL_EPSILON {
            ((-matrix[(1, 2)]).atan2(matrix[(2, 2)]), (-m01).atan2(m00))
        } else {
            (matrix[(2, 1)].atan2(matrix[(1, 1)]), 0.0)
        };

        EulerAngles::new(w.to_degrees(), p.to_degrees(), r.to_degrees())
    }

    /// Create a translation matrix
    pub fn translation_matrix(x: f64, y: f64, z: f64) -> Matrix4<f64> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// Compose a rotation and a translation into a homogeneous rigid transform
    pub fn rigid(rotation: &Rotation3<f64>, translation: &Vector3<f64>) -> Matrix4<f64> {
        Self::translation_matrix(translation.x, translation.y, translation.z)
            * rotation.to_homogeneous()
    }

    /// Inverse of a rigid transform, computed from the transposed rotation block
    pub fn rigid_inverse(matrix: &Matrix4<f64>) -> Matrix4<f64> {
        let rotation_t = matrix.fixed_view::<3, 3>(0, 0).transpose();
        let translation = matrix.fixed_view::<3, 1>(0, 3).into_owned();
        let inverse_translation = -(rotation_t * translation);

        let mut result = Matrix4::identity();
        result.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation_t);
        result
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&inverse_translation);
        result
    }

    /// Create a model-view-projection matrix
    pub fn mvp_matrix(
        model: &Matrix4<f64>,
        view: &Matrix4<f64>,
        projection: &Matrix4<f64>,
    ) -> Matrix4<f64> {
        projection * view * model
    }
}
