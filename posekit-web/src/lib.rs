/// PoseKit Web - WASM bindings for the pose and picking core
///
/// Poses cross the boundary as `[x, y, z, w, p, r]`, matrices as flat
/// column-major arrays (16 values for a pose, 9 for a camera matrix).
use nalgebra::{Matrix4, Point3};
use posekit_core::{CoreError, Intrinsics, Mesh, Pose, Ray};
use wasm_bindgen::prelude::*;

type CoreResult<T> = posekit_core::Result<T>;

fn to_js(err: CoreError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn expect_len(values: &[f64], expected: usize) -> CoreResult<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(CoreError::ArrayLength {
            expected,
            found: values.len(),
        })
    }
}

fn read_pose(values: &[f64]) -> CoreResult<Pose> {
    expect_len(values, 6)?;
    Ok(Pose::new(values[0], values[1], values[2], values[3], values[4], values[5]))
}

fn write_pose(pose: &Pose) -> Vec<f64> {
    vec![pose.x, pose.y, pose.z, pose.w, pose.p, pose.r]
}

fn read_point(values: &[f64]) -> CoreResult<Point3<f64>> {
    expect_len(values, 3)?;
    Ok(Point3::new(values[0], values[1], values[2]))
}

fn ref_to_world(child: &[f64], reference: &[f64]) -> CoreResult<Vec<f64>> {
    let pose = Pose::from_ref_to_world(&read_pose(child)?, &read_pose(reference)?);
    Ok(write_pose(&pose))
}

fn world_to_ref(child: &[f64], reference: &[f64]) -> CoreResult<Vec<f64>> {
    let pose = Pose::from_world_to_ref(&read_pose(child)?, &read_pose(reference)?)?;
    Ok(write_pose(&pose))
}

fn projection(camera_matrix: &[f64], width: u32, height: u32) -> CoreResult<Vec<f64>> {
    let intrinsics = Intrinsics::from_column_slice(camera_matrix)?;
    let matrix = posekit_core::projection_matrix(&intrinsics, width, height)?;
    Ok(matrix.as_slice().to_vec())
}

fn pick(
    positions: &[f64],
    indices: &[u32],
    world: &[f64],
    origin: &[f64],
    direction: &[f64],
    snap: bool,
) -> CoreResult<Option<Vec<f64>>> {
    let mesh = Mesh::from_buffers(positions, indices)?;
    expect_len(world, 16)?;
    let world = Matrix4::from_column_slice(world);
    let ray = Ray::new(read_point(origin)?, read_point(direction)?.coords);
    Ok(posekit_core::pick_point(&mesh, &world, &ray, snap).map(|p| vec![p.x, p.y, p.z]))
}

/// Column-major homogeneous matrix of a `[x, y, z, w, p, r]` pose
#[wasm_bindgen]
pub fn pose_to_matrix(pose: &[f64]) -> Result<Vec<f64>, JsValue> {
    let pose = read_pose(pose).map_err(to_js)?;
    Ok(pose.to_column_array().to_vec())
}

#[wasm_bindgen]
pub fn pose_from_matrix(matrix: &[f64]) -> Result<Vec<f64>, JsValue> {
    let pose = Pose::from_column_slice(matrix).map_err(to_js)?;
    Ok(write_pose(&pose))
}

#[wasm_bindgen]
pub fn pose_ref_to_world(child: &[f64], reference: &[f64]) -> Result<Vec<f64>, JsValue> {
    ref_to_world(child, reference).map_err(to_js)
}

#[wasm_bindgen]
pub fn pose_world_to_ref(child: &[f64], reference: &[f64]) -> Result<Vec<f64>, JsValue> {
    world_to_ref(child, reference).map_err(to_js)
}

/// Render projection matrix for a column-major camera matrix and image size
#[wasm_bindgen]
pub fn projection_matrix(
    camera_matrix: &[f64],
    width: u32,
    height: u32,
) -> Result<Vec<f64>, JsValue> {
    projection(camera_matrix, width, height).map_err(to_js)
}

#[wasm_bindgen]
pub fn vision_to_render(pose: &[f64]) -> Result<Vec<f64>, JsValue> {
    let pose = read_pose(pose).map_err(to_js)?;
    Ok(write_pose(&posekit_core::vision_to_render(&pose)))
}

#[wasm_bindgen]
pub fn render_to_vision(pose: &[f64]) -> Result<Vec<f64>, JsValue> {
    let pose = read_pose(pose).map_err(to_js)?;
    Ok(write_pose(&posekit_core::render_to_vision(&pose)))
}

/// World-space surface point hit by the ray, `undefined` on a miss
#[wasm_bindgen]
pub fn pick_point(
    positions: &[f64],
    indices: &[u32],
    world: &[f64],
    origin: &[f64],
    direction: &[f64],
    snap: bool,
) -> Result<Option<Vec<f64>>, JsValue> {
    pick(positions, indices, world, origin, direction, snap).map_err(to_js)
}
