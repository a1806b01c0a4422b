/// Surface point picking: cast a ray against a posed mesh and return the
/// closest hit, optionally snapped to the nearest corner of the hit triangle.
///
/// Each call is independent of the previous one, so it can run on every
/// pointer move as well as on the final click.

use nalgebra::{Matrix4, Point3, Vector3};
use tracing::debug;

use crate::geometry::{Mesh, Triangle};

/// Determinant threshold, relative to the edge lengths, below which a ray is
/// parallel to a triangle
const PARALLEL_EPSILON: f64 = 1e-12;

/// Half-line starting at `origin`, `direction` is unit length (or zero)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    /// A zero `direction` produces a ray that intersects nothing
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self {
            origin,
            direction: direction
                .try_normalize(f64::EPSILON)
                .unwrap_or_else(Vector3::zeros),
        }
    }

    pub fn at(&self, distance: f64) -> Point3<f64> {
        self.origin + self.direction * distance
    }
}

/// Closest intersection of a ray with a mesh, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub distance: f64,
    pub point: Point3<f64>,
    pub face: usize,
    /// The hit face with its corners in world space
    pub triangle: Triangle,
}

/// Ray-triangle intersection using the Möller–Trumbore algorithm.
///
/// Returns the ray parameter of the hit. Degenerate triangles never hit.
pub fn intersect_triangle(ray: &Ray, triangle: &Triangle) -> Option<f64> {
    if triangle.is_degenerate() {
        return None;
    }

    let [v0, v1, v2] = triangle.vertices;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = ray.direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < PARALLEL_EPSILON * edge1.norm() * edge2.norm() {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * ray.direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    if t > 0.0 && t.is_finite() {
        Some(t)
    } else {
        None
    }
}

/// Closest hit of a world-space `ray` on `mesh` placed by `world`
pub fn raycast(mesh: &Mesh, world: &Matrix4<f64>, ray: &Ray) -> Option<Hit> {
    let mut closest: Option<Hit> = None;

    for face in 0..mesh.faces.len() {
        let Some(local) = mesh.triangle(face) else {
            continue;
        };
        let triangle = local.transformed(world);
        let Some(distance) = intersect_triangle(ray, &triangle) else {
            continue;
        };
        if closest.map_or(true, |hit| distance < hit.distance) {
            closest = Some(Hit {
                distance,
                point: ray.at(distance),
                face,
                triangle,
            });
        }
    }

    closest
}

/// Corner of `triangle` closest to `point`; ties prefer the first, then the second corner
pub fn nearest_vertex(point: &Point3<f64>, triangle: &Triangle) -> Point3<f64> {
    let [a, b, c] = triangle.vertices;
    let da = nalgebra::distance(point, &a);
    let db = nalgebra::distance(point, &b);
    let dc = nalgebra::distance(point, &c);

    if da <= db && da <= dc {
        a
    } else if db <= dc {
        b
    } else {
        c
    }
}

/// Resolve a world-space ray to a world-space surface point.
///
/// `None` when the ray misses every (non-degenerate) triangle.
pub fn pick_point(mesh: &Mesh, world: &Matrix4<f64>, ray: &Ray, snap: bool) -> Option<Point3<f64>> {
    let hit = raycast(mesh, world, ray)?;
    let point = if snap {
        nearest_vertex(&hit.point, &hit.triangle)
    } else {
        hit.point
    };
    debug!(face = hit.face, snap, x = point.x, y = point.y, z = point.z, "picked surface point");
    Some(point)
}
