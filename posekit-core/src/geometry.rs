/// Indexed triangle meshes used for point picking and proxy rendering
use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::{CoreError, Result};

/// Sine of the corner angle at the first vertex below which a triangle is degenerate
pub const DEGENERATE_SINE_EPSILON: f64 = 1e-12;

/// A triangle given by its three corner positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Point3<f64>; 3],
}

impl Triangle {
    pub fn new(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.normal().is_none()
    }

    /// Unit face normal, `None` for zero-area triangles at any scale
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let [v0, v1, v2] = self.vertices;
        let (edge1, edge2) = (v1 - v0, v2 - v0);
        let cross = edge1.cross(&edge2);
        if cross.norm() > DEGENERATE_SINE_EPSILON * edge1.norm() * edge2.norm() {
            Some(cross.normalize())
        } else {
            None
        }
    }

    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        let [a, b, c] = self.vertices;
        Self::new(
            matrix.transform_point(&a),
            matrix.transform_point(&b),
            matrix.transform_point(&c),
        )
    }
}

/// A mesh of shared vertices and triangles indexing into them
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from flat `xyz` positions and triangle indices
    pub fn from_buffers(positions: &[f64], indices: &[u32]) -> Result<Self> {
        if positions.len() % 3 != 0 {
            return Err(CoreError::ArrayLength {
                expected: positions.len() - positions.len() % 3,
                found: positions.len(),
            });
        }
        if indices.len() % 3 != 0 {
            return Err(CoreError::ArrayLength {
                expected: indices.len() - indices.len() % 3,
                found: indices.len(),
            });
        }

        let vertices: Vec<_> = positions
            .chunks_exact(3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();

        let mut mesh = Self {
            faces: Vec::with_capacity(indices.len() / 3),
            vertices,
        };
        for face in indices.chunks_exact(3) {
            mesh.add_face([face[0] as usize, face[1] as usize, face[2] as usize])?;
        }
        Ok(mesh)
    }

    pub fn add_vertex(&mut self, position: Point3<f64>) -> usize {
        self.vertices.push(position);
        self.vertices.len() - 1
    }

    pub fn add_face(&mut self, face: [usize; 3]) -> Result<()> {
        let len = self.vertices.len();
        if let Some(&index) = face.iter().find(|&&i| i >= len) {
            return Err(CoreError::VertexIndex { index, len });
        }
        self.faces.push(face);
        Ok(())
    }

    pub fn triangle(&self, face: usize) -> Option<Triangle> {
        let [a, b, c] = *self.faces.get(face)?;
        Some(Triangle::new(
            *self.vertices.get(a)?,
            *self.vertices.get(b)?,
            *self.vertices.get(c)?,
        ))
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.faces.len()).filter_map(|face| self.triangle(face))
    }

    /// Axis-aligned cube centred on the origin, faces wound outward
    pub fn cube(size: f64) -> Self {
        let half = size / 2.0;
        let mut mesh = Self::new();
        for &z in &[-half, half] {
            for &y in &[-half, half] {
                for &x in &[-half, half] {
                    mesh.add_vertex(Point3::new(x, y, z));
                }
            }
        }

        // Vertex i has x = bit 0, y = bit 1, z = bit 2
        // Two triangles per side: +z, -z, +y, -y, +x, -x
        mesh.faces = vec![
            [4, 5, 7],
            [4, 7, 6],
            [0, 2, 3],
            [0, 3, 1],
            [2, 6, 7],
            [2, 7, 3],
            [0, 1, 5],
            [0, 5, 4],
            [1, 3, 7],
            [1, 7, 5],
            [0, 4, 6],
            [0, 6, 2],
        ];
        mesh
    }
}
