/// ASCII rasterizer for terminal rendering
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix4, Vector3};
use posekit_core::{Camera, Mesh, Triangle};
use std::io::Write;

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Unselected parts use the lower part of the ramp only
const DIM_RAMP_LEN: usize = 6;

/// ASCII renderer that draws posed meshes as seen by an image's camera
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f64>,
    char_buffer: Vec<char>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f64::INFINITY; size],
            char_buffer: vec![' '; size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f64::INFINITY);
        self.char_buffer.fill(' ');
    }

    pub fn char_at(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.char_buffer[y * self.width + x])
    }

    /// Draw `mesh` placed by `model_matrix`; `highlight` uses the full brightness ramp
    pub fn render_mesh(
        &mut self,
        mesh: &Mesh,
        model_matrix: &Matrix4<f64>,
        camera: &Camera,
        highlight: bool,
    ) {
        let model_view = camera.view_matrix() * model_matrix;
        for triangle in mesh.triangles() {
            self.render_triangle(&triangle, model_matrix, &model_view, camera, highlight);
        }
    }

    fn render_triangle(
        &mut self,
        triangle: &Triangle,
        model_matrix: &Matrix4<f64>,
        model_view: &Matrix4<f64>,
        camera: &Camera,
        highlight: bool,
    ) {
        // Project vertices to screen space
        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (slot, vertex) in screen_coords.iter_mut().zip(&triangle.vertices) {
            let projected = camera.project_to_screen(
                vertex,
                model_matrix,
                self.width as u32,
                self.height as u32,
            );
            match projected {
                Some(coords) => *slot = coords,
                None => return, // Triangle is clipped
            }
        }

        // Shade by how directly the face looks at the camera (+z in view space)
        let Some(normal) = triangle.transformed(model_view).normal() else {
            return;
        };
        let brightness = normal.dot(&Vector3::z()).max(0.0);

        let ramp_len = if highlight { LUMINOSITY_RAMP.len() } else { DIM_RAMP_LEN };
        let char_index = ((brightness * (ramp_len - 1) as f64) as usize).min(ramp_len - 1);
        // Keep back-lit faces visible as outlines
        let character = LUMINOSITY_RAMP[char_index.max(1)];

        self.rasterize_triangle(&screen_coords, character);
    }

    fn rasterize_triangle(&mut self, coords: &[(f64, f64, f64); 3], character: char) {
        let [v0, v1, v2] = *coords;

        // Bounding box clipped to screen bounds
        let min_x = (v0.0.min(v1.0).min(v2.0).floor() as i64).max(0);
        let max_x = (v0.0.max(v1.0).max(v2.0).ceil() as i64).min(self.width as i64 - 1);
        let min_y = (v0.1.min(v1.1).min(v2.1).floor() as i64).max(0);
        let max_y = (v0.1.max(v1.1).max(v2.1).ceil() as i64).min(self.height as i64 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f64 + 0.5;
                let py = y as f64 + 0.5;

                let weights = barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), (px, py));
                let Some((w0, w1, w2)) = weights else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                let idx = y as usize * self.width + x as usize;
                if depth < self.depth_buffer[idx] {
                    self.depth_buffer[idx] = depth;
                    self.char_buffer[idx] = character;
                }
            }
        }
    }

    /// Overlay a marker that ignores depth (cursor, stored pixels)
    pub fn mark(&mut self, x: usize, y: usize, marker: char) {
        if x < self.width && y < self.height {
            self.char_buffer[y * self.width + x] = marker;
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let c = self.char_buffer[y * self.width + x];

                // Color based on character intensity
                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    '#' | '%' | '@' => Color::Cyan,
                    _ => Color::Red,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            writer.queue(Print("\r\n"))?;
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f64, f64),
    v1: (f64, f64),
    v2: (f64, f64),
    p: (f64, f64),
) -> Option<(f64, f64, f64)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-9 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use posekit_core::{Intrinsics, Pose};

    fn camera() -> Camera {
        // Vision camera at the origin looking down +z
        let intrinsics = Intrinsics::new(320.0, 240.0, 320.0, 240.0);
        Camera::new(intrinsics, 640, 480, &Pose::identity()).unwrap()
    }

    #[test]
    fn test_barycentric_centroid() {
        let (w0, w1, w2) = barycentric((0.0, 0.0), (3.0, 0.0), (0.0, 3.0), (1.0, 1.0)).unwrap();
        assert_abs_diff_eq!(w0, 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w1, 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w2, 1.0 / 3.0, epsilon = 1e-12);
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (1.0, 1.0)).is_none());
    }

    #[test]
    fn test_cube_in_front_covers_centre() {
        let mut renderer = AsciiRenderer::new(40, 20);
        let model = Pose::new(0.0, 0.0, 10.0, 0.0, 0.0, 0.0).to_matrix();
        renderer.render_mesh(&Mesh::cube(4.0), &model, &camera(), true);
        assert_ne!(renderer.char_at(20, 10), Some(' '));
        assert_eq!(renderer.char_at(0, 0), Some(' '));
    }

    #[test]
    fn test_cube_behind_is_clipped() {
        let mut renderer = AsciiRenderer::new(40, 20);
        let model = Pose::new(0.0, 0.0, -10.0, 0.0, 0.0, 0.0).to_matrix();
        renderer.render_mesh(&Mesh::cube(4.0), &model, &camera(), true);
        assert!((0..20).all(|y| (0..40).all(|x| renderer.char_at(x, y) == Some(' '))));
    }

    #[test]
    fn test_mark_and_clear() {
        let mut renderer = AsciiRenderer::new(4, 4);
        renderer.mark(1, 2, '+');
        renderer.mark(9, 9, '+');
        assert_eq!(renderer.char_at(1, 2), Some('+'));
        renderer.clear();
        assert_eq!(renderer.char_at(1, 2), Some(' '));
    }
}
