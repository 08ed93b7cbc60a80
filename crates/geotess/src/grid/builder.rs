//! Icosahedral grid construction by recursive edge bisection.

use super::Grid;
use crate::error::{GeoTessError, Result};
use crate::geometry::{self, Vec3};
use chrono::Utc;
use std::collections::HashMap;
use tracing::info;

/// Builds grids made of one or more icosahedral tessellations.
///
/// All tessellations share one vertex table: a midpoint created by one
/// tessellation is reused by every other tessellation that bisects the same
/// edge.
#[derive(Debug, Clone)]
pub struct GridBuilder {
    tessellation_levels: Vec<usize>,
    software_version: String,
}

impl Default for GridBuilder {
    fn default() -> Self {
        Self {
            tessellation_levels: Vec::new(),
            software_version: format!("geotess-rs {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GridBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A grid with one tessellation of `levels` levels (20, 80, 320, ... triangles).
    pub fn icosahedral(levels: usize) -> Result<Grid> {
        Self::new().tessellation(levels).build()
    }

    /// Append a tessellation with `levels` levels.
    pub fn tessellation(mut self, levels: usize) -> Self {
        self.tessellation_levels.push(levels);
        self
    }

    pub fn software_version(mut self, version: impl Into<String>) -> Self {
        self.software_version = version.into();
        self
    }

    pub fn build(self) -> Result<Grid> {
        if self.tessellation_levels.is_empty() {
            return Err(GeoTessError::invalid_argument(
                "grid needs at least one tessellation",
            ));
        }
        if let Some(&bad) = self.tessellation_levels.iter().find(|&&n| n == 0 || n > 12) {
            return Err(GeoTessError::invalid_argument(format!(
                "tessellation level count {} outside 1..=12",
                bad
            )));
        }

        let (mut vertices, base) = icosahedron();
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut tessellations = Vec::new();
        let mut levels = Vec::new();
        let mut triangles: Vec<[usize; 3]> = Vec::new();

        for &n_levels in &self.tessellation_levels {
            let first_level = levels.len();
            let mut current = base.clone();
            for level in 0..n_levels {
                if level > 0 {
                    current = subdivide(&current, &mut vertices, &mut midpoints);
                }
                levels.push([triangles.len(), triangles.len() + current.len()]);
                triangles.extend_from_slice(&current);
            }
            tessellations.push([first_level, levels.len()]);
        }

        let grid = Grid::from_parts(
            tessellations,
            levels,
            vertices,
            triangles,
            self.software_version,
            Utc::now().format("%a %b %d %H:%M:%S UTC %Y").to_string(),
            None,
        )?;
        info!(
            tessellations = grid.tessellation_count(),
            triangles = grid.triangle_count(),
            vertices = grid.vertex_count(),
            grid_id = %grid.grid_id(),
            "Built icosahedral grid"
        );
        Ok(grid)
    }
}

/// The 12 vertices and 20 clockwise faces of a regular icosahedron with a
/// vertex at each pole.
fn icosahedron() -> (Vec<Vec3>, Vec<[usize; 3]>) {
    let ring_lat = 0.5f64.atan();
    let mut vertices = vec![[0.0, 0.0, 1.0], [0.0, 0.0, -1.0]];
    for i in 0..5 {
        let lon = (72.0 * i as f64).to_radians();
        vertices.push([ring_lat.cos() * lon.cos(), ring_lat.cos() * lon.sin(), ring_lat.sin()]);
    }
    for i in 0..5 {
        let lon = (36.0 + 72.0 * i as f64).to_radians();
        vertices.push([ring_lat.cos() * lon.cos(), ring_lat.cos() * lon.sin(), -ring_lat.sin()]);
    }

    let upper = |i: usize| 2 + i % 5;
    let lower = |i: usize| 7 + i % 5;
    let mut faces = Vec::with_capacity(20);
    for i in 0..5 {
        faces.push([0, upper(i), upper(i + 1)]);
    }
    for i in 0..5 {
        faces.push([upper(i), lower(i), upper(i + 1)]);
        faces.push([lower(i), lower(i + 1), upper(i + 1)]);
    }
    for i in 0..5 {
        faces.push([1, lower(i + 1), lower(i)]);
    }

    for f in faces.iter_mut() {
        let (a, b, c) = (&vertices[f[0]], &vertices[f[1]], &vertices[f[2]]);
        if geometry::scalar_triple_product(a, b, c) > 0.0 {
            f.swap(1, 2);
        }
    }
    (vertices, faces)
}

/// Split every triangle into four. The central child is listed last.
fn subdivide(
    parents: &[[usize; 3]],
    vertices: &mut Vec<Vec3>,
    midpoints: &mut HashMap<(usize, usize), usize>,
) -> Vec<[usize; 3]> {
    let mut children = Vec::with_capacity(parents.len() * 4);
    for &[a, b, c] in parents {
        let ab = midpoint(a, b, vertices, midpoints);
        let bc = midpoint(b, c, vertices, midpoints);
        let ca = midpoint(c, a, vertices, midpoints);
        children.push([a, ab, ca]);
        children.push([ab, b, bc]);
        children.push([ca, bc, c]);
        children.push([ab, bc, ca]);
    }
    children
}

fn midpoint(
    a: usize,
    b: usize,
    vertices: &mut Vec<Vec3>,
    midpoints: &mut HashMap<(usize, usize), usize>,
) -> usize {
    let key = (a.min(b), a.max(b));
    *midpoints.entry(key).or_insert_with(|| {
        let mut m = geometry::add(&vertices[a], &vertices[b]);
        geometry::normalize(&mut m);
        vertices.push(m);
        vertices.len() - 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icosahedron_is_clockwise() {
        let (vertices, faces) = icosahedron();
        assert_eq!(vertices.len(), 12);
        assert_eq!(faces.len(), 20);
        for f in faces {
            let t = geometry::scalar_triple_product(&vertices[f[0]], &vertices[f[1]], &vertices[f[2]]);
            assert!(t < 0.0);
        }
    }

    #[test]
    fn test_multiple_tessellations_share_vertices() {
        let grid = GridBuilder::new().tessellation(2).tessellation(3).build().unwrap();
        assert_eq!(grid.tessellation_count(), 2);
        assert_eq!(grid.level_count(0), 2);
        assert_eq!(grid.level_count(1), 3);
        assert_eq!(grid.triangle_count(), 20 + 80 + 20 + 80 + 320);
        assert_eq!(grid.vertex_count(), 162);
        grid.test_grid().unwrap();
    }

    #[test]
    fn test_rejects_bad_levels() {
        assert!(GridBuilder::new().build().is_err());
        assert!(GridBuilder::icosahedral(0).is_err());
    }
}
