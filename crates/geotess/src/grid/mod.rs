//! Multi-resolution triangulated mesh on the unit sphere.
//!
//! A [`Grid`] owns one deduplicated vertex table and any number of
//! tessellations. Each tessellation is an ordered run of levels, and each
//! level an ordered run of triangles, so every structure is addressed by a
//! global index:
//!
//! ```text
//! tessellations[tess] = [first_level, last_level + 1)
//! levels[level]       = [first_triangle, last_triangle + 1)
//! triangles[t]        = [v0, v1, v2]   (clockwise seen from outside)
//! ```
//!
//! Neighbor `c` of a triangle is the triangle across the edge opposite
//! corner `c`. The descendant of a triangle is the triangle on the next
//! level that contains its centroid.

mod builder;

pub use builder::GridBuilder;

use crate::error::{GeoTessError, Result};
use crate::geometry::{self, Vec3};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Tolerance used by the walking search when testing edge planes.
const WALK_TOLERANCE: f64 = -1e-15;

/// Immutable spherical triangle mesh organized into tessellations and levels.
#[derive(Debug)]
pub struct Grid {
    tessellations: Vec<[usize; 2]>,
    levels: Vec<[usize; 2]>,
    vertices: Vec<Vec3>,
    triangles: Vec<[usize; 3]>,

    neighbors: Vec<[i32; 3]>,
    edge_normals: Vec<[Vec3; 3]>,
    descendants: Vec<i32>,
    /// Global level index of every triangle.
    triangle_levels: Vec<usize>,
    /// Tessellation index of every level.
    level_tessellations: Vec<usize>,

    grid_id: String,
    software_version: String,
    generation_date: String,
    input_file: Option<PathBuf>,

    /// Circumcenter unit vector plus cos(circumradius), computed on first use.
    circumcenters: OnceCell<Vec<[f64; 4]>>,
}

impl Grid {
    /// Assemble a grid from its raw tables.
    ///
    /// When `grid_id` is `None` or empty, the content hash is computed.
    pub fn from_parts(
        tessellations: Vec<[usize; 2]>,
        levels: Vec<[usize; 2]>,
        vertices: Vec<Vec3>,
        triangles: Vec<[usize; 3]>,
        software_version: impl Into<String>,
        generation_date: impl Into<String>,
        grid_id: Option<String>,
    ) -> Result<Self> {
        if tessellations.is_empty() {
            return Err(GeoTessError::malformed_grid("grid has no tessellations"));
        }
        check_ranges(&tessellations, levels.len(), "tessellation", "levels")?;
        check_ranges(&levels, triangles.len(), "level", "triangles")?;
        if let Some((t, tri)) = triangles
            .iter()
            .enumerate()
            .find(|(_, tri)| tri.iter().any(|&v| v >= vertices.len()))
        {
            return Err(GeoTessError::malformed_grid(format!(
                "triangle {} references vertex {:?} but grid has {} vertices",
                t,
                tri,
                vertices.len()
            )));
        }

        let mut triangle_levels = vec![0; triangles.len()];
        for (level, range) in levels.iter().enumerate() {
            for t in range[0]..range[1] {
                triangle_levels[t] = level;
            }
        }
        let mut level_tessellations = vec![0; levels.len()];
        for (tess, range) in tessellations.iter().enumerate() {
            for level in range[0]..range[1] {
                level_tessellations[level] = tess;
            }
        }

        let mut grid = Self {
            tessellations,
            levels,
            vertices,
            triangles,
            neighbors: Vec::new(),
            edge_normals: Vec::new(),
            descendants: Vec::new(),
            triangle_levels,
            level_tessellations,
            grid_id: String::new(),
            software_version: software_version.into(),
            generation_date: generation_date.into(),
            input_file: None,
            circumcenters: OnceCell::new(),
        };
        grid.initialize();

        grid.grid_id = match grid_id {
            Some(id) if !id.is_empty() => id,
            _ => grid.compute_grid_id(),
        };

        debug!(
            grid_id = %grid.grid_id,
            tessellations = grid.tessellations.len(),
            triangles = grid.triangles.len(),
            vertices = grid.vertices.len(),
            "Grid assembled"
        );
        Ok(grid)
    }

    /// Load a grid from a binary or ASCII grid file, or from a model file
    /// that embeds its grid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        crate::codec::read_grid_file(path.as_ref())
    }

    /// Write the grid. Files ending in `.ascii` are written as text.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::codec::write_grid_file(self, path.as_ref())
    }

    /// Rebuild neighbors, edge normals and descendants from the triangle table.
    fn initialize(&mut self) {
        self.neighbors = vec![[-1; 3]; self.triangles.len()];
        for range in &self.levels {
            let mut edges: HashMap<(usize, usize), usize> =
                HashMap::with_capacity((range[1] - range[0]) * 3);
            for t in range[0]..range[1] {
                let tri = self.triangles[t];
                for c in 0..3 {
                    edges.insert((tri[(c + 1) % 3], tri[(c + 2) % 3]), t);
                }
            }
            for t in range[0]..range[1] {
                let tri = self.triangles[t];
                for c in 0..3 {
                    let (vj, vk) = (tri[(c + 1) % 3], tri[(c + 2) % 3]);
                    if let Some(&n) = edges.get(&(vk, vj)) {
                        self.neighbors[t][c] = n as i32;
                    }
                }
            }
        }

        self.edge_normals = self
            .triangles
            .iter()
            .map(|tri| {
                let mut normals = [[0.0; 3]; 3];
                for (c, normal) in normals.iter_mut().enumerate() {
                    let vj = &self.vertices[tri[(c + 1) % 3]];
                    let vk = &self.vertices[tri[(c + 2) % 3]];
                    *normal = geometry::cross(vk, vj);
                }
                normals
            })
            .collect();

        self.descendants = vec![-1; self.triangles.len()];
        for tess in 0..self.tessellations.len() {
            let [first, last] = self.tessellations[tess];
            for level in first..last.saturating_sub(1) {
                let mut start = self.levels[level + 1][0];
                for t in self.levels[level][0]..self.levels[level][1] {
                    let [a, b, c] = self.triangle_vertices(t);
                    let centroid = geometry::center(&[a, b, c]);
                    start = self.walk(start, &centroid);
                    self.descendants[t] = start as i32;
                }
            }
        }
    }

    /// Recompute the content hash: uppercase hex of the first 128 bits of the
    /// SHA-256 digest over tessellations, levels, triangles and vertices.
    pub fn compute_grid_id(&self) -> String {
        let mut hasher = Sha256::new();
        for pair in self.tessellations.iter().chain(self.levels.iter()) {
            hasher.update((pair[0] as i32).to_be_bytes());
            hasher.update((pair[1] as i32).to_be_bytes());
        }
        for tri in &self.triangles {
            for &v in tri {
                hasher.update((v as i32).to_be_bytes());
            }
        }
        for v in &self.vertices {
            for x in v {
                hasher.update(x.to_be_bytes());
            }
        }
        let digest = hasher.finalize();
        digest[..16].iter().map(|b| format!("{:02X}", b)).collect()
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn grid_id(&self) -> &str {
        &self.grid_id
    }

    pub fn software_version(&self) -> &str {
        &self.software_version
    }

    pub fn generation_date(&self) -> &str {
        &self.generation_date
    }

    /// File this grid was loaded from, if any.
    pub fn input_file(&self) -> Option<&Path> {
        self.input_file.as_deref()
    }

    pub(crate) fn set_input_file(&mut self, path: PathBuf) {
        self.input_file = Some(path);
    }

    // ------------------------------------------------------------------
    // Counts and ranges
    // ------------------------------------------------------------------

    pub fn tessellation_count(&self) -> usize {
        self.tessellations.len()
    }

    /// Total number of levels over all tessellations.
    pub fn total_level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of levels in tessellation `tess`.
    pub fn level_count(&self, tess: usize) -> usize {
        self.tessellations[tess][1] - self.tessellations[tess][0]
    }

    /// Global level index of level `level` of tessellation `tess`.
    pub fn level_of(&self, tess: usize, level: usize) -> usize {
        self.tessellations[tess][0] + level
    }

    /// Index (within its tessellation) of the finest level of `tess`.
    pub fn top_level(&self, tess: usize) -> usize {
        self.level_count(tess) - 1
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of triangles on one level of one tessellation.
    pub fn triangle_count_at(&self, tess: usize, level: usize) -> usize {
        let range = self.levels[self.level_of(tess, level)];
        range[1] - range[0]
    }

    pub fn first_triangle(&self, tess: usize, level: usize) -> usize {
        self.levels[self.level_of(tess, level)][0]
    }

    pub fn last_triangle(&self, tess: usize, level: usize) -> usize {
        self.levels[self.level_of(tess, level)][1] - 1
    }

    /// Raw `[first_level, last_level + 1)` pairs.
    pub fn tessellation_ranges(&self) -> &[[usize; 2]] {
        &self.tessellations
    }

    /// Raw `[first_triangle, last_triangle + 1)` pairs.
    pub fn level_ranges(&self) -> &[[usize; 2]] {
        &self.levels
    }

    // ------------------------------------------------------------------
    // Vertices and triangles
    // ------------------------------------------------------------------

    pub fn vertex(&self, i: usize) -> &Vec3 {
        &self.vertices[i]
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn triangle_vertex_indices(&self, t: usize) -> [usize; 3] {
        self.triangles[t]
    }

    pub fn triangle_vertices(&self, t: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[t];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Level (within its tessellation) of triangle `t`.
    pub fn triangle_level(&self, t: usize) -> usize {
        let level = self.triangle_levels[t];
        level - self.tessellations[self.level_tessellations[level]][0]
    }

    /// Tessellation of triangle `t`.
    pub fn triangle_tessellation(&self, t: usize) -> usize {
        self.level_tessellations[self.triangle_levels[t]]
    }

    /// Sorted indices of the vertices used by one level of a tessellation.
    pub fn level_vertices(&self, tess: usize, level: usize) -> Vec<usize> {
        let range = self.levels[self.level_of(tess, level)];
        let set: HashSet<usize> = self.triangles[range[0]..range[1]]
            .iter()
            .flat_map(|tri| tri.iter().copied())
            .collect();
        let mut out: Vec<usize> = set.into_iter().collect();
        out.sort_unstable();
        out
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Triangles across the edges opposite corners 0, 1 and 2 (-1 at a boundary).
    pub fn neighbors(&self, t: usize) -> [i32; 3] {
        self.neighbors[t]
    }

    pub fn neighbor(&self, t: usize, side: usize) -> i32 {
        self.neighbors[t][side]
    }

    /// Slot of `n` in the neighbor list of `t`.
    pub fn neighbor_index(&self, t: usize, n: usize) -> Option<usize> {
        self.neighbors[t].iter().position(|&x| x == n as i32)
    }

    /// Descendant of `t` on the next level, or -1 on the top level.
    pub fn descendant(&self, t: usize) -> i32 {
        self.descendants[t]
    }

    /// Unit-plane normals of the three edges of `t`.
    pub fn edge_normals(&self, t: usize) -> &[Vec3; 3] {
        &self.edge_normals[t]
    }

    // ------------------------------------------------------------------
    // Point location
    // ------------------------------------------------------------------

    /// Walk within the level of `start` to the triangle containing `u`.
    fn walk(&self, start: usize, u: &Vec3) -> usize {
        self.walk_bounded(start, u, self.triangles.len())
    }

    /// Walk at most `steps + 1` triangles; a warning is logged when the walk
    /// stops before reaching the triangle containing `u`.
    fn walk_bounded(&self, start: usize, u: &Vec3, steps: usize) -> usize {
        let mut t = start;
        for _ in 0..=steps {
            let normals = &self.edge_normals[t];
            match (0..3).find(|&c| geometry::dot(&normals[c], u) <= WALK_TOLERANCE) {
                None => return t,
                Some(c) => {
                    let n = self.neighbors[t][c];
                    if n < 0 {
                        return t;
                    }
                    t = n as usize;
                }
            }
        }
        warn!(
            start,
            stopped_at = t,
            steps,
            grid_id = %self.grid_id,
            "Triangle walk did not converge"
        );
        t
    }

    /// Triangle on one level of a tessellation containing unit vector `u`.
    pub fn find_triangle(&self, tess: usize, level: usize, u: &Vec3) -> usize {
        self.walk(self.first_triangle(tess, level), u)
    }

    /// Walk from `start` to the triangle containing `u`, descending through
    /// levels until the top level of the tessellation or `max_level`.
    pub fn find_triangle_from(&self, start: usize, u: &Vec3, max_level: usize) -> usize {
        let mut t = self.walk(start, u);
        while self.triangle_level(t) < max_level && self.descendants[t] >= 0 {
            t = self.walk(self.descendants[t] as usize, u);
        }
        t
    }

    /// Vertex of tessellation `tess` coincident with `u` (within 1e-7 radians).
    pub fn vertex_index(&self, u: &Vec3, tess: usize) -> Option<usize> {
        let t = self.find_triangle_from(self.first_triangle(tess, 0), u, usize::MAX);
        let cos_tol = 1e-7f64.cos();
        self.triangles[t]
            .iter()
            .copied()
            .find(|&v| geometry::dot(u, &self.vertices[v]) > cos_tol)
    }

    /// Corner of the containing top-level triangle closest to `u`.
    pub fn find_closest_vertex(&self, u: &Vec3, tess: usize) -> usize {
        let t = self.find_triangle_from(self.first_triangle(tess, 0), u, usize::MAX);
        let tri = self.triangles[t];
        let mut best = tri[0];
        for &v in &tri[1..] {
            if geometry::dot(u, &self.vertices[v]) > geometry::dot(u, &self.vertices[best]) {
                best = v;
            }
        }
        best
    }

    /// Circumcenter of triangle `t` with cos(circumradius) in slot 3.
    pub fn circumcenter(&self, t: usize) -> [f64; 4] {
        self.circumcenters
            .get_or_init(|| {
                (0..self.triangles.len())
                    .map(|t| self.compute_circumcenter(t))
                    .collect()
            })[t]
    }

    fn compute_circumcenter(&self, t: usize) -> [f64; 4] {
        let [a, b, c] = self.triangle_vertices(t);
        let cc = geometry::circumcenter(&a, &b, &c);
        [cc[0], cc[1], cc[2], geometry::dot(&cc, &a)]
    }

    // ------------------------------------------------------------------
    // Consistency and repair
    // ------------------------------------------------------------------

    /// Verify topology and accounting. Any failure is an `Integrity` error.
    pub fn test_grid(&self) -> Result<()> {
        let mut expected_level = 0;
        for (tess, range) in self.tessellations.iter().enumerate() {
            if range[0] != expected_level || range[1] <= range[0] {
                return Err(GeoTessError::integrity(format!(
                    "tessellation {} covers levels {:?}, expected to start at {}",
                    tess, range, expected_level
                )));
            }
            expected_level = range[1];
        }
        if expected_level != self.levels.len() {
            return Err(GeoTessError::integrity(format!(
                "tessellations cover {} levels but grid has {}",
                expected_level,
                self.levels.len()
            )));
        }
        let mut expected_triangle = 0;
        for (level, range) in self.levels.iter().enumerate() {
            if range[0] != expected_triangle || range[1] <= range[0] {
                return Err(GeoTessError::integrity(format!(
                    "level {} covers triangles {:?}, expected to start at {}",
                    level, range, expected_triangle
                )));
            }
            expected_triangle = range[1];
        }
        if expected_triangle != self.triangles.len() {
            return Err(GeoTessError::integrity(format!(
                "levels cover {} triangles but grid has {}",
                expected_triangle,
                self.triangles.len()
            )));
        }

        for tess in 0..self.tessellation_count() {
            for level in 0..self.level_count(tess) {
                for t in self.first_triangle(tess, level)..=self.last_triangle(tess, level) {
                    self.test_triangle(tess, level, t)?;
                }
            }
        }
        Ok(())
    }

    fn test_triangle(&self, tess: usize, level: usize, t: usize) -> Result<()> {
        let tri = self.triangles[t];
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
            return Err(GeoTessError::integrity(format!(
                "triangle {} has repeated vertices {:?}",
                t, tri
            )));
        }

        let [a, b, c] = self.triangle_vertices(t);
        if geometry::scalar_triple_product(&a, &b, &c) > 0.0 {
            return Err(GeoTessError::integrity(format!(
                "triangle {} (tess {} level {}) is counter-clockwise",
                t, tess, level
            )));
        }

        for side in 0..3 {
            let n = self.neighbors[t][side];
            if n < 0 {
                continue;
            }
            let n = n as usize;
            let ns = self.neighbor_index(n, t).ok_or_else(|| {
                GeoTessError::integrity(format!(
                    "tess {} level {} triangle {} side {}: neighbor {} does not point back",
                    tess, level, t, side, n
                ))
            })?;
            let nt = self.triangles[n];
            if nt[(ns + 1) % 3] != tri[(side + 2) % 3] || nt[(ns + 2) % 3] != tri[(side + 1) % 3] {
                return Err(GeoTessError::integrity(format!(
                    "triangle {} and neighbor {} disagree on their shared edge",
                    t, n
                )));
            }
        }

        if level + 1 < self.level_count(tess) {
            let d = self.descendants[t];
            let lo = self.first_triangle(tess, level + 1) as i32;
            let hi = self.last_triangle(tess, level + 1) as i32;
            if d < lo || d > hi {
                return Err(GeoTessError::integrity(format!(
                    "tess {} level {} triangle {} has descendant {} outside [{}, {}]",
                    tess, level, t, d, lo, hi
                )));
            }
        }
        Ok(())
    }

    /// Flip edges until every level is Delaunay. Returns the number of flips.
    ///
    /// Flips stop after `10 x triangles` edits even if illegal edges remain.
    pub fn delaunay_legalize(&mut self) -> Result<usize> {
        let limit = 10 * self.triangles.len();
        let mut total = 0;

        loop {
            let mut flipped = vec![false; self.triangles.len()];
            let mut changes = 0;

            for t in 0..self.triangles.len() {
                if total + changes >= limit {
                    break;
                }
                for corner in 0..3 {
                    if flipped[t] {
                        break;
                    }
                    let n = self.neighbors[t][corner];
                    if n < 0 || flipped[n as usize] {
                        continue;
                    }
                    let n = n as usize;
                    let Some(ni) = self.neighbor_index(n, t) else {
                        continue;
                    };

                    let cc = self.compute_circumcenter(t);
                    let far = self.vertices[self.triangles[n][ni]];
                    if geometry::dot(&[cc[0], cc[1], cc[2]], &far) - 1e-15 <= cc[3] {
                        continue;
                    }

                    let tri = self.triangles[t];
                    let (va, vj, vk) = (tri[corner], tri[(corner + 1) % 3], tri[(corner + 2) % 3]);
                    let vf = self.triangles[n][ni];
                    self.triangles[t] = [va, vj, vf];
                    self.triangles[n] = [vf, vk, va];
                    flipped[t] = true;
                    flipped[n] = true;
                    changes += 1;
                }
            }

            if changes > 0 {
                self.initialize();
            }
            total += changes;
            if changes == 0 || total >= limit {
                break;
            }
        }

        self.circumcenters = OnceCell::new();
        self.grid_id = self.compute_grid_id();
        info!(flips = total, grid_id = %self.grid_id, "Delaunay legalization complete");
        Ok(total)
    }
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.grid_id == other.grid_id
    }
}

/// Ranges must be non-empty and contiguous from 0, covering all `total` items.
fn check_ranges(ranges: &[[usize; 2]], total: usize, what: &str, of: &str) -> Result<()> {
    let mut expected = 0;
    for (i, r) in ranges.iter().enumerate() {
        if r[0] != expected || r[1] <= r[0] || r[1] > total {
            return Err(GeoTessError::malformed_grid(format!(
                "{} {} spans {:?}, expected a non-empty range from {} within {} {}",
                what, i, r, expected, total, of
            )));
        }
        expected = r[1];
    }
    if expected != total {
        return Err(GeoTessError::malformed_grid(format!(
            "{} ranges cover {} of {} {}",
            what, expected, total, of
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EarthShape;

    fn grid3() -> Grid {
        GridBuilder::icosahedral(3).unwrap()
    }

    #[test]
    fn test_counts() {
        let grid = grid3();
        assert_eq!(grid.tessellation_count(), 1);
        assert_eq!(grid.level_count(0), 3);
        assert_eq!(grid.triangle_count_at(0, 0), 20);
        assert_eq!(grid.triangle_count_at(0, 1), 80);
        assert_eq!(grid.triangle_count_at(0, 2), 320);
        assert_eq!(grid.triangle_count(), 420);
        assert_eq!(grid.vertex_count(), 162);
        assert_eq!(grid.first_triangle(0, 2), 100);
        assert_eq!(grid.last_triangle(0, 2), 419);
    }

    #[test]
    fn test_neighbor_symmetry() {
        let grid = grid3();
        for t in 0..grid.triangle_count() {
            for side in 0..3 {
                let n = grid.neighbor(t, side);
                assert!(n >= 0, "closed sphere has no boundary");
                let ns = grid.neighbor_index(n as usize, t).unwrap();
                assert_eq!(grid.neighbor(n as usize, ns), t as i32);
            }
        }
        grid.test_grid().unwrap();
    }

    #[test]
    fn test_descendants_contain_centroid() {
        let grid = grid3();
        for t in 0..grid.first_triangle(0, 2) {
            let d = grid.descendant(t);
            assert!(d >= 0);
            assert_eq!(grid.triangle_level(d as usize), grid.triangle_level(t) + 1);
        }
        assert_eq!(grid.descendant(grid.last_triangle(0, 2)), -1);
    }

    #[test]
    fn test_find_triangle() {
        let grid = grid3();
        let u = EarthShape::Sphere.vector_degrees(30.0, 90.0);
        let t = grid.find_triangle(0, 2, &u);
        for normal in grid.edge_normals(t) {
            assert!(geometry::dot(normal, &u) > -1e-15);
        }
        let t2 = grid.find_triangle_from(grid.first_triangle(0, 0), &u, 2);
        assert_eq!(t, t2);
        let coarse = grid.find_triangle_from(grid.first_triangle(0, 0), &u, 1);
        assert_eq!(grid.triangle_level(coarse), 1);
    }

    #[test]
    fn test_circumcenter_query_is_stable() {
        let grid = grid3();
        let cc = grid.circumcenter(333);
        let u = [cc[0], cc[1], cc[2]];
        let t = grid.find_triangle_from(0, &u, 2);
        assert_eq!(t, 333);
        assert_eq!(grid.find_triangle_from(t, &u, 2), 333);
    }

    #[test]
    fn test_walk_stops_at_step_bound() {
        let grid = grid3();
        let top = grid.first_triangle(0, 2);
        let tri = grid.triangle_vertices(top);
        let far = geometry::center(&[
            [-tri[0][0], -tri[0][1], -tri[0][2]],
            [-tri[1][0], -tri[1][1], -tri[1][2]],
            [-tri[2][0], -tri[2][1], -tri[2][2]],
        ]);

        let stopped = grid.walk_bounded(top, &far, 1);
        assert_eq!(grid.triangle_level(stopped), 2);
        assert!(grid
            .edge_normals(stopped)
            .iter()
            .any(|normal| geometry::dot(normal, &far) <= WALK_TOLERANCE));

        let found = grid.walk(top, &far);
        assert_eq!(found, grid.find_triangle(0, 2, &far));
        for normal in grid.edge_normals(found) {
            assert!(geometry::dot(normal, &far) > WALK_TOLERANCE);
        }
    }

    #[test]
    fn test_vertex_index() {
        let grid = grid3();
        let v = *grid.vertex(17);
        assert_eq!(grid.vertex_index(&v, 0), Some(17));
        assert_eq!(grid.find_closest_vertex(&v, 0), 17);
    }

    #[test]
    fn test_grid_id_is_stable() {
        let a = grid3();
        let b = grid3();
        assert_eq!(a.grid_id(), b.grid_id());
        assert_eq!(a.grid_id().len(), 32);
        assert!(a.grid_id().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(a.grid_id(), GridBuilder::icosahedral(2).unwrap().grid_id());
    }

    #[test]
    fn test_delaunay_on_icosahedral_grid() {
        let mut grid = grid3();
        let before = grid.grid_id().to_string();
        let flips = grid.delaunay_legalize().unwrap();
        grid.test_grid().unwrap();
        if flips == 0 {
            assert_eq!(grid.grid_id(), before);
        }
        if flips < 10 * grid.triangle_count() {
            assert_eq!(grid.delaunay_legalize().unwrap(), 0);
        }
    }

    #[test]
    fn test_malformed_parts() {
        let err = Grid::from_parts(
            vec![[0, 1]],
            vec![[0, 1]],
            vec![[1.0, 0.0, 0.0]],
            vec![[0, 1, 2]],
            "test",
            "now",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, GeoTessError::MalformedGrid(_)));
    }

    #[test]
    fn test_malformed_ranges() {
        let ico = GridBuilder::icosahedral(1).unwrap();
        let parts = |tessellations: Vec<[usize; 2]>, levels: Vec<[usize; 2]>| {
            Grid::from_parts(
                tessellations,
                levels,
                ico.vertices().to_vec(),
                ico.triangles().to_vec(),
                "test",
                "now",
                None,
            )
        };

        let cases = [
            // empty level
            (vec![[0, 2]], vec![[0, 20], [20, 20]]),
            // empty tessellation
            (vec![[0, 1], [1, 1]], vec![[0, 20]]),
            // no tessellations
            (vec![], vec![[0, 20]]),
            // gap between levels
            (vec![[0, 2]], vec![[0, 10], [12, 20]]),
            // levels do not cover every triangle
            (vec![[0, 1]], vec![[0, 19]]),
            // tessellation does not start at level 0
            (vec![[1, 2]], vec![[0, 10], [10, 20]]),
        ];
        for (tessellations, levels) in cases {
            let label = format!("{:?} {:?}", tessellations, levels);
            let err = parts(tessellations, levels).unwrap_err();
            assert!(matches!(err, GeoTessError::MalformedGrid(_)), "{}: {}", label, err);
        }

        parts(vec![[0, 1]], vec![[0, 20]]).unwrap().test_grid().unwrap();
    }
}
