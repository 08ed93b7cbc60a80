//! Sibson natural-neighbor coefficients on one level of a tessellation.

use crate::geometry::{self, Vec3};
use crate::grid::Grid;
use std::collections::{HashMap, HashSet};

/// Angular tolerance (radians) under which the query is treated as a vertex.
const COINCIDENT_TOLERANCE: f64 = 1e-7;

/// Natural neighbors of `u` and their normalized Sibson weights.
///
/// `t` is the triangle containing `u` on the level the neighbors are taken
/// from. When the Bowyer-Watson cavity cannot be resolved into a single
/// ring, the linear coefficients of `t` are returned instead.
pub fn coefficients(grid: &Grid, t: usize, u: &Vec3) -> (Vec<usize>, Vec<f64>) {
    let tri = grid.triangle_vertex_indices(t);
    let cos_tol = COINCIDENT_TOLERANCE.cos();
    if let Some(&v) = tri
        .iter()
        .find(|&&v| geometry::dot(grid.vertex(v), u) > cos_tol)
    {
        return (vec![v], vec![1.0]);
    }

    let cavity = cavity(grid, t, u);
    match sibson_weights(grid, &cavity, u) {
        Some(result) => result,
        None => super::linear_coefficients(grid, t, u),
    }
}

/// Triangles whose circumcircle contains `u`, gathered by flood fill from `t`.
fn cavity(grid: &Grid, t: usize, u: &Vec3) -> HashSet<usize> {
    let mut cavity = HashSet::from([t]);
    let mut stack = vec![t];
    while let Some(current) = stack.pop() {
        for n in grid.neighbors(current) {
            if n < 0 {
                continue;
            }
            let n = n as usize;
            if cavity.contains(&n) {
                continue;
            }
            let cc = grid.circumcenter(n);
            if geometry::dot(&[cc[0], cc[1], cc[2]], u) > cc[3] {
                cavity.insert(n);
                stack.push(n);
            }
        }
    }
    cavity
}

fn sibson_weights(
    grid: &Grid,
    cavity: &HashSet<usize>,
    u: &Vec3,
) -> Option<(Vec<usize>, Vec<f64>)> {
    // directed boundary edge start -> (end, owning triangle)
    let mut boundary: HashMap<usize, (usize, usize)> = HashMap::new();
    for &t in cavity {
        let tri = grid.triangle_vertex_indices(t);
        let neighbors = grid.neighbors(t);
        for side in 0..3 {
            let n = neighbors[side];
            if n >= 0 && cavity.contains(&(n as usize)) {
                continue;
            }
            let (a, b) = (tri[(side + 1) % 3], tri[(side + 2) % 3]);
            if boundary.insert(a, (b, t)).is_some() {
                return None;
            }
        }
    }

    let &start = boundary.keys().min()?;
    let mut ring = Vec::with_capacity(boundary.len());
    let mut v = start;
    loop {
        ring.push(v);
        v = boundary.get(&v)?.0;
        if v == start {
            break;
        }
        if ring.len() > boundary.len() {
            return None;
        }
    }
    if ring.len() != boundary.len() || ring.len() < 3 {
        return None;
    }

    let n = ring.len();
    let mut weights = Vec::with_capacity(n);
    for i in 0..n {
        let prev = ring[(i + n - 1) % n];
        let v = ring[i];
        let next = ring[(i + 1) % n];

        let mut polygon = vec![geometry::circumcenter_outward(
            u,
            grid.vertex(prev),
            grid.vertex(v),
        )];

        // fan of cavity triangles around v, from edge prev->v to edge v->next
        let mut t = boundary.get(&prev)?.1;
        for _ in 0..cavity.len() {
            let cc = grid.circumcenter(t);
            polygon.push([cc[0], cc[1], cc[2]]);
            let tri = grid.triangle_vertex_indices(t);
            let corner = tri.iter().position(|&x| x == v)?;
            let across = grid.neighbor(t, (corner + 2) % 3);
            if across < 0 || !cavity.contains(&(across as usize)) {
                break;
            }
            t = across as usize;
        }

        polygon.push(geometry::circumcenter_outward(
            u,
            grid.vertex(v),
            grid.vertex(next),
        ));

        let area: f64 = (1..polygon.len() - 1)
            .map(|k| geometry::triangle_area(&polygon[0], &polygon[k], &polygon[k + 1]))
            .sum();
        weights.push(area);
    }

    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || weights.iter().any(|w| !w.is_finite()) {
        return None;
    }
    for w in weights.iter_mut() {
        *w /= total;
    }
    Some((ring, weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;

    #[test]
    fn test_weights_sum_to_one() {
        let grid = GridBuilder::icosahedral(3).unwrap();
        let top = grid.top_level(0);
        for &(lat, lon) in &[(10.0, 20.0), (-45.5, 170.2), (33.3, -77.7), (0.1, 0.1)] {
            let u = crate::geometry::EarthShape::Sphere.vector_degrees(lat, lon);
            let t = grid.find_triangle(0, top, &u);
            let (vertices, weights) = coefficients(&grid, t, &u);
            assert!(vertices.len() >= 3);
            assert_eq!(vertices.len(), weights.len());
            let sum: f64 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
            assert!(weights.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_coincident_vertex() {
        let grid = GridBuilder::icosahedral(2).unwrap();
        let u = *grid.vertex(5);
        let t = grid.find_triangle(0, 1, &u);
        let (vertices, weights) = coefficients(&grid, t, &u);
        assert_eq!(vertices, vec![5]);
        assert_eq!(weights, vec![1.0]);
    }

    #[test]
    fn test_neighbors_include_containing_triangle() {
        let grid = GridBuilder::icosahedral(3).unwrap();
        let u = crate::geometry::EarthShape::Sphere.vector_degrees(12.0, 34.0);
        let t = grid.find_triangle(0, 2, &u);
        let (vertices, _) = coefficients(&grid, t, &u);
        for v in grid.triangle_vertex_indices(t) {
            assert!(vertices.contains(&v));
        }
    }
}
