//! Interpolation and path-integral scenarios on generated models whose
//! attribute values follow a known analytic function.

use geotess::geometry;
use geotess::{DataType, InterpolatorType, Model};
use std::collections::HashMap;
use test_utils::{
    analytic_value, assert_approx_eq, earth, great_circle, layered_model, location,
    surface_model, PointSampler,
};

use InterpolatorType::{CubicSpline, Linear, NaturalNeighbor};

/// Lower mantle: an npoint layer, so values are linear in radius.
const LOWER_MANTLE: usize = 1;

fn lower_mantle_bounds() -> (f64, f64) {
    let (_, bottom, top) = earth::LAYERS[LOWER_MANTLE];
    (bottom as f64, top as f64)
}

// =============================================================================
// Triangle search
// =============================================================================

#[test]
fn test_circumcenter_lands_in_its_triangle() {
    let model = layered_model(3, DataType::Double);
    let grid = model.grid();
    assert_eq!(grid.triangle_count(), 20 + 80 + 320);
    assert_eq!(grid.vertex_count(), 162);

    let c = grid.circumcenter(333);
    let u = [c[0], c[1], c[2]];
    assert_approx_eq!(geometry::length(&u), 1.0, 1e-12);

    let mut pos = model.position(Linear, Linear).unwrap();
    pos.set(Some(LOWER_MANTLE), &u, 5000.0).unwrap();
    assert_eq!(pos.vertices().len(), 3);
    assert_eq!(pos.triangle(0), Some(333));
    assert_eq!(pos.tess_level(0), Some(2));

    let mut corners = grid.triangle_vertex_indices(333).to_vec();
    let mut found = pos.vertices().to_vec();
    corners.sort_unstable();
    found.sort_unstable();
    assert_eq!(found, corners);

    // acute triangle: the circumcenter is strictly inside
    assert!(pos.horizontal_coefficients().iter().all(|&c| c > 0.0));
}

#[test]
fn test_every_triangle_found_from_any_start() {
    let model = layered_model(3, DataType::Float);
    let grid = model.grid();
    let mut pos = model.position(Linear, Linear).unwrap();
    for t in grid.first_triangle(0, 2)..=grid.last_triangle(0, 2) {
        let c = grid.circumcenter(t);
        pos.set(Some(0), &[c[0], c[1], c[2]], 1000.0).unwrap();
        assert_eq!(pos.triangle(0), Some(t));
    }
}

// =============================================================================
// Interpolation accuracy
// =============================================================================

fn check_against_analytic(model: &Model, horizontal: InterpolatorType, tolerance: f64) {
    let (bottom, top) = lower_mantle_bounds();
    let mut sampler = PointSampler::new(42);
    let mut pos = model.position(horizontal, Linear).unwrap();
    for _ in 0..200 {
        let u = sampler.unit_vector();
        let r = sampler.radius(bottom, top);
        pos.set(Some(LOWER_MANTLE), &u, r).unwrap();
        for attr in 0..2 {
            assert_approx_eq!(pos.value(attr), analytic_value(&u, r, attr), tolerance);
        }
    }
}

#[test]
fn test_linear_matches_analytic() {
    check_against_analytic(&layered_model(4, DataType::Double), Linear, 0.02);
}

#[test]
fn test_natural_neighbor_matches_analytic() {
    check_against_analytic(&layered_model(4, DataType::Double), NaturalNeighbor, 0.02);
}

#[test]
fn test_values_exact_on_vertices() {
    let model = layered_model(3, DataType::Double);
    let (bottom, top) = lower_mantle_bounds();
    for horizontal in [Linear, NaturalNeighbor] {
        for radial in [Linear, CubicSpline] {
            let mut pos = model.position(horizontal, radial).unwrap();
            for v in (0..model.vertex_count()).step_by(7) {
                let u = *model.grid().vertex(v);
                let r = bottom + 0.3 * (top - bottom);
                pos.set(Some(LOWER_MANTLE), &u, r).unwrap();
                assert_eq!(pos.vertex_index(), Some(v));
                assert_approx_eq!(pos.value(0), analytic_value(&u, r, 0), 1e-6);
            }
        }
    }
}

#[test]
fn test_coefficients_sum_to_one() {
    let model = layered_model(3, DataType::Double);
    let (bottom, top) = lower_mantle_bounds();
    let mut sampler = PointSampler::new(3);
    for horizontal in [Linear, NaturalNeighbor] {
        let mut pos = model.position(horizontal, Linear).unwrap();
        for _ in 0..50 {
            let u = sampler.unit_vector();
            pos.set(Some(LOWER_MANTLE), &u, sampler.radius(bottom, top)).unwrap();
            assert_approx_eq!(pos.horizontal_coefficients().iter().sum::<f64>(), 1.0, 1e-9);
            let coefficients = pos.coefficients().unwrap();
            assert_approx_eq!(coefficients.values().sum::<f64>(), 1.0, 1e-9);
            assert!(coefficients.values().all(|&c| c >= -1e-12));
        }
    }
}

#[test]
fn test_interpolated_values_bounded_by_neighbors() {
    let model = layered_model(2, DataType::Double);
    let mut sampler = PointSampler::new(11);
    let mut pos = model.position(NaturalNeighbor, Linear).unwrap();
    for _ in 0..50 {
        let u = sampler.unit_vector();
        let r = 5000.0;
        pos.set(Some(LOWER_MANTLE), &u, r).unwrap();
        let coefficients = pos.coefficients().unwrap();
        let values: Vec<f64> = coefficients
            .keys()
            .map(|&p| model.point_value(p, 0))
            .collect();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let v = pos.value(0);
        assert!(v >= min - 1e-9 && v <= max + 1e-9, "{} not in [{}, {}]", v, min, max);
    }
}

#[test]
fn test_depth_query() {
    let model = layered_model(3, DataType::Double);
    let mut pos = model.position(Linear, Linear).unwrap();
    pos.set_lat_lon_depth(30.0, 90.0, 1000.0).unwrap();
    assert_approx_eq!(pos.radius(), earth::RADIUS - 1000.0, 1e-9);
    assert_eq!(pos.layer_id(), LOWER_MANTLE);
    assert_approx_eq!(pos.lat_degrees(), 30.0, 1e-9);
    assert_approx_eq!(pos.lon_degrees(), 90.0, 1e-9);
    let u = *pos.unit_vector().unwrap();
    assert_approx_eq!(pos.value(0), analytic_value(&u, pos.radius(), 0), 0.05);
}

#[test]
fn test_named_locations() {
    // poles and the antimeridian included
    let model = layered_model(4, DataType::Double);
    for horizontal in [Linear, NaturalNeighbor] {
        let mut pos = model.position(horizontal, Linear).unwrap();
        for (lat, lon) in location::ALL {
            pos.set_lat_lon_depth(lat, lon, 1000.0).unwrap();
            assert_eq!(pos.layer_id(), LOWER_MANTLE);
            assert_approx_eq!(pos.lat_degrees(), lat, 1e-9);
            let u = *pos.unit_vector().unwrap();
            assert_approx_eq!(pos.value(0), analytic_value(&u, pos.radius(), 0), 0.02);
        }
    }
}

#[test]
fn test_surface_model_query() {
    let model = surface_model(4);
    let mut sampler = PointSampler::new(5);
    let mut pos = model.position(Linear, Linear).unwrap();
    for _ in 0..50 {
        let u = sampler.unit_vector();
        pos.set(Some(0), &u, earth::RADIUS).unwrap();
        assert_approx_eq!(pos.value(1), analytic_value(&u, earth::RADIUS, 1), 0.02);
    }
}

// =============================================================================
// Path integrals
// =============================================================================

#[test]
fn test_path_length_along_great_circle() {
    let model = layered_model(3, DataType::Double);
    let points = great_circle(0.0, 0.0, 0.0, 30.0, 31);
    let radii = vec![6300.0; points.len()];
    let length = model
        .path_integral(None, &points, &radii, None, Linear, Linear)
        .unwrap();
    assert_approx_eq!(length, 30f64.to_radians() * 6300.0, 0.1);
}

#[test]
fn test_path_integral_of_attribute() {
    let model = layered_model(4, DataType::Double);
    let points = great_circle(-10.0, 20.0, 25.0, 60.0, 101);
    let radii = vec![5000.0; points.len()];
    let layers = vec![LOWER_MANTLE; points.len() - 1];

    let expected: f64 = (1..points.len())
        .map(|i| {
            let mut mid = geometry::add(&points[i - 1], &points[i]);
            geometry::normalize(&mut mid);
            let dkm = geometry::distance_3d(&points[i - 1], 5000.0, &points[i], 5000.0);
            dkm * analytic_value(&mid, 5000.0, 0)
        })
        .sum();

    for horizontal in [Linear, NaturalNeighbor] {
        let integral = model
            .path_integral(Some(0), &points, &radii, Some(&layers), horizontal, Linear)
            .unwrap();
        assert_approx_eq!(integral / expected, 1.0, 2e-3);
    }
}

#[test]
fn test_path_weights_reproduce_integral() {
    let model = layered_model(3, DataType::Double);
    let points = great_circle(40.0, -100.0, 10.0, -60.0, 41);
    let radii: Vec<f64> = (0..points.len()).map(|i| 4000.0 + 10.0 * i as f64).collect();

    let mut weights = HashMap::new();
    let all_active = model
        .path_weights(&points, &radii, None, Linear, Linear, &mut weights)
        .unwrap();
    assert!(all_active);

    let length = model
        .path_integral(None, &points, &radii, None, Linear, Linear)
        .unwrap();
    assert_approx_eq!(model.path_integral_from_weights(None, &weights), length, 1e-6);

    let integral = model
        .path_integral(Some(1), &points, &radii, None, Linear, Linear)
        .unwrap();
    assert_approx_eq!(
        model.path_integral_from_weights(Some(1), &weights),
        integral,
        1e-6 * integral.abs()
    );
}

#[test]
fn test_surface_path_weights_length() {
    let model = surface_model(3);
    let shape = model.earth_shape();
    let from = shape.vector_degrees(0.0, 0.0);
    let to = shape.vector_degrees(0.0, 45.0);
    let mut weights = HashMap::new();
    let all_active = model
        .surface_path_weights(&from, &to, 1f64.to_radians(), None, Linear, &mut weights)
        .unwrap();
    assert!(all_active);
    assert_approx_eq!(
        model.path_integral_from_weights(None, &weights),
        45f64.to_radians() * earth::RADIUS,
        1e-6
    );

    let layered = layered_model(1, DataType::Double);
    assert!(layered
        .surface_path_weights(&from, &to, 0.01, None, Linear, &mut weights)
        .is_err());
}

#[test]
fn test_path_rejects_mismatched_lengths() {
    let model = layered_model(2, DataType::Double);
    let points = great_circle(0.0, 0.0, 0.0, 10.0, 5);
    let radii = vec![5000.0; 4];
    assert!(model
        .path_integral(Some(0), &points, &radii, None, Linear, Linear)
        .is_err());
}
