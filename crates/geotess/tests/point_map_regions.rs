//! Active-node numbering under 2-D and 3-D polygon regions.

use geotess::{DataType, Horizon, InterpolatorType, Model, Polygon};
use std::collections::HashMap;
use test_utils::{earth, great_circle, layered_model, temp_test_dir, PointSampler};

/// Nodes per vertex in the layered model: three npoint layers plus the crust.
const NODES_PER_VERTEX: usize = 3 * earth::NODES_PER_LAYER + 1;

fn polar_cap() -> Polygon {
    Polygon::small_circle(&[0.0, 0.0, 1.0], 40f64.to_radians(), 36).unwrap()
}

fn vertices_inside(model: &Model, polygon: &Polygon) -> usize {
    (0..model.vertex_count())
        .filter(|&v| polygon.contains(model.grid().vertex(v)))
        .count()
}

#[test]
fn test_global_point_map() {
    let model = layered_model(2, DataType::Double);
    let map = model.point_map();
    assert!(map.is_global());
    assert_eq!(map.size(), model.vertex_count() * NODES_PER_VERTEX);

    for point in (0..map.size()).step_by(13) {
        let (v, l, n) = map.point_indices(point);
        assert_eq!(map.point_index(v, l, n), Some(point));
        assert_eq!(model.point_radius(point), model.radius(v, l, n));
    }
    assert_eq!(map.point_count(0, 3), 1);
    assert_eq!(map.point_index_first(0, 0), Some(0));
    assert_eq!(map.point_index_last(0, 0), Some(earth::NODES_PER_LAYER - 1));
}

#[test]
fn test_polar_cap_region() {
    let mut model = layered_model(3, DataType::Double);
    let cap = polar_cap();
    let inside = vertices_inside(&model, &cap);
    assert!(inside > 0 && inside < model.vertex_count());

    model.set_active_region(Some(&cap));
    assert!(!model.point_map().is_global());
    assert_eq!(model.point_count(), inside * NODES_PER_VERTEX);
    for point in 0..model.point_count() {
        assert!(cap.contains(model.point_unit_vector(point)));
    }

    model.set_active_region(None);
    assert_eq!(model.point_count(), model.vertex_count() * NODES_PER_VERTEX);
}

#[test]
fn test_layer_bounded_region() {
    let mut model = layered_model(3, DataType::Double);
    let region = polar_cap()
        .with_horizons(
            Horizon::Layer {
                fraction: 0.0,
                layer: 1,
            },
            Horizon::Layer {
                fraction: 1.0,
                layer: 1,
            },
        )
        .unwrap();
    assert!(region.is_3d());
    let inside = vertices_inside(&model, &region);

    model.set_active_region(Some(&region));
    assert_eq!(model.point_count(), inside * earth::NODES_PER_LAYER);
    for point in 0..model.point_count() {
        assert_eq!(model.point_map().layer_index(point), 1);
    }
}

#[test]
fn test_depth_bounded_region() {
    let mut model = layered_model(2, DataType::Double);
    let region = Polygon::global(true)
        .with_horizons(
            Horizon::Depth {
                depth: 700.0,
                layer: None,
            },
            Horizon::Depth {
                depth: 0.0,
                layer: None,
            },
        )
        .unwrap();
    model.set_active_region(Some(&region));
    assert!(model.point_count() > 0);
    for point in 0..model.point_count() {
        let depth = model.point_depth(point);
        assert!((-1e-3..=700.0 + 1e-3).contains(&depth), "depth {}", depth);
    }
}

#[test]
fn test_region_survives_file_round_trip() {
    let dir = temp_test_dir();
    let path = dir.path().join("cap.txt");
    let cap = polar_cap();
    cap.write(&path).unwrap();
    let back = Polygon::from_file(&path).unwrap();

    let mut sampler = PointSampler::new(17);
    for u in sampler.unit_vectors(500) {
        if !cap.on_boundary(&u) {
            assert_eq!(back.contains(&u), cap.contains(&u));
        }
    }

    let mut a = layered_model(2, DataType::Float);
    let mut b = layered_model(2, DataType::Float);
    a.set_active_region(Some(&cap));
    b.set_active_region(Some(&back));
    assert_eq!(a.point_count(), b.point_count());
}

#[test]
fn test_path_outside_region_is_inactive() {
    let mut model = layered_model(3, DataType::Double);
    model.set_active_region(Some(&polar_cap()));

    let mut weights = HashMap::new();
    let equator = great_circle(0.0, 0.0, 0.0, 20.0, 21);
    let radii = vec![5000.0; equator.len()];
    let all_active = model
        .path_weights(
            &equator,
            &radii,
            None,
            InterpolatorType::Linear,
            InterpolatorType::Linear,
            &mut weights,
        )
        .unwrap();
    assert!(!all_active);

    let pole = great_circle(85.0, 0.0, 85.0, 90.0, 11);
    let all_active = model
        .path_weights(
            &pole,
            &radii[..pole.len()],
            None,
            InterpolatorType::Linear,
            InterpolatorType::Linear,
            &mut weights,
        )
        .unwrap();
    assert!(all_active);
    assert!(weights.keys().all(|&p| p < model.point_count()));
}

#[test]
fn test_point_values_follow_region() {
    let mut model = layered_model(2, DataType::Double);
    model.set_active_region(Some(&polar_cap()));
    let (v, l, n) = model.point_map().point_indices(0);
    model.set_point_value(0, 0, 42.0).unwrap();
    assert_eq!(model.value(v, l, n, 0), 42.0);
    assert_eq!(model.point_value(0, 0), 42.0);
    assert!(model.set_point_value(model.point_count(), 0, 1.0).is_err());
}
