//! Generators for grids, models and random query points.
//!
//! Generated models carry analytic attribute values, so tests can compare an
//! interpolated value against [`analytic_value`] at the same location.

use geotess::geometry::{self, EarthShape, Vec3};
use geotess::{Data, DataType, Grid, GridBuilder, MetaData, Model, Profile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::fixtures::{attributes, earth};

/// Icosahedral grid with one tessellation of `levels` levels.
///
/// ```
/// let grid = test_utils::icosahedral_grid(3);
/// assert_eq!(grid.triangle_count(), 20 + 80 + 320);
/// ```
pub fn icosahedral_grid(levels: usize) -> Grid {
    GridBuilder::icosahedral(levels).expect("Failed to build icosahedral grid")
}

/// Complete metadata for the generated models.
pub fn model_metadata(layers: &[&str], tess_ids: Vec<usize>, data_type: DataType) -> MetaData {
    let mut md = MetaData::new();
    md.set_description("generated test model\nvalues follow analytic_value()");
    md.set_attributes(&attributes::NAMES, &attributes::UNITS)
        .expect("Failed to set attributes");
    md.set_layer_names(layers).expect("Failed to set layer names");
    md.set_layer_tess_ids(tess_ids)
        .expect("Failed to set layer tessellations");
    md.set_data_type(data_type);
    md.set_earth_shape(EarthShape::Sphere);
    md.set_model_software_version("test-utils");
    md.set_model_generation_date("2024-01-01T00:00:00Z");
    md
}

/// Smooth attribute value at unit vector `u` and radius `r` (km), linear in
/// radius. Attribute 1 is 0.55 times attribute 0.
pub fn analytic_value(u: &Vec3, r: f64, attr: usize) -> f64 {
    let vp = 4.0 + r / 1000.0 + 0.5 * u[0] - 0.25 * u[2];
    match attr {
        0 => vp,
        _ => 0.55 * vp,
    }
}

fn node_data(data_type: DataType, u: &Vec3, r: f64) -> Data {
    let values: Vec<f64> = (0..attributes::NAMES.len())
        .map(|a| analytic_value(u, r, a))
        .collect();
    match data_type {
        // scale so integer kinds keep two decimals
        DataType::Double | DataType::Float => Data::from_f64(data_type, &values),
        _ => Data::from_f64(
            data_type,
            &values.iter().map(|v| (v * 100.0).round()).collect::<Vec<_>>(),
        ),
    }
    .expect("Failed to build node data")
}

/// Four-layer spherical model on an icosahedral grid of `levels` levels.
///
/// Core, lower and upper mantle are npoint profiles with
/// [`earth::NODES_PER_LAYER`] evenly spaced nodes; the crust is constant at
/// its mid-radius value. Integer data kinds store values times 100.
pub fn layered_model(levels: usize, data_type: DataType) -> Model {
    let grid = Arc::new(icosahedral_grid(levels));
    let md = model_metadata(&earth::layer_names(), vec![0; earth::LAYERS.len()], data_type);
    let mut model = Model::new(Arc::clone(&grid), md).expect("Failed to create model");

    for v in 0..grid.vertex_count() {
        let u = *grid.vertex(v);
        for (layer, &(_, bottom, top)) in earth::LAYERS.iter().enumerate() {
            let profile = if layer == earth::LAYERS.len() - 1 {
                let mid = (bottom as f64 + top as f64) / 2.0;
                Profile::constant(bottom, top, node_data(data_type, &u, mid))
            } else {
                let n = earth::NODES_PER_LAYER;
                let radii: Vec<f32> = (0..n)
                    .map(|i| bottom + (top - bottom) * i as f32 / (n - 1) as f32)
                    .collect();
                let data = radii
                    .iter()
                    .map(|&r| node_data(data_type, &u, r as f64))
                    .collect();
                Profile::npoint(radii, data)
            }
            .expect("Failed to build profile");
            model
                .set_profile(v, layer, profile)
                .expect("Failed to set profile");
        }
    }
    model
}

/// 2-D model whose single attribute pair follows [`analytic_value`] at the
/// earth's surface.
pub fn surface_model(levels: usize) -> Model {
    let grid = Arc::new(icosahedral_grid(levels));
    let md = model_metadata(&["surface"], vec![0], DataType::Double);
    let mut model = Model::new_surface(Arc::clone(&grid), md).expect("Failed to create model");
    for v in 0..grid.vertex_count() {
        let u = *grid.vertex(v);
        let profile = Profile::surface(node_data(DataType::Double, &u, earth::RADIUS));
        model
            .set_profile(v, 0, profile)
            .expect("Failed to set profile");
    }
    model
}

/// Unit vectors along the great circle from `(lat0, lon0)` to `(lat1, lon1)`
/// (degrees), `n` points including both ends.
pub fn great_circle(lat0: f64, lon0: f64, lat1: f64, lon1: f64, n: usize) -> Vec<Vec3> {
    let a = EarthShape::Sphere.vector_degrees(lat0, lon0);
    let b = EarthShape::Sphere.vector_degrees(lat1, lon1);
    geometry::great_circle_points(&a, &b, n.saturating_sub(1))
}

/// Deterministic sampler of query points.
pub struct PointSampler {
    rng: StdRng,
}

impl PointSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniformly distributed unit vector.
    pub fn unit_vector(&mut self) -> Vec3 {
        let z: f64 = self.rng.gen_range(-1.0..=1.0);
        let lon: f64 = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let s = (1.0 - z * z).max(0.0).sqrt();
        [s * lon.cos(), s * lon.sin(), z]
    }

    pub fn unit_vectors(&mut self, n: usize) -> Vec<Vec3> {
        (0..n).map(|_| self.unit_vector()).collect()
    }

    /// Radius uniformly distributed in `[bottom, top)`.
    pub fn radius(&mut self, bottom: f64, top: f64) -> f64 {
        self.rng.gen_range(bottom..top)
    }

    /// Unit vector within `radius_deg` degrees of `center`.
    pub fn unit_vector_near(&mut self, center: &Vec3, radius_deg: f64) -> Vec3 {
        let cos_max = radius_deg.to_radians().cos();
        loop {
            let u = self.unit_vector();
            if geometry::dot(&u, center) >= cos_max {
                return u;
            }
        }
    }
}
