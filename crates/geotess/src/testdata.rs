//! Small in-memory models for unit tests.
//!
//! | Model | Grid | Layers | Profiles |
//! |-------|------|--------|----------|
//! | [`crust_model`] | 4 levels, 642 vertices | mantle, crust | npoint, constant |
//! | [`typed_model`] | 2 levels, 42 vertices | 4 layers | every 3-D shape |
//! | [`surface_model`] | 3 levels, 162 vertices | surface | surface |

use std::sync::Arc;

use crate::data::{Data, DataType};
use crate::geometry::{EarthShape, Vec3};
use crate::grid::GridBuilder;
use crate::metadata::MetaData;
use crate::model::Model;
use crate::profile::Profile;

/// Mantle radii shared by every vertex of [`crust_model`].
pub const MANTLE_RADII: [f32; 4] = [3500.0, 4500.0, 5500.0, 6000.0];

/// Smoothly varying velocity-like value at a node.
pub fn mantle_value(u: &Vec3, radius: f64) -> f64 {
    10.0 - radius / 1000.0 + 0.3 * u[0] + 0.2 * u[2]
}

fn metadata(layers: &[&str], data_type: DataType, shape: EarthShape) -> MetaData {
    let mut md = MetaData::new();
    md.set_description("test model");
    md.set_attributes(&["vp", "vs"], &["km/s", "km/s"]).unwrap();
    md.set_layer_names(layers).unwrap();
    md.set_layer_tess_ids(vec![0; layers.len()]).unwrap();
    md.set_data_type(data_type);
    md.set_earth_shape(shape);
    md.stamp_provenance();
    md
}

/// Two-layer spherical model: an npoint mantle from 3500 to 6000 km and a
/// constant crust from 6000 to 6371 km.
pub fn crust_model() -> Model {
    let grid = Arc::new(GridBuilder::icosahedral(4).unwrap());
    let md = metadata(&["mantle", "crust"], DataType::Double, EarthShape::Sphere);
    let mut model = Model::new(Arc::clone(&grid), md).unwrap();
    for v in 0..grid.vertex_count() {
        let u = *grid.vertex(v);
        let data = MANTLE_RADII
            .iter()
            .map(|&r| {
                let vp = mantle_value(&u, r as f64);
                Data::F64(vec![vp, vp * 0.55])
            })
            .collect();
        model
            .set_profile(v, 0, Profile::npoint(MANTLE_RADII.to_vec(), data).unwrap())
            .unwrap();
        let vp = 6.0 + 0.1 * u[1];
        model
            .set_profile(
                v,
                1,
                Profile::constant(6000.0, 6371.0, Data::F64(vec![vp, vp * 0.58])).unwrap(),
            )
            .unwrap();
    }
    model
}

/// Four layers holding, bottom up, npoint, empty, thin and constant
/// profiles of `data_type`.
pub fn typed_model(data_type: DataType) -> Model {
    let grid = Arc::new(GridBuilder::icosahedral(2).unwrap());
    let md = metadata(
        &["core", "gap", "interface", "crust"],
        data_type,
        EarthShape::Wgs84,
    );
    let mut model = Model::new(Arc::clone(&grid), md).unwrap();
    for v in 0..grid.vertex_count() {
        let x = (v % 7) as f64;
        let value = |a: f64| Data::from_f64(data_type, &[a, -a]).unwrap();
        let npoint = Profile::npoint(
            vec![1000.0, 2000.0, 3480.0],
            vec![value(x), value(x + 1.0), value(x + 2.0)],
        )
        .unwrap();
        model.set_profile(v, 0, npoint).unwrap();
        model
            .set_profile(v, 1, Profile::empty(3480.0, 5000.0).unwrap())
            .unwrap();
        model
            .set_profile(v, 2, Profile::thin(5000.0, value(x + 3.0)))
            .unwrap();
        model
            .set_profile(
                v,
                3,
                Profile::constant(5000.0, 6371.0, value(x + 4.0)).unwrap(),
            )
            .unwrap();
    }
    model
}

/// Single-layer 2-D model with one value per vertex.
pub fn surface_model() -> Model {
    let grid = Arc::new(GridBuilder::icosahedral(3).unwrap());
    let md = metadata(&["surface"], DataType::Float, EarthShape::Wgs84);
    let mut model = Model::new_surface(Arc::clone(&grid), md).unwrap();
    for v in 0..grid.vertex_count() {
        let z = grid.vertex(v)[2] as f32;
        model
            .set_profile(v, 0, Profile::surface(Data::F32(vec![1.0 + z, 2.0])))
            .unwrap();
    }
    model
}
