//! Finite-difference gradients from a tetrahedron of samples.
//!
//! Four samples are taken at the corners of a regular tetrahedron centred
//! on the node. A plane `g · x + c = value` through the four samples gives
//! the gradient `g`, solved as a 4×4 linear system.

use crate::error::{GeoTessError, Result};
use crate::geometry::{self, Vec3};
use crate::position::Position;
use crate::profile::Profile;
use nalgebra::{Matrix4, Vector4};

/// Corners of a regular tetrahedron inscribed in the unit sphere.
const TETRAHEDRON: [Vec3; 4] = [
    [0.0, 0.0, 1.0],
    [0.942809041582063, 0.0, -1.0 / 3.0],
    [-0.471404520791032, 0.816496580927726, -1.0 / 3.0],
    [-0.471404520791032, -0.816496580927726, -1.0 / 3.0],
];

/// Default tetrahedron size in km.
pub const DEFAULT_TET_SIZE_KM: f64 = 10.0;

/// Computes attribute gradients by sampling a model around a point.
#[derive(Debug, Clone)]
pub struct GradientCalculator {
    tet_size: f64,
    offsets: [Vec3; 4],
}

impl Default for GradientCalculator {
    fn default() -> Self {
        Self::with_size(DEFAULT_TET_SIZE_KM)
    }
}

impl GradientCalculator {
    /// Calculator whose tetrahedron corners lie `tet_size_km` from its center.
    pub fn new(tet_size_km: f64) -> Result<Self> {
        if !(tet_size_km > 0.0) || !tet_size_km.is_finite() {
            return Err(GeoTessError::invalid_argument(format!(
                "tetrahedron size must be positive, got {}",
                tet_size_km
            )));
        }
        Ok(Self::with_size(tet_size_km))
    }

    fn with_size(tet_size: f64) -> Self {
        Self {
            tet_size,
            offsets: TETRAHEDRON.map(|v| geometry::scale(&v, tet_size)),
        }
    }

    pub fn tet_size(&self) -> f64 {
        self.tet_size
    }

    /// Gradient of `attr` (or of its reciprocal) at unit vector `u` and
    /// `radius` in `layer`, in attribute units per km.
    ///
    /// `pos` should allow out-of-range radii so that samples falling outside
    /// the layer are clamped onto its boundary.
    pub fn gradient(
        &self,
        pos: &mut Position<'_>,
        u: &Vec3,
        radius: f64,
        layer: usize,
        attr: usize,
        reciprocal: bool,
    ) -> Result<Vec3> {
        let center = geometry::scale(u, radius);
        let mut a = Matrix4::<f64>::zeros();
        let mut b = Vector4::<f64>::zeros();
        for (i, offset) in self.offsets.iter().enumerate() {
            let mut v = geometry::add(&center, offset);
            let r = geometry::normalize(&mut v);
            pos.set(Some(layer), &v, r)?;
            let rad = pos.set_radius_constrained(layer)?;
            let value = pos.value(attr);

            a[(i, 0)] = v[0] * rad;
            a[(i, 1)] = v[1] * rad;
            a[(i, 2)] = v[2] * rad;
            a[(i, 3)] = 1.0;
            b[i] = if reciprocal { 1.0 / value } else { value };
        }
        let x = a
            .lu()
            .solve(&b)
            .ok_or_else(|| GeoTessError::invalid_argument("degenerate gradient tetrahedron"))?;
        Ok([x[0], x[1], x[2]])
    }

    /// Gradients at every node of one profile. Constant profiles get one
    /// gradient at their mid radius; profiles without data get none.
    pub fn profile_gradients(
        &self,
        pos: &mut Position<'_>,
        u: &Vec3,
        profile: &Profile,
        layer: usize,
        attr: usize,
        reciprocal: bool,
    ) -> Result<Vec<Vec3>> {
        let radii: Vec<f64> = match profile {
            Profile::Empty { .. } | Profile::SurfaceEmpty | Profile::Surface { .. } => Vec::new(),
            Profile::Thin { radius, .. } => vec![*radius as f64],
            Profile::Constant { .. } => {
                vec![(profile.radius_bottom() + profile.radius_top()) / 2.0]
            }
            Profile::NPoint { radii, .. } => radii.iter().map(|&r| r as f64).collect(),
        };
        radii
            .into_iter()
            .map(|r| self.gradient(pos, u, r, layer, attr, reciprocal))
            .collect()
    }
}
