//! Configuration for model queries and loading.

use crate::geometry::EarthShape;
use crate::types::InterpolatorType;
use serde::{Deserialize, Serialize};

/// Configuration for positions, gradients and grid reuse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTessConfig {
    /// Horizontal interpolation scheme used by new positions.
    pub horizontal_interpolation: InterpolatorType,

    /// Radial interpolation scheme used by new positions.
    pub radial_interpolation: InterpolatorType,

    /// Return boundary values instead of the error value for radii outside a layer.
    pub radius_out_of_range_allowed: bool,

    /// Share loaded grids through the process-wide grid cache.
    pub grid_reuse: bool,

    /// Edge length in km of the tetrahedron used to compute node gradients.
    pub gradient_tet_size_km: f64,

    /// Earth shape applied to models that do not record one.
    pub earth_shape: EarthShape,
}

impl Default for GeoTessConfig {
    fn default() -> Self {
        Self {
            horizontal_interpolation: InterpolatorType::Linear,
            radial_interpolation: InterpolatorType::Linear,
            radius_out_of_range_allowed: false,
            grid_reuse: true,
            gradient_tet_size_km: 10.0,
            earth_shape: EarthShape::Wgs84,
        }
    }
}

impl GeoTessConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GEOTESS_HORIZONTAL_INTERPOLATION") {
            config.horizontal_interpolation = InterpolatorType::from_str(&val);
        }

        if let Ok(val) = std::env::var("GEOTESS_RADIAL_INTERPOLATION") {
            config.radial_interpolation = InterpolatorType::from_str(&val);
        }

        if let Ok(val) = std::env::var("GEOTESS_RADIUS_OUT_OF_RANGE_ALLOWED") {
            config.radius_out_of_range_allowed = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("GEOTESS_GRID_REUSE") {
            config.grid_reuse = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("GEOTESS_GRADIENT_TET_SIZE_KM") {
            if let Ok(size) = val.parse() {
                config.gradient_tet_size_km = size;
            }
        }

        if let Ok(val) = std::env::var("GEOTESS_EARTH_SHAPE") {
            config.earth_shape = EarthShape::from_str(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.horizontal_interpolation.is_horizontal() {
            return Err(format!(
                "horizontal_interpolation cannot be {}",
                self.horizontal_interpolation
            ));
        }

        if !self.radial_interpolation.is_radial() {
            return Err(format!(
                "radial_interpolation cannot be {}",
                self.radial_interpolation
            ));
        }

        if !(self.gradient_tet_size_km > 0.0) {
            return Err("gradient_tet_size_km must be > 0".to_string());
        }

        Ok(())
    }
}
