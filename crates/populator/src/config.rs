//! Population configuration.

use crate::error::PopulationConfigError;
use crate::station::{PhaseType, Station};
use geotess::{EarthShape, GeoTessError, Grid, GridCache, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inputs of a population run.
///
/// Numeric fields default to NaN, meaning "not set"; [`PopulationConfig::validate`]
/// reports each of them. A YAML file looks like:
///
/// ```yaml
/// grid_file: grids/global_4deg.geotess
/// earth_shape: Wgs84
/// grid_cylinder_radius_degrees: 2.0
/// minimum_magnitude: 3.5
/// phases: [P, S, Pn]
/// stations:
///   - { name: ASAR, latitude: -23.665, longitude: 133.905, elevation_km: 0.607 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Grid file, resolved through the process-wide grid cache.
    #[serde(default)]
    pub grid_file: Option<PathBuf>,

    /// Grid supplied directly. Takes precedence over `grid_file`.
    #[serde(skip)]
    pub grid: Option<Arc<Grid>>,

    #[serde(default = "default_earth_shape")]
    pub earth_shape: EarthShape,

    /// Name of the single layer of the populated model.
    #[serde(default = "default_layer_name")]
    pub layer_name: String,

    /// Horizontal radius of the cylinder around each grid node.
    #[serde(default = "not_set")]
    pub grid_cylinder_radius_degrees: f64,

    #[serde(default = "default_cylinder_height")]
    pub grid_cylinder_height_km: f64,

    /// Depth of the cylinder centers.
    #[serde(default = "default_center_depth")]
    pub center_depth_km: f64,

    #[serde(default)]
    pub phases: Vec<PhaseType>,

    #[serde(default)]
    pub stations: Vec<Station>,

    #[serde(default = "not_set")]
    pub minimum_magnitude: f64,

    /// Earth model for travel time and slowness predictions.
    #[serde(default = "default_travel_time_model")]
    pub travel_time_model: String,

    /// Earth model for magnitude corrections.
    #[serde(default = "default_magnitude_model")]
    pub magnitude_model: String,
}

fn not_set() -> f64 {
    f64::NAN
}

fn default_earth_shape() -> EarthShape {
    EarthShape::Wgs84
}

fn default_layer_name() -> String {
    "CRUST".to_string()
}

fn default_cylinder_height() -> f64 {
    100.0
}

fn default_center_depth() -> f64 {
    50.0
}

fn default_travel_time_model() -> String {
    "ak135".to_string()
}

fn default_magnitude_model() -> String {
    "VeithClawson72".to_string()
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            grid_file: None,
            grid: None,
            earth_shape: default_earth_shape(),
            layer_name: default_layer_name(),
            grid_cylinder_radius_degrees: not_set(),
            grid_cylinder_height_km: default_cylinder_height(),
            center_depth_km: default_center_depth(),
            phases: Vec::new(),
            stations: Vec::new(),
            minimum_magnitude: not_set(),
            travel_time_model: default_travel_time_model(),
            magnitude_model: default_magnitude_model(),
        }
    }
}

impl PopulationConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML file. A relative `grid_file` is taken relative to the
    /// directory of the config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&text)?;
        if let (Some(grid_file), Some(dir)) = (&config.grid_file, path.parent()) {
            if grid_file.is_relative() {
                config.grid_file = Some(dir.join(grid_file));
            }
        }
        Ok(config)
    }

    pub fn with_grid(mut self, grid: Arc<Grid>) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Check every field and report all problems at once.
    pub fn validate(&self) -> std::result::Result<(), PopulationConfigError> {
        let mut problems = Vec::new();

        if self.grid.is_none() && self.grid_file.is_none() {
            problems.push("grid not set (grid or grid_file)".to_string());
        }
        if self.layer_name.trim().is_empty() {
            problems.push("layer_name is empty".to_string());
        }

        check_number(
            &mut problems,
            "grid_cylinder_radius_degrees",
            self.grid_cylinder_radius_degrees,
            |r| r > 0.0 && r < 90.0,
            "must be in (0, 90)",
        );
        check_number(
            &mut problems,
            "grid_cylinder_height_km",
            self.grid_cylinder_height_km,
            |h| h > 0.0,
            "must be > 0",
        );
        check_number(
            &mut problems,
            "center_depth_km",
            self.center_depth_km,
            |d| d >= 0.0,
            "must be >= 0",
        );
        check_number(
            &mut problems,
            "minimum_magnitude",
            self.minimum_magnitude,
            f64::is_finite,
            "must be finite",
        );

        if self.phases.is_empty() {
            problems.push("phases not set".to_string());
        }
        if self.stations.is_empty() {
            problems.push("stations not set".to_string());
        }
        let mut ids = HashSet::new();
        for station in &self.stations {
            station.validate(&mut problems);
            if !ids.insert(station.station_id()) {
                problems.push(format!("station {} listed twice", station.name));
            }
        }

        if self.travel_time_model.trim().is_empty() {
            problems.push("travel_time_model is empty".to_string());
        }
        if self.magnitude_model.trim().is_empty() {
            problems.push("magnitude_model is empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PopulationConfigError::new(problems))
        }
    }

    /// The configured grid, loading `grid_file` through the global cache
    /// when no grid was supplied.
    pub fn resolve_grid(&self) -> Result<Arc<Grid>> {
        match (&self.grid, &self.grid_file) {
            (Some(grid), _) => Ok(Arc::clone(grid)),
            (None, Some(path)) => GridCache::global().get_or_load(path),
            (None, None) => Err(GeoTessError::invalid_argument("grid not set")),
        }
    }
}

fn check_number(
    problems: &mut Vec<String>,
    name: &str,
    value: f64,
    valid: impl Fn(f64) -> bool,
    requirement: &str,
) {
    if value.is_nan() {
        problems.push(format!("{} not set", name));
    } else if !valid(value) {
        problems.push(format!("{} {} {}", name, requirement, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_lists_every_missing_field() {
        let err = PopulationConfig::default().validate().unwrap_err();
        assert!(err.mentions("grid not set"));
        assert!(err.mentions("grid_cylinder_radius_degrees not set"));
        assert!(err.mentions("minimum_magnitude not set"));
        assert!(err.mentions("phases not set"));
        assert!(err.mentions("stations not set"));
        assert_eq!(err.problems.len(), 5);
    }

    #[test]
    fn test_invalid_values() {
        let config = PopulationConfig {
            grid_file: Some(PathBuf::from("grid.geotess")),
            grid_cylinder_radius_degrees: 95.0,
            grid_cylinder_height_km: 0.0,
            center_depth_km: -1.0,
            minimum_magnitude: 3.0,
            phases: vec![PhaseType::P],
            stations: vec![
                Station::new("ASAR", -23.665, 133.905, 0.607),
                Station::new("ASAR", -23.665, 133.905, 0.607),
            ],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.mentions("grid_cylinder_radius_degrees must be in (0, 90)"));
        assert!(err.mentions("grid_cylinder_height_km must be > 0"));
        assert!(err.mentions("center_depth_km must be >= 0"));
        assert!(err.mentions("listed twice"));
        assert_eq!(err.problems.len(), 4);
    }

    #[test]
    fn test_config_yaml() {
        let yaml = "grid_file: grids/global.geotess\n\
                    earth_shape: Sphere\n\
                    grid_cylinder_radius_degrees: 2.0\n\
                    minimum_magnitude: 3.5\n\
                    phases: [P, S, Pn]\n\
                    stations:\n  \
                      - { name: ASAR, latitude: -23.665, longitude: 133.905, elevation_km: 0.607 }\n  \
                      - { name: WRA, latitude: -19.942, longitude: 134.340 }\n";
        let config = PopulationConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.earth_shape, EarthShape::Sphere);
        assert_eq!(config.phases, vec![PhaseType::P, PhaseType::S, PhaseType::Pn]);
        assert_eq!(config.stations.len(), 2);
        assert_eq!(config.stations[1].elevation_km, 0.0);
        assert_eq!(config.layer_name, "CRUST");
        assert_eq!(config.grid_cylinder_height_km, 100.0);
        assert_eq!(config.travel_time_model, "ak135");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_phase_in_yaml() {
        let yaml = "phases: [P, PG]\n";
        assert!(PopulationConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_resolve_grid_without_grid() {
        let err = PopulationConfig::default().resolve_grid().unwrap_err();
        assert!(matches!(err, GeoTessError::InvalidArgument(_)));
    }
}
