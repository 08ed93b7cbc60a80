//! Grid-node and phase-info generation from prediction samples.
//!
//! Each grid node is the center of a vertical cylinder. Predictions are
//! sampled at the center and at points on the cylinder's rim along the great
//! circle through the station:
//!
//! ```text
//!            farther         center          closer ──► station
//!   top        ●───────────────●───────────────●
//!              │               │               │
//!   center     ●               ●               ●
//!              │               │               │
//!   bottom     ●───────────────●───────────────●
//! ```
//!
//! The travel-time bounds come from the four rim corners, the radial
//! derivatives from the rim points at center depth, and the vertical
//! derivatives from the top and bottom of the central axis.

use crate::config::PopulationConfig;
use crate::node::{GridNode, NodeStation, PhaseInfo};
use crate::prediction::{PredictionKind, PredictionRequest, PredictionService, SourceLocation};
use crate::station::{PhaseType, Station, ID_NAMESPACE};
use geotess::{geometry, EarthShape, Result, Vec3};
use uuid::Uuid;

/// Azimuth in degrees, clockwise from north in `[0, 360)`, of the great
/// circle from `from` toward `to`.
///
/// At the poles north is undefined and the azimuth is measured from the
/// direction of the prime meridian.
pub fn azimuth_degrees(from: &Vec3, to: &Vec3) -> f64 {
    let mut east = geometry::cross(&[0.0, 0.0, 1.0], from);
    if geometry::normalize(&mut east) == 0.0 {
        east = [0.0, 1.0, 0.0];
    }
    let north = geometry::cross(from, &east);
    let az = geometry::dot(to, &east)
        .atan2(geometry::dot(to, &north))
        .to_degrees();
    if az < 0.0 {
        az + 360.0
    } else {
        az
    }
}

/// Unit vector tangent to the sphere at `u`, pointing toward `target`.
fn tangent_toward(u: &Vec3, target: &Vec3) -> Vec3 {
    let along = geometry::dot(u, target);
    let mut t = geometry::add(target, &geometry::scale(u, -along));
    if geometry::normalize(&mut t) > 1e-12 {
        return t;
    }
    // station at the center or its antipode; any direction will do
    let mut t = geometry::cross(u, &[0.0, 0.0, 1.0]);
    if geometry::normalize(&mut t) == 0.0 {
        t = [1.0, 0.0, 0.0];
    }
    t
}

// ---------------------------------------------------------------------------
// Phase info
// ---------------------------------------------------------------------------

/// Computes the [`PhaseInfo`] of one phase from a grid cylinder to a station.
#[derive(Debug, Clone)]
pub struct PhaseInfoGenerator {
    pub earth_shape: EarthShape,
    pub cylinder_radius_degrees: f64,
    pub cylinder_height_km: f64,
    pub minimum_magnitude: f64,
    pub travel_time_model: String,
    pub magnitude_model: String,
}

/// Prediction points of one cylinder, in unit vectors and depths.
struct Cylinder {
    center: Vec3,
    closer: Vec3,
    farther: Vec3,
    depth: f64,
    top: f64,
    bottom: f64,
}

impl PhaseInfoGenerator {
    pub fn from_config(config: &PopulationConfig) -> Self {
        Self {
            earth_shape: config.earth_shape,
            cylinder_radius_degrees: config.grid_cylinder_radius_degrees,
            cylinder_height_km: config.grid_cylinder_height_km,
            minimum_magnitude: config.minimum_magnitude,
            travel_time_model: config.travel_time_model.clone(),
            magnitude_model: config.magnitude_model.clone(),
        }
    }

    fn cylinder(&self, center: &Vec3, depth_km: f64, station: &Vec3) -> Cylinder {
        let t = tangent_toward(center, station);
        let (sin, cos) = self.cylinder_radius_degrees.to_radians().sin_cos();
        let axis = geometry::scale(center, cos);
        Cylinder {
            center: *center,
            closer: geometry::add(&axis, &geometry::scale(&t, sin)),
            farther: geometry::add(&axis, &geometry::scale(&t, -sin)),
            depth: depth_km,
            top: (depth_km - self.cylinder_height_km / 2.0).max(0.0),
            bottom: depth_km + self.cylinder_height_km / 2.0,
        }
    }

    fn predict<S: PredictionService + ?Sized>(
        &self,
        service: &mut S,
        kind: PredictionKind,
        u: &Vec3,
        depth_km: f64,
        station: &Station,
        phase: PhaseType,
    ) -> Result<Option<f64>> {
        let earth_model = match kind {
            PredictionKind::MagnitudeCorrection => self.magnitude_model.as_str(),
            PredictionKind::TravelTime | PredictionKind::Slowness => self.travel_time_model.as_str(),
        };
        let request = PredictionRequest {
            kind,
            source: SourceLocation {
                latitude: self.earth_shape.lat_degrees(u),
                longitude: self.earth_shape.lon_degrees(u),
                depth_km,
            },
            station,
            phase,
            earth_model,
        };
        Ok(service.predict(&request)?.filter(|v| v.is_finite()))
    }

    /// `None` when any of the required predictions is unavailable.
    pub fn generate<S: PredictionService + ?Sized>(
        &self,
        service: &mut S,
        center: &Vec3,
        center_depth_km: f64,
        station: &Station,
        phase: PhaseType,
    ) -> Result<Option<PhaseInfo>> {
        use PredictionKind::*;

        let u_station = station.unit_vector(self.earth_shape);
        let c = self.cylinder(center, center_depth_km, &u_station);
        let diameter = 2.0 * self.cylinder_radius_degrees;
        let height = c.bottom - c.top;
        let generator = self;

        macro_rules! predict {
            ($kind:expr, $u:expr, $depth:expr) => {
                match generator.predict(service, $kind, $u, $depth, station, phase)? {
                    Some(v) => v,
                    None => return Ok(None),
                }
            };
        }

        let corners = [
            predict!(TravelTime, &c.closer, c.top),
            predict!(TravelTime, &c.closer, c.bottom),
            predict!(TravelTime, &c.farther, c.top),
            predict!(TravelTime, &c.farther, c.bottom),
        ];
        let travel_time_minimum = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let travel_time_maximum = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let tt_closer = predict!(TravelTime, &c.closer, c.depth);
        let tt_farther = predict!(TravelTime, &c.farther, c.depth);
        let tt_top = predict!(TravelTime, &c.center, c.top);
        let tt_bottom = predict!(TravelTime, &c.center, c.bottom);
        let travel_time_seconds = predict!(TravelTime, &c.center, c.depth);

        let magnitude_correction = predict!(MagnitudeCorrection, &c.center, c.depth);
        let mc_closer = predict!(MagnitudeCorrection, &c.closer, c.depth);
        let mc_farther = predict!(MagnitudeCorrection, &c.farther, c.depth);
        let mc_top = predict!(MagnitudeCorrection, &c.center, c.top);
        let mc_bottom = predict!(MagnitudeCorrection, &c.center, c.bottom);

        let slowness_closer = predict!(Slowness, &c.closer, c.depth);
        let slowness_farther = predict!(Slowness, &c.farther, c.depth);
        let slowness = predict!(Slowness, &c.center, c.depth);

        Ok(Some(PhaseInfo {
            phase,
            primary: phase.is_primary(),
            travel_time_seconds,
            azimuth_degrees: azimuth_degrees(center, &u_station),
            back_azimuth_degrees: azimuth_degrees(&u_station, center),
            travel_time_minimum,
            travel_time_maximum,
            radial_travel_time_derivative: (tt_closer - tt_farther) / diameter,
            vertical_travel_time_derivative: (tt_bottom - tt_top) / height,
            slowness_cell_width: (slowness_closer - slowness_farther) / diameter,
            slowness,
            minimum_magnitude: self.minimum_magnitude,
            magnitude_correction,
            radial_magnitude_correction_derivative: (mc_closer - mc_farther) / diameter,
            vertical_magnitude_correction_derivative: (mc_bottom - mc_top) / height,
        }))
    }
}

// ---------------------------------------------------------------------------
// Grid nodes
// ---------------------------------------------------------------------------

/// Builds the [`GridNode`] of a grid vertex over every configured station
/// and phase.
#[derive(Debug, Clone)]
pub struct GridNodeGenerator {
    phase_info: PhaseInfoGenerator,
    center_depth_km: f64,
    stations: Vec<Station>,
    phases: Vec<PhaseType>,
}

impl GridNodeGenerator {
    pub fn from_config(config: &PopulationConfig) -> Self {
        Self {
            phase_info: PhaseInfoGenerator::from_config(config),
            center_depth_km: config.center_depth_km,
            stations: config.stations.clone(),
            phases: config.phases.clone(),
        }
    }

    /// Id of the node at `vertex` of the grid `grid_id`. Stable across runs.
    pub fn node_id(grid_id: &str, vertex: usize) -> Uuid {
        Uuid::new_v5(&ID_NAMESPACE, format!("{}/{}", grid_id, vertex).as_bytes())
    }

    /// `None` when no station has a computable phase.
    pub fn generate<S: PredictionService + ?Sized>(
        &self,
        service: &mut S,
        grid_id: &str,
        vertex: usize,
        center: &Vec3,
    ) -> Result<Option<GridNode>> {
        let id = Self::node_id(grid_id, vertex);
        let mut node_stations = Vec::new();
        for station in &self.stations {
            let mut phase_infos = Vec::new();
            for &phase in &self.phases {
                if let Some(info) =
                    self.phase_info
                        .generate(service, center, self.center_depth_km, station, phase)?
                {
                    phase_infos.push(info);
                }
            }
            if phase_infos.is_empty() {
                continue;
            }
            let station_id = station.station_id();
            node_stations.push(NodeStation {
                id: Uuid::new_v5(&id, station_id.as_bytes()),
                station_id,
                distance_degrees: geometry::angle_degrees(
                    center,
                    &station.unit_vector(self.phase_info.earth_shape),
                ),
                phase_infos,
            });
        }

        if node_stations.is_empty() {
            return Ok(None);
        }
        let shape = self.phase_info.earth_shape;
        let mut node = GridNode {
            id,
            center_latitude_degrees: shape.lat_degrees(center),
            center_longitude_degrees: shape.lon_degrees(center),
            center_depth_km: self.center_depth_km,
            grid_cell_height_km: self.phase_info.cylinder_height_km,
            node_stations,
        };
        node.sort();
        Ok(Some(node))
    }
}
