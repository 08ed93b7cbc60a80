//! Boundary to the external feature-prediction services.

use crate::station::{PhaseType, Station};
use geotess::{geometry, EarthShape, Result};

/// Feature predicted for a source-station pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictionKind {
    /// Travel time in seconds.
    TravelTime,
    /// Horizontal slowness in seconds per degree.
    Slowness,
    /// Magnitude distance correction.
    MagnitudeCorrection,
}

/// Hypothetical source position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
}

/// One prediction request.
#[derive(Debug, Clone, Copy)]
pub struct PredictionRequest<'a> {
    pub kind: PredictionKind,
    pub source: SourceLocation,
    pub station: &'a Station,
    pub phase: PhaseType,
    /// Name of the earth model the service should predict with.
    pub earth_model: &'a str,
}

/// An external predictor. Handles are not shared between threads: the
/// populator gives each worker its own.
pub trait PredictionService {
    /// Predicted value, or `None` when the phase cannot be predicted for this
    /// pair (for example a distance outside the phase's range). Errors are
    /// reserved for failures of the service itself.
    fn predict(&mut self, request: &PredictionRequest<'_>) -> Result<Option<f64>>;

    /// Free per-thread resources. Called once by the worker that used the
    /// handle, after its last prediction.
    fn release(&mut self) {}
}

impl<S: PredictionService + ?Sized> PredictionService for Box<S> {
    fn predict(&mut self, request: &PredictionRequest<'_>) -> Result<Option<f64>> {
        (**self).predict(request)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

// ---------------------------------------------------------------------------
// Uniform-velocity reference predictor
// ---------------------------------------------------------------------------

/// Straight-ray predictor through a homogeneous earth.
///
/// Only the direct phases `P` and `S` are predicted, up to
/// `max_distance_degrees`. Useful for smoke tests and demonstrations of the
/// population pipeline; it has no seismological accuracy.
#[derive(Debug, Clone)]
pub struct UniformVelocityService {
    pub p_velocity: f64,
    pub s_velocity: f64,
    pub max_distance_degrees: f64,
    pub earth_shape: EarthShape,
    predictions: u64,
}

impl Default for UniformVelocityService {
    fn default() -> Self {
        Self::new(8.0, 4.5, 100.0)
    }
}

impl UniformVelocityService {
    pub fn new(p_velocity: f64, s_velocity: f64, max_distance_degrees: f64) -> Self {
        Self {
            p_velocity,
            s_velocity,
            max_distance_degrees,
            earth_shape: EarthShape::Sphere,
            predictions: 0,
        }
    }

    /// Number of predictions answered so far.
    pub fn predictions(&self) -> u64 {
        self.predictions
    }

    fn path_km(&self, source: &SourceLocation, station: &Station) -> (f64, f64) {
        let shape = self.earth_shape;
        let u0 = shape.vector_degrees(source.latitude, source.longitude);
        let u1 = station.unit_vector(shape);
        let r0 = shape.earth_radius(&u0) - source.depth_km;
        let r1 = shape.earth_radius(&u1) + station.elevation_km;
        (
            geometry::angle_degrees(&u0, &u1),
            geometry::distance_3d(&u0, r0, &u1, r1),
        )
    }
}

impl PredictionService for UniformVelocityService {
    fn predict(&mut self, request: &PredictionRequest<'_>) -> Result<Option<f64>> {
        let velocity = match request.phase {
            PhaseType::P => self.p_velocity,
            PhaseType::S => self.s_velocity,
            _ => return Ok(None),
        };
        let (degrees, km) = self.path_km(&request.source, request.station);
        if degrees > self.max_distance_degrees {
            return Ok(None);
        }
        self.predictions += 1;

        let value = match request.kind {
            PredictionKind::TravelTime => km / velocity,
            PredictionKind::Slowness => {
                // ray parameter of a straight ray, capped at grazing incidence
                let u = request.station.unit_vector(self.earth_shape);
                let km_per_degree = self.earth_shape.earth_radius(&u).to_radians();
                let sin_incidence = if km == 0.0 {
                    0.0
                } else {
                    (km_per_degree * degrees / km).min(1.0)
                };
                sin_incidence * km_per_degree / velocity
            }
            PredictionKind::MagnitudeCorrection => {
                1.0 + 0.01 * degrees + 0.001 * request.source.depth_km
            }
        };
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(kind: PredictionKind, station: &'a Station, phase: PhaseType, depth: f64) -> PredictionRequest<'a> {
        PredictionRequest {
            kind,
            source: SourceLocation {
                latitude: 0.0,
                longitude: 0.0,
                depth_km: depth,
            },
            station,
            phase,
            earth_model: "uniform",
        }
    }

    #[test]
    fn test_travel_time_grows_with_distance() {
        let mut service = UniformVelocityService::default();
        let near = Station::new("NEAR", 0.0, 10.0, 0.0);
        let far = Station::new("FAR", 0.0, 20.0, 0.0);
        let t_near = service.predict(&request(PredictionKind::TravelTime, &near, PhaseType::P, 10.0)).unwrap().unwrap();
        let t_far = service.predict(&request(PredictionKind::TravelTime, &far, PhaseType::P, 10.0)).unwrap().unwrap();
        assert!(t_far > t_near);
        let s_near = service.predict(&request(PredictionKind::TravelTime, &near, PhaseType::S, 10.0)).unwrap().unwrap();
        assert!(s_near > t_near);
        assert_eq!(service.predictions(), 3);
    }

    #[test]
    fn test_unpredictable_phase_and_distance() {
        let mut service = UniformVelocityService::new(8.0, 4.5, 30.0);
        let near = Station::new("NEAR", 0.0, 10.0, 0.0);
        let far = Station::new("FAR", 0.0, 60.0, 0.0);
        assert_eq!(service.predict(&request(PredictionKind::TravelTime, &near, PhaseType::Pn, 0.0)).unwrap(), None);
        assert_eq!(service.predict(&request(PredictionKind::TravelTime, &far, PhaseType::P, 0.0)).unwrap(), None);
        assert_eq!(service.predictions(), 0);
    }

    #[test]
    fn test_slowness_positive() {
        let mut service = UniformVelocityService::default();
        let station = Station::new("STA", 20.0, 30.0, 0.0);
        let s = service
            .predict(&request(PredictionKind::Slowness, &station, PhaseType::P, 50.0))
            .unwrap()
            .unwrap();
        assert!(s > 0.0 && s < 111.2 / 8.0 + 1e-9);
    }
}
