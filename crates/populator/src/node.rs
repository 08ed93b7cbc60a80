//! Per-vertex prediction summaries stored in populated models.

use crate::station::PhaseType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Predictions for one phase from a grid cylinder to one station.
///
/// Travel times are in seconds, radial derivatives per degree, vertical
/// derivatives per km, angles in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInfo {
    pub phase: PhaseType,
    pub primary: bool,
    pub travel_time_seconds: f64,
    pub azimuth_degrees: f64,
    pub back_azimuth_degrees: f64,
    pub travel_time_minimum: f64,
    pub travel_time_maximum: f64,
    pub radial_travel_time_derivative: f64,
    pub vertical_travel_time_derivative: f64,
    pub slowness_cell_width: f64,
    pub slowness: f64,
    pub minimum_magnitude: f64,
    pub magnitude_correction: f64,
    pub radial_magnitude_correction_derivative: f64,
    pub vertical_magnitude_correction_derivative: f64,
}

impl PhaseInfo {
    /// The thirteen numeric fields in storage order.
    pub(crate) fn numbers(&self) -> [f64; 13] {
        [
            self.travel_time_seconds,
            self.azimuth_degrees,
            self.back_azimuth_degrees,
            self.travel_time_minimum,
            self.travel_time_maximum,
            self.radial_travel_time_derivative,
            self.vertical_travel_time_derivative,
            self.slowness_cell_width,
            self.slowness,
            self.minimum_magnitude,
            self.magnitude_correction,
            self.radial_magnitude_correction_derivative,
            self.vertical_magnitude_correction_derivative,
        ]
    }

    pub(crate) fn from_numbers(phase: PhaseType, primary: bool, n: [f64; 13]) -> Self {
        Self {
            phase,
            primary,
            travel_time_seconds: n[0],
            azimuth_degrees: n[1],
            back_azimuth_degrees: n[2],
            travel_time_minimum: n[3],
            travel_time_maximum: n[4],
            radial_travel_time_derivative: n[5],
            vertical_travel_time_derivative: n[6],
            slowness_cell_width: n[7],
            slowness: n[8],
            minimum_magnitude: n[9],
            magnitude_correction: n[10],
            radial_magnitude_correction_derivative: n[11],
            vertical_magnitude_correction_derivative: n[12],
        }
    }
}

/// A station seen from a grid node, with one entry per computable phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStation {
    pub id: Uuid,
    pub station_id: Uuid,
    pub distance_degrees: f64,
    /// Sorted by phase.
    pub phase_infos: Vec<PhaseInfo>,
}

impl NodeStation {
    /// Earliest predicted travel time over all phases.
    pub fn first_arrival(&self) -> Option<&PhaseInfo> {
        self.phase_infos
            .iter()
            .min_by(|a, b| a.travel_time_seconds.total_cmp(&b.travel_time_seconds))
    }

    pub fn phase_info(&self, phase: PhaseType) -> Option<&PhaseInfo> {
        self.phase_infos.iter().find(|p| p.phase == phase)
    }
}

/// Center of a grid cylinder and the stations that can observe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    pub id: Uuid,
    pub center_latitude_degrees: f64,
    pub center_longitude_degrees: f64,
    pub center_depth_km: f64,
    pub grid_cell_height_km: f64,
    /// Sorted by station id.
    pub node_stations: Vec<NodeStation>,
}

impl GridNode {
    pub fn node_station(&self, station_id: &Uuid) -> Option<&NodeStation> {
        self.node_stations
            .binary_search_by(|ns| ns.station_id.cmp(station_id))
            .ok()
            .map(|i| &self.node_stations[i])
    }

    /// Put stations and phases into storage order.
    pub(crate) fn sort(&mut self) {
        self.node_stations.sort_by(|a, b| a.station_id.cmp(&b.station_id));
        for ns in &mut self.node_stations {
            ns.phase_infos.sort_by_key(|p| p.phase);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn phase_info(phase: PhaseType, tt: f64) -> PhaseInfo {
        PhaseInfo {
            phase,
            primary: phase.is_primary(),
            travel_time_seconds: tt,
            azimuth_degrees: 45.0,
            back_azimuth_degrees: 225.0,
            travel_time_minimum: tt - 1.5,
            travel_time_maximum: tt + 1.5,
            radial_travel_time_derivative: -0.3,
            vertical_travel_time_derivative: 0.01,
            slowness_cell_width: 0.02,
            slowness: 13.7,
            minimum_magnitude: 3.5,
            magnitude_correction: 1.25,
            radial_magnitude_correction_derivative: 0.001,
            vertical_magnitude_correction_derivative: -0.002,
        }
    }

    pub(crate) fn grid_node() -> GridNode {
        let mut node = GridNode {
            id: Uuid::from_u128(1),
            center_latitude_degrees: 12.5,
            center_longitude_degrees: -45.25,
            center_depth_km: 50.0,
            grid_cell_height_km: 100.0,
            node_stations: vec![
                NodeStation {
                    id: Uuid::from_u128(20),
                    station_id: Uuid::from_u128(9),
                    distance_degrees: 31.5,
                    phase_infos: vec![phase_info(PhaseType::S, 700.0), phase_info(PhaseType::P, 400.0)],
                },
                NodeStation {
                    id: Uuid::from_u128(21),
                    station_id: Uuid::from_u128(3),
                    distance_degrees: 12.0,
                    phase_infos: vec![phase_info(PhaseType::Pn, 180.0)],
                },
            ],
        };
        node.sort();
        node
    }

    #[test]
    fn test_sort_order() {
        let node = grid_node();
        assert_eq!(node.node_stations[0].station_id, Uuid::from_u128(3));
        assert_eq!(node.node_stations[1].phase_infos[0].phase, PhaseType::P);
        assert!(node.node_station(&Uuid::from_u128(9)).is_some());
        assert!(node.node_station(&Uuid::from_u128(4)).is_none());
    }

    #[test]
    fn test_first_arrival() {
        let node = grid_node();
        let ns = node.node_station(&Uuid::from_u128(9)).unwrap();
        assert_eq!(ns.first_arrival().map(|p| p.phase), Some(PhaseType::P));
        assert_eq!(ns.phase_info(PhaseType::S).unwrap().travel_time_seconds, 700.0);
    }

    #[test]
    fn test_numbers_round_trip() {
        let info = phase_info(PhaseType::Lg, 95.0);
        let back = PhaseInfo::from_numbers(info.phase, info.primary, info.numbers());
        assert_eq!(back, info);
    }
}
