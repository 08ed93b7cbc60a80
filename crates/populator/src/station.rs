//! Reference stations and seismic phases.

use geotess::{EarthShape, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Namespace for ids derived from names, so the same inputs always yield the
/// same ids.
pub const ID_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_3c2a_9b47_4e1c_a0e5_52c8_7f31_d904);

/// Seismic phase predicted at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseType {
    P,
    S,
    Pn,
    Pg,
    Sn,
    Sg,
    Lg,
    PcP,
    ScS,
    PKP,
    PKiKP,
}

impl PhaseType {
    pub const ALL: [PhaseType; 11] = [
        Self::P,
        Self::S,
        Self::Pn,
        Self::Pg,
        Self::Sn,
        Self::Sg,
        Self::Lg,
        Self::PcP,
        Self::ScS,
        Self::PKP,
        Self::PKiKP,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P => "P",
            Self::S => "S",
            Self::Pn => "Pn",
            Self::Pg => "Pg",
            Self::Sn => "Sn",
            Self::Sg => "Sg",
            Self::Lg => "Lg",
            Self::PcP => "PcP",
            Self::ScS => "ScS",
            Self::PKP => "PKP",
            Self::PKiKP => "PKiKP",
        }
    }

    /// Only direct P counts as the primary phase.
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::P)
    }

    /// Compressional phases.
    pub fn is_p_wave(&self) -> bool {
        matches!(
            self,
            Self::P | Self::Pn | Self::Pg | Self::PcP | Self::PKP | Self::PKiKP
        )
    }
}

impl fmt::Display for PhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseType {
    type Err = String;

    /// Phase names are case sensitive: `Pg` and `PG` are different names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase type: {}", s))
    }
}

/// Reference station location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Derived from the name when not given.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    /// Geographic latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Elevation above sea level in km.
    #[serde(default)]
    pub elevation_km: f64,
}

impl Station {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, elevation_km: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            latitude,
            longitude,
            elevation_km,
        }
    }

    /// The configured id, or one derived from the name.
    pub fn station_id(&self) -> Uuid {
        self.id
            .unwrap_or_else(|| Uuid::new_v5(&ID_NAMESPACE, self.name.as_bytes()))
    }

    pub fn unit_vector(&self, shape: EarthShape) -> Vec3 {
        shape.vector_degrees(self.latitude, self.longitude)
    }

    pub(crate) fn validate(&self, problems: &mut Vec<String>) {
        if self.name.trim().is_empty() {
            problems.push("station with an empty name".to_string());
        }
        if !(self.latitude.abs() <= 90.0) {
            problems.push(format!("station {} latitude {} out of range", self.name, self.latitude));
        }
        if !(self.longitude.abs() <= 360.0) {
            problems.push(format!(
                "station {} longitude {} out of range",
                self.name, self.longitude
            ));
        }
    }
}
