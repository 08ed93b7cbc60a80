//! Core enums and small value types shared across the crate.

use serde::{Deserialize, Serialize};

/// Interpolation scheme, horizontal or radial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterpolatorType {
    /// Barycentric (horizontal) or piecewise-linear (radial).
    #[default]
    Linear,
    /// Sibson natural-neighbor interpolation (horizontal only).
    NaturalNeighbor,
    /// Natural cubic spline (radial only).
    CubicSpline,
}

impl InterpolatorType {
    /// Parse from string (case-insensitive). Unknown names fall back to linear.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "natural_neighbor" | "naturalneighbor" | "nn" => Self::NaturalNeighbor,
            "cubic_spline" | "cubicspline" | "spline" => Self::CubicSpline,
            _ => Self::Linear,
        }
    }

    /// Get the name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::NaturalNeighbor => "natural_neighbor",
            Self::CubicSpline => "cubic_spline",
        }
    }

    /// Whether the scheme can be used to interpolate across the grid.
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Self::Linear | Self::NaturalNeighbor)
    }

    /// Whether the scheme can be used to interpolate along a profile.
    pub fn is_radial(&self) -> bool {
        matches!(self, Self::Linear | Self::CubicSpline)
    }
}

impl std::fmt::Display for InterpolatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statistics about the grid cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Distinct grids held.
    pub entries: usize,
    /// Paths resolved to a cached grid.
    pub paths: usize,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Count of profiles of each shape in a model, plus the number of vertices
/// that carry at least one non-empty profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCounts {
    pub empty: usize,
    pub thin: usize,
    pub constant: usize,
    pub npoint: usize,
    pub surface: usize,
    pub surface_empty: usize,
    pub active_vertices: usize,
}

impl ProfileCounts {
    /// Total number of profiles counted.
    pub fn total(&self) -> usize {
        self.empty + self.thin + self.constant + self.npoint + self.surface + self.surface_empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolator_type_from_str() {
        assert_eq!(InterpolatorType::from_str("LINEAR"), InterpolatorType::Linear);
        assert_eq!(
            InterpolatorType::from_str("natural-neighbor"),
            InterpolatorType::NaturalNeighbor
        );
        assert_eq!(
            InterpolatorType::from_str("cubic_spline"),
            InterpolatorType::CubicSpline
        );
        assert_eq!(InterpolatorType::from_str("invalid"), InterpolatorType::Linear);
    }

    #[test]
    fn test_interpolator_type_roles() {
        assert!(InterpolatorType::NaturalNeighbor.is_horizontal());
        assert!(!InterpolatorType::NaturalNeighbor.is_radial());
        assert!(InterpolatorType::CubicSpline.is_radial());
        assert!(!InterpolatorType::CubicSpline.is_horizontal());
        assert!(InterpolatorType::Linear.is_horizontal() && InterpolatorType::Linear.is_radial());
    }

    #[test]
    fn test_cache_stats_hit_rate() {
        let mut stats = CacheStats::default();
        assert!((stats.hit_rate() - 0.0).abs() < f64::EPSILON);

        stats.hits = 80;
        stats.misses = 20;
        assert!((stats.hit_rate() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_profile_counts_total() {
        let counts = ProfileCounts {
            empty: 2,
            thin: 1,
            npoint: 3,
            ..Default::default()
        };
        assert_eq!(counts.total(), 6);
    }
}
