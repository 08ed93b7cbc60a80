//! Common fixtures for geotess tests.
//!
//! Named locations and a simple layered earth used across the test suites.

/// Geographic locations as `(latitude, longitude)` in degrees.
pub mod location {
    pub const NORTH_POLE: (f64, f64) = (90.0, 0.0);
    pub const SOUTH_POLE: (f64, f64) = (-90.0, 0.0);
    pub const NULL_ISLAND: (f64, f64) = (0.0, 0.0);
    /// On the antimeridian.
    pub const DATELINE: (f64, f64) = (10.0, 180.0);
    pub const ALBUQUERQUE: (f64, f64) = (35.08, -106.65);
    pub const TOKYO: (f64, f64) = (35.68, 139.69);
    pub const ANTARCTICA: (f64, f64) = (-75.0, 123.0);

    /// Every named location.
    pub const ALL: [(f64, f64); 7] = [
        NORTH_POLE,
        SOUTH_POLE,
        NULL_ISLAND,
        DATELINE,
        ALBUQUERQUE,
        TOKYO,
        ANTARCTICA,
    ];
}

/// A spherical earth of four layers, bottom to top, radii in km.
pub mod earth {
    /// Radius of the spherical earth shape.
    pub const RADIUS: f64 = 6371.0;

    /// `(name, bottom radius, top radius)` of every layer.
    pub const LAYERS: [(&str, f32, f32); 4] = [
        ("core", 0.0, 3480.0),
        ("lower_mantle", 3480.0, 5711.0),
        ("upper_mantle", 5711.0, 6336.0),
        ("crust", 6336.0, 6371.0),
    ];

    /// Nodes per npoint layer.
    pub const NODES_PER_LAYER: usize = 5;

    pub fn layer_names() -> Vec<&'static str> {
        LAYERS.iter().map(|l| l.0).collect()
    }
}

/// Attribute names and units shared by generated models.
pub mod attributes {
    pub const NAMES: [&str; 2] = ["vp", "vs"];
    pub const UNITS: [&str; 2] = ["km/s", "km/s"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_are_contiguous() {
        for w in earth::LAYERS.windows(2) {
            assert_eq!(w[0].2, w[1].1);
        }
        assert_eq!(earth::LAYERS[3].2 as f64, earth::RADIUS);
    }

    #[test]
    fn test_locations_are_valid() {
        for (lat, lon) in location::ALL {
            assert!((-90.0..=90.0).contains(&lat));
            assert!((-180.0..=180.0).contains(&lon));
        }
    }
}
