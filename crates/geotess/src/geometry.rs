//! Unit-vector geometry on the sphere and earth-shape conversions.
//!
//! All positions are unit vectors `[x, y, z]` where x points at
//! (lat 0, lon 0), y at (lat 0, lon 90E) and z at the north pole.

use serde::{Deserialize, Serialize};

/// Three-component vector.
pub type Vec3 = [f64; 3];

/// Dot product.
#[inline]
pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product `a x b`.
#[inline]
pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Euclidean length.
#[inline]
pub fn length(a: &Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// Normalize in place and return the original length. A zero vector is left untouched.
pub fn normalize(a: &mut Vec3) -> f64 {
    let len = length(a);
    if len > 0.0 {
        a[0] /= len;
        a[1] /= len;
        a[2] /= len;
    }
    len
}

/// Return a normalized copy.
pub fn normalized(a: &Vec3) -> Vec3 {
    let mut v = *a;
    normalize(&mut v);
    v
}

/// Component-wise sum.
#[inline]
pub fn add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Scale a vector.
#[inline]
pub fn scale(a: &Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// `a . (b x c)`.
#[inline]
pub fn scalar_triple_product(a: &Vec3, b: &Vec3, c: &Vec3) -> f64 {
    dot(a, &cross(b, c))
}

/// Angle in radians between two unit vectors, stable for small and large angles.
pub fn angle(a: &Vec3, b: &Vec3) -> f64 {
    length(&cross(a, b)).atan2(dot(a, b))
}

/// Angle in degrees between two unit vectors.
pub fn angle_degrees(a: &Vec3, b: &Vec3) -> f64 {
    angle(a, b).to_degrees()
}

/// Straight-line distance between two points given as unit vector + radius.
pub fn distance_3d(u0: &Vec3, r0: f64, u1: &Vec3, r1: f64) -> f64 {
    let dx = u0[0] * r0 - u1[0] * r1;
    let dy = u0[1] * r0 - u1[1] * r1;
    let dz = u0[2] * r0 - u1[2] * r1;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Normalized vector sum of a set of unit vectors.
pub fn center(points: &[Vec3]) -> Vec3 {
    let mut c = [0.0; 3];
    for p in points {
        c = add(&c, p);
    }
    normalize(&mut c);
    c
}

/// Circumcenter of a spherical triangle. Its sign follows the winding of
/// the corners: clockwise triangles (seen from outside) produce the outward
/// center.
pub fn circumcenter(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> Vec3 {
    let mut vs = [
        v0[1] * (v2[2] - v1[2]) + v2[1] * (v1[2] - v0[2]) + v1[1] * (v0[2] - v2[2]),
        v0[2] * (v2[0] - v1[0]) + v2[2] * (v1[0] - v0[0]) + v1[2] * (v0[0] - v2[0]),
        v0[0] * (v2[1] - v1[1]) + v2[0] * (v1[1] - v0[1]) + v1[0] * (v0[1] - v2[1]),
    ];
    normalize(&mut vs);
    vs
}

/// Circumcenter forced onto the hemisphere of the triangle, regardless of winding.
pub fn circumcenter_outward(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> Vec3 {
    let cc = circumcenter(v0, v1, v2);
    let mid = add(&add(v0, v1), v2);
    if dot(&cc, &mid) < 0.0 {
        scale(&cc, -1.0)
    } else {
        cc
    }
}

/// Area of the planar triangle spanned by three points.
pub fn triangle_area(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> f64 {
    let a = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let b = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
    length(&cross(&a, &b)) / 2.0
}

/// Rotate `x` around unit axis `p` by angle `a` (radians, right-handed).
pub fn rotate(x: &Vec3, p: &Vec3, a: f64) -> Vec3 {
    let (s, c) = a.sin_cos();
    let d = dot(x, p);
    let pxx = cross(p, x);
    [
        x[0] * c + pxx[0] * s + p[0] * d * (1.0 - c),
        x[1] * c + pxx[1] * s + p[1] * d * (1.0 - c),
        x[2] * c + pxx[2] * s + p[2] * d * (1.0 - c),
    ]
}

/// Move `x` toward the north pole by `distance` radians. Returns `None` at a pole.
pub fn move_north(x: &Vec3, distance: f64) -> Option<Vec3> {
    let axis = cross(x, &[0.0, 0.0, 1.0]);
    let mut axis = axis;
    if normalize(&mut axis) < 1e-15 {
        return None;
    }
    Some(rotate(x, &axis, distance))
}

/// `n + 1` points evenly spaced along the great circle from `a` to `b`.
pub fn great_circle_points(a: &Vec3, b: &Vec3, n: usize) -> Vec<Vec3> {
    let total = angle(a, b);
    let mut axis = cross(a, b);
    normalize(&mut axis);
    (0..=n)
        .map(|i| {
            let mut p = rotate(a, &axis, total * i as f64 / n.max(1) as f64);
            normalize(&mut p);
            p
        })
        .collect()
}

/// Reference ellipsoid used to convert between geographic coordinates,
/// unit vectors and earth radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EarthShape {
    /// Sphere of radius 6371 km.
    Sphere,
    /// GRS80 ellipsoid.
    Grs80,
    /// GRS80 latitudes with a constant 6371 km radius.
    Grs80Rconst,
    /// WGS84 ellipsoid.
    #[default]
    Wgs84,
    /// WGS84 latitudes with a constant 6371 km radius.
    Wgs84Rconst,
}

const SPHERE_RADIUS: f64 = 6371.0;
const EQUATORIAL_RADIUS: f64 = 6378.137;

impl EarthShape {
    /// Parse from string (case-insensitive). Unknown names fall back to WGS84.
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "SPHERE" => Self::Sphere,
            "GRS80" => Self::Grs80,
            "GRS80_RCONST" => Self::Grs80Rconst,
            "WGS84_RCONST" => Self::Wgs84Rconst,
            _ => Self::Wgs84,
        }
    }

    /// Name as written into model files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sphere => "SPHERE",
            Self::Grs80 => "GRS80",
            Self::Grs80Rconst => "GRS80_RCONST",
            Self::Wgs84 => "WGS84",
            Self::Wgs84Rconst => "WGS84_RCONST",
        }
    }

    fn flattening(&self) -> f64 {
        match self {
            Self::Sphere => 0.0,
            Self::Grs80 | Self::Grs80Rconst => 1.0 / 298.257222101,
            Self::Wgs84 | Self::Wgs84Rconst => 1.0 / 298.257223563,
        }
    }

    fn eccentricity_squared(&self) -> f64 {
        let f = self.flattening();
        f * (2.0 - f)
    }

    fn constant_radius(&self) -> bool {
        matches!(self, Self::Sphere | Self::Grs80Rconst | Self::Wgs84Rconst)
    }

    /// Convert geographic latitude (radians) to geocentric latitude.
    pub fn geocentric_lat(&self, lat: f64) -> f64 {
        let e2 = self.eccentricity_squared();
        (lat.sin() * (1.0 - e2)).atan2(lat.cos())
    }

    /// Convert geocentric latitude (radians) to geographic latitude.
    pub fn geographic_lat(&self, lat: f64) -> f64 {
        let e2 = self.eccentricity_squared();
        lat.sin().atan2(lat.cos() * (1.0 - e2))
    }

    /// Unit vector for geographic latitude / longitude in radians.
    pub fn vector(&self, lat: f64, lon: f64) -> Vec3 {
        let latc = self.geocentric_lat(lat);
        [latc.cos() * lon.cos(), latc.cos() * lon.sin(), latc.sin()]
    }

    /// Unit vector for geographic latitude / longitude in degrees.
    pub fn vector_degrees(&self, lat: f64, lon: f64) -> Vec3 {
        self.vector(lat.to_radians(), lon.to_radians())
    }

    /// Geographic latitude in radians.
    pub fn lat(&self, v: &Vec3) -> f64 {
        let latc = v[2].atan2((v[0] * v[0] + v[1] * v[1]).sqrt());
        self.geographic_lat(latc)
    }

    /// Geographic latitude in degrees.
    pub fn lat_degrees(&self, v: &Vec3) -> f64 {
        self.lat(v).to_degrees()
    }

    /// Longitude in radians, in (-pi, pi].
    pub fn lon(&self, v: &Vec3) -> f64 {
        v[1].atan2(v[0])
    }

    /// Longitude in degrees.
    pub fn lon_degrees(&self, v: &Vec3) -> f64 {
        self.lon(v).to_degrees()
    }

    /// Earth radius in km below the point given as a unit vector.
    pub fn earth_radius(&self, v: &Vec3) -> f64 {
        if self.constant_radius() {
            return SPHERE_RADIUS;
        }
        let e2 = self.eccentricity_squared();
        let cos2 = 1.0 - v[2] * v[2];
        EQUATORIAL_RADIUS * (1.0 - e2).sqrt() / (1.0 - e2 * cos2).sqrt()
    }

    /// Earth radius in km at a geographic latitude in degrees.
    pub fn earth_radius_degrees(&self, lat: f64) -> f64 {
        self.earth_radius(&self.vector_degrees(lat, 0.0))
    }

    /// "lat lon" string in degrees, for logs and reports.
    pub fn lat_lon_string(&self, v: &Vec3) -> String {
        format!("{:.6} {:.6}", self.lat_degrees(v), self.lon_degrees(v))
    }
}

impl std::fmt::Display for EarthShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
