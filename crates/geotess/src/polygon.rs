//! Spherical polygons used to restrict a model's active region.
//!
//! A [`Polygon`] is a closed ring of great-circle edges plus a reference
//! point whose inside/outside status is known. A point is inside when the
//! arc from the reference point crosses the boundary an even number of
//! times and the reference point is inside, or an odd number and it is not.
//! Attaching a bottom and top [`Horizon`] turns the polygon into a 3-D
//! region.
//!
//! Polygon files are plain text:
//!
//! ```text
//! POLYGON3D                  (or POLYGON)
//! TOP depth 0 -1             TOP|BOTTOM  layer|depth|radius  value  layerIndex
//! BOTTOM layer 0.0 2
//! lat-lon                    (or lon-lat)
//! reference 10.0 20.0 in     (optional)
//! 10.0 20.0
//! 11.5 21.0
//! ...
//! ```
//!
//! A single `global [in|out]` record makes a polygon that contains
//! everything (or nothing).

use crate::error::{GeoTessError, Result};
use crate::geometry::{self, EarthShape, Vec3};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Angular tolerance in radians for coincident points and boundary tests.
const TOLERANCE: f64 = 1e-7;

/// Vertical limit of a 3-D polygon at one geographic position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Horizon {
    /// A fixed radius in km, clamped into `layer` when given.
    Radius { radius: f64, layer: Option<usize> },
    /// A fixed depth below the earth surface in km, clamped into `layer` when given.
    Depth { depth: f64, layer: Option<usize> },
    /// A fraction of the thickness of `layer`, 0 at its bottom and 1 at its top.
    Layer { fraction: f64, layer: usize },
}

impl Horizon {
    pub fn layer_index(&self) -> Option<usize> {
        match self {
            Horizon::Radius { layer, .. } | Horizon::Depth { layer, .. } => *layer,
            Horizon::Layer { layer, .. } => Some(*layer),
        }
    }

    /// Radius of the horizon at unit vector `u`.
    ///
    /// `layer_radii` holds the bottom of layer 0 followed by the top of
    /// every layer at that position.
    pub fn radius(&self, u: &Vec3, layer_radii: &[f64], shape: EarthShape) -> f64 {
        let clamp = |r: f64, layer: Option<usize>| match layer {
            Some(l) if l + 1 < layer_radii.len() => {
                r.max(layer_radii[l]).min(layer_radii[l + 1])
            }
            _ => r,
        };
        match *self {
            Horizon::Radius { radius, layer } => clamp(radius, layer),
            Horizon::Depth { depth, layer } => clamp(shape.earth_radius(u) - depth, layer),
            Horizon::Layer { fraction, layer } => {
                if layer + 1 >= layer_radii.len() {
                    return f64::NAN;
                }
                let f = fraction.clamp(0.0, 1.0);
                layer_radii[layer] + f * (layer_radii[layer + 1] - layer_radii[layer])
            }
        }
    }

    fn parse(tokens: &[&str]) -> Result<Self> {
        if tokens.len() < 4 {
            return Err(GeoTessError::invalid_argument(format!(
                "horizon record needs 4 tokens: {}",
                tokens.join(" ")
            )));
        }
        let value: f64 = tokens[2].parse().map_err(|_| {
            GeoTessError::invalid_argument(format!("cannot parse '{}' as a number", tokens[2]))
        })?;
        let index: i64 = tokens[3].parse().map_err(|_| {
            GeoTessError::invalid_argument(format!(
                "cannot parse '{}' as a layer index",
                tokens[3]
            ))
        })?;
        let layer = usize::try_from(index).ok();
        match tokens[1].to_lowercase().as_str() {
            "radius" => Ok(Horizon::Radius {
                radius: value,
                layer,
            }),
            "depth" => Ok(Horizon::Depth {
                depth: value,
                layer,
            }),
            "layer" => layer
                .map(|layer| Horizon::Layer {
                    fraction: value,
                    layer,
                })
                .ok_or_else(|| {
                    GeoTessError::invalid_argument("layer horizon needs a layer index >= 0")
                }),
            other => Err(GeoTessError::invalid_argument(format!(
                "horizon type '{}' must be one of layer, depth, radius",
                other
            ))),
        }
    }

    fn record(&self) -> String {
        let idx = |l: Option<usize>| l.map(|l| l as i64).unwrap_or(-1);
        match *self {
            Horizon::Radius { radius, layer } => format!("radius {} {}", radius, idx(layer)),
            Horizon::Depth { depth, layer } => format!("depth {} {}", depth, idx(layer)),
            Horizon::Layer { fraction, layer } => format!("layer {} {}", fraction, layer),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Edge {
    a: Vec3,
    b: Vec3,
    normal: Vec3,
}

impl Edge {
    fn new(a: Vec3, b: Vec3) -> Self {
        let mut normal = geometry::cross(&a, &b);
        geometry::normalize(&mut normal);
        Self { a, b, normal }
    }

    /// Whether `x` lies on this edge within the tolerance.
    fn on_edge(&self, x: &Vec3) -> bool {
        geometry::dot(&self.normal, x).abs() < TOLERANCE.sin()
            && geometry::dot(&geometry::cross(&self.a, x), &self.normal) >= -TOLERANCE
            && geometry::dot(&geometry::cross(x, &self.b), &self.normal) >= -TOLERANCE
    }

    /// Whether the short arc `p -> q` crosses this edge. A boundary vertex
    /// lying exactly on the arc counts on the non-negative side.
    fn crosses(&self, p: &Vec3, q: &Vec3) -> bool {
        let n1 = geometry::cross(p, q);
        if (geometry::dot(&n1, &self.a) >= 0.0) == (geometry::dot(&n1, &self.b) >= 0.0) {
            return false;
        }
        if (geometry::dot(&self.normal, p) >= 0.0) == (geometry::dot(&self.normal, q) >= 0.0) {
            return false;
        }
        let mut x = geometry::cross(&n1, &self.normal);
        if geometry::dot(&x, &geometry::add(p, q)) < 0.0 {
            x = geometry::scale(&x, -1.0);
        }
        geometry::dot(&x, &geometry::add(&self.a, &self.b)) > 0.0
    }
}

/// A 2-D spherical polygon, optionally bounded vertically.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Vec3>,
    edges: Vec<Edge>,
    reference: Vec3,
    reference_in: bool,
    global: bool,
    /// (bottom, top) horizons of a 3-D polygon.
    vertical: Option<(Horizon, Horizon)>,
}

impl Polygon {
    /// Polygon through `points` (unit vectors). The ring is closed
    /// automatically and consecutive duplicate points are dropped.
    pub fn new(points: Vec<Vec3>) -> Result<Self> {
        let mut ring: Vec<Vec3> = Vec::with_capacity(points.len());
        for p in points {
            match ring.last() {
                Some(last) if geometry::angle(last, &p) < TOLERANCE => {}
                _ => ring.push(p),
            }
        }
        while ring.len() > 1 && geometry::angle(&ring[0], &ring[ring.len() - 1]) < TOLERANCE {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(GeoTessError::invalid_argument(format!(
                "polygon needs at least 3 distinct points, got {}",
                ring.len()
            )));
        }

        let edges = (0..ring.len())
            .map(|i| Edge::new(ring[i], ring[(i + 1) % ring.len()]))
            .collect();

        let mut polygon = Self {
            points: ring,
            edges,
            reference: [0.0, 0.0, 1.0],
            reference_in: false,
            global: false,
            vertical: None,
        };
        polygon.compute_reference();
        Ok(polygon)
    }

    /// A polygon covering the whole sphere (`inside == true`) or nothing.
    pub fn global(inside: bool) -> Self {
        Self {
            points: Vec::new(),
            edges: Vec::new(),
            reference: [1.0, 0.0, 0.0],
            reference_in: inside,
            global: true,
            vertical: None,
        }
    }

    /// Regular polygon with `n_edges` vertices on the small circle of
    /// angular `radius` (radians) around `center`.
    pub fn small_circle(center: &Vec3, radius: f64, n_edges: usize) -> Result<Self> {
        let first = geometry::move_north(center, radius)
            .unwrap_or_else(|| geometry::rotate(center, &[0.0, 1.0, 0.0], radius));
        let points = (0..n_edges)
            .map(|i| {
                geometry::rotate(
                    &first,
                    center,
                    i as f64 * 2.0 * std::f64::consts::PI / n_edges as f64,
                )
            })
            .collect();
        let mut polygon = Self::new(points)?;
        polygon.set_reference_point(*center, true);
        Ok(polygon)
    }

    /// Add a vertical extent, making this a 3-D polygon.
    pub fn with_horizons(mut self, bottom: Horizon, top: Horizon) -> Result<Self> {
        if let (Some(b), Some(t)) = (bottom.layer_index(), top.layer_index()) {
            if b > t {
                return Err(GeoTessError::invalid_argument(format!(
                    "bottom horizon layer {} is above top horizon layer {}",
                    b, t
                )));
            }
        }
        self.vertical = Some((bottom, top));
        Ok(self)
    }

    fn compute_reference(&mut self) {
        let center = geometry::center(&self.points);
        if geometry::length(&center) < 0.5 {
            // vector sum vanished; any point off the boundary will do
            let mut p = [0.1, 0.1, 0.1];
            loop {
                p[1] *= 2.0;
                p[2] *= 4.0;
                let candidate = geometry::normalized(&p);
                if !self.on_boundary(&candidate) {
                    self.reference = candidate;
                    self.reference_in = false;
                    return;
                }
            }
        }

        self.reference = geometry::scale(&center, -1.0);
        self.reference_in = false;
        if !self.on_boundary(&center) {
            let inside = self.contains(&center);
            self.reference = center;
            self.reference_in = inside;
        }
    }

    /// Declare `point` to be inside (or outside) the polygon.
    pub fn set_reference_point(&mut self, point: Vec3, inside: bool) {
        self.reference = point;
        self.reference_in = inside;
    }

    /// Swap inside and outside.
    pub fn invert(&mut self) {
        self.reference_in = !self.reference_in;
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn is_3d(&self) -> bool {
        self.vertical.is_some()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn bottom(&self) -> Option<&Horizon> {
        self.vertical.as_ref().map(|(b, _)| b)
    }

    pub fn top(&self) -> Option<&Horizon> {
        self.vertical.as_ref().map(|(_, t)| t)
    }

    /// Whether `x` lies on the boundary.
    pub fn on_boundary(&self, x: &Vec3) -> bool {
        self.edges.iter().any(|e| e.on_edge(x))
    }

    /// Whether unit vector `x` is inside. Boundary points are inside.
    pub fn contains(&self, x: &Vec3) -> bool {
        if self.global {
            return self.reference_in;
        }
        if geometry::dot(&self.reference, x) > TOLERANCE.cos() {
            return self.reference_in;
        }
        if self.on_boundary(x) {
            return true;
        }
        let crossings = self
            .edges
            .iter()
            .filter(|e| e.crosses(&self.reference, x))
            .count();
        (crossings % 2 == 0) == self.reference_in
    }

    pub fn contains_all(&self, points: &[Vec3]) -> bool {
        points.iter().all(|p| self.contains(p))
    }

    pub fn contains_any(&self, points: &[Vec3]) -> bool {
        points.iter().any(|p| self.contains(p))
    }

    /// 3-D containment of a point at `radius` in `layer`.
    ///
    /// A 2-D polygon ignores the vertical arguments.
    pub fn contains_3d(
        &self,
        x: &Vec3,
        radius: f64,
        layer: usize,
        layer_radii: &[f64],
        shape: EarthShape,
    ) -> bool {
        match &self.vertical {
            None => self.contains(x),
            Some((bottom, top)) => {
                bottom.layer_index().map_or(true, |b| layer >= b)
                    && top.layer_index().map_or(true, |t| layer <= t)
                    && radius > bottom.radius(x, layer_radii, shape) - 1e-4
                    && radius < top.radius(x, layer_radii, shape) + 1e-4
                    && self.contains(x)
            }
        }
    }

    /// Read a `POLYGON` or `POLYGON3D` file. Coordinates are geographic degrees.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let polygon = Self::parse(&text)?;
        debug!(
            path = %path.display(),
            points = polygon.points.len(),
            is_3d = polygon.is_3d(),
            "Loaded polygon"
        );
        Ok(polygon)
    }

    /// Parse polygon file contents.
    pub fn parse(text: &str) -> Result<Self> {
        let records: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| l.replace(',', " "))
            .collect();

        let header = records
            .first()
            .map(|r| r.to_uppercase())
            .ok_or_else(|| GeoTessError::invalid_argument("polygon file is empty"))?;
        let is_3d = header.starts_with("POLYGON3D");
        if !is_3d && !header.starts_with("POLYGON") {
            return Err(GeoTessError::invalid_argument(format!(
                "not a polygon file, first record is '{}'",
                header
            )));
        }

        let mut lon_first = false;
        let mut top = None;
        let mut bottom = None;
        let mut reference = None;
        let mut coords: Vec<(f64, f64)> = Vec::new();
        let mut global = None;

        for record in records.iter().skip(1) {
            let tokens: Vec<&str> = record.split_whitespace().collect();
            let first = tokens[0].to_lowercase();
            if first == "top" {
                top = Some(Horizon::parse(&tokens)?);
            } else if first == "bottom" {
                bottom = Some(Horizon::parse(&tokens)?);
            } else if first == "global" {
                global = Some(tokens.get(1).map_or(true, |t| t.eq_ignore_ascii_case("in")));
            } else if first.starts_with("lat") {
                lon_first = false;
            } else if first.starts_with("lon") {
                lon_first = true;
            } else if first.starts_with("reference") {
                if tokens.len() == 4 {
                    reference = Some((tokens[1], tokens[2], tokens[3]));
                }
            } else if tokens.len() == 2 {
                if let (Ok(a), Ok(b)) = (tokens[0].parse::<f64>(), tokens[1].parse::<f64>()) {
                    coords.push((a, b));
                }
            }
        }

        let shape = EarthShape::Wgs84;
        let to_vector = |a: f64, b: f64| {
            if lon_first {
                shape.vector_degrees(b, a)
            } else {
                shape.vector_degrees(a, b)
            }
        };

        let mut polygon = match global {
            Some(inside) => Self::global(inside),
            None => {
                let mut p = Self::new(coords.iter().map(|&(a, b)| to_vector(a, b)).collect())?;
                if let Some((a, b, side)) = reference {
                    let parse = |s: &str| {
                        s.parse::<f64>().map_err(|_| {
                            GeoTessError::invalid_argument(format!(
                                "cannot parse reference coordinate '{}'",
                                s
                            ))
                        })
                    };
                    let v = to_vector(parse(a)?, parse(b)?);
                    p.set_reference_point(v, side.to_lowercase().starts_with("in"));
                }
                p
            }
        };

        if is_3d {
            let top = top.ok_or_else(|| {
                GeoTessError::invalid_argument("POLYGON3D file has no TOP record")
            })?;
            let bottom = bottom.ok_or_else(|| {
                GeoTessError::invalid_argument("POLYGON3D file has no BOTTOM record")
            })?;
            polygon = polygon.with_horizons(bottom, top)?;
        }
        Ok(polygon)
    }

    /// Polygon file contents in lat-lon order.
    pub fn to_text(&self) -> String {
        let shape = EarthShape::Wgs84;
        let mut out = String::new();
        match &self.vertical {
            Some((bottom, top)) => {
                let _ = writeln!(out, "POLYGON3D");
                let _ = writeln!(out, "TOP {}", top.record());
                let _ = writeln!(out, "BOTTOM {}", bottom.record());
            }
            None => {
                let _ = writeln!(out, "POLYGON");
            }
        }
        if self.global {
            let _ = writeln!(out, "global {}", if self.reference_in { "in" } else { "out" });
            return out;
        }
        let _ = writeln!(out, "lat-lon");
        let _ = writeln!(
            out,
            "reference {} {}",
            shape.lat_lon_string(&self.reference),
            if self.reference_in { "in" } else { "out" }
        );
        for p in &self.points {
            let _ = writeln!(out, "{}", shape.lat_lon_string(p));
        }
        out
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(lat: f64, lon: f64) -> Vec3 {
        EarthShape::Sphere.vector_degrees(lat, lon)
    }

    fn square() -> Polygon {
        Polygon::new(vec![v(-10.0, -10.0), v(-10.0, 10.0), v(10.0, 10.0), v(10.0, -10.0)])
            .unwrap()
    }

    #[test]
    fn test_square_contains() {
        let p = square();
        assert!(p.contains(&v(0.0, 0.0)));
        assert!(p.contains(&v(5.0, -5.0)));
        assert!(!p.contains(&v(20.0, 0.0)));
        assert!(!p.contains(&v(0.0, 180.0)));
        assert!(!p.contains(&v(-60.0, 45.0)));
    }

    #[test]
    fn test_boundary_is_inside() {
        let p = square();
        assert!(p.contains(&v(-10.0, -10.0)));
        assert!(p.on_boundary(&v(-10.0, -10.0)));
    }

    #[test]
    fn test_invert() {
        let mut p = square();
        p.invert();
        assert!(!p.contains(&v(0.0, 0.0)));
        assert!(p.contains(&v(40.0, 100.0)));
    }

    #[test]
    fn test_small_circle() {
        let center = v(45.0, 30.0);
        let p = Polygon::small_circle(&center, 10f64.to_radians(), 36).unwrap();
        assert_eq!(p.points().len(), 36);
        assert!(p.contains(&center));
        assert!(p.contains(&v(50.0, 30.0)));
        assert!(!p.contains(&v(60.0, 30.0)));

        let pole = Polygon::small_circle(&[0.0, 0.0, 1.0], 5f64.to_radians(), 12).unwrap();
        assert!(pole.contains(&v(88.0, 123.0)));
        assert!(!pole.contains(&v(80.0, 0.0)));
    }

    #[test]
    fn test_global() {
        assert!(Polygon::global(true).contains(&v(1.0, 2.0)));
        assert!(!Polygon::global(false).contains(&v(1.0, 2.0)));
    }

    #[test]
    fn test_too_few_points() {
        assert!(Polygon::new(vec![v(0.0, 0.0), v(1.0, 1.0), v(0.0, 0.0)]).is_err());
    }

    #[test]
    fn test_parse_2d_lon_lat() {
        let text = "POLYGON\n# comment\nlon-lat\n-10 -10\n10 -10\n10 10\n-10 10\n";
        let p = Polygon::parse(text).unwrap();
        assert!(!p.is_3d());
        assert_eq!(p.points().len(), 4);
        assert!(p.contains(&v(0.0, 0.0)));
        assert!(!p.contains(&v(0.0, 30.0)));
    }

    #[test]
    fn test_parse_3d() {
        let text = "POLYGON3D\nTOP depth 0 -1\nBOTTOM layer 0.5 1\nlat-lon\n\
                    reference 0 0 in\n-10 -10\n-10 10\n10 10\n10 -10\n";
        let p = Polygon::parse(text).unwrap();
        assert!(p.is_3d());
        assert_eq!(p.bottom().unwrap().layer_index(), Some(1));
        assert_eq!(p.top().unwrap().layer_index(), None);

        let radii = [3000.0, 5000.0, 6000.0, 6371.0];
        let x = v(0.0, 0.0);
        let shape = EarthShape::Sphere;
        assert!(p.contains_3d(&x, 5800.0, 1, &radii, shape));
        assert!(!p.contains_3d(&x, 5200.0, 1, &radii, shape));
        assert!(!p.contains_3d(&x, 4000.0, 0, &radii, shape));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Polygon::parse("").is_err());
        assert!(Polygon::parse("NOT A POLYGON\n1 2\n").is_err());
        assert!(Polygon::parse("POLYGON3D\nTOP depth 0 -1\n0 0\n0 10\n10 10\n").is_err());
        assert!(Polygon::parse("POLYGON3D\nTOP bogus 0 -1\nBOTTOM depth 5 -1\n").is_err());
    }

    #[test]
    fn test_text_round_trip() {
        let p = square()
            .with_horizons(
                Horizon::Radius {
                    radius: 5000.0,
                    layer: None,
                },
                Horizon::Depth {
                    depth: 10.0,
                    layer: Some(2),
                },
            )
            .unwrap();
        let q = Polygon::parse(&p.to_text()).unwrap();
        assert!(q.is_3d());
        assert_eq!(q.points().len(), 4);
        for (lat, lon) in [(0.0, 0.0), (9.0, 9.0), (15.0, 0.0), (0.0, -15.0)] {
            assert_eq!(p.contains(&v(lat, lon)), q.contains(&v(lat, lon)));
        }
    }

    #[test]
    fn test_horizon_radius() {
        let radii = [3000.0, 5000.0, 6371.0];
        let u = [1.0, 0.0, 0.0];
        let s = EarthShape::Sphere;
        let h = Horizon::Radius {
            radius: 100.0,
            layer: Some(1),
        };
        assert_eq!(h.radius(&u, &radii, s), 5000.0);
        let h = Horizon::Layer {
            fraction: 0.5,
            layer: 0,
        };
        assert_eq!(h.radius(&u, &radii, s), 4000.0);
        let h = Horizon::Depth {
            depth: 371.0,
            layer: None,
        };
        assert!((h.radius(&u, &radii, s) - 6000.0).abs() < 1e-9);
    }
}
