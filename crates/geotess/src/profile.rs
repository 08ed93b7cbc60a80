//! Radial profiles: the nodes of one layer at one grid vertex.

use crate::data::Data;
use crate::error::{GeoTessError, Result};
use crate::types::InterpolatorType;
use once_cell::sync::OnceCell;
use std::fmt;

/// Profile shape. The ordinal is the record tag in model files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileType {
    Empty,
    Thin,
    Constant,
    NPoint,
    Surface,
    SurfaceEmpty,
}

impl ProfileType {
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Thin => 1,
            Self::Constant => 2,
            Self::NPoint => 3,
            Self::Surface => 4,
            Self::SurfaceEmpty => 5,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Some(match ordinal {
            0 => Self::Empty,
            1 => Self::Thin,
            2 => Self::Constant,
            3 => Self::NPoint,
            4 => Self::Surface,
            5 => Self::SurfaceEmpty,
            _ => return None,
        })
    }

    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s.trim().to_uppercase().as_str() {
            "EMPTY" => Self::Empty,
            "THIN" => Self::Thin,
            "CONSTANT" => Self::Constant,
            "NPOINT" => Self::NPoint,
            "SURFACE" => Self::Surface,
            "SURFACE_EMPTY" => Self::SurfaceEmpty,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Thin => "THIN",
            Self::Constant => "CONSTANT",
            Self::NPoint => "NPOINT",
            Self::Surface => "SURFACE",
            Self::SurfaceEmpty => "SURFACE_EMPTY",
        }
    }

    /// 2-D profiles carry no radius.
    pub fn is_surface(&self) -> bool {
        matches!(self, Self::Surface | Self::SurfaceEmpty)
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Radii and data of one layer at one vertex, ordered bottom to top.
///
/// Radii are stored in single precision, in km.
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    /// A layer with extent but no data.
    Empty { radius_bottom: f32, radius_top: f32 },
    /// A zero-thickness layer with one node.
    Thin { radius: f32, data: Data },
    /// A layer whose single value applies throughout.
    Constant {
        radius_bottom: f32,
        radius_top: f32,
        data: Data,
    },
    /// A layer with one node per radius.
    NPoint {
        radii: Vec<f32>,
        data: Vec<Data>,
        spline: SplineCache,
    },
    /// A 2-D value with no radius.
    Surface { data: Data },
    SurfaceEmpty,
}

impl Profile {
    /// Pick the profile shape from the number of radii and data values.
    pub fn new(radii: &[f32], mut data: Vec<Data>) -> Result<Self> {
        match (radii.len(), data.len()) {
            (0, 0) => Ok(Profile::SurfaceEmpty),
            (0, 1) => Ok(Profile::surface(data.remove(0))),
            (1, 1) => Ok(Profile::thin(radii[0], data.remove(0))),
            (2, 0) => Profile::empty(radii[0], radii[1]),
            (2, 1) => Profile::constant(radii[0], radii[1], data.remove(0)),
            (n, m) if n >= 2 && n == m => Profile::npoint(radii.to_vec(), data),
            (n, m) => Err(GeoTessError::illegal_profile(format!(
                "no profile has {} radii and {} data values",
                n, m
            ))),
        }
    }

    pub fn empty(radius_bottom: f32, radius_top: f32) -> Result<Self> {
        check_order(radius_bottom, radius_top)?;
        Ok(Profile::Empty {
            radius_bottom,
            radius_top,
        })
    }

    pub fn thin(radius: f32, data: Data) -> Self {
        Profile::Thin { radius, data }
    }

    pub fn constant(radius_bottom: f32, radius_top: f32, data: Data) -> Result<Self> {
        check_order(radius_bottom, radius_top)?;
        Ok(Profile::Constant {
            radius_bottom,
            radius_top,
            data,
        })
    }

    pub fn npoint(radii: Vec<f32>, data: Vec<Data>) -> Result<Self> {
        if radii.len() < 2 || radii.len() != data.len() {
            return Err(GeoTessError::illegal_profile(format!(
                "npoint profile needs matching radii and data (>= 2), got {} and {}",
                radii.len(),
                data.len()
            )));
        }
        if let Some(i) = (1..radii.len()).find(|&i| radii[i] < radii[i - 1]) {
            return Err(GeoTessError::illegal_profile(format!(
                "radii decrease at node {}: {} < {}",
                i,
                radii[i],
                radii[i - 1]
            )));
        }
        Ok(Profile::NPoint {
            radii,
            data,
            spline: SplineCache::default(),
        })
    }

    pub fn surface(data: Data) -> Self {
        Profile::Surface { data }
    }

    pub fn profile_type(&self) -> ProfileType {
        match self {
            Profile::Empty { .. } => ProfileType::Empty,
            Profile::Thin { .. } => ProfileType::Thin,
            Profile::Constant { .. } => ProfileType::Constant,
            Profile::NPoint { .. } => ProfileType::NPoint,
            Profile::Surface { .. } => ProfileType::Surface,
            Profile::SurfaceEmpty => ProfileType::SurfaceEmpty,
        }
    }

    pub fn is_surface(&self) -> bool {
        self.profile_type().is_surface()
    }

    /// Bottom radius in km. NaN for surface profiles.
    pub fn radius_bottom(&self) -> f64 {
        match self {
            Profile::Empty { radius_bottom, .. } | Profile::Constant { radius_bottom, .. } => {
                *radius_bottom as f64
            }
            Profile::Thin { radius, .. } => *radius as f64,
            Profile::NPoint { radii, .. } => radii[0] as f64,
            Profile::Surface { .. } | Profile::SurfaceEmpty => f64::NAN,
        }
    }

    /// Top radius in km. NaN for surface profiles.
    pub fn radius_top(&self) -> f64 {
        match self {
            Profile::Empty { radius_top, .. } | Profile::Constant { radius_top, .. } => {
                *radius_top as f64
            }
            Profile::Thin { radius, .. } => *radius as f64,
            Profile::NPoint { radii, .. } => radii[radii.len() - 1] as f64,
            Profile::Surface { .. } | Profile::SurfaceEmpty => f64::NAN,
        }
    }

    pub fn thickness(&self) -> f64 {
        self.radius_top() - self.radius_bottom()
    }

    /// Move the bottom radius. Ignored by profiles without a separate bottom.
    pub fn set_radius_bottom(&mut self, r: f32) {
        match self {
            Profile::Empty { radius_bottom, .. } | Profile::Constant { radius_bottom, .. } => {
                *radius_bottom = r
            }
            Profile::Thin { radius, .. } => *radius = r,
            Profile::NPoint { radii, spline, .. } => {
                radii[0] = r;
                spline.reset();
            }
            _ => {}
        }
    }

    /// Move the top radius.
    pub fn set_radius_top(&mut self, r: f32) {
        match self {
            Profile::Empty { radius_top, .. } | Profile::Constant { radius_top, .. } => {
                *radius_top = r
            }
            Profile::Thin { radius, .. } => *radius = r,
            Profile::NPoint { radii, spline, .. } => {
                let n = radii.len();
                radii[n - 1] = r;
                spline.reset();
            }
            _ => {}
        }
    }

    pub fn radii_count(&self) -> usize {
        match self {
            Profile::Empty { .. } | Profile::Constant { .. } => 2,
            Profile::Thin { .. } => 1,
            Profile::NPoint { radii, .. } => radii.len(),
            Profile::Surface { .. } | Profile::SurfaceEmpty => 0,
        }
    }

    /// Number of nodes carrying data.
    pub fn data_count(&self) -> usize {
        match self {
            Profile::Empty { .. } | Profile::SurfaceEmpty => 0,
            Profile::Thin { .. } | Profile::Constant { .. } | Profile::Surface { .. } => 1,
            Profile::NPoint { data, .. } => data.len(),
        }
    }

    pub fn radii(&self) -> Vec<f32> {
        match self {
            Profile::Empty {
                radius_bottom,
                radius_top,
            }
            | Profile::Constant {
                radius_bottom,
                radius_top,
                ..
            } => vec![*radius_bottom, *radius_top],
            Profile::Thin { radius, .. } => vec![*radius],
            Profile::NPoint { radii, .. } => radii.clone(),
            Profile::Surface { .. } | Profile::SurfaceEmpty => Vec::new(),
        }
    }

    /// Radius of data node `node`. Single-value profiles report their bottom
    /// for node 0 and their top otherwise.
    pub fn radius(&self, node: usize) -> f64 {
        match self {
            Profile::NPoint { radii, .. } => radii
                .get(node)
                .map(|&r| r as f64)
                .unwrap_or(f64::NAN),
            _ if node == 0 => self.radius_bottom(),
            _ => self.radius_top(),
        }
    }

    /// Data of every node, bottom to top.
    pub fn data(&self) -> &[Data] {
        match self {
            Profile::Thin { data, .. }
            | Profile::Constant { data, .. }
            | Profile::Surface { data } => std::slice::from_ref(data),
            Profile::NPoint { data, .. } => data,
            Profile::Empty { .. } | Profile::SurfaceEmpty => &[],
        }
    }

    pub fn data_mut(&mut self) -> &mut [Data] {
        match self {
            Profile::Thin { data, .. }
            | Profile::Constant { data, .. }
            | Profile::Surface { data } => std::slice::from_mut(data),
            Profile::NPoint { data, spline, .. } => {
                spline.reset();
                data
            }
            Profile::Empty { .. } | Profile::SurfaceEmpty => &mut [],
        }
    }

    pub fn node_data(&self, node: usize) -> Option<&Data> {
        self.data().get(node)
    }

    /// Value of attribute `attr` at node `node`, NaN when either is out of range.
    pub fn node_value(&self, node: usize, attr: usize) -> f64 {
        self.node_data(node)
            .map(|d| d.value(attr))
            .unwrap_or(f64::NAN)
    }

    pub fn set_node_value(&mut self, node: usize, attr: usize, value: f64) -> Result<()> {
        let n = self.data_count();
        let data = self.data_mut().get_mut(node).ok_or_else(|| {
            GeoTessError::invalid_argument(format!("node {} >= {}", node, n))
        })?;
        data.set_value(attr, value)
    }

    pub fn value_top(&self, attr: usize) -> f64 {
        match self.data_count() {
            0 => f64::NAN,
            n => self.node_value(n - 1, attr),
        }
    }

    pub fn value_bottom(&self, attr: usize) -> f64 {
        self.node_value(0, attr)
    }

    /// Interpolated value of `attr` at `radius`.
    ///
    /// Outside `[bottom, top]` the result is NaN unless `allow_out_of_range`,
    /// in which case the boundary node value is returned. Surface profiles
    /// ignore the radius.
    pub fn value(
        &self,
        interp: InterpolatorType,
        attr: usize,
        radius: f64,
        allow_out_of_range: bool,
    ) -> f64 {
        match self {
            Profile::Empty { .. } | Profile::SurfaceEmpty => f64::NAN,
            Profile::Surface { data } => data.value(attr),
            Profile::Thin { data, .. } | Profile::Constant { data, .. } => {
                if !allow_out_of_range && self.out_of_range(radius) {
                    f64::NAN
                } else {
                    data.value(attr)
                }
            }
            Profile::NPoint {
                radii,
                data,
                spline,
            } => {
                if !allow_out_of_range && self.out_of_range(radius) {
                    return f64::NAN;
                }
                let n = radii.len();
                let index = match radius_index(radii, radius) {
                    None => return data[0].value(attr),
                    Some(i) if i >= n - 1 => return data[n - 1].value(attr),
                    Some(i) => i,
                };
                let (r0, r1) = (radii[index] as f64, radii[index + 1] as f64);
                let (v0, v1) = (data[index].value(attr), data[index + 1].value(attr));
                if radius >= r1 || r1 <= r0 {
                    return v1;
                }
                let a = (r1 - radius) / (r1 - r0);
                let v = a * v0 + (1.0 - a) * v1;
                match interp {
                    InterpolatorType::CubicSpline => {
                        let Some(y2) = spline.second_derivatives(radii, data, attr) else {
                            return v;
                        };
                        let b = 1.0 - a;
                        let h = r1 - r0;
                        v + ((a * a * a - a) * y2[index] + (b * b * b - b) * y2[index + 1]) * h
                            * h
                            / 6.0
                    }
                    _ => v,
                }
            }
        }
    }

    fn out_of_range(&self, radius: f64) -> bool {
        radius < self.radius_bottom() || radius > self.radius_top()
    }

    /// Index `i` of the interval with `radii[i] <= radius < radii[i+1]`.
    ///
    /// `None` below the bottom; `radii.len() - 1` above the top. A radius equal
    /// to the bottom maps to 0 and one equal to the top to `radii.len() - 2`.
    /// Only meaningful for npoint profiles; others always report 0.
    pub fn radius_index(&self, radius: f64) -> Option<usize> {
        match self {
            Profile::NPoint { radii, .. } => radius_index(radii, radius),
            _ => Some(0),
        }
    }

    /// Node whose radius is closest to `radius`.
    pub fn closest_radius_index(&self, radius: f64) -> usize {
        match self {
            Profile::NPoint { radii, .. } => match radius_index(radii, radius) {
                None => 0,
                Some(i) if i >= radii.len() - 1 => i,
                Some(i) => {
                    if (radii[i + 1] as f64 - radius).abs() < (radius - radii[i] as f64).abs() {
                        i + 1
                    } else {
                        i
                    }
                }
            },
            _ => 0,
        }
    }

    /// `(node, coefficient)` pairs whose weighted sum of node values gives the
    /// linearly interpolated value at `radius`.
    ///
    /// Empty when `radius` is outside the profile and `allow_out_of_range` is
    /// false, and for profiles without data. Cubic spline interpolation has no
    /// coefficient form and is rejected.
    pub fn interpolation_coefficients(
        &self,
        interp: InterpolatorType,
        radius: f64,
        allow_out_of_range: bool,
    ) -> Result<Vec<(usize, f64)>> {
        if interp == InterpolatorType::CubicSpline {
            return Err(GeoTessError::invalid_argument(
                "cubic spline interpolation has no coefficient form",
            ));
        }
        match self {
            Profile::Empty { .. } | Profile::SurfaceEmpty => Ok(Vec::new()),
            Profile::Surface { .. } => Ok(vec![(0, 1.0)]),
            Profile::Thin { .. } | Profile::Constant { .. } => {
                if !allow_out_of_range && self.out_of_range(radius) {
                    Ok(Vec::new())
                } else {
                    Ok(vec![(0, 1.0)])
                }
            }
            Profile::NPoint { radii, .. } => {
                if !allow_out_of_range && self.out_of_range(radius) {
                    return Ok(Vec::new());
                }
                let n = radii.len();
                Ok(match radius_index(radii, radius) {
                    None => vec![(0, 1.0)],
                    Some(i) if i >= n - 1 => vec![(n - 1, 1.0)],
                    Some(i) => {
                        let (r0, r1) = (radii[i] as f64, radii[i + 1] as f64);
                        let c = if r1 > r0 { (r1 - radius) / (r1 - r0) } else { 0.0 };
                        if c < 1.0 {
                            vec![(i, c), (i + 1, 1.0 - c)]
                        } else {
                            vec![(i, c)]
                        }
                    }
                })
            }
        }
    }

    /// Radial integral of `attr` (or of its reciprocal) through the layer
    /// using the trapezoid rule.
    pub fn integrate(&self, attr: usize, reciprocal: bool) -> f64 {
        match self {
            Profile::Constant { data, .. } => {
                let v = data.value(attr);
                if reciprocal {
                    self.thickness() / v
                } else {
                    self.thickness() * v
                }
            }
            Profile::NPoint { radii, data, .. } => {
                let mut integral = 0.0;
                for i in 1..radii.len() {
                    let dr = radii[i] as f64 - radii[i - 1] as f64;
                    let sum = data[i].value(attr) + data[i - 1].value(attr);
                    integral += if reciprocal { dr / sum } else { dr * sum };
                }
                if reciprocal {
                    integral * 2.0
                } else {
                    integral / 2.0
                }
            }
            _ => 0.0,
        }
    }
}

fn check_order(bottom: f32, top: f32) -> Result<()> {
    if bottom > top {
        return Err(GeoTessError::illegal_profile(format!(
            "bottom radius {} > top radius {}",
            bottom, top
        )));
    }
    Ok(())
}

/// Bisection over ascending radii, compared in single precision.
fn radius_index(radii: &[f32], radius: f64) -> Option<usize> {
    let r = radius as f32;
    let n = radii.len();
    if r == radii[0] {
        return Some(0);
    }
    if r == radii[n - 1] {
        return Some(n.saturating_sub(2));
    }
    // radii[lo] <= r < radii[hi], with lo = -1 and hi = n as sentinels
    let (mut lo, mut hi): (isize, isize) = (-1, n as isize);
    while hi - lo > 1 {
        let mid = (hi + lo) >> 1;
        if r >= radii[mid as usize] {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    if lo < 0 {
        None
    } else {
        Some(lo as usize)
    }
}

/// Natural cubic spline second derivatives of every attribute, filled on
/// first use and cleared whenever radii or data change.
#[derive(Debug, Clone, Default)]
pub struct SplineCache(OnceCell<Vec<Vec<f64>>>);

impl SplineCache {
    fn second_derivatives(&self, radii: &[f32], data: &[Data], attr: usize) -> Option<&[f64]> {
        self.0
            .get_or_init(|| {
                let attributes = data.iter().map(Data::len).max().unwrap_or(0);
                (0..attributes)
                    .map(|a| spline_second_derivatives(radii, data, a))
                    .collect()
            })
            .get(attr)
            .map(Vec::as_slice)
    }

    fn reset(&mut self) {
        self.0 = OnceCell::new();
    }
}

impl PartialEq for SplineCache {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

/// Second derivatives of natural cubic splines through `(radii, data[attr])`.
///
/// A repeated radius is a discontinuity: each strictly increasing run of
/// radii gets its own spline.
fn spline_second_derivatives(radii: &[f32], data: &[Data], attr: usize) -> Vec<f64> {
    let n = radii.len();
    let mut y2 = vec![0.0; n];
    let mut start = 0;
    for end in 1..=n {
        if end == n || radii[end] <= radii[end - 1] {
            natural_spline(&radii[start..end], &data[start..end], attr, &mut y2[start..end]);
            start = end;
        }
    }
    y2
}

/// Tridiagonal solve for one strictly increasing run. Runs of fewer than
/// three nodes are straight lines and keep zero second derivatives.
fn natural_spline(radii: &[f32], data: &[Data], attr: usize, y2: &mut [f64]) {
    let n = radii.len();
    if n < 3 {
        return;
    }
    let x = |i: usize| radii[i] as f64;
    let y = |i: usize| data[i].value(attr);
    let mut u = vec![0.0; n];
    for i in 1..n - 1 {
        let sig = (x(i) - x(i - 1)) / (x(i + 1) - x(i - 1));
        let p = sig * y2[i - 1] + 2.0;
        y2[i] = (sig - 1.0) / p;
        let d = (y(i + 1) - y(i)) / (x(i + 1) - x(i)) - (y(i) - y(i - 1)) / (x(i) - x(i - 1));
        u[i] = (6.0 * d / (x(i + 1) - x(i - 1)) - sig * u[i - 1]) / p;
    }
    y2[n - 1] = 0.0;
    for k in (0..n - 1).rev() {
        y2[k] = y2[k] * y2[k + 1] + u[k];
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Empty {
                radius_bottom,
                radius_top,
            } => write!(f, "EMPTY {} {}", radius_bottom, radius_top),
            Profile::Thin { radius, data } => write!(f, "THIN {} {}", radius, data),
            Profile::Constant {
                radius_bottom,
                radius_top,
                data,
            } => write!(f, "CONSTANT {} {} {}", radius_bottom, radius_top, data),
            Profile::NPoint { radii, data, .. } => {
                write!(f, "NPOINT {}", radii.len())?;
                for (r, d) in radii.iter().zip(data) {
                    write!(f, "\n  {} {}", r, d)?;
                }
                Ok(())
            }
            Profile::Surface { data } => write!(f, "SURFACE {}", data),
            Profile::SurfaceEmpty => write!(f, "SURFACE_EMPTY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: f64) -> Data {
        Data::F64(vec![v])
    }

    fn npoint() -> Profile {
        Profile::new(&[10.0, 20.0, 30.0, 40.0], vec![d(1.0), d(2.0), d(4.0), d(8.0)]).unwrap()
    }

    #[test]
    fn test_profile_dispatch() {
        assert_eq!(Profile::new(&[], vec![]).unwrap().profile_type(), ProfileType::SurfaceEmpty);
        assert_eq!(Profile::new(&[], vec![d(1.0)]).unwrap().profile_type(), ProfileType::Surface);
        assert_eq!(Profile::new(&[5.0], vec![d(1.0)]).unwrap().profile_type(), ProfileType::Thin);
        assert_eq!(Profile::new(&[1.0, 2.0], vec![]).unwrap().profile_type(), ProfileType::Empty);
        assert_eq!(
            Profile::new(&[1.0, 2.0], vec![d(1.0)]).unwrap().profile_type(),
            ProfileType::Constant
        );
        assert_eq!(npoint().profile_type(), ProfileType::NPoint);

        assert!(matches!(
            Profile::new(&[1.0], vec![]),
            Err(GeoTessError::IllegalProfileShape(_))
        ));
        assert!(Profile::new(&[1.0, 2.0, 3.0], vec![d(1.0), d(2.0)]).is_err());
        assert!(Profile::new(&[3.0, 2.0], vec![]).is_err());
        assert!(Profile::new(&[1.0, 3.0, 2.0], vec![d(1.0), d(2.0), d(3.0)]).is_err());
    }

    #[test]
    fn test_profile_type_ordinals() {
        for o in 0..6u8 {
            assert_eq!(ProfileType::from_ordinal(o).unwrap().ordinal(), o);
        }
        assert!(ProfileType::from_ordinal(6).is_none());
        assert_eq!(ProfileType::from_str("npoint"), Some(ProfileType::NPoint));
    }

    #[test]
    fn test_radius_index() {
        let p = npoint();
        assert_eq!(p.radius_index(5.0), None);
        assert_eq!(p.radius_index(10.0), Some(0));
        assert_eq!(p.radius_index(15.0), Some(0));
        assert_eq!(p.radius_index(20.0), Some(1));
        assert_eq!(p.radius_index(40.0), Some(2));
        assert_eq!(p.radius_index(45.0), Some(3));
    }

    #[test]
    fn test_linear_value() {
        let p = npoint();
        assert!((p.value(InterpolatorType::Linear, 0, 15.0, false) - 1.5).abs() < 1e-12);
        assert!((p.value(InterpolatorType::Linear, 0, 35.0, false) - 6.0).abs() < 1e-12);
        assert!((p.value(InterpolatorType::Linear, 0, 40.0, false) - 8.0).abs() < 1e-12);
        assert!(p.value(InterpolatorType::Linear, 0, 45.0, false).is_nan());
        assert_eq!(p.value(InterpolatorType::Linear, 0, 45.0, true), 8.0);
        assert_eq!(p.value(InterpolatorType::Linear, 0, 1.0, true), 1.0);
    }

    #[test]
    fn test_spline_passes_through_nodes() {
        let p = npoint();
        for (r, v) in [(10.0, 1.0), (20.0, 2.0), (30.0, 4.0), (40.0, 8.0)] {
            let s = p.value(InterpolatorType::CubicSpline, 0, r, false);
            assert!((s - v).abs() < 1e-9, "r={} s={}", r, s);
        }
        // convex data: the spline departs from the chord
        let lin = p.value(InterpolatorType::Linear, 0, 25.0, false);
        let spl = p.value(InterpolatorType::CubicSpline, 0, 25.0, false);
        assert!((lin - spl).abs() > 1e-6);
    }

    #[test]
    fn test_spline_on_straight_line_is_linear() {
        let p = Profile::new(&[0.0, 1.0, 2.0], vec![d(0.0), d(2.0), d(4.0)]).unwrap();
        let v = p.value(InterpolatorType::CubicSpline, 0, 1.5, false);
        assert!((v - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_spline_with_repeated_radius() {
        let p = Profile::new(&[0.0, 1.0, 1.0, 2.0], vec![d(0.0), d(1.0), d(2.0), d(3.0)]).unwrap();
        for (r, v) in [(0.5, 0.5), (1.0, 2.0), (1.5, 2.5), (2.0, 3.0)] {
            let lin = p.value(InterpolatorType::Linear, 0, r, false);
            let spl = p.value(InterpolatorType::CubicSpline, 0, r, false);
            assert!((lin - v).abs() < 1e-12, "r={} linear={}", r, lin);
            assert!((spl - v).abs() < 1e-12, "r={} spline={}", r, spl);
        }

        // each side of the discontinuity is fitted on its own
        let values = [1.0, 2.0, 4.0, 0.0, 1.0, 5.0];
        let split = Profile::new(
            &[10.0, 20.0, 30.0, 30.0, 40.0, 50.0],
            values.iter().map(|&v| d(v)).collect(),
        )
        .unwrap();
        let lower = Profile::new(&[10.0, 20.0, 30.0], vec![d(1.0), d(2.0), d(4.0)]).unwrap();
        let upper = Profile::new(&[30.0, 40.0, 50.0], vec![d(0.0), d(1.0), d(5.0)]).unwrap();
        for r in [12.0, 25.0, 29.0] {
            let a = split.value(InterpolatorType::CubicSpline, 0, r, false);
            let b = lower.value(InterpolatorType::CubicSpline, 0, r, false);
            assert!(a.is_finite() && (a - b).abs() < 1e-12, "r={} {} vs {}", r, a, b);
        }
        for r in [31.0, 45.0] {
            let a = split.value(InterpolatorType::CubicSpline, 0, r, false);
            let b = upper.value(InterpolatorType::CubicSpline, 0, r, false);
            assert!(a.is_finite() && (a - b).abs() < 1e-12, "r={} {} vs {}", r, a, b);
        }
    }

    #[test]
    fn test_spline_follows_node_edits() {
        let mut p = npoint();
        let before = p.value(InterpolatorType::CubicSpline, 0, 25.0, false);
        assert_eq!(before, p.value(InterpolatorType::CubicSpline, 0, 25.0, false));

        for node in 0..4 {
            p.set_node_value(node, 0, 2.0 * node as f64).unwrap();
        }
        let after = p.value(InterpolatorType::CubicSpline, 0, 25.0, false);
        assert!((after - 3.0).abs() < 1e-12, "stale second derivatives: {}", after);

        let copy = p.clone();
        assert_eq!(copy, p);
        assert!((copy.value(InterpolatorType::CubicSpline, 0, 15.0, false) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_coefficients() {
        let p = npoint();
        let c = p
            .interpolation_coefficients(InterpolatorType::Linear, 25.0, false)
            .unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].0, 1);
        assert!((c[0].1 + c[1].1 - 1.0).abs() < 1e-12);

        let exact = p
            .interpolation_coefficients(InterpolatorType::Linear, 10.0, false)
            .unwrap();
        assert_eq!(exact, vec![(0, 1.0)]);

        assert!(p
            .interpolation_coefficients(InterpolatorType::Linear, 50.0, false)
            .unwrap()
            .is_empty());
        assert_eq!(
            p.interpolation_coefficients(InterpolatorType::Linear, 50.0, true)
                .unwrap(),
            vec![(3, 1.0)]
        );
        assert!(p
            .interpolation_coefficients(InterpolatorType::CubicSpline, 25.0, false)
            .is_err());
    }

    #[test]
    fn test_single_value_profiles() {
        let c = Profile::constant(10.0, 20.0, d(3.0)).unwrap();
        assert_eq!(c.value(InterpolatorType::Linear, 0, 15.0, false), 3.0);
        assert!(c.value(InterpolatorType::Linear, 0, 25.0, false).is_nan());
        assert_eq!(c.radius(0), 10.0);
        assert_eq!(c.radius(1), 20.0);
        assert_eq!(c.integrate(0, false), 30.0);

        let s = Profile::surface(d(7.0));
        assert_eq!(s.value(InterpolatorType::Linear, 0, 1e9, false), 7.0);
        assert!(s.radius_top().is_nan());

        let e = Profile::empty(1.0, 2.0).unwrap();
        assert_eq!(e.data_count(), 0);
        assert!(e.value_top(0).is_nan());
    }

    #[test]
    fn test_closest_radius_index() {
        let p = npoint();
        assert_eq!(p.closest_radius_index(0.0), 0);
        assert_eq!(p.closest_radius_index(14.0), 0);
        assert_eq!(p.closest_radius_index(16.0), 1);
        assert_eq!(p.closest_radius_index(100.0), 3);
    }

    #[test]
    fn test_integrate_npoint() {
        let p = Profile::new(&[0.0, 1.0, 3.0], vec![d(1.0), d(1.0), d(1.0)]).unwrap();
        assert!((p.integrate(0, false) - 3.0).abs() < 1e-12);
        assert!((p.integrate(0, true) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_set_radius_top_and_bottom() {
        let mut p = npoint();
        p.set_radius_bottom(9.0);
        p.set_radius_top(41.0);
        assert_eq!(p.radius_bottom(), 9.0);
        assert_eq!(p.radius_top(), 41.0);
    }
}
