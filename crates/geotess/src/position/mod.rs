//! Interpolation cursor over a model.
//!
//! A [`Position`] remembers where it was last placed: the containing
//! triangle of every tessellation it has touched, the horizontal
//! coefficients, the radial coefficients of the current layer and the
//! interpolated layer radii. Moving it a short distance re-walks the mesh
//! from the previous triangle.
//!
//! ```text
//!   set(layer?, u, r) ──► update_2d: walk ─► horizontal (vertex, h) pairs
//!                     └─► update_radius ───► radial (node, c) pairs per vertex
//!   value(attr) = Σ_i h_i · Σ_j c_ij · value(vertex_i, layer, node_j)
//! ```

mod natural_neighbor;

use crate::config::GeoTessConfig;
use crate::error::{GeoTessError, Result};
use crate::geometry::{self, Vec3};
use crate::grid::Grid;
use crate::model::Model;
use crate::types::InterpolatorType;
use std::collections::HashMap;

/// cos(16°): a new point closer than this to the old one is located by
/// walking from the previous triangle.
const COS_WALK_RESTART: f64 = 0.961261696;

/// Horizontal coefficient above which the position sits on a vertex.
const ON_VERTEX: f64 = 0.999999999;

/// Layers thinner than this (km) have no gradient.
const MIN_THICKNESS: f64 = 1e-9;

/// Barycentric coefficients of `u` in triangle `t`, normalized to sum 1.
pub(crate) fn linear_coefficients(grid: &Grid, t: usize, u: &Vec3) -> (Vec<usize>, Vec<f64>) {
    let normals = grid.edge_normals(t);
    let mut c = [
        geometry::dot(&normals[0], u),
        geometry::dot(&normals[1], u),
        geometry::dot(&normals[2], u),
    ];
    let sum: f64 = c.iter().sum();
    for x in c.iter_mut() {
        *x /= sum;
    }
    (grid.triangle_vertex_indices(t).to_vec(), c.to_vec())
}

/// Stateful interpolator bound to one model.
#[derive(Debug, Clone)]
pub struct Position<'a> {
    model: &'a Model,
    horizontal: InterpolatorType,
    radial: InterpolatorType,
    error_value: f64,
    radius_out_of_range_allowed: bool,
    strict_range: bool,

    unit_vector: Option<Vec3>,
    radius: f64,
    layer: usize,
    tess: usize,

    /// Containing triangle per tessellation, `None` until located.
    triangles: Vec<Option<usize>>,
    max_tess_level: Vec<usize>,
    vertices: Vec<Vec<usize>>,
    coefficients: Vec<Vec<f64>>,

    /// Layer the radial coefficients were computed for, and the
    /// `(node, coefficient)` pairs of each interpolation vertex.
    radial_coefficients: Option<(usize, Vec<Vec<(usize, f64)>>)>,
    radius_tops: Vec<Option<f64>>,
    radius_bottoms: Vec<Option<f64>>,
    earth_radius: Option<f64>,
}

impl<'a> Position<'a> {
    /// Create a position. `horizontal` must be linear or natural neighbor,
    /// `radial` linear or cubic spline.
    pub fn new(
        model: &'a Model,
        horizontal: InterpolatorType,
        radial: InterpolatorType,
    ) -> Result<Self> {
        if !horizontal.is_horizontal() {
            return Err(GeoTessError::invalid_argument(format!(
                "{} is not a horizontal interpolator",
                horizontal
            )));
        }
        if !radial.is_radial() {
            return Err(GeoTessError::invalid_argument(format!(
                "{} is not a radial interpolator",
                radial
            )));
        }
        Ok(Self::with_types(model, horizontal, radial))
    }

    /// Create a position with the interpolators and range policy of `config`.
    pub fn from_config(model: &'a Model, config: &GeoTessConfig) -> Result<Self> {
        config.validate().map_err(GeoTessError::Config)?;
        let mut pos = Self::new(
            model,
            config.horizontal_interpolation,
            config.radial_interpolation,
        )?;
        pos.radius_out_of_range_allowed = config.radius_out_of_range_allowed;
        Ok(pos)
    }

    pub(crate) fn with_types(
        model: &'a Model,
        horizontal: InterpolatorType,
        radial: InterpolatorType,
    ) -> Self {
        let grid = model.grid();
        let n_tess = grid.tessellation_count();
        let n_layers = model.layer_count();
        Self {
            model,
            horizontal,
            radial,
            error_value: f64::NAN,
            radius_out_of_range_allowed: false,
            strict_range: false,
            unit_vector: None,
            radius: f64::NAN,
            layer: 0,
            tess: 0,
            triangles: vec![None; n_tess],
            max_tess_level: (0..n_tess).map(|t| grid.top_level(t)).collect(),
            vertices: vec![Vec::new(); n_tess],
            coefficients: vec![Vec::new(); n_tess],
            radial_coefficients: None,
            radius_tops: vec![None; n_layers],
            radius_bottoms: vec![None; n_layers],
            earth_radius: None,
        }
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn horizontal(&self) -> InterpolatorType {
        self.horizontal
    }

    pub fn radial(&self) -> InterpolatorType {
        self.radial
    }

    pub fn error_value(&self) -> f64 {
        self.error_value
    }

    /// Value returned in place of NaN and out-of-range results.
    pub fn set_error_value(&mut self, value: f64) {
        self.error_value = value;
    }

    pub fn radius_out_of_range_allowed(&self) -> bool {
        self.radius_out_of_range_allowed
    }

    /// When allowed, a radius outside the layer takes the value at the
    /// nearest layer boundary instead of the error value.
    pub fn set_radius_out_of_range_allowed(&mut self, allowed: bool) {
        if allowed != self.radius_out_of_range_allowed {
            self.radius_out_of_range_allowed = allowed;
            self.radial_coefficients = None;
        }
    }

    /// Make [`Position::try_value`] fail with `OutOfRangeQuery` instead of
    /// returning the error value.
    pub fn set_strict_range(&mut self, strict: bool) {
        self.strict_range = strict;
    }

    // ------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------

    /// Place the position at unit vector `u` and `radius` (km).
    ///
    /// With a layer, the radius is taken as given in that layer (and left
    /// unset when negative). Without one, the layer is [`Position::layer_id_for`].
    pub fn set(&mut self, layer: Option<usize>, u: &Vec3, radius: f64) -> Result<()> {
        match layer {
            Some(layer) => {
                self.check_layer(layer)?;
                self.update_2d(layer, u);
                if radius >= 0.0 {
                    self.update_radius(layer, radius);
                }
            }
            None => {
                let top = self.model.layer_count() - 1;
                self.update_2d(top, u);
                let layer = self.layer_id_for(radius);
                self.update_2d(layer, u);
                self.update_radius(layer, radius);
            }
        }
        Ok(())
    }

    /// Place the position at geographic `lat`, `lon` (degrees) and depth (km).
    pub fn set_lat_lon_depth(&mut self, lat: f64, lon: f64, depth: f64) -> Result<()> {
        let shape = self.model.earth_shape();
        let u = shape.vector_degrees(lat, lon);
        let radius = shape.earth_radius(&u) - depth;
        self.set(None, &u, radius)
    }

    /// Place the position at the top of `layer` below `u`.
    pub fn set_top(&mut self, layer: usize, u: &Vec3) -> Result<()> {
        self.check_layer(layer)?;
        self.update_2d(layer, u);
        let r = self.radius_top(layer);
        self.update_radius(layer, r);
        Ok(())
    }

    /// Place the position at the bottom of `layer` below `u`.
    pub fn set_bottom(&mut self, layer: usize, u: &Vec3) -> Result<()> {
        self.check_layer(layer)?;
        self.update_2d(layer, u);
        let r = self.radius_bottom(layer);
        self.update_radius(layer, r);
        Ok(())
    }

    /// Change the radius without moving horizontally.
    pub fn set_radius(&mut self, layer: Option<usize>, radius: f64) -> Result<()> {
        let u = self.require_unit_vector()?;
        self.set(layer, &u, radius)
    }

    /// Change the depth without moving horizontally.
    pub fn set_depth(&mut self, layer: Option<usize>, depth: f64) -> Result<()> {
        let u = self.require_unit_vector()?;
        let radius = self.earth_radius() - depth;
        self.set(layer, &u, radius)
    }

    /// Clamp the radius into `layer` when out-of-range radii are allowed.
    /// Returns the resulting radius.
    pub fn set_radius_constrained(&mut self, layer: usize) -> Result<f64> {
        if !self.radius_out_of_range_allowed {
            return Ok(self.radius);
        }
        self.check_layer(layer)?;
        let bottom = self.radius_bottom(layer);
        let top = self.radius_top(layer);
        if self.radius < bottom {
            self.set_radius(Some(layer), bottom)?;
        } else if self.radius > top {
            self.set_radius(Some(layer), top)?;
        }
        Ok(self.radius)
    }

    /// Limit the walk in the tessellation of `layer` to `level`.
    pub fn set_max_tess_level(&mut self, layer: usize, level: usize) -> Result<()> {
        self.check_layer(layer)?;
        let tess = self.model.metadata().tessellation(layer);
        self.max_tess_level[tess] = level;
        self.triangles[tess] = None;
        if tess == self.tess {
            self.radial_coefficients = None;
            self.clear_layer_radii();
        }
        Ok(())
    }

    pub fn max_tess_level(&self, layer: usize) -> usize {
        self.max_tess_level[self.model.metadata().tessellation(layer)]
    }

    fn check_layer(&self, layer: usize) -> Result<()> {
        if layer >= self.model.layer_count() {
            return Err(GeoTessError::invalid_argument(format!(
                "layer {} out of range, model has {} layers",
                layer,
                self.model.layer_count()
            )));
        }
        Ok(())
    }

    fn require_unit_vector(&self) -> Result<Vec3> {
        self.unit_vector
            .ok_or_else(|| GeoTessError::invalid_argument("position has not been set"))
    }

    fn update_2d(&mut self, layer: usize, u: &Vec3) {
        let tess = self.model.metadata().tessellation(layer);
        self.tess = tess;
        if self.unit_vector.as_ref() == Some(u) {
            self.check_tessellation(tess);
            return;
        }

        let start = match (self.unit_vector, self.triangles[tess]) {
            (Some(old), Some(t)) if geometry::dot(&old, u) >= COS_WALK_RESTART => t,
            _ => self.model.grid().first_triangle(tess, 0),
        };
        for t in self.triangles.iter_mut() {
            *t = None;
        }
        self.unit_vector = Some(*u);
        self.radius = f64::NAN;
        self.earth_radius = None;
        self.radial_coefficients = None;
        self.clear_layer_radii();
        self.locate(tess, start);
    }

    fn update_radius(&mut self, layer: usize, radius: f64) {
        if layer != self.layer || radius != self.radius {
            self.radial_coefficients = None;
        }
        self.layer = layer;
        self.radius = radius;
        self.tess = self.model.metadata().tessellation(layer);
        self.check_tessellation(self.tess);
    }

    fn clear_layer_radii(&mut self) {
        self.radius_tops.iter_mut().for_each(|r| *r = None);
        self.radius_bottoms.iter_mut().for_each(|r| *r = None);
    }

    fn check_tessellation(&mut self, tess: usize) {
        if self.triangles[tess].is_none() && self.unit_vector.is_some() {
            let start = self.model.grid().first_triangle(tess, 0);
            self.locate(tess, start);
        }
    }

    fn locate(&mut self, tess: usize, start: usize) {
        let Some(u) = self.unit_vector else {
            return;
        };
        let grid = self.model.grid();
        let t = grid.find_triangle_from(start, &u, self.max_tess_level[tess]);
        let (vertices, coefficients) = match self.horizontal {
            InterpolatorType::NaturalNeighbor => natural_neighbor::coefficients(grid, t, &u),
            _ => linear_coefficients(grid, t, &u),
        };
        self.triangles[tess] = Some(t);
        self.vertices[tess] = vertices;
        self.coefficients[tess] = coefficients;
    }

    // ------------------------------------------------------------------
    // Location state
    // ------------------------------------------------------------------

    pub fn is_set(&self) -> bool {
        self.unit_vector.is_some()
    }

    pub fn unit_vector(&self) -> Option<&Vec3> {
        self.unit_vector.as_ref()
    }

    pub fn lat_degrees(&self) -> f64 {
        self.unit_vector
            .map(|u| self.model.earth_shape().lat_degrees(&u))
            .unwrap_or(f64::NAN)
    }

    pub fn lon_degrees(&self) -> f64 {
        self.unit_vector
            .map(|u| self.model.earth_shape().lon_degrees(&u))
            .unwrap_or(f64::NAN)
    }

    /// Radius in km, NaN until a radius has been set.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn depth(&mut self) -> f64 {
        self.earth_radius() - self.radius
    }

    /// Radius of the earth shape below the position.
    pub fn earth_radius(&mut self) -> f64 {
        match (self.earth_radius, self.unit_vector) {
            (Some(r), _) => r,
            (None, Some(u)) => {
                let r = self.model.earth_shape().earth_radius(&u);
                self.earth_radius = Some(r);
                r
            }
            (None, None) => f64::NAN,
        }
    }

    /// Current layer.
    pub fn layer_id(&self) -> usize {
        self.layer
    }

    /// Current tessellation.
    pub fn tessellation(&self) -> usize {
        self.tess
    }

    /// Layer containing `radius` below the current position: the first layer
    /// whose top is at or above it, and above all layers the top-most layer
    /// with non-zero thickness.
    pub fn layer_id_for(&mut self, radius: f64) -> usize {
        let n = self.model.layer_count();
        for layer in 0..n {
            if radius <= self.radius_top(layer) {
                return layer;
            }
        }
        (0..n)
            .rev()
            .find(|&layer| self.layer_thickness(layer) > 0.0)
            .unwrap_or(n - 1)
    }

    /// Containing triangle in tessellation `tess`.
    pub fn triangle(&mut self, tess: usize) -> Option<usize> {
        self.check_tessellation(tess);
        self.triangles[tess]
    }

    /// Level of the containing triangle in tessellation `tess`.
    pub fn tess_level(&mut self, tess: usize) -> Option<usize> {
        self.triangle(tess)
            .map(|t| self.model.grid().triangle_level(t))
    }

    /// Interpolation vertices in the current tessellation.
    pub fn vertices(&self) -> &[usize] {
        &self.vertices[self.tess]
    }

    /// Horizontal coefficients matching [`Position::vertices`].
    pub fn horizontal_coefficients(&self) -> &[f64] {
        &self.coefficients[self.tess]
    }

    /// Vertex the position coincides with, if any.
    pub fn vertex_index(&self) -> Option<usize> {
        self.vertices[self.tess]
            .iter()
            .zip(&self.coefficients[self.tess])
            .find(|(_, &h)| h > ON_VERTEX)
            .map(|(&v, _)| v)
    }

    // ------------------------------------------------------------------
    // Layer radii
    // ------------------------------------------------------------------

    /// Interpolated radius of the top of `layer`, or the error value.
    pub fn radius_top(&mut self, layer: usize) -> f64 {
        let r = match self.radius_tops[layer] {
            Some(r) => r,
            None => {
                let tess = self.radius_tessellation(layer, layer + 1);
                let r = self.interpolate_profiles(tess, layer, |p| p.radius_top());
                self.radius_tops[layer] = Some(r);
                r
            }
        };
        if r.is_nan() {
            self.error_value
        } else {
            r
        }
    }

    /// Interpolated radius of the bottom of `layer`, or the error value.
    pub fn radius_bottom(&mut self, layer: usize) -> f64 {
        let r = match self.radius_bottoms[layer] {
            Some(r) => r,
            None => {
                let tess = match layer.checked_sub(1) {
                    Some(below) => self.radius_tessellation(layer, below),
                    None => self.radius_tessellation(layer, layer),
                };
                let r = self.interpolate_profiles(tess, layer, |p| p.radius_bottom());
                self.radius_bottoms[layer] = Some(r);
                r
            }
        };
        if r.is_nan() {
            self.error_value
        } else {
            r
        }
    }

    pub fn layer_thickness(&mut self, layer: usize) -> f64 {
        self.radius_top(layer) - self.radius_bottom(layer)
    }

    /// Bottom of layer 0 followed by the top of every layer.
    pub fn layer_radii(&mut self) -> Vec<f64> {
        let n = self.model.layer_count();
        let mut radii = Vec::with_capacity(n + 1);
        radii.push(self.radius_bottom(0));
        for layer in 0..n {
            radii.push(self.radius_top(layer));
        }
        radii
    }

    /// Tessellation whose containing triangle is the smaller of those of
    /// `layer` and its neighbor `other`.
    fn radius_tessellation(&mut self, layer: usize, other: usize) -> usize {
        let metadata = self.model.metadata();
        let tess = metadata.tessellation(layer);
        self.check_tessellation(tess);
        if other >= self.model.layer_count() || metadata.tessellation(other) == tess {
            return tess;
        }
        let tess2 = metadata.tessellation(other);
        self.check_tessellation(tess2);
        match (self.triangles[tess], self.triangles[tess2]) {
            (Some(t1), Some(t2)) if self.smaller_triangle(t2, t1) => tess2,
            _ => tess,
        }
    }

    /// True when triangle `a` is smaller than `b`: its corners are closer together.
    fn smaller_triangle(&self, a: usize, b: usize) -> bool {
        let grid = self.model.grid();
        let spread = |t: usize| {
            let [v0, v1, v2] = grid.triangle_vertices(t);
            geometry::dot(&v0, &v1) + geometry::dot(&v1, &v2) + geometry::dot(&v2, &v0)
        };
        spread(a) > spread(b)
    }

    fn interpolate_profiles(
        &self,
        tess: usize,
        layer: usize,
        f: impl Fn(&crate::profile::Profile) -> f64,
    ) -> f64 {
        self.vertices[tess]
            .iter()
            .zip(&self.coefficients[tess])
            .map(|(&v, &h)| h * f(self.model.profile(v, layer)))
            .sum()
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Interpolated value of `attr` in the current layer, or the error value.
    pub fn value(&mut self, attr: usize) -> f64 {
        let layer = self.layer;
        self.value_in_layer(attr, layer)
    }

    /// Interpolated value of `attr` at the current radius in `layer`.
    pub fn value_in_layer(&mut self, attr: usize, layer: usize) -> f64 {
        match self.try_value_in_layer(attr, layer) {
            Ok(v) => v,
            Err(_) => self.error_value,
        }
    }

    /// Like [`Position::value`], but fails on unset positions and bad
    /// attributes, and on out-of-range radii when strict range is on.
    pub fn try_value(&mut self, attr: usize) -> Result<f64> {
        let layer = self.layer;
        self.try_value_in_layer(attr, layer)
    }

    pub fn try_value_in_layer(&mut self, attr: usize, layer: usize) -> Result<f64> {
        self.require_unit_vector()?;
        self.check_layer(layer)?;
        if attr >= self.model.attribute_count() {
            return Err(GeoTessError::invalid_argument(format!(
                "attribute {} out of range, model has {} attributes",
                attr,
                self.model.attribute_count()
            )));
        }

        let value = self.raw_value(attr, layer)?;
        if value.is_nan() {
            if self.strict_range && !self.radius_out_of_range_allowed {
                let bottom = self.radius_bottom(layer);
                let top = self.radius_top(layer);
                if self.radius < bottom || self.radius > top {
                    return Err(GeoTessError::OutOfRangeQuery {
                        radius: self.radius,
                        bottom,
                        top,
                        layer,
                    });
                }
            }
            return Ok(self.error_value);
        }
        Ok(value)
    }

    fn raw_value(&mut self, attr: usize, layer: usize) -> Result<f64> {
        let tess = self.model.metadata().tessellation(layer);
        self.check_tessellation(tess);
        let model = self.model;

        if self.radial == InterpolatorType::CubicSpline {
            let mut value = 0.0;
            for (&v, &h) in self.vertices[tess].iter().zip(&self.coefficients[tess]) {
                value += h * model.profile(v, layer).value(
                    self.radial,
                    attr,
                    self.radius,
                    self.radius_out_of_range_allowed,
                );
            }
            return Ok(value);
        }

        self.update_radial_coefficients(layer)?;
        let radial = self.radial_nodes();
        let mut value = 0.0;
        for ((&v, &h), nodes) in self.vertices[tess]
            .iter()
            .zip(&self.coefficients[tess])
            .zip(radial)
        {
            if nodes.is_empty() {
                return Ok(f64::NAN);
            }
            let profile = model.profile(v, layer);
            value += h * nodes
                .iter()
                .map(|&(node, c)| c * profile.node_value(node, attr))
                .sum::<f64>();
        }
        Ok(value)
    }

    /// Value of `attr` at the top of `layer`. Zero for layers of no thickness.
    pub fn value_top(&mut self, attr: usize, layer: usize) -> f64 {
        self.boundary_value(layer, |p| p.value_top(attr))
    }

    /// Value of `attr` at the bottom of `layer`. Zero for layers of no thickness.
    pub fn value_bottom(&mut self, attr: usize, layer: usize) -> f64 {
        self.boundary_value(layer, |p| p.value_bottom(attr))
    }

    fn boundary_value(&mut self, layer: usize, f: impl Fn(&crate::profile::Profile) -> f64) -> f64 {
        if self.unit_vector.is_none() || layer >= self.model.layer_count() {
            return self.error_value;
        }
        if self.layer_thickness(layer) < MIN_THICKNESS {
            return 0.0;
        }
        let tess = self.model.metadata().tessellation(layer);
        let v = self.interpolate_profiles(tess, layer, f);
        if v.is_nan() {
            self.error_value
        } else {
            v
        }
    }

    /// Compute the radial `(node, coefficient)` pairs of each interpolation
    /// vertex in `layer` unless they are current.
    fn update_radial_coefficients(&mut self, layer: usize) -> Result<()> {
        if matches!(&self.radial_coefficients, Some((l, _)) if *l == layer) {
            return Ok(());
        }
        let tess = self.model.metadata().tessellation(layer);
        self.check_tessellation(tess);
        let coefficients = self.vertices[tess]
            .iter()
            .map(|&v| {
                self.model.profile(v, layer).interpolation_coefficients(
                    self.radial,
                    self.radius,
                    self.radius_out_of_range_allowed,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        self.radial_coefficients = Some((layer, coefficients));
        Ok(())
    }

    fn radial_nodes(&self) -> &[Vec<(usize, f64)>] {
        match &self.radial_coefficients {
            Some((_, c)) => c,
            None => &[],
        }
    }

    // ------------------------------------------------------------------
    // Points, weights and gradients
    // ------------------------------------------------------------------

    /// Active point that contributes most to the interpolated value.
    pub fn closest_point(&mut self) -> Result<Option<usize>> {
        self.require_unit_vector()?;
        let layer = self.layer;
        let tess = self.model.metadata().tessellation(layer);
        self.update_radial_coefficients(layer)?;
        let radial = self.radial_nodes();
        let mut best: Option<(usize, usize, f64)> = None;
        for ((&v, &h), nodes) in self.vertices[tess]
            .iter()
            .zip(&self.coefficients[tess])
            .zip(radial)
        {
            for &(node, c) in nodes {
                if best.map_or(true, |(_, _, w)| h * c > w) {
                    best = Some((v, node, h * c));
                }
            }
        }
        Ok(best.and_then(|(v, node, _)| self.model.point_map().point_index(v, layer, node)))
    }

    /// Map of active point index to interpolation coefficient.
    pub fn coefficients(&mut self) -> Result<HashMap<usize, f64>> {
        let mut map = HashMap::new();
        self.weights(1.0, &mut map)?;
        Ok(map)
    }

    /// Add `dkm × h × c` for every contributing node to `weights`, keyed by
    /// point index. Returns false when some contributing node is not active.
    pub fn weights(&mut self, dkm: f64, weights: &mut HashMap<usize, f64>) -> Result<bool> {
        self.require_unit_vector()?;
        let layer = self.layer;
        let tess = self.model.metadata().tessellation(layer);
        self.update_radial_coefficients(layer)?;
        let radial = self.radial_nodes();
        let point_map = self.model.point_map();
        let mut all_active = true;
        for ((&v, &h), nodes) in self.vertices[tess]
            .iter()
            .zip(&self.coefficients[tess])
            .zip(radial)
        {
            for &(node, c) in nodes {
                let w = dkm * h * c;
                if w == 0.0 {
                    continue;
                }
                match point_map.point_index(v, layer, node) {
                    Some(p) => *weights.entry(p).or_insert(0.0) += w,
                    None => all_active = false,
                }
            }
        }
        Ok(all_active)
    }

    /// Gradient of `attr` (or of its reciprocal) at the position, from the
    /// node gradients stored by [`Model::compute_gradients`].
    pub fn gradient(&mut self, attr: usize, reciprocal: bool) -> Result<Vec3> {
        self.require_unit_vector()?;
        if self.radial == InterpolatorType::CubicSpline {
            return Err(GeoTessError::invalid_argument(
                "gradients require linear radial interpolation",
            ));
        }
        let layer = self.layer;
        if self.layer_thickness(layer) < MIN_THICKNESS {
            return Ok([0.0; 3]);
        }
        let gradients = self.model.layer_gradients(layer, attr, reciprocal)?;
        let tess = self.model.metadata().tessellation(layer);
        self.update_radial_coefficients(layer)?;
        let radial = self.radial_nodes();
        let mut g = [0.0; 3];
        for ((&v, &h), nodes) in self.vertices[tess]
            .iter()
            .zip(&self.coefficients[tess])
            .zip(radial)
        {
            for &(node, c) in nodes {
                if let Some(ng) = gradients.get(v).and_then(|n| n.get(node)) {
                    for k in 0..3 {
                        g[k] += h * c * ng[k];
                    }
                }
            }
        }
        Ok(g)
    }
}
