//! Layered radial profiles attached to the vertices of a shared grid.
//!
//! A [`Model`] holds one [`Profile`] per `(vertex, layer)`. Every vertex of
//! the grid carries a profile in every layer, even when the vertex is not
//! used by the tessellation of that layer. The point map that numbers the
//! active nodes is derived lazily and rebuilt whenever profiles or the
//! active region change.

use crate::codec::CodecRegistry;
use crate::config::GeoTessConfig;
use crate::error::{GeoTessError, Result};
use crate::geometry::{self, EarthShape, Vec3};
use crate::gradient::GradientCalculator;
use crate::grid::Grid;
use crate::metadata::MetaData;
use crate::point_map::{self, PointMap};
use crate::polygon::Polygon;
use crate::position::Position;
use crate::profile::{Profile, ProfileType};
use crate::types::{InterpolatorType, ProfileCounts};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Largest interface mismatch (km) repaired by [`Model::test_model_integrity`].
const INTERFACE_TOLERANCE: f64 = 0.01;

/// Caller-supplied check run by [`Model::set_profile`] after the built-in ones.
pub type ProfileValidator = dyn Fn(&Profile) -> std::result::Result<(), String> + Send + Sync;

/// Node gradients of one attribute in one layer, `[vertex][node]`.
#[derive(Debug, Clone, PartialEq)]
struct LayerGradients {
    reciprocal: bool,
    nodes: Vec<Vec<Vec3>>,
}

/// A tessellated earth model.
#[derive(Clone)]
pub struct Model {
    grid: Arc<Grid>,
    metadata: MetaData,
    /// `[vertex][layer]`
    profiles: Vec<Vec<Profile>>,
    active_region: Option<Polygon>,
    point_map: OnceCell<PointMap>,
    /// Keyed by `(layer, attribute)`.
    gradients: HashMap<(usize, usize), LayerGradients>,
    validator: Option<Arc<ProfileValidator>>,
    input_file: Option<PathBuf>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("grid_id", &self.grid.grid_id())
            .field("metadata", &self.metadata)
            .field("vertices", &self.profiles.len())
            .field("active_region", &self.active_region)
            .field("gradients", &self.gradients.keys().collect::<Vec<_>>())
            .field("validator", &self.validator.is_some())
            .field("input_file", &self.input_file)
            .finish()
    }
}

impl Model {
    /// Create a model whose profiles are all `Empty` at radius 0.
    pub fn new(grid: Arc<Grid>, metadata: MetaData) -> Result<Self> {
        Self::with_initial_profile(
            grid,
            metadata,
            Profile::Empty {
                radius_bottom: 0.0,
                radius_top: 0.0,
            },
        )
    }

    /// Create a 2-D model: one layer whose profiles are `SurfaceEmpty`.
    pub fn new_surface(grid: Arc<Grid>, metadata: MetaData) -> Result<Self> {
        if metadata.layer_count() != 1 {
            return Err(GeoTessError::malformed_model(format!(
                "a surface model has exactly one layer, got {}",
                metadata.layer_count()
            )));
        }
        Self::with_initial_profile(grid, metadata, Profile::SurfaceEmpty)
    }

    fn with_initial_profile(grid: Arc<Grid>, metadata: MetaData, initial: Profile) -> Result<Self> {
        metadata.check_complete()?;
        if let Some(&tess) = metadata
            .layer_tess_ids()
            .iter()
            .find(|&&t| t >= grid.tessellation_count())
        {
            return Err(GeoTessError::invalid_argument(format!(
                "layer tessellation {} does not exist, grid has {} tessellations",
                tess,
                grid.tessellation_count()
            )));
        }
        let profiles = vec![vec![initial; metadata.layer_count()]; grid.vertex_count()];
        Ok(Self {
            grid,
            metadata,
            profiles,
            active_region: None,
            point_map: OnceCell::new(),
            gradients: HashMap::new(),
            validator: None,
            input_file: None,
        })
    }

    /// Install a validator run by every later [`Model::set_profile`].
    pub fn set_profile_validator(&mut self, validator: Arc<ProfileValidator>) {
        self.validator = Some(validator);
    }

    /// Deep copy of metadata and profiles sharing the same grid.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Load a model with the default configuration and no custom data codecs.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, &CodecRegistry::new(), &GeoTessConfig::default())
    }

    /// Load a binary or ASCII model file. Grids referenced by the file are
    /// resolved relative to it.
    pub fn load_with(
        path: impl AsRef<Path>,
        registry: &CodecRegistry,
        config: &GeoTessConfig,
    ) -> Result<Self> {
        crate::codec::read_model_file(path.as_ref(), registry, config)
    }

    /// Write the model with its grid embedded. Files ending in `.ascii` are
    /// written as text.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::codec::write_model_file(self, path.as_ref(), None, &CodecRegistry::new())
    }

    /// Write the model referencing a grid file in the same directory. The
    /// grid file is written too when it does not exist yet.
    pub fn write_with_grid_file(&self, path: impl AsRef<Path>, grid_file: &str) -> Result<()> {
        crate::codec::write_model_file(self, path.as_ref(), Some(grid_file), &CodecRegistry::new())
    }

    /// Write with an explicit codec registry for custom data.
    pub fn write_with(
        &self,
        path: impl AsRef<Path>,
        grid_file: Option<&str>,
        registry: &CodecRegistry,
    ) -> Result<()> {
        crate::codec::write_model_file(self, path.as_ref(), grid_file, registry)
    }

    /// File this model was loaded from, if any.
    pub fn input_file(&self) -> Option<&Path> {
        self.input_file.as_deref()
    }

    pub(crate) fn set_input_file(&mut self, path: PathBuf) {
        self.input_file = Some(path);
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Shared handle to the grid.
    pub fn shared_grid(&self) -> Arc<Grid> {
        Arc::clone(&self.grid)
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn earth_shape(&self) -> EarthShape {
        self.metadata.earth_shape()
    }

    pub fn set_earth_shape(&mut self, shape: EarthShape) {
        self.metadata.set_earth_shape(shape);
        self.point_map = OnceCell::new();
    }

    pub fn vertex_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn layer_count(&self) -> usize {
        self.metadata.layer_count()
    }

    pub fn attribute_count(&self) -> usize {
        self.metadata.attribute_count()
    }

    /// True for models made of surface profiles.
    pub fn is_2d(&self) -> bool {
        self.profiles
            .first()
            .and_then(|pp| pp.first())
            .map(Profile::is_surface)
            .unwrap_or(false)
    }

    pub fn is_3d(&self) -> bool {
        !self.is_2d()
    }

    /// Interpolation cursor over this model.
    pub fn position(
        &self,
        horizontal: InterpolatorType,
        radial: InterpolatorType,
    ) -> Result<Position<'_>> {
        Position::new(self, horizontal, radial)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    pub fn profile(&self, vertex: usize, layer: usize) -> &Profile {
        &self.profiles[vertex][layer]
    }

    /// Profiles of every layer at `vertex`, bottom layer first.
    pub fn profiles(&self, vertex: usize) -> &[Profile] {
        &self.profiles[vertex]
    }

    /// Every profile, `[vertex][layer]`.
    pub fn all_profiles(&self) -> &[Vec<Profile>] {
        &self.profiles
    }

    /// Replace the profile at `(vertex, layer)` after validating it.
    pub fn set_profile(&mut self, vertex: usize, layer: usize, profile: Profile) -> Result<()> {
        check_profile(
            &self.metadata,
            self.validator.as_deref(),
            self.profiles.len(),
            vertex,
            layer,
            &profile,
        )?;
        self.profiles[vertex][layer] = profile;
        self.point_map = OnceCell::new();
        self.gradients.retain(|&(l, _), _| l != layer);
        Ok(())
    }

    /// Split the profile array into disjoint writers, one per vertex range.
    ///
    /// Ranges must be ascending and non-overlapping. Each writer validates
    /// like [`Model::set_profile`] and only accepts vertices of its range, so
    /// writers can be moved to different threads.
    pub fn profile_writers(&mut self, ranges: &[Range<usize>]) -> Result<Vec<ProfileWriter<'_>>> {
        self.point_map = OnceCell::new();
        self.gradients.clear();

        let vertex_count = self.profiles.len();
        let metadata = &self.metadata;
        let validator = self.validator.as_deref();
        let mut rest: &mut [Vec<Profile>] = &mut self.profiles;
        let mut offset = 0;
        let mut writers = Vec::with_capacity(ranges.len());
        for range in ranges {
            if range.start < offset || range.end < range.start || range.end > vertex_count {
                return Err(GeoTessError::invalid_argument(format!(
                    "vertex range {:?} overlaps a previous range or exceeds {} vertices",
                    range, vertex_count
                )));
            }
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(range.start - offset);
            let (mine, tail) = tail.split_at_mut(range.end - range.start);
            rest = tail;
            offset = range.end;
            writers.push(ProfileWriter {
                range: range.clone(),
                profiles: mine,
                metadata,
                validator,
                vertex_count,
            });
        }
        Ok(writers)
    }

    /// Radius of a node in km.
    pub fn radius(&self, vertex: usize, layer: usize, node: usize) -> f64 {
        self.profiles[vertex][layer].radius(node)
    }

    /// Depth of a node below the earth shape in km.
    pub fn depth(&self, vertex: usize, layer: usize, node: usize) -> f64 {
        self.earth_shape().earth_radius(self.grid.vertex(vertex)) - self.radius(vertex, layer, node)
    }

    pub fn value(&self, vertex: usize, layer: usize, node: usize, attr: usize) -> f64 {
        self.profiles[vertex][layer].node_value(node, attr)
    }

    pub fn set_value(
        &mut self,
        vertex: usize,
        layer: usize,
        node: usize,
        attr: usize,
        value: f64,
    ) -> Result<()> {
        let profile = self
            .profiles
            .get_mut(vertex)
            .and_then(|pp| pp.get_mut(layer))
            .ok_or_else(|| {
                GeoTessError::invalid_argument(format!("no profile at vertex {} layer {}", vertex, layer))
            })?;
        profile.set_node_value(node, attr, value)?;
        self.gradients.retain(|&(l, _), _| l != layer);
        Ok(())
    }

    /// Bottom of layer 0 followed by the top of every layer at `vertex`.
    pub fn layer_radii(&self, vertex: usize) -> Vec<f64> {
        point_map::layer_radii(&self.profiles[vertex])
    }

    // ------------------------------------------------------------------
    // Point map and active region
    // ------------------------------------------------------------------

    /// Numbering of the active nodes, built on first use.
    pub fn point_map(&self) -> &PointMap {
        self.point_map.get_or_init(|| {
            let map = PointMap::build(
                &self.grid,
                &self.profiles,
                self.active_region.as_ref(),
                self.earth_shape(),
            );
            debug!(points = map.size(), global = map.is_global(), "Point map built");
            map
        })
    }

    /// Restrict the point map to `region`, or activate every node with `None`.
    pub fn set_active_region(&mut self, region: Option<&Polygon>) {
        self.active_region = region.cloned();
        self.point_map = OnceCell::new();
        let points = self.point_map().size();
        info!(
            points,
            region = if region.is_some() { "polygon" } else { "global" },
            "Active region set"
        );
    }

    pub fn active_region(&self) -> Option<&Polygon> {
        self.active_region.as_ref()
    }

    /// Number of active points.
    pub fn point_count(&self) -> usize {
        self.point_map().size()
    }

    pub fn point_unit_vector(&self, point: usize) -> &Vec3 {
        self.grid.vertex(self.point_map().vertex_index(point))
    }

    pub fn point_radius(&self, point: usize) -> f64 {
        let (v, l, n) = self.point_map().point_indices(point);
        self.radius(v, l, n)
    }

    pub fn point_depth(&self, point: usize) -> f64 {
        let (v, l, n) = self.point_map().point_indices(point);
        self.depth(v, l, n)
    }

    pub fn point_value(&self, point: usize, attr: usize) -> f64 {
        let (v, l, n) = self.point_map().point_indices(point);
        self.value(v, l, n, attr)
    }

    pub fn set_point_value(&mut self, point: usize, attr: usize, value: f64) -> Result<()> {
        let map = self.point_map();
        if point >= map.size() {
            return Err(GeoTessError::invalid_argument(format!(
                "point {} out of range, model has {} active points",
                point,
                map.size()
            )));
        }
        let (v, l, n) = map.point_indices(point);
        self.set_value(v, l, n, attr, value)
    }

    /// Active point nearest to `u` at `radius`, searched in `layer` or in the
    /// layer containing the radius.
    pub fn find_closest_point(
        &self,
        u: &Vec3,
        radius: f64,
        layer: Option<usize>,
    ) -> Result<Option<usize>> {
        let mut pos = Position::with_types(self, InterpolatorType::Linear, InterpolatorType::Linear);
        pos.set_radius_out_of_range_allowed(true);
        pos.set(layer, u, radius)?;
        pos.closest_point()
    }

    // ------------------------------------------------------------------
    // Integrity and summaries
    // ------------------------------------------------------------------

    /// Check profile kinds and layer interfaces. Interface mismatches up to
    /// 0.01 km are repaired in place; the number of repairs is returned.
    pub fn test_model_integrity(&mut self) -> Result<usize> {
        let n_layers = self.layer_count();
        let surface = self.is_2d();
        if surface && n_layers != 1 {
            return Err(GeoTessError::integrity(format!(
                "a surface model must have exactly 1 layer, found {}",
                n_layers
            )));
        }

        let mut repairs = 0;
        for (vertex, pp) in self.profiles.iter_mut().enumerate() {
            if let Some(layer) = pp.iter().position(|p| p.is_surface() != surface) {
                return Err(GeoTessError::integrity(format!(
                    "vertex {} layer {} mixes surface and non-surface profiles",
                    vertex, layer
                )));
            }
            if surface {
                continue;
            }

            for layer in (1..pp.len()).rev() {
                let dr = pp[layer].radius_bottom() - pp[layer - 1].radius_top();
                if dr.abs() > INTERFACE_TOLERANCE {
                    return Err(GeoTessError::integrity(format!(
                        "at vertex {} the top of layer {} is {:.3} and the bottom of layer {} is {:.3}, they differ by {:.3}",
                        vertex,
                        layer - 1,
                        pp[layer - 1].radius_top(),
                        layer,
                        pp[layer].radius_bottom(),
                        dr
                    )));
                }
                if dr != 0.0 {
                    let mut up = layer;
                    while up < pp.len() - 1 && pp[up].profile_type() == ProfileType::Thin {
                        up += 1;
                    }
                    let r = pp[up].radius(0) as f32;
                    let mut below = layer - 1;
                    while below > 0 && pp[below].profile_type() == ProfileType::Thin {
                        below -= 1;
                    }
                    warn!(
                        vertex,
                        layer = below,
                        from = pp[below].radius_top(),
                        to = r,
                        "Repairing layer interface radius"
                    );
                    pp[below].set_radius_top(r);
                    for p in &mut pp[below + 1..=up] {
                        p.set_radius_bottom(r);
                    }
                    repairs += 1;
                }
            }

            for (layer, p) in pp.iter().enumerate() {
                if p.radii_count() > 1 && p.radius_bottom() > p.radius_top() {
                    return Err(GeoTessError::integrity(format!(
                        "vertex {} layer {}: bottom radius {:.4} above top radius {:.4}",
                        vertex,
                        layer,
                        p.radius_bottom(),
                        p.radius_top()
                    )));
                }
            }
        }

        if !surface {
            for (vertex, pp) in self.profiles.iter().enumerate() {
                for layer in 1..pp.len() {
                    if pp[layer].radius_bottom() != pp[layer - 1].radius_top() {
                        return Err(GeoTessError::integrity(format!(
                            "vertex {} interface below layer {} still mismatched after repair",
                            vertex, layer
                        )));
                    }
                }
            }
        }

        if repairs > 0 {
            self.point_map = OnceCell::new();
            self.gradients.clear();
        }
        Ok(repairs)
    }

    /// Profile kinds over all layers, with the number of vertices holding
    /// at least one active point.
    pub fn profile_counts(&self) -> ProfileCounts {
        let mut counts = ProfileCounts::default();
        for layer in 0..self.layer_count() {
            let c = self.layer_profile_counts(layer);
            counts.empty += c.empty;
            counts.thin += c.thin;
            counts.constant += c.constant;
            counts.npoint += c.npoint;
            counts.surface += c.surface;
            counts.surface_empty += c.surface_empty;
        }
        let map = self.point_map();
        counts.active_vertices = (0..self.vertex_count())
            .filter(|&v| (0..self.layer_count()).any(|l| map.point_count(v, l) > 0))
            .count();
        counts
    }

    /// Profile kinds in one layer.
    pub fn layer_profile_counts(&self, layer: usize) -> ProfileCounts {
        let mut counts = ProfileCounts::default();
        for pp in &self.profiles {
            match pp[layer].profile_type() {
                ProfileType::Empty => counts.empty += 1,
                ProfileType::Thin => counts.thin += 1,
                ProfileType::Constant => counts.constant += 1,
                ProfileType::NPoint => counts.npoint += 1,
                ProfileType::Surface => counts.surface += 1,
                ProfileType::SurfaceEmpty => counts.surface_empty += 1,
            }
        }
        let map = self.point_map();
        counts.active_vertices = (0..self.vertex_count())
            .filter(|&v| map.point_count(v, layer) > 0)
            .count();
        counts
    }

    // ------------------------------------------------------------------
    // Path integrals
    // ------------------------------------------------------------------

    /// Integral of `attr` along a ray given as unit vectors and radii.
    ///
    /// Each segment contributes its chord length times the value at its
    /// midpoint, taken in `layers[i - 1]` when layers are given. With no
    /// attribute the path length is returned.
    pub fn path_integral(
        &self,
        attr: Option<usize>,
        points: &[Vec3],
        radii: &[f64],
        layers: Option<&[usize]>,
        horizontal: InterpolatorType,
        radial: InterpolatorType,
    ) -> Result<f64> {
        check_path(points, radii, layers)?;
        let Some(attr) = attr else {
            return Ok(points
                .windows(2)
                .zip(radii.windows(2))
                .map(|(v, r)| geometry::distance_3d(&v[0], r[0], &v[1], r[1]))
                .sum());
        };

        let mut pos = self.path_position(horizontal, radial)?;
        let mut integral = 0.0;
        for i in 1..points.len() {
            let (mid, r, dkm) = segment(points, radii, i);
            pos.set(layers.map(|l| l[i - 1]), &mid, r)?;
            integral += dkm * pos.value(attr);
        }
        Ok(integral)
    }

    /// Replace `weights` with the point weights of a ray: the sum over
    /// segments of chord length times interpolation coefficient. Returns
    /// false when some contributing node is not active.
    pub fn path_weights(
        &self,
        points: &[Vec3],
        radii: &[f64],
        layers: Option<&[usize]>,
        horizontal: InterpolatorType,
        radial: InterpolatorType,
        weights: &mut HashMap<usize, f64>,
    ) -> Result<bool> {
        check_path(points, radii, layers)?;
        weights.clear();
        let mut pos = self.path_position(horizontal, radial)?;
        let mut all_active = true;
        for i in 1..points.len() {
            let (mid, r, dkm) = segment(points, radii, i);
            pos.set(layers.map(|l| l[i - 1]), &mid, r)?;
            all_active &= pos.weights(dkm, weights)?;
        }
        Ok(all_active)
    }

    /// Weights of a great-circle path across a surface model, sampled every
    /// `spacing` radians at `earth_radius` km (the earth shape radius when
    /// `None`).
    pub fn surface_path_weights(
        &self,
        from: &Vec3,
        to: &Vec3,
        spacing: f64,
        earth_radius: Option<f64>,
        horizontal: InterpolatorType,
        weights: &mut HashMap<usize, f64>,
    ) -> Result<bool> {
        if !self.is_2d() {
            return Err(GeoTessError::invalid_argument(
                "surface path weights need a 2-D model",
            ));
        }
        if !(spacing > 0.0) {
            return Err(GeoTessError::invalid_argument("point spacing must be positive"));
        }
        weights.clear();
        let distance = geometry::angle(from, to);
        let intervals = (distance / spacing).ceil() as usize;
        if intervals == 0 {
            return Ok(true);
        }

        let mut axis = geometry::cross(from, to);
        geometry::normalize(&mut axis);
        let delta = distance / intervals as f64;
        let mut pos = self.path_position(horizontal, InterpolatorType::Linear)?;
        let mut all_active = true;
        for i in 0..intervals {
            let mut u = geometry::rotate(from, &axis, (i as f64 + 0.5) * delta);
            geometry::normalize(&mut u);
            let r = match earth_radius {
                Some(r) if r > 0.0 => r,
                _ => self.earth_shape().earth_radius(&u),
            };
            pos.set(Some(0), &u, r)?;
            all_active &= pos.weights(delta * r, weights)?;
        }
        Ok(all_active)
    }

    /// Evaluate a path integral from precomputed weights. With no attribute
    /// the weights are summed, giving the path length.
    pub fn path_integral_from_weights(
        &self,
        attr: Option<usize>,
        weights: &HashMap<usize, f64>,
    ) -> f64 {
        match attr {
            None => weights.values().sum(),
            Some(attr) => weights
                .iter()
                .map(|(&p, &w)| w * self.point_value(p, attr))
                .sum(),
        }
    }

    fn path_position(
        &self,
        horizontal: InterpolatorType,
        radial: InterpolatorType,
    ) -> Result<Position<'_>> {
        let mut pos = Position::new(self, horizontal, radial)?;
        pos.set_radius_out_of_range_allowed(true);
        Ok(pos)
    }

    // ------------------------------------------------------------------
    // Gradients
    // ------------------------------------------------------------------

    /// Compute and store node gradients of `attr` in `layers` with a 10 km
    /// tetrahedron.
    pub fn compute_gradients(&mut self, attr: usize, reciprocal: bool, layers: &[usize]) -> Result<()> {
        self.compute_gradients_with(&GradientCalculator::default(), attr, reciprocal, layers)
    }

    /// Compute and store node gradients with a caller-configured calculator.
    pub fn compute_gradients_with(
        &mut self,
        calculator: &GradientCalculator,
        attr: usize,
        reciprocal: bool,
        layers: &[usize],
    ) -> Result<()> {
        if self.is_2d() {
            return Err(GeoTessError::invalid_argument(
                "gradients are not defined for 2-D models",
            ));
        }
        if attr >= self.attribute_count() {
            return Err(GeoTessError::invalid_argument(format!(
                "attribute {} out of range, model has {} attributes",
                attr,
                self.attribute_count()
            )));
        }
        if let Some(&layer) = layers.iter().find(|&&l| l >= self.layer_count()) {
            return Err(GeoTessError::invalid_argument(format!(
                "layer {} out of range, model has {} layers",
                layer,
                self.layer_count()
            )));
        }

        let start = std::time::Instant::now();
        for &layer in layers {
            let model: &Model = self;
            let nodes = (0..model.vertex_count())
                .into_par_iter()
                .map_init(
                    || {
                        let mut pos = Position::with_types(
                            model,
                            InterpolatorType::Linear,
                            InterpolatorType::Linear,
                        );
                        pos.set_radius_out_of_range_allowed(true);
                        pos
                    },
                    |pos, vertex| {
                        calculator.profile_gradients(
                            pos,
                            model.grid.vertex(vertex),
                            &model.profiles[vertex][layer],
                            layer,
                            attr,
                            reciprocal,
                        )
                    },
                )
                .collect::<Result<Vec<_>>>()?;
            self.gradients
                .insert((layer, attr), LayerGradients { reciprocal, nodes });
        }
        info!(
            attribute = attr,
            reciprocal,
            layers = layers.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Gradients computed"
        );
        Ok(())
    }

    /// Whether gradients of `attr` with the given reciprocal flag are stored for `layer`.
    pub fn has_gradients(&self, layer: usize, attr: usize, reciprocal: bool) -> bool {
        matches!(self.gradients.get(&(layer, attr)), Some(g) if g.reciprocal == reciprocal)
    }

    /// Stored node gradients `[vertex][node]` of `attr` in `layer`.
    pub fn layer_gradients(
        &self,
        layer: usize,
        attr: usize,
        reciprocal: bool,
    ) -> Result<&[Vec<Vec3>]> {
        match self.gradients.get(&(layer, attr)) {
            Some(g) if g.reciprocal == reciprocal => Ok(&g.nodes),
            _ => Err(GeoTessError::GradientsNotComputed {
                attribute: attr,
                layer,
            }),
        }
    }

    /// Stored gradient at one node.
    pub fn node_gradient(
        &self,
        vertex: usize,
        layer: usize,
        node: usize,
        attr: usize,
        reciprocal: bool,
    ) -> Result<Vec3> {
        self.layer_gradients(layer, attr, reciprocal)?
            .get(vertex)
            .and_then(|nodes| nodes.get(node))
            .copied()
            .ok_or_else(|| {
                GeoTessError::invalid_argument(format!(
                    "no gradient at vertex {} layer {} node {}",
                    vertex, layer, node
                ))
            })
    }

    /// Stored gradient at an active point.
    pub fn point_gradient(&self, point: usize, attr: usize, reciprocal: bool) -> Result<Vec3> {
        let (v, l, n) = self.point_map().point_indices(point);
        self.node_gradient(v, l, n, attr, reciprocal)
    }
}

fn check_path(points: &[Vec3], radii: &[f64], layers: Option<&[usize]>) -> Result<()> {
    if points.len() != radii.len() {
        return Err(GeoTessError::invalid_argument(format!(
            "path has {} points but {} radii",
            points.len(),
            radii.len()
        )));
    }
    if let Some(layers) = layers {
        if layers.len() + 1 < points.len() {
            return Err(GeoTessError::invalid_argument(format!(
                "path has {} segments but {} layer ids",
                points.len().saturating_sub(1),
                layers.len()
            )));
        }
    }
    Ok(())
}

/// Midpoint direction, midpoint radius and chord length of segment `i - 1 .. i`.
fn segment(points: &[Vec3], radii: &[f64], i: usize) -> (Vec3, f64, f64) {
    let (v1, v2) = (&points[i - 1], &points[i]);
    let (r1, r2) = (radii[i - 1], radii[i]);
    let mut mid = geometry::add(v1, v2);
    geometry::normalize(&mut mid);
    (mid, (r1 + r2) / 2.0, geometry::distance_3d(v1, r1, v2, r2))
}

fn check_profile(
    metadata: &MetaData,
    validator: Option<&ProfileValidator>,
    vertex_count: usize,
    vertex: usize,
    layer: usize,
    profile: &Profile,
) -> Result<()> {
    if vertex >= vertex_count || layer >= metadata.layer_count() {
        return Err(GeoTessError::invalid_argument(format!(
            "profile index (vertex {}, layer {}) out of range ({} vertices, {} layers)",
            vertex,
            layer,
            vertex_count,
            metadata.layer_count()
        )));
    }

    if !profile.is_surface() && profile.radius_bottom() > profile.radius_top() {
        return Err(GeoTessError::illegal_profile(format!(
            "bottom radius {} above top radius {}",
            profile.radius_bottom(),
            profile.radius_top()
        )));
    }
    if let Profile::NPoint { radii, data, .. } = profile {
        if radii.len() < 2 || radii.len() != data.len() || radii.windows(2).any(|w| w[1] < w[0]) {
            return Err(GeoTessError::illegal_profile(format!(
                "npoint profile with {} radii and {} data nodes",
                radii.len(),
                data.len()
            )));
        }
    }

    for data in profile.data() {
        match (metadata.data_type(), data) {
            (crate::data::DataType::Custom, crate::data::Data::Custom(c)) => {
                if Some(c.type_name()) != metadata.custom_type_name() {
                    return Err(GeoTessError::illegal_profile(format!(
                        "custom data {} in a model of {}",
                        c.type_name(),
                        metadata.data_type_name()
                    )));
                }
            }
            (expected, data) => {
                if data.data_type() != expected {
                    return Err(GeoTessError::illegal_profile(format!(
                        "{} data in a model of {}",
                        data.type_name(),
                        metadata.data_type_name()
                    )));
                }
                if data.len() != metadata.attribute_count() {
                    return Err(GeoTessError::attribute_mismatch(format!(
                        "profile carries {} attribute values, model has {} attributes",
                        data.len(),
                        metadata.attribute_count()
                    )));
                }
            }
        }
    }

    if let Some(validate) = validator {
        validate(profile).map_err(GeoTessError::IllegalProfileShape)?;
    }
    Ok(())
}

/// Validating writer over a contiguous range of vertices.
pub struct ProfileWriter<'m> {
    range: Range<usize>,
    profiles: &'m mut [Vec<Profile>],
    metadata: &'m MetaData,
    validator: Option<&'m ProfileValidator>,
    vertex_count: usize,
}

impl<'m> ProfileWriter<'m> {
    /// Vertices this writer may modify.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn metadata(&self) -> &MetaData {
        self.metadata
    }

    /// Validate and store a profile for a vertex in this writer's range.
    pub fn set_profile(&mut self, vertex: usize, layer: usize, profile: Profile) -> Result<()> {
        if !self.range.contains(&vertex) {
            return Err(GeoTessError::invalid_argument(format!(
                "vertex {} outside writer range {:?}",
                vertex, self.range
            )));
        }
        check_profile(
            self.metadata,
            self.validator,
            self.vertex_count,
            vertex,
            layer,
            &profile,
        )?;
        self.profiles[vertex - self.range.start][layer] = profile;
        Ok(())
    }
}

impl PartialEq for Model {
    /// Same grid, same metadata (generation date ignored) and equal profiles.
    fn eq(&self, other: &Self) -> bool {
        self.grid.grid_id() == other.grid.grid_id()
            && self.metadata == other.metadata
            && self.profiles == other.profiles
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.metadata)?;
        writeln!(f)?;
        writeln!(
            f,
            "Layer  active    points   npoint constant     thin    empty  surface  surface_empty"
        )?;
        let map = self.point_map();
        for layer in (0..self.layer_count()).rev() {
            let c = self.layer_profile_counts(layer);
            let points: usize = (0..self.vertex_count()).map(|v| map.point_count(v, layer)).sum();
            writeln!(
                f,
                "{:5} {:7} {:9} {:8} {:8} {:8} {:8} {:8} {:14}",
                layer,
                c.active_vertices,
                points,
                c.npoint,
                c.constant,
                c.thin,
                c.empty,
                c.surface,
                c.surface_empty
            )?;
        }
        let c = self.profile_counts();
        writeln!(
            f,
            "Total {:7} {:9} {:8} {:8} {:8} {:8} {:8} {:14}",
            c.active_vertices,
            map.size(),
            c.npoint,
            c.constant,
            c.thin,
            c.empty,
            c.surface,
            c.surface_empty
        )?;
        write!(
            f,
            "Grid {}: {} tessellations, {} vertices, {} triangles",
            self.grid.grid_id(),
            self.grid.tessellation_count(),
            self.grid.vertex_count(),
            self.grid.triangle_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Data, DataType};
    use crate::grid::GridBuilder;
    use crate::testdata;

    fn metadata() -> MetaData {
        let mut md = MetaData::new();
        md.set_description("unit test model");
        md.set_attributes(&["vp", "vs"], &["km/s", "km/s"]).unwrap();
        md.set_layer_names(&["mantle", "crust"]).unwrap();
        md.set_layer_tess_ids(vec![0, 0]).unwrap();
        md.set_data_type(DataType::Float);
        md.set_earth_shape(EarthShape::Sphere);
        md.stamp_provenance();
        md
    }

    #[test]
    fn test_new_model_is_empty() {
        let grid = Arc::new(GridBuilder::icosahedral(2).unwrap());
        let model = Model::new(grid, metadata()).unwrap();
        assert_eq!(model.vertex_count(), 42);
        assert_eq!(model.layer_count(), 2);
        assert_eq!(model.profile(0, 0).profile_type(), ProfileType::Empty);
        assert_eq!(model.point_count(), 0);
        assert!(model.is_3d());
    }

    #[test]
    fn test_new_rejects_missing_tessellation() {
        let grid = Arc::new(GridBuilder::icosahedral(2).unwrap());
        let mut md = metadata();
        md.set_layer_tess_ids(vec![0, 1]).unwrap();
        assert!(matches!(
            Model::new(grid, md),
            Err(GeoTessError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_set_profile_checks() {
        let grid = Arc::new(GridBuilder::icosahedral(1).unwrap());
        let mut model = Model::new(grid, metadata()).unwrap();

        let good = Profile::constant(6000.0, 6371.0, Data::F32(vec![6.0, 3.5])).unwrap();
        model.set_profile(3, 1, good.clone()).unwrap();
        assert_eq!(model.profile(3, 1), &good);

        let wrong_kind = Profile::constant(6000.0, 6371.0, Data::F64(vec![6.0, 3.5])).unwrap();
        assert!(matches!(
            model.set_profile(3, 1, wrong_kind),
            Err(GeoTessError::IllegalProfileShape(_))
        ));

        let wrong_count = Profile::thin(6000.0, Data::F32(vec![6.0]));
        assert!(matches!(
            model.set_profile(3, 1, wrong_count),
            Err(GeoTessError::AttributeMismatch(_))
        ));

        assert!(matches!(
            model.set_profile(99, 0, good.clone()),
            Err(GeoTessError::InvalidArgument(_))
        ));

        let inverted = Profile::Empty {
            radius_bottom: 10.0,
            radius_top: 5.0,
        };
        assert!(matches!(
            model.set_profile(0, 0, inverted),
            Err(GeoTessError::IllegalProfileShape(_))
        ));
    }

    #[test]
    fn test_profile_validator() {
        let grid = Arc::new(GridBuilder::icosahedral(1).unwrap());
        let mut model = Model::new(grid, metadata()).unwrap();
        model.set_profile_validator(Arc::new(|p: &Profile| {
            if p.profile_type() == ProfileType::Thin {
                Err("thin profiles are not allowed".to_string())
            } else {
                Ok(())
            }
        }));
        let thin = Profile::thin(6000.0, Data::F32(vec![1.0, 2.0]));
        let err = model.set_profile(0, 0, thin).unwrap_err();
        assert!(err.to_string().contains("thin profiles are not allowed"));
    }

    #[test]
    fn test_copy_shares_grid() {
        let model = testdata::crust_model();
        let mut copy = model.copy();
        assert_eq!(copy, model);
        assert!(Arc::ptr_eq(&copy.shared_grid(), &model.shared_grid()));
        copy.set_value(0, 0, 0, 0, 99.0).unwrap();
        assert_ne!(copy, model);
    }

    #[test]
    fn test_point_accessors() {
        let model = testdata::crust_model();
        let map = model.point_map();
        assert_eq!(map.size(), model.point_count());
        let p = map.point_index(5, 0, 1).unwrap();
        assert_eq!(model.point_radius(p), model.radius(5, 0, 1));
        assert_eq!(model.point_value(p, 0), model.value(5, 0, 1, 0));
        assert_eq!(model.point_unit_vector(p), model.grid().vertex(5));
        let depth = model.earth_shape().earth_radius(model.grid().vertex(5)) - model.radius(5, 0, 1);
        assert!((model.point_depth(p) - depth).abs() < 1e-9);
    }

    #[test]
    fn test_set_point_value() {
        let mut model = testdata::crust_model();
        let p = model.point_map().point_index(2, 1, 0).unwrap();
        model.set_point_value(p, 0, 7.25).unwrap();
        assert_eq!(model.value(2, 1, 0, 0), 7.25);
        assert!(model.set_point_value(usize::MAX, 0, 1.0).is_err());
    }

    #[test]
    fn test_active_region() {
        let mut model = testdata::crust_model();
        let total = model.point_count();
        let cap = Polygon::small_circle(&[0.0, 0.0, 1.0], 30f64.to_radians(), 36).unwrap();
        model.set_active_region(Some(&cap));
        let inside = model.point_count();
        assert!(inside > 0 && inside < total);
        for p in 0..inside {
            assert!(cap.contains(model.point_unit_vector(p)));
        }
        model.set_active_region(None);
        assert_eq!(model.point_count(), total);
    }

    #[test]
    fn test_find_closest_point() {
        let model = testdata::crust_model();
        let u = *model.grid().vertex(9);
        let r = model.radius(9, 0, 2);
        let p = model.find_closest_point(&u, r, Some(0)).unwrap().unwrap();
        assert_eq!(model.point_map().point_indices(p), (9, 0, 2));
    }

    #[test]
    fn test_integrity_repairs_small_gaps() {
        let mut model = testdata::crust_model();
        assert_eq!(model.test_model_integrity().unwrap(), 0);

        let data = model.profile(4, 1).data()[0].clone();
        model
            .set_profile(4, 1, Profile::constant(6000.005, 6371.0, data.clone()).unwrap())
            .unwrap();
        assert_eq!(model.test_model_integrity().unwrap(), 1);
        assert_eq!(model.profile(4, 0).radius_top(), model.profile(4, 1).radius_bottom());

        model
            .set_profile(4, 1, Profile::constant(6010.0, 6371.0, data).unwrap())
            .unwrap();
        assert!(matches!(
            model.test_model_integrity(),
            Err(GeoTessError::Integrity(_))
        ));
    }

    #[test]
    fn test_integrity_rejects_mixed_surface() {
        let grid = Arc::new(GridBuilder::icosahedral(1).unwrap());
        let mut md = metadata();
        md.set_layer_names(&["surface"]).unwrap();
        md.set_layer_tess_ids(vec![0]).unwrap();
        let mut model = Model::new_surface(grid, md).unwrap();
        assert!(model.is_2d());
        model
            .set_profile(0, 0, Profile::empty(0.0, 1.0).unwrap())
            .unwrap();
        assert!(matches!(
            model.test_model_integrity(),
            Err(GeoTessError::Integrity(_))
        ));
    }

    #[test]
    fn test_profile_counts() {
        let model = testdata::crust_model();
        let counts = model.profile_counts();
        assert_eq!(counts.total(), model.vertex_count() * model.layer_count());
        assert_eq!(counts.npoint, model.vertex_count());
        assert_eq!(counts.constant, model.vertex_count());
        assert_eq!(counts.active_vertices, model.vertex_count());
        let text = model.to_string();
        assert!(text.contains("Total"));
    }

    #[test]
    fn test_path_length() {
        let model = testdata::crust_model();
        let shape = model.earth_shape();
        let a = shape.vector_degrees(0.0, 0.0);
        let b = shape.vector_degrees(0.0, 30.0);
        let points = geometry::great_circle_points(&a, &b, 300);
        let radii = vec![6300.0; points.len()];
        let length = model
            .path_integral(
                None,
                &points,
                &radii,
                None,
                InterpolatorType::Linear,
                InterpolatorType::Linear,
            )
            .unwrap();
        let expected = 30f64.to_radians() * 6300.0;
        assert!((length - expected).abs() < 0.1);

        let mut weights = HashMap::new();
        let complete = model
            .path_weights(
                &points,
                &radii,
                None,
                InterpolatorType::Linear,
                InterpolatorType::Linear,
                &mut weights,
            )
            .unwrap();
        assert!(complete);
        assert!((model.path_integral_from_weights(None, &weights) - length).abs() < 1e-6);
    }

    #[test]
    fn test_path_integral_matches_weights() {
        let model = testdata::crust_model();
        let shape = model.earth_shape();
        let points = geometry::great_circle_points(
            &shape.vector_degrees(-10.0, 20.0),
            &shape.vector_degrees(15.0, 50.0),
            50,
        );
        let radii: Vec<f64> = (0..points.len()).map(|i| 4000.0 + 20.0 * i as f64).collect();
        let integral = model
            .path_integral(
                Some(0),
                &points,
                &radii,
                None,
                InterpolatorType::Linear,
                InterpolatorType::Linear,
            )
            .unwrap();
        let mut weights = HashMap::new();
        model
            .path_weights(
                &points,
                &radii,
                None,
                InterpolatorType::Linear,
                InterpolatorType::Linear,
                &mut weights,
            )
            .unwrap();
        let from_weights = model.path_integral_from_weights(Some(0), &weights);
        assert!((integral - from_weights).abs() < 1e-6 * integral.abs());
    }

    #[test]
    fn test_gradients_require_computation() {
        let mut model = testdata::crust_model();
        let mut pos = model.position(InterpolatorType::Linear, InterpolatorType::Linear).unwrap();
        pos.set(Some(0), &[1.0, 0.0, 0.0], 5000.0).unwrap();
        assert!(matches!(
            pos.gradient(0, false),
            Err(GeoTessError::GradientsNotComputed { attribute: 0, layer: 0 })
        ));

        model.compute_gradients(0, false, &[0]).unwrap();
        assert!(model.has_gradients(0, 0, false));
        assert!(!model.has_gradients(0, 0, true));
        let mut pos = model.position(InterpolatorType::Linear, InterpolatorType::Linear).unwrap();
        pos.set(Some(0), &[1.0, 0.0, 0.0], 5000.0).unwrap();
        let g = pos.gradient(0, false).unwrap();
        assert!(g.iter().all(|x| x.is_finite()));
        assert!(pos.gradient(0, true).is_err());
        assert!(model.node_gradient(0, 0, 0, 0, false).is_ok());
    }
}
