//! Dense numbering of the active nodes of a model.
//!
//! Every node `(vertex, layer, node)` inside the active region receives a
//! point index, assigned vertex by vertex, then layer by layer from the
//! bottom, then node by node from the bottom of each profile. Nodes outside
//! the region have no point index.

use crate::geometry::EarthShape;
use crate::grid::Grid;
use crate::polygon::Polygon;
use crate::profile::Profile;

/// Radius tolerance in km for 3-D region membership.
const RADIUS_TOLERANCE: f64 = 1e-4;

/// Bidirectional map between point indices and `(vertex, layer, node)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointMap {
    /// `(vertex, layer, node)` of every point.
    points: Vec<[usize; 3]>,
    /// Offset of each `(vertex, layer)` profile into `slots`.
    offsets: Vec<usize>,
    /// Point index of every node of every profile, `None` when inactive.
    slots: Vec<Option<usize>>,
    layer_count: usize,
    /// True when no region restricts the map.
    global: bool,
}

impl PointMap {
    /// Number every node of `profiles` (`[vertex][layer]`) that lies in `region`.
    pub fn build(
        grid: &Grid,
        profiles: &[Vec<Profile>],
        region: Option<&Polygon>,
        shape: EarthShape,
    ) -> Self {
        let layer_count = profiles.first().map(Vec::len).unwrap_or(0);
        let mut map = Self {
            layer_count,
            global: region.is_none(),
            ..Default::default()
        };

        let mut offset = 0;
        for pp in profiles {
            for p in pp {
                map.offsets.push(offset);
                offset += p.data_count();
            }
        }
        map.slots = vec![None; offset];

        for (vertex, pp) in profiles.iter().enumerate() {
            let u = grid.vertex(vertex);
            match region {
                None => {
                    for layer in 0..pp.len() {
                        map.add_nodes(vertex, layer, &pp[layer], |_| true);
                    }
                }
                Some(polygon) if !polygon.contains(u) => {}
                Some(polygon) => match (polygon.bottom(), polygon.top()) {
                    (Some(bottom), Some(top)) => {
                        let radii = layer_radii(pp);
                        let r_bottom = bottom.radius(u, &radii, shape);
                        let r_top = top.radius(u, &radii, shape);
                        let first = bottom.layer_index().unwrap_or(0);
                        let last = top
                            .layer_index()
                            .unwrap_or(pp.len().saturating_sub(1))
                            .min(pp.len().saturating_sub(1));
                        for layer in first..=last {
                            map.add_nodes(vertex, layer, &pp[layer], |r| {
                                r > r_bottom - RADIUS_TOLERANCE && r < r_top + RADIUS_TOLERANCE
                            });
                        }
                    }
                    _ => {
                        for layer in 0..pp.len() {
                            map.add_nodes(vertex, layer, &pp[layer], |_| true);
                        }
                    }
                },
            }
        }
        map
    }

    fn add_nodes(
        &mut self,
        vertex: usize,
        layer: usize,
        profile: &Profile,
        include: impl Fn(f64) -> bool,
    ) {
        let offset = self.offsets[vertex * self.layer_count + layer];
        for node in 0..profile.data_count() {
            if include(profile.radius(node)) {
                self.slots[offset + node] = Some(self.points.len());
                self.points.push([vertex, layer, node]);
            }
        }
    }

    /// Number of active points.
    pub fn size(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether every node of the model is active.
    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn vertex_index(&self, point: usize) -> usize {
        self.points[point][0]
    }

    pub fn layer_index(&self, point: usize) -> usize {
        self.points[point][1]
    }

    pub fn node_index(&self, point: usize) -> usize {
        self.points[point][2]
    }

    /// `(vertex, layer, node)` of `point`.
    pub fn point_indices(&self, point: usize) -> (usize, usize, usize) {
        let [v, l, n] = self.points[point];
        (v, l, n)
    }

    /// Point index of a node, `None` when the node is inactive or does not exist.
    pub fn point_index(&self, vertex: usize, layer: usize, node: usize) -> Option<usize> {
        let (start, end) = self.slot_range(vertex, layer)?;
        if start + node >= end {
            return None;
        }
        self.slots[start + node]
    }

    /// Point index of the lowest active node of a profile.
    pub fn point_index_first(&self, vertex: usize, layer: usize) -> Option<usize> {
        let (start, end) = self.slot_range(vertex, layer)?;
        self.slots[start..end].iter().flatten().next().copied()
    }

    /// Point index of the highest active node of a profile.
    pub fn point_index_last(&self, vertex: usize, layer: usize) -> Option<usize> {
        let (start, end) = self.slot_range(vertex, layer)?;
        self.slots[start..end].iter().flatten().last().copied()
    }

    /// Number of active nodes in a profile.
    pub fn point_count(&self, vertex: usize, layer: usize) -> usize {
        self.slot_range(vertex, layer)
            .map(|(start, end)| self.slots[start..end].iter().flatten().count())
            .unwrap_or(0)
    }

    fn slot_range(&self, vertex: usize, layer: usize) -> Option<(usize, usize)> {
        if layer >= self.layer_count {
            return None;
        }
        let i = vertex * self.layer_count + layer;
        let start = *self.offsets.get(i)?;
        let end = self.offsets.get(i + 1).copied().unwrap_or(self.slots.len());
        Some((start, end))
    }
}

/// Bottom of layer 0 followed by the top of every layer.
pub(crate) fn layer_radii(profiles: &[Profile]) -> Vec<f64> {
    let mut radii = Vec::with_capacity(profiles.len() + 1);
    radii.push(profiles.first().map(Profile::radius_bottom).unwrap_or(f64::NAN));
    radii.extend(profiles.iter().map(Profile::radius_top));
    radii
}
