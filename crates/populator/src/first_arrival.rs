//! Station-to-point index over a populated model.

use crate::node::GridNode;
use crate::node_data::GridNodeData;
use geotess::Model;
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

/// For each station, the model points where it is among the first
/// `num_first_stations` stations to record an arrival.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstArrivalIndex {
    points: BTreeMap<Uuid, BTreeSet<usize>>,
}

impl FirstArrivalIndex {
    /// Rank the stations of every point by their earliest predicted travel
    /// time and keep the first `num_first_stations`. Ties are broken by
    /// station id.
    pub fn build(model: &Model, num_first_stations: usize) -> Self {
        let mut points: BTreeMap<Uuid, BTreeSet<usize>> = BTreeMap::new();
        for point in 0..model.point_count() {
            let Some(node) = point_grid_node(model, point) else {
                continue;
            };
            let mut arrivals: Vec<(f64, Uuid)> = node
                .node_stations
                .iter()
                .filter_map(|ns| ns.first_arrival().map(|p| (p.travel_time_seconds, ns.station_id)))
                .collect();
            arrivals.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            for (_, station_id) in arrivals.into_iter().take(num_first_stations) {
                points.entry(station_id).or_default().insert(point);
            }
        }
        debug!(
            stations = points.len(),
            points = model.point_count(),
            num_first_stations = num_first_stations,
            "Built first-arrival index"
        );
        Self { points }
    }

    /// Points where `station_id` is a first-arriving station.
    pub fn points(&self, station_id: &Uuid) -> Option<&BTreeSet<usize>> {
        self.points.get(station_id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Uuid> {
        self.points.keys()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Grid node stored at a model point, `None` for the empty sentinel or for
/// models that do not hold grid-node data.
pub fn point_grid_node(model: &Model, point: usize) -> Option<&GridNode> {
    let (vertex, layer, node) = model.point_map().point_indices(point);
    model
        .profile(vertex, layer)
        .node_data(node)?
        .custom::<GridNodeData>()?
        .grid_node()
}

/// A populated model with its lazily built first-arrival index.
#[derive(Debug)]
pub struct PopulatedModel {
    model: Model,
    num_first_stations: usize,
    index: OnceCell<FirstArrivalIndex>,
}

impl PopulatedModel {
    pub fn new(model: Model, num_first_stations: usize) -> Self {
        Self {
            model,
            num_first_stations,
            index: OnceCell::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    pub fn num_first_stations(&self) -> usize {
        self.num_first_stations
    }

    /// Built on first use, then shared.
    pub fn first_arrival_index(&self) -> &FirstArrivalIndex {
        self.index
            .get_or_init(|| FirstArrivalIndex::build(&self.model, self.num_first_stations))
    }

    pub fn grid_node(&self, point: usize) -> Option<&GridNode> {
        point_grid_node(&self.model, point)
    }
}
