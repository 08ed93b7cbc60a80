//! Parallel population of grid-node models.

use crate::config::PopulationConfig;
use crate::generator::GridNodeGenerator;
use crate::node_data::{GridNodeData, TYPE_NAME};
use crate::prediction::PredictionService;
use geotess::{
    Data, EarthShape, GeoTessError, Grid, MetaData, Model, Profile, ProfileWriter, Result,
};
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Attribute name of populated models.
pub const ATTRIBUTE_NAME: &str = "gridNodeData";

/// Split `n` vertices into `k` contiguous ranges whose sizes differ by at
/// most one. The first `n % k` ranges get the extra vertex.
pub fn partition(n: usize, k: usize) -> Vec<Range<usize>> {
    if k == 0 {
        return Vec::new();
    }
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Fills a one-layer model of [`GridNodeData`] using one prediction-service
/// handle per worker thread.
#[derive(Debug)]
pub struct ParallelPopulator {
    config: PopulationConfig,
    grid: Arc<Grid>,
}

impl ParallelPopulator {
    /// Validate the configuration and resolve its grid.
    pub fn new(config: PopulationConfig) -> Result<Self> {
        config.validate()?;
        let grid = config.resolve_grid()?;
        Ok(Self { config, grid })
    }

    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    /// Metadata of the populated model: one layer on the grid's last
    /// tessellation, holding custom grid-node data.
    pub fn metadata(&self) -> Result<MetaData> {
        let mut metadata = MetaData::new();
        metadata.set_description(format!(
            "grid-node predictions for {} stations and {} phases\n\
             travel time model {}, magnitude model {}",
            self.config.stations.len(),
            self.config.phases.len(),
            self.config.travel_time_model,
            self.config.magnitude_model
        ));
        metadata.set_attributes(&[ATTRIBUTE_NAME], &[ATTRIBUTE_NAME])?;
        metadata.set_layer_names(&[self.config.layer_name.as_str()])?;
        metadata.set_layer_tess_ids(vec![self.grid.tessellation_count().saturating_sub(1)])?;
        metadata.set_custom_data_type(TYPE_NAME);
        metadata.set_earth_shape(self.config.earth_shape);
        metadata.stamp_provenance();
        Ok(metadata)
    }

    /// Populate every vertex of the grid.
    ///
    /// Runs `min(services.len(), vertices)` workers; unused handles are
    /// dropped untouched. Each worker releases its handle when it finishes.
    /// The first failure by worker index is returned after all workers have
    /// stopped.
    pub fn populate<S: PredictionService + Send>(&self, services: Vec<S>) -> Result<Model> {
        if services.is_empty() {
            return Err(GeoTessError::invalid_argument(
                "population needs at least one prediction service",
            ));
        }

        let start = Instant::now();
        let vertex_count = self.grid.vertex_count();
        let workers = services.len().min(vertex_count);
        let ranges = partition(vertex_count, workers);

        info!(
            grid_id = %self.grid.grid_id(),
            vertices = vertex_count,
            workers = workers,
            stations = self.config.stations.len(),
            phases = self.config.phases.len(),
            "Starting population"
        );

        let mut model = Model::new(Arc::clone(&self.grid), self.metadata()?)?;
        let writers = model.profile_writers(&ranges)?;

        let job = Job {
            generator: GridNodeGenerator::from_config(&self.config),
            grid: &self.grid,
            earth_shape: self.config.earth_shape,
            center_depth_km: self.config.center_depth_km,
        };
        let job = &job;

        let results: Vec<Result<usize>> = std::thread::scope(|scope| {
            let handles: Vec<_> = writers
                .into_iter()
                .zip(services)
                .enumerate()
                .map(|(worker, (writer, service))| {
                    scope.spawn(move || job.run(worker, writer, service))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(worker, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(GeoTessError::population_failed(format!(
                            "worker {} panicked",
                            worker
                        )))
                    })
                })
                .collect()
        });

        let mut first_error = None;
        let mut empty = 0;
        for (worker, result) in results.into_iter().enumerate() {
            match result {
                Ok(count) => empty += count,
                Err(e) => {
                    error!(worker = worker, range = ?ranges[worker], error = %e, "Population worker failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        if empty == vertex_count {
            return Err(GeoTessError::population_failed(
                "grid-node data could not be computed for any vertex",
            ));
        }

        info!(
            vertices = vertex_count,
            empty = empty,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Population complete"
        );
        Ok(model)
    }
}

/// Shared, read-only inputs of the workers.
struct Job<'a> {
    generator: GridNodeGenerator,
    grid: &'a Grid,
    earth_shape: EarthShape,
    center_depth_km: f64,
}

impl Job<'_> {
    /// Fill one writer's range and release the service. Returns the number
    /// of vertices left with the empty sentinel.
    fn run<S: PredictionService>(
        &self,
        worker: usize,
        mut writer: ProfileWriter<'_>,
        mut service: S,
    ) -> Result<usize> {
        let range = writer.range();
        debug!(worker = worker, range = ?range, "Population worker started");
        let result = self.fill(&mut writer, &mut service);
        service.release();
        if let Ok(empty) = result {
            debug!(worker = worker, range = ?range, empty = empty, "Population worker finished");
        }
        result
    }

    fn fill<S: PredictionService>(&self, writer: &mut ProfileWriter<'_>, service: &mut S) -> Result<usize> {
        let grid_id = self.grid.grid_id();
        let mut empty = 0;
        for vertex in writer.range() {
            let u = self.grid.vertex(vertex);
            let data = match self.generator.generate(service, grid_id, vertex, u)? {
                Some(node) => GridNodeData::new(node),
                None => {
                    empty += 1;
                    GridNodeData::empty()
                }
            };
            let radius = self.earth_shape.earth_radius(u) - self.center_depth_km;
            writer.set_profile(vertex, 0, Profile::thin(radius as f32, Data::Custom(Arc::new(data))))?;
        }
        Ok(empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_sizes() {
        let ranges = partition(10, 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
        assert_eq!(partition(12, 1), vec![0..12]);
        assert_eq!(partition(3, 3), vec![0..1, 1..2, 2..3]);
        assert!(partition(5, 0).is_empty());
    }

    #[test]
    fn test_partition_covers_every_vertex() {
        for n in [1, 7, 12, 42, 162] {
            for k in 1..=8usize.min(n) {
                let ranges = partition(n, k);
                assert_eq!(ranges.len(), k);
                assert_eq!(ranges[0].start, 0);
                assert_eq!(ranges[k - 1].end, n);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                    assert!(pair[0].len() >= pair[1].len());
                    assert!(pair[0].len() - pair[1].len() <= 1);
                }
            }
        }
    }

    #[test]
    fn test_new_rejects_incomplete_config() {
        let err = ParallelPopulator::new(PopulationConfig::default()).unwrap_err();
        match err {
            GeoTessError::InvalidArgument(msg) => {
                assert!(msg.contains("stations not set"));
                assert!(msg.contains("minimum_magnitude not set"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
