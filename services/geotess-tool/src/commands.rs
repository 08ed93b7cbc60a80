//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use geotess::{GeoTessConfig, GeoTessError, Grid, GridBuilder, Model, Position};
use populator::{codec_registry, ParallelPopulator, PopulationConfig, UniformVelocityService};
use serde_json::json;
use std::path::Path;
use std::time::Instant;
use tracing::info;

pub struct QueryPoint {
    pub lat: f64,
    pub lon: f64,
    pub depth: f64,
}

pub fn build_grid(levels: &[usize], output: &Path) -> Result<()> {
    let start = Instant::now();
    let grid = levels
        .iter()
        .fold(GridBuilder::new(), |builder, &n| builder.tessellation(n))
        .build()?;
    grid.write(output)
        .with_context(|| format!("writing grid to {}", output.display()))?;
    info!(
        grid_id = %grid.grid_id(),
        vertices = grid.vertex_count(),
        triangles = grid.triangle_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        output = %output.display(),
        "Grid written"
    );
    println!("{}", grid.grid_id());
    Ok(())
}

/// Load a model, decoding grid-node data when present.
fn load_model(path: &Path, config: &GeoTessConfig) -> geotess::Result<Model> {
    Model::load_with(path, &codec_registry(), config)
}

pub fn info(file: &Path, json: bool, config: &GeoTessConfig) -> Result<()> {
    match load_model(file, config) {
        Ok(model) => print_model(&model, json),
        Err(GeoTessError::MalformedModel(_)) => {
            let grid = Grid::load(file)
                .with_context(|| format!("{} is neither a model nor a grid", file.display()))?;
            print_grid(&grid, json)
        }
        Err(e) => Err(e).with_context(|| format!("loading {}", file.display())),
    }
}

fn print_model(model: &Model, json: bool) -> Result<()> {
    if json {
        let metadata = model.metadata();
        let summary = json!({
            "description": metadata.description(),
            "data_type": metadata.data_type_name(),
            "earth_shape": metadata.earth_shape().as_str(),
            "attributes": metadata.attribute_names(),
            "units": metadata.attribute_units(),
            "layers": metadata.layer_names(),
            "layer_tessellations": metadata.layer_tess_ids(),
            "grid_id": model.grid().grid_id(),
            "vertices": model.vertex_count(),
            "points": model.point_count(),
            "profiles": serde_json::to_value(model.profile_counts())?,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", model);
    }
    Ok(())
}

fn print_grid(grid: &Grid, json: bool) -> Result<()> {
    let levels: Vec<usize> = (0..grid.tessellation_count())
        .map(|t| grid.level_count(t))
        .collect();
    if json {
        let summary = json!({
            "grid_id": grid.grid_id(),
            "software_version": grid.software_version(),
            "generation_date": grid.generation_date(),
            "vertices": grid.vertex_count(),
            "triangles": grid.triangle_count(),
            "tessellation_levels": levels,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Grid id: {}", grid.grid_id());
        println!("Software version: {}", grid.software_version());
        println!("Generation date: {}", grid.generation_date());
        println!("Vertices: {}", grid.vertex_count());
        println!("Triangles: {}", grid.triangle_count());
        for (t, n) in levels.iter().enumerate() {
            println!("Tessellation {}: {} levels", t, n);
        }
    }
    Ok(())
}

pub fn convert(
    input: &Path,
    output: &Path,
    grid_file: Option<&str>,
    config: &GeoTessConfig,
) -> Result<()> {
    let model =
        load_model(input, config).with_context(|| format!("loading {}", input.display()))?;
    model
        .write_with(output, grid_file, &codec_registry())
        .with_context(|| format!("writing {}", output.display()))?;
    info!(
        input = %input.display(),
        output = %output.display(),
        grid_file = ?grid_file,
        "Model converted"
    );
    Ok(())
}

pub fn query(
    path: &Path,
    point: QueryPoint,
    attribute: Option<&str>,
    json: bool,
    config: &GeoTessConfig,
) -> Result<()> {
    let model = load_model(path, config).with_context(|| format!("loading {}", path.display()))?;
    let metadata = model.metadata();
    let attributes: Vec<usize> = match attribute {
        Some(name) => match metadata.attribute_index(name) {
            Some(i) => vec![i],
            None => bail!(
                "no attribute {} in model, available: {}",
                name,
                metadata.attribute_names_string()
            ),
        },
        None => (0..metadata.attribute_count()).collect(),
    };

    let mut position = Position::from_config(&model, config)?;
    position.set_lat_lon_depth(point.lat, point.lon, point.depth)?;
    let layer = position.layer_id();
    let values: Vec<(String, f64)> = attributes
        .iter()
        .map(|&a| {
            let name = metadata.attribute_name(a).unwrap_or_default().to_string();
            (name, position.value(a))
        })
        .collect();

    if json {
        let summary = json!({
            "lat": point.lat,
            "lon": point.lon,
            "depth": point.depth,
            "layer": metadata.layer_name(layer),
            "values": values.iter().map(|(n, v)| json!({ "attribute": n, "value": v })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "lat {} lon {} depth {} (layer {})",
            point.lat,
            point.lon,
            point.depth,
            metadata.layer_name(layer).unwrap_or("?")
        );
        for (name, value) in &values {
            println!("  {:<16} {}", name, value);
        }
    }
    Ok(())
}

pub fn populate(
    config_path: &Path,
    output: &Path,
    workers: usize,
    mut service: UniformVelocityService,
) -> Result<()> {
    let config = PopulationConfig::from_file(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    service.earth_shape = config.earth_shape;

    let populator = ParallelPopulator::new(config)?;
    let services = vec![service; workers.max(1)];
    let model = populator.populate(services)?;
    model
        .write_with(output, None, &codec_registry())
        .with_context(|| format!("writing {}", output.display()))?;

    let counts = model.profile_counts();
    info!(
        output = %output.display(),
        vertices = model.vertex_count(),
        active = counts.active_vertices,
        "Populated model written"
    );
    Ok(())
}
