//! GeoTess command-line tool.
//!
//! Builds icosahedral grids, and inspects, converts, queries and populates
//! models. Model files holding grid-node data are handled transparently.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "geotess-tool")]
#[command(about = "Build, inspect, convert, query and populate tessellated earth models")]
struct Cli {
    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info", env = "GEOTESS_LOG_LEVEL", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an icosahedral grid and write it to a grid file
    BuildGrid {
        /// Levels per tessellation; repeat for several tessellations
        #[arg(short, long, required = true, num_args = 1..)]
        levels: Vec<usize>,

        /// Output grid file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the metadata and profile counts of a model, or a grid summary
    Info {
        file: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Rewrite a model in another format (`.ascii` selects text)
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Reference this grid file instead of embedding the grid
        #[arg(long)]
        grid_file: Option<String>,
    },

    /// Interpolate attribute values at a point
    Query {
        model: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long, default_value = "0")]
        depth: f64,

        /// Attribute name; all attributes when omitted
        #[arg(short, long)]
        attribute: Option<String>,

        /// Horizontal interpolation (linear, natural_neighbor)
        #[arg(long, env = "GEOTESS_HORIZONTAL_INTERPOLATION")]
        horizontal: Option<String>,

        /// Radial interpolation (linear, cubic_spline)
        #[arg(long, env = "GEOTESS_RADIAL_INTERPOLATION")]
        radial: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Populate a grid-node model with the uniform-velocity predictor
    Populate {
        /// Population config (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Output model file
        #[arg(short, long)]
        output: PathBuf,

        /// Worker threads; defaults to the available parallelism
        #[arg(short, long)]
        workers: Option<usize>,

        /// P velocity in km/s
        #[arg(long, default_value = "8.0")]
        p_velocity: f64,

        /// S velocity in km/s
        #[arg(long, default_value = "4.5")]
        s_velocity: f64,

        /// Largest predicted distance in degrees
        #[arg(long, default_value = "100.0")]
        max_distance: f64,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = geotess::GeoTessConfig::from_env();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        horizontal = %config.horizontal_interpolation,
        radial = %config.radial_interpolation,
        grid_reuse = config.grid_reuse,
        "Loaded configuration"
    );

    match cli.command {
        Command::BuildGrid { levels, output } => commands::build_grid(&levels, &output),
        Command::Info { file, json } => commands::info(&file, json, &config),
        Command::Convert {
            input,
            output,
            grid_file,
        } => commands::convert(&input, &output, grid_file.as_deref(), &config),
        Command::Query {
            model,
            lat,
            lon,
            depth,
            attribute,
            horizontal,
            radial,
            json,
        } => {
            let mut config = config;
            if let Some(h) = horizontal {
                config.horizontal_interpolation = geotess::InterpolatorType::from_str(&h);
            }
            if let Some(r) = radial {
                config.radial_interpolation = geotess::InterpolatorType::from_str(&r);
            }
            config.validate().map_err(anyhow::Error::msg)?;
            commands::query(
                &model,
                commands::QueryPoint { lat, lon, depth },
                attribute.as_deref(),
                json,
                &config,
            )
        }
        Command::Populate {
            config: population,
            output,
            workers,
            p_velocity,
            s_velocity,
            max_distance,
        } => {
            let workers = workers
                .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
                .unwrap_or(1);
            commands::populate(
                &population,
                &output,
                workers,
                populator::UniformVelocityService::new(p_velocity, s_velocity, max_distance),
            )
        }
    }
}
