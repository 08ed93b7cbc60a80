//! Multi-resolution tessellated earth models.
//!
//! This crate stores scalar attributes of the earth on a hierarchy of
//! triangular meshes covering the unit sphere. Each vertex of the mesh carries
//! one radial profile per layer, and queries interpolate first across the
//! mesh, then along the profiles:
//!
//! - **Grids**: icosahedral tessellations, refined level by level, with walking
//!   triangle search and Delaunay legalization
//! - **Models**: per-vertex profiles in named layers, with typed or custom data
//! - **Queries**: linear or natural-neighbor interpolation across the grid,
//!   linear or cubic-spline interpolation along the profiles, path integrals
//!   and gradients
//! - **Files**: binary and ASCII model and grid files, with grids shared
//!   through a process-wide cache
//!
//! # Architecture
//!
//! ```text
//! Model::load(path)
//!      │
//!      ├─► codec: header, profiles[vertex][layer]
//!      │
//!      ├─► GridCache::get_or_load(grid file)   (or the embedded grid)
//!      │
//!      ▼
//!   Model ──► PointMap (active nodes under an optional Polygon)
//!      │
//!      ▼
//!   Position::set(layer, unit vector, radius)
//!      │
//!      ├─► Grid::find_triangle_from  ─► horizontal coefficients
//!      │
//!      ├─► Profile::interpolation_coefficients  ─► radial coefficients
//!      │
//!      └─► value(attribute)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use geotess::{Model, InterpolatorType};
//!
//! let model = Model::load("crust.geotess")?;
//! let mut pos = model.position(InterpolatorType::NaturalNeighbor, InterpolatorType::Linear)?;
//! pos.set_lat_lon_depth(30.0, 90.0, 100.0)?;
//! let vp = pos.value(0);
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod data;
pub mod error;
pub mod geometry;
pub mod gradient;
pub mod grid;
pub mod metadata;
pub mod model;
pub mod point_map;
pub mod polygon;
pub mod position;
pub mod profile;
pub mod types;

#[cfg(test)]
mod testdata;

// Re-export commonly used types at crate root
pub use cache::GridCache;
pub use codec::{CodecRegistry, CustomDataCodec, FileFormat, TextReader};
pub use config::GeoTessConfig;
pub use data::{CustomData, Data, DataType};
pub use error::{GeoTessError, Result};
pub use geometry::{EarthShape, Vec3};
pub use gradient::GradientCalculator;
pub use grid::{Grid, GridBuilder};
pub use metadata::MetaData;
pub use model::{Model, ProfileWriter};
pub use point_map::PointMap;
pub use polygon::{Horizon, Polygon};
pub use position::Position;
pub use profile::{Profile, ProfileType};
pub use types::{CacheStats, InterpolatorType, ProfileCounts};
