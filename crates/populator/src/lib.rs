//! Population of grid-node models from travel-time prediction services.
//!
//! Every vertex of a grid is treated as the center of a cylinder of crust.
//! For each configured station and phase, the populator samples an external
//! [`PredictionService`] around the cylinder and stores the resulting
//! [`GridNode`] as custom data in a one-layer [`geotess::Model`].
//!
//! # Architecture
//!
//! ```text
//! PopulationConfig (YAML or code)
//!      │ validate(): every missing field at once
//!      ▼
//! ParallelPopulator::populate(services)
//!      │
//!      ├─► partition(vertices, K)         K = min(services, vertices)
//!      │
//!      ├─► worker 0 ─► GridNodeGenerator ─► ProfileWriter [0..n0)
//!      ├─► worker 1 ─► GridNodeGenerator ─► ProfileWriter [n0..n1)
//!      │      ...        (own service)        (disjoint slice)
//!      ▼
//!   Model of GridNodeData ──► PopulatedModel ──► FirstArrivalIndex (built once)
//! ```
//!
//! Populated models are written like any other model; reading them back
//! needs [`codec_registry`] so the `GridNodeData` values can be decoded.

pub mod config;
pub mod error;
pub mod first_arrival;
pub mod generator;
pub mod node;
pub mod node_data;
pub mod populator;
pub mod prediction;
pub mod station;

pub use config::PopulationConfig;
pub use error::PopulationConfigError;
pub use first_arrival::{FirstArrivalIndex, PopulatedModel};
pub use generator::{GridNodeGenerator, PhaseInfoGenerator};
pub use node::{GridNode, NodeStation, PhaseInfo};
pub use node_data::{codec_registry, GridNodeData, GridNodeDataCodec};
pub use populator::{partition, ParallelPopulator};
pub use prediction::{
    PredictionKind, PredictionRequest, PredictionService, SourceLocation, UniformVelocityService,
};
pub use station::{PhaseType, Station};
