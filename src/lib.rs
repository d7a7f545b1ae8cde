//! # heatmesh
//!
//! Heat diffusion on triangle meshes with the cotangent Laplace–Beltrami operator and lumped mass,
//! integrated by parallel explicit Euler steps.
#![forbid(unsafe_code)]
#![warn(unused, clippy::all, clippy::missing_const_for_fn)]

pub use error::MeshError;
pub use field::FieldState;
pub use integrator::{par_step, partition, step, step_range, WorkerPool};
pub use simulation::{HeatSimulation, SimulationConfig};
pub use topology::{build_topology, Topology};
pub use utils::types::{Triangle, Vertex3, VertexIdx};
pub use weights::{assemble_weights, CotanWeights, LumpedMass};

pub mod error;
pub mod field;
pub mod integrator;
pub mod simulation;
pub mod topology;
mod utils;
pub mod weights;
