//! # Overlay Runtime Library
//!
//! Builds and drives a complete two-tier overlay in one process. The binary
//! in `main.rs` is a thin command-line front end over [`Simulation`].
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and the node container
//! - `handlers/` - the coordinator endpoint
//! - `wiring/` - super-peer topologies and leaf placement
//! - `workload/` - synthetic files and request selection
//! - `simulation` - run phases
//! - `report` - the end-of-run summary

pub mod container;
pub mod handlers;
pub mod report;
pub mod simulation;
pub mod wiring;
pub mod workload;

pub use container::{ConfigError, OverlayContainer, SimulationConfig};
pub use handlers::{Coordinator, MetricTotals};
pub use report::SimulationReport;
pub use simulation::Simulation;
pub use wiring::Topology;
