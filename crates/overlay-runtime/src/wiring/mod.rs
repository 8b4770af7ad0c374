//! # Overlay Wiring
//!
//! How supers are linked to each other and how leaves are placed under them.

pub mod topology;

pub use topology::{leaf_id, super_for_leaf, super_ids, Topology, UnknownTopology};
