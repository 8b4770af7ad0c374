//! Endpoints owned by the runtime itself.

pub mod coordinator;

pub use coordinator::{Coordinator, MetricTotals};
