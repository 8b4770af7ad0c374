//! # Domain Layer for Flood Routing
//!
//! Pure bookkeeping with no I/O.
//!
//! ## Contents
//!
//! - **entities**: Routing decisions (`Forward`, `SearchDecision`, `InvalidatePlan`)
//! - **value_objects**: Dedup tables (`SearchRouteTable`, `SeenSet`) and `RouterStats`
//! - **invariants**: TTL arithmetic and forward-set checks

mod entities;
mod invariants;
mod value_objects;

pub use entities::*;
pub use invariants::*;
pub use value_objects::*;
