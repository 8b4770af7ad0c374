//! # Domain Layer for the Super-Peer Index
//!
//! - **value_objects**: `FileIndex` (holder sets) and `VersionTable` (per-holder versions)
//! - **entities**: `IndexSnapshot` and the `checkVersion` verdict

mod entities;
mod value_objects;

pub use entities::*;
pub use value_objects::*;
