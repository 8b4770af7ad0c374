//! # Gnutella Overlay Test Suite
//!
//! Cross-crate flows run over the in-process network.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs            # Hand-wired overlays
//!     ├── search_flows.rs       # Flooded search and hit back-routing
//!     ├── consistency_flows.rs  # Push, pull and version-authority freshness
//!     └── simulation_flows.rs   # Full runs through overlay-runtime
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ov-tests
//!
//! # By category
//! cargo test -p ov-tests integration::search_flows
//! cargo test -p ov-tests integration::consistency_flows
//! ```

pub mod integration;
