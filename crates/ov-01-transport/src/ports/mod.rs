//! # Ports Layer
//!
//! - **inbound**: [`Endpoint`](inbound::Endpoint), implemented by every node
//!   that accepts remote calls.
//! - **outbound**: [`Transport`](outbound::Transport), the substrate nodes
//!   send through.

pub mod inbound;
pub mod outbound;
