//! Cross-crate integration flows.

#[cfg(test)]
mod harness;

mod consistency_flows;
mod search_flows;
mod simulation_flows;
