//! # Synthetic Workload
//!
//! Initial leaf `i` authors files `i * files_per_leaf ..` named `"<n>.txt"`
//! and requests a random selection of files owned by other leaves. Extra
//! leaves own nothing and request from the whole file set.

use crate::container::SimulationConfig;
use crate::wiring::{leaf_id, super_for_leaf};
use shared_types::{FileName, PeerId, RandomSource};

/// What one leaf owns and requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPlan {
    pub id: PeerId,
    pub super_peer: PeerId,
    pub owned: Vec<FileName>,
    pub requests: Vec<FileName>,
}

pub fn file_name(number: usize) -> FileName {
    FileName::from(format!("{number}.txt"))
}

/// Initial content of a file authored by `leaf`.
pub fn initial_content(leaf: PeerId, padding: usize, random: &dyn RandomSource) -> Vec<u8> {
    let mut content = format!("Created by leaf {leaf}\n").into_bytes();
    let header = content.len();
    content.resize(header + padding, 0);
    random.fill_printable(&mut content[header..]);
    content
}

/// Up to `count` distinct picks from `candidates`, in pick order.
fn sample(mut candidates: Vec<usize>, count: usize, random: &dyn RandomSource) -> Vec<usize> {
    let count = count.min(candidates.len());
    for picked in 0..count {
        let swap = picked + random.random_usize(candidates.len() - picked);
        candidates.swap(picked, swap);
    }
    candidates.truncate(count);
    candidates
}

/// Plans for the initial leaves, in id order.
pub fn plan_initial_leaves(config: &SimulationConfig, random: &dyn RandomSource) -> Vec<LeafPlan> {
    let n_supers = config.overlay.n_supers;
    let files_per_leaf = config.workload.files_per_leaf;
    let leaves = config.initial_leaves();
    let total_files = leaves as usize * files_per_leaf;

    (0..leaves)
        .map(|index| {
            let first = index as usize * files_per_leaf;
            let owned_range = first..first + files_per_leaf;
            let others: Vec<usize> = (0..total_files)
                .filter(|number| !owned_range.contains(number))
                .collect();
            LeafPlan {
                id: leaf_id(index, n_supers),
                super_peer: super_for_leaf(index, n_supers),
                owned: owned_range.map(file_name).collect(),
                requests: sample(others, config.workload.requests_per_leaf, random)
                    .into_iter()
                    .map(file_name)
                    .collect(),
            }
        })
        .collect()
}

/// Plans for leaves joining during the update phase. They attach to super 1.
pub fn plan_extra_leaves(config: &SimulationConfig, random: &dyn RandomSource) -> Vec<LeafPlan> {
    let n_supers = config.overlay.n_supers;
    let initial = config.initial_leaves();
    let total_files = initial as usize * config.workload.files_per_leaf;

    (0..config.workload.extra_leaves)
        .map(|offset| LeafPlan {
            id: leaf_id(initial + offset, n_supers),
            super_peer: PeerId(1),
            owned: Vec::new(),
            requests: sample(
                (0..total_files).collect(),
                config.workload.extra_requests,
                random,
            )
            .into_iter()
            .map(file_name)
            .collect(),
        })
        .collect()
}
