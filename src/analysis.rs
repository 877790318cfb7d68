use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dataset::Dataset;

/// Canonical name of the region attribute used for density counting.
pub const STATE_COLUMN: &str = "state";

/// Number of power plants observed in one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCount {
    pub state: String,
    pub count: usize,
}

// Counts power plants per state. Returns None when the dataset has no state
// column: density analysis is unavailable, which callers treat as a soft
// condition (skip the visualizations), not an error.
pub fn plant_count_by_state(dataset: &Dataset) -> Option<Vec<RegionCount>> {
    info!("performing geospatial analysis: power plant density");

    let state_idx = match dataset.column_index(STATE_COLUMN) {
        Some(idx) => idx,
        None => {
            warn!("'{}' column not found for density analysis", STATE_COLUMN);
            return None;
        }
    };

    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in &dataset.records {
        let state = record.values[state_idx].display_text();
        *counts.entry(state).or_insert(0) += 1;
    }

    let result: Vec<RegionCount> = counts
        .into_iter()
        .map(|(state, count)| RegionCount { state, count })
        .collect();
    debug!("found plants in {} distinct states", result.len());
    Some(result)
}
