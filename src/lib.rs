use std::path::Path;

use tracing::{info, warn};

pub mod analysis;
pub mod chart;
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod map;
pub mod process;

pub use dataset::Dataset;
pub use error::PipelineError;

/// Output file names inside the reports directory.
pub const DENSITY_CHART_FILE: &str = "power_plant_density.png";
pub const PLANT_MAP_FILE: &str = "power_plants_map.html";

pub enum InputFormat {
    GeoJson,
}

pub fn load_dataset(path: &Path, format: InputFormat) -> Result<Dataset, PipelineError> {
    match format {
        InputFormat::GeoJson => ingest::load_geojson(path),
    }
}

// Runs the full pipeline: load, normalize, aggregate, render. A load failure
// is terminal; a dataset without a state column skips the visualizations.
pub fn run_pipeline(input: &Path, reports_dir: &Path) -> Result<(), PipelineError> {
    let raw = load_dataset(input, InputFormat::GeoJson)?;
    let dataset = process::normalize(raw)?;

    match analysis::plant_count_by_state(&dataset) {
        Some(counts) => {
            chart::render_density_chart(&counts, &reports_dir.join(DENSITY_CHART_FILE))?;
            map::render_plant_map(&dataset, &reports_dir.join(PLANT_MAP_FILE))?;
            info!("visualizations generated in {}", reports_dir.display());
        }
        None => {
            warn!("skipping visualizations: density analysis unavailable");
        }
    }
    Ok(())
}
