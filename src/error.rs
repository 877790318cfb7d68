//! Error types for the pipeline.
//!
//! Only conditions that end a run surface here. Missing optional data (no
//! `state` column, unparseable capacity values, an empty aggregate) is
//! handled in place by the stage that encounters it.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input file could not be read, or an output could not be written.
    #[error("failed to access {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input file is not valid GeoJSON.
    #[error("failed to parse {} as GeoJSON: {}", path.display(), source)]
    Parse {
        path: PathBuf,
        source: geojson::Error,
    },

    /// The input parsed, but is not a feature collection.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// The coordinate transformation could not be constructed.
    #[error("projection setup failed: {0}")]
    ProjectionSetup(#[from] proj::ProjCreateError),

    /// A geometry failed to reproject.
    #[error("reprojection failed: {0}")]
    Projection(#[from] proj::ProjError),

    /// The chart or map backend failed.
    #[error("rendering failed: {0}")]
    Render(String),
}
