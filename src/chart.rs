use std::fs;
use std::path::Path;

use plotters::prelude::*;
use plotters::style::FontTransform;
use tracing::{info, warn};

use crate::analysis::RegionCount;
use crate::error::PipelineError;

const CHART_SIZE: (u32, u32) = (1200, 600);

/// Presentation order for the density chart: descending by count, ties
/// broken alphabetically so the output is stable.
pub fn sort_for_presentation(counts: &[RegionCount]) -> Vec<RegionCount> {
    let mut sorted = counts.to_vec();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.state.cmp(&b.state)));
    sorted
}

// Renders the per-state density bar chart as a PNG. An empty aggregate is a
// no-op: nothing to render, not an error.
pub fn render_density_chart(counts: &[RegionCount], output: &Path) -> Result<(), PipelineError> {
    if counts.is_empty() {
        warn!("no data to plot for power plant density");
        return Ok(());
    }
    info!("generating power plant density bar chart");

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
            path: output.to_path_buf(),
            source,
        })?;
    }

    let sorted = sort_for_presentation(counts);
    let n = sorted.len() as i32;
    let max_count = sorted.iter().map(|c| c.count).max().unwrap_or(0) as i32;
    let y_max = max_count + (max_count / 20).max(1);

    let root = BitMapBackend::new(output, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Number of Power Plants by State", ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(70)
        .y_label_area_size(60)
        .build_cartesian_2d((0..n).into_segmented(), 0..y_max)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(sorted.len())
        .x_label_formatter(&|segment| match segment {
            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => sorted
                .get(*i as usize)
                .map(|c| c.state.clone())
                .unwrap_or_default(),
            SegmentValue::Last => String::new(),
        })
        .x_label_style(("sans-serif", 12).into_font().transform(FontTransform::Rotate90))
        .x_desc("State")
        .y_desc("Number of Power Plants")
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(sorted.iter().enumerate().map(|(i, region)| {
            Rectangle::new(
                [
                    (SegmentValue::Exact(i as i32), 0),
                    (SegmentValue::Exact(i as i32 + 1), region.count as i32),
                ],
                BLUE.filled(),
            )
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    info!("power plant density bar chart saved to {}", output.display());
    Ok(())
}

fn render_error<E: std::fmt::Display>(err: E) -> PipelineError {
    PipelineError::Render(err.to_string())
}
