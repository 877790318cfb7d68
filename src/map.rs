use std::fs;
use std::path::Path;

use geo::algorithm::centroid::Centroid;
use geo::MultiPoint;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use crate::dataset::{Dataset, Record, Value};
use crate::error::PipelineError;

/// Categorical palette for the "By Type" layer. Fixed, so a given set of
/// fuel types always gets the same colors.
const TYPE_PALETTE: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728",
    "#ff9896", "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2",
    "#7f7f7f", "#c7c7c7", "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

/// Yellow-orange-red ramp for the "By Capacity" layer.
const CAPACITY_RAMP: [&str; 9] = [
    "#ffffcc", "#ffeda0", "#fed976", "#feb24c", "#fd8d3c", "#fc4e2a", "#e31a1c",
    "#bd0026", "#800026",
];

// Renders the interactive plant map: a self-contained Leaflet document with
// three radio-toggled layers (all plants, by type, by capacity) and a legend
// per colored layer. An empty dataset is a no-op.
pub fn render_plant_map(dataset: &Dataset, output: &Path) -> Result<(), PipelineError> {
    if dataset.is_empty() {
        warn!("no data to create power plant map");
        return Ok(());
    }
    info!("creating combined interactive map of {} power plants", dataset.len());

    let (center_lat, center_lon) = map_center(dataset);
    let plants = plant_features(dataset);
    let type_colors = type_color_assignment(dataset);
    let (min_mw, max_mw) = capacity_range(dataset);

    let html = build_document(&plants, center_lat, center_lon, &type_colors, min_mw, max_mw);

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
            path: output.to_path_buf(),
            source,
        })?;
    }
    fs::write(output, html).map_err(|source| PipelineError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    info!("interactive map saved to {}", output.display());
    Ok(())
}

fn map_center(dataset: &Dataset) -> (f64, f64) {
    let points: MultiPoint<f64> = dataset
        .records
        .iter()
        .map(|r| r.point)
        .collect::<Vec<_>>()
        .into();
    match points.centroid() {
        Some(center) => (center.y(), center.x()),
        None => (0.0, 0.0),
    }
}

// One JSON object per plant: position plus the popup fields. Text is
// HTML-escaped here, once, since it ends up inside popup markup.
fn plant_features(dataset: &Dataset) -> Vec<JsonValue> {
    let name_idx = dataset.column_index("plant_name");
    let type_idx = dataset.column_index("primsource");
    let mw_idx = dataset.column_index("total_mw");

    dataset
        .records
        .iter()
        .map(|record| {
            json!({
                "lat": record.point.y(),
                "lon": record.point.x(),
                "name": attr_text(record, name_idx),
                "type": attr_text(record, type_idx),
                "mw": attr_number(record, mw_idx),
            })
        })
        .collect()
}

fn attr_text(record: &Record, idx: Option<usize>) -> String {
    let raw = idx
        .and_then(|i| record.values.get(i))
        .map(|v| v.display_text())
        .unwrap_or_else(|| "Unknown".to_string());
    escape_html(&raw)
}

fn attr_number(record: &Record, idx: Option<usize>) -> f64 {
    idx.and_then(|i| record.values.get(i))
        .and_then(Value::as_number)
        .unwrap_or(0.0)
}

// Stable color assignment for the "By Type" layer: distinct types sorted
// alphabetically with "other" forced last, then matched against the fixed
// palette. The returned order is the legend order.
fn type_color_assignment(dataset: &Dataset) -> Vec<(String, String)> {
    let type_idx = match dataset.column_index("primsource") {
        Some(idx) => idx,
        None => return Vec::new(),
    };

    let mut types: Vec<String> = Vec::new();
    for record in &dataset.records {
        let value = match record.values.get(type_idx) {
            Some(Value::Null) | None => continue,
            Some(value) => escape_html(&value.display_text()),
        };
        if !types.contains(&value) {
            types.push(value);
        }
    }
    types.sort();
    if let Some(pos) = types.iter().position(|t| t == "other") {
        let other = types.remove(pos);
        types.push(other);
    }

    types
        .into_iter()
        .enumerate()
        .map(|(i, t)| (t, TYPE_PALETTE[i % TYPE_PALETTE.len()].to_string()))
        .collect()
}

fn capacity_range(dataset: &Dataset) -> (f64, f64) {
    let mw_idx = match dataset.column_index("total_mw") {
        Some(idx) => idx,
        None => return (0.0, 0.0),
    };
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for record in &dataset.records {
        if let Some(mw) = record.values.get(mw_idx).and_then(Value::as_number) {
            min = min.min(mw);
            max = max.max(mw);
        }
    }
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn build_document(
    plants: &[JsonValue],
    center_lat: f64,
    center_lon: f64,
    type_colors: &[(String, String)],
    min_mw: f64,
    max_mw: f64,
) -> String {
    let type_legend_items: String = type_colors
        .iter()
        .map(|(typ, color)| {
            format!(
                r#"<div><span style="background-color:{color}; width: 15px; height: 15px; display: inline-block; border: 1px solid grey; vertical-align: middle;"></span>&nbsp;{typ}</div>"#
            )
        })
        .collect();

    let type_colors_json: serde_json::Map<String, JsonValue> = type_colors
        .iter()
        .map(|(typ, color)| (typ.clone(), JsonValue::String(color.clone())))
        .collect();

    MAP_TEMPLATE
        .replace("__CENTER_LAT__", &center_lat.to_string())
        .replace("__CENTER_LON__", &center_lon.to_string())
        .replace("__PLANTS__", &JsonValue::Array(plants.to_vec()).to_string())
        .replace("__TYPE_COLORS__", &JsonValue::Object(type_colors_json).to_string())
        .replace("__TYPE_LEGEND_ITEMS__", &type_legend_items)
        .replace("__RAMP__", &json!(CAPACITY_RAMP).to_string())
        .replace("__GRADIENT_CSS__", &CAPACITY_RAMP.join(", "))
        .replace("__MIN_MW_LABEL__", &format!("{:.0}", min_mw))
        .replace("__MAX_MW_LABEL__", &format!("{:.0}", max_mw))
        .replace("__MIN_MW__", &min_mw.to_string())
        .replace("__MAX_MW__", &max_mw.to_string())
}

// Placeholder-based template rather than format!: the document is mostly
// JS/CSS whose braces would otherwise all need escaping.
const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Power Plants Map</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
    html, body { margin: 0; padding: 0; height: 100%; }
    #map { width: 100%; height: 100%; }
    .leaflet-control-layers-selector[name="plant-layer-group"] {
        -webkit-appearance: radio !important;
        -moz-appearance: radio !important;
        appearance: radio !important;
    }
</style>
</head>
<body>
<div id="map"></div>
<div style="position: fixed; bottom: 20px; left: 20px; z-index:9998;">
    <div id="legend-capacity" style="display:none; width: 150px; font-size:12px; background-color:rgba(255,255,255,0.85); padding: 5px; border-radius: 5px; border:1px solid grey; margin-bottom: 10px;">
        <b>Capacity (MW)</b>
        <div style="background: linear-gradient(to right, __GRADIENT_CSS__); height: 10px; width: 100%; border-radius: 3px;"></div>
        <div style="display: flex; justify-content: space-between; font-size: 10px;">
            <span>__MIN_MW_LABEL__</span><span>__MAX_MW_LABEL__</span>
        </div>
    </div>
    <div id="legend-type" style="display:none; width: 180px; font-size:14px; background-color:rgba(255,255,255,0.85); padding: 10px; border-radius: 5px; border:1px solid grey;">
        <b>Power Plant Types</b><br>
        __TYPE_LEGEND_ITEMS__
    </div>
</div>
<script>
    var plants = __PLANTS__;
    var typeColors = __TYPE_COLORS__;
    var capacityRamp = __RAMP__;
    var minMw = __MIN_MW__;
    var maxMw = __MAX_MW__;

    var map = L.map('map').setView([__CENTER_LAT__, __CENTER_LON__], 4);
    L.tileLayer('https://tile.openstreetmap.org/{z}/{x}/{y}.png', {
        attribution: '&copy; OpenStreetMap contributors'
    }).addTo(map);

    var allPlants = L.layerGroup();
    var byType = L.layerGroup();
    var byCapacity = L.layerGroup();

    function markerStyle(color) {
        return { radius: 3, color: color, fill: true, fillColor: color, fillOpacity: 0.7 };
    }

    function blend(a, b, t) {
        var pa = parseInt(a.slice(1), 16);
        var pb = parseInt(b.slice(1), 16);
        var r = Math.round(((pa >> 16) & 255) * (1 - t) + ((pb >> 16) & 255) * t);
        var g = Math.round(((pa >> 8) & 255) * (1 - t) + ((pb >> 8) & 255) * t);
        var bl = Math.round((pa & 255) * (1 - t) + (pb & 255) * t);
        return '#' + ((1 << 24) + (r << 16) + (g << 8) + bl).toString(16).slice(1);
    }

    function capacityColor(mw) {
        var span = maxMw - minMw;
        var t = span > 0 ? (mw - minMw) / span : 0;
        t = Math.min(Math.max(t, 0), 1);
        var scaled = t * (capacityRamp.length - 1);
        var i = Math.min(Math.floor(scaled), capacityRamp.length - 2);
        return blend(capacityRamp[i], capacityRamp[i + 1], scaled - i);
    }

    plants.forEach(function (p) {
        var popup = '<b>' + p.name + '</b><br>Type: ' + p.type + '<br>Capacity: ' + p.mw + ' MW';
        L.circleMarker([p.lat, p.lon], markerStyle('blue')).bindPopup(popup).addTo(allPlants);
        var typeColor = typeColors[p.type];
        if (typeColor) {
            L.circleMarker([p.lat, p.lon], markerStyle(typeColor)).bindPopup(popup).addTo(byType);
        }
        L.circleMarker([p.lat, p.lon], markerStyle(capacityColor(p.mw))).bindPopup(popup).addTo(byCapacity);
    });

    allPlants.addTo(map);
    L.control.layers(null, {
        'All Plants': allPlants,
        'By Type': byType,
        'By Capacity': byCapacity
    }, { position: 'topleft', collapsed: false }).addTo(map);

    // The layer control offers checkboxes; turn them into a radio group so
    // exactly one layer is visible, and toggle the matching legend.
    var inputs = Array.from(document.querySelectorAll('.leaflet-control-layers-overlays input.leaflet-control-layers-selector'));
    var legendType = document.getElementById('legend-type');
    var legendCapacity = document.getElementById('legend-capacity');

    function updateLegends() {
        var selected = inputs.find(function (input) { return input.checked; });
        if (!selected) return;
        var layerName = selected.parentElement.innerText.trim();
        if (legendType) legendType.style.display = (layerName === 'By Type') ? 'block' : 'none';
        if (legendCapacity) legendCapacity.style.display = (layerName === 'By Capacity') ? 'block' : 'none';
    }

    inputs.forEach(function (input) {
        input.type = 'radio';
        input.name = 'plant-layer-group';
        input.addEventListener('click', updateLegends);
    });
    if (inputs.length > 0 && !inputs.some(function (i) { return i.checked; })) {
        inputs[0].checked = true;
    }
    updateLegends();
</script>
</body>
</html>
"#;
