//! Render the manifest for one stage
//!
//! The base chart and each enabled add-on are rendered as separate charts
//! and concatenated in add-on discovery order, then the override Secret is
//! appended as a final document. Everything is buffered so a failure at any
//! step produces no output at all.

use tracing::debug;

use super::overrides::render_overrides;
use crate::charts::{CHART_FILE, Chart, Stage, TemplateEngine, VALUES_FILE, templates_for};
use crate::error::Result;
use crate::values::{AddOn, Values, discover_addons};

/// Base chart name and directory
pub const BASE_CHART: &str = "linkerd2";

/// Directory holding one sub-chart per add-on
pub const ADDON_CHARTS_DIR: &str = "add-ons";

/// YAML document separator
pub const YAML_SEP: &str = "---\n";

/// Render the base chart, enabled add-ons and override Secret for `stage`
pub fn render<E: TemplateEngine>(engine: &E, values: &Values, stage: Stage) -> Result<Vec<u8>> {
    let raw_values = values.to_yaml()?.into_bytes();
    let namespace = values.global.namespace.as_str();
    let addons = discover_addons(values)?;

    let mut files = vec![CHART_FILE.to_string()];
    files.extend(templates_for(stage).into_iter().map(str::to_string));

    let base = Chart {
        name: BASE_CHART.to_string(),
        dir: BASE_CHART.to_string(),
        namespace: namespace.to_string(),
        raw_values: raw_values.clone(),
        files,
    };

    let addon_charts = addons
        .iter()
        .map(|addon| addon_chart(addon, namespace, &raw_values, stage))
        .collect::<Result<Vec<_>>>()?;

    debug!(%stage, addons = addon_charts.len(), "rendering charts");
    let mut buf = engine.render(&base)?;
    for chart in &addon_charts {
        buf.extend(engine.render(chart)?);
    }

    buf.extend_from_slice(YAML_SEP.as_bytes());
    buf.extend(render_overrides(values, namespace)?);
    Ok(buf)
}

/// Sub-chart for one add-on; its own values come first and win over the base values
fn addon_chart(addon: &AddOn, namespace: &str, base_values: &[u8], stage: Stage) -> Result<Chart> {
    let mut raw_values = addon.values()?;
    raw_values.extend_from_slice(YAML_SEP.as_bytes());
    raw_values.extend_from_slice(base_values);

    let mut files = vec![CHART_FILE.to_string(), VALUES_FILE.to_string()];
    if stage.includes_config() {
        files.extend(addon.config_stage_templates());
    }
    if stage.includes_control_plane() {
        files.extend(addon.control_plane_stage_templates());
    }

    Ok(Chart {
        name: addon.name().to_string(),
        dir: format!("{}/{}", ADDON_CHARTS_DIR, addon.name()),
        namespace: namespace.to_string(),
        raw_values,
        files,
    })
}
