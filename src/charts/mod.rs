//! Charts and the engine that renders them
//!
//! A [`Chart`] names a directory under the charts root, the raw values to
//! render it with and the ordered list of files to load. Rendering is hidden
//! behind [`TemplateEngine`] so the install pipeline can be tested without
//! touching the filesystem.

pub mod renderer;
pub mod stage;

pub use renderer::ChartRenderer;
pub use stage::{Stage, templates_for};

use crate::error::Result;

/// Chart metadata file, always the first file of a chart
pub const CHART_FILE: &str = "Chart.yaml";

/// Chart default values file
pub const VALUES_FILE: &str = "values.yaml";

/// A chart to render as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    pub name: String,
    /// Directory relative to the charts root
    pub dir: String,
    pub namespace: String,
    /// One or more YAML documents; earlier documents take precedence
    pub raw_values: Vec<u8>,
    /// Files relative to `dir`, rendered in this order
    pub files: Vec<String>,
}

/// Turns a chart into manifest bytes
pub trait TemplateEngine {
    fn render(&self, chart: &Chart) -> Result<Vec<u8>>;
}
