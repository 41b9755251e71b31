//! Add-on discovery
//!
//! The set of add-ons is fixed at build time. Each kind knows its chart
//! templates per stage; [`discover_addons`] returns the enabled ones in
//! declaration order so rendered output is stable across runs.

use serde_yaml::{Mapping, Value};

use super::Values;
use crate::error::Result;
use crate::error::values::addon_parse_failed;

/// Add-on kinds known to the installer, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddOnKind {
    Grafana,
    Tracing,
}

impl AddOnKind {
    pub const ALL: [AddOnKind; 2] = [AddOnKind::Grafana, AddOnKind::Tracing];

    /// Name used for the values key and the add-on chart directory
    pub fn name(self) -> &'static str {
        match self {
            AddOnKind::Grafana => "grafana",
            AddOnKind::Tracing => "tracing",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn config_stage_templates(self) -> &'static [&'static str] {
        match self {
            AddOnKind::Grafana => &[],
            AddOnKind::Tracing => &["templates/tracing-rbac.yaml"],
        }
    }

    fn control_plane_stage_templates(self) -> &'static [&'static str] {
        match self {
            AddOnKind::Grafana => &["templates/grafana-rbac.yaml", "templates/grafana.yaml"],
            AddOnKind::Tracing => &["templates/tracing.yaml"],
        }
    }
}

/// An enabled add-on and its own slice of the value tree
#[derive(Debug, Clone, PartialEq)]
pub struct AddOn {
    kind: AddOnKind,
    values: Mapping,
}

impl AddOn {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// The add-on's raw values, wrapped under its name
    pub fn values(&self) -> Result<Vec<u8>> {
        let mut wrapped = Mapping::new();
        wrapped.insert(Value::from(self.name()), Value::Mapping(self.values.clone()));
        Ok(serde_yaml::to_string(&wrapped)?.into_bytes())
    }

    pub fn config_stage_templates(&self) -> Vec<String> {
        to_owned(self.kind.config_stage_templates())
    }

    pub fn control_plane_stage_templates(&self) -> Vec<String> {
        to_owned(self.kind.control_plane_stage_templates())
    }
}

/// Parse the enabled add-ons out of the value tree, in declaration order
pub fn discover_addons(values: &Values) -> Result<Vec<AddOn>> {
    let mut addons = Vec::new();
    for kind in AddOnKind::ALL {
        if let Some(addon) = parse_block(kind, values.addon_block(kind))? {
            addons.push(addon);
        }
    }
    Ok(addons)
}

fn parse_block(kind: AddOnKind, block: &Value) -> Result<Option<AddOn>> {
    let mapping = match block {
        Value::Null => return Ok(None),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(addon_parse_failed(
                kind.name(),
                "configuration must be a mapping",
            ));
        }
    };

    let enabled = match mapping.get("enabled") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(enabled)) => *enabled,
        Some(_) => {
            return Err(addon_parse_failed(kind.name(), "'enabled' must be a boolean"));
        }
    };

    if !enabled {
        return Ok(None);
    }

    Ok(Some(AddOn {
        kind,
        values: mapping.clone(),
    }))
}

fn to_owned(templates: &[&str]) -> Vec<String> {
    templates.iter().map(|t| t.to_string()).collect()
}
