//! Installation stages and the base chart templates each one renders

use std::fmt;

/// Cluster-wide resources, installed by a cluster administrator
const CONFIG_STAGE_TEMPLATES: &[&str] = &[
    "templates/namespace.yaml",
    "templates/identity-rbac.yaml",
    "templates/controller-rbac.yaml",
    "templates/destination-rbac.yaml",
    "templates/heartbeat-rbac.yaml",
    "templates/web-rbac.yaml",
    "templates/serviceprofile-crd.yaml",
    "templates/trafficsplit-crd.yaml",
    "templates/proxy-injector-rbac.yaml",
    "templates/sp-validator-rbac.yaml",
    "templates/tap-rbac.yaml",
    "templates/psp.yaml",
];

/// Namespaced control plane resources
const CONTROL_PLANE_STAGE_TEMPLATES: &[&str] = &[
    "templates/_config.tpl",
    "templates/_helpers.tpl",
    "templates/identity.yaml",
    "templates/controller.yaml",
    "templates/destination.yaml",
    "templates/heartbeat.yaml",
    "templates/web.yaml",
    "templates/proxy-injector.yaml",
    "templates/sp-validator.yaml",
    "templates/tap.yaml",
    "templates/linkerd-config-addons.yaml",
];

/// Which part of the installation to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    All,
    Config,
    ControlPlane,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::All => "(all)",
            Stage::Config => "config",
            Stage::ControlPlane => "control-plane",
        }
    }

    pub fn includes_config(self) -> bool {
        matches!(self, Stage::All | Stage::Config)
    }

    pub fn includes_control_plane(self) -> bool {
        matches!(self, Stage::All | Stage::ControlPlane)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base chart templates for `stage`, config-stage templates first
pub fn templates_for(stage: Stage) -> Vec<&'static str> {
    let mut templates = Vec::new();
    if stage.includes_config() {
        templates.extend_from_slice(CONFIG_STAGE_TEMPLATES);
    }
    if stage.includes_control_plane() {
        templates.extend_from_slice(CONTROL_PLANE_STAGE_TEMPLATES);
    }
    templates
}
