//! Value model for the Linkerd chart
//!
//! [`Values`] is the full configuration tree handed to the chart: global
//! settings, per-component settings, the add-on blocks and the derived
//! `configs` blob. Defaults are a pure function of build-time constants.
//!
//! Submodules:
//! - [`flags`]: Name/value settings applied on top of the defaults
//! - [`addons`]: Discovery of enabled add-ons
//! - [`validation`]: Semantic checks run before rendering

pub mod addons;
pub mod flags;
pub mod validation;

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::error::Result;
use crate::tree;

pub use addons::{AddOn, AddOnKind, discover_addons};
pub use flags::{FlagGroup, Setting, apply_overrides};

/// Namespace the control plane is installed into unless overridden
pub const DEFAULT_NAMESPACE: &str = "linkerd";

/// Version of the control plane rendered by this build
pub const LINKERD_VERSION: &str = "stable-2.8.1";

/// Issuer scheme for credentials managed by the installer
pub const ISSUER_SCHEME_LINKERD: &str = "linkerd.io/tls";

/// Issuer scheme for credentials managed outside of the installer
pub const ISSUER_SCHEME_EXTERNAL: &str = "kubernetes.io/tls";

/// Full configuration tree rendered into the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Values {
    pub global: Global,
    pub controller_image: String,
    pub controller_replicas: u32,
    pub controller_log_level: String,
    #[serde(rename = "controllerUID")]
    pub controller_uid: i64,
    pub enable_h2_upgrade: bool,
    pub enable_pod_anti_affinity: bool,
    pub install_namespace: bool,
    pub omit_webhook_side_effects: bool,
    pub disable_heartbeat: bool,
    pub heartbeat_schedule: String,
    pub web_image: String,
    pub identity: Identity,
    pub configs: ConfigJsons,

    /// Add-on blocks, kept free-form so malformed input is representable
    pub grafana: serde_yaml::Value,
    pub tracing: serde_yaml::Value,
}

/// Cluster-wide settings shared by every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Global {
    pub namespace: String,
    pub cluster_domain: String,
    pub image_pull_policy: String,
    pub cni_enabled: bool,
    pub linkerd_version: String,
    pub identity_trust_domain: String,
    #[serde(rename = "identityTrustAnchorsPEM")]
    pub identity_trust_anchors_pem: String,
    pub restrict_dashboard_privileges: bool,
    pub control_plane_tracing: bool,
    pub proxy: Proxy,
    pub proxy_init: ProxyInit,
}

/// Data-plane proxy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proxy {
    pub image: Image,
    pub log_level: String,
    pub log_format: String,
    pub ports: Ports,
    pub uid: i64,
    pub resources: Resources,
    pub enable_external_profiles: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub name: String,
    pub pull_policy: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ports {
    pub admin: u16,
    pub control: u16,
    pub inbound: u16,
    pub outbound: u16,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub cpu: Constraints,
    pub memory: Constraints,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    pub request: String,
    pub limit: String,
}

/// Settings for the proxy-init container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyInit {
    pub image: Image,
    pub ignore_inbound_ports: String,
    pub ignore_outbound_ports: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub issuer: Issuer,
}

/// Identity issuer settings and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    pub scheme: String,
    pub clock_skew_allowance: String,
    pub issuance_lifetime: String,
    pub crt_expiry: String,
    pub tls: IssuerTls,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IssuerTls {
    #[serde(rename = "crtPEM")]
    pub crt_pem: String,
    #[serde(rename = "keyPEM")]
    pub key_pem: String,
}

/// Raw JSON configs consumed by the `linkerd-config` ConfigMap
///
/// Derived from the rest of the tree, never set by the user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigJsons {
    pub global: String,
    pub proxy: String,
    pub install: String,
}

impl Values {
    /// Build the value tree from built-in defaults only
    pub fn new_defaults() -> Self {
        Self {
            global: Global {
                namespace: DEFAULT_NAMESPACE.to_string(),
                cluster_domain: "cluster.local".to_string(),
                image_pull_policy: "IfNotPresent".to_string(),
                cni_enabled: false,
                linkerd_version: LINKERD_VERSION.to_string(),
                identity_trust_domain: "cluster.local".to_string(),
                identity_trust_anchors_pem: String::new(),
                restrict_dashboard_privileges: false,
                control_plane_tracing: false,
                proxy: Proxy {
                    image: Image {
                        name: "gcr.io/linkerd-io/proxy".to_string(),
                        pull_policy: "IfNotPresent".to_string(),
                        version: String::new(),
                    },
                    log_level: "warn,linkerd=info".to_string(),
                    log_format: "plain".to_string(),
                    ports: Ports {
                        admin: 4191,
                        control: 4190,
                        inbound: 4143,
                        outbound: 4140,
                    },
                    uid: 2102,
                    resources: Resources::default(),
                    enable_external_profiles: false,
                },
                proxy_init: ProxyInit {
                    image: Image {
                        name: "gcr.io/linkerd-io/proxy-init".to_string(),
                        pull_policy: "IfNotPresent".to_string(),
                        version: "v1.3.3".to_string(),
                    },
                    ignore_inbound_ports: String::new(),
                    ignore_outbound_ports: String::new(),
                },
            },
            controller_image: "gcr.io/linkerd-io/controller".to_string(),
            controller_replicas: 1,
            controller_log_level: "info".to_string(),
            controller_uid: 2103,
            enable_h2_upgrade: true,
            enable_pod_anti_affinity: false,
            install_namespace: true,
            omit_webhook_side_effects: false,
            disable_heartbeat: false,
            heartbeat_schedule: "0 0 * * *".to_string(),
            web_image: "gcr.io/linkerd-io/web".to_string(),
            identity: Identity {
                issuer: Issuer {
                    scheme: ISSUER_SCHEME_LINKERD.to_string(),
                    clock_skew_allowance: "20s".to_string(),
                    issuance_lifetime: "24h0m0s".to_string(),
                    crt_expiry: String::new(),
                    tls: IssuerTls::default(),
                },
            },
            configs: ConfigJsons::default(),
            grafana: addon_block(&[
                ("enabled", serde_yaml::Value::Bool(true)),
                ("image", "gcr.io/linkerd-io/grafana".into()),
            ]),
            tracing: addon_block(&[
                ("enabled", serde_yaml::Value::Bool(false)),
                ("collector", addon_block(&[("image", "omnition/opencensus-collector:0.1.11".into())])),
                ("jaeger", addon_block(&[("image", "jaegertracing/all-in-one:1.17.1".into())])),
            ]),
        }
    }

    /// Serialize to the chart's raw-values form
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a value tree from YAML
    #[cfg(test)]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Add-on block for the given kind
    pub fn addon_block(&self, kind: AddOnKind) -> &serde_yaml::Value {
        match kind {
            AddOnKind::Grafana => &self.grafana,
            AddOnKind::Tracing => &self.tracing,
        }
    }

    /// Mutable add-on block for the given kind
    pub fn addon_block_mut(&mut self, kind: AddOnKind) -> &mut serde_yaml::Value {
        match kind {
            AddOnKind::Grafana => &mut self.grafana,
            AddOnKind::Tracing => &mut self.tracing,
        }
    }

    /// Recompute the `configs` blob from the rest of the tree
    pub fn refresh_configs(&mut self) -> Result<()> {
        let global = serde_json::json!({
            "linkerdNamespace": self.global.namespace,
            "cniEnabled": self.global.cni_enabled,
            "version": self.global.linkerd_version,
            "identityContext": {
                "trustDomain": self.global.identity_trust_domain,
                "trustAnchorsPem": self.global.identity_trust_anchors_pem,
                "issuanceLifetime": self.identity.issuer.issuance_lifetime,
                "clockSkewAllowance": self.identity.issuer.clock_skew_allowance,
                "scheme": self.identity.issuer.scheme,
            },
            "omitWebhookSideEffects": self.omit_webhook_side_effects,
            "clusterDomain": self.global.cluster_domain,
        });

        let proxy = &self.global.proxy;
        let proxy_version = if proxy.image.version.is_empty() {
            &self.global.linkerd_version
        } else {
            &proxy.image.version
        };
        let proxy = serde_json::json!({
            "proxyImage": { "imageName": proxy.image.name, "pullPolicy": proxy.image.pull_policy },
            "proxyInitImage": {
                "imageName": self.global.proxy_init.image.name,
                "pullPolicy": self.global.proxy_init.image.pull_policy,
            },
            "controlPort": { "port": proxy.ports.control },
            "ignoreInboundPorts": split_port_list(&self.global.proxy_init.ignore_inbound_ports),
            "ignoreOutboundPorts": split_port_list(&self.global.proxy_init.ignore_outbound_ports),
            "inboundPort": { "port": proxy.ports.inbound },
            "adminPort": { "port": proxy.ports.admin },
            "outboundPort": { "port": proxy.ports.outbound },
            "resource": {
                "requestCpu": proxy.resources.cpu.request,
                "limitCpu": proxy.resources.cpu.limit,
                "requestMemory": proxy.resources.memory.request,
                "limitMemory": proxy.resources.memory.limit,
            },
            "proxyUid": proxy.uid,
            "logLevel": { "level": proxy.log_level },
            "disableExternalProfiles": !proxy.enable_external_profiles,
            "proxyVersion": proxy_version,
            "proxyInitImageVersion": self.global.proxy_init.image.version,
            "logFormat": proxy.log_format,
        });

        let install = serde_json::json!({
            "cliVersion": self.global.linkerd_version,
        });

        self.configs = ConfigJsons {
            global: serde_json::to_string(&global)?,
            proxy: serde_json::to_string(&proxy)?,
            install: serde_json::to_string(&install)?,
        };
        Ok(())
    }

    /// Copy of the tree with the derived `configs` blob cleared
    fn without_configs(&self) -> Self {
        let mut copy = self.clone();
        copy.configs = ConfigJsons::default();
        copy
    }
}

/// Compute the override record: every path in `effective` that differs from `defaults`
///
/// The derived `configs` blob is cleared on both sides first so it never
/// shows up as an override.
pub fn diff(defaults: &Values, effective: &Values) -> Result<Mapping> {
    tree::diff(&defaults.without_configs(), &effective.without_configs())
}

fn addon_block(entries: &[(&str, serde_yaml::Value)]) -> serde_yaml::Value {
    let mut mapping = Mapping::new();
    for (key, value) in entries {
        mapping.insert(serde_yaml::Value::from(*key), value.clone());
    }
    serde_yaml::Value::Mapping(mapping)
}

fn split_port_list(ports: &str) -> Vec<serde_json::Value> {
    ports
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| serde_json::json!({ "portRange": p }))
        .collect()
}
