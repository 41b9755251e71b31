//! Kubernetes API access
//!
//! The installer only needs a handful of reads: server version, namespaces,
//! ConfigMaps, Secrets and labelled cluster-scoped resources. These sit
//! behind [`ClusterApi`] so the orchestration logic can run against a fake
//! cluster in tests. Each interaction opens its own session through a
//! [`ClusterConnector`].

pub mod kubectl;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

pub use kubectl::KubectlConnector;

/// Name of the ConfigMap holding the control plane configuration
pub const CONFIG_MAP_NAME: &str = "linkerd-config";

/// Name of the Secret (and its data key) holding the override record
pub const OVERRIDES_SECRET_NAME: &str = "linkerd-config-overrides";

/// Label placed on every global resource owned by a control plane
pub const CONTROL_PLANE_NS_LABEL: &str = "linkerd.io/control-plane-ns";

/// Outcome of a failed API call, with not-found kept distinguishable
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    #[error("{0}")]
    Transport(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

/// Connection settings shared by every cluster interaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterOptions {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub impersonate: Option<String>,
    pub impersonate_group: Vec<String>,
    pub api_addr: Option<String>,
}

/// Cluster-scoped resource kinds inspected by pre-install checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ClusterRole,
    ClusterRoleBinding,
    CustomResourceDefinition,
    MutatingWebhookConfiguration,
    ValidatingWebhookConfiguration,
    PodSecurityPolicy,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::ClusterRole => "ClusterRole",
            ResourceKind::ClusterRoleBinding => "ClusterRoleBinding",
            ResourceKind::CustomResourceDefinition => "CustomResourceDefinition",
            ResourceKind::MutatingWebhookConfiguration => "MutatingWebhookConfiguration",
            ResourceKind::ValidatingWebhookConfiguration => "ValidatingWebhookConfiguration",
            ResourceKind::PodSecurityPolicy => "PodSecurityPolicy",
        }
    }

    /// Resource name as understood by `kubectl get`
    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::ClusterRole => "clusterroles",
            ResourceKind::ClusterRoleBinding => "clusterrolebindings",
            ResourceKind::CustomResourceDefinition => "customresourcedefinitions",
            ResourceKind::MutatingWebhookConfiguration => "mutatingwebhookconfigurations",
            ResourceKind::ValidatingWebhookConfiguration => "validatingwebhookconfigurations",
            ResourceKind::PodSecurityPolicy => "podsecuritypolicies",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object fetched from the API, as returned by the server
pub type Object = serde_json::Value;

/// Read-only view of the cluster used by the installer
pub trait ClusterApi {
    /// Server version string; doubles as the "can query the API" probe
    fn server_version(&self) -> Result<String, ClusterError>;

    fn get_namespace(&self, name: &str) -> Result<Object, ClusterError>;

    fn get_config_map(&self, namespace: &str, name: &str) -> Result<Object, ClusterError>;

    fn get_secret(&self, namespace: &str, name: &str) -> Result<Object, ClusterError>;

    /// Names of resources of `kind` carrying the `label` key
    fn list_labeled(&self, kind: ResourceKind, label: &str) -> Result<Vec<String>, ClusterError>;
}

/// Opens a client session; `timeout` bounds every request of that session
pub trait ClusterConnector {
    type Client: ClusterApi;

    fn connect(&self, timeout: Option<Duration>) -> Result<Self::Client, ClusterError>;
}

/// Decode one base64 data key of a Secret object
pub fn secret_data(secret: &Object, key: &str) -> Option<Vec<u8>> {
    let encoded = secret.get("data")?.get(key)?.as_str()?;
    STANDARD.decode(encoded).ok()
}

/// Whether the persisted override record exists in `namespace`
///
/// Existence is decided by the lookup alone; the payload is not read, so a
/// record that cannot be parsed still counts. Not-found is an absence
/// signal and every other failure is propagated.
pub fn overrides_secret_exists<A: ClusterApi>(api: &A, namespace: &str) -> Result<bool, ClusterError> {
    match api.get_secret(namespace, OVERRIDES_SECRET_NAME) {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
