//! Test fixtures shared by unit tests.
//!
//! - [`FakeCluster`]: An in-memory cluster implementing both
//!   [`ClusterConnector`] and [`ClusterApi`], with builder methods to seed
//!   objects and inject failures
//! - [`FakeEngine`]: A template engine that emits one `# Source:` header per
//!   template, so tests can assert on ordering without real charts
//! - [`values_with_credentials`]: Defaults plus freshly generated issuer
//!   credentials
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_fixtures::{FakeCluster, FakeEngine};
//!
//! let cluster = FakeCluster::new()
//!     .with_namespace("linkerd")
//!     .with_labeled(ResourceKind::ClusterRole, &["linkerd-linkerd-controller"]);
//! let engine = FakeEngine::new();
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::charts::{Chart, TemplateEngine};
use crate::cluster::{
    CONFIG_MAP_NAME, ClusterApi, ClusterConnector, ClusterError, OVERRIDES_SECRET_NAME, Object,
    ResourceKind,
};
use crate::error::Result;
use crate::error::render::render_failed;
use crate::identity::initialize_issuer_credentials;
use crate::values::Values;

/// In-memory cluster
///
/// Clones share the call log, so the connector handed to the code under test
/// and the copy kept by the test observe the same calls.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    namespaces: Vec<String>,
    config_maps: HashMap<(String, String), Object>,
    secrets: HashMap<(String, String), Object>,
    labeled: HashMap<ResourceKind, Vec<String>>,
    connect_error: Option<String>,
    version_error: Option<String>,
    namespace_error: Option<String>,
    config_map_error: Option<String>,
    secret_error: Option<String>,
    list_error: Option<String>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connection attempt fails with `message`
    #[must_use]
    pub fn unreachable(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    /// Connections succeed but the version probe fails
    #[must_use]
    pub fn unqueryable(mut self, message: &str) -> Self {
        self.version_error = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespaces.push(namespace.to_string());
        self
    }

    #[must_use]
    pub fn with_config_map(mut self, namespace: &str, name: &str) -> Self {
        let object = serde_json::json!({
            "kind": "ConfigMap",
            "metadata": { "name": name, "namespace": namespace },
        });
        self.config_maps.insert((namespace.to_string(), name.to_string()), object);
        self
    }

    /// Seed a Secret; values are base64-encoded like the API returns them
    #[must_use]
    pub fn with_secret(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        let data: serde_json::Map<String, serde_json::Value> = data
            .iter()
            .map(|(key, value)| (key.to_string(), STANDARD.encode(value).into()))
            .collect();
        let object = serde_json::json!({
            "kind": "Secret",
            "metadata": { "name": name, "namespace": namespace },
            "data": data,
        });
        self.secrets.insert((namespace.to_string(), name.to_string()), object);
        self
    }

    #[must_use]
    pub fn with_overrides_secret(self, namespace: &str, overrides: &str) -> Self {
        self.with_secret(namespace, OVERRIDES_SECRET_NAME, &[(OVERRIDES_SECRET_NAME, overrides)])
    }

    /// Resources of `kind` carrying the control plane label
    #[must_use]
    pub fn with_labeled(mut self, kind: ResourceKind, names: &[&str]) -> Self {
        self.labeled
            .entry(kind)
            .or_default()
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    #[must_use]
    pub fn failing_namespaces(mut self, message: &str) -> Self {
        self.namespace_error = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn failing_config_maps(mut self, message: &str) -> Self {
        self.config_map_error = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn failing_secrets(mut self, message: &str) -> Self {
        self.secret_error = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn failing_lists(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// Calls made so far, such as `connect` or `get_secret linkerd/linkerd-config-overrides`
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn connections(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("connect")).count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn not_found(kind: &str, name: &str) -> ClusterError {
        ClusterError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

impl ClusterConnector for FakeCluster {
    type Client = FakeCluster;

    fn connect(&self, timeout: Option<Duration>) -> std::result::Result<FakeCluster, ClusterError> {
        self.record(format!("connect {:?}", timeout));
        match &self.connect_error {
            Some(message) => Err(ClusterError::Transport(message.clone())),
            None => Ok(self.clone()),
        }
    }
}

impl ClusterApi for FakeCluster {
    fn server_version(&self) -> std::result::Result<String, ClusterError> {
        self.record("server_version".to_string());
        match &self.version_error {
            Some(message) => Err(ClusterError::Transport(message.clone())),
            None => Ok("v1.18.2".to_string()),
        }
    }

    fn get_namespace(&self, name: &str) -> std::result::Result<Object, ClusterError> {
        self.record(format!("get_namespace {}", name));
        if let Some(message) = &self.namespace_error {
            return Err(ClusterError::Transport(message.clone()));
        }
        if self.namespaces.iter().any(|n| n == name) {
            Ok(serde_json::json!({ "kind": "Namespace", "metadata": { "name": name } }))
        } else {
            Err(Self::not_found("namespaces", name))
        }
    }

    fn get_config_map(&self, namespace: &str, name: &str) -> std::result::Result<Object, ClusterError> {
        self.record(format!("get_config_map {}/{}", namespace, name));
        if let Some(message) = &self.config_map_error {
            return Err(ClusterError::Transport(message.clone()));
        }
        self.config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found("configmaps", name))
    }

    fn get_secret(&self, namespace: &str, name: &str) -> std::result::Result<Object, ClusterError> {
        self.record(format!("get_secret {}/{}", namespace, name));
        if let Some(message) = &self.secret_error {
            return Err(ClusterError::Transport(message.clone()));
        }
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found("secrets", name))
    }

    fn list_labeled(&self, kind: ResourceKind, label: &str) -> std::result::Result<Vec<String>, ClusterError> {
        self.record(format!("list_labeled {} {}", kind.plural(), label));
        if let Some(message) = &self.list_error {
            return Err(ClusterError::Transport(message.clone()));
        }
        Ok(self.labeled.get(&kind).cloned().unwrap_or_default())
    }
}

/// Cluster holding a complete previous installation in `namespace`
#[must_use]
pub fn installed_cluster(namespace: &str) -> FakeCluster {
    FakeCluster::new()
        .with_namespace(namespace)
        .with_config_map(namespace, CONFIG_MAP_NAME)
        .with_labeled(ResourceKind::ClusterRole, &["linkerd-linkerd-controller"])
        .with_labeled(
            ResourceKind::CustomResourceDefinition,
            &["serviceprofiles.linkerd.io", "trafficsplits.split.smi-spec.io"],
        )
}

/// Template engine that renders each template as its `# Source:` header
///
/// Partials (`_` prefixed files), `Chart.yaml` and `values.yaml` produce no
/// output, matching the real renderer.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    fail_chart: Option<String>,
    rendered: Rc<RefCell<Vec<Chart>>>,
}

impl FakeEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendering the chart named `chart` fails
    #[must_use]
    pub fn failing_on(mut self, chart: &str) -> Self {
        self.fail_chart = Some(chart.to_string());
        self
    }

    /// Charts rendered so far, in order
    pub fn charts(&self) -> Vec<Chart> {
        self.rendered.borrow().clone()
    }
}

impl TemplateEngine for FakeEngine {
    fn render(&self, chart: &Chart) -> Result<Vec<u8>> {
        self.rendered.borrow_mut().push(chart.clone());
        if self.fail_chart.as_deref() == Some(chart.name.as_str()) {
            return Err(render_failed(&chart.name, "template failed"));
        }

        let mut out = String::new();
        for file in chart.files.iter().filter(|f| f.starts_with("templates/")) {
            let partial = file.rsplit('/').next().is_some_and(|name| name.starts_with('_'));
            if !partial {
                out.push_str(&format!("---\n# Source: {}/{}\n", chart.name, file));
            }
        }
        Ok(out.into_bytes())
    }
}

/// Defaults plus generated issuer credentials, ready for validation
///
/// # Panics
///
/// Panics if credentials cannot be generated.
#[must_use]
pub fn values_with_credentials() -> Values {
    let mut values = Values::new_defaults();
    initialize_issuer_credentials::<FakeCluster>(&mut values, None)
        .expect("Failed to generate issuer credentials");
    values
}
