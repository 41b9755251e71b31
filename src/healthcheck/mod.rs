//! Pre-install health checks
//!
//! [`HealthChecker`] runs an ordered list of check categories against the
//! cluster and reports every [`CheckResult`] to a visitor. Turning those
//! results into one authoritative error is a separate, pure step
//! ([`reduce_results`]): a reachability failure always wins, then resource
//! conflicts, otherwise the run is clean.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::cluster::{
    CONFIG_MAP_NAME, CONTROL_PLANE_NS_LABEL, ClusterApi, ClusterConnector, OVERRIDES_SECRET_NAME,
    ResourceKind, overrides_secret_exists,
};
use crate::error::Result;
use crate::error::cluster::{config_conflict, global_resources_exist, transport, unreachable};

/// Prefix of resources owned by the separately installed CNI plugin
const CNI_RESOURCE_PREFIX: &str = "linkerd-cni";

/// Resource kinds that must not exist before a fresh install
const GLOBAL_RESOURCE_CHECKS: [(ResourceKind, &str); 6] = [
    (ResourceKind::ClusterRole, "no ClusterRoles exist"),
    (ResourceKind::ClusterRoleBinding, "no ClusterRoleBindings exist"),
    (ResourceKind::CustomResourceDefinition, "no CustomResourceDefinitions exist"),
    (ResourceKind::MutatingWebhookConfiguration, "no MutatingWebhookConfigurations exist"),
    (ResourceKind::ValidatingWebhookConfiguration, "no ValidatingWebhookConfigurations exist"),
    (ResourceKind::PodSecurityPolicy, "no PodSecurityPolicies exist"),
];

/// Check categories, run in the order they are requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryId {
    KubernetesApi,
    PreInstallGlobalResources,
}

impl CategoryId {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryId::KubernetesApi => "kubernetes-api",
            CategoryId::PreInstallGlobalResources => "pre-install-global-resources",
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cluster resource reported by a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub kind: String,
    pub name: String,
}

impl ResourceDescriptor {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Why a check failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// Offending resources exist
    Resources(Vec<ResourceDescriptor>),
    Other(String),
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckError::Resources(resources) => {
                let names: Vec<String> = resources.iter().map(|r| r.to_string()).collect();
                write!(f, "{}", names.join(", "))
            }
            CheckError::Other(message) => f.write_str(message),
        }
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub category: CategoryId,
    pub description: String,
    pub err: Option<CheckError>,
}

impl CheckResult {
    pub fn ok(category: CategoryId, description: impl Into<String>) -> Self {
        Self {
            category,
            description: description.into(),
            err: None,
        }
    }

    pub fn failed(category: CategoryId, description: impl Into<String>, err: CheckError) -> Self {
        Self {
            category,
            description: description.into(),
            err: Some(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// Options shared by every check in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckOptions {
    pub namespace: String,
    /// Ignore resources that belong to the CNI plugin
    pub cni_enabled: bool,
    pub timeout: Option<Duration>,
}

/// Runs check categories against a cluster
pub struct HealthChecker<'a, C: ClusterConnector> {
    categories: Vec<CategoryId>,
    options: HealthCheckOptions,
    connector: &'a C,
}

impl<'a, C: ClusterConnector> HealthChecker<'a, C> {
    pub fn new(categories: Vec<CategoryId>, options: HealthCheckOptions, connector: &'a C) -> Self {
        Self {
            categories,
            options,
            connector,
        }
    }

    /// Run every category, calling `visit` once per result
    ///
    /// A failure in the `kubernetes-api` category stops the run, since no
    /// later check can say anything meaningful without API access. Returns
    /// true when every check passed.
    pub fn run_checks(&self, visit: &mut dyn FnMut(&CheckResult)) -> bool {
        let mut success = true;
        let mut client: Option<C::Client> = None;

        for category in &self.categories {
            let results = match category {
                CategoryId::KubernetesApi => self.kubernetes_api_checks(&mut client),
                CategoryId::PreInstallGlobalResources => self.global_resource_checks(&mut client),
            };

            let mut category_failed = false;
            for result in &results {
                debug!(
                    category = %result.category,
                    check = %result.description,
                    ok = result.is_ok(),
                    "health check"
                );
                category_failed |= !result.is_ok();
                visit(result);
            }

            if category_failed {
                success = false;
                if *category == CategoryId::KubernetesApi {
                    break;
                }
            }
        }

        success
    }

    fn kubernetes_api_checks(&self, client: &mut Option<C::Client>) -> Vec<CheckResult> {
        let category = CategoryId::KubernetesApi;
        let api = match self.connector.connect(self.options.timeout) {
            Ok(api) => api,
            Err(e) => {
                return vec![CheckResult::failed(
                    category,
                    "can initialize the client",
                    CheckError::Other(e.to_string()),
                )];
            }
        };

        let mut results = vec![CheckResult::ok(category, "can initialize the client")];
        match api.server_version() {
            Ok(version) => {
                debug!(%version, "kubernetes API reachable");
                results.push(CheckResult::ok(category, "can query the Kubernetes API"));
            }
            Err(e) => results.push(CheckResult::failed(
                category,
                "can query the Kubernetes API",
                CheckError::Other(e.to_string()),
            )),
        }
        *client = Some(api);
        results
    }

    fn global_resource_checks(&self, client: &mut Option<C::Client>) -> Vec<CheckResult> {
        let category = CategoryId::PreInstallGlobalResources;
        if client.is_none() {
            match self.connector.connect(self.options.timeout) {
                Ok(api) => *client = Some(api),
                Err(e) => {
                    return vec![CheckResult::failed(
                        category,
                        "can initialize the client",
                        CheckError::Other(e.to_string()),
                    )];
                }
            }
        }
        let Some(api) = client.as_ref() else {
            return Vec::new();
        };

        let selector = format!("{}={}", CONTROL_PLANE_NS_LABEL, self.options.namespace);
        GLOBAL_RESOURCE_CHECKS
            .iter()
            .map(|&(kind, description)| {
                match api.list_labeled(kind, &selector) {
                    Ok(names) => {
                        let found: Vec<ResourceDescriptor> = names
                            .into_iter()
                            .filter(|name| !(self.options.cni_enabled && name.starts_with(CNI_RESOURCE_PREFIX)))
                            .map(|name| ResourceDescriptor::new(kind.as_str(), name))
                            .collect();
                        if found.is_empty() {
                            CheckResult::ok(category, description)
                        } else {
                            CheckResult::failed(category, description, CheckError::Resources(found))
                        }
                    }
                    Err(e) => CheckResult::failed(category, description, CheckError::Other(e.to_string())),
                }
            })
            .collect()
    }
}

/// Reduce a run's results to the one error that matters
///
/// Any `kubernetes-api` failure is returned as a reachability error and
/// every other finding is dropped. Otherwise resource findings (and any
/// uncategorized failures) are joined into one conflict error.
pub fn reduce_results(results: &[CheckResult]) -> Result<()> {
    if let Some(err) = results
        .iter()
        .filter(|r| r.category == CategoryId::KubernetesApi)
        .find_map(|r| r.err.as_ref())
    {
        return Err(unreachable(err.to_string()));
    }

    let mut findings = Vec::new();
    for err in results.iter().filter_map(|r| r.err.as_ref()) {
        match err {
            CheckError::Resources(resources) => {
                findings.extend(resources.iter().map(|r| r.to_string()));
            }
            CheckError::Other(message) => findings.push(message.clone()),
        }
    }

    if findings.is_empty() {
        Ok(())
    } else {
        Err(global_resources_exist(&findings))
    }
}

/// Check API reachability and that no global resources already exist
pub fn run_preconditions<C: ClusterConnector>(options: HealthCheckOptions, connector: &C) -> Result<()> {
    let checker = HealthChecker::new(
        vec![CategoryId::KubernetesApi, CategoryId::PreInstallGlobalResources],
        options,
        connector,
    );

    let mut results = Vec::new();
    checker.run_checks(&mut |result| results.push(result.clone()));
    reduce_results(&results)
}

/// Fail if a control plane configuration already exists in `namespace`
///
/// A missing namespace, ConfigMap or override Secret is an absence signal;
/// any other lookup failure is returned as is.
pub fn check_existing_config<C: ClusterConnector>(namespace: &str, connector: &C) -> Result<()> {
    let api = connector.connect(None).map_err(|e| transport(e.to_string()))?;

    match api.get_namespace(namespace) {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            debug!(%namespace, "namespace does not exist yet");
            return Ok(());
        }
        Err(e) => return Err(transport(e.to_string())),
    }

    match api.get_config_map(namespace, CONFIG_MAP_NAME) {
        Ok(_) => {
            return Err(config_conflict(
                namespace,
                format!("'{}' configmap already exists", CONFIG_MAP_NAME),
            ));
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(transport(e.to_string())),
    }

    match overrides_secret_exists(&api, namespace) {
        Ok(true) => Err(config_conflict(
            namespace,
            format!("'{}' secret already exists", OVERRIDES_SECRET_NAME),
        )),
        Ok(false) => Ok(()),
        Err(e) => Err(transport(e.to_string())),
    }
}
