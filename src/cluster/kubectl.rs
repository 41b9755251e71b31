//! `kubectl`-backed cluster client
//!
//! Every call shells out to `kubectl ... -o json` with the configured
//! kubeconfig, context, impersonation and server flags.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;

use super::{ClusterApi, ClusterConnector, ClusterError, ClusterOptions, Object, ResourceKind};

/// Creates [`KubectlClient`] sessions from shared connection options
#[derive(Debug, Clone)]
pub struct KubectlConnector {
    options: ClusterOptions,
}

impl KubectlConnector {
    pub fn new(options: ClusterOptions) -> Self {
        Self { options }
    }
}

impl ClusterConnector for KubectlConnector {
    type Client = KubectlClient;

    fn connect(&self, timeout: Option<Duration>) -> Result<KubectlClient, ClusterError> {
        let binary = which::which("kubectl")
            .map_err(|e| ClusterError::Transport(format!("kubectl not found in PATH: {}", e)))?;

        if let Some(path) = &self.options.kubeconfig {
            if !path.exists() {
                return Err(ClusterError::Transport(format!(
                    "kubeconfig {} does not exist",
                    path.display()
                )));
            }
        }

        let mut base_args = Vec::new();
        if let Some(path) = &self.options.kubeconfig {
            base_args.push(format!("--kubeconfig={}", path.display()));
        }
        if let Some(context) = &self.options.context {
            base_args.push(format!("--context={}", context));
        }
        if let Some(user) = &self.options.impersonate {
            base_args.push(format!("--as={}", user));
        }
        for group in &self.options.impersonate_group {
            base_args.push(format!("--as-group={}", group));
        }
        if let Some(server) = &self.options.api_addr {
            base_args.push(format!("--server={}", server));
        }
        if let Some(timeout) = timeout {
            base_args.push(format!("--request-timeout={}s", timeout.as_secs().max(1)));
        }

        Ok(KubectlClient { binary, base_args })
    }
}

/// One client session
#[derive(Debug, Clone)]
pub struct KubectlClient {
    binary: PathBuf,
    base_args: Vec<String>,
}

impl KubectlClient {
    fn run(&self, args: &[&str]) -> Result<Object, ClusterError> {
        debug!(?args, "running kubectl");
        let output = Command::new(&self.binary)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ClusterError::Transport(format!("failed to execute kubectl: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(args, stderr));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ClusterError::Transport(format!("unexpected kubectl output: {}", e)))
    }

    fn get(&self, resource: &str, namespace: Option<&str>, name: &str) -> Result<Object, ClusterError> {
        let mut args = vec!["get", resource, name, "-o", "json"];
        if let Some(namespace) = namespace {
            args.push("-n");
            args.push(namespace);
        }
        self.run(&args)
    }
}

impl ClusterApi for KubectlClient {
    fn server_version(&self) -> Result<String, ClusterError> {
        let version = self.run(&["version", "-o", "json"])?;
        version
            .get("serverVersion")
            .and_then(|v| v.get("gitVersion"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ClusterError::Transport("cluster did not report a server version".to_string()))
    }

    fn get_namespace(&self, name: &str) -> Result<Object, ClusterError> {
        self.get("namespace", None, name)
    }

    fn get_config_map(&self, namespace: &str, name: &str) -> Result<Object, ClusterError> {
        self.get("configmap", Some(namespace), name)
    }

    fn get_secret(&self, namespace: &str, name: &str) -> Result<Object, ClusterError> {
        self.get("secret", Some(namespace), name)
    }

    fn list_labeled(&self, kind: ResourceKind, label: &str) -> Result<Vec<String>, ClusterError> {
        let list = self.run(&["get", kind.plural(), "-l", label, "-o", "json"])?;
        Ok(item_names(&list))
    }
}

/// Map a failed invocation to not-found or transport
fn classify_failure(args: &[&str], stderr: String) -> ClusterError {
    if stderr.contains("(NotFound)") || stderr.contains("NotFound") {
        let kind = args.get(1).copied().unwrap_or("resource").to_string();
        let name = args.get(2).copied().unwrap_or_default().to_string();
        return ClusterError::NotFound { kind, name };
    }
    ClusterError::Transport(stderr)
}

fn item_names(list: &Object) -> Vec<String> {
    list.get("items")
        .and_then(|items| items.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.pointer("/metadata/name")?.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
