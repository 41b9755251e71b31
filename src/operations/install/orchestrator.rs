//! Install state machine
//!
//! Every mode walks the same states, `Start` through `Done`, skipping the
//! ones it has no use for. Any error moves the run to `Aborted` and nothing
//! is written to the output.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::render::render;
use crate::charts::{Stage, TemplateEngine};
use crate::cluster::{ClusterApi, ClusterConnector, OVERRIDES_SECRET_NAME, overrides_secret_exists};
use crate::error::Result;
use crate::error::cluster::{config_conflict, global_resources_missing, transport, unreachable};
use crate::healthcheck::{HealthCheckOptions, check_existing_config, run_preconditions};
use crate::identity::initialize_issuer_credentials;
use crate::values::Values;
use crate::values::validation::validate_values;

/// Bound on establishing a cluster session
pub const CLUSTER_TIMEOUT: Duration = Duration::from_secs(30);

/// Entry point into the install state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMode {
    /// Everything in one manifest
    #[default]
    Full,
    /// Cluster-wide resources only
    ConfigOnly,
    /// Namespaced control plane only, after `ConfigOnly` was applied
    ControlPlaneOnly,
}

impl InstallMode {
    pub fn stage(self) -> Stage {
        match self {
            InstallMode::Full => Stage::All,
            InstallMode::ConfigOnly => Stage::Config,
            InstallMode::ControlPlaneOnly => Stage::ControlPlane,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Start,
    ClusterCheck,
    ExistingInstallCheck,
    CredentialInit,
    ValueValidation,
    Render,
    Done,
    Aborted,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Options for one install run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    pub mode: InstallMode,
    /// Never contact the cluster
    pub ignore_cluster: bool,
    /// Skip the global resource precondition of the control-plane stage
    pub skip_checks: bool,
}

/// One orchestrated install run
pub struct InstallOperation<'a, C: ClusterConnector, E: TemplateEngine> {
    connector: &'a C,
    engine: &'a E,
    options: InstallOptions,
    states: Vec<InstallState>,
}

impl<'a, C: ClusterConnector, E: TemplateEngine> InstallOperation<'a, C, E> {
    pub fn new(connector: &'a C, engine: &'a E, options: InstallOptions) -> Self {
        Self {
            connector,
            engine,
            options,
            states: Vec::new(),
        }
    }

    /// States visited so far, in order
    pub fn states(&self) -> &[InstallState] {
        &self.states
    }

    /// Run the state machine, writing the manifest to `out` on success
    pub fn execute(&mut self, values: &mut Values, out: &mut dyn Write) -> Result<()> {
        self.enter(InstallState::Start);

        let manifest = match self.run(values) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(error = %e, "install aborted");
                self.enter(InstallState::Aborted);
                return Err(e);
            }
        };

        if let Err(e) = out.write_all(&manifest).and_then(|_| out.flush()) {
            self.enter(InstallState::Aborted);
            return Err(e.into());
        }

        self.enter(InstallState::Done);
        Ok(())
    }

    fn run(&mut self, values: &mut Values) -> Result<Vec<u8>> {
        let namespace = values.global.namespace.clone();

        match self.options.mode {
            InstallMode::Full => {
                let client = if self.options.ignore_cluster {
                    None
                } else {
                    self.enter(InstallState::ClusterCheck);
                    Some(self.connect()?)
                };

                self.enter(InstallState::ExistingInstallCheck);
                if let Some(api) = &client {
                    let exists = overrides_secret_exists(api, &namespace).map_err(|e| transport(e.to_string()))?;
                    if exists {
                        return Err(config_conflict(
                            &namespace,
                            format!("Secret/{} already exists", OVERRIDES_SECRET_NAME),
                        ));
                    }
                }

                self.enter(InstallState::CredentialInit);
                initialize_issuer_credentials(values, client.as_ref())?;

                self.enter(InstallState::ValueValidation);
                validate_values(values)?;
            }
            InstallMode::ConfigOnly => {
                if !self.options.ignore_cluster {
                    self.enter(InstallState::ClusterCheck);
                    run_preconditions(self.health_options(values), self.connector)?;
                }
            }
            InstallMode::ControlPlaneOnly => {
                if !self.options.skip_checks && !self.options.ignore_cluster {
                    self.enter(InstallState::ClusterCheck);
                    self.require_global_resources(values)?;
                }

                if !self.options.ignore_cluster {
                    self.enter(InstallState::ExistingInstallCheck);
                    check_existing_config(&namespace, self.connector)?;
                }

                self.enter(InstallState::ValueValidation);
                validate_values(values)?;
            }
        }

        self.enter(InstallState::Render);
        values.refresh_configs()?;
        render(self.engine, values, self.options.mode.stage())
    }

    /// Open a session and make sure the API answers
    fn connect(&self) -> Result<C::Client> {
        let client = self
            .connector
            .connect(Some(CLUSTER_TIMEOUT))
            .map_err(|e| unreachable(e.to_string()))?;
        let version = client.server_version().map_err(|e| unreachable(e.to_string()))?;
        debug!(%version, "connected to cluster");
        Ok(client)
    }

    /// The control-plane stage expects the config stage to be applied already
    fn require_global_resources(&self, values: &Values) -> Result<()> {
        match run_preconditions(self.health_options(values), self.connector) {
            Ok(()) => Err(global_resources_missing(&values.global.namespace)),
            Err(e) if e.is_conflict() => {
                debug!("global resources present");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn health_options(&self, values: &Values) -> HealthCheckOptions {
        HealthCheckOptions {
            namespace: values.global.namespace.clone(),
            cni_enabled: values.global.cni_enabled,
            timeout: Some(CLUSTER_TIMEOUT),
        }
    }

    fn enter(&mut self, state: InstallState) {
        info!(%state, mode = ?self.options.mode, "install state");
        self.states.push(state);
    }
}
