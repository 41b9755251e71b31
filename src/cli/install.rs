use clap::{Args, Parser, Subcommand};

use crate::error::Result;
use crate::error::values::parse_failed;
use crate::operations::InstallMode;
use crate::values::{FlagGroup, Setting, flags::group_of};

/// Arguments for the install command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                   Default install:\n    linkerd-install install | kubectl apply -f -\n\n\
                   Render without contacting the cluster:\n    linkerd-install install --ignore-cluster\n\n\
                   Split by privilege:\n    linkerd-install install config | kubectl apply -f -\n    \
                   linkerd-install install control-plane | kubectl apply -f -\n\n\
                   Raw settings:\n    linkerd-install install --set controller-replicas=2")]
pub struct InstallArgs {
    /// Ignore the current Kubernetes cluster when checking for existing cluster configuration
    #[arg(long, global = true)]
    pub ignore_cluster: bool,

    /// Apply a setting by name, e.g. --set proxy-log-level=debug (repeatable)
    #[arg(long = "set", global = true, value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    #[command(flatten)]
    pub all_stage: AllStageFlags,

    #[command(flatten)]
    pub install_only: InstallOnlyFlags,

    #[command(flatten)]
    pub install_upgrade: InstallUpgradeFlags,

    #[command(flatten)]
    pub proxy: ProxyFlags,

    #[command(subcommand)]
    pub stage: Option<InstallStage>,
}

/// Privilege-split install stages
#[derive(Subcommand, Debug)]
pub enum InstallStage {
    /// Output Kubernetes cluster-wide resources to install Linkerd
    Config(ConfigArgs),

    /// Output Kubernetes control plane resources to install Linkerd
    ControlPlane(ControlPlaneArgs),
}

/// Arguments for `install config`
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub all_stage: AllStageFlags,
}

/// Arguments for `install control-plane`
#[derive(Args, Debug)]
pub struct ControlPlaneArgs {
    /// Skip checks for namespace existence
    #[arg(long)]
    pub skip_checks: bool,

    #[command(flatten)]
    pub all_stage: AllStageFlags,

    #[command(flatten)]
    pub install_only: InstallOnlyFlags,

    #[command(flatten)]
    pub install_upgrade: InstallUpgradeFlags,

    #[command(flatten)]
    pub proxy: ProxyFlags,
}

/// Flags accepted by every stage
#[derive(Args, Debug, Default)]
pub struct AllStageFlags {
    /// Omit the NET_ADMIN capability in the PSP and the proxy-init container when injecting the proxy;
    /// requires the linkerd-cni plugin to already be installed
    #[arg(long)]
    pub linkerd_cni_enabled: bool,

    /// Restrict the Linkerd Dashboard's default privileges to disallow Tap
    #[arg(long)]
    pub restrict_dashboard_privileges: bool,
}

impl AllStageFlags {
    fn settings(&self, out: &mut Vec<Setting>) {
        push_flag(out, "linkerd-cni-enabled", self.linkerd_cni_enabled);
        push_flag(out, "restrict-dashboard-privileges", self.restrict_dashboard_privileges);
    }
}

/// Flags only meaningful at install time
#[derive(Args, Debug, Default)]
pub struct InstallOnlyFlags {
    /// Set custom cluster domain
    #[arg(long, value_name = "DOMAIN")]
    pub cluster_domain: Option<String>,

    /// Configures the name suffix used for identities
    #[arg(long, value_name = "DOMAIN")]
    pub identity_trust_domain: Option<String>,

    /// Whether to use an external identity issuer
    #[arg(long)]
    pub identity_external_issuer: bool,

    /// Disables the heartbeat cronjob
    #[arg(long)]
    pub disable_heartbeat: bool,
}

impl InstallOnlyFlags {
    fn settings(&self, out: &mut Vec<Setting>) {
        push_value(out, "cluster-domain", &self.cluster_domain);
        push_value(out, "identity-trust-domain", &self.identity_trust_domain);
        push_flag(out, "identity-external-issuer", self.identity_external_issuer);
        push_flag(out, "disable-heartbeat", self.disable_heartbeat);
    }

    fn is_set(&self) -> bool {
        let mut out = Vec::new();
        self.settings(&mut out);
        !out.is_empty()
    }
}

/// Flags shared between install and upgrade
#[derive(Args, Debug, Default)]
pub struct InstallUpgradeFlags {
    /// Enable HA deployment config for the control plane
    #[arg(long)]
    pub ha: bool,

    /// Replicas of the controller to deploy
    #[arg(long, value_name = "N")]
    pub controller_replicas: Option<String>,

    /// Log level for the controller and web components
    #[arg(long, value_name = "LEVEL")]
    pub controller_log_level: Option<String>,

    /// Run the control plane components under this user ID
    #[arg(long, value_name = "UID")]
    pub controller_uid: Option<String>,

    /// Prevents the controller from instructing proxies to perform transparent HTTP/2 upgrading
    #[arg(long)]
    pub disable_h2_upgrade: bool,

    /// Omit the sideEffects flag in the webhook manifests
    #[arg(long)]
    pub omit_webhook_side_effects: bool,

    /// Enables Control Plane Tracing with the defaults
    #[arg(long)]
    pub control_plane_tracing: bool,

    /// The amount of time for which the Identity issuer should certify identity
    #[arg(long, value_name = "DURATION")]
    pub identity_issuance_lifetime: Option<String>,

    /// The amount of time to allow for clock skew within a Linkerd cluster
    #[arg(long, value_name = "DURATION")]
    pub identity_clock_skew_allowance: Option<String>,

    /// A path to a PEM-encoded file containing Linkerd Identity trust anchors
    #[arg(long, value_name = "FILE")]
    pub identity_trust_anchors_file: Option<String>,

    /// A path to a PEM-encoded file containing the Linkerd Identity issuer certificate
    #[arg(long, value_name = "FILE")]
    pub identity_issuer_certificate_file: Option<String>,

    /// A path to a PEM-encoded file containing the Linkerd Identity issuer private key
    #[arg(long, value_name = "FILE")]
    pub identity_issuer_key_file: Option<String>,

    /// A path to a YAML configuration file for the add-ons
    #[arg(long, value_name = "FILE")]
    pub addon_config: Option<String>,
}

impl InstallUpgradeFlags {
    fn settings(&self, out: &mut Vec<Setting>) {
        push_flag(out, "ha", self.ha);
        push_value(out, "controller-replicas", &self.controller_replicas);
        push_value(out, "controller-log-level", &self.controller_log_level);
        push_value(out, "controller-uid", &self.controller_uid);
        push_flag(out, "disable-h2-upgrade", self.disable_h2_upgrade);
        push_flag(out, "omit-webhook-side-effects", self.omit_webhook_side_effects);
        push_flag(out, "control-plane-tracing", self.control_plane_tracing);
        push_value(out, "identity-issuance-lifetime", &self.identity_issuance_lifetime);
        push_value(out, "identity-clock-skew-allowance", &self.identity_clock_skew_allowance);
        push_value(out, "identity-trust-anchors-file", &self.identity_trust_anchors_file);
        push_value(
            out,
            "identity-issuer-certificate-file",
            &self.identity_issuer_certificate_file,
        );
        push_value(out, "identity-issuer-key-file", &self.identity_issuer_key_file);
        push_value(out, "addon-config", &self.addon_config);
    }

    fn is_set(&self) -> bool {
        let mut out = Vec::new();
        self.settings(&mut out);
        !out.is_empty()
    }
}

/// Data-plane proxy flags
#[derive(Args, Debug, Default)]
pub struct ProxyFlags {
    /// Linkerd proxy container image name
    #[arg(long, value_name = "IMAGE")]
    pub proxy_image: Option<String>,

    /// Tag to be used for the Linkerd proxy images
    #[arg(long, value_name = "VERSION")]
    pub proxy_version: Option<String>,

    /// Linkerd init container image name
    #[arg(long, value_name = "IMAGE")]
    pub init_image: Option<String>,

    /// Linkerd init container image version
    #[arg(long, value_name = "VERSION")]
    pub init_image_version: Option<String>,

    /// Docker image pull policy
    #[arg(long, value_name = "POLICY")]
    pub image_pull_policy: Option<String>,

    /// Proxy port to use for inbound traffic
    #[arg(long, value_name = "PORT")]
    pub inbound_port: Option<String>,

    /// Proxy port to use for outbound traffic
    #[arg(long, value_name = "PORT")]
    pub outbound_port: Option<String>,

    /// Proxy port to serve metrics on
    #[arg(long, value_name = "PORT")]
    pub admin_port: Option<String>,

    /// Proxy port to use for control
    #[arg(long, value_name = "PORT")]
    pub control_port: Option<String>,

    /// Run the proxy under this user ID
    #[arg(long, value_name = "UID")]
    pub proxy_uid: Option<String>,

    /// Log level for the proxy
    #[arg(long, value_name = "LEVEL")]
    pub proxy_log_level: Option<String>,

    /// Log format (plain or json) for the proxy
    #[arg(long, value_name = "FORMAT")]
    pub proxy_log_format: Option<String>,

    /// Ports and/or port ranges that should skip the proxy and send directly to the application
    #[arg(long, value_name = "PORTS")]
    pub skip_inbound_ports: Option<String>,

    /// Outbound ports and/or port ranges that should skip the proxy
    #[arg(long, value_name = "PORTS")]
    pub skip_outbound_ports: Option<String>,

    /// Amount of CPU units that the proxy sidecar requests
    #[arg(long, value_name = "CPU")]
    pub proxy_cpu_request: Option<String>,

    /// Maximum amount of CPU units that the proxy sidecar can use
    #[arg(long, value_name = "CPU")]
    pub proxy_cpu_limit: Option<String>,

    /// Amount of memory that the proxy sidecar requests
    #[arg(long, value_name = "MEMORY")]
    pub proxy_memory_request: Option<String>,

    /// Maximum amount of memory that the proxy sidecar can use
    #[arg(long, value_name = "MEMORY")]
    pub proxy_memory_limit: Option<String>,

    /// Enable service profiles for non-Kubernetes services
    #[arg(long)]
    pub enable_external_profiles: bool,
}

impl ProxyFlags {
    fn settings(&self, out: &mut Vec<Setting>) {
        push_value(out, "proxy-image", &self.proxy_image);
        push_value(out, "proxy-version", &self.proxy_version);
        push_value(out, "init-image", &self.init_image);
        push_value(out, "init-image-version", &self.init_image_version);
        push_value(out, "image-pull-policy", &self.image_pull_policy);
        push_value(out, "inbound-port", &self.inbound_port);
        push_value(out, "outbound-port", &self.outbound_port);
        push_value(out, "admin-port", &self.admin_port);
        push_value(out, "control-port", &self.control_port);
        push_value(out, "proxy-uid", &self.proxy_uid);
        push_value(out, "proxy-log-level", &self.proxy_log_level);
        push_value(out, "proxy-log-format", &self.proxy_log_format);
        push_value(out, "skip-inbound-ports", &self.skip_inbound_ports);
        push_value(out, "skip-outbound-ports", &self.skip_outbound_ports);
        push_value(out, "proxy-cpu-request", &self.proxy_cpu_request);
        push_value(out, "proxy-cpu-limit", &self.proxy_cpu_limit);
        push_value(out, "proxy-memory-request", &self.proxy_memory_request);
        push_value(out, "proxy-memory-limit", &self.proxy_memory_limit);
        push_flag(out, "enable-external-profiles", self.enable_external_profiles);
    }

    fn is_set(&self) -> bool {
        let mut out = Vec::new();
        self.settings(&mut out);
        !out.is_empty()
    }
}

/// What an `install` invocation resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub mode: InstallMode,
    pub ignore_cluster: bool,
    pub skip_checks: bool,
    /// Settings in application order
    pub settings: Vec<Setting>,
}

impl InstallArgs {
    /// Resolve the mode and the ordered settings
    ///
    /// `namespace` comes from the global `--linkerd-namespace` and always
    /// applies first. Flags given before a stage subcommand count as if they
    /// were given to the stage.
    pub fn plan(&self, namespace: Option<&str>) -> Result<InstallPlan> {
        let mut settings = Vec::new();
        if let Some(namespace) = namespace {
            settings.push(Setting::new("linkerd-namespace", namespace));
        }

        let raw = self
            .set
            .iter()
            .map(|s| s.parse::<Setting>())
            .collect::<Result<Vec<_>>>()?;

        let (mode, skip_checks) = match &self.stage {
            None => {
                self.all_stage.settings(&mut settings);
                self.install_only.settings(&mut settings);
                self.install_upgrade.settings(&mut settings);
                self.proxy.settings(&mut settings);
                (InstallMode::Full, false)
            }
            Some(InstallStage::Config(stage)) => {
                self.reject_non_all_stage_flags(&raw)?;
                self.all_stage.settings(&mut settings);
                stage.all_stage.settings(&mut settings);
                (InstallMode::ConfigOnly, false)
            }
            Some(InstallStage::ControlPlane(stage)) => {
                self.all_stage.settings(&mut settings);
                stage.all_stage.settings(&mut settings);
                self.install_only.settings(&mut settings);
                stage.install_only.settings(&mut settings);
                self.install_upgrade.settings(&mut settings);
                stage.install_upgrade.settings(&mut settings);
                self.proxy.settings(&mut settings);
                stage.proxy.settings(&mut settings);
                (InstallMode::ControlPlaneOnly, stage.skip_checks)
            }
        };

        settings.extend(raw);

        Ok(InstallPlan {
            mode,
            ignore_cluster: self.ignore_cluster,
            skip_checks,
            settings,
        })
    }

    /// `install config` only takes the flags shared by every stage
    fn reject_non_all_stage_flags(&self, raw: &[Setting]) -> Result<()> {
        if self.install_only.is_set() || self.install_upgrade.is_set() || self.proxy.is_set() {
            return Err(parse_failed(
                "config",
                "only --linkerd-namespace, --linkerd-cni-enabled and --restrict-dashboard-privileges apply to the config stage",
            ));
        }

        for setting in raw {
            match group_of(&setting.name) {
                Some(FlagGroup::AllStage) | None => {}
                Some(_) => {
                    return Err(parse_failed(&setting.name, "not available for the config stage"));
                }
            }
        }
        Ok(())
    }
}

fn push_flag(out: &mut Vec<Setting>, name: &str, set: bool) {
    if set {
        out.push(Setting::new(name, "true"));
    }
}

fn push_value(out: &mut Vec<Setting>, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        out.push(Setting::new(name, value.as_str()));
    }
}
