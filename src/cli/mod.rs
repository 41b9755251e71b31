//! CLI definitions using clap derive API
//!
//! This module is organized into submodules for each command's argument types:
//! - install: Install command arguments and flag groups
//! - completions: Completions command arguments

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cluster::ClusterOptions;

pub mod completions;
pub mod install;

pub use completions::CompletionsArgs;
pub use install::InstallArgs;

/// Staged Linkerd installer
///
/// Renders the Kubernetes manifests that install the Linkerd control plane.
#[derive(Parser, Debug)]
#[command(
    name = "linkerd-install",
    author,
    version,
    color = clap::ColorChoice::Auto,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Output Kubernetes configs to install Linkerd",
    long_about = "Renders the Kubernetes configs necessary to install the Linkerd control plane, \
                  either in one step or split by user privilege into a cluster-wide config stage \
                  and a namespaced control-plane stage.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  linkerd-install install | kubectl apply -f -                 \x1b[90m# Default install\x1b[0m\n   \
                  linkerd-install install -l linkerdtest | kubectl apply -f -  \x1b[90m# Non-default namespace\x1b[0m\n   \
                  linkerd-install install config | kubectl apply -f -          \x1b[90m# Cluster-wide resources only\x1b[0m\n   \
                  linkerd-install install control-plane | kubectl apply -f -   \x1b[90m# Control plane only\x1b[0m\n\n\
                  "
)]
pub struct Cli {
    /// Path to the kubeconfig file to use for CLI requests
    #[arg(long, global = true, env = "KUBECONFIG", value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Name of the kubeconfig context to use
    #[arg(long, global = true, value_name = "NAME")]
    pub context: Option<String>,

    /// Username to impersonate for Kubernetes operations
    #[arg(long = "as", global = true, value_name = "USER")]
    pub impersonate: Option<String>,

    /// Group to impersonate for Kubernetes operations
    #[arg(long = "as-group", global = true, value_name = "GROUP")]
    pub impersonate_group: Vec<String>,

    /// Override kubeconfig and communicate directly with the control plane at host:port
    #[arg(long, global = true, value_name = "HOST:PORT")]
    pub api_addr: Option<String>,

    /// Namespace in which Linkerd is installed
    #[arg(long, short = 'l', global = true, env = "LINKERD_NAMESPACE", value_name = "NAMESPACE")]
    pub linkerd_namespace: Option<String>,

    /// Directory holding the linkerd2 chart and the add-on charts
    #[arg(
        long,
        global = true,
        env = "LINKERD_CHARTS_DIR",
        default_value = "charts",
        value_name = "DIR"
    )]
    pub charts_dir: PathBuf,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Cluster connection settings, falling back to `~/.kube/config`
    pub fn cluster_options(&self) -> ClusterOptions {
        let kubeconfig = self.kubeconfig.clone().or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".kube").join("config"))
                .filter(|path| path.exists())
        });

        ClusterOptions {
            kubeconfig,
            context: self.context.clone(),
            impersonate: self.impersonate.clone(),
            impersonate_group: self.impersonate_group.clone(),
            api_addr: self.api_addr.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Output Kubernetes configs to install Linkerd
    Install(InstallArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}
