//! Install command implementation
//!
//! Resolves the flags into settings, layers them over the defaults and hands
//! the values to the install state machine with the production collaborators.

use tracing::debug;

use crate::charts::ChartRenderer;
use crate::cli::{Cli, InstallArgs};
use crate::cluster::KubectlConnector;
use crate::error::Result;
use crate::operations::{InstallOperation, InstallOptions};
use crate::values::{Values, apply_overrides};

/// Run install command
pub fn run(cli: &Cli, args: &InstallArgs) -> Result<()> {
    let plan = args.plan(cli.linkerd_namespace.as_deref())?;
    debug!(mode = ?plan.mode, settings = plan.settings.len(), "resolved install plan");

    let mut values = Values::new_defaults();
    apply_overrides(&mut values, &plan.settings)?;

    let connector = KubectlConnector::new(cli.cluster_options());
    let engine = ChartRenderer::new(cli.charts_dir.clone());
    let options = InstallOptions {
        mode: plan.mode,
        ignore_cluster: plan.ignore_cluster,
        skip_checks: plan.skip_checks,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut operation = InstallOperation::new(&connector, &engine, options);
    let result = operation.execute(&mut values, &mut out);
    debug!(states = ?operation.states(), "install finished");
    result
}
