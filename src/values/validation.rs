//! Semantic validation of the effective value tree
//!
//! Runs after credential initialization and before rendering. Catches
//! settings that parse fine on their own but are inconsistent as a whole.

use std::collections::HashSet;

use regex::Regex;

use super::{ISSUER_SCHEME_EXTERNAL, ISSUER_SCHEME_LINKERD, Values};
use crate::error::Result;
use crate::error::values::invalid;
use crate::identity;

const CONTROLLER_LOG_LEVELS: &[&str] = &["panic", "fatal", "error", "warn", "info", "debug", "trace"];
const PROXY_LOG_FORMATS: &[&str] = &["plain", "json"];
const PULL_POLICIES: &[&str] = &["Always", "IfNotPresent", "Never"];

const VERSION_PATTERN: &str = r"^[A-Za-z0-9.\-]+$";

fn version_pattern() -> Result<Regex> {
    Regex::new(VERSION_PATTERN).map_err(|e| invalid(format!("invalid version pattern: {}", e)))
}

/// Validate the value tree as a whole
pub fn validate_values(values: &Values) -> Result<()> {
    if !version_pattern()?.is_match(&values.global.linkerd_version) {
        return Err(invalid(format!(
            "{} is not a valid version",
            values.global.linkerd_version
        )));
    }

    if !CONTROLLER_LOG_LEVELS.contains(&values.controller_log_level.as_str()) {
        return Err(invalid(format!(
            "--controller-log-level must be one of: {}",
            CONTROLLER_LOG_LEVELS.join(", ")
        )));
    }

    if values.controller_replicas == 0 {
        return Err(invalid("--controller-replicas must be at least 1"));
    }

    if values.enable_pod_anti_affinity && values.controller_replicas < 2 {
        return Err(invalid(
            "pod anti-affinity requires at least 2 controller replicas",
        ));
    }

    validate_identity(values)?;
    validate_proxy(values)
}

fn validate_identity(values: &Values) -> Result<()> {
    let issuer = &values.identity.issuer;
    match issuer.scheme.as_str() {
        ISSUER_SCHEME_EXTERNAL => {
            if !issuer.tls.crt_pem.is_empty() || !issuer.tls.key_pem.is_empty() {
                return Err(invalid(
                    "--identity-issuer-certificate-file and --identity-issuer-key-file must not be specified if --identity-external-issuer=true",
                ));
            }
            Ok(())
        }
        ISSUER_SCHEME_LINKERD => identity::verify_issuer_credentials(
            &values.global.identity_trust_anchors_pem,
            &issuer.tls.crt_pem,
            &issuer.tls.key_pem,
        )
        .map_err(|e| invalid(format!("failed to validate issuer credentials: {}", e))),
        other => Err(invalid(format!("unknown identity issuer scheme '{}'", other))),
    }
}

fn validate_proxy(values: &Values) -> Result<()> {
    let proxy = &values.global.proxy;

    if proxy.log_level.trim().is_empty() {
        return Err(invalid("--proxy-log-level must not be empty"));
    }

    if !PROXY_LOG_FORMATS.contains(&proxy.log_format.as_str()) {
        return Err(invalid(format!(
            "--proxy-log-format must be one of: {}",
            PROXY_LOG_FORMATS.join(", ")
        )));
    }

    for policy in [
        &values.global.image_pull_policy,
        &proxy.image.pull_policy,
        &values.global.proxy_init.image.pull_policy,
    ] {
        if !PULL_POLICIES.contains(&policy.as_str()) {
            return Err(invalid(format!(
                "--image-pull-policy must be one of: {}",
                PULL_POLICIES.join(", ")
            )));
        }
    }

    let ports = [
        ("--admin-port", proxy.ports.admin),
        ("--control-port", proxy.ports.control),
        ("--inbound-port", proxy.ports.inbound),
        ("--outbound-port", proxy.ports.outbound),
    ];
    let mut seen = HashSet::new();
    for (flag, port) in ports {
        if !seen.insert(port) {
            return Err(invalid(format!("{} {} is already used by another proxy port", flag, port)));
        }
    }

    validate_port_list("--skip-inbound-ports", &values.global.proxy_init.ignore_inbound_ports)?;
    validate_port_list("--skip-outbound-ports", &values.global.proxy_init.ignore_outbound_ports)
}

/// Accepts `80,443,8000-9000`
fn validate_port_list(flag: &str, list: &str) -> Result<()> {
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let valid = match entry.split_once('-') {
            Some((low, high)) => match (low.parse::<u16>(), high.parse::<u16>()) {
                (Ok(low), Ok(high)) => low <= high,
                _ => false,
            },
            None => entry.parse::<u16>().is_ok(),
        };
        if !valid {
            return Err(invalid(format!(
                "\"{}\" is not a valid port or port range for {}",
                entry, flag
            )));
        }
    }
    Ok(())
}
