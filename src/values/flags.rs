//! Settings applied on top of the default value tree
//!
//! Every install flag maps to one named setting. A setting carries the raw
//! string from the command line; coercion into the target field happens
//! here so that unknown names and bad values surface as parse errors.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_yaml::Mapping;
use tracing::debug;

use super::{AddOnKind, ISSUER_SCHEME_EXTERNAL, ISSUER_SCHEME_LINKERD, Values};
use crate::error::Result;
use crate::error::values::parse_failed;
use crate::tree;

/// Which install modes accept a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagGroup {
    /// Accepted by every stage, including `install config`
    AllStage,
    /// Only meaningful at install time
    InstallOnly,
    /// Shared between install and upgrade
    InstallUpgrade,
    /// Data-plane proxy configuration
    Proxy,
}

/// A name/value pair derived from a command-line flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub name: String,
    pub value: String,
}

impl Setting {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl FromStr for Setting {
    type Err = crate::error::InstallError;

    /// Parse `name=value`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok(Setting::new(name.trim(), value))
            }
            _ => Err(parse_failed(s, "expected NAME=VALUE")),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

type ApplyFn = fn(&mut Values, &str, &str) -> Result<()>;

struct Flag {
    name: &'static str,
    group: FlagGroup,
    apply: ApplyFn,
}

const FLAGS: &[Flag] = &[
    // All stages
    Flag {
        name: "linkerd-namespace",
        group: FlagGroup::AllStage,
        apply: |v, n, s| {
            v.global.namespace = non_empty(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "linkerd-cni-enabled",
        group: FlagGroup::AllStage,
        apply: |v, n, s| {
            v.global.cni_enabled = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "restrict-dashboard-privileges",
        group: FlagGroup::AllStage,
        apply: |v, n, s| {
            v.global.restrict_dashboard_privileges = parse(n, s)?;
            Ok(())
        },
    },
    // Install only
    Flag {
        name: "cluster-domain",
        group: FlagGroup::InstallOnly,
        apply: |v, n, s| {
            v.global.cluster_domain = non_empty(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "identity-trust-domain",
        group: FlagGroup::InstallOnly,
        apply: |v, n, s| {
            v.global.identity_trust_domain = non_empty(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "identity-external-issuer",
        group: FlagGroup::InstallOnly,
        apply: |v, n, s| {
            let external: bool = parse(n, s)?;
            v.identity.issuer.scheme = if external {
                ISSUER_SCHEME_EXTERNAL
            } else {
                ISSUER_SCHEME_LINKERD
            }
            .to_string();
            Ok(())
        },
    },
    Flag {
        name: "disable-heartbeat",
        group: FlagGroup::InstallOnly,
        apply: |v, n, s| {
            v.disable_heartbeat = parse(n, s)?;
            Ok(())
        },
    },
    // Install and upgrade
    Flag {
        name: "ha",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            if parse::<bool>(n, s)? {
                apply_ha_overlay(v);
            }
            Ok(())
        },
    },
    Flag {
        name: "controller-replicas",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.controller_replicas = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "controller-log-level",
        group: FlagGroup::InstallUpgrade,
        apply: |v, _, s| {
            v.controller_log_level = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "controller-uid",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.controller_uid = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "disable-h2-upgrade",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.enable_h2_upgrade = !parse::<bool>(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "omit-webhook-side-effects",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.omit_webhook_side_effects = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "control-plane-tracing",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.global.control_plane_tracing = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "identity-issuance-lifetime",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.identity.issuer.issuance_lifetime = non_empty(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "identity-clock-skew-allowance",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.identity.issuer.clock_skew_allowance = non_empty(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "identity-trust-anchors-file",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.global.identity_trust_anchors_pem = read_file(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "identity-issuer-certificate-file",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.identity.issuer.tls.crt_pem = read_file(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "identity-issuer-key-file",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            v.identity.issuer.tls.key_pem = read_file(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "addon-config",
        group: FlagGroup::InstallUpgrade,
        apply: |v, n, s| {
            let content = read_file(n, s)?;
            merge_addon_config(v, n, &content)
        },
    },
    // Proxy
    Flag {
        name: "proxy-image",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy.image.name = non_empty(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "proxy-version",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy.image.version = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "init-image",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy_init.image.name = non_empty(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "init-image-version",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy_init.image.version = non_empty(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "image-pull-policy",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.image_pull_policy = s.to_string();
            v.global.proxy.image.pull_policy = s.to_string();
            v.global.proxy_init.image.pull_policy = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "inbound-port",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy.ports.inbound = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "outbound-port",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy.ports.outbound = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "admin-port",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy.ports.admin = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "control-port",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy.ports.control = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "proxy-uid",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy.uid = parse(n, s)?;
            Ok(())
        },
    },
    Flag {
        name: "proxy-log-level",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy.log_level = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "proxy-log-format",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy.log_format = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "skip-inbound-ports",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy_init.ignore_inbound_ports = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "skip-outbound-ports",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy_init.ignore_outbound_ports = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "proxy-cpu-request",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy.resources.cpu.request = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "proxy-cpu-limit",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy.resources.cpu.limit = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "proxy-memory-request",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy.resources.memory.request = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "proxy-memory-limit",
        group: FlagGroup::Proxy,
        apply: |v, _, s| {
            v.global.proxy.resources.memory.limit = s.to_string();
            Ok(())
        },
    },
    Flag {
        name: "enable-external-profiles",
        group: FlagGroup::Proxy,
        apply: |v, n, s| {
            v.global.proxy.enable_external_profiles = parse(n, s)?;
            Ok(())
        },
    },
];

/// Apply settings in order, mutating `values` in place
pub fn apply_overrides(values: &mut Values, settings: &[Setting]) -> Result<()> {
    for setting in settings {
        let flag = FLAGS
            .iter()
            .find(|f| f.name == setting.name)
            .ok_or_else(|| parse_failed(&setting.name, "unknown setting"))?;
        debug!(%setting, "applying setting");
        (flag.apply)(values, flag.name, &setting.value)?;
    }
    Ok(())
}

/// The group a setting name belongs to, if it is known
pub fn group_of(name: &str) -> Option<FlagGroup> {
    FLAGS.iter().find(|f| f.name == name).map(|f| f.group)
}

/// Raise replica counts and proxy resources to the high-availability profile
fn apply_ha_overlay(values: &mut Values) {
    values.controller_replicas = 3;
    values.enable_pod_anti_affinity = true;

    let resources = &mut values.global.proxy.resources;
    resources.cpu.request = "100m".to_string();
    resources.cpu.limit = "1".to_string();
    resources.memory.request = "20Mi".to_string();
    resources.memory.limit = "250Mi".to_string();
}

fn merge_addon_config(values: &mut Values, name: &str, content: &str) -> Result<()> {
    let config: Mapping = serde_yaml::from_str(content)
        .map_err(|e| parse_failed(name, format!("invalid add-on config: {}", e)))?;

    for (key, overlay) in config {
        let addon = key
            .as_str()
            .and_then(AddOnKind::from_name)
            .ok_or_else(|| parse_failed(name, format!("unknown add-on {:?}", key)))?;
        tree::merge(values.addon_block_mut(addon), overlay);
    }
    Ok(())
}

fn parse<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| parse_failed(name, format!("{:?}: {}", raw, e)))
}

fn non_empty(name: &str, raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(parse_failed(name, "value must not be empty"));
    }
    Ok(raw.to_string())
}

fn read_file(name: &str, path: &str) -> Result<String> {
    std::fs::read_to_string(Path::new(path))
        .map_err(|e| parse_failed(name, format!("cannot read {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use serde_yaml::Value;
    use std::io::Write;

    fn apply(settings: &[(&str, &str)]) -> Result<Values> {
        let mut values = Values::new_defaults();
        let settings: Vec<Setting> = settings.iter().map(|(n, v)| Setting::new(*n, *v)).collect();
        apply_overrides(&mut values, &settings)?;
        Ok(values)
    }

    #[test]
    fn test_empty_settings_keep_defaults() {
        assert_eq!(apply(&[]).unwrap(), Values::new_defaults());
    }

    #[test]
    fn test_namespace_setting() {
        let values = apply(&[("linkerd-namespace", "l5d")]).unwrap();
        assert_eq!(values.global.namespace, "l5d");
    }

    #[test]
    fn test_unknown_setting_is_parse_error() {
        let err = apply(&[("no-such-flag", "1")]).unwrap_err();
        assert!(matches!(err, InstallError::Parse { ref name, .. } if name == "no-such-flag"));
    }

    #[test]
    fn test_bad_number_is_parse_error() {
        let err = apply(&[("controller-replicas", "three")]).unwrap_err();
        assert!(matches!(err, InstallError::Parse { .. }));
        assert!(err.to_string().contains("controller-replicas"));
    }

    #[test]
    fn test_port_out_of_range_is_parse_error() {
        assert!(apply(&[("inbound-port", "70000")]).is_err());
    }

    #[test]
    fn test_bad_bool_is_parse_error() {
        assert!(apply(&[("ha", "maybe")]).is_err());
    }

    #[test]
    fn test_settings_applied_in_order() {
        let values = apply(&[("ha", "true"), ("controller-replicas", "5")]).unwrap();
        assert_eq!(values.controller_replicas, 5);
        assert!(values.enable_pod_anti_affinity);

        let values = apply(&[("controller-replicas", "5"), ("ha", "true")]).unwrap();
        assert_eq!(values.controller_replicas, 3);
    }

    #[test]
    fn test_disable_h2_upgrade_inverts() {
        let values = apply(&[("disable-h2-upgrade", "true")]).unwrap();
        assert!(!values.enable_h2_upgrade);
    }

    #[test]
    fn test_external_issuer_switches_scheme() {
        let values = apply(&[("identity-external-issuer", "true")]).unwrap();
        assert_eq!(values.identity.issuer.scheme, ISSUER_SCHEME_EXTERNAL);
    }

    #[test]
    fn test_image_pull_policy_sets_all_images() {
        let values = apply(&[("image-pull-policy", "Always")]).unwrap();
        assert_eq!(values.global.image_pull_policy, "Always");
        assert_eq!(values.global.proxy.image.pull_policy, "Always");
        assert_eq!(values.global.proxy_init.image.pull_policy, "Always");
    }

    #[test]
    fn test_missing_file_is_parse_error() {
        let err = apply(&[("identity-issuer-key-file", "/no/such/file.key")]).unwrap_err();
        assert!(matches!(err, InstallError::Parse { .. }));
    }

    #[test]
    fn test_addon_config_merges_blocks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tracing:\n  enabled: true\n  jaeger:\n    image: custom/jaeger").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let values = apply(&[("addon-config", path.as_str())]).unwrap();

        assert_eq!(values.tracing["enabled"], Value::Bool(true));
        assert_eq!(values.tracing["jaeger"]["image"], Value::from("custom/jaeger"));
        assert_eq!(
            values.tracing["collector"]["image"],
            Value::from("omnition/opencensus-collector:0.1.11")
        );
    }

    #[test]
    fn test_addon_config_rejects_unknown_addon() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prometheus:\n  enabled: true").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let err = apply(&[("addon-config", path.as_str())]).unwrap_err();
        assert!(err.to_string().contains("unknown add-on"));
    }

    #[test]
    fn test_setting_from_str() {
        let setting: Setting = "proxy-log-level=debug,linkerd=info".parse().unwrap();
        assert_eq!(setting.name, "proxy-log-level");
        assert_eq!(setting.value, "debug,linkerd=info");
        assert!("=value".parse::<Setting>().is_err());
        assert!("novalue".parse::<Setting>().is_err());
    }

    #[test]
    fn test_group_of() {
        assert_eq!(group_of("linkerd-namespace"), Some(FlagGroup::AllStage));
        assert_eq!(group_of("ha"), Some(FlagGroup::InstallUpgrade));
        assert_eq!(group_of("proxy-uid"), Some(FlagGroup::Proxy));
        assert_eq!(group_of("bogus"), None);
    }
}
