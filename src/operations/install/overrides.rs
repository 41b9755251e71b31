//! The `linkerd-config-overrides` Secret
//!
//! Holds every value that differs from the built-in defaults, so a later
//! upgrade can rebuild the same configuration. Generated issuer credentials
//! end up here too.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::cluster::OVERRIDES_SECRET_NAME;
use crate::error::Result;
use crate::values::{self, Values};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Secret<'a> {
    api_version: &'static str,
    data: BTreeMap<&'static str, String>,
    kind: &'static str,
    metadata: Metadata<'a>,
}

#[derive(Debug, Serialize)]
struct Metadata<'a> {
    name: &'static str,
    namespace: &'a str,
}

/// YAML of the values that differ from a fresh set of defaults
pub fn override_record(values: &Values) -> Result<String> {
    let defaults = Values::new_defaults();
    let overrides = values::diff(&defaults, values)?;
    Ok(serde_yaml::to_string(&overrides)?)
}

/// Render the override Secret for `values` into `namespace`
pub fn render_overrides(values: &Values, namespace: &str) -> Result<Vec<u8>> {
    let record = override_record(values)?;

    let mut data = BTreeMap::new();
    data.insert(OVERRIDES_SECRET_NAME, STANDARD.encode(record.as_bytes()));

    let secret = Secret {
        api_version: "v1",
        data,
        kind: "Secret",
        metadata: Metadata {
            name: OVERRIDES_SECRET_NAME,
            namespace,
        },
    };
    Ok(serde_yaml::to_string(&secret)?.into_bytes())
}
