//! Common test utilities for linkerd-install integration tests

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tempfile::TempDir;

/// Scratch directory doubling as `$HOME`, so no real kubeconfig is picked up
pub struct TestWorkspace {
    pub temp: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        Self { temp }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write a file in workspace and return its path
    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.temp.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    /// The binary, pointed at the shipped charts and isolated from the environment
    #[allow(deprecated)]
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("linkerd-install").expect("Failed to find binary");
        cmd.env_remove("KUBECONFIG")
            .env_remove("LINKERD_NAMESPACE")
            .env_remove("RUST_LOG")
            .env("HOME", self.path())
            .env("LINKERD_CHARTS_DIR", charts_dir());
        cmd
    }
}

pub fn charts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("charts")
}

/// Documents of a rendered manifest, skipping empty ones
pub fn documents(manifest: &str) -> Vec<serde_yaml::Value> {
    use serde::Deserialize;

    serde_yaml::Deserializer::from_str(manifest)
        .map(|document| serde_yaml::Value::deserialize(document).expect("Invalid YAML document"))
        .filter(|document| !document.is_null())
        .collect()
}

/// `Kind/name` of every document
pub fn kinds(manifest: &str) -> Vec<String> {
    documents(manifest)
        .iter()
        .map(|d| {
            format!(
                "{}/{}",
                d["kind"].as_str().unwrap_or_default(),
                d["metadata"]["name"].as_str().unwrap_or_default()
            )
        })
        .collect()
}

/// Decoded override record carried by the trailing Secret
pub fn override_record(manifest: &str) -> serde_yaml::Value {
    let documents = documents(manifest);
    let secret = documents.last().expect("Empty manifest");
    assert_eq!(secret["kind"], "Secret");
    assert_eq!(secret["metadata"]["name"], "linkerd-config-overrides");

    let encoded = secret["data"]["linkerd-config-overrides"]
        .as_str()
        .expect("Missing override payload");
    let decoded = STANDARD.decode(encoded).expect("Invalid base64");
    serde_yaml::from_slice(&decoded).expect("Invalid override record")
}
