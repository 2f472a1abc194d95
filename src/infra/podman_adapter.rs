use crate::domain::{Container, ImageRef};
use crate::errors::RuntimeError;
use crate::ports::RuntimePort;
use crate::utils::podman_utils::{is_unknown_image_error, resolve_podman_binary};
use async_trait::async_trait;
use serde::de::Error as DeError;
use serde_json::Error as SerdeError;
use std::collections::HashMap;
use std::ffi::OsString;
use tokio::process::Command;

pub const OCI_VERSION_LABEL: &str = "org.opencontainers.image.version";

/// Runtime port backed by the `podman` command line.
///
/// Every call spawns its own process, so one instance can serve any number
/// of concurrent checks.
pub struct PodmanCli {
    binary: OsString,
}

impl Default for PodmanCli {
    fn default() -> Self {
        Self::new()
    }
}

impl PodmanCli {
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: resolve_podman_binary(),
        }
    }

    #[must_use]
    pub fn with_binary(binary: impl Into<OsString>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, RuntimeError> {
        Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RuntimeError::CommandExecution(format!(
                    "Failed to execute {}: {e}",
                    self.binary.to_string_lossy()
                ))
            })
    }

    /// `podman image inspect` for one image, `None` when it is not stored
    /// locally.
    async fn inspect_image(
        &self,
        image: &str,
    ) -> Result<Option<serde_json::Value>, RuntimeError> {
        let output = self.run(&["image", "inspect", image]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_unknown_image_error(&stderr) {
                return Ok(None);
            }
            return Err(RuntimeError::CommandExecution(format!(
                "podman image inspect failed: {}",
                stderr.trim()
            )));
        }
        let json = parse_json_output(&output.stdout)?;
        Ok(json.as_array().and_then(|arr| arr.first()).cloned())
    }
}

#[async_trait]
impl RuntimePort for PodmanCli {
    async fn list_containers(&self) -> Result<Vec<Container>, RuntimeError> {
        let output = self.run(&["ps", "--format", "json"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(RuntimeError::CommandExecution(format!(
                "podman ps failed: {}",
                stderr.trim()
            )));
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let json = parse_json_output(&output.stdout)?;
        Ok(containers_from_json(&json)?)
    }

    async fn is_local_image(&self, image_ref: &str) -> Result<bool, RuntimeError> {
        if image_ref
            .parse::<ImageRef>()
            .is_ok_and(|image| image.is_localhost())
        {
            return Ok(true);
        }
        // Anything pulled from a registry keeps a repo digest.
        match self.inspect_image(image_ref).await? {
            Some(inspect) => Ok(repo_digests(&inspect).is_empty()),
            None => Ok(false),
        }
    }

    async fn get_image_version(&self, image_name: &str) -> Result<String, RuntimeError> {
        Ok(self
            .inspect_image(image_name)
            .await?
            .and_then(|inspect| image_label(&inspect, OCI_VERSION_LABEL))
            .unwrap_or_default())
    }

    async fn get_image_digest(&self, image_name: &str) -> Result<String, RuntimeError> {
        let Some(inspect) = self.inspect_image(image_name).await? else {
            return Ok(String::new());
        };
        let wanted = image_name
            .parse::<ImageRef>()
            .map(|image| image.repository_path())
            .ok();
        Ok(select_repo_digest(&repo_digests(&inspect), wanted.as_deref())
            .or_else(|| {
                inspect
                    .get("Digest")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Parse podman JSON output, handling both JSON arrays and NDJSON.
pub(crate) fn parse_json_output(bytes: &[u8]) -> Result<serde_json::Value, SerdeError> {
    serde_json::from_slice(bytes).or_else(|_| {
        let mut entries = Vec::new();
        let iter = serde_json::Deserializer::from_slice(bytes).into_iter::<serde_json::Value>();
        for item in iter {
            match item {
                Ok(entry) => entries.push(entry),
                Err(_) => break,
            }
        }
        if entries.is_empty() {
            return Err(SerdeError::custom("no entries parsed from json output"));
        }
        Ok(serde_json::Value::Array(entries))
    })
}

/// Convert `podman ps --format json` output into containers.
///
/// Also accepts docker's field spellings (`ID`, a single `Names` string,
/// comma separated `Labels`).
pub(crate) fn containers_from_json(
    json: &serde_json::Value,
) -> Result<Vec<Container>, SerdeError> {
    let arr = json
        .as_array()
        .ok_or_else(|| SerdeError::custom("podman ps json must be an array"))?;

    let mut containers = Vec::new();
    for entry in arr {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let id = obj
            .get("Id")
            .or_else(|| obj.get("ID"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let name = match obj.get("Names") {
            Some(serde_json::Value::Array(names)) => names
                .first()
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            Some(serde_json::Value::String(names)) => {
                names.split(',').next().unwrap_or_default().to_string()
            }
            _ => String::new(),
        };
        let Some(image) = obj.get("Image").and_then(|v| v.as_str()) else {
            continue;
        };
        containers.push(Container {
            id,
            name: name.trim_start_matches('/').to_string(),
            image: image.to_string(),
            labels: parse_labels(obj.get("Labels")),
        });
    }
    Ok(containers)
}

fn parse_labels(value: Option<&serde_json::Value>) -> HashMap<String, String> {
    match value {
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect(),
        Some(serde_json::Value::String(raw)) => raw
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        _ => HashMap::new(),
    }
}

fn repo_digests(inspect: &serde_json::Value) -> Vec<String> {
    inspect
        .get("RepoDigests")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn image_label(inspect: &serde_json::Value, label: &str) -> Option<String> {
    inspect
        .get("Labels")
        .or_else(|| inspect.get("Config").and_then(|c| c.get("Labels")))
        .and_then(|labels| labels.get(label))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Pick the digest out of `repo@sha256:...` entries, preferring the one for
/// `repository` when given.
fn select_repo_digest(digests: &[String], repository: Option<&str>) -> Option<String> {
    let split = |entry: &String| {
        entry
            .split_once('@')
            .map(|(repo, digest)| (repo.to_string(), digest.to_string()))
    };
    let parsed: Vec<(String, String)> = digests.iter().filter_map(split).collect();
    repository
        .and_then(|wanted| {
            parsed.iter().find(|(repo, _)| {
                repo == wanted
                    || repo
                        .parse::<ImageRef>()
                        .is_ok_and(|image| image.repository_path() == wanted)
            })
        })
        .or_else(|| parsed.first())
        .map(|(_, digest)| digest.clone())
}
