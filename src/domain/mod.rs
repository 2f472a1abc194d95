pub mod image_ref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use image_ref::ImageRef;

/// A running container as reported by the container runtime.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    UpToDate,
    UpdateAvailable,
    CheckFailed,
    /// Image only exists locally, there is no registry to compare against.
    Skipped,
}

impl CheckStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::UpToDate => "up to date",
            CheckStatus::UpdateAvailable => "update available",
            CheckStatus::CheckFailed => "check failed",
            CheckStatus::Skipped => "skipped",
        }
    }
}

/// One row of a [`CheckReport`].
///
/// `error` is non-empty exactly when `status` is [`CheckStatus::CheckFailed`].
/// Rows are built through the constructors below so that holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUpdate {
    pub container_id: String,
    pub container_name: String,
    pub service_name: String,
    pub image: String,
    pub current_version: String,
    pub resolved_version: String,
    pub latest_version: String,
    pub current_digest: String,
    pub latest_digest: String,
    pub status: CheckStatus,
    pub error: String,
}

impl ContainerUpdate {
    /// Start a row for `container`; the status is filled in by one of the
    /// finishing methods.
    #[must_use]
    pub fn for_container(container: &Container, service_name: String) -> Self {
        Self {
            container_id: container.id.clone(),
            container_name: container.name.clone(),
            service_name,
            image: container.image.clone(),
            current_version: String::new(),
            resolved_version: String::new(),
            latest_version: String::new(),
            current_digest: String::new(),
            latest_digest: String::new(),
            status: CheckStatus::UpToDate,
            error: String::new(),
        }
    }

    #[must_use]
    pub fn up_to_date(mut self) -> Self {
        self.status = CheckStatus::UpToDate;
        self.error.clear();
        self
    }

    #[must_use]
    pub fn update_available(mut self) -> Self {
        self.status = CheckStatus::UpdateAvailable;
        self.error.clear();
        self
    }

    #[must_use]
    pub fn skipped(mut self) -> Self {
        self.status = CheckStatus::Skipped;
        self.error.clear();
        self
    }

    /// Mark the row failed. The latest version is cleared since nothing
    /// trustworthy was discovered.
    #[must_use]
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        self.status = CheckStatus::CheckFailed;
        self.latest_version.clear();
        self.latest_digest.clear();
        self.error = if error.trim().is_empty() {
            "update check failed".to_string()
        } else {
            error
        };
        self
    }
}

/// Aggregate result of one update-check run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub total_checked: usize,
    pub failed: usize,
    pub updates: Vec<ContainerUpdate>,
    pub checked_at: DateTime<Utc>,
}

impl Default for CheckReport {
    fn default() -> Self {
        Self {
            total_checked: 0,
            failed: 0,
            updates: Vec::new(),
            checked_at: Utc::now(),
        }
    }
}

impl CheckReport {
    /// Append a completed row, keeping `failed` in step.
    pub fn record(&mut self, update: ContainerUpdate) {
        if update.status == CheckStatus::CheckFailed {
            self.failed += 1;
        }
        self.updates.push(update);
    }

    pub fn updates_available(&self) -> impl Iterator<Item = &ContainerUpdate> {
        self.with_status(CheckStatus::UpdateAvailable)
    }

    pub fn up_to_date(&self) -> impl Iterator<Item = &ContainerUpdate> {
        self.with_status(CheckStatus::UpToDate)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ContainerUpdate> {
        self.with_status(CheckStatus::Skipped)
    }

    fn with_status(&self, status: CheckStatus) -> impl Iterator<Item = &ContainerUpdate> {
        self.updates.iter().filter(move |u| u.status == status)
    }
}

/// Recorded version transition of one container in an update batch.
/// Empty strings mean the value was not recorded.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchContainerDetail {
    pub old_version: String,
    pub new_version: String,
    pub old_resolved_version: String,
    pub new_resolved_version: String,
    pub old_digest: String,
    pub new_digest: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackStrategy {
    Tag,
    Resolved,
    Digest,
    None,
}

impl RollbackStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RollbackStrategy::Tag => "tag",
            RollbackStrategy::Resolved => "resolved",
            RollbackStrategy::Digest => "digest",
            RollbackStrategy::None => "none",
        }
    }
}

impl std::fmt::Display for RollbackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackTarget {
    pub version: String,
    pub strategy: RollbackStrategy,
}

impl RollbackTarget {
    #[must_use]
    pub fn none() -> Self {
        Self {
            version: String::new(),
            strategy: RollbackStrategy::None,
        }
    }
}
