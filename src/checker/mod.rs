pub mod container_check;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::compose::extract_service_name;
use crate::domain::{CheckReport, CheckStatus, Container, ContainerUpdate};
use crate::errors::{RuntimeError, UpdateCheckError};
use crate::ports::{RegistryPort, RuntimePort};
use crate::utils::check_logger::{CheckLogger, NullCheckLogger};

pub use container_check::check_container;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Upper bound on checks in flight at once, 0 for no bound.
    pub max_concurrency: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Cancellation and deadline for one check run.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CheckContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Token that cancels this run when triggered. Clones share state.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The reason this context is already finished, if it is.
    #[must_use]
    pub fn expired(&self) -> Option<UpdateCheckError> {
        if self.cancel.is_cancelled() {
            Some(UpdateCheckError::Cancelled)
        } else if self.deadline.is_some_and(|d| d <= Instant::now()) {
            Some(UpdateCheckError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the run is cancelled or the deadline passes.
    pub async fn done(&self) -> UpdateCheckError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.cancel.cancelled() => UpdateCheckError::Cancelled,
                () = tokio::time::sleep_until(deadline) => UpdateCheckError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                UpdateCheckError::Cancelled
            }
        }
    }
}

/// Result of [`UpdateChecker::check_for_updates`].
///
/// The report is always present. When `error` is set it holds whatever
/// finished before the run was cut short.
#[derive(Debug)]
pub struct CheckOutcome {
    pub report: CheckReport,
    pub error: Option<UpdateCheckError>,
}

impl CheckOutcome {
    fn complete(report: CheckReport) -> Self {
        Self {
            report,
            error: None,
        }
    }

    fn interrupted(report: CheckReport, error: UpdateCheckError) -> Self {
        Self {
            report,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Drop the partial report when the run did not complete.
    ///
    /// # Errors
    /// Returns the run's error if listing failed or the run was cancelled.
    pub fn into_result(self) -> Result<CheckReport, UpdateCheckError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }
}

/// Checks every running container for image updates.
pub struct UpdateChecker {
    runtime: Arc<dyn RuntimePort>,
    registry: Arc<dyn RegistryPort>,
    logger: Arc<dyn CheckLogger>,
    config: CheckerConfig,
}

impl UpdateChecker {
    pub fn new(runtime: Arc<dyn RuntimePort>, registry: Arc<dyn RegistryPort>) -> Self {
        Self {
            runtime,
            registry,
            logger: Arc::new(NullCheckLogger),
            config: CheckerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn CheckLogger>) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: CheckerConfig) -> Self {
        self.config = config;
        self
    }

    /// List containers and check each one concurrently.
    ///
    /// The outcome's error is set only when listing failed or `ctx` was
    /// cancelled or timed out before every check finished. Containers whose
    /// check failed are reported as `CheckFailed` rows and counted in
    /// `report.failed`.
    pub async fn check_for_updates(&self, ctx: &CheckContext) -> CheckOutcome {
        let mut report = CheckReport::default();

        if let Some(err) = ctx.expired() {
            return CheckOutcome::interrupted(report, err);
        }

        let listed: Result<Vec<Container>, RuntimeError> = tokio::select! {
            biased;
            err = ctx.done() => return CheckOutcome::interrupted(report, err),
            listed = self.runtime.list_containers() => listed,
        };
        let containers = match listed {
            Ok(containers) => containers,
            Err(e) => {
                self.logger.warn(&format!("failed to list containers: {e}"));
                return CheckOutcome::interrupted(report, UpdateCheckError::ListContainers(e));
            }
        };

        if containers.is_empty() {
            self.logger.info("no running containers to check");
            return CheckOutcome::complete(report);
        }

        self.logger
            .info(&format!("checking {} containers for updates", containers.len()));

        let (tx, mut rx) = mpsc::channel::<ContainerUpdate>(containers.len());
        let started = Arc::new(AtomicUsize::new(0));
        let permits = (self.config.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_concurrency)));

        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, Container> = HashMap::new();
        for container in containers {
            let runtime = Arc::clone(&self.runtime);
            let registry = Arc::clone(&self.registry);
            let logger = Arc::clone(&self.logger);
            let permits = permits.clone();
            let started = Arc::clone(&started);
            let tx = tx.clone();
            let task_container = container.clone();

            let handle = tasks.spawn(async move {
                let _permit = match permits {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return,
                    },
                    None => None,
                };
                started.fetch_add(1, Ordering::SeqCst);
                let update = check_container(
                    runtime.as_ref(),
                    registry.as_ref(),
                    &task_container,
                    logger.as_ref(),
                )
                .await;
                let _ = tx.send(update).await;
            });
            in_flight.insert(handle.id(), container);
        }
        drop(tx);
        let spawned = in_flight.len();

        let interrupted = loop {
            tokio::select! {
                biased;
                err = ctx.done() => break Some(err),
                received = rx.recv() => match received {
                    Some(update) => self.collect(&mut report, update),
                    None => break None,
                },
            }
        };

        if let Some(err) = interrupted {
            tasks.abort_all();
            while let Ok(update) = rx.try_recv() {
                self.collect(&mut report, update);
            }
            report.total_checked = started.load(Ordering::SeqCst);
            if report.updates.len() == spawned {
                // Every row was already queued when the context finished.
                self.log_summary(&report);
                return CheckOutcome::complete(report);
            }
            self.logger.warn(&format!(
                "{err}: {} of {} started checks finished",
                report.updates.len(),
                report.total_checked
            ));
            return CheckOutcome::interrupted(report, err);
        }

        // Every sender is gone; a task that panicked never sent its row.
        while let Some(joined) = tasks.join_next_with_id().await {
            if let Err(e) = joined
                && e.is_panic()
                && let Some(container) = in_flight.remove(&e.id())
            {
                let row = ContainerUpdate::for_container(&container, extract_service_name(&container))
                    .failed(format!("update check for {} panicked", container.name));
                self.collect(&mut report, row);
            }
        }

        report.total_checked = started.load(Ordering::SeqCst);
        self.log_summary(&report);
        CheckOutcome::complete(report)
    }

    /// Release the runtime connection.
    ///
    /// # Errors
    /// Returns the runtime's error if closing fails.
    pub async fn close(&self) -> Result<(), RuntimeError> {
        self.runtime.close().await
    }

    fn log_summary(&self, report: &CheckReport) {
        self.logger.info(&format!(
            "checked {} containers: {} updates available, {} failed",
            report.total_checked,
            report.updates_available().count(),
            report.failed
        ));
    }

    fn collect(&self, report: &mut CheckReport, update: ContainerUpdate) {
        match update.status {
            CheckStatus::CheckFailed => self
                .logger
                .info(&format!("{}: {}", update.container_name, update.error)),
            status => self.logger.debug(&format!(
                "{}: {} ({} -> {})",
                update.container_name,
                status.as_str(),
                update.current_version,
                update.latest_version
            )),
        }
        report.record(update);
    }
}
