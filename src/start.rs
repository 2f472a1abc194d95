use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::args::{Args, CheckArgs, Command, RollbackArgs};
use crate::checker::{CheckContext, UpdateChecker};
use crate::domain::{BatchContainerDetail, CheckReport, RollbackTarget};
use crate::errors::AppError;
use crate::infra::podman_adapter::PodmanCli;
use crate::infra::registry_adapter::RegistryHttp;
use crate::ports::{RegistryPort, RuntimePort};
use crate::report;
use crate::rollback::resolve_rollback_version;
use crate::utils::check_logger::CliCheckLogger;
use crate::utils::log_utils::Logger;
use crate::utils::podman_utils::set_podman_binary_override;

/// Run the selected subcommand, writing its output to stdout.
///
/// # Errors
///
/// Returns an error if the check run was cut short, the registry client
/// cannot be built, or the rollback detail cannot be read.
pub async fn run_app(args: &Args) -> Result<(), AppError> {
    let logger = Logger::new(args.verbose);
    if let Some(bin) = &args.podman_bin {
        logger.debug(&format!("Using podman binary {}", bin.display()));
        set_podman_binary_override(bin.clone().into_os_string());
    }

    let mut stdout = std::io::stdout();
    match &args.command {
        Command::Check(check) => {
            let runtime: Arc<dyn RuntimePort> = Arc::new(PodmanCli::new());
            let registry: Arc<dyn RegistryPort> = Arc::new(
                RegistryHttp::new(check.registry_config())
                    .map_err(|e| AppError::InvalidArgs(e.to_string()))?,
            );
            run_check(check, &logger, runtime, registry, &mut stdout)
                .await
                .map(|_| ())
        }
        Command::Rollback(rollback) => run_rollback(rollback, &mut stdout).map(|_| ()),
    }
}

/// Check every running container and print the report.
///
/// The report is printed even when the run is cut short, so whatever
/// finished before the deadline is still shown. Ctrl-C cancels the run.
///
/// # Errors
///
/// Returns the run's error after printing the partial report, or an IO
/// error if writing the report fails.
pub async fn run_check(
    check: &CheckArgs,
    logger: &Logger,
    runtime: Arc<dyn RuntimePort>,
    registry: Arc<dyn RegistryPort>,
    out: &mut dyn Write,
) -> Result<CheckReport, AppError> {
    let checker = UpdateChecker::new(runtime, registry)
        .with_logger(Arc::new(CliCheckLogger::new(logger)))
        .with_config(check.checker_config());

    let ctx = CheckContext::with_timeout(check.timeout());
    let token = ctx.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let outcome = checker.check_for_updates(&ctx).await;
    interrupt.abort();

    if let Err(e) = checker.close().await {
        logger.warn(&format!("Failed to close runtime: {e}"));
    }

    if check.json {
        writeln!(out, "{}", report::render_json(&outcome.report)?)?;
    } else {
        let width = report::get_terminal_display_width(check.width);
        writeln!(out, "{}", report::render_table(&outcome.report, width))?;
    }

    Ok(outcome.into_result()?)
}

/// Resolve and print the rollback target for a recorded batch detail.
///
/// # Errors
///
/// Returns an error if the detail file cannot be read or parsed.
pub fn run_rollback(rollback: &RollbackArgs, out: &mut dyn Write) -> Result<RollbackTarget, AppError> {
    let detail = read_batch_detail(&rollback.detail_json)?;
    let target = resolve_rollback_version(&detail);
    if rollback.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&target)?)?;
    } else {
        writeln!(out, "{}", report::render_rollback(&target))?;
    }
    Ok(target)
}

/// Read a [`BatchContainerDetail`] from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid JSON.
pub fn read_batch_detail(path: &Path) -> Result<BatchContainerDetail, AppError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
