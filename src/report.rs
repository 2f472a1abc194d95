use crate::domain::{CheckReport, CheckStatus, ContainerUpdate, RollbackTarget};
use terminal_size::{Width, terminal_size};

const HEADERS: [&str; 6] = ["CONTAINER", "SERVICE", "IMAGE", "CURRENT", "LATEST", "STATUS"];

/// The terminal width in columns, or 80 if it can't be determined
#[must_use]
pub fn get_terminal_display_width(specify_size: Option<usize>) -> usize {
    if let Some(size) = specify_size {
        return size;
    }
    if let Some((Width(w), _)) = terminal_size() {
        w as usize
    } else {
        80
    }
}

/// Digest-pinned containers have no tag, so show the digest they run.
fn current_column(update: &ContainerUpdate) -> String {
    let current = if update.current_version.is_empty() {
        &update.current_digest
    } else {
        &update.current_version
    };
    if update.resolved_version.is_empty() {
        current.clone()
    } else {
        format!("{current} ({})", update.resolved_version)
    }
}

fn columns(update: &ContainerUpdate) -> [String; 6] {
    [
        update.container_name.clone(),
        update.service_name.clone(),
        update.image.clone(),
        current_column(update),
        update.latest_version.clone(),
        update.status.as_str().to_string(),
    ]
}

fn truncate(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    let mut out: String = line.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Render the report as a plain text table followed by a summary line.
#[must_use]
pub fn render_table(report: &CheckReport, width: usize) -> String {
    let rows: Vec<[String; 6]> = report.updates.iter().map(columns).collect();
    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        let line = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ");
        truncate(line.trim_end(), width)
    };

    let mut out = Vec::new();
    if !rows.is_empty() {
        out.push(format_row(&HEADERS.map(str::to_string)));
        for (row, update) in rows.iter().zip(report.updates.iter()) {
            out.push(format_row(row));
            if update.status == CheckStatus::CheckFailed {
                out.push(truncate(&format!("    error: {}", update.error), width));
            }
        }
    }
    out.push(summary_line(report));
    out.join("\n")
}

#[must_use]
pub fn summary_line(report: &CheckReport) -> String {
    format!(
        "{} checked, {} updates available, {} up to date, {} skipped, {} failed",
        report.total_checked,
        report.updates_available().count(),
        report.up_to_date().count(),
        report.skipped().count(),
        report.failed
    )
}

/// # Errors
/// Returns an error if serialization fails.
pub fn render_json(report: &CheckReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[must_use]
pub fn render_rollback(target: &RollbackTarget) -> String {
    if target.version.is_empty() {
        format!("no rollback target (strategy: {})", target.strategy)
    } else {
        format!("{} (strategy: {})", target.version, target.strategy)
    }
}
