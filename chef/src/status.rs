// chef/src/status.rs
// Terminal rendering of engine events and update reports.

use std::collections::HashMap;
use std::time::Duration;

use chef_common::model::InstallKind;
use chef_common::{ChefEvent, CheckStatus};
use chef_core::{InstallOutcome, UpdateReport, UpdateRow};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use prettytable::{format, Cell, Row, Table};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Live progress output for one command, fed from the event channel.
pub struct StatusDisplay {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl StatusDisplay {
    pub fn start(events: broadcast::Receiver<ChefEvent>) -> Self {
        let stop = CancellationToken::new();
        let handle = tokio::spawn(handle_events(events, stop.clone()));
        Self { stop, handle }
    }

    /// Renders whatever is still queued, then stops listening.
    pub async fn finish(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}

fn install_bar(name: &str, version: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg} {bytes}/{total_bytes}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(format!("{} {}", name.cyan(), version));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn message_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn render(event: ChefEvent, bars: &mut HashMap<String, ProgressBar>) {
    match event {
        ChefEvent::Phase { message } => {
            println!("{}{}", "==> ".bold().blue(), message.bold());
        }
        ChefEvent::InstallStarted { name, version } => {
            let bar = install_bar(&name, &version);
            bars.insert(name, bar);
        }
        ChefEvent::Progress {
            name,
            loaded,
            total,
        } => {
            if let Some(bar) = bars.get(&name) {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(loaded);
            }
        }
        ChefEvent::InstallFinished { name, version } => {
            let message = format!("{} {} {}", "✓".green().bold(), name.green(), version);
            match bars.remove(&name) {
                Some(bar) => {
                    bar.set_style(message_style());
                    bar.finish_with_message(message);
                }
                None => println!("{message}"),
            }
        }
        ChefEvent::InstallFailed { name, error } => {
            let message = format!("{} {}: {}", "✗".red().bold(), name.cyan(), error.red());
            match bars.remove(&name) {
                Some(bar) => {
                    bar.set_style(message_style());
                    bar.abandon_with_message(message);
                }
                None => println!("{message}"),
            }
        }
        ChefEvent::UpdateFinished { cancelled: true, .. } => {
            println!("{}", "Update cancelled".yellow().bold());
        }
        ChefEvent::VersionChecked { .. }
        | ChefEvent::StatusChanged { .. }
        | ChefEvent::UpdateFinished { .. } => {}
    }
}

async fn handle_events(mut events: broadcast::Receiver<ChefEvent>, stop: CancellationToken) {
    let mut bars = HashMap::new();
    loop {
        let received = tokio::select! {
            biased;
            received = events.recv() => received,
            _ = stop.cancelled() => {
                while let Ok(event) = events.try_recv() {
                    render(event, &mut bars);
                }
                break;
            }
        };
        match received {
            Ok(event) => render(event, &mut bars),
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    for (_, bar) in bars.drain() {
        bar.finish_and_clear();
    }
}

pub fn kind_label(kind: &InstallKind) -> String {
    match kind {
        InstallKind::File => "file".to_string(),
        InstallKind::Dir(_) => "dir".to_string(),
        InstallKind::Extern(command) => format!("extern ({command})"),
    }
}

fn status_cell(row: &UpdateRow) -> Cell {
    match (&row.status, &row.outcome) {
        (_, Some(InstallOutcome::Installed(version))) => {
            Cell::new(&format!("installed {version}")).style_spec("Fg")
        }
        (_, Some(InstallOutcome::Failed(reason))) => {
            Cell::new(&format!("failed: {reason}")).style_spec("Fr")
        }
        (_, Some(InstallOutcome::NotStarted)) => Cell::new("not started").style_spec("Fy"),
        (CheckStatus::UpToDate, None) => Cell::new("up to date"),
        (CheckStatus::NeedsUpdate { latest, .. }, None) => {
            Cell::new(&format!("update to {latest}")).style_spec("Fy")
        }
        (CheckStatus::Skipped(reason), None) => Cell::new(&format!("skipped ({reason})")),
        (CheckStatus::Error(reason), None) => {
            Cell::new(&format!("error: {reason}")).style_spec("Fr")
        }
    }
}

/// Prints one table row per checked recipe, then the summary line.
pub fn print_update_report(report: &UpdateReport) {
    if report.rows.is_empty() {
        println!("{}", "No recipes to check".yellow());
        return;
    }
    let show_change_log = report.dry_run && report.pending().any(|r| r.change_log.is_some());

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    let mut header = vec![
        Cell::new("Name").style_spec("b"),
        Cell::new("Installed").style_spec("b"),
        Cell::new("Status").style_spec("b"),
    ];
    if show_change_log {
        header.push(Cell::new("Changes").style_spec("b"));
    }
    table.add_row(Row::new(header));

    for row in &report.rows {
        let name = match &row.provider {
            Some(provider) => format!("{} ({provider})", row.name),
            None => row.name.clone(),
        };
        let mut cells = vec![
            Cell::new(&name).style_spec("Fb"),
            Cell::new(row.installed.as_deref().unwrap_or("-")),
            status_cell(row),
        ];
        if show_change_log {
            cells.push(Cell::new(row.change_log.as_deref().unwrap_or("")));
        }
        table.add_row(Row::new(cells));
    }
    table.printstd();

    let summary = if report.dry_run {
        format!("{} update(s) available", report.pending().count())
    } else {
        format!("{} updated, {} failed", report.updated, report.failed)
    };
    if report.is_success() {
        println!("{}", summary.bold());
    } else {
        println!("{}", summary.red().bold());
    }
}
