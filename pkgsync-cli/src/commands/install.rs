//! `pkgsync install`: run an install batch with a progress bar.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use console::style;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use pkgsync::config::ConfigFile;
use pkgsync::manager::{
    InstallOutcome, InstallWorker, PackageInstaller, PackageSource,
    ProgressCallback, ProgressEvent,
};
use pkgsync::package::Package;
use uuid::Uuid;

use crate::error::CliError;

/// How often the bar polls the install counters.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Install the packages named by `ids` and the manifests in `manifests`.
pub fn run(
    ids: &[Uuid],
    manifests: &[PathBuf],
    json: bool,
    config: &ConfigFile,
) -> Result<(), CliError> {
    if ids.is_empty() && manifests.is_empty() {
        return Err(CliError::Config(
            "Nothing to install. Pass package ids or --manifest files.".to_string(),
        ));
    }

    let source = super::http_source(config)?;

    // All manifests are resolved before the first byte is written.
    let mut packages = manifests
        .iter()
        .map(|path| read_manifest(path))
        .collect::<Result<Vec<_>, _>>()?;
    for id in ids {
        packages.push(source.fetch_manifest(id)?);
    }

    let bar = progress_bar();
    let installer = PackageInstaller::new(source, config.to_manager_config())
        .with_progress(event_printer(bar.clone()));

    let handle = InstallWorker::spawn(installer, packages)?;

    let token = handle.cancellation_token();
    ctrlc::set_handler(move || token.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    while !handle.is_finished() {
        let snapshot = handle.progress();
        bar.set_length(snapshot.total_expected);
        bar.set_position(snapshot.total_written);
        thread::sleep(POLL_INTERVAL);
    }

    let outcome = match handle.join() {
        Ok(outcome) => outcome,
        Err(e) => {
            bar.abandon_with_message("install failed");
            return Err(e.into());
        }
    };
    bar.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// Parse a JSON package manifest.
fn read_manifest(path: &Path) -> Result<Package, CliError> {
    let manifest_error = |reason: String| CliError::Manifest {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| manifest_error(e.to_string()))
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {bytes}/{total_bytes} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");

    let bar = ProgressBar::new(0);
    bar.set_style(style);
    bar
}

/// Mirror per-package and per-file events onto the bar.
fn event_printer(bar: ProgressBar) -> ProgressCallback {
    Box::new(move |event: &ProgressEvent| match event {
        ProgressEvent::PackageStarted { name, version } => {
            bar.println(format!("{} {} v{}", style("Installing").green().bold(), name, version));
        }
        ProgressEvent::CleanupFinished {
            files_removed,
            folders_removed,
            failures,
            ..
        } => {
            bar.println(format!(
                "  removed {} obsolete files, {} folders ({} failed)",
                files_removed, folders_removed, failures
            ));
        }
        ProgressEvent::FileStarted { path, .. } => {
            bar.set_message(display_name(path));
        }
        ProgressEvent::AttemptFailed {
            path,
            attempt,
            reason,
        } => {
            bar.println(format!(
                "  {} {} (attempt {}): {}",
                style("retrying").yellow(),
                display_name(path),
                attempt,
                reason
            ));
        }
        ProgressEvent::PackageCompleted { name, version } => {
            bar.println(format!("{} {} v{}", style("Installed").green().bold(), name, version));
        }
        ProgressEvent::Progress(_) | ProgressEvent::FileCompleted { .. } => {}
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_outcome(outcome: &InstallOutcome) {
    if outcome.cancelled {
        println!("{}", style("Install cancelled.").yellow().bold());
    }
    println!(
        "{} packages installed, {} files downloaded ({}), {} files up to date",
        outcome.packages_installed,
        outcome.files_downloaded,
        HumanBytes(outcome.bytes_downloaded),
        outcome.files_skipped
    );
    super::packages::print_run_lists(outcome);
}
