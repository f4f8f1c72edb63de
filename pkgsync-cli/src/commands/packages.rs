//! Commands that read or edit the installed package registry.
//!
//! None of these contact the distribution server.

use console::style;
use indicatif::HumanBytes;
use pkgsync::config::ConfigFile;
use pkgsync::manager::{
    offline_outcome, remove_all_packages, InstallOutcome, InstalledPackageRegistry, TreeDiffer,
};

use crate::error::CliError;

fn open_registry(config: &ConfigFile) -> Result<InstalledPackageRegistry, CliError> {
    let path = config.to_manager_config().installed_packages_path();
    Ok(InstalledPackageRegistry::open(path)?)
}

/// Print every recorded package.
pub fn run_list(config: &ConfigFile) -> Result<(), CliError> {
    let registry = open_registry(config)?;
    let mut records: Vec<_> = registry.records().iter().collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));

    if records.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("{:<32} {:>8} {:>12}  {}", "NAME", "VERSION", "DOWNLOADED", "LOCATION");
    for record in records {
        let name = if record.installed {
            record.name.clone()
        } else {
            format!("{} (incomplete)", record.name)
        };
        println!(
            "{:<32} {:>8} {:>12}  {}",
            name,
            record.version,
            HumanBytes(record.download_size).to_string(),
            record.root_path.display()
        );
    }
    Ok(())
}

/// Print what installed packages ask to run on start.
pub fn run_outcome(json: bool, config: &ConfigFile) -> Result<(), CliError> {
    let outcome = offline_outcome(&open_registry(config)?);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.execute_files.is_empty() && outcome.top_level_sequences.is_empty() {
        println!("Installed packages request nothing to run.");
    } else {
        print_run_lists(&outcome);
    }
    Ok(())
}

/// Delete a package's recorded files and drop its record.
pub fn run_remove(name: &str, config: &ConfigFile) -> Result<(), CliError> {
    let mut registry = open_registry(config)?;
    let Some(record) = registry.previous_install(name).cloned() else {
        return Err(CliError::Config(format!("Package '{}' is not installed", name)));
    };

    let report = TreeDiffer::new().remove_tree(&record.root_path, &record.folders);
    registry.remove(name)?;

    println!(
        "{} {} v{}: {} files, {} folders deleted",
        style("Removed").green().bold(),
        record.name,
        record.version,
        report.files_removed,
        report.folders_removed
    );
    for path in &report.failures {
        println!("  {} {}", style("could not delete").yellow(), path.display());
    }
    Ok(())
}

/// Delete the distribution root and every record that lived under it.
pub fn run_remove_all(config: &ConfigFile) -> Result<(), CliError> {
    let manager = config.to_manager_config();
    let removed = remove_all_packages(&manager)?;

    println!(
        "{} {}",
        style("Deleted").green().bold(),
        manager.distribution_root.display()
    );
    for record in &removed {
        println!("  {} v{}", record.name, record.version);
    }
    Ok(())
}

/// Print the execute and top-level lists of an outcome.
pub fn print_run_lists(outcome: &InstallOutcome) {
    if !outcome.execute_files.is_empty() {
        println!("Execute:");
        for path in &outcome.execute_files {
            println!("  {}", path.display());
        }
    }
    if !outcome.top_level_sequences.is_empty() {
        println!("Top-level sequences:");
        for path in &outcome.top_level_sequences {
            println!("  {}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chrono::Utc;
    use pkgsync::package::{FileAttributes, Package, PackageFile, PackageFolder};
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn config_in(temp: &TempDir) -> ConfigFile {
        let mut config = ConfigFile::default();
        config.packages.state_dir = Some(temp.path().join("state"));
        config.packages.distribution_root = Some(temp.path().join("dist"));
        config
    }

    fn record_app(config: &ConfigFile) -> PathBuf {
        let manager = config.to_manager_config();
        let root = manager.distribution_root.join("App");
        let package = Package::new(Uuid::new_v4(), "App", 1).with_folder(
            PackageFolder::new("bin").with_file(
                PackageFile::new(Uuid::new_v4(), "run.sh", Utc::now())
                    .with_attributes(FileAttributes::EXECUTE_ALWAYS),
            ),
        );

        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/run.sh"), "#!/bin/sh\n").unwrap();

        let mut registry = InstalledPackageRegistry::open(manager.installed_packages_path()).unwrap();
        registry.record_installed(&package, &root, 10).unwrap();
        root
    }

    #[test]
    fn test_remove_deletes_files_and_record() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let root = record_app(&config);

        run_remove("App", &config).unwrap();

        assert!(!root.join("bin/run.sh").exists());
        assert!(open_registry(&config).unwrap().records().is_empty());
    }

    #[test]
    fn test_remove_unknown_package() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        assert!(matches!(run_remove("Nope", &config), Err(CliError::Config(_))));
    }

    #[test]
    fn test_remove_all_clears_distribution_root() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let root = record_app(&config);
        fs::write(temp.path().join("keep.txt"), "outside").unwrap();

        run_remove_all(&config).unwrap();

        assert!(!root.exists());
        assert!(!config.to_manager_config().distribution_root.exists());
        assert!(temp.path().join("keep.txt").exists());
        assert!(open_registry(&config).unwrap().records().is_empty());

        // A second run finds nothing and still succeeds.
        run_remove_all(&config).unwrap();
    }

    #[test]
    fn test_list_and_outcome_read_registry() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        record_app(&config);

        run_list(&config).unwrap();
        run_outcome(true, &config).unwrap();
        run_outcome(false, &config).unwrap();
    }
}
