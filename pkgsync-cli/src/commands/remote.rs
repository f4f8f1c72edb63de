//! Commands that ask the distribution server about installed packages.

use console::style;
use pkgsync::config::ConfigFile;
use pkgsync::manager::PackageInstaller;

use crate::error::CliError;

/// List the packages the server offers as new or newer.
pub fn run_check(json: bool, config: &ConfigFile) -> Result<(), CliError> {
    let installer = PackageInstaller::new(super::http_source(config)?, config.to_manager_config());
    let offered = installer.check_updates()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&offered)?);
        return Ok(());
    }
    if offered.is_empty() {
        println!("All installed packages are up to date.");
        return Ok(());
    }

    println!("{:<32} {:>8}  {}", "NAME", "VERSION", "ID");
    for package in &offered {
        println!("{:<32} {:>8}  {}", package.name, package.version, package.id);
    }
    Ok(())
}

/// Remove the installed packages the server has revoked.
pub fn run_prune(config: &ConfigFile) -> Result<(), CliError> {
    let installer = PackageInstaller::new(super::http_source(config)?, config.to_manager_config());
    let removed = installer.remove_revoked()?;

    if removed.is_empty() {
        println!("No installed package has been revoked.");
    }
    for record in &removed {
        println!(
            "{} {} v{}",
            style("Removed").green().bold(),
            record.name,
            record.version
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_check_requires_base_url() {
        let config = ConfigFile::default();
        assert!(matches!(run_check(false, &config), Err(CliError::Config(_))));
    }

    #[test]
    fn test_prune_requires_base_url() {
        let config = ConfigFile::default();
        assert!(matches!(run_prune(&config), Err(CliError::Config(_))));
    }

    #[test]
    fn test_prune_with_empty_registry_skips_server() {
        let temp = TempDir::new().unwrap();
        let mut config = ConfigFile::default();
        config.packages.state_dir = Some(temp.path().join("state"));
        config.packages.distribution_root = Some(temp.path().join("dist"));
        // Nothing listens here; an empty registry must not reach it.
        config.server.base_url = Some("http://127.0.0.1:1".to_string());

        run_prune(&config).unwrap();
    }
}
