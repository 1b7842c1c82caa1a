//! Init command handler

use anyhow::{Context, Result};
use colored::*;
use hoist_core::config::Config;
use std::path::Path;

/// Writes the sample configuration to `path`
///
/// Refuses to replace an existing file.
pub fn handle_init(path: &Path) -> Result<()> {
    Config::sample()
        .write_new(path)
        .with_context(|| format!("Failed to initialize {}", path.display()))?;

    println!("{} {}", "Created".green(), path.display());
    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Set your build commands and environments");
    println!("  2. Check the server is reachable with ssh");
    println!("  3. Run {} to deploy", "hoist deploy <environment>".cyan());

    Ok(())
}
