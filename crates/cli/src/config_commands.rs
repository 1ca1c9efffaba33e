use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    tmibot_config::{BotConfig, Severity},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Load the explicit config file, or the first one found in the search path.
pub fn load(explicit: Option<PathBuf>) -> Result<(PathBuf, BotConfig)> {
    let path = explicit
        .or_else(tmibot_config::find_config_file)
        .context("no config file found; pass --config or create tmibot.toml")?;
    let config = load_from(&path)?;
    Ok((path, config))
}

fn load_from(path: &Path) -> Result<BotConfig> {
    tmibot_config::load_config(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

pub fn check(explicit: Option<PathBuf>) -> Result<()> {
    let (path, config) = load(explicit)?;
    eprintln!("Checking {}\n", path.display());

    let result = config.validate();
    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = count(&result.diagnostics, Severity::Error);
    let warnings = count(&result.diagnostics, Severity::Warning);

    if !result.diagnostics.is_empty() {
        eprintln!();
    }
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn count(diagnostics: &[tmibot_config::Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}
