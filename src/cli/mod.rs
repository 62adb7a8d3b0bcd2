pub mod doctor;
pub mod embed;

use anyhow::{Context, Result};

use llamaembed::config::AppConfig;

/// Print the effective configuration as TOML.
pub fn print_config(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("failed to render config as TOML")?;
    print!("{rendered}");
    Ok(())
}
