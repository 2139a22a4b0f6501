use std::path::Path;

use anyhow::{Context, Result};
use bastion_pdp::PdpConfig;

use super::load_config;

pub fn show(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    print!("{}", render(&config)?);
    Ok(())
}

fn render(config: &PdpConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}
