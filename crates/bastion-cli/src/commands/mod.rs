pub mod check;
pub mod config;
pub mod evaluate;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use bastion_pdp::{PdpConfig, Policy};

/// Read a file, or stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

pub fn load_policies(path: &Path) -> Result<Vec<Policy>> {
    let text = read_input(Some(path))?;
    Policy::list_from_json(&text)
        .with_context(|| format!("Invalid policy document {}", path.display()))
}

pub fn load_config(path: Option<&Path>) -> Result<PdpConfig> {
    match path {
        Some(path) => PdpConfig::from_file(path)
            .with_context(|| format!("Invalid configuration {}", path.display())),
        None => Ok(PdpConfig::default()),
    }
}
