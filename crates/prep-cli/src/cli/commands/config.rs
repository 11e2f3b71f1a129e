//! Config command handlers.

use anyhow::{Context, Result};
use prep_core::config;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

pub fn set_backend(url: &str) -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::save_backend_url_to(&config_path, url.trim())
        .with_context(|| format!("update config at {}", config_path.display()))?;
    println!("Backend set to {} in {}", url.trim(), config_path.display());
    Ok(())
}
