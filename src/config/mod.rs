mod types;

pub use types::*;

use anyhow::{Context, Result};
use reelstream_av::transcode::is_valid_preset;
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Invalid TOML")?;

    expand_roots(&mut config.library.roots);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./reelstream.toml",
        "~/.config/reelstream/config.toml",
        "/etc/reelstream/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

fn expand_roots(roots: &mut [PathBuf]) {
    for root in roots.iter_mut() {
        let expanded = shellexpand::tilde(&root.to_string_lossy()).to_string();
        *root = PathBuf::from(expanded);
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.streaming.chunk_size == 0 {
        anyhow::bail!("Streaming chunk_size must be greater than 0");
    }

    if config.transcode.max_concurrent == 0 {
        anyhow::bail!("Transcode max_concurrent must be greater than 0");
    }

    if config.transcode.terminate_grace_secs == 0 {
        anyhow::bail!("Transcode terminate_grace_secs must be greater than 0");
    }

    if !is_valid_preset(&config.transcode.preset) {
        anyhow::bail!("Unknown x264 preset '{}'", config.transcode.preset);
    }

    // Missing roots are dropped at startup, not fatal
    for root in &config.library.roots {
        if !root.exists() {
            tracing::warn!("Media root does not exist: {:?}", root);
        }
    }

    if config.library.roots.is_empty() {
        tracing::warn!("No media roots configured; every stream request will 404");
    }

    Ok(())
}
