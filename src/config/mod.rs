mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

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
        "./slidecast.toml",
        "./config.toml",
        "~/.config/slidecast/config.toml",
        "/etc/slidecast/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::info!("Loading config from {:?}", path);
            return load_config(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    if config.worker.count == 0 {
        anyhow::bail!("worker.count must be at least 1");
    }
    if config.worker.queue_depth == 0 {
        anyhow::bail!("worker.queue_depth must be at least 1");
    }
    if !(0.0 < config.avatar.scale && config.avatar.scale <= 1.0) {
        anyhow::bail!(
            "avatar.scale must be in (0, 1], got {}",
            config.avatar.scale
        );
    }
    config
        .avatar
        .position
        .parse::<slidecast_av::OverlayPosition>()
        .map_err(|e| anyhow::anyhow!(e))?;
    if config.composer.silent_slide_secs <= 0.0 {
        anyhow::bail!("composer.silent_slide_secs must be positive");
    }
    Ok(())
}

/// Create the storage directories named in the config.
pub fn ensure_storage_dirs(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.storage.upload_dir)
        .with_context(|| format!("Failed to create {:?}", config.storage.upload_dir))?;
    std::fs::create_dir_all(&config.storage.output_dir)
        .with_context(|| format!("Failed to create {:?}", config.storage.output_dir))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        validate_config(&config).unwrap();
        assert_eq!(config.worker.count, 2);
        assert_eq!(config.composer.silent_slide_secs, 5.0);
        assert_eq!(config.avatar.position, "bottom-right");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            output_dir = "/data/out"

            [worker]
            count = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.output_dir, std::path::PathBuf::from("/data/out"));
        // Unspecified sections fall back to defaults
        assert_eq!(config.worker.count, 4);
        assert_eq!(config.worker.queue_depth, 16);
        assert_eq!(config.tts.voice, "neutral_female");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.worker.count = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.avatar.scale = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.avatar.position = "center".into();
        assert!(validate_config(&config).is_err());
    }
}
