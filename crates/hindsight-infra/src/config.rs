//! Configuration loader for Hindsight.
//!
//! Reads `config.toml` from the data directory (`~/.hindsight/` in
//! production) and deserializes it into [`HindsightConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::Path;

use hindsight_types::config::HindsightConfig;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`HindsightConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and
///   returns the default.
/// - Otherwise returns the parsed config; omitted fields take defaults.
pub async fn load_config(data_dir: &Path) -> HindsightConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return HindsightConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return HindsightConfig::default();
        }
    };

    match toml::from_str::<HindsightConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            HindsightConfig::default()
        }
    }
}
