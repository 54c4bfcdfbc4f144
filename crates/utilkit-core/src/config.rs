//! Configuration management for the utilkit library

use crate::error::{Result, UtilkitError};
use crate::watermark::WatermarkPosition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub progress: ProgressConfig,
    pub image: ImageConfig,
}

/// Where the process-wide subscriber writes to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Console,
    File,
}

/// How often a rolling log file is cut
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl RotationPolicy {
    pub(crate) fn to_rotation(self) -> tracing_appender::rolling::Rotation {
        use tracing_appender::rolling::Rotation;
        match self {
            RotationPolicy::Minutely => Rotation::MINUTELY,
            RotationPolicy::Hourly => Rotation::HOURLY,
            RotationPolicy::Daily => Rotation::DAILY,
            RotationPolicy::Never => Rotation::NEVER,
        }
    }
}

/// Logging configuration for the binary's global subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub output: LogOutput,
    pub output_path: Option<PathBuf>,
    /// JSON lines instead of the compact human format
    pub structured: bool,
    pub rotation: RotationPolicy,
    pub max_files: Option<usize>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Console,
            output_path: None,
            structured: false,
            rotation: RotationPolicy::Daily,
            max_files: Some(3),
        }
    }
}

/// Rendering options for the multi-phase progress bar
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub refresh_interval_ms: u64,
    pub message_width: usize,
    pub bar_width: usize,
    /// Render nothing; counters still work. Used for CI and tests.
    pub hidden: bool,
}

impl ProgressConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    /// Same defaults, but drawing to nowhere
    pub fn hidden() -> Self {
        Self {
            hidden: true,
            ..Self::default()
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 100,
            message_width: 36,
            bar_width: 25,
            hidden: false,
        }
    }
}

/// Image encoding and watermark defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub quality: u8,
    pub default_position: WatermarkPosition,
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            quality: 70,
            default_position: WatermarkPosition::BottomRight,
            font_path: None,
            font_size: 24.0,
        }
    }
}

/// Supported output image formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
}

impl ImageFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::WebP => "webp",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        extension.parse()
    }
}

impl FromStr for ImageFormat {
    type Err = UtilkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::WebP),
            _ => Err(UtilkitError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// Configuration manager
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Create a new configuration manager at the default location
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a configuration manager with a custom path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = Self::load_or_default(&config_path)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Update the configuration and persist it
    pub fn update_config(&mut self, config: AppConfig) -> Result<()> {
        crate::utils::validation::validate_quality(config.image.quality)?;
        self.config = config;
        self.save()
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| UtilkitError::ConfigError {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let config_str =
            toml::to_string_pretty(&self.config).map_err(|e| UtilkitError::ConfigError {
                message: format!("Failed to serialize config: {}", e),
            })?;

        std::fs::write(&self.config_path, config_str).map_err(|e| UtilkitError::ConfigError {
            message: format!("Failed to write config file: {}", e),
        })?;

        tracing::info!("Configuration saved to {:?}", self.config_path);
        Ok(())
    }

    fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| UtilkitError::ConfigError {
                message: "Could not determine config directory".to_string(),
            })?
            .join("utilkit");

        Ok(config_dir.join("config.toml"))
    }

    fn load_or_default(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(AppConfig::default());
        }

        let config_str = std::fs::read_to_string(path).map_err(|e| UtilkitError::ConfigError {
            message: format!("Failed to read config file: {}", e),
        })?;

        let config: AppConfig = toml::from_str(&config_str).map_err(|e| UtilkitError::ConfigError {
            message: format!("Failed to parse config file: {}", e),
        })?;

        tracing::info!("Configuration loaded from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_image_format_properties() {
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::WebP.extension(), "webp");
    }

    #[test]
    fn test_image_format_parsing() {
        assert_eq!("JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!("webp".parse::<ImageFormat>().unwrap(), ImageFormat::WebP);
        assert_eq!(
            ImageFormat::from_path(Path::new("out/photo.png")).unwrap(),
            ImageFormat::Png
        );

        let err = "gif".parse::<ImageFormat>().unwrap_err();
        assert_eq!(err.error_type(), "unsupported_format");
        assert!(ImageFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = AppConfig::default();
        assert_eq!(config.image.quality, 70);
        assert_eq!(config.progress.refresh_interval(), Duration::from_millis(100));
        assert_eq!(config.progress.message_width, 36);
        assert_eq!(config.progress.bar_width, 25);
        assert_eq!(config.logging.output, LogOutput::Console);
        assert!(ProgressConfig::hidden().hidden);
    }

    #[test]
    fn test_config_manager_defaults_without_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("missing.toml");

        let manager = ConfigManager::with_path(config_path.clone()).unwrap();
        assert_eq!(manager.config().image.quality, 70);
        assert_eq!(manager.config_path(), config_path.as_path());
        assert!(!config_path.exists());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut manager = ConfigManager::with_path(config_path.clone()).unwrap();
        let mut config = manager.config().clone();
        config.image.quality = 90;
        config.progress.bar_width = 40;
        config.logging.rotation = RotationPolicy::Hourly;
        manager.update_config(config).unwrap();

        let reloaded = ConfigManager::with_path(config_path).unwrap();
        assert_eq!(reloaded.config().image.quality, 90);
        assert_eq!(reloaded.config().progress.bar_width, 40);
        assert_eq!(reloaded.config().logging.rotation, RotationPolicy::Hourly);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[progress]\nhidden = true\n").unwrap();

        let manager = ConfigManager::with_path(config_path).unwrap();
        assert!(manager.config().progress.hidden);
        assert_eq!(manager.config().progress.refresh_interval_ms, 100);
        assert_eq!(manager.config().image.quality, 70);
    }

    #[test]
    fn test_update_rejects_bad_quality() {
        let temp_dir = tempdir().unwrap();
        let mut manager = ConfigManager::with_path(temp_dir.path().join("c.toml")).unwrap();
        let mut config = manager.config().clone();
        config.image.quality = 0;
        assert!(manager.update_config(config).is_err());
    }
}
