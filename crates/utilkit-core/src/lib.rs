//! # Utilkit Core
//!
//! Small building blocks for batch tools: a phased progress display for
//! worker pools, JSON logging with tee and rotation, and image watermark and
//! thumbnail helpers.

pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod thumbnail;
pub mod utils;
pub mod watermark;

// Re-export commonly used types
pub use config::{AppConfig, ConfigManager, ImageFormat, LoggingConfig, ProgressConfig};
pub use error::*;
pub use logging::{init_logging, Logger, LoggerOptions, RotateConfig, Tee};
pub use progress::{Phase, PhaseParam, ProgressBar, ProgressSummary, Tracker, Units};
pub use thumbnail::{thumb_crop_image, thumb_image};
pub use watermark::{Color, TextMark, WatermarkPosition, Watermarker};

use tracing_appender::non_blocking::WorkerGuard;

/// Initialize the library from configuration
///
/// Keep the returned guard alive while logging to a file.
pub fn init(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let guard = logging::init_logging(&config.logging)?;

    tracing::info!(version = version(), "Utilkit core initialized");
    Ok(guard)
}

/// Get the version of the utilkit core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        let result = init(&AppConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
    }
}
