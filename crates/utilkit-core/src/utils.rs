//! Utility functions and helpers

use crate::error::{Result, UtilkitError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File utilities
pub mod file {
    use super::*;

    /// Get the file size in bytes
    pub fn get_file_size(path: &Path) -> Result<u64> {
        if !path.exists() {
            return Err(UtilkitError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(std::fs::metadata(path)?.len())
    }

    /// Ensure a directory exists, creating it if necessary
    pub fn ensure_directory_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Ensure the parent directory of a file exists
    pub fn ensure_parent_exists(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => ensure_directory_exists(parent),
            _ => Ok(()),
        }
    }

    /// A fresh path in the system temp directory
    pub fn get_temp_path(extension: &str) -> PathBuf {
        let temp_dir = std::env::temp_dir();
        let filename = format!(
            "utilkit_{}_{}.{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple(),
            extension
        );
        temp_dir.join(filename)
    }
}

/// Performance monitoring utilities
pub mod performance {
    use super::*;
    use std::time::Instant;

    /// Logs its lifetime at debug level when dropped
    #[derive(Debug)]
    pub struct Timer {
        start: Instant,
        name: String,
    }

    impl Timer {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                start: Instant::now(),
                name: name.into(),
            }
        }

        pub fn elapsed(&self) -> Duration {
            self.start.elapsed()
        }

        pub fn elapsed_ms(&self) -> u128 {
            self.elapsed().as_millis()
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            tracing::debug!("Timer '{}' elapsed: {}ms", self.name, self.elapsed_ms());
        }
    }

    /// Throughput in MiB/s
    pub fn calculate_throughput(bytes_processed: u64, duration: Duration) -> f64 {
        if duration.is_zero() {
            return 0.0;
        }

        let seconds = duration.as_secs_f64();
        let mb_processed = bytes_processed as f64 / (1024.0 * 1024.0);
        mb_processed / seconds
    }
}

/// Validation utilities
pub mod validation {
    use super::*;

    /// Validate image dimensions
    pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
        const MAX_DIMENSION: u32 = 65535;
        const MIN_DIMENSION: u32 = 1;

        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&width) {
            return Err(UtilkitError::InvalidInput {
                message: format!(
                    "Width {} is out of valid range ({}-{})",
                    width, MIN_DIMENSION, MAX_DIMENSION
                ),
            });
        }

        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&height) {
            return Err(UtilkitError::InvalidInput {
                message: format!(
                    "Height {} is out of valid range ({}-{})",
                    height, MIN_DIMENSION, MAX_DIMENSION
                ),
            });
        }

        Ok(())
    }

    /// Validate quality setting
    pub fn validate_quality(quality: u8) -> Result<()> {
        if quality == 0 || quality > 100 {
            return Err(UtilkitError::InvalidInput {
                message: format!("Quality {} must be between 1 and 100", quality),
            });
        }
        Ok(())
    }

    /// Validate a watermark scale factor
    pub fn validate_scale(scale: f64) -> Result<()> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(UtilkitError::InvalidInput {
                message: format!("Scale {} must be a positive number", scale),
            });
        }
        Ok(())
    }
}

/// System information utilities
pub mod system {
    /// Get the number of CPU cores
    pub fn cpu_count() -> usize {
        num_cpus::get()
    }

    /// Default parallelism for pooled work: 75% of the cores, between 1 and 16
    pub fn optimal_worker_count() -> usize {
        (cpu_count() * 3 / 4).clamp(1, 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_size() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        std::fs::write(&file_path, "Hello, World!").unwrap();

        let size = file::get_file_size(&file_path).unwrap();
        assert_eq!(size, 13);

        let missing = file::get_file_size(&temp_dir.path().join("nope")).unwrap_err();
        assert_eq!(missing.error_type(), "file_not_found");
    }

    #[test]
    fn test_ensure_parent_exists() {
        let temp_dir = tempdir().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("out.png");

        file::ensure_parent_exists(&nested).unwrap();
        assert!(nested.parent().unwrap().is_dir());
        file::ensure_parent_exists(Path::new("relative.png")).unwrap();
    }

    #[test]
    fn test_temp_path_generation() {
        let first = file::get_temp_path("bin");
        let second = file::get_temp_path("bin");

        assert_ne!(first, second);
        assert_eq!(first.extension().unwrap(), "bin");
        assert!(first.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn test_throughput_calculation() {
        let throughput = performance::calculate_throughput(2 * 1024 * 1024, Duration::from_secs(2));
        assert!((throughput - 1.0).abs() < f64::EPSILON);
        assert_eq!(performance::calculate_throughput(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_timer() {
        let timer = performance::Timer::new("test");
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5);
    }

    #[test]
    fn test_dimension_validation() {
        assert!(validation::validate_dimensions(100, 100).is_ok());
        assert!(validation::validate_dimensions(0, 100).is_err());
        assert!(validation::validate_dimensions(100, 70000).is_err());
    }

    #[test]
    fn test_quality_and_scale_validation() {
        assert!(validation::validate_quality(70).is_ok());
        assert!(validation::validate_quality(0).is_err());
        assert!(validation::validate_quality(101).is_err());

        assert!(validation::validate_scale(0.5).is_ok());
        assert!(validation::validate_scale(0.0).is_err());
        assert!(validation::validate_scale(-1.0).is_err());
        assert!(validation::validate_scale(f64::NAN).is_err());
    }

    #[test]
    fn test_worker_count_bounds() {
        let workers = system::optimal_worker_count();
        assert!((1..=16).contains(&workers));
        assert!(system::cpu_count() >= 1);
    }
}
