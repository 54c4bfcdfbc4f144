//! Error types for the utilkit library

use std::path::PathBuf;

/// Main error type for utilkit operations
#[derive(Debug, thiserror::Error)]
pub enum UtilkitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format not supported: {format}")]
    UnsupportedFormat { format: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid font: {message}")]
    InvalidFont { message: String },

    #[error("Base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unknown phase {phase} (progress bar has {phases} phases)")]
    UnknownPhase { phase: usize, phases: usize },

    #[error("Tracker does not belong to this progress bar")]
    ForeignTracker,

    #[error("Slot pool for phase {phase} is closed")]
    PoolClosed { phase: usize },

    #[error("Invalid progress template: {0}")]
    ProgressTemplate(#[from] indicatif::style::TemplateError),

    #[error("Processing failed: {message}")]
    ProcessingFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Logging initialization failed: {message}")]
    LoggingError { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl UtilkitError {
    /// Get the error type as a string for categorization
    pub fn error_type(&self) -> &'static str {
        match self {
            UtilkitError::Io(_) => "io_error",
            UtilkitError::UnsupportedFormat { .. } => "unsupported_format",
            UtilkitError::Image(_) => "image_error",
            UtilkitError::InvalidFont { .. } => "invalid_font",
            UtilkitError::Base64(_) => "base64_error",
            UtilkitError::UnknownPhase { .. } => "unknown_phase",
            UtilkitError::ForeignTracker => "foreign_tracker",
            UtilkitError::PoolClosed { .. } => "pool_closed",
            UtilkitError::ProgressTemplate(_) => "progress_template",
            UtilkitError::ProcessingFailed { .. } => "processing_failed",
            UtilkitError::ConfigError { .. } => "config_error",
            UtilkitError::LoggingError { .. } => "logging_error",
            UtilkitError::FileNotFound { .. } => "file_not_found",
            UtilkitError::InvalidInput { .. } => "invalid_input",
        }
    }

    /// Check if the error is recoverable (I/O failures only)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, UtilkitError::Io(_))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, UtilkitError>;
