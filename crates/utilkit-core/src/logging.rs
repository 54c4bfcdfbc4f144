//! Logging configuration and initialization
//!
//! Two entry points:
//!
//! * [`init_logging`] installs the process-wide subscriber for a binary from
//!   [`LoggingConfig`].
//! * [`Logger`] is an explicitly constructed JSON logger that owns its
//!   destinations. It never touches global state unless asked to, and
//!   flushes its writers when synced or dropped.

use crate::config::{LogOutput, LoggingConfig, RotationPolicy};
use crate::error::{Result, UtilkitError};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::dispatcher::{self, DefaultGuard};
use tracing::{Dispatch, Level};
use tracing_error::{ErrorLayer, SpanTrace};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, Layer, Registry};

type LevelPredicate = Arc<dyn Fn(&Level) -> bool + Send + Sync>;
type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;
type GlobalLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Initialize the process-wide subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Returns the
/// writer guard when logging to a file; keep it alive until exit.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| UtilkitError::LoggingError {
            message: format!("Invalid log level '{}': {}", config.level, e),
        })?;

    let (layer, guard): (GlobalLayer, Option<WorkerGuard>) = match config.output {
        LogOutput::Console => (console_layer(config.structured), None),
        LogOutput::File => {
            let path = config.output_path.clone().ok_or_else(|| UtilkitError::LoggingError {
                message: "file output requires output_path".to_string(),
            })?;
            let rotate = RotateConfig::for_file(path, config.rotation, config.max_files)?;
            let (writer, guard) = tracing_appender::non_blocking(rotate.build_appender()?);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(writer)
                .boxed();
            (layer, Some(guard))
        }
    };

    match tracing_subscriber::registry().with(env_filter).with(layer).try_init() {
        Ok(()) => Ok(guard),
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("already been set") {
                Ok(guard)
            } else {
                Err(UtilkitError::LoggingError {
                    message: format!("Failed to initialize logging: {}", e),
                })
            }
        }
    }
}

fn console_layer<S>(structured: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if structured {
        layer.json().with_timer(ChronoUtc::rfc_3339()).boxed()
    } else {
        layer.compact().with_target(false).boxed()
    }
}

/// Extra fields added to every event
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerOptions {
    /// Source file and line of the call site
    pub caller: bool,
    /// Module path of the call site
    pub target: bool,
    /// Attach the active span trace to events at this level or more severe
    pub stacktrace: Option<Level>,
}

impl LoggerOptions {
    pub fn with_caller(mut self) -> Self {
        self.caller = true;
        self
    }

    pub fn with_target(mut self) -> Self {
        self.target = true;
        self
    }

    pub fn with_stacktrace(mut self, level: Level) -> Self {
        self.stacktrace = Some(level);
        self
    }
}

/// One destination of a tee logger together with the levels it accepts
pub struct Tee {
    writer: Box<dyn Write + Send>,
    filter: LevelPredicate,
}

impl Tee {
    pub fn new<W, F>(writer: W, filter: F) -> Self
    where
        W: Write + Send + 'static,
        F: Fn(&Level) -> bool + Send + Sync + 'static,
    {
        Self {
            writer: Box::new(writer),
            filter: Arc::new(filter),
        }
    }

    /// Accepts `level` and everything more severe
    pub fn at_least<W: Write + Send + 'static>(writer: W, level: Level) -> Self {
        // tracing orders ERROR as the smallest level
        Self::new(writer, move |event| *event <= level)
    }

    /// Accepts only levels less severe than `level`
    pub fn below<W: Write + Send + 'static>(writer: W, level: Level) -> Self {
        Self::new(writer, move |event| *event > level)
    }
}

impl std::fmt::Debug for Tee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tee").finish_non_exhaustive()
    }
}

/// Settings for a size-independent, time-rolled log file
#[derive(Debug, Clone)]
pub struct RotateConfig {
    pub directory: PathBuf,
    pub file_name_prefix: String,
    pub file_name_suffix: Option<String>,
    pub rotation: RotationPolicy,
    /// Oldest files beyond this count are deleted on rollover
    pub max_files: Option<usize>,
}

impl RotateConfig {
    pub fn new(directory: impl Into<PathBuf>, file_name_prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name_prefix: file_name_prefix.into(),
            file_name_suffix: Some("log".to_string()),
            rotation: RotationPolicy::Daily,
            max_files: None,
        }
    }

    fn for_file(path: PathBuf, rotation: RotationPolicy, max_files: Option<usize>) -> Result<Self> {
        let prefix = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| UtilkitError::LoggingError {
                message: format!("Invalid log file path: {}", path.display()),
            })?
            .to_string();
        let suffix = path.extension().and_then(|s| s.to_str()).map(str::to_string);
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            directory,
            file_name_prefix: prefix,
            file_name_suffix: suffix,
            rotation,
            max_files,
        })
    }

    fn build_appender(&self) -> Result<RollingFileAppender> {
        let mut builder = RollingFileAppender::builder()
            .rotation(self.rotation.to_rotation())
            .filename_prefix(&self.file_name_prefix);
        if let Some(suffix) = &self.file_name_suffix {
            builder = builder.filename_suffix(suffix);
        }
        if let Some(max_files) = self.max_files {
            builder = builder.max_log_files(max_files);
        }
        builder.build(&self.directory).map_err(|e| UtilkitError::LoggingError {
            message: format!("Failed to open rolling log in {}: {}", self.directory.display(), e),
        })
    }
}

/// JSON logger with explicitly owned destinations
///
/// Events reach the logger only inside [`Logger::in_scope`], while a
/// [`Logger::set_default`] guard is alive, or after [`Logger::install_global`].
pub struct Logger {
    dispatch: Dispatch,
    guards: Vec<WorkerGuard>,
    stacktrace: Option<Level>,
}

impl Logger {
    /// Log everything at `level` or more severe into `writer`
    pub fn new<W: Write + Send + 'static>(writer: W, level: Level, options: LoggerOptions) -> Self {
        Self::tee(vec![Tee::at_least(writer, level)], options)
    }

    /// Log into several destinations, each with its own level filter
    pub fn tee(tees: Vec<Tee>, options: LoggerOptions) -> Self {
        let mut layers: Vec<BoxedLayer> = Vec::with_capacity(tees.len());
        let mut guards = Vec::with_capacity(tees.len());

        for tee in tees {
            let (writer, guard) = tracing_appender::non_blocking(tee.writer);
            let filter = tee.filter;
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_timer(ChronoUtc::rfc_3339())
                .with_file(options.caller)
                .with_line_number(options.caller)
                .with_target(options.target)
                .with_writer(writer)
                .with_filter(filter_fn(move |meta| filter(meta.level())))
                .boxed();
            layers.push(layer);
            guards.push(guard);
        }

        let subscriber = Registry::default()
            .with(layers)
            .with(options.stacktrace.map(|_| ErrorLayer::default()));
        Self {
            dispatch: Dispatch::new(subscriber),
            guards,
            stacktrace: options.stacktrace,
        }
    }

    /// Log at `level` or more severe into a rolling file
    pub fn with_rotation(config: &RotateConfig, level: Level, options: LoggerOptions) -> Result<Self> {
        let appender = config.build_appender()?;
        Ok(Self::new(appender, level, options))
    }

    /// Run `f` with this logger as the current dispatcher
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    /// Make this logger the default for the current thread until the guard drops
    pub fn set_default(&self) -> DefaultGuard {
        dispatcher::set_default(&self.dispatch)
    }

    /// Make this logger the process-wide default
    pub fn install_global(&self) -> Result<()> {
        dispatcher::set_global_default(self.dispatch.clone()).map_err(|e| UtilkitError::LoggingError {
            message: format!("Failed to install global logger: {}", e),
        })
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn debug(&self, msg: &str) {
        self.in_scope(|| match self.span_trace(Level::DEBUG) {
            Some(trace) => tracing::debug!(stacktrace = %trace, "{}", msg),
            None => tracing::debug!("{}", msg),
        });
    }

    pub fn info(&self, msg: &str) {
        self.in_scope(|| match self.span_trace(Level::INFO) {
            Some(trace) => tracing::info!(stacktrace = %trace, "{}", msg),
            None => tracing::info!("{}", msg),
        });
    }

    pub fn warn(&self, msg: &str) {
        self.in_scope(|| match self.span_trace(Level::WARN) {
            Some(trace) => tracing::warn!(stacktrace = %trace, "{}", msg),
            None => tracing::warn!("{}", msg),
        });
    }

    pub fn error(&self, msg: &str) {
        self.in_scope(|| match self.span_trace(Level::ERROR) {
            Some(trace) => tracing::error!(stacktrace = %trace, "{}", msg),
            None => tracing::error!("{}", msg),
        });
    }

    /// Spans entered under this logger, innermost first
    ///
    /// Only captured for levels at or above the configured stacktrace level,
    /// and only meaningful while this logger is the current dispatcher.
    fn span_trace(&self, level: Level) -> Option<SpanTrace> {
        // tracing orders ERROR as the smallest level
        match self.stacktrace {
            Some(threshold) if level <= threshold => Some(SpanTrace::capture()),
            _ => None,
        }
    }

    /// Flush pending lines and close the destinations
    pub fn sync(self) {
        drop(self.guards);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("destinations", &self.guards.len())
            .finish()
    }
}
