//! Configuration builder for layered configuration loading

use crate::{Config, ConfigError, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use ferrocopy_types::{BufferSize, CompressionAlgorithm, DeviceType, ThreadCount};
use std::path::{Path, PathBuf};

/// Longest accepted progress interval.
const MAX_PROGRESS_INTERVAL_MS: u64 = 60_000;

/// Configuration builder for loading configuration from multiple sources
///
/// Sources are applied in the order they were added, on top of the built-in
/// defaults. Missing files are skipped.
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add a configuration file source with explicit format
    pub fn add_source_file_with_format<P: AsRef<Path>>(
        mut self,
        path: P,
        format: FileFormat,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        let defaults_value = serde_yaml::to_value(Config::default())?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .separator(&self.env_separator)
                            .try_parsing(true),
                    );
                }
                ConfigSource::Defaults => {}
            }
        }

        let config: Config = self.inner.build()?.try_deserialize()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Try to build the configuration, returning defaults on error
    pub fn build_or_default(self) -> Config {
        self.build().unwrap_or_default()
    }

    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Validate a configuration
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.performance.max_concurrent_operations == 0 {
            return Err(ConfigError::validation(
                "max_concurrent_operations must be greater than 0",
            ));
        }
        if config.performance.max_total_workers == 0 {
            return Err(ConfigError::validation(
                "max_total_workers must be greater than 0",
            ));
        }

        for device_type in DeviceType::ALL {
            let tuning = config.performance.tuning.get(device_type);
            BufferSize::new(tuning.buffer_size.get()).map_err(|message| {
                ConfigError::invalid_value(format!("performance.tuning.{device_type}"), message)
            })?;
            if tuning.max_threads > ThreadCount::MAX {
                return Err(ConfigError::invalid_value(
                    format!("performance.tuning.{device_type}"),
                    format!("max_threads must not exceed {}", ThreadCount::MAX),
                ));
            }
        }

        if config.compression.algorithm == CompressionAlgorithm::Zstd
            && !(1..=22).contains(&config.compression.level)
        {
            return Err(ConfigError::validation(
                "Compression level must be between 1 and 22",
            ));
        }

        if config.reporting.progress_interval_ms > MAX_PROGRESS_INTERVAL_MS {
            return Err(ConfigError::validation(
                "progress_interval_ms must not exceed 60000",
            ));
        }
        if config.reporting.event_queue_capacity == 0 {
            return Err(ConfigError::validation(
                "event_queue_capacity must be greater than 0",
            ));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
