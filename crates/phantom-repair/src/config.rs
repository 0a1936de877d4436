use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use phantom_extract::ExtractOptions;
use phantom_solver::SolverOptions;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;

static TRACING_INIT: Once = Once::new();

/// Settings for one repair run, usually read from a `phantom.toml`.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct RepairConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct SolverConfig {
    /// Class-tree placements tried before a crossover conflict is reported.
    #[serde(default = "SolverConfig::default_max_placement_attempts")]
    #[schemars(range(min = 1))]
    pub max_placement_attempts: usize,

    /// Seed for the placement orders tried after the first one.
    #[serde(default = "SolverConfig::default_seed")]
    pub seed: u64,

    /// Drop super-interfaces that are implied by other edges.
    #[serde(default = "default_true")]
    pub minimize_interfaces: bool,

    /// Solve against the part of the known hierarchy the constraints mention.
    #[serde(default = "default_true")]
    pub prune_hierarchy: bool,
}

impl SolverConfig {
    fn default_max_placement_attempts() -> usize {
        SolverOptions::default().max_placement_attempts
    }

    fn default_seed() -> u64 {
        SolverOptions::default().seed
    }

    #[must_use]
    pub fn to_options(&self) -> SolverOptions {
        SolverOptions {
            max_placement_attempts: self.max_placement_attempts,
            seed: self.seed,
            minimize_interfaces: self.minimize_interfaces,
            prune_hierarchy: self.prune_hierarchy,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_placement_attempts: Self::default_max_placement_attempts(),
            seed: Self::default_seed(),
            minimize_interfaces: true,
            prune_hierarchy: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ExtractConfig {
    /// Constrain loads and stores of locals by their debug table entries.
    #[serde(default = "default_true")]
    pub trust_local_variable_tables: bool,
}

impl ExtractConfig {
    #[must_use]
    pub fn to_options(&self) -> ExtractOptions {
        ExtractOptions {
            trust_local_variable_tables: self.trust_local_variable_tables,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            trust_local_variable_tables: true,
        }
    }
}

/// How generated methods are given bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StubBodies {
    /// Throw `UnsupportedOperationException`.
    #[default]
    Throw,
    /// Declare instance methods abstract; the phantom class becomes abstract.
    Abstract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub stub_bodies: StubBodies,

    /// Major class-file version stamped on generated classes.
    #[serde(default = "OutputConfig::default_class_version")]
    #[schemars(range(min = 45))]
    pub class_version: u16,
}

impl OutputConfig {
    fn default_class_version() -> u16 {
        49
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            stub_bodies: StubBodies::default(),
            class_version: Self::default_class_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    #[serde(default = "default_true")]
    pub stderr: bool,

    /// Append logs to the given file. If it cannot be opened, file logging is
    /// disabled and the other sinks stay active.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level, with `RUST_LOG` merged in
    /// when it is set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: true,
            file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` quotes the offending input; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl RepairConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Parses `text` and also returns the keys that were ignored, as dotted
    /// paths (`solver.retries`).
    pub fn load_from_str_with_unknown_keys(text: &str) -> Result<(Self, Vec<String>), ConfigError> {
        Ok(deserialize_toml_with_unknown_keys(text)?)
    }
}

fn deserialize_toml_with_unknown_keys<T: DeserializeOwned>(
    text: &str,
) -> Result<(T, Vec<String>), toml::de::Error> {
    let mut unknown = Vec::<String>::new();
    let deserializer = toml::de::Deserializer::new(text);
    let value = serde_ignored::deserialize(deserializer, |path| {
        unknown.push(path.to_string().trim_start_matches('.').to_owned());
    })?;
    unknown.sort();
    unknown.dedup();
    Ok((value, unknown))
}

/// JSON schema of `phantom.toml`.
#[must_use]
pub fn json_schema() -> RootSchema {
    schemars::schema_for!(RepairConfig)
}

/// Installs the global `tracing` subscriber described by `config`.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let file = config
            .file
            .as_ref()
            .and_then(|path| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .ok()
            })
            .map(Arc::new);

        let mut make_writer = BoxMakeWriter::new(std::io::sink);
        if config.stderr {
            make_writer = BoxMakeWriter::new(make_writer.and(std::io::stderr));
        }
        if let Some(file) = file {
            make_writer = BoxMakeWriter::new(make_writer.and(file));
        }

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(make_writer)
                    .with_ansi(false),
            )
        } else {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .with_writer(make_writer)
                    .with_ansi(false),
            )
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!(json = config.json, stderr = config.stderr, "tracing initialized");
        }
    });
}
