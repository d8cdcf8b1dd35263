use std::path::{Path, PathBuf};
use std::{fmt, io};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::{Environment, UnknownEnvironment};

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and environment configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Identifies which configuration file is currently being loaded.
#[derive(Debug, Clone, Copy)]
enum ConfigFileKind {
    /// Always-present base configuration.
    Base,
    /// Optional environment-specific overlay (dev/prod).
    Environment(Environment),
}

impl ConfigFileKind {
    fn stem(&self) -> &'static str {
        match self {
            ConfigFileKind::Base => "base",
            ConfigFileKind::Environment(env) => env.as_str(),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The `configuration` directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// Could not locate the required base configuration file.
    #[error("could not locate the base configuration in `{directory}`")]
    BaseConfigurationMissing { directory: PathBuf },

    /// A configuration source existed but could not be parsed or merged.
    #[error("failed to merge configuration sources: {0}")]
    Merge(#[source] config::ConfigError),

    /// The configuration sources merged but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),

    /// Failed to determine the runtime environment (`APP_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] UnknownEnvironment),
}

/// Loads hierarchical configuration from base file, environment overlay, and
/// environment variables.
///
/// Reads `configuration/base.(yaml|yml|json)`, then an optional
/// `configuration/{environment}.(yaml|yml|json)` overlay, then `APP_`-prefixed
/// environment variable overrides where nested keys use double underscores
/// (`APP_STORE__DIR`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let configuration_directory = base_path.join(CONFIGURATION_DIR);

    if !configuration_directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            configuration_directory,
        ));
    }

    let environment = Environment::load()?;

    let mut builder = config::Config::builder();

    let base_kind = ConfigFileKind::Base;
    let Some(base_file) = locate_config_file(&configuration_directory, base_kind) else {
        return Err(LoadConfigError::BaseConfigurationMissing {
            directory: configuration_directory,
        });
    };
    builder = builder.add_source(config::File::from(base_file));

    let environment_kind = ConfigFileKind::Environment(environment);
    if let Some(environment_file) = locate_config_file(&configuration_directory, environment_kind) {
        builder = builder.add_source(config::File::from(environment_file));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR),
    );

    let settings = builder.build().map_err(LoadConfigError::Merge)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Returns the first existing configuration file for `kind`, trying each
/// supported extension in order.
fn locate_config_file(directory: &Path, kind: ConfigFileKind) -> Option<PathBuf> {
    CONFIG_FILE_EXTENSIONS.iter().find_map(|extension| {
        let candidate = directory.join(format!("{}.{extension}", kind.stem()));
        candidate.is_file().then_some(candidate)
    })
}
