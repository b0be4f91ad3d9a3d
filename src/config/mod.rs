mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    BufferSettings, IngestSettings, LogSettings, ServerSettings, Settings, SourceSettings,
};

/// Loads the configuration from `config/default` and environment variables
/// and merges it over the default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(None)
}

/// Like [`load_config`], with an extra file layered between
/// `config/default` and the environment.
///
/// Environment keys use the `CHATRELAY_` prefix and `__` between section
/// and field, e.g. `CHATRELAY_SERVER__PORT=9000`.
pub fn load_config_from(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder =
        Config::builder().add_source(File::with_name("config/default").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .add_source(
            Environment::with_prefix("CHATRELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge(Settings::default()))
}
