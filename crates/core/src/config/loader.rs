//! Configuration sources: a TOML file overlaid with environment variables.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides, e.g. `DOCTRANS_RUN__MAX_CONCURRENCY`.
pub const ENV_PREFIX: &str = "DOCTRANS_";
/// Separator between nested keys in an override name.
const ENV_KEY_SEPARATOR: &str = "__";

/// File values first, environment overrides on top.
fn sources(path: &Path) -> Figment {
    Figment::from(Toml::file(path)).merge(Env::prefixed(ENV_PREFIX).split(ENV_KEY_SEPARATOR))
}

/// Load `path` and apply `DOCTRANS_` environment overrides.
///
/// The file must exist; it is never treated as an empty layer.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    sources(path)
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse a TOML document without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
