//! Layered loading: defaults, then an optional TOML file, then env.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};

use crate::ConfigResult;
use crate::error::ConfigError;
use crate::settings::Settings;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "NIMBUS_";

/// Env keys under the prefix that belong to the logger, not to [`Settings`].
const RESERVED_ENV_KEYS: &[&str] = &["log", "log_format"];

/// Builder for [`Settings`].
#[derive(Debug, Default)]
pub struct SettingsLoader {
    file: Option<PathBuf>,
    required: bool,
    skip_env: bool,
}

impl SettingsLoader {
    /// Loader with defaults and env only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `path` if it exists.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self.required = false;
        self
    }

    /// Merge `path`, failing if it does not exist.
    pub fn required_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self.required = true;
        self
    }

    /// Do not read `NIMBUS_*` variables.
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// The provider stack, without extracting.
    pub fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        if let Some(path) = &self.file {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            } else if self.required {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }

        if !self.skip_env {
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(RESERVED_ENV_KEYS)
                    .split("__"),
            );
        }

        Ok(figment)
    }

    /// Extract and validate.
    pub fn load(&self) -> ConfigResult<Settings> {
        let settings: Settings = self.figment()?.extract()?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Settings {
    /// Defaults, then `path` if given and present, then env.
    pub fn load(path: Option<&Path>) -> ConfigResult<Settings> {
        let loader = match path {
            Some(p) => SettingsLoader::new().file(p),
            None => SettingsLoader::new(),
        };
        loader.load()
    }
}
