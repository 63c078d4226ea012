use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::normalize::BadHostPolicy;

pub const QUALIFIER: &str = "com";
pub const ORGANIZATION: &str = "savenews";
pub const APPLICATION: &str = "savenews";

pub const ORIGIN_ENV: &str = "SAVENEWS_API_ORIGIN";
pub const BAD_HOSTS_ENV: &str = "SAVENEWS_BAD_HOST_MARKERS";

const SETTINGS_FILE: &str = "config.toml";

pub fn config_root() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION).map(|p| p.config_dir().to_path_buf())
}

pub fn settings_path() -> Option<PathBuf> {
    config_root().map(|dir| dir.join(SETTINGS_FILE))
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiSettings {
    pub origin: Option<String>,
    pub bad_host_markers: Option<Vec<String>>,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies `SAVENEWS_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(origin) = lookup(ORIGIN_ENV).filter(|o| !o.trim().is_empty()) {
            self.api.origin = Some(origin);
        }
        if let Some(markers) = lookup(BAD_HOSTS_ENV) {
            self.api.bad_host_markers = Some(
                markers
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
    }
}

impl Settings {
    fn override_origin(&mut self, origin: Option<&str>) {
        if let Some(origin) = origin {
            self.api.origin = Some(origin.to_string());
        }
    }
}

/// Backend location and URL repair policy, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    origin: String,
    bad_hosts: BadHostPolicy,
}

impl ApiConfig {
    pub fn new(origin: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            origin: validate_origin(origin)?,
            bad_hosts: BadHostPolicy::default(),
        })
    }

    pub fn with_bad_hosts(mut self, bad_hosts: BadHostPolicy) -> Self {
        self.bad_hosts = bad_hosts;
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let origin = settings
            .api
            .origin
            .as_deref()
            .ok_or(ConfigError::MissingOrigin)?;
        let config = Self::new(origin)?;
        Ok(match &settings.api.bad_host_markers {
            Some(markers) => config.with_bad_hosts(BadHostPolicy::new(markers.clone())),
            None => config,
        })
    }

    /// Reads the settings file (if any) and then the process environment.
    pub fn load(settings_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_origin(settings_file, None)
    }

    /// Like [`ApiConfig::load`], with `origin` taking precedence over both
    /// the file and the environment. Other settings still apply.
    pub fn load_with_origin(
        settings_file: Option<&Path>,
        origin: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut settings = match settings_file.map(Path::to_path_buf).or_else(settings_path) {
            Some(path) => {
                tracing::debug!("reading settings from {}", path.display());
                Settings::load_or_default(&path)?
            }
            None => Settings::default(),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.override_origin(origin);
        Self::from_settings(&settings)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn bad_hosts(&self) -> &BadHostPolicy {
        &self.bad_hosts
    }
}

fn validate_origin(raw: &str) -> Result<String, ConfigError> {
    let origin = raw.trim().trim_end_matches('/');
    if origin.is_empty() {
        return Err(ConfigError::MissingOrigin);
    }
    let parsed = Url::parse(origin).map_err(|source| ConfigError::InvalidOrigin {
        origin: origin.to_string(),
        source,
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    Ok(origin.to_string())
}
