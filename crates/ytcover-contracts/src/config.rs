use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ENV_DRIVER: &str = "YT_COVER_GEN_DRIVER";
pub const ENV_OUTPUT_PATH: &str = "YT_COVER_GEN_OUTPUT_PATH";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_MODEL: &str = "YT_COVER_GEN_OPENAI_MODEL";
pub const ENV_OPENAI_SIZE: &str = "YT_COVER_GEN_OPENAI_SIZE";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "YT_COVER_GEN_GEMINI_MODEL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown driver '{0}' (expected 'openai' or 'gemini')")]
    UnknownDriver(String),

    #[error("failed reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which provider generates the cover first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    OpenAi,
    Gemini,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::OpenAi => "openai",
            Driver::Gemini => "gemini",
        }
    }

    /// The driver used as fallback when this one is primary.
    pub fn other(&self) -> Driver {
        match self {
            Driver::OpenAi => Driver::Gemini,
            Driver::Gemini => Driver::OpenAi,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Driver::OpenAi),
            "gemini" => Ok(Driver::Gemini),
            _ => Err(ConfigError::UnknownDriver(raw.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiDriverConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiDriverConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriversConfig {
    pub openai: OpenAiDriverConfig,
    pub gemini: GeminiDriverConfig,
}

/// Fully resolved settings handed to the cover engine.
///
/// The engine never looks at the environment; everything it needs arrives
/// through this struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverGenConfig {
    pub driver: Driver,
    pub output_path: Option<PathBuf>,
    pub drivers: DriversConfig,
}

impl CoverGenConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: CoverGenConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.normalize_blanks();
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides_from(lookup)?;
        Ok(config)
    }

    /// Layers non-blank values from `lookup` over the current settings.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(non_blank);

        if let Some(driver) = get(ENV_DRIVER) {
            self.driver = driver.parse()?;
        }
        if let Some(output_path) = get(ENV_OUTPUT_PATH) {
            self.output_path = Some(PathBuf::from(output_path));
        }

        let openai = &mut self.drivers.openai;
        override_with(&mut openai.api_key, get(ENV_OPENAI_API_KEY));
        override_with(&mut openai.model, get(ENV_OPENAI_MODEL));
        override_with(&mut openai.size, get(ENV_OPENAI_SIZE));

        let gemini = &mut self.drivers.gemini;
        override_with(&mut gemini.api_key, get(ENV_GEMINI_API_KEY));
        override_with(&mut gemini.model, get(ENV_GEMINI_MODEL));
        Ok(())
    }

    pub fn api_key_for(&self, driver: Driver) -> Option<&str> {
        match driver {
            Driver::OpenAi => self.drivers.openai.api_key.as_deref(),
            Driver::Gemini => self.drivers.gemini.api_key.as_deref(),
        }
    }

    fn normalize_blanks(&mut self) {
        for slot in [
            &mut self.drivers.openai.api_key,
            &mut self.drivers.openai.model,
            &mut self.drivers.openai.size,
            &mut self.drivers.gemini.api_key,
            &mut self.drivers.gemini.model,
        ] {
            *slot = slot.take().and_then(non_blank);
        }
    }
}

fn override_with(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn defaults_to_openai_without_keys() -> anyhow::Result<()> {
        let config = CoverGenConfig::from_lookup(|_| None)?;
        assert_eq!(config.driver, Driver::OpenAi);
        assert!(config.output_path.is_none());
        assert!(config.api_key_for(Driver::OpenAi).is_none());
        assert!(config.api_key_for(Driver::Gemini).is_none());
        Ok(())
    }

    #[test]
    fn env_lookup_populates_every_driver_field() -> anyhow::Result<()> {
        let config = CoverGenConfig::from_lookup(lookup_from(&[
            (ENV_DRIVER, "Gemini"),
            (ENV_OUTPUT_PATH, "/srv/covers"),
            (ENV_OPENAI_API_KEY, "sk-openai"),
            (ENV_OPENAI_MODEL, "gpt-image-1-mini"),
            (ENV_OPENAI_SIZE, "1024x1024"),
            (ENV_GEMINI_API_KEY, "gm-key"),
            (ENV_GEMINI_MODEL, "gemini-2.5-flash-image"),
        ]))?;

        assert_eq!(config.driver, Driver::Gemini);
        assert_eq!(config.output_path, Some(PathBuf::from("/srv/covers")));
        assert_eq!(config.drivers.openai.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(
            config.drivers.openai.model.as_deref(),
            Some("gpt-image-1-mini")
        );
        assert_eq!(config.drivers.openai.size.as_deref(), Some("1024x1024"));
        assert_eq!(config.api_key_for(Driver::Gemini), Some("gm-key"));
        assert_eq!(
            config.drivers.gemini.model.as_deref(),
            Some("gemini-2.5-flash-image")
        );
        Ok(())
    }

    #[test]
    fn blank_env_values_are_ignored() -> anyhow::Result<()> {
        let config = CoverGenConfig::from_lookup(lookup_from(&[
            (ENV_OPENAI_API_KEY, "   "),
            (ENV_DRIVER, ""),
        ]))?;
        assert_eq!(config.driver, Driver::OpenAi);
        assert!(config.drivers.openai.api_key.is_none());
        Ok(())
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let err = CoverGenConfig::from_lookup(lookup_from(&[(ENV_DRIVER, "dalle")]))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "unknown driver 'dalle' (expected 'openai' or 'gemini')");
    }

    #[test]
    fn file_config_is_overridden_by_env() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("yt-cover-gen.json");
        fs::write(
            &path,
            r#"{
                "driver": "gemini",
                "output_path": "covers",
                "drivers": {
                    "openai": { "api_key": "", "size": "1536x1024" },
                    "gemini": { "api_key": "from-file" }
                }
            }"#,
        )?;

        let mut config = CoverGenConfig::load(&path)?;
        assert_eq!(config.driver, Driver::Gemini);
        assert!(config.drivers.openai.api_key.is_none());
        assert_eq!(config.api_key_for(Driver::Gemini), Some("from-file"));

        config.apply_overrides_from(lookup_from(&[
            (ENV_DRIVER, "openai"),
            (ENV_OPENAI_API_KEY, "sk-env"),
        ]))?;
        assert_eq!(config.driver, Driver::OpenAi);
        assert_eq!(config.api_key_for(Driver::OpenAi), Some("sk-env"));
        assert_eq!(config.api_key_for(Driver::Gemini), Some("from-file"));
        assert_eq!(config.output_path, Some(PathBuf::from("covers")));
        Ok(())
    }

    #[test]
    fn malformed_file_reports_path() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json")?;
        let err = CoverGenConfig::load(&path).err();
        assert!(matches!(err, Some(ConfigError::Parse { .. })));
        Ok(())
    }

    #[test]
    fn driver_other_swaps() {
        assert_eq!(Driver::OpenAi.other(), Driver::Gemini);
        assert_eq!(Driver::Gemini.other(), Driver::OpenAi);
        assert_eq!(Driver::Gemini.to_string(), "gemini");
    }
}
