use crate::cache::Principal;
use crate::document::sniff::DEFAULT_SNIFF_WINDOW;
use crate::document::{DEFAULT_ENCODINGS, ReadOptions, Sniffer, TextEncoding};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "TABNORM_CONFIG";
pub const CACHE_DIR_ENV: &str = "TABNORM_CACHE_DIR";
pub const PRINCIPAL_ENV: &str = "TABNORM_PRINCIPAL";

/// Immutable run configuration, loaded once and passed down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub sniff_window: usize,
    pub encodings: Vec<TextEncoding>,
    pub strict_columns: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("tabnorm_cache"),
            sniff_window: DEFAULT_SNIFF_WINDOW,
            encodings: DEFAULT_ENCODINGS.to_vec(),
            strict_columns: false,
        }
    }
}

impl Config {
    /// Load from `explicit`, else `$TABNORM_CONFIG`, else defaults; then apply
    /// `$TABNORM_CACHE_DIR`.
    pub fn load(explicit: Option<&Path>) -> Result<Self, PipelineError> {
        Self::load_with_env(explicit, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(explicit: Option<&Path>, get_env: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = get_env(CONFIG_ENV)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(dir) = get_env(CACHE_DIR_ENV)
            && !dir.trim().is_empty()
        {
            config.cache_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path).map_err(|error| {
            PipelineError::Config(format!(
                "failed to read config '{}': {error}",
                path.display()
            ))
        })?;
        Self::from_yaml(&content)
            .map_err(|error| PipelineError::Config(format!("{}: {error}", path.display())))
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|error| format!("invalid YAML: {error}"))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sniff_window == 0 {
            return Err(PipelineError::Config(
                "sniff_window must be at least 1 byte".to_owned(),
            ));
        }
        if self.encodings.is_empty() {
            return Err(PipelineError::Config(
                "encodings must list at least one candidate".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            sniffer: Sniffer::with_window(self.sniff_window),
            encodings: self.encodings.clone(),
        }
    }
}

/// Principal for CLI runs: `$TABNORM_PRINCIPAL`, else `$USER`, else `default`.
pub fn principal_from_env<F>(get_env: F) -> Principal
where
    F: Fn(&str) -> Option<String>,
{
    [PRINCIPAL_ENV, "USER"]
        .into_iter()
        .filter_map(|key| get_env(key))
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
        .map(Principal::new)
        .unwrap_or_else(|| Principal::new("default"))
}
