use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "SLUICE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "sluice.toml";

/// How to launch the external fuzzing engine once arguments validate.
///
/// Each entry of `command` is an argument template; `{corpus_dir}`,
/// `{seed_dir}` and `{dictionary}` are substituted from the invocation.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    #[serde(default)]
    pub command: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

pub fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SluiceConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl SluiceConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: SluiceConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }

    /// `$SLUICE_CONFIG` if set, else `sluice.toml` in the working directory if
    /// present, else built-in defaults. A config file that fails to load also
    /// falls back to the defaults, so the dispatcher still validates arguments
    /// and prints usage.
    ///
    /// The load error is handed back so the caller can log it once a
    /// subscriber is installed. The dispatcher's argument shapes are fixed, so
    /// configuration cannot come from flags.
    pub fn discover_or_default() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default(Self::discovered_path().as_deref())
    }

    pub fn load_or_default(path: Option<&Path>) -> (Self, Option<anyhow::Error>) {
        match path.map(Self::load_from_file) {
            Some(Ok(config)) => (config, None),
            Some(Err(e)) => (Self::default(), Some(e)),
            None => (Self::default(), None),
        }
    }

    fn discovered_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        default_path.exists().then(|| default_path.to_path_buf())
    }
}
