use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TARGET_LANG: &str = "ZH";

/// Provider settings handed to the translator on every call.
///
/// The application never edits one in place: saving settings builds a new
/// value and swaps it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    /// Advisory only; the prompt decides the direction.
    pub target_lang: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            target_lang: DEFAULT_TARGET_LANG.to_string(),
        }
    }
}

impl Config {
    pub fn new(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        model: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.into(),
            model: model.into(),
            target_lang: target_lang.into(),
        }
    }

    /// Env vars win over the file when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 4] = [
            ("OPENAI_API_KEY", &mut self.api_key),
            ("OPENAI_API_URL", &mut self.api_url),
            ("OPENAI_MODEL", &mut self.model),
            ("TARGET_LANG", &mut self.target_lang),
        ];
        for (name, field) in fields {
            if let Some(v) = lookup(name).filter(|v| !v.is_empty()) {
                tracing::info!("{} overrides the stored setting", name);
                *field = v;
            }
        }
    }
}

/// Directory holding `config.json` and `log.txt`.
pub fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("yuyi")
}

/// JSON file backing the settings dialog.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::at(app_dir().join("config.json"))
    }
}

impl ConfigStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing file yields defaults, a broken one yields
    /// defaults plus a warning in the log.
    pub fn load(&self) -> Config {
        match self.try_load() {
            Ok(Some(cfg)) => {
                tracing::info!("Config loaded from {}", self.path.display());
                cfg
            }
            Ok(None) => {
                tracing::info!("No config at {}, using defaults", self.path.display());
                Config::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Config::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<Config>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let cfg = serde_json::from_str::<Config>(&s)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(cfg))
    }

    pub fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let s = serde_json::to_string_pretty(cfg)?;
        fs::write(&self.path, s).with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
