use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;

use crate::error::{GatewayError, Result};

use super::model::AppConfig;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolves the platform per-user configuration directory, honoring
/// `GATEWAY_CONFIG_DIR` for test isolation.
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("GATEWAY_CONFIG_DIR") {
        return Ok(PathBuf::from(dir).join(CONFIG_FILE_NAME));
    }
    ProjectDirs::from("", "", "llm-stream-gateway")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .ok_or_else(|| GatewayError::ConfigIoError(std::io::Error::other(
            "could not determine the platform configuration directory",
        )))
}

/// Durable holder of the provider catalogue. Reads and writes are
/// serialized through a single mutex; the document is small enough that
/// full-document rewrite on every save is acceptable.
pub struct ConfigStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        ConfigStore { path, guard: Mutex::new(()) }
    }

    pub fn at_default_path() -> Result<Self> {
        Ok(ConfigStore::new(resolve_config_path()?))
    }

    pub fn path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Loads the catalogue. If no document exists, seeds the default
    /// catalogue, writes it to disk, and returns it — unless
    /// `seed_on_missing` is false, in which case a missing document is
    /// reported as [`GatewayError::ConfigMissing`].
    pub fn load(&self) -> Result<AppConfig> {
        self.load_inner(true)
    }

    /// Like [`ConfigStore::load`] but fails with `ConfigMissing` instead
    /// of seeding a default catalogue when no document exists.
    pub fn load_strict(&self) -> Result<AppConfig> {
        self.load_inner(false)
    }

    fn load_inner(&self, seed_on_missing: bool) -> Result<AppConfig> {
        let _lock = self.guard.lock().unwrap();
        if !self.path.exists() {
            if seed_on_missing {
                drop(_lock);
                let seeded = AppConfig::seeded();
                self.save(seeded.clone())?;
                return Ok(seeded);
            }
            return Err(GatewayError::ConfigMissing { path: self.path() });
        }
        let text = std::fs::read_to_string(&self.path)?;
        let mut config: AppConfig = toml::from_str(&text)?;
        config.validate()?;
        for (name, record) in &config.providers {
            record
                .validate()
                .map_err(|e| GatewayError::ConfigInvalid(format!("provider '{name}': {e}")))?;
        }
        apply_default_provider_override(&mut config);
        Ok(config)
    }

    /// Validates `config`, then writes it atomically: serialize to a
    /// sibling temp file in the same directory, then rename over the
    /// target. A crash mid-write never leaves a half-written document.
    pub fn save(&self, config: AppConfig) -> Result<()> {
        config.validate()?;
        for (name, record) in &config.providers {
            record
                .validate()
                .map_err(|e| GatewayError::ConfigInvalid(format!("provider '{name}': {e}")))?;
        }
        let text = toml::to_string_pretty(&config)?;

        let _lock = self.guard.lock().unwrap();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_path_for(&self.path);
        std::fs::write(&tmp_path, text)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Convenience mutation: loads, changes `default`, saves.
    pub fn set_default(&self, name: &str) -> Result<()> {
        let mut config = self.load_strict()?;
        if !config.providers.contains_key(name) {
            return Err(GatewayError::UnknownProvider(name.to_string()));
        }
        config.default = name.to_string();
        self.save(config)
    }
}

/// Honors `GATEWAY_DEFAULT_PROVIDER` for CI-style invocation: if set and
/// naming an entry that exists in the loaded catalogue, it overrides
/// `default` in the returned value without touching the document on
/// disk. An unset or unknown-provider value is silently ignored.
fn apply_default_provider_override(config: &mut AppConfig) {
    if let Ok(name) = std::env::var("GATEWAY_DEFAULT_PROVIDER") {
        if config.providers.contains_key(&name) {
            config.default = name;
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
