//! Configuration management for `lijo`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`LIJO_*`)
//! 3. Data directory config (`<data-dir>/config.yaml`)
//! 4. User config (`~/.config/lijo/config.yaml`)
//! 5. Defaults

use crate::error::{LijoError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default database filename inside the data directory.
pub const DEFAULT_DB_FILENAME: &str = "lijo.db";
/// Default preferences filename inside the data directory.
pub const DEFAULT_PREFERENCES_FILENAME: &str = "preferences.json";
/// How long a shared live query outlives its last subscriber.
pub const DEFAULT_SUBSCRIPTION_GRACE_MS: u64 = 5000;

const KEY_DATA_DIR: &str = "data-dir";
const KEY_DB: &str = "db";
const KEY_PREFERENCES: &str = "preferences";
const KEY_GRACE: &str = "subscription-grace-ms";

/// A flat layer of configuration values keyed by normalized names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Build a layer from `LIJO_*` pairs.
    #[must_use]
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut layer = Self::default();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix("LIJO_") {
                layer.insert(stripped, value);
            }
        }
        layer
    }

    pub fn insert(&mut self, key: &str, value: String) {
        self.values.insert(normalize_key(key), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&String> {
        self.values.get(&normalize_key(key))
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_dir: Option<PathBuf>,
    pub db: Option<PathBuf>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(path) = &self.data_dir {
            layer.insert(KEY_DATA_DIR, path.to_string_lossy().to_string());
        }
        if let Some(path) = &self.db {
            layer.insert(KEY_DB, path.to_string_lossy().to_string());
        }

        layer
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub preferences_path: PathBuf,
    pub subscription_grace: Duration,
}

impl Settings {
    /// Resolve settings from a merged layer.
    ///
    /// Relative `db` and `preferences` paths are taken relative to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory can be determined or a value is malformed.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let data_dir = match layer.get(KEY_DATA_DIR) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };

        let db_path = resolve_in(&data_dir, layer.get(KEY_DB), DEFAULT_DB_FILENAME);
        let preferences_path = resolve_in(
            &data_dir,
            layer.get(KEY_PREFERENCES),
            DEFAULT_PREFERENCES_FILENAME,
        );

        let grace_ms = match layer.get(KEY_GRACE) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                LijoError::validation(KEY_GRACE, format!("expected milliseconds, got {raw:?}"))
            })?,
            None => DEFAULT_SUBSCRIPTION_GRACE_MS,
        };

        Ok(Self {
            data_dir,
            db_path,
            preferences_path,
            subscription_grace: Duration::from_millis(grace_ms),
        })
    }
}

/// Load user config (~/.config/lijo/config.yaml). Without `HOME` the layer is empty.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    let Ok(home) = env::var("HOME") else {
        return Ok(ConfigLayer::default());
    };
    let path = Path::new(&home)
        .join(".config")
        .join("lijo")
        .join("config.yaml");
    ConfigLayer::from_yaml(&path)
}

/// Load the data directory's own config.yaml.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_data_dir_config(data_dir: &Path) -> Result<ConfigLayer> {
    ConfigLayer::from_yaml(&data_dir.join("config.yaml"))
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.insert(KEY_DB, DEFAULT_DB_FILENAME.to_string());
    layer.insert(KEY_PREFERENCES, DEFAULT_PREFERENCES_FILENAME.to_string());
    layer.insert(KEY_GRACE, DEFAULT_SUBSCRIPTION_GRACE_MS.to_string());
    layer
}

/// Load settings with the documented precedence order.
///
/// The data directory is resolved first (it decides where the data-dir
/// config lives), then every layer is merged again with that file included.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed, or the
/// merged values are invalid.
pub fn load_settings(cli: &CliOverrides) -> Result<Settings> {
    load_settings_with(load_user_config()?, ConfigLayer::from_env(), cli)
}

fn load_settings_with(
    user: ConfigLayer,
    env_layer: ConfigLayer,
    cli: &CliOverrides,
) -> Result<Settings> {
    let defaults = default_config_layer();
    let cli_layer = cli.as_layer();

    let bootstrap = ConfigLayer::merge_layers(&[
        defaults.clone(),
        user.clone(),
        env_layer.clone(),
        cli_layer.clone(),
    ]);
    let data_dir = Settings::from_layer(&bootstrap)?.data_dir;
    let data_dir_layer = load_data_dir_config(&data_dir)?;

    let merged = ConfigLayer::merge_layers(&[defaults, user, data_dir_layer, env_layer, cli_layer]);
    let mut settings = Settings::from_layer(&merged)?;
    // The data-dir file cannot move the directory it lives in.
    if settings.data_dir != data_dir {
        settings = Settings::from_layer(&ConfigLayer::merge_layers(&[
            merged,
            data_dir_override(&data_dir),
        ]))?;
    }
    Ok(settings)
}

fn data_dir_override(data_dir: &Path) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.insert(KEY_DATA_DIR, data_dir.to_string_lossy().to_string());
    layer
}

fn default_data_dir() -> Result<PathBuf> {
    let home = env::var("HOME").map_err(|_| {
        LijoError::Config("HOME not set; pass --data-dir or set LIJO_DATA_DIR".to_string())
    })?;
    Ok(Path::new(&home).join(".local").join("share").join("lijo"))
}

fn resolve_in(data_dir: &Path, value: Option<&String>, default: &str) -> PathBuf {
    let candidate = PathBuf::from(value.map_or(default, String::as_str));
    if candidate.is_absolute() {
        candidate
    } else {
        data_dir.join(candidate)
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    for (key, value) in flat {
        layer.insert(&key, value);
    }

    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}
