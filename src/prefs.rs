//! Key-value preferences stored as a small JSON file.
//!
//! Writes replace the file atomically (temp file + rename) and are then
//! published to every open watch. Single writer; the last write wins.

use crate::error::{LijoError, Result};
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

/// Preference key for the dark theme flag.
pub const IS_DARK_MODE: &str = "is_dark_mode";

type Values = Map<String, Value>;

/// File-backed preference map.
#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    tx: watch::Sender<Values>,
}

impl PreferenceStore {
    /// Load preferences from `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a JSON object.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let contents = fs::read_to_string(path)?;
            match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => map,
                other => {
                    return Err(LijoError::Config(format!(
                        "preferences file {} holds {}, expected an object",
                        path.display(),
                        json_kind(&other)
                    )));
                }
            }
        } else {
            Map::new()
        };
        debug!(path = %path.display(), keys = values.len(), "Loaded preferences");

        let (tx, _) = watch::channel(values);
        Ok(Self {
            path: path.to_path_buf(),
            tx,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored boolean for `key`, if present and boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.tx.borrow().get(key).and_then(Value::as_bool)
    }

    /// Durably store `value` under `key`, then notify watchers.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written; watchers are not
    /// notified in that case.
    pub fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        let mut next = self.tx.borrow().clone();
        next.insert(key.to_string(), Value::Bool(value));
        write_atomically(&self.path, &next)?;
        self.tx.send_replace(next);
        debug!(key, value, "Stored preference");
        Ok(())
    }

    /// Watch one boolean key, reading `default` while it is unset.
    #[must_use]
    pub fn watch_bool(&self, key: &str, default: bool) -> PreferenceWatch {
        let rx = self.tx.subscribe();
        let last = read_bool(&rx.borrow(), key, default);
        PreferenceWatch {
            key: key.to_string(),
            default,
            rx,
            last,
        }
    }
}

/// A live view of one boolean preference.
#[derive(Debug, Clone)]
pub struct PreferenceWatch {
    key: String,
    default: bool,
    rx: watch::Receiver<Values>,
    /// Value most recently handed out by this watch.
    last: bool,
}

impl PreferenceWatch {
    #[must_use]
    pub fn current(&self) -> bool {
        read_bool(&self.rx.borrow(), &self.key, self.default)
    }

    /// Wait until the value differs from the last one this watch returned.
    ///
    /// A write made before this is awaited still counts.
    ///
    /// # Errors
    ///
    /// Returns `StoreClosed` once the store is dropped.
    pub async fn changed(&mut self) -> Result<bool> {
        loop {
            self.rx.changed().await.map_err(|_| LijoError::StoreClosed)?;
            let value = read_bool(&self.rx.borrow_and_update(), &self.key, self.default);
            if value != self.last {
                self.last = value;
                return Ok(value);
            }
        }
    }

    /// Stream of values: the current one first, then every distinct change.
    pub fn into_stream(self) -> impl Stream<Item = bool> + Send {
        let Self { key, default, rx, .. } = self;
        WatchStream::new(rx)
            .map(move |values| read_bool(&values, &key, default))
            .scan(None, |last, value| {
                let emit = *last != Some(value);
                *last = Some(value);
                futures::future::ready(Some(emit.then_some(value)))
            })
            .filter_map(futures::future::ready)
    }
}

/// Typed access to the theme flag.
#[derive(Debug)]
pub struct ThemeManager {
    store: PreferenceStore,
}

impl ThemeManager {
    #[must_use]
    pub const fn new(store: PreferenceStore) -> Self {
        Self { store }
    }

    /// Open the preference file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded.
    pub fn open(path: &Path) -> Result<Self> {
        PreferenceStore::open(path).map(Self::new)
    }

    /// Whether dark mode is on; light (false) when never set.
    #[must_use]
    pub fn is_dark_mode(&self) -> bool {
        self.store.get_bool(IS_DARK_MODE).unwrap_or(false)
    }

    #[must_use]
    pub fn watch_dark_mode(&self) -> PreferenceWatch {
        self.store.watch_bool(IS_DARK_MODE, false)
    }

    /// # Errors
    ///
    /// Returns an error if the preference cannot be persisted.
    pub fn set_dark_mode(&self, is_dark: bool) -> Result<()> {
        self.store.set_bool(IS_DARK_MODE, is_dark)
    }
}

fn read_bool(values: &Values, key: &str, default: bool) -> bool {
    match values.get(key) {
        None => default,
        Some(Value::Bool(value)) => *value,
        Some(other) => {
            warn!(key, kind = json_kind(other), "Ignoring non-boolean preference");
            default
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn write_atomically(path: &Path, values: &Values) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let temp_path = path.with_extension("json.tmp");
    let file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, values)?;
    writer.write_all(b"\n")?;
    writer
        .into_inner()
        .map_err(|e| LijoError::Io(e.into_error()))?
        .sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}
