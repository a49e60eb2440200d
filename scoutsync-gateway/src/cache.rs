//! On-disk record cache.
//!
//! One JSON file per (location, key) pair under a per-event root directory:
//! `<root>/<location>/<key>.json`. The freshness marker of every entry is
//! kept in an in-memory index loaded when the cache is opened, so staleness
//! checks never touch the disk.

use crate::error::GatewayError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Field carrying the freshness marker inside every cached body.
pub const MARKER_FIELD: &str = "last_modified";

/// The local cache directory for one event.
pub struct CacheDir {
    root: PathBuf,
    /// (location, key) -> last_modified marker of the cached body.
    index: RwLock<HashMap<(String, String), i64>>,
}

impl CacheDir {
    /// Opens or creates the cache at the given root directory and loads the
    /// marker index from the entries already on disk.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let cache = Self {
            root,
            index: RwLock::new(HashMap::new()),
        };
        cache.load_index()?;

        Ok(cache)
    }

    fn load_index(&self) -> Result<(), GatewayError> {
        let mut index = self.index.write();
        for location_entry in fs::read_dir(&self.root)? {
            let location_path = location_entry?.path();
            if !location_path.is_dir() {
                continue;
            }
            let Some(location) = location_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let location = location.to_string();

            for file_entry in fs::read_dir(&location_path)? {
                let file_path = file_entry?.path();
                if file_path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(key) = file_path.file_stem().and_then(|n| n.to_str()) else {
                    continue;
                };

                let body = read_body(&file_path)?;
                let marker = marker_of(&body);
                index.insert((location.clone(), key.to_string()), marker);
            }
        }

        tracing::debug!("Loaded {} cache entries from {}", index.len(), self.root.display());
        Ok(())
    }

    /// Returns the freshness marker of a cached entry, if present.
    pub fn marker(&self, location: &str, key: &str) -> Option<i64> {
        self.index
            .read()
            .get(&(location.to_string(), key.to_string()))
            .copied()
    }

    /// Returns whether an entry is cached.
    pub fn contains(&self, location: &str, key: &str) -> bool {
        self.marker(location, key).is_some()
    }

    /// Reads a cached body.
    pub fn read(&self, location: &str, key: &str) -> Result<Option<Value>, GatewayError> {
        if !self.contains(location, key) {
            return Ok(None);
        }
        let path = self.entry_path(location, key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_body(&path)?))
    }

    /// Writes a body to its cache file and updates the marker index.
    pub fn write(&self, location: &str, key: &str, body: &Value) -> Result<(), GatewayError> {
        fs::create_dir_all(self.root.join(location))?;

        let path = self.entry_path(location, key);
        let data = serde_json::to_vec_pretty(body)?;
        let mut file = File::create(&path)?;
        file.write_all(&data)?;
        file.sync_all()?;

        self.index
            .write()
            .insert((location.to_string(), key.to_string()), marker_of(body));

        Ok(())
    }

    /// Reads every cached body under a location, ordered by key.
    pub fn read_all(&self, location: &str) -> Result<Vec<Value>, GatewayError> {
        let mut keys: Vec<String> = {
            let index = self.index.read();
            index
                .keys()
                .filter(|(loc, _)| loc == location)
                .map(|(_, key)| key.clone())
                .collect()
        };
        keys.sort();

        let mut bodies = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(body) = self.read(location, &key)? {
                bodies.push(body);
            }
        }
        Ok(bodies)
    }

    /// Number of cached entries across all locations.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    fn entry_path(&self, location: &str, key: &str) -> PathBuf {
        self.root.join(location).join(format!("{}.json", key))
    }
}

fn read_body(path: &Path) -> Result<Value, GatewayError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| GatewayError::Corruption {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn marker_of(body: &Value) -> i64 {
    body.get(MARKER_FIELD).and_then(Value::as_i64).unwrap_or(0)
}
