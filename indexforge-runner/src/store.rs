//! On-disk composition store.
//!
//! Layout: `{root}/{INDEX}/{YYYY-MM-DD}.json`
//!
//! A composition for an (index, date) is written once and never replaced.
//! Writes go to a `.tmp` file that is then linked into place, so a reader
//! sees either no file or the complete document, and a second save for the
//! same (index, date) fails instead of clobbering the first.

use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use indexforge_core::config::{validate_index_name, ConfigError};
use indexforge_core::domain::{Composition, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("composition for {index} on {date} already stored; compositions are immutable")]
    AlreadyExists { index: String, date: NaiveDate },

    #[error("no stored composition for {index} on {date}")]
    NotFound { index: String, date: NaiveDate },

    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error(transparent)]
    InvalidIndexName(#[from] ConfigError),
}

/// One stored composition, as listed from disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoredEntry {
    pub index_name: String,
    pub rebalance_date: NaiveDate,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CompositionStore {
    root: PathBuf,
}

impl CompositionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_dir(&self, index: &str) -> Result<PathBuf, StoreError> {
        validate_index_name(index)?;
        Ok(self.root.join(index))
    }

    pub fn path_for(&self, index: &str, date: NaiveDate) -> Result<PathBuf, StoreError> {
        Ok(self.index_dir(index)?.join(format!("{date}.json")))
    }

    /// Persist a composition. Fails if one already exists for its
    /// (index, date).
    pub fn save(&self, composition: &Composition) -> Result<PathBuf, StoreError> {
        let index = &composition.index_name;
        let date = composition.rebalance_date;
        let dir = self.index_dir(index)?;
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(format!("{date}.json"));
        if path.exists() {
            return Err(StoreError::AlreadyExists {
                index: index.clone(),
                date,
            });
        }

        let json = serde_json::to_vec_pretty(composition).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let tmp_path = dir.join(format!(".{date}.{}.tmp", composition.run_id.short()));
        fs::write(&tmp_path, &json).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;

        // hard_link refuses an existing target, unlike rename.
        let linked = fs::hard_link(&tmp_path, &path);
        let _ = fs::remove_file(&tmp_path);
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists {
                    index: index.clone(),
                    date,
                })
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        }

        tracing::info!(index = %index, %date, path = %path.display(), "composition stored");
        Ok(path)
    }

    pub fn load(&self, index: &str, date: NaiveDate) -> Result<Composition, StoreError> {
        let path = self.path_for(index, date)?;
        if !path.exists() {
            return Err(StoreError::NotFound {
                index: index.to_string(),
                date,
            });
        }
        read_composition(&path)
    }

    /// Every stored composition, sorted by index then date.
    pub fn list(&self) -> Result<Vec<StoredEntry>, StoreError> {
        let mut entries = Vec::new();
        if !self.root.exists() {
            return Ok(entries);
        }
        for index_dir in read_dir(&self.root)? {
            if !index_dir.is_dir() {
                continue;
            }
            let Some(index_name) = index_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            for path in read_dir(&index_dir)? {
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let date = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
                if let Some(rebalance_date) = date {
                    entries.push(StoredEntry {
                        index_name: index_name.to_string(),
                        rebalance_date,
                        path,
                    });
                }
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Dates stored for one index, ascending.
    pub fn dates(&self, index: &str) -> Result<Vec<NaiveDate>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| e.index_name == index)
            .map(|e| e.rebalance_date)
            .collect())
    }

    /// Most recent composition strictly before `date`, if any.
    pub fn latest_before(&self, index: &str, date: NaiveDate) -> Result<Option<Composition>, StoreError> {
        let previous = self.dates(index)?.into_iter().filter(|d| *d < date).max();
        previous.map(|d| self.load(index, d)).transpose()
    }

    /// Most recent composition for an index.
    pub fn latest(&self, index: &str) -> Result<Option<Composition>, StoreError> {
        let last = self.dates(index)?.into_iter().max();
        last.map(|d| self.load(index, d)).transpose()
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let io_err = |source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    Ok(paths)
}

/// Read a composition file, rejecting newer schema versions.
pub fn read_composition(path: &Path) -> Result<Composition, StoreError> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let composition: Composition =
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    if composition.schema_version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: composition.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(composition)
}
