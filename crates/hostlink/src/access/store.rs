//! Persisted permission decisions.
//!
//! The store keeps two disjoint sets of origins: those the user allowed, which
//! join the CORS allow-list, and those the user asked never to be prompted for
//! again. Every mutation is written through the injected
//! [`PermissionPersistence`] before it becomes visible; a failed write leaves
//! the in-memory state untouched.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::ACCESS_TARGET;

/// Serializable snapshot of the permission decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLists {
    /// Origins granted access.
    #[serde(default)]
    pub allowed: BTreeSet<String>,
    /// Origins refused without prompting.
    #[serde(default)]
    pub ignored: BTreeSet<String>,
}

/// Errors raised while loading or saving permission decisions.
#[derive(Debug, Error)]
pub enum PermissionStoreError {
    #[error("failed to read permission store {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("permission store {path} is not valid JSON: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write permission store {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize permission store: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("permission store unavailable: {message}")]
    Unavailable { message: String },
}

/// Durable backing for [`PermissionStore`].
pub trait PermissionPersistence {
    /// Loads previously saved decisions.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionStoreError`] when stored state exists but cannot
    /// be read.
    fn load(&mut self) -> Result<PermissionLists, PermissionStoreError>;

    /// Durably replaces the saved decisions.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionStoreError`] when the write did not complete.
    fn save(&mut self, lists: &PermissionLists) -> Result<(), PermissionStoreError>;
}

/// Keeps decisions for the lifetime of the process only.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    lists: PermissionLists,
}

impl MemoryPersistence {
    /// Starts from previously known decisions.
    #[must_use]
    pub const fn with_lists(lists: PermissionLists) -> Self {
        Self { lists }
    }
}

impl PermissionPersistence for MemoryPersistence {
    fn load(&mut self) -> Result<PermissionLists, PermissionStoreError> {
        Ok(self.lists.clone())
    }

    fn save(&mut self, lists: &PermissionLists) -> Result<(), PermissionStoreError> {
        self.lists = lists.clone();
        Ok(())
    }
}

/// Stores decisions as a JSON document, replaced atomically on each save.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: Utf8PathBuf,
}

impl JsonFilePersistence {
    /// Persists to `path`; the file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.path.as_path()
    }

    fn write_error(&self, source: io::Error) -> PermissionStoreError {
        PermissionStoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl PermissionPersistence for JsonFilePersistence {
    fn load(&mut self) -> Result<PermissionLists, PermissionStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(PermissionLists::default());
            }
            Err(source) => {
                return Err(PermissionStoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents).map_err(|source| PermissionStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&mut self, lists: &PermissionLists) -> Result<(), PermissionStoreError> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(directory).map_err(|source| self.write_error(source))?;

        let payload = serde_json::to_vec_pretty(lists)?;
        let mut file =
            tempfile::NamedTempFile::new_in(directory).map_err(|source| self.write_error(source))?;
        file.write_all(&payload)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|source| self.write_error(source))?;
        file.persist(&self.path)
            .map_err(|error| self.write_error(error.error))?;
        Ok(())
    }
}

/// Allowed and ignored origins, written through to persistence.
pub struct PermissionStore {
    lists: PermissionLists,
    persistence: Box<dyn PermissionPersistence>,
}

impl std::fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionStore")
            .field("lists", &self.lists)
            .finish_non_exhaustive()
    }
}

impl PermissionStore {
    /// Loads saved decisions and merges origins configured as ignored.
    ///
    /// Configured origins the user has since allowed stay allowed.
    ///
    /// # Errors
    ///
    /// Propagates [`PermissionPersistence::load`] failures.
    pub fn load<I, S>(
        mut persistence: Box<dyn PermissionPersistence>,
        configured_ignored: I,
    ) -> Result<Self, PermissionStoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lists = persistence.load()?;
        lists.ignored.retain(|origin| !lists.allowed.contains(origin));
        for origin in configured_ignored {
            let origin = origin.into();
            if !lists.allowed.contains(&origin) {
                lists.ignored.insert(origin);
            }
        }
        Ok(Self { lists, persistence })
    }

    /// Store with no prior decisions and no durable backing.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            lists: PermissionLists::default(),
            persistence: Box::new(MemoryPersistence::default()),
        }
    }

    /// Returns `true` when the user granted `origin` access.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.lists.allowed.contains(origin)
    }

    /// Returns `true` when `origin` must not be prompted for.
    #[must_use]
    pub fn is_ignored(&self, origin: &str) -> bool {
        self.lists.ignored.contains(origin)
    }

    /// Origins the user granted access, in sorted order.
    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.lists.allowed.iter().map(String::as_str)
    }

    /// Current snapshot of both sets.
    #[must_use]
    pub const fn lists(&self) -> &PermissionLists {
        &self.lists
    }

    /// Grants `origin` access and persists the decision.
    ///
    /// # Errors
    ///
    /// Returns the persistence error; the store is left unchanged.
    pub fn allow(&mut self, origin: &str) -> Result<(), PermissionStoreError> {
        self.update(origin, |lists, origin| {
            lists.ignored.remove(origin);
            lists.allowed.insert(origin.to_owned());
        })?;
        info!(target: ACCESS_TARGET, origin, "origin granted access");
        Ok(())
    }

    /// Stops prompting for `origin` and persists the decision.
    ///
    /// # Errors
    ///
    /// Returns the persistence error; the store is left unchanged.
    pub fn ignore(&mut self, origin: &str) -> Result<(), PermissionStoreError> {
        self.update(origin, |lists, origin| {
            lists.allowed.remove(origin);
            lists.ignored.insert(origin.to_owned());
        })?;
        info!(target: ACCESS_TARGET, origin, "origin added to ignore list");
        Ok(())
    }

    fn update(
        &mut self,
        origin: &str,
        apply: impl FnOnce(&mut PermissionLists, &str),
    ) -> Result<(), PermissionStoreError> {
        let mut next = self.lists.clone();
        apply(&mut next, origin);
        self.persistence.save(&next)?;
        self.lists = next;
        Ok(())
    }
}
