/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::LocalStore;
use crate::error::StoreError;

const VALUE_EXT: &str = "val";
const TEMP_EXT: &str = "tmp";

/// Directory-backed store: `<root>/<scope>/<hex(key)>.val`.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves either the old or the new value, never a torn one.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the `scope` namespace under `root`.
    ///
    /// Scopes are limited to ASCII alphanumerics, `-` and `_`.
    pub fn open(root: impl AsRef<Path>, scope: &str) -> Result<Self, StoreError> {
        let valid_scope = !scope.is_empty()
            && scope
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_scope {
            return Err(StoreError::InvalidKey(scope.to_string()));
        }

        let dir = root.as_ref().join(scope);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            key: scope.to_string(),
            source,
        })?;
        debug!("file store opened at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str, ext: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.{ext}", encode_key(key))))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key, VALUE_EXT)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => {
                warn!("failed to read '{key}' from {}: {source}", path.display());
                Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let target = self.path_for(key, VALUE_EXT)?;
        let temp = self.path_for(key, TEMP_EXT)?;

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp, &target)
        };

        write().map_err(|source| {
            warn!("failed to persist '{key}' to {}: {source}", target.display());
            let _ = fs::remove_file(&temp);
            StoreError::Io {
                key: key.to_string(),
                source,
            }
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key, VALUE_EXT)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => {
                warn!("failed to remove '{key}' at {}: {source}", path.display());
                Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }
}

fn encode_key(key: &str) -> String {
    key.bytes().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_map_to_safe_file_names() {
        assert_eq!(encode_key("roast/7"), "726f6173742f37");
        assert_eq!(encode_key("../x"), "2e2e2f78");
        assert_ne!(encode_key("ab"), encode_key("ba"));
        for key in ["offline_requests", "roast/7 detail", "ünïcødé"] {
            assert!(encode_key(key).chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_invalid_scope_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileStore::open(dir.path(), "../escape"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(FileStore::open(dir.path(), "").is_err());
        assert!(FileStore::open(dir.path(), "roast-app_1").is_ok());
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "roast").unwrap();
        assert!(matches!(store.set("", "x"), Err(StoreError::InvalidKey(_))));
    }
}
