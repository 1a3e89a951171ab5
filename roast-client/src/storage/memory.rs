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

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::LocalStore;
use crate::error::StoreError;

/// In-process store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave a HashMap half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStoreExt;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("roast:7", "{\"name\":\"Kenya AA\"}").unwrap();
        assert_eq!(
            store.get("roast:7").unwrap().as_deref(),
            Some("{\"name\":\"Kenya AA\"}")
        );
        assert_eq!(store.len(), 1);

        store.remove("roast:7").unwrap();
        assert_eq!(store.get("roast:7").unwrap(), None);
        store.remove("roast:7").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        let value = json!({ "batches": [1, 2, 3], "origin": "Ethiopia" });
        store.set_json("profile", &value).unwrap();
        assert_eq!(
            store.get_json::<serde_json::Value>("profile").unwrap(),
            Some(value)
        );

        store.set("broken", "{not json").unwrap();
        assert!(matches!(
            store.get_json::<serde_json::Value>("broken"),
            Err(StoreError::Serde { .. })
        ));
    }
}
