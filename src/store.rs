// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implements the [`DocStore`], the persisted source of truth.
//!
//! Each concern (zones, ACLs, TSIG keys, forwarders, security options,
//! templates) is one JSON document in the store directory. Loads never
//! fail: a missing or corrupt document degrades to the type's default
//! value, so mutation operations simply proceed from an empty state.

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The document names, one per persisted collection.
pub mod docs {
    pub const ZONES: &str = "zones.json";
    pub const ACLS: &str = "acls.json";
    pub const TSIG_KEYS: &str = "tsig-keys.json";
    pub const FORWARDERS: &str = "forwarders.json";
    pub const SECURITY: &str = "security.json";
    pub const TEMPLATES: &str = "templates.json";
}

/// A directory of versioned JSON documents.
pub struct DocStore {
    dir: PathBuf,
}

impl DocStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Loads a document, returning the default value if it is absent or
    /// unparseable.
    pub fn load<T>(&self, doc: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let path = self.dir.join(doc);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                return T::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Failed to parse {}: {}. Using defaults.",
                    path.display(),
                    e,
                );
                T::default()
            }
        }
    }

    /// Saves a document, creating the store directory if needed. The
    /// document is written to a temporary file and renamed into place
    /// so a crash mid-write never leaves a truncated document behind.
    pub fn save<T>(&self, doc: &str, value: &T) -> io::Result<()>
    where
        T: Serialize,
    {
        fs::create_dir_all(&self.dir)?;
        let raw = serde_json::to_vec_pretty(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let path = self.dir.join(doc);
        let tmp = self.dir.join(format!("{doc}.tmp"));
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)
    }

    /// Loads a document, applies `f` to it, and saves it back if `f`
    /// reports a change. Returns whether a change was saved.
    pub fn update<T, F>(&self, doc: &str, f: F) -> bool
    where
        T: DeserializeOwned + Default + Serialize,
        F: FnOnce(&mut T) -> bool,
    {
        let mut value = self.load::<T>(doc);
        if !f(&mut value) {
            return false;
        }
        match self.save(doc, &value) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save {doc}: {e}");
                false
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_of_missing_document_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocStore::new(dir.path());
        let value: Vec<String> = store.load(docs::ZONES);
        assert!(value.is_empty());
    }

    #[test]
    fn load_of_corrupt_document_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(docs::ACLS), b"{not json!").unwrap();
        let store = DocStore::new(dir.path());
        let value: Vec<String> = store.load(docs::ACLS);
        assert!(value.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocStore::new(dir.path());
        let value = vec![String::from("a"), String::from("b")];
        store.save(docs::TEMPLATES, &value).unwrap();
        let loaded: Vec<String> = store.load(docs::TEMPLATES);
        assert_eq!(loaded, value);
    }

    #[test]
    fn update_reports_whether_anything_changed() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocStore::new(dir.path());
        let changed = store.update(docs::FORWARDERS, |value: &mut Vec<String>| {
            value.push(String::from("8.8.8.8"));
            true
        });
        assert!(changed);
        let unchanged = store.update(docs::FORWARDERS, |_: &mut Vec<String>| false);
        assert!(!unchanged);
        let loaded: Vec<String> = store.load(docs::FORWARDERS);
        assert_eq!(loaded, vec!["8.8.8.8"]);
    }
}
