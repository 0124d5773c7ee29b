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

//! Implements CRUD for the non-zone collections: named ACLs, TSIG
//! keys, the global forwarder configuration, the global security
//! options, and zone templates.
//!
//! Each mutation holds the service lock, persists the collection,
//! rewrites the collection's configuration fragment, and reloads the
//! daemon. Templates are persistence-only: they have no fragment.

use log::error;

use super::{OpReport, ZoneManager};
use crate::model::{
    new_id, sanitize_acl_entries, Acl, ForwarderConfig, Record, SecurityConfig, TsigAlgorithm,
    TsigKey, ZoneTemplate,
};
use crate::render;
use crate::store::docs;

impl ZoneManager {
    ////////////////////////////////////////////////////////////////////
    // NAMED ACLS                                                     //
    ////////////////////////////////////////////////////////////////////

    pub fn list_acls(&self) -> Vec<Acl> {
        let _state = self.lock();
        self.store.load(docs::ACLS)
    }

    /// Creates a named ACL. Returns [`None`] if the name is taken.
    pub fn create_acl(&self, name: &str, entries: Vec<String>) -> Option<Acl> {
        let _state = self.lock();
        let mut acls: Vec<Acl> = self.store.load(docs::ACLS);
        let name = name.trim();
        if name.is_empty() || acls.iter().any(|a| a.name.eq_ignore_ascii_case(name)) {
            return None;
        }
        let acl = Acl {
            id: new_id(),
            name: name.to_string(),
            entries: sanitize_acl_entries(&entries),
        };
        acls.push(acl.clone());
        self.save_and_render_acls(&acls);
        drop(_state);
        self.reload_after_change("acls");
        Some(acl)
    }

    pub fn update_acl(&self, id: &str, entries: Vec<String>) -> Option<Acl> {
        let _state = self.lock();
        let mut acls: Vec<Acl> = self.store.load(docs::ACLS);
        let acl = acls.iter_mut().find(|a| a.id == id)?;
        acl.entries = sanitize_acl_entries(&entries);
        let updated = acl.clone();
        self.save_and_render_acls(&acls);
        drop(_state);
        self.reload_after_change("acls");
        Some(updated)
    }

    pub fn delete_acl(&self, id: &str) -> bool {
        let _state = self.lock();
        let mut acls: Vec<Acl> = self.store.load(docs::ACLS);
        let before = acls.len();
        acls.retain(|a| a.id != id);
        if acls.len() == before {
            return false;
        }
        self.save_and_render_acls(&acls);
        drop(_state);
        self.reload_after_change("acls");
        true
    }

    fn save_and_render_acls(&self, acls: &[Acl]) {
        if let Err(e) = self.store.save(docs::ACLS, &acls) {
            error!("Failed to persist ACLs: {e}");
        }
        self.write_fragment(&self.settings.acls_conf(), &render::acls_fragment(acls));
    }

    ////////////////////////////////////////////////////////////////////
    // TSIG KEYS                                                      //
    ////////////////////////////////////////////////////////////////////

    /// Lists TSIG keys with their secrets masked.
    pub fn list_tsig_keys(&self) -> Vec<TsigKey> {
        let _state = self.lock();
        let keys: Vec<TsigKey> = self.store.load(docs::TSIG_KEYS);
        keys.iter().map(TsigKey::masked).collect()
    }

    /// Creates a TSIG key. A blank secret is replaced by a freshly
    /// generated one. The returned key carries the unmasked secret,
    /// the only time it is exposed.
    pub fn create_tsig_key(
        &self,
        name: &str,
        algorithm: TsigAlgorithm,
        secret: Option<String>,
    ) -> Option<TsigKey> {
        let _state = self.lock();
        let mut keys: Vec<TsigKey> = self.store.load(docs::TSIG_KEYS);
        let name = name.trim();
        if name.is_empty() || keys.iter().any(|k| k.name.eq_ignore_ascii_case(name)) {
            return None;
        }
        let secret = match secret {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => TsigKey::generate_secret(),
        };
        let key = TsigKey {
            id: new_id(),
            name: name.to_string(),
            algorithm,
            secret,
        };
        keys.push(key.clone());
        self.save_and_render_tsig(&keys);
        drop(_state);
        self.reload_after_change("tsig-keys");
        Some(key)
    }

    pub fn delete_tsig_key(&self, id: &str) -> bool {
        let _state = self.lock();
        let mut keys: Vec<TsigKey> = self.store.load(docs::TSIG_KEYS);
        let before = keys.len();
        keys.retain(|k| k.id != id);
        if keys.len() == before {
            return false;
        }
        self.save_and_render_tsig(&keys);
        drop(_state);
        self.reload_after_change("tsig-keys");
        true
    }

    fn save_and_render_tsig(&self, keys: &[TsigKey]) {
        if let Err(e) = self.store.save(docs::TSIG_KEYS, &keys) {
            error!("Failed to persist TSIG keys: {e}");
        }
        self.write_fragment(&self.settings.keys_conf(), &render::tsig_keys_fragment(keys));
    }

    ////////////////////////////////////////////////////////////////////
    // FORWARDERS                                                     //
    ////////////////////////////////////////////////////////////////////

    pub fn forwarders(&self) -> ForwarderConfig {
        let _state = self.lock();
        self.store.load(docs::FORWARDERS)
    }

    /// Replaces the global forwarder configuration and rewrites the
    /// forwarders fragment.
    pub fn set_forwarders(&self, config: ForwarderConfig) -> OpReport {
        let state = self.lock();
        let config = ForwarderConfig {
            forwarders: sanitize_acl_entries(&config.forwarders),
            forward_only: config.forward_only,
        };
        if let Err(e) = self.store.save(docs::FORWARDERS, &config) {
            error!("Failed to persist forwarders: {e}");
            return OpReport::fail(format!("failed to persist forwarders: {e}"));
        }
        // The forwarders fragment is included from inside the options
        // block, never from the root configuration.
        self.write_raw_fragment(
            &self.settings.forwarders_conf(),
            &render::forwarders_fragment(&config),
        );
        // The options fragment includes the forwarders fragment; make
        // sure it exists even before security options are first saved.
        self.write_security_options(&self.store.load(docs::SECURITY));
        drop(state);
        self.reload_daemon()
    }

    ////////////////////////////////////////////////////////////////////
    // SECURITY OPTIONS                                               //
    ////////////////////////////////////////////////////////////////////

    pub fn security(&self) -> SecurityConfig {
        let _state = self.lock();
        self.store.load(docs::SECURITY)
    }

    /// Replaces the global security configuration and rewrites the
    /// options fragment.
    pub fn set_security(&self, config: SecurityConfig) -> OpReport {
        let state = self.lock();
        let config = SecurityConfig {
            allow_recursion: sanitize_acl_entries(&config.allow_recursion),
            allow_query: sanitize_acl_entries(&config.allow_query),
            ..config
        };
        if let Err(e) = self.store.save(docs::SECURITY, &config) {
            error!("Failed to persist security options: {e}");
            return OpReport::fail(format!("failed to persist security options: {e}"));
        }
        self.write_security_options(&config);
        drop(state);
        self.reload_daemon()
    }

    /// Rewrites the options fragment and its forwarders companion.
    /// Callers must hold the service lock.
    pub(super) fn write_security_options(&self, config: &SecurityConfig) {
        let forwarders_conf = self.settings.forwarders_conf();
        if !forwarders_conf.exists() {
            let forwarders: ForwarderConfig = self.store.load(docs::FORWARDERS);
            self.write_raw_fragment(&forwarders_conf, &render::forwarders_fragment(&forwarders));
        }
        let daemon_forwarders = self.mapper_map(&forwarders_conf);
        self.write_fragment(
            &self.settings.options_conf(),
            &render::options_fragment(config, &daemon_forwarders),
        );
    }

    /// Writes a fragment that is included from somewhere other than the
    /// root configuration.
    fn write_raw_fragment(&self, path: &std::path::Path, text: &str) {
        if let Err(e) = super::write_text(path, text) {
            error!("Failed to write {}: {e}", path.display());
        }
    }

    ////////////////////////////////////////////////////////////////////
    // TEMPLATES                                                      //
    ////////////////////////////////////////////////////////////////////

    pub fn list_templates(&self) -> Vec<ZoneTemplate> {
        let _state = self.lock();
        self.store.load(docs::TEMPLATES)
    }

    pub fn get_template(&self, id: &str) -> Option<ZoneTemplate> {
        let _state = self.lock();
        let templates: Vec<ZoneTemplate> = self.store.load(docs::TEMPLATES);
        templates.into_iter().find(|t| t.id == id)
    }

    /// Creates a template. Returns [`None`] if the name is taken.
    pub fn create_template(&self, name: &str, mut records: Vec<Record>) -> Option<ZoneTemplate> {
        let _state = self.lock();
        let mut templates: Vec<ZoneTemplate> = self.store.load(docs::TEMPLATES);
        let name = name.trim();
        if name.is_empty() || templates.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
            return None;
        }
        for record in &mut records {
            record.normalize();
        }
        let template = ZoneTemplate {
            id: new_id(),
            name: name.to_string(),
            records,
        };
        templates.push(template.clone());
        if let Err(e) = self.store.save(docs::TEMPLATES, &templates) {
            error!("Failed to persist templates: {e}");
        }
        Some(template)
    }

    pub fn delete_template(&self, id: &str) -> bool {
        let _state = self.lock();
        let mut templates: Vec<ZoneTemplate> = self.store.load(docs::TEMPLATES);
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return false;
        }
        if let Err(e) = self.store.save(docs::TEMPLATES, &templates) {
            error!("Failed to persist templates: {e}");
        }
        true
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::fs;

    use super::super::tests::test_manager;
    use super::*;

    #[test]
    fn acl_crud_renders_the_fragment_and_root_include() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let acl = manager
            .create_acl("internal", vec![String::from("192.0.2.0/24")])
            .unwrap();
        assert!(manager.create_acl("internal", Vec::new()).is_none());

        let fragment = fs::read_to_string(manager.settings().acls_conf()).unwrap();
        assert!(fragment.contains("acl \"internal\" {"));
        assert!(fragment.contains("192.0.2.0/24;"));
        let root = fs::read_to_string(manager.settings().root_conf()).unwrap();
        assert!(root.contains("named.conf.acls"));

        assert!(manager.delete_acl(&acl.id));
        let fragment = fs::read_to_string(manager.settings().acls_conf()).unwrap();
        assert!(!fragment.contains("internal"));
    }

    #[test]
    fn tsig_secrets_are_generated_and_masked() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let key = manager
            .create_tsig_key("transfer-key", TsigAlgorithm::HmacSha256, None)
            .unwrap();
        assert!(!key.secret.is_empty());
        assert_ne!(key.secret, "********");

        let listed = manager.list_tsig_keys();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].secret, "********");

        // The fragment carries the real secret for the daemon.
        let fragment = fs::read_to_string(manager.settings().keys_conf()).unwrap();
        assert!(fragment.contains(&key.secret));
    }

    #[test]
    fn set_forwarders_writes_both_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let report = manager.set_forwarders(ForwarderConfig {
            forwarders: vec![String::from("8.8.8.8"), String::from("bad entry")],
            forward_only: true,
        });
        assert!(report.success);
        let fragment = fs::read_to_string(manager.settings().forwarders_conf()).unwrap();
        assert!(fragment.contains("8.8.8.8;"));
        assert!(!fragment.contains("bad entry"));
        assert!(fragment.contains("forward only;"));
        let options = fs::read_to_string(manager.settings().options_conf()).unwrap();
        assert!(options.contains("named.conf.forwarders"));
    }

    #[test]
    fn set_security_renders_options() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let report = manager.set_security(SecurityConfig {
            recursion: true,
            allow_recursion: vec![String::from("10.0.0.0/8")],
            ..SecurityConfig::default()
        });
        assert!(report.success);
        let options = fs::read_to_string(manager.settings().options_conf()).unwrap();
        assert!(options.contains("recursion yes;"));
        assert!(options.contains("10.0.0.0/8;"));
        let root = fs::read_to_string(manager.settings().root_conf()).unwrap();
        assert!(root.contains("named.conf.options"));
    }

    #[test]
    fn template_crud_is_persistence_only() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, runner) = test_manager(dir.path());
        let template = manager
            .create_template(
                "web",
                vec![Record::new("www.example.com.", crate::model::RecordType::A, "192.0.2.1")],
            )
            .unwrap();
        assert!(manager.get_template(&template.id).is_some());
        assert!(manager.create_template("web", Vec::new()).is_none());
        // Templates touch no daemon configuration.
        assert!(runner.commands().is_empty());
        assert!(manager.delete_template(&template.id));
        assert!(manager.list_templates().is_empty());
    }
}
