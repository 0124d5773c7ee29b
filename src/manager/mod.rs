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

//! Implements the [`ZoneManager`] service, the entry point for every
//! administrative operation.
//!
//! A single process-wide mutex guards every mutating operation across
//! zones, ACLs, TSIG keys, forwarders, security options, and templates.
//! The discipline is coarse but simple to reason about: a mutation
//! acquires the lock, reads the cached zone list (loading it from the
//! store on first use), applies the change, rewrites the affected zone
//! file and configuration fragments, persists, asks the daemon to
//! reload, and releases the lock.
//!
//! No public operation raises: absent entities yield `None` or `false`,
//! and external-tool failures come back as an [`OpReport`] carrying the
//! tool's own diagnostics.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info, warn};

use crate::command::{
    CommandRunner, ContainerPathMapper, ExecMode, HostPathMapper, PathMapper, ShellRunner,
    SHORT_TIMEOUT,
};
use crate::model::{Record, RecordType, SecurityConfig, SoaRecord, Zone, ZoneAcls, ZoneKind, ZoneRole};
use crate::render;
use crate::settings::Settings;
use crate::store::{docs, DocStore};

mod collections;
mod dnssec;
mod import;
mod install;
mod query;
mod records;
mod reverse;

pub use import::{parse_zone_file, ImportFormat, ImportReport, ParsedZoneFile};
pub use query::{parse_rndc_status, DigQuery, DnsQuery, PropagationReport, ResolverResult, ServerStatus};
pub use reverse::{
    derive_reverse, detect_template_domain, remap_domain, ReverseReport, ReverseTarget,
    INVALID_REVERSE_ZONE,
};

/// The outcome of an operation that talks to external tooling.
#[derive(Clone, Debug)]
pub struct OpReport {
    pub success: bool,
    pub message: String,
}

impl OpReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for OpReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.success {
            write!(f, "ok: {}", self.message)
        } else {
            write!(f, "failed: {}", self.message)
        }
    }
}

/// Parameters for [`ZoneManager::create_zone`].
#[derive(Clone, Debug)]
pub struct CreateZoneParams {
    pub name: String,
    pub kind: ZoneKind,
    pub role: ZoneRole,
    pub soa: Option<SoaRecord>,
    pub acls: ZoneAcls,
}

impl CreateZoneParams {
    pub fn new(name: impl Into<String>, kind: ZoneKind, role: ZoneRole) -> Self {
        Self {
            name: name.into(),
            kind,
            role,
            soa: None,
            acls: ZoneAcls::default(),
        }
    }
}

/// A partial update for [`ZoneManager::update_zone`]. Absent fields are
/// left untouched.
#[derive(Clone, Debug, Default)]
pub struct ZoneUpdate {
    pub kind: Option<ZoneKind>,
    pub role: Option<ZoneRole>,
    pub soa: Option<SoaRecord>,
    pub acls: Option<ZoneAclsUpdate>,
}

/// A partial update for the per-zone ACL lists.
#[derive(Clone, Debug, Default)]
pub struct ZoneAclsUpdate {
    pub allow_transfer: Option<Vec<String>>,
    pub allow_update: Option<Vec<String>>,
    pub allow_query: Option<Vec<String>>,
    pub also_notify: Option<Vec<String>>,
    pub forwarders: Option<Vec<String>>,
    pub masters: Option<Vec<String>>,
}

impl ZoneAclsUpdate {
    /// Applies the update to `acls`, sanitizing every supplied list.
    fn apply(self, acls: &mut ZoneAcls) {
        let mut merged = acls.clone();
        if let Some(list) = self.allow_transfer {
            merged.allow_transfer = list;
        }
        if let Some(list) = self.allow_update {
            merged.allow_update = list;
        }
        if let Some(list) = self.allow_query {
            merged.allow_query = list;
        }
        if let Some(list) = self.also_notify {
            merged.also_notify = list;
        }
        if let Some(list) = self.forwarders {
            merged.forwarders = list;
        }
        if let Some(list) = self.masters {
            merged.masters = list;
        }
        *acls = merged.sanitized();
    }
}

#[derive(Default)]
struct State {
    zones: Option<Vec<Zone>>,
}

/// The administrative service. Construct one at startup and hand
/// references to callers; there is no hidden global.
pub struct ZoneManager {
    settings: Settings,
    store: DocStore,
    runner: Arc<dyn CommandRunner>,
    host_runner: Arc<dyn CommandRunner>,
    mapper: Box<dyn PathMapper>,
    query: Box<dyn DnsQuery>,
    state: Mutex<State>,
}

impl ZoneManager {
    /// Creates a manager for the given settings, detecting the
    /// deployment mode from the marker file.
    pub fn new(settings: Settings) -> Self {
        let mode = ExecMode::detect(&settings);
        let mapper: Box<dyn PathMapper> = if mode.is_container() {
            info!(
                "Container mode: commands run via `{} exec {}`.",
                settings.container_runtime, settings.container_name,
            );
            Box::new(ContainerPathMapper::new(&settings))
        } else {
            Box::new(HostPathMapper)
        };
        let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new(mode));
        let host_runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner::new(ExecMode::Host));
        let query = Box::new(DigQuery::new(runner.clone()));
        Self::assemble(settings, runner, host_runner, mapper, query)
    }

    /// Creates a manager with explicit collaborators. Used by tests to
    /// substitute a recording command runner.
    pub fn with_parts(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        mapper: Box<dyn PathMapper>,
    ) -> Self {
        let query = Box::new(DigQuery::new(runner.clone()));
        let host_runner = runner.clone();
        Self::assemble(settings, runner, host_runner, mapper, query)
    }

    fn assemble(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        host_runner: Arc<dyn CommandRunner>,
        mapper: Box<dyn PathMapper>,
        query: Box<dyn DnsQuery>,
    ) -> Self {
        let store = DocStore::new(&settings.data_dir);
        Self {
            settings,
            store,
            runner,
            host_runner,
            mapper,
            query,
            state: Mutex::new(State::default()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    ////////////////////////////////////////////////////////////////////
    // STATE ACCESS                                                   //
    ////////////////////////////////////////////////////////////////////

    /// Acquires the service lock. A poisoned lock is recovered, since
    /// every critical section leaves the cache consistent with the
    /// store before any code that could panic.
    fn lock(&self) -> MutexGuard<State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fills the zone cache from the store on first use and returns a
    /// mutable reference to it.
    fn zones_of<'a>(&self, state: &'a mut State) -> &'a mut Vec<Zone> {
        if state.zones.is_none() {
            state.zones = Some(self.store.load(docs::ZONES));
        }
        state.zones.as_mut().expect("cache was just filled")
    }

    /// Persists the zone list. I/O failures are logged; the in-memory
    /// cache remains the operative copy.
    fn persist_zones(&self, zones: &[Zone]) {
        if let Err(e) = self.store.save(docs::ZONES, &zones) {
            error!("Failed to persist the zone list: {e}");
        }
    }

    ////////////////////////////////////////////////////////////////////
    // ZONE CRUD                                                      //
    ////////////////////////////////////////////////////////////////////

    /// Returns all zones.
    pub fn list_zones(&self) -> Vec<Zone> {
        let mut state = self.lock();
        self.zones_of(&mut state).clone()
    }

    /// Returns the zone with the given id.
    pub fn get_zone(&self, id: &str) -> Option<Zone> {
        let mut state = self.lock();
        self.zones_of(&mut state)
            .iter()
            .find(|z| z.id == id)
            .cloned()
    }

    /// Returns the zone with the given name.
    pub fn find_zone_by_name(&self, name: &str) -> Option<Zone> {
        let mut state = self.lock();
        self.zones_of(&mut state)
            .iter()
            .find(|z| z.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Creates a zone. Returns [`None`] if a zone of the same name
    /// already exists.
    pub fn create_zone(&self, params: CreateZoneParams) -> Option<Zone> {
        let mut state = self.lock();
        let security: SecurityConfig = self.store.load(docs::SECURITY);
        let zones = self.zones_of(&mut state);
        let zone = build_zone(&self.settings, &security, params, zones)?;
        zones.push(zone.clone());
        self.write_zone_artifacts(&zone);
        self.persist_zones(zones);
        drop(state);
        self.reload_after_change(&zone.name);
        Some(zone)
    }

    /// Deletes a zone: its file, its declaration block, and its store
    /// entry. Returns whether the zone existed.
    pub fn delete_zone(&self, id: &str) -> bool {
        let mut state = self.lock();
        let zones = self.zones_of(&mut state);
        let Some(index) = zones.iter().position(|z| z.id == id) else {
            return false;
        };
        let zone = zones.remove(index);
        self.remove_zone_declaration(&zone.name);
        remove_file_if_present(&zone.file_path);
        remove_file_if_present(&self.settings.signed_zone_file_path(&zone.name));
        self.persist_zones(zones);
        drop(state);
        self.reload_after_change(&zone.name);
        true
    }

    /// Enables or disables a zone. Disabling removes the zone's
    /// declaration block; enabling re-adds it. The zone and its file
    /// are retained either way. Returns the new enabled state.
    pub fn toggle_zone(&self, id: &str) -> Option<bool> {
        let mut state = self.lock();
        let zones = self.zones_of(&mut state);
        let zone = zones.iter_mut().find(|z| z.id == id)?;
        zone.enabled = !zone.enabled;
        let snapshot = zone.clone();
        if snapshot.enabled {
            self.write_zone_declaration(&snapshot);
        } else {
            self.remove_zone_declaration(&snapshot.name);
        }
        self.persist_zones(zones);
        drop(state);
        self.reload_after_change(&snapshot.name);
        Some(snapshot.enabled)
    }

    /// Applies a partial update to a zone's role, kind, SOA, or ACLs.
    /// An SOA change re-renders the zone file and bumps the serial; the
    /// declaration block is re-rendered in every case.
    pub fn update_zone(&self, id: &str, update: ZoneUpdate) -> Option<Zone> {
        let mut state = self.lock();
        let zones = self.zones_of(&mut state);
        let zone = zones.iter_mut().find(|z| z.id == id)?;
        if let Some(kind) = update.kind {
            zone.kind = kind;
        }
        if let Some(role) = update.role {
            zone.role = role;
        }
        let soa_changed = match update.soa {
            Some(soa) if soa != zone.soa => {
                zone.soa = soa;
                zone.soa.bump_serial();
                true
            }
            _ => false,
        };
        if let Some(acls) = update.acls {
            acls.apply(&mut zone.acls);
        }
        let snapshot = zone.clone();
        if soa_changed {
            self.write_zone_file(&snapshot);
        }
        if snapshot.enabled {
            self.write_zone_declaration(&snapshot);
        }
        self.persist_zones(zones);
        drop(state);
        self.reload_after_change(&snapshot.name);
        Some(snapshot)
    }

    /// Applies a partial update to the per-zone ACL lists only.
    pub fn update_zone_options(&self, id: &str, update: ZoneAclsUpdate) -> Option<Zone> {
        self.update_zone(
            id,
            ZoneUpdate {
                acls: Some(update),
                ..ZoneUpdate::default()
            },
        )
    }

    ////////////////////////////////////////////////////////////////////
    // GENERATED ARTIFACTS                                            //
    ////////////////////////////////////////////////////////////////////

    /// Writes a zone's file (master role only) and, when enabled, its
    /// declaration block.
    fn write_zone_artifacts(&self, zone: &Zone) {
        if zone.role == ZoneRole::Master {
            self.write_zone_file(zone);
        }
        if zone.enabled {
            self.write_zone_declaration(zone);
        }
    }

    /// Renders and writes the zone file.
    fn write_zone_file(&self, zone: &Zone) {
        let text = render::render_zone_file(zone);
        if let Err(e) = write_text(&zone.file_path, &text) {
            error!("Failed to write {}: {e}", zone.file_path.display());
        }
    }

    /// Renders the zone's declaration and replaces its managed block in
    /// the shared declaration file, making sure the root configuration
    /// includes that file.
    fn write_zone_declaration(&self, zone: &Zone) {
        let signed_path = self.settings.signed_zone_file_path(&zone.name);
        let signed = zone.dnssec_enabled && signed_path.exists();
        let daemon_file = if signed {
            self.mapper.map(&signed_path)
        } else {
            self.mapper.map(&zone.file_path)
        };
        let declaration = render::zone_declaration(zone, &daemon_file, signed);
        let local_conf = self.settings.local_conf();
        let text = read_text_or_empty(&local_conf);
        let text = render::upsert_zone_block(&text, &zone.name, &declaration);
        if let Err(e) = write_text(&local_conf, &text) {
            error!("Failed to write {}: {e}", local_conf.display());
        }
        self.ensure_included(&local_conf);
    }

    /// Drops the zone's managed block from the shared declaration file.
    fn remove_zone_declaration(&self, zone_name: &str) {
        let local_conf = self.settings.local_conf();
        let text = read_text_or_empty(&local_conf);
        let text = render::remove_zone_block(&text, zone_name);
        if let Err(e) = write_text(&local_conf, &text) {
            error!("Failed to write {}: {e}", local_conf.display());
        }
    }

    /// Writes a configuration fragment and ensures the root
    /// configuration includes it.
    fn write_fragment(&self, path: &Path, text: &str) {
        if let Err(e) = write_text(path, text) {
            error!("Failed to write {}: {e}", path.display());
        }
        self.ensure_included(path);
    }

    /// Translates a host path into the daemon's view of it.
    fn mapper_map(&self, path: &Path) -> std::path::PathBuf {
        self.mapper.map(path)
    }

    /// Ensures the root configuration file includes `fragment`. The
    /// include line carries the daemon's view of the path.
    fn ensure_included(&self, fragment: &Path) {
        let root = self.settings.root_conf();
        let daemon_fragment = self.mapper.map(fragment);
        let text = read_text_or_empty(&root);
        let (text, changed) = render::ensure_include(&text, &daemon_fragment);
        if changed {
            if let Err(e) = write_text(&root, &text) {
                error!("Failed to write {}: {e}", root.display());
            }
        }
    }

    ////////////////////////////////////////////////////////////////////
    // DAEMON CONTROL                                                 //
    ////////////////////////////////////////////////////////////////////

    /// Validates the generated configuration and reloads the daemon.
    pub fn reload_daemon(&self) -> OpReport {
        let check = self.run_tool(&["named-checkconf"], SHORT_TIMEOUT);
        if !check.success {
            return OpReport::fail(format!("configuration check failed: {}", check.message));
        }
        self.run_tool(&["rndc", "reload"], SHORT_TIMEOUT)
    }

    /// Reloads after a mutation. A failed reload never rolls the
    /// mutation back; the failure is logged for the operator.
    fn reload_after_change(&self, zone_name: &str) {
        let report = self.reload_daemon();
        if !report.success {
            warn!("Reload after changing {zone_name} failed: {}", report.message);
        }
    }

    /// Runs a daemon tool and folds the outcome into an [`OpReport`].
    fn run_tool(&self, argv: &[&str], timeout: std::time::Duration) -> OpReport {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        match self.runner.run(&argv, timeout) {
            Ok(output) if output.success() => OpReport::ok(output.stdout.trim().to_string()),
            Ok(output) => OpReport::fail(output.diagnostic().to_string()),
            Err(e) => OpReport::fail(e.to_string()),
        }
    }
}

/// Builds a new zone value, or [`None`] on an invalid or duplicate
/// name.
fn build_zone(
    settings: &Settings,
    security: &SecurityConfig,
    params: CreateZoneParams,
    existing: &[Zone],
) -> Option<Zone> {
    let name = params.name.trim().trim_end_matches('.').to_string();
    if !valid_zone_name(&name) {
        return None;
    }
    if existing.iter().any(|z| z.name.eq_ignore_ascii_case(&name)) {
        return None;
    }
    let mut zone = Zone {
        id: crate::model::new_id(),
        file_path: settings.zone_file_path(&name),
        name,
        kind: params.kind,
        role: params.role,
        soa: params.soa.unwrap_or_default(),
        records: Vec::new(),
        acls: params.acls.sanitized(),
        enabled: true,
        dnssec_enabled: false,
    };
    // A new forward master zone starts from the globally configured
    // nameservers.
    if zone.kind == ZoneKind::Forward && zone.role == ZoneRole::Master {
        for ns in &security.default_name_servers {
            zone.records
                .push(Record::new("@", RecordType::Ns, render::ns_value(ns)));
        }
    }
    Some(zone)
}

/// Whether a name is safe to use as a zone name. The name is embedded
/// in the derived `db.<name>` file path and in the declaration markers,
/// so anything outside hostname characters (alphanumerics, `.`, `-`,
/// `_`) is rejected.
fn valid_zone_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".-_".contains(c))
}

fn read_text_or_empty(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

fn write_text(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}

fn remove_file_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {e}", path.display()),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
