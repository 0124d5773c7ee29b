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

//! Implements DNSSEC key generation, zone signing, and teardown.
//!
//! Keys are generated with `dnssec-keygen` into the configured key
//! directory and zones are signed with `dnssec-signzone`, producing a
//! `.signed` companion the declaration then points at. Failures leave
//! whatever the tools produced on disk for the operator to inspect; a
//! failed enable is rerunnable.

use std::fs;

use log::warn;

use super::{OpReport, ZoneManager};
use crate::command::LONG_TIMEOUT;
use crate::model::ZoneRole;

/// The signing algorithm for generated keys.
const KEY_ALGORITHM: &str = "ECDSAP256SHA256";

impl ZoneManager {
    /// Enables DNSSEC on a master zone: generates a KSK and a ZSK,
    /// signs the zone, and repoints the declaration at the signed file.
    pub fn enable_dnssec(&self, zone_id: &str) -> OpReport {
        let Some(zone) = self.get_zone(zone_id) else {
            return OpReport::fail("no such zone");
        };
        if zone.role != ZoneRole::Master {
            return OpReport::fail("DNSSEC can only be enabled on master zones");
        }
        let keys_dir = self
            .mapper_map(&self.settings().keys_dir)
            .display()
            .to_string();
        let ksk = self.run_tool(
            &[
                "dnssec-keygen",
                "-a",
                KEY_ALGORITHM,
                "-f",
                "KSK",
                "-K",
                &keys_dir,
                &zone.name,
            ],
            LONG_TIMEOUT,
        );
        if !ksk.success {
            return OpReport::fail(format!("KSK generation failed: {}", ksk.message));
        }
        let zsk = self.run_tool(
            &["dnssec-keygen", "-a", KEY_ALGORITHM, "-K", &keys_dir, &zone.name],
            LONG_TIMEOUT,
        );
        if !zsk.success {
            return OpReport::fail(format!("ZSK generation failed: {}", zsk.message));
        }
        let signing = self.sign_zone_inner(zone_id);
        if !signing.success {
            return signing;
        }
        // Flag the zone and re-render its declaration against the
        // signed artifact.
        let mut state = self.lock();
        let zones = self.zones_of(&mut state);
        let Some(zone) = zones.iter_mut().find(|z| z.id == zone_id) else {
            return OpReport::fail("no such zone");
        };
        zone.dnssec_enabled = true;
        let snapshot = zone.clone();
        if snapshot.enabled {
            self.write_zone_declaration(&snapshot);
        }
        self.persist_zones(zones);
        drop(state);
        self.reload_after_change(&snapshot.name);
        OpReport::ok(format!("DNSSEC enabled for {}", snapshot.name))
    }

    /// Re-signs a DNSSEC-enabled zone with its existing keys.
    pub fn sign_zone(&self, zone_id: &str) -> OpReport {
        let Some(zone) = self.get_zone(zone_id) else {
            return OpReport::fail("no such zone");
        };
        if !zone.dnssec_enabled {
            return OpReport::fail("DNSSEC is not enabled for this zone");
        }
        let report = self.sign_zone_inner(zone_id);
        if report.success {
            self.reload_after_change(&zone.name);
        }
        report
    }

    fn sign_zone_inner(&self, zone_id: &str) -> OpReport {
        let Some(zone) = self.get_zone(zone_id) else {
            return OpReport::fail("no such zone");
        };
        let keys_dir = self
            .mapper_map(&self.settings().keys_dir)
            .display()
            .to_string();
        let zone_file = self.mapper_map(&zone.file_path).display().to_string();
        let signed_file = self
            .mapper_map(&self.settings().signed_zone_file_path(&zone.name))
            .display()
            .to_string();
        let report = self.run_tool(
            &[
                "dnssec-signzone",
                "-S",
                "-K",
                &keys_dir,
                "-o",
                &zone.name,
                "-f",
                &signed_file,
                &zone_file,
            ],
            LONG_TIMEOUT,
        );
        if report.success {
            OpReport::ok(format!("signed {}", zone.name))
        } else {
            OpReport::fail(format!("signing failed: {}", report.message))
        }
    }

    /// Disables DNSSEC: removes the signed artifact and the zone's key
    /// files, clears the flag, and repoints the declaration at the
    /// unsigned file.
    pub fn disable_dnssec(&self, zone_id: &str) -> OpReport {
        let mut state = self.lock();
        let zones = self.zones_of(&mut state);
        let Some(zone) = zones.iter_mut().find(|z| z.id == zone_id) else {
            return OpReport::fail("no such zone");
        };
        zone.dnssec_enabled = false;
        let snapshot = zone.clone();
        super::remove_file_if_present(&self.settings().signed_zone_file_path(&snapshot.name));
        self.remove_key_files(&snapshot.name);
        if snapshot.enabled {
            self.write_zone_declaration(&snapshot);
        }
        self.persist_zones(zones);
        drop(state);
        self.reload_after_change(&snapshot.name);
        OpReport::ok(format!("DNSSEC disabled for {}", snapshot.name))
    }

    /// Removes the `K<zone>.*` key files dnssec-keygen produced.
    fn remove_key_files(&self, zone_name: &str) {
        let prefix = format!("K{zone_name}.");
        let entries = match fs::read_dir(&self.settings().keys_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Failed to read {}: {e}",
                    self.settings().keys_dir.display(),
                );
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                super::remove_file_if_present(&entry.path());
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::fs;

    use super::super::tests::test_manager;
    use super::super::CreateZoneParams;
    use crate::model::{ZoneKind, ZoneRole};

    #[test]
    fn enable_generates_both_keys_and_signs() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, runner) = test_manager(dir.path());
        let zone = manager
            .create_zone(CreateZoneParams::new(
                "example.com",
                ZoneKind::Forward,
                ZoneRole::Master,
            ))
            .unwrap();
        let report = manager.enable_dnssec(&zone.id);
        assert!(report.success, "{}", report.message);
        assert!(manager.get_zone(&zone.id).unwrap().dnssec_enabled);

        let commands = runner.commands();
        let keygens: Vec<_> = commands
            .iter()
            .filter(|c| c.starts_with("dnssec-keygen"))
            .collect();
        assert_eq!(keygens.len(), 2);
        assert!(keygens[0].contains("-f KSK"));
        assert!(!keygens[1].contains("-f KSK"));
        assert!(keygens.iter().all(|c| c.contains("-a ECDSAP256SHA256")));
        assert!(commands.iter().any(|c| {
            c.starts_with("dnssec-signzone") && c.contains("-o example.com")
        }));
    }

    #[test]
    fn enable_rejects_non_master_zones() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, runner) = test_manager(dir.path());
        let zone = manager
            .create_zone(CreateZoneParams::new(
                "example.com",
                ZoneKind::Forward,
                ZoneRole::Slave,
            ))
            .unwrap();
        let report = manager.enable_dnssec(&zone.id);
        assert!(!report.success);
        assert!(!runner
            .commands()
            .iter()
            .any(|c| c.starts_with("dnssec-keygen")));
    }

    #[test]
    fn sign_requires_dnssec_to_be_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let zone = manager
            .create_zone(CreateZoneParams::new(
                "example.com",
                ZoneKind::Forward,
                ZoneRole::Master,
            ))
            .unwrap();
        let report = manager.sign_zone(&zone.id);
        assert!(!report.success);
    }

    #[test]
    fn disable_clears_the_flag_and_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let zone = manager
            .create_zone(CreateZoneParams::new(
                "example.com",
                ZoneKind::Forward,
                ZoneRole::Master,
            ))
            .unwrap();
        manager.enable_dnssec(&zone.id);

        // Plant the artifacts the real tools would have produced.
        let settings = manager.settings();
        fs::create_dir_all(&settings.keys_dir).unwrap();
        let key_file = settings.keys_dir.join("Kexample.com.+013+12345.key");
        fs::write(&key_file, "key material").unwrap();
        let signed = settings.signed_zone_file_path("example.com");
        fs::write(&signed, "signed zone").unwrap();

        let report = manager.disable_dnssec(&zone.id);
        assert!(report.success);
        assert!(!manager.get_zone(&zone.id).unwrap().dnssec_enabled);
        assert!(!key_file.exists());
        assert!(!signed.exists());
    }
}
