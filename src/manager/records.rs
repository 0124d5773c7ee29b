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

//! Implements record CRUD on the [`ZoneManager`].
//!
//! Every record mutation normalizes the record (trim, id assignment),
//! bumps the zone's SOA serial, re-renders the zone file, persists, and
//! triggers a daemon reload.

use super::ZoneManager;
use crate::model::{Record, Zone};

impl ZoneManager {
    /// Returns the records of a zone.
    pub fn get_records(&self, zone_id: &str) -> Option<Vec<Record>> {
        self.get_zone(zone_id).map(|z| z.records)
    }

    /// Adds a record to a zone and returns the stored copy.
    pub fn add_record(&self, zone_id: &str, mut record: Record) -> Option<Record> {
        record.normalize();
        let stored = record.clone();
        self.mutate_records(zone_id, move |records| {
            records.push(record);
        })?;
        Some(stored)
    }

    /// Deletes a record. Returns [`None`] if the zone is absent and
    /// `Some(false)` if the record is.
    pub fn delete_record(&self, zone_id: &str, record_id: &str) -> Option<bool> {
        let mut found = false;
        let record_id = record_id.to_string();
        self.mutate_records(zone_id, |records| {
            let before = records.len();
            records.retain(|r| r.id != record_id);
            found = records.len() != before;
        })?;
        Some(found)
    }

    /// Replaces a zone's record list wholesale.
    pub fn update_records(&self, zone_id: &str, mut records: Vec<Record>) -> Option<Vec<Record>> {
        for record in &mut records {
            record.normalize();
        }
        let stored = records.clone();
        self.mutate_records(zone_id, move |existing| {
            *existing = records;
        })?;
        Some(stored)
    }

    /// The shared record-mutation path: lock, mutate, bump the serial,
    /// rewrite the zone file, persist, reload.
    pub(super) fn mutate_records<F>(&self, zone_id: &str, f: F) -> Option<Zone>
    where
        F: FnOnce(&mut Vec<Record>),
    {
        let mut state = self.lock();
        let zones = self.zones_of(&mut state);
        let zone = zones.iter_mut().find(|z| z.id == zone_id)?;
        f(&mut zone.records);
        zone.soa.bump_serial();
        let snapshot = zone.clone();
        self.write_zone_file(&snapshot);
        self.persist_zones(zones);
        drop(state);
        self.reload_after_change(&snapshot.name);
        Some(snapshot)
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
    use crate::model::{Record, RecordType, ZoneKind, ZoneRole};

    #[test]
    fn add_record_assigns_id_and_bumps_serial() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let zone = manager
            .create_zone(CreateZoneParams::new(
                "example.com",
                ZoneKind::Forward,
                ZoneRole::Master,
            ))
            .unwrap();
        let initial_serial = zone.soa.serial;

        let record = Record {
            id: String::new(),
            name: String::from("@"),
            rr_type: RecordType::A,
            value: String::from("1.2.3.4"),
            ttl: 3600,
            priority: None,
            weight: None,
            port: None,
        };
        let stored = manager.add_record(&zone.id, record).unwrap();
        assert!(!stored.id.is_empty());

        let records = manager.get_records(&zone.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "1.2.3.4");

        let zone = manager.get_zone(&zone.id).unwrap();
        assert_eq!(zone.soa.serial, initial_serial + 1);

        let text = fs::read_to_string(&zone.file_path).unwrap();
        assert!(text.contains("A\t1.2.3.4"));
    }

    #[test]
    fn serial_is_strictly_increasing_across_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let zone = manager
            .create_zone(CreateZoneParams::new(
                "example.com",
                ZoneKind::Forward,
                ZoneRole::Master,
            ))
            .unwrap();
        let mut last = zone.soa.serial;
        for i in 0..5 {
            manager.add_record(
                &zone.id,
                Record::new(format!("h{i}"), RecordType::A, "192.0.2.1"),
            );
            let serial = manager.get_zone(&zone.id).unwrap().soa.serial;
            assert!(serial > last);
            last = serial;
        }
    }

    #[test]
    fn delete_record_distinguishes_missing_zone_from_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let zone = manager
            .create_zone(CreateZoneParams::new(
                "example.com",
                ZoneKind::Forward,
                ZoneRole::Master,
            ))
            .unwrap();
        let record = manager
            .add_record(&zone.id, Record::new("www", RecordType::A, "192.0.2.1"))
            .unwrap();

        assert_eq!(manager.delete_record("no-such-zone", &record.id), None);
        assert_eq!(manager.delete_record(&zone.id, "no-such-record"), Some(false));
        assert_eq!(manager.delete_record(&zone.id, &record.id), Some(true));
        assert!(manager.get_records(&zone.id).unwrap().is_empty());
    }

    #[test]
    fn update_records_replaces_the_list() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = test_manager(dir.path());
        let zone = manager
            .create_zone(CreateZoneParams::new(
                "example.com",
                ZoneKind::Forward,
                ZoneRole::Master,
            ))
            .unwrap();
        manager.add_record(&zone.id, Record::new("old", RecordType::A, "192.0.2.1"));
        let replaced = manager
            .update_records(
                &zone.id,
                vec![Record::new("new", RecordType::A, "192.0.2.2")],
            )
            .unwrap();
        assert_eq!(replaced.len(), 1);
        let records = manager.get_records(&zone.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "new");
    }
}
