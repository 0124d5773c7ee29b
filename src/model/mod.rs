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

//! The persisted entities zonesmith manages: zones, records, SOA data,
//! and per-zone access-control lists.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

mod collections;
mod record_type;

pub use collections::{
    Acl, ForwarderConfig, RateLimit, SecurityConfig, TsigAlgorithm, TsigKey, ZoneTemplate,
};
pub use record_type::RecordType;

use crate::serial;

/// Generates an opaque entity id: sixteen lower-case hex characters.
pub fn new_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

////////////////////////////////////////////////////////////////////////
// ZONES                                                              //
////////////////////////////////////////////////////////////////////////

/// Whether a zone maps names to addresses or addresses back to names.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Forward,
    Reverse,
}

/// The role the managed daemon plays for a zone.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneRole {
    Master,
    Slave,
    Stub,
    Forward,
}

impl fmt::Display for ZoneRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Master => f.write_str("master"),
            Self::Slave => f.write_str("slave"),
            Self::Stub => f.write_str("stub"),
            Self::Forward => f.write_str("forward"),
        }
    }
}

impl FromStr for ZoneRole {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "slave" => Ok(Self::Slave),
            "stub" => Ok(Self::Stub),
            "forward" => Ok(Self::Forward),
            _ => Err("unknown zone role"),
        }
    }
}

/// The SOA record of a zone. The serial is date-coded; see
/// [`crate::serial`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SoaRecord {
    pub primary_ns: String,
    pub admin_email: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum_ttl: u32,
}

impl SoaRecord {
    /// Creates an SOA record with conventional timer defaults and a
    /// freshly minted serial.
    pub fn new(primary_ns: impl Into<String>, admin_email: impl Into<String>) -> Self {
        Self {
            primary_ns: primary_ns.into(),
            admin_email: admin_email.into(),
            serial: serial::initial(),
            refresh: 3600,
            retry: 600,
            expire: 604_800,
            minimum_ttl: 3600,
        }
    }

    /// Replaces the serial with its successor for the current date.
    pub fn bump_serial(&mut self) {
        self.serial = serial::next(self.serial);
    }
}

impl Default for SoaRecord {
    fn default() -> Self {
        Self::new("ns1.example.com.", "hostmaster.example.com.")
    }
}

/// A single resource record inside a zone.
///
/// `priority`, `weight`, and `port` are only meaningful for MX
/// (priority) and SRV (all three) records; the renderer ignores them
/// everywhere else.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Record {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub rr_type: RecordType,
    pub value: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn default_ttl() -> u32 {
    3600
}

impl Record {
    pub fn new(name: impl Into<String>, rr_type: RecordType, value: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            rr_type,
            value: value.into(),
            ttl: default_ttl(),
            priority: None,
            weight: None,
            port: None,
        }
    }

    /// Trims the name and value and assigns an id if blank. Every
    /// record passes through here before it enters a zone.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.value = self.value.trim().to_string();
        if self.id.is_empty() {
            self.id = new_id();
        }
    }
}

/// The per-zone access-control lists and transfer sources.
///
/// Entries are either addresses/networks or the names of globally
/// defined ACLs. All lists pass through [`sanitize_acl_entries`] before
/// they are stored.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ZoneAcls {
    #[serde(default)]
    pub allow_transfer: Vec<String>,
    #[serde(default)]
    pub allow_update: Vec<String>,
    #[serde(default)]
    pub allow_query: Vec<String>,
    #[serde(default)]
    pub also_notify: Vec<String>,
    #[serde(default)]
    pub forwarders: Vec<String>,
    #[serde(default)]
    pub masters: Vec<String>,
}

impl ZoneAcls {
    /// Returns a copy with every list sanitized.
    pub fn sanitized(&self) -> Self {
        Self {
            allow_transfer: sanitize_acl_entries(&self.allow_transfer),
            allow_update: sanitize_acl_entries(&self.allow_update),
            allow_query: sanitize_acl_entries(&self.allow_query),
            also_notify: sanitize_acl_entries(&self.also_notify),
            forwarders: sanitize_acl_entries(&self.forwarders),
            masters: sanitize_acl_entries(&self.masters),
        }
    }
}

/// Drops blank entries and entries containing characters outside the
/// set BIND accepts in address-match lists (alphanumerics plus
/// `. : / _ - !`). The filter is idempotent.
pub fn sanitize_acl_entries(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| {
            !entry.is_empty()
                && entry
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || ".:/_-!".contains(c))
        })
        .map(str::to_string)
        .collect()
}

/// A DNS zone, the unit of administration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub kind: ZoneKind,
    pub role: ZoneRole,
    pub soa: SoaRecord,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub acls: ZoneAcls,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub dnssec_enabled: bool,
    pub file_path: PathBuf,
}

fn default_enabled() -> bool {
    true
}

impl Zone {
    /// Whether the zone has an explicit NS record at its apex. When it
    /// does not, the renderer synthesizes one from the SOA's primary
    /// nameserver.
    pub fn has_ns_record(&self) -> bool {
        self.records.iter().any(|r| r.rr_type == RecordType::Ns)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_malformed_entries() {
        let entries = vec![
            String::from(" 192.168.0.0/24 "),
            String::from("fd00::/8"),
            String::from("trusted_hosts"),
            String::from("!10.0.0.1"),
            String::from("bad entry; rm -rf /"),
            String::from("   "),
        ];
        let sanitized = sanitize_acl_entries(&entries);
        assert_eq!(
            sanitized,
            vec!["192.168.0.0/24", "fd00::/8", "trusted_hosts", "!10.0.0.1"],
        );
    }

    #[test]
    fn sanitize_is_idempotent() {
        let entries = vec![
            String::from(" 192.0.2.0/24"),
            String::from("key name with spaces"),
            String::from("2001:db8::1"),
        ];
        let once = sanitize_acl_entries(&entries);
        let twice = sanitize_acl_entries(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_assigns_id_and_trims() {
        let mut record = Record {
            id: String::new(),
            name: String::from("  www "),
            rr_type: RecordType::A,
            value: String::from(" 192.0.2.1 "),
            ttl: 300,
            priority: None,
            weight: None,
            port: None,
        };
        record.normalize();
        assert!(!record.id.is_empty());
        assert_eq!(record.name, "www");
        assert_eq!(record.value, "192.0.2.1");
    }

    #[test]
    fn zone_role_parsing_is_case_insensitive() {
        assert_eq!("Master".parse::<ZoneRole>().unwrap(), ZoneRole::Master);
        assert_eq!("SLAVE".parse::<ZoneRole>().unwrap(), ZoneRole::Slave);
        assert_eq!("stub".parse::<ZoneRole>().unwrap(), ZoneRole::Stub);
        assert!("secondary".parse::<ZoneRole>().is_err());
    }

    #[test]
    fn ids_are_unique_enough() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
