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

//! Implements reverse-zone generation and zone templates.
//!
//! Reverse generation walks a forward zone's address records, derives
//! the in-addr.arpa/ip6.arpa zone each address belongs to, creates the
//! reverse zone on first need, and adds the PTR record. The whole
//! operation is idempotent: a rerun adds nothing.
//!
//! Template application remaps a template's records from the domain
//! they were authored against onto the target zone's name.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::{CreateZoneParams, ZoneManager};
use crate::model::{Record, RecordType, SoaRecord, Zone, ZoneKind, ZoneRole};
use crate::util::nibble_to_ascii_hex_digit;

/// The sentinel zone unparseable addresses map into. Nothing is ever
/// created under it; it exists so derivation is total.
pub const INVALID_REVERSE_ZONE: &str = "invalid.in-addr.arpa";

/// The reverse zone and PTR owner name an address maps to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReverseTarget {
    pub zone: String,
    pub ptr_name: String,
}

/// Derives the reverse zone and PTR owner for an address.
///
/// IPv4 addresses map to a /24-granularity in-addr.arpa zone with the
/// final octet as the PTR owner. IPv6 addresses map to a nibble-format
/// ip6.arpa zone with the last four nibbles as the PTR owner. Anything
/// unparseable maps into [`INVALID_REVERSE_ZONE`] with owner `"0"`.
pub fn derive_reverse(address: &str) -> ReverseTarget {
    if let Ok(v4) = address.parse::<Ipv4Addr>() {
        let [a, b, c, d] = v4.octets();
        return ReverseTarget {
            zone: format!("{c}.{b}.{a}.in-addr.arpa"),
            ptr_name: d.to_string(),
        };
    }
    if let Ok(v6) = address.parse::<Ipv6Addr>() {
        // Thirty-two nibbles, least significant first.
        let mut nibbles = Vec::with_capacity(32);
        for octet in v6.octets().iter().rev() {
            nibbles.push(nibble_to_ascii_hex_digit(octet & 0xf) as char);
            nibbles.push(nibble_to_ascii_hex_digit(octet >> 4) as char);
        }
        let dotted = |range: &[char]| {
            range
                .iter()
                .map(char::to_string)
                .collect::<Vec<_>>()
                .join(".")
        };
        return ReverseTarget {
            zone: format!("{}.ip6.arpa", dotted(&nibbles[4..])),
            ptr_name: dotted(&nibbles[..4]),
        };
    }
    ReverseTarget {
        zone: String::from(INVALID_REVERSE_ZONE),
        ptr_name: String::from("0"),
    }
}

/// The outcome of one reverse-generation run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReverseReport {
    pub created_zones: Vec<String>,
    pub added_records: usize,
    pub errors: Vec<String>,
}

////////////////////////////////////////////////////////////////////////
// TEMPLATES                                                          //
////////////////////////////////////////////////////////////////////////

/// Guesses the domain a set of template records was authored against:
/// the most frequent final-two-label suffix among the record names,
/// falling back to `example.com` when nothing qualifies.
pub fn detect_template_domain(records: &[Record]) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        let name = record.name.trim_end_matches('.');
        let labels: Vec<&str> = name.split('.').filter(|l| !l.is_empty()).collect();
        if labels.len() < 2 {
            continue;
        }
        let candidate = format!("{}.{}", labels[labels.len() - 2], labels[labels.len() - 1]);
        *counts.entry(candidate).or_default() += 1;
    }
    counts
        .into_iter()
        // Ties break toward the lexicographically smaller candidate so
        // detection is deterministic.
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(candidate, _)| candidate)
        .unwrap_or_else(|| String::from("example.com"))
}

/// Rewrites a name from a template's domain onto a target domain.
///
/// `@` and names outside the template domain pass through unchanged; a
/// trailing dot on the input is preserved on the output.
pub fn remap_domain(name: &str, template_domain: &str, target_domain: &str) -> String {
    if name == "@" {
        return name.to_string();
    }
    let absolute = name.ends_with('.');
    let bare = name.trim_end_matches('.');
    let template_domain = template_domain.trim_end_matches('.');
    let target_domain = target_domain.trim_end_matches('.');
    let remapped = if bare.eq_ignore_ascii_case(template_domain) {
        target_domain.to_string()
    } else if bare.len() > template_domain.len()
        && bare[bare.len() - template_domain.len()..].eq_ignore_ascii_case(template_domain)
        && bare.as_bytes()[bare.len() - template_domain.len() - 1] == b'.'
    {
        format!(
            "{}{}",
            &bare[..bare.len() - template_domain.len()],
            target_domain,
        )
    } else {
        return name.to_string();
    };
    if absolute {
        format!("{remapped}.")
    } else {
        remapped
    }
}

/// Whether a record type's value is a domain name that template
/// application should remap along with the owner name.
fn value_is_name(rr_type: RecordType) -> bool {
    matches!(
        rr_type,
        RecordType::Cname | RecordType::Mx | RecordType::Ns | RecordType::Srv | RecordType::Ptr,
    )
}

impl ZoneManager {
    /// Appends a template's records to a zone, remapped from the
    /// template's domain onto the zone's name. Records get fresh ids;
    /// the zone's serial is bumped once.
    pub fn apply_template(&self, zone_id: &str, template_id: &str) -> Option<Zone> {
        let template = self.get_template(template_id)?;
        let zone = self.get_zone(zone_id)?;
        let template_domain = detect_template_domain(&template.records);
        let mut incoming = Vec::with_capacity(template.records.len());
        for record in &template.records {
            let mut record = record.clone();
            record.id = String::new();
            record.name = remap_domain(&record.name, &template_domain, &zone.name);
            if value_is_name(record.rr_type) {
                record.value = remap_domain(&record.value, &template_domain, &zone.name);
            }
            incoming.push(record);
        }
        self.mutate_records(zone_id, move |records| {
            records.extend(incoming);
        })
    }

    /// Generates PTR records (and the reverse zones to hold them) for
    /// every address record in a forward zone. Reruns add nothing.
    pub fn generate_reverse_zones(&self, zone_id: &str) -> Option<ReverseReport> {
        let forward = self.get_zone(zone_id)?;
        let mut report = ReverseReport::default();
        for record in &forward.records {
            if !matches!(record.rr_type, RecordType::A | RecordType::Aaaa) {
                continue;
            }
            let target = derive_reverse(&record.value);
            if target.zone == INVALID_REVERSE_ZONE {
                report
                    .errors
                    .push(format!("{}: {:?} is not an address", record.name, record.value));
                continue;
            }
            let reverse = match self.find_zone_by_name(&target.zone) {
                Some(zone) => zone,
                None => {
                    let mut params =
                        CreateZoneParams::new(&target.zone, ZoneKind::Reverse, ZoneRole::Master);
                    params.soa = Some(SoaRecord::new(
                        forward.soa.primary_ns.clone(),
                        forward.soa.admin_email.clone(),
                    ));
                    let zone = self.create_zone(params)?;
                    report.created_zones.push(target.zone.clone());
                    zone
                }
            };
            let ptr_value = absolute_host_name(&record.name, &forward.name);
            let exists = reverse.records.iter().any(|r| {
                r.rr_type == RecordType::Ptr && r.name == target.ptr_name && r.value == ptr_value
            });
            if !exists {
                self.add_record(
                    &reverse.id,
                    Record::new(target.ptr_name, RecordType::Ptr, ptr_value),
                );
                report.added_records += 1;
            }
        }
        Some(report)
    }
}

/// Resolves a record owner name to an absolute name within its zone.
fn absolute_host_name(name: &str, zone_name: &str) -> String {
    if name == "@" {
        format!("{zone_name}.")
    } else if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.{zone_name}.")
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
