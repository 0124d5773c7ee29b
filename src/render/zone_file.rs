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

//! Implements zone-file rendering.

use std::fmt::Write;

use super::fqdn;
use crate::model::{Record, RecordType, Zone};

/// Renders the complete zone-file text for a zone.
///
/// The output is deterministic for a given (SOA, records) pair:
/// rendering twice produces byte-identical text. SOA-type records in
/// the record list are suppressed, since the SOA lives in the header.
/// If the zone has no explicit NS record, one is synthesized from the
/// SOA's primary nameserver so the file always loads.
pub fn render_zone_file(zone: &Zone) -> String {
    let mut out = String::new();
    let soa = &zone.soa;
    let primary_ns = fqdn(&soa.primary_ns);
    let mailbox = admin_mailbox(&soa.admin_email);

    writeln!(out, "; Zone file for {}", zone.name).unwrap();
    writeln!(out, "; Generated by zonesmith. Do not edit by hand.").unwrap();
    writeln!(out, "$TTL {}", soa.minimum_ttl).unwrap();
    writeln!(out, "@\tIN\tSOA\t{primary_ns} {mailbox} (").unwrap();
    writeln!(out, "\t\t{} ; serial", soa.serial).unwrap();
    writeln!(out, "\t\t{} ; refresh", soa.refresh).unwrap();
    writeln!(out, "\t\t{} ; retry", soa.retry).unwrap();
    writeln!(out, "\t\t{} ; expire", soa.expire).unwrap();
    writeln!(out, "\t\t{} ) ; minimum", soa.minimum_ttl).unwrap();

    if !zone.has_ns_record() {
        writeln!(out, "@\tIN\tNS\t{primary_ns}").unwrap();
    }

    for record in &zone.records {
        if let Some(line) = record_line(record) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Converts an SOA admin mailbox to zone-file form: `@` becomes `.`
/// and the result is fully qualified.
fn admin_mailbox(email: &str) -> String {
    fqdn(&email.replace('@', "."))
}

/// Renders one record as a zone-file line, or [`None`] for SOA records.
fn record_line(record: &Record) -> Option<String> {
    let name = if record.name.is_empty() {
        "@"
    } else {
        &record.name
    };
    let prefix = format!("{name}\t{}\tIN", record.ttl);
    match record.rr_type {
        RecordType::Soa => None,
        RecordType::Mx => {
            let priority = record.priority.unwrap_or(10);
            Some(format!("{prefix}\tMX\t{priority} {}", record.value))
        }
        RecordType::Srv => {
            let priority = record.priority.unwrap_or(0);
            let weight = record.weight.unwrap_or(0);
            let port = record.port.unwrap_or(0);
            Some(format!(
                "{prefix}\tSRV\t{priority} {weight} {port} {}",
                record.value,
            ))
        }
        RecordType::Txt => Some(format!("{prefix}\tTXT\t{}", quoted(&record.value))),
        RecordType::A
        | RecordType::Aaaa
        | RecordType::Cname
        | RecordType::Ns
        | RecordType::Ptr
        | RecordType::Caa
        | RecordType::Tlsa
        | RecordType::Sshfp
        | RecordType::Https
        | RecordType::Naptr => Some(format!("{prefix}\t{}\t{}", record.rr_type, record.value)),
    }
}

/// Quotes a TXT value unless the caller already quoted it.
fn quoted(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        value.to_string()
    } else {
        format!("\"{value}\"")
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SoaRecord, ZoneAcls, ZoneKind, ZoneRole};

    fn test_zone(records: Vec<Record>) -> Zone {
        Zone {
            id: String::from("z1"),
            name: String::from("example.com"),
            kind: ZoneKind::Forward,
            role: ZoneRole::Master,
            soa: SoaRecord {
                primary_ns: String::from("ns1.example.com"),
                admin_email: String::from("hostmaster@example.com"),
                serial: 2026083001,
                refresh: 3600,
                retry: 600,
                expire: 604_800,
                minimum_ttl: 3600,
            },
            records,
            acls: ZoneAcls::default(),
            enabled: true,
            dnssec_enabled: false,
            file_path: "/var/lib/bind/db.example.com".into(),
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let zone = test_zone(vec![
            Record::new("www", RecordType::A, "192.0.2.1"),
            Record::new("@", RecordType::Txt, "v=spf1 -all"),
        ]);
        assert_eq!(render_zone_file(&zone), render_zone_file(&zone));
    }

    #[test]
    fn header_contains_ttl_and_parenthesized_soa() {
        let text = render_zone_file(&test_zone(Vec::new()));
        assert!(text.contains("$TTL 3600"));
        assert!(text.contains(
            "@\tIN\tSOA\tns1.example.com. hostmaster.example.com. ("
        ));
        assert!(text.contains("2026083001 ; serial"));
        assert!(text.contains("3600 ) ; minimum"));
    }

    #[test]
    fn ns_record_is_synthesized_when_absent() {
        let text = render_zone_file(&test_zone(Vec::new()));
        assert!(text.contains("@\tIN\tNS\tns1.example.com."));

        let explicit = test_zone(vec![Record::new("@", RecordType::Ns, "ns2.example.net.")]);
        let text = render_zone_file(&explicit);
        assert!(!text.contains("NS\tns1.example.com."));
        assert!(text.contains("NS\tns2.example.net."));
    }

    #[test]
    fn mx_and_srv_emit_their_extra_fields() {
        let mut mx = Record::new("@", RecordType::Mx, "mail.example.com.");
        mx.priority = Some(20);
        let mut srv = Record::new("_sip._tcp", RecordType::Srv, "sip.example.com.");
        srv.priority = Some(10);
        srv.weight = Some(60);
        srv.port = Some(5060);
        let text = render_zone_file(&test_zone(vec![mx, srv]));
        assert!(text.contains("MX\t20 mail.example.com."));
        assert!(text.contains("SRV\t10 60 5060 sip.example.com."));
    }

    #[test]
    fn txt_values_are_quoted_once() {
        let zone = test_zone(vec![
            Record::new("@", RecordType::Txt, "v=spf1 -all"),
            Record::new("x", RecordType::Txt, "\"already quoted\""),
        ]);
        let text = render_zone_file(&zone);
        assert!(text.contains("TXT\t\"v=spf1 -all\""));
        assert!(text.contains("TXT\t\"already quoted\""));
        assert!(!text.contains("\"\"already quoted\"\""));
    }

    #[test]
    fn soa_records_are_suppressed_from_the_body() {
        let zone = test_zone(vec![Record::new(
            "@",
            RecordType::Soa,
            "ns1.example.com. hostmaster.example.com. 1 2 3 4 5",
        )]);
        let text = render_zone_file(&zone);
        assert_eq!(text.matches("SOA").count(), 1);
    }
}
