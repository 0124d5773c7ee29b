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

//! Implements named.conf fragment rendering and the marker-delimited
//! managed blocks inside the shared per-zone declaration file.

use std::fmt::Write;
use std::path::Path;

use super::{address_list, fqdn};
use crate::model::{Acl, ForwarderConfig, SecurityConfig, TsigKey, Zone, ZoneRole};

////////////////////////////////////////////////////////////////////////
// PER-ZONE DECLARATIONS                                              //
////////////////////////////////////////////////////////////////////////

fn begin_marker(zone_name: &str) -> String {
    format!("// BEGIN zonesmith zone {zone_name}")
}

fn end_marker(zone_name: &str) -> String {
    format!("// END zonesmith zone {zone_name}")
}

/// Renders the `zone { ... };` declaration for a zone.
///
/// `zone_file_path` must already be translated for the daemon's view of
/// the filesystem; `signed` selects the signed artifact path rendered
/// by the caller for DNSSEC-enabled zones.
pub fn zone_declaration(zone: &Zone, zone_file_path: &Path, signed: bool) -> String {
    let mut out = String::new();
    writeln!(out, "zone \"{}\" {{", zone.name).unwrap();
    match zone.role {
        ZoneRole::Master => {
            writeln!(out, "    type master;").unwrap();
            writeln!(out, "    file \"{}\";", zone_file_path.display()).unwrap();
            write_list_or_none(&mut out, "allow-transfer", &zone.acls.allow_transfer);
            write_list_or_none(&mut out, "allow-update", &zone.acls.allow_update);
            write_list_if_nonempty(&mut out, "allow-query", &zone.acls.allow_query);
            write_list_if_nonempty(&mut out, "also-notify", &zone.acls.also_notify);
            if zone.dnssec_enabled {
                writeln!(out, "    inline-signing yes;").unwrap();
                if signed {
                    writeln!(out, "    auto-dnssec maintain;").unwrap();
                }
            }
        }
        ZoneRole::Slave | ZoneRole::Stub => {
            let role = if zone.role == ZoneRole::Slave {
                "slave"
            } else {
                "stub"
            };
            writeln!(out, "    type {role};").unwrap();
            writeln!(out, "    file \"{}\";", zone_file_path.display()).unwrap();
            write_list_if_nonempty(&mut out, "masters", &zone.acls.masters);
            write_list_if_nonempty(&mut out, "allow-query", &zone.acls.allow_query);
        }
        ZoneRole::Forward => {
            writeln!(out, "    type forward;").unwrap();
            writeln!(out, "    forward only;").unwrap();
            write_list_if_nonempty(&mut out, "forwarders", &zone.acls.forwarders);
        }
    }
    out.push_str("};\n");
    out
}

/// Emits `name { entries };`, or `name { none; };` when the list is
/// empty. Master zones lock transfers and updates down by default.
fn write_list_or_none(out: &mut String, name: &str, entries: &[String]) {
    if entries.is_empty() {
        writeln!(out, "    {name} {{ none; }};").unwrap();
    } else {
        writeln!(out, "    {name} {{").unwrap();
        out.push_str(&address_list(entries));
        out.push_str("    };\n");
    }
}

/// Emits `name { entries };` only when the list is non-empty.
fn write_list_if_nonempty(out: &mut String, name: &str, entries: &[String]) {
    if !entries.is_empty() {
        writeln!(out, "    {name} {{").unwrap();
        out.push_str(&address_list(entries));
        out.push_str("    };\n");
    }
}

/// Removes the marker-delimited block for `zone_name` from the shared
/// declaration file text, if present. Everything outside the block is
/// kept verbatim.
pub fn remove_zone_block(text: &str, zone_name: &str) -> String {
    let begin = begin_marker(zone_name);
    let end = end_marker(zone_name);
    let mut out = String::new();
    let mut inside = false;
    for line in text.lines() {
        if !inside && line.trim() == begin {
            inside = true;
            continue;
        }
        if inside {
            if line.trim() == end {
                inside = false;
            }
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    // Trim a trailing run of blank lines left behind by the removal.
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Replaces (or appends) the marker-delimited block for a zone with a
/// freshly rendered declaration. Any previous block for the zone is
/// removed first, so repeated rewrites leave exactly one block.
pub fn upsert_zone_block(text: &str, zone_name: &str, declaration: &str) -> String {
    let mut out = remove_zone_block(text, zone_name);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    writeln!(out, "{}", begin_marker(zone_name)).unwrap();
    out.push_str(declaration);
    if !declaration.ends_with('\n') {
        out.push('\n');
    }
    writeln!(out, "{}", end_marker(zone_name)).unwrap();
    out
}

/// Appends an `include` line for `fragment` to the root configuration
/// text unless one is already present. Returns the new text and whether
/// anything changed.
pub fn ensure_include(text: &str, fragment: &Path) -> (String, bool) {
    let include_line = format!("include \"{}\";", fragment.display());
    if text.lines().any(|line| line.trim() == include_line) {
        return (text.to_string(), false);
    }
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&include_line);
    out.push('\n');
    (out, true)
}

////////////////////////////////////////////////////////////////////////
// PER-CONCERN FRAGMENTS                                              //
////////////////////////////////////////////////////////////////////////

/// Renders the named ACL fragment.
pub fn acls_fragment(acls: &[Acl]) -> String {
    let mut out = String::from("// ACLs managed by zonesmith.\n");
    for acl in acls {
        writeln!(out, "acl \"{}\" {{", acl.name).unwrap();
        out.push_str(&address_list(&acl.entries));
        out.push_str("};\n");
    }
    out
}

/// Renders the TSIG key fragment. This is the only place an unmasked
/// secret is written.
pub fn tsig_keys_fragment(keys: &[TsigKey]) -> String {
    let mut out = String::from("// TSIG keys managed by zonesmith.\n");
    for key in keys {
        writeln!(out, "key \"{}\" {{", key.name).unwrap();
        writeln!(out, "    algorithm {};", key.algorithm).unwrap();
        writeln!(out, "    secret \"{}\";", key.secret).unwrap();
        out.push_str("};\n");
    }
    out
}

/// Renders the global forwarders fragment. The fragment is included
/// from inside the `options` block, so it carries bare statements.
pub fn forwarders_fragment(config: &ForwarderConfig) -> String {
    let mut out = String::from("// Forwarders managed by zonesmith.\n");
    if config.forwarders.is_empty() {
        return out;
    }
    out.push_str("forwarders {\n");
    out.push_str(&address_list(&config.forwarders));
    out.push_str("};\n");
    if config.forward_only {
        out.push_str("forward only;\n");
    }
    out
}

/// Renders the global `options` fragment from the security
/// configuration. `forwarders_conf` is included from inside the block
/// (translated for the daemon's view of the filesystem).
pub fn options_fragment(security: &SecurityConfig, forwarders_conf: &Path) -> String {
    let mut out = String::from("// Global options managed by zonesmith.\noptions {\n");
    out.push_str("    directory \"/var/cache/bind\";\n");
    if security.recursion {
        out.push_str("    recursion yes;\n");
        if security.allow_recursion.is_empty() {
            out.push_str("    allow-recursion { none; };\n");
        } else {
            out.push_str("    allow-recursion {\n");
            out.push_str(&address_list(&security.allow_recursion));
            out.push_str("    };\n");
        }
    } else {
        out.push_str("    recursion no;\n");
    }
    if security.allow_query.is_empty() {
        out.push_str("    allow-query { any; };\n");
    } else {
        out.push_str("    allow-query {\n");
        out.push_str(&address_list(&security.allow_query));
        out.push_str("    };\n");
    }
    if security.minimal_responses {
        out.push_str("    minimal-responses yes;\n");
    }
    if let Some(rrl) = &security.rate_limit {
        out.push_str("    rate-limit {\n");
        writeln!(out, "        responses-per-second {};", rrl.responses_per_second).unwrap();
        writeln!(out, "        window {};", rrl.window).unwrap();
        out.push_str("    };\n");
    }
    if let Some(size) = security.edns_udp_size {
        writeln!(out, "    edns-udp-size {size};").unwrap();
    }
    // Hardening defaults; per-zone declarations open these back up.
    out.push_str("    version none;\n");
    out.push_str("    allow-transfer { none; };\n");
    out.push_str("    allow-update { none; };\n");
    writeln!(out, "    include \"{}\";", forwarders_conf.display()).unwrap();
    out.push_str("};\n");
    out
}

/// Renders an NS name for use in generated reverse zones.
pub fn ns_value(primary_ns: &str) -> String {
    fqdn(primary_ns)
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RateLimit, SoaRecord, TsigAlgorithm, ZoneAcls, ZoneKind};

    fn master_zone() -> Zone {
        Zone {
            id: String::from("z1"),
            name: String::from("example.com"),
            kind: ZoneKind::Forward,
            role: ZoneRole::Master,
            soa: SoaRecord::default(),
            records: Vec::new(),
            acls: ZoneAcls::default(),
            enabled: true,
            dnssec_enabled: false,
            file_path: "/var/lib/bind/db.example.com".into(),
        }
    }

    #[test]
    fn master_declaration_defaults_transfer_and_update_to_none() {
        let decl = zone_declaration(&master_zone(), Path::new("/var/lib/bind/db.example.com"), false);
        assert!(decl.contains("type master;"));
        assert!(decl.contains("file \"/var/lib/bind/db.example.com\";"));
        assert!(decl.contains("allow-transfer { none; };"));
        assert!(decl.contains("allow-update { none; };"));
        assert!(!decl.contains("allow-query"));
        assert!(!decl.contains("inline-signing"));
    }

    #[test]
    fn slave_declaration_lists_masters() {
        let mut zone = master_zone();
        zone.role = ZoneRole::Slave;
        zone.acls.masters = vec![String::from("192.0.2.53")];
        let decl = zone_declaration(&zone, Path::new("/var/lib/bind/db.example.com"), false);
        assert!(decl.contains("type slave;"));
        assert!(decl.contains("masters {"));
        assert!(decl.contains("192.0.2.53;"));
    }

    #[test]
    fn forward_declaration_has_no_file() {
        let mut zone = master_zone();
        zone.role = ZoneRole::Forward;
        zone.acls.forwarders = vec![String::from("8.8.8.8")];
        let decl = zone_declaration(&zone, Path::new("/unused"), false);
        assert!(decl.contains("type forward;"));
        assert!(decl.contains("forward only;"));
        assert!(!decl.contains("file"));
    }

    #[test]
    fn dnssec_master_emits_inline_signing() {
        let mut zone = master_zone();
        zone.dnssec_enabled = true;
        let decl = zone_declaration(
            &zone,
            Path::new("/var/lib/bind/db.example.com.signed"),
            true,
        );
        assert!(decl.contains("inline-signing yes;"));
        assert!(decl.contains("db.example.com.signed"));
    }

    #[test]
    fn upsert_leaves_exactly_one_block_after_repeated_writes() {
        let decl = zone_declaration(&master_zone(), Path::new("/var/lib/bind/db.example.com"), false);
        let once = upsert_zone_block("", "example.com", &decl);
        let twice = upsert_zone_block(&once, "example.com", &decl);
        let thrice = upsert_zone_block(&twice, "example.com", &decl);
        assert_eq!(
            thrice.matches("// BEGIN zonesmith zone example.com").count(),
            1,
        );
        assert_eq!(twice, thrice);
    }

    #[test]
    fn upsert_keeps_other_zones_and_hand_edits() {
        let hand_edited = "// local operator note\n";
        let decl_a = "zone \"a.test\" {\n};\n";
        let decl_b = "zone \"b.test\" {\n};\n";
        let text = upsert_zone_block(hand_edited, "a.test", decl_a);
        let text = upsert_zone_block(&text, "b.test", decl_b);
        let text = upsert_zone_block(&text, "a.test", decl_a);
        assert!(text.contains("// local operator note"));
        assert_eq!(text.matches("// BEGIN zonesmith zone a.test").count(), 1);
        assert_eq!(text.matches("// BEGIN zonesmith zone b.test").count(), 1);
    }

    #[test]
    fn remove_drops_only_the_named_block() {
        let text = upsert_zone_block("", "a.test", "zone \"a.test\" {\n};\n");
        let text = upsert_zone_block(&text, "b.test", "zone \"b.test\" {\n};\n");
        let text = remove_zone_block(&text, "a.test");
        assert!(!text.contains("a.test"));
        assert!(text.contains("b.test"));
    }

    #[test]
    fn ensure_include_is_idempotent() {
        let fragment = Path::new("/etc/bind/named.conf.acls");
        let (text, changed) = ensure_include("", fragment);
        assert!(changed);
        let (text2, changed2) = ensure_include(&text, fragment);
        assert!(!changed2);
        assert_eq!(text, text2);
        assert_eq!(
            text.matches("include \"/etc/bind/named.conf.acls\";").count(),
            1,
        );
    }

    #[test]
    fn tsig_fragment_renders_bind_key_syntax() {
        let keys = vec![TsigKey {
            id: String::from("k1"),
            name: String::from("transfer-key"),
            algorithm: TsigAlgorithm::HmacSha256,
            secret: String::from("c2VjcmV0"),
        }];
        let fragment = tsig_keys_fragment(&keys);
        assert!(fragment.contains("key \"transfer-key\" {"));
        assert!(fragment.contains("algorithm hmac-sha256;"));
        assert!(fragment.contains("secret \"c2VjcmV0\";"));
    }

    #[test]
    fn options_fragment_renders_rrl_and_hardening() {
        let security = SecurityConfig {
            recursion: true,
            allow_recursion: vec![String::from("192.0.2.0/24")],
            rate_limit: Some(RateLimit {
                responses_per_second: 10,
                window: 5,
            }),
            edns_udp_size: Some(1232),
            ..SecurityConfig::default()
        };
        let out = options_fragment(&security, Path::new("/etc/bind/named.conf.forwarders"));
        assert!(out.contains("recursion yes;"));
        assert!(out.contains("192.0.2.0/24;"));
        assert!(out.contains("responses-per-second 10;"));
        assert!(out.contains("window 5;"));
        assert!(out.contains("edns-udp-size 1232;"));
        assert!(out.contains("version none;"));
        assert!(out.contains("allow-transfer { none; };"));
        assert!(out.contains("include \"/etc/bind/named.conf.forwarders\";"));
    }

    #[test]
    fn forwarders_fragment_handles_empty_and_forward_only() {
        let empty = forwarders_fragment(&ForwarderConfig::default());
        assert!(!empty.contains("forwarders {"));

        let config = ForwarderConfig {
            forwarders: vec![String::from("8.8.8.8"), String::from("1.1.1.1")],
            forward_only: true,
        };
        let out = forwarders_fragment(&config);
        assert!(out.contains("8.8.8.8;"));
        assert!(out.contains("forward only;"));
    }
}
