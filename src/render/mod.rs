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

//! Renders zone files and named.conf fragments from in-memory
//! entities. Every function here is pure; the [`ZoneManager`] decides
//! what gets written where.
//!
//! [`ZoneManager`]: crate::manager::ZoneManager

mod fragments;
mod zone_file;

pub use fragments::{
    acls_fragment, ensure_include, forwarders_fragment, ns_value, options_fragment,
    remove_zone_block, tsig_keys_fragment, upsert_zone_block, zone_declaration,
};
pub use zone_file::render_zone_file;

/// Renders a semicolon-terminated, indented address-match list body.
fn address_list(entries: &[String]) -> String {
    entries
        .iter()
        .map(|entry| format!("        {entry};\n"))
        .collect()
}

/// Ensures a name carries a trailing dot, as zone-file and masters
/// contexts require fully qualified names.
fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}
