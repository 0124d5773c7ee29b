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

//! Implements bulk zone-file import and export.
//!
//! The import parser is line-oriented and best-effort: blank lines,
//! comments, and `$` directives are skipped; unknown and SOA record
//! types are skipped; a line that cannot be parsed becomes one entry in
//! the error list without aborting the rest of the import.

use super::ZoneManager;
use crate::model::{Record, RecordType};
use crate::render;

/// The text formats a bulk import accepts. Zone-file text is the only
/// one today; the parameter exists so callers state the format
/// explicitly and adding another is not a signature change.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ImportFormat {
    #[default]
    ZoneFile,
}

/// The outcome of a bulk import.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Parses zone-file text into records, best-effort.
pub fn parse_zone_file(text: &str) -> ParsedZoneFile {
    let mut records = Vec::new();
    let mut report = ImportReport::default();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if line.starts_with('$') {
            report.skipped += 1;
            continue;
        }
        match parse_record_line(line) {
            Ok(Some(record)) => {
                records.push(record);
                report.imported += 1;
            }
            Ok(None) => report.skipped += 1,
            Err(e) => report.errors.push(format!("line {}: {e}", number + 1)),
        }
    }
    ParsedZoneFile { records, report }
}

/// The records and counters produced by [`parse_zone_file`].
pub struct ParsedZoneFile {
    pub records: Vec<Record>,
    pub report: ImportReport,
}

/// Parses one record line of the form
/// `name [ttl] [IN] type value...`. Returns `Ok(None)` for record
/// types the import deliberately skips (SOA and anything unknown).
fn parse_record_line(line: &str) -> Result<Option<Record>, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(String::from("expected at least name, type, and value"));
    }
    let name = tokens[0];
    let mut index = 1;

    let ttl = match tokens[index].parse::<u32>() {
        Ok(ttl) => {
            index += 1;
            Some(ttl)
        }
        Err(_) => None,
    };
    if tokens
        .get(index)
        .is_some_and(|t| t.eq_ignore_ascii_case("IN"))
    {
        index += 1;
    }
    let Some(type_token) = tokens.get(index) else {
        return Err(String::from("missing record type"));
    };
    index += 1;
    let Ok(rr_type) = type_token.parse::<RecordType>() else {
        // Unknown types are skipped, not failed: hand-written files
        // often carry types we do not manage.
        return Ok(None);
    };
    if rr_type == RecordType::Soa {
        return Ok(None);
    }
    if tokens.len() <= index {
        return Err(format!("missing value for {rr_type} record"));
    }
    let mut value_tokens = &tokens[index..];

    let mut record = Record::new(name, rr_type, "");
    if let Some(ttl) = ttl {
        record.ttl = ttl;
    }
    match rr_type {
        RecordType::Mx => {
            if value_tokens.len() >= 2 {
                record.priority = Some(
                    value_tokens[0]
                        .parse()
                        .map_err(|_| format!("invalid MX priority {:?}", value_tokens[0]))?,
                );
                value_tokens = &value_tokens[1..];
            }
        }
        RecordType::Srv => {
            if value_tokens.len() < 4 {
                return Err(String::from(
                    "SRV records need priority, weight, port, and target",
                ));
            }
            record.priority = Some(
                value_tokens[0]
                    .parse()
                    .map_err(|_| format!("invalid SRV priority {:?}", value_tokens[0]))?,
            );
            record.weight = Some(
                value_tokens[1]
                    .parse()
                    .map_err(|_| format!("invalid SRV weight {:?}", value_tokens[1]))?,
            );
            record.port = Some(
                value_tokens[2]
                    .parse()
                    .map_err(|_| format!("invalid SRV port {:?}", value_tokens[2]))?,
            );
            value_tokens = &value_tokens[3..];
        }
        _ => {}
    }
    record.value = value_tokens.join(" ").trim_matches('"').to_string();
    record.normalize();
    Ok(Some(record))
}

impl ZoneManager {
    /// Imports records from text in the given format into a zone.
    /// Nothing is persisted unless at least one record parses.
    pub fn import_zone_file(
        &self,
        zone_id: &str,
        text: &str,
        format: ImportFormat,
    ) -> Option<ImportReport> {
        let parsed = match format {
            ImportFormat::ZoneFile => parse_zone_file(text),
        };
        if parsed.report.imported == 0 {
            // Confirm the zone exists so the caller can distinguish
            // not-found from an import with nothing to do.
            self.get_zone(zone_id)?;
            return Some(parsed.report);
        }
        self.mutate_records(zone_id, move |records| {
            records.extend(parsed.records);
        })?;
        Some(parsed.report)
    }

    /// Returns the rendered zone-file text for a zone.
    pub fn export_zone(&self, zone_id: &str) -> Option<String> {
        self.get_zone(zone_id)
            .map(|zone| render::render_zone_file(&zone))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
