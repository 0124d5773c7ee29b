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

//! Implements DNS lookups, propagation checks against public resolvers,
//! and daemon status reporting.

use std::sync::Arc;
use std::time::Duration;

use crate::command::{CommandRunner, SHORT_TIMEOUT};
use crate::model::RecordType;

use super::ZoneManager;

/// The public resolvers a propagation check consults.
const PROPAGATION_RESOLVERS: [&str; 2] = ["8.8.8.8", "1.1.1.1"];

/// Per-resolver query timeout for propagation checks. Kept short so a
/// check against an unreachable resolver fails fast.
const RESOLVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Issues DNS queries. Abstracted so tests can substitute canned
/// answers for the real `dig` invocation.
pub trait DnsQuery: Send + Sync {
    /// Queries `server` for `name`/`rr_type` and returns the answer
    /// values, one per line of `dig +short` output.
    fn query(
        &self,
        name: &str,
        rr_type: RecordType,
        server: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<String>, String>;
}

/// The production [`DnsQuery`]: shells out to `dig +short`.
pub struct DigQuery {
    runner: Arc<dyn CommandRunner>,
}

impl DigQuery {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl DnsQuery for DigQuery {
    fn query(
        &self,
        name: &str,
        rr_type: RecordType,
        server: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<String>, String> {
        let mut argv = vec![
            String::from("dig"),
            String::from("+short"),
            name.to_string(),
            rr_type.to_string(),
        ];
        if let Some(server) = server {
            argv.push(format!("@{server}"));
        }
        let output = self.runner.run(&argv, timeout).map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(output.diagnostic().to_string());
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// One resolver's answer in a propagation check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolverResult {
    pub resolver: String,
    pub answers: Vec<String>,
    pub error: Option<String>,
}

/// The outcome of a propagation check across the public resolvers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PropagationReport {
    pub name: String,
    pub rr_type: RecordType,
    pub results: Vec<ResolverResult>,
}

impl PropagationReport {
    /// Whether every consulted resolver answered with at least one
    /// value.
    pub fn propagated(&self) -> bool {
        !self.results.is_empty()
            && self
                .results
                .iter()
                .all(|r| r.error.is_none() && !r.answers.is_empty())
    }
}

/// The daemon's status as reported by `rndc status`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerStatus {
    pub running: bool,
    pub version: Option<String>,
    pub zone_count: Option<u32>,
}

/// Parses `rndc status` output. Only the lines we report on are
/// examined; everything else is ignored.
pub fn parse_rndc_status(text: &str) -> ServerStatus {
    let mut status = ServerStatus {
        running: false,
        version: None,
        zone_count: None,
    };
    for line in text.lines() {
        let line = line.trim();
        if let Some(version) = line.strip_prefix("version:") {
            status.version = Some(version.trim().to_string());
        } else if let Some(count) = line.strip_prefix("number of zones:") {
            // BIND appends a parenthesized automatic-zone count.
            let count = count.trim().split_whitespace().next().unwrap_or("");
            status.zone_count = count.parse().ok();
        } else if line == "server is up and running" {
            status.running = true;
        }
    }
    status
}

impl ZoneManager {
    /// Resolves a name against the local daemon.
    pub fn lookup(&self, name: &str, rr_type: RecordType) -> Result<Vec<String>, String> {
        self.query.query(name, rr_type, None, SHORT_TIMEOUT)
    }

    /// Checks whether a name resolves on the public resolvers. A
    /// resolver failure becomes that resolver's error entry, not a
    /// failure of the whole check.
    pub fn check_propagation(&self, name: &str, rr_type: RecordType) -> PropagationReport {
        let results = PROPAGATION_RESOLVERS
            .iter()
            .map(|resolver| {
                match self
                    .query
                    .query(name, rr_type, Some(resolver), RESOLVER_TIMEOUT)
                {
                    Ok(answers) => ResolverResult {
                        resolver: resolver.to_string(),
                        answers,
                        error: None,
                    },
                    Err(e) => ResolverResult {
                        resolver: resolver.to_string(),
                        answers: Vec::new(),
                        error: Some(e),
                    },
                }
            })
            .collect();
        PropagationReport {
            name: name.to_string(),
            rr_type,
            results,
        }
    }

    /// Reports the daemon's status via `rndc status`. A failed
    /// invocation reports a daemon that is not running.
    pub fn server_status(&self) -> ServerStatus {
        let report = self.run_tool(&["rndc", "status"], SHORT_TIMEOUT);
        if !report.success {
            return ServerStatus::default();
        }
        parse_rndc_status(&report.message)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::tests::test_manager;
    use super::*;

    const STATUS_OUTPUT: &str = "\
version: BIND 9.18.24-1-Debian (Extended Support Version) <id:>
running on ns1: Linux x86_64 6.1.0
boot time: Mon, 06 May 2024 12:00:00 GMT
number of zones: 104 (99 automatic)
debug level: 0
server is up and running
";

    #[test]
    fn status_parser_extracts_version_and_zone_count() {
        let status = parse_rndc_status(STATUS_OUTPUT);
        assert!(status.running);
        assert_eq!(
            status.version.as_deref(),
            Some("BIND 9.18.24-1-Debian (Extended Support Version) <id:>"),
        );
        assert_eq!(status.zone_count, Some(104));
    }

    #[test]
    fn status_parser_tolerates_garbage() {
        let status = parse_rndc_status("rndc: connect failed: connection refused");
        assert!(!status.running);
        assert_eq!(status.version, None);
        assert_eq!(status.zone_count, None);
    }

    #[test]
    fn propagation_report_requires_answers_everywhere() {
        let ok = ResolverResult {
            resolver: String::from("8.8.8.8"),
            answers: vec![String::from("192.0.2.1")],
            error: None,
        };
        let empty = ResolverResult {
            resolver: String::from("1.1.1.1"),
            answers: Vec::new(),
            error: None,
        };
        let report = |results| PropagationReport {
            name: String::from("www.example.com"),
            rr_type: RecordType::A,
            results,
        };
        assert!(report(vec![ok.clone(), ok.clone()]).propagated());
        assert!(!report(vec![ok, empty]).propagated());
        assert!(!report(Vec::new()).propagated());
    }

    #[test]
    fn lookup_and_propagation_issue_dig_queries() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, runner) = test_manager(dir.path());
        let _ = manager.lookup("www.example.com", RecordType::A);
        let report = manager.check_propagation("www.example.com", RecordType::A);
        assert_eq!(report.results.len(), 2);

        let commands = runner.commands();
        assert!(commands
            .iter()
            .any(|c| c == "dig +short www.example.com A"));
        assert!(commands
            .iter()
            .any(|c| c == "dig +short www.example.com A @8.8.8.8"));
        assert!(commands
            .iter()
            .any(|c| c == "dig +short www.example.com A @1.1.1.1"));
    }

    #[test]
    fn server_status_runs_rndc() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, runner) = test_manager(dir.path());
        let status = manager.server_status();
        // The recording runner returns empty output: a successful run
        // with nothing parseable.
        assert!(!status.running);
        assert!(runner.commands().iter().any(|c| c == "rndc status"));
    }
}
