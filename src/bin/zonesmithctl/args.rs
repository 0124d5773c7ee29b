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

//! Implements command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use zonesmith::model::{RecordType, ZoneKind, ZoneRole};

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// The zonesmith BIND configuration manager
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Args {
    /// Set the configuration file to use
    #[clap(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage zones
    #[clap(subcommand)]
    Zone(ZoneCommand),

    /// Manage records within a zone
    #[clap(subcommand)]
    Record(RecordCommand),

    /// Manage DNSSEC for a zone
    #[clap(subcommand)]
    Dnssec(DnssecCommand),

    /// Import records from a zone file
    Import {
        /// Zone name
        zone: String,
        /// Path to the zone file to import
        file: PathBuf,
    },

    /// Export a zone as zone-file text
    Export {
        /// Zone name
        zone: String,
    },

    /// Generate reverse zones and PTR records for a forward zone
    Reverse {
        /// Zone name
        zone: String,
    },

    /// Resolve a name against the local daemon
    Lookup {
        /// Name to resolve
        name: String,
        /// Record type
        #[clap(default_value = "A")]
        rr_type: RecordType,
    },

    /// Check whether a name resolves on the public resolvers
    Propagation {
        /// Name to check
        name: String,
        /// Record type
        #[clap(default_value = "A")]
        rr_type: RecordType,
    },

    /// Validate the configuration and reload the daemon
    Reload,

    /// Report the daemon's status
    Status,

    /// Install the BIND daemon
    Install {
        /// Run the daemon in a container instead of as a host package
        #[clap(long)]
        container: bool,
    },

    /// Remove the BIND daemon
    Uninstall {
        /// Remove the container deployment instead of the host package
        #[clap(long)]
        container: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ZoneCommand {
    /// List zones
    List,

    /// Create a zone
    Create {
        /// Zone name
        name: String,
        /// Zone kind
        #[clap(long, value_enum, default_value = "forward")]
        kind: KindArg,
        /// Zone role
        #[clap(long, default_value = "master")]
        role: ZoneRole,
    },

    /// Delete a zone
    Delete {
        /// Zone name
        name: String,
    },

    /// Enable or disable a zone
    Toggle {
        /// Zone name
        name: String,
    },
}

/// [`ZoneKind`] lives in the library and carries serde derives only, so
/// the CLI wraps it for clap.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum KindArg {
    Forward,
    Reverse,
}

impl From<KindArg> for ZoneKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Forward => Self::Forward,
            KindArg::Reverse => Self::Reverse,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum RecordCommand {
    /// List the records of a zone
    List {
        /// Zone name
        zone: String,
    },

    /// Add a record to a zone
    Add {
        /// Zone name
        zone: String,
        /// Record owner name (relative, absolute, or `@`)
        name: String,
        /// Record type
        rr_type: RecordType,
        /// Record value
        value: String,
        /// Time to live in seconds
        #[clap(long, default_value_t = 3600)]
        ttl: u32,
        /// MX/SRV priority
        #[clap(long)]
        priority: Option<u16>,
        /// SRV weight
        #[clap(long)]
        weight: Option<u16>,
        /// SRV port
        #[clap(long)]
        port: Option<u16>,
    },

    /// Delete a record from a zone
    Delete {
        /// Zone name
        zone: String,
        /// Record id (as shown by `record list`)
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum DnssecCommand {
    /// Generate keys and sign a zone
    Enable {
        /// Zone name
        zone: String,
    },

    /// Re-sign a DNSSEC-enabled zone
    Sign {
        /// Zone name
        zone: String,
    },

    /// Remove keys and signatures from a zone
    Disable {
        /// Zone name
        zone: String,
    },
}
