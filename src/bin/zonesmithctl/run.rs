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

//! Implements command dispatch.

use std::fmt::Write;
use std::fs;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use env_logger::Env;
use log::error;

use zonesmith::manager::{CreateZoneParams, ImportFormat, OpReport};
use zonesmith::model::Zone;
use zonesmith::ZoneManager;

use crate::args::{Args, Command, DnssecCommand, RecordCommand, ZoneCommand};
use crate::config;

/// Runs the tool.
pub fn run(args: Args) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    if let Err(e) = try_running(args) {
        let mut message = String::from("Failed:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        error!("{}", message);
        process::exit(1);
    }
}

fn try_running(args: Args) -> Result<()> {
    let settings = config::load(args.config.as_deref())?;
    let manager = ZoneManager::new(settings);

    match args.command {
        Command::Zone(command) => run_zone(&manager, command),
        Command::Record(command) => run_record(&manager, command),
        Command::Dnssec(command) => run_dnssec(&manager, command),
        Command::Import { zone, file } => {
            let zone = find_zone(&manager, &zone)?;
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = manager
                .import_zone_file(&zone.id, &text, ImportFormat::ZoneFile)
                .ok_or_else(|| anyhow!("the zone disappeared during the import"))?;
            println!(
                "imported {} record(s), skipped {}",
                report.imported, report.skipped,
            );
            for error in &report.errors {
                println!("error: {error}");
            }
            Ok(())
        }
        Command::Export { zone } => {
            let zone = find_zone(&manager, &zone)?;
            let text = manager
                .export_zone(&zone.id)
                .ok_or_else(|| anyhow!("the zone disappeared during the export"))?;
            print!("{text}");
            Ok(())
        }
        Command::Reverse { zone } => {
            let zone = find_zone(&manager, &zone)?;
            let report = manager
                .generate_reverse_zones(&zone.id)
                .ok_or_else(|| anyhow!("the zone disappeared during generation"))?;
            for name in &report.created_zones {
                println!("created zone {name}");
            }
            println!("added {} PTR record(s)", report.added_records);
            for error in &report.errors {
                println!("error: {error}");
            }
            Ok(())
        }
        Command::Lookup { name, rr_type } => {
            let answers = manager
                .lookup(&name, rr_type)
                .map_err(|e| anyhow!(e))
                .context("lookup failed")?;
            if answers.is_empty() {
                println!("no answer");
            }
            for answer in answers {
                println!("{answer}");
            }
            Ok(())
        }
        Command::Propagation { name, rr_type } => {
            let report = manager.check_propagation(&name, rr_type);
            for result in &report.results {
                match &result.error {
                    Some(e) => println!("{}: error: {e}", result.resolver),
                    None if result.answers.is_empty() => {
                        println!("{}: no answer", result.resolver)
                    }
                    None => println!("{}: {}", result.resolver, result.answers.join(", ")),
                }
            }
            if report.propagated() {
                println!("{name} has propagated");
                Ok(())
            } else {
                bail!("{name} has not fully propagated");
            }
        }
        Command::Reload => finish(manager.reload_daemon()),
        Command::Status => {
            let status = manager.server_status();
            if !status.running {
                bail!("the daemon is not running");
            }
            println!("running: yes");
            if let Some(version) = status.version {
                println!("version: {version}");
            }
            if let Some(count) = status.zone_count {
                println!("zones: {count}");
            }
            Ok(())
        }
        Command::Install { container } => finish(if container {
            manager.install_container()
        } else {
            manager.install_host()
        }),
        Command::Uninstall { container } => finish(if container {
            manager.uninstall_container()
        } else {
            manager.uninstall_host()
        }),
    }
}

fn run_zone(manager: &ZoneManager, command: ZoneCommand) -> Result<()> {
    match command {
        ZoneCommand::List => {
            for zone in manager.list_zones() {
                let state = if zone.enabled { "enabled" } else { "disabled" };
                println!(
                    "{}\t{}\t{}\tserial {}\t{}",
                    zone.name, zone.role, state, zone.soa.serial, zone.id,
                );
            }
            Ok(())
        }
        ZoneCommand::Create { name, kind, role } => {
            let zone = manager
                .create_zone(CreateZoneParams::new(&name, kind.into(), role))
                .ok_or_else(|| anyhow!("a zone named {name} already exists"))?;
            println!("created {} ({})", zone.name, zone.id);
            Ok(())
        }
        ZoneCommand::Delete { name } => {
            let zone = find_zone(manager, &name)?;
            if !manager.delete_zone(&zone.id) {
                bail!("failed to delete {name}");
            }
            println!("deleted {name}");
            Ok(())
        }
        ZoneCommand::Toggle { name } => {
            let zone = find_zone(manager, &name)?;
            let enabled = manager
                .toggle_zone(&zone.id)
                .ok_or_else(|| anyhow!("the zone disappeared during the toggle"))?;
            println!("{name} is now {}", if enabled { "enabled" } else { "disabled" });
            Ok(())
        }
    }
}

fn run_record(manager: &ZoneManager, command: RecordCommand) -> Result<()> {
    match command {
        RecordCommand::List { zone } => {
            let zone = find_zone(manager, &zone)?;
            for record in manager.get_records(&zone.id).unwrap_or_default() {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.id, record.name, record.ttl, record.rr_type, record.value,
                );
            }
            Ok(())
        }
        RecordCommand::Add {
            zone,
            name,
            rr_type,
            value,
            ttl,
            priority,
            weight,
            port,
        } => {
            let zone = find_zone(manager, &zone)?;
            let mut record = zonesmith::model::Record::new(name, rr_type, value);
            record.ttl = ttl;
            record.priority = priority;
            record.weight = weight;
            record.port = port;
            let record = manager
                .add_record(&zone.id, record)
                .ok_or_else(|| anyhow!("the zone disappeared while adding the record"))?;
            println!("added {} ({})", record.name, record.id);
            Ok(())
        }
        RecordCommand::Delete { zone, id } => {
            let zone = find_zone(manager, &zone)?;
            match manager.delete_record(&zone.id, &id) {
                Some(true) => {
                    println!("deleted {id}");
                    Ok(())
                }
                Some(false) => bail!("no record with id {id} in {}", zone.name),
                None => bail!("the zone disappeared while deleting the record"),
            }
        }
    }
}

fn run_dnssec(manager: &ZoneManager, command: DnssecCommand) -> Result<()> {
    let report = match command {
        DnssecCommand::Enable { zone } => manager.enable_dnssec(&find_zone(manager, &zone)?.id),
        DnssecCommand::Sign { zone } => manager.sign_zone(&find_zone(manager, &zone)?.id),
        DnssecCommand::Disable { zone } => manager.disable_dnssec(&find_zone(manager, &zone)?.id),
    };
    finish(report)
}

/// Resolves a zone argument, which may be a zone name or an id.
fn find_zone(manager: &ZoneManager, name_or_id: &str) -> Result<Zone> {
    manager
        .find_zone_by_name(name_or_id)
        .or_else(|| manager.get_zone(name_or_id))
        .ok_or_else(|| anyhow!("no zone named {name_or_id}"))
}

/// Prints an [`OpReport`] and converts a failure into an error.
fn finish(report: OpReport) -> Result<()> {
    if report.success {
        if !report.message.is_empty() {
            println!("{}", report.message);
        }
        Ok(())
    } else {
        bail!("{}", report.message);
    }
}
