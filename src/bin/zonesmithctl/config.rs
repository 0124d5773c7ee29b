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

//! Implements configuration-file loading for the command-line tool.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use zonesmith::Settings;

/// The configuration file consulted when `--config` is not given.
const DEFAULT_CONFIG_PATH: &str = "/etc/zonesmith/config.toml";

/// Loads the settings. An explicitly given path must exist; the default
/// path is optional and its absence yields the default settings.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => load_from_path(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            match load_from_path(path) {
                Ok(settings) => Ok(settings),
                Err(e)
                    if e.downcast_ref::<io::Error>()
                        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound) =>
                {
                    debug!("No configuration at {DEFAULT_CONFIG_PATH}; using defaults.");
                    Ok(Settings::default())
                }
                Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
            }
        }
    }
}

fn load_from_path(path: &Path) -> Result<Settings> {
    let raw = fs::read(path)?;
    let settings = toml::from_slice(&raw).context("failed to parse the configuration file")?;
    Ok(settings)
}
