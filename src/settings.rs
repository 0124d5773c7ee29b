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

//! Implements the [`Settings`] structure describing where the managed
//! BIND installation lives.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The filesystem and deployment layout of the managed BIND
/// installation.
///
/// The defaults follow Debian-style BIND conventions: configuration
/// under `/etc/bind`, zone files under `/var/lib/bind`, DNSSEC key
/// material under `/var/lib/bind/keys`. Zonesmith's own persisted
/// documents live under `data_dir`. When `marker_path` exists, the
/// daemon is assumed to run inside the named container and every
/// command is executed through `<container_runtime> exec`.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    #[serde(default = "default_zones_dir")]
    pub zones_dir: PathBuf,
    #[serde(default = "default_keys_dir")]
    pub keys_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_marker_path")]
    pub marker_path: PathBuf,
    #[serde(default = "default_container_runtime")]
    pub container_runtime: String,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default = "default_container_image")]
    pub container_image: String,
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/etc/bind")
}

fn default_zones_dir() -> PathBuf {
    PathBuf::from("/var/lib/bind")
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from("/var/lib/bind/keys")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/zonesmith")
}

fn default_marker_path() -> PathBuf {
    default_data_dir().join("container-mode")
}

fn default_container_runtime() -> String {
    String::from("docker")
}

fn default_container_name() -> String {
    String::from("bind9")
}

fn default_container_image() -> String {
    String::from("internetsystemsconsortium/bind9:9.18")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            zones_dir: default_zones_dir(),
            keys_dir: default_keys_dir(),
            data_dir: default_data_dir(),
            marker_path: default_marker_path(),
            container_runtime: default_container_runtime(),
            container_name: default_container_name(),
            container_image: default_container_image(),
        }
    }
}

impl Settings {
    /// Returns a settings value rooted entirely under `base`. Used by
    /// tests and by installations that keep everything in one tree.
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            config_dir: base.join("etc"),
            zones_dir: base.join("zones"),
            keys_dir: base.join("zones").join("keys"),
            data_dir: base.join("data"),
            marker_path: base.join("data").join("container-mode"),
            ..Self::default()
        }
    }

    /// The root configuration file that includes every generated
    /// fragment.
    pub fn root_conf(&self) -> PathBuf {
        self.config_dir.join("named.conf")
    }

    /// The shared per-zone declaration file, demarcated by per-zone
    /// marker comments.
    pub fn local_conf(&self) -> PathBuf {
        self.config_dir.join("named.conf.local")
    }

    pub fn options_conf(&self) -> PathBuf {
        self.config_dir.join("named.conf.options")
    }

    pub fn acls_conf(&self) -> PathBuf {
        self.config_dir.join("named.conf.acls")
    }

    pub fn keys_conf(&self) -> PathBuf {
        self.config_dir.join("named.conf.keys")
    }

    pub fn forwarders_conf(&self) -> PathBuf {
        self.config_dir.join("named.conf.forwarders")
    }

    /// The zone file path for a zone name. Derived deterministically so
    /// the path never needs to be stored independently of the name.
    pub fn zone_file_path(&self, name: &str) -> PathBuf {
        self.zones_dir.join(format!("db.{name}"))
    }

    /// The signed artifact produced by `dnssec-signzone` for a zone
    /// file.
    pub fn signed_zone_file_path(&self, name: &str) -> PathBuf {
        self.zones_dir.join(format!("db.{name}.signed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_file_path_is_derived_from_name() {
        let settings = Settings::default();
        assert_eq!(
            settings.zone_file_path("example.com"),
            PathBuf::from("/var/lib/bind/db.example.com"),
        );
        assert_eq!(
            settings.signed_zone_file_path("example.com"),
            PathBuf::from("/var/lib/bind/db.example.com.signed"),
        );
    }
}
