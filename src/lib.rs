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

//! Zonesmith administers an authoritative BIND server's configuration
//! and lifecycle: zones, records, access-control lists, TSIG keys,
//! DNSSEC key material, global forwarder/security options, and zone
//! templates. It keeps an on-disk configuration tree, generated zone
//! files, and the running `named` daemon consistent with a persisted
//! set of JSON documents.
//!
//! Zonesmith is *not* a DNS server: it only manages the configuration
//! consumed by an external `named` daemon, which may run directly on
//! the host or inside a container. The [`ZoneManager`] service is the
//! entry point for every operation.

pub mod command;
pub mod manager;
pub mod model;
pub mod render;
pub mod serial;
pub mod settings;
pub mod store;
mod util;

pub use manager::{OpReport, ZoneManager};
pub use settings::Settings;
