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

//! The independently persisted collections: named ACLs, TSIG keys,
//! global forwarders, global security options, and zone templates.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Record;

/// A named, reusable address-match list.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Acl {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub entries: Vec<String>,
}

/// The HMAC algorithms BIND accepts for TSIG keys.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TsigAlgorithm {
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    #[serde(rename = "hmac-sha384")]
    HmacSha384,
    #[serde(rename = "hmac-sha512")]
    HmacSha512,
}

impl TsigAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha384 => "hmac-sha384",
            Self::HmacSha512 => "hmac-sha512",
        }
    }
}

impl fmt::Display for TsigAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TsigAlgorithm {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_lowercase().as_str() {
            "hmac-sha256" => Ok(Self::HmacSha256),
            "hmac-sha384" => Ok(Self::HmacSha384),
            "hmac-sha512" => Ok(Self::HmacSha512),
            _ => Err("unsupported TSIG algorithm"),
        }
    }
}

/// A transaction-signing key authenticating zone transfers and dynamic
/// updates.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TsigKey {
    pub id: String,
    pub name: String,
    pub algorithm: TsigAlgorithm,
    pub secret: String,
}

impl TsigKey {
    /// Generates a fresh 256-bit secret, base64-encoded.
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        BASE64.encode(bytes)
    }

    /// Returns a copy with the secret masked for display.
    pub fn masked(&self) -> Self {
        Self {
            secret: String::from("********"),
            ..self.clone()
        }
    }
}

/// The global forwarder configuration rendered into the forwarders
/// fragment.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ForwarderConfig {
    #[serde(default)]
    pub forwarders: Vec<String>,
    #[serde(default)]
    pub forward_only: bool,
}

/// Response-rate-limiting parameters for the global options fragment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RateLimit {
    pub responses_per_second: u32,
    pub window: u32,
}

/// The global security options rendered into `named.conf.options`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub recursion: bool,
    #[serde(default)]
    pub allow_recursion: Vec<String>,
    #[serde(default = "default_allow_query")]
    pub allow_query: Vec<String>,
    #[serde(default = "default_minimal_responses")]
    pub minimal_responses: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edns_udp_size: Option<u16>,
    /// Nameserver names seeded as NS records into new forward master
    /// zones.
    #[serde(default)]
    pub default_name_servers: Vec<String>,
}

fn default_allow_query() -> Vec<String> {
    vec![String::from("any")]
}

fn default_minimal_responses() -> bool {
    true
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            recursion: false,
            allow_recursion: Vec::new(),
            allow_query: default_allow_query(),
            minimal_responses: default_minimal_responses(),
            rate_limit: None,
            edns_udp_size: None,
            default_name_servers: Vec::new(),
        }
    }
}

/// A named bundle of records applied to a zone after remapping the
/// template's implicit domain onto the target zone's name.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ZoneTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub records: Vec<Record>,
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_decode_to_32_bytes() {
        let secret = TsigKey::generate_secret();
        let decoded = BASE64.decode(secret).unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn tsig_algorithm_parsing_is_case_insensitive() {
        assert_eq!(
            "HMAC-SHA256".parse::<TsigAlgorithm>().unwrap(),
            TsigAlgorithm::HmacSha256,
        );
        assert_eq!(
            "Hmac-Sha512".parse::<TsigAlgorithm>().unwrap(),
            TsigAlgorithm::HmacSha512,
        );
        assert!("hmac-md5".parse::<TsigAlgorithm>().is_err());
    }

    #[test]
    fn masked_key_hides_the_secret() {
        let key = TsigKey {
            id: String::from("k1"),
            name: String::from("transfer-key"),
            algorithm: TsigAlgorithm::HmacSha256,
            secret: TsigKey::generate_secret(),
        };
        let masked = key.masked();
        assert_eq!(masked.secret, "********");
        assert_eq!(masked.name, key.name);
    }
}
