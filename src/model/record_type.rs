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

//! Provides the [`RecordType`] enumeration for managed RR types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The RR types zonesmith knows how to render into zone files.
///
/// This is deliberately a closed enumeration rather than a raw `u16`
/// wrapper: the renderer and the import parser match on it
/// exhaustively, so adding a type is a compile-time-checked change.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
    Srv,
    Ptr,
    Caa,
    Soa,
    Tlsa,
    Sshfp,
    Https,
    Naptr,
}

impl FromStr for RecordType {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        // Match on the uppercased text: a tuple-struct pattern would
        // compare the inner string structurally, bypassing any
        // case-insensitive PartialEq.
        match text.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::Aaaa),
            "CNAME" => Ok(Self::Cname),
            "MX" => Ok(Self::Mx),
            "TXT" => Ok(Self::Txt),
            "NS" => Ok(Self::Ns),
            "SRV" => Ok(Self::Srv),
            "PTR" => Ok(Self::Ptr),
            "CAA" => Ok(Self::Caa),
            "SOA" => Ok(Self::Soa),
            "TLSA" => Ok(Self::Tlsa),
            "SSHFP" => Ok(Self::Sshfp),
            "HTTPS" => Ok(Self::Https),
            "NAPTR" => Ok(Self::Naptr),
            _ => Err("unknown record type"),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::A => f.write_str("A"),
            Self::Aaaa => f.write_str("AAAA"),
            Self::Cname => f.write_str("CNAME"),
            Self::Mx => f.write_str("MX"),
            Self::Txt => f.write_str("TXT"),
            Self::Ns => f.write_str("NS"),
            Self::Srv => f.write_str("SRV"),
            Self::Ptr => f.write_str("PTR"),
            Self::Caa => f.write_str("CAA"),
            Self::Soa => f.write_str("SOA"),
            Self::Tlsa => f.write_str("TLSA"),
            Self::Sshfp => f.write_str("SSHFP"),
            Self::Https => f.write_str("HTTPS"),
            Self::Naptr => f.write_str("NAPTR"),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!("aaaa".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert_eq!("Mx".parse::<RecordType>().unwrap(), RecordType::Mx);
        assert!("SPF".parse::<RecordType>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for rr_type in [RecordType::A, RecordType::Https, RecordType::Sshfp] {
            let displayed = rr_type.to_string();
            assert_eq!(displayed.parse::<RecordType>().unwrap(), rr_type);
        }
    }
}
