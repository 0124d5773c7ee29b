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

//! Implements the date-coded SOA serial algorithm.
//!
//! Serials have the conventional `YYYYMMDDnn` form: the current UTC
//! date scaled by 100 plus a two-digit revision counter. The algorithm
//! guarantees that serials are strictly increasing across successive
//! mutations, and that the date prefix tracks the wall clock whenever
//! the stored serial's date is in the past.

use chrono::Utc;

/// Returns the current UTC date as a `YYYYMMDD` number.
pub fn today_number() -> u32 {
    Utc::now()
        .format("%Y%m%d")
        .to_string()
        .parse()
        .unwrap_or(0)
}

/// Returns the serial for a freshly created zone: today's date scaled
/// by 100, revision 1.
pub fn initial() -> u32 {
    today_number() * 100 + 1
}

/// Computes the successor of `current` against the current UTC date.
pub fn next(current: u32) -> u32 {
    next_for_date(current, today_number())
}

/// Computes the successor of `current` against the `YYYYMMDD` date
/// number `today`.
///
/// If the serial's embedded date is older than `today`, the serial
/// jumps to `today * 100 + 1`. If it is today's date, or a date in the
/// future (e.g. set by hand on the secondary side), the serial is
/// incremented by one. Either way the result is strictly greater than
/// `current`.
pub fn next_for_date(current: u32, today: u32) -> u32 {
    if current / 100 < today {
        today * 100 + 1
    } else {
        current + 1
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const TODAY: u32 = 20260830;

    #[test]
    fn past_date_jumps_to_today() {
        assert_eq!(next_for_date(2023010105, TODAY), 2026083001);
        assert_eq!(next_for_date(0, TODAY), 2026083001);
    }

    #[test]
    fn same_date_increments() {
        assert_eq!(next_for_date(2026083001, TODAY), 2026083002);
        assert_eq!(next_for_date(2026083099, TODAY), 2026083100);
    }

    #[test]
    fn future_date_increments() {
        // Operator-chosen future dates are not preserved; they are
        // simply incremented, which keeps the serial monotonic.
        assert_eq!(next_for_date(2030010100, TODAY), 2030010101);
    }

    #[test]
    fn successor_is_strictly_greater() {
        let mut serial = 2020010100;
        for _ in 0..200 {
            let next = next_for_date(serial, TODAY);
            assert!(next > serial);
            serial = next;
        }
    }
}
