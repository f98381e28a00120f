// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Conversions between server wire timestamps (Unix milliseconds) and [`chrono`] types.
//!
//! The store reports all times with millisecond resolution, so round trips through
//! these helpers are lossless for server-produced values.

use chrono::{DateTime, TimeZone, Utc};

/// Converts a Unix-milliseconds wire timestamp into a UTC datetime.
///
/// Returns `None` when `millis` lies outside the range representable by [`DateTime<Utc>`].
#[must_use]
pub fn unix_millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Converts a UTC datetime into a Unix-milliseconds wire timestamp.
#[must_use]
pub fn datetime_to_unix_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
