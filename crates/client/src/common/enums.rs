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

//! Enumerations mapping LakeStore wire concepts onto idiomatic variants.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// The kind of entry a directory listing row describes.
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum EntryType {
    /// A regular (append-only) file.
    File,
    /// A directory.
    Directory,
}

/// The marker on an append declaring whether metadata must be updated and
/// whether the lease should be released.
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum SyncFlag {
    /// Data appended, metadata *not* synced, lease retained.
    Data,
    /// Data appended, metadata synced, lease retained.
    Metadata,
    /// Data appended, metadata synced, lease released.
    Close,
}

/// How a file expiry instant passed to `SETEXPIRY` is interpreted.
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum ExpiryOption {
    /// Clear any expiry; the file never expires.
    NeverExpire,
    /// Expiry is `now + interval`, interval in milliseconds.
    RelativeToNow,
    /// Expiry is `creation time + interval`, interval in milliseconds.
    RelativeToCreationDate,
    /// Expiry is an absolute Unix-milliseconds instant.
    Absolute,
}

/// Behavior when the target of a file creation already exists.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString)]
pub enum IfExists {
    /// Overwrite the existing file.
    Overwrite,
    /// Fail if the file exists.
    Fail,
}

/// TLS channel implementation hint for the transport collaborator.
///
/// `Default` tries OpenSSL first and falls back to the JSE-equivalent provider.
/// The fallback does not alter the observable user agent.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString)]
pub enum SslChannelMode {
    /// Force the OpenSSL-backed channel.
    OpenSsl,
    /// Force the default JSE-equivalent channel.
    DefaultJse,
    /// Try OpenSSL and fall back.
    Default,
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
