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

//! The per-operation registry: HTTP method, body behavior and URL namespace
//! for every REST operation the client issues.

use std::time::Duration;

use reqwest::Method;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::common::consts::{NAMESPACE_EXTENSION, NAMESPACE_WEBHDFS};

/// The URL namespace an operation is routed through.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// The standard WebHDFS-compatible namespace (`/webhdfs/v1`).
    WebHdfs,
    /// The vendor extension namespace (`/WebHdfsExt`).
    Extension,
}

impl Namespace {
    /// Returns the URL prefix for this namespace.
    #[must_use]
    pub const fn url_prefix(self) -> &'static str {
        match self {
            Self::WebHdfs => NAMESPACE_WEBHDFS,
            Self::Extension => NAMESPACE_EXTENSION,
        }
    }
}

/// A REST operation understood by the store.
///
/// The `op=` query value is the uppercased variant name.
#[derive(
    Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Operation {
    /// Read file bytes; the response body is handed to the caller as a stream.
    Open,
    /// Fetch the status record of a single path.
    GetFileStatus,
    /// Enumerate one page of a directory.
    ListStatus,
    /// Aggregate directory statistics server-side.
    GetContentSummary,
    /// Fetch the checksum of a file.
    GetFileChecksum,
    /// Fetch the ACL status of a path.
    GetAclStatus,
    /// Probe whether the caller holds the given fs-action on a path.
    CheckAccess,
    /// Create a file, optionally carrying the first data chunk.
    Create,
    /// Create a directory tree.
    Mkdirs,
    /// Rename a file or directory.
    Rename,
    /// Set the owner and/or group of a path.
    SetOwner,
    /// Set the octal permission of a path.
    SetPermission,
    /// Set access/modification times of a path.
    SetTimes,
    /// Add or update ACL entries.
    ModifyAclEntries,
    /// Remove specific ACL entries.
    RemoveAclEntries,
    /// Remove all default-scope ACL entries.
    RemoveDefaultAcl,
    /// Remove the entire ACL.
    RemoveAcl,
    /// Replace the entire ACL.
    SetAcl,
    /// Append bytes at an explicit server-side offset.
    Append,
    /// Concatenate source files into the target (query-string source list).
    Concat,
    /// Concatenate source files into the target (JSON source list).
    MsConcat,
    /// Delete a file or directory.
    Delete,
    /// Serverless-offset append with optional auto-create (extension).
    ConcurrentAppend,
    /// Set or clear the expiry instant of a file (extension).
    SetExpiry,
    /// Fetch extended file information (extension).
    GetFileInfo,
}

impl Operation {
    /// Returns the HTTP method this operation uses.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Open
            | Self::GetFileStatus
            | Self::ListStatus
            | Self::GetContentSummary
            | Self::GetFileChecksum
            | Self::GetAclStatus
            | Self::CheckAccess
            | Self::GetFileInfo => Method::GET,
            Self::Create
            | Self::Mkdirs
            | Self::Rename
            | Self::SetOwner
            | Self::SetPermission
            | Self::SetTimes
            | Self::ModifyAclEntries
            | Self::RemoveAclEntries
            | Self::RemoveDefaultAcl
            | Self::RemoveAcl
            | Self::SetAcl
            | Self::SetExpiry => Method::PUT,
            Self::Append | Self::Concat | Self::MsConcat | Self::ConcurrentAppend => Method::POST,
            Self::Delete => Method::DELETE,
        }
    }

    /// Returns the URL namespace this operation is routed through.
    #[must_use]
    pub const fn namespace(self) -> Namespace {
        match self {
            Self::ConcurrentAppend | Self::SetExpiry | Self::GetFileInfo => Namespace::Extension,
            _ => Namespace::WebHdfs,
        }
    }

    /// Returns `true` when the operation may ship a request body.
    #[must_use]
    pub const fn sends_body(self) -> bool {
        matches!(
            self,
            Self::Create | Self::Append | Self::MsConcat | Self::ConcurrentAppend
        )
    }

    /// Returns `true` when a successful response carries a JSON body to parse.
    #[must_use]
    pub const fn returns_body(self) -> bool {
        matches!(
            self,
            Self::GetFileStatus
                | Self::ListStatus
                | Self::GetContentSummary
                | Self::GetFileChecksum
                | Self::GetAclStatus
                | Self::Mkdirs
                | Self::Rename
                | Self::Delete
        )
    }

    /// Returns `true` when a successful response body is handed to the caller
    /// as an unbuffered stream.
    #[must_use]
    pub const fn returns_stream(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the per-attempt timeout for this operation given the client default.
    ///
    /// Enumeration runs at twice the default; everything else uses it directly.
    /// Concatenation timeouts additionally scale with the source count and are
    /// computed at the call site.
    #[must_use]
    pub fn timeout(self, default: Duration) -> Duration {
        match self {
            Self::ListStatus => default * 2,
            _ => default,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
