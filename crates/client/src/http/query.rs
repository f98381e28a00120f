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

//! Request parameter structures for the store REST surface.
//!
//! Each struct corresponds 1-to-1 with an operation and is annotated with
//! `serde` so it serializes directly into the query string. The engine adds
//! the `op=` and `api-version=` pair itself.

use derive_builder::Builder;
use serde::Serialize;

use crate::common::enums::{ExpiryOption, SyncFlag};

/// Parameters for `OPEN`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct OpenParams {
    /// Byte offset to start reading from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Maximum number of bytes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    /// Marks a speculative readahead request the server may reject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speculative: Option<bool>,
    /// `true` to bypass server-side read caching hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

/// Parameters for `CREATE`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct CreateParams {
    /// Overwrite an existing file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    /// Three-octal-digit permission for the new file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    /// Create missing parent directories; `false` makes creation non-recursive.
    #[serde(rename = "createParent", skip_serializing_if = "Option::is_none")]
    pub create_parent: Option<bool>,
    /// Lease id granting exclusive append access.
    #[serde(rename = "leaseid", skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    /// Session id for server-side stream coalescing; equal to the lease id.
    #[serde(rename = "sessionid", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Metadata/lease marker for the carried data, when any.
    #[serde(rename = "syncFlag", skip_serializing_if = "Option::is_none")]
    pub sync_flag: Option<SyncFlag>,
    /// Marks the request as a write operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,
}

/// Parameters for `APPEND`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct AppendParams {
    /// The explicit server-side offset this append must land at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Lease id granting exclusive append access.
    #[serde(rename = "leaseid", skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    /// Session id for server-side stream coalescing; equal to the lease id.
    #[serde(rename = "sessionid", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Metadata/lease marker for this append.
    #[serde(rename = "syncFlag", skip_serializing_if = "Option::is_none")]
    pub sync_flag: Option<SyncFlag>,
    /// Marks the request as an append operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,
}

/// Parameters for `MKDIRS`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct MkdirsParams {
    /// Three-octal-digit permission for the new directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

/// Parameters for `RENAME`.
#[derive(Clone, Debug, Serialize, Builder)]
#[builder(setter(into, strip_option))]
pub struct RenameParams {
    /// Absolute destination path.
    pub destination: String,
    /// Overwrite the destination if it is an existing file.
    #[serde(rename = "renameoptions", skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub rename_options: Option<String>,
}

/// Parameters for `DELETE`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct DeleteParams {
    /// Delete directory contents recursively.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
}

/// Parameters for `SETOWNER`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct SetOwnerParams {
    /// New owning user; unchanged when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// New owning group; unchanged when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Parameters for `SETPERMISSION`.
#[derive(Clone, Debug, Serialize, Builder)]
#[builder(setter(into))]
pub struct SetPermissionParams {
    /// Three-octal-digit permission string.
    pub permission: String,
}

/// Parameters for `SETTIMES`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct SetTimesParams {
    /// New modification time in Unix milliseconds; -1 leaves it unchanged.
    #[serde(rename = "modificationtime", skip_serializing_if = "Option::is_none")]
    pub modification_time: Option<i64>,
    /// New access time in Unix milliseconds; -1 leaves it unchanged.
    #[serde(rename = "accesstime", skip_serializing_if = "Option::is_none")]
    pub access_time: Option<i64>,
}

/// Parameters for `LISTSTATUS`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct ListStatusParams {
    /// Maximum entries per page.
    #[serde(rename = "listSize", skip_serializing_if = "Option::is_none")]
    pub list_size: Option<u32>,
    /// Exclusive cursor: the last entry name of the previous page.
    #[serde(rename = "startAfter", skip_serializing_if = "Option::is_none")]
    pub start_after: Option<String>,
}

/// Parameters for the ACL mutation operations.
#[derive(Clone, Debug, Serialize, Builder)]
#[builder(setter(into))]
pub struct AclSpecParams {
    /// Comma-joined canonical ACL entry strings.
    #[serde(rename = "aclspec")]
    pub acl_spec: String,
}

/// Parameters for `CHECKACCESS`.
#[derive(Clone, Debug, Serialize, Builder)]
#[builder(setter(into))]
pub struct CheckAccessParams {
    /// The rwx action to probe, e.g. `r-x`.
    #[serde(rename = "fsaction")]
    pub fs_action: String,
}

/// Parameters for `CONCAT`.
#[derive(Clone, Debug, Serialize, Builder)]
#[builder(setter(into))]
pub struct ConcatParams {
    /// Comma-joined absolute source paths.
    pub sources: String,
}

/// Parameters for `CONCURRENTAPPEND`.
#[derive(Clone, Debug, Default, Serialize, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct ConcurrentAppendParams {
    /// `autocreate` to create the file on first append.
    #[serde(rename = "appendMode", skip_serializing_if = "Option::is_none")]
    pub append_mode: Option<String>,
}

/// Parameters for `SETEXPIRY`.
#[derive(Clone, Debug, Serialize, Builder)]
#[builder(setter(into, strip_option))]
pub struct SetExpiryParams {
    /// How the expiry instant is interpreted.
    #[serde(rename = "expiryOption")]
    pub expiry_option: ExpiryOption,
    /// The expiry instant or interval in milliseconds; absent for `NeverExpire`.
    #[serde(rename = "expireTime", skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub expire_time: Option<u64>,
}

/// The empty parameter set for operations with no additional query values.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct NoParams {}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_open_params_serialize() {
        let params = OpenParamsBuilder::default()
            .offset(4_194_304u64)
            .length(4_194_304u64)
            .build()
            .unwrap();
        let query = serde_urlencoded::to_string(&params).unwrap();
        assert_eq!(query, "offset=4194304&length=4194304");
    }

    #[rstest]
    fn test_append_params_serialize() {
        let params = AppendParamsBuilder::default()
            .offset(0u64)
            .lease_id("9f1a4d1e-0000-4000-8000-1234567890ab")
            .session_id("9f1a4d1e-0000-4000-8000-1234567890ab")
            .sync_flag(SyncFlag::Data)
            .append(true)
            .build()
            .unwrap();
        let query = serde_urlencoded::to_string(&params).unwrap();
        assert!(query.starts_with("offset=0&leaseid="));
        assert!(query.contains("syncFlag=DATA"));
        assert!(query.ends_with("append=true"));
    }

    #[rstest]
    fn test_optional_fields_omitted() {
        let query = serde_urlencoded::to_string(OpenParams::default()).unwrap();
        assert!(query.is_empty());

        let query = serde_urlencoded::to_string(
            ListStatusParamsBuilder::default()
                .list_size(4000u32)
                .build()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(query, "listSize=4000");
    }

    #[rstest]
    fn test_set_expiry_params_serialize() {
        let params = SetExpiryParamsBuilder::default()
            .expiry_option(ExpiryOption::RelativeToNow)
            .expire_time(60_000u64)
            .build()
            .unwrap();
        let query = serde_urlencoded::to_string(&params).unwrap();
        assert_eq!(query, "expiryOption=RelativeToNow&expireTime=60000");
    }

    #[rstest]
    fn test_acl_spec_params_serialize() {
        let params = AclSpecParamsBuilder::default()
            .acl_spec("user:alice:rw-,other::---")
            .build()
            .unwrap();
        let query = serde_urlencoded::to_string(&params).unwrap();
        assert_eq!(query, "aclspec=user%3Aalice%3Arw-%2Cother%3A%3A---");
    }
}
