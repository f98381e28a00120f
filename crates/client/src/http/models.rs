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

//! Data transfer objects for deserializing store JSON payloads, plus the
//! immutable domain records parsed from them.

use chrono::{DateTime, Utc};
use lakestore_core::datetime::unix_millis_to_datetime;
use serde::{Deserialize, Serialize};

use crate::common::{
    acl::{AclEntry, AclParseError},
    consts::REPORTED_BLOCK_SIZE,
    enums::EntryType,
};

/// One row of a `FileStatus` JSON record as sent by the store.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    /// File length in bytes; 0 for directories.
    #[serde(default)]
    pub length: u64,
    /// Entry name relative to the listed directory; empty for the path itself.
    #[serde(default)]
    pub path_suffix: String,
    /// FILE or DIRECTORY.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Informational block size.
    #[serde(default)]
    pub block_size: u64,
    /// Last access time in Unix milliseconds.
    #[serde(default)]
    pub access_time: i64,
    /// Last modification time in Unix milliseconds.
    #[serde(default)]
    pub modification_time: i64,
    /// Informational replication factor.
    #[serde(default)]
    pub replication: u32,
    /// Three-octal-digit permission string.
    #[serde(default)]
    pub permission: String,
    /// Owning user.
    #[serde(default)]
    pub owner: String,
    /// Owning group.
    #[serde(default)]
    pub group: String,
    /// Whether the entry carries a non-trivial ACL; missing means false.
    #[serde(default)]
    pub acl_bit: bool,
    /// Expiry instant in Unix milliseconds; 0 or missing means none.
    #[serde(rename = "msExpirationTime")]
    pub ms_expiration_time: Option<i64>,
    /// Expiry instant under the older wire name.
    #[serde(rename = "expireTime")]
    pub expire_time: Option<i64>,
    /// Opaque per-entry attribute markers, preserved verbatim.
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// Envelope for `GETFILESTATUS`.
#[derive(Clone, Debug, Deserialize)]
pub struct FileStatusResponse {
    /// The wrapped status record.
    #[serde(rename = "FileStatus")]
    pub file_status: FileStatus,
}

/// Inner list wrapper for `LISTSTATUS`.
#[derive(Clone, Debug, Deserialize)]
pub struct FileStatusList {
    /// The page of status rows.
    #[serde(rename = "FileStatus")]
    pub file_status: Vec<FileStatus>,
    /// Continuation token on newer API versions; unused by the client pager.
    #[serde(rename = "continuationToken", default)]
    pub continuation_token: Option<String>,
}

/// Envelope for `LISTSTATUS`.
#[derive(Clone, Debug, Deserialize)]
pub struct FileStatusesResponse {
    /// The wrapped list.
    #[serde(rename = "FileStatuses")]
    pub file_statuses: FileStatusList,
}

/// Envelope for boolean-valued operations (`MKDIRS`, `RENAME`, `DELETE`).
#[derive(Clone, Debug, Deserialize)]
pub struct BooleanResponse {
    /// The operation outcome.
    pub boolean: bool,
}

/// Wire shape of `GETCONTENTSUMMARY`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummaryWire {
    /// Number of directories under the path, including itself.
    pub directory_count: u64,
    /// Number of files under the path.
    pub file_count: u64,
    /// Total bytes of all files under the path.
    pub length: u64,
    /// Storage consumed; equals `length` for this store.
    pub space_consumed: u64,
}

/// Envelope for `GETCONTENTSUMMARY`.
#[derive(Clone, Debug, Deserialize)]
pub struct ContentSummaryResponse {
    /// The wrapped summary.
    #[serde(rename = "ContentSummary")]
    pub content_summary: ContentSummaryWire,
}

/// Aggregated statistics for a directory tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentSummary {
    /// Total bytes of all files under the path.
    pub length: u64,
    /// Number of files under the path.
    pub file_count: u64,
    /// Number of directories under the path, including itself.
    pub directory_count: u64,
    /// Storage consumed; equals `length` for this store.
    pub space_consumed: u64,
}

impl From<ContentSummaryWire> for ContentSummary {
    fn from(wire: ContentSummaryWire) -> Self {
        Self {
            length: wire.length,
            file_count: wire.file_count,
            directory_count: wire.directory_count,
            space_consumed: wire.space_consumed,
        }
    }
}

/// Wire shape of `GETFILECHECKSUM`.
#[derive(Clone, Debug, Deserialize)]
pub struct FileChecksum {
    /// Checksum algorithm name.
    pub algorithm: String,
    /// Hex-encoded checksum bytes.
    pub bytes: String,
    /// Length of the checksum in bytes.
    pub length: u64,
}

/// Envelope for `GETFILECHECKSUM`.
#[derive(Clone, Debug, Deserialize)]
pub struct FileChecksumResponse {
    /// The wrapped checksum.
    #[serde(rename = "FileChecksum")]
    pub file_checksum: FileChecksum,
}

/// Wire shape of `GETACLSTATUS`; entries travel as POSIX strings.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclStatusWire {
    /// ACL entries in canonical string form.
    #[serde(default)]
    pub entries: Vec<String>,
    /// Owning user.
    pub owner: String,
    /// Owning group.
    pub group: String,
    /// Three-octal-digit permission string.
    pub permission: String,
    /// Whether the sticky bit is set.
    #[serde(default)]
    pub sticky_bit: bool,
}

/// Envelope for `GETACLSTATUS`.
#[derive(Clone, Debug, Deserialize)]
pub struct AclStatusResponse {
    /// The wrapped ACL status.
    #[serde(rename = "AclStatus")]
    pub acl_status: AclStatusWire,
}

/// Parsed ACL status of a path.
#[derive(Clone, Debug)]
pub struct AclStatus {
    /// Parsed ACL entries.
    pub entries: Vec<AclEntry>,
    /// Owning user.
    pub owner: String,
    /// Owning group.
    pub group: String,
    /// Three-octal-digit permission string.
    pub octal_permission: String,
    /// Whether the sticky bit is set.
    pub sticky_bit: bool,
}

impl TryFrom<AclStatusWire> for AclStatus {
    type Error = AclParseError;

    fn try_from(wire: AclStatusWire) -> Result<Self, Self::Error> {
        let entries = wire
            .entries
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<AclEntry>, _>>()?;
        Ok(Self {
            entries,
            owner: wire.owner,
            group: wire.group,
            octal_permission: wire.permission,
            sticky_bit: wire.sticky_bit,
        })
    }
}

/// JSON body for `MSCONCAT`.
#[derive(Clone, Debug, Serialize)]
pub struct ConcatSources {
    /// Absolute source paths, in concatenation order.
    pub sources: Vec<String>,
}

/// An immutable directory entry parsed from a server `FileStatus`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (final path segment).
    pub name: String,
    /// Absolute path of the entry.
    pub full_path: String,
    /// Length in bytes; 0 for directories.
    pub length: u64,
    /// File or directory.
    pub entry_type: EntryType,
    /// Owning user.
    pub owner: String,
    /// Owning group.
    pub group: String,
    /// Last access time; `None` when the server sent no usable instant.
    pub last_access_time: Option<DateTime<Utc>>,
    /// Last modification time; `None` when the server sent no usable instant.
    pub last_modified_time: Option<DateTime<Utc>>,
    /// Three-octal-digit permission string.
    pub permission: String,
    /// Informational block size; 256 MiB for files, 0 for directories.
    pub block_size: u64,
    /// Informational replication factor; 1 for files, 0 for directories.
    pub replication_factor: u32,
    /// Whether the entry carries a non-trivial ACL.
    pub acl_bit: bool,
    /// Expiry instant; always `None` for directories.
    pub expiry_time: Option<DateTime<Utc>>,
    /// Opaque per-entry attribute markers, preserved verbatim.
    pub attributes: Vec<String>,
}

impl DirectoryEntry {
    /// Builds an entry from a wire record listed under `parent_path`.
    ///
    /// When the suffix is empty (a `GETFILESTATUS` on the path itself) the
    /// full path is the parent path and the name is its final segment.
    #[must_use]
    pub fn from_wire(status: FileStatus, parent_path: &str) -> Self {
        let (name, full_path) = if status.path_suffix.is_empty() {
            let name = parent_path
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            (name, parent_path.to_string())
        } else if parent_path == "/" {
            (
                status.path_suffix.clone(),
                format!("/{}", status.path_suffix),
            )
        } else {
            (
                status.path_suffix.clone(),
                format!("{parent_path}/{}", status.path_suffix),
            )
        };

        let is_file = status.entry_type == EntryType::File;
        let expiry_millis = status
            .ms_expiration_time
            .or(status.expire_time)
            .filter(|millis| is_file && *millis > 0);

        Self {
            name,
            full_path,
            length: status.length,
            entry_type: status.entry_type,
            owner: status.owner,
            group: status.group,
            last_access_time: unix_millis_to_datetime(status.access_time),
            last_modified_time: unix_millis_to_datetime(status.modification_time),
            permission: status.permission,
            block_size: if is_file { REPORTED_BLOCK_SIZE } else { 0 },
            replication_factor: u32::from(is_file),
            acl_bit: status.acl_bit,
            expiry_time: expiry_millis.and_then(unix_millis_to_datetime),
            attributes: status.attributes,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const FILE_STATUS_JSON: &str = r#"{
        "length": 1024,
        "pathSuffix": "Test01",
        "type": "FILE",
        "blockSize": 268435456,
        "accessTime": 1577836800000,
        "modificationTime": 1577836801000,
        "replication": 1,
        "permission": "640",
        "owner": "owner-guid",
        "group": "group-guid",
        "aclBit": true,
        "msExpirationTime": 1600000000000,
        "attributes": ["Share", "PartOfShare"]
    }"#;

    #[rstest]
    fn test_file_status_parses() {
        let status: FileStatus = serde_json::from_str(FILE_STATUS_JSON).unwrap();
        assert_eq!(status.length, 1024);
        assert_eq!(status.entry_type, EntryType::File);
        assert!(status.acl_bit);
        assert_eq!(status.attributes, vec!["Share", "PartOfShare"]);
    }

    #[rstest]
    fn test_acl_bit_defaults_false() {
        let json = r#"{"length":0,"pathSuffix":"d","type":"DIRECTORY",
            "blockSize":0,"accessTime":0,"modificationTime":0,"replication":0,
            "permission":"770","owner":"o","group":"g"}"#;
        let status: FileStatus = serde_json::from_str(json).unwrap();
        assert!(!status.acl_bit);
        assert_eq!(status.entry_type, EntryType::Directory);
    }

    #[rstest]
    fn test_directory_entry_from_listing_row() {
        let status: FileStatus = serde_json::from_str(FILE_STATUS_JSON).unwrap();
        let entry = DirectoryEntry::from_wire(status, "/TestShare");
        assert_eq!(entry.name, "Test01");
        assert_eq!(entry.full_path, "/TestShare/Test01");
        assert_eq!(entry.block_size, REPORTED_BLOCK_SIZE);
        assert_eq!(entry.replication_factor, 1);
        assert!(entry.expiry_time.is_some());
        assert_eq!(
            entry.last_modified_time.unwrap().timestamp_millis(),
            1_577_836_801_000
        );
    }

    #[rstest]
    fn test_directory_entry_for_self_status() {
        let json = r#"{"length":0,"pathSuffix":"","type":"DIRECTORY",
            "blockSize":0,"accessTime":10,"modificationTime":20,"replication":0,
            "permission":"770","owner":"o","group":"g","msExpirationTime":1600000000000}"#;
        let status: FileStatus = serde_json::from_str(json).unwrap();
        let entry = DirectoryEntry::from_wire(status, "/data/reports");
        assert_eq!(entry.name, "reports");
        assert_eq!(entry.full_path, "/data/reports");
        assert_eq!(entry.block_size, 0);
        assert_eq!(entry.replication_factor, 0);
        // Directories never expire.
        assert!(entry.expiry_time.is_none());
    }

    #[rstest]
    fn test_list_status_envelope() {
        let json = r#"{"FileStatuses":{"FileStatus":[
            {"length":0,"pathSuffix":"a","type":"DIRECTORY","blockSize":0,
             "accessTime":0,"modificationTime":0,"replication":0,
             "permission":"770","owner":"o","group":"g"}
        ]}}"#;
        let response: FileStatusesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.file_statuses.file_status.len(), 1);
        assert!(response.file_statuses.continuation_token.is_none());
    }

    #[rstest]
    fn test_content_summary_envelope() {
        let json = r#"{"ContentSummary":{"directoryCount":3,"fileCount":7,
            "length":4096,"spaceConsumed":4096}}"#;
        let response: ContentSummaryResponse = serde_json::from_str(json).unwrap();
        let summary = ContentSummary::from(response.content_summary);
        assert_eq!(summary.directory_count, 3);
        assert_eq!(summary.space_consumed, summary.length);
    }

    #[rstest]
    fn test_acl_status_parses_entries() {
        let json = r#"{"AclStatus":{"entries":
            ["user:alice:rw-","default:group:eng:r-x"],
            "owner":"o","group":"g","permission":"755","stickyBit":false}}"#;
        let response: AclStatusResponse = serde_json::from_str(json).unwrap();
        let acl = AclStatus::try_from(response.acl_status).unwrap();
        assert_eq!(acl.entries.len(), 2);
        assert_eq!(acl.entries[1].to_string(), "default:group:eng:r-x");
    }

    #[rstest]
    fn test_boolean_envelope() {
        let response: BooleanResponse = serde_json::from_str(r#"{"boolean":true}"#).unwrap();
        assert!(response.boolean);
    }
}
