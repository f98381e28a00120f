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

//! The client facade: a thin, strongly-typed surface over the request engine,
//! binding streams, ACL helpers, enumeration and the content summarizer to
//! one store account and one token provider.

use std::{
    fmt::Debug,
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use lakestore_core::datetime::datetime_to_unix_millis;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::TokenProvider,
    common::{
        acl::{AclEntry, check_octal_permission},
        consts::{FILE_ALREADY_EXISTS_EXCEPTION, LIST_PAGE_SIZE},
        enums::{EntryType, ExpiryOption, IfExists},
        path::check_path,
    },
    config::ClientOptions,
    http::{
        client::{RequestBody, RequestEngine},
        error::{LakeError, OperationFailure},
        latency::LatencyLedger,
        models::{
            AclStatus, AclStatusResponse, BooleanResponse, ConcatSources, ContentSummary,
            ContentSummaryResponse, DirectoryEntry, FileChecksum, FileChecksumResponse,
            FileStatusResponse, FileStatusesResponse,
        },
        operation::Operation,
        query::{
            AclSpecParamsBuilder, CheckAccessParamsBuilder, ConcatParamsBuilder,
            ConcurrentAppendParamsBuilder, CreateParamsBuilder, DeleteParamsBuilder,
            ListStatusParamsBuilder, MkdirsParamsBuilder, NoParams, RenameParamsBuilder,
            SetExpiryParamsBuilder, SetOwnerParamsBuilder, SetPermissionParamsBuilder,
            SetTimesParamsBuilder,
        },
        response::OperationResponse,
        retry::{ExponentialBackoffPolicy, NoRetryPolicy, NonIdempotentRetryPolicy, RetryPolicy},
    },
    io::{FileInputStream, FileOutputStream, Prefetcher},
    summary::ContentSummarizer,
};

/// Remote exception name for a missing path.
const FILE_NOT_FOUND_EXCEPTION: &str = "FileNotFoundException";

/// Additional per-source timeout allowance for concatenation.
const CONCAT_PER_SOURCE_TIMEOUT: Duration = Duration::from_millis(500);

/// The retry posture selected for one operation.
#[derive(Copy, Clone, Debug)]
enum Retry {
    /// At most once, plus the single 401 retry.
    None,
    /// Exponential backoff with the client's configured parameters.
    Idempotent,
    /// 401 once and 429 backoff only.
    NonIdempotent,
}

/// A client for one store account.
///
/// Cheap to clone; clones share the HTTP connection pool, options, latency
/// ledger and prefetch pool.
#[derive(Clone)]
pub struct LakeClient {
    engine: RequestEngine,
    options: Arc<ArcSwap<ClientOptions>>,
    prefetcher: Arc<Prefetcher>,
    prefetch_disabled: Arc<AtomicBool>,
}

impl Debug for LakeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(LakeClient))
            .field("account_fqdn", &self.engine.account_fqdn())
            .finish_non_exhaustive()
    }
}

impl LakeClient {
    /// Creates a client for `account_fqdn` with default options.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP transport cannot be constructed.
    pub fn new(
        account_fqdn: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, LakeError> {
        Self::with_options(account_fqdn, token_provider, ClientOptions::default())
    }

    /// Creates a client with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP transport cannot be constructed.
    pub fn with_options(
        account_fqdn: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
        options: ClientOptions,
    ) -> Result<Self, LakeError> {
        let options = Arc::new(ArcSwap::from_pointee(options));
        let ledger = Arc::new(LatencyLedger::default());
        let engine = RequestEngine::new(
            account_fqdn,
            token_provider,
            Arc::clone(&options),
            ledger,
        )?;
        Ok(Self {
            engine,
            options,
            prefetcher: Arc::clone(Prefetcher::global()),
            prefetch_disabled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replaces the shared prefetch pool (e.g. with a test-sized one).
    #[must_use]
    pub fn with_prefetcher(mut self, prefetcher: Arc<Prefetcher>) -> Self {
        self.prefetcher = prefetcher;
        self
    }

    /// Returns the current options snapshot. Reads are lock-free.
    #[must_use]
    pub fn options(&self) -> Arc<ClientOptions> {
        self.options.load_full()
    }

    /// Replaces the client options atomically.
    ///
    /// # Errors
    ///
    /// Returns an error when the options carry an invalid path prefix.
    pub fn set_options(&self, options: ClientOptions) -> Result<(), LakeError> {
        if let Some(prefix) = &options.file_path_prefix {
            crate::common::path::check_path_prefix(prefix)?;
        }
        self.options.store(Arc::new(options));
        Ok(())
    }

    /// Permanently disables latency telemetry for this client.
    pub fn disable_telemetry(&self) {
        self.engine.ledger().disable();
    }

    // ========================================================================
    // Streams
    // ========================================================================

    /// Opens a file for buffered reading.
    ///
    /// The returned stream snapshots the file length at open time.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the status fetch fails.
    pub fn open(&self, path: &str) -> Result<FileInputStream, LakeError> {
        let entry = self.get_directory_entry(path)?;
        if entry.entry_type != EntryType::File {
            return Err(LakeError::InvalidInput(format!(
                "cannot open directory '{path}' for reading"
            )));
        }
        Ok(FileInputStream::new(
            self.engine.clone(),
            path.to_string(),
            entry.length,
            Arc::clone(&self.prefetcher),
            Arc::clone(&self.prefetch_disabled),
            self.prefetcher.config().block_size,
        ))
    }

    /// Creates a file and returns a stream appending to it from offset zero.
    ///
    /// With [`IfExists::Overwrite`] a concurrent create racing this one is
    /// tolerated: an HTTP 403 naming `FileAlreadyExistsException` counts as
    /// success.
    ///
    /// # Errors
    ///
    /// Returns an error when the path or permission string is invalid, or the
    /// create fails.
    pub fn create_file(
        &self,
        path: &str,
        if_exists: IfExists,
    ) -> Result<FileOutputStream, LakeError> {
        self.create_file_with(path, if_exists, None, true)
    }

    /// Creates a file with an explicit permission string and parent policy.
    ///
    /// `create_parent = false` makes the creation non-recursive: it fails
    /// when the parent directory does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the path or permission string is invalid, or the
    /// create fails.
    pub fn create_file_with(
        &self,
        path: &str,
        if_exists: IfExists,
        octal_permission: Option<&str>,
        create_parent: bool,
    ) -> Result<FileOutputStream, LakeError> {
        check_path(path)?;
        if let Some(permission) = octal_permission {
            check_octal_permission(permission)
                .map_err(|e| LakeError::InvalidInput(e.to_string()))?;
        }

        let overwrite = if_exists == IfExists::Overwrite;
        let lease_id = Uuid::new_v4().to_string();
        let mut builder = CreateParamsBuilder::default();
        builder
            .overwrite(overwrite)
            .create_parent(create_parent)
            .lease_id(lease_id.clone())
            .session_id(lease_id.clone())
            .write(true);
        if let Some(permission) = octal_permission {
            builder.permission(permission);
        }
        let params = builder.build().expect("create params are infallible");

        // Overwriting creates are idempotent; exclusive creates are not.
        let retry = if overwrite {
            Retry::Idempotent
        } else {
            Retry::None
        };
        let response = self.execute(
            Operation::Create,
            path,
            &params,
            RequestBody::Data(&[]),
            retry,
            None,
        )?;

        let racy_overwrite = overwrite
            && response.http_status == 403
            && response
                .remote_exception
                .as_ref()
                .is_some_and(|remote| remote.exception.contains(FILE_ALREADY_EXISTS_EXCEPTION));
        if !response.successful && !racy_overwrite {
            return Err(self.failure(Operation::Create, path, response));
        }

        Ok(FileOutputStream::new_create(
            self.engine.clone(),
            path.to_string(),
            lease_id,
        ))
    }

    /// Opens an existing file for appending at its current end.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the probe append fails.
    pub fn append_existing_file(&self, path: &str) -> Result<FileOutputStream, LakeError> {
        check_path(path)?;
        FileOutputStream::new_append(self.engine.clone(), path.to_string())
    }

    /// Appends `data` to `path` in one shot, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns an error when any append fails.
    pub fn append(&self, path: &str, data: &[u8]) -> Result<(), LakeError> {
        let mut stream = if self.check_exists(path)? {
            self.append_existing_file(path)?
        } else {
            self.create_file(path, IfExists::Fail)?
        };
        stream.write(data)?;
        stream.close()
    }

    // ========================================================================
    // Metadata operations
    // ========================================================================

    /// Fetches the directory entry of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn get_directory_entry(&self, path: &str) -> Result<DirectoryEntry, LakeError> {
        check_path(path)?;
        let response = self.execute_ok(
            Operation::GetFileStatus,
            path,
            &NoParams::default(),
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        let parsed: FileStatusResponse = self.parse_body(&response, Operation::GetFileStatus)?;
        Ok(DirectoryEntry::from_wire(parsed.file_status, path))
    }

    /// Returns `true` when `path` exists.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than a missing path.
    pub fn check_exists(&self, path: &str) -> Result<bool, LakeError> {
        check_path(path)?;
        let response = self.execute(
            Operation::GetFileStatus,
            path,
            &NoParams::default(),
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        if response.successful {
            return Ok(true);
        }
        if response.http_status == 404 || response.remote_exception_is(FILE_NOT_FOUND_EXCEPTION) {
            return Ok(false);
        }
        Err(self.failure(Operation::GetFileStatus, path, response))
    }

    /// Enumerates all entries of the directory at `path`.
    ///
    /// Enumeration is client-paged: pages of 4000 entries are requested with
    /// the last seen name as the `startAfter` cursor until a short or empty
    /// page arrives.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or any page fetch fails.
    pub fn enumerate_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>, LakeError> {
        self.enumerate_directory_limited(path, usize::MAX)
    }

    /// Enumerates at most `max_entries` entries of the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or any page fetch fails.
    pub fn enumerate_directory_limited(
        &self,
        path: &str,
        max_entries: usize,
    ) -> Result<Vec<DirectoryEntry>, LakeError> {
        check_path(path)?;
        let mut entries: Vec<DirectoryEntry> = Vec::new();
        let mut start_after: Option<String> = None;

        while entries.len() < max_entries {
            let page_size = LIST_PAGE_SIZE.min((max_entries - entries.len()).min(u32::MAX as usize) as u32);
            let mut builder = ListStatusParamsBuilder::default();
            builder.list_size(page_size);
            if let Some(cursor) = &start_after {
                builder.start_after(cursor.clone());
            }
            let params = builder.build().expect("list params are infallible");

            let response = self.execute_ok(
                Operation::ListStatus,
                path,
                &params,
                RequestBody::None,
                Retry::Idempotent,
                None,
            )?;
            let page: FileStatusesResponse = self.parse_body(&response, Operation::ListStatus)?;
            let statuses = page.file_statuses.file_status;
            let page_len = statuses.len();
            if page_len == 0 {
                break;
            }
            start_after = statuses.last().map(|status| status.path_suffix.clone());
            entries.extend(
                statuses
                    .into_iter()
                    .map(|status| DirectoryEntry::from_wire(status, path)),
            );
            if page_len < page_size as usize {
                break;
            }
        }

        entries.truncate(max_entries);
        Ok(entries)
    }

    /// Creates the directory at `path`, including missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error when the path or permission is invalid, or the
    /// operation fails.
    pub fn create_directory(
        &self,
        path: &str,
        octal_permission: Option<&str>,
    ) -> Result<bool, LakeError> {
        check_path(path)?;
        let mut builder = MkdirsParamsBuilder::default();
        if let Some(permission) = octal_permission {
            check_octal_permission(permission)
                .map_err(|e| LakeError::InvalidInput(e.to_string()))?;
            builder.permission(permission);
        }
        let params = builder.build().expect("mkdirs params are infallible");
        let response = self.execute_ok(
            Operation::Mkdirs,
            path,
            &params,
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        let parsed: BooleanResponse = self.parse_body(&response, Operation::Mkdirs)?;
        Ok(parsed.boolean)
    }

    /// Deletes the file or empty directory at `path`.
    ///
    /// Deleting the root is rejected client-side.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn delete(&self, path: &str) -> Result<bool, LakeError> {
        self.delete_impl(path, false)
    }

    /// Deletes the directory tree at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn delete_recursive(&self, path: &str) -> Result<bool, LakeError> {
        self.delete_impl(path, true)
    }

    fn delete_impl(&self, path: &str, recursive: bool) -> Result<bool, LakeError> {
        check_path(path)?;
        if path == "/" {
            return Err(LakeError::InvalidInput(
                "deleting the store root is not allowed".to_string(),
            ));
        }
        let params = DeleteParamsBuilder::default()
            .recursive(recursive)
            .build()
            .expect("delete params are infallible");
        let response = self.execute_ok(
            Operation::Delete,
            path,
            &params,
            RequestBody::None,
            Retry::NonIdempotent,
            None,
        )?;
        let parsed: BooleanResponse = self.parse_body(&response, Operation::Delete)?;
        Ok(parsed.boolean)
    }

    /// Renames `path` to `destination`.
    ///
    /// Renaming a file onto itself returns `true`; renaming a directory onto
    /// itself returns `false` (server semantics).
    ///
    /// # Errors
    ///
    /// Returns an error when either path is invalid or the operation fails.
    pub fn rename(
        &self,
        path: &str,
        destination: &str,
        overwrite: bool,
    ) -> Result<bool, LakeError> {
        check_path(path)?;
        check_path(destination)?;
        let mut builder = RenameParamsBuilder::default();
        builder.destination(destination);
        if overwrite {
            builder.rename_options("OVERWRITE");
        }
        let params = builder.build().expect("rename params are infallible");
        let response = self.execute_ok(
            Operation::Rename,
            path,
            &params,
            RequestBody::None,
            Retry::NonIdempotent,
            None,
        )?;
        let parsed: BooleanResponse = self.parse_body(&response, Operation::Rename)?;
        Ok(parsed.boolean)
    }

    /// Sets the owner and/or group of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid, both fields are absent, or
    /// the operation fails.
    pub fn set_owner(
        &self,
        path: &str,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), LakeError> {
        check_path(path)?;
        if owner.is_none() && group.is_none() {
            return Err(LakeError::InvalidInput(
                "set_owner requires an owner or a group".to_string(),
            ));
        }
        let mut builder = SetOwnerParamsBuilder::default();
        if let Some(owner) = owner {
            builder.owner(owner);
        }
        if let Some(group) = group {
            builder.group(group);
        }
        let params = builder.build().expect("set-owner params are infallible");
        self.execute_ok(
            Operation::SetOwner,
            path,
            &params,
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        Ok(())
    }

    /// Sets the octal permission of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path or permission is invalid, or the
    /// operation fails.
    pub fn set_permission(&self, path: &str, octal_permission: &str) -> Result<(), LakeError> {
        check_path(path)?;
        check_octal_permission(octal_permission)
            .map_err(|e| LakeError::InvalidInput(e.to_string()))?;
        let params = SetPermissionParamsBuilder::default()
            .permission(octal_permission)
            .build()
            .expect("set-permission params are infallible");
        self.execute_ok(
            Operation::SetPermission,
            path,
            &params,
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        Ok(())
    }

    /// Sets the access and/or modification times of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn set_times(
        &self,
        path: &str,
        modified: Option<DateTime<Utc>>,
        accessed: Option<DateTime<Utc>>,
    ) -> Result<(), LakeError> {
        check_path(path)?;
        let mut builder = SetTimesParamsBuilder::default();
        if let Some(modified) = modified {
            builder.modification_time(datetime_to_unix_millis(modified));
        }
        if let Some(accessed) = accessed {
            builder.access_time(datetime_to_unix_millis(accessed));
        }
        let params = builder.build().expect("set-times params are infallible");
        self.execute_ok(
            Operation::SetTimes,
            path,
            &params,
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        Ok(())
    }

    /// Probes whether the caller holds `rwx_action` (e.g. `"r-x"`) on `path`.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than an access denial.
    pub fn check_access(&self, path: &str, rwx_action: &str) -> Result<bool, LakeError> {
        check_path(path)?;
        let params = CheckAccessParamsBuilder::default()
            .fs_action(rwx_action)
            .build()
            .expect("check-access params are infallible");
        let response = self.execute(
            Operation::CheckAccess,
            path,
            &params,
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        if response.successful {
            return Ok(true);
        }
        if matches!(response.http_status, 401 | 403) {
            return Ok(false);
        }
        Err(self.failure(Operation::CheckAccess, path, response))
    }

    /// Fetches the checksum of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn get_file_checksum(&self, path: &str) -> Result<FileChecksum, LakeError> {
        check_path(path)?;
        let response = self.execute_ok(
            Operation::GetFileChecksum,
            path,
            &NoParams::default(),
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        let parsed: FileChecksumResponse =
            self.parse_body(&response, Operation::GetFileChecksum)?;
        Ok(parsed.file_checksum)
    }

    // ========================================================================
    // Content summaries
    // ========================================================================

    /// Aggregates `(length, files, directories)` over the tree at `path`
    /// with the client-side parallel traverser.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or any enumeration fails.
    pub fn get_content_summary(&self, path: &str) -> Result<ContentSummary, LakeError> {
        let entry = self.get_directory_entry(path)?;
        if entry.entry_type == EntryType::File {
            return Ok(ContentSummary {
                length: entry.length,
                file_count: 1,
                directory_count: 0,
                space_consumed: entry.length,
            });
        }
        ContentSummarizer::new(&self.engine).summarize(path)
    }

    /// Fetches the server-computed content summary of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn get_content_summary_remote(&self, path: &str) -> Result<ContentSummary, LakeError> {
        check_path(path)?;
        let response = self.execute_ok(
            Operation::GetContentSummary,
            path,
            &NoParams::default(),
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        let parsed: ContentSummaryResponse =
            self.parse_body(&response, Operation::GetContentSummary)?;
        Ok(parsed.content_summary.into())
    }

    // ========================================================================
    // ACLs
    // ========================================================================

    /// Fetches the ACL status of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid, the operation fails, or the
    /// server returns unparsable entries.
    pub fn get_acl_status(&self, path: &str) -> Result<AclStatus, LakeError> {
        check_path(path)?;
        let response = self.execute_ok(
            Operation::GetAclStatus,
            path,
            &NoParams::default(),
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        let parsed: AclStatusResponse = self.parse_body(&response, Operation::GetAclStatus)?;
        AclStatus::try_from(parsed.acl_status)
            .map_err(|e| LakeError::Protocol(format!("unparsable ACL entry from server: {e}")))
    }

    /// Adds or updates the given ACL entries on `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn modify_acl_entries(&self, path: &str, entries: &[AclEntry]) -> Result<(), LakeError> {
        self.acl_op(Operation::ModifyAclEntries, path, Some(entries))
    }

    /// Removes the given ACL entries from `path`; the entries act as removal
    /// templates and their permission fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn remove_acl_entries(&self, path: &str, entries: &[AclEntry]) -> Result<(), LakeError> {
        let templates: Vec<AclEntry> = entries
            .iter()
            .map(|entry| AclEntry {
                action: None,
                ..entry.clone()
            })
            .collect();
        self.acl_op(Operation::RemoveAclEntries, path, Some(&templates))
    }

    /// Replaces the entire ACL of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn set_acl(&self, path: &str, entries: &[AclEntry]) -> Result<(), LakeError> {
        self.acl_op(Operation::SetAcl, path, Some(entries))
    }

    /// Removes all default-scope ACL entries from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn remove_default_acl(&self, path: &str) -> Result<(), LakeError> {
        self.acl_op(Operation::RemoveDefaultAcl, path, None)
    }

    /// Removes the entire ACL of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn remove_acl(&self, path: &str) -> Result<(), LakeError> {
        self.acl_op(Operation::RemoveAcl, path, None)
    }

    fn acl_op(
        &self,
        op: Operation,
        path: &str,
        entries: Option<&[AclEntry]>,
    ) -> Result<(), LakeError> {
        check_path(path)?;
        match entries {
            Some(entries) => {
                let params = AclSpecParamsBuilder::default()
                    .acl_spec(AclEntry::to_spec(entries))
                    .build()
                    .expect("acl params are infallible");
                self.execute_ok(op, path, &params, RequestBody::None, Retry::Idempotent, None)?;
            }
            None => {
                self.execute_ok(
                    op,
                    path,
                    &NoParams::default(),
                    RequestBody::None,
                    Retry::Idempotent,
                    None,
                )?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Concatenation and extension operations
    // ========================================================================

    /// Concatenates `sources` into `path` via the query-string form.
    ///
    /// # Errors
    ///
    /// Returns an error when any path is invalid, `sources` is empty, or the
    /// operation fails.
    pub fn concat(&self, path: &str, sources: &[&str]) -> Result<(), LakeError> {
        let timeout = self.concat_timeout(path, sources)?;
        let params = ConcatParamsBuilder::default()
            .sources(sources.join(","))
            .build()
            .expect("concat params are infallible");
        self.execute_ok(
            Operation::Concat,
            path,
            &params,
            RequestBody::None,
            Retry::NonIdempotent,
            Some(timeout),
        )?;
        Ok(())
    }

    /// Concatenates `sources` into `path` via the JSON-body form.
    ///
    /// # Errors
    ///
    /// Returns an error when any path is invalid, `sources` is empty, or the
    /// operation fails.
    pub fn ms_concat(&self, path: &str, sources: &[&str]) -> Result<(), LakeError> {
        let timeout = self.concat_timeout(path, sources)?;
        let body = serde_json::to_string(&ConcatSources {
            sources: sources.iter().map(ToString::to_string).collect(),
        })?;
        self.execute_ok(
            Operation::MsConcat,
            path,
            &NoParams::default(),
            RequestBody::Json(&body),
            Retry::NonIdempotent,
            Some(timeout),
        )?;
        Ok(())
    }

    fn concat_timeout(&self, path: &str, sources: &[&str]) -> Result<Duration, LakeError> {
        check_path(path)?;
        if sources.is_empty() {
            return Err(LakeError::InvalidInput(
                "concatenation requires at least one source".to_string(),
            ));
        }
        for source in sources {
            check_path(source)?;
        }
        let base = self.options.load().default_timeout;
        Ok(base + CONCAT_PER_SOURCE_TIMEOUT * sources.len() as u32)
    }

    /// Appends `data` at a server-chosen offset, optionally auto-creating the
    /// file (extension operation).
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn concurrent_append(
        &self,
        path: &str,
        data: &[u8],
        auto_create: bool,
    ) -> Result<(), LakeError> {
        check_path(path)?;
        let mut builder = ConcurrentAppendParamsBuilder::default();
        if auto_create {
            builder.append_mode("autocreate");
        }
        let params = builder.build().expect("concurrent-append params are infallible");
        self.execute_ok(
            Operation::ConcurrentAppend,
            path,
            &params,
            RequestBody::Data(data),
            Retry::NonIdempotent,
            None,
        )?;
        Ok(())
    }

    /// Sets or clears the expiry instant of the file at `path` (extension
    /// operation).
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid, a non-`NeverExpire` option
    /// lacks an instant, or the operation fails.
    pub fn set_expiry(
        &self,
        path: &str,
        option: ExpiryOption,
        expire_time_millis: Option<u64>,
    ) -> Result<(), LakeError> {
        check_path(path)?;
        if option != ExpiryOption::NeverExpire && expire_time_millis.is_none() {
            return Err(LakeError::InvalidInput(format!(
                "expiry option {option} requires an expiry time"
            )));
        }
        let mut builder = SetExpiryParamsBuilder::default();
        builder.expiry_option(option);
        if let Some(millis) = expire_time_millis {
            builder.expire_time(millis);
        }
        let params = builder.build().expect("set-expiry params are infallible");
        self.execute_ok(
            Operation::SetExpiry,
            path,
            &params,
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        Ok(())
    }

    /// Probes extended file information for `path` (extension operation; the
    /// response carries headers only).
    ///
    /// # Errors
    ///
    /// Returns an error when the path is invalid or the operation fails.
    pub fn get_file_info(&self, path: &str) -> Result<(), LakeError> {
        check_path(path)?;
        self.execute_ok(
            Operation::GetFileInfo,
            path,
            &NoParams::default(),
            RequestBody::None,
            Retry::Idempotent,
            None,
        )?;
        Ok(())
    }

    // ========================================================================
    // Engine plumbing
    // ========================================================================

    fn policy(&self, retry: Retry) -> Box<dyn RetryPolicy> {
        match retry {
            Retry::None => Box::new(NoRetryPolicy::new()),
            Retry::Idempotent => {
                let options = self.options.load();
                Box::new(ExponentialBackoffPolicy::new(
                    options.backoff_max_retries,
                    options.backoff_initial_interval,
                    options.backoff_factor,
                ))
            }
            Retry::NonIdempotent => Box::new(NonIdempotentRetryPolicy::new()),
        }
    }

    fn execute<Q: Serialize>(
        &self,
        op: Operation,
        path: &str,
        params: &Q,
        body: RequestBody<'_>,
        retry: Retry,
        timeout: Option<Duration>,
    ) -> Result<OperationResponse, LakeError> {
        let mut policy = self.policy(retry);
        self.engine
            .execute(op, path, params, body, policy.as_mut(), timeout)
    }

    /// Executes and converts any unsuccessful response into an error.
    fn execute_ok<Q: Serialize>(
        &self,
        op: Operation,
        path: &str,
        params: &Q,
        body: RequestBody<'_>,
        retry: Retry,
        timeout: Option<Duration>,
    ) -> Result<OperationResponse, LakeError> {
        let response = self.execute(op, path, params, body, retry, timeout)?;
        if response.successful {
            Ok(response)
        } else {
            Err(self.failure(op, path, response))
        }
    }

    fn failure(&self, op: Operation, path: &str, response: OperationResponse) -> LakeError {
        let mut failure: OperationFailure = response.into_failure(op, path);
        if self.options.load().throw_remote_exceptions {
            if let Some(remote) = &failure.remote_exception {
                if remote.is_io_error() && !remote.java_class_name.is_empty() {
                    failure.message = format!("{}: {}", remote.java_class_name, failure.message);
                }
            }
        }
        LakeError::operation(failure)
    }

    fn parse_body<T: serde::de::DeserializeOwned>(
        &self,
        response: &OperationResponse,
        op: Operation,
    ) -> Result<T, LakeError> {
        let body = response
            .body
            .as_ref()
            .ok_or_else(|| LakeError::Protocol(format!("{op} returned no body")))?;
        serde_json::from_slice(body).map_err(|e| {
            tracing::debug!("failed to deserialize {op} response: {e}");
            LakeError::Json(e.to_string())
        })
    }
}
