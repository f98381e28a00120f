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

//! The buffered file output stream.
//!
//! Batches writes into block-aligned chunks and appends them at explicit
//! server-side offsets under a client-generated lease. A retry that succeeded
//! server-side but was perceived as a transport failure surfaces on the next
//! attempt as `BadOffsetException`; the stream recovers by probing with a
//! zero-length metadata append.

use std::io;

use lakestore_core::correctness::check_positive;
use uuid::Uuid;

use crate::{
    common::{
        consts::{BAD_OFFSET_EXCEPTION, BLOCK_SIZE},
        enums::SyncFlag,
    },
    http::{
        client::{RequestBody, RequestEngine},
        error::LakeError,
        models::FileStatusResponse,
        operation::Operation,
        query::{AppendParams, AppendParamsBuilder, NoParams},
        retry::{ExponentialBackoffPolicy, NoRetryPolicy},
    },
};

/// A buffered appender over one store file.
///
/// Holds the file's lease for its lifetime; `close` releases the lease via a
/// close-marked append. Not thread-safe.
#[derive(Debug)]
pub struct FileOutputStream {
    engine: RequestEngine,
    path: String,
    /// Client-generated UUID used as both lease id and session id.
    lease_id: String,
    buffer: Vec<u8>,
    buffer_size: usize,
    /// The server-acknowledged offset at which the buffered bytes will land.
    remote_cursor: u64,
    last_flush_updated_metadata: bool,
    closed: bool,
    /// Set when an offset mismatch could not be confirmed recovered; the
    /// stream is then permanently failed.
    broken: bool,
}

impl FileOutputStream {
    /// Opens a stream appending to an existing file.
    ///
    /// Issues a zero-length metadata append so any server-side buffered data
    /// is flushed, then reads the flushed length as the append cursor.
    pub(crate) fn new_append(engine: RequestEngine, path: String) -> Result<Self, LakeError> {
        let mut stream = Self {
            engine,
            path,
            lease_id: Uuid::new_v4().to_string(),
            buffer: Vec::new(),
            buffer_size: BLOCK_SIZE,
            remote_cursor: 0,
            last_flush_updated_metadata: false,
            closed: false,
            broken: false,
        };
        stream.probe_append(None)?;
        stream.remote_cursor = stream.fetch_remote_length()?;
        Ok(stream)
    }

    fn backoff_policy(&self) -> ExponentialBackoffPolicy {
        let options = self.engine.options();
        ExponentialBackoffPolicy::new(
            options.backoff_max_retries,
            options.backoff_initial_interval,
            options.backoff_factor,
        )
    }

    /// Reads the server-side file length via `GETFILESTATUS`.
    fn fetch_remote_length(&self) -> Result<u64, LakeError> {
        let mut policy = self.backoff_policy();
        let response = self.engine.execute(
            Operation::GetFileStatus,
            &self.path,
            &NoParams::default(),
            RequestBody::None,
            &mut policy,
            None,
        )?;
        if !response.successful {
            return Err(LakeError::operation(
                response.into_failure(Operation::GetFileStatus, &self.path),
            ));
        }
        let body = response
            .body
            .as_ref()
            .ok_or_else(|| LakeError::Protocol("GETFILESTATUS returned no body".to_string()))?;
        let parsed: FileStatusResponse = serde_json::from_slice(body)?;
        Ok(parsed.file_status.length)
    }

    /// Opens a stream over a freshly created file (cursor at zero).
    pub(crate) fn new_create(engine: RequestEngine, path: String, lease_id: String) -> Self {
        Self {
            engine,
            path,
            lease_id,
            buffer: Vec::new(),
            buffer_size: BLOCK_SIZE,
            remote_cursor: 0,
            last_flush_updated_metadata: false,
            closed: false,
            broken: false,
        }
    }

    /// Returns the lease id held by this stream.
    #[must_use]
    pub fn lease_id(&self) -> &str {
        &self.lease_id
    }

    /// Returns the number of bytes accepted but not yet appended.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn check_open(&self) -> Result<(), LakeError> {
        if self.closed {
            return Err(LakeError::StreamClosed);
        }
        if self.broken {
            return Err(LakeError::Protocol(
                "stream failed permanently after an unconfirmed offset mismatch".to_string(),
            ));
        }
        Ok(())
    }

    /// Accepts `data`, appending full blocks as they fill.
    ///
    /// A write larger than the buffer is split at block boundaries so every
    /// append stays within one upload chunk; the trailing partial block
    /// remains buffered.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::StreamClosed`] after close, or the append failure.
    pub fn write(&mut self, data: &[u8]) -> Result<(), LakeError> {
        self.check_open()?;
        let mut data = data;
        loop {
            let space = self.buffer_size - self.buffer.len();
            if data.len() < space {
                self.buffer.extend_from_slice(data);
                return Ok(());
            }
            self.buffer.extend_from_slice(&data[..space]);
            data = &data[space..];
            self.flush_internal(SyncFlag::Data)?;
            if data.is_empty() {
                return Ok(());
            }
        }
    }

    /// Appends buffered data and syncs server-side metadata.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::StreamClosed`] after close, or the append failure.
    pub fn flush(&mut self) -> Result<(), LakeError> {
        self.check_open()?;
        self.flush_internal(SyncFlag::Metadata)
    }

    /// Appends any remaining data with the close marker, releasing the lease.
    ///
    /// Idempotent; additional calls after the first are silent no-ops.
    ///
    /// # Errors
    ///
    /// Returns the final append failure; the stream counts as closed either way.
    pub fn close(&mut self) -> Result<(), LakeError> {
        if self.closed {
            return Ok(());
        }
        let result = if self.broken {
            Err(LakeError::Protocol(
                "stream failed permanently after an unconfirmed offset mismatch".to_string(),
            ))
        } else {
            self.flush_internal(SyncFlag::Close)
        };
        self.closed = true;
        self.buffer = Vec::new();
        result
    }

    /// Resizes the write buffer, first appending any buffered data.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::InvalidInput`] when `size` is zero, or the flush
    /// failure.
    pub fn set_buffer_size(&mut self, size: usize) -> Result<(), LakeError> {
        self.check_open()?;
        check_positive(size, "buffer size").map_err(|e| LakeError::InvalidInput(e.to_string()))?;
        self.flush_internal(SyncFlag::Data)?;
        self.buffer_size = size;
        self.buffer.shrink_to(size);
        Ok(())
    }

    fn append_params(&self, offset: Option<u64>, flag: SyncFlag) -> AppendParams {
        let mut builder = AppendParamsBuilder::default();
        if let Some(offset) = offset {
            builder.offset(offset);
        }
        builder
            .lease_id(self.lease_id.clone())
            .session_id(self.lease_id.clone())
            .sync_flag(flag)
            .append(true)
            .build()
            .expect("append params are infallible")
    }

    /// Appends the buffered bytes at `remote_cursor` with `flag`.
    ///
    /// Empty-buffer flushes are sent only when they change metadata or lease
    /// state that the previous flush did not already sync.
    fn flush_internal(&mut self, flag: SyncFlag) -> Result<(), LakeError> {
        if self.buffer.is_empty() {
            match flag {
                SyncFlag::Data => return Ok(()),
                SyncFlag::Metadata if self.last_flush_updated_metadata => return Ok(()),
                // Close always goes out: it releases the lease.
                _ => {}
            }
        }

        let params = self.append_params(Some(self.remote_cursor), flag);
        // Appends retry under the default backoff policy; a replayed append
        // surfaces as BadOffsetException and is reconciled below.
        let mut policy = self.backoff_policy();
        let response = self.engine.execute(
            Operation::Append,
            &self.path,
            &params,
            RequestBody::Data(&self.buffer),
            &mut policy,
            None,
        )?;

        if response.successful {
            self.remote_cursor += self.buffer.len() as u64;
            self.buffer.clear();
            self.last_flush_updated_metadata = flag != SyncFlag::Data;
            return Ok(());
        }

        // Offset-mismatch self-healing: a retried append may have landed
        // server-side while the client saw a transport failure; the follow-up
        // attempt then fails with BadOffsetException.
        if response.num_retries > 0
            && response.http_status == 400
            && response.remote_exception_is(BAD_OFFSET_EXCEPTION)
        {
            let confirmed_cursor = self.remote_cursor + self.buffer.len() as u64;
            if self.probe_append(Some(confirmed_cursor)).is_ok() {
                tracing::debug!(
                    "append at offset {} already committed server-side; advancing cursor",
                    self.remote_cursor
                );
                self.remote_cursor = confirmed_cursor;
                self.buffer.clear();
                self.last_flush_updated_metadata = flag != SyncFlag::Data;
                return Ok(());
            }
        }

        if response.remote_exception_is(BAD_OFFSET_EXCEPTION) {
            self.broken = true;
        }
        Err(LakeError::operation(
            response.into_failure(Operation::Append, &self.path),
        ))
    }

    /// Issues a zero-length metadata append, at `offset` when given.
    ///
    /// With an offset it succeeds exactly when the offset matches the
    /// server's committed length, which makes it double as the
    /// offset-recovery probe.
    fn probe_append(&self, offset: Option<u64>) -> Result<(), LakeError> {
        let params = self.append_params(offset, SyncFlag::Metadata);
        let mut policy = NoRetryPolicy::new();
        let response = self.engine.execute(
            Operation::Append,
            &self.path,
            &params,
            RequestBody::Data(&[]),
            &mut policy,
            None,
        )?;
        if response.successful {
            Ok(())
        } else {
            Err(LakeError::operation(
                response.into_failure(Operation::Append, &self.path),
            ))
        }
    }
}

impl io::Write for FileOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Self::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Self::flush(self).map_err(Into::into)
    }
}

impl Drop for FileOutputStream {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(error) = self.close() {
                tracing::warn!("close on drop failed for '{}': {error}", self.path);
            }
        }
    }
}
