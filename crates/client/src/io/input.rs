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

//! The buffered file input stream.
//!
//! A single-threaded reader per file handle. The stream holds an immutable
//! snapshot of the file length taken at open time; appends by other writers
//! are not reflected. Sequential reads pull whole blocks through the shared
//! [`Prefetcher`]; positioned reads always go straight to the server.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use lakestore_core::correctness::{check_positive, check_predicate_true};

use super::prefetch::{PrefetchSource, Prefetcher};
use crate::{
    common::consts::{SLURP_MAX_ATTEMPTS, SPECULATIVE_READ_NOT_SUPPORTED},
    http::{
        client::{RequestBody, RequestEngine},
        error::LakeError,
        operation::Operation,
        query::{OpenParams, OpenParamsBuilder},
        retry::{ExponentialBackoffPolicy, NoRetryPolicy, RetryPolicy},
    },
};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Stream internals shared with the prefetcher's workers.
///
/// The prefetcher holds only weak references to this type; dropping the
/// stream lets in-flight readaheads complete harmlessly.
#[derive(Debug)]
pub(crate) struct InputCore {
    engine: RequestEngine,
    path: String,
    length: u64,
    source_id: u64,
    prefetch_disabled: Arc<AtomicBool>,
}

impl InputCore {
    fn backoff_policy(&self) -> ExponentialBackoffPolicy {
        let options = self.engine.options();
        ExponentialBackoffPolicy::new(
            options.backoff_max_retries,
            options.backoff_initial_interval,
            options.backoff_factor,
        )
    }

    /// Issues one `OPEN` and drains its body stream into `dst`.
    fn open_read(
        &self,
        dst: &mut [u8],
        params: &OpenParams,
        policy: &mut dyn RetryPolicy,
    ) -> Result<usize, LakeError> {
        let mut response = self.engine.execute(
            Operation::Open,
            &self.path,
            params,
            RequestBody::None,
            policy,
            None,
        )?;
        if !response.successful {
            return Err(LakeError::operation(
                response.into_failure(Operation::Open, &self.path),
            ));
        }
        let mut stream = response
            .body_stream
            .take()
            .ok_or_else(|| LakeError::Protocol("OPEN returned no body stream".to_string()))?;

        let mut total = 0;
        while total < dst.len() {
            match io::Read::read(&mut stream, &mut dst[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => {
                    return Err(LakeError::Protocol(format!(
                        "OPEN body read failed after {total} bytes: {e}"
                    )));
                }
            }
        }
        Ok(total)
    }

    fn read_params(&self, offset: u64, len: usize, speculative: bool) -> OpenParams {
        let mut builder = OpenParamsBuilder::default();
        builder.offset(offset).length(len as u64).read(true);
        if speculative {
            builder.speculative(true);
        }
        builder.build().expect("open params are infallible")
    }

    /// The speculative first read: no-retry policy, falls back to the normal
    /// path on any failure. An explicit `SpeculativeReadNotSupported`
    /// rejection disables prefetch for the owning client's lifetime.
    fn read_speculative(&self, offset: u64, dst: &mut [u8]) -> Option<usize> {
        let params = self.read_params(offset, dst.len(), true);
        let mut policy = NoRetryPolicy::new();
        match self.open_read(dst, &params, &mut policy) {
            Ok(n) => Some(n),
            Err(error) => {
                if error.http_status() == Some(400)
                    && error.remote_exception_name() == Some(SPECULATIVE_READ_NOT_SUPPORTED)
                {
                    tracing::debug!(
                        "server rejects speculative reads; disabling prefetch for this client"
                    );
                    self.prefetch_disabled.store(true, Ordering::Relaxed);
                }
                None
            }
        }
    }
}

impl PrefetchSource for InputCore {
    fn source_id(&self) -> u64 {
        self.source_id
    }

    fn read_remote(&self, offset: u64, dst: &mut [u8]) -> Result<usize, LakeError> {
        let params = self.read_params(offset, dst.len(), false);
        let mut policy = self.backoff_policy();
        self.open_read(dst, &params, &mut policy)
    }
}

/// A buffered reader over one store file.
///
/// Not thread-safe; used by exactly one caller. Closing invalidates it.
#[derive(Debug)]
pub struct FileInputStream {
    core: Arc<InputCore>,
    prefetcher: Arc<Prefetcher>,
    buffer: Vec<u8>,
    buffer_size: usize,
    /// File offset at which the next server fetch starts; the valid buffer
    /// window is `[file_cursor - limit, file_cursor]`.
    file_cursor: u64,
    /// Index of the next byte to deliver from the buffer.
    buffer_cursor: usize,
    /// End of valid bytes in the buffer.
    limit: usize,
    first_fill: bool,
    closed: bool,
}

impl FileInputStream {
    pub(crate) fn new(
        engine: RequestEngine,
        path: String,
        length: u64,
        prefetcher: Arc<Prefetcher>,
        prefetch_disabled: Arc<AtomicBool>,
        buffer_size: usize,
    ) -> Self {
        let core = Arc::new(InputCore {
            engine,
            path,
            length,
            source_id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            prefetch_disabled,
        });
        Self {
            core,
            prefetcher,
            buffer: Vec::new(),
            buffer_size,
            file_cursor: 0,
            buffer_cursor: 0,
            limit: 0,
            first_fill: true,
            closed: false,
        }
    }

    /// Returns the file length snapshot taken at open time.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.core.length
    }

    /// Returns the current logical read position.
    #[must_use]
    pub fn get_pos(&self) -> u64 {
        self.file_cursor - (self.limit - self.buffer_cursor) as u64
    }

    /// Returns the number of buffered bytes deliverable without a server call.
    #[must_use]
    pub fn available(&self) -> usize {
        self.limit - self.buffer_cursor
    }

    /// Reads up to `dst.len()` bytes, returning 0 at end of file.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::StreamClosed`] after close, or the underlying
    /// read failure.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize, LakeError> {
        if self.closed {
            return Err(LakeError::StreamClosed);
        }
        if dst.is_empty() {
            return Ok(0);
        }
        if self.buffer_cursor == self.limit {
            if self.get_pos() >= self.core.length {
                return Ok(0);
            }
            self.fill()?;
            if self.buffer_cursor == self.limit {
                return Ok(0);
            }
        }
        let n = dst.len().min(self.limit - self.buffer_cursor);
        dst[..n].copy_from_slice(&self.buffer[self.buffer_cursor..self.buffer_cursor + n]);
        self.buffer_cursor += n;
        Ok(n)
    }

    /// Reads the next byte, returning `None` at end of file.
    ///
    /// # Errors
    ///
    /// Returns the underlying read failure.
    pub fn read_byte(&mut self) -> Result<Option<u8>, LakeError> {
        let mut byte = [0u8; 1];
        Ok(match self.read(&mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    /// Positioned read: fetches `dst.len()` bytes at `position` without
    /// touching the stream's cursors or its buffer.
    ///
    /// Always goes to the server with the exponential-backoff policy,
    /// bypassing the prefetch cache. Returns 0 when `position` is at or past
    /// end of file.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::StreamClosed`] after close, or the underlying
    /// read failure.
    pub fn read_at(&self, position: u64, dst: &mut [u8]) -> Result<usize, LakeError> {
        if self.closed {
            return Err(LakeError::StreamClosed);
        }
        if position >= self.core.length || dst.is_empty() {
            return Ok(0);
        }
        let want = dst.len().min((self.core.length - position) as usize);
        self.core.read_remote(position, &mut dst[..want])
    }

    /// Reads exactly `dst.len()` bytes from the current position.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::Protocol`] when end of file is reached first.
    pub fn read_fully(&mut self, dst: &mut [u8]) -> Result<(), LakeError> {
        let mut total = 0;
        while total < dst.len() {
            match self.read(&mut dst[total..])? {
                0 => {
                    return Err(LakeError::Protocol(format!(
                        "unexpected end of file after {total} bytes"
                    )));
                }
                n => total += n,
            }
        }
        Ok(())
    }

    /// Moves the read position to `position`.
    ///
    /// A position inside the currently valid buffer window only adjusts the
    /// buffer cursor; anything else invalidates the buffer. Seeking to the
    /// exact end of file is allowed; the next read returns 0.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::InvalidInput`] when `position` is past end of
    /// file, or [`LakeError::StreamClosed`] after close.
    pub fn seek(&mut self, position: u64) -> Result<(), LakeError> {
        if self.closed {
            return Err(LakeError::StreamClosed);
        }
        check_predicate_true(
            position <= self.core.length,
            &format!(
                "seek position {position} is past end of file ({})",
                self.core.length
            ),
        )
        .map_err(|e| LakeError::InvalidInput(e.to_string()))?;

        let window_start = self.file_cursor - self.limit as u64;
        if position >= window_start && position <= self.file_cursor {
            self.buffer_cursor = (position - window_start) as usize;
        } else {
            self.buffer_cursor = 0;
            self.limit = 0;
            self.file_cursor = position;
        }
        Ok(())
    }

    /// Skips forward by up to `n` bytes, clamped to the remaining length, and
    /// returns the number of bytes actually skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::StreamClosed`] after close.
    pub fn skip(&mut self, n: i64) -> Result<u64, LakeError> {
        if self.closed {
            return Err(LakeError::StreamClosed);
        }
        let pos = self.get_pos();
        let remaining = self.core.length - pos;
        let actual = if n <= 0 { 0 } else { (n as u64).min(remaining) };
        self.seek(pos + actual)?;
        Ok(actual)
    }

    /// Invalidates the buffer without changing the logical position.
    pub fn unbuffer(&mut self) {
        self.file_cursor = self.get_pos();
        self.buffer_cursor = 0;
        self.limit = 0;
    }

    /// Replaces the internal buffer size, invalidating buffered data.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::InvalidInput`] when `size` is zero.
    pub fn set_buffer_size(&mut self, size: usize) -> Result<(), LakeError> {
        check_positive(size, "buffer size").map_err(|e| LakeError::InvalidInput(e.to_string()))?;
        self.unbuffer();
        self.buffer_size = size;
        self.buffer = Vec::new();
        Ok(())
    }

    /// Closes the stream; further reads and seeks fail.
    pub fn close(&mut self) {
        self.closed = true;
        self.buffer = Vec::new();
        self.buffer_cursor = 0;
        self.limit = 0;
    }

    fn ensure_buffer(&mut self, len: usize) {
        if self.buffer.len() < len {
            self.buffer = vec![0u8; len];
        }
    }

    fn commit_fill(&mut self, n: usize) {
        self.limit = n;
        self.buffer_cursor = 0;
        self.file_cursor += n as u64;
    }

    /// Fills the (empty) buffer starting at `file_cursor`.
    fn fill(&mut self) -> Result<(), LakeError> {
        if self.core.length <= self.buffer_size as u64 {
            return self.slurp();
        }

        let target = self.file_cursor;
        let want = (self.buffer_size as u64).min(self.core.length - target) as usize;
        self.ensure_buffer(want);

        if self.first_fill {
            self.first_fill = false;
            if let Some(n) = self.core.read_speculative(target, &mut self.buffer[..want]) {
                self.commit_fill(n);
                return Ok(());
            }
        }

        if !self.core.prefetch_disabled.load(Ordering::Relaxed) {
            let depth = self.core.engine.options().read_ahead_queue_depth;
            if depth > 0 {
                self.queue_readaheads(target, depth);
                let n = self
                    .prefetcher
                    .get_block(self.core.source_id, target, &mut self.buffer[..want]);
                if n > 0 {
                    self.commit_fill(n);
                    return Ok(());
                }
            }
        }

        let n = self.core.read_remote(target, &mut self.buffer[..want])?;
        self.commit_fill(n);
        Ok(())
    }

    /// Queues up to `depth` block-aligned readaheads starting at the block
    /// containing `target`. Offsets at or past end of file queue nothing.
    fn queue_readaheads(&self, target: u64, depth: u32) {
        let block = self.buffer_size as u64;
        let first = (target / block) * block;
        let source: Arc<dyn PrefetchSource> = self.core.clone();
        for i in 0..u64::from(depth) {
            let offset = first + i * block;
            if offset >= self.core.length {
                break;
            }
            let len = block.min(self.core.length - offset) as usize;
            self.prefetcher.queue_readahead(&source, offset, len);
        }
    }

    /// Whole-file fill for files no longer than the buffer: one attempt reads
    /// everything from offset 0, retried on short reads.
    fn slurp(&mut self) -> Result<(), LakeError> {
        let file_len = self.core.length as usize;
        let pos = self.get_pos();
        self.ensure_buffer(file_len);

        for attempt in 1..=SLURP_MAX_ATTEMPTS {
            let n = self.core.read_remote(0, &mut self.buffer[..file_len])?;
            if n == file_len {
                self.limit = file_len;
                self.file_cursor = file_len as u64;
                self.buffer_cursor = pos as usize;
                return Ok(());
            }
            tracing::debug!(
                "short read slurping whole file: {n} of {file_len} bytes (attempt {attempt})"
            );
        }
        Err(LakeError::Protocol(format!(
            "persistent short reads slurping {file_len}-byte file"
        )))
    }
}

impl io::Read for FileInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Self::read(self, buf).map_err(Into::into)
    }
}

impl io::Seek for FileInputStream {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(offset) => i128::from(offset),
            io::SeekFrom::Current(delta) => i128::from(self.get_pos()) + i128::from(delta),
            io::SeekFrom::End(delta) => i128::from(self.core.length) + i128::from(delta),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        Self::seek(self, target as u64).map_err(io::Error::from)?;
        Ok(self.get_pos())
    }
}
