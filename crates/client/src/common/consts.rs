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

//! Constants for the LakeStore wire protocol and client defaults.

use std::time::Duration;

/// The REST API version sent with every request.
pub const API_VERSION: &str = "2018-09-01";

/// URL prefix for the standard WebHDFS-compatible operation namespace.
pub const NAMESPACE_WEBHDFS: &str = "/webhdfs/v1";

/// URL prefix for the vendor extension operation namespace.
pub const NAMESPACE_EXTENSION: &str = "/WebHdfsExt";

/// The unit of upload chunking and readahead (4 MiB).
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Informational block size reported for files in directory entries (256 MiB).
pub const REPORTED_BLOCK_SIZE: u64 = 256 * 1024 * 1024;

/// Number of pre-allocated page buffers owned by the prefetch pool.
pub const PREFETCH_BUFFER_COUNT: usize = 16;

/// Number of long-lived prefetch worker threads.
pub const PREFETCH_WORKER_COUNT: usize = 8;

/// Minimum age before an unconsumed completed prefetch buffer becomes evictable.
pub const PREFETCH_EVICTION_AGE: Duration = Duration::from_secs(3);

/// Number of worker threads used by the content summarizer.
pub const SUMMARY_WORKER_COUNT: usize = 16;

/// Directory page size used by the content summarizer.
pub const SUMMARY_PAGE_SIZE: u32 = 16_000;

/// Default directory page size for client-paged enumeration.
pub const LIST_PAGE_SIZE: u32 = 4_000;

/// Default per-attempt operation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Capacity of the client latency ledger.
pub const LATENCY_LEDGER_CAPACITY: usize = 256;

/// Maximum number of ledger entries drained into a single request header.
pub const LATENCY_HEADER_MAX_ENTRIES: usize = 3;

/// Default number of look-ahead requests queued per stream fill.
pub const DEFAULT_READ_AHEAD_QUEUE_DEPTH: u32 = 4;

/// Maximum retries when the server returns short reads on a whole-file slurp.
pub const SLURP_MAX_ATTEMPTS: u32 = 10;

/// Header carrying the per-attempt client request id.
pub const HEADER_CLIENT_REQUEST_ID: &str = "Client-Request-Id";

/// Header carrying drained client latency records.
pub const HEADER_CLIENT_LATENCY: &str = "Client-Latency";

/// Response header carrying the server request id.
pub const HEADER_SERVER_REQUEST_ID: &str = "x-ms-request-id";

/// Remote exception name signalling an append offset mismatch.
pub const BAD_OFFSET_EXCEPTION: &str = "BadOffsetException";

/// Remote exception name signalling the server does not support speculative reads.
pub const SPECULATIVE_READ_NOT_SUPPORTED: &str = "SpeculativeReadNotSupported";

/// Remote exception name tolerated on overwriting creates (server-side race).
pub const FILE_ALREADY_EXISTS_EXCEPTION: &str = "FileAlreadyExistsException";
