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

//! The filled result record of one engine invocation.

use std::{fmt::Debug, io, time::Duration};

use bytes::Bytes;

use super::{
    error::{OperationFailure, RemoteException},
    operation::Operation,
};

/// An unbuffered response body handed to the caller of an `OPEN` operation.
///
/// Wraps the underlying HTTP response; reading pulls bytes straight off the
/// connection.
pub struct BodyStream {
    inner: reqwest::blocking::Response,
}

impl Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(BodyStream))
            .field("content_length", &self.inner.content_length())
            .finish_non_exhaustive()
    }
}

impl BodyStream {
    /// Wraps a successful HTTP response.
    #[must_use]
    pub fn new(inner: reqwest::blocking::Response) -> Self {
        Self { inner }
    }
}

impl io::Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.inner, buf)
    }
}

/// The outcome of one engine invocation, successful or not.
///
/// The engine always fills this record; the facade converts unsuccessful
/// responses into typed errors.
#[derive(Debug, Default)]
pub struct OperationResponse {
    /// Whether the final attempt returned HTTP 2xx.
    pub successful: bool,
    /// HTTP status of the final attempt; 0 for transport-only failures.
    pub http_status: u16,
    /// HTTP reason phrase of the final attempt.
    pub http_message: String,
    /// The buffered response body for JSON-returning operations.
    pub body: Option<Bytes>,
    /// The unbuffered body stream for `OPEN`.
    pub body_stream: Option<BodyStream>,
    /// Server request id from `x-ms-request-id`, when received.
    pub server_request_id: Option<String>,
    /// Server-acknowledged byte position after a successful append.
    pub committed_block_offset: Option<u64>,
    /// Number of retries performed.
    pub num_retries: u32,
    /// Client-measured latency of the final attempt.
    pub last_call_latency: Duration,
    /// Latency of the final token acquisition.
    pub token_acquisition_latency: Duration,
    /// Content length of the final response.
    pub content_length: u64,
    /// Whether the final response used chunked transfer encoding.
    pub chunked: bool,
    /// Parsed remote exception of the final attempt, when any.
    pub remote_exception: Option<RemoteException>,
    /// Compact one-line descriptions of every failed attempt, oldest first.
    pub exception_history: Vec<String>,
}

impl OperationResponse {
    /// Returns `true` when the failure carried the given remote exception name.
    #[must_use]
    pub fn remote_exception_is(&self, name: &str) -> bool {
        self.remote_exception
            .as_ref()
            .is_some_and(|remote| remote.exception == name)
    }

    /// Converts an unsuccessful response into the surfaced failure record.
    #[must_use]
    pub fn into_failure(self, operation: Operation, path: &str) -> OperationFailure {
        let message = match (&self.remote_exception, self.http_status) {
            (Some(remote), _) => format!("{}: {}", remote.exception, remote.message),
            (None, 0) => "transport failure with no HTTP status".to_string(),
            (None, status) => format!("HTTP {status} {}", self.http_message),
        };
        OperationFailure {
            operation,
            path: path.to_string(),
            message,
            http_status: self.http_status,
            http_message: self.http_message,
            server_request_id: self.server_request_id,
            remote_exception: self.remote_exception,
            num_retries: self.num_retries,
            last_call_latency_ms: self.last_call_latency.as_millis() as u64,
            response_content_length: self.content_length,
            exception_history: self.exception_history,
        }
    }
}
