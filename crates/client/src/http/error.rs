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

//! Error structures and enumerations for the LakeStore client.
//!
//! The JSON error schema is the WebHDFS `RemoteException` envelope. The
//! `javaClassName` field is stored verbatim and only ever interpreted to
//! decide the surfaced error *kind*, never executed as code.

use std::io;

use serde::Deserialize;
use thiserror::Error;

use super::operation::Operation;
use crate::auth::AuthError;

/// The JSON error envelope returned by the store on non-2xx responses.
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteExceptionResponse {
    /// The wrapped exception body.
    #[serde(rename = "RemoteException")]
    pub remote_exception: RemoteException,
}

/// The server's structured error naming a specific failure class.
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteException {
    /// Short exception name, e.g. `BadOffsetException`.
    pub exception: String,
    /// Human-readable failure description.
    #[serde(default)]
    pub message: String,
    /// Fully-qualified server-side class name, stored verbatim.
    #[serde(rename = "javaClassName", default)]
    pub java_class_name: String,
}

impl RemoteException {
    /// Returns `true` when the server-side class denotes an I/O error.
    #[must_use]
    pub fn is_io_error(&self) -> bool {
        self.java_class_name.ends_with("IOException") || self.exception.ends_with("IOException")
    }
}

/// A surfaced operation failure with the full attempt record.
#[derive(Debug)]
pub struct OperationFailure {
    /// The operation that failed.
    pub operation: Operation,
    /// The store path the operation ran against.
    pub path: String,
    /// Primary failure message.
    pub message: String,
    /// HTTP status of the last attempt; 0 for transport-only failures.
    pub http_status: u16,
    /// HTTP reason phrase of the last attempt.
    pub http_message: String,
    /// Server request id of the last attempt, when one was received.
    pub server_request_id: Option<String>,
    /// The remote exception envelope, when one could be parsed.
    pub remote_exception: Option<RemoteException>,
    /// Number of retries performed before surfacing.
    pub num_retries: u32,
    /// Client-measured latency of the last attempt in milliseconds.
    pub last_call_latency_ms: u64,
    /// Content length of the last response.
    pub response_content_length: u64,
    /// Compact one-line descriptions of every failed attempt, oldest first.
    pub exception_history: Vec<String>,
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed for '{}': {} (HTTP {}",
            self.operation, self.path, self.message, self.http_status
        )?;
        if let Some(remote) = &self.remote_exception {
            write!(f, ", remote {}: {}", remote.exception, remote.message)?;
        }
        if let Some(id) = &self.server_request_id {
            write!(f, ", server request id {id}")?;
        }
        write!(f, ", retries {})", self.num_retries)
    }
}

/// A typed error enumeration for the LakeStore client.
#[derive(Debug, Error)]
pub enum LakeError {
    /// Caller bug: bad path, negative length, malformed parameter. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Token acquisition failed, or the token was refused after the single 401 retry.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// An operation failed after its retry policy was exhausted.
    #[error("{0}")]
    Operation(Box<OperationFailure>),
    /// The response violated a protocol invariant (e.g. a missing body where
    /// one was promised). Treated as a transport-class failure.
    #[error("Protocol violation: {0}")]
    Protocol(String),
    /// Failure during JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    Json(String),
    /// The stream has been closed; no further operations are possible.
    #[error("Stream is closed")]
    StreamClosed,
}

impl LakeError {
    /// Wraps an [`OperationFailure`].
    #[must_use]
    pub fn operation(failure: OperationFailure) -> Self {
        Self::Operation(Box::new(failure))
    }

    /// Returns the remote exception name carried by this error, if any.
    #[must_use]
    pub fn remote_exception_name(&self) -> Option<&str> {
        match self {
            Self::Operation(failure) => failure
                .remote_exception
                .as_ref()
                .map(|remote| remote.exception.as_str()),
            _ => None,
        }
    }

    /// Returns the HTTP status carried by this error (0 for transport-only).
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Operation(failure) => Some(failure.http_status),
            _ => None,
        }
    }
}

// Allow use of the `?` operator on validation results at the facade seams.
impl From<anyhow::Error> for LakeError {
    fn from(error: anyhow::Error) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

impl From<serde_json::Error> for LakeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

// Streams expose std::io interfaces; map the taxonomy onto io::ErrorKind.
impl From<LakeError> for io::Error {
    fn from(error: LakeError) -> Self {
        let kind = match &error {
            LakeError::InvalidInput(_) => io::ErrorKind::InvalidInput,
            LakeError::Auth(_) => io::ErrorKind::PermissionDenied,
            LakeError::StreamClosed => io::ErrorKind::NotConnected,
            LakeError::Operation(failure) if failure.http_status == 0 => {
                io::ErrorKind::ConnectionAborted
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, error.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
