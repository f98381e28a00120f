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

//! The request engine: a uniform invocation pipeline composing token
//! acquisition, URL building, retry policy, HTTP execution, response parsing,
//! latency piggybacking and the structured error model.
//!
//! One call to [`RequestEngine::execute`] performs one logical operation. Each
//! attempt acquires a fresh token (it may have been refreshed since the last
//! attempt), sends one HTTP request with a per-attempt timeout, and records
//! its result in the latency ledger. The retry policy sleeps any backoff
//! inside `should_retry`, so the loop here has no sleep of its own.

use std::{fmt::Debug, sync::Arc, time::Instant};

use arc_swap::ArcSwap;
use reqwest::{
    blocking::Client,
    header::{AUTHORIZATION, CONTENT_TYPE, TRANSFER_ENCODING, USER_AGENT},
};
use serde::Serialize;
use uuid::Uuid;

use super::{
    error::{LakeError, RemoteExceptionResponse},
    latency::{LatencyLedger, LatencyRecord},
    operation::Operation,
    response::{BodyStream, OperationResponse},
    retry::RetryPolicy,
};
use crate::{
    auth::TokenProvider,
    common::{
        consts::{
            API_VERSION, HEADER_CLIENT_LATENCY, HEADER_CLIENT_REQUEST_ID, HEADER_SERVER_REQUEST_ID,
        },
        path::{apply_prefix, encode_path},
    },
    config::ClientOptions,
};

/// Response header carrying the server-acknowledged append offset.
const HEADER_COMMITTED_BLOCK_OFFSET: &str = "x-ms-committed-block-offset";

/// The request body shipped with a single operation.
#[derive(Clone, Copy, Debug)]
pub enum RequestBody<'a> {
    /// No body.
    None,
    /// Raw bytes (append family, create). May be empty for probe appends.
    Data(&'a [u8]),
    /// A JSON document (`MSCONCAT`).
    Json(&'a str),
}

impl RequestBody<'_> {
    fn len(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::Data(data) => data.len() as u64,
            Self::Json(json) => json.len() as u64,
        }
    }
}

/// Executes single REST operations against one store account.
///
/// Cheap to clone; all clones share the HTTP connection pool, options
/// snapshot and latency ledger.
#[derive(Clone)]
pub struct RequestEngine {
    http: Client,
    account_fqdn: String,
    token_provider: Arc<dyn TokenProvider>,
    options: Arc<ArcSwap<ClientOptions>>,
    ledger: Arc<LatencyLedger>,
    client_instance_id: String,
}

impl Debug for RequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RequestEngine))
            .field("account_fqdn", &self.account_fqdn)
            .field("client_instance_id", &self.client_instance_id)
            .finish_non_exhaustive()
    }
}

impl RequestEngine {
    /// Creates a new [`RequestEngine`] for `account_fqdn`.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::Protocol`] when the HTTP transport cannot be
    /// constructed.
    pub fn new(
        account_fqdn: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
        options: Arc<ArcSwap<ClientOptions>>,
        ledger: Arc<LatencyLedger>,
    ) -> Result<Self, LakeError> {
        let http = Client::builder()
            .build()
            .map_err(|e| LakeError::Protocol(format!("failed to construct HTTP transport: {e}")))?;
        Ok(Self {
            http,
            account_fqdn: account_fqdn.into(),
            token_provider,
            options,
            ledger,
            client_instance_id: Uuid::new_v4().to_string(),
        })
    }

    /// Returns the current options snapshot.
    #[must_use]
    pub fn options(&self) -> Arc<ClientOptions> {
        self.options.load_full()
    }

    /// Returns the shared latency ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<LatencyLedger> {
        &self.ledger
    }

    /// Returns the client instance id stamped into latency records.
    #[must_use]
    pub fn client_instance_id(&self) -> &str {
        &self.client_instance_id
    }

    /// Returns the account FQDN this engine talks to.
    #[must_use]
    pub fn account_fqdn(&self) -> &str {
        &self.account_fqdn
    }

    fn build_url<Q: Serialize>(
        &self,
        op: Operation,
        path: &str,
        params: &Q,
        options: &ClientOptions,
    ) -> Result<String, LakeError> {
        let scheme = if options.insecure_transport {
            "http"
        } else {
            "https"
        };
        let full_path = apply_prefix(options.file_path_prefix.as_deref(), path);
        let mut url = format!(
            "{scheme}://{}{}{}?op={}&api-version={API_VERSION}",
            self.account_fqdn,
            op.namespace().url_prefix(),
            encode_path(&full_path),
            op.as_ref(),
        );
        let query =
            serde_urlencoded::to_string(params).map_err(|e| LakeError::Json(e.to_string()))?;
        if !query.is_empty() {
            url.push('&');
            url.push_str(&query);
        }
        Ok(url)
    }

    /// Invokes one operation, filling and returning an [`OperationResponse`].
    ///
    /// The returned response may be unsuccessful; callers decide how to
    /// surface it. `timeout_override` replaces the operation's derived
    /// per-attempt timeout (used for concatenation, which scales with the
    /// source count).
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::Auth`] when token acquisition fails (never
    /// retried here) and [`LakeError::Json`] when `params` cannot be
    /// serialized.
    pub fn execute<Q: Serialize>(
        &self,
        op: Operation,
        path: &str,
        params: &Q,
        body: RequestBody<'_>,
        policy: &mut dyn RetryPolicy,
        timeout_override: Option<std::time::Duration>,
    ) -> Result<OperationResponse, LakeError> {
        let options = self.options.load_full();
        let url = self.build_url(op, path, params, &options)?;
        let user_agent = options.user_agent();
        let timeout = timeout_override.unwrap_or_else(|| op.timeout(options.default_timeout));

        let request_uuid = Uuid::new_v4();
        let mut response = OperationResponse::default();
        let mut attempt: u32 = 0;

        loop {
            let client_request_id = if attempt == 0 {
                request_uuid.to_string()
            } else {
                format!("{request_uuid}.retry_{attempt}")
            };

            let token_start = Instant::now();
            let token = self.token_provider.get_token()?;
            response.token_acquisition_latency = token_start.elapsed();

            let mut request = self
                .http
                .request(op.method(), &url)
                .timeout(timeout)
                .header(AUTHORIZATION, format!("Bearer {}", token.access_token()))
                .header(USER_AGENT, user_agent.clone())
                .header(HEADER_CLIENT_REQUEST_ID, client_request_id.clone());

            if let Some(latency) = self.ledger.drain_header() {
                request = request.header(HEADER_CLIENT_LATENCY, latency);
            }

            request = match body {
                RequestBody::None => request,
                RequestBody::Data(data) => request
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(data.to_vec()),
                RequestBody::Json(json) => request
                    .header(CONTENT_TYPE, "application/json")
                    .body(json.to_string()),
            };

            tracing::debug!("{} {url} [{client_request_id}]", op.method());

            let attempt_start = Instant::now();
            let result = request.send();
            let latency = attempt_start.elapsed();
            response.num_retries = attempt;
            response.last_call_latency = latency;

            let latency_ms = latency.as_millis() as u64;
            let (policy_status, transport_error) = match result {
                Ok(http_response) => {
                    let status = http_response.status();
                    response.http_status = status.as_u16();
                    response.http_message = status
                        .canonical_reason()
                        .unwrap_or_default()
                        .to_string();
                    response.server_request_id = header_string(&http_response, HEADER_SERVER_REQUEST_ID);
                    response.content_length = http_response.content_length().unwrap_or(0);
                    response.chunked = http_response
                        .headers()
                        .get(TRANSFER_ENCODING)
                        .and_then(|v| v.to_str().ok())
                        .is_some_and(|v| v.contains("chunked"));
                    response.committed_block_offset =
                        header_string(&http_response, HEADER_COMMITTED_BLOCK_OFFSET)
                            .and_then(|v| v.parse().ok());

                    if status.is_success() {
                        match self.finish_success(op, http_response, &mut response) {
                            Ok(()) => {
                                self.record_latency(&client_request_id, latency_ms, None, op, &body);
                                tracing::trace!("{op} succeeded in {latency_ms} ms");
                                return Ok(response);
                            }
                            Err(description) => {
                                // Body read failure or protocol violation after a
                                // 2xx: treated as a transport-class failure.
                                response.exception_history.push(format!(
                                    "[{client_request_id}] {description}"
                                ));
                                self.record_latency(
                                    &client_request_id,
                                    latency_ms,
                                    Some("protocol"),
                                    op,
                                    &body,
                                );
                                (None, true)
                            }
                        }
                    } else {
                        let error_body = http_response.bytes().unwrap_or_default();
                        let remote = serde_json::from_slice::<RemoteExceptionResponse>(&error_body)
                            .ok()
                            .map(|envelope| envelope.remote_exception);
                        let description = match &remote {
                            Some(remote) => format!(
                                "HTTP {} {}: {}",
                                status.as_u16(),
                                remote.exception,
                                remote.message
                            ),
                            None => format!("HTTP {}", status.as_u16()),
                        };
                        tracing::debug!("{op} attempt failed: {description}");
                        response
                            .exception_history
                            .push(format!("[{client_request_id}] {description}"));
                        response.remote_exception = remote;
                        let marker = format!("HTTP{}", status.as_u16());
                        self.record_latency(&client_request_id, latency_ms, Some(&marker), op, &body);
                        (Some(status.as_u16()), false)
                    }
                }
                Err(error) => {
                    response.http_status = 0;
                    response.http_message = String::new();
                    response.remote_exception = None;
                    tracing::debug!("{op} transport failure: {error}");
                    response
                        .exception_history
                        .push(format!("[{client_request_id}] transport: {error}"));
                    self.record_latency(&client_request_id, latency_ms, Some("transport"), op, &body);
                    (None, true)
                }
            };

            if policy.should_retry(policy_status, transport_error) {
                attempt += 1;
                continue;
            }

            response.successful = false;
            return Ok(response);
        }
    }

    /// Completes a 2xx attempt: buffers or hands off the body per the
    /// operation registry. Returns a failure description when the response
    /// violates a protocol invariant.
    fn finish_success(
        &self,
        op: Operation,
        http_response: reqwest::blocking::Response,
        response: &mut OperationResponse,
    ) -> Result<(), String> {
        if op.returns_stream() {
            response.body_stream = Some(BodyStream::new(http_response));
        } else if op.returns_body() {
            let bytes = http_response
                .bytes()
                .map_err(|e| format!("failed reading response body: {e}"))?;
            if bytes.is_empty() {
                return Err("expected a response body but received none".to_string());
            }
            response.body = Some(bytes);
        }
        response.remote_exception = None;
        response.successful = true;
        Ok(())
    }

    fn record_latency(
        &self,
        client_request_id: &str,
        latency_ms: u64,
        error: Option<&str>,
        op: Operation,
        body: &RequestBody<'_>,
    ) {
        self.ledger.record(&LatencyRecord {
            client_request_id: client_request_id.to_string(),
            latency_ms,
            error: error.map(ToString::to_string),
            operation: op.as_ref().to_string(),
            body_bytes: body.len(),
            client_instance_id: self.client_instance_id.clone(),
        });
    }
}

fn header_string(response: &reqwest::blocking::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{auth::StaticTokenProvider, http::query::OpenParamsBuilder};

    fn engine_with_options(options: ClientOptions) -> RequestEngine {
        RequestEngine::new(
            "account.lakestore.example.net",
            Arc::new(StaticTokenProvider::new("test-token")),
            Arc::new(ArcSwap::from_pointee(options)),
            Arc::new(LatencyLedger::default()),
        )
        .unwrap()
    }

    #[rstest]
    fn test_build_url_defaults() {
        let engine = engine_with_options(ClientOptions::default());
        let params = OpenParamsBuilder::default().offset(0u64).build().unwrap();
        let url = engine
            .build_url(Operation::Open, "/a/b", &params, &ClientOptions::default())
            .unwrap();
        assert_eq!(
            url,
            format!(
                "https://account.lakestore.example.net/webhdfs/v1/a/b?op=OPEN&api-version={API_VERSION}&offset=0"
            )
        );
    }

    #[rstest]
    fn test_build_url_prefix_encoding_and_scheme() {
        let options = ClientOptions::new()
            .with_insecure_transport()
            .with_file_path_prefix("/tenant")
            .unwrap();
        let engine = engine_with_options(options.clone());
        let url = engine
            .build_url(
                Operation::GetFileStatus,
                "/dir with space/f+g",
                &crate::http::query::NoParams::default(),
                &options,
            )
            .unwrap();
        assert_eq!(
            url,
            format!(
                "http://account.lakestore.example.net/webhdfs/v1/tenant/dir%20with%20space/f%2Bg?op=GETFILESTATUS&api-version={API_VERSION}"
            )
        );
    }

    #[rstest]
    fn test_build_url_extension_namespace() {
        let engine = engine_with_options(ClientOptions::default());
        let url = engine
            .build_url(
                Operation::ConcurrentAppend,
                "/logs/app.log",
                &crate::http::query::NoParams::default(),
                &ClientOptions::default(),
            )
            .unwrap();
        assert!(url.contains("/WebHdfsExt/logs/app.log?op=CONCURRENTAPPEND"));
    }

    #[rstest]
    fn test_request_body_len() {
        assert_eq!(RequestBody::None.len(), 0);
        assert_eq!(RequestBody::Data(b"abcd").len(), 4);
        assert_eq!(RequestBody::Json("{}").len(), 2);
    }
}
