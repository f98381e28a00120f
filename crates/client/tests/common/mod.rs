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

//! Shared mock-server scaffolding for integration tests.
//!
//! The mock speaks just enough of the store wire protocol for the client:
//! `CREATE`, `APPEND` (with offset checking and `BadOffsetException`),
//! `OPEN`, `GETFILESTATUS`, `LISTSTATUS` (paged), `MKDIRS` and `DELETE`,
//! over an in-memory file map.

#![allow(dead_code)] // Each integration test binary uses a subset.

use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use lakestore_client::{ClientOptions, LakeClient, StaticTokenProvider};
use serde_json::{Value, json};

/// One observed request, recorded for assertions.
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub method: Method,
    pub path: String,
    pub op: String,
    pub query: HashMap<String, String>,
    pub client_request_id: Option<String>,
    pub client_latency: Option<String>,
    pub body_len: usize,
}

/// In-memory store state shared with the request handler.
#[derive(Debug, Default)]
pub struct MockStore {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub directories: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<SeenRequest>>,
    /// Status codes to return for the next matching `(op, occurrence)`.
    pub failures: Mutex<HashMap<String, Vec<u16>>>,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        let store = Self::default();
        store.directories.lock().unwrap().push("/".to_string());
        Arc::new(store)
    }

    /// Seeds a file with the given contents.
    pub fn seed_file(&self, path: &str, contents: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), contents.to_vec());
    }

    /// Registers a directory.
    pub fn seed_directory(&self, path: &str) {
        self.directories.lock().unwrap().push(path.to_string());
    }

    /// Arranges for the next calls of `op` to fail with the given HTTP
    /// statuses (consumed front to back) before behaving normally.
    pub fn fail_next(&self, op: &str, statuses: &[u16]) {
        self.failures
            .lock()
            .unwrap()
            .entry(op.to_string())
            .or_default()
            .extend_from_slice(statuses);
    }

    /// Returns the recorded requests for `op`.
    pub fn requests_for(&self, op: &str) -> Vec<SeenRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|seen| seen.op == op)
            .cloned()
            .collect()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn is_directory(&self, path: &str) -> bool {
        if self.directories.lock().unwrap().iter().any(|d| d == path) {
            return true;
        }
        let prefix = format!("{path}/");
        self.files
            .lock()
            .unwrap()
            .keys()
            .any(|file| file.starts_with(&prefix))
    }

    fn file_status_json(&self, name: &str, path: &str) -> Option<Value> {
        let files = self.files.lock().unwrap();
        if let Some(contents) = files.get(path) {
            return Some(json!({
                "length": contents.len(),
                "pathSuffix": name,
                "type": "FILE",
                "blockSize": 268_435_456u64,
                "accessTime": 1_700_000_000_000u64,
                "modificationTime": 1_700_000_000_000u64,
                "replication": 1,
                "permission": "640",
                "owner": "owner-guid",
                "group": "group-guid",
            }));
        }
        drop(files);
        if self.is_directory(path) {
            return Some(json!({
                "length": 0,
                "pathSuffix": name,
                "type": "DIRECTORY",
                "blockSize": 0,
                "accessTime": 1_700_000_000_000u64,
                "modificationTime": 1_700_000_000_000u64,
                "replication": 0,
                "permission": "770",
                "owner": "owner-guid",
                "group": "group-guid",
            }));
        }
        None
    }

    /// Direct children of `path`: (name, is_directory).
    fn children(&self, path: &str) -> Vec<(String, bool)> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        let mut children: BTreeMap<String, bool> = BTreeMap::new();

        for file in self.files.lock().unwrap().keys() {
            if let Some(rest) = file.strip_prefix(&prefix) {
                match rest.split_once('/') {
                    Some((dir, _)) => children.insert(dir.to_string(), true),
                    None => children.insert(rest.to_string(), false),
                };
            }
        }
        for dir in self.directories.lock().unwrap().iter() {
            if dir == "/" {
                continue;
            }
            if let Some(rest) = dir.strip_prefix(&prefix) {
                if !rest.is_empty() {
                    let name = rest.split('/').next().unwrap_or(rest).to_string();
                    children.insert(name, true);
                }
            }
        }
        children.into_iter().collect()
    }
}

fn remote_exception(status: StatusCode, exception: &str, message: &str) -> Response {
    let body = json!({
        "RemoteException": {
            "exception": exception,
            "message": message,
            "javaClassName": format!("com.example.store.{exception}"),
        }
    });
    (status, axum::Json(body)).into_response()
}

async fn handle(store: Arc<MockStore>, request: Request) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let query: HashMap<String, String> = uri
        .query()
        .map(|q| serde_urlencoded::from_str(q).unwrap_or_default())
        .unwrap_or_default();
    let op = query.get("op").cloned().unwrap_or_default();

    let raw_path = uri.path().to_string();
    let path = raw_path
        .strip_prefix("/webhdfs/v1")
        .or_else(|| raw_path.strip_prefix("/WebHdfsExt"))
        .unwrap_or(&raw_path)
        .to_string();
    let path = percent_decode(&path);

    let client_request_id = request
        .headers()
        .get("Client-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let client_latency = request
        .headers()
        .get("Client-Latency")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let body = axum::body::to_bytes(request.into_body(), 64 * 1024 * 1024)
        .await
        .unwrap_or_default();

    store.requests.lock().unwrap().push(SeenRequest {
        method: method.clone(),
        path: path.clone(),
        op: op.clone(),
        query: query.clone(),
        client_request_id,
        client_latency,
        body_len: body.len(),
    });

    // Scripted failures take precedence over real behavior.
    if let Some(statuses) = store.failures.lock().unwrap().get_mut(&op) {
        if !statuses.is_empty() {
            let status = statuses.remove(0);
            let status = StatusCode::from_u16(status).unwrap();
            return remote_exception(status, "RuntimeException", "scripted failure");
        }
    }

    match op.as_str() {
        "GETFILESTATUS" => {
            let name = path.rsplit('/').next().unwrap_or_default();
            match store.file_status_json(name, &path) {
                Some(status) => axum::Json(json!({ "FileStatus": status })).into_response(),
                None => remote_exception(
                    StatusCode::NOT_FOUND,
                    "FileNotFoundException",
                    &format!("File {path} does not exist."),
                ),
            }
        }
        "LISTSTATUS" => {
            if !store.is_directory(&path) {
                return remote_exception(
                    StatusCode::NOT_FOUND,
                    "FileNotFoundException",
                    &format!("Directory {path} does not exist."),
                );
            }
            let list_size: usize = query
                .get("listSize")
                .and_then(|v| v.parse().ok())
                .unwrap_or(usize::MAX);
            let start_after = query.get("startAfter");

            let mut statuses = Vec::new();
            for (name, _) in store
                .children(&path)
                .into_iter()
                .filter(|(name, _)| {
                    start_after.map_or(true, |cursor| name.as_str() > cursor.as_str())
                })
                .take(list_size)
            {
                let child_path = if path == "/" {
                    format!("/{name}")
                } else {
                    format!("{path}/{name}")
                };
                if let Some(status) = store.file_status_json(&name, &child_path) {
                    statuses.push(status);
                }
            }
            axum::Json(json!({ "FileStatuses": { "FileStatus": statuses } })).into_response()
        }
        "CREATE" => {
            let overwrite = query.get("overwrite").map(String::as_str) == Some("true");
            let mut files = store.files.lock().unwrap();
            if files.contains_key(&path) && !overwrite {
                return remote_exception(
                    StatusCode::FORBIDDEN,
                    "FileAlreadyExistsException",
                    &format!("File {path} already exists."),
                );
            }
            files.insert(path, body.to_vec());
            StatusCode::CREATED.into_response()
        }
        "APPEND" => {
            let mut files = store.files.lock().unwrap();
            let Some(contents) = files.get_mut(&path) else {
                return remote_exception(
                    StatusCode::NOT_FOUND,
                    "FileNotFoundException",
                    &format!("File {path} does not exist."),
                );
            };
            if let Some(offset) = query.get("offset").and_then(|v| v.parse::<usize>().ok()) {
                if offset != contents.len() {
                    return remote_exception(
                        StatusCode::BAD_REQUEST,
                        "BadOffsetException",
                        &format!(
                            "Append offset {offset} does not match stream length {}",
                            contents.len()
                        ),
                    );
                }
            }
            contents.extend_from_slice(&body);
            StatusCode::OK.into_response()
        }
        "OPEN" => {
            let files = store.files.lock().unwrap();
            let Some(contents) = files.get(&path) else {
                return remote_exception(
                    StatusCode::NOT_FOUND,
                    "FileNotFoundException",
                    &format!("File {path} does not exist."),
                );
            };
            let offset: usize = query
                .get("offset")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let length: usize = query
                .get("length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(contents.len());
            let start = offset.min(contents.len());
            let end = (offset + length).min(contents.len());
            Response::new(Body::from(contents[start..end].to_vec()))
        }
        "MKDIRS" => {
            store.directories.lock().unwrap().push(path);
            axum::Json(json!({ "boolean": true })).into_response()
        }
        "DELETE" => {
            let removed = store.files.lock().unwrap().remove(&path).is_some();
            store.directories.lock().unwrap().retain(|d| d != &path);
            axum::Json(json!({ "boolean": removed })).into_response()
        }
        other => remote_exception(
            StatusCode::BAD_REQUEST,
            "UnsupportedOperationException",
            &format!("Operation {other} is not supported by the mock"),
        ),
    }
}

fn percent_decode(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|c| (*c as char).to_digit(16)),
                bytes.get(i + 2).and_then(|c| (*c as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Starts the mock store server on an ephemeral port.
pub fn spawn_store_server(store: Arc<MockStore>) -> SocketAddr {
    spawn_server_with(move |request| {
        let store = Arc::clone(&store);
        async move { handle(store, request).await }
    })
}

/// Starts an arbitrary fallback handler on an ephemeral port.
pub fn spawn_server_with<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response> + Send + 'static,
{
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("failed to start mock runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            tx.send(listener.local_addr().unwrap()).unwrap();
            let app = axum::Router::new().fallback(move |request: Request| handler(request));
            axum::serve(listener, app).await.unwrap();
        });
    });
    rx.recv().expect("mock server failed to start")
}

/// Client options tuned for tests: insecure transport and millisecond backoff.
pub fn test_options() -> ClientOptions {
    ClientOptions::new()
        .with_insecure_transport()
        .with_exponential_backoff(4, Duration::from_millis(2), 2)
        .with_default_timeout(Duration::from_secs(10))
}

/// A client pointed at the mock server.
pub fn test_client(addr: SocketAddr) -> LakeClient {
    LakeClient::with_options(
        addr.to_string(),
        Arc::new(StaticTokenProvider::new("test-token")),
        test_options(),
    )
    .expect("failed to build client")
}
