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

//! Integration tests for the request engine and facade using a mock server.

mod common;

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use axum::{http::StatusCode, response::IntoResponse};
use lakestore_client::{EntryType, IfExists, LakeClient, LakeError, StaticTokenProvider};
use rstest::rstest;
use serde_json::json;

use common::{MockStore, spawn_server_with, spawn_store_server, test_client, test_options};

fn load_test_data(filename: &str) -> serde_json::Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(filename);
    let content = std::fs::read_to_string(path).expect("failed to read test data");
    serde_json::from_str(&content).expect("failed to parse test data")
}

#[rstest]
fn test_get_directory_entry_parses_status() {
    let store = MockStore::new();
    store.seed_file("/data/report.bin", &[0u8; 1024]);
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    let entry = client.get_directory_entry("/data/report.bin").unwrap();
    assert_eq!(entry.name, "report.bin");
    assert_eq!(entry.full_path, "/data/report.bin");
    assert_eq!(entry.length, 1024);
    assert_eq!(entry.entry_type, EntryType::File);
    assert_eq!(entry.permission, "640");
}

#[rstest]
fn test_check_exists() {
    let store = MockStore::new();
    store.seed_file("/data/present", b"x");
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    assert!(client.check_exists("/data/present").unwrap());
    assert!(!client.check_exists("/data/absent").unwrap());
}

#[rstest]
fn test_enumerate_directory_with_attribute_arrays() {
    // A listing whose second entry carries per-entry attribute markers;
    // both full paths must come back verbatim.
    let payload = load_test_data("liststatus_two_entries.json");
    let addr = spawn_server_with(move |_request| {
        let payload = payload.clone();
        async move { axum::Json(payload).into_response() }
    });
    let client = test_client(addr);

    let entries = client.enumerate_directory("/TestShare").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].full_path, "/TestShare/Test01");
    assert_eq!(entries[1].full_path, "/TestShare/Test02");
    assert!(entries[0].attributes.is_empty());
    assert_eq!(entries[1].attributes, vec!["Share", "PartOfShare"]);
}

#[rstest]
fn test_enumerate_directory_pages_with_cursor() {
    let store = MockStore::new();
    for i in 0..10 {
        store.seed_file(&format!("/dir/f{i:02}"), b"x");
    }
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    // Force paging by asking for three entries at a time.
    let entries = client.enumerate_directory_limited("/dir", 7).unwrap();
    assert_eq!(entries.len(), 7);
    assert_eq!(entries[0].name, "f00");
    assert_eq!(entries[6].name, "f06");

    let all = client.enumerate_directory("/dir").unwrap();
    assert_eq!(all.len(), 10);
}

#[rstest]
fn test_append_retries_through_500_then_succeeds() {
    // Create overwrite, append the payload, server answers the append with
    // 500 then 200; the retry succeeds and no error surfaces.
    let store = MockStore::new();
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    let mut stream = client.create_file("/retry/data.txt", IfExists::Overwrite).unwrap();
    store.fail_next("APPEND", &[500]);
    stream.write(b"Test string with data\n").unwrap();
    stream.flush().unwrap();
    stream.close().unwrap();

    assert_eq!(
        store.file("/retry/data.txt").unwrap(),
        b"Test string with data\n"
    );
}

#[rstest]
fn test_exponential_retry_exhaustion_timing() {
    // Persistent 503: four retries with geometric backoff, then the error
    // surfaces carrying the full attempt record.
    let counter = Arc::new(AtomicUsize::new(0));
    let handler_counter = Arc::clone(&counter);
    let addr = spawn_server_with(move |_request| {
        let counter = Arc::clone(&handler_counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(json!({
                    "RemoteException": {
                        "exception": "ServerBusyException",
                        "message": "try again later",
                        "javaClassName": "com.example.store.ServerBusyException",
                    }
                })),
            )
                .into_response()
        }
    });

    let client = LakeClient::with_options(
        addr.to_string(),
        Arc::new(StaticTokenProvider::new("token")),
        test_options().with_exponential_backoff(4, Duration::from_millis(8), 4),
    )
    .unwrap();

    let start = Instant::now();
    let error = client.get_directory_entry("/x").unwrap_err();
    let elapsed = start.elapsed();

    // Five attempts total; waits of 8 + 32 + 128 + 512 ms between them.
    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert!(elapsed >= Duration::from_millis(680));
    match &error {
        LakeError::Operation(failure) => {
            assert_eq!(failure.http_status, 503);
            assert_eq!(failure.num_retries, 4);
            assert_eq!(
                failure.remote_exception.as_ref().unwrap().exception,
                "ServerBusyException"
            );
            assert_eq!(failure.exception_history.len(), 5);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn test_client_request_id_carries_retry_suffix() {
    let store = MockStore::new();
    store.seed_file("/ids/file", b"content");
    store.fail_next("GETFILESTATUS", &[500]);
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    client.get_directory_entry("/ids/file").unwrap();

    let seen = store.requests_for("GETFILESTATUS");
    assert_eq!(seen.len(), 2);
    let first = seen[0].client_request_id.as_ref().unwrap();
    let second = seen[1].client_request_id.as_ref().unwrap();
    assert_eq!(*second, format!("{first}.retry_1"));
}

#[rstest]
fn test_latency_header_piggybacks_prior_calls() {
    let store = MockStore::new();
    store.seed_file("/lat/file", b"content");
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    client.get_directory_entry("/lat/file").unwrap();
    client.get_directory_entry("/lat/file").unwrap();

    let seen = store.requests_for("GETFILESTATUS");
    assert_eq!(seen.len(), 2);
    assert!(seen[0].client_latency.is_none());
    let header = seen[1].client_latency.as_ref().unwrap();
    assert!(header.contains("GETFILESTATUS"));

    // Disabling telemetry is one-way; no further headers are sent.
    client.disable_telemetry();
    client.get_directory_entry("/lat/file").unwrap();
    client.get_directory_entry("/lat/file").unwrap();
    let seen = store.requests_for("GETFILESTATUS");
    assert!(seen[3].client_latency.is_none());
}

#[rstest]
fn test_create_overwrite_tolerates_exists_race() {
    let addr = spawn_server_with(move |request| async move {
        let query = request.uri().query().unwrap_or_default().to_string();
        if query.contains("op=CREATE") {
            (
                StatusCode::FORBIDDEN,
                axum::Json(json!({
                    "RemoteException": {
                        "exception": "FileAlreadyExistsException",
                        "message": "/race/file exists",
                        "javaClassName": "java.io.FileAlreadyExistsException",
                    }
                })),
            )
                .into_response()
        } else {
            // Appends from the returned stream succeed.
            StatusCode::OK.into_response()
        }
    });
    let client = test_client(addr);

    // Overwrite mode: the 403 race is swallowed and a usable stream returned.
    let mut stream = client.create_file("/race/file", IfExists::Overwrite).unwrap();
    stream.close().unwrap();

    // Exclusive mode surfaces the failure.
    let error = client.create_file("/race/file", IfExists::Fail).unwrap_err();
    assert_eq!(error.remote_exception_name(), Some("FileAlreadyExistsException"));
}

#[rstest]
fn test_delete_root_rejected_client_side() {
    let store = MockStore::new();
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    let error = client.delete("/").unwrap_err();
    assert!(matches!(error, LakeError::InvalidInput(_)));
    assert!(store.requests_for("DELETE").is_empty());
}

#[rstest]
fn test_delete_and_mkdirs_round_trip() {
    let store = MockStore::new();
    store.seed_file("/tmp/doomed", b"x");
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    assert!(client.create_directory("/tmp/newdir", Some("750")).unwrap());
    assert!(client.delete("/tmp/doomed").unwrap());
    assert!(!client.delete("/tmp/doomed").unwrap());
}

#[rstest]
fn test_bad_offset_recovery_confirms_committed_append() {
    // The first append lands server-side but the client sees a scripted 500
    // and retries; the replay hits BadOffsetException; the zero-length probe
    // at the advanced cursor confirms the data arrived and no error surfaces.
    #[derive(Default)]
    struct State {
        committed: std::sync::Mutex<Vec<u8>>,
        appends: AtomicUsize,
    }
    let state = Arc::new(State::default());
    let handler_state = Arc::clone(&state);

    let addr = spawn_server_with(move |request| {
        let state = Arc::clone(&handler_state);
        async move {
            let query: std::collections::HashMap<String, String> = request
                .uri()
                .query()
                .map(|q| serde_urlencoded::from_str(q).unwrap_or_default())
                .unwrap_or_default();
            let op = query.get("op").cloned().unwrap_or_default();
            let body = axum::body::to_bytes(request.into_body(), 1 << 20)
                .await
                .unwrap_or_default();

            match op.as_str() {
                "CREATE" => StatusCode::CREATED.into_response(),
                "APPEND" => {
                    let n = state.appends.fetch_add(1, Ordering::SeqCst);
                    let mut committed = state.committed.lock().unwrap();
                    let offset: usize = query
                        .get("offset")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(committed.len());

                    if n == 0 {
                        // Commit the bytes but report a spurious failure.
                        committed.extend_from_slice(&body);
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            axum::Json(json!({
                                "RemoteException": {
                                    "exception": "RuntimeException",
                                    "message": "connection dropped after commit",
                                    "javaClassName": "java.lang.RuntimeException",
                                }
                            })),
                        )
                            .into_response();
                    }
                    if offset != committed.len() {
                        return (
                            StatusCode::BAD_REQUEST,
                            axum::Json(json!({
                                "RemoteException": {
                                    "exception": "BadOffsetException",
                                    "message": format!(
                                        "offset {offset} != length {}",
                                        committed.len()
                                    ),
                                    "javaClassName": "com.example.store.BadOffsetException",
                                }
                            })),
                        )
                            .into_response();
                    }
                    committed.extend_from_slice(&body);
                    StatusCode::OK.into_response()
                }
                _ => StatusCode::OK.into_response(),
            }
        }
    });
    let client = test_client(addr);

    let mut stream = client.create_file("/heal/file", IfExists::Overwrite).unwrap();
    stream.write(b"payload-under-test").unwrap();
    // Flush triggers: append (committed + 500) -> retry (BadOffset) -> probe
    // at the advanced offset (succeeds) -> error swallowed.
    stream.flush().unwrap();
    stream.close().unwrap();

    assert_eq!(&*state.committed.lock().unwrap(), b"payload-under-test");
    // Initial append + replay + probe + close marker.
    assert_eq!(state.appends.load(Ordering::SeqCst), 4);
}

#[rstest]
fn test_content_summary_over_mock_tree() {
    let store = MockStore::new();
    store.seed_directory("/tree");
    store.seed_directory("/tree/empty");
    store.seed_file("/tree/a/f1", &[0u8; 100]);
    store.seed_file("/tree/a/f2", &[0u8; 50]);
    store.seed_file("/tree/a/b/f3", &[0u8; 25]);
    store.seed_file("/tree/f4", &[0u8; 7]);
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    let summary = client.get_content_summary("/tree").unwrap();
    assert_eq!(summary.length, 182);
    assert_eq!(summary.file_count, 4);
    // /tree itself, /tree/a, /tree/a/b, /tree/empty.
    assert_eq!(summary.directory_count, 4);
    assert_eq!(summary.space_consumed, summary.length);
}

#[rstest]
fn test_content_summary_of_single_file() {
    let store = MockStore::new();
    store.seed_file("/solo.bin", &[0u8; 42]);
    let client = test_client(spawn_store_server(Arc::clone(&store)));

    let summary = client.get_content_summary("/solo.bin").unwrap();
    assert_eq!(summary.length, 42);
    assert_eq!(summary.file_count, 1);
    assert_eq!(summary.directory_count, 0);
}

#[rstest]
fn test_path_prefix_prepended_to_operations() {
    let store = MockStore::new();
    store.seed_file("/tenant/data/file", b"prefixed");
    let client = LakeClient::with_options(
        spawn_store_server(Arc::clone(&store)).to_string(),
        Arc::new(StaticTokenProvider::new("token")),
        test_options().with_file_path_prefix("/tenant").unwrap(),
    )
    .unwrap();

    let entry = client.get_directory_entry("/data/file").unwrap();
    assert_eq!(entry.length, 8);
    let seen = store.requests_for("GETFILESTATUS");
    assert_eq!(seen[0].path, "/tenant/data/file");
}
