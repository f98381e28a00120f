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

//! Opportunistic client-latency telemetry.
//!
//! A bounded queue of recent client-measured call records, drained a few at a
//! time into the `Client-Latency` header of subsequent requests. The ledger is
//! telemetry, not ground truth: writes are non-blocking, overflow is silently
//! dropped, and reader/writer ordering is not guaranteed.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::common::consts::{LATENCY_HEADER_MAX_ENTRIES, LATENCY_LEDGER_CAPACITY};

/// One client-measured call record.
#[derive(Clone, Debug)]
pub struct LatencyRecord {
    /// The full per-attempt client request id, including any retry suffix.
    pub client_request_id: String,
    /// Client-measured latency of the attempt in milliseconds.
    pub latency_ms: u64,
    /// Compact error marker; empty for successful attempts.
    pub error: Option<String>,
    /// Operation wire name.
    pub operation: String,
    /// Request body size in bytes.
    pub body_bytes: u64,
    /// The client instance id shared by all requests of this client.
    pub client_instance_id: String,
}

impl LatencyRecord {
    fn to_wire(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.client_request_id,
            self.latency_ms,
            self.error.as_deref().unwrap_or(""),
            self.operation,
            self.body_bytes,
            self.client_instance_id,
        )
    }
}

/// A fixed-capacity queue of latency records with non-blocking writes.
#[derive(Debug)]
pub struct LatencyLedger {
    entries: Mutex<VecDeque<String>>,
    enabled: AtomicBool,
    capacity: usize,
}

impl Default for LatencyLedger {
    fn default() -> Self {
        Self::new(LATENCY_LEDGER_CAPACITY)
    }
}

impl LatencyLedger {
    /// Creates a ledger with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            enabled: AtomicBool::new(true),
            capacity,
        }
    }

    /// Records one attempt. Never blocks: contention or overflow drops the record.
    pub fn record(&self, record: &LatencyRecord) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        if let Ok(mut entries) = self.entries.try_lock() {
            if entries.len() < self.capacity {
                entries.push_back(record.to_wire());
            }
        }
    }

    /// Drains up to three oldest records into a header value, or `None` when empty.
    pub fn drain_header(&self) -> Option<String> {
        if !self.enabled.load(Ordering::Relaxed) {
            return None;
        }
        let mut entries = match self.entries.try_lock() {
            Ok(entries) => entries,
            Err(_) => return None,
        };
        if entries.is_empty() {
            return None;
        }
        let n = entries.len().min(LATENCY_HEADER_MAX_ENTRIES);
        let drained: Vec<String> = entries.drain(..n).collect();
        Some(drained.join(";"))
    }

    /// Permanently disables the ledger, purging any queued records.
    ///
    /// Re-enabling is not part of the contract.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Returns the number of queued records.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("ledger lock poisoned").len()
    }

    /// Returns `true` when no records are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn record(id: &str) -> LatencyRecord {
        LatencyRecord {
            client_request_id: id.to_string(),
            latency_ms: 12,
            error: None,
            operation: "GETFILESTATUS".to_string(),
            body_bytes: 0,
            client_instance_id: "instance-1".to_string(),
        }
    }

    #[rstest]
    fn test_wire_format() {
        let mut rec = record("req-1.retry_2");
        rec.error = Some("HTTP503".to_string());
        rec.body_bytes = 4096;
        assert_eq!(
            rec.to_wire(),
            "req-1.retry_2,12,HTTP503,GETFILESTATUS,4096,instance-1"
        );
    }

    #[rstest]
    fn test_error_field_empty_when_successful() {
        assert_eq!(record("r").to_wire(), "r,12,,GETFILESTATUS,0,instance-1");
    }

    #[rstest]
    fn test_drains_up_to_three_oldest() {
        let ledger = LatencyLedger::default();
        for i in 0..5 {
            ledger.record(&record(&format!("req-{i}")));
        }
        let header = ledger.drain_header().unwrap();
        assert_eq!(header.matches(';').count(), 2);
        assert!(header.starts_with("req-0,"));
        assert!(header.contains("req-2,"));
        assert!(!header.contains("req-3,"));
        assert_eq!(ledger.len(), 2);
    }

    #[rstest]
    fn test_overflow_silently_dropped() {
        let ledger = LatencyLedger::new(2);
        for i in 0..10 {
            ledger.record(&record(&format!("req-{i}")));
        }
        assert_eq!(ledger.len(), 2);
    }

    #[rstest]
    fn test_disable_is_one_way() {
        let ledger = LatencyLedger::default();
        ledger.record(&record("req-0"));
        ledger.disable();
        assert!(ledger.is_empty());
        ledger.record(&record("req-1"));
        assert!(ledger.is_empty());
        assert!(ledger.drain_header().is_none());
    }

    #[rstest]
    fn test_empty_drain_is_none() {
        let ledger = LatencyLedger::default();
        assert!(ledger.drain_header().is_none());
    }
}
