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

//! Client-side content summarization.
//!
//! A one-shot parallel recursive traversal aggregating
//! `(length, file_count, directory_count)` over a directory tree. File
//! enumeration within a single directory is sequential; parallelism is
//! across directories, fanned out over a coordinated work queue whose
//! termination condition is "queue empty and nothing in flight".

use std::{
    collections::VecDeque,
    sync::{
        Condvar, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    thread,
};

use crate::{
    common::{
        consts::{SUMMARY_PAGE_SIZE, SUMMARY_WORKER_COUNT},
        enums::EntryType,
    },
    http::{
        client::{RequestBody, RequestEngine},
        error::LakeError,
        models::{ContentSummary, FileStatusesResponse},
        operation::Operation,
        query::ListStatusParamsBuilder,
        retry::ExponentialBackoffPolicy,
    },
};

/// A blocking work queue with an in-flight counter.
///
/// `poll` returns `None` exactly once the queue is empty *and* no worker is
/// still processing an item, at which point every waiter is woken to exit.
#[derive(Debug)]
struct ProcessingQueue<T> {
    inner: Mutex<QueueInner<T>>,
    cvar: Condvar,
}

#[derive(Debug)]
struct QueueInner<T> {
    items: VecDeque<T>,
    in_flight: usize,
}

impl<T> ProcessingQueue<T> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                in_flight: 0,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Enqueues an item. Never blocks.
    fn add(&self, item: T) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.items.push_back(item);
        drop(inner);
        self.cvar.notify_one();
    }

    /// Takes the next item, blocking while the queue is empty but work is
    /// still in flight. Returns `None` once the termination condition holds.
    fn poll(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        loop {
            if let Some(item) = inner.items.pop_front() {
                inner.in_flight += 1;
                return Some(item);
            }
            if inner.in_flight == 0 {
                self.cvar.notify_all();
                return None;
            }
            inner = self.cvar.wait(inner).expect("queue lock poisoned");
        }
    }

    /// Marks the current item done; wakes all waiters when termination is
    /// reached.
    fn unregister(&self) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.in_flight -= 1;
        if inner.items.is_empty() && inner.in_flight == 0 {
            drop(inner);
            self.cvar.notify_all();
        }
    }
}

/// Aggregates directory statistics by fanning enumeration out over a fixed
/// worker pool.
#[derive(Debug)]
pub(crate) struct ContentSummarizer<'a> {
    engine: &'a RequestEngine,
    queue: ProcessingQueue<String>,
    total_bytes: AtomicU64,
    file_count: AtomicU64,
    directory_count: AtomicU64,
    failure: Mutex<Option<LakeError>>,
}

impl<'a> ContentSummarizer<'a> {
    pub(crate) fn new(engine: &'a RequestEngine) -> Self {
        Self {
            engine,
            queue: ProcessingQueue::new(),
            total_bytes: AtomicU64::new(0),
            file_count: AtomicU64::new(0),
            directory_count: AtomicU64::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Traverses the tree rooted at `path` and returns the aggregate totals.
    ///
    /// The result is emitted exactly when every directory reachable from the
    /// root has been fully enumerated and every file contributed once.
    pub(crate) fn summarize(self, path: &str) -> Result<ContentSummary, LakeError> {
        // The root itself counts as one directory.
        self.directory_count.fetch_add(1, Ordering::Relaxed);
        self.queue.add(path.to_string());

        thread::scope(|scope| {
            for _ in 0..SUMMARY_WORKER_COUNT {
                scope.spawn(|| self.worker_loop());
            }
        });

        if let Some(error) = self
            .failure
            .lock()
            .expect("summarizer failure lock poisoned")
            .take()
        {
            return Err(error);
        }

        let length = self.total_bytes.load(Ordering::Relaxed);
        Ok(ContentSummary {
            length,
            file_count: self.file_count.load(Ordering::Relaxed),
            directory_count: self.directory_count.load(Ordering::Relaxed),
            space_consumed: length,
        })
    }

    fn worker_loop(&self) {
        while let Some(directory) = self.queue.poll() {
            if let Err(error) = self.process_directory(&directory) {
                let mut failure = self
                    .failure
                    .lock()
                    .expect("summarizer failure lock poisoned");
                failure.get_or_insert(error);
            }
            self.queue.unregister();
        }
    }

    /// Enumerates one directory page by page, tallying files and enqueueing
    /// child directories.
    fn process_directory(&self, path: &str) -> Result<(), LakeError> {
        let mut start_after: Option<String> = None;
        loop {
            let mut builder = ListStatusParamsBuilder::default();
            builder.list_size(SUMMARY_PAGE_SIZE);
            if let Some(cursor) = &start_after {
                builder.start_after(cursor.clone());
            }
            let params = builder.build().expect("list params are infallible");

            let mut policy = ExponentialBackoffPolicy::default();
            let response = self.engine.execute(
                Operation::ListStatus,
                path,
                &params,
                RequestBody::None,
                &mut policy,
                None,
            )?;
            if !response.successful {
                return Err(LakeError::operation(
                    response.into_failure(Operation::ListStatus, path),
                ));
            }
            let body = response
                .body
                .as_ref()
                .ok_or_else(|| LakeError::Protocol("LISTSTATUS returned no body".to_string()))?;
            let page: FileStatusesResponse = serde_json::from_slice(body)?;
            let entries = page.file_statuses.file_status;
            let page_len = entries.len();

            for status in &entries {
                match status.entry_type {
                    EntryType::Directory => {
                        self.directory_count.fetch_add(1, Ordering::Relaxed);
                        let child = if path == "/" {
                            format!("/{}", status.path_suffix)
                        } else {
                            format!("{path}/{}", status.path_suffix)
                        };
                        self.queue.add(child);
                    }
                    EntryType::File => {
                        self.file_count.fetch_add(1, Ordering::Relaxed);
                        self.total_bytes.fetch_add(status.length, Ordering::Relaxed);
                    }
                }
            }

            if page_len < SUMMARY_PAGE_SIZE as usize {
                return Ok(());
            }
            start_after = entries.last().map(|status| status.path_suffix.clone());
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_queue_terminates_when_drained() {
        let queue: ProcessingQueue<u32> = ProcessingQueue::new();
        queue.add(1);
        assert_eq!(queue.poll(), Some(1));
        queue.unregister();
        assert_eq!(queue.poll(), None);
        // Termination is sticky.
        assert_eq!(queue.poll(), None);
    }

    #[rstest]
    fn test_queue_releases_blocked_workers() {
        let queue: Arc<ProcessingQueue<u32>> = Arc::new(ProcessingQueue::new());
        queue.add(7);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                let mut seen = 0;
                while let Some(item) = queue.poll() {
                    seen += item;
                    // Simulate discovering one nested item from the first.
                    if item == 7 {
                        queue.add(3);
                    }
                    thread::sleep(Duration::from_millis(5));
                    queue.unregister();
                }
                seen
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
    }

    #[rstest]
    fn test_queue_in_flight_blocks_termination() {
        let queue: Arc<ProcessingQueue<u32>> = Arc::new(ProcessingQueue::new());
        queue.add(1);
        assert_eq!(queue.poll(), Some(1)); // in flight, queue empty

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.poll())
        };

        // The waiter must see the item added before unregister.
        thread::sleep(Duration::from_millis(20));
        queue.add(2);
        queue.unregister();

        assert_eq!(waiter.join().unwrap(), Some(2));
        queue.unregister();
        assert_eq!(queue.poll(), None);
    }
}
