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

//! Thread synchronization primitives.

use std::sync::{Condvar, Mutex};

/// A one-shot synchronization barrier which releases waiters once its count reaches zero.
///
/// Threads block on [`CountDownLatch::wait`] until [`CountDownLatch::count_down`] has been
/// invoked `count` times in total. Once released the latch stays open; further waits
/// return immediately.
#[derive(Debug)]
pub struct CountDownLatch {
    count: Mutex<usize>,
    cvar: Condvar,
}

impl CountDownLatch {
    /// Creates a new [`CountDownLatch`] with the given initial `count`.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            cvar: Condvar::new(),
        }
    }

    /// Decrements the count, releasing all waiters when it reaches zero.
    ///
    /// Counting down an already released latch is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn count_down(&self) {
        let mut count = self.count.lock().expect("latch lock poisoned");
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.cvar.notify_all();
            }
        }
    }

    /// Blocks the calling thread until the count reaches zero.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn wait(&self) {
        let mut count = self.count.lock().expect("latch lock poisoned");
        while *count > 0 {
            count = self.cvar.wait(count).expect("latch lock poisoned");
        }
    }

    /// Returns the current count.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.count.lock().expect("latch lock poisoned")
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
