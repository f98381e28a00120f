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

//! Per-request retry policies.
//!
//! A policy is consulted after every failed attempt with the HTTP status of
//! that attempt (`None` for transport failures with no status). When a policy
//! decides to retry it sleeps the backoff *before* returning `true`; the
//! request engine has no separate sleep step.
//!
//! Policies hold mutable attempt counters and are therefore constructed fresh
//! for every request, never shared across requests.

use std::{thread, time::Duration};

/// The single 401 retry wait applied by all policies (the token may have just
/// been refreshed).
const UNAUTHORIZED_RETRY_WAIT: Duration = Duration::from_millis(100);

/// Default maximum number of retries for the exponential policy.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Default initial backoff interval for the exponential policy.
pub const DEFAULT_BACKOFF_INTERVAL: Duration = Duration::from_millis(1000);

/// Default geometric factor for the exponential policy.
pub const DEFAULT_BACKOFF_FACTOR: u32 = 4;

/// Decides whether a failed attempt is retried, sleeping the backoff first.
pub trait RetryPolicy: Send {
    /// Returns `true` if the attempt should be retried, after sleeping the
    /// appropriate backoff. `http_status` is `None` for transport failures.
    fn should_retry(&mut self, http_status: Option<u16>, transport_error: bool) -> bool;
}

fn is_retryable_status(status: u16) -> bool {
    match status {
        401 | 408 | 429 => true,
        501 | 505 => false,
        s if (500..600).contains(&s) => true,
        _ => false,
    }
}

/// At-most-once policy: never retries, except a single retry on HTTP 401
/// after a 100 ms wait.
#[derive(Debug, Default)]
pub struct NoRetryPolicy {
    retried_unauthorized: bool,
}

impl NoRetryPolicy {
    /// Creates a new [`NoRetryPolicy`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetryPolicy for NoRetryPolicy {
    fn should_retry(&mut self, http_status: Option<u16>, _transport_error: bool) -> bool {
        if http_status == Some(401) && !self.retried_unauthorized {
            self.retried_unauthorized = true;
            thread::sleep(UNAUTHORIZED_RETRY_WAIT);
            return true;
        }
        false
    }
}

/// Default policy for idempotent operations: geometric backoff over the
/// retryable statuses (401, 408, 429, 5xx except 501/505) and any transport
/// failure.
///
/// With the contract defaults the sleep before the k-th retry (1-indexed) is
/// `1000 * 4^(k-1)` ms and no retry is attempted beyond the fourth.
#[derive(Debug)]
pub struct ExponentialBackoffPolicy {
    max_retries: u32,
    interval: Duration,
    factor: u32,
    retry_count: u32,
}

impl Default for ExponentialBackoffPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRIES,
            DEFAULT_BACKOFF_INTERVAL,
            DEFAULT_BACKOFF_FACTOR,
        )
    }
}

impl ExponentialBackoffPolicy {
    /// Creates a policy with explicit parameters.
    #[must_use]
    pub fn new(max_retries: u32, initial_interval: Duration, factor: u32) -> Self {
        Self {
            max_retries,
            interval: initial_interval,
            factor,
            retry_count: 0,
        }
    }

    /// Returns the number of retries performed so far.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the backoff that would be slept before the next retry.
    #[must_use]
    pub const fn next_interval(&self) -> Duration {
        self.interval
    }

    fn backoff_and_count(&mut self) -> bool {
        if self.retry_count >= self.max_retries {
            return false;
        }
        thread::sleep(self.interval);
        self.interval *= self.factor;
        self.retry_count += 1;
        true
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn should_retry(&mut self, http_status: Option<u16>, transport_error: bool) -> bool {
        let retryable = match http_status {
            Some(status) => is_retryable_status(status),
            None => transport_error,
        };
        if !retryable {
            return false;
        }
        self.backoff_and_count()
    }
}

/// Policy for non-idempotent operations (appends): no transport retries, a
/// single 401 retry after 100 ms, and up to four geometric-backoff retries on
/// 429 only (429 is guaranteed state-preserving).
#[derive(Debug)]
pub struct NonIdempotentRetryPolicy {
    retried_unauthorized: bool,
    throttle_backoff: ExponentialBackoffPolicy,
}

impl Default for NonIdempotentRetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl NonIdempotentRetryPolicy {
    /// Creates a new [`NonIdempotentRetryPolicy`] with contract defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            retried_unauthorized: false,
            throttle_backoff: ExponentialBackoffPolicy::default(),
        }
    }

    /// Returns the number of 429 retries performed so far.
    #[must_use]
    pub const fn throttle_retry_count(&self) -> u32 {
        self.throttle_backoff.retry_count()
    }
}

impl RetryPolicy for NonIdempotentRetryPolicy {
    fn should_retry(&mut self, http_status: Option<u16>, _transport_error: bool) -> bool {
        match http_status {
            Some(401) if !self.retried_unauthorized => {
                self.retried_unauthorized = true;
                thread::sleep(UNAUTHORIZED_RETRY_WAIT);
                true
            }
            Some(429) => self.throttle_backoff.backoff_and_count(),
            _ => false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(401, true)]
    #[case(408, true)]
    #[case(429, true)]
    #[case(500, true)]
    #[case(503, true)]
    #[case(599, true)]
    #[case(501, false)]
    #[case(505, false)]
    #[case(301, false)]
    #[case(400, false)]
    #[case(403, false)]
    #[case(404, false)]
    fn test_retryable_statuses(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(is_retryable_status(status), expected);
    }

    #[rstest]
    fn test_no_retry_policy_single_401() {
        let mut policy = NoRetryPolicy::new();
        assert!(policy.should_retry(Some(401), false));
        assert!(!policy.should_retry(Some(401), false));
        assert!(!policy.should_retry(Some(503), false));
        assert!(!policy.should_retry(None, true));
    }

    #[rstest]
    fn test_exponential_interval_progression() {
        // Contract defaults: 1000 * 4^(k-1) ms before the k-th retry.
        let policy = ExponentialBackoffPolicy::default();
        assert_eq!(policy.next_interval(), Duration::from_millis(1000));

        let mut policy = ExponentialBackoffPolicy::new(4, Duration::from_millis(1), 4);
        let mut intervals = Vec::new();
        while policy.should_retry(Some(503), false) {
            intervals.push(policy.next_interval());
        }
        // next_interval reports the *following* wait; the slept waits were 1, 4, 16, 64.
        assert_eq!(
            intervals,
            vec![
                Duration::from_millis(4),
                Duration::from_millis(16),
                Duration::from_millis(64),
                Duration::from_millis(256),
            ]
        );
        assert_eq!(policy.retry_count(), 4);
    }

    #[rstest]
    fn test_exponential_caps_at_max_retries() {
        let mut policy = ExponentialBackoffPolicy::new(2, Duration::from_millis(1), 2);
        assert!(policy.should_retry(Some(500), false));
        assert!(policy.should_retry(None, true));
        assert!(!policy.should_retry(Some(500), false));
        assert_eq!(policy.retry_count(), 2);
    }

    #[rstest]
    fn test_exponential_rejects_non_retryable_without_sleep() {
        let mut policy = ExponentialBackoffPolicy::default();
        let start = Instant::now();
        assert!(!policy.should_retry(Some(404), false));
        assert!(!policy.should_retry(Some(301), false));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(policy.retry_count(), 0);
    }

    #[rstest]
    fn test_exponential_sleeps_backoff() {
        let mut policy = ExponentialBackoffPolicy::new(2, Duration::from_millis(20), 2);
        let start = Instant::now();
        assert!(policy.should_retry(Some(503), false));
        assert!(policy.should_retry(Some(503), false));
        // Slept 20 ms + 40 ms.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[rstest]
    fn test_non_idempotent_throttle_only() {
        let mut policy = NonIdempotentRetryPolicy::new();
        assert!(!policy.should_retry(None, true)); // no transport retries
        assert!(!policy.should_retry(Some(503), false));
        assert!(policy.should_retry(Some(401), false));
        assert!(!policy.should_retry(Some(401), false));
    }

    #[rstest]
    fn test_non_idempotent_429_counted() {
        let mut policy = NonIdempotentRetryPolicy {
            retried_unauthorized: false,
            throttle_backoff: ExponentialBackoffPolicy::new(4, Duration::from_millis(1), 2),
        };
        for _ in 0..4 {
            assert!(policy.should_retry(Some(429), false));
        }
        assert!(!policy.should_retry(Some(429), false));
        assert_eq!(policy.throttle_retry_count(), 4);
    }
}
