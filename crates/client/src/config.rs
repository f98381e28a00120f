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

//! Configuration structures for the LakeStore client.

use std::time::Duration;

use lakestore_core::consts::LAKESTORE_USER_AGENT;

use crate::{
    common::{
        consts::{DEFAULT_READ_AHEAD_QUEUE_DEPTH, DEFAULT_TIMEOUT},
        enums::SslChannelMode,
        path::check_path_prefix,
    },
    http::retry::{DEFAULT_BACKOFF_FACTOR, DEFAULT_BACKOFF_INTERVAL, DEFAULT_MAX_RETRIES},
};

/// Per-client options; replaced atomically as a whole via the facade setter.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Prefix prepended to every operation path; must be absolute with no
    /// empty segments.
    pub file_path_prefix: Option<String>,
    /// Switch the scheme to plain HTTP. Test use only.
    pub insecure_transport: bool,
    /// Surface remote class names as the error kind when they denote I/O errors.
    pub throw_remote_exceptions: bool,
    /// Appended to the built-in user agent.
    pub user_agent_suffix: Option<String>,
    /// Look-ahead requests queued per stream fill; 0 disables prefetch.
    pub read_ahead_queue_depth: u32,
    /// Per-attempt operation timeout.
    pub default_timeout: Duration,
    /// TLS channel implementation hint for the transport collaborator.
    pub ssl_channel_mode: SslChannelMode,
    /// Maximum retries for the exponential backoff policy.
    pub backoff_max_retries: u32,
    /// Initial interval for the exponential backoff policy.
    pub backoff_initial_interval: Duration,
    /// Geometric factor for the exponential backoff policy.
    pub backoff_factor: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            file_path_prefix: None,
            insecure_transport: false,
            throw_remote_exceptions: false,
            user_agent_suffix: None,
            read_ahead_queue_depth: DEFAULT_READ_AHEAD_QUEUE_DEPTH,
            default_timeout: DEFAULT_TIMEOUT,
            ssl_channel_mode: SslChannelMode::Default,
            backoff_max_retries: DEFAULT_MAX_RETRIES,
            backoff_initial_interval: DEFAULT_BACKOFF_INTERVAL,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl ClientOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client-wide path prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is not an absolute path free of empty
    /// segments.
    pub fn with_file_path_prefix(mut self, prefix: impl Into<String>) -> anyhow::Result<Self> {
        let prefix = prefix.into();
        check_path_prefix(&prefix)?;
        self.file_path_prefix = Some(prefix);
        Ok(self)
    }

    /// Enables plain-HTTP transport for tests against local mock servers.
    #[must_use]
    pub fn with_insecure_transport(mut self) -> Self {
        self.insecure_transport = true;
        self
    }

    /// Surfaces remote I/O exception class names as the error kind.
    #[must_use]
    pub fn with_throw_remote_exceptions(mut self) -> Self {
        self.throw_remote_exceptions = true;
        self
    }

    /// Appends `suffix` to the built-in user agent.
    #[must_use]
    pub fn with_user_agent_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.user_agent_suffix = Some(suffix.into());
        self
    }

    /// Sets the per-stream readahead queue depth; 0 disables prefetch.
    #[must_use]
    pub fn with_read_ahead_queue_depth(mut self, depth: u32) -> Self {
        self.read_ahead_queue_depth = depth;
        self
    }

    /// Sets the per-attempt operation timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the TLS channel mode hint.
    #[must_use]
    pub fn with_ssl_channel_mode(mut self, mode: SslChannelMode) -> Self {
        self.ssl_channel_mode = mode;
        self
    }

    /// Tunes the exponential backoff policy used for idempotent operations.
    #[must_use]
    pub fn with_exponential_backoff(
        mut self,
        max_retries: u32,
        initial_interval: Duration,
        factor: u32,
    ) -> Self {
        self.backoff_max_retries = max_retries;
        self.backoff_initial_interval = initial_interval;
        self.backoff_factor = factor;
        self
    }

    /// Returns the full user agent including any configured suffix.
    #[must_use]
    pub fn user_agent(&self) -> String {
        match &self.user_agent_suffix {
            Some(suffix) => format!("{LAKESTORE_USER_AGENT} {suffix}"),
            None => LAKESTORE_USER_AGENT.to_string(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert!(!options.insecure_transport);
        assert_eq!(options.read_ahead_queue_depth, DEFAULT_READ_AHEAD_QUEUE_DEPTH);
        assert_eq!(options.default_timeout, Duration::from_secs(60));
        assert_eq!(options.backoff_max_retries, 4);
    }

    #[rstest]
    fn test_path_prefix_validated() {
        assert!(ClientOptions::new().with_file_path_prefix("/tenant/a").is_ok());
        assert!(ClientOptions::new().with_file_path_prefix("/tenant//a").is_err());
        assert!(ClientOptions::new().with_file_path_prefix("tenant").is_err());
    }

    #[rstest]
    fn test_user_agent_suffix() {
        let options = ClientOptions::new().with_user_agent_suffix("myapp/1.2");
        let agent = options.user_agent();
        assert!(agent.starts_with("LakeStoreSDK-Rust/"));
        assert!(agent.ends_with(" myapp/1.2"));
    }
}
