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

//! Token provider abstraction consumed by the request engine.
//!
//! The acquisition protocols themselves (client credentials, refresh token,
//! device code, machine identity) are external collaborators: they plug in as
//! [`TokenSource`] implementations. The engine only depends on
//! [`TokenProvider::get_token`].

use std::{fmt::Debug, sync::Mutex};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::token::Token;

/// Error raised when a token cannot be acquired or refreshed.
///
/// Surfaced to callers with the original provider message; retry policies do
/// not retry authentication failures beyond the engine's single HTTP-401 retry.
#[derive(Debug, Error)]
#[error("Token acquisition failed: {message}")]
pub struct AuthError {
    /// The provider's failure description.
    pub message: String,
}

impl AuthError {
    /// Creates a new [`AuthError`] from the provider's failure description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A currently-valid bearer token supplier.
///
/// `get_token` may block. It must not be called with any other lock held.
pub trait TokenProvider: Send + Sync {
    /// Returns a token valid for at least the next request attempt.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when no valid token can be produced.
    fn get_token(&self) -> Result<Token, AuthError>;
}

/// A strategy that mints a fresh token (one of the external acquisition protocols).
pub trait TokenSource: Send + Sync {
    /// Obtains a fresh token from the authority.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the authority refuses or is unreachable.
    fn refresh(&self) -> Result<Token, AuthError>;
}

/// Caches the last token from a [`TokenSource`] and refreshes it when the
/// expiry window is entered.
///
/// Refresh is serialized per instance: the cache mutex is held across the
/// source call, so at most one refresh is in flight.
pub struct CachingTokenProvider<S> {
    source: S,
    cached: Mutex<Option<Token>>,
}

impl<S: Debug> Debug for CachingTokenProvider<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(CachingTokenProvider))
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<S: TokenSource> CachingTokenProvider<S> {
    /// Creates a new [`CachingTokenProvider`] wrapping `source`.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }
}

impl<S: TokenSource> TokenProvider for CachingTokenProvider<S> {
    fn get_token(&self) -> Result<Token, AuthError> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| AuthError::new("token cache poisoned"))?;

        if let Some(token) = cached.as_ref() {
            if !token.is_about_to_expire() {
                return Ok(token.clone());
            }
        }

        let fresh = self.source.refresh()?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

/// A fixed, never-refreshed token. Intended for tests and insecure transports.
#[derive(Debug)]
pub struct StaticTokenProvider {
    token: Token,
}

impl StaticTokenProvider {
    /// Creates a provider returning `access_token` forever.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            token: Token::new(
                access_token.into(),
                None,
                far_future(),
            ),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn get_token(&self) -> Result<Token, AuthError> {
        Ok(self.token.clone())
    }
}

fn far_future() -> DateTime<Utc> {
    Utc::now() + Duration::days(365 * 100)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
