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

//! Bearer token storage.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

/// Window before expiry, in seconds, within which a token is considered
/// about to expire.
pub const EXPIRY_WINDOW_SECS: i64 = 300;

/// An OAuth bearer token with its expiry instant.
///
/// Secret material is zeroized on drop and redacted from `Debug` output.
#[derive(Clone)]
pub struct Token {
    access_token: Zeroizing<String>,
    refresh_token: Option<Zeroizing<String>>,
    /// The instant at which the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Token))
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    /// Creates a new [`Token`].
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: Zeroizing::new(access_token),
            refresh_token: refresh_token.map(Zeroizing::new),
            expires_at,
        }
    }

    /// Returns the raw access token for header composition.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token, if one was issued.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().map(String::as_str)
    }

    /// Returns `true` when `expires_at - now` is inside the refresh window.
    #[must_use]
    pub fn is_about_to_expire(&self) -> bool {
        (self.expires_at - Utc::now()).num_seconds() < EXPIRY_WINDOW_SECS
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rstest::rstest;

    use super::*;

    fn token_expiring_in(minutes: i64) -> Token {
        Token::new(
            "secret-token".to_string(),
            None,
            Utc::now() + Duration::minutes(minutes),
        )
    }

    #[rstest]
    #[case(60, false)]
    #[case(6, false)]
    #[case(4, true)]
    #[case(-1, true)]
    fn test_expiry_window(#[case] minutes: i64, #[case] expected: bool) {
        assert_eq!(token_expiring_in(minutes).is_about_to_expire(), expected);
    }

    #[rstest]
    fn test_debug_redacts_secrets() {
        let token = Token::new(
            "super-secret".to_string(),
            Some("refresh-secret".to_string()),
            Utc::now(),
        );
        let dbg_out = format!("{token:?}");
        assert!(dbg_out.contains("<redacted>"));
        assert!(!dbg_out.contains("super-secret"));
        assert!(!dbg_out.contains("refresh-secret"));
    }
}
