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

//! Store path validation and URL encoding.
//!
//! Paths are UTF-8, slash-separated and absolute. Percent-encoding follows
//! RFC 3986; `+` is never used in place of space inside paths.

use lakestore_core::correctness::check_nonempty_string;

/// Validates a store path: absolute, no empty segments.
///
/// The root path `/` is valid. A trailing slash on any other path produces an
/// empty segment and is rejected.
///
/// # Errors
///
/// Returns an error describing the violated rule.
pub fn check_path(path: &str) -> anyhow::Result<()> {
    check_nonempty_string(path, "path")?;
    if !path.starts_with('/') {
        anyhow::bail!("invalid path '{path}', must be absolute");
    }
    if path.contains("//") {
        anyhow::bail!("invalid path '{path}', empty segments are forbidden");
    }
    if path.len() > 1 && path.ends_with('/') {
        anyhow::bail!("invalid path '{path}', trailing slash produces an empty segment");
    }
    Ok(())
}

/// Validates a client-wide path prefix prepended to every operation.
///
/// # Errors
///
/// Returns an error if the prefix is not a valid non-root path.
pub fn check_path_prefix(prefix: &str) -> anyhow::Result<()> {
    check_path(prefix)?;
    if prefix == "/" {
        anyhow::bail!("invalid path prefix '/', use no prefix instead");
    }
    Ok(())
}

/// Prepends the client path prefix, if any, to `path`.
#[must_use]
pub fn apply_prefix(prefix: Option<&str>, path: &str) -> String {
    match prefix {
        Some(prefix) if path == "/" => prefix.to_string(),
        Some(prefix) => format!("{prefix}{path}"),
        None => path.to_string(),
    }
}

/// Percent-encodes a validated path for use in a request URL.
///
/// Each segment is encoded independently per RFC 3986 and segments are
/// rejoined with literal slashes.
#[must_use]
pub fn encode_path(path: &str) -> String {
    if path == "/" {
        return path.to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("/", true)]
    #[case("/a", true)]
    #[case("/a/b/c", true)]
    #[case("", false)]
    #[case("a/b", false)]
    #[case("/a//b", false)]
    #[case("/a/", false)]
    fn test_check_path(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(check_path(path).is_ok(), expected);
    }

    #[rstest]
    #[case("/data", true)]
    #[case("/", false)]
    #[case("/data//x", false)]
    #[case("data", false)]
    fn test_check_path_prefix(#[case] prefix: &str, #[case] expected: bool) {
        assert_eq!(check_path_prefix(prefix).is_ok(), expected);
    }

    #[rstest]
    #[case(None, "/a/b", "/a/b")]
    #[case(Some("/tenant"), "/a/b", "/tenant/a/b")]
    #[case(Some("/tenant"), "/", "/tenant")]
    fn test_apply_prefix(
        #[case] prefix: Option<&str>,
        #[case] path: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(apply_prefix(prefix, path), expected);
    }

    #[rstest]
    #[case("/", "/")]
    #[case("/plain/path", "/plain/path")]
    #[case("/with space/x", "/with%20space/x")]
    #[case("/a+b/c", "/a%2Bb/c")] // '+' must be encoded, never space
    #[case("/q?/v#w", "/q%3F/v%23w")]
    fn test_encode_path(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(encode_path(path), expected);
    }
}
