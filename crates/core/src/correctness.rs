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

//! Functions for correctness checks similar to the *design by contract* philosophy.
//!
//! A condition is a predicate which must be true just prior to the execution of
//! some section of code. An [`anyhow::Result`] is returned with a descriptive
//! message when the condition check fails.

use std::fmt::Display;

/// Checks the `predicate` is true.
///
/// # Errors
///
/// Returns an error if the validation check fails.
#[inline(always)]
pub fn check_predicate_true(predicate: bool, fail_msg: &str) -> anyhow::Result<()> {
    if !predicate {
        anyhow::bail!("{fail_msg}")
    }
    Ok(())
}

/// Checks if the string `s` is not empty.
///
/// # Errors
///
/// This function returns an error if `s` is empty.
#[inline(always)]
pub fn check_nonempty_string<T: AsRef<str>>(s: T, param: &str) -> anyhow::Result<()> {
    if s.as_ref().is_empty() {
        anyhow::bail!("invalid string for '{param}', was empty");
    }
    Ok(())
}

/// Checks the value is positive (> 0).
///
/// # Errors
///
/// Returns an error if `value` is zero or negative.
#[inline(always)]
pub fn check_positive<T: PartialOrd + Default + Display>(value: T, param: &str) -> anyhow::Result<()> {
    if value <= T::default() {
        anyhow::bail!("invalid value for '{param}' not positive, was {value}");
    }
    Ok(())
}

/// Checks the `value` is within the inclusive range [`low`, `high`].
///
/// # Errors
///
/// Returns an error if `value` lies outside the range.
#[inline(always)]
pub fn check_in_range_inclusive<T: PartialOrd + Display>(
    value: T,
    low: T,
    high: T,
    param: &str,
) -> anyhow::Result<()> {
    if value < low || value > high {
        anyhow::bail!("invalid value for '{param}' out of range [{low}, {high}], was {value}");
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(true, true)]
    #[case(false, false)]
    fn test_check_predicate_true(#[case] predicate: bool, #[case] expected: bool) {
        assert_eq!(check_predicate_true(predicate, "failed").is_ok(), expected);
    }

    #[rstest]
    fn test_check_nonempty_string() {
        assert!(check_nonempty_string("abc", "param").is_ok());
        assert!(check_nonempty_string("", "param").is_err());
    }

    #[rstest]
    #[case(1_i64, true)]
    #[case(0_i64, false)]
    #[case(-1_i64, false)]
    fn test_check_positive(#[case] value: i64, #[case] expected: bool) {
        assert_eq!(check_positive(value, "param").is_ok(), expected);
    }

    #[rstest]
    #[case(0_u64, true)]
    #[case(7_u64, true)]
    #[case(8_u64, false)]
    fn test_check_in_range_inclusive(#[case] value: u64, #[case] expected: bool) {
        assert_eq!(
            check_in_range_inclusive(value, 0, 7, "param").is_ok(),
            expected
        );
    }
}
