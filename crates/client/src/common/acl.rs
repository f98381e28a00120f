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

//! POSIX-style ACL entries and octal permission helpers.
//!
//! Entries travel on the wire in their canonical string form
//! `[default:]type:name:rwx`; the permission field is omitted when an entry is
//! used as a removal template.

use std::{fmt, str::FromStr};

use lakestore_core::correctness::check_in_range_inclusive;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Error raised when parsing ACL strings or octal permission strings.
#[derive(Debug, Error)]
pub enum AclParseError {
    /// The entry string does not have the expected `[default:]type:name[:perm]` shape.
    #[error("Malformed ACL entry '{0}'")]
    MalformedEntry(String),
    /// Unknown ACL entry type token.
    #[error("Unknown ACL entry type '{0}'")]
    UnknownType(String),
    /// Unknown rwx permission token.
    #[error("Unknown rwx permission '{0}'")]
    UnknownAction(String),
    /// A mask or other entry carried a principal name.
    #[error("ACL entry type '{0}' must not carry a name")]
    UnexpectedName(String),
    /// Octal digit outside `[0, 7]`.
    #[error("Octal permission digit out of range: {0}")]
    OctalOutOfRange(u8),
    /// Permission string is not three octal digits.
    #[error("Malformed octal permission string '{0}'")]
    MalformedOctal(String),
}

/// Whether an entry applies to the object itself or is inherited by children.
#[derive(
    Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AclScope {
    /// Applies to the file or directory itself.
    Access,
    /// Inherited by new children of the directory.
    Default,
}

/// The principal class an entry refers to.
#[derive(
    Copy, Clone, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AclType {
    /// A named user, or the owning user when the name is empty.
    User,
    /// A named group, or the owning group when the name is empty.
    Group,
    /// Everyone else; never carries a name.
    Other,
    /// The effective-rights mask; never carries a name.
    Mask,
}

/// The eight values of a 3-bit rwx permission.
///
/// Discriminants equal the octal digit the action encodes, so
/// [`AclAction::from_octal`] and [`AclAction::ordinal`] are inverses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AclAction {
    /// `---`
    None = 0,
    /// `--x`
    Execute = 1,
    /// `-w-`
    Write = 2,
    /// `-wx`
    WriteExecute = 3,
    /// `r--`
    Read = 4,
    /// `r-x`
    ReadExecute = 5,
    /// `rw-`
    ReadWrite = 6,
    /// `rwx`
    All = 7,
}

impl AclAction {
    const RWX_FORMS: [&'static str; 8] = ["---", "--x", "-w-", "-wx", "r--", "r-x", "rw-", "rwx"];

    /// Returns the action whose bitwise value equals the octal digit `n`.
    ///
    /// # Errors
    ///
    /// Returns [`AclParseError::OctalOutOfRange`] when `n > 7`.
    pub fn from_octal(n: u8) -> Result<Self, AclParseError> {
        match n {
            0 => Ok(Self::None),
            1 => Ok(Self::Execute),
            2 => Ok(Self::Write),
            3 => Ok(Self::WriteExecute),
            4 => Ok(Self::Read),
            5 => Ok(Self::ReadExecute),
            6 => Ok(Self::ReadWrite),
            7 => Ok(Self::All),
            other => Err(AclParseError::OctalOutOfRange(other)),
        }
    }

    /// Parses an `rwx` permission token, case- and whitespace-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`AclParseError::UnknownAction`] for anything other than the
    /// eight dash-padded rwx forms.
    pub fn from_rwx(s: &str) -> Result<Self, AclParseError> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::RWX_FORMS
            .iter()
            .position(|form| *form == normalized)
            .map(|idx| Self::from_octal(idx as u8).expect("index in range"))
            .ok_or_else(|| AclParseError::UnknownAction(s.to_string()))
    }

    /// Returns the octal digit this action encodes.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AclAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::RWX_FORMS[self.ordinal() as usize])
    }
}

impl FromStr for AclAction {
    type Err = AclParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_rwx(s)
    }
}

/// One POSIX ACL entry: `(scope, type, name, action)`.
///
/// `action` is `None` when the entry is a removal template.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AclEntry {
    /// Access or default scope.
    pub scope: AclScope,
    /// The principal class.
    pub entry_type: AclType,
    /// Principal identifier; empty for the owning user/group, always empty for
    /// mask and other entries.
    pub name: String,
    /// The rwx permission, absent for removal templates.
    pub action: Option<AclAction>,
}

impl AclEntry {
    /// Creates a new [`AclEntry`].
    ///
    /// # Errors
    ///
    /// Returns [`AclParseError::UnexpectedName`] when a mask or other entry
    /// carries a non-empty name.
    pub fn new(
        scope: AclScope,
        entry_type: AclType,
        name: impl Into<String>,
        action: Option<AclAction>,
    ) -> Result<Self, AclParseError> {
        let name = name.into();
        if matches!(entry_type, AclType::Mask | AclType::Other) && !name.is_empty() {
            return Err(AclParseError::UnexpectedName(entry_type.to_string()));
        }
        Ok(Self {
            scope,
            entry_type,
            name,
            action,
        })
    }

    /// Serializes a list of entries into the comma-joined wire spec.
    #[must_use]
    pub fn to_spec(entries: &[Self]) -> String {
        entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses a comma-separated list of entry strings.
    ///
    /// # Errors
    ///
    /// Returns the first parse failure encountered.
    pub fn parse_spec(spec: &str) -> Result<Vec<Self>, AclParseError> {
        spec.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for AclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope == AclScope::Default {
            write!(f, "default:")?;
        }
        write!(f, "{}:{}", self.entry_type, self.name)?;
        if let Some(action) = self.action {
            write!(f, ":{action}")?;
        }
        Ok(())
    }
}

impl FromStr for AclEntry {
    type Err = AclParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();

        let (scope, rest) = match parts.first() {
            Some(first) if first.eq_ignore_ascii_case("default") => {
                (AclScope::Default, &parts[1..])
            }
            _ => (AclScope::Access, &parts[..]),
        };

        let (type_token, name, action) = match rest {
            [t, n] => (*t, *n, None),
            [t, n, p] => (*t, *n, Some(AclAction::from_rwx(p)?)),
            _ => return Err(AclParseError::MalformedEntry(s.to_string())),
        };

        let entry_type = AclType::from_str(type_token)
            .map_err(|_| AclParseError::UnknownType(type_token.to_string()))?;

        Self::new(scope, entry_type, name, action)
    }
}

/// Validates a three-octal-digit permission string such as `"755"`.
///
/// # Errors
///
/// Returns [`AclParseError::MalformedOctal`] unless `s` is exactly three
/// characters in `0..=7`.
pub fn check_octal_permission(s: &str) -> Result<(), AclParseError> {
    if s.len() != 3 {
        return Err(AclParseError::MalformedOctal(s.to_string()));
    }
    for c in s.chars() {
        let digit = c
            .to_digit(10)
            .ok_or_else(|| AclParseError::MalformedOctal(s.to_string()))?;
        check_in_range_inclusive(digit, 0, 7, "octal digit")
            .map_err(|_| AclParseError::MalformedOctal(s.to_string()))?;
    }
    Ok(())
}

/// Expands an octal permission string into `[owner, group, other]` actions.
///
/// # Errors
///
/// Returns [`AclParseError::MalformedOctal`] for malformed input.
pub fn octal_to_actions(s: &str) -> Result<[AclAction; 3], AclParseError> {
    check_octal_permission(s)?;
    let mut actions = [AclAction::None; 3];
    for (i, c) in s.chars().enumerate() {
        let digit = c.to_digit(8).expect("validated octal digit") as u8;
        actions[i] = AclAction::from_octal(digit)?;
    }
    Ok(actions)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
