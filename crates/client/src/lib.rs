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

//! Client SDK for the LakeStore hierarchical, append-only blob store.
//!
//! The `lakestore-client` crate provides a strongly-typed client over the
//! store's HTTPS REST surface (WebHDFS-compatible, with vendor extensions):
//! buffered read streams with shared readahead, lease-bound append streams,
//! directory enumeration and mutation, POSIX-style ACL manipulation, and
//! parallel content summarization.
//!
//! Key responsibilities handled internally:
//! - Bearer-token acquisition through a pluggable [`auth::TokenProvider`].
//! - Per-request retry policies with backoff (idempotent and non-idempotent).
//! - A process-wide readahead pool feeding every open input stream.
//! - Conversion of raw store errors into the rich [`http::error::LakeError`] enum.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod client;
pub mod common;
pub mod config;
pub mod http;
pub mod io;

pub(crate) mod summary;

// Re-exports
pub use crate::{
    auth::{StaticTokenProvider, Token, TokenProvider},
    client::LakeClient,
    common::{
        acl::{AclAction, AclEntry, AclScope, AclType},
        enums::{EntryType, ExpiryOption, IfExists, SyncFlag},
    },
    config::ClientOptions,
    http::{
        error::LakeError,
        models::{AclStatus, ContentSummary, DirectoryEntry},
    },
    io::{FileInputStream, FileOutputStream, PrefetchConfig, Prefetcher},
};
