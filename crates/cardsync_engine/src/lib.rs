//! # CardSync Engine
//!
//! Client-side synchronization for CardSync.
//!
//! This crate provides:
//! - The three on-disk caches (`current/`, `original/`, `timestamps/`)
//! - The [`RemoteStore`] seam with wire-backed and mock implementations
//! - The sync decision procedure (GET / POST / PUT / no-op)
//! - Bounded retry with exponential backoff on race detection
//! - The [`ConflictResolver`] seam for the both-sides-changed case
//!
//! ## Decision procedure
//!
//! A sync compares the cached baseline timestamp against the server's
//! and picks exactly one action: no remote copy → **POST** the whole
//! resource; no local baseline → **GET** it; only the server changed →
//! **GET**; only local content changed → incremental **PUT** driven by
//! the diff engine; both changed → the conflict resolver decides or the
//! sync fails. A `SELECT` re-validation catches writers that raced the
//! decision; such attempts restart with backoff up to the retry budget.
//!
//! ## Key invariants
//!
//! - The server is authoritative; the baseline cache only advances on a
//!   server acknowledgement.
//! - Timestamp discrepancies within the grace tolerance (default two
//!   seconds) are attributed to clock skew, never to edits.
//! - Transport failures abort the attempt with no rollback of whatever
//!   was already transmitted.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod engine;
mod error;
mod remote;

pub use cache::CacheStore;
pub use config::{RetryConfig, SyncConfig};
pub use engine::{ConflictResolver, RefuseConflicts, Resolution, SyncEngine, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use remote::{MockRemote, RemoteStore, WireRemote};
