//! # CardSync Protocol
//!
//! Wire protocol for CardSync: line/block framing, the command
//! vocabulary and the timestamp text encoding.
//!
//! The protocol is a newline-terminated text conversation. A **block**
//! is zero or more payload lines followed by a line holding exactly
//! `.`; payload lines beginning with a dot are dot-stuffed so a literal
//! `.` line remains representable. A **command** is a block whose first
//! line is a verb with an optional single parameter; some commands are
//! followed by one independent data block carrying a payload.
//!
//! Both peers open with a `VERSION <n>` block. The negotiated version
//! is the one reported by the peer; no compatibility gate is enforced.
//!
//! This crate is transport-agnostic: it frames over any `BufRead` /
//! `Write` pair and opens no sockets itself.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod error;
mod frame;
mod timestamp;

pub use command::Command;
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{read_block, read_text_block, write_block, write_text_block};
pub use timestamp::{format_timestamp, now_millis, parse_timestamp, UNKNOWN_TIMESTAMP};

/// Version advertised in the `VERSION` handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default TCP port for the card server.
pub const DEFAULT_PORT: u16 = 2626;
