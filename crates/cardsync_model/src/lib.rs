//! # CardSync Model
//!
//! Entity model and diff engine for CardSync.
//!
//! This crate provides:
//! - `OwnedSeq` for ordered, dirty-tracking child sequences
//! - The contact entity tree (`Card` → `Contact` → `Data` → `TypeInfo`)
//! - `compare` for structural diffs between entity sequences
//! - The `Codec` seam consumed by card persistence
//!
//! This is a pure data-model crate; the only I/O it performs is reading
//! and writing the file a `Card` is bound to.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod card;
mod contact;
mod data;
mod diff;
mod error;
mod owned;

pub use card::{Binding, Card};
pub use contact::Contact;
pub use data::{Data, TypeInfo};
pub use diff::{compare, Diff, Keyed};
pub use error::{ModelError, ModelResult};
pub use owned::{OwnedSeq, Tracked};

/// Serialization seam between the entity model and a concrete text format.
///
/// Implementations must round-trip every field attribute losslessly:
/// groups, type parameters and binary-key placeholders included.
pub trait Codec {
    /// Parses serialized text into a contact list.
    fn parse(&self, input: &str) -> ModelResult<Vec<Contact>>;

    /// Serializes a contact list to text.
    fn serialize(&self, contacts: &[Contact]) -> String;

    /// Returns the format identifier for cards bound through this codec.
    fn format(&self) -> &str;
}
