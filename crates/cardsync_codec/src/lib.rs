//! # CardSync Codec
//!
//! The native text serialization for CardSync entities.
//!
//! One contact per `BEGIN` / `END` frame, one field per line:
//!
//! ```text
//! BEGIN
//! N:Doe;Jane
//! TEL;GROUP=home;TYPE=cell:555-1234
//! PHOTO;ENCODING=b;BKEY=1:aGVsbG8=
//! END
//! ```
//!
//! The encoding is deterministic (identical entities produce identical
//! text, so digests over serialized content are stable) and lossless:
//! groups, type parameters and binary-key placeholders all round-trip.
//!
//! This crate performs no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;

pub use decoder::{decode_contacts, decode_field_line};
pub use encoder::{encode_contacts, encode_field_line};
pub use error::{CodecError, CodecResult};

use cardsync_model::{Codec, Contact, ModelError, ModelResult};

/// Format identifier declared on cards bound through this codec.
pub const FORMAT: &str = "cardsync-text";

/// The native text codec, usable wherever the model expects a
/// [`Codec`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn parse(&self, input: &str) -> ModelResult<Vec<Contact>> {
        decode_contacts(input).map_err(|e| ModelError::codec(e.to_string()))
    }

    fn serialize(&self, contacts: &[Contact]) -> String {
        encode_contacts(contacts)
    }

    fn format(&self) -> &str {
        FORMAT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsync_model::{Data, TypeInfo};

    #[test]
    fn codec_trait_roundtrip() {
        let contact = Contact::new(vec![
            Data::new("N", "Doe;Jane"),
            Data::new("TEL", "555-1234").with_group("home"),
            Data::new("PHOTO", "aGVsbG8=")
                .with_type(TypeInfo::new("ENCODING", "b"))
                .with_bkey(1),
        ]);

        let codec = TextCodec;
        let text = codec.serialize(&[contact]);
        let parsed = codec.parse(&text).unwrap();

        assert_eq!(parsed.len(), 1);
        let contact = &parsed[0];
        assert_eq!(contact.id(), "Doe;Jane");
        assert_eq!(contact.field("TEL").unwrap().group(), Some("home"));
        assert_eq!(contact.field("PHOTO").unwrap().bkey(), Some(1));
        assert!(contact.field("PHOTO").unwrap().is_binary());
    }
}
