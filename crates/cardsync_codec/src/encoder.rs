//! Entity-to-text encoding.

use cardsync_model::{Contact, Data};
use std::fmt::Write;

/// Encodes a contact list to the native text format.
///
/// Output is deterministic: the same entities always produce the same
/// text, field for field, parameter for parameter.
pub fn encode_contacts(contacts: &[Contact]) -> String {
    let mut out = String::new();
    for contact in contacts {
        out.push_str("BEGIN\n");
        for field in contact.fields().iter() {
            encode_field(&mut out, field);
        }
        out.push_str("END\n");
    }
    out
}

/// Encodes a single field as its one-line form, without the trailing
/// newline. Used for data-granular wire transfers.
pub fn encode_field_line(field: &Data) -> String {
    let mut out = String::new();
    encode_field(&mut out, field);
    out.pop();
    out
}

fn encode_field(out: &mut String, field: &Data) {
    out.push_str(field.name());
    if let Some(group) = field.group() {
        out.push_str(";GROUP=");
        out.push_str(&escape_token(group));
    }
    for info in field.types().iter() {
        out.push(';');
        out.push_str(&escape_token(info.name()));
        if !info.value().is_empty() {
            out.push('=');
            out.push_str(&escape_token(info.value()));
        }
    }
    if let Some(key) = field.bkey() {
        let _ = write!(out, ";BKEY={key}");
    }
    out.push(':');
    out.push_str(&escape_value(field.value()));
    out.push('\n');
}

/// Escapes a field value: backslash and newline only, since the value
/// runs to the end of the line.
pub(crate) fn escape_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Escapes a token position (group label, parameter name or value),
/// which additionally must not collide with the `;` / `:` / `=`
/// structure characters.
pub(crate) fn escape_token(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ';' => out.push_str("\\;"),
            ':' => out.push_str("\\:"),
            '=' => out.push_str("\\="),
            other => out.push(other),
        }
    }
    out
}
