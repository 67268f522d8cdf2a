//! Text-to-entity decoding.

use crate::error::{CodecError, CodecResult};
use cardsync_model::{Contact, Data, TypeInfo};

/// Decodes native-format text into a contact list.
///
/// Parameter names `GROUP` and `BKEY` are reserved for the group label
/// and the binary key; every other parameter becomes a type parameter.
/// Blank lines between contact frames are ignored.
pub fn decode_contacts(input: &str) -> CodecResult<Vec<Contact>> {
    let mut contacts = Vec::new();
    let mut open: Option<Vec<Data>> = None;

    for (index, line) in input.lines().enumerate() {
        let lineno = index + 1;
        match line {
            "BEGIN" => {
                if open.is_some() {
                    return Err(CodecError::NestedBegin { line: lineno });
                }
                open = Some(Vec::new());
            }
            "END" => match open.take() {
                Some(fields) => contacts.push(Contact::new(fields)),
                None => return Err(CodecError::EndWithoutBegin { line: lineno }),
            },
            "" => {
                if open.is_some() {
                    return Err(CodecError::MissingValueSeparator { line: lineno });
                }
            }
            field_line => match open.as_mut() {
                Some(fields) => fields.push(decode_field(field_line, lineno)?),
                None => return Err(CodecError::FieldOutsideContact { line: lineno }),
            },
        }
    }

    if open.is_some() {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(contacts)
}

/// Decodes a single field from its one-line form.
/// The counterpart of [`crate::encode_field_line`].
pub fn decode_field_line(line: &str) -> CodecResult<Data> {
    decode_field(line, 1)
}

fn decode_field(line: &str, lineno: usize) -> CodecResult<Data> {
    let separator =
        find_unescaped(line, ':').ok_or(CodecError::MissingValueSeparator { line: lineno })?;
    let (head, value) = (&line[..separator], &line[separator + 1..]);

    let mut segments = split_unescaped(head, ';').into_iter();
    let name = unescape(segments.next().unwrap_or_default());
    let mut field = Data::new(name, unescape(value));

    for segment in segments {
        let (pname, pvalue) = match find_unescaped(segment, '=') {
            Some(eq) => (&segment[..eq], &segment[eq + 1..]),
            None => (segment, ""),
        };
        let pname = unescape(pname);
        let pvalue = unescape(pvalue);

        if pname.eq_ignore_ascii_case("GROUP") {
            field = field.with_group(pvalue);
        } else if pname.eq_ignore_ascii_case("BKEY") {
            let key: u32 = pvalue
                .parse()
                .ok()
                .filter(|k| *k >= 1)
                .ok_or_else(|| CodecError::InvalidBinaryKey {
                    line: lineno,
                    value: pvalue.clone(),
                })?;
            field = field.with_bkey(key);
        } else {
            field = field.with_type(TypeInfo::new(pname, pvalue));
        }
    }

    Ok(field)
}

/// Returns the byte index of the first unescaped occurrence of `target`.
fn find_unescaped(s: &str, target: char) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == target {
            return Some(i);
        }
    }
    None
}

/// Splits on unescaped occurrences of `sep`.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(i) = find_unescaped(rest, sep) {
        parts.push(&rest[..i]);
        rest = &rest[i + sep.len_utf8()..];
    }
    parts.push(rest);
    parts
}

/// Reverses the encoder's escaping; an unknown escape keeps the
/// escaped character as-is.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_contacts;
    use proptest::prelude::*;

    #[test]
    fn decodes_groups_parameters_and_bkeys() {
        let text = "BEGIN\nN:Doe;Jane\nTEL;GROUP=home;TYPE=cell:555\nPHOTO;ENCODING=b;BKEY=3:AA\nEND\n";
        let contacts = decode_contacts(text).unwrap();

        assert_eq!(contacts.len(), 1);
        let contact = &contacts[0];
        assert_eq!(contact.id(), "Doe;Jane");

        let tel = contact.field("TEL").unwrap();
        assert_eq!(tel.group(), Some("home"));
        assert_eq!(tel.types().get(0).unwrap().name(), "TYPE");
        assert_eq!(tel.types().get(0).unwrap().value(), "cell");

        let photo = contact.field("PHOTO").unwrap();
        assert!(photo.is_binary());
        assert_eq!(photo.bkey(), Some(3));
    }

    #[test]
    fn escaped_separators_stay_literal() {
        let text = "BEGIN\nORG;GROUP=a\\;b:Acme:West\nEND\n";
        let contacts = decode_contacts(text).unwrap();
        let org = contacts[0].field("ORG").unwrap();

        assert_eq!(org.group(), Some("a;b"));
        assert_eq!(org.value(), "Acme:West");
    }

    #[test]
    fn frame_errors_are_positioned() {
        assert_eq!(
            decode_contacts("N:Doe\n").unwrap_err(),
            CodecError::FieldOutsideContact { line: 1 }
        );
        assert_eq!(
            decode_contacts("BEGIN\nBEGIN\n").unwrap_err(),
            CodecError::NestedBegin { line: 2 }
        );
        assert_eq!(
            decode_contacts("END\n").unwrap_err(),
            CodecError::EndWithoutBegin { line: 1 }
        );
        assert_eq!(
            decode_contacts("BEGIN\nN:x\n").unwrap_err(),
            CodecError::UnexpectedEof
        );
    }

    #[test]
    fn rejects_non_positive_binary_keys() {
        let err = decode_contacts("BEGIN\nPHOTO;BKEY=0:AA\nEND\n").unwrap_err();
        assert!(matches!(err, CodecError::InvalidBinaryKey { line: 2, .. }));
    }

    proptest! {
        #[test]
        fn values_roundtrip_through_escaping(value in "[ -~\n\\\\]{0,40}") {
            let contact = Contact::new(vec![Data::new("NOTE", value.clone())]);
            let text = encode_contacts(&[contact]);
            let parsed = decode_contacts(&text).unwrap();
            prop_assert_eq!(parsed[0].field("NOTE").unwrap().value(), value.as_str());
        }

        #[test]
        fn groups_roundtrip_through_escaping(group in "[a-z;:=\\\\]{1,20}") {
            let contact =
                Contact::new(vec![Data::new("TEL", "555").with_group(group.clone())]);
            let text = encode_contacts(&[contact]);
            let parsed = decode_contacts(&text).unwrap();
            prop_assert_eq!(parsed[0].field("TEL").unwrap().group(), Some(group.as_str()));
        }
    }
}
