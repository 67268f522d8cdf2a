//! Line/block framing with dot-stuffing.

use crate::error::{ProtocolError, ProtocolResult};
use std::io::{BufRead, Write};

/// The line terminating every block.
const END_OF_BLOCK: &str = ".";

/// Writes a block: each payload line dot-stuffed and newline-terminated,
/// followed by the end-of-block marker.
///
/// Payload lines must not contain `\n`; callers split multi-line text
/// with [`write_text_block`].
pub fn write_block<'a, W, I>(writer: &mut W, lines: I) -> ProtocolResult<()>
where
    W: Write,
    I: IntoIterator<Item = &'a str>,
{
    for line in lines {
        if line.starts_with('.') {
            writer.write_all(b".")?;
        }
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.write_all(END_OF_BLOCK.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Writes multi-line text as one block, splitting on newlines.
pub fn write_text_block<W: Write>(writer: &mut W, text: &str) -> ProtocolResult<()> {
    write_block(writer, text.lines())
}

/// Reads one block, unstuffing dotted lines, until the end-of-block
/// marker.
///
/// Fails with [`ProtocolError::UnexpectedEof`] when the stream ends
/// mid-block.
pub fn read_block<R: BufRead>(reader: &mut R) -> ProtocolResult<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        let read = reader.read_line(&mut raw)?;
        if read == 0 {
            return Err(ProtocolError::UnexpectedEof);
        }
        if raw.ends_with('\n') {
            raw.pop();
            if raw.ends_with('\r') {
                raw.pop();
            }
        }
        if raw == END_OF_BLOCK {
            return Ok(lines);
        }
        if let Some(stuffed) = raw.strip_prefix('.') {
            lines.push(stuffed.to_string());
        } else {
            lines.push(raw);
        }
    }
}

/// Reads one block and rejoins it into newline-terminated text.
pub fn read_text_block<R: BufRead>(reader: &mut R) -> ProtocolResult<String> {
    let lines = read_block(reader)?;
    let mut text = String::new();
    for line in lines {
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn roundtrip(lines: &[&str]) -> Vec<String> {
        let mut buf = Vec::new();
        write_block(&mut buf, lines.iter().copied()).unwrap();
        read_block(&mut Cursor::new(buf)).unwrap()
    }

    #[test]
    fn empty_block() {
        let mut buf = Vec::new();
        write_block(&mut buf, std::iter::empty()).unwrap();
        assert_eq!(buf, b".\n");
        assert!(read_block(&mut Cursor::new(buf)).unwrap().is_empty());
    }

    #[test]
    fn plain_lines_roundtrip() {
        assert_eq!(roundtrip(&["VERSION 1", "hello"]), vec!["VERSION 1", "hello"]);
    }

    #[test]
    fn lone_dot_line_is_stuffed() {
        let mut buf = Vec::new();
        write_block(&mut buf, [".", "..x", "end"].into_iter()).unwrap();
        assert_eq!(buf, b"..\n...x\nend\n.\n");

        let lines = read_block(&mut Cursor::new(buf)).unwrap();
        assert_eq!(lines, vec![".", "..x", "end"]);
    }

    #[test]
    fn eof_mid_block_is_an_error() {
        let result = read_block(&mut Cursor::new(b"half a block\n".to_vec()));
        assert!(matches!(result, Err(ProtocolError::UnexpectedEof)));
    }

    #[test]
    fn text_block_rejoins_lines() {
        let mut buf = Vec::new();
        write_text_block(&mut buf, "BEGIN\nN:Doe;Jane\nEND\n").unwrap();
        let text = read_text_block(&mut Cursor::new(buf)).unwrap();
        assert_eq!(text, "BEGIN\nN:Doe;Jane\nEND\n");
    }

    proptest! {
        #[test]
        fn any_lines_roundtrip(lines in proptest::collection::vec("[ -~.]{0,20}", 0..10)) {
            let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
            let mut buf = Vec::new();
            write_block(&mut buf, refs.iter().copied()).unwrap();
            let decoded = read_block(&mut Cursor::new(buf)).unwrap();
            prop_assert_eq!(decoded, lines);
        }
    }
}
