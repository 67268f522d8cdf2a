//! Per-connection protocol session.

use crate::error::{ServerError, ServerResult};
use crate::store::CardStore;
use cardsync_codec::{decode_field_line, encode_contacts, encode_field_line, TextCodec};
use cardsync_model::{Codec, Contact};
use cardsync_protocol::{
    format_timestamp, now_millis, read_block, read_text_block, write_block, write_text_block,
    Command, ProtocolError, PROTOCOL_VERSION, UNKNOWN_TIMESTAMP,
};
use sha2::{Digest, Sha256};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

const HELP_LINES: &[&str] = &[
    "VERSION TIME STOP LIST HELP SELECT",
    "GET_CARD PUT_CARD POST_CARD DELETE_CARD",
    "HASH_CONTACT LIST_CONTACT GET_CONTACT PUT_CONTACT POST_CONTACT DELETE_CONTACT",
    "HASH_DATA LIST_DATA GET_DATA POST_DATA DELETE_DATA",
];

enum Flow {
    Continue,
    Stop,
}

/// One protocol conversation over a connected stream pair.
///
/// The session walks `Connected → VersionExchanged → CommandLoop →
/// Closed`. Any protocol violation is fatal for the connection and
/// surfaces as an error from [`Session::run`]; the server it belongs
/// to is unaffected.
pub struct Session<R, W> {
    reader: R,
    writer: W,
    store: Arc<CardStore>,
    codec: TextCodec,
    peer_version: u32,
    selected: Option<String>,
    contacts: Option<Vec<Contact>>,
    put_session: bool,
    current_contact: Option<usize>,
}

impl<R: BufRead, W: Write> Session<R, W> {
    /// Creates a session over a stream pair.
    pub fn new(reader: R, writer: W, store: Arc<CardStore>) -> Self {
        Self {
            reader,
            writer,
            store,
            codec: TextCodec,
            peer_version: 0,
            selected: None,
            contacts: None,
            put_session: false,
            current_contact: None,
        }
    }

    /// Returns the version the peer announced, once exchanged.
    pub fn peer_version(&self) -> u32 {
        self.peer_version
    }

    /// Runs the session to completion.
    pub fn run(&mut self) -> ServerResult<()> {
        self.exchange_versions()?;
        loop {
            let command = self.read_command()?;
            debug!(command = %command.to_line(), "serving");
            match self.dispatch(command)? {
                Flow::Continue => {}
                Flow::Stop => break,
            }
        }
        info!("session closed");
        Ok(())
    }

    fn exchange_versions(&mut self) -> ServerResult<()> {
        write_block(
            &mut self.writer,
            [format!("VERSION {PROTOCOL_VERSION}").as_str(), "card server ready"],
        )?;

        match self.read_command()? {
            Command::Version(version) => {
                self.peer_version = version;
                info!(peer_version = version, "version exchanged");
                Ok(())
            }
            other => Err(ProtocolError::violation(format!(
                "expected VERSION, got {}",
                other.to_line()
            ))
            .into()),
        }
    }

    fn read_command(&mut self) -> ServerResult<Command> {
        let lines = read_block(&mut self.reader)?;
        let mut lines = lines.into_iter();
        let first = lines.next().ok_or(ProtocolError::EmptyCommand)?;
        if lines.next().is_some() {
            return Err(ProtocolError::violation("unexpected content in command block").into());
        }
        Ok(Command::parse(&first)?)
    }

    fn dispatch(&mut self, command: Command) -> ServerResult<Flow> {
        match command {
            Command::Version(_) => {
                return Err(ProtocolError::violation("VERSION after handshake").into());
            }
            Command::Stop => return Ok(Flow::Stop),
            Command::Time => {
                self.reply_lines(&[format_timestamp(now_millis())])?;
            }
            Command::Help => {
                let lines: Vec<String> = HELP_LINES.iter().map(|s| s.to_string()).collect();
                self.reply_lines(&lines)?;
            }
            Command::List(filter) => {
                let entries = self.store.list(filter.as_deref())?;
                let lines: Vec<String> = entries
                    .into_iter()
                    .map(|(ts, name)| format!("{} {}", format_timestamp(ts), name))
                    .collect();
                self.reply_lines(&lines)?;
            }
            Command::Select(resource) => {
                self.selected = resource;
                self.contacts = None;
                self.current_contact = None;
                let ts = match &self.selected {
                    Some(name) => self.store.timestamp(name)?,
                    None => UNKNOWN_TIMESTAMP,
                };
                self.reply_lines(&[format_timestamp(ts)])?;
            }
            Command::GetCard => {
                let name = self.selected()?;
                let (ts, content) = self.store.read(&name)?;
                self.reply_lines(&[format_timestamp(ts)])?;
                write_text_block(&mut self.writer, &content)?;
            }
            Command::PostCard => {
                let name = self.selected()?;
                let text = read_text_block(&mut self.reader)?;
                let contacts = self.codec.parse(&text)?;
                let ts = self.store.write(&name, &self.codec.serialize(&contacts))?;
                self.contacts = Some(contacts);
                self.reply_lines(&[format_timestamp(ts)])?;
            }
            Command::DeleteCard => {
                let name = self.selected()?;
                self.store.delete(&name)?;
                self.contacts = None;
                self.reply_lines(&[format_timestamp(UNKNOWN_TIMESTAMP)])?;
            }
            Command::PutCard => {
                if self.put_session {
                    // Closing a session persists the accumulated edits.
                    let name = self.selected()?;
                    let contacts = self.contacts.as_deref().unwrap_or_default().to_vec();
                    let ts = self.store.write(&name, &self.codec.serialize(&contacts))?;
                    self.put_session = false;
                    self.current_contact = None;
                    self.reply_lines(&[format_timestamp(ts)])?;
                } else {
                    let name = self.selected()?;
                    self.ensure_loaded(&name)?;
                    self.put_session = true;
                    let ts = self.store.timestamp(&name)?;
                    self.reply_lines(&[format_timestamp(ts)])?;
                }
            }
            Command::HashContact(id) => {
                let index = self.find_contact(&id)?;
                let text = {
                    let contacts = self.loaded()?;
                    encode_contacts(&contacts[index..=index])
                };
                self.reply_lines(&[hex_digest(&text)])?;
            }
            Command::ListContact => {
                let name = self.selected()?;
                self.ensure_loaded(&name)?;
                let ids: Vec<String> = self.loaded()?.iter().map(Contact::id).collect();
                self.reply_lines(&ids)?;
            }
            Command::GetContact(id) => {
                let index = self.find_contact(&id)?;
                self.current_contact = Some(index);
                let text = {
                    let contacts = self.loaded()?;
                    encode_contacts(&contacts[index..=index])
                };
                write_text_block(&mut self.writer, &text)?;
            }
            Command::PutContact(id) => {
                self.require_put_session()?;
                let index = self.find_contact(&id)?;
                self.current_contact = Some(index);
                self.reply_ack()?;
            }
            Command::PostContact(id) => {
                self.require_put_session()?;
                let text = read_text_block(&mut self.reader)?;
                let mut parsed = self.codec.parse(&text)?;
                if parsed.len() != 1 {
                    return Err(ServerError::Codec(format!(
                        "POST_CONTACT expects one contact, got {}",
                        parsed.len()
                    )));
                }
                let contact = parsed.remove(0);
                let contacts = self.loaded_mut()?;
                match contacts.iter().position(|c| c.id() == id) {
                    Some(index) => contacts[index] = contact,
                    None => contacts.push(contact),
                }
                self.reply_ack()?;
            }
            Command::DeleteContact(id) => {
                self.require_put_session()?;
                self.current_contact = None;
                let contacts = self.loaded_mut()?;
                contacts.retain(|c| c.id() != id);
                self.reply_ack()?;
            }
            Command::HashData(name) => {
                let field = self.find_field(&name)?;
                self.reply_lines(&[hex_digest(&field)])?;
            }
            Command::ListData => {
                let index = self.current_contact()?;
                let names: Vec<String> = self.loaded()?[index]
                    .fields()
                    .iter()
                    .map(|f| f.name().to_string())
                    .collect();
                self.reply_lines(&names)?;
            }
            Command::GetData(name) => {
                let field = self.find_field(&name)?;
                self.reply_lines(&[field])?;
            }
            Command::PostData => {
                self.require_put_session()?;
                let index = self.current_contact()?;
                let lines = read_block(&mut self.reader)?;
                let mut fields = Vec::with_capacity(lines.len());
                for line in &lines {
                    fields.push(
                        decode_field_line(line).map_err(|e| ServerError::Codec(e.to_string()))?,
                    );
                }
                let contact = &mut self.loaded_mut()?[index];
                for field in fields {
                    contact.add_field(field);
                }
                self.reply_ack()?;
            }
            Command::DeleteData(name) => {
                self.require_put_session()?;
                let index = self.current_contact()?;
                self.loaded_mut()?[index].remove_field(&name);
                self.reply_ack()?;
            }
        }
        Ok(Flow::Continue)
    }

    fn reply_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> ServerResult<()> {
        write_block(&mut self.writer, lines.iter().map(AsRef::as_ref))?;
        Ok(())
    }

    /// Acknowledges a mutation command with an empty block.
    fn reply_ack(&mut self) -> ServerResult<()> {
        write_block(&mut self.writer, std::iter::empty())?;
        Ok(())
    }

    fn selected(&self) -> ServerResult<String> {
        self.selected
            .clone()
            .ok_or_else(|| ProtocolError::violation("no resource selected").into())
    }

    fn require_put_session(&self) -> ServerResult<()> {
        if self.put_session {
            Ok(())
        } else {
            Err(ProtocolError::violation("no PUT_CARD session open").into())
        }
    }

    fn ensure_loaded(&mut self, name: &str) -> ServerResult<()> {
        if self.contacts.is_none() {
            let (_, content) = self.store.read(name)?;
            self.contacts = Some(self.codec.parse(&content)?);
        }
        Ok(())
    }

    fn loaded(&self) -> ServerResult<&Vec<Contact>> {
        self.contacts
            .as_ref()
            .ok_or_else(|| ProtocolError::violation("no card loaded").into())
    }

    fn loaded_mut(&mut self) -> ServerResult<&mut Vec<Contact>> {
        self.contacts
            .as_mut()
            .ok_or_else(|| ProtocolError::violation("no card loaded").into())
    }

    fn current_contact(&self) -> ServerResult<usize> {
        self.current_contact
            .ok_or_else(|| ProtocolError::violation("no contact addressed").into())
    }

    fn find_contact(&mut self, id: &str) -> ServerResult<usize> {
        let name = self.selected()?;
        self.ensure_loaded(&name)?;
        self.loaded()?
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| ProtocolError::violation(format!("unknown contact: {id}")).into())
    }

    fn find_field(&self, name: &str) -> ServerResult<String> {
        let index = self.current_contact()?;
        let contact = &self.loaded()?[index];
        let field = contact
            .field(name)
            .ok_or_else(|| ProtocolError::violation(format!("unknown field: {name}")))?;
        Ok(encode_field_line(field))
    }
}

/// Hex-encoded SHA-256 digest of serialized entity text.
fn hex_digest(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Logs a finished session, downgrading clean closes.
pub(crate) fn log_session_end(result: &ServerResult<()>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_connection_fatal() => {
            warn!(error = %err, "session closed on error");
        }
        Err(err) => warn!(error = %err, "session failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn store_with(resource: &str, content: &str) -> (tempfile::TempDir, Arc<CardStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CardStore::open(dir.path()).unwrap());
        store.write(resource, content).unwrap();
        (dir, store)
    }

    /// Runs a scripted client conversation and returns the raw reply bytes.
    fn converse(store: Arc<CardStore>, client_blocks: &[&[&str]]) -> Vec<u8> {
        let mut input = Vec::new();
        write_block(&mut input, ["VERSION 1"]).unwrap();
        for block in client_blocks {
            write_block(&mut input, block.iter().copied()).unwrap();
        }
        write_block(&mut input, ["STOP"]).unwrap();

        let mut output = Vec::new();
        let mut session = Session::new(Cursor::new(input), &mut output, store);
        session.run().unwrap();
        assert_eq!(session.peer_version(), 1);
        output
    }

    fn read_blocks(raw: &[u8]) -> Vec<Vec<String>> {
        let mut cursor = Cursor::new(raw.to_vec());
        let mut blocks = Vec::new();
        loop {
            match read_block(&mut cursor) {
                Ok(block) => blocks.push(block),
                Err(ProtocolError::UnexpectedEof) => break,
                Err(other) => panic!("bad framing: {other}"),
            }
        }
        blocks
    }

    const CARD: &str = "BEGIN\nN:Doe;Jane\nFN:Jane Doe\nTEL:555\nEND\n";

    #[test]
    fn handshake_then_list() {
        let (_dir, store) = store_with("addresses", CARD);
        let output = converse(store, &[&["LIST"]]);
        let blocks = read_blocks(&output);

        // Hello block, then the LIST reply.
        assert_eq!(blocks[0][0], format!("VERSION {PROTOCOL_VERSION}"));
        assert_eq!(blocks[1].len(), 1);
        assert!(blocks[1][0].ends_with(" addresses"));
        let ts: i64 = blocks[1][0].split(' ').next().unwrap().parse().unwrap();
        assert!(ts > 0);
    }

    #[test]
    fn select_get_card_roundtrip() {
        let (_dir, store) = store_with("addresses", CARD);
        let output = converse(store, &[&["SELECT addresses"], &["GET_CARD"]]);
        let blocks = read_blocks(&output);

        // hello, select-ts, get-ts, content
        let select_ts: i64 = blocks[1][0].parse().unwrap();
        let get_ts: i64 = blocks[2][0].parse().unwrap();
        assert_eq!(select_ts, get_ts);
        assert_eq!(blocks[3].join("\n") + "\n", CARD);
    }

    #[test]
    fn post_card_persists() {
        let (_dir, store) = store_with("addresses", CARD);
        let new_card = "BEGIN\nN:Roe;Rick\nFN:\nEND\n";

        let mut input = Vec::new();
        write_block(&mut input, ["VERSION 1"]).unwrap();
        write_block(&mut input, ["SELECT addresses"]).unwrap();
        write_block(&mut input, ["POST_CARD"]).unwrap();
        write_text_block(&mut input, new_card).unwrap();
        write_block(&mut input, ["STOP"]).unwrap();

        let mut output = Vec::new();
        Session::new(Cursor::new(input), &mut output, Arc::clone(&store))
            .run()
            .unwrap();

        let (_, stored) = store.read("addresses").unwrap();
        assert!(stored.contains("Roe;Rick"));
        assert!(!stored.contains("Doe;Jane"));
    }

    #[test]
    fn put_session_applies_incremental_edits() {
        let (_dir, store) = store_with("addresses", CARD);

        let mut input = Vec::new();
        write_block(&mut input, ["VERSION 1"]).unwrap();
        write_block(&mut input, ["SELECT addresses"]).unwrap();
        write_block(&mut input, ["PUT_CARD"]).unwrap();
        write_block(&mut input, ["PUT_CONTACT Doe;Jane"]).unwrap();
        write_block(&mut input, ["DELETE_DATA TEL"]).unwrap();
        write_block(&mut input, ["POST_DATA"]).unwrap();
        write_block(&mut input, ["EMAIL:jane@example.com"]).unwrap();
        write_block(&mut input, ["PUT_CARD"]).unwrap();
        write_block(&mut input, ["SELECT addresses"]).unwrap();
        write_block(&mut input, ["STOP"]).unwrap();

        let mut output = Vec::new();
        Session::new(Cursor::new(input), &mut output, Arc::clone(&store))
            .run()
            .unwrap();

        let (_, stored) = store.read("addresses").unwrap();
        assert!(stored.contains("EMAIL:jane@example.com"));
        assert!(!stored.contains("TEL:555"));
    }

    #[test]
    fn mutation_outside_put_session_is_fatal() {
        let (_dir, store) = store_with("addresses", CARD);

        let mut input = Vec::new();
        write_block(&mut input, ["VERSION 1"]).unwrap();
        write_block(&mut input, ["SELECT addresses"]).unwrap();
        write_block(&mut input, ["DELETE_CONTACT Doe;Jane"]).unwrap();

        let mut output = Vec::new();
        let result = Session::new(Cursor::new(input), &mut output, store).run();
        assert!(matches!(result, Err(ServerError::Protocol(_))));
    }

    #[test]
    fn unknown_verb_is_fatal() {
        let (_dir, store) = store_with("addresses", CARD);

        let mut input = Vec::new();
        write_block(&mut input, ["VERSION 1"]).unwrap();
        write_block(&mut input, ["FROBNICATE"]).unwrap();

        let mut output = Vec::new();
        let result = Session::new(Cursor::new(input), &mut output, store).run();
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::UnknownVerb { .. }))
        ));
    }

    #[test]
    fn hash_contact_is_stable() {
        let (_dir, store) = store_with("addresses", CARD);
        let output = converse(
            Arc::clone(&store),
            &[&["SELECT addresses"], &["HASH_CONTACT Doe;Jane"]],
        );
        let again = converse(store, &[&["SELECT addresses"], &["HASH_CONTACT Doe;Jane"]]);

        let digest = read_blocks(&output)[2][0].clone();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, read_blocks(&again)[2][0]);
    }
}
