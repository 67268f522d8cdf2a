//! Remote-store access: the strategy seam and its implementations.

use crate::error::{SyncError, SyncResult};
use cardsync_model::Codec;
use cardsync_protocol::{
    parse_timestamp, read_block, read_text_block, write_block, write_text_block, Command,
    ProtocolError, PROTOCOL_VERSION, UNKNOWN_TIMESTAMP,
};
use std::collections::HashMap;
use std::io::BufReader;
use std::net::TcpStream;
use tracing::{debug, info};

/// Client-side view of an authoritative card store.
///
/// The sync engine drives any implementation of this trait; the wire
/// implementation speaks the protocol over TCP, the mock answers from
/// memory. This seam replaces runtime class lookup with an injected
/// implementation chosen at startup.
pub trait RemoteStore {
    /// Enumerates remote resources as `(timestamp, name)` pairs.
    fn list(&mut self, filter: Option<&str>) -> SyncResult<Vec<(i64, String)>>;

    /// Asks for the server clock.
    fn time(&mut self) -> SyncResult<i64>;

    /// Selects a resource and returns its reported timestamp.
    fn select(&mut self, resource: &str) -> SyncResult<i64>;

    /// Fetches the selected resource: timestamp and serialized content.
    fn get_card(&mut self) -> SyncResult<(i64, String)>;

    /// Replaces the selected resource; returns the new timestamp.
    fn post_card(&mut self, content: &str) -> SyncResult<i64>;

    /// Opens an incremental update session on the selected resource.
    fn begin_put(&mut self) -> SyncResult<i64>;

    /// Closes the incremental session; returns the new timestamp.
    fn end_put(&mut self) -> SyncResult<i64>;

    /// Addresses a contact for subsequent data operations.
    fn put_contact(&mut self, id: &str) -> SyncResult<()>;

    /// Adds (or replaces) one contact from serialized content.
    fn post_contact(&mut self, id: &str, content: &str) -> SyncResult<()>;

    /// Removes one contact.
    fn delete_contact(&mut self, id: &str) -> SyncResult<()>;

    /// Adds one field line to the addressed contact.
    fn post_data(&mut self, line: &str) -> SyncResult<()>;

    /// Removes one field from the addressed contact.
    fn delete_data(&mut self, name: &str) -> SyncResult<()>;

    /// Ends the session; no further data is exchanged.
    fn stop(&mut self) -> SyncResult<()>;
}

/// [`RemoteStore`] over a TCP connection speaking the wire protocol.
pub struct WireRemote {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer_version: u32,
}

impl WireRemote {
    /// Connects and performs the version handshake.
    pub fn connect(host: &str, port: u16) -> SyncResult<Self> {
        let stream = TcpStream::connect((host, port))?;
        let reader = BufReader::new(stream.try_clone()?);
        let mut remote = Self {
            reader,
            writer: stream,
            peer_version: 0,
        };
        remote.handshake()?;
        Ok(remote)
    }

    /// Returns the version the server announced.
    pub fn peer_version(&self) -> u32 {
        self.peer_version
    }

    fn handshake(&mut self) -> SyncResult<()> {
        let hello = read_block(&mut self.reader)?;
        let first = hello.first().ok_or(ProtocolError::EmptyCommand)?;
        match Command::parse(first)? {
            Command::Version(version) => self.peer_version = version,
            other => {
                return Err(ProtocolError::violation(format!(
                    "expected VERSION, got {}",
                    other.to_line()
                ))
                .into())
            }
        }
        self.send(&Command::Version(PROTOCOL_VERSION))?;
        info!(peer_version = self.peer_version, "connected");
        Ok(())
    }

    fn send(&mut self, command: &Command) -> SyncResult<()> {
        debug!(command = %command.to_line(), "sending");
        write_block(&mut self.writer, [command.to_line().as_str()])?;
        Ok(())
    }

    fn read_timestamp_reply(&mut self) -> SyncResult<i64> {
        let lines = read_block(&mut self.reader)?;
        let first = lines
            .first()
            .ok_or_else(|| ProtocolError::violation("empty timestamp reply"))?;
        Ok(parse_timestamp(first)?)
    }

    fn read_ack(&mut self) -> SyncResult<()> {
        read_block(&mut self.reader)?;
        Ok(())
    }
}

impl RemoteStore for WireRemote {
    fn list(&mut self, filter: Option<&str>) -> SyncResult<Vec<(i64, String)>> {
        self.send(&Command::List(filter.map(String::from)))?;
        let lines = read_block(&mut self.reader)?;
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            let (ts, name) = line
                .split_once(' ')
                .ok_or_else(|| ProtocolError::violation(format!("bad LIST entry: {line}")))?;
            entries.push((parse_timestamp(ts)?, name.to_string()));
        }
        Ok(entries)
    }

    fn time(&mut self) -> SyncResult<i64> {
        self.send(&Command::Time)?;
        self.read_timestamp_reply()
    }

    fn select(&mut self, resource: &str) -> SyncResult<i64> {
        self.send(&Command::Select(Some(resource.to_string())))?;
        self.read_timestamp_reply()
    }

    fn get_card(&mut self) -> SyncResult<(i64, String)> {
        self.send(&Command::GetCard)?;
        let ts = self.read_timestamp_reply()?;
        let content = read_text_block(&mut self.reader)?;
        Ok((ts, content))
    }

    fn post_card(&mut self, content: &str) -> SyncResult<i64> {
        self.send(&Command::PostCard)?;
        write_text_block(&mut self.writer, content)?;
        self.read_timestamp_reply()
    }

    fn begin_put(&mut self) -> SyncResult<i64> {
        self.send(&Command::PutCard)?;
        self.read_timestamp_reply()
    }

    fn end_put(&mut self) -> SyncResult<i64> {
        self.send(&Command::PutCard)?;
        self.read_timestamp_reply()
    }

    fn put_contact(&mut self, id: &str) -> SyncResult<()> {
        self.send(&Command::PutContact(id.to_string()))?;
        self.read_ack()
    }

    fn post_contact(&mut self, id: &str, content: &str) -> SyncResult<()> {
        self.send(&Command::PostContact(id.to_string()))?;
        write_text_block(&mut self.writer, content)?;
        self.read_ack()
    }

    fn delete_contact(&mut self, id: &str) -> SyncResult<()> {
        self.send(&Command::DeleteContact(id.to_string()))?;
        self.read_ack()
    }

    fn post_data(&mut self, line: &str) -> SyncResult<()> {
        self.send(&Command::PostData)?;
        write_block(&mut self.writer, [line])?;
        self.read_ack()
    }

    fn delete_data(&mut self, name: &str) -> SyncResult<()> {
        self.send(&Command::DeleteData(name.to_string()))?;
        self.read_ack()
    }

    fn stop(&mut self) -> SyncResult<()> {
        self.send(&Command::Stop)
    }
}

/// An in-memory [`RemoteStore`] for tests.
///
/// Resources live in a map of `(timestamp, content)`; incremental
/// updates are applied through the same codec the server uses. A
/// scripted race counter makes `select` report a bumped timestamp to
/// simulate a concurrent writer.
#[derive(Default)]
pub struct MockRemote {
    resources: HashMap<String, (i64, String)>,
    selected: Option<String>,
    clock: i64,
    races_to_inject: u32,
    /// Every operation performed, in order, for assertions.
    pub log: Vec<String>,
    put_contacts: Option<Vec<cardsync_model::Contact>>,
    current_contact: Option<usize>,
}

impl MockRemote {
    /// Creates an empty mock store with the clock at `now`.
    pub fn new(now: i64) -> Self {
        Self {
            clock: now,
            ..Self::default()
        }
    }

    /// Seeds a resource.
    pub fn set_resource(&mut self, name: &str, timestamp: i64, content: &str) {
        self.resources
            .insert(name.to_string(), (timestamp, content.to_string()));
    }

    /// Returns a resource's `(timestamp, content)`.
    pub fn resource(&self, name: &str) -> Option<&(i64, String)> {
        self.resources.get(name)
    }

    /// Makes the next `count` selects report a racing timestamp bump.
    pub fn inject_races(&mut self, count: u32) {
        self.races_to_inject = count;
    }

    fn tick(&mut self) -> i64 {
        self.clock += 10_000;
        self.clock
    }

    fn selected(&self) -> SyncResult<String> {
        self.selected
            .clone()
            .ok_or_else(|| ProtocolError::violation("no resource selected").into())
    }

    fn codec(&self) -> cardsync_codec::TextCodec {
        cardsync_codec::TextCodec
    }
}

impl RemoteStore for MockRemote {
    fn list(&mut self, filter: Option<&str>) -> SyncResult<Vec<(i64, String)>> {
        self.log.push(format!("LIST {}", filter.unwrap_or("")));
        let mut entries: Vec<(i64, String)> = self
            .resources
            .iter()
            .filter(|(name, _)| filter.is_none_or(|f| name.contains(f)))
            .map(|(name, (ts, _))| (*ts, name.clone()))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(entries)
    }

    fn time(&mut self) -> SyncResult<i64> {
        self.log.push("TIME".into());
        Ok(self.clock)
    }

    fn select(&mut self, resource: &str) -> SyncResult<i64> {
        self.log.push(format!("SELECT {resource}"));
        self.selected = Some(resource.to_string());
        if self.races_to_inject > 0 {
            self.races_to_inject -= 1;
            let bumped = self.tick();
            if let Some(entry) = self.resources.get_mut(resource) {
                entry.0 = bumped;
            }
        }
        Ok(self
            .resources
            .get(resource)
            .map(|(ts, _)| *ts)
            .unwrap_or(UNKNOWN_TIMESTAMP))
    }

    fn get_card(&mut self) -> SyncResult<(i64, String)> {
        self.log.push("GET_CARD".into());
        let name = self.selected()?;
        self.resources
            .get(&name)
            .cloned()
            .ok_or_else(|| ProtocolError::violation(format!("no such resource: {name}")).into())
    }

    fn post_card(&mut self, content: &str) -> SyncResult<i64> {
        self.log.push("POST_CARD".into());
        let name = self.selected()?;
        let ts = self.tick();
        self.resources
            .insert(name, (ts, content.to_string()));
        Ok(ts)
    }

    fn begin_put(&mut self) -> SyncResult<i64> {
        self.log.push("PUT_CARD open".into());
        let name = self.selected()?;
        let (ts, content) = self
            .resources
            .get(&name)
            .cloned()
            .ok_or_else(|| SyncError::from(ProtocolError::violation("no such resource")))?;
        let contacts = self
            .codec()
            .parse(&content)
            .map_err(|e| ProtocolError::violation(e.to_string()))?;
        self.put_contacts = Some(contacts);
        Ok(ts)
    }

    fn end_put(&mut self) -> SyncResult<i64> {
        self.log.push("PUT_CARD close".into());
        let name = self.selected()?;
        let contacts = self
            .put_contacts
            .take()
            .ok_or_else(|| SyncError::from(ProtocolError::violation("no PUT session")))?;
        let content = self.codec().serialize(&contacts);
        let ts = self.tick();
        self.resources.insert(name, (ts, content));
        self.current_contact = None;
        Ok(ts)
    }

    fn put_contact(&mut self, id: &str) -> SyncResult<()> {
        self.log.push(format!("PUT_CONTACT {id}"));
        let contacts = self
            .put_contacts
            .as_ref()
            .ok_or_else(|| SyncError::from(ProtocolError::violation("no PUT session")))?;
        self.current_contact = contacts.iter().position(|c| c.id() == id);
        Ok(())
    }

    fn post_contact(&mut self, id: &str, content: &str) -> SyncResult<()> {
        self.log.push(format!("POST_CONTACT {id}"));
        let mut parsed = self
            .codec()
            .parse(content)
            .map_err(|e| ProtocolError::violation(e.to_string()))?;
        if parsed.is_empty() {
            return Err(ProtocolError::violation("POST_CONTACT with empty payload").into());
        }
        let contact = parsed.remove(0);
        let contacts = self
            .put_contacts
            .as_mut()
            .ok_or_else(|| SyncError::from(ProtocolError::violation("no PUT session")))?;
        match contacts.iter().position(|c| c.id() == id) {
            Some(index) => contacts[index] = contact,
            None => contacts.push(contact),
        }
        Ok(())
    }

    fn delete_contact(&mut self, id: &str) -> SyncResult<()> {
        self.log.push(format!("DELETE_CONTACT {id}"));
        if let Some(contacts) = self.put_contacts.as_mut() {
            contacts.retain(|c| c.id() != id);
        }
        Ok(())
    }

    fn post_data(&mut self, line: &str) -> SyncResult<()> {
        self.log.push(format!("POST_DATA {line}"));
        let field = cardsync_codec::decode_field_line(line)
            .map_err(|e| ProtocolError::violation(e.to_string()))?;
        let index = self
            .current_contact
            .ok_or_else(|| SyncError::from(ProtocolError::violation("no contact addressed")))?;
        if let Some(contacts) = self.put_contacts.as_mut() {
            contacts[index].add_field(field);
        }
        Ok(())
    }

    fn delete_data(&mut self, name: &str) -> SyncResult<()> {
        self.log.push(format!("DELETE_DATA {name}"));
        let index = self
            .current_contact
            .ok_or_else(|| SyncError::from(ProtocolError::violation("no contact addressed")))?;
        if let Some(contacts) = self.put_contacts.as_mut() {
            contacts[index].remove_field(name);
        }
        Ok(())
    }

    fn stop(&mut self) -> SyncResult<()> {
        self.log.push("STOP".into());
        Ok(())
    }
}
