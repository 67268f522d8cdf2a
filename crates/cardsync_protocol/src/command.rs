//! The command vocabulary.

use crate::error::{ProtocolError, ProtocolResult};

/// A protocol command: one verb with an optional single parameter.
///
/// Card-level verbs operate on the resource chosen by `SELECT`;
/// contact-level mutation verbs are valid inside a `PUT_CARD` session,
/// and data-level verbs address the contact chosen by the enclosing
/// `PUT_CONTACT` (or, read-only, by `GET_CONTACT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Handshake: advertise a protocol version.
    Version(u32),
    /// Ask for the server clock.
    Time,
    /// End the session; no further data follows.
    Stop,
    /// Enumerate resources, optionally filtered by substring.
    List(Option<String>),
    /// Ask for the command vocabulary.
    Help,
    /// Choose a resource; reply carries its timestamp.
    Select(Option<String>),
    /// Fetch the selected resource: timestamp, then content block.
    GetCard,
    /// Open (or close) an incremental update session.
    PutCard,
    /// Replace the selected resource with the following content block.
    PostCard,
    /// Delete the selected resource.
    DeleteCard,
    /// Digest one contact of the selected resource.
    HashContact(String),
    /// Enumerate contact ids of the selected resource.
    ListContact,
    /// Fetch one contact as a content block.
    GetContact(String),
    /// Choose the contact subsequent data verbs address.
    PutContact(String),
    /// Add the contact carried by the following content block.
    PostContact(String),
    /// Remove one contact.
    DeleteContact(String),
    /// Digest one field of the current contact.
    HashData(String),
    /// Enumerate field names of the current contact.
    ListData,
    /// Fetch one field of the current contact as a content line.
    GetData(String),
    /// Add the field carried by the following content block.
    PostData,
    /// Remove one field of the current contact.
    DeleteData(String),
}

impl Command {
    /// Parses the first line of a command block.
    pub fn parse(line: &str) -> ProtocolResult<Self> {
        let (verb, param) = match line.split_once(' ') {
            Some((verb, param)) => (verb, Some(param.to_string())),
            None => (line, None),
        };

        let require = |param: Option<String>| {
            param.ok_or_else(|| ProtocolError::MissingParameter {
                verb: verb.to_string(),
            })
        };

        let command = match verb {
            "VERSION" => {
                let text = require(param)?;
                let version = text
                    .parse::<u32>()
                    .map_err(|_| ProtocolError::violation(format!("bad version: {text}")))?;
                Command::Version(version)
            }
            "TIME" => Command::Time,
            "STOP" => Command::Stop,
            "LIST" => Command::List(param),
            "HELP" => Command::Help,
            "SELECT" => Command::Select(param),
            "GET_CARD" => Command::GetCard,
            "PUT_CARD" => Command::PutCard,
            "POST_CARD" => Command::PostCard,
            "DELETE_CARD" => Command::DeleteCard,
            "HASH_CONTACT" => Command::HashContact(require(param)?),
            "LIST_CONTACT" => Command::ListContact,
            "GET_CONTACT" => Command::GetContact(require(param)?),
            "PUT_CONTACT" => Command::PutContact(require(param)?),
            "POST_CONTACT" => Command::PostContact(require(param)?),
            "DELETE_CONTACT" => Command::DeleteContact(require(param)?),
            "HASH_DATA" => Command::HashData(require(param)?),
            "LIST_DATA" => Command::ListData,
            "GET_DATA" => Command::GetData(require(param)?),
            "POST_DATA" => Command::PostData,
            "DELETE_DATA" => Command::DeleteData(require(param)?),
            _ => {
                return Err(ProtocolError::UnknownVerb {
                    verb: verb.to_string(),
                })
            }
        };
        Ok(command)
    }

    /// Renders the command line this command travels as.
    pub fn to_line(&self) -> String {
        match self {
            Command::Version(version) => format!("VERSION {version}"),
            Command::Time => "TIME".into(),
            Command::Stop => "STOP".into(),
            Command::List(None) => "LIST".into(),
            Command::List(Some(filter)) => format!("LIST {filter}"),
            Command::Help => "HELP".into(),
            Command::Select(None) => "SELECT".into(),
            Command::Select(Some(resource)) => format!("SELECT {resource}"),
            Command::GetCard => "GET_CARD".into(),
            Command::PutCard => "PUT_CARD".into(),
            Command::PostCard => "POST_CARD".into(),
            Command::DeleteCard => "DELETE_CARD".into(),
            Command::HashContact(id) => format!("HASH_CONTACT {id}"),
            Command::ListContact => "LIST_CONTACT".into(),
            Command::GetContact(id) => format!("GET_CONTACT {id}"),
            Command::PutContact(id) => format!("PUT_CONTACT {id}"),
            Command::PostContact(id) => format!("POST_CONTACT {id}"),
            Command::DeleteContact(id) => format!("DELETE_CONTACT {id}"),
            Command::HashData(name) => format!("HASH_DATA {name}"),
            Command::ListData => "LIST_DATA".into(),
            Command::GetData(name) => format!("GET_DATA {name}"),
            Command::PostData => "POST_DATA".into(),
            Command::DeleteData(name) => format!("DELETE_DATA {name}"),
        }
    }

    /// Returns true for commands followed by an independent data block.
    pub fn carries_payload(&self) -> bool {
        matches!(
            self,
            Command::PostCard | Command::PostContact(_) | Command::PostData
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render_are_inverse() {
        let commands = [
            Command::Version(1),
            Command::Time,
            Command::Stop,
            Command::List(None),
            Command::List(Some("work".into())),
            Command::Help,
            Command::Select(Some("addresses".into())),
            Command::GetCard,
            Command::PutCard,
            Command::PostCard,
            Command::DeleteCard,
            Command::HashContact("Doe;Jane".into()),
            Command::ListContact,
            Command::GetContact("Doe;Jane".into()),
            Command::PutContact("Doe;Jane".into()),
            Command::PostContact("Doe;Jane".into()),
            Command::DeleteContact("Doe;Jane".into()),
            Command::HashData("TEL".into()),
            Command::ListData,
            Command::GetData("TEL".into()),
            Command::PostData,
            Command::DeleteData("TEL".into()),
        ];

        for command in commands {
            let parsed = Command::parse(&command.to_line()).unwrap();
            assert_eq!(parsed, command);
        }
    }

    #[test]
    fn parameters_may_contain_spaces() {
        let parsed = Command::parse("GET_CONTACT Jane Doe").unwrap();
        assert_eq!(parsed, Command::GetContact("Jane Doe".into()));
    }

    #[test]
    fn unknown_verbs_are_rejected() {
        assert!(matches!(
            Command::parse("EXPLODE now"),
            Err(ProtocolError::UnknownVerb { .. })
        ));
    }

    #[test]
    fn missing_parameters_are_rejected() {
        assert!(matches!(
            Command::parse("DELETE_CONTACT"),
            Err(ProtocolError::MissingParameter { .. })
        ));
        assert!(matches!(
            Command::parse("VERSION"),
            Err(ProtocolError::MissingParameter { .. })
        ));
    }

    #[test]
    fn payload_bearing_commands() {
        assert!(Command::PostCard.carries_payload());
        assert!(Command::PostContact("x".into()).carries_payload());
        assert!(Command::PostData.carries_payload());
        assert!(!Command::GetCard.carries_payload());
    }
}
