//! The top-level card entity.

use crate::contact::Contact;
use crate::error::{ModelError, ModelResult};
use crate::owned::{OwnedSeq, Tracked};
use crate::Codec;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Timestamp value for a card that is new, unlinked or never synced.
pub const UNKNOWN_MODIFIED: i64 = -1;

/// What a card's content is backed by.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Binding {
    /// No backing resource; the card exists only in memory.
    #[default]
    None,
    /// A local file.
    File(PathBuf),
    /// A named resource on a remote store.
    Remote(String),
}

/// An ordered list of [`Contact`]s, optionally bound to a resource.
#[derive(Debug, Clone)]
pub struct Card {
    contacts: OwnedSeq<Contact>,
    binding: Binding,
    format: String,
    last_modified: i64,
}

impl Card {
    /// Creates a fresh, unbound card from a contact list.
    pub fn from_contacts(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: OwnedSeq::from_initial(contacts),
            binding: Binding::None,
            format: String::new(),
            last_modified: UNKNOWN_MODIFIED,
        }
    }

    /// Parses a file into a card bound to it.
    ///
    /// The resulting card is pristine and stamped with the file's
    /// modification time.
    pub fn load(path: impl AsRef<Path>, codec: &dyn Codec) -> ModelResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let contacts = codec.parse(&text)?;
        debug!(path = %path.display(), contacts = contacts.len(), "loaded card");
        Ok(Self {
            contacts: OwnedSeq::from_initial(contacts),
            binding: Binding::File(path.to_path_buf()),
            format: codec.format().to_string(),
            last_modified: file_mtime_millis(path)?,
        })
    }

    /// Returns the contacts in order.
    pub fn contacts(&self) -> &OwnedSeq<Contact> {
        &self.contacts
    }

    /// Returns the contacts mutably.
    pub fn contacts_mut(&mut self) -> &mut OwnedSeq<Contact> {
        &mut self.contacts
    }

    /// Returns the current binding.
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Returns the bound file, if the card is file-backed.
    pub fn bound_file(&self) -> Option<&Path> {
        match &self.binding {
            Binding::File(path) => Some(path),
            _ => None,
        }
    }

    /// Binds the card to a file without writing anything.
    pub fn bind_file(&mut self, path: impl Into<PathBuf>) {
        self.binding = Binding::File(path.into());
    }

    /// Binds the card to a named remote resource.
    pub fn bind_remote(&mut self, resource: impl Into<String>) {
        self.binding = Binding::Remote(resource.into());
    }

    /// Returns the declared serialization format.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Returns the last-modified timestamp in epoch milliseconds,
    /// or [`UNKNOWN_MODIFIED`].
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Overrides the last-modified timestamp (e.g. from a server reply).
    pub fn set_last_modified(&mut self, millis: i64) {
        self.last_modified = millis;
    }

    /// Severs the resource binding without touching content.
    pub fn unlink(&mut self) {
        self.binding = Binding::None;
        self.last_modified = UNKNOWN_MODIFIED;
    }

    /// Writes the card through to its bound file.
    ///
    /// After a successful write the whole subtree is pristine and the
    /// timestamp reflects the file on disk.
    pub fn save(&mut self, codec: &dyn Codec) -> ModelResult<()> {
        let path = match &self.binding {
            Binding::File(path) => path.clone(),
            _ => return Err(ModelError::NotBound),
        };
        self.write_to(&path, codec)
    }

    /// Writes the card to `target`, which must match the binding.
    pub fn save_to(&mut self, target: impl AsRef<Path>, codec: &dyn Codec) -> ModelResult<()> {
        let target = target.as_ref();
        match &self.binding {
            Binding::File(bound) if bound == target => {}
            Binding::File(bound) => {
                return Err(ModelError::BindingMismatch {
                    bound: bound.clone(),
                    target: target.to_path_buf(),
                })
            }
            _ => return Err(ModelError::NotBound),
        }
        let target = target.to_path_buf();
        self.write_to(&target, codec)
    }

    fn write_to(&mut self, path: &Path, codec: &dyn Codec) -> ModelResult<()> {
        let text = codec.serialize(self.contacts.as_slice());
        fs::write(path, text)?;
        self.format = codec.format().to_string();
        self.last_modified = file_mtime_millis(path)?;
        self.mark_pristine();
        debug!(path = %path.display(), "saved card");
        Ok(())
    }

    /// Re-parses the bound file and replaces content in place.
    ///
    /// Content replacement is a structural diff: contacts unchanged on
    /// disk keep their identity and dirty state.
    pub fn reload(&mut self, codec: &dyn Codec) -> ModelResult<()> {
        let path = match &self.binding {
            Binding::File(path) => path.clone(),
            _ => return Err(ModelError::NotBound),
        };
        let text = fs::read_to_string(&path)?;
        let contacts = codec.parse(&text)?;
        self.contacts.replace_content(contacts);
        self.last_modified = file_mtime_millis(&path)?;
        Ok(())
    }

    /// Replaces the contact list wholesale via structural diff.
    pub fn replace_contacts(&mut self, contacts: Vec<Contact>) {
        self.contacts.replace_content(contacts);
    }
}

impl Tracked for Card {
    fn is_dirty(&self) -> bool {
        self.contacts.is_dirty()
    }

    fn mark_dirty(&mut self) {
        self.contacts.mark_dirty();
    }

    fn mark_pristine(&mut self) {
        self.contacts.mark_pristine();
    }
}

fn file_mtime_millis(path: &Path) -> ModelResult<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(UNKNOWN_MODIFIED);
    Ok(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;

    /// Minimal one-line-per-field codec for model tests.
    struct LineCodec;

    impl Codec for LineCodec {
        fn parse(&self, input: &str) -> ModelResult<Vec<Contact>> {
            let mut contacts = Vec::new();
            let mut fields = Vec::new();
            for line in input.lines() {
                if line.is_empty() {
                    if !fields.is_empty() {
                        contacts.push(Contact::new(std::mem::take(&mut fields)));
                    }
                    continue;
                }
                let (name, value) = line
                    .split_once(':')
                    .ok_or_else(|| ModelError::codec(format!("bad line: {line}")))?;
                fields.push(Data::new(name, value));
            }
            if !fields.is_empty() {
                contacts.push(Contact::new(fields));
            }
            Ok(contacts)
        }

        fn serialize(&self, contacts: &[Contact]) -> String {
            let mut out = String::new();
            for contact in contacts {
                for field in contact.fields().iter() {
                    out.push_str(field.name());
                    out.push(':');
                    out.push_str(field.value());
                    out.push('\n');
                }
                out.push('\n');
            }
            out
        }

        fn format(&self) -> &str {
            "lines"
        }
    }

    #[test]
    fn fresh_card_is_unbound() {
        let card = Card::from_contacts(vec![Contact::new(vec![Data::new("N", "Doe;Jane")])]);
        assert_eq!(card.binding(), &Binding::None);
        assert_eq!(card.last_modified(), UNKNOWN_MODIFIED);
        assert!(!card.is_dirty());
    }

    #[test]
    fn save_load_roundtrip_marks_pristine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.txt");

        let mut card = Card::from_contacts(vec![Contact::new(vec![Data::new("N", "Doe;Jane")])]);
        card.bind_file(&path);
        card.contacts_mut()
            .get_mut(0)
            .unwrap()
            .field_mut("FN")
            .unwrap()
            .set_value("Jane Doe");
        assert!(card.is_dirty());

        card.save(&LineCodec).unwrap();
        assert!(!card.is_dirty());
        assert!(card.last_modified() > 0);

        let loaded = Card::load(&path, &LineCodec).unwrap();
        assert_eq!(loaded.contacts().len(), 1);
        assert_eq!(loaded.contacts().get(0).unwrap().id(), "Doe;Jane");
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn save_to_rejects_foreign_target() {
        let dir = tempfile::tempdir().unwrap();
        let bound = dir.path().join("bound.txt");
        let other = dir.path().join("other.txt");

        let mut card = Card::from_contacts(vec![]);
        card.bind_file(&bound);

        let err = card.save_to(&other, &LineCodec).unwrap_err();
        assert!(matches!(err, ModelError::BindingMismatch { .. }));
    }

    #[test]
    fn unlink_severs_binding_only() {
        let mut card = Card::from_contacts(vec![Contact::new(vec![Data::new("N", "X")])]);
        card.bind_file("/tmp/somewhere.txt");
        card.unlink();

        assert_eq!(card.binding(), &Binding::None);
        assert_eq!(card.last_modified(), UNKNOWN_MODIFIED);
        assert_eq!(card.contacts().len(), 1);
    }

    #[test]
    fn reload_preserves_untouched_contacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.txt");
        fs::write(&path, "N:Doe;Jane\n\nN:Roe;Rick\n\n").unwrap();

        let mut card = Card::load(&path, &LineCodec).unwrap();
        assert_eq!(card.contacts().len(), 2);

        // Second contact changes on disk, first stays identical.
        fs::write(&path, "N:Doe;Jane\n\nN:Roe;Rick\nTEL:555\n\n").unwrap();
        card.reload(&LineCodec).unwrap();

        assert_eq!(card.contacts().len(), 2);
        assert!(!card.contacts().get(0).unwrap().is_dirty());
        assert!(card.contacts().get(1).unwrap().is_dirty());
    }
}
