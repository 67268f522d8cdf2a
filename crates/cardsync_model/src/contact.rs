//! A single contact record.

use crate::data::Data;
use crate::diff::Keyed;
use crate::owned::{OwnedSeq, Tracked};

/// The structured-name field every contact carries.
pub const FIELD_NAME: &str = "N";
/// The formatted-name field every contact carries.
pub const FIELD_FORMATTED_NAME: &str = "FN";
/// Pseudo-field stripped at construction; format version is the codec's
/// concern, not the model's.
const FIELD_VERSION: &str = "VERSION";

/// An ordered list of [`Data`] fields describing one person.
///
/// Construction enforces the model invariants: a `VERSION` pseudo-field
/// is stripped, and empty `N` / `FN` fields are inserted when absent so
/// every contact has both.
#[derive(Debug, Clone)]
pub struct Contact {
    fields: OwnedSeq<Data>,
    next_bkey: u32,
    dirty: bool,
}

impl Default for Contact {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Contact {
    /// Creates a contact from construction-time fields (initial load).
    pub fn new(fields: Vec<Data>) -> Self {
        let mut seq = OwnedSeq::new();
        let mut max_bkey = 0;
        for field in fields {
            if field.name() == FIELD_VERSION {
                continue;
            }
            if let Some(key) = field.bkey() {
                max_bkey = max_bkey.max(key);
            }
            seq.push_initial(field);
        }
        if !seq.iter().any(|f| f.name() == FIELD_NAME) {
            seq.push_initial(Data::new(FIELD_NAME, ""));
        }
        if !seq.iter().any(|f| f.name() == FIELD_FORMATTED_NAME) {
            seq.push_initial(Data::new(FIELD_FORMATTED_NAME, ""));
        }
        Self {
            fields: seq,
            next_bkey: max_bkey + 1,
            dirty: false,
        }
    }

    /// Synthesized identity: the `N` value, falling back to `FN`.
    pub fn id(&self) -> String {
        let name = self
            .field(FIELD_NAME)
            .map(Data::value)
            .filter(|v| !v.is_empty())
            .or_else(|| self.field(FIELD_FORMATTED_NAME).map(Data::value));
        name.unwrap_or_default().to_string()
    }

    /// Returns the first field with the given (case-insensitive) name.
    pub fn field(&self, name: &str) -> Option<&Data> {
        let name = name.to_ascii_uppercase();
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Returns the first field with the given name, mutably.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Data> {
        let name = name.to_ascii_uppercase();
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Returns all fields in order.
    pub fn fields(&self) -> &OwnedSeq<Data> {
        &self.fields
    }

    /// Returns all fields mutably.
    pub fn fields_mut(&mut self) -> &mut OwnedSeq<Data> {
        &mut self.fields
    }

    /// Attaches a field, flagging it as a change.
    pub fn add_field(&mut self, field: Data) {
        self.fields.push(field);
    }

    /// Detaches the first field with the given name.
    ///
    /// Reports `false` when no such field exists.
    pub fn remove_field(&mut self, name: &str) -> bool {
        let name = name.to_ascii_uppercase();
        self.fields.remove_where(|f| f.name() == name)
    }

    /// Returns the binary field carrying the given BKey.
    pub fn binary_data(&self, key: u32) -> Option<&Data> {
        self.fields.iter().find(|f| f.bkey() == Some(key))
    }

    /// Assigns BKeys to binary fields.
    ///
    /// With `force`, every binary field is rekeyed from 1 in field order.
    /// Without it, only still-unkeyed binary fields receive keys from the
    /// monotonic counter; already-keyed fields are untouched. Non-binary
    /// fields never carry a key.
    pub fn update_bkeys(&mut self, force: bool) {
        if force {
            self.next_bkey = 1;
        }
        for field in self.fields.iter_mut() {
            if !field.is_binary() {
                continue;
            }
            if force || field.bkey().is_none() {
                field.set_bkey(Some(self.next_bkey));
                self.next_bkey += 1;
            }
        }
    }
}

impl Tracked for Contact {
    fn is_dirty(&self) -> bool {
        self.dirty || self.fields.is_dirty()
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn mark_pristine(&mut self) {
        self.dirty = false;
        self.fields.mark_pristine();
    }
}

impl Keyed for Contact {
    type Key = String;

    fn key(&self) -> String {
        self.id()
    }

    fn same_content(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.same_content(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TypeInfo;

    fn binary(name: &str, value: &str) -> Data {
        Data::new(name, value).with_type(TypeInfo::new("ENCODING", "b"))
    }

    #[test]
    fn construction_inserts_missing_name_fields() {
        let contact = Contact::new(vec![Data::new("TEL", "555")]);
        assert!(contact.field("N").is_some());
        assert!(contact.field("FN").is_some());
        assert!(!contact.is_dirty());
    }

    #[test]
    fn construction_strips_version() {
        let contact = Contact::new(vec![Data::new("VERSION", "3.0"), Data::new("N", "Doe;Jane")]);
        assert!(contact.field("VERSION").is_none());
        assert_eq!(contact.id(), "Doe;Jane");
    }

    #[test]
    fn id_falls_back_to_formatted_name() {
        let contact = Contact::new(vec![Data::new("FN", "Jane Doe")]);
        assert_eq!(contact.id(), "Jane Doe");
    }

    #[test]
    fn forced_bkey_update_rekeys_from_one() {
        let mut contact = Contact::new(vec![
            binary("PHOTO", "AAAA"),
            Data::new("TEL", "555"),
            binary("LOGO", "BBBB").with_bkey(7),
            binary("SOUND", "CCCC"),
        ]);

        contact.update_bkeys(true);

        let keys: Vec<Option<u32>> = contact.fields().iter().map(Data::bkey).collect();
        assert_eq!(keys[0], Some(1));
        assert_eq!(keys[1], None);
        assert_eq!(keys[2], Some(2));
        assert_eq!(keys[3], Some(3));
    }

    #[test]
    fn unforced_update_keys_only_unkeyed_fields() {
        let mut contact = Contact::new(vec![binary("PHOTO", "AAAA").with_bkey(1)]);
        contact.fields_mut().push(binary("LOGO", "BBBB"));

        contact.update_bkeys(false);

        assert_eq!(contact.field("PHOTO").unwrap().bkey(), Some(1));
        assert_eq!(contact.field("LOGO").unwrap().bkey(), Some(2));
        assert_eq!(contact.binary_data(2).unwrap().name(), "LOGO");
    }

    #[test]
    fn field_edit_dirties_contact() {
        let mut contact = Contact::new(vec![Data::new("N", "Doe;Jane")]);
        assert!(!contact.is_dirty());

        contact.field_mut("N").unwrap().set_value("Doe;Janet");
        assert!(contact.is_dirty());

        contact.mark_pristine();
        assert!(!contact.is_dirty());
    }

    #[test]
    fn remove_field_reports_absence() {
        let mut contact = Contact::new(vec![Data::new("N", "Doe;Jane")]);
        assert!(!contact.remove_field("TEL"));
        assert!(contact.remove_field("FN"));
    }
}
