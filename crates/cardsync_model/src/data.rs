//! Contact field types.

use crate::diff::Keyed;
use crate::owned::{OwnedSeq, Tracked};

/// A `(name, value)` type parameter attached to a [`Data`] field.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    name: String,
    value: String,
    dirty: bool,
}

impl TypeInfo {
    /// Creates a new type parameter.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            dirty: false,
        }
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Renames the parameter.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.dirty = true;
    }

    /// Rewrites the parameter value.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.dirty = true;
    }

    /// Returns true for the `ENCODING=b` marker that flags binary content.
    pub fn is_binary_marker(&self) -> bool {
        self.name.eq_ignore_ascii_case("ENCODING") && self.value.eq_ignore_ascii_case("b")
    }
}

impl Tracked for TypeInfo {
    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn mark_pristine(&mut self) {
        self.dirty = false;
    }
}

impl Keyed for TypeInfo {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn same_content(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// A named field of a [`Contact`](crate::Contact).
///
/// The field name is normalized to ASCII upper-case. A field is binary
/// iff it carries an `ENCODING=b` type parameter; binary fields hold a
/// positive BKey once assigned (`None` while still unkeyed), used to
/// reattach payloads during incremental merges without retransmission.
#[derive(Debug, Clone)]
pub struct Data {
    name: String,
    value: String,
    group: Option<String>,
    types: OwnedSeq<TypeInfo>,
    bkey: Option<u32>,
    dirty: bool,
}

impl Data {
    /// Creates a field with the given name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            value: value.into(),
            group: None,
            types: OwnedSeq::new(),
            bkey: None,
            dirty: false,
        }
    }

    /// Sets the group label, builder style.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Attaches a type parameter, builder style (construction-time load).
    pub fn with_type(mut self, info: TypeInfo) -> Self {
        self.types.push_initial(info);
        self
    }

    /// Sets the binary key, builder style (construction-time load).
    pub fn with_bkey(mut self, key: u32) -> Self {
        self.bkey = Some(key);
        self
    }

    /// Returns the field name (upper-case).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the group label, if any.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Returns the assigned binary key, if any.
    pub fn bkey(&self) -> Option<u32> {
        self.bkey
    }

    /// Renames the field, normalizing to upper-case.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into().to_ascii_uppercase();
        self.dirty = true;
    }

    /// Rewrites the field value.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.dirty = true;
    }

    /// Sets or clears the group label.
    pub fn set_group(&mut self, group: Option<String>) {
        self.group = group;
        self.dirty = true;
    }

    /// Sets or clears the binary key.
    pub fn set_bkey(&mut self, key: Option<u32>) {
        self.bkey = key;
        self.dirty = true;
    }

    /// Returns the type parameters.
    pub fn types(&self) -> &OwnedSeq<TypeInfo> {
        &self.types
    }

    /// Returns the type parameters mutably.
    pub fn types_mut(&mut self) -> &mut OwnedSeq<TypeInfo> {
        &mut self.types
    }

    /// Returns true when the field carries an `ENCODING=b` parameter.
    pub fn is_binary(&self) -> bool {
        self.types.iter().any(TypeInfo::is_binary_marker)
    }
}

impl Tracked for Data {
    fn is_dirty(&self) -> bool {
        self.dirty || self.types.is_dirty()
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn mark_pristine(&mut self) {
        self.dirty = false;
        self.types.mark_pristine();
    }
}

impl Keyed for Data {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn same_content(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value && self.group == other.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_normalized() {
        let mut field = Data::new("tel", "555-1234");
        assert_eq!(field.name(), "TEL");

        field.set_name("eMail");
        assert_eq!(field.name(), "EMAIL");
    }

    #[test]
    fn binary_detection_via_encoding_parameter() {
        let plain = Data::new("NOTE", "hello");
        assert!(!plain.is_binary());

        let photo = Data::new("PHOTO", "AAAA").with_type(TypeInfo::new("ENCODING", "b"));
        assert!(photo.is_binary());
        assert_eq!(photo.bkey(), None);
    }

    #[test]
    fn setters_dirty_the_field() {
        let mut field = Data::new("NOTE", "hello");
        assert!(!field.is_dirty());

        field.set_value("goodbye");
        assert!(field.is_dirty());

        field.mark_pristine();
        assert!(!field.is_dirty());
    }

    #[test]
    fn type_edit_bubbles_to_field() {
        let mut field = Data::new("TEL", "555").with_type(TypeInfo::new("TYPE", "home"));
        field.mark_pristine();
        assert!(!field.is_dirty());

        field.types_mut().get_mut(0).unwrap().set_value("work");
        assert!(field.is_dirty());
    }

    #[test]
    fn content_equality_ignores_types_and_bkey() {
        let a = Data::new("TEL", "555").with_type(TypeInfo::new("TYPE", "home"));
        let b = Data::new("TEL", "555").with_bkey(3);
        assert!(a.same_content(&b));

        let c = Data::new("TEL", "555").with_group("home");
        assert!(!a.same_content(&c));
    }
}
