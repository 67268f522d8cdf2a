//! Structural comparison between entity sequences.

use std::collections::HashSet;
use std::hash::Hash;

/// Natural identity and content state of a diffable entity.
///
/// `key` is the identity under which two sequence elements are matched
/// (a `Data`'s name, a `Contact`'s synthesized id); `same_content`
/// decides whether two matched elements count as changed.
pub trait Keyed {
    /// The identity type.
    type Key: Eq + Hash + Clone;

    /// Returns the element's natural identity.
    fn key(&self) -> Self::Key;

    /// Returns true when two elements with equal keys are content-equal.
    fn same_content(&self, other: &Self) -> bool;
}

/// The outcome of comparing two entity sequences.
///
/// `changed_from` and `changed_to` are index-aligned: position `i` holds
/// the left and right version of the same changed element.
#[derive(Debug, Clone)]
pub struct Diff<T> {
    /// Elements present only on the right side.
    pub added: Vec<T>,
    /// Elements present only on the left side.
    pub removed: Vec<T>,
    /// Left-side versions of elements whose content differs.
    pub changed_from: Vec<T>,
    /// Right-side versions of elements whose content differs.
    pub changed_to: Vec<T>,
}

impl<T> Diff<T> {
    /// Returns true when the compared sequences were identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed_from.is_empty()
            && self.changed_to.is_empty()
    }
}

impl<T> Default for Diff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            changed_from: Vec::new(),
            changed_to: Vec::new(),
        }
    }
}

/// Compares two sequences by identity and content state.
///
/// Elements whose key exists only in `left` land in `removed`, only in
/// `right` in `added`. Elements present on both sides with differing
/// content are emitted as an aligned `changed_from` / `changed_to` pair;
/// identical elements are omitted entirely.
///
/// `compare(x, x)` is empty on all four outputs, and `compare(a, b)` is
/// the exact mirror of `compare(b, a)`.
pub fn compare<T: Keyed + Clone>(left: &[T], right: &[T]) -> Diff<T> {
    let left_keys: HashSet<T::Key> = left.iter().map(Keyed::key).collect();
    let right_keys: HashSet<T::Key> = right.iter().map(Keyed::key).collect();

    let mut diff = Diff::default();

    for element in left {
        if !right_keys.contains(&element.key()) {
            diff.removed.push(element.clone());
        }
    }

    for element in right {
        if !left_keys.contains(&element.key()) {
            diff.added.push(element.clone());
        }
    }

    for before in left {
        let key = before.key();
        if let Some(after) = right.iter().find(|candidate| candidate.key() == key) {
            if !before.same_content(after) {
                diff.changed_from.push(before.clone());
                diff.changed_to.push(after.clone());
            }
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u8,
        body: String,
    }

    fn item(id: u8, body: &str) -> Item {
        Item {
            id,
            body: body.into(),
        }
    }

    impl Keyed for Item {
        type Key = u8;
        fn key(&self) -> u8 {
            self.id
        }
        fn same_content(&self, other: &Self) -> bool {
            self.body == other.body
        }
    }

    #[test]
    fn identical_sequences_compare_empty() {
        let items = vec![item(1, "a"), item(2, "b")];
        let diff = compare(&items, &items);
        assert!(diff.is_empty());
    }

    #[test]
    fn classifies_added_removed_changed() {
        let left = vec![item(1, "a"), item(2, "b"), item(3, "c")];
        let right = vec![item(2, "B"), item(3, "c"), item(4, "d")];

        let diff = compare(&left, &right);
        assert_eq!(diff.removed, vec![item(1, "a")]);
        assert_eq!(diff.added, vec![item(4, "d")]);
        assert_eq!(diff.changed_from, vec![item(2, "b")]);
        assert_eq!(diff.changed_to, vec![item(2, "B")]);
    }

    #[test]
    fn changed_pairs_are_index_aligned() {
        let left = vec![item(1, "a"), item(2, "b")];
        let right = vec![item(2, "B"), item(1, "A")];

        let diff = compare(&left, &right);
        assert_eq!(diff.changed_from.len(), diff.changed_to.len());
        for (from, to) in diff.changed_from.iter().zip(&diff.changed_to) {
            assert_eq!(from.id, to.id);
        }
    }

    fn arb_items() -> impl Strategy<Value = Vec<Item>> {
        proptest::collection::btree_map(0u8..20, "[a-c]{0,2}", 0..8).prop_map(|map| {
            map.into_iter()
                .map(|(id, body)| Item { id, body })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn compare_is_a_mirror(left in arb_items(), right in arb_items()) {
            let forward = compare(&left, &right);
            let backward = compare(&right, &left);

            prop_assert_eq!(forward.added, backward.removed);
            prop_assert_eq!(forward.removed, backward.added);
            prop_assert_eq!(forward.changed_from, backward.changed_to);
            prop_assert_eq!(forward.changed_to, backward.changed_from);
        }

        #[test]
        fn self_compare_is_empty(items in arb_items()) {
            prop_assert!(compare(&items, &items).is_empty());
        }
    }
}
