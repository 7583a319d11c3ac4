//! Add-Wins Observed-Remove set keyed by item ID.
//!
//! Each add records a globally unique tag; a remove covers exactly the tags
//! it has observed. An element exists while at least one of its add-tags is
//! not covered by a remove-tag, so an add concurrent with a remove survives
//! the merge (add-wins).
//!
//! The set also keeps a process-local `pending_removals` set: a locally
//! removed element disappears from reads immediately, before any merge has
//! had a chance to confirm the removal. Pending flags are cleared by the
//! next merge, at which point the tag algebra decides.
//!
//! Element payloads are merged per field through [`FieldMerge`], which the
//! domain layer implements (LWW for names, PN for counters, component max
//! for clocks).

use basket_types::{ItemId, NodeId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide tag sequence. Distinct adds within the same millisecond on
/// the same node still get distinct tags.
static TAG_SEQ: AtomicU64 = AtomicU64::new(0);

/// A unique tag identifying a specific add or remove observation.
///
/// Format: `<nodeId>:<seq>:<millis>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Creates a fresh tag for the given participant.
    #[must_use]
    pub fn fresh(node_id: &NodeId) -> Self {
        let seq = TAG_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}:{}:{}", node_id, seq, Timestamp::now()))
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-field merge of two concurrent versions of the same element.
pub trait FieldMerge {
    /// Folds `other` into `self` field by field.
    fn merge_fields(&mut self, other: &Self);
}

/// An Add-Wins Observed-Remove set of elements keyed by [`ItemId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AworSet<V> {
    /// Current element payloads.
    elements: HashMap<ItemId, V>,
    /// Tags recorded by add operations, per element.
    add_tags: HashMap<ItemId, HashSet<Tag>>,
    /// Tags covered by remove operations, per element.
    remove_tags: HashMap<ItemId, HashSet<Tag>>,
    /// Locally removed ids, suppressed from reads until the next merge.
    #[serde(skip)]
    pending_removals: HashSet<ItemId>,
}

impl<V> Default for AworSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> AworSet<V> {
    /// Creates a new empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            add_tags: HashMap::new(),
            remove_tags: HashMap::new(),
            pending_removals: HashSet::new(),
        }
    }

    /// Adds (or re-adds) an element, recording a fresh add-tag.
    ///
    /// A re-add after a remove is a legitimate re-birth: the pending flag
    /// and the element's remove-tags are cleared so it becomes visible
    /// again everywhere the add propagates.
    pub fn add(&mut self, id: ItemId, value: V, node_id: &NodeId) -> Tag {
        self.pending_removals.remove(&id);
        self.remove_tags.remove(&id);
        let tag = Tag::fresh(node_id);
        self.add_tags.entry(id).or_default().insert(tag.clone());
        self.elements.insert(id, value);
        tag
    }

    /// Removes an element by covering all currently observed add-tags.
    ///
    /// The element stops appearing in reads immediately (pending removal);
    /// the tag algebra finalizes the removal at the next merge. Add-tags
    /// recorded concurrently elsewhere are not covered, which is what makes
    /// concurrent adds win.
    ///
    /// Returns the tags that were covered.
    pub fn remove(&mut self, id: &ItemId) -> Vec<Tag> {
        let observed: Vec<Tag> = self
            .add_tags
            .get(id)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default();

        if !observed.is_empty() {
            self.remove_tags
                .entry(*id)
                .or_default()
                .extend(observed.iter().cloned());
        }
        self.pending_removals.insert(*id);
        observed
    }

    /// Mutates an element in place, unless it is pending removal.
    ///
    /// Returns true if the closure ran.
    pub fn update_with<F>(&mut self, id: &ItemId, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        if self.pending_removals.contains(id) {
            return false;
        }
        match self.elements.get_mut(id) {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        }
    }

    /// Returns the element for `id`, if it exists and is not suppressed.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&V> {
        if self.pending_removals.contains(id) || !self.should_exist(id) {
            return None;
        }
        self.elements.get(id)
    }

    /// Returns true iff at least one add-tag for `id` is not covered by a
    /// remove-tag. This is the add-wins rule.
    #[must_use]
    pub fn should_exist(&self, id: &ItemId) -> bool {
        let Some(adds) = self.add_tags.get(id) else {
            return false;
        };
        match self.remove_tags.get(id) {
            Some(removes) => adds.iter().any(|tag| !removes.contains(tag)),
            None => !adds.is_empty(),
        }
    }

    /// Returns true if the element is visible in reads.
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the stored payload regardless of visibility. Cascade deletes
    /// and removal events need the payload of an element that reads already
    /// suppress.
    #[must_use]
    pub fn element(&self, id: &ItemId) -> Option<&V> {
        self.elements.get(id)
    }

    /// Iterates over visible elements.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &V)> {
        self.elements.iter().filter(|(id, _)| {
            !self.pending_removals.contains(*id) && self.should_exist(id)
        })
    }

    /// Number of visible elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if no element is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the ids currently pending local removal.
    pub fn pending_removals(&self) -> impl Iterator<Item = &ItemId> {
        self.pending_removals.iter()
    }

    /// Returns the add-tags recorded for an element.
    #[must_use]
    pub fn add_tags(&self, id: &ItemId) -> Option<&HashSet<Tag>> {
        self.add_tags.get(id)
    }

    /// Returns the remove-tags recorded for an element.
    #[must_use]
    pub fn remove_tags(&self, id: &ItemId) -> Option<&HashSet<Tag>> {
        self.remove_tags.get(id)
    }

    /// Drops an element and all of its tag metadata.
    ///
    /// This bypasses the tag algebra; it is for cascade deletes where the
    /// containing list is destroyed outright.
    pub fn purge(&mut self, id: &ItemId) {
        self.elements.remove(id);
        self.add_tags.remove(id);
        self.remove_tags.remove(id);
        self.pending_removals.remove(id);
    }
}

impl<V: FieldMerge + Clone> AworSet<V> {
    /// Merges another replica's set into this one.
    ///
    /// Clears pending removals, unions both tag maps per id, merges the
    /// payloads of every surviving element field by field, and drops the
    /// elements whose add-tags are fully covered.
    ///
    /// Commutative, associative, and idempotent by construction.
    pub fn merge(&mut self, other: &Self) {
        self.pending_removals.clear();

        for (id, tags) in &other.add_tags {
            self.add_tags
                .entry(*id)
                .or_default()
                .extend(tags.iter().cloned());
        }
        for (id, tags) in &other.remove_tags {
            self.remove_tags
                .entry(*id)
                .or_default()
                .extend(tags.iter().cloned());
        }

        let ids: HashSet<ItemId> = self
            .elements
            .keys()
            .chain(other.elements.keys())
            .copied()
            .collect();

        for id in ids {
            if self.should_exist(&id) {
                match (self.elements.get_mut(&id), other.elements.get(&id)) {
                    (Some(local), Some(remote)) => local.merge_fields(remote),
                    (None, Some(remote)) => {
                        self.elements.insert(id, remote.clone());
                    }
                    _ => {}
                }
            } else {
                self.elements.remove(&id);
            }
        }
    }

    /// Creates a new set that is the merge of this and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}
