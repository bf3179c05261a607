//! Track-provenance sets.
//!
//! Three independent sets follow the particles of interest through an event's
//! track tree: Ge-77 nuclei, everything descended from a Ge-77 production, and
//! everything descended from a gadolinium capture. Membership propagates from
//! parent to child; all operations are idempotent so the engine's stack order
//! does not matter.

use crate::transport::Secondary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of track IDs within one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSet {
    ids: BTreeSet<i32>,
}

impl TrackSet {
    /// Returns `true` when the ID was not yet a member.
    pub fn add(&mut self, track_id: i32) -> bool {
        self.ids.insert(track_id)
    }

    pub fn contains(&self, track_id: i32) -> bool {
        self.ids.contains(&track_id)
    }

    pub fn remove(&mut self, track_id: i32) -> bool {
        self.ids.remove(&track_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.ids.iter().copied()
    }
}

/// When a sibling set lets go of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingRetention {
    /// Members stay until the end of the event.
    #[default]
    Persist,
    /// A member is dropped once its track ends, after its secondaries inherited membership.
    ReleaseOnTrackEnd,
}

/// Identifies one of the provenance sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvenanceSet {
    /// The Ge-77 nuclei themselves. Never propagated to children.
    Ge77,
    Ge77Sibling,
    GdSibling,
}

/// One sibling set plus the members it already released.
///
/// A released track keeps passing membership to children that start after
/// it ended; they were spawned while it was still a member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SiblingSet {
    members: TrackSet,
    released: TrackSet,
    retention: SiblingRetention,
}

impl SiblingSet {
    fn new(retention: SiblingRetention) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    fn clear(&mut self) {
        self.members.clear();
        self.released.clear();
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty() && self.released.is_empty()
    }

    fn passes_to_children(&self, track_id: i32) -> bool {
        self.members.contains(track_id) || self.released.contains(track_id)
    }

    fn inherit(&mut self, track_id: i32, parent_id: i32) {
        if self.passes_to_children(parent_id) {
            self.members.add(track_id);
        }
    }

    fn finish(&mut self, track_id: i32, secondaries: &[Secondary]) {
        if !self.members.contains(track_id) {
            return;
        }
        for secondary in secondaries {
            self.members.add(secondary.track_id);
        }
        if self.retention == SiblingRetention::ReleaseOnTrackEnd {
            self.members.remove(track_id);
            self.released.add(track_id);
        }
    }
}

/// Per-event provenance state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceTracker {
    ge77: TrackSet,
    ge77_siblings: SiblingSet,
    gd_siblings: SiblingSet,
}

impl ProvenanceTracker {
    pub fn new(ge77_retention: SiblingRetention, gd_retention: SiblingRetention) -> Self {
        Self {
            ge77: TrackSet::default(),
            ge77_siblings: SiblingSet::new(ge77_retention),
            gd_siblings: SiblingSet::new(gd_retention),
        }
    }

    pub fn clear(&mut self) {
        self.ge77.clear();
        self.ge77_siblings.clear();
        self.gd_siblings.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ge77.is_empty() && self.ge77_siblings.is_empty() && self.gd_siblings.is_empty()
    }

    /// Current members of `which`; released tracks are not listed.
    pub fn set(&self, which: ProvenanceSet) -> &TrackSet {
        match which {
            ProvenanceSet::Ge77 => &self.ge77,
            ProvenanceSet::Ge77Sibling => &self.ge77_siblings.members,
            ProvenanceSet::GdSibling => &self.gd_siblings.members,
        }
    }

    fn set_mut(&mut self, which: ProvenanceSet) -> &mut TrackSet {
        match which {
            ProvenanceSet::Ge77 => &mut self.ge77,
            ProvenanceSet::Ge77Sibling => &mut self.ge77_siblings.members,
            ProvenanceSet::GdSibling => &mut self.gd_siblings.members,
        }
    }

    pub fn mark(&mut self, which: ProvenanceSet, track_id: i32) -> bool {
        self.set_mut(which).add(track_id)
    }

    /// Marks every product of one interaction, e.g. all secondaries of a capture step.
    pub fn mark_all(&mut self, which: ProvenanceSet, secondaries: &[Secondary]) {
        let set = self.set_mut(which);
        for secondary in secondaries {
            set.add(secondary.track_id);
        }
    }

    pub fn contains(&self, which: ProvenanceSet, track_id: i32) -> bool {
        self.set(which).contains(track_id)
    }

    pub fn remove(&mut self, which: ProvenanceSet, track_id: i32) -> bool {
        self.set_mut(which).remove(track_id)
    }

    pub fn is_ge77_sibling(&self, track_id: i32) -> bool {
        self.ge77_siblings.members.contains(track_id)
    }

    pub fn is_gd_sibling(&self, track_id: i32) -> bool {
        self.gd_siblings.members.contains(track_id)
    }

    /// Pre-tracking hook: a new track inherits sibling membership from its
    /// parent, including a parent that has since been released.
    pub fn on_track_start(&mut self, track_id: i32, parent_id: i32) {
        self.ge77_siblings.inherit(track_id, parent_id);
        self.gd_siblings.inherit(track_id, parent_id);
    }

    /// Post-tracking hook: secondaries inherit membership before the
    /// retention policy may release the finished track.
    pub fn on_track_end(&mut self, track_id: i32, secondaries: &[Secondary]) {
        self.ge77_siblings.finish(track_id, secondaries);
        self.gd_siblings.finish(track_id, secondaries);
    }
}
