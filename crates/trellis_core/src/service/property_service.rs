//! Inherited-property resolution over note ancestor chains.
//!
//! # Responsibility
//! - Merge the active properties of a note's strict ancestors into one
//!   name-keyed mapping, deduplicated by `(name, value)`.
//! - Apply the weight table's visibility filter.
//!
//! # Invariants
//! - The walk is iterative and bounded by an explicit visited-set of note
//!   ids, never by recursion depth: a cyclic parent chain terminates
//!   silently with whatever was accumulated before the repeat.
//! - A missing or soft-deleted ancestor ends the walk; it is not an error.
//! - The starting note's own properties are never included.
//! - Output is deterministic: names ordered by map, values sorted per name.

use crate::model::note::NoteId;
use crate::repo::note_repo::NoteRepository;
use crate::repo::property_repo::PropertyRepository;
use crate::repo::RepoResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Defensive budget on top of the visited-set. Chain length is not bounded
/// by the data model, so cap the walk even for acyclic but huge chains.
const MAX_ANCESTOR_HOPS: usize = 1024;

/// One resolved property value in the wire shape consumers expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub value: String,
}

/// Resolved ancestor properties grouped by name.
///
/// An empty mapping means the note has no ancestors or none of them carry
/// eligible properties; callers normalize absence and emptiness to the same
/// semantic.
pub type ParentProperties = BTreeMap<String, Vec<PropertyValue>>;

/// Read-only resolver over note and property repositories.
pub struct PropertyResolver<N, P> {
    notes: N,
    properties: P,
}

impl<N: NoteRepository, P: PropertyRepository> PropertyResolver<N, P> {
    /// Creates a resolver using the provided repository implementations.
    pub fn new(notes: N, properties: P) -> Self {
        Self { notes, properties }
    }

    /// Resolves the deduplicated properties inherited from every strict
    /// ancestor of `note_id`.
    ///
    /// # Contract
    /// - `include_internal = false` excludes properties whose weight bucket
    ///   classifies them internal.
    /// - Duplicate `(name, value)` pairs across ancestors collapse into one
    ///   entry; differing values under one name are kept separately.
    /// - Cycles and dangling parent references terminate the walk silently.
    pub fn resolve_ancestor_properties(
        &self,
        note_id: NoteId,
        include_internal: bool,
    ) -> RepoResult<ParentProperties> {
        let mut accumulated: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut visited: HashSet<NoteId> = HashSet::new();
        visited.insert(note_id);

        let mut current = self.notes.parent_of(note_id)?.flatten();

        let mut hops = 0;
        while let Some(ancestor_id) = current {
            if !visited.insert(ancestor_id) {
                // Cycle detected: stop with what was accumulated so far.
                break;
            }
            hops += 1;
            if hops > MAX_ANCESTOR_HOPS {
                break;
            }

            // A dangling or soft-deleted ancestor reads as "no further
            // ancestors"; its rows do not contribute.
            let parent = match self.notes.parent_of(ancestor_id)? {
                Some(parent) => parent,
                None => break,
            };

            for property in self.properties.active_note_properties(ancestor_id)? {
                if !include_internal && property.is_internal() {
                    continue;
                }
                let values = accumulated.entry(property.name).or_default();
                if !values.contains(&property.value) {
                    values.push(property.value);
                }
            }

            current = parent;
        }

        let mut resolved = ParentProperties::new();
        for (name, mut values) in accumulated {
            values.sort();
            resolved.insert(
                name,
                values.into_iter().map(|value| PropertyValue { value }).collect(),
            );
        }
        Ok(resolved)
    }
}
