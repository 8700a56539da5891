//! Property domain model and weight classification table.
//!
//! # Responsibility
//! - Define the typed key/value record attached to notes and pages.
//! - Own the weight lookup table controlling default visibility and
//!   duplicate-name handling.
//!
//! # Invariants
//! - A property is owned by exactly one note or one page (`PropertyOwner`).
//! - Property names are not unique: one owner may carry several values
//!   under the same name.
//! - Weight classification is data-driven through `weight_class`, never
//!   ad-hoc numeric branching at call sites.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::note::NoteId;
use crate::model::page::PageId;

/// Stable identifier for a property row.
pub type PropertyId = Uuid;

/// Exactly-one-owner reference for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyOwner {
    /// Property attached to a note.
    Note(NoteId),
    /// Property attached directly to a page.
    Page(PageId),
}

/// Named value attached to one note or page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Stable property row ID.
    pub id: PropertyId,
    /// Owning note or page.
    pub owner: PropertyOwner,
    /// Property name. Not unique per owner.
    pub name: String,
    /// Property value as already-parsed text.
    pub value: String,
    /// Numeric classification, see `weight_class`.
    pub weight: i64,
    /// Soft delete flag.
    pub active: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Property {
    /// Creates a new active property with a generated stable ID.
    pub fn new(
        owner: PropertyOwner,
        name: impl Into<String>,
        value: impl Into<String>,
        weight: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name: name.into(),
            value: value.into(),
            weight,
            active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Returns whether this property is hidden unless explicitly requested.
    pub fn is_internal(&self) -> bool {
        weight_class(self.weight).internal
    }
}

/// Behavior when one owner already carries an active property with the
/// same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateHandling {
    /// New value overwrites the existing same-name row.
    Replace,
    /// New value is stored as an additional row.
    Append,
}

/// Visibility and accumulation policy for one weight bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightClass {
    /// Weight value this class applies to.
    pub weight: i64,
    /// Hidden from default reads when `true`.
    pub internal: bool,
    /// Same-name write behavior on one owner.
    pub duplicates: DuplicateHandling,
}

/// Known weight buckets.
///
/// Unknown weights classify as internal/append: hidden unless explicitly
/// requested and never silently overwriting an existing value.
const WEIGHT_CLASSES: &[WeightClass] = &[
    WeightClass {
        weight: 0,
        internal: false,
        duplicates: DuplicateHandling::Replace,
    },
    WeightClass {
        weight: 1,
        internal: false,
        duplicates: DuplicateHandling::Append,
    },
    WeightClass {
        weight: 2,
        internal: true,
        duplicates: DuplicateHandling::Replace,
    },
    WeightClass {
        weight: 3,
        internal: true,
        duplicates: DuplicateHandling::Append,
    },
];

const UNKNOWN_WEIGHT_CLASS: WeightClass = WeightClass {
    weight: i64::MIN,
    internal: true,
    duplicates: DuplicateHandling::Append,
};

/// Looks up the visibility/accumulation policy for one weight value.
pub fn weight_class(weight: i64) -> WeightClass {
    WEIGHT_CLASSES
        .iter()
        .copied()
        .find(|class| class.weight == weight)
        .unwrap_or(WeightClass {
            weight,
            ..UNKNOWN_WEIGHT_CLASS
        })
}
