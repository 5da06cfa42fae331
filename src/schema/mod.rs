// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Schema declarations for messages, groups and segments
//!
//! A [`StructureType`] is the declarative replacement for a generated
//! per-message class: an ordered table of [`SlotDeclaration`]s. Types are
//! declared once into a [`SchemaRegistry`] and shared by every tree built
//! from them.

pub mod builder;
pub mod document;
pub mod registry;

pub use builder::StructureTypeBuilder;
pub use document::{SchemaDocument, SlotDefinition, StructureDefinition};
pub use registry::{SchemaRegistry, UnresolvedReference};

use crate::error::{StructureError, StructureResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a structure type materializes as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    /// Root composite of a message tree
    Message,
    /// Nested composite
    Group,
    /// Leaf whose payload belongs to the encoder
    Segment,
}

impl StructureKind {
    /// Whether instances of this kind hold child structures
    pub fn is_composite(self) -> bool {
        !matches!(self, StructureKind::Segment)
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureKind::Message => write!(f, "message"),
            StructureKind::Group => write!(f, "group"),
            StructureKind::Segment => write!(f, "segment"),
        }
    }
}

/// Multiplicity implied by a slot's required/repeating flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Required, singular
    ExactlyOne,
    /// Optional, singular
    ZeroOrOne,
    /// Required, repeating
    OneOrMore,
    /// Optional, repeating
    ZeroOrMore,
}

impl Cardinality {
    /// Derive the cardinality from slot flags
    pub fn from_flags(required: bool, repeating: bool) -> Self {
        match (required, repeating) {
            (true, false) => Cardinality::ExactlyOne,
            (false, false) => Cardinality::ZeroOrOne,
            (true, true) => Cardinality::OneOrMore,
            (false, true) => Cardinality::ZeroOrMore,
        }
    }

    /// Minimum number of repetitions
    pub fn min(self) -> usize {
        match self {
            Cardinality::ExactlyOne | Cardinality::OneOrMore => 1,
            Cardinality::ZeroOrOne | Cardinality::ZeroOrMore => 0,
        }
    }

    /// Maximum number of repetitions, `None` when unbounded
    pub fn max(self) -> Option<usize> {
        match self {
            Cardinality::ExactlyOne | Cardinality::ZeroOrOne => Some(1),
            Cardinality::OneOrMore | Cardinality::ZeroOrMore => None,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max() {
            Some(max) => write!(f, "{}..{}", self.min(), max),
            None => write!(f, "{}..*", self.min()),
        }
    }
}

/// A named, ordered child position in a structure type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotDeclaration {
    /// Slot name, unique within the owning type
    pub name: String,
    /// Structure type instantiated in this slot
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether a validator should insist on at least one repetition
    pub required: bool,
    /// Whether more than one repetition is allowed
    pub repeating: bool,
    /// Position in the owning type; also the canonical serialization order
    pub ordinal: usize,
    /// Human-readable description, e.g. "Message Header"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SlotDeclaration {
    /// Create a slot declaration
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        required: bool,
        repeating: bool,
        ordinal: usize,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            required,
            repeating,
            ordinal,
            description: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Multiplicity of this slot
    pub fn cardinality(&self) -> Cardinality {
        Cardinality::from_flags(self.required, self.repeating)
    }

    /// Equality ignoring descriptions
    fn same_shape(&self, other: &SlotDeclaration) -> bool {
        self.name == other.name
            && self.type_name == other.type_name
            && self.required == other.required
            && self.repeating == other.repeating
            && self.ordinal == other.ordinal
    }
}

/// Declared shape of a message, group or segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureType {
    name: String,
    kind: StructureKind,
    description: Option<String>,
    slots: IndexMap<String, SlotDeclaration>,
}

impl StructureType {
    /// Create a structure type from an ordered slot list
    ///
    /// Slot ordinals must run `0, 1, 2, ...` in list order and names must be
    /// unique. Segment types cannot declare slots.
    pub fn new(
        name: impl Into<String>,
        kind: StructureKind,
        slots: Vec<SlotDeclaration>,
    ) -> StructureResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(StructureError::invalid_declaration(
                name,
                "structure type name must not be empty",
            ));
        }
        if !kind.is_composite() && !slots.is_empty() {
            return Err(StructureError::invalid_declaration(
                name,
                "segment types cannot declare child slots",
            ));
        }

        let mut table = IndexMap::with_capacity(slots.len());
        for (position, slot) in slots.into_iter().enumerate() {
            if slot.name.is_empty() {
                return Err(StructureError::invalid_declaration(
                    name,
                    format!("slot {position} has an empty name"),
                ));
            }
            if slot.ordinal != position {
                return Err(StructureError::invalid_declaration(
                    name,
                    format!(
                        "slot '{}' has ordinal {}, expected {position}",
                        slot.name, slot.ordinal
                    ),
                ));
            }
            if table.contains_key(&slot.name) {
                return Err(StructureError::invalid_declaration(
                    name,
                    format!("slot '{}' is declared more than once", slot.name),
                ));
            }
            table.insert(slot.name.clone(), slot);
        }

        Ok(Self {
            name,
            kind,
            description: None,
            slots: table,
        })
    }

    /// Create a leaf segment type
    pub fn segment(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StructureKind::Segment,
            description: None,
            slots: IndexMap::new(),
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of structure
    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    /// Human-readable description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether instances hold child structures
    pub fn is_composite(&self) -> bool {
        self.kind.is_composite()
    }

    /// Slots in ordinal order
    pub fn slots(&self) -> impl Iterator<Item = &SlotDeclaration> {
        self.slots.values()
    }

    /// Slot names in ordinal order
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Look up a slot by name
    pub fn slot(&self, name: &str) -> Option<&SlotDeclaration> {
        self.slots.get(name)
    }

    /// Look up a slot by ordinal
    pub fn slot_at(&self, ordinal: usize) -> Option<&SlotDeclaration> {
        self.slots.get_index(ordinal).map(|(_, slot)| slot)
    }

    /// Ordinal of a slot name
    pub fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.slots.get_index_of(name)
    }

    /// Ordinal and declaration of a slot name
    pub fn slot_entry(&self, name: &str) -> Option<(usize, &SlotDeclaration)> {
        self.slots
            .get_full(name)
            .map(|(ordinal, _, slot)| (ordinal, slot))
    }

    /// Number of declared slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slots are declared
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Describe how `other` differs from this declaration, if it does
    pub(crate) fn conflict_with(&self, other: &StructureType) -> Option<String> {
        if self.kind != other.kind {
            return Some(format!("declared as {}, now as {}", self.kind, other.kind));
        }
        if self.slots.len() != other.slots.len() {
            return Some(format!(
                "declared with {} slot(s), now with {}",
                self.slots.len(),
                other.slots.len()
            ));
        }
        self.slots
            .values()
            .zip(other.slots.values())
            .find(|(existing, candidate)| !existing.same_shape(candidate))
            .map(|(existing, candidate)| {
                format!(
                    "slot {} was '{}' ({}, {}), now '{}' ({}, {})",
                    existing.ordinal,
                    existing.name,
                    existing.type_name,
                    existing.cardinality(),
                    candidate.name,
                    candidate.type_name,
                    candidate.cardinality()
                )
            })
    }
}
