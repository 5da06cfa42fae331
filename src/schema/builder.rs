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

//! Fluent builder for structure type declarations

use super::{SchemaRegistry, SlotDeclaration, StructureKind, StructureType};
use crate::error::StructureResult;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Builds a [`StructureType`] slot by slot, assigning ordinals in call order
///
/// Slot names default to the slot's type name. A type that occurs more than
/// once gets its occurrence number appended (`NTE`, `NTE2`, `NTE3`).
///
/// ```
/// use octofhir_hl7_structure::schema::StructureTypeBuilder;
///
/// let ccu = StructureTypeBuilder::message("CCU_I20")
///     .required("MSH")
///     .optional_repeating("SFT")
///     .optional("UAC")
///     .required("RF1")
///     .build()
///     .unwrap();
/// assert_eq!(ccu.ordinal_of("RF1"), Some(3));
/// ```
#[derive(Debug, Clone)]
pub struct StructureTypeBuilder {
    name: String,
    kind: StructureKind,
    description: Option<String>,
    slots: Vec<SlotDeclaration>,
    occurrences: FxHashMap<String, usize>,
}

impl StructureTypeBuilder {
    /// Start a declaration of the given kind
    pub fn new(name: impl Into<String>, kind: StructureKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            slots: Vec::new(),
            occurrences: FxHashMap::default(),
        }
    }

    /// Start a message declaration
    pub fn message(name: impl Into<String>) -> Self {
        Self::new(name, StructureKind::Message)
    }

    /// Start a group declaration
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, StructureKind::Group)
    }

    /// Describe the structure type
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a required, singular slot
    pub fn required(self, type_name: impl Into<String>) -> Self {
        self.slot(type_name, true, false)
    }

    /// Append an optional, singular slot
    pub fn optional(self, type_name: impl Into<String>) -> Self {
        self.slot(type_name, false, false)
    }

    /// Append a required, repeating slot
    pub fn repeating(self, type_name: impl Into<String>) -> Self {
        self.slot(type_name, true, true)
    }

    /// Append an optional, repeating slot
    pub fn optional_repeating(self, type_name: impl Into<String>) -> Self {
        self.slot(type_name, false, true)
    }

    /// Append a slot named after its type
    pub fn slot(mut self, type_name: impl Into<String>, required: bool, repeating: bool) -> Self {
        let type_name = type_name.into();
        let occurrence = self.occurrences.entry(type_name.clone()).or_insert(0);
        *occurrence += 1;
        let name = if *occurrence == 1 {
            type_name.clone()
        } else {
            format!("{type_name}{occurrence}")
        };
        self.push(name, type_name, required, repeating, None);
        self
    }

    /// Append a slot with an explicit name
    pub fn named_slot(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        required: bool,
        repeating: bool,
    ) -> Self {
        let type_name = type_name.into();
        *self.occurrences.entry(type_name.clone()).or_insert(0) += 1;
        self.push(name.into(), type_name, required, repeating, None);
        self
    }

    /// Describe the most recently appended slot
    pub fn described(mut self, description: impl Into<String>) -> Self {
        if let Some(slot) = self.slots.last_mut() {
            slot.description = Some(description.into());
        }
        self
    }

    fn push(
        &mut self,
        name: String,
        type_name: String,
        required: bool,
        repeating: bool,
        description: Option<String>,
    ) {
        let ordinal = self.slots.len();
        let mut slot = SlotDeclaration::new(name, type_name, required, repeating, ordinal);
        slot.description = description;
        self.slots.push(slot);
    }

    /// Finish the declaration
    pub fn build(self) -> StructureResult<StructureType> {
        let structure = StructureType::new(self.name, self.kind, self.slots)?;
        Ok(match self.description {
            Some(description) => structure.with_description(description),
            None => structure,
        })
    }

    /// Finish the declaration and register it
    pub fn declare(self, registry: &SchemaRegistry) -> StructureResult<Arc<StructureType>> {
        registry.declare(self.build()?)
    }
}
