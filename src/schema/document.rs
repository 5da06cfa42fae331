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

//! JSON schema documents
//!
//! A document is the data form of a message catalog:
//!
//! ```json
//! {
//!   "version": "2.8",
//!   "structures": [
//!     { "name": "MSH", "kind": "segment", "description": "Message Header" },
//!     { "name": "CCU_I20", "kind": "message", "slots": [
//!         { "type": "MSH", "required": true },
//!         { "type": "SFT", "repeating": true }
//!     ] }
//!   ]
//! }
//! ```

use super::{StructureKind, StructureType, StructureTypeBuilder};
use crate::error::StructureResult;
use serde::{Deserialize, Serialize};

/// Serialized set of structure declarations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// HL7 version the structures belong to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Structure declarations
    #[serde(default)]
    pub structures: Vec<StructureDefinition>,
}

/// One structure declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureDefinition {
    /// Type name
    pub name: String,
    /// Message, group or segment
    pub kind: StructureKind,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Child slots in canonical order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<SlotDefinition>,
}

/// One slot of a structure declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDefinition {
    /// Explicit slot name; derived from the type when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Structure type of the slot
    #[serde(rename = "type")]
    pub type_name: String,
    /// Required flag
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    /// Repeating flag
    #[serde(default, skip_serializing_if = "is_false")]
    pub repeating: bool,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SchemaDocument {
    /// Parse a document from JSON
    pub fn from_json(json: &str) -> StructureResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render the document as pretty-printed JSON
    pub fn to_json_pretty(&self) -> StructureResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a document from declared types
    pub fn from_types<'a>(
        version: Option<String>,
        types: impl IntoIterator<Item = &'a StructureType>,
    ) -> Self {
        Self {
            version,
            structures: types.into_iter().map(StructureDefinition::from).collect(),
        }
    }

    /// Convert every definition into a validated structure type
    pub fn to_structure_types(&self) -> StructureResult<Vec<StructureType>> {
        self.structures
            .iter()
            .map(StructureDefinition::to_structure_type)
            .collect()
    }
}

impl StructureDefinition {
    /// Convert into a validated structure type
    pub fn to_structure_type(&self) -> StructureResult<StructureType> {
        if self.kind == StructureKind::Segment && self.slots.is_empty() {
            let segment = StructureType::segment(self.name.clone());
            return Ok(match &self.description {
                Some(description) => segment.with_description(description.clone()),
                None => segment,
            });
        }

        let mut builder = StructureTypeBuilder::new(self.name.clone(), self.kind);
        if let Some(description) = &self.description {
            builder = builder.description(description.clone());
        }
        for slot in &self.slots {
            builder = match &slot.name {
                Some(name) => builder.named_slot(
                    name.clone(),
                    slot.type_name.clone(),
                    slot.required,
                    slot.repeating,
                ),
                None => builder.slot(slot.type_name.clone(), slot.required, slot.repeating),
            };
            if let Some(description) = &slot.description {
                builder = builder.described(description.clone());
            }
        }
        builder.build()
    }
}

impl From<&StructureType> for StructureDefinition {
    fn from(structure: &StructureType) -> Self {
        Self {
            name: structure.name().to_string(),
            kind: structure.kind(),
            description: structure.description().map(str::to_string),
            slots: structure
                .slots()
                .map(|slot| SlotDefinition {
                    name: Some(slot.name.clone()),
                    type_name: slot.type_name.clone(),
                    required: slot.required,
                    repeating: slot.repeating,
                    description: slot.description.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureErrorKind;
    use crate::schema::SchemaRegistry;

    const DOCUMENT: &str = r#"{
        "version": "2.8",
        "structures": [
            { "name": "MSH", "kind": "segment", "description": "Message Header" },
            { "name": "NTE", "kind": "segment" },
            { "name": "OBR", "kind": "segment" },
            { "name": "ORDER", "kind": "group", "slots": [
                { "type": "OBR", "required": true },
                { "type": "NTE", "repeating": true },
                { "type": "NTE", "repeating": true, "description": "Trailing notes" }
            ] },
            { "name": "MSG", "kind": "message", "slots": [
                { "type": "MSH", "required": true },
                { "name": "ORDERS", "type": "ORDER", "repeating": true }
            ] }
        ]
    }"#;

    #[test]
    fn test_load_document() {
        let document = SchemaDocument::from_json(DOCUMENT).unwrap();
        let registry = SchemaRegistry::from_document(&document).unwrap();

        assert_eq!(registry.len(), 5);
        assert_eq!(registry.version().as_deref(), Some("2.8"));

        let order = registry.lookup("ORDER").unwrap();
        assert_eq!(
            order.slot_names().collect::<Vec<_>>(),
            vec!["OBR", "NTE", "NTE2"]
        );
        assert_eq!(
            order.slot("NTE2").unwrap().description.as_deref(),
            Some("Trailing notes")
        );

        let message = registry.lookup("MSG").unwrap();
        assert_eq!(message.slot("ORDERS").unwrap().type_name, "ORDER");
        assert_eq!(
            registry.lookup("MSH").unwrap().description(),
            Some("Message Header")
        );
    }

    #[test]
    fn test_document_conflicts_leave_registry_untouched() {
        let registry = SchemaRegistry::new();
        registry
            .declare(StructureType::segment("ORDER"))
            .unwrap();

        let document = SchemaDocument::from_json(DOCUMENT).unwrap();
        let err = registry.load_document(&document).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::SchemaConflict);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_export_round_trip() {
        let document = SchemaDocument::from_json(DOCUMENT).unwrap();
        let registry = SchemaRegistry::from_document(&document).unwrap();

        let exported = registry.to_document();
        let reloaded = SchemaRegistry::from_document(&exported).unwrap();
        assert_eq!(reloaded.type_names(), registry.type_names());
        assert_eq!(
            reloaded.lookup("ORDER").unwrap().as_ref(),
            registry.lookup("ORDER").unwrap().as_ref()
        );
    }

    #[test]
    fn test_malformed_document() {
        let err = SchemaDocument::from_json(r#"{"structures": [{"name": "X"}]}"#).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::InvalidDocument);
    }
}
