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

//! Schema registry implementation

use super::{SchemaDocument, SlotDeclaration, StructureKind, StructureType};
use crate::error::{StructureError, StructureResult};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;

/// A slot whose type is not declared in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// Structure type declaring the slot
    pub structure: String,
    /// Slot name
    pub slot: String,
    /// Missing type name
    pub type_name: String,
}

/// Registry of structure types by name
///
/// Declarations normally happen once at startup; the registry is then
/// shared behind an `Arc` by every factory and tree. Lookups hand out
/// `Arc<StructureType>` so the lock is never held by callers.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Structure types by name
    types: RwLock<FxHashMap<String, Arc<StructureType>>>,

    /// HL7 version of the loaded schema, if known
    version: RwLock<Option<String>>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry populated from a schema document
    pub fn from_document(document: &SchemaDocument) -> StructureResult<Self> {
        let registry = Self::new();
        registry.load_document(document)?;
        Ok(registry)
    }

    /// Register a structure type
    ///
    /// Re-declaring an identical type is a no-op returning the existing
    /// declaration; a differing re-declaration is a `SchemaConflict`.
    pub fn declare(&self, structure: StructureType) -> StructureResult<Arc<StructureType>> {
        let mut types = self.types.write();

        if let Some(existing) = types.get(structure.name()) {
            if let Some(reason) = existing.conflict_with(&structure) {
                return Err(StructureError::schema_conflict(structure.name(), reason));
            }
            log::debug!("Structure type '{}' re-declared identically", structure.name());
            return Ok(Arc::clone(existing));
        }

        log::debug!(
            "Declared {} '{}' with {} slot(s)",
            structure.kind(),
            structure.name(),
            structure.len()
        );
        let structure = Arc::new(structure);
        types.insert(structure.name().to_string(), Arc::clone(&structure));
        Ok(structure)
    }

    /// Register a structure type from an ordered slot list
    pub fn declare_slots(
        &self,
        name: impl Into<String>,
        kind: StructureKind,
        slots: Vec<SlotDeclaration>,
    ) -> StructureResult<Arc<StructureType>> {
        self.declare(StructureType::new(name, kind, slots)?)
    }

    /// Register leaf segment types
    pub fn declare_segments<I, S>(&self, names: I) -> StructureResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.declare(StructureType::segment(name))?;
        }
        Ok(())
    }

    /// Register every structure of a document
    ///
    /// The document is checked as a whole before anything is inserted, so a
    /// conflict leaves the registry untouched.
    pub fn load_document(&self, document: &SchemaDocument) -> StructureResult<usize> {
        let candidates = document.to_structure_types()?;
        let mut types = self.types.write();

        let mut pending: FxHashMap<&str, &StructureType> = FxHashMap::default();
        for candidate in &candidates {
            let existing = types
                .get(candidate.name())
                .map(|existing| existing.as_ref())
                .or_else(|| pending.get(candidate.name()).copied());
            if let Some(existing) = existing {
                if let Some(reason) = existing.conflict_with(candidate) {
                    return Err(StructureError::schema_conflict(candidate.name(), reason));
                }
            }
            pending.insert(candidate.name(), candidate);
        }
        drop(pending);

        let mut added = 0;
        for candidate in candidates {
            if !types.contains_key(candidate.name()) {
                types.insert(candidate.name().to_string(), Arc::new(candidate));
                added += 1;
            }
        }
        drop(types);

        if let Some(version) = &document.version {
            *self.version.write() = Some(version.clone());
        }
        log::debug!(
            "Loaded schema document: {} new structure type(s), version {:?}",
            added,
            document.version
        );
        Ok(added)
    }

    /// Resolve a type name
    pub fn lookup(&self, name: &str) -> StructureResult<Arc<StructureType>> {
        self.get(name)
            .ok_or_else(|| StructureError::unknown_type(name))
    }

    /// Resolve a type name, if declared
    pub fn get(&self, name: &str) -> Option<Arc<StructureType>> {
        self.types.read().get(name).cloned()
    }

    /// Check if a type is declared
    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Number of declared types
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Declared type names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// HL7 version of the loaded schema
    pub fn version(&self) -> Option<String> {
        self.version.read().clone()
    }

    /// Record the HL7 version of the schema
    pub fn set_version(&self, version: impl Into<String>) {
        *self.version.write() = Some(version.into());
    }

    /// Slots reachable from `root` whose types are not declared
    pub fn unresolved_references(&self, root: &str) -> StructureResult<Vec<UnresolvedReference>> {
        let types = self.types.read();
        if !types.contains_key(root) {
            return Err(StructureError::unknown_type(root));
        }

        let mut unresolved = Vec::new();
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(root);

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            let Some(structure) = types.get(name) else {
                continue;
            };
            for slot in structure.slots() {
                if types.contains_key(&slot.type_name) {
                    queue.push_back(slot.type_name.as_str());
                } else {
                    unresolved.push(UnresolvedReference {
                        structure: structure.name().to_string(),
                        slot: slot.name.clone(),
                        type_name: slot.type_name.clone(),
                    });
                }
            }
        }

        Ok(unresolved)
    }

    /// Fail with `UnknownType` if any declared slot refers to an undeclared type
    pub fn check_references(&self) -> StructureResult<()> {
        let types = self.types.read();
        let mut names: Vec<&String> = types.keys().collect();
        names.sort();

        for name in names {
            for slot in types[name].slots() {
                if !types.contains_key(&slot.type_name) {
                    return Err(StructureError::unknown_type(slot.type_name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Export the registry as a schema document, types sorted by name
    pub fn to_document(&self) -> SchemaDocument {
        let types = self.types.read();
        let mut structures: Vec<&Arc<StructureType>> = types.values().collect();
        structures.sort_by(|a, b| a.name().cmp(b.name()));
        SchemaDocument::from_types(self.version(), structures.into_iter().map(|s| s.as_ref()))
    }
}
