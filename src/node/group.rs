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

//! Composite structures: messages and groups
//!
//! A [`Group`] owns one repetition list per declared slot, indexed by slot
//! ordinal. Children are created lazily through the tree's factory the
//! first time a slot is read, or explicitly with [`Group::add`].

use super::{NodeId, StructureNode};
use crate::error::{StructureError, StructureResult};
use crate::factory::StructureContext;
use crate::schema::{SlotDeclaration, StructureType};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Repetitions of one slot; most slots hold zero or one node
type Repetitions = SmallVec<[StructureNode; 1]>;

/// Composite node holding child structures per its structure type
pub struct Group {
    id: NodeId,
    structure: Arc<StructureType>,
    context: StructureContext,
    children: Vec<Repetitions>,
}

impl Group {
    /// Create an empty composite of a message or group type
    pub fn new(structure: Arc<StructureType>, context: StructureContext) -> StructureResult<Self> {
        if !structure.is_composite() {
            return Err(StructureError::invalid_declaration(
                structure.name(),
                "segment types cannot be built as groups",
            ));
        }
        let children = (0..structure.len()).map(|_| Repetitions::new()).collect();
        Ok(Self {
            id: NodeId::next(),
            structure,
            context,
            children,
        })
    }

    /// Identity of this group
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Structure type
    pub fn structure(&self) -> &Arc<StructureType> {
        &self.structure
    }

    /// Structure type name
    pub fn type_name(&self) -> &str {
        self.structure.name()
    }

    /// Factory bindings and configuration shared with descendants
    pub fn context(&self) -> &StructureContext {
        &self.context
    }

    /// Declared slot names in ordinal order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.structure.slot_names()
    }

    /// Declaration of a slot
    pub fn slot(&self, name: &str) -> StructureResult<&SlotDeclaration> {
        self.locate(name).map(|(_, slot)| slot)
    }

    /// Whether a slot is required
    pub fn is_required(&self, name: &str) -> StructureResult<bool> {
        self.slot(name).map(|slot| slot.required)
    }

    /// Whether a slot may repeat
    pub fn is_repeating(&self, name: &str) -> StructureResult<bool> {
        self.slot(name).map(|slot| slot.repeating)
    }

    /// First repetition of a slot, created if none exists
    pub fn get(&mut self, name: &str) -> StructureResult<&mut StructureNode> {
        self.get_rep(name, 0)
    }

    /// Repetition `index` of a slot
    ///
    /// An index equal to the current count appends one new repetition; an
    /// index further out fails with `IndexOutOfSequence`.
    pub fn get_rep(&mut self, name: &str, index: usize) -> StructureResult<&mut StructureNode> {
        let (ordinal, slot) = self.locate(name)?;
        let count = self.children[ordinal].len();

        if index > count {
            return Err(StructureError::index_out_of_sequence(
                self.structure.name(),
                name,
                index,
                count,
            ));
        }
        if index == count {
            self.check_capacity(slot, count)?;
            let node = self.materialize(slot)?;
            log::trace!(
                "Created {}({}) in {} {}",
                name,
                index,
                self.structure.name(),
                self.id
            );
            self.children[ordinal].push(node);
        }

        Ok(&mut self.children[ordinal][index])
    }

    /// First repetition of a slot without creating it
    pub fn peek(&self, name: &str) -> StructureResult<Option<&StructureNode>> {
        self.peek_rep(name, 0)
    }

    /// Repetition `index` of a slot without creating it
    pub fn peek_rep(&self, name: &str, index: usize) -> StructureResult<Option<&StructureNode>> {
        let (ordinal, _) = self.locate(name)?;
        Ok(self.children[ordinal].get(index))
    }

    /// Number of existing repetitions of a slot
    pub fn count(&self, name: &str) -> StructureResult<usize> {
        let (ordinal, _) = self.locate(name)?;
        Ok(self.children[ordinal].len())
    }

    /// Existing repetitions of a slot in insertion order
    pub fn iter(&self, name: &str) -> StructureResult<std::slice::Iter<'_, StructureNode>> {
        let (ordinal, _) = self.locate(name)?;
        Ok(self.children[ordinal].iter())
    }

    /// Existing repetitions of a slot, mutably
    pub fn iter_mut(
        &mut self,
        name: &str,
    ) -> StructureResult<std::slice::IterMut<'_, StructureNode>> {
        let (ordinal, _) = self.locate(name)?;
        Ok(self.children[ordinal].iter_mut())
    }

    /// Append a new repetition
    pub fn add(&mut self, name: &str) -> StructureResult<&mut StructureNode> {
        let (ordinal, slot) = self.locate(name)?;
        let count = self.children[ordinal].len();
        self.check_capacity(slot, count)?;
        let node = self.materialize(slot)?;

        let repetitions = &mut self.children[ordinal];
        repetitions.push(node);
        Ok(&mut repetitions[count])
    }

    /// Insert a new repetition at `index`, shifting later repetitions up
    pub fn insert_at(&mut self, name: &str, index: usize) -> StructureResult<&mut StructureNode> {
        let (ordinal, slot) = self.locate(name)?;
        let count = self.children[ordinal].len();
        if index > count {
            return Err(StructureError::index_out_of_sequence(
                self.structure.name(),
                name,
                index,
                count,
            ));
        }
        self.check_capacity(slot, count)?;
        let node = self.materialize(slot)?;

        let repetitions = &mut self.children[ordinal];
        repetitions.insert(index, node);
        Ok(&mut repetitions[index])
    }

    /// Remove a repetition by identity
    pub fn remove(&mut self, name: &str, node: NodeId) -> StructureResult<StructureNode> {
        let (ordinal, _) = self.locate(name)?;
        let Some(position) = self.children[ordinal]
            .iter()
            .position(|candidate| candidate.id() == node)
        else {
            return Err(StructureError::not_found(self.structure.name(), name, node));
        };

        log::debug!(
            "Removed {}({}) {} from {}",
            name,
            position,
            node,
            self.structure.name()
        );
        Ok(self.children[ordinal].remove(position))
    }

    /// Remove a repetition by position, compacting the rest
    pub fn remove_at(&mut self, name: &str, index: usize) -> StructureResult<StructureNode> {
        let (ordinal, _) = self.locate(name)?;
        let count = self.children[ordinal].len();
        if index >= count {
            return Err(StructureError::index_out_of_sequence(
                self.structure.name(),
                name,
                index,
                count,
            ));
        }

        log::debug!("Removed {}({}) from {}", name, index, self.structure.name());
        Ok(self.children[ordinal].remove(index))
    }

    /// Slots with their existing repetitions, in ordinal order
    pub fn children(&self) -> impl Iterator<Item = (&SlotDeclaration, &[StructureNode])> {
        self.structure
            .slots()
            .zip(self.children.iter())
            .map(|(slot, repetitions)| (slot, repetitions.as_slice()))
    }

    /// Whether no payload exists anywhere below this group
    pub fn is_empty(&self) -> bool {
        self.children
            .iter()
            .flat_map(|repetitions| repetitions.iter())
            .all(StructureNode::is_empty)
    }

    fn locate(&self, name: &str) -> StructureResult<(usize, &SlotDeclaration)> {
        self.structure
            .slot_entry(name)
            .ok_or_else(|| StructureError::undeclared_slot(self.structure.name(), name))
    }

    fn check_capacity(&self, slot: &SlotDeclaration, count: usize) -> StructureResult<()> {
        match self.context.config().repetition_limit(slot.repeating) {
            Some(limit) if count >= limit => Err(StructureError::cardinality_violation(
                self.structure.name(),
                slot.name.clone(),
                limit,
            )),
            _ => Ok(()),
        }
    }

    fn materialize(&self, slot: &SlotDeclaration) -> StructureResult<StructureNode> {
        self.context.construct(&slot.type_name).map_err(|err| {
            StructureError::construction(self.structure.name(), slot.name.clone(), err)
        })
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (slot, repetitions) in self.children() {
            if !repetitions.is_empty() {
                map.entry(&slot.name, &repetitions);
            }
        }
        map.finish()?;
        write!(f, " @ {} {}", self.structure.name(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::StructureErrorKind;
    use crate::factory::DefaultStructureFactory;
    use crate::schema::{SchemaRegistry, StructureTypeBuilder};

    fn context(config: EngineConfig) -> StructureContext {
        let registry = SchemaRegistry::new();
        registry.declare_segments(["A", "B", "C"]).unwrap();
        StructureTypeBuilder::message("MSG")
            .required("A")
            .optional_repeating("B")
            .repeating("C")
            .declare(&registry)
            .unwrap();
        StructureContext::new(
            Arc::new(DefaultStructureFactory::new(Arc::new(registry))),
            config,
        )
    }

    fn message() -> Group {
        let context = context(EngineConfig::default());
        let structure = context.factory().resolve("MSG").unwrap();
        Group::new(structure, context).unwrap()
    }

    #[test]
    fn test_lazy_get_is_idempotent() {
        let mut group = message();
        assert_eq!(group.count("A").unwrap(), 0);

        let first = group.get("A").unwrap().id();
        let second = group.get("A").unwrap().id();
        assert_eq!(first, second);
        assert_eq!(group.count("A").unwrap(), 1);
    }

    #[test]
    fn test_count_does_not_create() {
        let group = message();
        assert_eq!(group.count("B").unwrap(), 0);
        assert!(group.peek("B").unwrap().is_none());
        assert_eq!(group.iter("B").unwrap().count(), 0);
        assert_eq!(group.count("B").unwrap(), 0);
    }

    #[test]
    fn test_indexed_get_extends_by_one() {
        let mut group = message();
        group.get_rep("B", 0).unwrap();
        group.get_rep("B", 1).unwrap();
        assert_eq!(group.count("B").unwrap(), 2);

        let err = group.get_rep("B", 3).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::IndexOutOfSequence);
        assert_eq!(group.count("B").unwrap(), 2);

        let existing = group.peek_rep("B", 1).unwrap().unwrap().id();
        assert_eq!(group.get_rep("B", 1).unwrap().id(), existing);
        assert_eq!(group.count("B").unwrap(), 2);
    }

    #[test]
    fn test_non_repeating_slot_holds_one() {
        let mut group = message();
        group.add("A").unwrap();
        let err = group.add("A").unwrap_err();
        assert_eq!(
            err,
            StructureError::cardinality_violation("MSG", "A", 1)
        );
        let err = group.get_rep("A", 1).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::CardinalityViolation);
        assert_eq!(group.count("A").unwrap(), 1);
    }

    #[test]
    fn test_undeclared_slot() {
        let mut group = message();
        assert_eq!(
            group.get("D").unwrap_err(),
            StructureError::undeclared_slot("MSG", "D")
        );
        assert_eq!(
            group.count("D").unwrap_err().kind(),
            StructureErrorKind::UndeclaredSlot
        );
        assert!(group.iter("D").is_err());
        assert!(group.remove_at("D", 0).is_err());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut group = message();
        let first = group.add("C").unwrap().id();
        let second = group.add("C").unwrap().id();

        let removed = group.remove("C", first).unwrap();
        assert_eq!(removed.id(), first);
        assert_eq!(group.count("C").unwrap(), 1);
        assert_eq!(group.peek("C").unwrap().unwrap().id(), second);

        let err = group.remove("C", first).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::NotFound);
        assert_eq!(group.count("C").unwrap(), 1);
    }

    #[test]
    fn test_remove_at_compacts() {
        let mut group = message();
        let ids: Vec<NodeId> = (0..4).map(|_| group.add("B").unwrap().id()).collect();

        group.remove_at("B", 1).unwrap();
        let remaining: Vec<NodeId> = group.iter("B").unwrap().map(StructureNode::id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[3]]);

        let err = group.remove_at("B", 3).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::IndexOutOfSequence);
    }

    #[test]
    fn test_insert_at_shifts() {
        let mut group = message();
        let first = group.add("B").unwrap().id();
        let inserted = group.insert_at("B", 0).unwrap().id();

        let order: Vec<NodeId> = group.iter("B").unwrap().map(StructureNode::id).collect();
        assert_eq!(order, vec![inserted, first]);
        assert!(group.insert_at("B", 5).is_err());
    }

    #[test]
    fn test_max_repetitions() {
        let context = context(EngineConfig::new(Some(2), false));
        let structure = context.factory().resolve("MSG").unwrap();
        let mut group = Group::new(structure, context).unwrap();

        group.add("B").unwrap();
        group.get_rep("B", 1).unwrap();
        let err = group.add("B").unwrap_err();
        assert_eq!(err, StructureError::cardinality_violation("MSG", "B", 2));
    }

    #[test]
    fn test_metadata_accessors() {
        let group = message();
        assert_eq!(group.names().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert!(group.is_required("A").unwrap());
        assert!(!group.is_repeating("A").unwrap());
        assert!(group.is_repeating("C").unwrap());
        assert!(group.is_required("Z").is_err());
    }

    #[test]
    fn test_is_empty_tracks_payloads() {
        let mut group = message();
        group.get("A").unwrap();
        assert!(group.is_empty());

        group
            .get("A")
            .unwrap()
            .as_segment_mut()
            .unwrap()
            .set_payload("A|1");
        assert!(!group.is_empty());
    }

    #[test]
    fn test_children_in_ordinal_order() {
        let mut group = message();
        group.add("C").unwrap();
        group.get("A").unwrap();

        let counts: Vec<(String, usize)> = group
            .children()
            .map(|(slot, repetitions)| (slot.name.clone(), repetitions.len()))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("A".to_string(), 1),
                ("B".to_string(), 0),
                ("C".to_string(), 1)
            ]
        );
    }
}
