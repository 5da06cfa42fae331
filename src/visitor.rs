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

//! Visitor pattern for structure tree traversal
//!
//! Traversal is depth-first: slots in ordinal order, repetitions in
//! insertion order, a group's children before its next sibling. This is
//! the order encoders serialize in.

use crate::node::{Group, Segment, StructureNode};
use crate::path::StructurePath;
use crate::schema::SlotDeclaration;

/// Trait for visiting structure tree nodes
pub trait StructureVisitor<'a> {
    /// Error that stops the walk
    type Error;

    /// Called before a group's children are visited
    fn enter_group(
        &mut self,
        _path: &StructurePath,
        _slot: &'a SlotDeclaration,
        _group: &'a Group,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called after a group's children are visited
    fn leave_group(
        &mut self,
        _path: &StructurePath,
        _slot: &'a SlotDeclaration,
        _group: &'a Group,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Visit a leaf segment
    fn visit_segment(
        &mut self,
        path: &StructurePath,
        slot: &'a SlotDeclaration,
        segment: &'a Segment,
    ) -> Result<(), Self::Error>;
}

/// Walk every existing node below `group`
pub fn walk_group<'a, V: StructureVisitor<'a>>(
    group: &'a Group,
    visitor: &mut V,
) -> Result<(), V::Error> {
    let mut path = StructurePath::root();
    walk_children(group, &mut path, visitor)
}

fn walk_children<'a, V: StructureVisitor<'a>>(
    group: &'a Group,
    path: &mut StructurePath,
    visitor: &mut V,
) -> Result<(), V::Error> {
    for (slot, repetitions) in group.children() {
        for (repetition, node) in repetitions.iter().enumerate() {
            path.push(slot.name.as_str(), repetition);
            match node {
                StructureNode::Group(child) => {
                    visitor.enter_group(path, slot, child)?;
                    walk_children(child, path, visitor)?;
                    visitor.leave_group(path, slot, child)?;
                }
                StructureNode::Segment(segment) => {
                    visitor.visit_segment(path, slot, segment)?;
                }
            }
            path.pop();
        }
    }
    Ok(())
}

/// Collects every segment with its path
#[derive(Debug, Default)]
pub struct SegmentCollector<'a> {
    /// Segments in traversal order
    pub segments: Vec<(StructurePath, &'a Segment)>,
}

impl<'a> StructureVisitor<'a> for SegmentCollector<'a> {
    type Error = std::convert::Infallible;

    fn visit_segment(
        &mut self,
        path: &StructurePath,
        _slot: &'a SlotDeclaration,
        segment: &'a Segment,
    ) -> Result<(), Self::Error> {
        self.segments.push((path.clone(), segment));
        Ok(())
    }
}

impl Group {
    /// Every existing segment below this group, in traversal order
    pub fn segments(&self) -> Vec<(StructurePath, &Segment)> {
        let mut collector = SegmentCollector::default();
        let Ok(()) = walk_group(self, &mut collector);
        collector.segments
    }
}
