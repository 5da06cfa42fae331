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

//! Structure nodes: composite groups and leaf segments

pub mod group;
pub mod segment;

pub use group::Group;
pub use segment::Segment;

use crate::schema::{StructureKind, StructureType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a node
///
/// Two handles compare equal only if they refer to the same node instance,
/// which is how `remove(name, node)` matches repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in a structure tree
#[derive(Debug)]
pub enum StructureNode {
    /// Composite holding child structures
    Group(Group),
    /// Leaf holding an encoder-owned payload
    Segment(Segment),
}

impl StructureNode {
    /// Identity of the node
    pub fn id(&self) -> NodeId {
        match self {
            StructureNode::Group(group) => group.id(),
            StructureNode::Segment(segment) => segment.id(),
        }
    }

    /// Structure type the node was built from
    pub fn structure(&self) -> &Arc<StructureType> {
        match self {
            StructureNode::Group(group) => group.structure(),
            StructureNode::Segment(segment) => segment.structure(),
        }
    }

    /// Structure type name
    pub fn type_name(&self) -> &str {
        self.structure().name()
    }

    /// Kind of the node's structure type
    pub fn kind(&self) -> StructureKind {
        self.structure().kind()
    }

    /// Whether no payload exists at or below this node
    pub fn is_empty(&self) -> bool {
        match self {
            StructureNode::Group(group) => group.is_empty(),
            StructureNode::Segment(segment) => segment.is_empty(),
        }
    }

    /// Check if this is a composite
    pub fn is_group(&self) -> bool {
        matches!(self, StructureNode::Group(_))
    }

    /// Check if this is a leaf
    pub fn is_segment(&self) -> bool {
        matches!(self, StructureNode::Segment(_))
    }

    /// Borrow as a composite
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            StructureNode::Group(group) => Some(group),
            StructureNode::Segment(_) => None,
        }
    }

    /// Mutably borrow as a composite
    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            StructureNode::Group(group) => Some(group),
            StructureNode::Segment(_) => None,
        }
    }

    /// Borrow as a leaf
    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            StructureNode::Segment(segment) => Some(segment),
            StructureNode::Group(_) => None,
        }
    }

    /// Mutably borrow as a leaf
    pub fn as_segment_mut(&mut self) -> Option<&mut Segment> {
        match self {
            StructureNode::Segment(segment) => Some(segment),
            StructureNode::Group(_) => None,
        }
    }
}

impl From<Group> for StructureNode {
    fn from(group: Group) -> Self {
        StructureNode::Group(group)
    }
}

impl From<Segment> for StructureNode {
    fn from(segment: Segment) -> Self {
        StructureNode::Segment(segment)
    }
}
