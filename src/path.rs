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

//! Slash-separated structure paths
//!
//! `PATIENT(1)/VISIT/PV1` addresses the first `PV1` of the first `VISIT` of
//! the second `PATIENT`. Omitted repetitions mean `0`.

use crate::error::{StructureError, StructureResult};
use crate::node::{Group, StructureNode};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// One step of a path: slot name and repetition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    /// Slot name
    pub name: String,
    /// Zero-based repetition
    pub repetition: usize,
}

impl PathSegment {
    /// Create a path step
    pub fn new(name: impl Into<String>, repetition: usize) -> Self {
        Self {
            name: name.into(),
            repetition,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.repetition)
    }
}

/// Location of a node relative to a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StructurePath {
    segments: SmallVec<[PathSegment; 4]>,
}

impl StructurePath {
    /// The empty path, addressing the group itself
    pub fn root() -> Self {
        Self::default()
    }

    /// Steps of the path
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last step
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Append a step in place
    pub fn push(&mut self, name: impl Into<String>, repetition: usize) {
        self.segments.push(PathSegment::new(name, repetition));
    }

    /// Remove the last step
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    /// A new path one step deeper
    pub fn child(&self, name: impl Into<String>, repetition: usize) -> Self {
        let mut path = self.clone();
        path.push(name, repetition);
        path
    }

    /// Path without its last step
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.iter().cloned().collect(),
        })
    }
}

impl fmt::Display for StructurePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                write!(f, "/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for StructurePath {
    type Err = StructureError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let mut path = StructurePath::root();
        if body.is_empty() {
            return Ok(path);
        }

        for step in body.split('/') {
            let (name, repetition) = match step.split_once('(') {
                Some((name, rest)) => {
                    let digits = rest.strip_suffix(')').ok_or_else(|| {
                        StructureError::invalid_path(
                            text,
                            format!("unclosed repetition in '{step}'"),
                        )
                    })?;
                    let repetition = digits.parse::<usize>().map_err(|_| {
                        StructureError::invalid_path(
                            text,
                            format!("repetition '{digits}' is not a non-negative integer"),
                        )
                    })?;
                    (name, repetition)
                }
                None => (step, 0),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(StructureError::invalid_path(
                    text,
                    format!("'{step}' is not a valid slot name"),
                ));
            }
            path.push(name, repetition);
        }
        Ok(path)
    }
}

impl TryFrom<String> for StructurePath {
    type Error = StructureError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<StructurePath> for String {
    fn from(path: StructurePath) -> Self {
        path.to_string()
    }
}

impl Group {
    /// Node at `path`, without creating anything
    pub fn resolve(&self, path: &StructurePath) -> StructureResult<Option<&StructureNode>> {
        let Some((last, parents)) = path.segments().split_last() else {
            return Err(StructureError::invalid_path(path.to_string(), "path is empty"));
        };

        let mut group = self;
        for step in parents {
            let Some(node) = group.peek_rep(&step.name, step.repetition)? else {
                return Ok(None);
            };
            group = node.as_group().ok_or_else(|| {
                StructureError::invalid_path(
                    path.to_string(),
                    format!("'{}' is a segment", step.name),
                )
            })?;
        }
        group.peek_rep(&last.name, last.repetition)
    }

    /// Node at `path`, creating missing nodes as [`Group::get_rep`] would
    ///
    /// The whole path is checked against the schema first, so a path that
    /// would fail part-way creates nothing.
    pub fn resolve_mut(&mut self, path: &StructurePath) -> StructureResult<&mut StructureNode> {
        self.check_path(path)?;

        let Some((last, parents)) = path.segments().split_last() else {
            return Err(StructureError::invalid_path(path.to_string(), "path is empty"));
        };

        let mut group = self;
        for step in parents {
            let node = group.get_rep(&step.name, step.repetition)?;
            group = node.as_group_mut().ok_or_else(|| {
                StructureError::invalid_path(
                    path.to_string(),
                    format!("'{}' is a segment", step.name),
                )
            })?;
        }
        group.get_rep(&last.name, last.repetition)
    }

    /// Dry run of `resolve_mut`: follow existing nodes, then the schema
    fn check_path(&self, path: &StructurePath) -> StructureResult<()> {
        let Some((last, parents)) = path.segments().split_last() else {
            return Err(StructureError::invalid_path(path.to_string(), "path is empty"));
        };

        let mut group = Some(self);
        let mut structure = self.structure().clone();
        for (depth, step) in path.segments().iter().enumerate() {
            let slot = structure
                .slot(&step.name)
                .ok_or_else(|| StructureError::undeclared_slot(structure.name(), &step.name))?;

            let existing = match group {
                Some(current) => {
                    let count = current.count(&step.name)?;
                    if step.repetition > count {
                        return Err(StructureError::index_out_of_sequence(
                            structure.name(),
                            &step.name,
                            step.repetition,
                            count,
                        ));
                    }
                    current.peek_rep(&step.name, step.repetition)?
                }
                None if step.repetition > 0 => {
                    return Err(StructureError::index_out_of_sequence(
                        structure.name(),
                        &step.name,
                        step.repetition,
                        0,
                    ));
                }
                None => None,
            };

            if depth == parents.len() {
                debug_assert_eq!(step, last);
                if existing.is_none() && !self.context().factory().supports(&slot.type_name) {
                    return Err(StructureError::construction(
                        structure.name(),
                        slot.name.clone(),
                        StructureError::unknown_type(slot.type_name.clone()),
                    ));
                }
                break;
            }

            match existing {
                Some(node) => {
                    let child = node.as_group().ok_or_else(|| {
                        StructureError::invalid_path(
                            path.to_string(),
                            format!("'{}' is a segment", step.name),
                        )
                    })?;
                    structure = child.structure().clone();
                    group = Some(child);
                }
                None => {
                    let child = self
                        .context()
                        .factory()
                        .resolve(&slot.type_name)
                        .map_err(|err| {
                            StructureError::construction(structure.name(), slot.name.clone(), err)
                        })?;
                    if !child.is_composite() {
                        return Err(StructureError::invalid_path(
                            path.to_string(),
                            format!("'{}' is a segment", step.name),
                        ));
                    }
                    structure = child;
                    group = None;
                }
            }
        }
        Ok(())
    }
}
