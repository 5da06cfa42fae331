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

//! Flat record form of a structure tree
//!
//! A minimal encoder: [`flatten`] lists every existing node as a
//! `(path, payload)` record in traversal order, [`rebuild`] replays such a
//! list into an empty group. Wire encoders follow the same walk.

use crate::error::{StructureError, StructureResult};
use crate::node::{Group, Segment, StructureNode};
use crate::path::StructurePath;
use crate::schema::SlotDeclaration;
use crate::visitor::{StructureVisitor, walk_group};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;

/// One node of a flattened tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRecord {
    /// Location relative to the flattened group
    pub path: StructurePath,
    /// Segment payload; `Null` for groups and unpopulated segments
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl StructureRecord {
    /// Create a record
    pub fn new(path: StructurePath, payload: Value) -> Self {
        Self { path, payload }
    }
}

struct RecordWriter {
    records: Vec<StructureRecord>,
}

impl<'a> StructureVisitor<'a> for RecordWriter {
    type Error = Infallible;

    fn enter_group(
        &mut self,
        path: &StructurePath,
        _slot: &'a SlotDeclaration,
        _group: &'a Group,
    ) -> Result<(), Self::Error> {
        self.records
            .push(StructureRecord::new(path.clone(), Value::Null));
        Ok(())
    }

    fn visit_segment(
        &mut self,
        path: &StructurePath,
        _slot: &'a SlotDeclaration,
        segment: &'a Segment,
    ) -> Result<(), Self::Error> {
        self.records
            .push(StructureRecord::new(path.clone(), segment.payload().clone()));
        Ok(())
    }
}

/// List every existing node below `group`, parents before children
pub fn flatten(group: &Group) -> Vec<StructureRecord> {
    let mut writer = RecordWriter {
        records: Vec::new(),
    };
    let Ok(()) = walk_group(group, &mut writer);
    writer.records
}

/// Materialize `records` into `group` and set segment payloads
///
/// Records must arrive in the order [`flatten`] produces; each path may
/// extend a slot by at most one repetition.
///
/// A failing record creates nothing along its own path, but records applied
/// before it stay in `group`. Rebuild into a fresh tree and discard it on
/// error when all-or-nothing decoding is needed.
pub fn rebuild(group: &mut Group, records: &[StructureRecord]) -> StructureResult<()> {
    for record in records {
        match group.resolve_mut(&record.path)? {
            StructureNode::Segment(segment) => segment.set_payload(record.payload.clone()),
            StructureNode::Group(_) if record.payload.is_null() => {}
            StructureNode::Group(_) => {
                return Err(StructureError::invalid_path(
                    record.path.to_string(),
                    "groups cannot carry a payload",
                ));
            }
        }
    }
    log::debug!(
        "Rebuilt {} record(s) into {} {}",
        records.len(),
        group.type_name(),
        group.id()
    );
    Ok(())
}
