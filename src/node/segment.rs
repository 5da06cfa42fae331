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

//! Leaf segments

use super::NodeId;
use crate::error::{StructureError, StructureResult};
use crate::schema::StructureType;
use serde_json::Value;
use std::sync::Arc;

/// Leaf node whose payload is owned by the external encoder
///
/// The engine never interprets the payload; `Null` means "not populated".
#[derive(Debug)]
pub struct Segment {
    id: NodeId,
    structure: Arc<StructureType>,
    payload: Value,
}

impl Segment {
    /// Create an empty segment of a leaf structure type
    pub fn new(structure: Arc<StructureType>) -> StructureResult<Self> {
        if structure.is_composite() {
            return Err(StructureError::invalid_declaration(
                structure.name(),
                format!("{} types cannot be built as segments", structure.kind()),
            ));
        }
        Ok(Self {
            id: NodeId::next(),
            structure,
            payload: Value::Null,
        })
    }

    /// Identity of this segment
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

    /// Encoder payload
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Mutable encoder payload
    pub fn payload_mut(&mut self) -> &mut Value {
        &mut self.payload
    }

    /// Replace the payload
    pub fn set_payload(&mut self, payload: impl Into<Value>) {
        self.payload = payload.into();
    }

    /// Take the payload, leaving `Null`
    pub fn take_payload(&mut self) -> Value {
        self.payload.take()
    }

    /// Whether no payload is set
    pub fn is_empty(&self) -> bool {
        self.payload.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureErrorKind;
    use crate::schema::{StructureKind, StructureType};
    use serde_json::json;

    #[test]
    fn test_payload_lifecycle() {
        let mut segment = Segment::new(Arc::new(StructureType::segment("MSH"))).unwrap();
        assert!(segment.is_empty());

        segment.set_payload(json!({"fields": ["MSH", "^~\\&"]}));
        assert_eq!(segment.payload()["fields"][0], "MSH");

        let taken = segment.take_payload();
        assert!(taken.is_object());
        assert!(segment.is_empty());
    }

    #[test]
    fn test_composite_types_rejected() {
        let group = StructureType::new("G", StructureKind::Group, Vec::new()).unwrap();
        let err = Segment::new(Arc::new(group)).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::InvalidDeclaration);
    }
}
