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

//! HL7 v2 structure trees in Rust
//!
//! Messages, groups and segments are declared once as schema data
//! ([`schema::StructureType`]) and instantiated as trees whose children are
//! created lazily on first access. Adding a message type means declaring
//! its slots; no per-message code is involved.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod factory;
pub mod node;
pub mod path;
pub mod record;
pub mod schema;
pub mod tree;
pub mod validation;
pub mod visitor;

// Re-export main types
pub use config::EngineConfig;
pub use error::{StructureError, StructureErrorKind, StructureResult};
pub use factory::{
    CustomStructureFactory, DefaultStructureFactory, StructureConstructor, StructureContext,
    StructureFactory,
};
pub use node::{Group, NodeId, Segment, StructureNode};
pub use path::{PathSegment, StructurePath};
pub use record::{StructureRecord, flatten, rebuild};
pub use schema::{
    Cardinality, SchemaDocument, SchemaRegistry, SlotDeclaration, StructureKind, StructureType,
    StructureTypeBuilder,
};
pub use tree::StructureTree;
pub use validation::{ValidationReport, validate};
pub use visitor::{StructureVisitor, walk_group};
