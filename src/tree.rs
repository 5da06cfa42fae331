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

//! Message-rooted structure trees

use crate::config::EngineConfig;
use crate::error::{StructureError, StructureResult};
use crate::factory::{DefaultStructureFactory, StructureContext, StructureFactory};
use crate::node::{Group, StructureNode};
use crate::schema::SchemaRegistry;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A structure tree rooted at a message type
///
/// The tree owns every node below its root. It dereferences to the root
/// [`Group`], so all slot operations are available directly:
///
/// ```
/// use std::sync::Arc;
/// use octofhir_hl7_structure::schema::{SchemaRegistry, StructureTypeBuilder};
/// use octofhir_hl7_structure::StructureTree;
///
/// let registry = SchemaRegistry::new();
/// registry.declare_segments(["MSH", "NTE"]).unwrap();
/// StructureTypeBuilder::message("ACK")
///     .required("MSH")
///     .optional_repeating("NTE")
///     .declare(&registry)
///     .unwrap();
///
/// let mut tree = StructureTree::with_defaults("ACK", Arc::new(registry)).unwrap();
/// tree.get("MSH").unwrap();
/// tree.add("NTE").unwrap();
/// assert_eq!(tree.count("NTE").unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct StructureTree {
    root: Group,
    version: Option<String>,
}

impl StructureTree {
    /// Create an empty tree for a message type
    pub fn new(
        message_type: &str,
        factory: Arc<dyn StructureFactory>,
        config: EngineConfig,
    ) -> StructureResult<Self> {
        Self::with_context(message_type, StructureContext::new(factory, config))
    }

    /// Create an empty tree using the default factory over a registry
    pub fn with_defaults(
        message_type: &str,
        registry: Arc<SchemaRegistry>,
    ) -> StructureResult<Self> {
        Self::new(
            message_type,
            Arc::new(DefaultStructureFactory::new(registry)),
            EngineConfig::default(),
        )
    }

    /// Create an empty tree from existing bindings
    pub fn with_context(message_type: &str, context: StructureContext) -> StructureResult<Self> {
        if context.config().check_references {
            context.check_references(message_type)?;
        }

        let version = context
            .factory()
            .registry()
            .version()
            .or_else(|| context.config().default_version.clone());

        match context.construct(message_type)? {
            StructureNode::Group(root) => {
                log::trace!("Created {} tree {}", message_type, root.id());
                Ok(Self { root, version })
            }
            StructureNode::Segment(_) => Err(StructureError::invalid_declaration(
                message_type,
                "a tree must be rooted at a message or group type",
            )),
        }
    }

    /// Message type of the root
    pub fn message_type(&self) -> &str {
        self.root.type_name()
    }

    /// HL7 version of the schema, if known
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Root composite
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Root composite, mutably
    pub fn root_mut(&mut self) -> &mut Group {
        &mut self.root
    }

    /// Take ownership of the root
    pub fn into_root(self) -> Group {
        self.root
    }
}

impl Deref for StructureTree {
    type Target = Group;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

impl DerefMut for StructureTree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureErrorKind;
    use crate::schema::StructureTypeBuilder;

    fn registry() -> Arc<SchemaRegistry> {
        let registry = SchemaRegistry::new();
        registry.declare_segments(["MSH", "PID"]).unwrap();
        StructureTypeBuilder::group("PATIENT")
            .required("PID")
            .declare(&registry)
            .unwrap();
        StructureTypeBuilder::message("MSG")
            .required("MSH")
            .optional_repeating("PATIENT")
            .declare(&registry)
            .unwrap();
        StructureTypeBuilder::message("BROKEN")
            .required("MSH")
            .required("EVN")
            .declare(&registry)
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_tree_root() {
        let mut tree = StructureTree::with_defaults("MSG", registry()).unwrap();
        assert_eq!(tree.message_type(), "MSG");
        assert_eq!(tree.version(), None);

        let patient = tree.add("PATIENT").unwrap().as_group_mut().unwrap();
        patient.get("PID").unwrap();
        assert_eq!(tree.count("PATIENT").unwrap(), 1);
        assert!(tree.into_root().is_empty());
    }

    #[test]
    fn test_segment_root_rejected() {
        let err = StructureTree::with_defaults("MSH", registry()).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::InvalidDeclaration);
    }

    #[test]
    fn test_reference_check_is_opt_in() {
        let registry = registry();
        assert!(StructureTree::with_defaults("BROKEN", Arc::clone(&registry)).is_ok());

        let factory = Arc::new(DefaultStructureFactory::new(registry));
        let err = StructureTree::new("BROKEN", factory, EngineConfig::strict()).unwrap_err();
        assert_eq!(err.kind(), StructureErrorKind::UnknownType);
    }

    #[test]
    fn test_version_falls_back_to_config() {
        let registry = registry();
        let factory = Arc::new(DefaultStructureFactory::new(Arc::clone(&registry)));
        let tree = StructureTree::new(
            "MSG",
            factory.clone(),
            EngineConfig::default().with_default_version("2.5.1"),
        )
        .unwrap();
        assert_eq!(tree.version(), Some("2.5.1"));

        registry.set_version("2.8");
        let tree = StructureTree::new("MSG", factory, EngineConfig::default()).unwrap();
        assert_eq!(tree.version(), Some("2.8"));
    }
}
