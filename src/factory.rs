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

//! Structure factories
//!
//! A factory turns a type name into an empty node. The default factory
//! reads the [`SchemaRegistry`]; [`CustomStructureFactory`] layers
//! per-deployment overrides on top of any other factory.

use crate::config::EngineConfig;
use crate::error::{StructureError, StructureResult};
use crate::node::{Group, Segment, StructureNode};
use crate::schema::{SchemaRegistry, StructureType};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Type alias for custom node constructors
pub type StructureConstructor =
    Arc<dyn Fn(&StructureContext) -> StructureResult<StructureNode> + Send + Sync>;

/// Resolves type names to constructible nodes
pub trait StructureFactory: Send + Sync {
    /// Registry backing this factory
    fn registry(&self) -> &SchemaRegistry;

    /// Resolve a type name to its declaration
    fn resolve(&self, type_name: &str) -> StructureResult<Arc<StructureType>> {
        self.registry().lookup(type_name)
    }

    /// Whether `construct` can build this type
    fn supports(&self, type_name: &str) -> bool {
        self.resolve(type_name).is_ok()
    }

    /// Build an empty node of the given type
    fn construct(
        &self,
        type_name: &str,
        context: &StructureContext,
    ) -> StructureResult<StructureNode> {
        instantiate(self.resolve(type_name)?, context)
    }
}

/// Build an empty node for a declared structure type
pub fn instantiate(
    structure: Arc<StructureType>,
    context: &StructureContext,
) -> StructureResult<StructureNode> {
    if structure.is_composite() {
        Ok(StructureNode::Group(Group::new(structure, context.clone())?))
    } else {
        Ok(StructureNode::Segment(Segment::new(structure)?))
    }
}

/// Factory bindings and configuration shared by every node of a tree
#[derive(Clone)]
pub struct StructureContext {
    factory: Arc<dyn StructureFactory>,
    config: Arc<EngineConfig>,
}

impl StructureContext {
    /// Create a new context
    pub fn new(factory: Arc<dyn StructureFactory>, config: EngineConfig) -> Self {
        Self {
            factory,
            config: Arc::new(config),
        }
    }

    /// Create a context over a registry with the default factory and configuration
    pub fn with_registry(registry: Arc<SchemaRegistry>) -> Self {
        Self::new(
            Arc::new(DefaultStructureFactory::new(registry)),
            EngineConfig::default(),
        )
    }

    /// The factory
    pub fn factory(&self) -> &Arc<dyn StructureFactory> {
        &self.factory
    }

    /// The configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build an empty node through the factory
    pub fn construct(&self, type_name: &str) -> StructureResult<StructureNode> {
        self.factory.construct(type_name, self)
    }

    /// Fail with `UnknownType` if any slot type reachable from `root` cannot be built
    pub fn check_references(&self, root: &str) -> StructureResult<()> {
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut queue: VecDeque<Arc<StructureType>> = VecDeque::new();
        queue.push_back(self.factory.resolve(root)?);

        while let Some(structure) = queue.pop_front() {
            if !visited.insert(structure.name().to_string()) {
                continue;
            }
            for slot in structure.slots() {
                if !self.factory.supports(&slot.type_name) {
                    return Err(StructureError::construction(
                        structure.name(),
                        slot.name.clone(),
                        StructureError::unknown_type(slot.type_name.clone()),
                    ));
                }
                // Types served only by a custom constructor have no declaration to descend into
                if let Ok(child) = self.factory.resolve(&slot.type_name) {
                    queue.push_back(child);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StructureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructureContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Factory building every type from its registry declaration
#[derive(Debug, Clone)]
pub struct DefaultStructureFactory {
    registry: Arc<SchemaRegistry>,
}

impl DefaultStructureFactory {
    /// Create a factory over a registry
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Shared handle to the registry
    pub fn registry_handle(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.registry)
    }
}

impl StructureFactory for DefaultStructureFactory {
    fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

/// Factory with per-type overrides on top of another factory
///
/// Constructors replace how a type is built; substitutions build a
/// different declared type whenever one is requested (for example a
/// site-specific variant of a standard group).
#[derive(Clone)]
pub struct CustomStructureFactory {
    inner: Arc<dyn StructureFactory>,
    constructors: FxHashMap<String, StructureConstructor>,
    substitutions: FxHashMap<String, String>,
}

impl CustomStructureFactory {
    /// Wrap a factory
    pub fn new(inner: Arc<dyn StructureFactory>) -> Self {
        Self {
            inner,
            constructors: FxHashMap::default(),
            substitutions: FxHashMap::default(),
        }
    }

    /// Wrap the default factory of a registry
    pub fn over_registry(registry: Arc<SchemaRegistry>) -> Self {
        Self::new(Arc::new(DefaultStructureFactory::new(registry)))
    }

    /// Build `type_name` with a custom constructor
    pub fn with_constructor<F>(mut self, type_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&StructureContext) -> StructureResult<StructureNode> + Send + Sync + 'static,
    {
        self.constructors
            .insert(type_name.into(), Arc::new(constructor));
        self
    }

    /// Build `replacement` whenever `requested` is asked for
    pub fn substitute(
        mut self,
        requested: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.substitutions
            .insert(requested.into(), replacement.into());
        self
    }

    /// Type that will actually be built for a requested name
    pub fn target<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.substitutions
            .get(type_name)
            .map(String::as_str)
            .unwrap_or(type_name)
    }
}

impl StructureFactory for CustomStructureFactory {
    fn registry(&self) -> &SchemaRegistry {
        self.inner.registry()
    }

    fn resolve(&self, type_name: &str) -> StructureResult<Arc<StructureType>> {
        self.inner.resolve(self.target(type_name))
    }

    fn supports(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name) || self.inner.supports(self.target(type_name))
    }

    fn construct(
        &self,
        type_name: &str,
        context: &StructureContext,
    ) -> StructureResult<StructureNode> {
        if let Some(constructor) = self.constructors.get(type_name) {
            log::debug!("Building '{type_name}' with a custom constructor");
            let node = constructor(context)?;
            if node.type_name() != type_name {
                log::warn!(
                    "Custom constructor for '{type_name}' built a '{}'",
                    node.type_name()
                );
            }
            return Ok(node);
        }

        let target = self.target(type_name);
        if target != type_name {
            log::debug!("Substituting '{target}' for '{type_name}'");
        }
        self.inner.construct(target, context)
    }
}

impl fmt::Debug for CustomStructureFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut constructors: Vec<&String> = self.constructors.keys().collect();
        constructors.sort();
        f.debug_struct("CustomStructureFactory")
            .field("constructors", &constructors)
            .field("substitutions", &self.substitutions)
            .finish_non_exhaustive()
    }
}
