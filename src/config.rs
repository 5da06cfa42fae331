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

//! Engine configuration options

use crate::error::StructureResult;
use serde::{Deserialize, Serialize};

/// Configuration shared by every node of a structure tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Upper bound on repetitions of a repeating slot (`None` means unbounded)
    pub max_repetitions: Option<usize>,

    /// Whether tree construction verifies that every reachable slot type resolves
    pub check_references: bool,

    /// HL7 version recorded on trees whose schema carries none
    pub default_version: Option<String>,
}

impl EngineConfig {
    /// Create a new configuration with custom settings
    pub fn new(max_repetitions: Option<usize>, check_references: bool) -> Self {
        Self {
            max_repetitions,
            check_references,
            default_version: None,
        }
    }

    /// Fail fast on unresolved schema references and cap runaway repetitions
    pub fn strict() -> Self {
        Self {
            max_repetitions: Some(10_000),
            check_references: true,
            default_version: None,
        }
    }

    /// No limits, no up-front reference checks
    pub fn permissive() -> Self {
        Self {
            max_repetitions: None,
            check_references: false,
            default_version: None,
        }
    }

    /// Create a configuration for testing
    pub fn testing() -> Self {
        Self {
            max_repetitions: Some(16), // Small enough to hit in tests
            check_references: true,
            default_version: Some("2.8".to_string()),
        }
    }

    /// Set the default HL7 version
    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = Some(version.into());
        self
    }

    /// Parse a configuration from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> StructureResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Repetition limit for a slot
    pub(crate) fn repetition_limit(&self, repeating: bool) -> Option<usize> {
        if repeating {
            self.max_repetitions
        } else {
            Some(1)
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::permissive()
    }
}
