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

//! Post-population cardinality checks
//!
//! Access never enforces `required`; callers run [`validate`] once a tree is
//! fully built. Only existing groups are inspected, so a missing optional
//! group does not report its required children.

use crate::node::{Group, StructureNode};
use crate::path::StructurePath;
use serde::Serialize;
use std::fmt;

/// What is wrong with a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "issue")]
pub enum IssueKind {
    /// Required slot has no repetition
    MissingRequired,
    /// More repetitions than the slot or configuration allows
    CardinalityExceeded {
        /// Allowed maximum
        limit: usize,
        /// Repetitions found
        count: usize,
    },
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Path of the group owning the slot
    pub group: StructurePath,
    /// Structure type of that group
    pub structure: String,
    /// Offending slot
    pub slot: String,
    /// What is wrong
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = if self.group.is_empty() {
            self.slot.clone()
        } else {
            format!("{}/{}", self.group, self.slot)
        };
        match &self.kind {
            IssueKind::MissingRequired => {
                write!(f, "{location}: required by {} but absent", self.structure)
            }
            IssueKind::CardinalityExceeded { limit, count } => write!(
                f,
                "{location}: {count} repetition(s), at most {limit} allowed in {}",
                self.structure
            ),
        }
    }
}

/// Result of validating a tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Whether no issues were found
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Findings in traversal order
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Number of findings
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether there are no findings
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Take the findings
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }
}

/// Check required-slot presence and repetition limits below `group`
pub fn validate(group: &Group) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut path = StructurePath::root();
    check_group(group, &mut path, &mut report);
    report
}

fn check_group(group: &Group, path: &mut StructurePath, report: &mut ValidationReport) {
    let config_limit = group.context().config().max_repetitions;

    for (slot, repetitions) in group.children() {
        let count = repetitions.len();
        if slot.required && count == 0 {
            report.issues.push(ValidationIssue {
                group: path.clone(),
                structure: group.type_name().to_string(),
                slot: slot.name.clone(),
                kind: IssueKind::MissingRequired,
            });
        }

        let limit = match slot.cardinality().max() {
            Some(max) => Some(max),
            None => config_limit,
        };
        if let Some(limit) = limit.filter(|limit| count > *limit) {
            report.issues.push(ValidationIssue {
                group: path.clone(),
                structure: group.type_name().to_string(),
                slot: slot.name.clone(),
                kind: IssueKind::CardinalityExceeded { limit, count },
            });
        }

        for (repetition, node) in repetitions.iter().enumerate() {
            if let StructureNode::Group(child) = node {
                path.push(slot.name.as_str(), repetition);
                check_group(child, path, report);
                path.pop();
            }
        }
    }
}
