/*
 *
 *    Copyright (c) 2020-2022 Project CHIP Authors
 *
 *    Licensed under the Apache License, Version 2.0 (the "License");
 *    you may not use this file except in compliance with the License.
 *    You may obtain a copy of the License at
 *
 *        http://www.apache.org/licenses/LICENSE-2.0
 *
 *    Unless required by applicable law or agreed to in writing, software
 *    distributed under the License is distributed on an "AS IS" BASIS,
 *    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *    See the License for the specific language governing permissions and
 *    limitations under the License.
 */

//! Collection of the problems found while checking a snapshot.

use core::fmt;

use log::warn;
use strum::{Display, EnumIter};

use crate::ids::{AttrId, ClusterId, CmdId, EndptId};

/// The rule categories. Each one passes or fails independently.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum RuleCategory {
    /// Endpoint 0 and the Root Node device type
    RootNode,
    /// Every endpoint hosts a Descriptor cluster
    DescriptorPresence,
    /// Global attributes: presence, value ranges, list reconciliation, feature map
    GlobalAttributes,
    /// Attribute, command and cluster IDs are in allowed ranges
    IdentifierRanges,
    /// Character strings are valid UTF-8
    StringEncoding,
    /// PartsList topology
    PartsList,
    /// Power Source EndpointList
    PowerSource,
    /// TagList disambiguation of sibling endpoints
    TagList,
    /// Descriptor contents: device types, supersets, tags, unique IDs
    DeviceComposition,
}

/// The kind of a problem, independent of the rule category that found it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Display)]
pub enum ProblemKind {
    /// Topology, cycle, self reference or duplicate endpoint
    Structural,
    /// Identifier outside of the allowed ranges or value outside of its bounds
    Range,
    /// Declared-vs-observed attribute or command mismatch
    Reconciliation,
    /// Device type superset or tag list rule breach
    Conformance,
    /// The live re-read of an attribute failed unexpectedly
    Probe,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    /// Informational; never fails a category
    Note,
}

/// Where a problem was found.
///
/// Ordering is by endpoint, then cluster, attribute and command, with
/// unspecified components first.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub endpoint: Option<EndptId>,
    pub cluster: Option<ClusterId>,
    pub attr: Option<AttrId>,
    pub cmd: Option<CmdId>,
}

impl Location {
    /// A problem not tied to any particular path.
    pub const fn unknown() -> Self {
        Self {
            endpoint: None,
            cluster: None,
            attr: None,
            cmd: None,
        }
    }

    pub const fn endpoint(endpoint: EndptId) -> Self {
        Self {
            endpoint: Some(endpoint),
            cluster: None,
            attr: None,
            cmd: None,
        }
    }

    pub const fn cluster(endpoint: EndptId, cluster: ClusterId) -> Self {
        Self {
            endpoint: Some(endpoint),
            cluster: Some(cluster),
            attr: None,
            cmd: None,
        }
    }

    pub const fn attr(endpoint: EndptId, cluster: ClusterId, attr: AttrId) -> Self {
        Self {
            endpoint: Some(endpoint),
            cluster: Some(cluster),
            attr: Some(attr),
            cmd: None,
        }
    }

    pub const fn cmd(endpoint: EndptId, cluster: ClusterId, cmd: CmdId) -> Self {
        Self {
            endpoint: Some(endpoint),
            cluster: Some(cluster),
            attr: None,
            cmd: Some(cmd),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(endpoint) = self.endpoint else {
            return write!(f, "(unknown location)");
        };

        write!(f, "ep {}", endpoint)?;
        if let Some(cluster) = self.cluster {
            write!(f, " cluster 0x{:08x}", cluster)?;
        }
        if let Some(attr) = self.attr {
            write!(f, " attr 0x{:08x}", attr)?;
        }
        if let Some(cmd) = self.cmd {
            write!(f, " cmd 0x{:08x}", cmd)?;
        }

        Ok(())
    }
}

/// A single finding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Problem {
    pub category: RuleCategory,
    pub kind: ProblemKind,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    /// The Matter Core section the rule comes from
    pub reference: &'static str,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {}: {}",
            self.category, self.kind, self.location, self.message
        )?;
        if !self.reference.is_empty() {
            write!(f, " ({})", self.reference)?;
        }

        Ok(())
    }
}

/// Append-only store of findings, in insertion order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Problems {
    problems: Vec<Problem>,
}

impl Problems {
    pub const fn new() -> Self {
        Self {
            problems: Vec::new(),
        }
    }

    pub fn record(&mut self, problem: Problem) {
        warn!("{}", problem);
        self.problems.push(problem);
    }

    /// Record an error.
    pub fn error(
        &mut self,
        category: RuleCategory,
        kind: ProblemKind,
        location: Location,
        message: impl Into<String>,
        reference: &'static str,
    ) {
        self.record(Problem {
            category,
            kind,
            severity: Severity::Error,
            location,
            message: message.into(),
            reference,
        });
    }

    /// Record a note.
    pub fn note(&mut self, category: RuleCategory, location: Location, message: impl Into<String>) {
        self.record(Problem {
            category,
            kind: ProblemKind::Conformance,
            severity: Severity::Note,
            location,
            message: message.into(),
            reference: "",
        });
    }

    /// Return `true` if there is at least one error, optionally restricted to a category.
    pub fn has_problems(&self, category: Option<RuleCategory>) -> bool {
        self.errors()
            .any(|p| category.map(|c| c == p.category).unwrap_or(true))
    }

    /// `true` unless the category has errors.
    pub fn passed(&self, category: RuleCategory) -> bool {
        !self.has_problems(Some(category))
    }

    /// All findings, notes included, in insertion order.
    pub fn all(&self) -> &[Problem] {
        &self.problems
    }

    pub fn errors(&self) -> impl Iterator<Item = &Problem> + '_ {
        self.problems
            .iter()
            .filter(|p| p.severity == Severity::Error)
    }

    pub fn notes(&self) -> impl Iterator<Item = &Problem> + '_ {
        self.problems
            .iter()
            .filter(|p| p.severity == Severity::Note)
    }

    pub fn in_category(&self, category: RuleCategory) -> impl Iterator<Item = &Problem> + '_ {
        self.problems.iter().filter(move |p| p.category == category)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// The findings ordered by location and then category.
    ///
    /// The sort is stable, so findings at the same location keep their insertion order.
    pub fn sorted(&self) -> Vec<&Problem> {
        let mut sorted = self.problems.iter().collect::<Vec<_>>();
        sorted.sort_by_key(|p| (p.location, p.category));
        sorted
    }
}

impl fmt::Display for Problems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for problem in &self.problems {
            writeln!(f, "{}", problem)?;
        }

        Ok(())
    }
}
