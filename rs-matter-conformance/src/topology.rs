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

//! Analysis of the endpoint composition graph induced by the Descriptor `PartsList`.
//!
//! Endpoints use one of two composition styles:
//! - tree: each `PartsList` names only the direct children;
//! - flat: the `PartsList` names every descendant (e.g. the Aggregator of a bridge).
//!
//! Endpoint 0 lists every other endpoint and takes part in neither style.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::catalog::Catalog;
use crate::ids::EndptId;
use crate::problems::{Location, ProblemKind, Problems, RuleCategory};
use crate::snapshot::{DescriptorAttr, Endpoint, Snapshot, DESCRIPTOR_CLUSTER};

pub const ROOT_ENDPOINT: EndptId = 0;

const PARTS_LIST_REF: &str = "PartsList Attribute";
const COMPOSITION_REF: &str = "Endpoint composition";

/// The endpoints of a snapshot, split by composition style.
///
/// Endpoints excluded from the tree analysis (e.g. Content Apps) and endpoint 0
/// are in neither set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointTypes {
    pub flat: BTreeSet<EndptId>,
    pub tree: BTreeSet<EndptId>,
}

/// Split the non-zero endpoints into flat and tree composition.
///
/// The catalog decides: an endpoint carrying a flat-composition device type is flat,
/// one carrying a tree-excluded device type is skipped, all others are tree.
pub fn separate_endpoint_types(snapshot: &Snapshot, catalog: &Catalog) -> EndpointTypes {
    let mut types = EndpointTypes::default();

    for endpoint in snapshot.endpoints().filter(|ep| ep.id != ROOT_ENDPOINT) {
        let device_types = endpoint.device_types();

        if device_types
            .iter()
            .any(|dt| catalog.is_flat_composition(dt.dtype))
        {
            types.flat.insert(endpoint.id);
        } else if device_types
            .iter()
            .any(|dt| catalog.is_tree_excluded(dt.dtype))
        {
            debug!("Endpoint {} left out of the composition analysis", endpoint.id);
        } else {
            types.tree.insert(endpoint.id);
        }
    }

    types
}

/// Every endpoint reachable from `id` through `PartsList`, not counting `id`
/// itself unless it sits on a cycle.
///
/// IDs without a matching endpoint are included but not descended into.
pub fn all_children(snapshot: &Snapshot, id: EndptId) -> BTreeSet<EndptId> {
    let mut children = BTreeSet::new();
    let mut pending = parts_of(snapshot, id);

    while let Some(child) = pending.pop() {
        if children.insert(child) {
            pending.extend(parts_of(snapshot, child));
        }
    }

    children
}

fn parts_of(snapshot: &Snapshot, id: EndptId) -> Vec<EndptId> {
    snapshot
        .endpoint(id)
        .map(Endpoint::parts_list)
        .unwrap_or_default()
}

/// What is wrong with the subtree below a tree-composition endpoint.
///
/// Each variant carries the endpoint at which the fault was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartsListFault {
    /// The endpoint is reachable from one of its own descendants
    Cycle(EndptId),
    /// The endpoint is reachable through two distinct paths
    MultiplePaths(EndptId),
    /// The endpoint is listed, but does not exist
    Dangling(EndptId),
}

impl fmt::Display for PartsListFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle(ep) => write!(f, "cycle through endpoint {}", ep),
            Self::MultiplePaths(ep) => write!(f, "endpoint {} is reachable through multiple paths", ep),
            Self::Dangling(ep) => write!(f, "endpoint {} does not exist", ep),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current path
    Gray,
    /// Fully explored
    Black,
}

/// Walk the subtree of every tree-composition endpoint and return the first
/// fault found below each of them.
///
/// Only tree endpoints contribute edges; flat and excluded endpoints are leaves
/// of this graph. Endpoints without faults are absent from the result.
pub fn parts_list_problems(
    snapshot: &Snapshot,
    tree: &BTreeSet<EndptId>,
) -> BTreeMap<EndptId, PartsListFault> {
    tree.iter()
        .filter_map(|&start| walk_tree(snapshot, tree, start).map(|fault| (start, fault)))
        .collect()
}

fn walk_tree(snapshot: &Snapshot, tree: &BTreeSet<EndptId>, start: EndptId) -> Option<PartsListFault> {
    let edges = |id: EndptId| {
        if tree.contains(&id) {
            parts_of(snapshot, id)
        } else {
            Vec::new()
        }
    };

    let mut colors = BTreeMap::new();
    colors.insert(start, Color::Gray);

    let mut stack = vec![(start, edges(start), 0)];

    while let Some((node, children, next)) = stack.last_mut() {
        let Some(&child) = children.get(*next) else {
            colors.insert(*node, Color::Black);
            stack.pop();
            continue;
        };

        *next += 1;

        if !snapshot.contains(child) {
            return Some(PartsListFault::Dangling(child));
        }

        match colors.get(&child) {
            Some(Color::Gray) => return Some(PartsListFault::Cycle(child)),
            Some(Color::Black) => return Some(PartsListFault::MultiplePaths(child)),
            None => {
                colors.insert(child, Color::Gray);
                stack.push((child, edges(child), 0));
            }
        }
    }

    None
}

/// Return `true` if the `PartsList` of a flat-composition endpoint names exactly
/// the endpoints reachable from it.
pub fn flat_list_ok(snapshot: &Snapshot, id: EndptId) -> bool {
    let parts = parts_of(snapshot, id).into_iter().collect::<BTreeSet<_>>();

    all_children(snapshot, id) == parts
}

/// Find the roots of all tree compositions.
///
/// A root is a tree endpoint that no other tree endpoint lists. Roots without
/// children are not compositions and are left out.
pub fn find_tree_roots(snapshot: &Snapshot, tree: &BTreeSet<EndptId>) -> BTreeSet<EndptId> {
    let parent_of = |id: EndptId| {
        tree.iter()
            .copied()
            .find(|&parent| parts_of(snapshot, parent).contains(&id))
    };

    let mut roots = BTreeSet::new();

    for &id in tree {
        let mut root = id;
        let mut seen = BTreeSet::from([id]);

        while let Some(parent) = parent_of(root) {
            if !seen.insert(parent) {
                // Cycle; `parts_list_problems` reports it
                break;
            }
            root = parent;
        }

        if !parts_of(snapshot, root).is_empty() {
            roots.insert(root);
        }
    }

    roots
}

/// The endpoints of the `PartsList` of endpoint 0 which are not listed by any
/// other endpoint of that list.
pub fn direct_children_of_root(snapshot: &Snapshot) -> BTreeSet<EndptId> {
    let root_parts = parts_of(snapshot, ROOT_ENDPOINT)
        .into_iter()
        .collect::<BTreeSet<_>>();

    let mut direct = root_parts.clone();
    for &id in &root_parts {
        for child in parts_of(snapshot, id) {
            direct.remove(&child);
        }
    }

    direct
}

/// The full topology picture of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyReport {
    pub types: EndpointTypes,
    pub roots: BTreeSet<EndptId>,
    pub faults: BTreeMap<EndptId, PartsListFault>,
    pub flat_mismatches: BTreeSet<EndptId>,
}

impl TopologyReport {
    pub fn is_ok(&self) -> bool {
        self.faults.is_empty() && self.flat_mismatches.is_empty()
    }
}

pub fn analyze(snapshot: &Snapshot, catalog: &Catalog) -> TopologyReport {
    let types = separate_endpoint_types(snapshot, catalog);
    let roots = find_tree_roots(snapshot, &types.tree);
    let faults = parts_list_problems(snapshot, &types.tree);
    let flat_mismatches = types
        .flat
        .iter()
        .copied()
        .filter(|&id| !flat_list_ok(snapshot, id))
        .collect();

    debug!(
        "Topology: flat {:?}, tree {:?}, roots {:?}",
        types.flat, types.tree, roots
    );

    TopologyReport {
        types,
        roots,
        faults,
        flat_mismatches,
    }
}

/// Check the `PartsList` of every endpoint, recording into `RuleCategory::PartsList`.
pub fn check_parts_list(snapshot: &Snapshot, catalog: &Catalog, problems: &mut Problems) {
    let parts_loc =
        |id: EndptId| Location::attr(id, DESCRIPTOR_CLUSTER, DescriptorAttr::PartsList.id());

    if let Some(root) = snapshot.endpoint(ROOT_ENDPOINT) {
        // Raw values, so that entries which are no endpoint ID still count as a mismatch
        let parts = root.raw_parts_list().unwrap_or_default();
        let unique = parts.iter().copied().collect::<BTreeSet<_>>();

        if unique.len() != parts.len() {
            problems.error(
                RuleCategory::PartsList,
                ProblemKind::Structural,
                parts_loc(ROOT_ENDPOINT),
                "Duplicate endpoint ids found in the parts list on ep0",
                PARTS_LIST_REF,
            );
        }

        let expected = snapshot
            .ids()
            .filter(|&id| id != ROOT_ENDPOINT)
            .map(u64::from)
            .collect::<BTreeSet<_>>();

        if unique != expected {
            problems.error(
                RuleCategory::PartsList,
                ProblemKind::Structural,
                parts_loc(ROOT_ENDPOINT),
                format!(
                    "EP0 Descriptor parts list {:?} does not match the set of returned endpoints {:?}",
                    unique, expected
                ),
                PARTS_LIST_REF,
            );
        }
    } else {
        problems.error(
            RuleCategory::PartsList,
            ProblemKind::Structural,
            Location::endpoint(ROOT_ENDPOINT),
            "Endpoint 0 is missing; its parts list cannot be verified",
            PARTS_LIST_REF,
        );
    }

    for endpoint in snapshot.endpoints() {
        if endpoint.parts_list().contains(&endpoint.id) {
            problems.error(
                RuleCategory::PartsList,
                ProblemKind::Structural,
                parts_loc(endpoint.id),
                format!("Endpoint {} parts list includes itself", endpoint.id),
                PARTS_LIST_REF,
            );
        }
    }

    let report = analyze(snapshot, catalog);

    for (&id, fault) in &report.faults {
        problems.error(
            RuleCategory::PartsList,
            ProblemKind::Structural,
            parts_loc(id),
            format!(
                "Endpoint {} parts list includes a cycle or endpoint with multiple paths to the root or non-existent endpoint: {}",
                id, fault
            ),
            PARTS_LIST_REF,
        );
    }

    for &id in &report.flat_mismatches {
        problems.error(
            RuleCategory::PartsList,
            ProblemKind::Structural,
            parts_loc(id),
            "Flat parts list does not exactly match sub-parts",
            COMPOSITION_REF,
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::DEV_TYPE_AGGREGATOR;
    use crate::snapshot::DescriptorBuilder;

    use super::*;

    const DT_LIGHT: u32 = 0x0100;

    fn ep(id: EndptId, dtype: u32, parts: &[EndptId]) -> Endpoint {
        Endpoint::new(id).with(
            DescriptorBuilder::new()
                .device_type(dtype, 1)
                .parts(parts.iter().copied())
                .build(),
        )
    }

    fn snapshot(endpoints: Vec<Endpoint>) -> Snapshot {
        Snapshot::from_endpoints(endpoints).unwrap()
    }

    #[test]
    fn simple_tree_passes() {
        let s = snapshot(vec![
            ep(0, 0x16, &[1, 2]),
            ep(1, DT_LIGHT, &[]),
            ep(2, DT_LIGHT, &[]),
        ]);

        let report = analyze(&s, &Catalog::new());
        assert!(report.is_ok());
        assert!(report.roots.is_empty());

        let mut problems = Problems::new();
        check_parts_list(&s, &Catalog::new(), &mut problems);
        assert!(problems.is_empty());
    }

    #[test]
    fn cycle_is_flagged() {
        let s = snapshot(vec![
            ep(0, 0x16, &[1, 2]),
            ep(1, DT_LIGHT, &[2]),
            ep(2, DT_LIGHT, &[1]),
        ]);

        let types = separate_endpoint_types(&s, &Catalog::new());
        let faults = parts_list_problems(&s, &types.tree);

        assert_eq!(faults.get(&1), Some(&PartsListFault::Cycle(1)));
        assert_eq!(faults.get(&2), Some(&PartsListFault::Cycle(2)));

        // Terminates despite the cycle
        assert_eq!(all_children(&s, 1), BTreeSet::from([1, 2]));
        assert!(find_tree_roots(&s, &types.tree).len() <= 2);
    }

    #[test]
    fn multiple_paths_and_dangling() {
        let s = snapshot(vec![
            ep(0, 0x16, &[1, 2, 3]),
            ep(1, DT_LIGHT, &[2, 3]),
            ep(2, DT_LIGHT, &[3]),
            ep(3, DT_LIGHT, &[]),
        ]);

        let types = separate_endpoint_types(&s, &Catalog::new());
        let faults = parts_list_problems(&s, &types.tree);
        assert_eq!(faults.get(&1), Some(&PartsListFault::MultiplePaths(3)));
        assert_eq!(faults.get(&2), None);

        let s = snapshot(vec![ep(0, 0x16, &[1]), ep(1, DT_LIGHT, &[9])]);
        let types = separate_endpoint_types(&s, &Catalog::new());
        let faults = parts_list_problems(&s, &types.tree);
        assert_eq!(faults.get(&1), Some(&PartsListFault::Dangling(9)));
    }

    #[test]
    fn flat_closure() {
        let s = snapshot(vec![
            ep(0, 0x16, &[5, 6, 7]),
            ep(5, DEV_TYPE_AGGREGATOR, &[6, 7]),
            ep(6, DT_LIGHT, &[]),
            ep(7, DT_LIGHT, &[]),
        ]);
        let types = separate_endpoint_types(&s, &Catalog::new());
        assert_eq!(types.flat, BTreeSet::from([5]));
        assert!(flat_list_ok(&s, 5));

        let s = snapshot(vec![
            ep(0, 0x16, &[5, 6, 7, 8]),
            ep(5, DEV_TYPE_AGGREGATOR, &[6, 7]),
            ep(6, DT_LIGHT, &[8]),
            ep(7, DT_LIGHT, &[]),
            ep(8, DT_LIGHT, &[]),
        ]);
        assert!(!flat_list_ok(&s, 5));
        assert_eq!(analyze(&s, &Catalog::new()).flat_mismatches, BTreeSet::from([5]));
    }

    #[test]
    fn roots_and_direct_children() {
        let s = snapshot(vec![
            ep(0, 0x16, &[1, 2, 3, 4]),
            ep(1, DT_LIGHT, &[2, 3]),
            ep(2, DT_LIGHT, &[]),
            ep(3, DT_LIGHT, &[]),
            ep(4, DT_LIGHT, &[]),
        ]);

        let types = separate_endpoint_types(&s, &Catalog::new());
        assert_eq!(find_tree_roots(&s, &types.tree), BTreeSet::from([1]));
        assert_eq!(direct_children_of_root(&s), BTreeSet::from([1, 4]));
    }

    #[test]
    fn ep0_parts_list_mismatch() {
        let s = snapshot(vec![
            ep(0, 0x16, &[1, 1, 2]),
            ep(1, DT_LIGHT, &[]),
            ep(2, DT_LIGHT, &[]),
            ep(3, DT_LIGHT, &[3]),
        ]);

        let mut problems = Problems::new();
        check_parts_list(&s, &Catalog::new(), &mut problems);

        let messages = problems
            .all()
            .iter()
            .map(|p| (p.location.endpoint, p.kind))
            .collect::<Vec<_>>();

        // Duplicates, mismatch, self reference on 3, cycle below 3
        assert_eq!(
            messages,
            vec![
                (Some(0), ProblemKind::Structural),
                (Some(0), ProblemKind::Structural),
                (Some(3), ProblemKind::Structural),
                (Some(3), ProblemKind::Structural),
            ]
        );
        assert!(problems.has_problems(Some(RuleCategory::PartsList)));
    }

    #[test]
    fn ep0_entry_beyond_endpoint_range_is_a_mismatch() {
        let root = Endpoint::new(0).with(
            DescriptorBuilder::new()
                .device_type(0x16, 1)
                .parts([1u64, 2, 0x1_0001])
                .build(),
        );
        let s = snapshot(vec![root, ep(1, DT_LIGHT, &[]), ep(2, DT_LIGHT, &[])]);

        let mut problems = Problems::new();
        check_parts_list(&s, &Catalog::new(), &mut problems);

        let locations = problems
            .in_category(RuleCategory::PartsList)
            .map(|p| p.location)
            .collect::<Vec<_>>();
        assert_eq!(
            locations,
            vec![Location::attr(0, DESCRIPTOR_CLUSTER, DescriptorAttr::PartsList.id())]
        );
    }
}
