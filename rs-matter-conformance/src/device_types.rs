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

//! Device type grouping and the `TagList` disambiguation of sibling endpoints.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;
use log::debug;

use crate::catalog::Catalog;
use crate::ids::{DevTypeId, EndptId};
use crate::problems::{Location, ProblemKind, Problems, RuleCategory};
use crate::snapshot::{
    DescriptorAttr, DeviceType, Snapshot, Tag, DESCRIPTOR_CLUSTER, DESCRIPTOR_FEATURE_TAG_LIST,
};
use crate::topology::{self, ROOT_ENDPOINT};

pub use composition::*;

mod composition;

/// Application device type → endpoints listing it, for one composition root.
pub type DeviceTypeGroups = BTreeMap<DevTypeId, BTreeSet<EndptId>>;

/// The application device types of a `DeviceTypeList`.
pub fn application_device_types(catalog: &Catalog, device_types: &[DeviceType]) -> BTreeSet<DevTypeId> {
    device_types
        .iter()
        .map(|dt| dt.dtype)
        .filter(|&dtype| catalog.is_application_device_type(dtype))
        .collect()
}

/// Return `true` if the application device types may share one endpoint:
/// there is at most one, or all of them belong to one superset.
pub fn is_valid_application_set(catalog: &Catalog, device_types: &BTreeSet<DevTypeId>) -> bool {
    device_types.len() <= 1 || catalog.in_one_superset(device_types)
}

/// Group the given endpoints by application device type.
pub fn device_type_list_for_root<'a, I>(
    snapshot: &Snapshot,
    catalog: &Catalog,
    endpoints: I,
) -> DeviceTypeGroups
where
    I: IntoIterator<Item = &'a EndptId>,
{
    let mut groups = DeviceTypeGroups::new();

    for &id in endpoints {
        let Some(endpoint) = snapshot.endpoint(id) else {
            continue;
        };

        for dtype in application_device_types(catalog, &endpoint.device_types()) {
            groups.entry(dtype).or_default().insert(id);
        }
    }

    groups
}

/// Group, per tree root, the root and all of its descendants by application device type.
pub fn device_type_lists(
    snapshot: &Snapshot,
    catalog: &Catalog,
    roots: &BTreeSet<EndptId>,
) -> BTreeMap<EndptId, DeviceTypeGroups> {
    roots
        .iter()
        .map(|&root| {
            let mut members = topology::all_children(snapshot, root);
            members.insert(root);

            (root, device_type_list_for_root(snapshot, catalog, &members))
        })
        .collect()
}

bitflags! {
    /// The findings of the `TagList` disambiguation check for one endpoint.
    #[repr(transparent)]
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TagProblemFlags: u8 {
        /// The Descriptor `FeatureMap` does not advertise `TagList`
        const MISSING_FEATURE = 0x01;
        /// The `TagList` attribute is absent or empty
        const MISSING_ATTRIBUTE = 0x02;
        /// The `TagList` names the same tag more than once
        const DUPLICATE_TAG = 0x04;
        /// The `TagList` is identical to the one of a sibling
        const SAME_TAG = 0x08;
    }
}

/// A `TagList` problem of an endpoint sharing an application device type with siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagProblem {
    pub root: EndptId,
    pub flags: TagProblemFlags,
    /// All endpoints of the group sharing the device type
    pub duplicates: BTreeSet<EndptId>,
    /// The endpoints of the group with an identical `TagList`, this one included
    pub same_tag: BTreeSet<EndptId>,
}

impl TagProblem {
    pub fn missing_feature(&self) -> bool {
        self.flags.contains(TagProblemFlags::MISSING_FEATURE)
    }

    pub fn missing_attribute(&self) -> bool {
        self.flags.contains(TagProblemFlags::MISSING_ATTRIBUTE)
    }

    pub fn duplicate_tag(&self) -> bool {
        self.flags.contains(TagProblemFlags::DUPLICATE_TAG)
    }

    pub fn same_tag(&self) -> bool {
        self.flags.contains(TagProblemFlags::SAME_TAG)
    }
}

impl fmt::Display for TagProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "root {}: missing feature = {}, missing attribute = {}, duplicate tag = {}, duplicates = {:?}, same_tags = {:?}",
            self.root,
            self.missing_feature(),
            self.missing_attribute(),
            self.duplicate_tag(),
            self.duplicates,
            self.same_tag
        )
    }
}

fn sorted_tags(snapshot: &Snapshot, id: EndptId) -> Option<Vec<Tag>> {
    let mut tags = snapshot.endpoint(id)?.tag_list()?;
    tags.sort();

    Some(tags)
}

fn repeats_a_tag(tags: &[Tag]) -> bool {
    let mut seen = BTreeSet::new();
    !tags.iter().all(|tag| seen.insert((tag.namespace, tag.tag)))
}

/// Check that every endpoint sharing an application device type with a sibling
/// under the same root can be told apart by its `TagList`.
///
/// Only groups of two or more endpoints are checked. An endpoint lands in the
/// result if any of the `TagProblemFlags` apply to it.
pub fn find_tag_list_problems(
    snapshot: &Snapshot,
    device_types: &BTreeMap<EndptId, DeviceTypeGroups>,
) -> BTreeMap<EndptId, TagProblem> {
    let mut problems = BTreeMap::new();

    for (&root, groups) in device_types {
        for (dtype, endpoints) in groups {
            if endpoints.len() < 2 {
                continue;
            }

            debug!(
                "Root {}: device type 0x{:04x} shared by endpoints {:?}",
                root, dtype, endpoints
            );

            for &id in endpoints {
                let mut flags = TagProblemFlags::empty();

                let features = snapshot
                    .endpoint(id)
                    .map(|ep| ep.descriptor_features())
                    .unwrap_or(0);
                if features & DESCRIPTOR_FEATURE_TAG_LIST == 0 {
                    flags |= TagProblemFlags::MISSING_FEATURE;
                }

                let mut same_tag = BTreeSet::new();

                match sorted_tags(snapshot, id).filter(|tags| !tags.is_empty()) {
                    None => flags |= TagProblemFlags::MISSING_ATTRIBUTE,
                    Some(tags) => {
                        if repeats_a_tag(&tags) {
                            flags |= TagProblemFlags::DUPLICATE_TAG;
                        }

                        same_tag.extend(
                            endpoints
                                .iter()
                                .copied()
                                .filter(|&other| other != id)
                                .filter(|&other| sorted_tags(snapshot, other).as_ref() == Some(&tags)),
                        );

                        if !same_tag.is_empty() {
                            same_tag.insert(id);
                            flags |= TagProblemFlags::SAME_TAG;
                        }
                    }
                }

                if !flags.is_empty() {
                    problems.insert(
                        id,
                        TagProblem {
                            root,
                            flags,
                            duplicates: endpoints.clone(),
                            same_tag,
                        },
                    );
                }
            }
        }
    }

    problems
}

/// Run the `TagList` disambiguation over every tree root and over the direct
/// children of endpoint 0, recording into `RuleCategory::TagList`.
pub fn check_tag_lists(snapshot: &Snapshot, catalog: &Catalog, problems: &mut Problems) {
    let types = topology::separate_endpoint_types(snapshot, catalog);
    let roots = topology::find_tree_roots(snapshot, &types.tree);

    let tree_problems = find_tag_list_problems(snapshot, &device_type_lists(snapshot, catalog, &roots));

    let direct = topology::direct_children_of_root(snapshot);
    let root_groups = BTreeMap::from([(
        ROOT_ENDPOINT,
        device_type_list_for_root(snapshot, catalog, &direct),
    )]);
    let root_problems = find_tag_list_problems(snapshot, &root_groups);

    for (id, problem) in tree_problems.iter().chain(root_problems.iter()) {
        problems.error(
            RuleCategory::TagList,
            ProblemKind::Conformance,
            Location::attr(*id, DESCRIPTOR_CLUSTER, DescriptorAttr::TagList.id()),
            format!("problem on ep {}: {}", id, problem),
            "Descriptor TagList",
        );
    }
}
