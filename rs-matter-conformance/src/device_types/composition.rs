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

//! Rules on the contents of the Descriptor cluster of every endpoint.

use std::collections::BTreeSet;

use log::debug;

use crate::catalog::{Catalog, DEV_TYPE_ROOT_NODE};
use crate::ids::EndptId;
use crate::problems::{Location, ProblemKind, Problems, RuleCategory};
use crate::snapshot::{
    AttrValue, DescriptorAttr, DeviceType, Endpoint, Snapshot, DESCRIPTOR_CLUSTER,
    ENDPOINT_UNIQUE_ID_MAX_LEN,
};
use crate::topology::ROOT_ENDPOINT;

use super::{application_device_types, is_valid_application_set};

/// Valid `PartsList` entries: `1..65534`.
const PARTS_LIST_ENTRY_MIN: u64 = 1;
const PARTS_LIST_ENTRY_MAX: u64 = 65534;

/// Maximum number of entries of a non-empty `TagList`.
pub const TAG_LIST_MAX_LEN: usize = 6;

const ROOT_NODE_REF: &str = "Root node device type";
const DESCRIPTOR_REF: &str = "Descriptor Cluster";
const TAG_LIST_REF: &str = "TagList";
const UNIQUE_ID_REF: &str = "EndpointUniqueId attribute";

fn descriptor_loc(endpoint: EndptId, attr: DescriptorAttr) -> Location {
    Location::attr(endpoint, DESCRIPTOR_CLUSTER, attr.id())
}

/// Endpoint 0 exists, carries the Root Node device type and the root node clusters,
/// and no other endpoint carries the Root Node device type.
pub fn check_root_node(snapshot: &Snapshot, catalog: &Catalog, problems: &mut Problems) {
    let mut error = |location, message: String| {
        problems.error(
            RuleCategory::RootNode,
            ProblemKind::Conformance,
            location,
            message,
            ROOT_NODE_REF,
        )
    };

    match snapshot.endpoint(ROOT_ENDPOINT) {
        None => error(
            Location::endpoint(ROOT_ENDPOINT),
            "Did not find Endpoint 0.".into(),
        ),
        Some(root) => {
            if root.descriptor().is_none() {
                error(
                    Location::endpoint(ROOT_ENDPOINT),
                    "No descriptor cluster on Endpoint 0".into(),
                );
            } else if !root
                .device_types()
                .iter()
                .any(|dt| dt.dtype == DEV_TYPE_ROOT_NODE)
            {
                error(
                    descriptor_loc(ROOT_ENDPOINT, DescriptorAttr::DeviceTypeList),
                    "Root node device type not listed on endpoint 0".into(),
                );
            }

            for &cluster in catalog.root_node_clusters() {
                if !root.has_cluster(cluster) {
                    error(
                        Location::cluster(ROOT_ENDPOINT, cluster),
                        format!("Root node does not contain required cluster 0x{:04x}", cluster),
                    );
                }
            }
        }
    }

    for endpoint in snapshot.endpoints().filter(|ep| ep.id != ROOT_ENDPOINT) {
        if endpoint
            .device_types()
            .iter()
            .any(|dt| dt.dtype == DEV_TYPE_ROOT_NODE)
        {
            error(
                descriptor_loc(endpoint.id, DescriptorAttr::DeviceTypeList),
                format!("Root node device type listed on endpoint {}", endpoint.id),
            );
        }
    }
}

/// Every endpoint hosts a Descriptor cluster.
pub fn check_descriptor_presence(snapshot: &Snapshot, problems: &mut Problems) {
    for endpoint in snapshot.endpoints() {
        let found = endpoint.descriptor().is_some();
        debug!(
            "Checking descriptor on Endpoint {}: {}",
            endpoint.id,
            if found { "found" } else { "not found" }
        );

        if !found {
            problems.error(
                RuleCategory::DescriptorPresence,
                ProblemKind::Structural,
                Location::cluster(endpoint.id, DESCRIPTOR_CLUSTER),
                format!("Did not find a descriptor on endpoint {}", endpoint.id),
                "Base Cluster Requirements for Matter",
            );
        }
    }
}

/// The Descriptor contents of every endpoint: device types, supersets,
/// `PartsList` entries, `TagList` entries and `EndpointUniqueID`.
pub fn check_device_composition(snapshot: &Snapshot, catalog: &Catalog, problems: &mut Problems) {
    for endpoint in snapshot.endpoints() {
        if endpoint.descriptor().is_none() {
            debug!("Endpoint {} has no descriptor, skipping", endpoint.id);
            continue;
        }

        let Some(device_types) = decoded_device_types(endpoint, problems) else {
            continue;
        };

        if endpoint.id == ROOT_ENDPOINT {
            check_root_endpoint(endpoint, catalog, &device_types, problems);
        } else {
            check_application_endpoint(endpoint, catalog, &device_types, problems);
        }

        check_revisions(endpoint, &device_types, problems);
    }

    for endpoint in snapshot.endpoints() {
        check_tag_list(endpoint, catalog, problems);
    }

    check_unique_ids(snapshot, problems);
}

fn composition_error(problems: &mut Problems, location: Location, message: String, reference: &'static str) {
    problems.error(
        RuleCategory::DeviceComposition,
        ProblemKind::Conformance,
        location,
        message,
        reference,
    );
}

fn decoded_device_types(endpoint: &Endpoint, problems: &mut Problems) -> Option<Vec<DeviceType>> {
    match endpoint.try_device_types() {
        Ok(device_types) => Some(device_types.unwrap_or_default()),
        Err(e) => {
            composition_error(
                problems,
                descriptor_loc(endpoint.id, DescriptorAttr::DeviceTypeList),
                format!("DeviceTypeList cannot be decoded: {}", e),
                DESCRIPTOR_REF,
            );
            None
        }
    }
}

fn check_root_endpoint(
    endpoint: &Endpoint,
    catalog: &Catalog,
    device_types: &[DeviceType],
    problems: &mut Problems,
) {
    if endpoint.raw_parts_list().unwrap_or_default().is_empty() {
        composition_error(
            problems,
            descriptor_loc(endpoint.id, DescriptorAttr::PartsList),
            "PartsList attribute is empty".into(),
            DESCRIPTOR_REF,
        );
    }

    check_part_ranges(endpoint, problems);

    if device_types.is_empty() {
        composition_error(
            problems,
            descriptor_loc(endpoint.id, DescriptorAttr::DeviceTypeList),
            "DeviceTypeList count is not at least 1".into(),
            DESCRIPTOR_REF,
        );
        return;
    }

    let root_nodes = device_types
        .iter()
        .filter(|dt| dt.dtype == DEV_TYPE_ROOT_NODE)
        .count();
    if root_nodes > 1 {
        composition_error(
            problems,
            descriptor_loc(endpoint.id, DescriptorAttr::DeviceTypeList),
            format!("There are {} Root Node device types on endpoint 0", root_nodes),
            ROOT_NODE_REF,
        );
    }

    let foreign = device_types
        .iter()
        .map(|dt| dt.dtype)
        .filter(|&dtype| !catalog.is_root_endpoint_device_type(dtype))
        .collect::<BTreeSet<_>>();
    if !foreign.is_empty() {
        composition_error(
            problems,
            descriptor_loc(endpoint.id, DescriptorAttr::DeviceTypeList),
            format!(
                "Device types {:04x?} are not allowed next to the Root Node device type",
                foreign
            ),
            ROOT_NODE_REF,
        );
    }
}

fn check_application_endpoint(
    endpoint: &Endpoint,
    catalog: &Catalog,
    device_types: &[DeviceType],
    problems: &mut Problems,
) {
    let location = descriptor_loc(endpoint.id, DescriptorAttr::DeviceTypeList);

    if device_types.is_empty() {
        composition_error(
            problems,
            location,
            "DeviceTypeList count is not at least 1".into(),
            DESCRIPTOR_REF,
        );
    }

    let application = application_device_types(catalog, device_types);
    if !is_valid_application_set(catalog, &application) {
        composition_error(
            problems,
            location,
            format!(
                "Device types {:04x?} are more than one and do not match any superset",
                application
            ),
            DESCRIPTOR_REF,
        );
    }

    if device_types.iter().any(|dt| dt.dtype == DEV_TYPE_ROOT_NODE) {
        composition_error(
            problems,
            location,
            "Root node device type is listed on non zero endpoints".into(),
            ROOT_NODE_REF,
        );
    }

    check_part_ranges(endpoint, problems);
}

/// Every `PartsList` entry is a valid endpoint ID other than the endpoint's own.
fn check_part_ranges(endpoint: &Endpoint, problems: &mut Problems) {
    for part in endpoint.raw_parts_list().unwrap_or_default() {
        if !(PARTS_LIST_ENTRY_MIN..=PARTS_LIST_ENTRY_MAX).contains(&part) {
            composition_error(
                problems,
                descriptor_loc(endpoint.id, DescriptorAttr::PartsList),
                format!("Endpoint {} is not in the range of 1 to 65534", part),
                DESCRIPTOR_REF,
            );
        } else if part == endpoint.id as u64 {
            composition_error(
                problems,
                descriptor_loc(endpoint.id, DescriptorAttr::PartsList),
                "Endpoint is self referencing".into(),
                DESCRIPTOR_REF,
            );
        }
    }
}

fn check_revisions(endpoint: &Endpoint, device_types: &[DeviceType], problems: &mut Problems) {
    for dt in device_types.iter().filter(|dt| dt.drev < 1) {
        composition_error(
            problems,
            descriptor_loc(endpoint.id, DescriptorAttr::DeviceTypeList),
            format!("Revision of device type 0x{:04x} is less than 1", dt.dtype),
            DESCRIPTOR_REF,
        );
    }
}

fn check_tag_list(endpoint: &Endpoint, catalog: &Catalog, problems: &mut Problems) {
    let location = descriptor_loc(endpoint.id, DescriptorAttr::TagList);

    let tags = match endpoint.try_tag_list() {
        Ok(Some(tags)) => tags,
        Ok(None) => return,
        Err(e) => {
            composition_error(
                problems,
                location,
                format!("TagList cannot be decoded: {}", e),
                TAG_LIST_REF,
            );
            return;
        }
    };

    if tags.len() > TAG_LIST_MAX_LEN {
        composition_error(
            problems,
            location,
            format!("Number of tagList entries {} is not in the range of 1 to 6", tags.len()),
            TAG_LIST_REF,
        );
    }

    let mut seen = BTreeSet::new();
    for tag in &tags {
        if !seen.insert(tag.tag) {
            composition_error(
                problems,
                location,
                format!("Duplicate tag 0x{:02x} found in taglist struct", tag.tag),
                TAG_LIST_REF,
            );
        }

        match tag.mfg_code {
            None if !catalog.is_standard_namespace(tag.namespace) => composition_error(
                problems,
                location,
                format!(
                    "Non manufacturer specific tag 0x{:02x} is not from a standard namespace (0x{:02x})",
                    tag.tag, tag.namespace
                ),
                TAG_LIST_REF,
            ),
            Some(mfg_code) if tag.label.is_none() => composition_error(
                problems,
                location,
                format!(
                    "The Label field is null when the MfgCode is not null (0x{:04x})",
                    mfg_code
                ),
                TAG_LIST_REF,
            ),
            _ => (),
        }
    }
}

/// `EndpointUniqueID` of the endpoints listed by endpoint 0: a string of at most 32 octets,
/// unique across the node. A duplicate is reported on the later endpoint.
fn check_unique_ids(snapshot: &Snapshot, problems: &mut Problems) {
    let Some(root) = snapshot.endpoint(ROOT_ENDPOINT) else {
        return;
    };

    let mut visited = BTreeSet::new();
    let mut unique_ids = BTreeSet::new();

    for id in root.parts_list() {
        if !visited.insert(id) {
            continue;
        }

        let Some(value) = snapshot.endpoint(id).and_then(Endpoint::unique_id) else {
            continue;
        };

        let location = descriptor_loc(id, DescriptorAttr::EndpointUniqueId);

        let AttrValue::Str(bytes) = value else {
            composition_error(
                problems,
                location,
                format!(
                    "EndpointUniqueId attribute is present but not a string ({})",
                    value.type_name()
                ),
                UNIQUE_ID_REF,
            );
            continue;
        };

        if bytes.is_empty() {
            continue;
        }

        if bytes.len() > ENDPOINT_UNIQUE_ID_MAX_LEN {
            composition_error(
                problems,
                location,
                format!(
                    "EndpointUniqueId attribute length is {} bytes which exceeds the maximum allowed 32 bytes",
                    bytes.len()
                ),
                UNIQUE_ID_REF,
            );
        }

        if !unique_ids.insert(bytes.as_slice()) {
            composition_error(
                problems,
                location,
                format!("Duplicate EndpointUniqueId found: {}", value),
                UNIQUE_ID_REF,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::snapshot::{DescriptorBuilder, Tag};

    use super::*;

    const DT_LIGHT: u32 = 0x0100;

    fn root(parts: &[EndptId]) -> Endpoint {
        Endpoint::new(0).with(
            DescriptorBuilder::new()
                .device_type(DEV_TYPE_ROOT_NODE, 1)
                .parts(parts.iter().copied())
                .build(),
        )
    }

    fn with_unique_id(id: EndptId, unique_id: AttrValue) -> Endpoint {
        Endpoint::new(id).with(
            DescriptorBuilder::new()
                .device_type(DT_LIGHT, 1)
                .unique_id(unique_id)
                .build(),
        )
    }

    fn composition(snapshot: &Snapshot, catalog: &Catalog) -> Vec<(Option<EndptId>, String)> {
        let mut problems = Problems::new();
        check_device_composition(snapshot, catalog, &mut problems);

        problems
            .all()
            .iter()
            .map(|p| (p.location.endpoint, p.message.clone()))
            .collect()
    }

    #[test]
    fn missing_root_endpoint() {
        let snapshot = Snapshot::from_endpoints([with_unique_id(1, AttrValue::str(""))]).unwrap();

        let mut problems = Problems::new();
        check_root_node(&snapshot, &Catalog::new(), &mut problems);

        assert_eq!(problems.len(), 1);
        assert_eq!(problems.all()[0].location, Location::endpoint(0));
    }

    #[test]
    fn root_node_type_on_other_endpoint() {
        let snapshot = Snapshot::from_endpoints([
            root(&[1]),
            Endpoint::new(1).with(
                DescriptorBuilder::new()
                    .device_type(DEV_TYPE_ROOT_NODE, 1)
                    .build(),
            ),
        ])
        .unwrap();

        let mut problems = Problems::new();
        check_root_node(&snapshot, &Catalog::empty(), &mut problems);

        assert_eq!(problems.len(), 1);
        assert_eq!(problems.all()[0].location.endpoint, Some(1));
    }

    #[test]
    fn descriptor_presence() {
        let snapshot = Snapshot::from_endpoints([root(&[1]), Endpoint::new(1)]).unwrap();

        let mut problems = Problems::new();
        check_descriptor_presence(&snapshot, &mut problems);

        assert!(problems.has_problems(Some(RuleCategory::DescriptorPresence)));
        assert_eq!(problems.all()[0].location, Location::cluster(1, DESCRIPTOR_CLUSTER));
    }

    #[test]
    fn unique_id_length_and_duplicates() {
        let long = "x".repeat(33);
        let snapshot = Snapshot::from_endpoints([
            root(&[1, 2, 3, 4]),
            with_unique_id(1, AttrValue::str(&long)),
            with_unique_id(2, AttrValue::str("lamp")),
            with_unique_id(3, AttrValue::str("lamp")),
            with_unique_id(4, AttrValue::str("")),
        ])
        .unwrap();

        let found = composition(&snapshot, &Catalog::new());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, Some(1));
        assert_eq!(found[1].0, Some(3));
    }

    #[test]
    fn unique_id_must_be_a_string() {
        let snapshot = Snapshot::from_endpoints([
            root(&[1]),
            with_unique_id(1, AttrValue::UInt(7)),
        ])
        .unwrap();

        let found = composition(&snapshot, &Catalog::new());
        assert_eq!(found.len(), 1);
        assert!(found[0].1.contains("not a string"));
    }

    #[test]
    fn tag_list_rules() {
        let snapshot = Snapshot::from_endpoints([
            root(&[1]),
            Endpoint::new(1).with(
                DescriptorBuilder::new()
                    .device_type(DT_LIGHT, 1)
                    .tags(vec![
                        Tag::new(0x08, 0x01),
                        Tag::new(0x07, 0x01),
                        Tag::new(0x09, 0x02),
                        Tag::mfg(0xFFF1, 0x80, 0x03, None),
                    ])
                    .build(),
            ),
        ])
        .unwrap();

        let found = composition(&snapshot, &Catalog::new());
        let messages = found.iter().map(|(_, m)| m.as_str()).collect::<Vec<_>>();

        assert_eq!(messages.len(), 3);
        assert!(messages[0].starts_with("Duplicate tag 0x01"));
        assert!(messages[1].starts_with("Non manufacturer specific tag 0x02"));
        assert!(messages[2].starts_with("The Label field is null"));
    }

    #[test]
    fn too_many_tags() {
        let tags = (0..7).map(|tag| Tag::new(0x07, tag)).collect();
        let snapshot = Snapshot::from_endpoints([
            root(&[1]),
            Endpoint::new(1).with(
                DescriptorBuilder::new()
                    .device_type(DT_LIGHT, 1)
                    .tags(tags)
                    .build(),
            ),
        ])
        .unwrap();

        let found = composition(&snapshot, &Catalog::new());
        assert_eq!(found.len(), 1);
        assert!(found[0].1.contains("range of 1 to 6"));
    }

    #[test]
    fn device_type_rules() {
        let catalog = Catalog::new().with_superset(&[0x0100, 0x0101]);
        let snapshot = Snapshot::from_endpoints([
            Endpoint::new(0).with(
                DescriptorBuilder::new()
                    .device_type(DEV_TYPE_ROOT_NODE, 1)
                    .device_type(DT_LIGHT, 1)
                    .parts([1u16, 2])
                    .build(),
            ),
            Endpoint::new(1).with(
                DescriptorBuilder::new()
                    .device_type(0x0100, 1)
                    .device_type(0x0101, 0)
                    .parts([0u16, 1])
                    .build(),
            ),
            Endpoint::new(2).with(
                DescriptorBuilder::new()
                    .device_type(0x0100, 1)
                    .device_type(0x0302, 1)
                    .build(),
            ),
        ])
        .unwrap();

        let found = composition(&snapshot, &catalog);
        let per_endpoint = |ep| found.iter().filter(|(e, _)| *e == Some(ep)).count();

        // ep0: foreign device type
        assert_eq!(per_endpoint(0), 1);
        // ep1: part 0 out of range, self reference, revision 0
        assert_eq!(per_endpoint(1), 3);
        // ep2: no common superset
        assert_eq!(per_endpoint(2), 1);
    }

    #[test]
    fn root_parts_out_of_range() {
        let snapshot = Snapshot::from_endpoints([
            Endpoint::new(0).with(
                DescriptorBuilder::new()
                    .device_type(DEV_TYPE_ROOT_NODE, 1)
                    .parts([1u64, 0, 0xFFFE, 0x1_0001])
                    .build(),
            ),
            Endpoint::new(1).with(DescriptorBuilder::new().device_type(DT_LIGHT, 1).build()),
        ])
        .unwrap();

        let mut problems = Problems::new();
        check_device_composition(&snapshot, &Catalog::new(), &mut problems);

        let found = problems
            .all()
            .iter()
            .map(|p| (p.location, p.message.as_str()))
            .collect::<Vec<_>>();
        let loc = descriptor_loc(0, DescriptorAttr::PartsList);

        assert_eq!(
            found,
            vec![
                (loc, "Endpoint 0 is not in the range of 1 to 65534"),
                (loc, "Endpoint 65537 is not in the range of 1 to 65534"),
            ]
        );
    }
}
