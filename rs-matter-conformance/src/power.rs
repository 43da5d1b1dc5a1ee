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

//! Rules on the Power Source `EndpointList` attribute.

use std::collections::BTreeMap;

use log::debug;

use crate::catalog::DEV_TYPE_BRIDGED_NODE;
use crate::ids::{AttrId, ClusterId, EndptId};
use crate::problems::{Location, ProblemKind, Problems, RuleCategory};
use crate::snapshot::{DescriptorAttr, Endpoint, GlobalElements, Snapshot, DESCRIPTOR_CLUSTER};

pub const CLUSTER_POWER_SOURCE: ClusterId = 0x002F;
pub const ATTR_ENDPOINT_LIST: AttrId = 0x001F;

/// The first Power Source revision that carries `EndpointList`.
pub const ENDPOINT_LIST_MIN_REVISION: u64 = 2;

const ENDPOINT_LIST_REF: &str = "EndpointList Attribute";

fn endpoint_list_loc(endpoint: EndptId) -> Location {
    Location::attr(endpoint, CLUSTER_POWER_SOURCE, ATTR_ENDPOINT_LIST)
}

/// The `EndpointList` of an endpoint's Power Source cluster, if present and decodable.
pub fn endpoint_list(endpoint: &Endpoint) -> Option<Vec<u64>> {
    endpoint
        .cluster(CLUSTER_POWER_SOURCE)?
        .get(ATTR_ENDPOINT_LIST)?
        .as_uint_list()
}

fn descriptor_fault(endpoint: &Endpoint) -> Option<&'static str> {
    if endpoint.descriptor().is_none() {
        Some("Missing cluster descriptor")
    } else if endpoint.raw_parts_list().is_none() {
        Some("Missing PartList in descriptor cluster")
    } else if !matches!(endpoint.try_device_types(), Ok(Some(_))) {
        Some("Missing DeviceTypeList in descriptor cluster")
    } else {
        None
    }
}

fn error(problems: &mut Problems, location: Location, message: String) {
    problems.error(
        RuleCategory::PowerSource,
        ProblemKind::Conformance,
        location,
        message,
        ENDPOINT_LIST_REF,
    );
}

/// Every `EndpointList` names existing endpoints, and bridged nodes and their
/// children list exactly the endpoints they power.
pub fn check_power_sources(snapshot: &Snapshot, problems: &mut Problems) {
    let mut lists = BTreeMap::new();

    for endpoint in snapshot.endpoints() {
        let Some(cluster) = endpoint.cluster(CLUSTER_POWER_SOURCE) else {
            continue;
        };

        match cluster.revision() {
            None => error(
                problems,
                Location::attr(endpoint.id, CLUSTER_POWER_SOURCE, GlobalElements::ClusterRevision.id()),
                format!(
                    "Did not find Cluster revision on {}",
                    Location::cluster(endpoint.id, CLUSTER_POWER_SOURCE)
                ),
            ),
            Some(revision) if revision < ENDPOINT_LIST_MIN_REVISION => {
                debug!("Endpoint {}: Power Source revision {}, skipping", endpoint.id, revision);
                problems.note(
                    RuleCategory::PowerSource,
                    Location::attr(endpoint.id, CLUSTER_POWER_SOURCE, GlobalElements::ClusterRevision.id()),
                    "Power source ClusterRevision is < 2, skipping remainder of test for this endpoint",
                );
                lists.insert(endpoint.id, None);
                continue;
            }
            Some(_) => (),
        }

        if !cluster.contains(ATTR_ENDPOINT_LIST) {
            error(
                problems,
                endpoint_list_loc(endpoint.id),
                format!(
                    "Did not find EndpointList on {}",
                    Location::cluster(endpoint.id, CLUSTER_POWER_SOURCE)
                ),
            );
            continue;
        }

        let Some(list) = endpoint_list(endpoint) else {
            error(
                problems,
                endpoint_list_loc(endpoint.id),
                "EndpointList is not a list of endpoint IDs".into(),
            );
            continue;
        };

        if list
            .iter()
            .any(|ep| !EndptId::try_from(*ep).map(|ep| snapshot.contains(ep)).unwrap_or(false))
        {
            error(
                problems,
                endpoint_list_loc(endpoint.id),
                "EndpointList lists a non-existent endpoint".into(),
            );
        }

        lists.insert(endpoint.id, Some(list));
    }

    for (ep, _) in lists.iter().filter(|(_, list)| list.is_some()) {
        if let Some(fault) = snapshot.endpoint(*ep).and_then(descriptor_fault) {
            error(
                problems,
                Location::attr(*ep, DESCRIPTOR_CLUSTER, DescriptorAttr::PartsList.id()),
                fault.into(),
            );
        }
    }

    let bridged = lists
        .iter()
        .filter_map(|(ep, list)| list.as_ref().map(|list| (*ep, list)))
        .filter_map(|(ep, list)| snapshot.endpoint(ep).map(|endpoint| (endpoint, list)))
        .filter(|(endpoint, _)| descriptor_fault(endpoint).is_none())
        .filter(|(endpoint, _)| {
            endpoint
                .device_types()
                .iter()
                .any(|dt| dt.dtype == DEV_TYPE_BRIDGED_NODE)
        })
        .collect::<Vec<_>>();

    for (endpoint, list) in &bridged {
        let mut desired = endpoint.raw_parts_list().unwrap_or_default();
        desired.push(endpoint.id as u64);
        desired.sort_unstable();

        let mut actual = (*list).clone();
        actual.sort_unstable();

        if actual != desired {
            error(
                problems,
                endpoint_list_loc(endpoint.id),
                format!(
                    "Power source EndpointList on bridged node endpoint {} is not as expected. Desired: {:?} Actual: {:?}",
                    endpoint.id, desired, actual
                ),
            );
        }
    }

    // Only direct children of a bridged node are checked
    for child in bridged.iter().flat_map(|(endpoint, _)| endpoint.parts_list()) {
        let Some(Some(list)) = lists.get(&child) else {
            continue;
        };

        let desired = vec![child as u64];
        let mut actual = list.clone();
        actual.sort_unstable();

        if actual != desired {
            error(
                problems,
                endpoint_list_loc(child),
                format!(
                    "Power source EndpointList on bridged child endpoint {} is not as expected. Desired: {:?} Actual: {:?}",
                    child, desired, actual
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::snapshot::{AttrValue, Cluster, DescriptorBuilder};

    use super::*;

    fn power_source(revision: u16, list: Option<&[u16]>) -> Cluster {
        let cluster = Cluster::new(CLUSTER_POWER_SOURCE);
        let cluster = match list {
            Some(list) => cluster.with(ATTR_ENDPOINT_LIST, AttrValue::uint_list(list.iter().copied())),
            None => cluster,
        };

        cluster.with_globals(revision, 0, &[], &[])
    }

    fn endpoint(id: EndptId, dtype: u32, parts: &[u16], power: Option<Cluster>) -> Endpoint {
        let endpoint = Endpoint::new(id).with(
            DescriptorBuilder::new()
                .device_type(dtype, 1)
                .parts(parts.iter().copied())
                .build(),
        );

        match power {
            Some(power) => endpoint.with(power),
            None => endpoint,
        }
    }

    fn bridge(node_list: &[u16], child_list: &[u16]) -> Snapshot {
        Snapshot::from_endpoints([
            endpoint(0, 0x0016, &[1, 2, 3], None),
            endpoint(1, 0x000E, &[2, 3], None),
            endpoint(2, DEV_TYPE_BRIDGED_NODE, &[3], Some(power_source(2, Some(node_list)))),
            endpoint(3, 0x0100, &[], Some(power_source(2, Some(child_list)))),
        ])
        .unwrap()
    }

    #[test]
    fn bridged_node_lists() {
        let mut problems = Problems::new();
        check_power_sources(&bridge(&[3, 2], &[3]), &mut problems);
        assert!(problems.is_empty());

        let mut problems = Problems::new();
        check_power_sources(&bridge(&[2], &[3, 2]), &mut problems);
        let locations = problems
            .all()
            .iter()
            .map(|p| p.location.endpoint)
            .collect::<Vec<_>>();
        assert_eq!(locations, vec![Some(2), Some(3)]);
    }

    #[test]
    fn non_existent_endpoint() {
        let mut problems = Problems::new();
        check_power_sources(&bridge(&[2, 3, 9], &[3]), &mut problems);

        // Reported once as non-existent and once as a bridged node mismatch
        assert_eq!(problems.len(), 2);
        assert!(problems.all()[0].message.contains("non-existent"));
    }

    #[test]
    fn old_revision_is_a_note() {
        let snapshot = Snapshot::from_endpoints([endpoint(1, 0x0100, &[], Some(power_source(1, None)))]).unwrap();
        let mut problems = Problems::new();
        check_power_sources(&snapshot, &mut problems);

        assert!(problems.passed(RuleCategory::PowerSource));
        assert_eq!(problems.notes().count(), 1);
    }

    #[test]
    fn missing_endpoint_list() {
        let snapshot = Snapshot::from_endpoints([endpoint(1, 0x0100, &[], Some(power_source(2, None)))]).unwrap();
        let mut problems = Problems::new();
        check_power_sources(&snapshot, &mut problems);

        assert!(!problems.passed(RuleCategory::PowerSource));
        assert_eq!(problems.all()[0].location, endpoint_list_loc(1));
    }
}
