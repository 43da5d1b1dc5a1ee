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

//! The reference data the checks are run against: the known standard clusters
//! with their attributes, commands and features, and the device type metadata
//! (supersets, node-scope types, composition style).

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, ErrorCode};
use crate::ids::{AttrId, ClusterId, CmdId, DevTypeId};
use crate::snapshot::DESCRIPTOR_CLUSTER;

/// Root Node device type (ep0).
pub const DEV_TYPE_ROOT_NODE: DevTypeId = 0x0016;
/// Power Source device type.
pub const DEV_TYPE_POWER_SOURCE: DevTypeId = 0x0011;
/// OTA Requestor device type.
pub const DEV_TYPE_OTA_REQUESTOR: DevTypeId = 0x0012;
/// Bridged Node device type.
pub const DEV_TYPE_BRIDGED_NODE: DevTypeId = 0x0013;
/// OTA Provider device type.
pub const DEV_TYPE_OTA_PROVIDER: DevTypeId = 0x0014;
/// Secondary Network Interface device type.
pub const DEV_TYPE_SECONDARY_NETWORK_INTERFACE: DevTypeId = 0x0019;
/// Aggregator device type; its endpoint lists its parts flat.
pub const DEV_TYPE_AGGREGATOR: DevTypeId = 0x000E;
/// Content App device type.
pub const DEV_TYPE_CONTENT_APP: DevTypeId = 0x0024;
/// Joint Fabric Administrator device type.
pub const DEV_TYPE_JOINT_FABRIC_ADMINISTRATOR: DevTypeId = 0x0130;
/// Device Energy Management device type.
pub const DEV_TYPE_DEVICE_ENERGY_MANAGEMENT: DevTypeId = 0x050D;
/// Electrical Sensor device type.
pub const DEV_TYPE_ELECTRICAL_SENSOR: DevTypeId = 0x0510;

/// Device types with node scope, which never count as application device types.
pub const NON_APPLICATION_DEVICE_TYPES: &[DevTypeId] = &[
    DEV_TYPE_ROOT_NODE,
    DEV_TYPE_POWER_SOURCE,
    DEV_TYPE_OTA_REQUESTOR,
    DEV_TYPE_OTA_PROVIDER,
    DEV_TYPE_BRIDGED_NODE,
    DEV_TYPE_ELECTRICAL_SENSOR,
    DEV_TYPE_DEVICE_ENERGY_MANAGEMENT,
    DEV_TYPE_SECONDARY_NETWORK_INTERFACE,
    DEV_TYPE_JOINT_FABRIC_ADMINISTRATOR,
];

/// Device types allowed on ep0 next to the Root Node device type.
pub const ROOT_ENDPOINT_DEVICE_TYPES: &[DevTypeId] = &[
    DEV_TYPE_ROOT_NODE,
    DEV_TYPE_POWER_SOURCE,
    DEV_TYPE_OTA_REQUESTOR,
    DEV_TYPE_OTA_PROVIDER,
];

pub const CLUSTER_ACCESS_CONTROL: ClusterId = 0x001F;
pub const CLUSTER_BASIC_INFORMATION: ClusterId = 0x0028;
pub const CLUSTER_GENERAL_COMMISSIONING: ClusterId = 0x0030;
pub const CLUSTER_GENERAL_DIAGNOSTICS: ClusterId = 0x0033;
pub const CLUSTER_ADMINISTRATOR_COMMISSIONING: ClusterId = 0x003C;
pub const CLUSTER_OPERATIONAL_CREDENTIALS: ClusterId = 0x003E;
pub const CLUSTER_GROUP_KEY_MANAGEMENT: ClusterId = 0x003F;
/// The Unit Testing cluster, which deliberately reports undecodable values.
pub const CLUSTER_UNIT_TESTING: ClusterId = 0xFFF1_FC05;

/// Clusters the Root Node endpoint must host.
pub const ROOT_NODE_CLUSTERS: &[ClusterId] = &[
    CLUSTER_BASIC_INFORMATION,
    CLUSTER_ACCESS_CONTROL,
    CLUSTER_GROUP_KEY_MANAGEMENT,
    CLUSTER_GENERAL_COMMISSIONING,
    CLUSTER_ADMINISTRATOR_COMMISSIONING,
    CLUSTER_OPERATIONAL_CREDENTIALS,
    CLUSTER_GENERAL_DIAGNOSTICS,
];

/// The standard semantic tag namespaces.
pub const STANDARD_TAG_NAMESPACES: &[u8] = &[
    0x01, // Common Closure
    0x02, // Common Compass Direction
    0x03, // Common Compass Location
    0x04, // Common Direction
    0x05, // Common Level
    0x06, // Common Location
    0x07, // Common Number
    0x08, // Common Position
    0x0A, // Electrical Measurement
    0x0E, // Laundry
    0x0F, // Power Source
    0x10, // Common Area
    0x11, // Common Landmark
    0x12, // Common Relative Position
    0x41, // Refrigerator
    0x42, // Room Air Conditioner
    0x43, // Switches
];

/// What the catalog knows about one standard cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSpec {
    pub id: ClusterId,
    pub name: String,
    pub attributes: BTreeSet<AttrId>,
    pub accepted_commands: BTreeSet<CmdId>,
    pub generated_commands: BTreeSet<CmdId>,
    /// All feature bits the cluster defines
    pub feature_mask: u32,
}

impl ClusterSpec {
    pub fn new(id: ClusterId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn attributes(mut self, attrs: &[AttrId]) -> Self {
        self.attributes.extend(attrs.iter().copied());
        self
    }

    pub fn accepted_commands(mut self, cmds: &[CmdId]) -> Self {
        self.accepted_commands.extend(cmds.iter().copied());
        self
    }

    pub fn generated_commands(mut self, cmds: &[CmdId]) -> Self {
        self.generated_commands.extend(cmds.iter().copied());
        self
    }

    pub fn features(mut self, mask: u32) -> Self {
        self.feature_mask = mask;
        self
    }
}

/// The reference catalog.
///
/// Assembled once by the caller and handed by reference to every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    clusters: BTreeMap<ClusterId, ClusterSpec>,
    supersets: Vec<BTreeSet<DevTypeId>>,
    flat_composition: BTreeSet<DevTypeId>,
    tree_excluded: BTreeSet<DevTypeId>,
    non_application: BTreeSet<DevTypeId>,
    root_endpoint_device_types: BTreeSet<DevTypeId>,
    tag_namespaces: BTreeSet<u8>,
    root_node_clusters: Vec<ClusterId>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a catalog with the standard device type metadata and no clusters
    /// except for the Descriptor, whose layout the composition checks rely on.
    pub fn new() -> Self {
        let mut catalog = Self::empty();

        catalog.flat_composition.insert(DEV_TYPE_AGGREGATOR);
        catalog.tree_excluded.insert(DEV_TYPE_CONTENT_APP);
        catalog
            .non_application
            .extend(NON_APPLICATION_DEVICE_TYPES.iter().copied());
        catalog
            .root_endpoint_device_types
            .extend(ROOT_ENDPOINT_DEVICE_TYPES.iter().copied());
        catalog
            .tag_namespaces
            .extend(STANDARD_TAG_NAMESPACES.iter().copied());
        catalog.root_node_clusters = ROOT_NODE_CLUSTERS.to_vec();

        catalog.clusters.insert(
            DESCRIPTOR_CLUSTER,
            ClusterSpec::new(DESCRIPTOR_CLUSTER, "Descriptor")
                .attributes(&[0, 1, 2, 3, 4, 5])
                .features(0x0001),
        );

        catalog
    }

    /// Create a catalog with no reference data at all.
    pub fn empty() -> Self {
        Self {
            clusters: BTreeMap::new(),
            supersets: Vec::new(),
            flat_composition: BTreeSet::new(),
            tree_excluded: BTreeSet::new(),
            non_application: BTreeSet::new(),
            root_endpoint_device_types: BTreeSet::new(),
            tag_namespaces: BTreeSet::new(),
            root_node_clusters: Vec::new(),
        }
    }

    /// Add a cluster to the catalog.
    ///
    /// Fails with `ErrorCode::Duplicate` if a cluster with the same ID is already known.
    pub fn add_cluster(&mut self, spec: ClusterSpec) -> Result<(), Error> {
        if self.clusters.contains_key(&spec.id) {
            Err(ErrorCode::Duplicate)?;
        }

        self.clusters.insert(spec.id, spec);
        Ok(())
    }

    /// Builder-style variant of `add_cluster` which replaces any existing entry.
    pub fn with_cluster(mut self, spec: ClusterSpec) -> Self {
        self.clusters.insert(spec.id, spec);
        self
    }

    /// Declare a group of device types that may be listed together on one endpoint.
    pub fn with_superset(mut self, device_types: &[DevTypeId]) -> Self {
        self.supersets
            .push(device_types.iter().copied().collect::<BTreeSet<_>>());
        self
    }

    /// Declare a device type whose endpoints use flat composition.
    pub fn with_flat_composition(mut self, dtype: DevTypeId) -> Self {
        self.flat_composition.insert(dtype);
        self
    }

    /// Declare a device type whose endpoints are left out of the tree analysis.
    pub fn with_tree_excluded(mut self, dtype: DevTypeId) -> Self {
        self.tree_excluded.insert(dtype);
        self
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&ClusterSpec> {
        self.clusters.get(&id)
    }

    pub fn is_known_cluster(&self, id: ClusterId) -> bool {
        self.clusters.contains_key(&id)
    }

    pub fn supersets(&self) -> &[BTreeSet<DevTypeId>] {
        &self.supersets
    }

    /// Return `true` if all device types belong to one superset.
    pub fn in_one_superset(&self, device_types: &BTreeSet<DevTypeId>) -> bool {
        self.supersets
            .iter()
            .any(|superset| device_types.is_subset(superset))
    }

    pub fn is_flat_composition(&self, dtype: DevTypeId) -> bool {
        self.flat_composition.contains(&dtype)
    }

    pub fn is_tree_excluded(&self, dtype: DevTypeId) -> bool {
        self.tree_excluded.contains(&dtype)
    }

    pub fn is_application_device_type(&self, dtype: DevTypeId) -> bool {
        !self.non_application.contains(&dtype)
    }

    pub fn is_root_endpoint_device_type(&self, dtype: DevTypeId) -> bool {
        self.root_endpoint_device_types.contains(&dtype)
    }

    pub fn is_standard_namespace(&self, namespace: u8) -> bool {
        self.tag_namespaces.contains(&namespace)
    }

    pub fn root_node_clusters(&self) -> &[ClusterId] {
        &self.root_node_clusters
    }
}
