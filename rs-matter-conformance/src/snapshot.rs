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

//! The in-memory image of a device, as captured by a wildcard read.
//!
//! The snapshot is assembled once by whoever performed the read and is
//! never modified by the checks.

use core::fmt;
use std::collections::BTreeMap;

use strum::{Display, EnumIter, FromRepr};

use crate::error::{Error, ErrorCode, IMStatusCode};
use crate::ids::{AttrId, ClusterId, DevTypeId, EndptId};

pub use descriptor::*;

mod descriptor;

/// A decoded attribute value.
///
/// Character strings are kept as the raw octets received from the device,
/// so that their encoding can be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(Vec<u8>),
    Octets(Vec<u8>),
    List(Vec<AttrValue>),
    /// A structure, as a sequence of (context tag, value) pairs
    Struct(Vec<(u8, AttrValue)>),
    /// The attribute was reported, but could not be read or decoded
    Failure(IMStatusCode),
}

impl AttrValue {
    /// Create a character string value from a `&str`.
    pub fn str(s: &str) -> Self {
        Self::Str(s.as_bytes().to_vec())
    }

    /// Create a list of unsigned integers.
    pub fn uint_list<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<u64>,
    {
        Self::List(values.into_iter().map(|v| Self::UInt(v.into())).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Return the value as an unsigned integer, if it is a non-negative integer.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Return the value as a signed integer, if it is an integer that fits.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Self::UInt(v) => Some(*v as i128),
            Self::Int(v) => Some(*v as i128),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Return the value as a list of unsigned integers.
    ///
    /// Returns `None` if the value is not a list or if any element is not
    /// a non-negative integer.
    pub fn as_uint_list(&self) -> Option<Vec<u64>> {
        self.as_list()?.iter().map(AttrValue::as_uint).collect()
    }

    /// Return the raw octets of a character string.
    pub fn as_str_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Str(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Return the field with the given context tag of a structure.
    pub fn field(&self, tag: u8) -> Option<&AttrValue> {
        match self {
            Self::Struct(fields) => fields.iter().find(|(t, _)| *t == tag).map(|(_, v)| v),
            _ => None,
        }
    }

    /// A short name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Str(_) => "string",
            Self::Octets(_) => "octets",
            Self::List(_) => "list",
            Self::Struct(_) => "struct",
            Self::Failure(_) => "failure",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Str(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Self::Octets(bytes) => {
                write!(f, "hex:")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Self::List(items) => {
                write!(f, "[")?;
                let mut comma = "";
                for item in items {
                    write!(f, "{}{}", comma, item)?;
                    comma = ", ";
                }
                write!(f, "]")
            }
            Self::Struct(fields) => {
                write!(f, "{{")?;
                let mut comma = "";
                for (tag, value) in fields {
                    write!(f, "{}{}: {}", comma, tag, value)?;
                    comma = ", ";
                }
                write!(f, "}}")
            }
            Self::Failure(status) => write!(f, "<failure {:?}>", status),
        }
    }
}

/// The global attributes every cluster carries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, FromRepr, EnumIter, Display)]
#[repr(u32)]
pub enum GlobalElements {
    GeneratedCommandList = 0xFFF8,
    AcceptedCommandList = 0xFFF9,
    EventList = 0xFFFA,
    AttributeList = 0xFFFB,
    FeatureMap = 0xFFFC,
    ClusterRevision = 0xFFFD,
}

impl GlobalElements {
    pub const fn id(self) -> AttrId {
        self as AttrId
    }

    /// The global attributes a cluster must always expose.
    pub const MANDATORY: &'static [GlobalElements] = &[
        GlobalElements::ClusterRevision,
        GlobalElements::FeatureMap,
        GlobalElements::AttributeList,
        GlobalElements::AcceptedCommandList,
        GlobalElements::GeneratedCommandList,
    ];
}

/// A device type entry of the Descriptor `DeviceTypeList`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceType {
    pub dtype: DevTypeId,
    pub drev: u16,
}

impl DeviceType {
    pub const fn new(dtype: DevTypeId, drev: u16) -> Self {
        Self { dtype, drev }
    }

    pub fn from_value(value: &AttrValue) -> Result<Self, Error> {
        let dtype = value
            .field(0)
            .and_then(AttrValue::as_uint)
            .ok_or(ErrorCode::InvalidDataType)?;
        let drev = value
            .field(1)
            .and_then(AttrValue::as_uint)
            .ok_or(ErrorCode::InvalidDataType)?;

        Ok(Self {
            dtype: DevTypeId::try_from(dtype)?,
            drev: u16::try_from(drev)?,
        })
    }

    pub fn to_value(&self) -> AttrValue {
        AttrValue::Struct(vec![
            (0, AttrValue::UInt(self.dtype as _)),
            (1, AttrValue::UInt(self.drev as _)),
        ])
    }
}

/// A cluster instance as observed on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,
    attrs: BTreeMap<AttrId, AttrValue>,
}

impl Cluster {
    pub fn new(id: ClusterId) -> Self {
        Self {
            id,
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style variant of `insert`.
    pub fn with(mut self, attr: AttrId, value: AttrValue) -> Self {
        self.insert(attr, value);
        self
    }

    /// Add the global attributes, deriving `AttributeList` from whatever
    /// attributes the cluster already carries plus the globals themselves.
    ///
    /// Useful for building well-formed clusters; a real snapshot should carry
    /// whatever the device reported instead.
    pub fn with_globals(
        mut self,
        revision: u16,
        feature_map: u32,
        accepted: &[u32],
        generated: &[u32],
    ) -> Self {
        self.insert(
            GlobalElements::ClusterRevision.id(),
            AttrValue::UInt(revision as _),
        );
        self.insert(
            GlobalElements::FeatureMap.id(),
            AttrValue::UInt(feature_map as _),
        );
        self.insert(
            GlobalElements::AcceptedCommandList.id(),
            AttrValue::uint_list(accepted.iter().copied()),
        );
        self.insert(
            GlobalElements::GeneratedCommandList.id(),
            AttrValue::uint_list(generated.iter().copied()),
        );
        self.insert(GlobalElements::AttributeList.id(), AttrValue::Null);

        let attr_list = AttrValue::uint_list(self.attrs.keys().copied());
        self.insert(GlobalElements::AttributeList.id(), attr_list);

        self
    }

    pub fn insert(&mut self, attr: AttrId, value: AttrValue) -> Option<AttrValue> {
        self.attrs.insert(attr, value)
    }

    pub fn get(&self, attr: AttrId) -> Option<&AttrValue> {
        self.attrs.get(&attr)
    }

    pub fn contains(&self, attr: AttrId) -> bool {
        self.attrs.contains_key(&attr)
    }

    /// Iterate over the observed attributes, in ascending ID order.
    pub fn attrs(&self) -> impl Iterator<Item = (AttrId, &AttrValue)> + '_ {
        self.attrs.iter().map(|(id, value)| (*id, value))
    }

    pub fn attr_ids(&self) -> impl Iterator<Item = AttrId> + '_ {
        self.attrs.keys().copied()
    }

    pub fn global(&self, global: GlobalElements) -> Option<&AttrValue> {
        self.get(global.id())
    }

    /// Return one of the ID-list globals (`AttributeList`, `AcceptedCommandList`,
    /// `GeneratedCommandList`) as a list of 32-bit IDs, in reported order.
    ///
    /// Elements that do not fit in 32 bits are dropped; the range checks
    /// report them separately.
    pub fn id_list(&self, global: GlobalElements) -> Option<Vec<u32>> {
        let values = self.global(global)?.as_uint_list()?;

        Some(
            values
                .into_iter()
                .filter_map(|v| u32::try_from(v).ok())
                .collect(),
        )
    }

    pub fn attribute_list(&self) -> Option<Vec<AttrId>> {
        self.id_list(GlobalElements::AttributeList)
    }

    pub fn feature_map(&self) -> Option<u64> {
        self.global(GlobalElements::FeatureMap)?.as_uint()
    }

    pub fn revision(&self) -> Option<u64> {
        self.global(GlobalElements::ClusterRevision)?.as_uint()
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:0x{:08x}, attrs[", self.id)?;
        let mut comma = "";
        for id in self.attrs.keys() {
            write!(f, "{}0x{:x}", comma, id)?;
            comma = ", ";
        }
        write!(f, "]")
    }
}

/// An endpoint as observed on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub id: EndptId,
    clusters: BTreeMap<ClusterId, Cluster>,
}

impl Endpoint {
    pub fn new(id: EndptId) -> Self {
        Self {
            id,
            clusters: BTreeMap::new(),
        }
    }

    /// Builder-style variant of `insert`.
    pub fn with(mut self, cluster: Cluster) -> Self {
        self.insert(cluster);
        self
    }

    pub fn insert(&mut self, cluster: Cluster) -> Option<Cluster> {
        self.clusters.insert(cluster.id, cluster)
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(&id)
    }

    pub fn has_cluster(&self, id: ClusterId) -> bool {
        self.clusters.contains_key(&id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> + '_ {
        self.clusters.values()
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.clusters.keys().copied()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clusters:[")?;
        let mut comma = "";
        for cluster in self.clusters.values() {
            write!(f, "{} {{ {} }}", comma, cluster)?;
            comma = ", ";
        }

        write!(f, "]")
    }
}

/// The whole device: all endpoints returned by the wildcard read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    endpoints: BTreeMap<EndptId, Endpoint>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from a sequence of endpoints.
    ///
    /// Fails with `ErrorCode::Duplicate` if two endpoints share an ID.
    pub fn from_endpoints<I>(endpoints: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = Endpoint>,
    {
        let mut snapshot = Self::new();
        for endpoint in endpoints {
            snapshot.add(endpoint)?;
        }

        Ok(snapshot)
    }

    /// Add an endpoint to the snapshot.
    pub fn add(&mut self, endpoint: Endpoint) -> Result<(), Error> {
        if self.endpoints.contains_key(&endpoint.id) {
            Err(ErrorCode::Duplicate)?;
        }

        self.endpoints.insert(endpoint.id, endpoint);
        Ok(())
    }

    pub fn endpoint(&self, id: EndptId) -> Option<&Endpoint> {
        self.endpoints.get(&id)
    }

    pub fn contains(&self, id: EndptId) -> bool {
        self.endpoints.contains_key(&id)
    }

    /// Iterate over the endpoints, in ascending ID order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> + '_ {
        self.endpoints.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = EndptId> + '_ {
        self.endpoints.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "node:")?;
        for endpoint in self.endpoints.values() {
            writeln!(f, "endpoint {}: {}", endpoint.id, endpoint)?;
        }

        Ok(())
    }
}
