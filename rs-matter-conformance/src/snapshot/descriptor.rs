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

//! Typed views over the Descriptor cluster of an endpoint.

use strum::FromRepr;

use crate::error::{Error, ErrorCode};
use crate::ids::{AttrId, ClusterId, EndptId};

use super::{AttrValue, Cluster, DeviceType, Endpoint};

pub const DESCRIPTOR_CLUSTER: ClusterId = 0x001D;

/// The `TagList` feature bit of the Descriptor `FeatureMap`.
pub const DESCRIPTOR_FEATURE_TAG_LIST: u64 = 0x0001;

/// Maximum length, in octets, of `EndpointUniqueID`.
pub const ENDPOINT_UNIQUE_ID_MAX_LEN: usize = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum DescriptorAttr {
    DeviceTypeList = 0,
    ServerList = 1,
    ClientList = 2,
    PartsList = 3,
    TagList = 4,
    EndpointUniqueId = 5,
}

impl DescriptorAttr {
    pub const fn id(self) -> AttrId {
        self as AttrId
    }
}

/// A semantic tag of the Descriptor `TagList`.
///
/// Field order matters: tag lists are compared as sorted sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub mfg_code: Option<u16>,
    pub namespace: u8,
    pub tag: u8,
    pub label: Option<String>,
}

impl Tag {
    /// A tag from a standard namespace.
    pub const fn new(namespace: u8, tag: u8) -> Self {
        Self {
            mfg_code: None,
            namespace,
            tag,
            label: None,
        }
    }

    /// A manufacturer-specific tag.
    pub fn mfg(mfg_code: u16, namespace: u8, tag: u8, label: Option<&str>) -> Self {
        Self {
            mfg_code: Some(mfg_code),
            namespace,
            tag,
            label: label.map(str::to_string),
        }
    }

    pub fn from_value(value: &AttrValue) -> Result<Self, Error> {
        let mfg_code = match value.field(0) {
            None | Some(AttrValue::Null) => None,
            Some(v) => Some(u16::try_from(
                v.as_uint().ok_or(ErrorCode::InvalidDataType)?,
            )?),
        };

        let namespace = u8::try_from(
            value
                .field(1)
                .and_then(AttrValue::as_uint)
                .ok_or(ErrorCode::InvalidDataType)?,
        )?;

        let tag = u8::try_from(
            value
                .field(2)
                .and_then(AttrValue::as_uint)
                .ok_or(ErrorCode::InvalidDataType)?,
        )?;

        let label = match value.field(3) {
            None | Some(AttrValue::Null) => None,
            Some(v) => {
                let bytes = v.as_str_bytes().ok_or(ErrorCode::InvalidDataType)?;
                Some(core::str::from_utf8(bytes)?.to_string())
            }
        };

        Ok(Self {
            mfg_code,
            namespace,
            tag,
            label,
        })
    }

    pub fn to_value(&self) -> AttrValue {
        let mut fields = vec![(
            0,
            self.mfg_code
                .map(|code| AttrValue::UInt(code as _))
                .unwrap_or(AttrValue::Null),
        )];
        fields.push((1, AttrValue::UInt(self.namespace as _)));
        fields.push((2, AttrValue::UInt(self.tag as _)));
        if let Some(label) = &self.label {
            fields.push((3, AttrValue::str(label)));
        }

        AttrValue::Struct(fields)
    }
}

impl Endpoint {
    pub fn descriptor(&self) -> Option<&Cluster> {
        self.cluster(DESCRIPTOR_CLUSTER)
    }

    fn descriptor_attr(&self, attr: DescriptorAttr) -> Option<&AttrValue> {
        self.descriptor()?.get(attr.id())
    }

    /// Decode `DeviceTypeList`.
    ///
    /// `Ok(None)` means the endpoint has no Descriptor or the attribute is missing.
    pub fn try_device_types(&self) -> Result<Option<Vec<DeviceType>>, Error> {
        let Some(value) = self.descriptor_attr(DescriptorAttr::DeviceTypeList) else {
            return Ok(None);
        };

        value
            .as_list()
            .ok_or(ErrorCode::InvalidDataType)?
            .iter()
            .map(DeviceType::from_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// `DeviceTypeList`, empty if missing or undecodable.
    pub fn device_types(&self) -> Vec<DeviceType> {
        self.try_device_types().ok().flatten().unwrap_or_default()
    }

    /// The raw `PartsList` values, without narrowing them to endpoint IDs.
    pub fn raw_parts_list(&self) -> Option<Vec<u64>> {
        self.descriptor_attr(DescriptorAttr::PartsList)?
            .as_uint_list()
    }

    /// `PartsList` in reported order, duplicates preserved.
    ///
    /// Values that cannot be endpoint IDs are dropped; missing or undecodable
    /// lists read as empty.
    pub fn parts_list(&self) -> Vec<EndptId> {
        self.raw_parts_list()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|ep| EndptId::try_from(ep).ok())
            .collect()
    }

    pub fn has_tag_list(&self) -> bool {
        self.descriptor_attr(DescriptorAttr::TagList).is_some()
    }

    /// Decode `TagList`.
    ///
    /// `Ok(None)` means the attribute is not present.
    pub fn try_tag_list(&self) -> Result<Option<Vec<Tag>>, Error> {
        let Some(value) = self.descriptor_attr(DescriptorAttr::TagList) else {
            return Ok(None);
        };

        value
            .as_list()
            .ok_or(ErrorCode::InvalidDataType)?
            .iter()
            .map(Tag::from_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// `TagList`, `None` if missing or undecodable.
    pub fn tag_list(&self) -> Option<Vec<Tag>> {
        self.try_tag_list().ok().flatten()
    }

    pub fn unique_id(&self) -> Option<&AttrValue> {
        self.descriptor_attr(DescriptorAttr::EndpointUniqueId)
    }

    /// The Descriptor `FeatureMap`, `0` if missing.
    pub fn descriptor_features(&self) -> u64 {
        self.descriptor()
            .and_then(Cluster::feature_map)
            .unwrap_or(0)
    }
}

/// Builds a Descriptor cluster value set for an endpoint.
#[derive(Debug, Clone, Default)]
pub struct DescriptorBuilder {
    device_types: Vec<DeviceType>,
    parts: Vec<u64>,
    servers: Vec<ClusterId>,
    tags: Option<Vec<Tag>>,
    unique_id: Option<AttrValue>,
    feature_map: Option<u32>,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_type(mut self, dtype: u32, drev: u16) -> Self {
        self.device_types.push(DeviceType::new(dtype, drev));
        self
    }

    pub fn parts<I>(mut self, parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<u64>,
    {
        self.parts = parts.into_iter().map(Into::into).collect();
        self
    }

    pub fn servers(mut self, servers: &[ClusterId]) -> Self {
        self.servers = servers.to_vec();
        self
    }

    /// Set the `TagList`; also turns on the `TagList` feature bit unless
    /// a feature map was given explicitly.
    pub fn tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn unique_id(mut self, value: AttrValue) -> Self {
        self.unique_id = Some(value);
        self
    }

    pub fn feature_map(mut self, feature_map: u32) -> Self {
        self.feature_map = Some(feature_map);
        self
    }

    pub fn build(self) -> Cluster {
        let feature_map = self.feature_map.unwrap_or(if self.tags.is_some() {
            DESCRIPTOR_FEATURE_TAG_LIST as u32
        } else {
            0
        });

        let mut cluster = Cluster::new(DESCRIPTOR_CLUSTER)
            .with(
                DescriptorAttr::DeviceTypeList.id(),
                AttrValue::List(self.device_types.iter().map(DeviceType::to_value).collect()),
            )
            .with(
                DescriptorAttr::ServerList.id(),
                AttrValue::uint_list(self.servers.iter().copied()),
            )
            .with(DescriptorAttr::ClientList.id(), AttrValue::List(vec![]))
            .with(
                DescriptorAttr::PartsList.id(),
                AttrValue::uint_list(self.parts.iter().copied()),
            );

        if let Some(tags) = &self.tags {
            cluster.insert(
                DescriptorAttr::TagList.id(),
                AttrValue::List(tags.iter().map(Tag::to_value).collect()),
            );
        }

        if let Some(unique_id) = self.unique_id {
            cluster.insert(DescriptorAttr::EndpointUniqueId.id(), unique_id);
        }

        cluster.with_globals(2, feature_map, &[], &[])
    }
}
