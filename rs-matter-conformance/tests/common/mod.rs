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

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;

use rs_matter_conformance::catalog::{DEV_TYPE_ROOT_NODE, ROOT_NODE_CLUSTERS};
use rs_matter_conformance::ids::{AttrId, ClusterId, EndptId};
use rs_matter_conformance::{
    AttrProbe, AttrValue, Catalog, Cluster, ClusterSpec, DescriptorBuilder, Endpoint, ErrorCode,
    IMStatusCode, ProbeError, ProbeRequest, Tag,
};

pub const DT_ON_OFF_LIGHT: u32 = 0x0100;
pub const CLUSTER_ON_OFF: ClusterId = 0x0006;

pub fn init_env_logger() {
    let _ = env_logger::try_init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
}

/// A catalog knowing the root node clusters and On/Off.
pub fn catalog() -> Catalog {
    ROOT_NODE_CLUSTERS
        .iter()
        .fold(Catalog::new(), |catalog, &id| {
            catalog.with_cluster(ClusterSpec::new(id, "Root node cluster"))
        })
        .with_cluster(
            ClusterSpec::new(CLUSTER_ON_OFF, "On/Off")
                .attributes(&[0x0000, 0x4000])
                .accepted_commands(&[0x00, 0x01, 0x02])
                .features(0x07),
        )
}

/// A cluster carrying nothing but well-formed global attributes.
pub fn bare_cluster(id: ClusterId) -> Cluster {
    Cluster::new(id).with_globals(1, 0, &[], &[])
}

pub fn on_off() -> Cluster {
    Cluster::new(CLUSTER_ON_OFF)
        .with(0x0000, AttrValue::Bool(false))
        .with_globals(6, 0x01, &[0x00, 0x01, 0x02], &[])
}

pub fn root_endpoint(parts: &[EndptId]) -> Endpoint {
    let endpoint = Endpoint::new(0).with(
        DescriptorBuilder::new()
            .device_type(DEV_TYPE_ROOT_NODE, 1)
            .parts(parts.iter().copied())
            .build(),
    );

    ROOT_NODE_CLUSTERS
        .iter()
        .fold(endpoint, |endpoint, &id| endpoint.with(bare_cluster(id)))
}

pub fn light(id: EndptId, parts: &[EndptId], tags: Option<Vec<Tag>>) -> Endpoint {
    let builder = DescriptorBuilder::new()
        .device_type(DT_ON_OFF_LIGHT, 3)
        .parts(parts.iter().copied())
        .servers(&[0x001D, CLUSTER_ON_OFF]);
    let builder = match tags {
        Some(tags) => builder.tags(tags),
        None => builder,
    };

    Endpoint::new(id).with(builder.build()).with(on_off())
}

/// Endpoint 0 plus two tagged On/Off lights.
pub fn two_lights() -> Vec<Endpoint> {
    vec![
        root_endpoint(&[1, 2]),
        light(1, &[], Some(vec![Tag::new(0x08, 0x00)])),
        light(2, &[], Some(vec![Tag::new(0x08, 0x01)])),
    ]
}

/// The scripted answer of a `ScriptedProbe`.
#[derive(Debug, Clone)]
pub enum Answer {
    Value(AttrValue),
    Status(IMStatusCode),
    Timeout,
    Transport,
}

/// A probe answering from a script and recording every request.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    answers: BTreeMap<(EndptId, ClusterId, AttrId), Answer>,
    pub requests: RefCell<Vec<ProbeRequest>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, endpoint: EndptId, cluster: ClusterId, attr: AttrId, answer: Answer) -> Self {
        self.answers.insert((endpoint, cluster, attr), answer);
        self
    }
}

impl AttrProbe for ScriptedProbe {
    async fn read(&self, req: &ProbeRequest) -> Result<AttrValue, ProbeError> {
        self.requests.borrow_mut().push(req.clone());

        match self.answers.get(&(req.endpoint, req.cluster, req.attr)) {
            Some(Answer::Value(value)) => Ok(value.clone()),
            Some(Answer::Status(status)) => Err(ProbeError::Status(*status)),
            Some(Answer::Timeout) => Err(ErrorCode::Timeout.into()),
            Some(Answer::Transport) | None => Err(ErrorCode::Transport.into()),
        }
    }
}
