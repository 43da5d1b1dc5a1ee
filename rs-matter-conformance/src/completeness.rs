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

//! Per-cluster checks of the global attributes: presence, value constraints,
//! reconciliation of the declared inventory with what was observed, identifier
//! ranges, feature maps and string encoding.
//!
//! A failure in one stage never blocks the others; every attribute that is
//! present is checked.

use core::fmt;
use std::collections::BTreeSet;

use log::{debug, error, info};

use crate::catalog::{Catalog, ClusterSpec};
use crate::config::ValidationConfig;
use crate::ids::{self, AttrId, ClusterId, CmdId, EndptId, IdRange, SuffixFault};
use crate::probe::{AttrProbe, ProbeError, ProbeRequest, ProbeVerdict};
use crate::problems::{Location, ProblemKind, Problems, RuleCategory};
use crate::snapshot::{AttrValue, Cluster, GlobalElements, Snapshot};

const GLOBAL_ELEMENTS_REF: &str = "Global Elements";
const ATTRIBUTE_LIST_REF: &str = "AttributeList Attribute";
const MEI_REF: &str = "Manufacturer Extensible Identifier (MEI)";
const CLUSTER_REF: &str = "Cluster";
const FEATURE_MAP_REF: &str = "FeatureMap Attribute";
const STRING_REF: &str = "Data types - Character String";

/// A bound on the value of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// An integer within `min..=max`
    IntRange { min: i128, max: i128 },
    /// A list of integers within `min..=max`, with `min_size..=max_size` elements
    IntList {
        min: i128,
        max: i128,
        min_size: usize,
        max_size: Option<usize>,
    },
    /// A list without repeated elements
    NoDuplicates,
}

/// How a value breaks a `Constraint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    NotAnInt(&'static str),
    OutOfRange { value: i128, min: i128, max: i128 },
    NotAList(&'static str),
    ElementNotAnInt { index: usize },
    ElementOutOfRange { index: usize, value: i128 },
    TooShort { len: usize, min: usize },
    TooLong { len: usize, max: usize },
    Duplicate { index: usize },
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnInt(t) => write!(f, "value is not an integer but {}", t),
            Self::OutOfRange { value, min, max } => {
                write!(f, "value {} is not in range [{}, {}]", value, min, max)
            }
            Self::NotAList(t) => write!(f, "value is not a list but {}", t),
            Self::ElementNotAnInt { index } => write!(f, "element {} is not an integer", index),
            Self::ElementOutOfRange { index, value } => {
                write!(f, "element {} with value {} is out of range", index, value)
            }
            Self::TooShort { len, min } => write!(f, "list has {} elements, expected at least {}", len, min),
            Self::TooLong { len, max } => write!(f, "list has {} elements, expected at most {}", len, max),
            Self::Duplicate { index } => write!(f, "element {} is a duplicate", index),
        }
    }
}

impl Constraint {
    pub fn check(&self, value: &AttrValue) -> Result<(), ConstraintViolation> {
        match *self {
            Self::IntRange { min, max } => {
                let v = value
                    .as_int()
                    .ok_or(ConstraintViolation::NotAnInt(value.type_name()))?;

                if v < min || v > max {
                    Err(ConstraintViolation::OutOfRange { value: v, min, max })
                } else {
                    Ok(())
                }
            }
            Self::IntList {
                min,
                max,
                min_size,
                max_size,
            } => {
                let items = value
                    .as_list()
                    .ok_or(ConstraintViolation::NotAList(value.type_name()))?;

                if items.len() < min_size {
                    Err(ConstraintViolation::TooShort {
                        len: items.len(),
                        min: min_size,
                    })?;
                }

                if let Some(max_size) = max_size {
                    if items.len() > max_size {
                        Err(ConstraintViolation::TooLong {
                            len: items.len(),
                            max: max_size,
                        })?;
                    }
                }

                for (index, item) in items.iter().enumerate() {
                    let v = item
                        .as_int()
                        .ok_or(ConstraintViolation::ElementNotAnInt { index })?;

                    if v < min || v > max {
                        Err(ConstraintViolation::ElementOutOfRange { index, value: v })?;
                    }
                }

                Ok(())
            }
            Self::NoDuplicates => {
                let items = value
                    .as_list()
                    .ok_or(ConstraintViolation::NotAList(value.type_name()))?;

                match items
                    .iter()
                    .enumerate()
                    .find(|(index, item)| items[..*index].contains(item))
                {
                    Some((index, _)) => Err(ConstraintViolation::Duplicate { index }),
                    None => Ok(()),
                }
            }
        }
    }
}

/// A global attribute every cluster must carry, with the constraints on its value.
#[derive(Debug, Clone, Copy)]
pub struct RequiredGlobal {
    pub global: GlobalElements,
    pub constraints: &'static [Constraint],
}

const U32_MAX: i128 = 0xFFFF_FFFF;

const ID_LIST: Constraint = Constraint::IntList {
    min: 0,
    max: U32_MAX,
    min_size: 0,
    max_size: None,
};

/// The mandatory global attributes, in checking order.
pub const REQUIRED_GLOBALS: &[RequiredGlobal] = &[
    RequiredGlobal {
        global: GlobalElements::ClusterRevision,
        constraints: &[Constraint::IntRange { min: 1, max: 0xFFFF }],
    },
    RequiredGlobal {
        global: GlobalElements::FeatureMap,
        constraints: &[Constraint::IntRange { min: 0, max: U32_MAX }],
    },
    RequiredGlobal {
        global: GlobalElements::AttributeList,
        constraints: &[
            Constraint::IntList {
                min: 0,
                max: U32_MAX,
                min_size: 1,
                max_size: None,
            },
            Constraint::NoDuplicates,
        ],
    },
    RequiredGlobal {
        global: GlobalElements::AcceptedCommandList,
        constraints: &[ID_LIST, Constraint::NoDuplicates],
    },
    RequiredGlobal {
        global: GlobalElements::GeneratedCommandList,
        constraints: &[ID_LIST, Constraint::NoDuplicates],
    },
];

/// Return `true` if a global attribute ID may show up in an `AttributeList`.
pub fn is_allowed_global(attr: AttrId) -> bool {
    attr == GlobalElements::EventList.id()
        || GlobalElements::MANDATORY.iter().any(|g| g.id() == attr)
}

fn clusters(snapshot: &Snapshot) -> impl Iterator<Item = (EndptId, &Cluster)> + '_ {
    snapshot
        .endpoints()
        .flat_map(|ep| ep.clusters().map(move |cluster| (ep.id, cluster)))
}

/// Every mandatory global attribute is present and its value satisfies its constraints.
pub fn check_mandatory_globals(snapshot: &Snapshot, problems: &mut Problems) {
    for (ep, cluster) in clusters(snapshot) {
        for required in REQUIRED_GLOBALS {
            let attr = required.global.id();
            let location = Location::attr(ep, cluster.id, attr);

            let Some(value) = cluster.get(attr) else {
                problems.error(
                    RuleCategory::GlobalAttributes,
                    ProblemKind::Reconciliation,
                    location,
                    format!(
                        "Did not find mandatory global {} on {}",
                        required.global,
                        Location::cluster(ep, cluster.id)
                    ),
                    GLOBAL_ELEMENTS_REF,
                );
                continue;
            };

            for constraint in required.constraints {
                if let Err(violation) = constraint.check(value) {
                    problems.error(
                        RuleCategory::GlobalAttributes,
                        ProblemKind::Range,
                        location,
                        format!("Failed validation of {} value: {}", required.global, violation),
                        GLOBAL_ELEMENTS_REF,
                    );
                }
            }
        }
    }
}

/// Reconcile every cluster's `AttributeList` with the attributes actually observed.
///
/// A declared attribute that was not observed is re-read once through `probe`; only
/// an `UnsupportedRead` answer clears it as write-only. Probes are issued sequentially,
/// at most once per attribute, and the probe itself must honour `config.probe_timeout`.
pub async fn check_attribute_lists<P>(
    snapshot: &Snapshot,
    config: &ValidationConfig,
    probe: &P,
    problems: &mut Problems,
) where
    P: AttrProbe,
{
    for (ep, cluster) in clusters(snapshot) {
        let Some(attribute_list) = cluster.attribute_list() else {
            debug!("{}: no usable AttributeList, skipping reconciliation", Location::cluster(ep, cluster.id));
            continue;
        };

        let declared = attribute_list.iter().copied().collect::<BTreeSet<_>>();

        for &attr in &declared {
            let location = Location::attr(ep, cluster.id, attr);

            match cluster.get(attr) {
                None => {
                    let req = ProbeRequest::new(ep, cluster.id, attr, config.probe_timeout);
                    debug!("Probing {} for write-only access", req);

                    match ProbeVerdict::classify(probe.read(&req).await) {
                        ProbeVerdict::WriteOnly => {
                            info!("{} is write-only", location);
                        }
                        ProbeVerdict::Readable(_) => {
                            problems.error(
                                RuleCategory::GlobalAttributes,
                                ProblemKind::Reconciliation,
                                location,
                                format!(
                                    "Did not find attribute 0x{:08x} when it was claimed in AttributeList {:?}",
                                    attr, attribute_list
                                ),
                                ATTRIBUTE_LIST_REF,
                            );
                        }
                        ProbeVerdict::Failed(e) => {
                            problems.error(
                                RuleCategory::GlobalAttributes,
                                ProblemKind::Reconciliation,
                                location,
                                format!(
                                    "Did not find attribute 0x{:08x} when it was claimed in AttributeList {:?} ({})",
                                    attr, attribute_list, e
                                ),
                                ATTRIBUTE_LIST_REF,
                            );

                            if !matches!(e, ProbeError::Status(_)) {
                                error!("Probe of {} failed: {}", req, e);
                                problems.error(
                                    RuleCategory::GlobalAttributes,
                                    ProblemKind::Probe,
                                    location,
                                    format!("Write-only probe failed: {}", e),
                                    ATTRIBUTE_LIST_REF,
                                );
                            }
                        }
                    }
                }
                Some(AttrValue::Failure(status)) if !config.is_decode_failure_exempt(cluster.id) => {
                    problems.error(
                        RuleCategory::GlobalAttributes,
                        ProblemKind::Reconciliation,
                        location,
                        format!(
                            "Found a failure to read/decode attribute 0x{:08x} when it was claimed as supported in AttributeList: {:?}",
                            attr, status
                        ),
                        ATTRIBUTE_LIST_REF,
                    );
                }
                Some(_) => (),
            }
        }

        for attr in cluster.attr_ids().filter(|attr| !declared.contains(attr)) {
            problems.error(
                RuleCategory::GlobalAttributes,
                ProblemKind::Reconciliation,
                Location::attr(ep, cluster.id, attr),
                "Found attribute not listed in attribute list",
                ATTRIBUTE_LIST_REF,
            );
        }
    }
}

/// Every attribute, command and cluster ID is in a range the device may use.
pub fn check_identifier_ranges(
    snapshot: &Snapshot,
    catalog: &Catalog,
    config: &ValidationConfig,
    problems: &mut Problems,
) {
    for (ep, cluster) in clusters(snapshot) {
        let attrs = cluster.attribute_list().unwrap_or_default();
        check_attr_ids(ep, cluster.id, &attrs, catalog, config, problems);

        for list in [CommandList::Accepted, CommandList::Generated] {
            let cmds = cluster.id_list(list.attr()).unwrap_or_default();
            check_cmd_ids(ep, cluster.id, &cmds, list, catalog, config, problems);
        }
    }

    for endpoint in snapshot.endpoints() {
        for cluster in endpoint.cluster_ids() {
            check_cluster_id(endpoint.id, cluster, catalog, config, problems);
        }
    }
}

fn range_error(problems: &mut Problems, location: Location, message: String, reference: &'static str) {
    problems.error(
        RuleCategory::IdentifierRanges,
        ProblemKind::Range,
        location,
        message,
        reference,
    );
}

fn test_vendor_note(prefix: u16) -> &'static str {
    if ids::is_test_vendor(prefix) {
        " (Test Vendor)"
    } else {
        ""
    }
}

fn check_attr_ids(
    ep: EndptId,
    cluster: ClusterId,
    attrs: &[AttrId],
    catalog: &Catalog,
    config: &ValidationConfig,
    problems: &mut Problems,
) {
    let known = catalog.cluster(cluster);
    let unique = attrs.iter().copied().collect::<BTreeSet<_>>();

    for &attr in &unique {
        let location = Location::attr(ep, cluster, attr);

        match ids::classify_attr(attr) {
            IdRange::Global if !is_allowed_global(attr) => range_error(
                problems,
                location,
                format!("Unexpected global attribute 0x{:04x} in cluster 0x{:08x}", attr, cluster),
                GLOBAL_ELEMENTS_REF,
            ),
            IdRange::Standard => {
                if let Some(spec) = known.filter(|spec| !spec.attributes.contains(&attr)) {
                    problems.error(
                        RuleCategory::IdentifierRanges,
                        ProblemKind::Reconciliation,
                        location,
                        format!(
                            "Unexpected standard attribute 0x{:04x} in cluster 0x{:08x} ({})",
                            attr, cluster, spec.name
                        ),
                        CLUSTER_REF,
                    );
                }
            }
            IdRange::Undefined => range_error(
                problems,
                location,
                format!("Attribute in undefined range 0x{:04x} in cluster 0x{:08x}", attr, cluster),
                CLUSTER_REF,
            ),
            IdRange::Mei => match ids::attr_mei_suffix(attr) {
                Err(SuffixFault::Undefined) => range_error(
                    problems,
                    location,
                    format!(
                        "Manufacturer attribute in undefined range 0x{:08x} in cluster 0x{:08x}",
                        attr, cluster
                    ),
                    CLUSTER_REF,
                ),
                Err(SuffixFault::Global) => range_error(
                    problems,
                    location,
                    format!(
                        "Manufacturer attribute in global range 0x{:08x} in cluster 0x{:08x}",
                        attr, cluster
                    ),
                    CLUSTER_REF,
                ),
                Ok(()) => (),
            },
            IdRange::Global => (),
        }

        let prefix = ids::vendor_prefix(attr);
        if !ids::is_allowed_prefix(prefix, config.allow_test_vendor) {
            range_error(
                problems,
                location,
                format!(
                    "Attribute 0x{:08x} with bad prefix 0x{:04x} in cluster 0x{:08x}{}",
                    attr,
                    prefix,
                    cluster,
                    test_vendor_note(prefix)
                ),
                MEI_REF,
            );
        }
    }
}

/// The two command lists of a cluster.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CommandList {
    Accepted,
    Generated,
}

impl CommandList {
    const fn attr(self) -> GlobalElements {
        match self {
            Self::Accepted => GlobalElements::AcceptedCommandList,
            Self::Generated => GlobalElements::GeneratedCommandList,
        }
    }

    fn allowed(self, spec: &ClusterSpec) -> &BTreeSet<CmdId> {
        match self {
            Self::Accepted => &spec.accepted_commands,
            Self::Generated => &spec.generated_commands,
        }
    }
}

impl fmt::Display for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::Generated => write!(f, "generated"),
        }
    }
}

fn check_cmd_ids(
    ep: EndptId,
    cluster: ClusterId,
    cmds: &[CmdId],
    list: CommandList,
    catalog: &Catalog,
    config: &ValidationConfig,
    problems: &mut Problems,
) {
    let allowed = catalog.cluster(cluster).map(|spec| list.allowed(spec));
    let unique = cmds.iter().copied().collect::<BTreeSet<_>>();

    for &cmd in &unique {
        let location = Location::cmd(ep, cluster, cmd);

        match ids::classify_cmd(cmd) {
            IdRange::Standard => {
                if let Some(allowed) = allowed.filter(|allowed| !allowed.contains(&cmd)) {
                    problems.error(
                        RuleCategory::IdentifierRanges,
                        ProblemKind::Reconciliation,
                        location,
                        format!(
                            "Unexpected {} command 0x{:02x} in cluster 0x{:08x} allowed: {:?}",
                            list, cmd, cluster, allowed
                        ),
                        CLUSTER_REF,
                    );
                }
            }
            IdRange::Mei if !ids::cmd_mei_suffix_ok(cmd) => range_error(
                problems,
                location,
                format!(
                    "Manufacturer command in the undefined suffix range 0x{:08x} in cluster 0x{:08x}",
                    cmd, cluster
                ),
                MEI_REF,
            ),
            _ => (),
        }

        let prefix = ids::vendor_prefix(cmd);
        if !ids::is_allowed_prefix(prefix, config.allow_test_vendor) {
            range_error(
                problems,
                location,
                format!(
                    "Command 0x{:08x} with bad prefix 0x{:04x} in cluster 0x{:08x}{}",
                    cmd,
                    prefix,
                    cluster,
                    test_vendor_note(prefix)
                ),
                MEI_REF,
            );
        }
    }
}

fn check_cluster_id(
    ep: EndptId,
    cluster: ClusterId,
    catalog: &Catalog,
    config: &ValidationConfig,
    problems: &mut Problems,
) {
    let location = Location::cluster(ep, cluster);

    let prefix = ids::vendor_prefix(cluster);
    if !ids::is_allowed_prefix(prefix, config.allow_test_vendor) {
        range_error(
            problems,
            location,
            format!(
                "Cluster 0x{:08x} with bad prefix 0x{:04x}{}",
                cluster,
                prefix,
                test_vendor_note(prefix)
            ),
            MEI_REF,
        );
    }

    match ids::classify_cluster(cluster) {
        IdRange::Mei if !ids::cluster_mei_suffix_ok(cluster) => range_error(
            problems,
            location,
            format!("MEI cluster with an out of range suffix 0x{:08x}", cluster),
            MEI_REF,
        ),
        IdRange::Standard if !catalog.is_known_cluster(cluster) => range_error(
            problems,
            location,
            format!("Unknown cluster ID in the standard range 0x{:04x}", cluster),
            MEI_REF,
        ),
        _ => (),
    }
}

/// The `FeatureMap` of every known cluster only sets bits the cluster defines.
pub fn check_feature_maps(snapshot: &Snapshot, catalog: &Catalog, problems: &mut Problems) {
    for (ep, cluster) in clusters(snapshot) {
        let Some(spec) = catalog.cluster(cluster.id) else {
            continue;
        };

        let Some(feature_map) = cluster.feature_map() else {
            continue;
        };

        let extras = feature_map & !(spec.feature_mask as u64);
        if extras != 0 {
            problems.error(
                RuleCategory::GlobalAttributes,
                ProblemKind::Range,
                Location::attr(ep, cluster.id, GlobalElements::FeatureMap.id()),
                format!(
                    "Standard cluster 0x{:04x} ({}) with unknown feature bits 0x{:02x}",
                    cluster.id, spec.name, extras
                ),
                FEATURE_MAP_REF,
            );
        }
    }
}

fn has_invalid_utf8(value: &AttrValue) -> bool {
    match value {
        AttrValue::Str(bytes) => core::str::from_utf8(bytes).is_err(),
        AttrValue::List(items) => items.iter().any(has_invalid_utf8),
        AttrValue::Struct(fields) => fields.iter().any(|(_, v)| has_invalid_utf8(v)),
        _ => false,
    }
}

/// Every character string, at any nesting depth, is valid UTF-8.
pub fn check_string_encoding(snapshot: &Snapshot, problems: &mut Problems) {
    for (ep, cluster) in clusters(snapshot) {
        for (attr, value) in cluster.attrs() {
            if has_invalid_utf8(value) {
                problems.error(
                    RuleCategory::StringEncoding,
                    ProblemKind::Range,
                    Location::attr(ep, cluster.id, attr),
                    format!("Attribute 0x{:08x} is invalid UTF-8", attr),
                    STRING_REF,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use embassy_futures::block_on;

    use crate::error::{ErrorCode, IMStatusCode};
    use crate::snapshot::Endpoint;

    use super::*;

    const ON_OFF: ClusterId = 0x0006;

    struct Scripted {
        answer: fn() -> Result<AttrValue, ProbeError>,
        requests: RefCell<Vec<AttrId>>,
    }

    impl Scripted {
        fn new(answer: fn() -> Result<AttrValue, ProbeError>) -> Self {
            Self {
                answer,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl AttrProbe for Scripted {
        async fn read(&self, req: &ProbeRequest) -> Result<AttrValue, ProbeError> {
            self.requests.borrow_mut().push(req.attr);
            (self.answer)()
        }
    }

    fn single(cluster: Cluster) -> Snapshot {
        Snapshot::from_endpoints([Endpoint::new(1).with(cluster)]).unwrap()
    }

    /// A cluster claiming attributes 1, 2 and 3 but reporting only 1 and 2.
    fn with_hidden_attr() -> Snapshot {
        let cluster = Cluster::new(ON_OFF)
            .with(1, AttrValue::UInt(1))
            .with(2, AttrValue::UInt(2))
            .with_globals(4, 0, &[], &[])
            .with(
                GlobalElements::AttributeList.id(),
                AttrValue::uint_list([1u32, 2, 3, 0xFFF8, 0xFFF9, 0xFFFB, 0xFFFC, 0xFFFD]),
            );

        single(cluster)
    }

    fn reconcile(snapshot: &Snapshot, probe: &Scripted) -> Problems {
        let mut problems = Problems::new();
        block_on(check_attribute_lists(
            snapshot,
            &ValidationConfig::production(),
            probe,
            &mut problems,
        ));
        problems
    }

    #[test]
    fn constraints() {
        let rev = Constraint::IntRange { min: 1, max: 0xFFFF };
        assert!(rev.check(&AttrValue::UInt(4)).is_ok());
        assert_eq!(
            rev.check(&AttrValue::UInt(0)),
            Err(ConstraintViolation::OutOfRange {
                value: 0,
                min: 1,
                max: 0xFFFF
            })
        );
        assert_eq!(
            rev.check(&AttrValue::str("4")),
            Err(ConstraintViolation::NotAnInt("string"))
        );

        let list = REQUIRED_GLOBALS[2].constraints[0];
        assert_eq!(
            list.check(&AttrValue::List(vec![])),
            Err(ConstraintViolation::TooShort { len: 0, min: 1 })
        );
        assert_eq!(
            list.check(&AttrValue::List(vec![AttrValue::Int(-1)])),
            Err(ConstraintViolation::ElementOutOfRange { index: 0, value: -1 })
        );

        assert_eq!(
            Constraint::NoDuplicates.check(&AttrValue::uint_list([1u32, 2, 1])),
            Err(ConstraintViolation::Duplicate { index: 2 })
        );
    }

    #[test]
    fn missing_global_does_not_block_others() {
        let cluster = Cluster::new(ON_OFF)
            .with(GlobalElements::ClusterRevision.id(), AttrValue::UInt(0))
            .with(GlobalElements::FeatureMap.id(), AttrValue::UInt(0));
        let mut problems = Problems::new();
        check_mandatory_globals(&single(cluster), &mut problems);

        let kinds = problems.all().iter().map(|p| p.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ProblemKind::Range,
                ProblemKind::Reconciliation,
                ProblemKind::Reconciliation,
                ProblemKind::Reconciliation
            ]
        );
    }

    #[test]
    fn write_only_attribute_is_accepted() {
        let probe = Scripted::new(|| Err(IMStatusCode::UnsupportedRead.into()));
        let problems = reconcile(&with_hidden_attr(), &probe);

        assert!(problems.is_empty());
        assert_eq!(*probe.requests.borrow(), vec![3]);
    }

    #[test]
    fn repeated_declaration_is_reconciled_once() {
        let snapshot = single(
            Cluster::new(ON_OFF)
                .with(1, AttrValue::UInt(1))
                .with_globals(4, 0, &[], &[])
                .with(
                    GlobalElements::AttributeList.id(),
                    AttrValue::uint_list([3u32, 1, 3, 0xFFF8, 0xFFF9, 0xFFFB, 0xFFFC, 0xFFFD, 3]),
                ),
        );
        let probe = Scripted::new(|| Ok(AttrValue::UInt(3)));
        let problems = reconcile(&snapshot, &probe);

        assert_eq!(*probe.requests.borrow(), vec![3]);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems.all()[0].location, Location::attr(1, ON_OFF, 3));
    }

    #[test]
    fn readable_hidden_attribute_is_a_violation() {
        let probe = Scripted::new(|| Ok(AttrValue::UInt(3)));
        let problems = reconcile(&with_hidden_attr(), &probe);

        assert_eq!(problems.len(), 1);
        assert_eq!(problems.all()[0].kind, ProblemKind::Reconciliation);
        assert_eq!(problems.all()[0].location, Location::attr(1, ON_OFF, 3));
    }

    #[test]
    fn transport_failure_is_also_a_probe_problem() {
        let probe = Scripted::new(|| Err(ErrorCode::Transport.into()));
        let problems = reconcile(&with_hidden_attr(), &probe);

        let kinds = problems.all().iter().map(|p| p.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![ProblemKind::Reconciliation, ProblemKind::Probe]);
    }

    #[test]
    fn unlisted_and_undecodable_attributes() {
        let cluster = Cluster::new(ON_OFF)
            .with(0, AttrValue::Failure(IMStatusCode::InvalidDataType))
            .with_globals(4, 0, &[], &[])
            .with(0x4000, AttrValue::Bool(true));
        let probe = Scripted::new(|| Ok(AttrValue::Null));
        let problems = reconcile(&single(cluster), &probe);

        let locations = problems
            .all()
            .iter()
            .map(|p| p.location.attr)
            .collect::<Vec<_>>();
        assert_eq!(locations, vec![Some(0), Some(0x4000)]);
        assert!(probe.requests.borrow().is_empty());
    }

    #[test]
    fn decode_failure_exempt_cluster() {
        let cluster = Cluster::new(crate::catalog::CLUSTER_UNIT_TESTING)
            .with(0, AttrValue::Failure(IMStatusCode::InvalidDataType))
            .with_globals(1, 0, &[], &[]);
        let probe = Scripted::new(|| Ok(AttrValue::Null));

        assert!(reconcile(&single(cluster), &probe).is_empty());
    }

    #[test]
    fn identifier_ranges() {
        let catalog = Catalog::new().with_cluster(
            ClusterSpec::new(ON_OFF, "On/Off")
                .attributes(&[0, 0x4000])
                .accepted_commands(&[0, 1, 2]),
        );

        let cluster = Cluster::new(ON_OFF)
            .with(0, AttrValue::Bool(true))
            .with(0x0005, AttrValue::Bool(true))
            .with(0x5000, AttrValue::Bool(true))
            .with(0xFFF1_0001, AttrValue::Bool(true))
            .with(0x1234_F000, AttrValue::Bool(true))
            .with(0xFFF0, AttrValue::Bool(true))
            .with_globals(4, 0, &[0, 7, 0x1234_0100], &[]);
        let snapshot = Snapshot::from_endpoints([Endpoint::new(1)
            .with(cluster)
            .with(Cluster::new(0xFFF2_0000).with_globals(1, 0, &[], &[]))
            .with(Cluster::new(0x0000_7777).with_globals(1, 0, &[], &[]))])
        .unwrap();

        let mut production = Problems::new();
        check_identifier_ranges(&snapshot, &catalog, &ValidationConfig::production(), &mut production);

        let mut ci = Problems::new();
        check_identifier_ranges(&snapshot, &catalog, &ValidationConfig::ci(), &mut ci);

        // attrs: 0x0005 unknown, 0x5000 undefined, 0xFFF0 global, 0x1234_F000 global suffix,
        //        0xFFF1_0001 bad prefix (production only)
        // cmds: 7 unknown, 0x1234_0100 bad suffix
        // clusters: 0xFFF2_0000 bad prefix (production only) and bad suffix, 0x7777 unknown
        assert_eq!(production.len(), 10);
        assert_eq!(ci.len(), 8);
        assert!(production
            .all()
            .iter()
            .any(|p| p.message.ends_with("(Test Vendor)")));
        assert!(ci.all().iter().all(|p| !p.message.contains("bad prefix")));
    }

    #[test]
    fn command_lists_are_checked_against_their_own_catalog_set() {
        let catalog = Catalog::new().with_cluster(
            ClusterSpec::new(ON_OFF, "On/Off")
                .accepted_commands(&[0, 1])
                .generated_commands(&[0x40]),
        );
        let snapshot = single(Cluster::new(ON_OFF).with_globals(4, 0, &[0, 0x40], &[1, 0x40]));

        let mut problems = Problems::new();
        check_identifier_ranges(&snapshot, &catalog, &ValidationConfig::production(), &mut problems);

        let found = problems
            .all()
            .iter()
            .map(|p| (p.location, p.message.split(' ').nth(1)))
            .collect::<Vec<_>>();
        assert_eq!(
            found,
            vec![
                (Location::cmd(1, ON_OFF, 0x40), Some("accepted")),
                (Location::cmd(1, ON_OFF, 1), Some("generated")),
            ]
        );
    }

    #[test]
    fn feature_map_extras() {
        let catalog = Catalog::new().with_cluster(ClusterSpec::new(ON_OFF, "On/Off").features(0x07));
        let snapshot = single(Cluster::new(ON_OFF).with_globals(4, 0x0F, &[], &[]));

        let mut problems = Problems::new();
        check_feature_maps(&snapshot, &catalog, &mut problems);
        assert_eq!(problems.len(), 1);
        assert!(problems.all()[0].message.contains("0x08"));

        let snapshot = single(Cluster::new(0xFFF1_FC01).with_globals(1, 0xFF, &[], &[]));
        let mut problems = Problems::new();
        check_feature_maps(&snapshot, &catalog, &mut problems);
        assert!(problems.is_empty());
    }

    #[test]
    fn invalid_utf8_anywhere() {
        let cluster = Cluster::new(0x0028)
            .with(1, AttrValue::str("Acme"))
            .with(2, AttrValue::Str(vec![0x41, 0xFF]))
            .with(
                3,
                AttrValue::List(vec![AttrValue::Struct(vec![(
                    0,
                    AttrValue::Str(vec![0xC3, 0x28]),
                )])]),
            )
            .with(4, AttrValue::Octets(vec![0xFF]));

        let mut problems = Problems::new();
        check_string_encoding(&single(cluster), &mut problems);

        let attrs = problems
            .all()
            .iter()
            .map(|p| p.location.attr)
            .collect::<Vec<_>>();
        assert_eq!(attrs, vec![Some(2), Some(3)]);
    }
}
