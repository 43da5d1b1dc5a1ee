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

//! Device composition conformance checks for Matter (Smart-Home) devices
//!
//! This crate takes a snapshot of everything a device reported in a wildcard read
//! and checks it, rule by rule, against the structural requirements of the Matter
//! data model: identifier ranges, endpoint composition topology, device type and
//! tag list rules, and the completeness of every cluster's global attributes.
//!
//! Checks never stop at the first violation; every finding is collected into
//! [`Problems`], and each [`RuleCategory`] passes or fails on its own.
//!
//! # Examples
//! ```
//! use rs_matter_conformance::{
//!     Catalog, DescriptorBuilder, Endpoint, NoProbe, Quiet, RuleCategory, Snapshot,
//!     ValidationConfig, Validator,
//! };
//!
//! let light = Endpoint::new(1).with(
//!     DescriptorBuilder::new()
//!         .device_type(0x0100, 3)
//!         .build(),
//! );
//!
//! let snapshot = Snapshot::from_endpoints([light]).unwrap();
//! let catalog = Catalog::new();
//! let config = ValidationConfig::ci();
//!
//! let mut validator = Validator::new(&snapshot, &catalog, &config);
//! let report = validator.run_blocking(NoProbe, &mut Quiet);
//!
//! // No endpoint 0
//! assert!(!report.verdict(RuleCategory::RootNode));
//! assert!(report.verdict(RuleCategory::StringEncoding));
//! ```

#![allow(async_fn_in_trait)]

pub mod catalog;
pub mod completeness;
pub mod config;
pub mod device_types;
pub mod error;
pub mod ids;
pub mod power;
pub mod probe;
pub mod problems;
pub mod snapshot;
pub mod topology;
pub mod validator;

pub use catalog::{Catalog, ClusterSpec};
pub use config::ValidationConfig;
pub use error::{Error, ErrorCode, IMStatusCode};
pub use probe::{AttrProbe, NoProbe, ProbeError, ProbeRequest};
pub use problems::{Location, Problem, ProblemKind, Problems, RuleCategory, Severity};
pub use snapshot::{AttrValue, Cluster, DescriptorBuilder, DeviceType, Endpoint, Snapshot, Tag};
pub use validator::{Quiet, Report, StepReporter, Validator};
