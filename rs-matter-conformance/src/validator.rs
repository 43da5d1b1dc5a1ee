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

use core::fmt;

use log::info;
use strum::IntoEnumIterator;

use crate::catalog::Catalog;
use crate::completeness;
use crate::config::ValidationConfig;
use crate::device_types;
use crate::power;
use crate::probe::AttrProbe;
use crate::problems::{Problem, Problems, RuleCategory};
use crate::snapshot::Snapshot;
use crate::topology;

/// Receives a short description of each step as the validator runs it.
pub trait StepReporter {
    fn step(&mut self, category: RuleCategory, description: &str);
}

impl<F> StepReporter for F
where
    F: FnMut(RuleCategory, &str),
{
    fn step(&mut self, category: RuleCategory, description: &str) {
        self(category, description)
    }
}

/// A reporter which drops every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quiet;

impl StepReporter for Quiet {
    fn step(&mut self, _category: RuleCategory, _description: &str) {}
}

/// The outcome of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    problems: Problems,
}

impl Report {
    pub const fn new(problems: Problems) -> Self {
        Self { problems }
    }

    /// `true` if the category recorded no errors.
    pub fn verdict(&self, category: RuleCategory) -> bool {
        self.problems.passed(category)
    }

    /// The verdict of every category, in category order.
    pub fn verdicts(&self) -> Vec<(RuleCategory, bool)> {
        RuleCategory::iter()
            .map(|category| (category, self.verdict(category)))
            .collect()
    }

    /// `true` if every category passed.
    pub fn passed(&self) -> bool {
        !self.problems.has_problems(None)
    }

    pub fn problems(&self) -> &Problems {
        &self.problems
    }

    /// The findings ordered by location, for stable output.
    pub fn sorted(&self) -> Vec<&Problem> {
        self.problems.sorted()
    }

    pub fn into_problems(self) -> Problems {
        self.problems
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (category, passed) in self.verdicts() {
            writeln!(f, "{}: {}", category, if passed { "PASS" } else { "FAIL" })?;
        }

        for problem in self.sorted() {
            writeln!(f, "{}", problem)?;
        }

        Ok(())
    }
}

/// Runs the rule categories over one snapshot.
///
/// Each `check_*` method evaluates a single category and may be called on its
/// own; `run` evaluates all of them in a fixed order.
pub struct Validator<'a> {
    snapshot: &'a Snapshot,
    catalog: &'a Catalog,
    config: &'a ValidationConfig,
    problems: Problems,
}

impl<'a> Validator<'a> {
    pub const fn new(snapshot: &'a Snapshot, catalog: &'a Catalog, config: &'a ValidationConfig) -> Self {
        Self {
            snapshot,
            catalog,
            config,
            problems: Problems::new(),
        }
    }

    pub fn check_root_node(&mut self) {
        device_types::check_root_node(self.snapshot, self.catalog, &mut self.problems);
    }

    pub fn check_descriptor_presence(&mut self) {
        device_types::check_descriptor_presence(self.snapshot, &mut self.problems);
    }

    pub async fn check_global_attributes<P>(&mut self, probe: P)
    where
        P: AttrProbe,
    {
        completeness::check_mandatory_globals(self.snapshot, &mut self.problems);
        completeness::check_attribute_lists(self.snapshot, self.config, &probe, &mut self.problems)
            .await;
        completeness::check_feature_maps(self.snapshot, self.catalog, &mut self.problems);
    }

    pub fn check_identifier_ranges(&mut self) {
        completeness::check_identifier_ranges(
            self.snapshot,
            self.catalog,
            self.config,
            &mut self.problems,
        );
    }

    pub fn check_string_encoding(&mut self) {
        completeness::check_string_encoding(self.snapshot, &mut self.problems);
    }

    pub fn check_parts_list(&mut self) {
        topology::check_parts_list(self.snapshot, self.catalog, &mut self.problems);
    }

    pub fn check_power_sources(&mut self) {
        power::check_power_sources(self.snapshot, &mut self.problems);
    }

    pub fn check_tag_lists(&mut self) {
        device_types::check_tag_lists(self.snapshot, self.catalog, &mut self.problems);
    }

    pub fn check_device_composition(&mut self) {
        device_types::check_device_composition(self.snapshot, self.catalog, &mut self.problems);
    }

    pub fn problems(&self) -> &Problems {
        &self.problems
    }

    /// Hand out the findings collected so far, leaving the validator empty.
    pub fn take_report(&mut self) -> Report {
        Report::new(core::mem::take(&mut self.problems))
    }

    /// Run every rule category and return the findings.
    ///
    /// The validator starts from a clean slate, so running it again over the
    /// same snapshot yields the same report.
    pub async fn run<P, R>(&mut self, probe: P, reporter: &mut R) -> Report
    where
        P: AttrProbe,
        R: StepReporter,
    {
        self.problems = Problems::new();

        let mut step = |category: RuleCategory, description: &str| {
            info!("{}: {}", category, description);
            reporter.step(category, description);
        };

        step(RuleCategory::RootNode, "Endpoint 0 carries the Root Node device type");
        self.check_root_node();

        step(RuleCategory::DescriptorPresence, "Every endpoint hosts a Descriptor cluster");
        self.check_descriptor_presence();

        step(
            RuleCategory::GlobalAttributes,
            "Global attributes are present, in range and match the observed attributes",
        );
        self.check_global_attributes(probe).await;

        step(RuleCategory::IdentifierRanges, "Attribute, command and cluster IDs are in range");
        self.check_identifier_ranges();

        step(RuleCategory::StringEncoding, "Character strings are valid UTF-8");
        self.check_string_encoding();

        step(RuleCategory::PartsList, "PartsList topology is well formed");
        self.check_parts_list();

        step(RuleCategory::PowerSource, "Power Source EndpointList is consistent");
        self.check_power_sources();

        step(RuleCategory::TagList, "Sibling endpoints are disambiguated by TagList");
        self.check_tag_lists();

        step(RuleCategory::DeviceComposition, "Descriptor contents conform");
        self.check_device_composition();

        let report = self.take_report();
        info!(
            "Validation done: {} finding(s), {}",
            report.problems().len(),
            if report.passed() { "PASS" } else { "FAIL" }
        );

        report
    }

    /// Blocking variant of `run`, for callers without an executor.
    pub fn run_blocking<P, R>(&mut self, probe: P, reporter: &mut R) -> Report
    where
        P: AttrProbe,
        R: StepReporter,
    {
        embassy_futures::block_on(self.run(probe, reporter))
    }
}
