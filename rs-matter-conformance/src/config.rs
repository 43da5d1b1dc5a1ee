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

use core::time::Duration;

use crate::catalog::CLUSTER_UNIT_TESTING;
use crate::ids::{self, ClusterId};

/// Default deadline of a single write-only probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The knobs of a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Tolerate the test vendor prefixes `0xFFF1..=0xFFF4` (CI runs against the example apps)
    pub allow_test_vendor: bool,
    pub probe_timeout: Duration,
    /// A cluster whose undecodable values are not reported
    pub decode_failure_exempt: Option<ClusterId>,
}

impl ValidationConfig {
    /// A certification run: test vendor IDs are rejected.
    pub const fn production() -> Self {
        Self {
            allow_test_vendor: false,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            decode_failure_exempt: Some(CLUSTER_UNIT_TESTING),
        }
    }

    /// A CI run: test vendor IDs are tolerated.
    pub const fn ci() -> Self {
        Self {
            allow_test_vendor: true,
            ..Self::production()
        }
    }

    pub const fn with_probe_timeout(self, probe_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            ..self
        }
    }

    pub const fn with_decode_failure_exempt(self, decode_failure_exempt: Option<ClusterId>) -> Self {
        Self {
            decode_failure_exempt,
            ..self
        }
    }

    /// The first vendor prefix rejected by this run.
    pub const fn bad_prefix_min(&self) -> u16 {
        ids::bad_prefix_min(self.allow_test_vendor)
    }

    pub fn is_decode_failure_exempt(&self, cluster: ClusterId) -> bool {
        self.decode_failure_exempt == Some(cluster)
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::production()
    }
}
