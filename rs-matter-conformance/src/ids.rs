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

//! Classification of 32-bit Matter identifiers (clusters, attributes, commands)
//! into the standard, global, manufacturer-extensible (MEI) and test-vendor spaces.
//!
//! All functions here are pure and total.

pub type EndptId = u16;
pub type ClusterId = u32;
pub type AttrId = u32;
pub type CmdId = u32;
pub type DevTypeId = u32;

/// Largest attribute ID in the standard (cluster-scoped) range.
pub const ATTR_STANDARD_MAX: u32 = 0x0000_4FFF;
/// Largest command ID in the standard (cluster-scoped) range.
pub const CMD_STANDARD_MAX: u32 = 0x0000_00FF;
/// Smallest attribute ID in the global range.
pub const GLOBAL_RANGE_MIN: u32 = 0x0000_F000;
/// Smallest ID carrying a (non-zero) vendor prefix.
pub const MEI_RANGE_MIN: u32 = 0x0001_0000;

/// MEI cluster suffixes live in `0xFC00..=0xFFFE`.
pub const CLUSTER_MEI_SUFFIX_MIN: u16 = 0xFC00;
pub const CLUSTER_MEI_SUFFIX_MAX: u16 = 0xFFFE;

/// First prefix rejected when test vendors are not tolerated.
pub const BAD_PREFIX_MIN: u16 = 0xFFF1;
/// First prefix rejected when test vendors are tolerated (CI runs).
pub const BAD_PREFIX_MIN_TEST_VENDOR: u16 = 0xFFF5;

/// Test vendor IDs `0xFFF1..=0xFFF4`.
pub const TEST_VENDOR_MIN: u16 = 0xFFF1;
pub const TEST_VENDOR_MAX: u16 = 0xFFF4;

const SUFFIX_MASK: u32 = 0x0000_FFFF;

/// The range an identifier falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdRange {
    /// Cluster-scoped standard ID (prefix 0, suffix within the standard maximum)
    Standard,
    /// Global attribute ID (prefix 0, `0xF000..=0xFFFF`)
    Global,
    /// Prefix 0, but outside of any defined sub-range
    Undefined,
    /// Manufacturer-extensible ID (non-zero prefix)
    Mei,
}

/// Return the vendor prefix (the top 16 bits) of an identifier.
pub const fn vendor_prefix(id: u32) -> u16 {
    (id >> 16) as u16
}

/// Return the suffix (the low 16 bits) of an identifier.
pub const fn suffix(id: u32) -> u16 {
    (id & SUFFIX_MASK) as u16
}

/// Return `true` if the prefix belongs to one of the test vendors.
pub const fn is_test_vendor(prefix: u16) -> bool {
    prefix >= TEST_VENDOR_MIN && prefix <= TEST_VENDOR_MAX
}

/// Return the first rejected vendor prefix for the given context.
pub const fn bad_prefix_min(allow_test_vendor: bool) -> u16 {
    if allow_test_vendor {
        BAD_PREFIX_MIN_TEST_VENDOR
    } else {
        BAD_PREFIX_MIN
    }
}

/// Return `true` if IDs with this prefix may show up on a device.
///
/// In a CI context the test vendor prefixes are tolerated, because the
/// example applications use them.
pub const fn is_allowed_prefix(prefix: u16, allow_test_vendor: bool) -> bool {
    prefix < bad_prefix_min(allow_test_vendor)
}

/// Classify an attribute ID.
pub const fn classify_attr(id: AttrId) -> IdRange {
    if id >= MEI_RANGE_MIN {
        IdRange::Mei
    } else if id <= ATTR_STANDARD_MAX {
        IdRange::Standard
    } else if id >= GLOBAL_RANGE_MIN {
        IdRange::Global
    } else {
        IdRange::Undefined
    }
}

/// Classify a command ID.
///
/// Commands have no global range.
pub const fn classify_cmd(id: CmdId) -> IdRange {
    if id >= MEI_RANGE_MIN {
        IdRange::Mei
    } else if id <= CMD_STANDARD_MAX {
        IdRange::Standard
    } else {
        IdRange::Undefined
    }
}

/// Classify a cluster ID.
pub const fn classify_cluster(id: ClusterId) -> IdRange {
    if id >= MEI_RANGE_MIN {
        IdRange::Mei
    } else {
        IdRange::Standard
    }
}

/// Why the suffix of an MEI attribute ID is not acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixFault {
    /// Between the standard maximum and the global range
    Undefined,
    /// In the global range
    Global,
}

/// Check the suffix of an attribute ID in the MEI range.
///
/// IDs below the MEI range always pass.
pub const fn attr_mei_suffix(id: AttrId) -> Result<(), SuffixFault> {
    if id < MEI_RANGE_MIN {
        return Ok(());
    }

    let suffix = suffix(id) as u32;
    if suffix >= GLOBAL_RANGE_MIN {
        Err(SuffixFault::Global)
    } else if suffix > ATTR_STANDARD_MAX {
        Err(SuffixFault::Undefined)
    } else {
        Ok(())
    }
}

pub const fn attr_mei_suffix_ok(id: AttrId) -> bool {
    attr_mei_suffix(id).is_ok()
}

/// Return `true` unless the command ID is in the MEI range with a suffix
/// above the standard command maximum.
pub const fn cmd_mei_suffix_ok(id: CmdId) -> bool {
    id < MEI_RANGE_MIN || suffix(id) as u32 <= CMD_STANDARD_MAX
}

/// Return `true` unless the cluster ID is in the MEI range with a suffix
/// outside of `0xFC00..=0xFFFE`.
pub const fn cluster_mei_suffix_ok(id: ClusterId) -> bool {
    if id < MEI_RANGE_MIN {
        return true;
    }

    let suffix = suffix(id);
    suffix >= CLUSTER_MEI_SUFFIX_MIN && suffix <= CLUSTER_MEI_SUFFIX_MAX
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0x0000_0005, IdRange::Standard)]
    #[case(0x0000_4FFF, IdRange::Standard)]
    #[case(0x0000_5000, IdRange::Undefined)]
    #[case(0x0000_EFFF, IdRange::Undefined)]
    #[case(0x0000_FFFB, IdRange::Global)]
    #[case(0x0001_0000, IdRange::Mei)]
    #[case(0xFFF1_0001, IdRange::Mei)]
    fn attr_ranges(#[case] id: u32, #[case] expected: IdRange) {
        assert_eq!(classify_attr(id), expected);
    }

    #[rstest]
    #[case(0x0000_0000, IdRange::Standard)]
    #[case(0x0000_00FF, IdRange::Standard)]
    #[case(0x0000_0100, IdRange::Undefined)]
    #[case(0x0000_FFF9, IdRange::Undefined)]
    #[case(0x0001_0001, IdRange::Mei)]
    fn cmd_ranges(#[case] id: u32, #[case] expected: IdRange) {
        assert_eq!(classify_cmd(id), expected);
    }

    #[test]
    fn prefix_and_suffix() {
        assert_eq!(vendor_prefix(0xFFF2_0001), 0xFFF2);
        assert_eq!(suffix(0xFFF2_0001), 0x0001);
        assert_eq!(vendor_prefix(0x0000_0006), 0);
    }

    #[rstest]
    #[case(0x0000, false, true)]
    #[case(0x1234, false, true)]
    #[case(0xFFF0, false, true)]
    #[case(0xFFF1, false, false)]
    #[case(0xFFF2, false, false)]
    #[case(0xFFF2, true, true)]
    #[case(0xFFF4, true, true)]
    #[case(0xFFF5, true, false)]
    #[case(0xFFFF, true, false)]
    fn allowed_prefixes(#[case] prefix: u16, #[case] ci: bool, #[case] allowed: bool) {
        assert_eq!(is_allowed_prefix(prefix, ci), allowed);
    }

    #[test]
    fn test_vendor_range() {
        assert!(!is_test_vendor(0xFFF0));
        assert!(is_test_vendor(0xFFF1));
        assert!(is_test_vendor(0xFFF4));
        assert!(!is_test_vendor(0xFFF5));
    }

    #[test]
    fn attr_suffixes() {
        assert_eq!(attr_mei_suffix(0x0000_FFFB), Ok(()));
        assert_eq!(attr_mei_suffix(0x1234_0000), Ok(()));
        assert_eq!(attr_mei_suffix(0x1234_4FFF), Ok(()));
        assert_eq!(attr_mei_suffix(0x1234_5000), Err(SuffixFault::Undefined));
        assert_eq!(attr_mei_suffix(0x1234_F000), Err(SuffixFault::Global));
        assert_eq!(attr_mei_suffix(0x0001_FFFC), Err(SuffixFault::Global));
    }

    #[test]
    fn cmd_suffixes() {
        assert!(cmd_mei_suffix_ok(0x0000_0100));
        assert!(cmd_mei_suffix_ok(0x1234_00FF));
        assert!(!cmd_mei_suffix_ok(0x1234_0100));
    }

    #[test]
    fn cluster_suffixes() {
        assert_eq!(classify_cluster(0x0000_0006), IdRange::Standard);
        assert!(cluster_mei_suffix_ok(0x0000_0006));
        assert_eq!(classify_cluster(0x0001_FFFC), IdRange::Mei);
        assert!(cluster_mei_suffix_ok(0x0001_FFFC));
        assert!(cluster_mei_suffix_ok(0x0001_FC00));
        assert!(!cluster_mei_suffix_ok(0x0001_0000));
        assert!(!cluster_mei_suffix_ok(0x0001_FFFF));
    }
}
