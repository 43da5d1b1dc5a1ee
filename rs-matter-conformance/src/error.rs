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

/// Error codes for the faults that can occur while assembling a snapshot or a catalog,
/// or while talking to the probe collaborator.
///
/// Conformance findings are never errors; they are recorded as `Problem`s instead.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorCode {
    /// An endpoint or a cluster was registered twice
    Duplicate,
    /// A value does not have the shape its attribute requires
    InvalidDataType,
    Timeout,
    Transport,
    Utf8Fail,
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
}

impl Error {
    pub const fn new(code: ErrorCode) -> Self {
        Self { code }
    }

    pub const fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<core::str::Utf8Error> for Error {
    fn from(_e: core::str::Utf8Error) -> Self {
        Self::new(ErrorCode::Utf8Fail)
    }
}

impl From<core::num::TryFromIntError> for Error {
    fn from(_e: core::num::TryFromIntError) -> Self {
        Self::new(ErrorCode::InvalidDataType)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error::{}", self)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code())
    }
}

impl std::error::Error for Error {}

/// The Interaction Model status codes a device can answer a read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IMStatusCode {
    Success = 0,
    Failure = 1,
    InvalidSubscription = 0x7D,
    UnsupportedAccess = 0x7E,
    UnsupportedEndpoint = 0x7F,
    InvalidAction = 0x80,
    UnsupportedCommand = 0x81,
    InvalidCommand = 0x85,
    UnsupportedAttribute = 0x86,
    ConstraintError = 0x87,
    UnsupportedWrite = 0x88,
    ResourceExhausted = 0x89,
    NotFound = 0x8b,
    UnreportableAttribute = 0x8c,
    InvalidDataType = 0x8d,
    UnsupportedRead = 0x8f,
    DataVersionMismatch = 0x92,
    Timeout = 0x94,
    Busy = 0x9c,
    UnsupportedCluster = 0xc3,
    NoUpstreamSubscription = 0xc5,
    NeedsTimedInteraction = 0xc6,
    UnsupportedEvent = 0xc7,
    PathsExhausted = 0xc8,
    TimedRequestMisMatch = 0xc9,
    FailSafeRequired = 0xca,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_the_code() {
        let err = Error::from(u8::try_from(300u32).unwrap_err());
        assert_eq!(err.code(), ErrorCode::InvalidDataType);

        let err = Error::from(core::str::from_utf8(&[0xC3, 0x28]).unwrap_err());
        assert_eq!(err.code(), ErrorCode::Utf8Fail);

        assert_eq!(format!("{}", Error::from(ErrorCode::Duplicate)), "Duplicate");
        assert_eq!(format!("{:?}", Error::new(ErrorCode::Timeout)), "Error::Timeout");
    }
}
