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

//! The live re-read of a single attribute, used to tell write-only attributes
//! apart from attributes which are declared but missing.

use core::fmt;
use core::time::Duration;

use crate::error::{Error, ErrorCode, IMStatusCode};
use crate::ids::{AttrId, ClusterId, EndptId};
use crate::snapshot::AttrValue;

/// The shape the probed value is expected to have.
///
/// The probe only needs enough type information to issue the read; the value
/// itself is never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueShape {
    #[default]
    UInt,
    Any,
}

/// One concrete attribute path to re-read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub endpoint: EndptId,
    pub cluster: ClusterId,
    pub attr: AttrId,
    pub shape: ValueShape,
    /// The deadline for the read; the engine does not enforce it, the `AttrProbe`
    /// implementation does
    pub timeout: Duration,
}

impl ProbeRequest {
    pub const fn new(endpoint: EndptId, cluster: ClusterId, attr: AttrId, timeout: Duration) -> Self {
        Self {
            endpoint,
            cluster,
            attr,
            shape: ValueShape::UInt,
            timeout,
        }
    }
}

impl fmt::Display for ProbeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ep {} cluster 0x{:08x} attr 0x{:08x}",
            self.endpoint, self.cluster, self.attr
        )
    }
}

/// Why a probe did not produce a value.
#[derive(Debug)]
pub enum ProbeError {
    /// The device answered with an Interaction Model status
    Status(IMStatusCode),
    /// No answer within the request's timeout
    Timeout,
    /// The read could not be performed at all
    Transport(Error),
}

impl ProbeError {
    /// Return `true` if this is the status of an attribute which cannot be read by design.
    pub fn is_unsupported_read(&self) -> bool {
        matches!(self, Self::Status(IMStatusCode::UnsupportedRead))
    }
}

impl From<Error> for ProbeError {
    fn from(e: Error) -> Self {
        match e.code() {
            ErrorCode::Timeout => Self::Timeout,
            _ => Self::Transport(e),
        }
    }
}

impl From<ErrorCode> for ProbeError {
    fn from(code: ErrorCode) -> Self {
        Self::from(Error::new(code))
    }
}

impl From<IMStatusCode> for ProbeError {
    fn from(status: IMStatusCode) -> Self {
        Self::Status(status)
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "status {:?}", status),
            Self::Timeout => write!(f, "timeout"),
            Self::Transport(e) => write!(f, "transport failure: {}", e),
        }
    }
}

impl std::error::Error for ProbeError {}

/// The collaborator performing live attribute reads against the device.
pub trait AttrProbe {
    /// Read a single attribute.
    ///
    /// Implementations must give up after `req.timeout` and return
    /// `ProbeError::Timeout`; the validator awaits the read as is.
    async fn read(&self, req: &ProbeRequest) -> Result<AttrValue, ProbeError>;
}

impl<T> AttrProbe for &T
where
    T: AttrProbe,
{
    async fn read(&self, req: &ProbeRequest) -> Result<AttrValue, ProbeError> {
        (**self).read(req).await
    }
}

impl<T> AttrProbe for &mut T
where
    T: AttrProbe,
{
    async fn read(&self, req: &ProbeRequest) -> Result<AttrValue, ProbeError> {
        (**self).read(req).await
    }
}

/// A probe for offline runs: every read fails at the transport level.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl AttrProbe for NoProbe {
    async fn read(&self, _req: &ProbeRequest) -> Result<AttrValue, ProbeError> {
        Err(ErrorCode::Transport.into())
    }
}

/// How the outcome of a probe reads.
#[derive(Debug)]
pub enum ProbeVerdict {
    /// The attribute rejected the read with `UnsupportedRead`
    WriteOnly,
    /// The attribute could be read, so it should have been in the snapshot
    Readable(AttrValue),
    /// The probe failed for any other reason
    Failed(ProbeError),
}

impl ProbeVerdict {
    pub fn classify(result: Result<AttrValue, ProbeError>) -> Self {
        match result {
            Ok(AttrValue::Failure(IMStatusCode::UnsupportedRead)) => Self::WriteOnly,
            Ok(AttrValue::Failure(status)) => Self::Failed(ProbeError::Status(status)),
            Ok(value) => Self::Readable(value),
            Err(e) if e.is_unsupported_read() => Self::WriteOnly,
            Err(e) => Self::Failed(e),
        }
    }

    pub fn is_write_only(&self) -> bool {
        matches!(self, Self::WriteOnly)
    }
}
