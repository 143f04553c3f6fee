//! Error type of the teectl module
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use edge::ecall::SBI_ERR_NOT_SUPPORTED;
use edge::errno;

/// Errors reported by the region allocator and the gateway
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No physical pages available at any order
    #[error("out of memory")]
    OutOfMemory,
    /// The host rejected a page table installation
    #[error("page mapping failed ({0})")]
    Mapping(i32),
    /// Malformed size, command or argument
    #[error("invalid request")]
    InvalidRequest,
    /// The security monitor returned a failure status
    #[error("security monitor returned {0}")]
    Monitor(isize),
    /// The execution environment has no monitor call mechanism
    #[error("not supported by the execution environment")]
    Unsupported,
    /// A user memory copy did not complete
    #[error("bad user address")]
    Fault,
}

impl Error {

    /// Classify a raw status returned by the security monitor
    pub fn from_status(status: isize) -> Result<usize, Error> {
        match status {
            s if s >= 0                 => Ok(s as usize),
            SBI_ERR_NOT_SUPPORTED       => Err(Error::Unsupported),
            s                           => Err(Error::Monitor(s)),
        }
    }

    /// Negative errno reported across the device interface
    pub fn errno(&self) -> i32 {
        match *self {
            Error::OutOfMemory    => -errno::ENOMEM,
            Error::Mapping(code)  => if code < 0 { code } else { -errno::EIO },
            Error::InvalidRequest => -errno::EINVAL,
            Error::Monitor(_)     => -errno::EIO,
            Error::Unsupported    => -errno::EOPNOTSUPP,
            Error::Fault          => -errno::EFAULT,
        }
    }
}
