//! Host library errors
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

/// Errors reported by the host library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A device operation failed
    #[error("device operation failed: {0}")]
    Device(#[from] nix::Error),
    /// Opening or closing a file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Bad argument
    #[error("bad argument")]
    BadArgument,
    /// The device returned an inconsistent reply
    #[error("bad device state")]
    BadState,
}
