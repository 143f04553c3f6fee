//! A crate for host applications using teectl secure memory regions
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

extern crate std;

#[macro_use]
extern crate nix;

mod error;

/* Public interface */
pub mod device;
pub mod memory;

pub use device::Device as Device;
pub use error::Error  as Error;
pub use memory::Region as Region;
