//! Kernel-resident half of the TEE support layer
//!
//! Carves secure memory regions out of the host page allocator for the
//! enclave loader, and forwards enclave transitions and memory locking
//! requests to the security monitor.
//!
//! The host kernel is reached through traits: 'HostPages' for physical
//! pages, 'PageMapper' for page tables, 'UserAccess' and 'FdInstaller' for
//! the device plumbing and 'Transport' for the monitor trap.
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod error;
mod mapper;
mod page;

/* Public interface */
pub mod device;
pub mod gateway;
pub mod handle;
pub mod region;
pub mod vstack;

pub use error::Error;
pub use mapper::{PageMapper, RegionMapper};
pub use page::{allocate_block, fixed_size, pages_needed};
pub use page::{Block, HostPages, Pfn, DEFAULT_MAX_ORDER, PAGE_SHIFT, PAGE_SIZE};

pub use device::Teectl;
pub use gateway::EnclaveGateway;
pub use handle::RegionHandle;
pub use vstack::ScratchStack;
