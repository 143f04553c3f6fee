//! ABI definitions shared by the teectl kernel module, the security monitor
//! and host applications.
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

#![no_std]

pub mod alloc;
pub mod ecall;

/// Page shift of the host
pub const PAGE_SHIFT: usize = 12;
/// Page size of the host in bytes
pub const PAGE_SIZE:  usize = 1 << PAGE_SHIFT;

/// Linux error numbers returned across the device interface
pub mod errno {
    pub const EIO:        i32 = 5;
    pub const ENOMEM:     i32 = 12;
    pub const EFAULT:     i32 = 14;
    pub const EINVAL:     i32 = 22;
    pub const EOPNOTSUPP: i32 = 95;
}
