//! Definitions for the teectl memory allocation request
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use crate::PAGE_SIZE;

/// ioctl magic of the teectl device
pub const TEECTL_IOC_MAGIC: u8 = b'k';

/// Sequence number of the allocation request
pub const TEECTL_IOC_ALLOC_NR: u8 = 0x01;

/// Request code of the allocation ioctl, `_IOW('k', 1, AllocRequest)`
pub const TEECTL_IOCTL_ALLOC: u32 = ioc_write(TEECTL_IOC_MAGIC,
                                              TEECTL_IOC_ALLOC_NR,
                                              AllocRequest::SIZE);

const IOC_NRSHIFT:   u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT:  u32 = 30;
const IOC_WRITE:     u32 = 1;

const fn ioc_write(ty: u8, nr: u8, size: usize) -> u32 {
    (IOC_WRITE << IOC_DIRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
}

/// Default highest block order (the Linux MAX_ORDER)
pub const DEFAULT_MAX_ORDER: u32 = 10;

/// Number of pages needed to hold 'size' bytes
pub fn pages_needed(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE)
}

/// Round 'size' up to its size class
///
/// Page counts below the largest block size are rounded up to the next power
/// of two, capped at '2^max_order'. Larger counts are only page aligned. A
/// zero size yields the smallest class (one page). Returns None if the
/// rounded size does not fit in a usize.
pub fn fixed_size(size: usize, max_order: u32) -> Option<usize> {
    let mut pages = pages_needed(size).max(1);
    let max_pages = 1usize.checked_shl(max_order).unwrap_or(usize::MAX);
    if pages < max_pages {
        pages = pages.next_power_of_two().min(max_pages);
    }

    pages.checked_mul(PAGE_SIZE)
}

/// Memory allocation request
///
/// The caller fills in the requested size. On success the device overwrites
/// 'size' with the rounded size actually reserved and stores the descriptor
/// of the new region in 'fd'.
// Shared with the C client: must not be changed
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct AllocRequest {
    /// Size of the region in bytes
    pub size: usize,
    /// Descriptor of the region, written by the device
    pub fd:   i32,
}

impl AllocRequest {

    /// Size of the request in bytes
    pub const SIZE: usize = core::mem::size_of::<AllocRequest>();

    /// Create a new request for 'size' bytes
    pub fn new(size: usize) -> Self {
        Self{size: size, fd: -1}
    }

    /// Serialize to raw memory bytes
    pub fn to_bytes(&self) -> [u8; AllocRequest::SIZE] {
        let mut bytes = [0u8; AllocRequest::SIZE];
        let size = self.size.to_ne_bytes();
        bytes[.. size.len()].copy_from_slice(&size);
        let fd_at = core::mem::offset_of!(AllocRequest, fd);
        bytes[fd_at .. fd_at + 4].copy_from_slice(&self.fd.to_ne_bytes());
        bytes
    }

    /// Deserialize from raw memory bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != AllocRequest::SIZE {
            return None;
        }

        const WORD: usize = core::mem::size_of::<usize>();
        let mut size = [0u8; WORD];
        size.copy_from_slice(&bytes[.. WORD]);
        let fd_at = core::mem::offset_of!(AllocRequest, fd);
        let mut fd = [0u8; 4];
        fd.copy_from_slice(&bytes[fd_at .. fd_at + 4]);

        Some(Self{size: usize::from_ne_bytes(size), fd: i32::from_ne_bytes(fd)})
    }
}
