//! Physical page blocks and size classes
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use log::{debug, warn};

use crate::Error;

pub use edge::{PAGE_SHIFT, PAGE_SIZE};
pub use edge::alloc::{fixed_size, pages_needed, DEFAULT_MAX_ORDER};

/// Physical page frame number
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pfn(pub usize);

impl Pfn {

    pub fn as_usize(self) -> usize {
        self.0
    }

    /// Frame number 'count' pages above this one
    pub fn add(self, count: usize) -> Pfn {
        Pfn(self.0 + count)
    }

    /// Physical address of the frame
    pub fn addr(self) -> usize {
        self.0 << PAGE_SHIFT
    }
}

/// The host page allocator
///
/// Runs of '2^order' physically contiguous pages are allocated and freed as
/// a unit. The host is responsible for its own thread safety.
pub trait HostPages: Send + Sync {
    /// Allocate a run of '2^order' pages, or None if none is available
    fn alloc_pages(&self, order: u32) -> Option<Pfn>;
    /// Return a run previously allocated with the same 'order'
    fn free_pages(&self, pfn: Pfn, order: u32);
}

/// A power-of-two run of physical pages plus one auxiliary page
///
/// The auxiliary ('extra') page is only present once the block has been
/// mapped.
#[derive(Debug, PartialEq, Eq)]
pub struct Block {
    /// First frame of the run
    pub page:  Pfn,
    /// The run is '2^order' pages long
    pub order: u32,
    /// Separately allocated page backing the last slot of the mapping
    pub extra: Option<Pfn>,
}

impl Block {

    /// Number of pages in the run
    pub fn pages(&self) -> usize {
        1 << self.order
    }

    /// Size of the run in bytes
    pub fn size(&self) -> usize {
        PAGE_SIZE << self.order
    }

    /// Return every page of the block to the host
    pub(crate) fn free<H: HostPages + ?Sized>(mut self, host: &H) {
        host.free_pages(self.page, self.order);
        if let Some(extra) = self.extra.take() {
            host.free_pages(extra, 0);
        }
    }
}

/// Highest order whose run does not exceed 'pages'
pub(crate) fn order_for(pages: usize, max_order: u32) -> u32 {
    debug_assert!(pages > 0);
    pages.ilog2().min(max_order)
}

/// Allocate one block of at most '2^order' pages
///
/// The order is degraded one step at a time down to a single page. Nothing is
/// reserved by a failed attempt.
pub fn allocate_block<H: HostPages + ?Sized>(host: &H, order: u32) -> Result<Block, Error> {
    for attempt in (0 ..= order).rev() {
        if let Some(page) = host.alloc_pages(attempt) {
            if attempt < order {
                warn!("[teectl] order {} unavailable, degraded to {}", order, attempt);
            }
            debug!("[teectl] block pfn {:#x}, order {}", page.as_usize(), attempt);
            return Ok(Block{page: page, order: attempt, extra: None});
        }
    }

    Err(Error::OutOfMemory)
}
