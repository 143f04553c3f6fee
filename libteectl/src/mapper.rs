//! Page table installation for regions
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use core::ops::Range;

use log::debug;

use crate::Error;
use crate::page::{HostPages, Pfn, PAGE_SIZE};
use crate::region::Region;

/// The destination address space of a memory-map request
pub trait PageMapper {
    /// Map 'size' bytes of physically contiguous memory starting at 'pfn'
    /// to the virtual address 'vaddr'. Errors are negative errno values.
    fn remap_pfn_range(&mut self, vaddr: usize, pfn: Pfn, size: usize) -> Result<(), i32>;
}

/// Installs the mappings of a fully built region
pub struct RegionMapper<'h, H: HostPages + ?Sized> {
    host: &'h H,
}

impl <'h, H: HostPages + ?Sized>RegionMapper<'h, H> {

    pub fn new(host: &'h H) -> Self {
        Self{host: host}
    }

    /// Map every block of 'region' into 'dest', in block order
    ///
    /// The last page slot of each block span is backed by a freshly
    /// allocated single page, never by the last page of the block's own run.
    /// On failure the mappings made so far are left in place; the region
    /// still owns every page and is torn down by its normal release.
    pub fn map<M: PageMapper + ?Sized>(&self,
                                       region: &mut Region,
                                       dest:   &mut M,
                                       range:  Range<usize>)
                                       -> Result<(), Error> {

        if range.start % PAGE_SIZE != 0 || range.len() < region.pages() * PAGE_SIZE {
            return Err(Error::InvalidRequest);
        }

        let mut addr = range.start;
        for block in region.blocks_mut() {
            let span = block.size();

            if span > PAGE_SIZE {
                dest.remap_pfn_range(addr, block.page, span - PAGE_SIZE)
                    .map_err(Error::Mapping)?;
            }

            let extra = self.host.alloc_pages(0).ok_or(Error::OutOfMemory)?;
            block.extra = Some(extra);
            dest.remap_pfn_range(addr + span - PAGE_SIZE, extra, PAGE_SIZE)
                .map_err(Error::Mapping)?;

            debug!("[teectl] mapped pfn {:#x} (order {}) at {:#x}, extra pfn {:#x}",
                   block.page.as_usize(), block.order, addr, extra.as_usize());

            addr += span;
        }

        Ok(())
    }
}
