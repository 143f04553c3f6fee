//! Secure memory regions
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use alloc::vec::Vec;

use log::{debug, info};

use crate::Error;
use crate::page::{allocate_block, order_for, pages_needed, Block, HostPages, Pfn};

/// A grant of physical memory made of power-of-two blocks
///
/// Blocks are kept in allocation order, which is also the order in which
/// they are laid out in a mapping.
#[derive(Debug)]
pub struct Region {
    blocks: Vec<Block>,
    size:   usize,
}

impl Region {

    fn empty(size: usize) -> Self {
        Self{blocks: Vec::new(), size: size}
    }

    /// Size of the region in bytes, as rounded at creation
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    /// Total number of pages in the base runs
    pub fn pages(&self) -> usize {
        self.blocks.iter().map(Block::pages).sum()
    }

    /// Every frame owned by the region: base runs first, then extra pages
    pub fn frames(&self) -> impl Iterator<Item = Pfn> + '_ {
        let runs   = self.blocks.iter()
            .flat_map(|b| (0 .. b.pages()).map(move |i| b.page.add(i)));
        let extras = self.blocks.iter().filter_map(|b| b.extra);
        runs.chain(extras)
    }

    /// Return every block to the host and discard the region
    pub(crate) fn free<H: HostPages + ?Sized>(self, host: &H) {
        let size = self.size;
        for block in self.blocks {
            block.free(host);
        }

        info!("[teectl] free region, size: {}", size);
    }
}

/// Fills a region with blocks until its size is covered
pub struct RegionBuilder<'h, H: HostPages + ?Sized> {
    host:      &'h H,
    max_order: u32,
}

impl <'h, H: HostPages + ?Sized>RegionBuilder<'h, H> {

    pub fn new(host: &'h H, max_order: u32) -> Self {
        Self{host: host, max_order: max_order}
    }

    /// Build a region covering 'size' bytes
    ///
    /// Each step takes the largest block that does not exceed the remaining
    /// page count, accepting a smaller one if the host degrades it. On
    /// failure every block allocated so far is returned to the host.
    pub fn build(&self, size: usize) -> Result<Region, Error> {
        let mut region    = Region::empty(size);
        let mut remaining = pages_needed(size);

        debug!("[teectl] {} pages needed", remaining);

        while remaining > 0 {
            let order = order_for(remaining, self.max_order);
            let block = match allocate_block(self.host, order) {
                Ok(block)  => block,
                Err(error) => {
                    region.free(self.host);
                    return Err(error);
                }
            };

            remaining = remaining.saturating_sub(block.pages());
            region.blocks.push(block);
        }

        Ok(region)
    }
}
