//! Region handles and their lifecycle
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use alloc::sync::Arc;
use core::ops::Range;
use core::sync::atomic::{AtomicU32, Ordering};

use log::info;
use spin::Mutex;

use crate::Error;
use crate::mapper::{PageMapper, RegionMapper};
use crate::page::HostPages;
use crate::region::{Region, RegionBuilder};

/// Identifier of a region, unique per issuing counter
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub u32);

/// Issues region identifiers
///
/// Owned by whoever creates handles; there is no global instance.
#[derive(Debug, Default)]
pub struct RegionIds {
    last: AtomicU32,
}

impl RegionIds {

    pub const fn new() -> Self {
        Self{last: AtomicU32::new(0)}
    }

    pub fn issue(&self) -> RegionId {
        RegionId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Lifecycle state of a handle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// Region allocated, not mapped yet
    Built,
    /// Region mapped into an address space
    Mapped,
    /// Region returned to the host (terminal)
    Released,
}

struct Inner {
    state:  State,
    region: Option<Region>,
}

/// The externally held capability for exactly one region
///
/// Dropping the handle releases the region. The handle layer above may also
/// call 'release' directly; a region is freed at most once however many
/// paths race to release it.
pub struct RegionHandle<H: HostPages> {
    id:    RegionId,
    size:  usize,
    host:  Arc<H>,
    inner: Mutex<Inner>,
}

impl <H: HostPages>RegionHandle<H> {

    /// Allocate a region of 'size' bytes and wrap it in a new handle
    ///
    /// 'size' is expected to be already rounded to its size class.
    pub fn create(host:      Arc<H>,
                  id:        RegionId,
                  size:      usize,
                  max_order: u32)
                  -> Result<Self, Error> {

        let region = RegionBuilder::new(host.as_ref(), max_order).build(size)?;
        info!("[teectl] region {} created, size: {}, blocks: {}",
              id.0, size, region.blocks().len());

        Ok(Self{id:    id,
                size:  size,
                host:  host,
                inner: Mutex::new(Inner{state: State::Built, region: Some(region)})})
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Run 'f' on the region, unless it has been released or is being mapped
    pub fn with_region<T>(&self, f: impl FnOnce(&Region) -> T) -> Option<T> {
        self.inner.lock().region.as_ref().map(f)
    }

    /// Map the region into 'range' of 'dest'
    ///
    /// A region can be mapped only once; later requests are rejected with
    /// InvalidRequest, as are requests on a released handle.
    ///
    /// The lock is not held while mapping, since the host may sleep in its
    /// page allocator or page table code. A 'release' racing with the mapping
    /// leaves the region to this call, which frees it once the mapping is
    /// done and fails with InvalidRequest.
    pub fn mmap<M: PageMapper + ?Sized>(&self,
                                        dest:  &mut M,
                                        range: Range<usize>)
                                        -> Result<(), Error> {

        let mut region = {
            let mut inner = self.inner.lock();
            if inner.state != State::Built {
                return Err(Error::InvalidRequest);
            }
            let region = inner.region.take().ok_or(Error::InvalidRequest)?;
            inner.state = State::Mapped;
            region
        };

        let result = RegionMapper::new(self.host.as_ref()).map(&mut region, dest, range);

        let mut inner = self.inner.lock();
        if inner.state == State::Released {
            drop(inner);
            info!("[teectl] region {} released while mapping", self.id.0);
            region.free(self.host.as_ref());
            return result.and(Err(Error::InvalidRequest));
        }

        // A rejected range leaves nothing in the address space
        if result == Err(Error::InvalidRequest) {
            inner.state = State::Built;
        }
        inner.region = Some(region);
        result
    }

    /// Return the region to the host
    ///
    /// Returns true if this call freed the region, false if it was already
    /// released or is being mapped, in which case 'mmap' frees it.
    pub fn release(&self) -> bool {
        let region = {
            let mut inner = self.inner.lock();
            inner.state = State::Released;
            inner.region.take()
        };

        match region {
            Some(region) => {
                info!("[teectl] release region {}", self.id.0);
                region.free(self.host.as_ref());
                true
            },
            None => false,
        }
    }
}

impl <H: HostPages>Drop for RegionHandle<H> {
    fn drop(&mut self) {
        self.release();
    }
}
