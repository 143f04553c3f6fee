//! Mapped secure memory regions
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use std::fs::File;
use std::os::unix::io::AsRawFd;

use libc::c_void;
use log::warn;
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};

use edge::{PAGE_SHIFT, PAGE_SIZE};

use crate::Error;

/// A secure memory region mapped into this process
///
/// Dropping the region unmaps it and closes its descriptor, after which the
/// kernel returns the pages to the host.
pub struct Region {
    base: *mut u8,
    size: usize,
    /// Region descriptor, None for simulated regions
    file: Option<File>,
}

impl Region {

    /// Map the region behind 'file'
    pub(crate) fn map(file: File, size: usize) -> Result<Self, Error> {
        let ptr = unsafe {
            mmap(std::ptr::null_mut(),
                 size,
                 ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                 MapFlags::MAP_SHARED,
                 file.as_raw_fd(),
                 0)
        }?;

        Ok(Self{base: ptr as *mut u8, size: size, file: Some(file)})
    }

    /// Simulate a region with anonymous memory
    pub(crate) fn anonymous(size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::BadArgument);
        }

        let ptr = unsafe {
            mmap(std::ptr::null_mut(),
                 size,
                 ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                 MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
                 -1,
                 0)
        }?;

        Ok(Self{base: ptr as *mut u8, size: size, file: None})
    }

    /// Base virtual address of the mapping
    pub fn addr(&self) -> usize {
        self.base as usize
    }

    /// Size of the region in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of pages in the region
    pub fn pages(&self) -> usize {
        self.size >> PAGE_SHIFT
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base, self.size) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.base, self.size) }
    }

    /// Contents of page 'index'
    pub fn page(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(PAGE_SIZE)?;
        self.as_slice().get(start .. start.checked_add(PAGE_SIZE)?)
    }

    /// Write 'data' at 'offset'
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        let end = offset.checked_add(data.len()).ok_or(Error::BadArgument)?;
        if end > self.size {
            return Err(Error::BadArgument);
        }

        self.as_mut_slice()[offset .. end].copy_from_slice(data);
        Ok(())
    }

    pub fn fill(&mut self, byte: u8) {
        self.as_mut_slice().fill(byte);
    }

    /// Tag every page with its index, touching the whole region
    pub fn tag_pages(&mut self) {
        for index in 0 .. self.pages() {
            let bytes = index.to_be_bytes();
            let start = index * PAGE_SIZE;
            self.as_mut_slice()[start .. start + bytes.len()].copy_from_slice(&bytes);
        }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if let Err(error) = unsafe { munmap(self.base as *mut c_void, self.size) } {
            warn!("teectl: unmapping {:#x} failed: {}", self.addr(), error);
        }
        // Closing the descriptor releases the region in the kernel
        drop(self.file.take());
    }
}
