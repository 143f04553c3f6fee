//! A downward growing scratch stack for marshaling data to the monitor
//!
//! The stack lives in caller provided memory: a fixed header at the lowest
//! address, followed by the data area which is filled from the top down.
//! There is no pop; the whole stack is reclaimed by discarding its memory.
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use core::mem::size_of;

use crate::Error;

/// Number of register slots in the header
pub const REGS: usize = 8;

/// In-memory header of a scratch stack, shared with the monitor
// Must not be changed
#[repr(C)]
#[allow(dead_code)]
struct Header {
    regs: [usize; REGS],
    size: usize,
    sp:   usize,
}

const WORD:      usize = size_of::<usize>();
const SIZE_SLOT: usize = REGS;
const SP_SLOT:   usize = REGS + 1;

pub struct ScratchStack<'a> {
    mem: &'a mut [u8],
}

impl <'a>ScratchStack<'a> {

    /// Size of the header in bytes
    pub const HEADER_SIZE: usize = size_of::<Header>();

    /// Create a stack in 'mem'
    ///
    /// 'mem.len() - HEADER_SIZE' bytes are usable. The memory must at least
    /// hold the header.
    pub fn create(mem: &'a mut [u8]) -> Result<Self, Error> {
        if mem.len() < Self::HEADER_SIZE {
            return Err(Error::InvalidRequest);
        }

        mem[.. Self::HEADER_SIZE].fill(0);
        let top = mem.as_ptr() as usize + mem.len();
        let mut stack = Self{mem: mem};
        stack.store(SIZE_SLOT, stack.mem.len() - Self::HEADER_SIZE);
        stack.store(SP_SLOT, top);
        Ok(stack)
    }

    fn load(&self, slot: usize) -> usize {
        let mut word = [0u8; WORD];
        word.copy_from_slice(&self.mem[slot * WORD .. (slot + 1) * WORD]);
        usize::from_ne_bytes(word)
    }

    fn store(&mut self, slot: usize, value: usize) {
        self.mem[slot * WORD .. (slot + 1) * WORD].copy_from_slice(&value.to_ne_bytes());
    }

    fn base(&self) -> usize {
        self.mem.as_ptr() as usize
    }

    /// Address of the header, to be handed to the monitor
    pub fn as_ptr(&self) -> *const u8 {
        self.mem.as_ptr()
    }

    /// Usable bytes below the header
    pub fn capacity(&self) -> usize {
        self.load(SIZE_SLOT)
    }

    /// Lowest address of the data area
    pub fn bp(&self) -> usize {
        self.base() + Self::HEADER_SIZE
    }

    /// Current top of the stack
    pub fn sp(&self) -> usize {
        self.load(SP_SLOT)
    }

    pub fn remaining(&self) -> usize {
        self.sp() - self.bp()
    }

    pub fn is_full(&self) -> bool {
        self.sp() == self.bp()
    }

    pub fn is_empty(&self) -> bool {
        self.sp() == self.bp() + self.capacity()
    }

    /// Copy 'value' onto the stack
    ///
    /// Returns the address of the stored copy, which becomes the new top.
    /// Fails without touching the stack if 'value' does not fit.
    pub fn push(&mut self, value: &[u8]) -> Result<usize, Error> {
        if value.len() > self.remaining() {
            return Err(Error::OutOfMemory);
        }

        let new = self.sp() - value.len();
        let at  = new - self.base();
        self.mem[at .. at + value.len()].copy_from_slice(value);
        self.store(SP_SLOT, new);
        Ok(new)
    }

    /// Register slot 'index' of the header
    pub fn reg(&self, index: usize) -> Option<usize> {
        (index < REGS).then(|| self.load(index))
    }

    pub fn set_reg(&mut self, index: usize, value: usize) -> Result<(), Error> {
        if index >= REGS {
            return Err(Error::InvalidRequest);
        }
        self.store(index, value);
        Ok(())
    }

    /// Bytes stored at 'addr' by an earlier push
    pub fn get(&self, addr: usize, len: usize) -> Option<&[u8]> {
        if addr < self.sp() || addr.checked_add(len)? > self.base() + self.mem.len() {
            return None;
        }
        let at = addr - self.base();
        Some(&self.mem[at .. at + len])
    }
}
