//! Mock host collaborators shared by the integration tests
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Mutex;

use teectl::device::{FdInstaller, UserAccess};
use teectl::gateway::{CallID, Transport};
use teectl::{Error, HostPages, PageMapper, Pfn, RegionHandle};

struct HostState {
    next:      usize,
    budget:    usize,
    max_order: u32,
    live:      HashMap<Pfn, u32>,
    allocs:    usize,
    frees:     usize,
}

/// Page allocator tracking every live run
///
/// Runs are naturally aligned like buddy allocations. Freeing a run that is
/// not live panics.
pub struct MockHost {
    state: Mutex<HostState>,
}

impl MockHost {

    pub fn new() -> Self {
        Self::with_budget(usize::MAX)
    }

    /// Host that hands out at most 'pages' pages in total
    pub fn with_budget(pages: usize) -> Self {
        Self{state: Mutex::new(HostState{next:      0x80000,
                                         budget:    pages,
                                         max_order: u32::MAX,
                                         live:      HashMap::new(),
                                         allocs:    0,
                                         frees:     0})}
    }

    /// Fail every request above 'order'
    pub fn limit_order(self, order: u32) -> Self {
        self.state.lock().unwrap().max_order = order;
        self
    }

    /// Pages currently allocated
    pub fn outstanding(&self) -> usize {
        self.state.lock().unwrap().live.values().map(|o| 1usize << o).sum()
    }

    pub fn allocs(&self) -> usize {
        self.state.lock().unwrap().allocs
    }

    pub fn frees(&self) -> usize {
        self.state.lock().unwrap().frees
    }

    pub fn is_live(&self, pfn: Pfn) -> bool {
        self.state.lock().unwrap().live.contains_key(&pfn)
    }
}

impl HostPages for MockHost {
    fn alloc_pages(&self, order: u32) -> Option<Pfn> {
        let mut state = self.state.lock().unwrap();
        let pages = 1usize << order;
        if order > state.max_order || state.budget < pages {
            return None;
        }

        let pfn = (state.next + pages - 1) & !(pages - 1);
        state.next    = pfn + pages;
        state.budget -= pages;
        state.allocs += 1;
        state.live.insert(Pfn(pfn), order);
        Some(Pfn(pfn))
    }

    fn free_pages(&self, pfn: Pfn, order: u32) {
        let mut state = self.state.lock().unwrap();
        match state.live.remove(&pfn) {
            Some(o) if o == order => {},
            other => panic!("bad free of {:?} (order {}): {:?}", pfn, order, other),
        }
        state.budget = state.budget.saturating_add(1 << order);
        state.frees += 1;
    }
}

/// Address space recording every mapping call
#[derive(Default)]
pub struct RecordingMapper {
    pub calls:   Vec<(usize, Pfn, usize)>,
    pub fail_at: Option<usize>,
}

impl RecordingMapper {

    pub fn failing_at(call: usize) -> Self {
        Self{calls: Vec::new(), fail_at: Some(call)}
    }

    /// Frame mapped at 'vaddr', if any
    pub fn lookup(&self, vaddr: usize) -> Option<Pfn> {
        self.calls.iter().find_map(|(start, pfn, size)| {
            (vaddr >= *start && vaddr < start + size)
                .then(|| pfn.add((vaddr - start) / teectl::PAGE_SIZE))
        })
    }
}

impl PageMapper for RecordingMapper {
    fn remap_pfn_range(&mut self, vaddr: usize, pfn: Pfn, size: usize) -> Result<(), i32> {
        if self.fail_at == Some(self.calls.len()) {
            return Err(-11);
        }
        self.calls.push((vaddr, pfn, size));
        Ok(())
    }
}

/// Flat user memory
pub struct UserMemory {
    pub bytes:      RefCell<Vec<u8>>,
    pub fail_read:  bool,
    pub fail_write: bool,
}

impl UserMemory {
    pub fn new(len: usize) -> Self {
        Self{bytes: RefCell::new(vec![0; len]), fail_read: false, fail_write: false}
    }
}

impl UserAccess for UserMemory {
    fn copy_from_user(&self, to: &mut [u8], from: usize) -> usize {
        let bytes = self.bytes.borrow();
        if self.fail_read || from + to.len() > bytes.len() {
            to.fill(0);
            return to.len();
        }
        to.copy_from_slice(&bytes[from .. from + to.len()]);
        0
    }

    fn copy_to_user(&self, to: usize, from: &[u8]) -> usize {
        let mut bytes = self.bytes.borrow_mut();
        if self.fail_write || to + from.len() > bytes.len() {
            return from.len();
        }
        bytes[to .. to + from.len()].copy_from_slice(from);
        0
    }
}

/// Descriptor table holding installed handles
pub struct FdTable<H: HostPages> {
    pub handles: Vec<(i32, RegionHandle<H>)>,
    pub full:    bool,
}

impl <H: HostPages>FdTable<H> {
    pub fn new() -> Self {
        Self{handles: Vec::new(), full: false}
    }

    /// Close descriptor 'fd', dropping its handle
    pub fn close(&mut self, fd: i32) {
        self.handles.retain(|(f, _)| *f != fd);
    }
}

impl <H: HostPages>FdInstaller<H> for FdTable<H> {
    fn install(&mut self, handle: RegionHandle<H>) -> Result<i32, Error> {
        if self.full {
            return Err(Error::Mapping(-24));
        }
        let fd = 3 + self.handles.len() as i32;
        self.handles.push((fd, handle));
        Ok(fd)
    }
}

/// Transport recording every call, answering with scripted statuses
#[derive(Default)]
pub struct TracingTransport {
    pub trace:  RefCell<Vec<(CallID, Vec<usize>)>>,
    pub status: HashMap<CallID, isize>,
}

impl TracingTransport {

    pub fn answering(id: CallID, status: isize) -> Self {
        let mut transport = Self::default();
        transport.status.insert(id, status);
        transport
    }

    pub fn ids(&self) -> Vec<CallID> {
        self.trace.borrow().iter().map(|(id, _)| *id).collect()
    }

    /// Checks that enters and exits alternate, starting with an enter
    pub fn is_bracketed(&self) -> bool {
        let mut inside = false;
        for id in self.ids() {
            match id {
                CallID::Enter if !inside => inside = true,
                CallID::Exit if inside   => inside = false,
                CallID::Enter | CallID::Exit => return false,
                _ => {},
            }
        }
        !inside
    }
}

impl Transport for TracingTransport {
    fn call(&self, id: CallID, args: &[usize]) -> isize {
        self.trace.borrow_mut().push((id, args.to_vec()));
        self.status.get(&id).copied().unwrap_or(0)
    }
}
