//! Calls into the security monitor
//!
//! Every call is a single SBI trap on the enclave extension: arguments in
//! a0..a5, the function identifier in a6, the extension identifier in a7 and
//! the status returned in a0. Exiting the enclave context may clobber every
//! general purpose register the compiler can allocate, except tp, s0 and s1,
//! which the monitor must preserve.
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use log::{trace, warn};

pub use edge::ecall::CallID;
use edge::ecall::SBI_ERR_NOT_SUPPORTED;

use crate::Error;
use crate::vstack::ScratchStack;

/// Maximum number of argument registers
pub const MAX_ARGS: usize = 6;

/// A mechanism for trapping into the security monitor
pub trait Transport {
    /// Issue call 'id' with 'args' and return the raw monitor status
    fn call(&self, id: CallID, args: &[usize]) -> isize;
}

/// Transport for environments without a security monitor
///
/// Every call fails with SBI_ERR_NOT_SUPPORTED and has no side effects.
#[derive(Debug, Default, Copy, Clone)]
pub struct UnsupportedTransport;

impl Transport for UnsupportedTransport {
    fn call(&self, _id: CallID, _args: &[usize]) -> isize {
        SBI_ERR_NOT_SUPPORTED
    }
}

/// Transport issuing 'ecall' to a RISC-V security monitor
///
/// Calls that are not wired are never trapped; they report
/// SBI_ERR_NOT_SUPPORTED instead.
#[derive(Debug, Copy, Clone)]
pub struct SbiTransport {
    wired: u8,
}

impl SbiTransport {

    /// Transport with every call wired
    pub fn new() -> Self {
        Self::with_wired(&CallID::ALL)
    }

    /// Transport with only 'calls' wired
    pub fn with_wired(calls: &[CallID]) -> Self {
        let wired = calls.iter().fold(0u8, |mask, id| mask | Self::bit(*id));
        Self{wired: wired}
    }

    pub fn is_wired(&self, id: CallID) -> bool {
        self.wired & Self::bit(id) != 0
    }

    fn bit(id: CallID) -> u8 {
        let index = CallID::ALL.iter().position(|c| *c == id).unwrap_or(0);
        1 << index
    }
}

impl Default for SbiTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SbiTransport {
    fn call(&self, id: CallID, args: &[usize]) -> isize {
        if !self.is_wired(id) {
            warn!("[teectl] monitor call {} is not wired", id.as_usize());
            return SBI_ERR_NOT_SUPPORTED;
        }

        let mut regs = [0usize; MAX_ARGS];
        let count = args.len().min(MAX_ARGS);
        regs[.. count].copy_from_slice(&args[.. count]);

        if id == CallID::Exit {
            sbi::ecall_exit(id.as_usize())
        } else {
            sbi::ecall(id.as_usize(), &regs)
        }
    }
}

#[cfg(target_arch = "riscv64")]
mod sbi {
    use core::arch::asm;

    use edge::ecall::SBI_EXT_TEE_ENCLAVE;

    use super::MAX_ARGS;

    pub(super) fn ecall(func: usize, args: &[usize; MAX_ARGS]) -> isize {
        let rc: isize;
        unsafe {
            asm!("ecall",
                 inlateout("a0") args[0] => rc, inlateout("a1") args[1] => _,
                 in("a2") args[2], in("a3") args[3],
                 in("a4") args[4], in("a5") args[5],
                 in("a6") func, in("a7") SBI_EXT_TEE_ENCLAVE,
                 options(nostack));
        }
        rc
    }

    pub(super) fn ecall_exit(func: usize) -> isize {
        let rc: isize;
        unsafe {
            asm!("ecall",
                 in("a6") func, in("a7") SBI_EXT_TEE_ENCLAVE,
                 lateout("a0") rc,
                 lateout("s2") _, lateout("s3") _, lateout("s4") _,
                 lateout("s5") _, lateout("s6") _, lateout("s7") _,
                 lateout("s8") _, lateout("s9") _, lateout("s10") _,
                 lateout("s11") _,
                 clobber_abi("C"));
        }
        rc
    }
}

#[cfg(not(target_arch = "riscv64"))]
mod sbi {
    use edge::ecall::SBI_ERR_NOT_SUPPORTED;

    use super::MAX_ARGS;

    pub(super) fn ecall(_func: usize, _args: &[usize; MAX_ARGS]) -> isize {
        SBI_ERR_NOT_SUPPORTED
    }

    pub(super) fn ecall_exit(_func: usize) -> isize {
        SBI_ERR_NOT_SUPPORTED
    }
}

/// Transport of the build target
#[cfg(target_arch = "riscv64")]
pub type DefaultTransport = SbiTransport;
/// Transport of the build target
#[cfg(not(target_arch = "riscv64"))]
pub type DefaultTransport = UnsupportedTransport;

/// The fixed set of calls between the host kernel and the security monitor
///
/// The gateway checks argument shapes and forwards; monitor failures are
/// returned verbatim, never retried.
pub struct EnclaveGateway<T: Transport> {
    transport: T,
}

impl <T: Transport>EnclaveGateway<T> {

    pub fn new(transport: T) -> Self {
        Self{transport: transport}
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn invoke(&self, id: CallID, args: &[usize]) -> Result<usize, Error> {
        debug_assert_eq!(args.len(), id.arity());
        let status = self.transport.call(id, args);
        trace!("[teectl] monitor call {} {:x?} -> {}", id.as_usize(), args, status);
        Error::from_status(status)
    }

    fn check_range(vaddr: usize, size: usize) -> Result<(), Error> {
        if size == 0 || vaddr.checked_add(size).is_none() {
            return Err(Error::InvalidRequest);
        }
        Ok(())
    }

    /// Hand the control buffer at 'head' to the monitor
    ///
    /// The monitor answers through the buffer or a later 'finish_ctl', so
    /// its status is not reported here.
    pub fn request_ctl(&self, head: *const u8) -> Result<(), Error> {
        if head.is_null() {
            return Err(Error::InvalidRequest);
        }

        if let Err(error) = self.invoke(CallID::Ctl, &[head as usize]) {
            warn!("[teectl] control request at {:p}: {}", head, error);
        }
        Ok(())
    }

    /// Report the 'result' of the control request at 'head'
    pub fn finish_ctl(&self, head: *const u8, result: isize) -> Result<(), Error> {
        if head.is_null() {
            return Err(Error::InvalidRequest);
        }

        if let Err(error) = self.invoke(CallID::FinishCtl, &[head as usize, result as usize]) {
            warn!("[teectl] finishing control request at {:p}: {}", head, error);
        }
        Ok(())
    }

    /// Stage 'request' on 'stack' and hand it to the monitor
    ///
    /// Returns the address of the staged request.
    pub fn request_ctl_staged(&self,
                              stack:   &mut ScratchStack<'_>,
                              request: &[u8])
                              -> Result<usize, Error> {

        let addr = stack.push(request)?;
        self.request_ctl(addr as *const u8)?;
        Ok(addr)
    }

    /// Lock the physical range backing '[vaddr, vaddr + size)' for the enclave
    pub fn lock(&self, vaddr: usize, size: usize) -> Result<usize, Error> {
        Self::check_range(vaddr, size)?;
        self.invoke(CallID::Lock, &[vaddr, size])
    }

    /// Return a range locked with 'lock' to the host
    pub fn free(&self, vaddr: usize, size: usize) -> Result<usize, Error> {
        Self::check_range(vaddr, size)?;
        self.invoke(CallID::Free, &[vaddr, size])
    }

    /// Enter the enclave execution context
    ///
    /// Must be paired with exactly one 'exit'; prefer 'with_enclave'.
    pub fn enter(&self) -> Result<usize, Error> {
        self.invoke(CallID::Enter, &[])
    }

    /// Exit the enclave execution context
    pub fn exit(&self) -> Result<usize, Error> {
        self.invoke(CallID::Exit, &[])
    }

    /// Run 'f' bracketed by 'enter' and 'exit'
    ///
    /// 'exit' is issued exactly once whatever happens: when 'enter' fails,
    /// when 'f' fails and when 'f' unwinds. 'f' is not run if 'enter' fails.
    /// The first error is returned.
    pub fn with_enclave<R>(&self, f: impl FnOnce() -> Result<R, Error>) -> Result<R, Error> {
        let entered = self.enter();
        let mut bracket = Bracket{gateway: self, open: true};
        let result = entered.and_then(|_| f());
        bracket.open = false;
        let exited = self.exit();

        let value = result?;
        exited?;
        Ok(value)
    }
}

struct Bracket<'g, T: Transport> {
    gateway: &'g EnclaveGateway<T>,
    open:    bool,
}

impl <'g, T: Transport>Drop for Bracket<'g, T> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.gateway.exit();
        }
    }
}
