//! Security monitor call identifiers
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

/// SBI extension identifier of the enclave extension (passed in a7)
pub const SBI_EXT_TEE_ENCLAVE: usize = 0x08abcdef;

/* Status values returned by the security monitor in a0 */

/// Call completed successfully
pub const SBI_SUCCESS:           isize = 0;
/// Call failed for an unspecified reason
pub const SBI_ERR_FAILED:        isize = -1;
/// Call or extension is not supported
pub const SBI_ERR_NOT_SUPPORTED: isize = -2;
/// Invalid call parameter
pub const SBI_ERR_INVALID_PARAM: isize = -3;

/// Function identifiers of the enclave extension (passed in a6)
///
/// These are stable ABI values: must not be changed!
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum CallID {
    /// Enter the enclave execution context
    Enter     = 3007,
    /// Exit the enclave execution context
    Exit      = 3008,
    /// Lock a physical range for exclusive enclave use
    Lock      = 5001,
    /// Return a locked physical range to the host
    Free      = 5002,
    /// Hand a control buffer to the monitor
    Ctl       = 5003,
    /// Report the result of a control request
    FinishCtl = 5004,
}

impl CallID {

    /// All call identifiers, in ABI order
    pub const ALL: [CallID; 6] = [CallID::Enter, CallID::Exit,
                                  CallID::Lock,  CallID::Free,
                                  CallID::Ctl,   CallID::FinishCtl];

    pub fn as_usize(self) -> usize {
        self as usize
    }

    pub fn from_usize(value: usize) -> Option<CallID> {
        CallID::ALL.iter().copied().find(|id| id.as_usize() == value)
    }

    /// Number of argument registers (a0, a1, ...) the call consumes
    pub fn arity(self) -> usize {
        match self {
            CallID::Enter | CallID::Exit     => 0,
            CallID::Ctl                      => 1,
            CallID::Lock  | CallID::Free
                | CallID::FinishCtl          => 2,
        }
    }
}
