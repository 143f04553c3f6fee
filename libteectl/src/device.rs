//! The teectl device: allocation requests from user space
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use alloc::sync::Arc;

use log::{error, info};

pub use edge::alloc::{AllocRequest, TEECTL_IOCTL_ALLOC};

use crate::Error;
use crate::handle::{RegionHandle, RegionIds};
use crate::page::{fixed_size, HostPages, DEFAULT_MAX_ORDER};

/// Name of the device node
pub const TEECTL_DEVICE_NAME: &str = "teectl";

/// Byte copies between kernel and user memory
pub trait UserAccess {
    /// Copy 'to.len()' bytes from user address 'from'
    ///
    /// Returns the number of bytes not copied. The part of 'to' that was not
    /// copied is zero filled.
    fn copy_from_user(&self, to: &mut [u8], from: usize) -> usize;

    /// Copy 'from' to user address 'to'
    ///
    /// Returns the number of bytes not copied.
    fn copy_to_user(&self, to: usize, from: &[u8]) -> usize;
}

/// Turns region handles into file descriptors
pub trait FdInstaller<H: HostPages> {
    /// Install 'handle' and return its descriptor
    ///
    /// The handle is dropped, and its region released, if this fails.
    fn install(&mut self, handle: RegionHandle<H>) -> Result<i32, Error>;
}

/// Device configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Highest order requested from the host page allocator
    pub max_order: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self{max_order: DEFAULT_MAX_ORDER}
    }
}

/// The allocator device
pub struct Teectl<H: HostPages> {
    host:   Arc<H>,
    config: Config,
    ids:    RegionIds,
}

impl <H: HostPages>Teectl<H> {

    pub fn new(host: Arc<H>) -> Self {
        Self::with_config(host, Config::default())
    }

    pub fn with_config(host: Arc<H>, config: Config) -> Self {
        Self{host: host, config: config, ids: RegionIds::new()}
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Size actually reserved for a request of 'size' bytes
    ///
    /// None if the size class of 'size' is not representable.
    pub fn fixed_size(&self, size: usize) -> Option<usize> {
        fixed_size(size, self.config.max_order)
    }

    /// Allocate a region for 'request'
    ///
    /// The request size is rounded to its size class and written back.
    /// Sizes without a size class are rejected with InvalidRequest.
    pub fn alloc(&self, request: &mut AllocRequest) -> Result<RegionHandle<H>, Error> {
        request.size = self.fixed_size(request.size).ok_or(Error::InvalidRequest)?;
        RegionHandle::create(self.host.clone(), self.ids.issue(),
                             request.size, self.config.max_order)
    }

    /// Handle an ioctl on the device
    ///
    /// Only TEECTL_IOCTL_ALLOC is supported. 'arg' is the user address of an
    /// AllocRequest, which receives the rounded size and the descriptor of
    /// the new region. If the reply cannot be written the descriptor stays
    /// installed and the region is released when it is closed.
    pub fn ioctl<U, F>(&self,
                       cmd:  u32,
                       arg:  usize,
                       user: &U,
                       fds:  &mut F)
                       -> Result<(), Error>
    where U: UserAccess + ?Sized,
          F: FdInstaller<H> + ?Sized {

        if cmd != TEECTL_IOCTL_ALLOC {
            return Err(Error::InvalidRequest);
        }

        let mut bytes = [0u8; AllocRequest::SIZE];
        if user.copy_from_user(&mut bytes, arg) != 0 {
            return Err(Error::Fault);
        }
        let mut request = AllocRequest::from_bytes(&bytes).ok_or(Error::InvalidRequest)?;

        let handle = self.alloc(&mut request)?;
        let id     = handle.id();
        request.fd = fds.install(handle).map_err(|e| {
            error!("[teectl] failed to get a descriptor for region {}: {}", id.0, e);
            e
        })?;

        info!("[teectl] region {} -> fd {}, size: {}", id.0, request.fd, request.size);

        if user.copy_to_user(arg, &request.to_bytes()) != 0 {
            return Err(Error::Fault);
        }

        Ok(())
    }
}
