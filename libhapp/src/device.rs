//! teectl device API
//
// SPDX-License-Identifier: MIT
// Copyright (C) 2022 VTT Technical Research Centre of Finland Ltd

use std::fs::File;
use std::os::unix::io::{AsRawFd, FromRawFd};

use log::{debug, info};

use edge::alloc::{fixed_size, AllocRequest, DEFAULT_MAX_ORDER};
use edge::alloc::{TEECTL_IOC_ALLOC_NR, TEECTL_IOC_MAGIC};

use crate::Error;
use crate::memory::Region;

/// Path of the teectl device file in Linux
pub const TEECTL_DEVICE_PATH: &str = "/dev/teectl";
/// Path describing a non-existing teectl device
pub const TEECTL_NULL_DEVICE: &str = "null-device";

// The kernel writes the reply into the request although it is declared _IOW
ioctl_readwrite_bad!(ioctl_alloc,
                     request_code_write!(TEECTL_IOC_MAGIC,
                                         TEECTL_IOC_ALLOC_NR,
                                         std::mem::size_of::<AllocRequest>()),
                     AllocRequest);

/// A handle for the teectl device operations
pub struct Device {
    /// None for the null device
    device_file: Option<File>,
}

impl Device {

    /// Open the teectl device at 'path'
    ///
    /// TEECTL_NULL_DEVICE opens a simulated device whose regions are backed
    /// by anonymous memory.
    pub fn open(path: &str) -> Result<Self, Error> {
        if path == TEECTL_NULL_DEVICE {
            return Ok(Self{device_file: None});
        }

        let file = File::options().read(true).write(true).open(path)?;
        Ok(Self{device_file: Some(file)})
    }

    pub fn is_simulated(&self) -> bool {
        self.device_file.is_none()
    }

    /// Reserve a region of at least 'size' bytes
    ///
    /// Returns the reserved size and, unless simulated, the region
    /// descriptor. Simulated regions use the default size classes of the
    /// device.
    fn request(&self, size: usize) -> Result<(usize, Option<File>), Error> {
        let file = match self.device_file {
            Some(ref file) => file,
            None           => {
                let fixed = fixed_size(size, DEFAULT_MAX_ORDER).ok_or(Error::BadArgument)?;
                return Ok((fixed, None));
            }
        };

        let mut data = AllocRequest::new(size);
        unsafe { ioctl_alloc(file.as_raw_fd(), &mut data) }?;
        let (fixed, region) = accept(data, size)?;
        Ok((fixed, Some(region)))
    }

    /// Allocate a secure memory region of at least 'size' bytes and map it
    ///
    /// The region is released by the kernel when the returned Region is
    /// dropped.
    pub fn alloc(&self, size: usize) -> Result<Region, Error> {
        let region = match self.request(size)? {
            (fixed, Some(file)) => Region::map(file, fixed)?,
            (fixed, None)       => Region::anonymous(fixed)?,
        };

        info!("teectl: allocated {:#x} bytes at {:#x}", region.size(), region.addr());
        Ok(region)
    }
}

/// Take ownership of the descriptor in 'reply' and check the reply
///
/// The descriptor is closed if the reply is rejected.
fn accept(reply: AllocRequest, requested: usize) -> Result<(usize, File), Error> {
    if reply.fd < 0 {
        return Err(Error::BadState);
    }

    let file = unsafe { File::from_raw_fd(reply.fd) };
    if reply.size < requested {
        return Err(Error::BadState);
    }

    debug!("teectl: region fd {}, size {:#x}", reply.fd, reply.size);
    Ok((reply.size, file))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::os::unix::io::IntoRawFd;

    use edge::PAGE_SIZE;
    use nix::errno::Errno;
    use nix::fcntl::{fcntl, FcntlArg};

    #[test]
    fn simulated_sizes_follow_device_size_classes() {
        let device = Device::open(TEECTL_NULL_DEVICE).unwrap();

        assert_eq!(device.alloc(5 * PAGE_SIZE).unwrap().size(), 8 * PAGE_SIZE);
        assert_eq!(device.alloc(0).unwrap().size(), PAGE_SIZE);
        assert!(matches!(device.alloc(usize::MAX), Err(Error::BadArgument)));
    }

    #[test]
    fn short_reply_closes_the_descriptor() {
        let fd = File::open("/dev/null").unwrap().into_raw_fd();

        let reply = AllocRequest{size: PAGE_SIZE, fd: fd};
        assert!(matches!(accept(reply, 2 * PAGE_SIZE), Err(Error::BadState)));
        assert_eq!(fcntl(fd, FcntlArg::F_GETFD), Err(Errno::EBADF));
    }

    #[test]
    fn accepted_reply_keeps_the_descriptor() {
        let fd = File::open("/dev/null").unwrap().into_raw_fd();

        let reply = AllocRequest{size: 2 * PAGE_SIZE, fd: fd};
        let (size, file) = accept(reply, PAGE_SIZE).unwrap();
        assert_eq!(size, 2 * PAGE_SIZE);
        assert_eq!(file.as_raw_fd(), fd);

        assert!(matches!(accept(AllocRequest::new(PAGE_SIZE), PAGE_SIZE),
                         Err(Error::BadState)));
    }
}
