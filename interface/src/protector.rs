use crate::error::ProtectorError;
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use std::ffi::c_void;
use std::num::NonZeroUsize;

fn page_size() -> usize {
    // SAFETY: `sysconf(_SC_PAGESIZE)` is always available on Linux and never fails.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// A fixed-address virtual memory window reserved as inaccessible (no read, no write, no
/// execute), private and anonymous. Created, mapped at a fixed address, released on drop.
#[derive(Debug)]
pub struct ProtectedRegion {
    base: usize,
    size: usize,
}

impl ProtectedRegion {
    /// Reserves `[base, base + size)` as `PROT_NONE`. Fails if `base` isn't page-aligned, `size`
    /// isn't a non-zero multiple of the page size, or the platform can't honor the fixed address
    /// (e.g. the range is already mapped).
    pub fn reserve(base: usize, size: usize) -> Result<Self, ProtectorError> {
        let page_size = page_size();
        if !base.is_multiple_of(page_size) {
            return Err(ProtectorError::Misaligned(base));
        }
        if size == 0 || !size.is_multiple_of(page_size) {
            return Err(ProtectorError::InvalidSize);
        }

        let addr = NonZeroUsize::new(base);
        let len = NonZeroUsize::new(size).ok_or(ProtectorError::InvalidSize)?;

        // SAFETY: we request a fixed, anonymous, private mapping with no access permissions;
        // the kernel either places it exactly at `base` or we treat the call as failed.
        let mapped = unsafe {
            mmap(
                addr,
                len,
                ProtFlags::PROT_NONE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS | MapFlags::MAP_FIXED_NOREPLACE,
                None::<std::os::fd::BorrowedFd>,
                0,
            )
        }
        .map_err(|source| ProtectorError::MapFailed { address: base, source })?;

        debug_assert_eq!(mapped as usize, base, "MAP_FIXED_NOREPLACE must land exactly at `base`");

        Ok(ProtectedRegion { base, size })
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.base && address < self.base + self.size
    }
}

impl Drop for ProtectedRegion {
    fn drop(&mut self) {
        // SAFETY: `self.base`/`self.size` were established by a successful `mmap` above and
        // haven't been touched since; releasing them on drop mirrors `unregister_device`/`cleanup`.
        let result = unsafe { munmap(self.base as *mut c_void as *mut _, self.size) };
        if let Err(source) = result {
            tracing::warn!(
                error = %ProtectorError::UnmapFailed { address: self.base, source },
                "failed to release protected region"
            );
        }
    }
}
