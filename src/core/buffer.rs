//! Shared memory for gamma tables.
//!
//! The table is written into an unnamed file mapped `MAP_SHARED`, so the
//! compositor reads exactly what was written once it receives the fd.
//! The file never has a persistent name: it is created with `O_TMPFILE`
//! where available and unlinked right after creation otherwise.

use std::fs::File;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd};
use std::path::PathBuf;
use std::ptr::NonNull;

use crate::core::errors::{GammaError, Result};
use crate::core::ramp::{self, GammaTable};

/// Directory the backing file is created in.
///
/// `XDG_RUNTIME_DIR` is memory-backed on most systems; fall back to the
/// system temp dir when it is unset.
fn backing_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(std::env::temp_dir)
}

fn anonymous_file(size: usize) -> std::io::Result<File> {
    let file = tempfile::tempfile_in(backing_dir())?;
    file.set_len(size as u64)?;
    Ok(file)
}

/// A mapped, fd-backed gamma table for one output.
///
/// Dropping it unmaps the memory and closes the fd. The compositor keeps
/// its own duplicate of the fd once the table has been submitted.
pub struct SharedTable {
    file: File,
    ptr: NonNull<u16>,
    ramp_size: u32,
    len: usize,
}

impl SharedTable {
    /// Create and map a zeroed table sized for `ramp_size`.
    pub fn allocate(ramp_size: u32) -> Result<Self> {
        let len = ramp::table_len(ramp_size)?;
        let byte_size = len * std::mem::size_of::<u16>();

        let file = anonymous_file(byte_size).map_err(GammaError::BufferUnavailable)?;

        // SAFETY: the fd is valid and sized to byte_size above
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                byte_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = std::io::Error::last_os_error();
            tracing::error!("Failed to mmap gamma table (fd={}, size={})", file.as_raw_fd(), byte_size);
            return Err(GammaError::BufferUnavailable(err));
        }
        let ptr = NonNull::new(ptr as *mut u16)
            .ok_or_else(|| GammaError::BufferUnavailable(std::io::Error::other("mmap returned null")))?;

        tracing::debug!("Allocated gamma table: ramp_size={} bytes={}", ramp_size, byte_size);

        Ok(Self {
            file,
            ptr,
            ramp_size,
            len,
        })
    }

    pub fn ramp_size(&self) -> u32 {
        self.ramp_size
    }

    pub fn byte_size(&self) -> usize {
        self.len * std::mem::size_of::<u16>()
    }

    pub fn as_slice(&self) -> &[u16] {
        // SAFETY: the mapping is page aligned and holds len u16 entries until drop
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        // SAFETY: as above, and &mut self guarantees exclusive access on our side
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Copy a generated table into the mapping.
    pub fn write_table(&mut self, table: &GammaTable) -> Result<()> {
        let source = table.as_slice();
        if source.len() != self.len {
            return Err(GammaError::TableSizeMismatch {
                expected: self.len,
                actual: source.len(),
            });
        }
        self.as_mut_slice().copy_from_slice(source);
        Ok(())
    }
}

impl AsFd for SharedTable {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl Drop for SharedTable {
    fn drop(&mut self) {
        // SAFETY: ptr/byte_size are exactly what mmap returned in allocate()
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.byte_size());
        }
    }
}
