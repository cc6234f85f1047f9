//! Roundtrip barriers.
//!
//! A barrier is a `wl_display.sync` request: once its `done` event has been
//! dispatched, every event the compositor queued before it has been handled.
//! Unbounded barriers use `EventQueue::roundtrip`; bounded ones issue their
//! own sync callback and poll the socket against a deadline.

use std::io;
use std::os::unix::io::{AsRawFd, BorrowedFd};
use std::time::Duration;

/// Bookkeeping for sync callbacks issued on the queue.
///
/// Callbacks complete in the order they were issued, so one counter per
/// direction is enough.
#[derive(Debug, Default)]
pub struct BarrierTracker {
    issued: u32,
    completed: u32,
}

impl BarrierTracker {
    /// Reserve the id for a new sync callback.
    pub fn issue(&mut self) -> u32 {
        self.issued = self.issued.wrapping_add(1);
        self.issued
    }

    /// The callback carrying `id` fired.
    pub fn complete(&mut self, id: u32) {
        if id.wrapping_sub(self.completed) as i32 > 0 {
            self.completed = id;
        }
    }

    pub fn is_reached(&self, id: u32) -> bool {
        self.completed.wrapping_sub(id) as i32 >= 0
    }

    pub fn pending(&self) -> u32 {
        self.issued.wrapping_sub(self.completed)
    }
}

/// Block until `fd` is readable or `timeout` elapses.
///
/// Returns false on timeout.
pub fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<bool> {
    // round up so a wake-up never lands before the deadline
    let millis = timeout
        .as_nanos()
        .div_ceil(1_000_000)
        .min(libc::c_int::MAX as u128) as libc::c_int;
    let mut pollfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        // SAFETY: pollfd is a single valid entry living on our stack
        let ret = unsafe { libc::poll(&mut pollfd, 1, millis) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(ret > 0);
    }
}
