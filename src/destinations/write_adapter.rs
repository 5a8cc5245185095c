//! Direct-I/O capability dance (spec §9 "Direct-I/O probing"): remembers
//! whether O_DIRECT has already been disabled for a descriptor and retries
//! the operation once after turning it off on `EINVAL`.

use std::io::{self, ErrorKind, Write};
use std::os::unix::io::{AsRawFd, RawFd};
#[cfg(unix)]
use std::os::unix::io::BorrowedFd;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use nix::fcntl::{fcntl, FcntlArg, OFlag};

pub struct WriteAdapter {
    direct_disabled: AtomicBool,
}

impl WriteAdapter {
    pub fn new(direct_io_requested: bool) -> Self {
        Self { direct_disabled: AtomicBool::new(!direct_io_requested) }
    }

    pub fn direct_io_active(&self) -> bool {
        !self.direct_disabled.load(Ordering::Relaxed)
    }

    /// Disable O_DIRECT on `fd` if it hasn't been disabled already. Returns
    /// `true` if this call actually flipped the flag (so the caller knows a
    /// retry is worth attempting).
    #[cfg(unix)]
    pub fn disable_direct_io_fd(&self, raw: RawFd) -> bool {
        if self.direct_disabled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let fd = unsafe { BorrowedFd::borrow_raw(raw) };
        if let Ok(flags) = fcntl(fd, FcntlArg::F_GETFL) {
            let mut flags = OFlag::from_bits_truncate(flags);
            flags.remove(OFlag::O_DIRECT);
            let _ = fcntl(fd, FcntlArg::F_SETFL(flags));
        }
        true
    }

    #[cfg(not(unix))]
    pub fn disable_direct_io_fd(&self, _raw: RawFd) -> bool {
        !self.direct_disabled.swap(true, Ordering::AcqRel)
    }

    pub fn disable_direct_io(&self, fd: &impl AsRawFd) -> bool {
        self.disable_direct_io_fd(fd.as_raw_fd())
    }

    /// Write the whole buffer to `writer`, retrying transparently on
    /// `EINTR` and once more on `EINVAL` after disabling direct I/O
    /// (spec §4.4, §4.6 step 7, §7 kind 2).
    pub fn write_all<W: Write + AsRawFd>(&self, writer: &mut W, mut buf: &[u8]) -> io::Result<()> {
        let mut einval_retried = false;
        while !buf.is_empty() {
            match writer.write(buf) {
                Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "write returned 0")),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.raw_os_error() == Some(libc::EINVAL) && !einval_retried => {
                    einval_retried = true;
                    self.disable_direct_io_fd(writer.as_raw_fd());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempfile;

    #[test]
    fn writes_full_buffer() {
        let adapter = WriteAdapter::new(false);
        let mut file = tempfile().unwrap();
        adapter.write_all(&mut file, b"hello world").unwrap();
    }

    #[test]
    fn disable_direct_io_is_idempotent() {
        let adapter = WriteAdapter::new(true);
        let file = tempfile().unwrap();
        assert!(adapter.disable_direct_io(&file));
        assert!(!adapter.disable_direct_io(&file));
        assert!(!adapter.direct_io_active());
    }
}
