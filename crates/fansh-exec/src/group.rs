//! Process-group signalling for spawned remote shells
//!
//! Each remote shell is started as the leader of a new process group so an
//! interrupt reaches wrapper scripts and any other descendants, not only the
//! direct child.

use std::io;

use tokio::process::{Child, Command};

/// Put the command's child in a fresh process group on spawn
pub fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// Handle to the process group led by a spawned child
#[derive(Debug, Clone, Copy)]
pub struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    /// Group of a child spawned after [`isolate`]
    ///
    /// Must be taken before the child is reaped.
    #[must_use]
    pub fn of(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    /// Deliver SIGINT to every process in the group
    ///
    /// # Errors
    /// Returns the OS error if the signal could not be delivered
    pub fn interrupt(&self) -> io::Result<()> {
        #[cfg(unix)]
        return self.signal(libc::SIGINT);
        #[cfg(not(unix))]
        return Err(unsupported());
    }

    /// Deliver SIGKILL to every process in the group
    ///
    /// # Errors
    /// Returns the OS error if the signal could not be delivered
    pub fn kill(&self) -> io::Result<()> {
        #[cfg(unix)]
        return self.signal(libc::SIGKILL);
        #[cfg(not(unix))]
        return Err(unsupported());
    }

    #[cfg(unix)]
    fn signal(&self, sig: libc::c_int) -> io::Result<()> {
        let Some(pgid) = self.pgid else {
            return Ok(());
        };
        let pgid = libc::pid_t::try_from(pgid)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: plain syscall; the group was created for this child by `isolate`
        let rc = unsafe { libc::kill(-pgid, sig) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        // group already gone
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// No process groups off Unix; callers fall back to the direct child
#[cfg(not(unix))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are not supported on this platform",
    )
}
