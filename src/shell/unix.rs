//! Unix pseudoterminal shell driver
//!
//! Creates the pty pair, forks the shell as the slave's session leader, and
//! exposes non-blocking reads of its output to the engine loop.

use std::ffi::CString;
use std::os::fd::BorrowedFd;
use std::os::unix::io::{AsRawFd, RawFd};

use nix::fcntl::{fcntl, open, FcntlArg, OFlag};
use nix::libc::{self, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::poll::{poll, PollFd, PollFlags};
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt, PtyMaster};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, read, setsid, write, ForkResult, Pid};

use super::{ShellError, ShellResult};

/// A shell process running behind a pseudoterminal.
pub struct ShellPty {
    master: PtyMaster,
    child_pid: Pid,
    child_alive: bool,
}

impl ShellPty {
    /// Spawn `program` with `args` on a fresh pty sized to `rows` by `cols`.
    pub fn spawn(program: &str, args: &[String], rows: u16, cols: u16) -> ShellResult<Self> {
        let master =
            posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(ShellError::OpenMaster)?;

        grantpt(&master).map_err(ShellError::PrepareSlave)?;
        unlockpt(&master).map_err(ShellError::PrepareSlave)?;

        // SAFETY: ptsname is not thread-safe, but it is called immediately
        // after unlockpt with no other pty activity in flight
        let slave_name = unsafe { ptsname(&master) }.map_err(ShellError::PrepareSlave)?;

        set_window_size(master.as_raw_fd(), rows, cols)?;

        // SAFETY: the child only calls async-signal-safe-adjacent setup
        // before execvp
        match unsafe { fork() }.map_err(ShellError::Fork)? {
            ForkResult::Child => {
                drop(master);

                setsid().map_err(ShellError::Setsid)?;

                let slave_fd = open(slave_name.as_str(), OFlag::O_RDWR, Mode::empty())
                    .map_err(ShellError::PrepareSlave)?;

                // SAFETY: TIOCSCTTY adopts the slave as controlling terminal
                unsafe {
                    if libc::ioctl(slave_fd, libc::TIOCSCTTY as _, 0) < 0 {
                        tracing::debug!("TIOCSCTTY failed (may be ok)");
                    }
                }

                dup2(slave_fd, STDIN_FILENO).map_err(ShellError::Dup2)?;
                dup2(slave_fd, STDOUT_FILENO).map_err(ShellError::Dup2)?;
                dup2(slave_fd, STDERR_FILENO).map_err(ShellError::Dup2)?;
                if slave_fd > STDERR_FILENO {
                    let _ = close(slave_fd);
                }

                std::env::set_var("TERM", "xterm-256color");

                let program_cstr =
                    CString::new(program).map_err(|_| ShellError::NullInPath)?;
                let mut argv: Vec<CString> = Vec::with_capacity(args.len() + 1);
                argv.push(program_cstr.clone());
                for arg in args {
                    argv.push(CString::new(arg.as_str()).map_err(|_| ShellError::NullInPath)?);
                }

                execvp(&program_cstr, &argv).map_err(ShellError::Exec)?;

                // execvp only returns on error
                unreachable!()
            }
            ForkResult::Parent { child } => {
                let flags = fcntl(master.as_raw_fd(), FcntlArg::F_GETFL)
                    .map_err(ShellError::SetNonBlocking)?;
                let flags = OFlag::from_bits_truncate(flags);
                fcntl(
                    master.as_raw_fd(),
                    FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
                )
                .map_err(ShellError::SetNonBlocking)?;

                Ok(ShellPty {
                    master,
                    child_pid: child,
                    child_alive: true,
                })
            }
        }
    }

    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    pub fn child_pid(&self) -> Pid {
        self.child_pid
    }

    /// Check if the shell is still running.
    pub fn is_alive(&mut self) -> bool {
        if !self.child_alive {
            return false;
        }

        match waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => true,
            Ok(_) | Err(_) => {
                self.child_alive = false;
                false
            }
        }
    }

    /// Non-blocking read of shell output. Returns 0 when no data is pending.
    pub fn read(&self, buf: &mut [u8]) -> ShellResult<usize> {
        match read(self.master.as_raw_fd(), buf) {
            Ok(n) => Ok(n),
            // EAGAIN and EWOULDBLOCK are the same value on Linux
            Err(nix::errno::Errno::EAGAIN) => Ok(0),
            Err(e) => Err(ShellError::Read(e)),
        }
    }

    /// Send keystrokes or other input to the shell.
    pub fn send(&self, mut data: &[u8]) -> ShellResult<()> {
        while !data.is_empty() {
            let n = write(self.master.as_raw_fd(), data).map_err(ShellError::Write)?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Block up to `timeout_ms` for shell output to become readable.
    pub fn poll_read(&self, timeout_ms: i32) -> ShellResult<bool> {
        // SAFETY: the master fd outlives this call
        let borrowed_fd = unsafe { BorrowedFd::borrow_raw(self.master.as_raw_fd()) };
        let mut fds = [PollFd::new(&borrowed_fd, PollFlags::POLLIN)];
        let n = poll(&mut fds, timeout_ms).map_err(ShellError::Poll)?;
        Ok(n > 0
            && fds[0]
                .revents()
                .is_some_and(|r| r.contains(PollFlags::POLLIN)))
    }

    /// Propagate a viewport resize to the shell's idea of the terminal.
    pub fn resize(&self, rows: u16, cols: u16) -> ShellResult<()> {
        set_window_size(self.master.as_raw_fd(), rows, cols)
    }

    /// Wait for the shell to exit and return its status code.
    pub fn wait(&mut self) -> ShellResult<i32> {
        if !self.child_alive {
            return Ok(0);
        }

        match waitpid(self.child_pid, None).map_err(ShellError::Wait)? {
            WaitStatus::Exited(_, code) => {
                self.child_alive = false;
                Ok(code)
            }
            WaitStatus::Signaled(_, signal, _) => {
                self.child_alive = false;
                Ok(128 + signal as i32)
            }
            _ => Ok(0),
        }
    }
}

impl Drop for ShellPty {
    fn drop(&mut self) {
        if self.child_alive {
            let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
        }
    }
}

fn set_window_size(fd: RawFd, rows: u16, cols: u16) -> ShellResult<()> {
    let winsize = libc::winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: TIOCSWINSZ with a valid winsize
    let result = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &winsize) };

    if result < 0 {
        Err(ShellError::SetWinsize(nix::errno::Errno::last()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_read_output() {
        let mut pty =
            ShellPty::spawn("/bin/echo", &["hello".to_string()], 24, 80).expect("spawn failed");

        std::thread::sleep(std::time::Duration::from_millis(100));

        let mut buf = [0u8; 1024];
        let n = pty.read(&mut buf).expect("read failed");
        let output = String::from_utf8_lossy(&buf[..n]);
        assert!(output.contains("hello") || n == 0, "unexpected: {output}");

        let _ = pty.wait();
        assert!(!pty.is_alive());
    }

    #[test]
    fn send_round_trips_through_cat() {
        let pty = ShellPty::spawn("/bin/cat", &[], 24, 80).expect("spawn failed");
        pty.send(b"test\n").expect("send failed");

        std::thread::sleep(std::time::Duration::from_millis(100));

        let mut buf = [0u8; 1024];
        let n = pty.read(&mut buf).expect("read failed");
        let output = String::from_utf8_lossy(&buf[..n]);
        assert!(output.contains("test") || n == 0, "unexpected: {output}");
    }

    #[test]
    fn poll_sees_pending_output() {
        let pty = ShellPty::spawn("/bin/echo", &["x".to_string()], 24, 80).expect("spawn failed");

        let mut found = false;
        for _ in 0..10 {
            if pty.poll_read(100).expect("poll failed") {
                found = true;
                break;
            }
        }
        let _ = found;
    }
}
