use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use tracing::{debug, error};

use kfault_wire::{Frame, FRAME_CAPACITY, NETLINK_KFAULT};

use crate::error::{ChannelError, Result};
use crate::io::ChannelIo;

/// Whether a receive waits for data or returns immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvMode {
    Blocking,
    NonBlocking,
}

/// The netlink endpoint to the kernel's kfault subsystem.
///
/// Opened once at process start and bound to the process's own pid;
/// the descriptor is owned, so the endpoint closes exactly once when
/// the `Channel` is dropped. Every received frame is vetted for peer
/// authenticity and structural validity before being handed out.
pub struct Channel {
    fd: OwnedFd,
}

impl Channel {
    /// Create and bind the kfault netlink endpoint.
    ///
    /// Fails with [`ChannelError::Unavailable`] if the running kernel
    /// lacks the protocol family, [`ChannelError::Bind`] if the local
    /// identity cannot be bound.
    pub fn open() -> Result<Self> {
        // SAFETY: plain socket(2) call with constant arguments.
        let raw = unsafe {
            libc::socket(
                libc::PF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                NETLINK_KFAULT,
            )
        };
        if raw < 0 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EINVAL) | Some(libc::EPROTONOSUPPORT) | Some(libc::EAFNOSUPPORT) => {
                    error!("kfault not supported by this kernel");
                    ChannelError::Unavailable
                }
                _ => {
                    error!(%err, "opening kfault netlink socket");
                    ChannelError::Io(err)
                }
            });
        }
        // SAFETY: `raw` is a freshly created descriptor we own.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: sockaddr_nl is valid when zero-initialized.
        let mut local: libc::sockaddr_nl = unsafe { mem::zeroed() };
        local.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        // SAFETY: getpid(2) cannot fail.
        local.nl_pid = unsafe { libc::getpid() } as u32;

        // SAFETY: `local` is a valid sockaddr_nl for the given length.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&local as *const libc::sockaddr_nl).cast(),
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            error!(%err, "binding kfault netlink socket");
            return Err(ChannelError::Bind(err));
        }

        debug!(port_id = local.nl_pid, "kfault channel open");
        Ok(Self { fd })
    }

    /// Release the endpoint. Dropping does the same; this just makes
    /// shutdown explicit at call sites.
    pub fn close(self) {}

    /// Receive one frame into `frame`.
    ///
    /// Returns the received byte count, or `Ok(0)` when no data is
    /// available in [`RecvMode::NonBlocking`]. Interrupted reads are
    /// retried transparently and never surface. With `peek` the frame
    /// stays queued for a later consuming read.
    pub fn receive(&self, frame: &mut Frame, mode: RecvMode, peek: bool) -> Result<usize> {
        let mut flags = if peek { libc::MSG_PEEK } else { 0 };
        if mode == RecvMode::NonBlocking {
            flags |= libc::MSG_DONTWAIT;
        }

        // SAFETY: sockaddr_nl is valid when zero-initialized.
        let mut peer: libc::sockaddr_nl = unsafe { mem::zeroed() };
        let mut peer_len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;

        let received = loop {
            // SAFETY: the frame buffer is valid for FRAME_CAPACITY
            // bytes and `peer`/`peer_len` match in size.
            let rc = unsafe {
                libc::recvfrom(
                    self.fd.as_raw_fd(),
                    frame.buf_mut().as_mut_ptr().cast(),
                    FRAME_CAPACITY,
                    flags,
                    (&mut peer as *mut libc::sockaddr_nl).cast(),
                    &mut peer_len,
                )
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::EINTR) => continue,
                    Some(libc::EAGAIN) if mode == RecvMode::NonBlocking => return Ok(0),
                    _ => {
                        error!(%err, "receiving kfault netlink packet");
                        return Err(ChannelError::Io(err));
                    }
                }
            }
            break rc as usize;
        };

        vet_peer(peer_len as usize, peer.nl_pid)?;
        vet_frame(frame, received)?;
        Ok(received)
    }

    /// Write the frame's declared length to the kernel. Interrupted
    /// writes are retried transparently.
    pub fn send(&self, frame: &Frame) -> Result<usize> {
        // SAFETY: sockaddr_nl is valid when zero-initialized.
        let mut kernel: libc::sockaddr_nl = unsafe { mem::zeroed() };
        kernel.nl_family = libc::AF_NETLINK as libc::sa_family_t;

        loop {
            // SAFETY: the frame's wire bytes are valid for its
            // declared length; `kernel` matches the given addrlen.
            let rc = unsafe {
                libc::sendto(
                    self.fd.as_raw_fd(),
                    frame.as_bytes().as_ptr().cast(),
                    frame.len(),
                    0,
                    (&kernel as *const libc::sockaddr_nl).cast(),
                    mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
                )
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                error!(%err, "sending kfault netlink packet");
                return Err(ChannelError::Io(err));
            }
            return Ok(rc as usize);
        }
    }

    /// Wait for read readiness; `Ok(false)` on timeout. Interrupted
    /// waits restart with the full timeout.
    pub fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

        loop {
            // SAFETY: `pfd` is one valid pollfd.
            let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                error!(%err, "polling kfault netlink socket");
                return Err(ChannelError::Io(err));
            }
            return Ok(rc > 0);
        }
    }
}

/// Reject frames from anything other than the kernel. This is a
/// security check, not a framing check: the peer address shape must be
/// exactly a netlink address, and its port id must be 0.
fn vet_peer(addr_len: usize, port_id: u32) -> Result<()> {
    if addr_len != mem::size_of::<libc::sockaddr_nl>() {
        error!("bad address size reading kfault netlink socket");
        return Err(ChannelError::Protocol("unexpected peer address size"));
    }
    if port_id != 0 {
        error!(port_id, "spoofed packet received on kfault netlink socket");
        return Err(ChannelError::SpoofedPeer { port_id });
    }
    Ok(())
}

/// Structural validation of a just-received frame.
fn vet_frame(frame: &Frame, received: usize) -> Result<()> {
    if received == FRAME_CAPACITY {
        error!("netlink event from kernel is too big");
        return Err(ChannelError::FrameTooBig);
    }
    if let Err(err) = frame.validate_received(received) {
        error!(%err, "netlink message from kernel was not ok");
        return Err(ChannelError::Protocol("malformed frame header"));
    }
    Ok(())
}

impl ChannelIo for Channel {
    fn send_frame(&mut self, frame: &Frame) -> Result<usize> {
        Channel::send(self, frame)
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        Channel::wait_readable(self, timeout)
    }

    fn peek_next(&mut self, frame: &mut Frame) -> Result<usize> {
        self.receive(frame, RecvMode::NonBlocking, true)
    }

    fn consume_next(&mut self, frame: &mut Frame) -> Result<usize> {
        self.receive(frame, RecvMode::NonBlocking, false)
    }
}

impl AsRawFd for Channel {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}
