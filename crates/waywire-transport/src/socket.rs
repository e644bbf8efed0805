use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::ptr;
use std::time::Duration;

use tracing::{debug, trace, warn};
use waywire_engine::OutputSink;

use crate::error::{Result, TransportError};
use crate::path::{check_len, socket_path};

/// Most descriptors the compositor attaches to one `recvmsg`.
pub const MAX_FDS_PER_READ: usize = 28;

#[cfg(target_os = "linux")]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(target_os = "linux"))]
const SEND_FLAGS: libc::c_int = 0;

#[cfg(target_os = "linux")]
const RECV_FLAGS: libc::c_int = libc::MSG_CMSG_CLOEXEC;
#[cfg(not(target_os = "linux"))]
const RECV_FLAGS: libc::c_int = 0;

/// A connected compositor socket.
///
/// Bytes and file descriptors are exchanged with `sendmsg`/`recvmsg`;
/// descriptors travel as `SCM_RIGHTS` control messages.
pub struct WaylandSocket {
    stream: UnixStream,
    path: Option<PathBuf>,
}

impl WaylandSocket {
    /// Connect to the compositor named by the environment (blocking).
    pub fn connect() -> Result<Self> {
        Self::connect_to(socket_path()?)
    }

    /// Connect to a compositor socket at `path` (blocking).
    pub fn connect_to(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_len(path)?;
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to compositor socket");
        Ok(Self {
            stream,
            path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an already connected stream, such as one end of a socket pair.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream, path: None }
    }

    /// The path this socket was connected to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// An [`OutputSink`] writing to this socket.
    pub fn writer(&self) -> Result<SocketWriter> {
        Ok(SocketWriter {
            stream: self.stream.try_clone()?,
        })
    }

    /// Write all of `data`, attaching `fds` to the first chunk.
    pub fn send(&self, data: &[u8], fds: &[RawFd]) -> io::Result<()> {
        send_all(&self.stream, data, fds)
    }

    /// Read one chunk into `buf`, appending received descriptors to `fds`.
    ///
    /// Returns 0 when the compositor has closed the connection.
    pub fn recv(&self, buf: &mut [u8], fds: &mut Vec<OwnedFd>) -> io::Result<usize> {
        recv_with_fds(&self.stream, buf, fds)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Get the credentials of the compositor process (Linux only).
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`, or `None` if unavailable.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        let fd = self.stream.as_raw_fd();
        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this process.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    /// Get the credentials of the compositor process.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

impl AsRawFd for WaylandSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl std::fmt::Debug for WaylandSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaylandSocket")
            .field("fd", &self.stream.as_raw_fd())
            .field("path", &self.path)
            .finish()
    }
}

/// Output half of a [`WaylandSocket`], handed to the engine.
#[derive(Debug)]
pub struct SocketWriter {
    stream: UnixStream,
}

impl OutputSink for SocketWriter {
    fn on_output(&mut self, data: &[u8], fds: &[RawFd]) -> io::Result<()> {
        trace!(len = data.len(), fds = fds.len(), "sending");
        send_all(&self.stream, data, fds)
    }
}

fn cmsg_space(fd_count: usize) -> usize {
    let bytes = (fd_count * mem::size_of::<RawFd>()) as libc::c_uint;
    // CMSG_SPACE is a safe const fn on some targets and unsafe on others
    #[allow(unused_unsafe)]
    let space = unsafe { libc::CMSG_SPACE(bytes) };
    space as usize
}

fn cmsg_len(fd_count: usize) -> usize {
    let bytes = (fd_count * mem::size_of::<RawFd>()) as libc::c_uint;
    #[allow(unused_unsafe)]
    let len = unsafe { libc::CMSG_LEN(bytes) };
    len as usize
}

fn send_all(stream: &UnixStream, mut data: &[u8], mut fds: &[RawFd]) -> io::Result<()> {
    while !data.is_empty() {
        let sent = send_once(stream.as_raw_fd(), data, fds)?;
        if sent == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        // descriptors go out with the first chunk only
        fds = &[];
        data = &data[sent..];
    }
    Ok(())
}

fn send_once(fd: RawFd, data: &[u8], fds: &[RawFd]) -> io::Result<usize> {
    let mut iov = libc::iovec {
        iov_base: data.as_ptr() as *mut libc::c_void,
        iov_len: data.len(),
    };

    // u64 storage keeps the control buffer aligned for cmsghdr
    let space = if fds.is_empty() { 0 } else { cmsg_space(fds.len()) };
    let mut control = vec![0u64; space.div_ceil(mem::size_of::<u64>())];

    // SAFETY: msghdr is a plain C struct for which all-zero is a valid value.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    if !fds.is_empty() {
        msg.msg_control = control.as_mut_ptr().cast::<libc::c_void>();
        msg.msg_controllen = space as _;

        // SAFETY: `control` holds CMSG_SPACE bytes for `fds.len()` descriptors,
        // so the first header and its data area lie inside the buffer.
        unsafe {
            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = cmsg_len(fds.len()) as _;
            ptr::copy_nonoverlapping(
                fds.as_ptr(),
                libc::CMSG_DATA(cmsg).cast::<RawFd>(),
                fds.len(),
            );
        }
    }

    loop {
        // SAFETY: `msg` points at live iovec and control buffers for the
        // duration of the call.
        let n = unsafe { libc::sendmsg(fd, &msg, SEND_FLAGS) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn recv_with_fds(
    stream: &UnixStream,
    buf: &mut [u8],
    fds: &mut Vec<OwnedFd>,
) -> io::Result<usize> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr().cast::<libc::c_void>(),
        iov_len: buf.len(),
    };
    let space = cmsg_space(MAX_FDS_PER_READ);
    let mut control = vec![0u64; space.div_ceil(mem::size_of::<u64>())];

    // SAFETY: msghdr is a plain C struct for which all-zero is a valid value.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast::<libc::c_void>();
    msg.msg_controllen = space as _;

    let read = loop {
        // SAFETY: `msg` points at live, writable iovec and control buffers.
        let n = unsafe { libc::recvmsg(stream.as_raw_fd(), &mut msg, RECV_FLAGS) };
        if n >= 0 {
            break n as usize;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    };

    let before = fds.len();
    // SAFETY: the kernel filled `msg_control` with well-formed headers and
    // set `msg_controllen`; the CMSG_* macros stay within that range. Each
    // SCM_RIGHTS entry is a new descriptor owned by this process.
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data = libc::CMSG_DATA(cmsg).cast::<RawFd>();
                let count = ((*cmsg).cmsg_len as usize - cmsg_len(0)) / mem::size_of::<RawFd>();
                for i in 0..count {
                    fds.push(OwnedFd::from_raw_fd(ptr::read_unaligned(data.add(i))));
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }

    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        warn!("ancillary data truncated; some descriptors were dropped");
    }
    trace!(read, fds = fds.len() - before, "received");
    Ok(read)
}
