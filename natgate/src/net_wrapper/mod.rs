use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use thiserror::Error;
use tokio::net::{lookup_host, TcpSocket, TcpStream};

/// `TCP_MULTIPATH_ENABLE` of the multipath-tcp.org kernel.
pub const TCP_MULTIPATH: libc::c_int = 42;

#[derive(Debug, Error)]
pub enum DialError {
    #[error("resolving {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("no IPv4 address for {0}")]
    NoAddress(String),
    #[error("creating socket: {0}")]
    Socket(#[source] io::Error),
    #[error("binding socket to device {interface}: {source}")]
    BindDevice {
        interface: String,
        #[source]
        source: io::Error,
    },
    #[error("enabling multipath TCP: {0}")]
    Multipath(#[source] io::Error),
    #[error("connecting to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

pub async fn connect_tcp(addr: SocketAddr) -> io::Result<TcpStream> {
    let sock = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;
    sock.connect(addr).await
}

/// Opens a TCP connection to `addr` that leaves through `interface` with
/// multipath TCP enabled.
///
/// Steps run in order and stop at the first failure. The socket is owned
/// throughout, so it is closed on every error path and no half-configured
/// connection is ever handed back.
pub async fn connect_mptcp(addr: &str, interface: &str) -> Result<TcpStream, DialError> {
    let target = resolve_v4(addr).await?;

    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(DialError::Socket)?;
    socket
        .bind_device(Some(interface.as_bytes()))
        .map_err(|source| DialError::BindDevice {
            interface: interface.to_owned(),
            source,
        })?;
    enable_multipath(&socket).map_err(DialError::Multipath)?;
    connect_socket(socket, target).await
}

/// Hands a configured blocking socket to tokio and connects it.
async fn connect_socket(socket: Socket, target: SocketAddr) -> Result<TcpStream, DialError> {
    socket.set_nonblocking(true).map_err(DialError::Socket)?;
    let socket = TcpSocket::from_std_stream(socket.into());
    socket
        .connect(target)
        .await
        .map_err(|source| DialError::Connect {
            addr: target,
            source,
        })
}

async fn resolve_v4(addr: &str) -> Result<SocketAddr, DialError> {
    let mut addrs = lookup_host(addr)
        .await
        .map_err(|source| DialError::Resolve {
            addr: addr.to_owned(),
            source,
        })?;
    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| DialError::NoAddress(addr.to_owned()))
}

fn enable_multipath(socket: &Socket) -> io::Result<()> {
    let enable: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_TCP,
            TCP_MULTIPATH,
            &enable as *const _ as *const libc::c_void,
            mem::size_of_val(&enable) as libc::socklen_t,
        )
    };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
