//! UDP socket setup shared by the data/command connection and the input
//! receiver.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::error::{GroovyError, Result};

pub const DATA_PORT: u16 = 32100;

/// Resolves `host:port`, returning an argument error if resolution fails
/// rather than propagating a raw DNS error, since an unresolvable host at
/// connect time is a caller mistake, not a transient transport fault.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| GroovyError::Argument(format!("could not resolve host: {host}")))
}

/// Binds an ephemeral local socket, connects it to `addr`, and puts it in
/// non-blocking mode — tick and submit never wait on this socket.
pub fn connect_data_socket(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    socket.connect(addr)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}
