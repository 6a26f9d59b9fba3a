//! UDP transport over host sockets.
//!
//! One non-blocking socket is opened per local port the engines send from, so
//! replies to a port (DNS on 53, NTP on 123, TFTP on its transfer port) can be
//! read back with [`UdpTransport::recv_from`].

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use super::{constants, Endpoint, FrameWriter, Result, Transport, TransportError};

/// UDP transport bound to a local IPv4 address
#[derive(Debug)]
pub struct UdpTransport {
    local: Ipv4Addr,
    mac: [u8; 6],
    sockets: Vec<(u16, UdpSocket)>,
    writer: FrameWriter,
    current: Option<(Ipv4Addr, u16, u16)>,
}

impl UdpTransport {
    /// Create a transport sending from `local`. `mac` is reported to the
    /// engines that seed identifiers from it.
    pub fn new(local: Ipv4Addr, mac: [u8; 6]) -> Self {
        Self {
            local,
            mac,
            sockets: Vec::new(),
            writer: FrameWriter::new(constants::MAX_TXBUFF_SIZE),
            current: None,
        }
    }

    fn create_socket(local: Ipv4Addr, port: u16) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        let bind_addr = SocketAddrV4::new(local, port);
        socket.bind(&bind_addr.into())?;
        log::debug!("bound UDP socket to {}", bind_addr);

        Ok(socket.into())
    }

    /// Socket for `port`, opening it on first use
    pub fn socket(&mut self, port: u16) -> Result<&UdpSocket> {
        let index = match self.sockets.iter().position(|(p, _)| *p == port) {
            Some(index) => index,
            None => {
                let socket = Self::create_socket(self.local, port)?;
                self.sockets.push((port, socket));
                self.sockets.len() - 1
            }
        };
        Ok(&self.sockets[index].1)
    }

    /// Read one datagram addressed to `port`, if one is waiting
    pub fn recv_from(
        &mut self,
        port: u16,
        buf: &mut [u8],
    ) -> Result<Option<(usize, SocketAddrV4)>> {
        let socket = self.socket(port)?;
        match socket.recv_from(buf) {
            Ok((len, std::net::SocketAddr::V4(peer))) => Ok(Some((len, peer))),
            Ok((_, peer)) => {
                log::debug!("ignoring datagram from {}", peer);
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

impl Transport for UdpTransport {
    fn start(&mut self, endpoint: &Endpoint) -> Result<()> {
        match *endpoint {
            Endpoint::Udp {
                dest,
                src_port,
                dest_port,
            } => {
                self.writer.clear();
                self.current = Some((dest, src_port, dest_port));
                Ok(())
            }
            Endpoint::Ethernet { .. } => Err(TransportError::Unsupported(
                "raw Ethernet frames over a UDP socket",
            )),
        }
    }

    fn writer(&mut self) -> &mut FrameWriter {
        &mut self.writer
    }

    fn send(&mut self) -> Result<usize> {
        let (dest, src_port, dest_port) = self.current.take().ok_or(TransportError::NotStarted)?;
        let payload = self.writer.as_bytes().to_vec();
        self.writer.clear();

        let target = SocketAddrV4::new(dest, dest_port);
        log::trace!("send {} -> {}: {}", src_port, target, hex::encode(&payload));
        let socket = self.socket(src_port)?;
        Ok(socket.send_to(&payload, target)?)
    }

    fn local_mac(&self) -> [u8; 6] {
        self.mac
    }

    fn local_ipv4(&self) -> Ipv4Addr {
        self.local
    }
}
