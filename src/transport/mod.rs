//! Transport Layer Module
//!
//! This module provides the byte-cursor transport the protocol engines write
//! their frames into and read inbound frames from.
//!
//! # Overview
//!
//! The transport layer handles:
//! - Bounded big-endian writes into a send buffer ([`FrameWriter`])
//! - Sequential big-endian reads over a received frame ([`FrameReader`])
//! - Frame addressing, either raw Ethernet or UDP ([`Endpoint`])
//! - Handing a finished frame to the link ([`Transport::send`])
//!
//! A frame is produced by calling [`Transport::start`] with its destination,
//! writing the payload through [`Transport::writer`], then calling
//! [`Transport::send`]. Writes past the frame limit fail without modifying the
//! buffer, so a caller can test whether a record fits and stop cleanly.
//!
//! # Example
//!
//! ```
//! use picostack_rs::transport::{Endpoint, MemoryTransport, Transport};
//! use core::net::Ipv4Addr;
//!
//! let mut transport = MemoryTransport::new([0x02, 0, 0, 0, 0, 1], Ipv4Addr::new(10, 0, 0, 2));
//! transport
//!     .start(&Endpoint::Udp { dest: Ipv4Addr::new(10, 0, 0, 1), src_port: 53, dest_port: 53 })
//!     .unwrap();
//! transport.writer().write_u16(0x1234).unwrap();
//! transport.send().unwrap();
//! assert_eq!(transport.sent()[0].payload, vec![0x12, 0x34]);
//! ```

#[cfg(feature = "std")]
use std::error::Error;

use core::fmt;
use core::net::Ipv4Addr;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use bytes::{BufMut, BytesMut};

#[cfg(feature = "std")]
mod udp;
#[cfg(feature = "std")]
pub use udp::UdpTransport;

/// Result type for transport operations
pub type Result<T> = core::result::Result<T, TransportError>;

/// Errors that can occur in transport operations
#[derive(Debug)]
pub enum TransportError {
    /// A write would exceed the frame limit
    BufferFull { needed: usize, available: usize },
    /// A read ran past the end of the frame
    UnexpectedEnd { needed: usize, available: usize },
    /// `send` was called without a preceding `start`
    NotStarted,
    /// The transport cannot reach this kind of endpoint
    Unsupported(&'static str),
    /// I/O error
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::BufferFull { needed, available } => write!(
                f,
                "Buffer full: need {} bytes, {} available",
                needed, available
            ),
            TransportError::UnexpectedEnd { needed, available } => write!(
                f,
                "Unexpected end of frame: need {} bytes, {} remaining",
                needed, available
            ),
            TransportError::NotStarted => write!(f, "No frame started"),
            TransportError::Unsupported(what) => write!(f, "Unsupported endpoint: {}", what),
            #[cfg(feature = "std")]
            TransportError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl Error for TransportError {}

#[cfg(feature = "std")]
impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io(error)
    }
}

/// Transport constants
pub mod constants {
    /// Largest frame payload the transport will queue
    pub const MAX_TXBUFF_SIZE: usize = 1500;
}

/// Where a frame is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Raw link-layer frame
    Ethernet { dest_mac: [u8; 6], ether_type: u16 },
    /// UDP datagram
    Udp {
        dest: Ipv4Addr,
        src_port: u16,
        dest_port: u16,
    },
}

/// Bounded big-endian writer over the send buffer
#[derive(Debug, Clone)]
pub struct FrameWriter {
    buf: BytesMut,
    limit: usize,
}

impl FrameWriter {
    /// Create a writer that accepts at most `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit),
            limit,
        }
    }

    /// Discard everything written so far
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Bytes queued so far
    pub fn byte_count(&self) -> usize {
        self.buf.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the frame limit. Callers shrink it to reserve trailing bytes.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Bytes that can still be written
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buf.len())
    }

    /// Fail unless `n` more bytes fit
    pub fn ensure(&self, n: usize) -> Result<()> {
        let available = self.remaining();
        if n > available {
            return Err(TransportError::BufferFull {
                needed: n,
                available,
            });
        }
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.ensure(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.ensure(2)?;
        self.buf.put_u16(value);
        Ok(())
    }

    /// Write the low 24 bits of `value`
    pub fn write_u24(&mut self, value: u32) -> Result<()> {
        self.ensure(3)?;
        self.buf.put_slice(&value.to_be_bytes()[1..]);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.ensure(4)?;
        self.buf.put_u32(value);
        Ok(())
    }

    pub fn write_block(&mut self, data: &[u8]) -> Result<()> {
        self.ensure(data.len())?;
        self.buf.put_slice(data);
        Ok(())
    }

    /// Write the bytes of `s` without a terminator
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_block(s.as_bytes())
    }

    /// Frame contents written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Sequential big-endian reader over a received frame
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Bytes consumed so far
    pub fn byte_count(&self) -> usize {
        self.position
    }

    /// The whole frame, independent of the read position
    pub fn frame(&self) -> &'a [u8] {
        self.data
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(TransportError::UnexpectedEnd {
                needed: n,
                available,
            });
        }
        let bytes = &self.data[self.position..self.position + n];
        self.position += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Borrow the next `n` bytes
    pub fn read_block(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Fill `out` from the frame
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<()> {
        let b = self.take(out.len())?;
        out.copy_from_slice(b);
        Ok(())
    }

    /// Skip `n` bytes
    pub fn dump(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Skip whatever is left of the frame
    pub fn discard(&mut self) {
        self.position = self.data.len();
    }
}

/// A frame handed to a [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub endpoint: Endpoint,
    pub payload: Vec<u8>,
}

/// The send side of a link, as seen by the protocol engines
pub trait Transport {
    /// Begin a new frame to `endpoint`, discarding any unsent data
    fn start(&mut self, endpoint: &Endpoint) -> Result<()>;

    /// Writer for the frame being built
    fn writer(&mut self) -> &mut FrameWriter;

    /// Hand the current frame to the link and return its length
    fn send(&mut self) -> Result<usize>;

    /// Hardware address of the interface
    fn local_mac(&self) -> [u8; 6];

    /// IPv4 address of the interface
    fn local_ipv4(&self) -> Ipv4Addr;
}

/// In-memory transport that records every frame it sends
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    mac: [u8; 6],
    ipv4: Ipv4Addr,
    writer: FrameWriter,
    current: Option<Endpoint>,
    sent: Vec<SentFrame>,
}

impl MemoryTransport {
    pub fn new(mac: [u8; 6], ipv4: Ipv4Addr) -> Self {
        Self::with_frame_limit(mac, ipv4, constants::MAX_TXBUFF_SIZE)
    }

    /// Create a transport whose frames are capped at `limit` bytes
    pub fn with_frame_limit(mac: [u8; 6], ipv4: Ipv4Addr, limit: usize) -> Self {
        Self {
            mac,
            ipv4,
            writer: FrameWriter::new(limit),
            current: None,
            sent: Vec::new(),
        }
    }

    /// Frames sent so far, oldest first
    pub fn sent(&self) -> &[SentFrame] {
        &self.sent
    }

    pub fn last_sent(&self) -> Option<&SentFrame> {
        self.sent.last()
    }

    /// Remove and return the recorded frames
    pub fn take_sent(&mut self) -> Vec<SentFrame> {
        core::mem::take(&mut self.sent)
    }
}

impl Transport for MemoryTransport {
    fn start(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.writer.clear();
        self.current = Some(*endpoint);
        Ok(())
    }

    fn writer(&mut self) -> &mut FrameWriter {
        &mut self.writer
    }

    fn send(&mut self) -> Result<usize> {
        let endpoint = self.current.take().ok_or(TransportError::NotStarted)?;
        let payload = self.writer.as_bytes().to_vec();
        log::trace!("send {:?}: {}", endpoint, hex::encode(&payload));
        let len = payload.len();
        self.sent.push(SentFrame { endpoint, payload });
        self.writer.clear();
        Ok(len)
    }

    fn local_mac(&self) -> [u8; 6] {
        self.mac
    }

    fn local_ipv4(&self) -> Ipv4Addr {
        self.ipv4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_big_endian() {
        let mut writer = FrameWriter::new(16);
        writer.write_u8(0x01).unwrap();
        writer.write_u16(0x0203).unwrap();
        writer.write_u24(0xAA040506).unwrap();
        writer.write_u32(0x0708090A).unwrap();
        writer.write_str("ok").unwrap();

        assert_eq!(
            writer.as_bytes(),
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, b'o', b'k']
        );
        assert_eq!(writer.byte_count(), 12);
        assert_eq!(writer.remaining(), 4);
    }

    #[test]
    fn test_writer_rejects_overflow_without_writing() {
        let mut writer = FrameWriter::new(3);
        writer.write_u16(0xFFFF).unwrap();

        let err = writer.write_u16(0x0102).unwrap_err();
        assert!(matches!(
            err,
            TransportError::BufferFull {
                needed: 2,
                available: 1
            }
        ));
        // Nothing partial was queued
        assert_eq!(writer.byte_count(), 2);
        writer.write_u8(0x03).unwrap();
        assert!(writer.write_u8(0x04).is_err());
    }

    #[test]
    fn test_writer_limit_reservation() {
        let mut writer = FrameWriter::new(10);
        writer.set_limit(8);
        writer.write_block(&[0u8; 8]).unwrap();
        assert!(writer.ensure(1).is_err());

        writer.set_limit(10);
        writer.write_u16(0).unwrap();
        assert_eq!(writer.remaining(), 0);
    }

    #[test]
    fn test_reader_sequence_and_end() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut reader = FrameReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u24().unwrap(), 0x020304);
        reader.dump(1).unwrap();
        assert_eq!(reader.byte_count(), 5);
        assert_eq!(reader.read_u16().unwrap(), 0x0607);
        assert_eq!(reader.remaining(), 0);

        assert!(matches!(
            reader.read_u8(),
            Err(TransportError::UnexpectedEnd { needed: 1, available: 0 })
        ));
    }

    #[test]
    fn test_reader_short_block_does_not_advance() {
        let data = [0xAA, 0xBB];
        let mut reader = FrameReader::new(&data);
        assert!(reader.read_u32().is_err());
        assert_eq!(reader.remaining(), 2);

        let mut out = [0u8; 2];
        reader.read_into(&mut out).unwrap();
        assert_eq!(out, [0xAA, 0xBB]);
    }

    #[test]
    fn test_memory_transport_records_frames() {
        let mac = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
        let mut transport = MemoryTransport::new(mac, Ipv4Addr::new(192, 168, 1, 10));
        let endpoint = Endpoint::Ethernet {
            dest_mac: [0x01, 0x80, 0xC2, 0x00, 0x00, 0x0E],
            ether_type: 0x88CC,
        };

        // Sending before starting a frame fails
        assert!(matches!(transport.send(), Err(TransportError::NotStarted)));

        transport.start(&endpoint).unwrap();
        transport.writer().write_u16(0x0000).unwrap();
        assert_eq!(transport.send().unwrap(), 2);

        let frame = transport.last_sent().unwrap();
        assert_eq!(frame.endpoint, endpoint);
        assert_eq!(frame.payload, vec![0x00, 0x00]);
        assert_eq!(transport.local_mac(), mac);

        assert_eq!(transport.take_sent().len(), 1);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_start_discards_unsent_data() {
        let mut transport =
            MemoryTransport::with_frame_limit([0; 6], Ipv4Addr::UNSPECIFIED, 4);
        let endpoint = Endpoint::Udp {
            dest: Ipv4Addr::new(10, 0, 0, 1),
            src_port: 69,
            dest_port: 69,
        };

        transport.start(&endpoint).unwrap();
        transport.writer().write_u32(0xDEADBEEF).unwrap();
        transport.start(&endpoint).unwrap();
        assert_eq!(transport.writer().byte_count(), 0);
        assert_eq!(transport.writer().limit(), 4);
    }
}
