//! DNS Client Module
//!
//! A small stub resolver for IPv4 host addresses (RFC 1035), backed by a
//! fixed-capacity cache.
//!
//! # Overview
//!
//! Resolution is asynchronous and poll driven:
//! - [`DnsClient::lookup`] answers from the cache, or sends an A query and
//!   returns `None` so the caller retries on a later poll
//! - [`DnsClient::handle_response`] parses an inbound response, matches it to
//!   the pending cache slot by transaction ID and question name, and stores
//!   the first A record
//! - [`DnsClient::sweep`] forgets timed-out queries and expired answers
//!
//! Names in responses may use compression pointers; the decoder follows
//! them with a hop limit so a looping pointer chain is reported as malformed.
//!
//! # Example
//!
//! ```
//! use picostack_rs::dns::{DnsClient, DnsConfig};
//! use picostack_rs::transport::MemoryTransport;
//! use core::net::Ipv4Addr;
//!
//! let mac = [0x02, 0, 0, 0, 0, 1];
//! let mut transport = MemoryTransport::new(mac, Ipv4Addr::new(10, 0, 0, 2));
//! let mut client: DnsClient = DnsClient::new(
//!     DnsConfig { server: Ipv4Addr::new(10, 0, 0, 1), ..Default::default() },
//!     mac,
//! );
//!
//! // Not cached yet, a query goes out
//! assert_eq!(client.lookup(&mut transport, "host.example", 0), None);
//! assert_eq!(transport.sent().len(), 1);
//! ```

#[cfg(feature = "std")]
use std::error::Error;

use core::fmt;
use core::net::Ipv4Addr;

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::transport::{FrameReader, FrameWriter, TransportError};

mod cache;
mod client;

pub use cache::{CacheEntry, DnsCache, EntryState};
pub use client::DnsClient;

/// Result type for DNS operations
pub type Result<T> = core::result::Result<T, DnsError>;

/// Errors that can occur in DNS operations
#[derive(Debug)]
pub enum DnsError {
    /// Transport error
    Transport(TransportError),
    /// Name cannot be encoded as a DNS question
    InvalidName(String),
    /// Response ID matches no outstanding query
    UnknownTransaction(u16),
    /// Response structure is invalid
    Malformed(&'static str),
    /// Response ends before a field it announces
    Truncated,
    /// The cache has no slots
    NoCapacity,
}

impl fmt::Display for DnsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsError::Transport(e) => write!(f, "Transport error: {}", e),
            DnsError::InvalidName(name) => write!(f, "Invalid DNS name: {:?}", name),
            DnsError::UnknownTransaction(id) => {
                write!(f, "No outstanding query with ID {:#06x}", id)
            }
            DnsError::Malformed(msg) => write!(f, "Malformed DNS message: {}", msg),
            DnsError::Truncated => write!(f, "DNS message truncated"),
            DnsError::NoCapacity => write!(f, "DNS cache has no slots"),
        }
    }
}

#[cfg(feature = "std")]
impl Error for DnsError {}

impl From<TransportError> for DnsError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::UnexpectedEnd { .. } => DnsError::Truncated,
            e => DnsError::Transport(e),
        }
    }
}

/// DNS constants
pub mod constants {
    pub const DNS_PORT: u16 = 53;
    pub const HEADER_SIZE: usize = 12;
    /// Standard query with recursion desired
    pub const FLAGS_QUERY: u16 = 0x0100;
    pub const FLAG_RESPONSE: u16 = 0x8000;
    pub const RCODE_MASK: u16 = 0x000F;
    pub const TYPE_A: u16 = 1;
    pub const CLASS_IN: u16 = 1;
    pub const MAX_LABEL_LEN: usize = 63;
    /// Encoded length limit, including length bytes and the root label
    pub const MAX_NAME_LEN: usize = 255;
    pub const POINTER_MASK: u8 = 0xC0;
    pub const MAX_POINTER_HOPS: usize = 16;
    pub const DEFAULT_CACHE_SIZE: usize = 8;
    pub const DEFAULT_QUERY_TIMEOUT: u32 = 5;
    /// Shortest time an answer is kept, so a zero TTL still serves lookups
    pub const MIN_CACHE_TTL: u32 = 5;
}

use constants::*;

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DnsConfig {
    /// Name server, normally learned from DHCP
    pub server: Ipv4Addr,
    /// Server port, also used as the source port
    pub port: u16,
    /// Seconds before an unanswered query is abandoned
    pub query_timeout: u32,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            server: Ipv4Addr::UNSPECIFIED,
            port: DNS_PORT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Fixed 12-byte message header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    /// Header of a single-question recursive query
    pub fn query(id: u16) -> Self {
        Self {
            id,
            flags: FLAGS_QUERY,
            qdcount: 1,
            ..Default::default()
        }
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & RCODE_MASK) as u8
    }

    pub fn write(&self, writer: &mut FrameWriter) -> Result<()> {
        writer.ensure(HEADER_SIZE)?;
        for field in [
            self.id,
            self.flags,
            self.qdcount,
            self.ancount,
            self.nscount,
            self.arcount,
        ] {
            writer.write_u16(field)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut FrameReader<'_>) -> Result<Self> {
        if reader.remaining() < HEADER_SIZE {
            return Err(DnsError::Truncated);
        }
        Ok(Self {
            id: reader.read_u16()?,
            flags: reader.read_u16()?,
            qdcount: reader.read_u16()?,
            ancount: reader.read_u16()?,
            nscount: reader.read_u16()?,
            arcount: reader.read_u16()?,
        })
    }
}

/// Check that `name` can be sent as a question: 1 to 63 bytes per label and
/// at most 255 bytes encoded. A single trailing dot is accepted.
pub fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    if trimmed.is_empty() {
        return Err(DnsError::InvalidName(name.into()));
    }

    let mut encoded = 1;
    for label in trimmed.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(DnsError::InvalidName(name.into()));
        }
        encoded += label.len() + 1;
    }
    if encoded > MAX_NAME_LEN {
        return Err(DnsError::InvalidName(name.into()));
    }
    Ok(())
}

/// Write `name` in label form: a length byte before each dot-separated
/// segment and a zero byte at the end
pub fn write_name(writer: &mut FrameWriter, name: &str) -> Result<()> {
    validate_name(name)?;
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    for label in trimmed.split('.') {
        writer.write_u8(label.len() as u8)?;
        writer.write_str(label)?;
    }
    writer.write_u8(0)?;
    Ok(())
}

/// Decode the name starting at `start` in `message`, following compression
/// pointers. Returns the dotted name and the number of bytes it occupies at
/// `start`.
pub fn decode_name(message: &[u8], start: usize) -> Result<(String, usize)> {
    let mut name = String::new();
    let mut pos = start;
    let mut consumed = None;
    let mut hops = 0;

    loop {
        let len = *message.get(pos).ok_or(DnsError::Truncated)?;
        match len & POINTER_MASK {
            0x00 if len == 0 => {
                if consumed.is_none() {
                    consumed = Some(pos + 1 - start);
                }
                break;
            }
            0x00 => {
                let len = usize::from(len);
                let label = message
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(DnsError::Truncated)?;
                if !name.is_empty() {
                    name.push('.');
                }
                name.push_str(&String::from_utf8_lossy(label));
                if name.len() > MAX_NAME_LEN {
                    return Err(DnsError::Malformed("name too long"));
                }
                pos += 1 + len;
            }
            POINTER_MASK => {
                let low = *message.get(pos + 1).ok_or(DnsError::Truncated)?;
                if consumed.is_none() {
                    consumed = Some(pos + 2 - start);
                }
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(DnsError::Malformed("compression loop"));
                }
                pos = (usize::from(len & !POINTER_MASK) << 8) | usize::from(low);
            }
            _ => return Err(DnsError::Malformed("reserved label type")),
        }
    }

    Ok((name, consumed.unwrap_or(0)))
}

/// Read a possibly compressed name at the reader position
pub fn read_name(reader: &mut FrameReader<'_>) -> Result<String> {
    let (name, used) = decode_name(reader.frame(), reader.byte_count())?;
    reader.dump(used)?;
    Ok(name)
}
