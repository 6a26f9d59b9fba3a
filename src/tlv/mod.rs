//! LLDP TLV Codec Module
//!
//! Type-Length-Value records as carried in an LLDPDU. Every TLV starts with a
//! 16-bit header holding a 7-bit type and a 9-bit length:
//!
//! ```text
//!  15       9 8            0
//! +----------+--------------+
//! |   type   |    length    |
//! +----------+--------------+
//! ```
//!
//! `length` counts the payload only. It excludes the header but includes a
//! subtype byte when the TLV has one. Organizationally specific TLVs (type 127)
//! open their payload with a 3-byte OUI and a 1-byte subtype, so their length
//! is `payload + 4`.
//!
//! Every write function checks that the whole TLV fits in the writer before
//! emitting anything, so a failed write leaves the frame unchanged.

#[cfg(feature = "std")]
use std::error::Error;

use core::fmt;

use crate::code_point_enum;
use crate::transport::{FrameReader, FrameWriter, TransportError};

/// Result type for TLV operations
pub type Result<T> = core::result::Result<T, TlvError>;

/// Errors that can occur while encoding or decoding TLVs
#[derive(Debug)]
pub enum TlvError {
    /// The TLV does not fit in the remaining frame space
    FrameFull { needed: usize, available: usize },
    /// Type does not fit in 7 bits
    TypeOutOfRange(u8),
    /// Length does not fit in 9 bits
    LengthOutOfRange(usize),
    /// Underlying cursor error
    Transport(TransportError),
}

impl fmt::Display for TlvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlvError::FrameFull { needed, available } => write!(
                f,
                "TLV of {} bytes does not fit, {} bytes left in frame",
                needed, available
            ),
            TlvError::TypeOutOfRange(t) => write!(f, "TLV type {} exceeds 7 bits", t),
            TlvError::LengthOutOfRange(l) => write!(f, "TLV length {} exceeds 9 bits", l),
            TlvError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl Error for TlvError {}

impl From<TransportError> for TlvError {
    fn from(error: TransportError) -> Self {
        TlvError::Transport(error)
    }
}

/// TLV constants
pub mod constants {
    /// Size of the packed type/length header
    pub const TLV_HEADER_SIZE: usize = 2;
    /// OUI plus subtype prefix of an organizationally specific TLV
    pub const ORG_HEADER_SIZE: usize = 4;
    pub const MAX_TLV_TYPE: u8 = 0x7F;
    pub const MAX_TLV_LENGTH: usize = 0x1FF;
}

code_point_enum!(
    /// LLDP TLV types
    TlvType: u8 {
        EndOfLldpdu = 0,
        ChassisId = 1,
        PortId = 2,
        TimeToLive = 3,
        PortDescription = 4,
        SystemName = 5,
        SystemDescription = 6,
        SystemCapabilities = 7,
        ManagementAddress = 8,
        OrganizationSpecific = 127,
    },
    unassigned 9..=126
);

impl TlvType {
    /// Optional TLVs a receiver may skip without understanding them
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            TlvType::PortDescription
                | TlvType::SystemName
                | TlvType::SystemDescription
                | TlvType::SystemCapabilities
                | TlvType::ManagementAddress
        )
    }
}

/// Packed TLV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvHeader {
    /// 7-bit TLV type
    pub tlv_type: u8,
    /// 9-bit payload length
    pub length: u16,
}

impl TlvHeader {
    pub fn new(tlv_type: u8, length: usize) -> Result<Self> {
        if tlv_type > constants::MAX_TLV_TYPE {
            return Err(TlvError::TypeOutOfRange(tlv_type));
        }
        if length > constants::MAX_TLV_LENGTH {
            return Err(TlvError::LengthOutOfRange(length));
        }
        Ok(Self {
            tlv_type,
            length: length as u16,
        })
    }

    /// Pack into the 16-bit wire form
    pub fn encode(&self) -> u16 {
        ((self.tlv_type as u16) << 9) | (self.length & 0x01FF)
    }

    /// Unpack the 16-bit wire form
    pub fn decode(raw: u16) -> Self {
        Self {
            tlv_type: (raw >> 9) as u8,
            length: raw & 0x01FF,
        }
    }

    pub fn kind(&self) -> TlvType {
        TlvType::from(self.tlv_type)
    }

    /// Read a header from the frame
    pub fn read(reader: &mut FrameReader<'_>) -> Result<Self> {
        Ok(Self::decode(reader.read_u16()?))
    }

    pub fn write(&self, writer: &mut FrameWriter) -> Result<()> {
        writer.write_u16(self.encode())?;
        Ok(())
    }
}

fn ensure_fits(writer: &FrameWriter, total: usize) -> Result<()> {
    let available = writer.remaining();
    if total > available {
        return Err(TlvError::FrameFull {
            needed: total,
            available,
        });
    }
    Ok(())
}

/// Write a basic TLV header for a payload of `payload_len` bytes.
///
/// A non-zero `subtype` is written after the header and counted in the
/// length. The caller writes the payload next; the space for it has already
/// been checked.
pub fn write_basic_header(
    writer: &mut FrameWriter,
    tlv_type: TlvType,
    subtype: u8,
    payload_len: usize,
) -> Result<()> {
    let length = payload_len + usize::from(subtype != 0);
    let header = TlvHeader::new(tlv_type.into(), length)?;
    ensure_fits(writer, constants::TLV_HEADER_SIZE + length)?;

    header.write(writer)?;
    if subtype != 0 {
        writer.write_u8(subtype)?;
    }
    Ok(())
}

/// Write a complete basic TLV
pub fn write_basic(
    writer: &mut FrameWriter,
    tlv_type: TlvType,
    subtype: u8,
    payload: &[u8],
) -> Result<()> {
    write_basic_header(writer, tlv_type, subtype, payload.len())?;
    writer.write_block(payload)?;
    Ok(())
}

/// Write an organizationally specific TLV header, OUI and subtype for a
/// payload of `payload_len` bytes
pub fn write_org_header(
    writer: &mut FrameWriter,
    oui: u32,
    subtype: u8,
    payload_len: usize,
) -> Result<()> {
    let length = payload_len + constants::ORG_HEADER_SIZE;
    let header = TlvHeader::new(TlvType::OrganizationSpecific.into(), length)?;
    ensure_fits(writer, constants::TLV_HEADER_SIZE + length)?;

    header.write(writer)?;
    writer.write_u24(oui)?;
    writer.write_u8(subtype)?;
    Ok(())
}

/// Write a complete organizationally specific TLV
pub fn write_org(writer: &mut FrameWriter, oui: u32, subtype: u8, payload: &[u8]) -> Result<()> {
    write_org_header(writer, oui, subtype, payload.len())?;
    writer.write_block(payload)?;
    Ok(())
}

/// Write the End Of LLDPDU TLV
pub fn write_end(writer: &mut FrameWriter) -> Result<()> {
    ensure_fits(writer, constants::TLV_HEADER_SIZE)?;
    TlvHeader {
        tlv_type: 0,
        length: 0,
    }
    .write(writer)
}
