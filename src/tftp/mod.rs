//! TFTP Client Module
//!
//! Downloads a file with TFTP (RFC 1350) in octet mode, negotiating the block
//! size option (RFC 2348). Received blocks are handed, in order, to a
//! [`TftpSink`] such as a flash writer or a `Vec<u8>`.
//!
//! The server answers from a fresh port (its transfer ID); callers pass that
//! port to [`TftpClient::handle_packet`] and acknowledgements are sent back
//! to it.

#[cfg(feature = "std")]
use std::error::Error;

use core::fmt;
use core::net::Ipv4Addr;

#[cfg(not(feature = "std"))]
use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use crate::code_point_enum;
use crate::transport::{Endpoint, FrameReader, Transport, TransportError};

/// Result type for TFTP operations
pub type Result<T> = core::result::Result<T, TftpError>;

/// Errors that can occur in TFTP operations
#[derive(Debug)]
pub enum TftpError {
    /// Transport error
    Transport(TransportError),
    /// Only read and write requests can start a transfer
    InvalidOpcode(u16),
    /// The server reported an error
    Remote { code: u16, message: String },
    /// The sink could not store a block
    Storage(&'static str),
}

impl fmt::Display for TftpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TftpError::Transport(e) => write!(f, "Transport error: {}", e),
            TftpError::InvalidOpcode(op) => write!(f, "Invalid request opcode {}", op),
            TftpError::Remote { code, message } => {
                write!(f, "TFTP error {}: {}", code, message)
            }
            TftpError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl Error for TftpError {}

impl From<TransportError> for TftpError {
    fn from(error: TransportError) -> Self {
        TftpError::Transport(error)
    }
}

/// TFTP constants
pub mod constants {
    pub const TFTP_PORT: u16 = 69;
    pub const MODE_OCTET: &str = "octet";
    pub const OPTION_BLKSIZE: &str = "blksize";
    pub const DEFAULT_BLOCK_SIZE: u16 = 512;
    /// Opcode plus block number
    pub const HEADER_SIZE: usize = 4;
}

use constants::*;

code_point_enum!(
    /// TFTP packet opcodes
    TftpOpcode: u16 {
        ReadRequest = 1,
        WriteRequest = 2,
        Data = 3,
        Ack = 4,
        Error = 5,
        OptionAck = 6,
    },
    unassigned 7..=u16::MAX
);

/// Destination for received file data
pub trait TftpSink {
    /// Store `data`, which starts `offset` bytes into the file
    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

impl TftpSink for Vec<u8> {
    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if offset != self.len() {
            return Err(TftpError::Storage("non-sequential write"));
        }
        self.extend_from_slice(data);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TftpConfig {
    pub server: Ipv4Addr,
    pub filename: String,
    /// Requested block size, also the short-block threshold
    pub block_size: u16,
    /// Source port of our packets
    pub local_port: u16,
}

impl Default for TftpConfig {
    fn default() -> Self {
        Self {
            server: Ipv4Addr::UNSPECIFIED,
            filename: String::new(),
            block_size: DEFAULT_BLOCK_SIZE,
            local_port: TFTP_PORT,
        }
    }
}

/// Progress of the current transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Transferring,
    Complete,
    Failed { code: u16 },
}

#[derive(Debug, Clone)]
pub struct TftpClient {
    config: TftpConfig,
    state: TransferState,
    /// Last block written to the sink
    prev_block: u16,
    bytes_received: usize,
}

impl TftpClient {
    pub fn new(config: TftpConfig) -> Self {
        Self {
            config,
            state: TransferState::Idle,
            prev_block: 0,
            bytes_received: 0,
        }
    }

    pub fn config(&self) -> &TftpConfig {
        &self.config
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    /// Send a read or write request for the configured file
    pub fn request<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        opcode: TftpOpcode,
    ) -> Result<()> {
        if !matches!(opcode, TftpOpcode::ReadRequest | TftpOpcode::WriteRequest) {
            return Err(TftpError::InvalidOpcode(opcode.into()));
        }

        transport.start(&Endpoint::Udp {
            dest: self.config.server,
            src_port: self.config.local_port,
            dest_port: TFTP_PORT,
        })?;
        let block_size = self.config.block_size.to_string();
        let writer = transport.writer();
        writer.write_u16(opcode.into())?;
        for field in [
            self.config.filename.as_str(),
            MODE_OCTET,
            OPTION_BLKSIZE,
            block_size.as_str(),
        ] {
            writer.write_str(field)?;
            writer.write_u8(0)?;
        }
        transport.send()?;

        self.state = TransferState::Transferring;
        self.prev_block = 0;
        self.bytes_received = 0;
        log::info!(
            "TFTP {} {} from {}",
            opcode,
            self.config.filename,
            self.config.server
        );
        Ok(())
    }

    /// Acknowledge `block` to the server's transfer port
    pub fn ack<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        block: u16,
        port: u16,
    ) -> Result<()> {
        transport.start(&Endpoint::Udp {
            dest: self.config.server,
            src_port: self.config.local_port,
            dest_port: port,
        })?;
        let writer = transport.writer();
        writer.write_u16(TftpOpcode::Ack.into())?;
        writer.write_u16(block)?;
        transport.send()?;
        Ok(())
    }

    /// Process one packet from the server's transfer port `peer_port`
    pub fn handle_packet<T, S>(
        &mut self,
        transport: &mut T,
        reader: &mut FrameReader<'_>,
        peer_port: u16,
        sink: &mut S,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
        S: TftpSink + ?Sized,
    {
        if reader.remaining() < HEADER_SIZE {
            log::debug!("ignoring {} byte TFTP packet", reader.remaining());
            return Ok(());
        }

        let opcode = TftpOpcode::from(reader.read_u16()?);
        let block = reader.read_u16()?;

        match opcode {
            TftpOpcode::OptionAck => {
                log::debug!("TFTP options accepted");
                self.ack(transport, 0, peer_port)
            }
            TftpOpcode::WriteRequest => self.ack(transport, 0, peer_port),
            TftpOpcode::Error => {
                let text = reader.read_block(reader.remaining())?;
                let text = text.split(|b| *b == 0).next().unwrap_or_default();
                let message = String::from_utf8_lossy(text).into_owned();
                log::warn!("TFTP error {}: {}", block, message);
                self.state = TransferState::Failed { code: block };
                Err(TftpError::Remote {
                    code: block,
                    message,
                })
            }
            TftpOpcode::Data => self.handle_data(transport, reader, block, peer_port, sink),
            other => {
                log::debug!("ignoring TFTP {}", other);
                Ok(())
            }
        }
    }

    fn handle_data<T, S>(
        &mut self,
        transport: &mut T,
        reader: &mut FrameReader<'_>,
        block: u16,
        peer_port: u16,
        sink: &mut S,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
        S: TftpSink + ?Sized,
    {
        if block == self.prev_block.wrapping_add(1) {
            let payload = reader.read_block(reader.remaining())?;
            sink.write_block(self.bytes_received, payload)?;
            self.bytes_received += payload.len();
            self.prev_block = block;
            self.ack(transport, block, peer_port)?;

            if payload.len() < usize::from(self.config.block_size) {
                self.state = TransferState::Complete;
                log::info!("TFTP transfer complete, {} bytes", self.bytes_received);
            }
        } else if block <= self.prev_block {
            log::debug!("duplicate TFTP block {}", block);
            self.ack(transport, block, peer_port)?;
        } else {
            log::debug!(
                "TFTP block {} out of sequence, expected {}",
                block,
                self.prev_block.wrapping_add(1)
            );
        }
        Ok(())
    }
}
