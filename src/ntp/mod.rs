//! NTP Client Module
//!
//! Minimal SNTP client: sends a single 48-byte request and takes the server's
//! receive timestamp as the current time. No round-trip or offset filtering
//! is attempted; accuracy is to the second.

#[cfg(feature = "std")]
use std::error::Error;

use core::fmt;
use core::net::Ipv4Addr;

use chrono::{DateTime, Utc};

use crate::transport::{Endpoint, FrameReader, Transport, TransportError};

/// Result type for NTP operations
pub type Result<T> = core::result::Result<T, NtpError>;

/// Errors that can occur in NTP operations
#[derive(Debug)]
pub enum NtpError {
    /// Transport error
    Transport(TransportError),
    /// Response shorter than an NTP packet
    Truncated { length: usize },
    /// Timestamp cannot be represented
    InvalidTimestamp(u32),
}

impl fmt::Display for NtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NtpError::Transport(e) => write!(f, "Transport error: {}", e),
            NtpError::Truncated { length } => {
                write!(f, "NTP packet of {} bytes is too short", length)
            }
            NtpError::InvalidTimestamp(s) => write!(f, "Invalid NTP timestamp {}", s),
        }
    }
}

#[cfg(feature = "std")]
impl Error for NtpError {}

impl From<TransportError> for NtpError {
    fn from(error: TransportError) -> Self {
        NtpError::Transport(error)
    }
}

/// NTP constants
pub mod constants {
    pub const NTP_PORT: u16 = 123;
    pub const NTP_PACKET_SIZE: usize = 48;
    /// Seconds from 1900-01-01 to 1970-01-01
    pub const NTP_TIME_OFFSET: u64 = 2_208_988_800;
    /// Leap unknown, version 3, client mode
    pub const LI_VN_MODE: u8 = 0xDB;
    pub const STRATUM: u8 = 0x00;
    /// 2^10 seconds
    pub const POLL: u8 = 0x0A;
    pub const PRECISION: u8 = 0xEC;
    pub const ROOT_DELAY: u32 = 0x0000_3B68;
    pub const ROOT_DISPERSION: u32 = 0x0004_2673;
    /// Offset of the receive timestamp within the packet
    pub const RECEIVE_TIMESTAMP_OFFSET: usize = 32;
}

use constants::*;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NtpConfig {
    /// Time server, `0.0.0.0` disables requests
    pub server: Ipv4Addr,
    pub port: u16,
}

impl Default for NtpConfig {
    fn default() -> Self {
        Self {
            server: Ipv4Addr::UNSPECIFIED,
            port: NTP_PORT,
        }
    }
}

/// Convert a Unix time to 32-bit NTP seconds, wrapping at the era boundary
pub fn to_ntp_seconds(time: &DateTime<Utc>) -> u32 {
    (time.timestamp() + NTP_TIME_OFFSET as i64) as u32
}

/// Convert 32-bit NTP seconds to UTC. Values with the top bit clear are
/// taken to be in era 1 (after February 2036).
pub fn from_ntp_seconds(seconds: u32) -> Result<DateTime<Utc>> {
    let ntp = if seconds & 0x8000_0000 != 0 {
        u64::from(seconds)
    } else {
        u64::from(seconds) + (1u64 << 32)
    };
    // Era 0 values before 1970 have no Unix time
    let unix = ntp
        .checked_sub(NTP_TIME_OFFSET)
        .ok_or(NtpError::InvalidTimestamp(seconds))?;
    DateTime::from_timestamp(unix as i64, 0).ok_or(NtpError::InvalidTimestamp(seconds))
}

#[derive(Debug, Clone)]
pub struct NtpClient {
    config: NtpConfig,
    last_sync: Option<DateTime<Utc>>,
}

impl NtpClient {
    pub fn new(config: NtpConfig) -> Self {
        Self {
            config,
            last_sync: None,
        }
    }

    pub fn config(&self) -> &NtpConfig {
        &self.config
    }

    pub fn set_server(&mut self, server: Ipv4Addr) {
        self.config.server = server;
    }

    /// Time from the most recent response
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Send a request stamped with `now`. Returns false when no server is
    /// configured.
    pub fn request<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if self.config.server.is_unspecified() {
            log::debug!("no NTP server configured");
            return Ok(false);
        }

        transport.start(&Endpoint::Udp {
            dest: self.config.server,
            src_port: self.config.port,
            dest_port: self.config.port,
        })?;

        let writer = transport.writer();
        writer.ensure(NTP_PACKET_SIZE)?;
        writer.write_u8(LI_VN_MODE)?;
        writer.write_u8(STRATUM)?;
        writer.write_u8(POLL)?;
        writer.write_u8(PRECISION)?;
        writer.write_u32(ROOT_DELAY)?;
        writer.write_u32(ROOT_DISPERSION)?;
        writer.write_u32(u32::from(self.config.server))?;

        // Reference, origin, receive and transmit timestamps, fraction 0
        let seconds = to_ntp_seconds(&now);
        for _ in 0..4 {
            writer.write_u32(seconds)?;
            writer.write_u32(0)?;
        }
        transport.send()?;

        log::debug!("NTP request to {} at {}", self.config.server, now);
        Ok(true)
    }

    /// Read the server's receive timestamp from a response
    pub fn handle_response(&mut self, reader: &mut FrameReader<'_>) -> Result<DateTime<Utc>> {
        let length = reader.remaining();
        if length < NTP_PACKET_SIZE {
            return Err(NtpError::Truncated { length });
        }

        reader.dump(RECEIVE_TIMESTAMP_OFFSET)?;
        let seconds = reader.read_u32()?;
        let _fraction = reader.read_u32()?;
        reader.discard();

        let time = from_ntp_seconds(seconds)?;
        log::info!("NTP time {}", time);
        self.last_sync = Some(time);
        Ok(time)
    }
}
