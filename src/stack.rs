//! Protocol Driver Module
//!
//! [`NetStack`] ties the engines to one transport and one clock. The host
//! calls [`NetStack::tick`] once per second, [`NetStack::poll`] from its main
//! loop, and hands every received LLDP frame or UDP datagram to
//! [`NetStack::handle_ethernet`] or [`NetStack::handle_udp`].
//!
//! # Example
//!
//! ```
//! use picostack_rs::stack::{NetStack, StackConfig};
//! use picostack_rs::transport::MemoryTransport;
//! use core::net::Ipv4Addr;
//!
//! let transport = MemoryTransport::new([0x02, 0, 0, 0, 0, 1], Ipv4Addr::new(10, 0, 0, 2));
//! let mut stack = NetStack::new(transport, StackConfig::default());
//!
//! for _ in 0..10 {
//!     stack.tick();
//!     stack.poll();
//! }
//! assert!(!stack.transport().sent().is_empty());
//! ```

#[cfg(feature = "std")]
use std::error::Error;

use core::fmt;
use core::net::Ipv4Addr;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use chrono::{DateTime, Duration, Utc};

use crate::dns::{DnsClient, DnsConfig, DnsError};
use crate::lldp::{constants::LLDP_ETHER_TYPE, LldpAgent, LldpConfig, LldpError};
use crate::ntp::{NtpClient, NtpConfig, NtpError};
use crate::tftp::{TftpClient, TftpConfig, TftpError, TftpOpcode};
use crate::transport::{FrameReader, Transport};

/// Result type for driver operations
pub type Result<T> = core::result::Result<T, StackError>;

/// Error from the engine a frame was routed to
#[derive(Debug)]
pub enum StackError {
    Lldp(LldpError),
    Dns(DnsError),
    Ntp(NtpError),
    Tftp(TftpError),
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::Lldp(e) => write!(f, "LLDP: {}", e),
            StackError::Dns(e) => write!(f, "DNS: {}", e),
            StackError::Ntp(e) => write!(f, "NTP: {}", e),
            StackError::Tftp(e) => write!(f, "TFTP: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl Error for StackError {}

impl From<LldpError> for StackError {
    fn from(error: LldpError) -> Self {
        StackError::Lldp(error)
    }
}

impl From<DnsError> for StackError {
    fn from(error: DnsError) -> Self {
        StackError::Dns(error)
    }
}

impl From<NtpError> for StackError {
    fn from(error: NtpError) -> Self {
        StackError::Ntp(error)
    }
}

impl From<TftpError> for StackError {
    fn from(error: TftpError) -> Self {
        StackError::Tftp(error)
    }
}

/// Configuration of every engine in the stack
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackConfig {
    pub lldp: LldpConfig,
    pub dns: DnsConfig,
    pub ntp: NtpConfig,
    /// File download, disabled when absent
    pub tftp: Option<TftpConfig>,
}

/// Poll-driven protocol stack over one transport
pub struct NetStack<T: Transport> {
    transport: T,
    lldp: LldpAgent,
    dns: DnsClient,
    ntp: NtpClient,
    tftp: Option<TftpClient>,
    tftp_data: Vec<u8>,
    /// Seconds since the stack was created
    seconds: u64,
    /// Time from NTP and the second it arrived
    synced: Option<(DateTime<Utc>, u64)>,
}

impl<T: Transport> NetStack<T> {
    pub fn new(transport: T, config: StackConfig) -> Self {
        let mac = transport.local_mac();
        Self {
            lldp: LldpAgent::new(config.lldp),
            dns: DnsClient::new(config.dns, mac),
            ntp: NtpClient::new(config.ntp),
            tftp: config.tftp.map(TftpClient::new),
            tftp_data: Vec::new(),
            transport,
            seconds: 0,
            synced: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn lldp(&self) -> &LldpAgent {
        &self.lldp
    }

    pub fn lldp_mut(&mut self) -> &mut LldpAgent {
        &mut self.lldp
    }

    pub fn dns(&self) -> &DnsClient {
        &self.dns
    }

    pub fn dns_mut(&mut self) -> &mut DnsClient {
        &mut self.dns
    }

    pub fn ntp(&self) -> &NtpClient {
        &self.ntp
    }

    pub fn ntp_mut(&mut self) -> &mut NtpClient {
        &mut self.ntp
    }

    pub fn tftp(&self) -> Option<&TftpClient> {
        self.tftp.as_ref()
    }

    /// File contents received so far
    pub fn tftp_data(&self) -> &[u8] {
        &self.tftp_data
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    /// One second elapsed
    pub fn tick(&mut self) {
        self.seconds += 1;
        self.lldp.tick();
    }

    /// Run the periodic work: LLDP state machines and DNS cache expiry
    pub fn poll(&mut self) {
        self.lldp.run(&mut self.transport);
        let freed = self.dns.sweep(self.seconds);
        if freed > 0 {
            log::debug!("DNS sweep freed {} slots", freed);
        }
    }

    /// Resolve `name`, sending a query on a cache miss
    pub fn lookup(&mut self, name: &str) -> Option<Ipv4Addr> {
        self.dns.lookup(&mut self.transport, name, self.seconds)
    }

    /// Ask the time server for the time. `now` is the local estimate sent in
    /// the request.
    pub fn request_time(&mut self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.ntp.request(&mut self.transport, now)?)
    }

    /// Current time, extrapolated from the last NTP response
    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        let (time, at) = self.synced?;
        let elapsed = i64::try_from(self.seconds - at).ok()?;
        time.checked_add_signed(Duration::try_seconds(elapsed)?)
    }

    /// Start downloading the configured TFTP file. Returns false when no
    /// transfer is configured.
    pub fn start_download(&mut self) -> Result<bool> {
        let Some(tftp) = self.tftp.as_mut() else {
            return Ok(false);
        };
        self.tftp_data.clear();
        tftp.request(&mut self.transport, TftpOpcode::ReadRequest)?;
        Ok(true)
    }

    /// Route a received link-layer frame. Only LLDP is handled.
    pub fn handle_ethernet(&mut self, ether_type: u16, payload: &[u8]) -> Result<()> {
        if ether_type != LLDP_ETHER_TYPE {
            log::trace!("ignoring ethertype {:#06x}", ether_type);
            return Ok(());
        }
        let mut reader = FrameReader::new(payload);
        self.lldp.process_frame(&mut reader)?;
        Ok(())
    }

    /// Route a received UDP datagram by destination port
    pub fn handle_udp(&mut self, src_port: u16, dst_port: u16, payload: &[u8]) -> Result<()> {
        let mut reader = FrameReader::new(payload);

        if let Some(tftp) = self.tftp.as_mut() {
            if dst_port == tftp.config().local_port {
                tftp.handle_packet(&mut self.transport, &mut reader, src_port, &mut self.tftp_data)?;
                return Ok(());
            }
        }

        if dst_port == self.dns.config().port {
            self.dns.handle_response(&mut reader, self.seconds)?;
        } else if dst_port == self.ntp.config().port {
            let time = self.ntp.handle_response(&mut reader)?;
            self.synced = Some((time, self.seconds));
        } else {
            log::trace!("ignoring UDP {} -> {}", src_port, dst_port);
        }
        Ok(())
    }
}
