//! LLDP Agent Module
//!
//! This module implements an IEEE 802.1AB Link Layer Discovery Protocol agent
//! for a single port, including the PoE power negotiation extensions used by
//! powered devices (IEEE 802.3 power via MDI, Cisco 4-wire PoE, TIA LLDP-MED).
//!
//! # Overview
//!
//! The agent runs three cooperating state machines:
//! - The transmit timer machine paces announcements with a credit bucket and
//!   handles fast start after a new neighbour appears
//! - The transmit machine builds and sends LLDPDUs when the timer asks for one
//! - The receive side parses inbound LLDPDUs and applies power negotiation
//!
//! Frames are built from two ordered descriptor tables (see [`tables`]): basic
//! TLVs first, then organizationally specific TLVs, then the end marker.
//! Received organizationally specific TLVs are dispatched through a third
//! table keyed on (OUI, subtype).
//!
//! # Example
//!
//! ```
//! use picostack_rs::lldp::{AdminStatus, LldpAgent, LldpConfig};
//! use picostack_rs::transport::MemoryTransport;
//! use core::net::Ipv4Addr;
//!
//! let mut transport = MemoryTransport::new([0x02, 0, 0, 0, 0, 1], Ipv4Addr::new(10, 0, 0, 2));
//! let mut agent = LldpAgent::new(LldpConfig {
//!     admin_status: AdminStatus::RxTx,
//!     ..Default::default()
//! });
//!
//! // The first announcement goes out within a few polls
//! for _ in 0..8 {
//!     agent.run(&mut transport);
//! }
//! assert_eq!(transport.sent().len(), 1);
//! ```

#[cfg(feature = "std")]
use std::error::Error;

use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use bitflags::bitflags;

use crate::tlv::TlvError;
use crate::transport::{constants::MAX_TXBUFF_SIZE, TransportError};

pub mod port;
mod rx;
pub mod tables;
pub mod tlvs;
mod tx;

pub use port::{
    LldpPort, OrgFlags, RemoteSystem, RxPortState, RxState, TxPortState, TxState, TxTimerState,
    TxTimers,
};
pub use tables::{BasicTlvDescriptor, OrgTlvDescriptor, OrgTlvProcessorEntry};
pub use tlvs::{BasicTlvBuilder, OrgTlvBuilder, OrgTlvProcessor, TxContext};

/// Result type for LLDP operations
pub type Result<T> = core::result::Result<T, LldpError>;

/// Errors that can occur in LLDP operations
#[derive(Debug)]
pub enum LldpError {
    /// TLV encoding error
    Tlv(TlvError),
    /// Transport error
    Transport(TransportError),
    /// Port ID or TTL TLV arrived without its required predecessor
    OutOfOrder { tlv_type: u8 },
    /// TLV type not valid in an LLDPDU
    UnknownTlvType(u8),
    /// The end marker arrived before chassis ID, port ID and TTL
    MissingMandatory,
    /// TLV contents do not match its type
    MalformedTlv { tlv_type: u8, length: u16 },
    /// A chassis ID, port ID or TTL TLV could not be built
    MandatoryTlv(TlvError),
    /// Transmission is administratively disabled
    TxDisabled,
    /// Reception is administratively disabled
    RxDisabled,
    /// The port is not operational
    PortDisabled,
}

impl fmt::Display for LldpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LldpError::Tlv(e) => write!(f, "TLV error: {}", e),
            LldpError::Transport(e) => write!(f, "Transport error: {}", e),
            LldpError::OutOfOrder { tlv_type } => {
                write!(f, "TLV type {} out of order", tlv_type)
            }
            LldpError::UnknownTlvType(t) => write!(f, "Unknown TLV type {}", t),
            LldpError::MissingMandatory => write!(f, "LLDPDU lacks a mandatory TLV"),
            LldpError::MalformedTlv { tlv_type, length } => {
                write!(f, "Malformed TLV type {} length {}", tlv_type, length)
            }
            LldpError::MandatoryTlv(e) => write!(f, "Mandatory TLV not built: {}", e),
            LldpError::TxDisabled => write!(f, "LLDP transmit disabled"),
            LldpError::RxDisabled => write!(f, "LLDP receive disabled"),
            LldpError::PortDisabled => write!(f, "Port disabled"),
        }
    }
}

#[cfg(feature = "std")]
impl Error for LldpError {}

impl From<TlvError> for LldpError {
    fn from(error: TlvError) -> Self {
        LldpError::Tlv(error)
    }
}

impl From<TransportError> for LldpError {
    fn from(error: TransportError) -> Self {
        LldpError::Transport(error)
    }
}

/// LLDP constants
pub mod constants {
    /// Nearest-bridge multicast destination
    pub const LLDP_MULTICAST_MAC: [u8; 6] = [0x01, 0x80, 0xC2, 0x00, 0x00, 0x0E];
    pub const LLDP_ETHER_TYPE: u16 = 0x88CC;

    pub const IEEE802_3_OUI: u32 = 0x00120F;
    pub const TIA_OUI: u32 = 0x0012BB;
    pub const CISCO_OUI: u32 = 0x000142;
    /// IANA OUI, used for the MUD URL extension
    pub const IANA_OUI: u32 = 0x00005E;

    pub const CHASSIS_SUBTYPE_MAC: u8 = 4;
    pub const PORT_SUBTYPE_INTERFACE_NAME: u8 = 5;
    pub const MGMT_ADDRESS_FAMILY_IPV4: u8 = 1;

    pub const IEEE_MAC_PHY_CONFIG: u8 = 1;
    pub const IEEE_POWER_VIA_MDI: u8 = 2;

    pub const TIA_MED_CAPABILITIES: u8 = 1;
    pub const TIA_NETWORK_POLICY: u8 = 2;
    pub const TIA_EXTENDED_POWER_VIA_MDI: u8 = 4;
    pub const TIA_HARDWARE_REVISION: u8 = 5;
    pub const TIA_FIRMWARE_REVISION: u8 = 6;
    pub const TIA_SOFTWARE_REVISION: u8 = 7;
    pub const TIA_SERIAL_NUMBER: u8 = 8;
    pub const TIA_MANUFACTURER_NAME: u8 = 9;
    pub const TIA_MODEL_NAME: u8 = 10;
    pub const TIA_ASSET_ID: u8 = 11;

    pub const CISCO_POWER_VIA_MDI: u8 = 1;
    pub const CISCO_DEVICE_TYPE: u8 = 2;
    pub const CISCO_DEVICE_CLASS: u8 = 3;
    pub const CISCO_DEVICE_PROTOCOL: u8 = 4;
    pub const MUD_URL: u8 = 1;

    /// Lower bound of the 802.3at request range, in 0.1 W
    pub const POE_MIN_REQUEST: u16 = 0x82;
    /// Largest request a 2-pair device may make
    pub const POE_PLUS_MAX_REQUEST: u16 = 0xFF;
    /// Largest request a 4-wire device may make
    pub const UPOE_MAX_REQUEST: u16 = 0x1FE;

    pub const DEFAULT_PORT_ID: &str = "Gi?/?";
    pub const DEFAULT_PORT_DESCRIPTION: &str = "Vendor LED";
    pub const DEFAULT_HARDWARE_REVISION: &str = "Rev 1.0";
    pub const DEFAULT_FIRMWARE_REVISION: &str = "Rev 1.0";
    pub const DEFAULT_SOFTWARE_REVISION: &str = "Rev 1.0";
    pub const DEFAULT_SERIAL_NUMBER: &str = "US-1234";
    pub const DEFAULT_MANUFACTURER: &str = "Vendor ID";
    pub const DEFAULT_MODEL_NAME: &str = "LED-Dimmable";
    pub const DEFAULT_ASSET_ID: &str = "V1234";
    pub const DEFAULT_MUD_URL: &str = "Add the mud info";
}

/// Administrative status of the port (IEEE 802.1AB 9.2.5.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AdminStatus {
    #[default]
    Disabled = 0,
    TxOnly = 1,
    RxOnly = 2,
    RxTx = 3,
}

impl AdminStatus {
    pub fn tx_enabled(self) -> bool {
        (self as u8) & 0x01 != 0
    }

    pub fn rx_enabled(self) -> bool {
        (self as u8) & 0x02 != 0
    }
}

bitflags! {
    /// System capabilities advertised in the system capabilities TLV
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SystemCapabilities: u16 {
        const OTHER = 1 << 0;
        const REPEATER = 1 << 1;
        const MAC_BRIDGE = 1 << 2;
        const WLAN_ACCESS_POINT = 1 << 3;
        const ROUTER = 1 << 4;
        const TELEPHONE = 1 << 5;
        const DOCSIS_CABLE_DEVICE = 1 << 6;
        const STATION_ONLY = 1 << 7;
        const C_VLAN = 1 << 8;
        const S_VLAN = 1 << 9;
        const TWO_PORT_MAC_RELAY = 1 << 10;
    }
}

/// LLDP agent configuration
///
/// Timer values are in seconds and default to the IEEE 802.1AB values. The
/// optional strings override the advertised inventory; `None` advertises the
/// built-in default.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LldpConfig {
    pub admin_status: AdminStatus,
    /// msgTxInterval
    pub msg_tx_interval: u16,
    /// msgTxHold
    pub msg_tx_hold: u16,
    /// msgFastTx
    pub msg_fast_tx: u16,
    /// txFastInit
    pub tx_fast_init: u8,
    /// txCreditMax
    pub tx_credit_max: u8,
    /// reinitDelay
    pub reinit_delay: u16,
    /// Largest LLDPDU the agent will build
    pub max_frame_size: usize,
    /// Destination override, all zeroes selects the standard multicast address
    pub destination_mac: [u8; 6],
    /// Send a TTL 0 frame when transmission is disabled
    pub send_shutdown_frame: bool,
    /// PD spare pair architecture is independent (Cisco 4-wire PoE)
    pub independent_spare_arch: bool,
    pub system_capabilities: SystemCapabilities,
    pub enabled_capabilities: SystemCapabilities,
    pub port_id: String,
    pub port_description: Option<String>,
    pub hardware_revision: Option<String>,
    pub firmware_revision: Option<String>,
    pub software_revision: Option<String>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub asset_id: Option<String>,
    pub mud_url: Option<String>,
}

impl Default for LldpConfig {
    fn default() -> Self {
        Self {
            admin_status: AdminStatus::RxTx,
            msg_tx_interval: 30,
            msg_tx_hold: 4,
            msg_fast_tx: 1,
            tx_fast_init: 4,
            tx_credit_max: 5,
            reinit_delay: 2,
            max_frame_size: MAX_TXBUFF_SIZE,
            destination_mac: [0; 6],
            send_shutdown_frame: true,
            independent_spare_arch: true,
            system_capabilities: SystemCapabilities::empty(),
            enabled_capabilities: SystemCapabilities::empty(),
            port_id: String::from(constants::DEFAULT_PORT_ID),
            port_description: None,
            hardware_revision: None,
            firmware_revision: None,
            software_revision: None,
            serial_number: None,
            manufacturer: None,
            model_name: None,
            asset_id: None,
            mud_url: None,
        }
    }
}

impl LldpConfig {
    /// Destination MAC for outgoing LLDPDUs
    pub fn destination(&self) -> [u8; 6] {
        if self.destination_mac.iter().any(|b| *b != 0) {
            self.destination_mac
        } else {
            constants::LLDP_MULTICAST_MAC
        }
    }

    /// Advertised time to live, `min(65535, msgTxHold * msgTxInterval + 1)`
    pub fn tx_ttl(&self) -> u16 {
        let ttl = u32::from(self.msg_tx_hold) * u32::from(self.msg_tx_interval) + 1;
        ttl.min(u32::from(u16::MAX)) as u16
    }

    pub fn port_description(&self) -> &str {
        self.port_description
            .as_deref()
            .unwrap_or(constants::DEFAULT_PORT_DESCRIPTION)
    }

    pub fn hardware_revision(&self) -> &str {
        self.hardware_revision
            .as_deref()
            .unwrap_or(constants::DEFAULT_HARDWARE_REVISION)
    }

    pub fn firmware_revision(&self) -> &str {
        self.firmware_revision
            .as_deref()
            .unwrap_or(constants::DEFAULT_FIRMWARE_REVISION)
    }

    pub fn software_revision(&self) -> &str {
        self.software_revision
            .as_deref()
            .unwrap_or(constants::DEFAULT_SOFTWARE_REVISION)
    }

    pub fn serial_number(&self) -> &str {
        self.serial_number
            .as_deref()
            .unwrap_or(constants::DEFAULT_SERIAL_NUMBER)
    }

    pub fn manufacturer(&self) -> &str {
        self.manufacturer
            .as_deref()
            .unwrap_or(constants::DEFAULT_MANUFACTURER)
    }

    pub fn model_name(&self) -> &str {
        self.model_name
            .as_deref()
            .unwrap_or(constants::DEFAULT_MODEL_NAME)
    }

    pub fn asset_id(&self) -> &str {
        self.asset_id.as_deref().unwrap_or(constants::DEFAULT_ASSET_ID)
    }

    pub fn mud_url(&self) -> &str {
        self.mud_url.as_deref().unwrap_or(constants::DEFAULT_MUD_URL)
    }
}

/// LLDP agent for one port
pub struct LldpAgent {
    config: LldpConfig,
    port: LldpPort,
    basic_tlvs: Vec<BasicTlvDescriptor>,
    org_tlvs: Vec<OrgTlvDescriptor>,
    processors: Vec<OrgTlvProcessorEntry>,
}

impl fmt::Debug for LldpAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LldpAgent")
            .field("config", &self.config)
            .field("port", &self.port)
            .field("basic_tlvs", &self.basic_tlvs.len())
            .field("org_tlvs", &self.org_tlvs.len())
            .field("processors", &self.processors.len())
            .finish()
    }
}

impl LldpAgent {
    /// Create an agent using the default TLV tables
    pub fn new(config: LldpConfig) -> Self {
        let port = LldpPort::new(config.admin_status);
        Self {
            config,
            port,
            basic_tlvs: tables::BASIC_TLVS.to_vec(),
            org_tlvs: tables::ORG_TLVS.to_vec(),
            processors: tables::ORG_PROCESSORS.to_vec(),
        }
    }

    pub fn config(&self) -> &LldpConfig {
        &self.config
    }

    pub fn port(&self) -> &LldpPort {
        &self.port
    }

    /// Replace the configuration and announce the change
    pub fn set_config(&mut self, config: LldpConfig) {
        self.port.admin_status = config.admin_status;
        self.config = config;
        self.port.tx.local_change = true;
    }

    /// Change the administrative status. Enabling rx or tx brings back a port
    /// that an earlier disable took down.
    pub fn set_admin_status(&mut self, status: AdminStatus) {
        log::debug!("LLDP admin status {:?} -> {:?}", self.port.admin_status, status);
        self.config.admin_status = status;
        self.port.admin_status = status;
        if status != AdminStatus::Disabled && !self.port.port_enabled {
            log::info!("LLDP port back up");
            self.port.port_enabled = true;
        }
    }

    /// Power the device wants, in 0.1 W. Announced on the next poll.
    pub fn set_desired_power(&mut self, power: u16) {
        if self.port.desired_power != power {
            self.port.desired_power = power;
            self.port.tx.local_change = true;
        }
    }

    pub fn desired_power(&self) -> u16 {
        self.port.desired_power
    }

    /// Power granted by the PSE in the last IEEE power via MDI TLV
    pub fn allocated_power(&self) -> u16 {
        self.port.allocated_power
    }

    pub fn org_flags(&self) -> OrgFlags {
        self.port.org_flags
    }

    pub fn remote(&self) -> Option<&RemoteSystem> {
        self.port.remote.as_ref()
    }

    /// Add an organizationally specific TLV to every LLDPDU
    pub fn register_org_tlv(&mut self, descriptor: OrgTlvDescriptor) {
        self.org_tlvs.push(descriptor);
        self.org_tlvs.sort_by_key(|d| d.order);
    }

    /// Add an optional basic TLV to every LLDPDU
    pub fn register_basic_tlv(&mut self, descriptor: BasicTlvDescriptor) {
        self.basic_tlvs.push(descriptor);
        self.basic_tlvs.sort_by_key(|d| d.order);
    }

    /// Handle received organizationally specific TLVs with `entry`
    pub fn register_org_processor(&mut self, entry: OrgTlvProcessorEntry) {
        self.processors.push(entry);
    }

    /// One second tick
    pub fn tick(&mut self) {
        self.port.tick();
    }

    /// Periodic entry point: step the receive, timer and transmit state
    /// machines once
    pub fn run<T: crate::transport::Transport + ?Sized>(&mut self, transport: &mut T) {
        if !self.port.port_enabled {
            return;
        }

        self.rx_state_machine();

        // Keep stepping after tx is disabled so the shutdown sequence completes
        if self.port.admin_status.tx_enabled() || self.port.tx.state != TxState::Initialize {
            self.tx_timer_state_machine();
            self.tx_state_machine(transport);
        }

        if self.port.admin_status == AdminStatus::Disabled
            && self.port.tx.state == TxState::Initialize
        {
            log::info!("LLDP disabled, port going down");
            self.port.port_enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_status_masks() {
        assert!(!AdminStatus::Disabled.tx_enabled());
        assert!(!AdminStatus::Disabled.rx_enabled());
        assert!(AdminStatus::TxOnly.tx_enabled());
        assert!(!AdminStatus::TxOnly.rx_enabled());
        assert!(AdminStatus::RxOnly.rx_enabled());
        assert!(AdminStatus::RxTx.tx_enabled() && AdminStatus::RxTx.rx_enabled());
    }

    #[test]
    fn test_config_defaults() {
        let config = LldpConfig::default();
        assert_eq!(config.msg_tx_interval, 30);
        assert_eq!(config.msg_tx_hold, 4);
        assert_eq!(config.tx_credit_max, 5);
        assert_eq!(config.tx_ttl(), 121);
        assert_eq!(config.destination(), constants::LLDP_MULTICAST_MAC);
        assert_eq!(config.port_description(), "Vendor LED");
        assert_eq!(config.mud_url(), "Add the mud info");
    }

    #[test]
    fn test_tx_ttl_saturates() {
        let config = LldpConfig {
            msg_tx_hold: 1000,
            msg_tx_interval: 1000,
            ..Default::default()
        };
        assert_eq!(config.tx_ttl(), 65535);
    }

    #[test]
    fn test_destination_override() {
        let config = LldpConfig {
            destination_mac: [0x01, 0x80, 0xC2, 0x00, 0x00, 0x03],
            ..Default::default()
        };
        assert_eq!(config.destination(), [0x01, 0x80, 0xC2, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_string_overrides() {
        let config = LldpConfig {
            model_name: Some("Downlight".into()),
            ..Default::default()
        };
        assert_eq!(config.model_name(), "Downlight");
        assert_eq!(config.manufacturer(), "Vendor ID");
    }

    #[test]
    fn test_desired_power_signals_change() {
        let mut agent = LldpAgent::new(LldpConfig::default());
        agent.set_desired_power(0x100);
        assert!(agent.port().tx.local_change);
        assert_eq!(agent.desired_power(), 0x100);
    }
}
