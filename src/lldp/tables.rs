//! Descriptor tables driving LLDPDU construction and org TLV dispatch.
//!
//! The order field is the transmission sequence. Chassis ID, port ID and TTL
//! must stay at orders 0 to 2; the end marker is added by the frame builder
//! and never appears here.

use core::fmt;

use super::constants::*;
use super::tlvs::*;
use crate::tlv::TlvType;

/// A basic TLV emitted in every LLDPDU
#[derive(Clone, Copy)]
pub struct BasicTlvDescriptor {
    pub order: u8,
    pub tlv_type: TlvType,
    /// 0 when the TLV has no subtype
    pub subtype: u8,
    /// Largest payload the builder may emit, excluding the subtype
    pub max_len: u16,
    pub builder: &'static dyn BasicTlvBuilder,
}

impl BasicTlvDescriptor {
    /// Chassis ID, port ID and TTL
    pub fn is_mandatory(&self) -> bool {
        matches!(
            self.tlv_type,
            TlvType::ChassisId | TlvType::PortId | TlvType::TimeToLive
        )
    }
}

impl fmt::Debug for BasicTlvDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicTlvDescriptor")
            .field("order", &self.order)
            .field("tlv_type", &self.tlv_type)
            .field("subtype", &self.subtype)
            .field("max_len", &self.max_len)
            .finish()
    }
}

/// An organizationally specific TLV emitted in every LLDPDU
#[derive(Clone, Copy)]
pub struct OrgTlvDescriptor {
    pub order: u8,
    pub subtype: u8,
    /// Largest payload the builder may emit, excluding OUI and subtype
    pub max_len: u16,
    pub oui: u32,
    pub builder: &'static dyn OrgTlvBuilder,
}

impl fmt::Debug for OrgTlvDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrgTlvDescriptor")
            .field("order", &self.order)
            .field("oui", &format_args!("{:06X}", self.oui))
            .field("subtype", &self.subtype)
            .field("max_len", &self.max_len)
            .finish()
    }
}

/// Handler for received organizationally specific TLVs
#[derive(Clone, Copy)]
pub struct OrgTlvProcessorEntry {
    pub oui: u32,
    pub subtype: u8,
    pub processor: &'static dyn OrgTlvProcessor,
}

impl fmt::Debug for OrgTlvProcessorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrgTlvProcessorEntry")
            .field("oui", &format_args!("{:06X}", self.oui))
            .field("subtype", &self.subtype)
            .finish()
    }
}

pub static BASIC_TLVS: [BasicTlvDescriptor; 7] = [
    BasicTlvDescriptor {
        order: 0,
        tlv_type: TlvType::ChassisId,
        subtype: CHASSIS_SUBTYPE_MAC,
        max_len: 255,
        builder: &ChassisIdTlv,
    },
    BasicTlvDescriptor {
        order: 1,
        tlv_type: TlvType::PortId,
        subtype: PORT_SUBTYPE_INTERFACE_NAME,
        max_len: 255,
        builder: &PortIdTlv,
    },
    BasicTlvDescriptor {
        order: 2,
        tlv_type: TlvType::TimeToLive,
        subtype: 0,
        max_len: 2,
        builder: &TimeToLiveTlv,
    },
    BasicTlvDescriptor {
        order: 3,
        tlv_type: TlvType::PortDescription,
        subtype: 0,
        max_len: 255,
        builder: &ConfigStringTlv(ConfigField::PortDescription),
    },
    BasicTlvDescriptor {
        order: 4,
        tlv_type: TlvType::SystemCapabilities,
        subtype: 0,
        max_len: 4,
        builder: &SystemCapabilitiesTlv,
    },
    BasicTlvDescriptor {
        order: 5,
        tlv_type: TlvType::SystemDescription,
        subtype: 0,
        max_len: 255,
        builder: &SystemDescriptionTlv,
    },
    BasicTlvDescriptor {
        order: 6,
        tlv_type: TlvType::ManagementAddress,
        subtype: 0,
        max_len: 167,
        builder: &ManagementAddressTlv,
    },
];

pub static ORG_TLVS: [OrgTlvDescriptor; 17] = [
    // Auto-negotiation supported and enabled, advertised capabilities,
    // operational MAU type 100BASE-TX full duplex
    OrgTlvDescriptor {
        order: 0,
        subtype: IEEE_MAC_PHY_CONFIG,
        max_len: 5,
        oui: IEEE802_3_OUI,
        builder: &FixedTlv(&[0x03, 0x6C, 0x01, 0x00, 0x10]),
    },
    OrgTlvDescriptor {
        order: 1,
        subtype: CISCO_POWER_VIA_MDI,
        max_len: 1,
        oui: CISCO_OUI,
        builder: &CiscoPowerViaMdiTlv,
    },
    OrgTlvDescriptor {
        order: 2,
        subtype: IEEE_POWER_VIA_MDI,
        max_len: 8,
        oui: IEEE802_3_OUI,
        builder: &PowerViaMdiTlv,
    },
    // Capabilities: LLDP-MED and extended power, device class I endpoint
    OrgTlvDescriptor {
        order: 3,
        subtype: TIA_MED_CAPABILITIES,
        max_len: 3,
        oui: TIA_OUI,
        builder: &FixedTlv(&[0x00, 0x11, 0x01]),
    },
    OrgTlvDescriptor {
        order: 4,
        subtype: TIA_NETWORK_POLICY,
        max_len: 4,
        oui: TIA_OUI,
        builder: &FixedTlv(&[0x00, 0x00, 0x00, 0x00]),
    },
    OrgTlvDescriptor {
        order: 5,
        subtype: TIA_EXTENDED_POWER_VIA_MDI,
        max_len: 3,
        oui: TIA_OUI,
        builder: &ExtendedPowerViaMdiTlv,
    },
    // IoT device
    OrgTlvDescriptor {
        order: 6,
        subtype: CISCO_DEVICE_TYPE,
        max_len: 1,
        oui: CISCO_OUI,
        builder: &FixedTlv(&[0x0B]),
    },
    // Actuator and sensor present
    OrgTlvDescriptor {
        order: 7,
        subtype: CISCO_DEVICE_CLASS,
        max_len: 1,
        oui: CISCO_OUI,
        builder: &FixedTlv(&[0x03]),
    },
    // CoAP
    OrgTlvDescriptor {
        order: 8,
        subtype: CISCO_DEVICE_PROTOCOL,
        max_len: 1,
        oui: CISCO_OUI,
        builder: &FixedTlv(&[0x00]),
    },
    OrgTlvDescriptor {
        order: 9,
        subtype: TIA_HARDWARE_REVISION,
        max_len: 255,
        oui: TIA_OUI,
        builder: &ConfigStringTlv(ConfigField::HardwareRevision),
    },
    OrgTlvDescriptor {
        order: 10,
        subtype: TIA_FIRMWARE_REVISION,
        max_len: 255,
        oui: TIA_OUI,
        builder: &ConfigStringTlv(ConfigField::FirmwareRevision),
    },
    OrgTlvDescriptor {
        order: 11,
        subtype: TIA_SOFTWARE_REVISION,
        max_len: 255,
        oui: TIA_OUI,
        builder: &ConfigStringTlv(ConfigField::SoftwareRevision),
    },
    OrgTlvDescriptor {
        order: 12,
        subtype: TIA_SERIAL_NUMBER,
        max_len: 255,
        oui: TIA_OUI,
        builder: &ConfigStringTlv(ConfigField::SerialNumber),
    },
    OrgTlvDescriptor {
        order: 13,
        subtype: TIA_MANUFACTURER_NAME,
        max_len: 255,
        oui: TIA_OUI,
        builder: &ConfigStringTlv(ConfigField::Manufacturer),
    },
    OrgTlvDescriptor {
        order: 14,
        subtype: TIA_MODEL_NAME,
        max_len: 255,
        oui: TIA_OUI,
        builder: &ConfigStringTlv(ConfigField::ModelName),
    },
    OrgTlvDescriptor {
        order: 15,
        subtype: TIA_ASSET_ID,
        max_len: 255,
        oui: TIA_OUI,
        builder: &ConfigStringTlv(ConfigField::AssetId),
    },
    OrgTlvDescriptor {
        order: 16,
        subtype: MUD_URL,
        max_len: 255,
        oui: IANA_OUI,
        builder: &ConfigStringTlv(ConfigField::MudUrl),
    },
];

pub static ORG_PROCESSORS: [OrgTlvProcessorEntry; 2] = [
    OrgTlvProcessorEntry {
        oui: CISCO_OUI,
        subtype: CISCO_POWER_VIA_MDI,
        processor: &CiscoPowerProcessor,
    },
    OrgTlvProcessorEntry {
        oui: IEEE802_3_OUI,
        subtype: IEEE_POWER_VIA_MDI,
        processor: &PowerViaMdiProcessor,
    },
];
