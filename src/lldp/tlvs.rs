//! TLV builders and processors.
//!
//! Builders write one TLV each into the frame being assembled; processors
//! consume the payload of one received organizationally specific TLV. Both
//! are referenced from the descriptor tables in [`super::tables`], so every
//! implementation here is a unit or constant-constructible struct.

use core::net::Ipv4Addr;

#[cfg(not(feature = "std"))]
use alloc::{format, string::String};

use super::constants::{POE_MIN_REQUEST, POE_PLUS_MAX_REQUEST, UPOE_MAX_REQUEST};
use super::port::{LldpPort, OrgFlags};
use super::tables::{BasicTlvDescriptor, OrgTlvDescriptor};
use super::{LldpConfig, LldpError};
use crate::tlv::{self, constants::ORG_HEADER_SIZE, TlvType};
use crate::transport::FrameWriter;

/// Everything a builder may read while the frame is assembled
pub struct TxContext<'a> {
    pub config: &'a LldpConfig,
    pub port: &'a mut LldpPort,
    /// Interface MAC, used as the chassis ID
    pub mac: [u8; 6],
    pub ipv4: Ipv4Addr,
    /// Value for the TTL TLV, 0 in a shutdown frame
    pub ttl: u16,
}

/// Builds one basic TLV
pub trait BasicTlvBuilder: Sync {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()>;
}

/// Builds one organizationally specific TLV
pub trait OrgTlvBuilder: Sync {
    fn build(
        &self,
        descriptor: &OrgTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()>;
}

/// Handles the payload of a received organizationally specific TLV. The
/// payload excludes the OUI and subtype.
pub trait OrgTlvProcessor: Sync {
    fn process(&self, payload: &[u8], port: &mut LldpPort) -> super::Result<()>;
}

fn capped(bytes: &[u8], max_len: u16) -> &[u8] {
    &bytes[..bytes.len().min(usize::from(max_len))]
}

/// Chassis ID from the interface MAC
#[derive(Debug)]
pub struct ChassisIdTlv;

impl BasicTlvBuilder for ChassisIdTlv {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        let mac = ctx.mac;
        tlv::write_basic(
            writer,
            descriptor.tlv_type,
            descriptor.subtype,
            capped(&mac, descriptor.max_len),
        )
    }
}

/// Port ID from the configured interface name
#[derive(Debug)]
pub struct PortIdTlv;

impl BasicTlvBuilder for PortIdTlv {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        tlv::write_basic(
            writer,
            descriptor.tlv_type,
            descriptor.subtype,
            capped(ctx.config.port_id.as_bytes(), descriptor.max_len),
        )
    }
}

#[derive(Debug)]
pub struct TimeToLiveTlv;

impl BasicTlvBuilder for TimeToLiveTlv {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        tlv::write_basic(
            writer,
            descriptor.tlv_type,
            descriptor.subtype,
            &ctx.ttl.to_be_bytes(),
        )
    }
}

#[derive(Debug)]
pub struct SystemCapabilitiesTlv;

impl BasicTlvBuilder for SystemCapabilitiesTlv {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        let supported = ctx.config.system_capabilities.bits().to_be_bytes();
        let enabled = ctx.config.enabled_capabilities.bits().to_be_bytes();
        tlv::write_basic(
            writer,
            descriptor.tlv_type,
            descriptor.subtype,
            &[supported[0], supported[1], enabled[0], enabled[1]],
        )
    }
}

/// SNMP style system description summarising the inventory strings
#[derive(Debug)]
pub struct SystemDescriptionTlv;

impl SystemDescriptionTlv {
    pub fn describe(config: &LldpConfig) -> String {
        format!(
            "sysDescr.0 = STRING: <<Port_Desc: {}; HW_REV: {}; VENDOR: {}; SW_REV: {}; MODEL: {}; FW_REV: {}>>",
            config.port_description(),
            config.hardware_revision(),
            config.manufacturer(),
            config.software_revision(),
            config.model_name(),
            config.firmware_revision(),
        )
    }
}

impl BasicTlvBuilder for SystemDescriptionTlv {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        let description = Self::describe(ctx.config);
        tlv::write_basic(
            writer,
            descriptor.tlv_type,
            descriptor.subtype,
            capped(description.as_bytes(), descriptor.max_len),
        )
    }
}

/// IPv4 management address
#[derive(Debug)]
pub struct ManagementAddressTlv;

impl BasicTlvBuilder for ManagementAddressTlv {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        let ip = ctx.ipv4.octets();
        // Address string length covers the family byte and the address.
        // Interface numbering and OID are left unknown.
        let payload = [
            5,
            super::constants::MGMT_ADDRESS_FAMILY_IPV4,
            ip[0],
            ip[1],
            ip[2],
            ip[3],
            0,
            0,
            0,
            0,
            0,
            0,
        ];
        tlv::write_basic(writer, descriptor.tlv_type, descriptor.subtype, &payload)
    }
}

/// Configurable strings advertised by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    PortDescription,
    HardwareRevision,
    FirmwareRevision,
    SoftwareRevision,
    SerialNumber,
    Manufacturer,
    ModelName,
    AssetId,
    MudUrl,
}

impl ConfigField {
    pub fn value(self, config: &LldpConfig) -> &str {
        match self {
            ConfigField::PortDescription => config.port_description(),
            ConfigField::HardwareRevision => config.hardware_revision(),
            ConfigField::FirmwareRevision => config.firmware_revision(),
            ConfigField::SoftwareRevision => config.software_revision(),
            ConfigField::SerialNumber => config.serial_number(),
            ConfigField::Manufacturer => config.manufacturer(),
            ConfigField::ModelName => config.model_name(),
            ConfigField::AssetId => config.asset_id(),
            ConfigField::MudUrl => config.mud_url(),
        }
    }
}

/// A string from the configuration, capped at the descriptor length
#[derive(Debug)]
pub struct ConfigStringTlv(pub ConfigField);

impl BasicTlvBuilder for ConfigStringTlv {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        let value = self.0.value(ctx.config);
        tlv::write_basic(
            writer,
            descriptor.tlv_type,
            descriptor.subtype,
            capped(value.as_bytes(), descriptor.max_len),
        )
    }
}

impl OrgTlvBuilder for ConfigStringTlv {
    fn build(
        &self,
        descriptor: &OrgTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        let value = self.0.value(ctx.config);
        tlv::write_org(
            writer,
            descriptor.oui,
            descriptor.subtype,
            capped(value.as_bytes(), descriptor.max_len),
        )
    }
}

/// TLV with a constant payload
#[derive(Debug)]
pub struct FixedTlv(pub &'static [u8]);

impl BasicTlvBuilder for FixedTlv {
    fn build(
        &self,
        descriptor: &BasicTlvDescriptor,
        _ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        tlv::write_basic(writer, descriptor.tlv_type, descriptor.subtype, self.0)
    }
}

impl OrgTlvBuilder for FixedTlv {
    fn build(
        &self,
        descriptor: &OrgTlvDescriptor,
        _ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        tlv::write_org(writer, descriptor.oui, descriptor.subtype, self.0)
    }
}

/// Cisco 4-wire PoE capabilities
#[derive(Debug)]
pub struct CiscoPowerViaMdiTlv;

impl CiscoPowerViaMdiTlv {
    const FOUR_WIRE_SUPPORT: u8 = 0x01;
    const SPARE_PAIR_ARCH_SHARED: u8 = 0x02;
    const SPARE_PAIR_REQUESTED: u8 = 0x04;
    const SPARE_PAIR_ENABLED: u8 = 0x08;

    /// Capability byte advertised for the current port state
    pub fn options(config: &LldpConfig, port: &mut LldpPort) -> u8 {
        port.org_flags.set(
            OrgFlags::PD_SPARE_PAIR_REQUESTED,
            port.desired_power >= POE_PLUS_MAX_REQUEST,
        );

        let flags = port.org_flags;
        let mut options = 0;
        if flags.contains(OrgFlags::FOUR_WIRE_SUPPORTED) {
            options |= Self::FOUR_WIRE_SUPPORT;
        }
        if !config.independent_spare_arch {
            options |= Self::SPARE_PAIR_ARCH_SHARED;
        }
        if flags.contains(OrgFlags::FOUR_WIRE_SUPPORTED | OrgFlags::PD_SPARE_PAIR_REQUESTED) {
            options |= Self::SPARE_PAIR_REQUESTED;
        }
        if flags.contains(OrgFlags::POE_PAIR_ENABLED) {
            options |= Self::SPARE_PAIR_ENABLED;
        }
        options
    }
}

impl OrgTlvBuilder for CiscoPowerViaMdiTlv {
    fn build(
        &self,
        descriptor: &OrgTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        let options = Self::options(ctx.config, ctx.port);
        tlv::write_org(writer, descriptor.oui, descriptor.subtype, &[options])
    }
}

/// IEEE 802.3 power via MDI, carrying the power request
#[derive(Debug)]
pub struct PowerViaMdiTlv;

impl PowerViaMdiTlv {
    /// MDI power support: PSE pairs controllable, PD device type
    const MDI_POWER_SUPPORT: u8 = 0x0F;
    const PSE_POWER_PAIR: u8 = 0x01;
    /// Power class 4
    const POWER_CLASS: u8 = 0x05;
    /// Type 2 PD, PSE and local power source, low priority
    const TYPE_SOURCE_PRIORITY: u8 = 0x53;

    /// Power value to request given what was asked for and what was granted
    pub fn requested_power(port: &LldpPort) -> u16 {
        let desired = port.desired_power;
        let allocated = port.allocated_power;

        if allocated == desired {
            return if desired == 0 {
                POE_MIN_REQUEST
            } else {
                allocated
            };
        }

        if port.org_flags.contains(OrgFlags::FOUR_WIRE_SUPPORTED) {
            if desired != 0 && desired <= UPOE_MAX_REQUEST {
                desired
            } else {
                UPOE_MAX_REQUEST
            }
        } else if (POE_MIN_REQUEST..=POE_PLUS_MAX_REQUEST).contains(&desired) {
            desired
        } else if desired > POE_PLUS_MAX_REQUEST {
            POE_PLUS_MAX_REQUEST
        } else {
            POE_MIN_REQUEST
        }
    }
}

impl OrgTlvBuilder for PowerViaMdiTlv {
    fn build(
        &self,
        descriptor: &OrgTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        let requested = Self::requested_power(ctx.port).to_be_bytes();
        let allocated = ctx.port.allocated_power.to_be_bytes();
        let payload = [
            Self::MDI_POWER_SUPPORT,
            Self::PSE_POWER_PAIR,
            Self::POWER_CLASS,
            Self::TYPE_SOURCE_PRIORITY,
            requested[0],
            requested[1],
            allocated[0],
            allocated[1],
        ];
        tlv::write_org(writer, descriptor.oui, descriptor.subtype, &payload)
    }
}

/// TIA LLDP-MED extended power via MDI
#[derive(Debug)]
pub struct ExtendedPowerViaMdiTlv;

impl OrgTlvBuilder for ExtendedPowerViaMdiTlv {
    fn build(
        &self,
        descriptor: &OrgTlvDescriptor,
        ctx: &mut TxContext<'_>,
        writer: &mut FrameWriter,
    ) -> tlv::Result<()> {
        // PD, PSE source, low priority; value is a single byte here
        let value = ctx.port.desired_power.min(0xFF) as u8;
        tlv::write_org(
            writer,
            descriptor.oui,
            descriptor.subtype,
            &[0x51, 0x00, value],
        )
    }
}

/// Reads the Cisco 4-wire PoE capability byte
#[derive(Debug)]
pub struct CiscoPowerProcessor;

impl OrgTlvProcessor for CiscoPowerProcessor {
    fn process(&self, payload: &[u8], port: &mut LldpPort) -> super::Result<()> {
        let capabilities = *payload.first().ok_or(LldpError::MalformedTlv {
            tlv_type: TlvType::OrganizationSpecific.into(),
            length: (payload.len() + ORG_HEADER_SIZE) as u16,
        })?;

        port.org_flags
            .set(OrgFlags::FOUR_WIRE_SUPPORTED, capabilities & 0x01 != 0);
        port.org_flags
            .set(OrgFlags::POE_PAIR_ENABLED, capabilities & 0x08 != 0);
        log::debug!(
            "Cisco PoE capabilities {:#04x}, flags {:?}",
            capabilities,
            port.org_flags
        );
        Ok(())
    }
}

/// Reads the power allocation from an IEEE 802.3 power via MDI TLV
#[derive(Debug)]
pub struct PowerViaMdiProcessor;

impl OrgTlvProcessor for PowerViaMdiProcessor {
    fn process(&self, payload: &[u8], port: &mut LldpPort) -> super::Result<()> {
        // MDI support, power pair and class are mandatory
        if payload.len() < 3 {
            return Err(LldpError::MalformedTlv {
                tlv_type: TlvType::OrganizationSpecific.into(),
                length: (payload.len() + ORG_HEADER_SIZE) as u16,
            });
        }
        // 802.3af PSEs send no allocation fields
        if payload.len() < 8 {
            log::debug!("PSE sent no power allocation, class {}", payload[2]);
            return Ok(());
        }
        let requested = u16::from_be_bytes([payload[4], payload[5]]);
        let allocated = u16::from_be_bytes([payload[6], payload[7]]);

        port.set_power_tier(allocated);
        log::info!(
            "PSE allocated {} (requested {}), class {}",
            allocated,
            requested,
            payload[2]
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lldp::{constants::*, AdminStatus};

    fn context<'a>(config: &'a LldpConfig, port: &'a mut LldpPort) -> TxContext<'a> {
        TxContext {
            config,
            port,
            mac: [0x00, 0x04, 0xA3, 0x12, 0x34, 0x56],
            ipv4: Ipv4Addr::new(192, 168, 0, 20),
            ttl: 121,
        }
    }

    static EMPTY: FixedTlv = FixedTlv(&[]);

    fn org(oui: u32, subtype: u8, max_len: u16) -> OrgTlvDescriptor {
        OrgTlvDescriptor {
            order: 0,
            subtype,
            max_len,
            oui,
            builder: &EMPTY,
        }
    }

    #[test]
    fn test_requested_power_matches_allocation() {
        let mut port = LldpPort::new(AdminStatus::RxTx);

        // Nothing requested yet: ask for the 13 W minimum
        assert_eq!(PowerViaMdiTlv::requested_power(&port), 0x82);

        port.desired_power = 200;
        port.allocated_power = 200;
        assert_eq!(PowerViaMdiTlv::requested_power(&port), 200);
    }

    #[test]
    fn test_requested_power_two_pair() {
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.allocated_power = 0x82;

        port.desired_power = 0xC8;
        assert_eq!(PowerViaMdiTlv::requested_power(&port), 0xC8);

        port.desired_power = 0x120;
        assert_eq!(PowerViaMdiTlv::requested_power(&port), 0xFF);

        port.desired_power = 0x50;
        assert_eq!(PowerViaMdiTlv::requested_power(&port), 0x82);
    }

    #[test]
    fn test_requested_power_four_wire() {
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.org_flags.insert(OrgFlags::FOUR_WIRE_SUPPORTED);
        port.allocated_power = 0x82;

        port.desired_power = 0x180;
        assert_eq!(PowerViaMdiTlv::requested_power(&port), 0x180);

        port.desired_power = 0x300;
        assert_eq!(PowerViaMdiTlv::requested_power(&port), 0x1FE);
    }

    #[test]
    fn test_power_via_mdi_payload() {
        let config = LldpConfig::default();
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.desired_power = 0xC8;
        port.allocated_power = 0x82;
        let mut writer = FrameWriter::new(64);

        let descriptor = org(IEEE802_3_OUI, IEEE_POWER_VIA_MDI, 8);
        PowerViaMdiTlv
            .build(&descriptor, &mut context(&config, &mut port), &mut writer)
            .unwrap();

        assert_eq!(
            writer.as_bytes(),
            &[
                0xFE, 0x0C, 0x00, 0x12, 0x0F, 0x02, 0x0F, 0x01, 0x05, 0x53, 0x00, 0xC8, 0x00,
                0x82
            ]
        );
    }

    #[test]
    fn test_cisco_options() {
        let config = LldpConfig {
            independent_spare_arch: false,
            ..Default::default()
        };
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.desired_power = 0x1FE;
        port.org_flags = OrgFlags::FOUR_WIRE_SUPPORTED | OrgFlags::POE_PAIR_ENABLED;

        let options = CiscoPowerViaMdiTlv::options(&config, &mut port);
        assert_eq!(options, 0x0F);
        assert!(port.org_flags.contains(OrgFlags::PD_SPARE_PAIR_REQUESTED));

        // Spare pair request is withdrawn when less power is wanted
        port.desired_power = 0x82;
        let options = CiscoPowerViaMdiTlv::options(&LldpConfig::default(), &mut port);
        assert_eq!(options, 0x09);
        assert!(!port.org_flags.contains(OrgFlags::PD_SPARE_PAIR_REQUESTED));
    }

    #[test]
    fn test_extended_power_caps_value() {
        let config = LldpConfig::default();
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.desired_power = 0x200;
        let mut writer = FrameWriter::new(64);

        let descriptor = org(TIA_OUI, TIA_EXTENDED_POWER_VIA_MDI, 3);
        ExtendedPowerViaMdiTlv
            .build(&descriptor, &mut context(&config, &mut port), &mut writer)
            .unwrap();
        assert_eq!(&writer.as_bytes()[6..], &[0x51, 0x00, 0xFF]);
    }

    #[test]
    fn test_config_string_capped() {
        let config = LldpConfig {
            serial_number: Some("SN-0123456789".into()),
            ..Default::default()
        };
        let mut port = LldpPort::new(AdminStatus::RxTx);
        let mut writer = FrameWriter::new(64);

        let descriptor = org(TIA_OUI, TIA_SERIAL_NUMBER, 4);
        OrgTlvBuilder::build(
            &ConfigStringTlv(ConfigField::SerialNumber),
            &descriptor,
            &mut context(&config, &mut port),
            &mut writer,
        )
        .unwrap();
        assert_eq!(&writer.as_bytes()[6..], b"SN-0");
    }

    #[test]
    fn test_system_description_text() {
        let text = SystemDescriptionTlv::describe(&LldpConfig::default());
        assert_eq!(
            text,
            "sysDescr.0 = STRING: <<Port_Desc: Vendor LED; HW_REV: Rev 1.0; VENDOR: Vendor ID; \
             SW_REV: Rev 1.0; MODEL: LED-Dimmable; FW_REV: Rev 1.0>>"
        );
    }

    #[test]
    fn test_cisco_processor_overwrites_flags() {
        let mut port = LldpPort::new(AdminStatus::RxTx);
        port.org_flags = OrgFlags::FOUR_WIRE_SUPPORTED | OrgFlags::POE_PLUS_POWER;

        CiscoPowerProcessor.process(&[0x08], &mut port).unwrap();
        assert!(!port.org_flags.contains(OrgFlags::FOUR_WIRE_SUPPORTED));
        assert!(port.org_flags.contains(OrgFlags::POE_PAIR_ENABLED));
        assert!(port.org_flags.contains(OrgFlags::POE_PLUS_POWER));

        assert!(CiscoPowerProcessor.process(&[], &mut port).is_err());
    }

    #[test]
    fn test_power_processor_sets_tier() {
        let mut port = LldpPort::new(AdminStatus::RxTx);
        let payload = [0x07, 0x01, 0x05, 0x53, 0x01, 0x2C, 0x01, 0x00];

        PowerViaMdiProcessor.process(&payload, &mut port).unwrap();
        assert_eq!(port.allocated_power, 0x0100);
        assert_eq!(port.org_flags & OrgFlags::POWER_TIERS, OrgFlags::UPOE_POWER);

        // Without allocation fields the negotiated tier is kept
        PowerViaMdiProcessor.process(&payload[..3], &mut port).unwrap();
        PowerViaMdiProcessor.process(&payload[..6], &mut port).unwrap();
        assert_eq!(port.allocated_power, 0x0100);
        assert_eq!(port.org_flags & OrgFlags::POWER_TIERS, OrgFlags::UPOE_POWER);

        assert!(PowerViaMdiProcessor.process(&payload[..2], &mut port).is_err());
    }
}
