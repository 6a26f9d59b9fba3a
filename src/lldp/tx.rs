//! Transmit timer and transmit state machines, LLDPDU construction.

use core::net::Ipv4Addr;

use super::constants::LLDP_ETHER_TYPE;
use super::port::{TxState, TxTimerState};
use super::tlvs::TxContext;
use super::{LldpAgent, LldpError, Result};
use crate::tlv::{self, constants::TLV_HEADER_SIZE};
use crate::transport::{Endpoint, FrameWriter, Transport};

impl LldpAgent {
    /// txTimerInitializeLLDP
    fn initialize_tx_timers(&mut self) {
        let port = &mut self.port;
        port.tx.timers.tx_tick = false;
        port.tx.tx_now = false;
        port.tx.local_change = false;
        port.tx.timers.tx_ttr = 0;
        port.tx.tx_fast = 0;
        port.new_neighbor = false;
        port.tx.tx_credit = self.config.tx_credit_max;
    }

    /// Exit from Idle, in priority order
    fn idle_transition(&self) -> TxTimerState {
        let tx = &self.port.tx;
        if tx.timers.tx_tick {
            TxTimerState::Tick
        } else if tx.timers.tx_ttr == 0 {
            TxTimerState::Expires
        } else if tx.local_change {
            TxTimerState::SignalTx
        } else if self.port.new_neighbor {
            TxTimerState::FastStart
        } else {
            TxTimerState::Idle
        }
    }

    /// Step the transmit timer state machine once
    pub(super) fn tx_timer_state_machine(&mut self) {
        let tx_enabled = self.port.admin_status.tx_enabled();
        if !tx_enabled && self.port.tx.timer_state != TxTimerState::Initialize {
            log::debug!("LLDP tx timer -> Initialize (tx disabled)");
            self.port.tx.timer_state = TxTimerState::Initialize;
            return;
        }

        let next = match self.port.tx.timer_state {
            TxTimerState::Initialize => {
                self.initialize_tx_timers();
                if tx_enabled {
                    TxTimerState::Idle
                } else {
                    TxTimerState::Initialize
                }
            }
            TxTimerState::Idle => self.idle_transition(),
            TxTimerState::Tick => {
                let tx = &mut self.port.tx;
                tx.timers.tx_tick = false;
                if tx.tx_credit < self.config.tx_credit_max {
                    tx.tx_credit += 1;
                }
                // Leave through Idle's exits directly, or a tick arriving
                // every poll would starve them
                self.idle_transition()
            }
            TxTimerState::Expires => {
                let tx = &mut self.port.tx;
                tx.tx_fast = tx.tx_fast.saturating_sub(1);
                TxTimerState::SignalTx
            }
            TxTimerState::SignalTx => {
                let tx = &mut self.port.tx;
                tx.tx_now = true;
                tx.local_change = false;
                tx.timers.tx_ttr = if tx.tx_fast > 0 {
                    self.config.msg_fast_tx
                } else {
                    self.config.msg_tx_interval
                };
                TxTimerState::Idle
            }
            TxTimerState::FastStart => {
                self.port.new_neighbor = false;
                if self.port.tx.tx_fast == 0 {
                    self.port.tx.tx_fast = self.config.tx_fast_init;
                }
                TxTimerState::Expires
            }
        };

        if next != self.port.tx.timer_state {
            log::trace!("LLDP tx timer {:?} -> {:?}", self.port.tx.timer_state, next);
        }
        self.port.tx.timer_state = next;
    }

    /// Step the transmit state machine once
    pub(super) fn tx_state_machine<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        let tx_enabled = self.port.admin_status.tx_enabled();

        let next = match self.port.tx.state {
            TxState::Initialize => {
                if tx_enabled {
                    TxState::Idle
                } else {
                    TxState::Initialize
                }
            }
            TxState::Idle => {
                self.port.tx.tx_ttl = self.config.tx_ttl();
                if self.port.tx.tx_now && self.port.tx.tx_credit > 0 {
                    TxState::InfoFrame
                } else if !tx_enabled {
                    if self.config.send_shutdown_frame {
                        if let Err(e) = self.send_lldpdu(transport, true) {
                            log::warn!("LLDP shutdown frame not sent: {}", e);
                        }
                    }
                    self.port.tx.timers.tx_shutdown_while = self.config.reinit_delay;
                    TxState::ShutdownFrame
                } else {
                    TxState::Idle
                }
            }
            TxState::InfoFrame => {
                match self.send_lldpdu(transport, false) {
                    Ok(len) => log::info!("LLDPDU sent, {} bytes", len),
                    Err(e) => log::warn!("LLDPDU not sent: {}", e),
                }
                let tx = &mut self.port.tx;
                tx.tx_credit = tx.tx_credit.saturating_sub(1);
                tx.tx_now = false;
                TxState::Idle
            }
            TxState::ShutdownFrame => {
                if self.port.tx.timers.tx_shutdown_while == 0 {
                    TxState::Initialize
                } else {
                    TxState::ShutdownFrame
                }
            }
        };

        if next != self.port.tx.state {
            log::debug!("LLDP tx {:?} -> {:?}", self.port.tx.state, next);
        }
        self.port.tx.state = next;
    }

    fn send_lldpdu<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        shutdown: bool,
    ) -> Result<usize> {
        let endpoint = Endpoint::Ethernet {
            dest_mac: self.config.destination(),
            ether_type: LLDP_ETHER_TYPE,
        };
        transport.start(&endpoint)?;

        let mac = transport.local_mac();
        let ipv4 = transport.local_ipv4();
        if shutdown {
            self.construct_shutdown_lldpdu(transport.writer(), mac, ipv4)?;
        } else {
            self.construct_info_lldpdu(transport.writer(), mac, ipv4)?;
        }
        Ok(transport.send()?)
    }

    /// Write a complete info LLDPDU into `writer`.
    ///
    /// Basic TLVs are written in table order, then the organizationally
    /// specific ones, then the end marker. A chassis ID, port ID or TTL that
    /// does not fit fails the whole frame. The first other TLV that does not
    /// fit ends TLV construction; the end marker is still written, so the
    /// frame stays well formed.
    pub fn construct_info_lldpdu(
        &mut self,
        writer: &mut FrameWriter,
        mac: [u8; 6],
        ipv4: Ipv4Addr,
    ) -> Result<()> {
        let ttl = self.port.tx.tx_ttl;
        self.construct_lldpdu(writer, mac, ipv4, ttl, false)
    }

    /// Write a shutdown LLDPDU: chassis ID, port ID, TTL 0 and the end marker
    pub fn construct_shutdown_lldpdu(
        &mut self,
        writer: &mut FrameWriter,
        mac: [u8; 6],
        ipv4: Ipv4Addr,
    ) -> Result<()> {
        self.construct_lldpdu(writer, mac, ipv4, 0, true)
    }

    fn construct_lldpdu(
        &mut self,
        writer: &mut FrameWriter,
        mac: [u8; 6],
        ipv4: Ipv4Addr,
        ttl: u16,
        mandatory_only: bool,
    ) -> Result<()> {
        let limit = writer.limit();
        // Hold back room for the end marker
        writer.set_limit(
            limit
                .min(self.config.max_frame_size)
                .saturating_sub(TLV_HEADER_SIZE),
        );
        let built = self.write_tlvs(writer, mac, ipv4, ttl, mandatory_only);
        writer.set_limit(limit);
        built?;

        tlv::write_end(writer)?;
        Ok(())
    }

    fn write_tlvs(
        &mut self,
        writer: &mut FrameWriter,
        mac: [u8; 6],
        ipv4: Ipv4Addr,
        ttl: u16,
        mandatory_only: bool,
    ) -> Result<()> {
        let mut ctx = TxContext {
            config: &self.config,
            port: &mut self.port,
            mac,
            ipv4,
            ttl,
        };

        for descriptor in &self.basic_tlvs {
            if mandatory_only && !descriptor.is_mandatory() {
                continue;
            }
            if let Err(e) = descriptor.builder.build(descriptor, &mut ctx, writer) {
                if descriptor.is_mandatory() {
                    return Err(LldpError::MandatoryTlv(e));
                }
                log::warn!("LLDPDU truncated at {}: {}", descriptor.tlv_type, e);
                return Ok(());
            }
            log::trace!("built {} TLV", descriptor.tlv_type);
        }

        if mandatory_only {
            return Ok(());
        }

        for descriptor in &self.org_tlvs {
            if let Err(e) = descriptor.builder.build(descriptor, &mut ctx, writer) {
                log::warn!(
                    "LLDPDU truncated at org TLV {:06X}/{}: {}",
                    descriptor.oui,
                    descriptor.subtype,
                    e
                );
                return Ok(());
            }
            log::trace!("built org TLV {:06X}/{}", descriptor.oui, descriptor.subtype);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::lldp::constants::*;
    use crate::lldp::*;
    use crate::tlv::{TlvHeader, TlvType};
    use crate::transport::{Endpoint, FrameReader, FrameWriter, MemoryTransport, SentFrame};
    use core::net::Ipv4Addr;

    const MAC: [u8; 6] = [0x00, 0x04, 0xA3, 0x12, 0x34, 0x56];

    fn transport() -> MemoryTransport {
        MemoryTransport::new(MAC, Ipv4Addr::new(192, 168, 0, 20))
    }

    fn agent(admin_status: AdminStatus) -> LldpAgent {
        LldpAgent::new(LldpConfig {
            admin_status,
            ..Default::default()
        })
    }

    /// Walk the TLVs of a frame, returning (type, payload) pairs
    fn tlvs(frame: &SentFrame) -> Vec<(u8, Vec<u8>)> {
        let mut reader = FrameReader::new(&frame.payload);
        let mut out = Vec::new();
        loop {
            let header = TlvHeader::read(&mut reader).unwrap();
            let payload = reader.read_block(header.length as usize).unwrap().to_vec();
            out.push((header.tlv_type, payload));
            if header.tlv_type == 0 {
                break;
            }
        }
        assert_eq!(reader.remaining(), 0);
        out
    }

    #[test]
    fn test_timer_stays_initialized_when_tx_disabled() {
        let mut agent = agent(AdminStatus::RxOnly);
        let mut transport = transport();

        for _ in 0..10 {
            agent.tick();
            agent.run(&mut transport);
            assert_eq!(agent.port().tx.timer_state, TxTimerState::Initialize);
            assert_eq!(agent.port().tx.state, TxState::Initialize);
        }
        assert!(transport.sent().is_empty());

        // Enabling tx moves the timer to Idle on the next evaluation
        agent.set_admin_status(AdminStatus::RxTx);
        agent.run(&mut transport);
        assert_eq!(agent.port().tx.timer_state, TxTimerState::Idle);
    }

    #[test]
    fn test_first_frame_sequence() {
        let mut agent = agent(AdminStatus::TxOnly);
        let mut transport = transport();

        let expected = [
            (TxTimerState::Idle, TxState::Idle),
            (TxTimerState::Expires, TxState::Idle),
            (TxTimerState::SignalTx, TxState::Idle),
            (TxTimerState::Idle, TxState::InfoFrame),
            (TxTimerState::Idle, TxState::Idle),
        ];
        for (timer, tx) in expected {
            agent.run(&mut transport);
            assert_eq!(agent.port().tx.timer_state, timer);
            assert_eq!(agent.port().tx.state, tx);
        }

        assert_eq!(transport.sent().len(), 1);
        assert_eq!(agent.port().tx.tx_credit, 4);
        assert_eq!(agent.port().tx.timers.tx_ttr, 30);
        assert!(!agent.port().tx.tx_now);
    }

    #[test]
    fn test_credit_bounds() {
        let mut agent = agent(AdminStatus::TxOnly);
        let mut transport = transport();
        let max = agent.config().tx_credit_max;

        // Keep asking for frames without ticks until the credit runs out
        for _ in 0..200 {
            agent.set_desired_power(agent.desired_power().wrapping_add(1));
            agent.run(&mut transport);
            assert!(agent.port().tx.tx_credit <= max);
        }
        assert_eq!(agent.port().tx.tx_credit, 0);
        assert_eq!(transport.sent().len(), max as usize);

        // Ticks refill the bucket, never past the maximum
        for _ in 0..50 {
            agent.tick();
            agent.run(&mut transport);
            assert!(agent.port().tx.tx_credit <= max);
        }
    }

    #[test]
    fn test_periodic_announcement() {
        let mut agent = LldpAgent::new(LldpConfig {
            admin_status: AdminStatus::TxOnly,
            msg_tx_interval: 5,
            ..Default::default()
        });
        let mut transport = transport();

        for _ in 0..8 {
            agent.run(&mut transport);
        }
        assert_eq!(transport.sent().len(), 1);

        // One tick per second with a few polls in between
        for _ in 0..5 {
            agent.tick();
            for _ in 0..4 {
                agent.run(&mut transport);
            }
        }
        // The fifth tick expired the timer and the frame is queued
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(agent.port().tx.timers.tx_ttr, 5);
        assert_eq!(agent.port().tx.state, TxState::InfoFrame);

        agent.run(&mut transport);
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_one_poll_per_tick_still_announces() {
        let mut agent = LldpAgent::new(LldpConfig {
            admin_status: AdminStatus::TxOnly,
            msg_tx_interval: 3,
            ..Default::default()
        });
        let mut transport = transport();

        for _ in 0..20 {
            agent.tick();
            agent.run(&mut transport);
        }
        assert!(transport.sent().len() >= 2);
    }

    #[test]
    fn test_fast_start_on_new_neighbor() {
        let mut agent = agent(AdminStatus::RxTx);
        let mut transport = transport();
        for _ in 0..8 {
            agent.run(&mut transport);
        }
        assert_eq!(transport.sent().len(), 1);

        agent.port.new_neighbor = true;
        agent.run(&mut transport);
        assert_eq!(agent.port().tx.timer_state, TxTimerState::FastStart);
        agent.run(&mut transport);
        assert_eq!(agent.port().tx.timer_state, TxTimerState::Expires);
        assert!(!agent.port().new_neighbor);
        assert_eq!(agent.port().tx.tx_fast, 4);

        for _ in 0..4 {
            agent.run(&mut transport);
        }
        assert_eq!(transport.sent().len(), 2);
        // Fast interval while fast start is active
        assert_eq!(agent.port().tx.tx_fast, 3);
        assert_eq!(agent.port().tx.timers.tx_ttr, 1);
    }

    #[test]
    fn test_info_frame_layout() {
        let mut agent = agent(AdminStatus::TxOnly);
        let mut transport = transport();
        for _ in 0..5 {
            agent.run(&mut transport);
        }

        let frame = transport.last_sent().unwrap();
        assert_eq!(
            frame.endpoint,
            Endpoint::Ethernet {
                dest_mac: LLDP_MULTICAST_MAC,
                ether_type: LLDP_ETHER_TYPE
            }
        );

        let tlvs = tlvs(frame);
        // 7 basic, 17 org, end
        assert_eq!(tlvs.len(), 25);

        assert_eq!(tlvs[0].0, 1);
        assert_eq!(tlvs[0].1, [&[CHASSIS_SUBTYPE_MAC][..], &MAC[..]].concat());
        assert_eq!(tlvs[1].0, 2);
        assert_eq!(tlvs[1].1, b"\x05Gi?/?".to_vec());
        assert_eq!(tlvs[2], (3, vec![0x00, 121]));
        assert_eq!(tlvs[3], (4, b"Vendor LED".to_vec()));
        assert_eq!(tlvs[4], (7, vec![0, 0, 0, 0]));
        assert_eq!(tlvs[5].0, 6);
        assert_eq!(
            tlvs[6],
            (8, vec![5, 1, 192, 168, 0, 20, 0, 0, 0, 0, 0, 0])
        );

        // MAC/PHY config is the first org TLV
        assert_eq!(tlvs[7].0, 127);
        assert_eq!(tlvs[7].1, vec![0x00, 0x12, 0x0F, 0x01, 0x03, 0x6C, 0x01, 0x00, 0x10]);
        // MUD URL is the last
        assert_eq!(&tlvs[23].1[..4], &[0x00, 0x00, 0x5E, 0x01]);
        assert_eq!(&tlvs[23].1[4..], b"Add the mud info");

        assert_eq!(tlvs[24], (0, vec![]));
    }

    #[test]
    fn test_destination_override_used() {
        let mut agent = LldpAgent::new(LldpConfig {
            admin_status: AdminStatus::TxOnly,
            destination_mac: [0x01, 0x80, 0xC2, 0x00, 0x00, 0x00],
            ..Default::default()
        });
        let mut transport = transport();
        for _ in 0..5 {
            agent.run(&mut transport);
        }
        assert!(matches!(
            transport.last_sent().unwrap().endpoint,
            Endpoint::Ethernet { dest_mac: [0x01, 0x80, 0xC2, 0x00, 0x00, 0x00], .. }
        ));
    }

    #[test]
    fn test_truncated_frame_still_ends() {
        let mut agent = agent(AdminStatus::TxOnly);
        // Room for the mandatory TLVs, port description and a partial rest
        let mut writer = FrameWriter::new(40);
        agent
            .construct_info_lldpdu(&mut writer, MAC, Ipv4Addr::new(10, 0, 0, 1))
            .unwrap();

        let bytes = writer.as_bytes();
        assert!(bytes.len() <= 40);
        assert_eq!(&bytes[bytes.len() - 2..], &[0x00, 0x00]);

        // Chassis (9) + port (8) + TTL (4) + port description (12) + end (2)
        assert_eq!(bytes.len(), 35);
        let mut reader = FrameReader::new(bytes);
        let mut types = Vec::new();
        loop {
            let header = TlvHeader::read(&mut reader).unwrap();
            reader.dump(header.length as usize).unwrap();
            types.push(header.kind());
            if header.tlv_type == 0 {
                break;
            }
        }
        assert_eq!(
            types,
            vec![
                TlvType::ChassisId,
                TlvType::PortId,
                TlvType::TimeToLive,
                TlvType::PortDescription,
                TlvType::EndOfLldpdu
            ]
        );
    }

    #[test]
    fn test_mandatory_failure_aborts() {
        let mut agent = agent(AdminStatus::TxOnly);
        let mut writer = FrameWriter::new(12);
        let err = agent
            .construct_info_lldpdu(&mut writer, MAC, Ipv4Addr::UNSPECIFIED)
            .unwrap_err();
        assert!(matches!(err, LldpError::MandatoryTlv(_)));
    }

    #[test]
    fn test_max_frame_size_respected() {
        let mut agent = LldpAgent::new(LldpConfig {
            admin_status: AdminStatus::TxOnly,
            max_frame_size: 64,
            ..Default::default()
        });
        let mut writer = FrameWriter::new(1500);
        agent
            .construct_info_lldpdu(&mut writer, MAC, Ipv4Addr::UNSPECIFIED)
            .unwrap();
        assert!(writer.byte_count() <= 64);
        assert_eq!(writer.limit(), 1500);
    }

    #[test]
    fn test_shutdown_sequence() {
        let mut agent = LldpAgent::new(LldpConfig {
            admin_status: AdminStatus::TxOnly,
            reinit_delay: 2,
            ..Default::default()
        });
        let mut transport = transport();
        for _ in 0..5 {
            agent.run(&mut transport);
        }
        assert_eq!(transport.sent().len(), 1);

        agent.set_admin_status(AdminStatus::RxOnly);
        agent.run(&mut transport);
        assert_eq!(agent.port().tx.state, TxState::ShutdownFrame);
        assert_eq!(agent.port().tx.timers.tx_shutdown_while, 2);

        // Shutdown frame carries TTL 0 and only the mandatory TLVs
        let shutdown = transport.last_sent().unwrap();
        let tlvs = tlvs(shutdown);
        assert_eq!(tlvs.len(), 4);
        assert_eq!(tlvs[2], (3, vec![0, 0]));

        // Waits out the reinit delay; the idle timer machine leaves it alone
        agent.run(&mut transport);
        assert_eq!(agent.port().tx.timer_state, TxTimerState::Initialize);
        assert_eq!(agent.port().tx.state, TxState::ShutdownFrame);
        assert_eq!(agent.port().tx.timers.tx_shutdown_while, 2);
        agent.tick();
        agent.tick();
        agent.run(&mut transport);
        assert_eq!(agent.port().tx.state, TxState::Initialize);
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_disabled_port_goes_down() {
        let mut agent = LldpAgent::new(LldpConfig {
            admin_status: AdminStatus::TxOnly,
            reinit_delay: 0,
            send_shutdown_frame: false,
            ..Default::default()
        });
        let mut transport = transport();
        agent.run(&mut transport);

        agent.set_admin_status(AdminStatus::Disabled);
        for _ in 0..3 {
            agent.run(&mut transport);
        }
        assert!(!agent.port().port_enabled);
        assert!(transport.sent().is_empty());

        // Further polls do nothing until the port is enabled again
        agent.run(&mut transport);
        assert!(transport.sent().is_empty());
        agent.set_admin_status(AdminStatus::TxOnly);
        assert!(agent.port().port_enabled);
        for _ in 0..5 {
            agent.run(&mut transport);
        }
        assert_eq!(transport.sent().len(), 1);
    }
}
