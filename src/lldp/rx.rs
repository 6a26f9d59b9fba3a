//! Receive state machine and LLDPDU processing.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use super::port::{RemoteSystem, RxState};
use super::{LldpAgent, LldpError, Result};
use crate::tlv::{constants::ORG_HEADER_SIZE, TlvHeader, TlvType};
use crate::transport::FrameReader;

/// Identity TLVs collected while walking one frame
#[derive(Default)]
struct Identity {
    chassis: Option<(u8, Vec<u8>)>,
    port: Option<(u8, Vec<u8>)>,
    ttl: Option<u16>,
}

fn subtyped(tlv_type: TlvType, body: &[u8]) -> Result<(u8, Vec<u8>)> {
    match body.split_first() {
        Some((subtype, id)) if !id.is_empty() => Ok((*subtype, id.to_vec())),
        _ => Err(LldpError::MalformedTlv {
            tlv_type: tlv_type.into(),
            length: body.len() as u16,
        }),
    }
}

impl LldpAgent {
    /// Step the receive state machine once
    pub(super) fn rx_state_machine(&mut self) {
        let enabled = self.port.port_enabled;
        let rx_enabled = self.port.admin_status.rx_enabled();
        let rx = &mut self.port.rx;

        let next = match rx.state {
            _ if !enabled => RxState::WaitPortOperational,
            RxState::WaitPortOperational => RxState::Initialize,
            RxState::Initialize => {
                rx.bad_frame = false;
                rx.rcv_frame = false;
                if rx_enabled {
                    RxState::WaitForFrame
                } else {
                    RxState::Initialize
                }
            }
            _ if !rx_enabled => RxState::Initialize,
            RxState::WaitForFrame | RxState::RxFrame => RxState::WaitForFrame,
        };

        if next != rx.state {
            log::debug!("LLDP rx {:?} -> {:?}", rx.state, next);
            rx.state = next;
        }
    }

    /// Process a received LLDPDU (LLDP_Packet).
    ///
    /// TLVs are read until the end marker. Chassis ID, port ID and TTL must
    /// arrive in that order; organizationally specific TLVs are handed to the
    /// registered processor for their (OUI, subtype), other known TLVs are
    /// skipped. On error the frame is marked bad, the rest of it is
    /// discarded and the receiver goes back to waiting for a frame.
    pub fn process_frame(&mut self, reader: &mut FrameReader<'_>) -> Result<()> {
        if !self.port.port_enabled {
            return Err(LldpError::PortDisabled);
        }
        if !self.port.admin_status.rx_enabled() {
            return Err(LldpError::RxDisabled);
        }

        self.port.rx.state = RxState::RxFrame;
        self.port.rx.rcv_frame = true;
        self.port.rx.bad_frame = false;

        match self.rx_process_frame(reader) {
            Ok(()) => {
                self.port.rx.rcv_frame = false;
                self.port.rx.state = RxState::WaitForFrame;
                Ok(())
            }
            Err(e) => {
                self.process_error(reader, &e);
                Err(e)
            }
        }
    }

    fn process_error(&mut self, reader: &mut FrameReader<'_>, error: &LldpError) {
        log::warn!(
            "bad LLDPDU at byte {}: {}, discarding {} bytes",
            reader.byte_count(),
            error,
            reader.remaining()
        );
        reader.discard();
        self.port.rx.bad_frame = true;
        self.port.rx.rcv_frame = false;
        self.port.rx.state = RxState::WaitForFrame;
    }

    fn rx_process_frame(&mut self, reader: &mut FrameReader<'_>) -> Result<()> {
        let mut identity = Identity::default();
        let mut last_mandatory: Option<TlvType> = None;

        loop {
            let header = TlvHeader::read(reader)?;
            let length = usize::from(header.length);
            let kind = header.kind();

            match kind {
                TlvType::EndOfLldpdu => {
                    if length != 0 {
                        return Err(LldpError::MalformedTlv {
                            tlv_type: header.tlv_type,
                            length: header.length,
                        });
                    }
                    break;
                }
                TlvType::ChassisId => {
                    identity.chassis = Some(subtyped(kind, reader.read_block(length)?)?);
                    last_mandatory = Some(kind);
                }
                TlvType::PortId => {
                    if last_mandatory != Some(TlvType::ChassisId) {
                        return Err(LldpError::OutOfOrder {
                            tlv_type: header.tlv_type,
                        });
                    }
                    identity.port = Some(subtyped(kind, reader.read_block(length)?)?);
                    last_mandatory = Some(kind);
                }
                TlvType::TimeToLive => {
                    if last_mandatory != Some(TlvType::PortId) {
                        return Err(LldpError::OutOfOrder {
                            tlv_type: header.tlv_type,
                        });
                    }
                    if length < 2 {
                        return Err(LldpError::MalformedTlv {
                            tlv_type: header.tlv_type,
                            length: header.length,
                        });
                    }
                    identity.ttl = Some(reader.read_u16()?);
                    reader.dump(length - 2)?;
                    last_mandatory = Some(kind);
                }
                TlvType::OrganizationSpecific => self.process_org_specific(reader, header)?,
                _ if kind.is_optional() => {
                    log::trace!("skipping {} TLV, {} bytes", kind, length);
                    reader.dump(length)?;
                }
                _ => return Err(LldpError::UnknownTlvType(header.tlv_type)),
            }
        }

        self.update_remote(identity)
    }

    fn process_org_specific(&mut self, reader: &mut FrameReader<'_>, header: TlvHeader) -> Result<()> {
        let length = usize::from(header.length);
        if length < ORG_HEADER_SIZE {
            return Err(LldpError::MalformedTlv {
                tlv_type: header.tlv_type,
                length: header.length,
            });
        }

        let oui = reader.read_u24()?;
        let subtype = reader.read_u8()?;
        let payload = reader.read_block(length - ORG_HEADER_SIZE)?;

        match self
            .processors
            .iter()
            .find(|entry| entry.oui == oui && entry.subtype == subtype)
        {
            Some(entry) => entry.processor.process(payload, &mut self.port),
            None => {
                log::trace!(
                    "skipping org TLV {:06X}/{}: {}",
                    oui,
                    subtype,
                    hex::encode(payload)
                );
                Ok(())
            }
        }
    }

    fn update_remote(&mut self, identity: Identity) -> Result<()> {
        let (Some(chassis), Some(port), Some(ttl)) = (identity.chassis, identity.port, identity.ttl)
        else {
            return Err(LldpError::MissingMandatory);
        };

        if ttl == 0 {
            if self.port.remote.take().is_some() {
                log::info!("LLDP neighbour shut down");
            }
            return Ok(());
        }

        let changed = self
            .port
            .remote
            .as_ref()
            .map_or(true, |r| r.chassis_id_subtype != chassis.0 || r.chassis_id != chassis.1);
        if changed {
            log::info!("new LLDP neighbour {}", hex::encode(&chassis.1));
            self.port.new_neighbor = true;
        }

        self.port.remote = Some(RemoteSystem {
            chassis_id_subtype: chassis.0,
            chassis_id: chassis.1,
            port_id_subtype: port.0,
            port_id: port.1,
            ttl,
            remaining: ttl,
        });
        Ok(())
    }
}
